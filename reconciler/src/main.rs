mod snapshot;

use std::sync::Arc;

use futures::future::join_all;
use instance_common::interface::{
    deployment_event_channel, InMemoryDeploymentSummaryStore, InMemoryInfraMappingStore,
    InMemoryInstanceStore, InMemoryPerpetualTaskClient, LeaseLocker, StaticFeatureFlags,
};
use instance_common::{
    DeploymentEventConsumer, InstanceHandlerFactory, InstanceSyncService, ProviderClients,
    SyncConfig, SyncDependencies,
};
use instance_defs::InfraMappingStore;
use instance_utils::{epoch_to_timestamp, get_timestamp, setup_logging};
use log::{error, info};
use serde_json::{json, Value};

use crate::snapshot::Snapshot;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    setup_logging()?;

    let config = SyncConfig::load()?;
    let snapshot = Snapshot::load()?;

    let providers = Arc::new(snapshot.providers);
    let clients = ProviderClients {
        auto_scaling: providers.clone(),
        containers: providers.clone(),
        pcf: providers.clone(),
        lambda: providers,
    };

    let instances = Arc::new(InMemoryInstanceStore::default());
    instances.insert_all(snapshot.instances).await;
    let mappings = Arc::new(InMemoryInfraMappingStore::default());
    for infra_mapping in snapshot.infra_mappings {
        mappings.insert(infra_mapping).await;
    }
    let (queue, receiver) = deployment_event_channel();

    let deps = SyncDependencies {
        instances,
        deployment_summaries: Arc::new(InMemoryDeploymentSummaryStore::default()),
        infra_mappings: mappings.clone(),
        feature_flags: Arc::new(StaticFeatureFlags::from_config(&config.feature_flags)),
        perpetual_tasks: Arc::new(InMemoryPerpetualTaskClient::default()),
        event_publisher: Arc::new(queue),
        locker: Arc::new(LeaseLocker::default()),
    };
    let handlers = InstanceHandlerFactory::new(clients);
    info!(
        "Instance handlers registered for {:?}",
        handlers.supported_types()
    );
    let service = Arc::new(InstanceSyncService::new(handlers, deps, &config)?);

    // Deployments finished since the snapshot was taken go first.
    let mut consumer = DeploymentEventConsumer::new(service.clone(), receiver);
    for event in snapshot.deployment_events {
        if let Err(e) = service
            .publish_deployment_event(
                event.deployment_summaries,
                event.is_rollback,
                event.on_demand_rollback_info,
            )
            .await
        {
            error!("Failed to publish deployment event: {}", e);
        }
    }
    let event_outcomes = consumer
        .drain()
        .await
        .into_iter()
        .map(|outcome| format!("{:?}", outcome))
        .collect::<Vec<String>>();

    let infra_mappings = mappings.list().await?;
    info!("Running iterator sync for {} infra mappings", infra_mappings.len());

    let syncs = infra_mappings.iter().map(|infra_mapping| {
        let service = service.clone();
        async move {
            let result = service
                .iterator_sync(&infra_mapping.app_id, &infra_mapping.id)
                .await;
            (infra_mapping.id.clone(), result)
        }
    });

    let mut synced = vec![];
    let mut skipped = vec![];
    let mut failed = vec![];
    for (infra_mapping_id, result) in join_all(syncs).await {
        match result {
            Ok(Some(outcome)) => synced.push(serde_json::to_value(&outcome)?),
            Ok(None) => skipped.push(infra_mapping_id),
            Err(e) => {
                error!("Iterator sync of infra mapping {} failed: {}", infra_mapping_id, e);
                failed.push(json!({
                    "infra_mapping_id": infra_mapping_id,
                    "error": e.to_string(),
                    "retryable": e.is_retryable(),
                }));
            }
        }
    }

    let response = json!({
        "status": if failed.is_empty() { "successful" } else { "partial" },
        "finished_at": get_timestamp(),
        "snapshot_taken_at": snapshot.taken_at.map(epoch_to_timestamp),
        "deployment_events": event_outcomes,
        "synced": synced,
        "skipped": skipped,
        "failed": failed,
    });
    println!("{}", serde_json::to_string_pretty::<Value>(&response)?);

    Ok(())
}
