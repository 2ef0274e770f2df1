use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use instance_defs::{
    DeploymentEvent, DeploymentEventPublisher, DeploymentSummary, DeploymentSummaryStore,
    FeatureFlagService, InfraMapping, InfraMappingStore, InstanceStore, InstanceSyncResponse,
    OnDemandRollbackInfo, PerpetualTaskClient, Status, SyncError, SyncFlow, SyncLocker,
};
use instance_utils::get_epoch;
use log::{debug, error, info, warn};
use serde::Serialize;

use super::lock::{LockGuard, SyncLock};
use super::perpetual_task::PerpetualTaskLifecycle;
use super::reconcile::{reconcile, ReconcileInput, ReconcilePlan};
use super::rollback::resolve_rollback_artifact;
use super::status::status_for_error;
use super::sync_flow::SyncFlowGate;
use crate::config::SyncConfig;
use crate::interface::{
    InstanceHandler, InstanceHandlerFactory, LiveSource, SyncContext, SyncGroup, SyncGroups,
};

/// Collaborators the service reads from and writes to.
#[derive(Clone)]
pub struct SyncDependencies {
    pub instances: Arc<dyn InstanceStore>,
    pub deployment_summaries: Arc<dyn DeploymentSummaryStore>,
    pub infra_mappings: Arc<dyn InfraMappingStore>,
    pub feature_flags: Arc<dyn FeatureFlagService>,
    pub perpetual_tasks: Arc<dyn PerpetualTaskClient>,
    pub event_publisher: Arc<dyn DeploymentEventPublisher>,
    pub locker: Arc<dyn SyncLocker>,
}

/// What one reconciliation pass did for an infra mapping.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    pub infra_mapping_id: String,
    pub flow: SyncFlow,
    pub added: usize,
    pub updated: usize,
    pub deleted: usize,
    pub skipped: usize,
    /// False when the sync flow was not allowed to write the diff.
    pub applied: bool,
    pub gone_scopes: Vec<String>,
    pub instance_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    Processed,
    Requeued,
    Dropped,
}

/// Entry point for every sync trigger: manual calls, the iterator, finished
/// deployments and perpetual-task callbacks.
pub struct InstanceSyncService {
    handlers: InstanceHandlerFactory,
    instances: Arc<dyn InstanceStore>,
    deployment_summaries: Arc<dyn DeploymentSummaryStore>,
    infra_mappings: Arc<dyn InfraMappingStore>,
    feature_flags: Arc<dyn FeatureFlagService>,
    event_publisher: Arc<dyn DeploymentEventPublisher>,
    gate: SyncFlowGate,
    lifecycle: PerpetualTaskLifecycle,
    lock: SyncLock,
    max_event_retries: u32,
    event_retry_backoff: Duration,
}

/// Delay before redelivering an event that already failed `retries` times.
fn retry_delay(backoff: Duration, retries: u32) -> Duration {
    backoff.saturating_mul(1u32 << retries.min(16))
}

fn group_by_scope(groups: Vec<SyncGroup>) -> SyncGroups {
    let mut grouped = SyncGroups::new();
    for group in groups {
        match grouped.get_mut(&group.scope) {
            Some(existing) => {
                existing.live.extend(group.live);
                existing.gone = existing.gone && group.gone;
                if existing.deployment.is_none() {
                    existing.deployment = group.deployment;
                }
            }
            None => {
                grouped.insert(group.scope.clone(), group);
            }
        }
    }
    grouped
}

impl InstanceSyncService {
    pub fn new(
        handlers: InstanceHandlerFactory,
        deps: SyncDependencies,
        config: &SyncConfig,
    ) -> Result<Self, anyhow::Error> {
        let settings = config.lock.settings()?;
        let event_retry_backoff = config.deployment_events.retry_backoff()?;
        Ok(InstanceSyncService {
            handlers,
            gate: SyncFlowGate::new(deps.feature_flags.clone()),
            lifecycle: PerpetualTaskLifecycle::new(
                deps.perpetual_tasks.clone(),
                deps.feature_flags.clone(),
            ),
            lock: SyncLock::new(deps.locker, settings),
            instances: deps.instances,
            deployment_summaries: deps.deployment_summaries,
            infra_mappings: deps.infra_mappings,
            feature_flags: deps.feature_flags,
            event_publisher: deps.event_publisher,
            max_event_retries: config.deployment_events.max_retries,
            event_retry_backoff,
        })
    }

    async fn load_infra_mapping(
        &self,
        app_id: &str,
        infra_mapping_id: &str,
    ) -> Result<InfraMapping, SyncError> {
        self.infra_mappings
            .get(app_id, infra_mapping_id)
            .await?
            .ok_or_else(|| SyncError::InfraMappingNotFound {
                app_id: app_id.to_string(),
                infra_mapping_id: infra_mapping_id.to_string(),
            })
    }

    fn handler_for(&self, infra_mapping: &InfraMapping) -> Result<Arc<dyn InstanceHandler>, SyncError> {
        let handler = self
            .handlers
            .get_instance_handler(infra_mapping.infra_mapping_type)?;
        handler.validate_instance_type(infra_mapping.infra_mapping_type)?;
        Ok(handler)
    }

    /// Reconciles one infra mapping against the provider API.
    pub async fn sync_instances(
        &self,
        app_id: &str,
        infra_mapping_id: &str,
        flow: SyncFlow,
    ) -> Result<SyncOutcome, SyncError> {
        let infra_mapping = self.load_infra_mapping(app_id, infra_mapping_id).await?;
        let handler = self.handler_for(&infra_mapping)?;
        self.run_pass(handler.as_ref(), &infra_mapping, flow, LiveSource::Provider)
            .await
    }

    /// Periodic sync. Returns `None` when perpetual tasks own the mapping.
    pub async fn iterator_sync(
        &self,
        app_id: &str,
        infra_mapping_id: &str,
    ) -> Result<Option<SyncOutcome>, SyncError> {
        let infra_mapping = self.load_infra_mapping(app_id, infra_mapping_id).await?;
        let handler = self.handler_for(&infra_mapping)?;
        if self
            .feature_flags
            .is_enabled(handler.stop_iterator_feature(), &infra_mapping.account_id)
        {
            debug!(
                "Iterator sync of infra mapping {} is handed over to perpetual tasks",
                infra_mapping.id
            );
            return Ok(None);
        }
        self.ensure_sync_mode(handler.as_ref(), &infra_mapping)
            .await?;
        let outcome = self
            .run_pass(
                handler.as_ref(),
                &infra_mapping,
                SyncFlow::Iterator,
                LiveSource::Provider,
            )
            .await?;
        Ok(Some(outcome))
    }

    async fn ensure_sync_mode(
        &self,
        handler: &dyn InstanceHandler,
        infra_mapping: &InfraMapping,
    ) -> Result<bool, SyncError> {
        self.lifecycle
            .fall_back_to_iterator_if_disabled(infra_mapping, handler.perpetual_task_feature())
            .await
    }

    /// Reconciles the infra mappings touched by a finished deployment,
    /// correlating rollbacks with the deployment they restore.
    pub async fn handle_new_deployment(
        &self,
        deployment_summaries: Vec<DeploymentSummary>,
        is_rollback: bool,
        on_demand_rollback_info: Option<&OnDemandRollbackInfo>,
    ) -> Result<Vec<SyncOutcome>, SyncError> {
        if deployment_summaries.is_empty() {
            return Err(SyncError::InvalidDeploymentEvent(
                "event carries no deployment summaries".to_string(),
            ));
        }

        let mut by_mapping: BTreeMap<(String, String), Vec<DeploymentSummary>> = BTreeMap::new();
        for summary in deployment_summaries {
            by_mapping
                .entry((summary.app_id.clone(), summary.infra_mapping_id.clone()))
                .or_default()
                .push(summary);
        }

        let mut outcomes = Vec::with_capacity(by_mapping.len());
        for ((app_id, infra_mapping_id), mut summaries) in by_mapping {
            let infra_mapping = self.load_infra_mapping(&app_id, &infra_mapping_id).await?;
            let handler = self.handler_for(&infra_mapping)?;

            for summary in summaries.iter_mut() {
                let key = handler.generate_deployment_key(&summary.deployment_info)?;
                summary.set_deployment_key(key)?;
                if is_rollback {
                    resolve_rollback_artifact(
                        self.deployment_summaries.as_ref(),
                        summary,
                        on_demand_rollback_info,
                    )
                    .await?;
                }
                if !is_rollback || handler.save_deployment_summary_on_rollback() {
                    let saved = self.deployment_summaries.save(summary.clone()).await?;
                    summary.id = saved.id;
                }
            }

            let outcome = self
                .run_pass(
                    handler.as_ref(),
                    &infra_mapping,
                    SyncFlow::NewDeployment,
                    LiveSource::Deployment(&summaries),
                )
                .await?;

            if let Err(err) = self
                .lifecycle
                .create_for_new_deployment_if_enabled(
                    &infra_mapping,
                    handler.perpetual_task_feature(),
                    &summaries,
                )
                .await
            {
                error!(
                    "Failed to create perpetual tasks for infra mapping {}: {}",
                    infra_mapping.id, err
                );
            }
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    /// Applies a response fetched by a perpetual task and reports whether the
    /// task should keep polling.
    pub async fn process_instance_sync_response_from_perpetual_task(
        &self,
        infra_mapping: &InfraMapping,
        response: &InstanceSyncResponse,
    ) -> Status {
        let handler = match self.handler_for(infra_mapping) {
            Ok(handler) => handler,
            Err(err) => return status_for_error(&err),
        };
        let status = match handler.get_status(infra_mapping, response) {
            Ok(status) => status,
            Err(err) => return status_for_error(&err),
        };
        if response.is_failure() {
            warn!(
                "Perpetual task for infra mapping {} failed: {}",
                infra_mapping.id,
                response.error_message()
            );
            return status;
        }
        match self
            .run_pass(
                handler.as_ref(),
                infra_mapping,
                SyncFlow::PerpetualTask,
                LiveSource::PerpetualTask(response),
            )
            .await
        {
            Ok(_) => status,
            Err(err) => {
                error!(
                    "Perpetual task sync of infra mapping {} failed: {}",
                    infra_mapping.id, err
                );
                status_for_error(&err)
            }
        }
    }

    /// Callback for a perpetual task, correlated through its client params.
    pub async fn handle_perpetual_task_response(
        &self,
        task_id: &str,
        response: &InstanceSyncResponse,
    ) -> Result<Status, SyncError> {
        let task = self
            .lifecycle
            .get_task(task_id)
            .await?
            .ok_or_else(|| SyncError::ResourceGone(format!("perpetual task {}", task_id)))?;
        let params = &task.client_params;

        let Some(infra_mapping) = self
            .infra_mappings
            .get(&params.app_id, &params.infra_mapping_id)
            .await?
        else {
            info!(
                "Infra mapping {} no longer exists, deleting its perpetual tasks",
                params.infra_mapping_id
            );
            self.lifecycle
                .delete_perpetual_tasks(&params.account_id, &params.infra_mapping_id)
                .await?;
            return Ok(Status::finished());
        };

        let status = self
            .process_instance_sync_response_from_perpetual_task(&infra_mapping, response)
            .await;
        self.lifecycle.handle_status(&task, &status).await?;
        Ok(status)
    }

    pub async fn publish_deployment_event(
        &self,
        deployment_summaries: Vec<DeploymentSummary>,
        is_rollback: bool,
        on_demand_rollback_info: Option<OnDemandRollbackInfo>,
    ) -> Result<(), SyncError> {
        if deployment_summaries.is_empty() {
            return Err(SyncError::InvalidDeploymentEvent(
                "refusing to publish an event without deployment summaries".to_string(),
            ));
        }
        let event = DeploymentEvent {
            deployment_summaries,
            is_rollback,
            on_demand_rollback_info,
            retries: 0,
        };
        self.event_publisher.publish(event).await?;
        Ok(())
    }

    /// Processes one delivery of a deployment event. Retryable failures are
    /// published again after a backoff that doubles per attempt, until the
    /// retry budget is spent.
    pub async fn handle_deployment_event(&self, event: DeploymentEvent) -> EventOutcome {
        let result = self
            .handle_new_deployment(
                event.deployment_summaries.clone(),
                event.is_rollback,
                event.on_demand_rollback_info.as_ref(),
            )
            .await;
        match result {
            Ok(outcomes) => {
                debug!("Deployment event reconciled {} infra mappings", outcomes.len());
                EventOutcome::Processed
            }
            Err(err) if err.is_retryable() && event.retries < self.max_event_retries => {
                let delay = retry_delay(self.event_retry_backoff, event.retries);
                warn!(
                    "Deployment event failed on attempt {}, requeueing in {}: {}",
                    event.retries + 1,
                    humantime::format_duration(delay),
                    err
                );
                tokio::time::sleep(delay).await;
                let retry = DeploymentEvent {
                    retries: event.retries + 1,
                    ..event
                };
                match self.event_publisher.publish(retry).await {
                    Ok(()) => EventOutcome::Requeued,
                    Err(publish_err) => {
                        error!("Could not requeue deployment event: {}", publish_err);
                        EventOutcome::Dropped
                    }
                }
            }
            Err(err) => {
                error!(
                    "Dropping deployment event after {} retries: {}",
                    event.retries, err
                );
                EventOutcome::Dropped
            }
        }
    }

    /// One locked pass: load, observe, diff, gate, apply.
    ///
    /// Any error before the apply step leaves the store untouched.
    async fn run_pass(
        &self,
        handler: &dyn InstanceHandler,
        infra_mapping: &InfraMapping,
        flow: SyncFlow,
        source: LiveSource<'_>,
    ) -> Result<SyncOutcome, SyncError> {
        let guard = self.lock.acquire(&infra_mapping.lock_key()).await?;
        let result = self
            .locked_pass(&guard, handler, infra_mapping, flow, source)
            .await;
        guard.release().await;
        result
    }

    async fn locked_pass(
        &self,
        guard: &LockGuard,
        handler: &dyn InstanceHandler,
        infra_mapping: &InfraMapping,
        flow: SyncFlow,
        source: LiveSource<'_>,
    ) -> Result<SyncOutcome, SyncError> {
        let tracked = self
            .instances
            .get_instances_for_app_and_infra_mapping(&infra_mapping.app_id, &infra_mapping.id)
            .await?;
        let before = tracked.len() as u64;

        let ctx = SyncContext {
            infra_mapping,
            flow,
            source,
            tracked: &tracked,
        };
        let provider_timeout = self.lock.settings().provider_timeout;
        let live = tokio::time::timeout(provider_timeout, handler.get_live_instances(&ctx))
            .await
            .map_err(|_| {
                SyncError::ProviderUnavailable(format!(
                    "observing infra mapping {} timed out after {}",
                    infra_mapping.id,
                    humantime::format_duration(provider_timeout)
                ))
            })??;
        let groups = group_by_scope(live);

        let now = get_epoch();
        let mut plan = ReconcilePlan::default();
        let mut gone_scopes = vec![];
        for group in groups.values() {
            if group.gone {
                info!(
                    "{} of infra mapping {} is gone, removing its instances",
                    group.scope, infra_mapping.id
                );
                gone_scopes.push(group.scope.to_string());
            }
            plan.merge(reconcile(ReconcileInput {
                infra_mapping,
                tracked: &tracked,
                live: group.live.clone(),
                scope: &group.scope,
                deployment: group.deployment.as_ref(),
                now,
            }));
        }

        let mut outcome = SyncOutcome {
            infra_mapping_id: infra_mapping.id.clone(),
            flow,
            added: plan.to_add.len(),
            updated: plan.to_update.len(),
            deleted: plan.to_delete.len(),
            skipped: plan.skipped.len(),
            applied: false,
            gone_scopes,
            instance_count: before,
        };

        if !self.gate.can_update_instances_in_db(
            flow,
            &infra_mapping.account_id,
            handler.perpetual_task_feature(),
        ) {
            info!(
                "{} flow may not update instances of infra mapping {} in account {}, discarding {} adds, {} updates and {} deletes",
                flow,
                infra_mapping.id,
                infra_mapping.account_id,
                outcome.added,
                outcome.updated,
                outcome.deleted
            );
            return Ok(outcome);
        }
        outcome.applied = true;

        if plan.is_empty() {
            debug!(
                "Infra mapping {} is in sync ({} tracked, {} live)",
                infra_mapping.id, plan.tracked_count, plan.live_count
            );
            return Ok(outcome);
        }

        info!(
            "{} sync of app {} infra mapping {}: {} to add, {} to update, {} to delete ({} tracked, {} live)",
            flow,
            infra_mapping.app_id,
            infra_mapping.id,
            outcome.added,
            outcome.updated,
            outcome.deleted,
            plan.tracked_count,
            plan.live_count
        );

        guard.ensure_held().await?;
        if !plan.to_delete.is_empty() && !self.instances.delete(&plan.to_delete).await? {
            warn!(
                "Some of the instances {:?} were already deleted",
                plan.to_delete
            );
        }
        for record in plan.to_add {
            self.instances.save(record).await?;
        }
        for record in plan.to_update {
            self.instances.save_or_update(record).await?;
        }

        let after = self
            .instances
            .get_instance_count(&infra_mapping.app_id, &infra_mapping.id)
            .await?;
        outcome.instance_count = after;
        if let Err(err) = self
            .lifecycle
            .on_instance_count_change(infra_mapping, handler.perpetual_task_feature(), before, after)
            .await
        {
            error!(
                "Failed to update perpetual tasks of infra mapping {}: {}",
                infra_mapping.id, err
            );
        }
        Ok(outcome)
    }
}
