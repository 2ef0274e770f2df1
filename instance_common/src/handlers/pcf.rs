use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::try_join_all;
use instance_defs::{
    DeploymentInfo, DeploymentKey, DeploymentSummary, FeatureName, InfraMapping,
    InfraMappingType, InstanceInfo, InstanceRecord, InstanceSyncResponse, PcfAppInstance,
    PcfClient, PcfInstanceInfo, Status, SyncError,
};
use log::info;

use super::ensure_success;
use crate::interface::{
    incompatible_response, provider_unavailable, unsupported_deployment_info, InstanceHandler,
    LiveSource, SyncContext, SyncGroup,
};
use crate::logic::{status_for_response, LiveInstance, SyncScope};

const NAME: &str = "pcf";
const SUPPORTED_TYPES: &[InfraMappingType] = &[InfraMappingType::PcfPcf];

pub struct PcfInstanceHandler {
    client: Arc<dyn PcfClient>,
}

fn application_scope(application_name: &str) -> SyncScope {
    SyncScope::PcfApplication {
        application_name: application_name.to_string(),
    }
}

fn tracked_applications(tracked: &[InstanceRecord]) -> BTreeSet<String> {
    tracked
        .iter()
        .filter_map(|record| match &record.instance_info {
            InstanceInfo::Pcf(pcf) => Some(pcf.application_name.clone()),
            _ => None,
        })
        .collect()
}

fn to_live(infra_mapping: &InfraMapping, instances: &[PcfAppInstance]) -> Vec<LiveInstance> {
    instances
        .iter()
        .map(|instance| {
            let info = InstanceInfo::Pcf(PcfInstanceInfo {
                application_guid: instance.application_guid.clone(),
                application_name: instance.application_name.clone(),
                instance_index: instance.instance_index,
                organization: instance.organization.clone(),
                space: instance.space.clone(),
            });
            LiveInstance::new(info, &infra_mapping.id, instance.started_at)
        })
        .collect()
}

impl PcfInstanceHandler {
    pub fn new(client: Arc<dyn PcfClient>) -> Self {
        PcfInstanceHandler { client }
    }

    async fn fetch(
        &self,
        infra_mapping: &InfraMapping,
        application_name: String,
        deployment: Option<&DeploymentSummary>,
    ) -> Result<SyncGroup, SyncError> {
        let scope = application_scope(&application_name);
        let instances = self
            .client
            .get_application_instances(infra_mapping, &application_name)
            .await
            .map_err(|e| provider_unavailable(NAME, e))?;
        let mut group = match instances {
            Some(instances) => SyncGroup::with_live(scope, to_live(infra_mapping, &instances)),
            None => {
                info!(
                    "PCF application {} of infra mapping {} no longer exists",
                    application_name, infra_mapping.id
                );
                SyncGroup::gone(scope)
            }
        };
        group.deployment = deployment.cloned();
        Ok(group)
    }
}

#[async_trait]
impl InstanceHandler for PcfInstanceHandler {
    fn name(&self) -> &'static str {
        NAME
    }

    fn supported_infra_mapping_types(&self) -> &'static [InfraMappingType] {
        SUPPORTED_TYPES
    }

    async fn get_live_instances(&self, ctx: &SyncContext<'_>) -> Result<Vec<SyncGroup>, SyncError> {
        match ctx.source {
            LiveSource::Provider => {
                try_join_all(
                    tracked_applications(ctx.tracked)
                        .into_iter()
                        .map(|name| self.fetch(ctx.infra_mapping, name, None)),
                )
                .await
            }
            LiveSource::Deployment(summaries) => {
                let deployed: BTreeMap<String, &DeploymentSummary> = summaries
                    .iter()
                    .filter_map(|summary| match &summary.deployment_info {
                        DeploymentInfo::Pcf(pcf) => Some((pcf.application_name.clone(), summary)),
                        _ => None,
                    })
                    .collect();
                let mut names = tracked_applications(ctx.tracked);
                names.extend(deployed.keys().cloned());
                try_join_all(names.into_iter().map(|name| {
                    let deployment = deployed.get(&name).copied();
                    self.fetch(ctx.infra_mapping, name, deployment)
                }))
                .await
            }
            LiveSource::PerpetualTask(response) => match response {
                InstanceSyncResponse::Pcf(pcf) => {
                    ensure_success(NAME, response)?;
                    let scope = application_scope(&pcf.application_name);
                    if !pcf.application_exists {
                        return Ok(vec![SyncGroup::gone(scope)]);
                    }
                    let live = to_live(ctx.infra_mapping, &pcf.instances);
                    Ok(vec![SyncGroup::with_live(scope, live)])
                }
                other => Err(incompatible_response(NAME, other)),
            },
        }
    }

    fn generate_deployment_key(
        &self,
        deployment_info: &DeploymentInfo,
    ) -> Result<DeploymentKey, SyncError> {
        match deployment_info {
            DeploymentInfo::Pcf(pcf) => Ok(DeploymentKey::Pcf {
                application_name: pcf.application_name.clone(),
            }),
            other => Err(unsupported_deployment_info(NAME, other)),
        }
    }

    fn get_status(
        &self,
        _infra_mapping: &InfraMapping,
        response: &InstanceSyncResponse,
    ) -> Result<Status, SyncError> {
        match response {
            InstanceSyncResponse::Pcf(_) => Ok(status_for_response(response)),
            other => Err(incompatible_response(NAME, other)),
        }
    }

    fn perpetual_task_feature(&self) -> FeatureName {
        FeatureName::MovePcfInstanceSyncToPerpetualTask
    }

    fn stop_iterator_feature(&self) -> FeatureName {
        FeatureName::StopInstanceSyncViaIteratorForPcf
    }
}
