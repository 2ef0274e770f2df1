use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::try_join_all;
use instance_defs::{
    AutoScalingClient, DeploymentInfo, DeploymentKey, DeploymentSummary, Ec2Instance, FeatureName,
    HostInstanceInfo, InfraMapping, InfraMappingType, InstanceInfo, InstanceRecord,
    InstanceSyncResponse, Status, SyncError,
};
use instance_utils::non_blank;
use log::info;

use super::ensure_success;
use crate::interface::{
    incompatible_response, provider_unavailable, unsupported_deployment_info, InstanceHandler,
    LiveSource, SyncContext, SyncGroup,
};
use crate::logic::{status_for_response, LiveInstance, SyncScope};

const NAME: &str = "aws-ami";
const SUPPORTED_TYPES: &[InfraMappingType] = &[
    InfraMappingType::AwsAmi,
    InfraMappingType::AwsAmiLaunchTemplate,
];

/// Hosts launched by auto-scaling groups. Hosts outside any group are not
/// owned by this handler and are never touched.
pub struct AwsAmiInstanceHandler {
    client: Arc<dyn AutoScalingClient>,
}

impl AwsAmiInstanceHandler {
    pub fn new(client: Arc<dyn AutoScalingClient>) -> Self {
        AwsAmiInstanceHandler { client }
    }

    fn tracked_groups(tracked: &[InstanceRecord]) -> BTreeSet<String> {
        tracked
            .iter()
            .filter_map(|record| match &record.instance_info {
                InstanceInfo::Host(host) => {
                    non_blank(host.auto_scaling_group_name.as_deref()).map(str::to_string)
                }
                _ => None,
            })
            .collect()
    }

    fn to_live(
        infra_mapping: &InfraMapping,
        auto_scaling_group_name: &str,
        instances: &[Ec2Instance],
    ) -> Vec<LiveInstance> {
        instances
            .iter()
            .map(|instance| {
                let info = InstanceInfo::Host(HostInstanceInfo {
                    host_name: instance.private_dns_name.clone(),
                    instance_id: instance.instance_id.clone(),
                    public_dns_name: instance.public_dns_name.clone(),
                    auto_scaling_group_name: Some(auto_scaling_group_name.to_string()),
                });
                LiveInstance::new(info, &infra_mapping.id, instance.launched_at)
            })
            .collect()
    }

    async fn fetch(
        &self,
        infra_mapping: &InfraMapping,
        auto_scaling_group_name: String,
        deployment: Option<&DeploymentSummary>,
    ) -> Result<SyncGroup, SyncError> {
        let scope = SyncScope::AutoScalingGroup {
            name: auto_scaling_group_name.clone(),
        };
        let instances = self
            .client
            .describe_auto_scaling_group_instances(infra_mapping, &auto_scaling_group_name)
            .await
            .map_err(|e| provider_unavailable(NAME, e))?;
        let mut group = match instances {
            Some(instances) => SyncGroup::with_live(
                scope,
                Self::to_live(infra_mapping, &auto_scaling_group_name, &instances),
            ),
            None => {
                info!(
                    "Auto scaling group {} of infra mapping {} no longer exists",
                    auto_scaling_group_name, infra_mapping.id
                );
                SyncGroup::gone(scope)
            }
        };
        group.deployment = deployment.cloned();
        Ok(group)
    }
}

#[async_trait]
impl InstanceHandler for AwsAmiInstanceHandler {
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
                    Self::tracked_groups(ctx.tracked)
                        .into_iter()
                        .map(|name| self.fetch(ctx.infra_mapping, name, None)),
                )
                .await
            }
            LiveSource::Deployment(summaries) => {
                let mut deployed: BTreeMap<String, &DeploymentSummary> = BTreeMap::new();
                for summary in summaries {
                    if let DeploymentInfo::AwsAmi(info) = &summary.deployment_info {
                        deployed.insert(info.auto_scaling_group_name.clone(), summary);
                    }
                }
                let mut names = Self::tracked_groups(ctx.tracked);
                names.extend(deployed.keys().cloned());
                try_join_all(names.into_iter().map(|name| {
                    let deployment = deployed.get(&name).copied();
                    self.fetch(ctx.infra_mapping, name, deployment)
                }))
                .await
            }
            LiveSource::PerpetualTask(response) => match response {
                InstanceSyncResponse::AwsAmi(ami) => {
                    ensure_success(NAME, response)?;
                    let scope = SyncScope::AutoScalingGroup {
                        name: ami.auto_scaling_group_name.clone(),
                    };
                    if !ami.auto_scaling_group_exists {
                        return Ok(vec![SyncGroup::gone(scope)]);
                    }
                    let live = Self::to_live(
                        ctx.infra_mapping,
                        &ami.auto_scaling_group_name,
                        &ami.instances,
                    );
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
            DeploymentInfo::AwsAmi(info) => Ok(DeploymentKey::AwsAmi {
                auto_scaling_group_name: info.auto_scaling_group_name.clone(),
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
            InstanceSyncResponse::AwsAmi(_) => Ok(status_for_response(response)),
            other => Err(incompatible_response(NAME, other)),
        }
    }

    fn perpetual_task_feature(&self) -> FeatureName {
        FeatureName::MoveAwsAmiInstanceSyncToPerpetualTask
    }

    fn stop_iterator_feature(&self) -> FeatureName {
        FeatureName::StopInstanceSyncViaIteratorForAwsAmi
    }
}
