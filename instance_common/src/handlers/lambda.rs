use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::try_join_all;
use instance_defs::{
    DeploymentInfo, DeploymentKey, DeploymentSummary, FeatureName, FunctionInstanceInfo,
    InfraMapping, InfraMappingType, InstanceInfo, InstanceRecord, InstanceSyncResponse,
    LambdaClient, LambdaFunction, Status, SyncError,
};
use log::info;

use super::ensure_success;
use crate::interface::{
    incompatible_response, provider_unavailable, unsupported_deployment_info, InstanceHandler,
    LiveSource, SyncContext, SyncGroup,
};
use crate::logic::{status_for_response, LiveInstance, SyncScope};

const NAME: &str = "aws-lambda";
const SUPPORTED_TYPES: &[InfraMappingType] = &[InfraMappingType::AwsAwsLambda];

/// Serverless functions, one instance per deployed function version.
///
/// A finished deployment already names the version it published, so the
/// deployment flow builds its live set from the summary without calling AWS.
pub struct AwsLambdaInstanceHandler {
    client: Arc<dyn LambdaClient>,
}

fn function_scope(function_name: &str) -> SyncScope {
    SyncScope::Function {
        function_name: function_name.to_string(),
    }
}

fn tracked_functions(tracked: &[InstanceRecord]) -> BTreeSet<String> {
    tracked
        .iter()
        .filter_map(|record| match &record.instance_info {
            InstanceInfo::Function(function) => Some(function.function_name.clone()),
            _ => None,
        })
        .collect()
}

fn function_group(infra_mapping: &InfraMapping, function: &LambdaFunction) -> SyncGroup {
    let info = InstanceInfo::Function(FunctionInstanceInfo {
        function_name: function.function_name.clone(),
        version: function.version.clone(),
        function_arn: function.function_arn.clone(),
        runtime: function.runtime.clone(),
        last_modified: function.last_modified.clone(),
    });
    SyncGroup::with_live(
        function_scope(&function.function_name),
        vec![LiveInstance::new(info, &infra_mapping.id, 0)],
    )
}

fn deployed_group(infra_mapping: &InfraMapping, summary: &DeploymentSummary) -> Option<SyncGroup> {
    let DeploymentInfo::AwsLambda(deployed) = &summary.deployment_info else {
        return None;
    };
    let function = LambdaFunction {
        function_name: deployed.function_name.clone(),
        version: deployed.version.clone(),
        function_arn: deployed.function_arn.clone(),
        runtime: None,
        last_modified: None,
    };
    let mut group = function_group(infra_mapping, &function);
    group.deployment = Some(summary.clone());
    Some(group)
}

impl AwsLambdaInstanceHandler {
    pub fn new(client: Arc<dyn LambdaClient>) -> Self {
        AwsLambdaInstanceHandler { client }
    }

    async fn fetch(
        &self,
        infra_mapping: &InfraMapping,
        function_name: String,
    ) -> Result<SyncGroup, SyncError> {
        let function = self
            .client
            .get_function(infra_mapping, &function_name)
            .await
            .map_err(|e| provider_unavailable(NAME, e))?;
        match function {
            Some(function) => Ok(function_group(infra_mapping, &function)),
            None => {
                info!(
                    "Lambda function {} of infra mapping {} no longer exists",
                    function_name, infra_mapping.id
                );
                Ok(SyncGroup::gone(function_scope(&function_name)))
            }
        }
    }
}

#[async_trait]
impl InstanceHandler for AwsLambdaInstanceHandler {
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
                    tracked_functions(ctx.tracked)
                        .into_iter()
                        .map(|name| self.fetch(ctx.infra_mapping, name)),
                )
                .await
            }
            LiveSource::Deployment(summaries) => Ok(summaries
                .iter()
                .filter_map(|summary| deployed_group(ctx.infra_mapping, summary))
                .collect()),
            LiveSource::PerpetualTask(response) => match response {
                InstanceSyncResponse::AwsLambda(lambda) => {
                    ensure_success(NAME, response)?;
                    match &lambda.function {
                        Some(function) => Ok(vec![function_group(ctx.infra_mapping, function)]),
                        None => Ok(vec![SyncGroup::gone(function_scope(&lambda.function_name))]),
                    }
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
            DeploymentInfo::AwsLambda(lambda) => Ok(DeploymentKey::AwsLambda {
                function_name: lambda.function_name.clone(),
                version: lambda.version.clone(),
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
            InstanceSyncResponse::AwsLambda(_) => Ok(status_for_response(response)),
            other => Err(incompatible_response(NAME, other)),
        }
    }

    fn perpetual_task_feature(&self) -> FeatureName {
        FeatureName::MoveAwsLambdaInstanceSyncToPerpetualTask
    }

    fn stop_iterator_feature(&self) -> FeatureName {
        FeatureName::StopInstanceSyncViaIteratorForAwsLambda
    }

    fn save_deployment_summary_on_rollback(&self) -> bool {
        true
    }
}
