use std::collections::BTreeMap;

use async_trait::async_trait;
use instance_defs::{
    DeploymentInfo, DeploymentKey, DeploymentSummary, FeatureName, InfraMapping,
    InfraMappingType, InstanceRecord, InstanceSyncResponse, Status, SyncError, SyncFlow,
};

use crate::logic::{LiveInstance, SyncScope};

/// Where a pass takes its picture of live state from.
#[derive(Debug, Clone, Copy)]
pub enum LiveSource<'a> {
    /// Query the provider API.
    Provider,
    /// Summaries of a deployment that just finished.
    Deployment(&'a [DeploymentSummary]),
    /// A response already fetched by a perpetual task.
    PerpetualTask(&'a InstanceSyncResponse),
}

pub struct SyncContext<'a> {
    pub infra_mapping: &'a InfraMapping,
    pub flow: SyncFlow,
    pub source: LiveSource<'a>,
    pub tracked: &'a [InstanceRecord],
}

/// Live state observed for one scope of an infra mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncGroup {
    pub scope: SyncScope,
    pub live: Vec<LiveInstance>,
    pub deployment: Option<DeploymentSummary>,
    /// The scoped resource no longer exists upstream.
    pub gone: bool,
}

impl SyncGroup {
    pub fn new(scope: SyncScope) -> Self {
        SyncGroup {
            scope,
            live: vec![],
            deployment: None,
            gone: false,
        }
    }

    pub fn gone(scope: SyncScope) -> Self {
        SyncGroup {
            gone: true,
            ..SyncGroup::new(scope)
        }
    }

    pub fn with_live(scope: SyncScope, live: Vec<LiveInstance>) -> Self {
        SyncGroup {
            live,
            ..SyncGroup::new(scope)
        }
    }
}

/// Groups keyed by scope so a scope is reconciled once per pass.
pub type SyncGroups = BTreeMap<SyncScope, SyncGroup>;

/// Provider strategy plugged into the shared reconciliation driver.
#[async_trait]
pub trait InstanceHandler: Send + Sync {
    fn name(&self) -> &'static str;

    fn supported_infra_mapping_types(&self) -> &'static [InfraMappingType];

    fn validate_instance_type(&self, infra_mapping_type: InfraMappingType) -> Result<(), SyncError> {
        if self
            .supported_infra_mapping_types()
            .contains(&infra_mapping_type)
        {
            Ok(())
        } else {
            Err(SyncError::UnsupportedInfraMappingType {
                handler: self.name().to_string(),
                infra_mapping_type,
            })
        }
    }

    /// Observes live state for every scope the pass is authoritative for.
    async fn get_live_instances(&self, ctx: &SyncContext<'_>) -> Result<Vec<SyncGroup>, SyncError>;

    fn generate_deployment_key(&self, deployment_info: &DeploymentInfo)
        -> Result<DeploymentKey, SyncError>;

    fn get_status(
        &self,
        infra_mapping: &InfraMapping,
        response: &InstanceSyncResponse,
    ) -> Result<Status, SyncError>;

    /// Flag moving this provider's sync to perpetual tasks and allowing their writes.
    fn perpetual_task_feature(&self) -> FeatureName;

    /// Flag turning off iterator-driven sync for this provider.
    fn stop_iterator_feature(&self) -> FeatureName;

    /// Whether rollback summaries are kept for later correlation.
    fn save_deployment_summary_on_rollback(&self) -> bool {
        false
    }
}

pub(crate) fn unsupported_deployment_info(handler: &str, info: &DeploymentInfo) -> SyncError {
    SyncError::UnsupportedDeploymentKey {
        handler: handler.to_string(),
        info_type: info.type_name().to_string(),
    }
}

pub(crate) fn incompatible_response(handler: &str, response: &InstanceSyncResponse) -> SyncError {
    SyncError::IncompatibleResponse(format!(
        "{} cannot be handled by the {} handler",
        response.type_name(),
        handler
    ))
}

pub(crate) fn provider_unavailable(handler: &str, error: anyhow::Error) -> SyncError {
    SyncError::ProviderUnavailable(format!("{} provider: {:#}", handler, error))
}
