use std::sync::Arc;

use instance_defs::{FeatureFlagService, FeatureName, SyncFlow};

/// Decides whether a pass may write its diff to the instance store.
///
/// Diffing is always allowed. Perpetual-task results only reach the store
/// when the handler's perpetual-task capability is enabled for the account.
#[derive(Clone)]
pub struct SyncFlowGate {
    feature_flags: Arc<dyn FeatureFlagService>,
}

impl SyncFlowGate {
    pub fn new(feature_flags: Arc<dyn FeatureFlagService>) -> Self {
        SyncFlowGate { feature_flags }
    }

    pub fn can_update_instances_in_db(
        &self,
        flow: SyncFlow,
        account_id: &str,
        perpetual_task_feature: FeatureName,
    ) -> bool {
        match flow {
            SyncFlow::Manual | SyncFlow::Iterator | SyncFlow::NewDeployment => true,
            SyncFlow::PerpetualTask => self
                .feature_flags
                .is_enabled(perpetual_task_feature, account_id),
        }
    }
}
