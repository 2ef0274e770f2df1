use std::sync::Arc;

use instance_defs::{
    DeploymentSummary, FeatureFlagService, FeatureName, InfraMapping, PerpetualTaskClient,
    PerpetualTaskRecord, Status, SyncError,
};
use log::{debug, info};

/// Creates, deletes and resets the out-of-band sync tasks of infra mappings.
#[derive(Clone)]
pub struct PerpetualTaskLifecycle {
    client: Arc<dyn PerpetualTaskClient>,
    feature_flags: Arc<dyn FeatureFlagService>,
}

impl PerpetualTaskLifecycle {
    pub fn new(
        client: Arc<dyn PerpetualTaskClient>,
        feature_flags: Arc<dyn FeatureFlagService>,
    ) -> Self {
        PerpetualTaskLifecycle {
            client,
            feature_flags,
        }
    }

    fn enabled(&self, infra_mapping: &InfraMapping, feature: FeatureName) -> bool {
        self.feature_flags
            .is_enabled(feature, &infra_mapping.account_id)
    }

    async fn has_tasks(&self, infra_mapping: &InfraMapping) -> Result<bool, SyncError> {
        let tasks = self
            .client
            .list_tasks(&infra_mapping.account_id, &infra_mapping.id)
            .await?;
        Ok(!tasks.is_empty())
    }

    pub async fn get_task(&self, task_id: &str) -> Result<Option<PerpetualTaskRecord>, SyncError> {
        Ok(self.client.get_task(task_id).await?)
    }

    /// Reacts to the tracked instance count moving across zero.
    pub async fn on_instance_count_change(
        &self,
        infra_mapping: &InfraMapping,
        feature: FeatureName,
        before: u64,
        after: u64,
    ) -> Result<(), SyncError> {
        if !self.enabled(infra_mapping, feature) {
            return Ok(());
        }
        if before == 0 && after > 0 {
            if !self.has_tasks(infra_mapping).await? {
                let ids = self.client.create_perpetual_tasks(infra_mapping).await?;
                info!(
                    "Created perpetual tasks {:?} for infra mapping {}",
                    ids, infra_mapping.id
                );
            }
        } else if before > 0 && after == 0 {
            self.delete_perpetual_tasks(&infra_mapping.account_id, &infra_mapping.id)
                .await?;
        }
        Ok(())
    }

    pub async fn create_for_new_deployment_if_enabled(
        &self,
        infra_mapping: &InfraMapping,
        feature: FeatureName,
        deployment_summaries: &[DeploymentSummary],
    ) -> Result<Vec<String>, SyncError> {
        if !self.enabled(infra_mapping, feature) {
            debug!(
                "{:?} is disabled for account {}, not creating perpetual tasks",
                feature, infra_mapping.account_id
            );
            return Ok(vec![]);
        }
        if self.has_tasks(infra_mapping).await? {
            return Ok(vec![]);
        }
        let ids = self
            .client
            .create_perpetual_tasks_for_new_deployment(infra_mapping, deployment_summaries)
            .await?;
        info!(
            "Created perpetual tasks {:?} for new deployment on infra mapping {}",
            ids, infra_mapping.id
        );
        Ok(ids)
    }

    /// Deletes leftover tasks once the account no longer syncs through them.
    pub async fn fall_back_to_iterator_if_disabled(
        &self,
        infra_mapping: &InfraMapping,
        feature: FeatureName,
    ) -> Result<bool, SyncError> {
        if self.enabled(infra_mapping, feature) || !self.has_tasks(infra_mapping).await? {
            return Ok(false);
        }
        info!(
            "{:?} disabled for account {}, falling back to iterator sync for infra mapping {}",
            feature, infra_mapping.account_id, infra_mapping.id
        );
        self.delete_perpetual_tasks(&infra_mapping.account_id, &infra_mapping.id)
            .await
    }

    pub async fn delete_perpetual_tasks(
        &self,
        account_id: &str,
        infra_mapping_id: &str,
    ) -> Result<bool, SyncError> {
        let deleted = self
            .client
            .delete_perpetual_tasks(account_id, infra_mapping_id)
            .await?;
        info!(
            "Deleted perpetual tasks of infra mapping {}: {}",
            infra_mapping_id, deleted
        );
        Ok(deleted)
    }

    /// Applies a reported status: a retryable failure resets the task, a
    /// final status removes the tasks of the mapping.
    pub async fn handle_status(
        &self,
        task: &PerpetualTaskRecord,
        status: &Status,
    ) -> Result<(), SyncError> {
        let params = &task.client_params;
        if !status.success && status.retryable {
            info!(
                "Resetting perpetual task {} after failure: {}",
                task.task_id,
                status.error_message.as_deref().unwrap_or("unknown error")
            );
            self.client
                .reset_perpetual_task(&params.account_id, &task.task_id)
                .await?;
        } else if !status.retryable {
            self.delete_perpetual_tasks(&params.account_id, &params.infra_mapping_id)
                .await?;
        }
        Ok(())
    }
}
