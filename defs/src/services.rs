use std::time::Duration;

use async_trait::async_trait;

use crate::{DeploymentEvent, DeploymentSummary, FeatureName, InfraMapping, PerpetualTaskRecord};

pub trait FeatureFlagService: Send + Sync {
    fn is_enabled(&self, feature: FeatureName, account_id: &str) -> bool;
    fn is_global_enabled(&self, feature: FeatureName) -> bool;
}

#[async_trait]
pub trait PerpetualTaskClient: Send + Sync {
    async fn create_perpetual_tasks(
        &self,
        infra_mapping: &InfraMapping,
    ) -> Result<Vec<String>, anyhow::Error>;
    async fn create_perpetual_tasks_for_new_deployment(
        &self,
        infra_mapping: &InfraMapping,
        deployment_summaries: &[DeploymentSummary],
    ) -> Result<Vec<String>, anyhow::Error>;
    async fn delete_perpetual_tasks(
        &self,
        account_id: &str,
        infra_mapping_id: &str,
    ) -> Result<bool, anyhow::Error>;
    async fn reset_perpetual_task(
        &self,
        account_id: &str,
        task_id: &str,
    ) -> Result<bool, anyhow::Error>;
    async fn get_task(&self, task_id: &str) -> Result<Option<PerpetualTaskRecord>, anyhow::Error>;
    async fn list_tasks(
        &self,
        account_id: &str,
        infra_mapping_id: &str,
    ) -> Result<Vec<PerpetualTaskRecord>, anyhow::Error>;
}

#[async_trait]
pub trait DeploymentEventPublisher: Send + Sync {
    async fn publish(&self, event: DeploymentEvent) -> Result<(), anyhow::Error>;
}

/// Expiring, exclusive leases keyed by `account:infra_mapping`.
///
/// Every write of a sync pass happens under a lease. A holder that stops
/// renewing loses the lease once it expires and must not write afterwards.
#[async_trait]
pub trait SyncLocker: Send + Sync {
    /// Takes the lease when it is free or expired and returns the holder token.
    async fn try_acquire(&self, key: &str, lease: Duration)
        -> Result<Option<String>, anyhow::Error>;
    /// Extends the lease held under `token`. Returns false once another
    /// holder has taken it over.
    async fn renew(&self, key: &str, token: &str, lease: Duration) -> Result<bool, anyhow::Error>;
    async fn release(&self, key: &str, token: &str) -> Result<(), anyhow::Error>;
}
