use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::{DeploymentKey, DeploymentSummary, InfraMapping, InstanceRecord};

#[async_trait]
pub trait InstanceStore: Send + Sync {
    /// Non-deleted records tracked for the pair.
    async fn get_instances_for_app_and_infra_mapping(
        &self,
        app_id: &str,
        infra_mapping_id: &str,
    ) -> Result<Vec<InstanceRecord>, anyhow::Error>;
    async fn save(&self, instance: InstanceRecord) -> Result<InstanceRecord, anyhow::Error>;
    async fn save_or_update(&self, instance: InstanceRecord)
        -> Result<InstanceRecord, anyhow::Error>;
    async fn delete(&self, instance_ids: &BTreeSet<String>) -> Result<bool, anyhow::Error>;
    async fn get_instance_count(
        &self,
        app_id: &str,
        infra_mapping_id: &str,
    ) -> Result<u64, anyhow::Error>;
}

#[async_trait]
pub trait DeploymentSummaryStore: Send + Sync {
    async fn save(&self, summary: DeploymentSummary) -> Result<DeploymentSummary, anyhow::Error>;
    /// Summaries with an equal key for the mapping, oldest first.
    async fn get_with_deployment_key(
        &self,
        account_id: &str,
        infra_mapping_id: &str,
        deployment_key: &DeploymentKey,
    ) -> Result<Vec<DeploymentSummary>, anyhow::Error>;
}

#[async_trait]
pub trait InfraMappingStore: Send + Sync {
    async fn get(
        &self,
        app_id: &str,
        infra_mapping_id: &str,
    ) -> Result<Option<InfraMapping>, anyhow::Error>;
    async fn list(&self) -> Result<Vec<InfraMapping>, anyhow::Error>;
}
