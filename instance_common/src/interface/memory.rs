use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use instance_defs::{
    DeploymentKey, DeploymentSummary, DeploymentSummaryStore, InfraMapping, InfraMappingStore,
    InstanceRecord, InstanceStore, PerpetualTaskClient, PerpetualTaskClientParams,
    PerpetualTaskRecord,
};
use instance_utils::{get_epoch, new_id};
use tokio::sync::RwLock;

/// Instance store backed by a map, counting every write it receives.
#[derive(Debug, Default)]
pub struct InMemoryInstanceStore {
    instances: RwLock<BTreeMap<String, InstanceRecord>>,
    writes: AtomicU64,
}

impl InMemoryInstanceStore {
    pub async fn insert_all(&self, records: Vec<InstanceRecord>) {
        let mut instances = self.instances.write().await;
        for record in records {
            instances.insert(record.id.clone(), record);
        }
    }

    /// Every record, soft-deleted ones included.
    pub async fn all(&self) -> Vec<InstanceRecord> {
        self.instances.read().await.values().cloned().collect()
    }

    pub async fn get(&self, id: &str) -> Option<InstanceRecord> {
        self.instances.read().await.get(id).cloned()
    }

    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InstanceStore for InMemoryInstanceStore {
    async fn get_instances_for_app_and_infra_mapping(
        &self,
        app_id: &str,
        infra_mapping_id: &str,
    ) -> Result<Vec<InstanceRecord>, anyhow::Error> {
        Ok(self
            .instances
            .read()
            .await
            .values()
            .filter(|r| !r.is_deleted && r.app_id == app_id && r.infra_mapping_id == infra_mapping_id)
            .cloned()
            .collect())
    }

    async fn save(&self, instance: InstanceRecord) -> Result<InstanceRecord, anyhow::Error> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut instances = self.instances.write().await;
        if instances.contains_key(&instance.id) {
            return Err(anyhow::anyhow!("Instance {} already exists", instance.id));
        }
        instances.insert(instance.id.clone(), instance.clone());
        Ok(instance)
    }

    async fn save_or_update(&self, instance: InstanceRecord) -> Result<InstanceRecord, anyhow::Error> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.instances
            .write()
            .await
            .insert(instance.id.clone(), instance.clone());
        Ok(instance)
    }

    async fn delete(&self, instance_ids: &BTreeSet<String>) -> Result<bool, anyhow::Error> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let now = get_epoch();
        let mut instances = self.instances.write().await;
        let mut deleted = true;
        for id in instance_ids {
            match instances.get_mut(id) {
                Some(record) if !record.is_deleted => {
                    record.is_deleted = true;
                    record.deleted_at = Some(now);
                }
                _ => deleted = false,
            }
        }
        Ok(deleted)
    }

    async fn get_instance_count(
        &self,
        app_id: &str,
        infra_mapping_id: &str,
    ) -> Result<u64, anyhow::Error> {
        Ok(self
            .get_instances_for_app_and_infra_mapping(app_id, infra_mapping_id)
            .await?
            .len() as u64)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryDeploymentSummaryStore {
    summaries: RwLock<Vec<DeploymentSummary>>,
}

impl InMemoryDeploymentSummaryStore {
    pub async fn all(&self) -> Vec<DeploymentSummary> {
        self.summaries.read().await.clone()
    }
}

#[async_trait]
impl DeploymentSummaryStore for InMemoryDeploymentSummaryStore {
    async fn save(&self, mut summary: DeploymentSummary) -> Result<DeploymentSummary, anyhow::Error> {
        let mut summaries = self.summaries.write().await;
        // Redelivered events write the same summary again.
        let existing = summaries.iter_mut().find(|s| {
            s.infra_mapping_id == summary.infra_mapping_id
                && s.workflow_execution_id == summary.workflow_execution_id
                && s.state_execution_instance_id == summary.state_execution_instance_id
                && s.deployment_key == summary.deployment_key
        });
        match existing {
            Some(existing) => {
                summary.id = existing.id.clone();
                *existing = summary.clone();
            }
            None => {
                summary.id = Some(summary.id.clone().unwrap_or_else(new_id));
                summaries.push(summary.clone());
            }
        }
        Ok(summary)
    }

    async fn get_with_deployment_key(
        &self,
        account_id: &str,
        infra_mapping_id: &str,
        deployment_key: &DeploymentKey,
    ) -> Result<Vec<DeploymentSummary>, anyhow::Error> {
        Ok(self
            .summaries
            .read()
            .await
            .iter()
            .filter(|s| {
                s.account_id == account_id
                    && s.infra_mapping_id == infra_mapping_id
                    && s.deployment_key.as_ref() == Some(deployment_key)
            })
            .cloned()
            .collect())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryInfraMappingStore {
    mappings: RwLock<BTreeMap<String, InfraMapping>>,
}

impl InMemoryInfraMappingStore {
    pub async fn insert(&self, infra_mapping: InfraMapping) {
        self.mappings
            .write()
            .await
            .insert(infra_mapping.id.clone(), infra_mapping);
    }

    pub async fn remove(&self, infra_mapping_id: &str) -> Option<InfraMapping> {
        self.mappings.write().await.remove(infra_mapping_id)
    }
}

#[async_trait]
impl InfraMappingStore for InMemoryInfraMappingStore {
    async fn get(
        &self,
        app_id: &str,
        infra_mapping_id: &str,
    ) -> Result<Option<InfraMapping>, anyhow::Error> {
        Ok(self
            .mappings
            .read()
            .await
            .get(infra_mapping_id)
            .filter(|m| m.app_id == app_id)
            .cloned())
    }

    async fn list(&self) -> Result<Vec<InfraMapping>, anyhow::Error> {
        Ok(self.mappings.read().await.values().cloned().collect())
    }
}

/// Perpetual-task client that only records what was requested.
#[derive(Debug, Default)]
pub struct InMemoryPerpetualTaskClient {
    tasks: RwLock<BTreeMap<String, PerpetualTaskRecord>>,
    resets: Mutex<Vec<String>>,
}

impl InMemoryPerpetualTaskClient {
    pub fn resets(&self) -> Vec<String> {
        match self.resets.lock() {
            Ok(resets) => resets.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    async fn create(&self, infra_mapping: &InfraMapping) -> Vec<String> {
        let task = PerpetualTaskRecord {
            task_id: new_id(),
            client_params: PerpetualTaskClientParams {
                account_id: infra_mapping.account_id.clone(),
                app_id: infra_mapping.app_id.clone(),
                infra_mapping_id: infra_mapping.id.clone(),
            },
            created_at: get_epoch(),
        };
        let id = task.task_id.clone();
        self.tasks.write().await.insert(id.clone(), task);
        vec![id]
    }
}

#[async_trait]
impl PerpetualTaskClient for InMemoryPerpetualTaskClient {
    async fn create_perpetual_tasks(
        &self,
        infra_mapping: &InfraMapping,
    ) -> Result<Vec<String>, anyhow::Error> {
        Ok(self.create(infra_mapping).await)
    }

    async fn create_perpetual_tasks_for_new_deployment(
        &self,
        infra_mapping: &InfraMapping,
        _deployment_summaries: &[DeploymentSummary],
    ) -> Result<Vec<String>, anyhow::Error> {
        Ok(self.create(infra_mapping).await)
    }

    async fn delete_perpetual_tasks(
        &self,
        account_id: &str,
        infra_mapping_id: &str,
    ) -> Result<bool, anyhow::Error> {
        let mut tasks = self.tasks.write().await;
        let before = tasks.len();
        tasks.retain(|_, task| {
            task.client_params.account_id != account_id
                || task.client_params.infra_mapping_id != infra_mapping_id
        });
        Ok(tasks.len() < before)
    }

    async fn reset_perpetual_task(
        &self,
        _account_id: &str,
        task_id: &str,
    ) -> Result<bool, anyhow::Error> {
        let exists = self.tasks.read().await.contains_key(task_id);
        if exists {
            match self.resets.lock() {
                Ok(mut resets) => resets.push(task_id.to_string()),
                Err(poisoned) => poisoned.into_inner().push(task_id.to_string()),
            }
        }
        Ok(exists)
    }

    async fn get_task(&self, task_id: &str) -> Result<Option<PerpetualTaskRecord>, anyhow::Error> {
        Ok(self.tasks.read().await.get(task_id).cloned())
    }

    async fn list_tasks(
        &self,
        account_id: &str,
        infra_mapping_id: &str,
    ) -> Result<Vec<PerpetualTaskRecord>, anyhow::Error> {
        Ok(self
            .tasks
            .read()
            .await
            .values()
            .filter(|task| {
                task.client_params.account_id == account_id
                    && task.client_params.infra_mapping_id == infra_mapping_id
            })
            .cloned()
            .collect())
    }
}
