use std::collections::HashMap;
use std::env;

use anyhow::Context;
use async_trait::async_trait;
use instance_defs::{
    AutoScalingClient, ContainerClient, DeploymentEvent, Ec2Instance, EcsTask, InfraMapping,
    InstanceRecord, K8sPod, LambdaClient, LambdaFunction, PcfAppInstance, PcfClient,
};
use instance_utils::is_blank;
use log::{info, warn};
use serde::Deserialize;

pub const SNAPSHOT_PATH_ENV: &str = "RECONCILER_SNAPSHOT";

/// Everything one reconciler run works from: the registered infra mappings,
/// the tracked instances, and what the providers currently report.
#[derive(Deserialize, Debug, Default)]
pub struct Snapshot {
    /// Epoch millis at which the provider state was captured.
    #[serde(default)]
    pub taken_at: Option<i64>,
    #[serde(default)]
    pub infra_mappings: Vec<InfraMapping>,
    #[serde(default)]
    pub instances: Vec<InstanceRecord>,
    #[serde(default)]
    pub providers: SnapshotProviders,
    #[serde(default)]
    pub deployment_events: Vec<DeploymentEvent>,
}

impl Snapshot {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, anyhow::Error> {
        let mut snapshot: Snapshot =
            serde_yaml::from_str(yaml).context("Failed to parse provider snapshot")?;
        snapshot.infra_mappings.retain(|mapping| {
            let usable = !is_blank(Some(mapping.id.as_str()))
                && !is_blank(Some(mapping.account_id.as_str()));
            if !usable {
                warn!("Ignoring infra mapping without id or account: {:?}", mapping);
            }
            usable
        });
        Ok(snapshot)
    }

    pub fn load() -> Result<Self, anyhow::Error> {
        let path = env::var(SNAPSHOT_PATH_ENV)
            .with_context(|| format!("{} must name a provider snapshot file", SNAPSHOT_PATH_ENV))?;
        info!("Loading provider snapshot from {}", path);
        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read provider snapshot {}", path))?;
        Snapshot::from_yaml_str(&contents)
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct EcsServiceSnapshot {
    pub cluster_name: String,
    pub service_name: String,
    #[serde(default)]
    pub tasks: Vec<EcsTask>,
}

/// Provider state as captured in the snapshot. Resources missing from it
/// are reported as gone.
#[derive(Deserialize, Debug, Default)]
pub struct SnapshotProviders {
    #[serde(default)]
    pub auto_scaling_groups: HashMap<String, Vec<Ec2Instance>>,
    #[serde(default)]
    pub ecs_services: Vec<EcsServiceSnapshot>,
    #[serde(default)]
    pub pods: Vec<K8sPod>,
    #[serde(default)]
    pub pcf_apps: HashMap<String, Vec<PcfAppInstance>>,
    #[serde(default)]
    pub functions: HashMap<String, LambdaFunction>,
}

#[async_trait]
impl AutoScalingClient for SnapshotProviders {
    async fn describe_auto_scaling_group_instances(
        &self,
        _infra_mapping: &InfraMapping,
        auto_scaling_group_name: &str,
    ) -> Result<Option<Vec<Ec2Instance>>, anyhow::Error> {
        Ok(self.auto_scaling_groups.get(auto_scaling_group_name).cloned())
    }
}

#[async_trait]
impl ContainerClient for SnapshotProviders {
    async fn list_ecs_service_tasks(
        &self,
        _infra_mapping: &InfraMapping,
        cluster_name: &str,
        service_name: &str,
    ) -> Result<Option<Vec<EcsTask>>, anyhow::Error> {
        Ok(self
            .ecs_services
            .iter()
            .find(|s| s.cluster_name == cluster_name && s.service_name == service_name)
            .map(|s| s.tasks.clone()))
    }

    async fn list_release_pods(
        &self,
        _infra_mapping: &InfraMapping,
        namespace: &str,
        release_name: Option<&str>,
    ) -> Result<Vec<K8sPod>, anyhow::Error> {
        Ok(self
            .pods
            .iter()
            .filter(|pod| pod.namespace == namespace)
            .filter(|pod| release_name.is_none() || pod.release_name.as_deref() == release_name)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl PcfClient for SnapshotProviders {
    async fn get_application_instances(
        &self,
        _infra_mapping: &InfraMapping,
        application_name: &str,
    ) -> Result<Option<Vec<PcfAppInstance>>, anyhow::Error> {
        Ok(self.pcf_apps.get(application_name).cloned())
    }
}

#[async_trait]
impl LambdaClient for SnapshotProviders {
    async fn get_function(
        &self,
        _infra_mapping: &InfraMapping,
        function_name: &str,
    ) -> Result<Option<LambdaFunction>, anyhow::Error> {
        Ok(self.functions.get(function_name).cloned())
    }
}
