use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::instance::K8sContainerInfo;
use crate::InfraMapping;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Ec2Instance {
    pub instance_id: String,
    pub private_dns_name: String,
    #[serde(default)]
    pub public_dns_name: Option<String>,
    #[serde(default)]
    pub launched_at: i64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct EcsTask {
    pub task_arn: String,
    #[serde(default)]
    pub task_definition_arn: String,
    #[serde(default)]
    pub started_at: i64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct K8sPod {
    pub name: String,
    pub namespace: String,
    #[serde(default)]
    pub release_name: Option<String>,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub containers: Vec<K8sContainerInfo>,
    #[serde(default)]
    pub blue_green_color: Option<String>,
    #[serde(default)]
    pub created_at: i64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PcfAppInstance {
    pub application_guid: String,
    pub application_name: String,
    pub instance_index: u32,
    #[serde(default)]
    pub organization: String,
    #[serde(default)]
    pub space: String,
    #[serde(default)]
    pub started_at: i64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LambdaFunction {
    pub function_name: String,
    pub version: String,
    #[serde(default)]
    pub function_arn: String,
    #[serde(default)]
    pub runtime: Option<String>,
    #[serde(default)]
    pub last_modified: Option<String>,
}

// Read-only provider clients. A `None` result means the queried resource no
// longer exists, an `Err` means its state could not be observed.

#[async_trait]
pub trait AutoScalingClient: Send + Sync {
    async fn describe_auto_scaling_group_instances(
        &self,
        infra_mapping: &InfraMapping,
        auto_scaling_group_name: &str,
    ) -> Result<Option<Vec<Ec2Instance>>, anyhow::Error>;
}

#[async_trait]
pub trait ContainerClient: Send + Sync {
    async fn list_ecs_service_tasks(
        &self,
        infra_mapping: &InfraMapping,
        cluster_name: &str,
        service_name: &str,
    ) -> Result<Option<Vec<EcsTask>>, anyhow::Error>;

    async fn list_release_pods(
        &self,
        infra_mapping: &InfraMapping,
        namespace: &str,
        release_name: Option<&str>,
    ) -> Result<Vec<K8sPod>, anyhow::Error>;
}

#[async_trait]
pub trait PcfClient: Send + Sync {
    async fn get_application_instances(
        &self,
        infra_mapping: &InfraMapping,
        application_name: &str,
    ) -> Result<Option<Vec<PcfAppInstance>>, anyhow::Error>;
}

#[async_trait]
pub trait LambdaClient: Send + Sync {
    async fn get_function(
        &self,
        infra_mapping: &InfraMapping,
        function_name: &str,
    ) -> Result<Option<LambdaFunction>, anyhow::Error>;
}
