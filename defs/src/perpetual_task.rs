use serde::{Deserialize, Serialize};

use crate::provider::{Ec2Instance, EcsTask, K8sPod, LambdaFunction, PcfAppInstance};

/// Correlation data stored with every perpetual task.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PerpetualTaskClientParams {
    pub account_id: String,
    pub app_id: String,
    pub infra_mapping_id: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PerpetualTaskRecord {
    pub task_id: String,
    pub client_params: PerpetualTaskClientParams,
    #[serde(default)]
    pub created_at: i64,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandExecutionStatus {
    Success,
    Failure,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorKind {
    Transient,
    NotFound,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ProviderError {
    pub kind: ProviderErrorKind,
    pub message: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AwsAmiSyncResponse {
    pub auto_scaling_group_name: String,
    #[serde(default)]
    pub instances: Vec<Ec2Instance>,
    #[serde(default = "default_true")]
    pub auto_scaling_group_exists: bool,
    pub status: CommandExecutionStatus,
    #[serde(default)]
    pub error: Option<ProviderError>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct EcsSyncResponse {
    pub cluster_name: String,
    pub service_name: String,
    #[serde(default)]
    pub tasks: Vec<EcsTask>,
    #[serde(default = "default_true")]
    pub service_exists: bool,
    pub status: CommandExecutionStatus,
    #[serde(default)]
    pub error: Option<ProviderError>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct K8sSyncResponse {
    pub namespace: String,
    #[serde(default)]
    pub release_name: Option<String>,
    #[serde(default)]
    pub cluster_name: Option<String>,
    #[serde(default)]
    pub pods: Vec<K8sPod>,
    pub status: CommandExecutionStatus,
    #[serde(default)]
    pub error: Option<ProviderError>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PcfSyncResponse {
    pub application_name: String,
    #[serde(default)]
    pub instances: Vec<PcfAppInstance>,
    #[serde(default = "default_true")]
    pub application_exists: bool,
    pub status: CommandExecutionStatus,
    #[serde(default)]
    pub error: Option<ProviderError>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AwsLambdaSyncResponse {
    pub function_name: String,
    #[serde(default)]
    pub function: Option<LambdaFunction>,
    pub status: CommandExecutionStatus,
    #[serde(default)]
    pub error: Option<ProviderError>,
}

/// Live state fetched out of band by a perpetual task.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum InstanceSyncResponse {
    AwsAmi(AwsAmiSyncResponse),
    Ecs(EcsSyncResponse),
    K8s(K8sSyncResponse),
    Pcf(PcfSyncResponse),
    AwsLambda(AwsLambdaSyncResponse),
}

impl InstanceSyncResponse {
    pub fn status(&self) -> CommandExecutionStatus {
        match self {
            InstanceSyncResponse::AwsAmi(r) => r.status,
            InstanceSyncResponse::Ecs(r) => r.status,
            InstanceSyncResponse::K8s(r) => r.status,
            InstanceSyncResponse::Pcf(r) => r.status,
            InstanceSyncResponse::AwsLambda(r) => r.status,
        }
    }

    pub fn error(&self) -> Option<&ProviderError> {
        match self {
            InstanceSyncResponse::AwsAmi(r) => r.error.as_ref(),
            InstanceSyncResponse::Ecs(r) => r.error.as_ref(),
            InstanceSyncResponse::K8s(r) => r.error.as_ref(),
            InstanceSyncResponse::Pcf(r) => r.error.as_ref(),
            InstanceSyncResponse::AwsLambda(r) => r.error.as_ref(),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.status() == CommandExecutionStatus::Failure
    }

    pub fn error_message(&self) -> String {
        self.error()
            .map(|e| e.message.clone())
            .unwrap_or_else(|| "perpetual task reported failure".to_string())
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            InstanceSyncResponse::AwsAmi(_) => "AwsAmiSyncResponse",
            InstanceSyncResponse::Ecs(_) => "EcsSyncResponse",
            InstanceSyncResponse::K8s(_) => "K8sSyncResponse",
            InstanceSyncResponse::Pcf(_) => "PcfSyncResponse",
            InstanceSyncResponse::AwsLambda(_) => "AwsLambdaSyncResponse",
        }
    }
}

fn default_true() -> bool {
    true
}
