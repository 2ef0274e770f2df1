use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InfraMappingType {
    PhysicalDataCenterSsh,
    AwsSsh,
    AwsAmi,
    AwsAmiLaunchTemplate,
    AwsEcs,
    AwsCodeDeploy,
    AwsAwsLambda,
    DirectKubernetes,
    GcpKubernetes,
    AzureKubernetes,
    AzureVmss,
    AzureWebApp,
    PcfPcf,
}

impl InfraMappingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InfraMappingType::PhysicalDataCenterSsh => "PHYSICAL_DATA_CENTER_SSH",
            InfraMappingType::AwsSsh => "AWS_SSH",
            InfraMappingType::AwsAmi => "AWS_AMI",
            InfraMappingType::AwsAmiLaunchTemplate => "AWS_AMI_LAUNCH_TEMPLATE",
            InfraMappingType::AwsEcs => "AWS_ECS",
            InfraMappingType::AwsCodeDeploy => "AWS_CODE_DEPLOY",
            InfraMappingType::AwsAwsLambda => "AWS_AWS_LAMBDA",
            InfraMappingType::DirectKubernetes => "DIRECT_KUBERNETES",
            InfraMappingType::GcpKubernetes => "GCP_KUBERNETES",
            InfraMappingType::AzureKubernetes => "AZURE_KUBERNETES",
            InfraMappingType::AzureVmss => "AZURE_VMSS",
            InfraMappingType::AzureWebApp => "AZURE_WEB_APP",
            InfraMappingType::PcfPcf => "PCF_PCF",
        }
    }

    pub fn is_kubernetes(&self) -> bool {
        matches!(
            self,
            InfraMappingType::DirectKubernetes
                | InfraMappingType::GcpKubernetes
                | InfraMappingType::AzureKubernetes
        )
    }
}

impl fmt::Display for InfraMappingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Binding of one application service to an infrastructure target.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct InfraMapping {
    pub id: String,
    pub account_id: String,
    pub app_id: String,
    #[serde(default)]
    pub env_id: String,
    #[serde(default)]
    pub service_id: String,
    pub infra_mapping_type: InfraMappingType,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub cluster_name: Option<String>,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
}

impl InfraMapping {
    /// Key under which passes for this mapping are serialized.
    pub fn lock_key(&self) -> String {
        format!("{}:{}", self.account_id, self.id)
    }
}
