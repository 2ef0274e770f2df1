use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::SyncError;
use crate::instance::HelmChartInfo;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AwsAmiDeploymentInfo {
    pub auto_scaling_group_name: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ContainerDeploymentInfoWithNames {
    pub cluster_name: String,
    pub container_svc_name: String,
    #[serde(default)]
    pub unique_name_identifier: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ContainerDeploymentInfoWithLabels {
    pub cluster_name: String,
    pub namespace: String,
    #[serde(default)]
    pub release_name: Option<String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub new_version: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct K8sDeploymentInfo {
    pub namespace: String,
    #[serde(default)]
    pub namespaces: Vec<String>,
    pub release_name: String,
    #[serde(default)]
    pub release_number: u32,
    #[serde(default)]
    pub cluster_name: Option<String>,
    #[serde(default)]
    pub blue_green_stage_color: Option<String>,
    #[serde(default)]
    pub helm_chart: Option<HelmChartInfo>,
}

impl K8sDeploymentInfo {
    /// All namespaces touched by the deployment, primary namespace first.
    pub fn all_namespaces(&self) -> Vec<String> {
        let mut namespaces = vec![self.namespace.clone()];
        for namespace in &self.namespaces {
            if !namespaces.contains(namespace) {
                namespaces.push(namespace.clone());
            }
        }
        namespaces
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PcfDeploymentInfo {
    pub application_name: String,
    #[serde(default)]
    pub application_guid: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AwsLambdaDeploymentInfo {
    pub function_name: String,
    pub version: String,
    #[serde(default)]
    pub function_arn: String,
}

/// Provider-specific description of what a deployment targeted.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum DeploymentInfo {
    AwsAmi(AwsAmiDeploymentInfo),
    ContainerWithNames(ContainerDeploymentInfoWithNames),
    ContainerWithLabels(ContainerDeploymentInfoWithLabels),
    K8s(K8sDeploymentInfo),
    Pcf(PcfDeploymentInfo),
    AwsLambda(AwsLambdaDeploymentInfo),
}

impl DeploymentInfo {
    pub fn type_name(&self) -> &'static str {
        match self {
            DeploymentInfo::AwsAmi(_) => "AwsAmiDeploymentInfo",
            DeploymentInfo::ContainerWithNames(_) => "ContainerDeploymentInfoWithNames",
            DeploymentInfo::ContainerWithLabels(_) => "ContainerDeploymentInfoWithLabels",
            DeploymentInfo::K8s(_) => "K8sDeploymentInfo",
            DeploymentInfo::Pcf(_) => "PcfDeploymentInfo",
            DeploymentInfo::AwsLambda(_) => "AwsLambdaDeploymentInfo",
        }
    }
}

/// "What was deployed where", used to find the deployment a rollback returns to.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(tag = "type")]
pub enum DeploymentKey {
    AwsAmi {
        auto_scaling_group_name: String,
    },
    Container {
        container_service_name: Option<String>,
        #[serde(default)]
        labels: BTreeMap<String, String>,
        #[serde(default)]
        new_version: Option<String>,
    },
    K8s {
        release_name: String,
        release_number: u32,
    },
    Pcf {
        application_name: String,
    },
    AwsLambda {
        function_name: String,
        version: String,
    },
}

impl DeploymentKey {
    pub fn type_name(&self) -> &'static str {
        match self {
            DeploymentKey::AwsAmi { .. } => "AwsAmiDeploymentKey",
            DeploymentKey::Container { .. } => "ContainerDeploymentKey",
            DeploymentKey::K8s { .. } => "K8sDeploymentKey",
            DeploymentKey::Pcf { .. } => "PcfDeploymentKey",
            DeploymentKey::AwsLambda { .. } => "AwsLambdaDeploymentKey",
        }
    }

    pub fn fits(&self, info: &DeploymentInfo) -> bool {
        matches!(
            (self, info),
            (DeploymentKey::AwsAmi { .. }, DeploymentInfo::AwsAmi(_))
                | (
                    DeploymentKey::Container { .. },
                    DeploymentInfo::ContainerWithNames(_) | DeploymentInfo::ContainerWithLabels(_)
                )
                | (DeploymentKey::K8s { .. }, DeploymentInfo::K8s(_))
                | (DeploymentKey::Pcf { .. }, DeploymentInfo::Pcf(_))
                | (DeploymentKey::AwsLambda { .. }, DeploymentInfo::AwsLambda(_))
        )
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DeploymentSummary {
    #[serde(default)]
    pub id: Option<String>,
    pub account_id: String,
    pub app_id: String,
    pub infra_mapping_id: String,
    pub workflow_execution_id: String,
    #[serde(default)]
    pub workflow_execution_name: Option<String>,
    #[serde(default)]
    pub state_execution_instance_id: Option<String>,
    #[serde(default)]
    pub artifact_id: Option<String>,
    #[serde(default)]
    pub artifact_name: Option<String>,
    #[serde(default)]
    pub artifact_build_num: Option<String>,
    #[serde(default)]
    pub deployed_by: Option<String>,
    #[serde(default)]
    pub deployed_at: i64,
    pub deployment_info: DeploymentInfo,
    #[serde(default)]
    pub deployment_key: Option<DeploymentKey>,
}

impl DeploymentSummary {
    /// Attaches a deployment key, rejecting keys of a different provider shape.
    pub fn set_deployment_key(&mut self, key: DeploymentKey) -> Result<(), SyncError> {
        if !key.fits(&self.deployment_info) {
            return Err(SyncError::MalformedDeploymentKey {
                key_type: key.type_name().to_string(),
                info_type: self.deployment_info.type_name().to_string(),
            });
        }
        self.deployment_key = Some(key);
        Ok(())
    }

    pub fn copy_artifact_from(&mut self, previous: &DeploymentSummary) {
        self.artifact_id = previous.artifact_id.clone();
        self.artifact_name = previous.artifact_name.clone();
        self.artifact_build_num = previous.artifact_build_num.clone();
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct OnDemandRollbackInfo {
    pub on_demand_rollback: bool,
    #[serde(default)]
    pub rollback_execution_id: Option<String>,
}

/// Message published after a deployment finishes, consumed at least once.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DeploymentEvent {
    pub deployment_summaries: Vec<DeploymentSummary>,
    #[serde(default)]
    pub is_rollback: bool,
    #[serde(default)]
    pub on_demand_rollback_info: Option<OnDemandRollbackInfo>,
    #[serde(default)]
    pub retries: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn lambda_summary() -> DeploymentSummary {
        DeploymentSummary {
            id: None,
            account_id: "acc".to_string(),
            app_id: "app".to_string(),
            infra_mapping_id: "im".to_string(),
            workflow_execution_id: "we-1".to_string(),
            workflow_execution_name: None,
            state_execution_instance_id: None,
            artifact_id: None,
            artifact_name: None,
            artifact_build_num: None,
            deployed_by: None,
            deployed_at: 0,
            deployment_info: DeploymentInfo::AwsLambda(AwsLambdaDeploymentInfo {
                function_name: "fn".to_string(),
                version: "3".to_string(),
                function_arn: String::new(),
            }),
            deployment_key: None,
        }
    }

    #[test]
    fn test_set_matching_deployment_key() {
        let mut summary = lambda_summary();
        let key = DeploymentKey::AwsLambda {
            function_name: "fn".to_string(),
            version: "3".to_string(),
        };
        summary.set_deployment_key(key.clone()).unwrap();
        assert_eq!(summary.deployment_key, Some(key));
    }

    #[test]
    fn test_set_mismatched_deployment_key_fails() {
        let mut summary = lambda_summary();
        let result = summary.set_deployment_key(DeploymentKey::Pcf {
            application_name: "app".to_string(),
        });
        match result {
            Err(SyncError::MalformedDeploymentKey { key_type, info_type }) => {
                assert_eq!(key_type, "PcfDeploymentKey");
                assert_eq!(info_type, "AwsLambdaDeploymentInfo");
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(summary.deployment_key, None);
    }

    #[test]
    fn test_deployment_info_from_yaml() {
        let yaml = r#"
type: K8s
namespace: default
namespaces: [default, canary]
release_name: web
release_number: 4
"#;
        let info: DeploymentInfo = serde_yaml::from_str(yaml).unwrap();
        match info {
            DeploymentInfo::K8s(k8s) => {
                assert_eq!(k8s.all_namespaces(), vec!["default".to_string(), "canary".to_string()]);
                assert_eq!(k8s.release_number, 4);
            }
            other => panic!("unexpected info: {:?}", other),
        }
    }
}
