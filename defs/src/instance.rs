use std::fmt;

use serde::{Deserialize, Serialize};

use crate::InfraMappingType;

/// Provider-specific identity of one live unit of deployed work.
///
/// Equality and ordering only consider identifying fields. Mutable metadata
/// such as artifact versions or colours lives in [`InstanceInfo`] and never
/// takes part in matching.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IdentityKey {
    Host {
        host_name: String,
        infra_mapping_id: String,
    },
    Container {
        container_id: String,
    },
    Pod {
        pod_name: String,
        namespace: String,
    },
    PcfInstance {
        application_guid: String,
        instance_index: u32,
    },
    Function {
        function_name: String,
        version: String,
    },
}

impl IdentityKey {
    /// A key whose identifying strings are empty cannot match anything reliably.
    pub fn is_blank(&self) -> bool {
        match self {
            IdentityKey::Host { host_name, .. } => host_name.trim().is_empty(),
            IdentityKey::Container { container_id } => container_id.trim().is_empty(),
            IdentityKey::Pod { pod_name, .. } => pod_name.trim().is_empty(),
            IdentityKey::PcfInstance {
                application_guid, ..
            } => application_guid.trim().is_empty(),
            IdentityKey::Function {
                function_name,
                version,
            } => function_name.trim().is_empty() || version.trim().is_empty(),
        }
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentityKey::Host { host_name, .. } => write!(f, "host:{}", host_name),
            IdentityKey::Container { container_id } => write!(f, "container:{}", container_id),
            IdentityKey::Pod {
                pod_name,
                namespace,
            } => write!(f, "pod:{}/{}", namespace, pod_name),
            IdentityKey::PcfInstance {
                application_guid,
                instance_index,
            } => write!(f, "pcf:{}:{}", application_guid, instance_index),
            IdentityKey::Function {
                function_name,
                version,
            } => write!(f, "function:{}:{}", function_name, version),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct HelmChartInfo {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub repo_url: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct K8sContainerInfo {
    pub name: String,
    pub image: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct HostInstanceInfo {
    pub host_name: String,
    pub instance_id: String,
    #[serde(default)]
    pub public_dns_name: Option<String>,
    #[serde(default)]
    pub auto_scaling_group_name: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct EcsTaskInfo {
    pub task_arn: String,
    pub cluster_name: String,
    pub service_name: String,
    #[serde(default)]
    pub task_definition_arn: String,
    #[serde(default)]
    pub started_at: i64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct K8sPodInfo {
    pub pod_name: String,
    pub namespace: String,
    #[serde(default)]
    pub release_name: Option<String>,
    #[serde(default)]
    pub cluster_name: Option<String>,
    #[serde(default)]
    pub pod_ip: Option<String>,
    #[serde(default)]
    pub containers: Vec<K8sContainerInfo>,
    #[serde(default)]
    pub blue_green_color: Option<String>,
    #[serde(default)]
    pub helm_chart: Option<HelmChartInfo>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PcfInstanceInfo {
    pub application_guid: String,
    pub application_name: String,
    pub instance_index: u32,
    #[serde(default)]
    pub organization: String,
    #[serde(default)]
    pub space: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FunctionInstanceInfo {
    pub function_name: String,
    pub version: String,
    #[serde(default)]
    pub function_arn: String,
    #[serde(default)]
    pub runtime: Option<String>,
    #[serde(default)]
    pub last_modified: Option<String>,
}

/// Provider payload carried by an [`InstanceRecord`].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum InstanceInfo {
    Host(HostInstanceInfo),
    EcsTask(EcsTaskInfo),
    K8sPod(K8sPodInfo),
    Pcf(PcfInstanceInfo),
    Function(FunctionInstanceInfo),
}

impl InstanceInfo {
    pub fn identity_key(&self, infra_mapping_id: &str) -> IdentityKey {
        match self {
            InstanceInfo::Host(host) => IdentityKey::Host {
                host_name: host.host_name.clone(),
                infra_mapping_id: infra_mapping_id.to_string(),
            },
            InstanceInfo::EcsTask(task) => IdentityKey::Container {
                container_id: task.task_arn.clone(),
            },
            InstanceInfo::K8sPod(pod) => IdentityKey::Pod {
                pod_name: pod.pod_name.clone(),
                namespace: pod.namespace.clone(),
            },
            InstanceInfo::Pcf(pcf) => IdentityKey::PcfInstance {
                application_guid: pcf.application_guid.clone(),
                instance_index: pcf.instance_index,
            },
            InstanceInfo::Function(function) => IdentityKey::Function {
                function_name: function.function_name.clone(),
                version: function.version.clone(),
            },
        }
    }

    /// Copies the fields a provider may change over the lifetime of an
    /// instance from a fresh observation of the same instance.
    pub fn refresh_from(&mut self, live: &InstanceInfo) {
        match (self, live) {
            (InstanceInfo::Host(current), InstanceInfo::Host(live)) => {
                current.public_dns_name = live.public_dns_name.clone();
                if live.auto_scaling_group_name.is_some() {
                    current.auto_scaling_group_name = live.auto_scaling_group_name.clone();
                }
            }
            (InstanceInfo::EcsTask(current), InstanceInfo::EcsTask(live)) => {
                current.task_definition_arn = live.task_definition_arn.clone();
            }
            (InstanceInfo::K8sPod(current), InstanceInfo::K8sPod(live)) => {
                current.pod_ip = live.pod_ip.clone();
                current.containers = live.containers.clone();
                current.blue_green_color = live.blue_green_color.clone();
                if live.helm_chart.is_some() {
                    current.helm_chart = live.helm_chart.clone();
                }
            }
            (InstanceInfo::Function(current), InstanceInfo::Function(live)) => {
                if !live.function_arn.is_empty() {
                    current.function_arn = live.function_arn.clone();
                }
                if live.runtime.is_some() {
                    current.runtime = live.runtime.clone();
                }
                if live.last_modified.is_some() {
                    current.last_modified = live.last_modified.clone();
                }
            }
            (InstanceInfo::Pcf(_), InstanceInfo::Pcf(_)) => {}
            (current, live) => *current = live.clone(),
        }
    }

    pub fn helm_chart(&self) -> Option<&HelmChartInfo> {
        match self {
            InstanceInfo::K8sPod(pod) => pod.helm_chart.as_ref(),
            _ => None,
        }
    }

    pub fn blue_green_color(&self) -> Option<&str> {
        match self {
            InstanceInfo::K8sPod(pod) => pod.blue_green_color.as_deref(),
            _ => None,
        }
    }

    pub fn images(&self) -> Vec<String> {
        match self {
            InstanceInfo::K8sPod(pod) => pod.containers.iter().map(|c| c.image.clone()).collect(),
            _ => vec![],
        }
    }
}

/// The projection of a record that decides whether a write is needed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceMetadata {
    pub last_workflow_execution_id: Option<String>,
    pub last_artifact_id: Option<String>,
    pub last_artifact_name: Option<String>,
    pub last_artifact_build_num: Option<String>,
    pub helm_chart: Option<HelmChartInfo>,
    pub blue_green_color: Option<String>,
    pub images: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct InstanceRecord {
    pub id: String,
    pub account_id: String,
    pub app_id: String,
    pub infra_mapping_id: String,
    pub infra_mapping_type: InfraMappingType,
    #[serde(default)]
    pub identity_key: Option<IdentityKey>,
    pub instance_info: InstanceInfo,
    #[serde(default)]
    pub last_workflow_execution_id: Option<String>,
    #[serde(default)]
    pub last_workflow_execution_name: Option<String>,
    #[serde(default)]
    pub last_artifact_id: Option<String>,
    #[serde(default)]
    pub last_artifact_name: Option<String>,
    #[serde(default)]
    pub last_artifact_build_num: Option<String>,
    #[serde(default)]
    pub last_deployed_by: Option<String>,
    #[serde(default)]
    pub last_deployed_at: i64,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(default)]
    pub deleted_at: Option<i64>,
}

impl InstanceRecord {
    pub fn metadata(&self) -> InstanceMetadata {
        InstanceMetadata {
            last_workflow_execution_id: self.last_workflow_execution_id.clone(),
            last_artifact_id: self.last_artifact_id.clone(),
            last_artifact_name: self.last_artifact_name.clone(),
            last_artifact_build_num: self.last_artifact_build_num.clone(),
            helm_chart: self.instance_info.helm_chart().cloned(),
            blue_green_color: self.instance_info.blue_green_color().map(str::to_string),
            images: self.instance_info.images(),
        }
    }

    /// Identity usable for diffing, `None` when the stored key is missing or blank.
    pub fn usable_identity(&self) -> Option<&IdentityKey> {
        self.identity_key.as_ref().filter(|key| !key.is_blank())
    }
}
