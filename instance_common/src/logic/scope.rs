use std::fmt;

use instance_defs::{InstanceInfo, InstanceRecord};
use instance_utils::{non_blank, same_optional_name};

/// The subset of tracked instances a pass is authoritative for.
///
/// Records outside the scope are never deleted or updated by the pass, even
/// when they look stale, because another controller or release owns them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SyncScope {
    All,
    AutoScalingGroup {
        name: String,
    },
    EcsService {
        cluster_name: String,
        service_name: String,
    },
    K8sRelease {
        namespace: String,
        release_name: Option<String>,
    },
    PcfApplication {
        application_name: String,
    },
    Function {
        function_name: String,
    },
}

impl SyncScope {
    pub fn contains(&self, record: &InstanceRecord) -> bool {
        match (self, &record.instance_info) {
            (SyncScope::All, _) => true,
            (SyncScope::AutoScalingGroup { name }, InstanceInfo::Host(host)) => {
                host.auto_scaling_group_name.as_deref() == Some(name.as_str())
            }
            (
                SyncScope::EcsService {
                    cluster_name,
                    service_name,
                },
                InstanceInfo::EcsTask(task),
            ) => task.cluster_name == *cluster_name && task.service_name == *service_name,
            (
                SyncScope::K8sRelease {
                    namespace,
                    release_name,
                },
                InstanceInfo::K8sPod(pod),
            ) => {
                pod.namespace == *namespace
                    && same_optional_name(pod.release_name.as_deref(), release_name.as_deref())
            }
            (SyncScope::PcfApplication { application_name }, InstanceInfo::Pcf(pcf)) => {
                pcf.application_name == *application_name
            }
            (SyncScope::Function { function_name }, InstanceInfo::Function(function)) => {
                function.function_name == *function_name
            }
            _ => false,
        }
    }
}

impl fmt::Display for SyncScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncScope::All => f.write_str("all"),
            SyncScope::AutoScalingGroup { name } => write!(f, "asg:{}", name),
            SyncScope::EcsService {
                cluster_name,
                service_name,
            } => write!(f, "ecs:{}/{}", cluster_name, service_name),
            SyncScope::K8sRelease {
                namespace,
                release_name,
            } => write!(
                f,
                "k8s:{}/{}",
                namespace,
                non_blank(release_name.as_deref()).unwrap_or("-")
            ),
            SyncScope::PcfApplication { application_name } => write!(f, "pcf:{}", application_name),
            SyncScope::Function { function_name } => write!(f, "function:{}", function_name),
        }
    }
}
