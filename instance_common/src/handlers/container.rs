use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::try_join_all;
use instance_defs::{
    ContainerClient, DeploymentInfo, DeploymentKey, DeploymentSummary, EcsTask, EcsTaskInfo,
    FeatureName, HelmChartInfo, InfraMapping, InfraMappingType, InstanceInfo, InstanceRecord,
    InstanceSyncResponse, K8sPod, K8sPodInfo, Status, SyncError,
};
use instance_utils::non_blank;
use log::{debug, info};

use super::ensure_success;
use crate::interface::{
    incompatible_response, provider_unavailable, unsupported_deployment_info, InstanceHandler,
    LiveSource, SyncContext, SyncGroup,
};
use crate::logic::{deployment_applies, status_for_response, LiveInstance, SyncScope};

const NAME: &str = "container";
const SUPPORTED_TYPES: &[InfraMappingType] = &[
    InfraMappingType::AwsEcs,
    InfraMappingType::DirectKubernetes,
    InfraMappingType::GcpKubernetes,
    InfraMappingType::AzureKubernetes,
];

/// ECS services and Kubernetes releases.
///
/// Several services or releases can share one infra mapping, so every pass
/// reconciles each of them in its own scope.
pub struct ContainerInstanceHandler {
    client: Arc<dyn ContainerClient>,
}

fn ecs_scope(cluster_name: &str, service_name: &str) -> SyncScope {
    SyncScope::EcsService {
        cluster_name: cluster_name.to_string(),
        service_name: service_name.to_string(),
    }
}

fn release_scope(namespace: &str, release_name: Option<&str>) -> SyncScope {
    SyncScope::K8sRelease {
        namespace: namespace.to_string(),
        release_name: non_blank(release_name).map(str::to_string),
    }
}

fn tracked_scopes(tracked: &[InstanceRecord]) -> BTreeSet<SyncScope> {
    tracked
        .iter()
        .filter_map(|record| match &record.instance_info {
            InstanceInfo::EcsTask(task) => Some(ecs_scope(&task.cluster_name, &task.service_name)),
            InstanceInfo::K8sPod(pod) => Some(release_scope(&pod.namespace, pod.release_name.as_deref())),
            _ => None,
        })
        .collect()
}

fn deployment_scopes(info: &DeploymentInfo) -> Vec<SyncScope> {
    match info {
        DeploymentInfo::ContainerWithNames(ecs) => {
            vec![ecs_scope(&ecs.cluster_name, &ecs.container_svc_name)]
        }
        DeploymentInfo::ContainerWithLabels(labels) => {
            vec![release_scope(&labels.namespace, labels.release_name.as_deref())]
        }
        DeploymentInfo::K8s(k8s) => k8s
            .all_namespaces()
            .iter()
            .map(|namespace| release_scope(namespace, Some(&k8s.release_name)))
            .collect(),
        _ => vec![],
    }
}

fn ecs_live(
    infra_mapping: &InfraMapping,
    cluster_name: &str,
    service_name: &str,
    tasks: &[EcsTask],
) -> Vec<LiveInstance> {
    tasks
        .iter()
        .map(|task| {
            let info = InstanceInfo::EcsTask(EcsTaskInfo {
                task_arn: task.task_arn.clone(),
                cluster_name: cluster_name.to_string(),
                service_name: service_name.to_string(),
                task_definition_arn: task.task_definition_arn.clone(),
                started_at: task.started_at,
            });
            LiveInstance::new(info, &infra_mapping.id, task.started_at)
        })
        .collect()
}

/// The chart a pod runs: the deploying release's chart when the deployment
/// owns the pod, otherwise the chart of the latest tracked pod of the same colour.
fn resolve_helm_chart(
    info: &InstanceInfo,
    scope: &SyncScope,
    deployment: Option<&DeploymentSummary>,
    tracked: &[InstanceRecord],
) -> Option<HelmChartInfo> {
    if let Some(deployment) = deployment {
        if let DeploymentInfo::K8s(k8s) = &deployment.deployment_info {
            if k8s.helm_chart.is_some() && deployment_applies(deployment, info) {
                return k8s.helm_chart.clone();
            }
        }
    }
    let color = non_blank(info.blue_green_color());
    tracked
        .iter()
        .filter(|record| scope.contains(record))
        .filter(|record| non_blank(record.instance_info.blue_green_color()) == color)
        .filter(|record| record.instance_info.helm_chart().is_some())
        .max_by_key(|record| record.last_deployed_at)
        .and_then(|record| record.instance_info.helm_chart().cloned())
}

fn pod_live(
    infra_mapping: &InfraMapping,
    scope: &SyncScope,
    pods: &[K8sPod],
    cluster_name: Option<String>,
    deployment: Option<&DeploymentSummary>,
    tracked: &[InstanceRecord],
) -> Vec<LiveInstance> {
    let SyncScope::K8sRelease {
        namespace,
        release_name,
    } = scope
    else {
        return vec![];
    };
    pods.iter()
        .filter(|pod| {
            let owned = pod.namespace == *namespace;
            if !owned {
                debug!("Pod {}/{} is outside scope {}", pod.namespace, pod.name, scope);
            }
            owned
        })
        .map(|pod| {
            let mut info = InstanceInfo::K8sPod(K8sPodInfo {
                pod_name: pod.name.clone(),
                namespace: pod.namespace.clone(),
                release_name: release_name.clone(),
                cluster_name: cluster_name.clone(),
                pod_ip: pod.ip.clone(),
                containers: pod.containers.clone(),
                blue_green_color: pod.blue_green_color.clone(),
                helm_chart: None,
            });
            let chart = resolve_helm_chart(&info, scope, deployment, tracked);
            if let InstanceInfo::K8sPod(pod_info) = &mut info {
                pod_info.helm_chart = chart;
            }
            LiveInstance::new(info, &infra_mapping.id, pod.created_at)
        })
        .collect()
}

impl ContainerInstanceHandler {
    pub fn new(client: Arc<dyn ContainerClient>) -> Self {
        ContainerInstanceHandler { client }
    }

    async fn fetch(
        &self,
        ctx: &SyncContext<'_>,
        scope: SyncScope,
        deployment: Option<&DeploymentSummary>,
    ) -> Result<SyncGroup, SyncError> {
        let infra_mapping = ctx.infra_mapping;
        let mut group = match &scope {
            SyncScope::EcsService {
                cluster_name,
                service_name,
            } => {
                let tasks = self
                    .client
                    .list_ecs_service_tasks(infra_mapping, cluster_name, service_name)
                    .await
                    .map_err(|e| provider_unavailable(NAME, e))?;
                match tasks {
                    Some(tasks) => {
                        let live = ecs_live(infra_mapping, cluster_name, service_name, &tasks);
                        SyncGroup::with_live(scope, live)
                    }
                    None => {
                        info!(
                            "ECS service {}/{} of infra mapping {} no longer exists",
                            cluster_name, service_name, infra_mapping.id
                        );
                        SyncGroup::gone(scope)
                    }
                }
            }
            SyncScope::K8sRelease {
                namespace,
                release_name,
            } => {
                let pods = self
                    .client
                    .list_release_pods(infra_mapping, namespace, release_name.as_deref())
                    .await
                    .map_err(|e| provider_unavailable(NAME, e))?;
                let cluster_name = deployment
                    .and_then(|d| match &d.deployment_info {
                        DeploymentInfo::K8s(k8s) => k8s.cluster_name.clone(),
                        _ => None,
                    })
                    .or_else(|| infra_mapping.cluster_name.clone());
                let live = pod_live(
                    infra_mapping,
                    &scope,
                    &pods,
                    cluster_name,
                    deployment,
                    ctx.tracked,
                );
                SyncGroup::with_live(scope, live)
            }
            other => SyncGroup::new(other.clone()),
        };
        group.deployment = deployment.cloned();
        Ok(group)
    }

    fn from_response(
        &self,
        ctx: &SyncContext<'_>,
        response: &InstanceSyncResponse,
    ) -> Result<SyncGroup, SyncError> {
        ensure_success(NAME, response)?;
        match response {
            InstanceSyncResponse::Ecs(ecs) => {
                let scope = ecs_scope(&ecs.cluster_name, &ecs.service_name);
                if !ecs.service_exists {
                    return Ok(SyncGroup::gone(scope));
                }
                let live = ecs_live(
                    ctx.infra_mapping,
                    &ecs.cluster_name,
                    &ecs.service_name,
                    &ecs.tasks,
                );
                Ok(SyncGroup::with_live(scope, live))
            }
            InstanceSyncResponse::K8s(k8s) => {
                let scope = release_scope(&k8s.namespace, k8s.release_name.as_deref());
                let cluster_name = k8s
                    .cluster_name
                    .clone()
                    .or_else(|| ctx.infra_mapping.cluster_name.clone());
                let live = pod_live(
                    ctx.infra_mapping,
                    &scope,
                    &k8s.pods,
                    cluster_name,
                    None,
                    ctx.tracked,
                );
                Ok(SyncGroup::with_live(scope, live))
            }
            other => Err(incompatible_response(NAME, other)),
        }
    }
}

#[async_trait]
impl InstanceHandler for ContainerInstanceHandler {
    fn name(&self) -> &'static str {
        NAME
    }

    fn supported_infra_mapping_types(&self) -> &'static [InfraMappingType] {
        SUPPORTED_TYPES
    }

    async fn get_live_instances(&self, ctx: &SyncContext<'_>) -> Result<Vec<SyncGroup>, SyncError> {
        match ctx.source {
            LiveSource::Provider => {
                try_join_all(
                    tracked_scopes(ctx.tracked)
                        .into_iter()
                        .map(|scope| self.fetch(ctx, scope, None)),
                )
                .await
            }
            LiveSource::Deployment(summaries) => {
                let mut deployed: BTreeMap<SyncScope, &DeploymentSummary> = BTreeMap::new();
                for summary in summaries {
                    for scope in deployment_scopes(&summary.deployment_info) {
                        deployed.insert(scope, summary);
                    }
                }
                let mut scopes = tracked_scopes(ctx.tracked);
                scopes.extend(deployed.keys().cloned());
                try_join_all(scopes.into_iter().map(|scope| {
                    let deployment = deployed.get(&scope).copied();
                    self.fetch(ctx, scope, deployment)
                }))
                .await
            }
            LiveSource::PerpetualTask(response) => Ok(vec![self.from_response(ctx, response)?]),
        }
    }

    fn generate_deployment_key(
        &self,
        deployment_info: &DeploymentInfo,
    ) -> Result<DeploymentKey, SyncError> {
        match deployment_info {
            DeploymentInfo::ContainerWithNames(ecs) => Ok(DeploymentKey::Container {
                container_service_name: Some(
                    non_blank(ecs.unique_name_identifier.as_deref())
                        .unwrap_or(&ecs.container_svc_name)
                        .to_string(),
                ),
                labels: BTreeMap::new(),
                new_version: None,
            }),
            DeploymentInfo::ContainerWithLabels(labels) => Ok(DeploymentKey::Container {
                container_service_name: None,
                labels: labels.labels.clone(),
                new_version: labels.new_version.clone(),
            }),
            DeploymentInfo::K8s(k8s) => Ok(DeploymentKey::K8s {
                release_name: k8s.release_name.clone(),
                release_number: k8s.release_number,
            }),
            other => Err(unsupported_deployment_info(NAME, other)),
        }
    }

    fn get_status(
        &self,
        _infra_mapping: &InfraMapping,
        response: &InstanceSyncResponse,
    ) -> Result<Status, SyncError> {
        match response {
            InstanceSyncResponse::Ecs(_) | InstanceSyncResponse::K8s(_) => {
                Ok(status_for_response(response))
            }
            other => Err(incompatible_response(NAME, other)),
        }
    }

    fn perpetual_task_feature(&self) -> FeatureName {
        FeatureName::MoveContainerInstanceSyncToPerpetualTask
    }

    fn stop_iterator_feature(&self) -> FeatureName {
        FeatureName::StopInstanceSyncViaIteratorForContainer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use instance_defs::{
        ContainerDeploymentInfoWithNames, K8sContainerInfo, K8sDeploymentInfo, PcfDeploymentInfo,
    };
    use pretty_assertions::assert_eq;

    fn k8s_info(color: Option<&str>, chart_version: Option<&str>) -> K8sDeploymentInfo {
        K8sDeploymentInfo {
            namespace: "default".to_string(),
            namespaces: vec!["canary".to_string()],
            release_name: "web".to_string(),
            release_number: 3,
            cluster_name: None,
            blue_green_stage_color: color.map(str::to_string),
            helm_chart: chart_version.map(|version| HelmChartInfo {
                name: "web".to_string(),
                version: version.to_string(),
                repo_url: None,
            }),
        }
    }

    #[test]
    fn test_deployment_keys() {
        let handler = ContainerInstanceHandler::new(Arc::new(NoContainers));
        let key = handler
            .generate_deployment_key(&DeploymentInfo::ContainerWithNames(
                ContainerDeploymentInfoWithNames {
                    cluster_name: "c1".to_string(),
                    container_svc_name: "svc__3".to_string(),
                    unique_name_identifier: Some(" ".to_string()),
                },
            ))
            .unwrap();
        assert_eq!(
            key,
            DeploymentKey::Container {
                container_service_name: Some("svc__3".to_string()),
                labels: BTreeMap::new(),
                new_version: None,
            }
        );

        let key = handler
            .generate_deployment_key(&DeploymentInfo::K8s(k8s_info(None, None)))
            .unwrap();
        assert_eq!(
            key,
            DeploymentKey::K8s {
                release_name: "web".to_string(),
                release_number: 3
            }
        );

        assert!(matches!(
            handler.generate_deployment_key(&DeploymentInfo::Pcf(PcfDeploymentInfo {
                application_name: "app".to_string(),
                application_guid: None,
            })),
            Err(SyncError::UnsupportedDeploymentKey { .. })
        ));
    }

    #[test]
    fn test_k8s_deployment_covers_every_namespace() {
        let scopes = deployment_scopes(&DeploymentInfo::K8s(k8s_info(None, None)));
        assert_eq!(
            scopes,
            vec![
                release_scope("default", Some("web")),
                release_scope("canary", Some("web")),
            ]
        );
    }

    #[test]
    fn test_blank_release_scopes_collapse() {
        assert_eq!(release_scope("default", Some("  ")), release_scope("default", None));
    }

    #[test]
    fn test_helm_chart_follows_deployment_colour() {
        let mapping = InfraMapping {
            id: "im-1".to_string(),
            account_id: "acc-1".to_string(),
            app_id: "app-1".to_string(),
            env_id: String::new(),
            service_id: String::new(),
            infra_mapping_type: InfraMappingType::DirectKubernetes,
            display_name: String::new(),
            cluster_name: Some("c1".to_string()),
            namespace: None,
            region: None,
        };
        let summary = DeploymentSummary {
            id: None,
            account_id: "acc-1".to_string(),
            app_id: "app-1".to_string(),
            infra_mapping_id: "im-1".to_string(),
            workflow_execution_id: "we-1".to_string(),
            workflow_execution_name: None,
            state_execution_instance_id: None,
            artifact_id: None,
            artifact_name: None,
            artifact_build_num: None,
            deployed_by: None,
            deployed_at: 0,
            deployment_info: DeploymentInfo::K8s(k8s_info(Some("green"), Some("2.0.0"))),
            deployment_key: None,
        };
        let pod = |name: &str, color: &str| K8sPod {
            name: name.to_string(),
            namespace: "default".to_string(),
            release_name: None,
            ip: None,
            containers: vec![K8sContainerInfo {
                name: "web".to_string(),
                image: "nginx:1".to_string(),
            }],
            blue_green_color: Some(color.to_string()),
            created_at: 0,
        };
        let scope = release_scope("default", Some("web"));

        let live = pod_live(
            &mapping,
            &scope,
            &[pod("web-green", "green"), pod("web-blue", "blue")],
            mapping.cluster_name.clone(),
            Some(&summary),
            &[],
        );

        assert_eq!(live.len(), 2);
        assert_eq!(
            live[0].info.helm_chart().map(|c| c.version.as_str()),
            Some("2.0.0")
        );
        assert_eq!(live[1].info.helm_chart(), None);
        match &live[1].info {
            InstanceInfo::K8sPod(info) => {
                assert_eq!(info.release_name.as_deref(), Some("web"));
                assert_eq!(info.cluster_name.as_deref(), Some("c1"));
            }
            other => panic!("unexpected info {:?}", other),
        }
    }

    struct NoContainers;

    #[async_trait]
    impl ContainerClient for NoContainers {
        async fn list_ecs_service_tasks(
            &self,
            _infra_mapping: &InfraMapping,
            _cluster_name: &str,
            _service_name: &str,
        ) -> Result<Option<Vec<EcsTask>>, anyhow::Error> {
            Ok(None)
        }

        async fn list_release_pods(
            &self,
            _infra_mapping: &InfraMapping,
            _namespace: &str,
            _release_name: Option<&str>,
        ) -> Result<Vec<K8sPod>, anyhow::Error> {
            Ok(vec![])
        }
    }
}
