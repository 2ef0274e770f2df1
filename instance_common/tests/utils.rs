#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use instance_common::interface::{
    deployment_event_channel, InMemoryDeploymentSummaryStore, InMemoryInfraMappingStore,
    InMemoryInstanceStore, InMemoryPerpetualTaskClient, LeaseLocker, StaticFeatureFlags,
};
use instance_common::{
    DeploymentEventConsumer, InstanceHandlerFactory, InstanceSyncService, ProviderClients,
    SyncConfig, SyncDependencies,
};
use instance_defs::{
    AutoScalingClient, ContainerClient, DeploymentInfo, DeploymentSummary, Ec2Instance, EcsTask,
    EcsTaskInfo, FunctionInstanceInfo, HostInstanceInfo, InfraMapping, InfraMappingType,
    InstanceInfo, InstanceRecord, K8sContainerInfo, K8sPod, K8sPodInfo, LambdaClient,
    LambdaFunction, PcfAppInstance, PcfClient, PcfInstanceInfo,
};

pub const ACCOUNT: &str = "acc-1";
pub const APP: &str = "app-1";

/// Provider state served to the handlers, shared by every provider trait.
#[derive(Default)]
pub struct ProviderState {
    pub auto_scaling_groups: HashMap<String, Vec<Ec2Instance>>,
    pub ecs_services: HashMap<(String, String), Vec<EcsTask>>,
    pub pods: Vec<K8sPod>,
    pub pcf_apps: HashMap<String, Vec<PcfAppInstance>>,
    pub functions: HashMap<String, LambdaFunction>,
    pub failing: bool,
    /// How long every provider call takes.
    pub delay: Duration,
}

#[derive(Default)]
pub struct FakeProviders {
    state: Mutex<ProviderState>,
    calls: AtomicUsize,
}

impl FakeProviders {
    pub fn update(&self, change: impl FnOnce(&mut ProviderState)) {
        let mut state = self.state.lock().unwrap();
        change(&mut state);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn observe<T>(
        &self,
        read: impl FnOnce(&ProviderState) -> T + Send,
    ) -> Result<T, anyhow::Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.state.lock().unwrap().delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let state = self.state.lock().unwrap();
        if state.failing {
            return Err(anyhow::anyhow!("provider API unavailable"));
        }
        Ok(read(&state))
    }
}

#[async_trait]
impl AutoScalingClient for FakeProviders {
    async fn describe_auto_scaling_group_instances(
        &self,
        _infra_mapping: &InfraMapping,
        auto_scaling_group_name: &str,
    ) -> Result<Option<Vec<Ec2Instance>>, anyhow::Error> {
        self.observe(|state| state.auto_scaling_groups.get(auto_scaling_group_name).cloned())
            .await
    }
}

#[async_trait]
impl ContainerClient for FakeProviders {
    async fn list_ecs_service_tasks(
        &self,
        _infra_mapping: &InfraMapping,
        cluster_name: &str,
        service_name: &str,
    ) -> Result<Option<Vec<EcsTask>>, anyhow::Error> {
        self.observe(|state| {
            state
                .ecs_services
                .get(&(cluster_name.to_string(), service_name.to_string()))
                .cloned()
        })
        .await
    }

    async fn list_release_pods(
        &self,
        _infra_mapping: &InfraMapping,
        namespace: &str,
        release_name: Option<&str>,
    ) -> Result<Vec<K8sPod>, anyhow::Error> {
        self.observe(|state| {
            state
                .pods
                .iter()
                .filter(|pod| pod.namespace == namespace)
                .filter(|pod| release_name.is_none() || pod.release_name.as_deref() == release_name)
                .cloned()
                .collect()
        })
        .await
    }
}

#[async_trait]
impl PcfClient for FakeProviders {
    async fn get_application_instances(
        &self,
        _infra_mapping: &InfraMapping,
        application_name: &str,
    ) -> Result<Option<Vec<PcfAppInstance>>, anyhow::Error> {
        self.observe(|state| state.pcf_apps.get(application_name).cloned())
            .await
    }
}

#[async_trait]
impl LambdaClient for FakeProviders {
    async fn get_function(
        &self,
        _infra_mapping: &InfraMapping,
        function_name: &str,
    ) -> Result<Option<LambdaFunction>, anyhow::Error> {
        self.observe(|state| state.functions.get(function_name).cloned())
            .await
    }
}

pub struct Harness {
    pub service: Arc<InstanceSyncService>,
    pub instances: Arc<InMemoryInstanceStore>,
    pub summaries: Arc<InMemoryDeploymentSummaryStore>,
    pub mappings: Arc<InMemoryInfraMappingStore>,
    pub flags: Arc<StaticFeatureFlags>,
    pub tasks: Arc<InMemoryPerpetualTaskClient>,
    pub providers: Arc<FakeProviders>,
    pub locker: Arc<LeaseLocker>,
    pub events: DeploymentEventConsumer,
}

impl Harness {
    pub fn new() -> Self {
        Harness::with_config(SyncConfig::default())
    }

    pub fn with_config(config: SyncConfig) -> Self {
        let providers = Arc::new(FakeProviders::default());
        let clients = ProviderClients {
            auto_scaling: providers.clone(),
            containers: providers.clone(),
            pcf: providers.clone(),
            lambda: providers.clone(),
        };
        let instances = Arc::new(InMemoryInstanceStore::default());
        let summaries = Arc::new(InMemoryDeploymentSummaryStore::default());
        let mappings = Arc::new(InMemoryInfraMappingStore::default());
        let flags = Arc::new(StaticFeatureFlags::from_config(&config.feature_flags));
        let tasks = Arc::new(InMemoryPerpetualTaskClient::default());
        let locker = Arc::new(LeaseLocker::default());
        let (queue, receiver) = deployment_event_channel();

        let deps = SyncDependencies {
            instances: instances.clone(),
            deployment_summaries: summaries.clone(),
            infra_mappings: mappings.clone(),
            feature_flags: flags.clone(),
            perpetual_tasks: tasks.clone(),
            event_publisher: Arc::new(queue),
            locker: locker.clone(),
        };
        let service = Arc::new(
            InstanceSyncService::new(InstanceHandlerFactory::new(clients), deps, &config)
                .unwrap(),
        );
        let events = DeploymentEventConsumer::new(service.clone(), receiver);

        Harness {
            service,
            instances,
            summaries,
            mappings,
            flags,
            tasks,
            providers,
            locker,
            events,
        }
    }

    pub async fn add_mapping(&self, id: &str, infra_mapping_type: InfraMappingType) -> InfraMapping {
        let mapping = mapping(id, infra_mapping_type);
        self.mappings.insert(mapping.clone()).await;
        mapping
    }

    /// Non-deleted records of the mapping.
    pub async fn live_records(&self, infra_mapping_id: &str) -> Vec<InstanceRecord> {
        self.instances
            .all()
            .await
            .into_iter()
            .filter(|r| r.infra_mapping_id == infra_mapping_id && !r.is_deleted)
            .collect()
    }
}

pub fn mapping(id: &str, infra_mapping_type: InfraMappingType) -> InfraMapping {
    InfraMapping {
        id: id.to_string(),
        account_id: ACCOUNT.to_string(),
        app_id: APP.to_string(),
        env_id: "env-1".to_string(),
        service_id: "svc-1".to_string(),
        infra_mapping_type,
        display_name: id.to_string(),
        cluster_name: infra_mapping_type.is_kubernetes().then(|| "c1".to_string()),
        namespace: None,
        region: Some("us-east-1".to_string()),
    }
}

pub fn record(
    id: &str,
    mapping: &InfraMapping,
    info: InstanceInfo,
    execution: Option<&str>,
    deployed_at: i64,
) -> InstanceRecord {
    InstanceRecord {
        id: id.to_string(),
        account_id: mapping.account_id.clone(),
        app_id: mapping.app_id.clone(),
        infra_mapping_id: mapping.id.clone(),
        infra_mapping_type: mapping.infra_mapping_type,
        identity_key: Some(info.identity_key(&mapping.id)),
        instance_info: info,
        last_workflow_execution_id: execution.map(str::to_string),
        last_workflow_execution_name: None,
        last_artifact_id: None,
        last_artifact_name: execution.map(|e| format!("artifact-{}", e)),
        last_artifact_build_num: None,
        last_deployed_by: Some("alice".to_string()),
        last_deployed_at: deployed_at,
        created_at: deployed_at,
        updated_at: deployed_at,
        is_deleted: false,
        deleted_at: None,
    }
}

pub fn summary(
    mapping: &InfraMapping,
    execution: &str,
    deployment_info: DeploymentInfo,
    artifact: Option<(&str, &str)>,
) -> DeploymentSummary {
    DeploymentSummary {
        id: None,
        account_id: mapping.account_id.clone(),
        app_id: mapping.app_id.clone(),
        infra_mapping_id: mapping.id.clone(),
        workflow_execution_id: execution.to_string(),
        workflow_execution_name: Some(format!("workflow {}", execution)),
        state_execution_instance_id: Some(format!("state-{}", execution)),
        artifact_id: artifact.map(|(name, build)| format!("{}-{}", name, build)),
        artifact_name: artifact.map(|(name, _)| name.to_string()),
        artifact_build_num: artifact.map(|(_, build)| build.to_string()),
        deployed_by: Some("bob".to_string()),
        deployed_at: 1_000,
        deployment_info,
        deployment_key: None,
    }
}

pub fn host_info(host_name: &str, auto_scaling_group_name: Option<&str>) -> InstanceInfo {
    InstanceInfo::Host(HostInstanceInfo {
        host_name: host_name.to_string(),
        instance_id: format!("i-{}", host_name),
        public_dns_name: None,
        auto_scaling_group_name: auto_scaling_group_name.map(str::to_string),
    })
}

pub fn ec2(host_name: &str) -> Ec2Instance {
    Ec2Instance {
        instance_id: format!("i-{}", host_name),
        private_dns_name: host_name.to_string(),
        public_dns_name: Some(format!("{}.example.com", host_name)),
        launched_at: 10,
    }
}

pub fn ecs_task_info(task_arn: &str) -> InstanceInfo {
    InstanceInfo::EcsTask(EcsTaskInfo {
        task_arn: task_arn.to_string(),
        cluster_name: "c1".to_string(),
        service_name: "svc".to_string(),
        task_definition_arn: "td:1".to_string(),
        started_at: 0,
    })
}

pub fn pod_info(pod_name: &str, image: &str) -> InstanceInfo {
    InstanceInfo::K8sPod(K8sPodInfo {
        pod_name: pod_name.to_string(),
        namespace: "default".to_string(),
        release_name: Some("web".to_string()),
        cluster_name: Some("c1".to_string()),
        pod_ip: None,
        containers: vec![K8sContainerInfo {
            name: "web".to_string(),
            image: image.to_string(),
        }],
        blue_green_color: None,
        helm_chart: None,
    })
}

pub fn pod(pod_name: &str, image: &str) -> K8sPod {
    K8sPod {
        name: pod_name.to_string(),
        namespace: "default".to_string(),
        release_name: Some("web".to_string()),
        ip: None,
        containers: vec![K8sContainerInfo {
            name: "web".to_string(),
            image: image.to_string(),
        }],
        blue_green_color: None,
        created_at: 5,
    }
}

pub fn pcf_info(instance_index: u32) -> InstanceInfo {
    InstanceInfo::Pcf(PcfInstanceInfo {
        application_guid: "guid".to_string(),
        application_name: "orders".to_string(),
        instance_index,
        organization: "org".to_string(),
        space: "dev".to_string(),
    })
}

pub fn pcf_instance(instance_index: u32) -> PcfAppInstance {
    PcfAppInstance {
        application_guid: "guid".to_string(),
        application_name: "orders".to_string(),
        instance_index,
        organization: "org".to_string(),
        space: "dev".to_string(),
        started_at: 20,
    }
}

pub fn function_info(version: &str) -> InstanceInfo {
    InstanceInfo::Function(FunctionInstanceInfo {
        function_name: "checkout".to_string(),
        version: version.to_string(),
        function_arn: format!("arn:aws:lambda:us-east-1:1:function:checkout:{}", version),
        runtime: Some("provided.al2".to_string()),
        last_modified: None,
    })
}
