mod deployment;
mod errors;
mod infra;
mod instance;
mod perpetual_task;
mod provider;
mod services;
mod store;
mod sync;

pub use deployment::{
    AwsAmiDeploymentInfo, AwsLambdaDeploymentInfo, ContainerDeploymentInfoWithLabels,
    ContainerDeploymentInfoWithNames, DeploymentEvent, DeploymentInfo, DeploymentKey,
    DeploymentSummary, K8sDeploymentInfo, OnDemandRollbackInfo, PcfDeploymentInfo,
};
pub use errors::SyncError;
pub use infra::{InfraMapping, InfraMappingType};
pub use instance::{
    EcsTaskInfo, FunctionInstanceInfo, HelmChartInfo, HostInstanceInfo, IdentityKey,
    InstanceInfo, InstanceMetadata, InstanceRecord, K8sContainerInfo, K8sPodInfo,
    PcfInstanceInfo,
};
pub use perpetual_task::{
    AwsAmiSyncResponse, AwsLambdaSyncResponse, CommandExecutionStatus, EcsSyncResponse,
    InstanceSyncResponse, K8sSyncResponse, PcfSyncResponse, PerpetualTaskClientParams,
    PerpetualTaskRecord, ProviderError, ProviderErrorKind,
};
pub use provider::{
    AutoScalingClient, ContainerClient, Ec2Instance, EcsTask, K8sPod, LambdaClient,
    LambdaFunction, PcfAppInstance, PcfClient,
};
pub use services::{
    DeploymentEventPublisher, FeatureFlagService, PerpetualTaskClient, SyncLocker,
};
pub use store::{DeploymentSummaryStore, InfraMappingStore, InstanceStore};
pub use sync::{FeatureName, Status, SyncFlow};
