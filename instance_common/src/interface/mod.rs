mod event_queue;
mod feature_flags;
mod handler;
mod handler_factory;
mod lease_locker;
mod memory;

pub use event_queue::{deployment_event_channel, DeploymentEventQueue, DeploymentEventReceiver};
pub use feature_flags::StaticFeatureFlags;
pub use handler::{InstanceHandler, LiveSource, SyncContext, SyncGroup, SyncGroups};
pub(crate) use handler::{incompatible_response, provider_unavailable, unsupported_deployment_info};
pub use handler_factory::{InstanceHandlerFactory, ProviderClients};
pub use lease_locker::LeaseLocker;
pub use memory::{
    InMemoryDeploymentSummaryStore, InMemoryInfraMappingStore, InMemoryInstanceStore,
    InMemoryPerpetualTaskClient,
};
