mod config;
pub mod handlers;
pub mod interface;
pub mod logic;

pub use config::{
    DeploymentEventConfig, FeatureFlagConfig, LockConfig, LockSettings, SyncConfig,
    CONFIG_PATH_ENV,
};
pub use interface::{InstanceHandler, InstanceHandlerFactory, ProviderClients};
pub use logic::{
    DeploymentEventConsumer, EventOutcome, InstanceSyncService, SyncDependencies, SyncOutcome,
};
