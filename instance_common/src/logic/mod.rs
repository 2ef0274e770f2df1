mod deployment_events;
mod lock;
mod perpetual_task;
mod reconcile;
mod rollback;
mod scope;
mod status;
mod sync_flow;
mod sync_service;

pub use deployment_events::DeploymentEventConsumer;
pub use lock::{LockGuard, SyncLock};
pub use perpetual_task::PerpetualTaskLifecycle;
pub use reconcile::{
    deployment_applies, reconcile, LiveInstance, ReconcileInput, ReconcilePlan, AUTO_SCALE,
};
pub use rollback::resolve_rollback_artifact;
pub use scope::SyncScope;
pub use status::{status_for_error, status_for_response};
pub use sync_flow::SyncFlowGate;
pub use sync_service::{EventOutcome, InstanceSyncService, SyncDependencies, SyncOutcome};
