use thiserror::Error;

use crate::InfraMappingType;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Provider call failed: {0}")]
    ProviderUnavailable(String),

    #[error("Resource no longer exists upstream: {0}")]
    ResourceGone(String),

    #[error("Deployment info of type {info_type} is not handled by the {handler} handler")]
    UnsupportedDeploymentKey { handler: String, info_type: String },

    #[error("Deployment key {key_type} does not match deployment info of type {info_type}")]
    MalformedDeploymentKey { key_type: String, info_type: String },

    #[error("Could not acquire sync lock for {0}, another pass is running")]
    LockUnavailable(String),

    #[error("Infra mapping type {infra_mapping_type} is not supported by the {handler} handler")]
    UnsupportedInfraMappingType {
        handler: String,
        infra_mapping_type: InfraMappingType,
    },

    #[error("No instance handler is registered for infra mapping type {0}")]
    NoHandlerRegistered(InfraMappingType),

    #[error("Infra mapping {infra_mapping_id} not found for app {app_id}")]
    InfraMappingNotFound {
        app_id: String,
        infra_mapping_id: String,
    },

    #[error("Perpetual task response is not applicable: {0}")]
    IncompatibleResponse(String),

    #[error("Invalid deployment event: {0}")]
    InvalidDeploymentEvent(String),

    #[error("Other error occurred: {0}")]
    Other(#[from] anyhow::Error),
}

impl SyncError {
    /// Whether a later attempt can succeed without configuration changes.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::ProviderUnavailable(_)
            | SyncError::LockUnavailable(_)
            | SyncError::Other(_) => true,
            SyncError::ResourceGone(_)
            | SyncError::UnsupportedDeploymentKey { .. }
            | SyncError::MalformedDeploymentKey { .. }
            | SyncError::UnsupportedInfraMappingType { .. }
            | SyncError::NoHandlerRegistered(_)
            | SyncError::InfraMappingNotFound { .. }
            | SyncError::IncompatibleResponse(_)
            | SyncError::InvalidDeploymentEvent(_) => false,
        }
    }
}
