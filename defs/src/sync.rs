use std::fmt;

use serde::{Deserialize, Serialize};

/// Which trigger started a reconciliation pass.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncFlow {
    Manual,
    Iterator,
    NewDeployment,
    PerpetualTask,
}

impl fmt::Display for SyncFlow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncFlow::Manual => "MANUAL",
            SyncFlow::Iterator => "ITERATOR",
            SyncFlow::NewDeployment => "NEW_DEPLOYMENT",
            SyncFlow::PerpetualTask => "PERPETUAL_TASK",
        };
        f.write_str(name)
    }
}

/// Outcome handed back to the perpetual-task scheduler.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub success: bool,
    pub retryable: bool,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl Status {
    /// Keep polling.
    pub fn ongoing() -> Self {
        Status {
            success: true,
            retryable: true,
            error_message: None,
        }
    }

    /// Nothing is left to reconcile, stop polling.
    pub fn finished() -> Self {
        Status {
            success: true,
            retryable: false,
            error_message: None,
        }
    }

    pub fn failed(message: impl Into<String>, retryable: bool) -> Self {
        Status {
            success: false,
            retryable,
            error_message: Some(message.into()),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeatureName {
    MoveAwsAmiInstanceSyncToPerpetualTask,
    StopInstanceSyncViaIteratorForAwsAmi,
    MoveContainerInstanceSyncToPerpetualTask,
    StopInstanceSyncViaIteratorForContainer,
    MovePcfInstanceSyncToPerpetualTask,
    StopInstanceSyncViaIteratorForPcf,
    MoveAwsLambdaInstanceSyncToPerpetualTask,
    StopInstanceSyncViaIteratorForAwsLambda,
}
