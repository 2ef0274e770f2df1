mod ami;
mod container;
mod lambda;
mod pcf;

pub use ami::AwsAmiInstanceHandler;
pub use container::ContainerInstanceHandler;
pub use lambda::AwsLambdaInstanceHandler;
pub use pcf::PcfInstanceHandler;

use instance_defs::{InstanceSyncResponse, SyncError};

/// Failed perpetual-task responses carry no usable live state.
fn ensure_success(handler: &str, response: &InstanceSyncResponse) -> Result<(), SyncError> {
    if response.is_failure() {
        return Err(SyncError::ProviderUnavailable(format!(
            "{} perpetual task: {}",
            handler,
            response.error_message()
        )));
    }
    Ok(())
}
