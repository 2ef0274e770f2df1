use instance_defs::{InstanceSyncResponse, ProviderErrorKind, Status, SyncError};

/// Maps a perpetual-task response to the scheduler's polling decision.
pub fn status_for_response(response: &InstanceSyncResponse) -> Status {
    if response.is_failure() {
        let retryable = response
            .error()
            .map_or(true, |error| error.kind != ProviderErrorKind::NotFound);
        return Status::failed(response.error_message(), retryable);
    }
    match response {
        // A release scaled to zero can scale back up.
        InstanceSyncResponse::K8s(_) => Status::ongoing(),
        InstanceSyncResponse::Ecs(r) if !r.service_exists => Status::finished(),
        InstanceSyncResponse::AwsAmi(r) if !r.auto_scaling_group_exists => Status::finished(),
        InstanceSyncResponse::Pcf(r) if !r.application_exists || r.instances.is_empty() => {
            Status::finished()
        }
        InstanceSyncResponse::AwsLambda(r) if r.function.is_none() => Status::finished(),
        _ => Status::ongoing(),
    }
}

pub fn status_for_error(error: &SyncError) -> Status {
    Status::failed(error.to_string(), error.is_retryable())
}

#[cfg(test)]
mod tests {
    use super::*;
    use instance_defs::{
        AwsLambdaSyncResponse, CommandExecutionStatus, EcsSyncResponse, K8sSyncResponse,
        LambdaFunction, PcfSyncResponse, ProviderError,
    };
    use pretty_assertions::assert_eq;

    fn pcf(status: CommandExecutionStatus, error: Option<ProviderError>) -> InstanceSyncResponse {
        InstanceSyncResponse::Pcf(PcfSyncResponse {
            application_name: "app".to_string(),
            instances: vec![],
            application_exists: true,
            status,
            error,
        })
    }

    #[test]
    fn test_failed_call_is_retryable() {
        let response = pcf(
            CommandExecutionStatus::Failure,
            Some(ProviderError {
                kind: ProviderErrorKind::Transient,
                message: "connection reset".to_string(),
            }),
        );
        assert_eq!(
            status_for_response(&response),
            Status::failed("connection reset", true)
        );
    }

    #[test]
    fn test_not_found_is_not_retryable() {
        let response = pcf(
            CommandExecutionStatus::Failure,
            Some(ProviderError {
                kind: ProviderErrorKind::NotFound,
                message: "application not found".to_string(),
            }),
        );
        assert_eq!(
            status_for_response(&response),
            Status::failed("application not found", false)
        );
    }

    #[test]
    fn test_gone_resources_stop_polling() {
        assert_eq!(
            status_for_response(&pcf(CommandExecutionStatus::Success, None)),
            Status::finished()
        );
        let lambda = InstanceSyncResponse::AwsLambda(AwsLambdaSyncResponse {
            function_name: "fn".to_string(),
            function: None,
            status: CommandExecutionStatus::Success,
            error: None,
        });
        assert_eq!(status_for_response(&lambda), Status::finished());
        let ecs = InstanceSyncResponse::Ecs(EcsSyncResponse {
            cluster_name: "c".to_string(),
            service_name: "s".to_string(),
            tasks: vec![],
            service_exists: false,
            status: CommandExecutionStatus::Success,
            error: None,
        });
        assert_eq!(status_for_response(&ecs), Status::finished());
    }

    #[test]
    fn test_live_resources_keep_polling() {
        let lambda = InstanceSyncResponse::AwsLambda(AwsLambdaSyncResponse {
            function_name: "fn".to_string(),
            function: Some(LambdaFunction {
                function_name: "fn".to_string(),
                version: "3".to_string(),
                function_arn: String::new(),
                runtime: None,
                last_modified: None,
            }),
            status: CommandExecutionStatus::Success,
            error: None,
        });
        assert_eq!(status_for_response(&lambda), Status::ongoing());

        let k8s = InstanceSyncResponse::K8s(K8sSyncResponse {
            namespace: "default".to_string(),
            release_name: Some("web".to_string()),
            cluster_name: None,
            pods: vec![],
            status: CommandExecutionStatus::Success,
            error: None,
        });
        assert_eq!(status_for_response(&k8s), Status::ongoing());
    }

    #[test]
    fn test_error_status() {
        let status = status_for_error(&SyncError::LockUnavailable("acc:im".to_string()));
        assert!(!status.success);
        assert!(status.retryable);
    }
}
