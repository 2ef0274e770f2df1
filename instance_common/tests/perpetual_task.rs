mod utils;
use utils::*;

#[cfg(test)]
mod perpetual_task_tests {
    use super::*;
    use instance_common::logic::AUTO_SCALE;
    use instance_defs::{
        CommandExecutionStatus, FeatureName, InfraMapping, InfraMappingType, InstanceSyncResponse,
        K8sSyncResponse, PcfSyncResponse, PerpetualTaskClient, ProviderError, ProviderErrorKind,
        Status, SyncError,
    };
    use pretty_assertions::assert_eq;

    const MOVE_PCF: FeatureName = FeatureName::MovePcfInstanceSyncToPerpetualTask;

    fn pcf_response(indexes: &[u32]) -> InstanceSyncResponse {
        InstanceSyncResponse::Pcf(PcfSyncResponse {
            application_name: "orders".to_string(),
            instances: indexes.iter().map(|i| pcf_instance(*i)).collect(),
            application_exists: true,
            status: CommandExecutionStatus::Success,
            error: None,
        })
    }

    fn failed_response(kind: ProviderErrorKind) -> InstanceSyncResponse {
        InstanceSyncResponse::Pcf(PcfSyncResponse {
            application_name: "orders".to_string(),
            instances: vec![],
            application_exists: true,
            status: CommandExecutionStatus::Failure,
            error: Some(ProviderError {
                kind,
                message: "cloud foundry API returned an error".to_string(),
            }),
        })
    }

    async fn pcf_with_task(h: &Harness) -> (InfraMapping, String) {
        let mapping = h.add_mapping("im-pcf", InfraMappingType::PcfPcf).await;
        let ids = h.tasks.create_perpetual_tasks(&mapping).await.unwrap();
        (mapping, ids[0].clone())
    }

    #[tokio::test]
    async fn test_perpetual_task_writes_wait_for_feature_flag() {
        let h = Harness::new();
        let (_mapping, task_id) = pcf_with_task(&h).await;
        let response = pcf_response(&[0, 1]);

        let status = h
            .service
            .handle_perpetual_task_response(&task_id, &response)
            .await
            .unwrap();
        assert_eq!(status, Status::ongoing());
        assert_eq!(h.instances.write_count(), 0);

        h.flags.enable(ACCOUNT, MOVE_PCF);
        let status = h
            .service
            .handle_perpetual_task_response(&task_id, &response)
            .await
            .unwrap();

        assert_eq!(status, Status::ongoing());
        let records = h.live_records("im-pcf").await;
        assert_eq!(records.len(), 2);
        // Nothing tracked and no deployment to attribute the instances to.
        assert!(records
            .iter()
            .all(|r| r.last_deployed_by.as_deref() == Some(AUTO_SCALE)));
        assert_eq!(h.tasks.list_tasks(ACCOUNT, "im-pcf").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_deleted_mapping_removes_its_tasks() {
        let h = Harness::new();
        let (_mapping, task_id) = pcf_with_task(&h).await;
        h.mappings.remove("im-pcf").await;

        let status = h
            .service
            .handle_perpetual_task_response(&task_id, &pcf_response(&[0]))
            .await
            .unwrap();

        assert_eq!(status, Status::finished());
        assert!(h.tasks.list_tasks(ACCOUNT, "im-pcf").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_transient_failure_resets_task() {
        let h = Harness::new();
        let (_mapping, task_id) = pcf_with_task(&h).await;

        let status = h
            .service
            .handle_perpetual_task_response(&task_id, &failed_response(ProviderErrorKind::Transient))
            .await
            .unwrap();

        assert!(!status.success);
        assert!(status.retryable);
        assert_eq!(h.tasks.resets(), vec![task_id]);
        assert_eq!(h.tasks.list_tasks(ACCOUNT, "im-pcf").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_not_found_failure_stops_polling() {
        let h = Harness::new();
        let (_mapping, task_id) = pcf_with_task(&h).await;

        let status = h
            .service
            .handle_perpetual_task_response(&task_id, &failed_response(ProviderErrorKind::NotFound))
            .await
            .unwrap();

        assert_eq!(
            status,
            Status::failed("cloud foundry API returned an error", false)
        );
        assert!(h.tasks.resets().is_empty());
        assert!(h.tasks.list_tasks(ACCOUNT, "im-pcf").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_gone_application_finishes_task_and_clears_instances() {
        let h = Harness::new();
        h.flags.enable(ACCOUNT, MOVE_PCF);
        let (mapping, task_id) = pcf_with_task(&h).await;
        h.instances
            .insert_all(vec![
                record("G0", &mapping, pcf_info(0), Some("we-1"), 1),
                record("G1", &mapping, pcf_info(1), Some("we-1"), 1),
            ])
            .await;
        let response = InstanceSyncResponse::Pcf(PcfSyncResponse {
            application_name: "orders".to_string(),
            instances: vec![],
            application_exists: false,
            status: CommandExecutionStatus::Success,
            error: None,
        });

        let status = h
            .service
            .handle_perpetual_task_response(&task_id, &response)
            .await
            .unwrap();

        assert_eq!(status, Status::finished());
        assert!(h.live_records("im-pcf").await.is_empty());
        assert!(h.tasks.list_tasks(ACCOUNT, "im-pcf").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_foreign_response_is_not_retried() {
        let h = Harness::new();
        let (_mapping, task_id) = pcf_with_task(&h).await;
        let response = InstanceSyncResponse::K8s(K8sSyncResponse {
            namespace: "default".to_string(),
            release_name: Some("web".to_string()),
            cluster_name: None,
            pods: vec![],
            status: CommandExecutionStatus::Success,
            error: None,
        });

        let status = h
            .service
            .handle_perpetual_task_response(&task_id, &response)
            .await
            .unwrap();

        assert!(!status.success);
        assert!(!status.retryable);
        assert!(h.tasks.list_tasks(ACCOUNT, "im-pcf").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_task_is_gone() {
        let h = Harness::new();
        let err = h
            .service
            .handle_perpetual_task_response("no-such-task", &pcf_response(&[0]))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::ResourceGone(_)));
    }

    #[tokio::test]
    async fn test_iterator_skips_mappings_owned_by_perpetual_tasks() {
        let h = Harness::new();
        let mapping = h.add_mapping("im-pcf", InfraMappingType::PcfPcf).await;
        h.instances
            .insert_all(vec![record("G0", &mapping, pcf_info(0), None, 1)])
            .await;
        h.flags
            .enable(ACCOUNT, FeatureName::StopInstanceSyncViaIteratorForPcf);

        let outcome = h.service.iterator_sync("app-1", "im-pcf").await.unwrap();

        assert_eq!(outcome, None);
        assert_eq!(h.providers.calls(), 0);
    }

    #[tokio::test]
    async fn test_iterator_falls_back_when_perpetual_tasks_disabled() {
        let h = Harness::new();
        let (_mapping, _task_id) = pcf_with_task(&h).await;

        let outcome = h.service.iterator_sync("app-1", "im-pcf").await.unwrap();

        assert!(outcome.is_some());
        assert!(h.tasks.list_tasks(ACCOUNT, "im-pcf").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_last_instance_gone_deletes_tasks() {
        let h = Harness::new();
        h.flags.enable(ACCOUNT, MOVE_PCF);
        let (mapping, _task_id) = pcf_with_task(&h).await;
        h.instances
            .insert_all(vec![record("G0", &mapping, pcf_info(0), Some("we-1"), 1)])
            .await;

        let outcome = h
            .service
            .iterator_sync("app-1", "im-pcf")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(outcome.deleted, 1);
        assert_eq!(outcome.instance_count, 0);
        assert!(h.tasks.list_tasks(ACCOUNT, "im-pcf").await.unwrap().is_empty());
    }
}
