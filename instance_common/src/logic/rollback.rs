use instance_defs::{DeploymentSummary, DeploymentSummaryStore, OnDemandRollbackInfo, SyncError};
use log::{info, warn};

/// Replaces the artifact of a rollback summary with the artifact of the
/// deployment it returns to.
///
/// An on-demand rollback names the execution it restores. Otherwise the most
/// recent summary with an equal key from a different execution is used.
/// Returns whether a previous deployment was found.
pub async fn resolve_rollback_artifact(
    store: &dyn DeploymentSummaryStore,
    summary: &mut DeploymentSummary,
    on_demand_rollback_info: Option<&OnDemandRollbackInfo>,
) -> Result<bool, SyncError> {
    let Some(key) = summary.deployment_key.clone() else {
        warn!(
            "Rollback summary of execution {} has no deployment key, keeping its artifact",
            summary.workflow_execution_id
        );
        return Ok(false);
    };

    let candidates = store
        .get_with_deployment_key(&summary.account_id, &summary.infra_mapping_id, &key)
        .await?;

    let previous = match on_demand_rollback_info.filter(|info| info.on_demand_rollback) {
        Some(info) => candidates.iter().rev().find(|candidate| {
            Some(&candidate.workflow_execution_id) == info.rollback_execution_id.as_ref()
        }),
        None => candidates
            .iter()
            .rev()
            .find(|candidate| candidate.workflow_execution_id != summary.workflow_execution_id),
    };

    match previous {
        Some(previous) => {
            info!(
                "Rollback in execution {} restores artifact {:?} build {:?} from execution {}",
                summary.workflow_execution_id,
                previous.artifact_name,
                previous.artifact_build_num,
                previous.workflow_execution_id
            );
            summary.copy_artifact_from(previous);
            Ok(true)
        }
        None => {
            info!(
                "No previous deployment for {} found, treating rollback in execution {} as a forward deployment",
                key.type_name(),
                summary.workflow_execution_id
            );
            Ok(false)
        }
    }
}
