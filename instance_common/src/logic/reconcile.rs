use std::collections::{BTreeMap, BTreeSet, HashSet};

use instance_defs::{
    DeploymentInfo, DeploymentSummary, IdentityKey, InfraMapping, InstanceInfo, InstanceRecord,
};
use instance_utils::{new_id, non_blank};
use log::{debug, warn};

use super::scope::SyncScope;

/// Deployer recorded on instances that appeared without any deployment.
pub const AUTO_SCALE: &str = "AUTO_SCALE";

/// One observed provider resource, already normalised to identity space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveInstance {
    pub key: IdentityKey,
    pub info: InstanceInfo,
    /// Provider reported creation or start time, used as a tie-break.
    pub started_at: i64,
}

impl LiveInstance {
    pub fn new(info: InstanceInfo, infra_mapping_id: &str, started_at: i64) -> Self {
        LiveInstance {
            key: info.identity_key(infra_mapping_id),
            info,
            started_at,
        }
    }
}

pub struct ReconcileInput<'a> {
    pub infra_mapping: &'a InfraMapping,
    /// Every tracked record of the infra mapping, in or out of scope.
    pub tracked: &'a [InstanceRecord],
    pub live: Vec<LiveInstance>,
    pub scope: &'a SyncScope,
    pub deployment: Option<&'a DeploymentSummary>,
    pub now: i64,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ReconcilePlan {
    pub to_delete: BTreeSet<String>,
    pub to_add: Vec<InstanceRecord>,
    pub to_update: Vec<InstanceRecord>,
    /// Ids removed because another record with the same identity is newer.
    pub duplicates: BTreeSet<String>,
    /// Ids of in-scope records without a usable identity, left untouched.
    pub skipped: Vec<String>,
    pub tracked_count: usize,
    pub live_count: usize,
}

impl ReconcilePlan {
    pub fn is_empty(&self) -> bool {
        self.to_delete.is_empty() && self.to_add.is_empty() && self.to_update.is_empty()
    }

    pub fn added_keys(&self) -> BTreeSet<IdentityKey> {
        self.to_add
            .iter()
            .filter_map(|record| record.identity_key.clone())
            .collect()
    }

    /// Folds the plan of another scope of the same pass into this one.
    pub fn merge(&mut self, other: ReconcilePlan) {
        self.to_delete.extend(other.to_delete);
        self.duplicates.extend(other.duplicates);

        let mut added = self.added_keys();
        for record in other.to_add {
            let fresh = match &record.identity_key {
                Some(key) => added.insert(key.clone()),
                None => false,
            };
            if fresh {
                self.to_add.push(record);
            }
        }
        for record in other.to_update {
            if !self.to_update.iter().any(|u| u.id == record.id) {
                self.to_update.push(record);
            }
        }
        let to_delete = &self.to_delete;
        self.to_update.retain(|record| !to_delete.contains(&record.id));

        for id in other.skipped {
            if !self.skipped.contains(&id) {
                self.skipped.push(id);
            }
        }
        self.tracked_count += other.tracked_count;
        self.live_count += other.live_count;
    }
}

#[derive(Debug, Clone, Default)]
struct Provenance {
    workflow_execution_id: Option<String>,
    workflow_execution_name: Option<String>,
    artifact_id: Option<String>,
    artifact_name: Option<String>,
    artifact_build_num: Option<String>,
    deployed_by: Option<String>,
    deployed_at: i64,
}

impl Provenance {
    fn from_deployment(deployment: &DeploymentSummary, now: i64) -> Self {
        Provenance {
            workflow_execution_id: Some(deployment.workflow_execution_id.clone()),
            workflow_execution_name: deployment.workflow_execution_name.clone(),
            artifact_id: deployment.artifact_id.clone(),
            artifact_name: deployment.artifact_name.clone(),
            artifact_build_num: deployment.artifact_build_num.clone(),
            deployed_by: deployment.deployed_by.clone(),
            deployed_at: if deployment.deployed_at > 0 {
                deployment.deployed_at
            } else {
                now
            },
        }
    }

    fn from_record(record: &InstanceRecord) -> Self {
        Provenance {
            workflow_execution_id: record.last_workflow_execution_id.clone(),
            workflow_execution_name: record.last_workflow_execution_name.clone(),
            artifact_id: record.last_artifact_id.clone(),
            artifact_name: record.last_artifact_name.clone(),
            artifact_build_num: record.last_artifact_build_num.clone(),
            deployed_by: record.last_deployed_by.clone(),
            deployed_at: record.last_deployed_at,
        }
    }

    fn auto_scaled(now: i64) -> Self {
        Provenance {
            deployed_by: Some(AUTO_SCALE.to_string()),
            deployed_at: now,
            ..Default::default()
        }
    }

    fn apply(&self, record: &mut InstanceRecord) {
        record.last_workflow_execution_id = self.workflow_execution_id.clone();
        record.last_workflow_execution_name = self.workflow_execution_name.clone();
        record.last_artifact_id = self.artifact_id.clone();
        record.last_artifact_name = self.artifact_name.clone();
        record.last_artifact_build_num = self.artifact_build_num.clone();
        record.last_deployed_by = self.deployed_by.clone();
        record.last_deployed_at = self.deployed_at;
    }
}

/// Whether a deployment owns the provenance of an observed instance. A
/// blue/green Kubernetes deployment only owns pods of the colour it deployed.
pub fn deployment_applies(deployment: &DeploymentSummary, info: &InstanceInfo) -> bool {
    match (&deployment.deployment_info, info) {
        (DeploymentInfo::K8s(k8s), InstanceInfo::K8sPod(pod)) => {
            match non_blank(k8s.blue_green_stage_color.as_deref()) {
                Some(color) => non_blank(pod.blue_green_color.as_deref()) == Some(color),
                None => true,
            }
        }
        _ => true,
    }
}

fn recency(record: &InstanceRecord) -> (i64, Option<String>) {
    (
        record.last_deployed_at,
        record.last_workflow_execution_id.clone(),
    )
}

/// Diffs tracked records against the live set for one scope.
///
/// The result never deletes and adds the same identity, never touches
/// records outside `scope`, and is empty when run again after applying it
/// against an unchanged live set.
pub fn reconcile(input: ReconcileInput<'_>) -> ReconcilePlan {
    let ReconcileInput {
        infra_mapping,
        tracked,
        live,
        scope,
        deployment,
        now,
    } = input;
    let mut plan = ReconcilePlan::default();

    let tracked_keys: HashSet<&IdentityKey> = tracked
        .iter()
        .filter(|record| !record.is_deleted)
        .filter_map(|record| record.usable_identity())
        .collect();

    let mut owned: BTreeMap<IdentityKey, &InstanceRecord> = BTreeMap::new();
    for record in tracked
        .iter()
        .filter(|record| !record.is_deleted && scope.contains(record))
    {
        plan.tracked_count += 1;
        let Some(key) = record.usable_identity() else {
            warn!(
                "Instance {} of infra mapping {} has no usable identity, leaving it untouched",
                record.id, infra_mapping.id
            );
            plan.skipped.push(record.id.clone());
            continue;
        };
        match owned.get(key) {
            Some(current) if recency(record) > recency(current) => {
                plan.duplicates.insert(current.id.clone());
                owned.insert(key.clone(), record);
            }
            Some(_) => {
                plan.duplicates.insert(record.id.clone());
            }
            None => {
                owned.insert(key.clone(), record);
            }
        }
    }
    for id in &plan.duplicates {
        warn!(
            "Instance {} duplicates a newer record in infra mapping {}, deleting it",
            id, infra_mapping.id
        );
    }

    let mut observed: BTreeMap<IdentityKey, LiveInstance> = BTreeMap::new();
    for instance in live {
        if instance.key.is_blank() {
            warn!(
                "Ignoring live instance without identity in infra mapping {}",
                infra_mapping.id
            );
            continue;
        }
        match observed.get(&instance.key) {
            Some(current) if current.started_at >= instance.started_at => {}
            _ => {
                observed.insert(instance.key.clone(), instance);
            }
        }
    }
    plan.live_count = observed.len();

    for (key, record) in &owned {
        if !observed.contains_key(key) {
            plan.to_delete.insert(record.id.clone());
        }
    }
    plan.to_delete.extend(plan.duplicates.iter().cloned());

    // Auto-scaled records carry no deployment, so any sibling that does wins.
    let sibling = owned
        .values()
        .copied()
        .filter(|record| record.last_workflow_execution_id.is_some())
        .max_by_key(|record| recency(record))
        .or_else(|| owned.values().copied().max_by_key(|record| recency(record)));

    for (key, instance) in observed {
        let applicable = deployment.filter(|d| deployment_applies(d, &instance.info));
        match owned.get(&key) {
            Some(record) => {
                let mut candidate = (*record).clone();
                candidate.instance_info.refresh_from(&instance.info);
                if let Some(deployment) = applicable {
                    Provenance::from_deployment(deployment, now).apply(&mut candidate);
                }
                if candidate.metadata() != record.metadata() {
                    candidate.updated_at = now;
                    plan.to_update.push(candidate);
                }
            }
            None if tracked_keys.contains(&key) => {
                debug!("{} is tracked outside scope {}, skipping", key, scope);
            }
            None => {
                let provenance = match (applicable, sibling) {
                    (Some(deployment), _) => Provenance::from_deployment(deployment, now),
                    (None, Some(sibling)) => Provenance::from_record(sibling),
                    (None, None) => Provenance::auto_scaled(now),
                };
                let mut record = InstanceRecord {
                    id: new_id(),
                    account_id: infra_mapping.account_id.clone(),
                    app_id: infra_mapping.app_id.clone(),
                    infra_mapping_id: infra_mapping.id.clone(),
                    infra_mapping_type: infra_mapping.infra_mapping_type,
                    identity_key: Some(key),
                    instance_info: instance.info,
                    last_workflow_execution_id: None,
                    last_workflow_execution_name: None,
                    last_artifact_id: None,
                    last_artifact_name: None,
                    last_artifact_build_num: None,
                    last_deployed_by: None,
                    last_deployed_at: 0,
                    created_at: now,
                    updated_at: now,
                    is_deleted: false,
                    deleted_at: None,
                };
                provenance.apply(&mut record);
                plan.to_add.push(record);
            }
        }
    }

    plan
}
