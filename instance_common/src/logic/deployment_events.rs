use std::sync::Arc;

use log::debug;

use super::sync_service::{EventOutcome, InstanceSyncService};
use crate::interface::DeploymentEventReceiver;

/// Feeds queued deployment events into the sync service.
pub struct DeploymentEventConsumer {
    service: Arc<InstanceSyncService>,
    receiver: DeploymentEventReceiver,
}

impl DeploymentEventConsumer {
    pub fn new(service: Arc<InstanceSyncService>, receiver: DeploymentEventReceiver) -> Self {
        DeploymentEventConsumer { service, receiver }
    }

    /// Handles events until the queue is empty, requeued retries included.
    pub async fn drain(&mut self) -> Vec<EventOutcome> {
        let mut outcomes = vec![];
        while let Some(event) = self.receiver.try_recv() {
            debug!(
                "Consuming deployment event with {} summaries (retry {})",
                event.deployment_summaries.len(),
                event.retries
            );
            outcomes.push(self.service.handle_deployment_event(event).await);
        }
        outcomes
    }
}
