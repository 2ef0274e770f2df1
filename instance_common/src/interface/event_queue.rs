use async_trait::async_trait;
use instance_defs::{DeploymentEvent, DeploymentEventPublisher};
use tokio::sync::mpsc;

/// Sending half of the in-process deployment event queue.
#[derive(Clone)]
pub struct DeploymentEventQueue {
    sender: mpsc::UnboundedSender<DeploymentEvent>,
}

pub struct DeploymentEventReceiver {
    receiver: mpsc::UnboundedReceiver<DeploymentEvent>,
}

pub fn deployment_event_channel() -> (DeploymentEventQueue, DeploymentEventReceiver) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (
        DeploymentEventQueue { sender },
        DeploymentEventReceiver { receiver },
    )
}

#[async_trait]
impl DeploymentEventPublisher for DeploymentEventQueue {
    async fn publish(&self, event: DeploymentEvent) -> Result<(), anyhow::Error> {
        self.sender
            .send(event)
            .map_err(|_| anyhow::anyhow!("Deployment event queue is closed"))
    }
}

impl DeploymentEventReceiver {
    pub fn try_recv(&mut self) -> Option<DeploymentEvent> {
        self.receiver.try_recv().ok()
    }
}
