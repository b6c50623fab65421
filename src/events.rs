//! Broadcast notifications for drive mutations. Fire-and-forget: a send with
//! no subscribers is not an error.

use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type")]
pub enum DriveEvent {
    Created { id: Uuid },
    Updated { id: Uuid },
    Moved { id: Uuid, new_parent: Option<Uuid> },
    Deleted { id: Uuid },
    Shared { id: Uuid, principal: String },
    Unshared { id: Uuid, principal: String },
}

#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<DriveEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(100);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DriveEvent> {
        self.tx.subscribe()
    }

    pub fn send(&self, event: DriveEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
