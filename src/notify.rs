//! Change notifications
//!
//! Every persisted state change is announced on a broadcast channel.
//! Delivery is fire-and-forget: with no subscriber the notification is
//! dropped, and slow subscribers may lag and miss messages.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use crate::store::Entity;

/// Capacity of the notification channel
const CHANNEL_CAPACITY: usize = 256;

/// A single entity change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeNotification {
    pub entity_type: String,
    pub entity_id: String,
    /// Full entity after the change, or null after a deletion
    pub entity: serde_json::Value,
}

/// Fan-out of change notifications
#[derive(Debug, Clone)]
pub struct Notifier {
    sender: broadcast::Sender<ChangeNotification>,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Wrap in Arc for sharing
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeNotification> {
        self.sender.subscribe()
    }

    /// Announce the current state of an entity
    pub fn changed<T: Entity>(&self, entity: &T) {
        let value = match serde_json::to_value(entity) {
            Ok(value) => value,
            Err(e) => {
                debug!("Skipping notification for {} {}: {}", T::KIND, entity.id(), e);
                return;
            }
        };
        self.emit(ChangeNotification {
            entity_type: T::KIND.to_string(),
            entity_id: entity.id().to_string(),
            entity: value,
        });
    }

    /// Announce a deletion
    pub fn deleted<T: Entity>(&self, id: &str) {
        self.emit(ChangeNotification {
            entity_type: T::KIND.to_string(),
            entity_id: id.to_string(),
            entity: serde_json::Value::Null,
        });
    }

    fn emit(&self, notification: ChangeNotification) {
        // an error only means nobody is listening
        let _ = self.sender.send(notification);
    }
}
