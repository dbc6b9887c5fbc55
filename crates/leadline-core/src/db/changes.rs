//! Row-change notification feed
//!
//! Replaces observed queries with an explicit publish-subscribe channel: the
//! store publishes a `ChangeEvent` after each committed mutation and
//! subscribers re-query whatever they display.

use tokio::sync::broadcast;

const CHANGE_CHANNEL_CAPACITY: usize = 256;

/// Table a change event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Lead,
    LeadNote,
    LeadStatus,
    CallLog,
    CallRecording,
}

/// What happened to the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Inserted,
    Updated,
    Deleted,
}

/// A committed row mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub entity: Entity,
    pub id: String,
    pub kind: ChangeKind,
}

/// Broadcast channel of committed row mutations.
///
/// Lagged subscribers lose old events, never new ones; a subscriber that
/// observes `RecvError::Lagged` should re-query from the store.
#[derive(Debug)]
pub struct ChangeFeed {
    tx: broadcast::Sender<ChangeEvent>,
}

impl ChangeFeed {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Subscribe to future change events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tx.subscribe()
    }

    /// Publish a committed mutation. A send with no subscribers is fine.
    pub fn publish(&self, entity: Entity, id: impl Into<String>, kind: ChangeKind) {
        let _ = self.tx.send(ChangeEvent {
            entity,
            id: id.into(),
            kind,
        });
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(flavor = "multi_thread")]
    async fn subscribers_receive_published_events() {
        let feed = ChangeFeed::new();
        let mut rx = feed.subscribe();

        feed.publish(Entity::Lead, "lead-1", ChangeKind::Inserted);
        let event = rx.recv().await.unwrap();
        assert_eq!(event.entity, Entity::Lead);
        assert_eq!(event.id, "lead-1");
        assert_eq!(event.kind, ChangeKind::Inserted);
    }

    #[test]
    fn publish_without_subscribers_does_not_panic() {
        let feed = ChangeFeed::new();
        feed.publish(Entity::CallLog, "call-1", ChangeKind::Deleted);
    }
}
