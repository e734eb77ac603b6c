use shared::ItemId;
use tokio::sync::broadcast;
use tracing::debug;

/// Notifications between otherwise independent controllers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LibraryEvent {
    /// Server-side state of the item changed; views showing it should re-fetch.
    ItemChanged(ItemId),
}

/// Fan-out of [`LibraryEvent`]s. Built once by the host and cloned into
/// every component that publishes or listens.
#[derive(Debug, Clone)]
pub struct LibraryEvents {
    sender: broadcast::Sender<LibraryEvent>,
}

impl LibraryEvents {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(64);
        Self { sender }
    }

    pub fn publish(&self, event: LibraryEvent) {
        // No subscribers is fine: nothing is showing the item.
        if self.sender.send(event).is_err() {
            debug!("No listeners for {:?}", event);
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LibraryEvent> {
        self.sender.subscribe()
    }
}

impl Default for LibraryEvents {
    fn default() -> Self {
        Self::new()
    }
}
