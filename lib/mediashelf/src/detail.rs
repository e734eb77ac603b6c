use shared::{
    image_source, ImageSize, ImageSource, ItemId, MediaItemWithMetadata, DEFAULT_IMAGE_BASE,
};
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use crate::{
    api::LibraryApi,
    coordinator::{Attempt, RequestCoordinator, RequestState},
    events::LibraryEvent,
};

/// Keeps a detail view in step with the item id from the route.
///
/// The id is a watched dependency: changing it starts a fetch for the new id
/// and makes any fetch for the old one stale.
#[derive(Debug)]
pub struct ItemDetailController {
    api: LibraryApi,
    image_base: String,
    route: watch::Sender<Option<ItemId>>,
    requests: RequestCoordinator<ItemId, MediaItemWithMetadata>,
}

impl ItemDetailController {
    pub fn new(api: LibraryApi) -> Self {
        let (route, _) = watch::channel(None);
        Self {
            api,
            image_base: DEFAULT_IMAGE_BASE.to_string(),
            route,
            requests: RequestCoordinator::new("item-detail"),
        }
    }

    pub fn with_image_base(mut self, image_base: impl Into<String>) -> Self {
        self.image_base = image_base.into();
        self
    }

    pub fn current_id(&self) -> Option<ItemId> {
        *self.route.borrow()
    }

    pub fn state(&self) -> RequestState<ItemId, MediaItemWithMetadata> {
        self.requests.state()
    }

    pub fn subscribe(&self) -> watch::Receiver<RequestState<ItemId, MediaItemWithMetadata>> {
        self.requests.subscribe()
    }

    /// The loaded item, but only if it is the one currently addressed.
    pub fn item(&self) -> Option<MediaItemWithMetadata> {
        let current = self.current_id()?;
        self.requests
            .state()
            .data
            .filter(|item| item.id() == current)
    }

    pub fn poster(&self) -> ImageSource {
        self.image(ImageSize::Detail, |item| {
            item.metadata.as_ref().and_then(|m| m.poster_path.clone())
        })
    }

    pub fn backdrop(&self) -> ImageSource {
        self.image(ImageSize::Backdrop, |item| {
            item.metadata.as_ref().and_then(|m| m.backdrop_path.clone())
        })
    }

    /// First mount: always fetches, even if `id` equals the previous value.
    pub async fn mount(&self, id: ItemId) -> Attempt<MediaItemWithMetadata> {
        self.route.send_replace(Some(id));
        self.fetch(id).await
    }

    /// Route change. Fetches only when the id actually changed.
    pub async fn navigate(&self, id: ItemId) -> Option<Attempt<MediaItemWithMetadata>> {
        let changed = self.route.send_if_modified(|current| {
            if *current == Some(id) {
                return false;
            }
            *current = Some(id);
            true
        });
        if !changed {
            debug!("Route already at item {id}");
            return None;
        }
        Some(self.fetch(id).await)
    }

    /// Re-reads the current item, e.g. after a refresh or identify.
    ///
    /// Never joins a read that is still pending, since that read may predate
    /// the write being caught up on.
    pub async fn refetch(&self) -> Option<Attempt<MediaItemWithMetadata>> {
        let id = self.current_id()?;
        let api = self.api.clone();
        let attempt = self
            .requests
            .send_fresh(id, move || async move { api.item(id).await })
            .await;
        Some(attempt)
    }

    pub async fn handle_event(&self, event: &LibraryEvent) -> Option<Attempt<MediaItemWithMetadata>> {
        match event {
            LibraryEvent::ItemChanged(id) if Some(*id) == self.current_id() => {
                info!("Item {id} changed on the server, re-fetching");
                self.refetch().await
            }
            LibraryEvent::ItemChanged(_) => None,
        }
    }

    /// Re-fetches on every matching event until the channel closes.
    pub async fn follow(&self, mut events: broadcast::Receiver<LibraryEvent>) {
        loop {
            match events.recv().await {
                Ok(event) => {
                    self.handle_event(&event).await;
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Missed {skipped} library events, re-fetching to be safe");
                    self.refetch().await;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }

    fn image(
        &self,
        size: ImageSize,
        path: impl FnOnce(&MediaItemWithMetadata) -> Option<String>,
    ) -> ImageSource {
        let path = self.item().as_ref().and_then(path);
        image_source(&self.image_base, path.as_deref(), size)
    }

    async fn fetch(&self, id: ItemId) -> Attempt<MediaItemWithMetadata> {
        let api = self.api.clone();
        self.requests
            .send(id, move || async move { api.item(id).await })
            .await
    }
}
