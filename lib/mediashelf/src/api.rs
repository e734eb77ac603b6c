use std::sync::Arc;

use serde::de::DeserializeOwned;
use shared::{
    ApiResponse, BatchRefreshRequest, BatchRefreshResponse, Candidate, IdentifyRequest, ItemId,
    LibraryPage, LibraryQuery, LibraryScope, MediaItemWithMetadata,
};
use tracing::debug;

use crate::{
    error::{Result, ShelfError},
    transport::{ApiRequest, Transport},
};

/// Typed view of the library endpoints over an injected [`Transport`].
///
/// Cloning is cheap; every clone shares the same transport.
#[derive(Clone)]
pub struct LibraryApi {
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for LibraryApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LibraryApi").finish_non_exhaustive()
    }
}

impl LibraryApi {
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self {
            transport: Arc::new(transport),
        }
    }

    pub fn from_shared(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    async fn call<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T> {
        let path = request.path.clone();
        let body = self.transport.send(request).await?;
        let envelope: ApiResponse<T> = serde_json::from_value(body)?;

        if !envelope.is_success() {
            debug!("{} answered code {}: {}", path, envelope.code, envelope.message);
            return Err(ShelfError::Api {
                code: envelope.code,
                message: envelope.message,
            });
        }
        envelope
            .data
            .ok_or_else(|| ShelfError::Decode(format!("{path}: success envelope without data")))
    }

    pub async fn list(&self, scope: LibraryScope, query: &LibraryQuery) -> Result<LibraryPage> {
        let page: LibraryPage = self
            .call(ApiRequest::get(scope.path()).with_query(query.to_pairs()))
            .await?;
        if let Some(bad) = page.items.iter().find(|item| !item.is_consistent()) {
            return Err(inconsistent(bad));
        }
        Ok(page)
    }

    pub async fn item(&self, id: ItemId) -> Result<MediaItemWithMetadata> {
        let item: MediaItemWithMetadata = self
            .call(ApiRequest::get(format!("/api/library/items/{id}")))
            .await?;
        if item.id() != id {
            return Err(ShelfError::Decode(format!(
                "asked for item {id}, server returned item {}",
                item.id()
            )));
        }
        if !item.is_consistent() {
            return Err(inconsistent(&item));
        }
        Ok(item)
    }

    /// Asks the server to re-resolve metadata; returns its status string.
    pub async fn refresh(&self, id: ItemId) -> Result<String> {
        self.call(ApiRequest::post(format!("/api/library/items/{id}/refresh")))
            .await
    }

    pub async fn batch_refresh(&self, ids: &[ItemId]) -> Result<BatchRefreshResponse> {
        let body = BatchRefreshRequest { ids: ids.to_vec() };
        self.call(ApiRequest::post("/api/library/batch/refresh").with_json(&body)?)
            .await
    }

    pub async fn candidates(&self, id: ItemId) -> Result<Vec<Candidate>> {
        self.call(ApiRequest::get(format!(
            "/api/library/items/{id}/candidates"
        )))
        .await
    }

    pub async fn identify(&self, id: ItemId, request: &IdentifyRequest) -> Result<String> {
        self.call(
            ApiRequest::post(format!("/api/library/items/{id}/identify")).with_json(request)?,
        )
        .await
    }
}

fn inconsistent(item: &MediaItemWithMetadata) -> ShelfError {
    ShelfError::Decode(format!(
        "item {} carries metadata for item {}",
        item.id(),
        item.metadata
            .as_ref()
            .map(|m| m.media_item_id)
            .unwrap_or_default()
    ))
}
