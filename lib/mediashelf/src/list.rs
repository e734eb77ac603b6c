use shared::{
    image_source, ImageSize, ImageSource, ItemId, LibraryPage, LibraryQuery, LibraryScope,
    MediaItemWithMetadata, SortKey, SortOrder, DEFAULT_IMAGE_BASE,
};
use tokio::sync::watch;
use tracing::info;

use crate::{
    api::LibraryApi,
    coordinator::{Attempt, RequestCoordinator, RequestState},
    error::ShelfError,
};

/// User-controlled parameters of a list view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryState {
    pub search: String,
    pub sort: SortKey,
    pub order: SortOrder,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl Default for QueryState {
    fn default() -> Self {
        Self {
            search: String::new(),
            sort: SortKey::Added,
            order: SortOrder::Desc,
            page: None,
            limit: None,
        }
    }
}

impl QueryState {
    pub fn to_query(&self) -> LibraryQuery {
        let search = self.search.trim();
        LibraryQuery {
            page: self.page,
            limit: self.limit,
            sort: Some(self.sort),
            order: Some(self.order),
            search: (!search.is_empty()).then(|| search.to_string()),
        }
    }
}

/// In-flight identity of a list request: same endpoint and same parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListKey {
    pub scope: LibraryScope,
    pub query: LibraryQuery,
}

/// What a list view should render.
#[derive(Debug, Clone, PartialEq)]
pub enum ListView {
    /// Nothing requested yet.
    Idle,
    Loading,
    Failed(ShelfError),
    /// A completed, successful fetch that matched nothing.
    NoMatches,
    Items(LibraryPage),
}

/// Grid card projection of one item.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemCard {
    pub id: ItemId,
    pub title: String,
    pub year: Option<i32>,
    pub rating: Option<String>,
    pub poster: ImageSource,
    pub identified: bool,
}

impl ItemCard {
    pub fn new(item: &MediaItemWithMetadata, image_base: &str) -> Self {
        let metadata = item.metadata.as_ref();
        Self {
            id: item.id(),
            title: item.item.title.clone(),
            year: item.display_year(),
            rating: metadata.and_then(|m| m.rating_display()),
            poster: image_source(
                image_base,
                metadata.and_then(|m| m.poster_path.as_deref()),
                ImageSize::List,
            ),
            identified: item.is_identified(),
        }
    }
}

/// Serves one of the all/movies/tv listings.
///
/// Every parameter change goes through a single coordinator, so only the
/// newest request's page is ever shown.
#[derive(Debug)]
pub struct LibraryListController {
    api: LibraryApi,
    scope: LibraryScope,
    image_base: String,
    query: watch::Sender<QueryState>,
    requests: RequestCoordinator<ListKey, LibraryPage>,
}

impl LibraryListController {
    pub fn new(api: LibraryApi, scope: LibraryScope) -> Self {
        let (query, _) = watch::channel(QueryState::default());
        Self {
            api,
            scope,
            image_base: DEFAULT_IMAGE_BASE.to_string(),
            query,
            requests: RequestCoordinator::new("library-list"),
        }
    }

    pub fn with_image_base(mut self, image_base: impl Into<String>) -> Self {
        self.image_base = image_base.into();
        self
    }

    pub fn scope(&self) -> LibraryScope {
        self.scope
    }

    pub fn query(&self) -> QueryState {
        self.query.borrow().clone()
    }

    pub fn subscribe_query(&self) -> watch::Receiver<QueryState> {
        self.query.subscribe()
    }

    pub fn state(&self) -> RequestState<ListKey, LibraryPage> {
        self.requests.state()
    }

    pub fn subscribe(&self) -> watch::Receiver<RequestState<ListKey, LibraryPage>> {
        self.requests.subscribe()
    }

    /// Fetches with the current parameters, e.g. when the view first mounts.
    pub async fn load(&self) -> Attempt<LibraryPage> {
        let query = self.query.borrow().to_query();
        self.fetch(query).await
    }

    /// Updates the search box without fetching; see [`Self::submit_search`].
    pub fn set_search_text(&self, text: impl Into<String>) {
        let text = text.into();
        self.query.send_if_modified(|state| {
            if state.search == text {
                return false;
            }
            state.search = text;
            true
        });
    }

    /// Re-fetches with the current search text, back on the first page.
    pub async fn submit_search(&self) -> Attempt<LibraryPage> {
        let query = self.update(|state| {
            if state.page.is_some() {
                state.page = Some(1);
            }
        });
        self.fetch(query).await
    }

    pub async fn toggle_sort_order(&self) -> Attempt<LibraryPage> {
        let query = self.update(|state| state.order = state.order.flipped());
        self.fetch(query).await
    }

    pub async fn set_sort(&self, sort: SortKey) -> Attempt<LibraryPage> {
        let query = self.update(|state| state.sort = sort);
        self.fetch(query).await
    }

    /// Replaces every parameter at once and fetches a single time.
    pub async fn apply_query(&self, query: QueryState) -> Attempt<LibraryPage> {
        let query = self.update(|state| *state = query);
        self.fetch(query).await
    }

    pub async fn set_page(&self, page: u32, limit: u32) -> Attempt<LibraryPage> {
        let query = self.update(|state| {
            state.page = Some(page.max(1));
            state.limit = Some(limit);
        });
        self.fetch(query).await
    }

    pub fn view(&self) -> ListView {
        let state = self.requests.state();
        if state.loading {
            return ListView::Loading;
        }
        match (state.error, state.data) {
            (Some(error), _) => ListView::Failed(error),
            (None, None) => ListView::Idle,
            (None, Some(page)) if page.is_empty() => ListView::NoMatches,
            (None, Some(page)) => ListView::Items(page),
        }
    }

    /// Cards for the page currently on display.
    pub fn cards(&self) -> Vec<ItemCard> {
        self.requests
            .state()
            .data
            .map(|page| {
                page.items
                    .iter()
                    .map(|item| ItemCard::new(item, &self.image_base))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn update(&self, change: impl FnOnce(&mut QueryState)) -> LibraryQuery {
        let mut query = LibraryQuery::default();
        self.query.send_modify(|state| {
            change(state);
            query = state.to_query();
        });
        query
    }

    async fn fetch(&self, query: LibraryQuery) -> Attempt<LibraryPage> {
        let key = ListKey {
            scope: self.scope,
            query: query.clone(),
        };
        let api = self.api.clone();
        let scope = self.scope;
        let attempt = self
            .requests
            .send(key, move || async move { api.list(scope, &query).await })
            .await;

        if let Attempt::Applied(Ok(page)) = &attempt {
            info!(
                "{} returned {} of {} items",
                scope.path(),
                page.items.len(),
                page.total
            );
        }
        attempt
    }
}
