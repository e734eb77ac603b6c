use std::fmt;

use serde::{Deserialize, Serialize};

/// Server-assigned identity of a library item.
pub type ItemId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Movie,
    Tv,
    Comic,
    Book,
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaType::Movie => write!(f, "movie"),
            MediaType::Tv => write!(f, "tv"),
            MediaType::Comic => write!(f, "comic"),
            MediaType::Book => write!(f, "book"),
        }
    }
}

/// A file-backed library entry as last seen from the server.
///
/// The client never edits these fields; a re-fetch replaces the whole record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaItem {
    pub id: ItemId,
    pub library_folder_id: i64,
    pub media_type: MediaType,
    pub title: String,
    pub file_path: String,
    pub file_size: i64,
    pub added_at: String,
    pub updated_at: String,
}

/// Provider enrichment attached to at most one [`MediaItem`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoMetadata {
    #[serde(default)]
    pub id: Option<i64>,
    pub media_item_id: ItemId,
    pub tmdb_id: Option<i64>,
    pub tvdb_id: Option<i64>,
    pub imdb_id: Option<String>,
    pub overview: Option<String>,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    pub release_date: Option<String>,
    pub runtime: Option<i32>,
    pub vote_average: Option<f64>,
    pub vote_count: Option<i32>,
    /// Serialized list, e.g. `["Drama","Science Fiction"]`.
    pub genres: Option<String>,
}

impl VideoMetadata {
    /// Year component of `release_date` (`YYYY-MM-DD`).
    pub fn year(&self) -> Option<i32> {
        self.release_date
            .as_deref()
            .and_then(|date| date.split('-').next())
            .and_then(|year| year.trim().parse().ok())
    }

    /// Runtime formatted as `2h 35m` or `45m`.
    pub fn runtime_display(&self) -> Option<String> {
        let minutes = self.runtime.filter(|m| *m > 0)?;
        let (hours, rest) = (minutes / 60, minutes % 60);
        Some(match (hours, rest) {
            (0, m) => format!("{m}m"),
            (h, 0) => format!("{h}h"),
            (h, m) => format!("{h}h {m}m"),
        })
    }

    pub fn rating_display(&self) -> Option<String> {
        self.vote_average.map(|rating| format!("{rating:.1}"))
    }

    /// Decodes the serialized genre list.
    ///
    /// Older records store a plain comma-separated string, which is accepted too.
    pub fn genres(&self) -> Vec<String> {
        let Some(raw) = self.genres.as_deref().map(str::trim) else {
            return Vec::new();
        };
        if raw.is_empty() {
            return Vec::new();
        }
        serde_json::from_str::<Vec<String>>(raw).unwrap_or_else(|_| {
            raw.split(',')
                .map(str::trim)
                .filter(|genre| !genre.is_empty())
                .map(String::from)
                .collect()
        })
    }
}

/// The unit rendered by list and detail views.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaItemWithMetadata {
    #[serde(flatten)]
    pub item: MediaItem,
    #[serde(default)]
    pub metadata: Option<VideoMetadata>,
}

impl MediaItemWithMetadata {
    pub fn id(&self) -> ItemId {
        self.item.id
    }

    /// Metadata, when present, must belong to this item.
    pub fn is_consistent(&self) -> bool {
        self.metadata
            .as_ref()
            .map_or(true, |metadata| metadata.media_item_id == self.item.id)
    }

    /// An item without metadata has not been matched to a provider yet.
    pub fn is_identified(&self) -> bool {
        self.metadata.is_some()
    }

    pub fn display_year(&self) -> Option<i32> {
        self.metadata.as_ref().and_then(VideoMetadata::year)
    }
}

/// Which list endpoint a view is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LibraryScope {
    #[default]
    All,
    Movies,
    Tv,
}

impl LibraryScope {
    pub fn path(&self) -> &'static str {
        match self {
            LibraryScope::All => "/api/library",
            LibraryScope::Movies => "/api/library/movies",
            LibraryScope::Tv => "/api/library/tv",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    Title,
    Year,
    Rating,
    #[default]
    Added,
}

impl SortKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortKey::Title => "title",
            SortKey::Year => "year",
            SortKey::Rating => "rating",
            SortKey::Added => "added",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn flipped(self) -> Self {
        match self {
            SortOrder::Asc => SortOrder::Desc,
            SortOrder::Desc => SortOrder::Asc,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

/// Query parameters of a list request. Replaced wholesale, never patched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct LibraryQuery {
    /// 1-indexed; only honoured together with `limit`.
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub sort: Option<SortKey>,
    pub order: Option<SortOrder>,
    pub search: Option<String>,
}

impl LibraryQuery {
    /// Query-string pairs, skipping unset values and blank search text.
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(page) = self.page {
            pairs.push(("page", page.to_string()));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }
        if let Some(sort) = self.sort {
            pairs.push(("sort", sort.as_str().to_string()));
        }
        if let Some(order) = self.order {
            pairs.push(("order", order.as_str().to_string()));
        }
        if let Some(search) = self.search.as_deref().map(str::trim) {
            if !search.is_empty() {
                pairs.push(("search", search.to_string()));
            }
        }
        pairs
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryPage {
    pub items: Vec<MediaItemWithMetadata>,
    pub total: usize,
}

impl LibraryPage {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
