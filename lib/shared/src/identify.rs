use std::fmt;

use serde::{Deserialize, Serialize};

/// Media type as reported by a metadata provider.
///
/// Wider than the library's own types: providers such as AniList classify
/// titles as anime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CandidateType {
    Movie,
    Tv,
    Anime,
    #[default]
    #[serde(other)]
    Unknown,
}

impl fmt::Display for CandidateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CandidateType::Movie => write!(f, "movie"),
            CandidateType::Tv => write!(f, "tv"),
            CandidateType::Anime => write!(f, "anime"),
            CandidateType::Unknown => write!(f, "unknown"),
        }
    }
}

/// A possible provider match for a library item, not yet applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Provider-specific id.
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub original_title: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub media_type: CandidateType,
    /// Full poster URL or provider-relative path.
    #[serde(default)]
    pub poster: Option<String>,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub rating: Option<f64>,
    /// `tmdb`, `anilist`, `bangumi`, ...
    pub provider: String,
    #[serde(default)]
    pub score: Option<i32>,
    #[serde(default)]
    pub confidence: Option<String>,
}

impl Candidate {
    /// `Title (Year)` label used in candidate lists.
    pub fn label(&self) -> String {
        match self.year {
            Some(year) => format!("{} ({year})", self.title),
            None => self.title.clone(),
        }
    }
}

/// Body of `POST /api/library/items/{id}/identify`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdentifyRequest {
    pub provider: String,
    pub provider_id: String,
    #[serde(rename = "type")]
    pub media_type: String,
}

impl IdentifyRequest {
    /// The candidate's type wins over the item's current classification,
    /// which is what lets identification fix a movie filed as a show.
    pub fn from_candidate(candidate: &Candidate) -> Self {
        Self {
            provider: candidate.provider.clone(),
            provider_id: candidate.id.clone(),
            media_type: candidate.media_type.to_string(),
        }
    }
}
