/// Image host used by TMDB paths such as `/abc.jpg`.
pub const DEFAULT_IMAGE_BASE: &str = "https://image.tmdb.org/t/p";

/// Size token per rendering context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageSize {
    Thumbnail,
    List,
    Detail,
    Backdrop,
}

impl ImageSize {
    pub fn token(&self) -> &'static str {
        match self {
            ImageSize::Thumbnail => "w92",
            ImageSize::List => "w342",
            ImageSize::Detail => "w500",
            ImageSize::Backdrop => "w1280",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    Remote(String),
    /// No path known: render a placeholder instead of requesting a broken image.
    Placeholder,
}

impl ImageSource {
    pub fn url(&self) -> Option<&str> {
        match self {
            ImageSource::Remote(url) => Some(url),
            ImageSource::Placeholder => None,
        }
    }
}

/// Builds the URL for a provider image path.
///
/// Absolute URLs (AniList and Bangumi hand those out) pass through unchanged.
pub fn image_source(base: &str, path: Option<&str>, size: ImageSize) -> ImageSource {
    let Some(path) = path.map(str::trim).filter(|p| !p.is_empty()) else {
        return ImageSource::Placeholder;
    };
    if path.starts_with("http://") || path.starts_with("https://") {
        return ImageSource::Remote(path.to_string());
    }
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    ImageSource::Remote(format!("{base}/{}/{path}", size.token()))
}
