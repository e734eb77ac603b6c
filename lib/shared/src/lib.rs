pub mod envelope;
pub mod identify;
pub mod image;
pub mod library;
pub mod refresh;

pub use envelope::ApiResponse;
pub use identify::{Candidate, CandidateType, IdentifyRequest};
pub use image::{image_source, ImageSize, ImageSource, DEFAULT_IMAGE_BASE};
pub use library::{
    ItemId, LibraryPage, LibraryQuery, LibraryScope, MediaItem, MediaItemWithMetadata, MediaType,
    SortKey, SortOrder, VideoMetadata,
};
pub use refresh::{BatchRefreshError, BatchRefreshRequest, BatchRefreshResponse};
