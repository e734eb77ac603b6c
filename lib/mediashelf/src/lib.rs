pub mod api;
pub mod config;
pub mod coordinator;
pub mod detail;
pub mod error;
pub mod events;
pub mod identify;
pub mod list;
pub mod refresh;
pub mod transport;

pub use api::LibraryApi;
pub use config::ClientConfig;
pub use coordinator::{Attempt, RequestCoordinator, RequestState};
pub use detail::ItemDetailController;
pub use error::{Result, ShelfError};
pub use events::{LibraryEvent, LibraryEvents};
pub use identify::{IdentificationWorkflow, IdentifyPhase};
pub use list::{ItemCard, LibraryListController, ListKey, ListView, QueryState};
pub use refresh::{BatchFailure, BatchOutcome, FailureReason, MetadataRefreshService};
pub use transport::{ApiRequest, HttpTransport, HttpTransportBuilder, Transport};
