use serde::{Deserialize, Serialize};

/// Uniform wrapper around every response body.
///
/// A non-2xx `code` is a failure even when the HTTP status was 200.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub code: u16,
    #[serde(default)]
    pub message: String,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.code)
    }
}
