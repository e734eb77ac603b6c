//! The seam between the data layer and whatever actually talks HTTP.
//!
//! Controllers only ever see a [`Transport`]; the host builds one at startup
//! and hands clones of the resulting [`crate::LibraryApi`] to each controller.

mod http;

pub use http::{HttpTransport, HttpTransportBuilder};

use async_trait::async_trait;
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;

use crate::error::Result;

/// One request against the library API.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Absolute API path, e.g. `/api/library/items/7`.
    pub path: String,
    pub query: Vec<(&'static str, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self {
            method: Method::POST,
            ..Self::get(path)
        }
    }

    pub fn with_query(mut self, query: Vec<(&'static str, String)>) -> Self {
        self.query = query;
        self
    }

    pub fn with_json<B: Serialize>(mut self, body: &B) -> Result<Self> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends the request and returns the parsed envelope body.
    ///
    /// Implementations report network and parse failures as
    /// [`crate::ShelfError::Transport`] / [`crate::ShelfError::Decode`]; they do
    /// not interpret the envelope `code`.
    async fn send(&self, request: ApiRequest) -> Result<Value>;
}
