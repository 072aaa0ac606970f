//! Remote store client
//!
//! Typed wrapper over the clip REST endpoints. Every call is a single attempt;
//! retries, fallbacks and rollbacks belong to the sync engine.

pub mod http;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::clip::Clip;

pub use http::HttpRemoteStore;

/// Maximum number of clips the store returns from a listing
pub const PAGE_SIZE: usize = 100;

/// Media type every well-formed response must declare
pub const ENVELOPE_CONTENT_TYPE: &str = "application/json";

/// Remote store failures. Every variant means the store is unavailable for
/// this request; callers recover locally.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Request never completed (connect, timeout, body read)
    #[error("Remote store unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-2xx status
    #[error("Remote store returned HTTP {0}")]
    Status(u16),

    /// Response was not the JSON envelope, e.g. an HTML fallback page
    #[error("Remote store returned unexpected content type {}", .0.as_deref().unwrap_or("<none>"))]
    ContentType(Option<String>),

    /// Envelope could not be decoded
    #[error("Malformed response envelope: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Envelope reported `success: false`
    #[error("Remote store rejected the request: {0}")]
    Rejected(String),

    /// Configured endpoint cannot be used to build request URLs
    #[error("Invalid remote store URL: {0}")]
    InvalidUrl(String),
}

/// `{success, data?, error?}` wrapper used by every endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// Unwrap a successful envelope into its (optional) payload
    pub fn into_result(self) -> Result<Option<T>, RemoteError> {
        if self.success {
            Ok(self.data)
        } else {
            Err(RemoteError::Rejected(
                self.error.unwrap_or_else(|| "Unknown API error".to_string()),
            ))
        }
    }
}

/// CRUD operations against the authoritative clip collection
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fetch the collection, newest first
    async fn list(&self) -> Result<Vec<Clip>, RemoteError>;

    /// Store a new clip and return the confirmed copy
    async fn create(&self, content: &str, note: Option<String>) -> Result<Clip, RemoteError>;

    /// Replace content and note of an existing clip
    async fn update(&self, id: &str, content: &str, note: Option<String>)
        -> Result<(), RemoteError>;

    /// Remove a clip
    async fn delete(&self, id: &str) -> Result<(), RemoteError>;
}
