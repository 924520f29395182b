//! # Fetch collaborator.
//!
//! The transport seam: [`Fetch`] turns a URL into bytes, and
//! [`Flow::fetch`] lifts one fetch into a single-value flow. The trait
//! keeps the crate transport-agnostic; tests plug in an in-memory fake
//! and production code wraps whatever HTTP client it already has.

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::Flow;
use crate::error::FlowError;

/// Fetches the raw bytes behind a URL.
///
/// Failures surface as [`FlowError::Fetch`], so a chain built on
/// [`Flow::fetch`] can route them through `retry` / `catch` like any
/// other flow error.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FlowError>;
}

impl Flow<Vec<u8>, FlowError> {
    /// One fetch of `url` as a flow: the body bytes, then finish, or one
    /// [`FlowError::Fetch`].
    ///
    /// The request starts per subscription and aborts when the
    /// subscription is cancelled.
    pub fn fetch(client: Arc<dyn Fetch>, url: impl Into<String>) -> Flow<Vec<u8>, FlowError> {
        let url = url.into();
        Flow::deferred(move || {
            let client = Arc::clone(&client);
            let url = url.clone();
            async move {
                tracing::debug!(%url, "fetching");
                client.fetch(&url).await
            }
        })
    }
}
