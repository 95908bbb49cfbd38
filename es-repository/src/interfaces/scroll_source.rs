//! Server-side cursor primitives.

use async_trait::async_trait;

use crate::errors::ElasticError;
use crate::types::{ScrollPage, ScrollRequest};

/// Opens, advances and releases scroll cursors.
///
/// This is the narrow seam the enumeration loop runs against; `ElasticClient`
/// extends it, and tests implement it directly.
#[async_trait]
pub trait ScrollSource: Send + Sync {
    /// Run the query and return the first page together with a new cursor id.
    async fn open_scroll(&self, request: &ScrollRequest) -> Result<ScrollPage, ElasticError>;

    /// Fetch the page following `cursor_id`.
    async fn scroll(&self, cursor_id: &str, keep_alive: &str) -> Result<ScrollPage, ElasticError>;

    /// Release a cursor on the server. An empty id is a no-op.
    async fn clear_scroll(&self, cursor_id: &str) -> Result<(), ElasticError>;
}
