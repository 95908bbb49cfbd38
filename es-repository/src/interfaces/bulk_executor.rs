//! Bulk request execution seam used by the bulk processor.

use async_trait::async_trait;

use crate::errors::ElasticError;
use crate::types::{BulkItem, BulkSummary};

/// Sends one bulk request.
///
/// Item-level failures are reported in the returned summary; an `Err` means
/// the request as a whole failed.
#[async_trait]
pub trait BulkExecutor: Send + Sync {
    async fn execute_bulk(&self, items: &[BulkItem]) -> Result<BulkSummary, ElasticError>;
}
