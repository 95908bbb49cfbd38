//! Elasticsearch facade trait definition.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::value::RawValue;
use serde_json::Value;

use crate::errors::ElasticError;
use crate::interfaces::{BulkExecutor, ScrollSource};
use crate::types::{BulkSummary, ClusterInfo, IndexedDocument, SearchParameters, SearchResponse, Sort};

/// Abstracts the session against the search engine.
///
/// Every method forwards to the engine almost immediately. Transport failures
/// are returned tagged with the operation name (`ElasticError::Operation`);
/// distinguished conditions (`EmptyResult`, `NotAcknowledged`, `TooManyHits`,
/// `EmptyInput`, `EmptyResponse`) are returned untagged so they can be matched
/// directly.
///
/// Implementations are shared read-only between tasks; nothing here mutates
/// the session.
#[async_trait]
pub trait ElasticClient: ScrollSource + BulkExecutor {
    /// Fetch node and version information.
    async fn ping(&self) -> Result<ClusterInfo, ElasticError>;

    /// Run a paged search.
    async fn search(&self, params: &SearchParameters) -> Result<SearchResponse, ElasticError>;

    /// Run a search with a caller-supplied request body.
    async fn search_with_dsl(&self, index: &str, body: &Value) -> Result<SearchResponse, ElasticError>;

    /// Return the raw source of the first hit for `query`, optionally sorted.
    ///
    /// # Returns
    ///
    /// * `Err(ElasticError::EmptyResult)` - If nothing matched; no decoding is attempted
    /// * `Err(ElasticError::EmptyResponse)` - If the hit carries no source
    async fn find_first(
        &self,
        index: &str,
        query: &Value,
        sort: Option<&Sort>,
    ) -> Result<Box<RawValue>, ElasticError>;

    /// Return the raw source of the only hit for `query`.
    ///
    /// # Returns
    ///
    /// * `Err(ElasticError::EmptyResult)` - If nothing matched
    /// * `Err(ElasticError::TooManyHits)` - If more than one document matched
    async fn find_unique(&self, index: &str, query: &Value) -> Result<Box<RawValue>, ElasticError>;

    /// Count documents matching a query clause.
    async fn count(&self, index: &str, query: &Value) -> Result<u64, ElasticError>;

    /// Index (create or replace) a single document.
    async fn index_document(&self, document: &IndexedDocument) -> Result<(), ElasticError>;

    /// Index documents keyed by id into `index` with one bulk request.
    ///
    /// Returns `Err(ElasticError::EmptyInput)` for an empty slice.
    async fn bulk_index(
        &self,
        index: &str,
        documents: &[(String, Value)],
    ) -> Result<BulkSummary, ElasticError>;

    /// Create documents keyed by id in `index` with one bulk request.
    ///
    /// Existing ids fail per item and are reported in the summary.
    /// Returns `Err(ElasticError::EmptyInput)` for an empty slice.
    async fn bulk_create(
        &self,
        index: &str,
        documents: &[(String, Value)],
    ) -> Result<BulkSummary, ElasticError>;

    /// Index documents that each name their own target index.
    ///
    /// Returns `Err(ElasticError::EmptyInput)` for an empty slice.
    async fn bulk_index_documents(
        &self,
        documents: &[IndexedDocument],
    ) -> Result<BulkSummary, ElasticError>;

    /// Add a field mapping, optionally nested under the object field `root`.
    async fn put_mapping(
        &self,
        index: &str,
        root: Option<&str>,
        key: &str,
        value_type: &str,
    ) -> Result<(), ElasticError>;

    /// Create an index with default settings.
    async fn create_index(&self, index: &str) -> Result<(), ElasticError>;

    /// Whether an index (or alias) exists.
    async fn index_exists(&self, index: &str) -> Result<bool, ElasticError>;

    /// Create `index` with the given settings and mappings unless it already exists.
    ///
    /// Returns `Err(ElasticError::NotAcknowledged)` if the creation was not acknowledged.
    async fn ensure_index_with_mapping(&self, index: &str, mapping: &Value) -> Result<(), ElasticError>;

    /// Flush an index.
    async fn flush_index(&self, index: &str) -> Result<(), ElasticError>;

    /// Map every prefix to the index names found for it in the cluster catalog.
    ///
    /// Prefixes without matches are absent from the map.
    async fn get_indices(&self, prefixes: &[String]) -> Result<HashMap<String, Vec<String>>, ElasticError>;
}
