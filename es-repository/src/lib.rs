//! # ES Repository
//!
//! This crate provides a thin facade over an Elasticsearch 7 compatible
//! cluster: request builders that forward to the engine, a scroll-based
//! enumeration loop, index-name discovery from the cluster catalog, a
//! batching bulk processor and the error types shared by all of them.
//! `OpenSearchClient` is the concrete session; everything else is written
//! against the `ElasticClient` and `ScrollSource` traits.

pub mod bulk;
pub mod catalog;
pub mod config;
pub mod enumerate;
pub mod errors;
pub mod interfaces;
pub mod opensearch;
pub mod retry;
pub mod types;

pub use bulk::{BulkListener, BulkProcessor, BulkProcessorParameters, BulkProcessorStats};
pub use catalog::parse_index_catalog;
pub use config::{ElasticClientConfig, RetryPolicy};
pub use enumerate::{enumerate_items, EnumeratedItem, EnumerationSummary, ScrollCursor};
pub use errors::{ElasticError, MultiError};
pub use interfaces::{
    BulkExecutor, ElasticClient, ElasticClientExt, IdProvider, IndexNameAndIdProvider,
    IndexNameProvider, ScrollSource,
};
pub use opensearch::OpenSearchClient;
pub use types::{
    BulkAction, BulkItem, BulkItemResult, BulkSummary, ClusterInfo, Hit, IndexedDocument,
    ScrollPage, ScrollRequest, SearchParameters, SearchResponse, Sort, SortOrder,
    DEFAULT_SCROLL_KEEP_ALIVE,
};
