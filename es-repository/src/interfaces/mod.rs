//! Interface definitions for the Elasticsearch facade.
//!
//! The traits here are the seams used for dependency injection: consumers hold
//! an `Arc<dyn ElasticClient>` (or a narrower `ScrollSource` / `BulkExecutor`)
//! and tests substitute mock implementations.

mod bulk_executor;
mod document;
mod elastic_client;
mod elastic_client_ext;
mod scroll_source;

pub use bulk_executor::BulkExecutor;
pub use document::{IdProvider, IndexNameAndIdProvider, IndexNameProvider};
pub use elastic_client::ElasticClient;
pub use elastic_client_ext::ElasticClientExt;
pub use scroll_source::ScrollSource;
