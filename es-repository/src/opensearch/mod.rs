//! OpenSearch-client implementation of the facade.
//!
//! Speaks the Elasticsearch 7 compatible REST API through the `opensearch`
//! crate.

mod client;
mod mapping;
mod sniff;

pub use client::OpenSearchClient;
pub use mapping::put_mapping_body;
pub use sniff::{parse_http_nodes, SniffingConnectionPool};
