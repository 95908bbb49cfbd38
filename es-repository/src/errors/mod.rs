//! Error types for the Elasticsearch facade.
//!
//! `ElasticError` is the single error type returned by every operation.
//! `MultiError` is the ordered aggregate produced by the scroll enumeration
//! loop, the only place where several failures are collected into one result.

mod elastic_error;
mod multi_error;

pub use elastic_error::ElasticError;
pub use multi_error::MultiError;
