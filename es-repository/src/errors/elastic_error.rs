//! Facade error type.
//!
//! Distinguished conditions (`EmptyResult`, `NotAcknowledged`, ...) are plain
//! variants so callers can match on them directly. Everything coming from the
//! transport is wrapped with the name of the operation that produced it.

use thiserror::Error;

use super::MultiError;

/// Errors from facade operations.
#[derive(Debug, Clone, Error)]
pub enum ElasticError {
    /// Index creation was not acknowledged by the cluster.
    #[error("not acknowledged")]
    NotAcknowledged,

    /// A lookup expecting at most one document matched several.
    #[error("too many hits: expected at most one, found {0}")]
    TooManyHits(u64),

    /// The operation was called without anything to do.
    #[error("empty input")]
    EmptyInput,

    /// The query matched zero documents.
    #[error("empty result")]
    EmptyResult,

    /// The engine answered without the payload the operation needs.
    #[error("empty response")]
    EmptyResponse,

    /// Cooperative cancellation was requested.
    #[error("operation cancelled")]
    Cancelled,

    /// Failed to build the transport or reach the cluster.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The request could not be sent or the response could not be read.
    #[error("Transport error: {0}")]
    TransportError(String),

    /// The engine answered with a non-success status code.
    #[error("Request failed with status {status}: {body}")]
    StatusError { status: u16, body: String },

    /// Failed to serialize a request body.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Failed to decode a response or a document.
    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    /// Invalid arguments.
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// A caller-supplied item handler failed.
    #[error("Handler error: {0}")]
    HandlerError(String),

    /// Another error tagged with the operation that produced it.
    #[error("{operation}: {source}")]
    Operation {
        operation: &'static str,
        source: Box<ElasticError>,
    },

    /// Several failures collected by the scroll enumeration loop.
    #[error("{0}")]
    Multiple(MultiError),
}

impl ElasticError {
    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::ConnectionError(msg.into())
    }

    /// Create a transport error.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::TransportError(msg.into())
    }

    /// Create a status error.
    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self::StatusError {
            status,
            body: body.into(),
        }
    }

    /// Create a serialization error.
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::SerializationError(msg.into())
    }

    /// Create a deserialization error.
    pub fn deserialization(msg: impl Into<String>) -> Self {
        Self::DeserializationError(msg.into())
    }

    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    /// Create a handler error. Item callbacks use this to report their own failures.
    pub fn handler(msg: impl Into<String>) -> Self {
        Self::HandlerError(msg.into())
    }

    /// Tag this error with the operation that produced it.
    pub fn with_operation(self, operation: &'static str) -> Self {
        Self::Operation {
            operation,
            source: Box::new(self),
        }
    }

    /// The innermost error, looking through operation tags.
    pub fn root_cause(&self) -> &ElasticError {
        let mut current = self;
        while let Self::Operation { source, .. } = current {
            current = source;
        }
        current
    }

    /// The outermost operation tag, if any.
    pub fn operation(&self) -> Option<&'static str> {
        match self {
            Self::Operation { operation, .. } => Some(*operation),
            _ => None,
        }
    }

    /// Whether the query matched zero documents.
    pub fn is_empty_result(&self) -> bool {
        matches!(self.root_cause(), Self::EmptyResult)
    }

    /// Whether the enumeration was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self.root_cause(), Self::Cancelled)
    }

    /// Whether retrying the same request may succeed.
    ///
    /// Network failures and throttling / gateway statuses are transient;
    /// everything else is returned to the caller immediately.
    pub fn is_transient(&self) -> bool {
        match self.root_cause() {
            Self::ConnectionError(_) | Self::TransportError(_) => true,
            _ => self.is_throttled(),
        }
    }

    /// Whether the cluster answered with a throttling or gateway status.
    ///
    /// Unlike network failures, these guarantee the request was not applied.
    pub fn is_throttled(&self) -> bool {
        matches!(
            self.root_cause(),
            Self::StatusError { status: 429 | 502 | 503 | 504, .. }
        )
    }
}

impl From<opensearch::Error> for ElasticError {
    fn from(err: opensearch::Error) -> Self {
        Self::TransportError(err.to_string())
    }
}

impl From<MultiError> for ElasticError {
    fn from(err: MultiError) -> Self {
        Self::Multiple(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_cause_looks_through_tags() {
        let err = ElasticError::EmptyResult
            .with_operation("search")
            .with_operation("unmarshal_one");

        assert!(err.is_empty_result());
        assert_eq!(err.operation(), Some("unmarshal_one"));
        assert!(matches!(err.root_cause(), ElasticError::EmptyResult));
        assert_eq!(err.to_string(), "unmarshal_one: search: empty result");
    }

    #[test]
    fn test_is_transient() {
        assert!(ElasticError::transport("connection reset").is_transient());
        assert!(ElasticError::connection("refused").is_transient());
        assert!(ElasticError::status(429, "too many requests").is_transient());
        assert!(ElasticError::status(503, "unavailable").is_transient());
        assert!(ElasticError::status(503, "")
            .with_operation("count")
            .is_transient());

        assert!(!ElasticError::status(400, "bad request").is_transient());
        assert!(!ElasticError::status(404, "missing").is_transient());
        assert!(!ElasticError::EmptyResult.is_transient());
        assert!(!ElasticError::NotAcknowledged.is_transient());
    }

    #[test]
    fn test_is_throttled_excludes_network_failures() {
        assert!(ElasticError::status(429, "too many requests").is_throttled());
        assert!(ElasticError::status(503, "unavailable")
            .with_operation("scroll")
            .is_throttled());
        assert!(!ElasticError::transport("operation timed out").is_throttled());
        assert!(!ElasticError::connection("refused").is_throttled());
        assert!(!ElasticError::status(500, "boom").is_throttled());
    }

    #[test]
    fn test_distinguished_conditions_display() {
        assert_eq!(ElasticError::NotAcknowledged.to_string(), "not acknowledged");
        assert_eq!(ElasticError::EmptyInput.to_string(), "empty input");
        assert_eq!(ElasticError::EmptyResponse.to_string(), "empty response");
        assert_eq!(
            ElasticError::TooManyHits(3).to_string(),
            "too many hits: expected at most one, found 3"
        );
    }
}
