//! Ordered aggregate of failures.

use std::fmt;

use super::ElasticError;

/// An ordered list of failures where empty means success.
///
/// Built by the scroll enumeration loop: transport and handler failures are
/// pushed as they happen, cursor release failures are appended last.
#[derive(Debug, Clone, Default)]
pub struct MultiError {
    errors: Vec<ElasticError>,
}

impl MultiError {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a failure.
    pub fn push(&mut self, err: ElasticError) {
        self.errors.push(err);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// The collected failures in the order they occurred.
    pub fn errors(&self) -> &[ElasticError] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<ElasticError> {
        self.errors
    }

    /// `Ok(())` when nothing was collected, otherwise `ElasticError::Multiple`.
    pub fn into_result(self) -> Result<(), ElasticError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ElasticError::Multiple(self))
        }
    }
}

impl fmt::Display for MultiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.errors.len() {
            0 => write!(f, "no errors"),
            1 => write!(f, "1 error occurred: {}", self.errors[0]),
            n => {
                write!(f, "{} errors occurred:", n)?;
                for err in &self.errors {
                    write!(f, "\n\t* {}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for MultiError {}

impl From<Vec<ElasticError>> for MultiError {
    fn from(errors: Vec<ElasticError>) -> Self {
        Self { errors }
    }
}

impl IntoIterator for MultiError {
    type Item = ElasticError;
    type IntoIter = std::vec::IntoIter<ElasticError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_means_success() {
        let errors = MultiError::new();
        assert!(errors.is_empty());
        assert!(errors.into_result().is_ok());
    }

    #[test]
    fn test_preserves_order() {
        let mut errors = MultiError::new();
        errors.push(ElasticError::handler("first").with_operation("on_item"));
        errors.push(ElasticError::transport("second").with_operation("clear_scroll"));

        assert_eq!(errors.len(), 2);
        assert_eq!(errors.errors()[0].operation(), Some("on_item"));
        assert_eq!(errors.errors()[1].operation(), Some("clear_scroll"));

        let err = errors.into_result().unwrap_err();
        match err {
            ElasticError::Multiple(inner) => assert_eq!(inner.len(), 2),
            other => panic!("expected Multiple, got {other:?}"),
        }
    }

    #[test]
    fn test_display() {
        let single = MultiError::from(vec![ElasticError::EmptyResponse]);
        assert_eq!(single.to_string(), "1 error occurred: empty response");

        let many = MultiError::from(vec![ElasticError::EmptyResponse, ElasticError::EmptyInput]);
        assert_eq!(
            many.to_string(),
            "2 errors occurred:\n\t* empty response\n\t* empty input"
        );
    }
}
