//! Capabilities for documents that know where they are stored.

use serde::Serialize;

use crate::errors::ElasticError;
use crate::types::IndexedDocument;

/// A document with a stable identity.
pub trait IdProvider {
    fn id(&self) -> String;
}

/// A document that knows its target index.
pub trait IndexNameProvider {
    fn index_name(&self) -> String;
}

/// A serializable document carrying both its id and its target index.
///
/// Implemented automatically for every type implementing the two provider
/// traits and `Serialize`.
pub trait IndexNameAndIdProvider: IdProvider + IndexNameProvider + Serialize {
    /// Serialize into an [`IndexedDocument`] addressed by the provided index and id.
    fn to_indexed_document(&self) -> Result<IndexedDocument, ElasticError> {
        let body = serde_json::to_value(self)
            .map_err(|e| ElasticError::serialization(e.to_string()))?;
        Ok(IndexedDocument::new(self.index_name(), self.id(), body))
    }
}

impl<T: IdProvider + IndexNameProvider + Serialize> IndexNameAndIdProvider for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Serialize)]
    struct Transfer {
        hash: String,
        block: u64,
    }

    impl IdProvider for Transfer {
        fn id(&self) -> String {
            self.hash.clone()
        }
    }

    impl IndexNameProvider for Transfer {
        fn index_name(&self) -> String {
            format!("transfers-{}", self.block / 1_000_000)
        }
    }

    #[test]
    fn test_to_indexed_document() {
        let transfer = Transfer {
            hash: "0xabc".to_string(),
            block: 2_500_000,
        };

        let doc = transfer.to_indexed_document().unwrap();
        assert_eq!(doc.index, "transfers-2");
        assert_eq!(doc.id, "0xabc");
        assert_eq!(doc.body, json!({"hash": "0xabc", "block": 2_500_000}));
    }
}
