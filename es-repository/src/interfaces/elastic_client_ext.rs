//! Typed conveniences layered on top of [`ElasticClient`].

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::value::RawValue;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::enumerate::{self, EnumeratedItem, EnumerationSummary};
use crate::errors::ElasticError;
use crate::interfaces::{ElasticClient, IndexNameAndIdProvider};
use crate::types::{BulkSummary, IndexedDocument, ScrollRequest, Sort};

fn decode<T: DeserializeOwned>(raw: &RawValue) -> Result<T, ElasticError> {
    serde_json::from_str(raw.get())
        .map_err(|e| ElasticError::deserialization(e.to_string()).with_operation("unmarshal"))
}

/// Generic helpers available on every [`ElasticClient`], including `dyn ElasticClient`.
#[async_trait]
pub trait ElasticClientExt: ElasticClient {
    /// Decode the first document matching `query`.
    ///
    /// Returns `Err(ElasticError::EmptyResult)` when nothing matched.
    async fn unmarshal_one<T>(&self, index: &str, query: &Value) -> Result<T, ElasticError>
    where
        T: DeserializeOwned + Send,
    {
        let raw = self.find_first(index, query, None).await?;
        decode(&raw)
    }

    /// Decode the most recent document matching `query`, by descending `timestamp_field`.
    ///
    /// Returns `Err(ElasticError::EmptyResult)` when nothing matched.
    async fn unmarshal_most_recent<T>(
        &self,
        index: &str,
        query: &Value,
        timestamp_field: &str,
    ) -> Result<T, ElasticError>
    where
        T: DeserializeOwned + Send,
    {
        let sort = Sort::desc(timestamp_field);
        let raw = self.find_first(index, query, Some(&sort)).await?;
        decode(&raw)
    }

    /// Decode the only document matching `query`.
    ///
    /// Returns `Err(ElasticError::EmptyResult)` or `Err(ElasticError::TooManyHits)`
    /// when the query does not match exactly one document.
    async fn unmarshal_unique<T>(&self, index: &str, query: &Value) -> Result<T, ElasticError>
    where
        T: DeserializeOwned + Send,
    {
        let raw = self.find_unique(index, query).await?;
        decode(&raw)
    }

    /// Index a document under the index and id it provides.
    async fn marshal_with_name_and_id_provider<D>(&self, document: &D) -> Result<(), ElasticError>
    where
        D: IndexNameAndIdProvider + Sync,
    {
        let document = document.to_indexed_document()?;
        self.index_document(&document).await
    }

    /// Index many documents, each under the index and id it provides, with one bulk request.
    async fn index_with_name_provider<D>(&self, documents: &[D]) -> Result<BulkSummary, ElasticError>
    where
        D: IndexNameAndIdProvider + Sync,
    {
        let documents = documents
            .iter()
            .map(|doc| doc.to_indexed_document())
            .collect::<Result<Vec<IndexedDocument>, _>>()?;
        self.bulk_index_documents(&documents).await
    }

    /// Enumerate every document matching `request`. See [`enumerate::enumerate_items`].
    async fn enumerate_items<F>(
        &self,
        request: &ScrollRequest,
        cancel: &CancellationToken,
        on_item: F,
    ) -> Result<EnumerationSummary, ElasticError>
    where
        F: FnMut(EnumeratedItem<'_>) -> Result<(), ElasticError> + Send,
    {
        enumerate::enumerate_items(self, request, cancel, on_item).await
    }
}

impl<C: ElasticClient + ?Sized> ElasticClientExt for C {}
