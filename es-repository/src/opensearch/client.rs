//! OpenSearch client implementation.
//!
//! This module provides the concrete implementation of `ElasticClient` using
//! the OpenSearch Rust crate.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use opensearch::{
    auth::Credentials,
    cat::CatIndicesParts,
    http::request::JsonBody,
    http::response::Response,
    http::transport::{SingleNodeConnectionPool, TransportBuilder},
    indices::{IndicesCreateParts, IndicesExistsParts, IndicesFlushParts, IndicesPutMappingParts},
    nodes::NodesInfoParts,
    BulkParts, ClearScrollParts, CountParts, IndexParts, OpenSearch, ScrollParts, SearchParts,
};
use serde::de::DeserializeOwned;
use serde_json::value::RawValue;
use serde_json::{json, Value};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::catalog::parse_index_catalog;
use crate::config::{ElasticClientConfig, RetryPolicy};
use crate::errors::ElasticError;
use crate::interfaces::{BulkExecutor, ElasticClient, ScrollSource};
use crate::opensearch::mapping::put_mapping_body;
use crate::opensearch::sniff::{parse_http_nodes, SniffingConnectionPool};
use crate::retry::retry_when;
use crate::types::{
    AcknowledgedResponse, BulkItem, BulkResponse, BulkSummary, ClusterInfo, CountResponse,
    IndexedDocument, ScrollPage, ScrollRequest, SearchParameters, SearchResponse, Sort,
};

/// Session against an Elasticsearch 7 compatible cluster.
///
/// Cheap to share behind an `Arc`; all methods take `&self`.
///
/// # Example
///
/// ```ignore
/// use es_repository::{ElasticClientConfig, OpenSearchClient};
///
/// let config = ElasticClientConfig::new("http://localhost:9200").with_basic_auth("elastic", "secret");
/// let client = OpenSearchClient::connect(&config).await?;
/// let total = client.count("transfers-1", &serde_json::json!({"match_all": {}})).await?;
/// ```
pub struct OpenSearchClient {
    client: OpenSearch,
    endpoint: String,
    retry: RetryPolicy,
    health_check_interval: Duration,
    sniffer: Option<SniffingConnectionPool>,
}

impl OpenSearchClient {
    /// Build a client without contacting the cluster.
    ///
    /// # Returns
    ///
    /// * `Ok(OpenSearchClient)` - A new client instance
    /// * `Err(ElasticError)` - If the endpoint is invalid or the transport cannot be built
    pub fn new(config: &ElasticClientConfig) -> Result<Self, ElasticError> {
        let url = Url::parse(&config.endpoint).map_err(|e| {
            ElasticError::connection(format!("Invalid endpoint '{}': {}", config.endpoint, e))
        })?;

        let sniffer = config.sniff.then(|| SniffingConnectionPool::new(url.clone()));
        let builder = match &sniffer {
            Some(pool) => TransportBuilder::new(pool.clone()),
            None => TransportBuilder::new(SingleNodeConnectionPool::new(url)),
        };

        let mut builder = builder.timeout(config.request_timeout).disable_proxy();
        if let Some((username, password)) = config.credentials() {
            builder = builder.auth(Credentials::Basic(username, password));
        }

        let transport = builder
            .build()
            .map_err(|e| ElasticError::connection(e.to_string()))?;

        Ok(Self {
            client: OpenSearch::new(transport),
            endpoint: config.endpoint.clone(),
            retry: config.retry.clone(),
            health_check_interval: config.health_check_interval,
            sniffer,
        })
    }

    /// Build a client and verify the cluster answers.
    ///
    /// Logs the endpoint and engine version on success.
    pub async fn connect(config: &ElasticClientConfig) -> Result<Self, ElasticError> {
        let client = Self::new(config)?;
        let info = client.ping().await.map_err(|e| {
            error!(endpoint = %client.endpoint, error = %e, "Failed to reach cluster");
            e
        })?;
        if client.sniffer.is_some() {
            client.sniff().await?;
        }

        info!(
            endpoint = %client.endpoint,
            cluster = %info.cluster_name,
            version = %info.version.number,
            sniff = config.sniff,
            "Connected to search cluster"
        );

        Ok(client)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Reseed the node list from `_nodes/http`.
    ///
    /// Returns the number of nodes now in rotation. Without sniffing this is
    /// a no-op reporting the single configured node.
    pub async fn sniff(&self) -> Result<usize, ElasticError> {
        let Some(pool) = &self.sniffer else {
            return Ok(1);
        };

        let client = &self.client;
        let response = self
            .send("sniff", move || async move {
                client.nodes().info(NodesInfoParts::Metric(&["http"])).send().await
            })
            .await?;

        let nodes = decode::<Value>("sniff", response).await?;
        let count = pool.reseed(parse_http_nodes(&nodes, pool.seed().scheme()));
        debug!(endpoint = %self.endpoint, nodes = count, "Reseeded cluster nodes");
        Ok(count)
    }

    /// Ping the cluster every health-check interval until `cancel` fires.
    ///
    /// When sniffing, each tick also reseeds the node list. Failures are
    /// logged and do not stop the task. A zero interval disables the checks.
    pub fn spawn_health_check(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            if self.health_check_interval.is_zero() {
                debug!(endpoint = %self.endpoint, "Health check disabled");
                return;
            }

            let mut ticker = tokio::time::interval(self.health_check_interval);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!(endpoint = %self.endpoint, "Health check stopped");
                        break;
                    }
                    _ = ticker.tick() => self.check_health().await,
                }
            }
        })
    }

    async fn check_health(&self) {
        match self.ping().await {
            Ok(info) => debug!(
                endpoint = %self.endpoint,
                version = %info.version.number,
                "Health check succeeded"
            ),
            Err(e) => {
                warn!(endpoint = %self.endpoint, error = %e, "Health check failed");
                return;
            }
        }

        if let Err(e) = self.sniff().await {
            warn!(endpoint = %self.endpoint, error = %e, "Node sniffing failed");
        }
    }

    /// Send a request, retrying transport failures and throttling statuses.
    ///
    /// Any other status is handed back to the caller untouched.
    async fn send_raw<A, F>(&self, operation: &'static str, action: A) -> Result<Response, ElasticError>
    where
        A: FnMut() -> F,
        F: Future<Output = Result<Response, opensearch::Error>>,
    {
        self.send_raw_with(&self.retry, ElasticError::is_transient, operation, action)
            .await
    }

    /// `send_raw` with an explicit policy and retry condition.
    async fn send_raw_with<A, F>(
        &self,
        policy: &RetryPolicy,
        retry_on: fn(&ElasticError) -> bool,
        operation: &'static str,
        action: A,
    ) -> Result<Response, ElasticError>
    where
        A: FnMut() -> F,
        F: Future<Output = Result<Response, opensearch::Error>>,
    {
        let mut action = action;
        let attempt = move || {
            let request = action();
            async move {
                let response = request.await.map_err(ElasticError::from)?;
                let status = response.status_code().as_u16();
                if matches!(status, 429 | 502 | 503 | 504) {
                    let body = response.text().await.unwrap_or_default();
                    return Err(ElasticError::status(status, body));
                }
                Ok::<_, ElasticError>(response)
            }
        };

        retry_when(policy, operation, attempt, retry_on)
            .await
            .map_err(|e| e.with_operation(operation))
    }

    /// Like `send_raw`, but any non-success status is an error.
    async fn send<A, F>(&self, operation: &'static str, action: A) -> Result<Response, ElasticError>
    where
        A: FnMut() -> F,
        F: Future<Output = Result<Response, opensearch::Error>>,
    {
        self.send_with(&self.retry, ElasticError::is_transient, operation, action)
            .await
    }

    /// `send` with an explicit policy and retry condition.
    async fn send_with<A, F>(
        &self,
        policy: &RetryPolicy,
        retry_on: fn(&ElasticError) -> bool,
        operation: &'static str,
        action: A,
    ) -> Result<Response, ElasticError>
    where
        A: FnMut() -> F,
        F: Future<Output = Result<Response, opensearch::Error>>,
    {
        let response = self.send_raw_with(policy, retry_on, operation, action).await?;
        let status = response.status_code();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(operation, status = %status, body = %body, "Request failed");
            return Err(ElasticError::status(status.as_u16(), body).with_operation(operation));
        }
        Ok(response)
    }

    async fn run_search(
        &self,
        operation: &'static str,
        index: &str,
        body: Value,
    ) -> Result<SearchResponse, ElasticError> {
        let client = &self.client;
        let body = &body;
        let response = self
            .send(operation, move || async move {
                client
                    .search(SearchParts::Index(&[index]))
                    .body(body.clone())
                    .send()
                    .await
            })
            .await?;

        decode(operation, response).await
    }

    async fn run_bulk(
        &self,
        operation: &'static str,
        items: &[BulkItem],
        policy: &RetryPolicy,
    ) -> Result<BulkSummary, ElasticError> {
        if items.is_empty() {
            return Err(ElasticError::EmptyInput);
        }

        let mut lines = Vec::with_capacity(items.len() * 2);
        for item in items {
            lines.push(item.header());
            lines.push(item.body.clone());
        }

        let client = &self.client;
        let lines = &lines;
        let response = self
            .send_with(policy, ElasticError::is_transient, operation, move || async move {
                let body: Vec<JsonBody<Value>> = lines.iter().cloned().map(JsonBody::new).collect();
                client.bulk(BulkParts::None).body(body).send().await
            })
            .await?;

        let summary = BulkSummary::from_response(decode::<BulkResponse>(operation, response).await?);
        if summary.has_failures() {
            warn!(
                operation,
                total = summary.total,
                failed = summary.failed,
                "Bulk request completed with failures"
            );
        } else {
            debug!(operation, total = summary.total, "Bulk request completed");
        }

        Ok(summary)
    }

    fn keyed_items(
        index: &str,
        documents: &[(String, Value)],
        item: fn(String, String, Value) -> BulkItem,
    ) -> Vec<BulkItem> {
        documents
            .iter()
            .map(|(id, body)| item(index.to_string(), id.clone(), body.clone()))
            .collect()
    }
}

/// Read a response body as JSON.
async fn decode<T: DeserializeOwned>(operation: &'static str, response: Response) -> Result<T, ElasticError> {
    let body = response
        .text()
        .await
        .map_err(|e| ElasticError::from(e).with_operation(operation))?;

    serde_json::from_str(&body)
        .map_err(|e| ElasticError::deserialization(e.to_string()).with_operation(operation))
}

#[async_trait]
impl ScrollSource for OpenSearchClient {
    async fn open_scroll(&self, request: &ScrollRequest) -> Result<ScrollPage, ElasticError> {
        let client = &self.client;
        let body = request.body();
        let body = &body;
        let index = request.index.as_str();
        let keep_alive = request.keep_alive.as_str();
        let page_size = request.page_size;

        let response = self
            .send("open_scroll", move || async move {
                let indices = [index];
                let search = client
                    .search(SearchParts::Index(&indices))
                    .scroll(keep_alive)
                    .body(body.clone());
                match page_size {
                    Some(size) => search.size(size).send().await,
                    None => search.send().await,
                }
            })
            .await?;

        let page = ScrollPage::from(decode::<SearchResponse>("open_scroll", response).await?);
        debug!(
            index = %request.index,
            total = page.total,
            hits = page.hits.len(),
            "Opened scroll cursor"
        );
        Ok(page)
    }

    async fn scroll(&self, cursor_id: &str, keep_alive: &str) -> Result<ScrollPage, ElasticError> {
        let client = &self.client;
        let body = json!({ "scroll": keep_alive, "scroll_id": cursor_id });
        let body = &body;

        // A timed-out scroll may already have advanced the cursor server side.
        let response = self
            .send_with(&self.retry, ElasticError::is_throttled, "scroll", move || async move {
                client.scroll(ScrollParts::None).body(body.clone()).send().await
            })
            .await?;

        let page = ScrollPage::from(decode::<SearchResponse>("scroll", response).await?);
        debug!(hits = page.hits.len(), "Fetched scroll page");
        Ok(page)
    }

    async fn clear_scroll(&self, cursor_id: &str) -> Result<(), ElasticError> {
        if cursor_id.is_empty() {
            return Ok(());
        }

        let client = &self.client;
        let body = json!({ "scroll_id": [cursor_id] });
        let body = &body;

        let response = self
            .send_raw("clear_scroll", move || async move {
                client.clear_scroll(ClearScrollParts::None).body(body.clone()).send().await
            })
            .await?;

        let status = response.status_code();
        match status.as_u16() {
            // Expired or already released.
            404 => {
                debug!("Scroll cursor already released");
                Ok(())
            }
            _ if status.is_success() => {
                debug!("Released scroll cursor");
                Ok(())
            }
            code => {
                let body = response.text().await.unwrap_or_default();
                error!(status = code, body = %body, "Failed to release scroll cursor");
                Err(ElasticError::status(code, body).with_operation("clear_scroll"))
            }
        }
    }
}

#[async_trait]
impl BulkExecutor for OpenSearchClient {
    /// Sent once; callers such as the bulk processor own the retry policy.
    async fn execute_bulk(&self, items: &[BulkItem]) -> Result<BulkSummary, ElasticError> {
        self.run_bulk("execute_bulk", items, &RetryPolicy::disabled()).await
    }
}

#[async_trait]
impl ElasticClient for OpenSearchClient {
    async fn ping(&self) -> Result<ClusterInfo, ElasticError> {
        let client = &self.client;
        let response = self
            .send("ping", move || async move { client.info().send().await })
            .await?;

        decode("ping", response).await
    }

    async fn search(&self, params: &SearchParameters) -> Result<SearchResponse, ElasticError> {
        let response = self.run_search("search", &params.index, params.body()).await?;
        debug!(
            index = %params.index,
            total = response.total_hits(),
            hits = response.hits.hits.len(),
            "Search completed"
        );
        Ok(response)
    }

    async fn search_with_dsl(&self, index: &str, body: &Value) -> Result<SearchResponse, ElasticError> {
        self.run_search("search_with_dsl", index, body.clone()).await
    }

    async fn find_first(
        &self,
        index: &str,
        query: &Value,
        sort: Option<&Sort>,
    ) -> Result<Box<RawValue>, ElasticError> {
        let mut body = json!({ "query": query, "size": 1 });
        if let Some(sort) = sort {
            body["sort"] = json!([sort.to_json()]);
        }

        let response = self.run_search("find_first", index, body).await?;
        let hit = response
            .hits
            .hits
            .into_iter()
            .next()
            .ok_or(ElasticError::EmptyResult)?;

        hit.source.ok_or(ElasticError::EmptyResponse)
    }

    async fn find_unique(&self, index: &str, query: &Value) -> Result<Box<RawValue>, ElasticError> {
        // Two hits are enough to tell a unique match from an ambiguous one.
        let body = json!({ "query": query, "size": 2 });
        let response = self.run_search("find_unique", index, body).await?;
        let total = response.total_hits();

        let mut hits = response.hits.hits.into_iter();
        match (hits.next(), hits.next()) {
            (None, _) => Err(ElasticError::EmptyResult),
            (Some(_), Some(_)) => Err(ElasticError::TooManyHits(total.max(2))),
            (Some(hit), None) => hit.source.ok_or(ElasticError::EmptyResponse),
        }
    }

    async fn count(&self, index: &str, query: &Value) -> Result<u64, ElasticError> {
        let client = &self.client;
        let body = json!({ "query": query });
        let body = &body;

        let response = self
            .send("count", move || async move {
                client
                    .count(CountParts::Index(&[index]))
                    .body(body.clone())
                    .send()
                    .await
            })
            .await?;

        let count = decode::<CountResponse>("count", response).await?.count;
        debug!(index = %index, count, "Counted documents");
        Ok(count)
    }

    async fn index_document(&self, document: &IndexedDocument) -> Result<(), ElasticError> {
        let client = &self.client;
        let index = document.index.as_str();
        let id = document.id.as_str();
        let body = &document.body;

        self.send("index_document", move || async move {
            client
                .index(IndexParts::IndexId(index, id))
                .body(body.clone())
                .send()
                .await
        })
        .await?;

        debug!(index = %index, id = %id, "Indexed document");
        Ok(())
    }

    async fn bulk_index(
        &self,
        index: &str,
        documents: &[(String, Value)],
    ) -> Result<BulkSummary, ElasticError> {
        let items = Self::keyed_items(index, documents, |index, id, body| {
            BulkItem::index(index, id, body)
        });
        self.run_bulk("bulk_index", &items, &self.retry).await
    }

    async fn bulk_create(
        &self,
        index: &str,
        documents: &[(String, Value)],
    ) -> Result<BulkSummary, ElasticError> {
        let items = Self::keyed_items(index, documents, |index, id, body| {
            BulkItem::create(index, id, body)
        });
        self.run_bulk("bulk_create", &items, &self.retry).await
    }

    async fn bulk_index_documents(
        &self,
        documents: &[IndexedDocument],
    ) -> Result<BulkSummary, ElasticError> {
        let items: Vec<BulkItem> = documents.iter().cloned().map(BulkItem::from).collect();
        self.run_bulk("bulk_index_documents", &items, &self.retry).await
    }

    async fn put_mapping(
        &self,
        index: &str,
        root: Option<&str>,
        key: &str,
        value_type: &str,
    ) -> Result<(), ElasticError> {
        let client = &self.client;
        let body = put_mapping_body(root, key, value_type);
        let body = &body;

        let response = self
            .send("put_mapping", move || async move {
                client
                    .indices()
                    .put_mapping(IndicesPutMappingParts::Index(&[index]))
                    .body(body.clone())
                    .send()
                    .await
            })
            .await?;

        if !decode::<AcknowledgedResponse>("put_mapping", response).await?.acknowledged {
            return Err(ElasticError::NotAcknowledged);
        }

        info!(index = %index, key = %key, value_type = %value_type, "Updated mapping");
        Ok(())
    }

    async fn create_index(&self, index: &str) -> Result<(), ElasticError> {
        let client = &self.client;

        let response = self
            .send("create_index", move || async move {
                client
                    .indices()
                    .create(IndicesCreateParts::Index(index))
                    .send()
                    .await
            })
            .await?;

        if !decode::<AcknowledgedResponse>("create_index", response).await?.acknowledged {
            return Err(ElasticError::NotAcknowledged);
        }

        info!(index = %index, "Created index");
        Ok(())
    }

    async fn index_exists(&self, index: &str) -> Result<bool, ElasticError> {
        let client = &self.client;

        let response = self
            .send_raw("index_exists", move || async move {
                client
                    .indices()
                    .exists(IndicesExistsParts::Index(&[index]))
                    .send()
                    .await
            })
            .await?;

        let status = response.status_code();
        match status.as_u16() {
            404 => Ok(false),
            _ if status.is_success() => Ok(true),
            code => {
                let body = response.text().await.unwrap_or_default();
                Err(ElasticError::status(code, body).with_operation("index_exists"))
            }
        }
    }

    async fn ensure_index_with_mapping(&self, index: &str, mapping: &Value) -> Result<(), ElasticError> {
        if self.index_exists(index).await? {
            debug!(index = %index, "Index already exists");
            return Ok(());
        }

        let client = &self.client;
        let response = self
            .send("ensure_index_with_mapping", move || async move {
                client
                    .indices()
                    .create(IndicesCreateParts::Index(index))
                    .body(mapping.clone())
                    .send()
                    .await
            })
            .await?;

        let created = decode::<AcknowledgedResponse>("ensure_index_with_mapping", response).await?;
        if !created.acknowledged {
            warn!(index = %index, "Index creation was not acknowledged");
            return Err(ElasticError::NotAcknowledged);
        }

        info!(index = %index, "Created index with mapping");
        Ok(())
    }

    async fn flush_index(&self, index: &str) -> Result<(), ElasticError> {
        let client = &self.client;

        self.send("flush_index", move || async move {
            client
                .indices()
                .flush(IndicesFlushParts::Index(&[index]))
                .send()
                .await
        })
        .await?;

        debug!(index = %index, "Flushed index");
        Ok(())
    }

    async fn get_indices(&self, prefixes: &[String]) -> Result<HashMap<String, Vec<String>>, ElasticError> {
        if prefixes.is_empty() {
            return Ok(HashMap::new());
        }

        let client = &self.client;
        let response = self
            .send("get_indices", move || async move {
                client
                    .cat()
                    .indices(CatIndicesParts::None)
                    .v(true)
                    .s(&["index"])
                    .format("txt")
                    .send()
                    .await
            })
            .await?;

        let catalog = response
            .text()
            .await
            .map_err(|e| ElasticError::from(e).with_operation("get_indices"))?;

        let indices = parse_index_catalog(&catalog, prefixes);
        debug!(prefixes = prefixes.len(), matched = indices.len(), "Listed indices");
        Ok(indices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_invalid_endpoint() {
        let config = ElasticClientConfig::new("not a url");

        let err = OpenSearchClient::new(&config).err().unwrap();
        assert!(matches!(err, ElasticError::ConnectionError(_)));
    }

    #[test]
    fn test_new_does_not_contact_cluster() {
        let config = ElasticClientConfig::new("http://127.0.0.1:1").with_basic_auth("elastic", "secret");

        let client = OpenSearchClient::new(&config).unwrap();
        assert_eq!(client.endpoint(), "http://127.0.0.1:1");
    }

    #[tokio::test]
    async fn test_health_check_stops_on_cancel() {
        let config = ElasticClientConfig::new("http://127.0.0.1:1")
            .with_health_check_interval(Duration::from_secs(3600));
        let client = Arc::new(OpenSearchClient::new(&config).unwrap());
        let cancel = CancellationToken::new();

        let handle = client.spawn_health_check(cancel.clone());
        cancel.cancel();

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[test]
    fn test_keyed_items_target_index() {
        let documents = vec![("1".to_string(), json!({"a": 1})), ("2".to_string(), json!({"a": 2}))];

        let items = OpenSearchClient::keyed_items("blocks-1", &documents, |index, id, body| {
            BulkItem::create(index, id, body)
        });

        assert_eq!(items.len(), 2);
        assert_eq!(
            items[1].header(),
            json!({"create": {"_index": "blocks-1", "_id": "2"}})
        );
    }
}
