//! Request and response types for facade operations.
//!
//! Queries are passed through as opaque `serde_json::Value` clauses; only the
//! parts of the engine responses the facade acts on are typed here. Document
//! sources stay raw (`RawValue`) until a caller decodes them.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use serde_json::{json, Map, Value};

use crate::errors::ElasticError;

/// Default keep-alive for scroll cursors.
pub const DEFAULT_SCROLL_KEEP_ALIVE: &str = "5m";

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

/// Field sort, rendered as `{"<field>": {"order": "<asc|desc>"}}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub field: String,
    pub order: SortOrder,
}

impl Sort {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            order: SortOrder::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            order: SortOrder::Desc,
        }
    }

    pub fn to_json(&self) -> Value {
        let mut clause = Map::new();
        clause.insert(self.field.clone(), json!({ "order": self.order.as_str() }));
        Value::Object(clause)
    }
}

/// Parses `field`, `field:asc` or `field:desc`.
impl FromStr for Sort {
    type Err = ElasticError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (field, order) = match s.rsplit_once(':') {
            Some((field, "asc")) => (field, SortOrder::Asc),
            Some((field, "desc")) => (field, SortOrder::Desc),
            Some((_, other)) => {
                return Err(ElasticError::validation(format!(
                    "Invalid sort order '{}', expected 'asc' or 'desc'",
                    other
                )))
            }
            None => (s, SortOrder::Asc),
        };

        if field.is_empty() {
            return Err(ElasticError::validation("Sort field cannot be empty"));
        }

        Ok(Self {
            field: field.to_string(),
            order,
        })
    }
}

impl fmt::Display for Sort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.field, self.order.as_str())
    }
}

/// Parameters for a paged search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchParameters {
    pub index: String,
    /// Query clause, e.g. `{"term": {"user": "kimchy"}}`.
    pub query: Value,
    pub from: Option<i64>,
    pub page_size: Option<i64>,
    pub sort: Vec<Sort>,
    pub search_after: Vec<Value>,
}

impl SearchParameters {
    pub fn new(index: impl Into<String>, query: Value) -> Self {
        Self {
            index: index.into(),
            query,
            from: None,
            page_size: None,
            sort: Vec::new(),
            search_after: Vec::new(),
        }
    }

    /// Full request body for the search endpoint.
    pub fn body(&self) -> Value {
        let mut body = Map::new();
        body.insert("query".to_string(), self.query.clone());
        if let Some(from) = self.from {
            body.insert("from".to_string(), json!(from));
        }
        if let Some(size) = self.page_size {
            body.insert("size".to_string(), json!(size));
        }
        if !self.sort.is_empty() {
            body.insert(
                "sort".to_string(),
                Value::Array(self.sort.iter().map(Sort::to_json).collect()),
            );
        }
        if !self.search_after.is_empty() {
            body.insert(
                "search_after".to_string(),
                Value::Array(self.search_after.clone()),
            );
        }
        Value::Object(body)
    }
}

/// Parameters for opening a scroll cursor.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrollRequest {
    pub index: String,
    /// Query clause.
    pub query: Value,
    pub sort: Option<Sort>,
    /// Hits per page. The engine default applies when unset.
    pub page_size: Option<i64>,
    /// How long the engine keeps the cursor alive between pages.
    pub keep_alive: String,
}

impl ScrollRequest {
    pub fn new(index: impl Into<String>, query: Value) -> Self {
        Self {
            index: index.into(),
            query,
            sort: None,
            page_size: None,
            keep_alive: DEFAULT_SCROLL_KEEP_ALIVE.to_string(),
        }
    }

    pub fn with_sort(mut self, sort: Sort) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn with_page_size(mut self, page_size: i64) -> Self {
        self.page_size = Some(page_size);
        self
    }

    pub fn with_keep_alive(mut self, keep_alive: impl Into<String>) -> Self {
        self.keep_alive = keep_alive.into();
        self
    }

    /// Request body for the initial search that opens the cursor.
    pub fn body(&self) -> Value {
        let mut body = Map::new();
        body.insert("query".to_string(), self.query.clone());
        if let Some(sort) = &self.sort {
            body.insert("sort".to_string(), json!([sort.to_json()]));
        }
        Value::Object(body)
    }
}

/// One page of a scroll cursor.
#[derive(Debug, Clone, Default)]
pub struct ScrollPage {
    /// Cursor id to fetch the next page with. Absent when the engine did not issue one.
    pub cursor_id: Option<String>,
    /// Total matching documents as reported by the engine (may be a lower bound).
    pub total: u64,
    pub hits: Vec<Hit>,
}

impl From<SearchResponse> for ScrollPage {
    fn from(response: SearchResponse) -> Self {
        let total = response.total_hits();
        Self {
            cursor_id: response.scroll_id.filter(|id| !id.is_empty()),
            total,
            hits: response.hits.hits,
        }
    }
}

/// Search response.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub took: i64,
    #[serde(default)]
    pub timed_out: bool,
    #[serde(rename = "_scroll_id", default)]
    pub scroll_id: Option<String>,
    pub hits: Hits,
}

impl SearchResponse {
    /// Total matching documents, falling back to the number of returned hits.
    pub fn total_hits(&self) -> u64 {
        self.hits
            .total
            .map(|total| total.value)
            .unwrap_or(self.hits.hits.len() as u64)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Hits {
    #[serde(default)]
    pub total: Option<TotalHits>,
    #[serde(default)]
    pub max_score: Option<f64>,
    #[serde(default)]
    pub hits: Vec<Hit>,
}

/// Whether the reported total is exact or a lower bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum TotalHitsRelation {
    #[default]
    #[serde(rename = "eq")]
    Equal,
    #[serde(rename = "gte")]
    GreaterThanOrEqual,
}

/// Total hit count. Accepts both the object form and the legacy integer form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(from = "TotalHitsRepr")]
pub struct TotalHits {
    pub value: u64,
    pub relation: TotalHitsRelation,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TotalHitsRepr {
    Object {
        value: u64,
        #[serde(default)]
        relation: TotalHitsRelation,
    },
    Count(u64),
}

impl From<TotalHitsRepr> for TotalHits {
    fn from(repr: TotalHitsRepr) -> Self {
        match repr {
            TotalHitsRepr::Object { value, relation } => Self { value, relation },
            TotalHitsRepr::Count(value) => Self {
                value,
                relation: TotalHitsRelation::Equal,
            },
        }
    }
}

/// A single search hit. The source stays raw until decoded by the caller.
#[derive(Debug, Clone, Deserialize)]
pub struct Hit {
    #[serde(rename = "_index", default)]
    pub index: String,
    #[serde(rename = "_id", default)]
    pub id: String,
    #[serde(rename = "_score", default)]
    pub score: Option<f64>,
    #[serde(rename = "_source", default)]
    pub source: Option<Box<RawValue>>,
    #[serde(default)]
    pub sort: Vec<Value>,
}

/// Node and version information returned by the cluster root endpoint.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ClusterInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub cluster_name: String,
    pub version: ClusterVersion,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ClusterVersion {
    pub number: String,
    #[serde(default)]
    pub distribution: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CountResponse {
    pub count: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct AcknowledgedResponse {
    #[serde(default)]
    pub acknowledged: bool,
}

/// A document addressed by index and id.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedDocument {
    pub index: String,
    pub id: String,
    pub body: Value,
}

impl IndexedDocument {
    pub fn new(index: impl Into<String>, id: impl Into<String>, body: Value) -> Self {
        Self {
            index: index.into(),
            id: id.into(),
            body,
        }
    }
}

/// Bulk action type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkAction {
    /// Create or replace.
    Index,
    /// Create only; fails for existing ids.
    Create,
}

impl BulkAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            BulkAction::Index => "index",
            BulkAction::Create => "create",
        }
    }
}

/// One action of a bulk request.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkItem {
    pub action: BulkAction,
    /// Target index. May be omitted when the bulk request names a default index.
    pub index: Option<String>,
    pub id: Option<String>,
    pub body: Value,
}

impl BulkItem {
    pub fn index(index: impl Into<String>, id: impl Into<String>, body: Value) -> Self {
        Self {
            action: BulkAction::Index,
            index: Some(index.into()),
            id: Some(id.into()),
            body,
        }
    }

    pub fn create(index: impl Into<String>, id: impl Into<String>, body: Value) -> Self {
        Self {
            action: BulkAction::Create,
            index: Some(index.into()),
            id: Some(id.into()),
            body,
        }
    }

    /// Action metadata line, e.g. `{"index": {"_index": "blocks-0", "_id": "42"}}`.
    pub fn header(&self) -> Value {
        let mut meta = Map::new();
        if let Some(index) = &self.index {
            meta.insert("_index".to_string(), json!(index));
        }
        if let Some(id) = &self.id {
            meta.insert("_id".to_string(), json!(id));
        }
        let mut header = Map::new();
        header.insert(self.action.as_str().to_string(), Value::Object(meta));
        Value::Object(header)
    }

    /// Approximate size on the wire: both NDJSON lines plus their newlines.
    pub fn estimated_size(&self) -> usize {
        self.header().to_string().len() + self.body.to_string().len() + 2
    }
}

impl From<IndexedDocument> for BulkItem {
    fn from(doc: IndexedDocument) -> Self {
        BulkItem::index(doc.index, doc.id, doc.body)
    }
}

/// Outcome of a single bulk action.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkItemResult {
    pub index: String,
    pub id: String,
    pub status: u16,
    /// Engine error, rendered as `<type>: <reason>`.
    pub error: Option<String>,
}

impl BulkItemResult {
    pub fn success(&self) -> bool {
        self.error.is_none() && (200..300).contains(&self.status)
    }
}

/// Summary of a bulk request with per-item results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub results: Vec<BulkItemResult>,
}

impl BulkSummary {
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    pub(crate) fn from_response(response: BulkResponse) -> Self {
        let results: Vec<BulkItemResult> = response
            .items
            .into_iter()
            .filter_map(|item| item.into_iter().next())
            .map(|(_, outcome)| BulkItemResult {
                index: outcome.index,
                id: outcome.id,
                status: outcome.status,
                error: outcome.error.map(|e| render_bulk_error(&e)),
            })
            .collect();

        let succeeded = results.iter().filter(|r| r.success()).count();
        Self {
            total: results.len(),
            succeeded,
            failed: results.len() - succeeded,
            results,
        }
    }
}

fn render_bulk_error(error: &Value) -> String {
    match (error.get("type"), error.get("reason")) {
        (Some(Value::String(kind)), Some(Value::String(reason))) => format!("{}: {}", kind, reason),
        _ => error.to_string(),
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct BulkResponse {
    #[serde(default)]
    pub items: Vec<HashMap<String, BulkResponseItem>>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct BulkResponseItem {
    #[serde(rename = "_index", default)]
    pub index: String,
    #[serde(rename = "_id", default)]
    pub id: String,
    pub status: u16,
    #[serde(default)]
    pub error: Option<Value>,
}
