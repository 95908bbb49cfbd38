//! Subcommand execution.
//!
//! Results go to the supplied writer (stdout in the binary); logs go to
//! stderr so a dump stays valid NDJSON.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use es_repository::{ElasticClient, ElasticClientExt, ElasticError, ScrollRequest};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::cli::Command;
use crate::ToolError;

/// Run `command` against `client`, writing results to `out`.
pub async fn run<W>(
    client: &dyn ElasticClient,
    command: &Command,
    cancel: &CancellationToken,
    out: &mut W,
) -> Result<(), ToolError>
where
    W: Write + Send,
{
    match command {
        Command::Ping => {
            let info = client.ping().await?;
            emit(out, &to_json(&info)?)?;
        }
        Command::Indices { prefixes } => {
            let indices: BTreeMap<String, Vec<String>> =
                client.get_indices(prefixes).await?.into_iter().collect();
            emit(out, &to_json(&indices)?)?;
        }
        Command::Count { index, query } => {
            let count = client.count(index, &parse_query(query.as_deref())?).await?;
            emit(out, &count.to_string())?;
        }
        Command::Dump {
            index,
            query,
            sort,
            page_size,
            keep_alive,
        } => {
            let mut request = ScrollRequest::new(index.clone(), parse_query(query.as_deref())?)
                .with_keep_alive(keep_alive.clone());
            if let Some(sort) = sort {
                request = request.with_sort(sort.clone());
            }
            if let Some(page_size) = page_size {
                request = request.with_page_size(*page_size);
            }

            let summary = client
                .enumerate_items(&request, cancel, |item| match item.source {
                    Some(source) => writeln!(out, "{}", source.get())
                        .map_err(|e| ElasticError::handler(format!("write failed: {}", e))),
                    None => Ok(()),
                })
                .await?;

            info!(
                index = %index,
                delivered = summary.delivered,
                pages = summary.pages,
                total = summary.total,
                "Dump completed"
            );
        }
        Command::Flush { index } => {
            client.flush_index(index).await?;
            info!(index = %index, "Index flushed");
        }
        Command::EnsureIndex { index, mapping } => {
            let mapping = read_mapping(mapping)?;
            client.ensure_index_with_mapping(index, &mapping).await?;
            info!(index = %index, "Index ready");
        }
        Command::PutMapping {
            index,
            key,
            value_type,
            root,
        } => {
            client
                .put_mapping(index, root.as_deref(), key, value_type)
                .await?;
        }
    }

    out.flush().map_err(|e| ToolError::output(e.to_string()))
}

/// Parse a query clause, defaulting to `match_all`.
pub fn parse_query(query: Option<&str>) -> Result<Value, ToolError> {
    match query {
        Some(raw) => serde_json::from_str(raw)
            .map_err(|e| ToolError::input(format!("Invalid query JSON: {}", e))),
        None => Ok(json!({ "match_all": {} })),
    }
}

fn read_mapping(path: &Path) -> Result<Value, ToolError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| ToolError::input(format!("Failed to read {}: {}", path.display(), e)))?;
    serde_json::from_str(&raw)
        .map_err(|e| ToolError::input(format!("Invalid mapping in {}: {}", path.display(), e)))
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, ToolError> {
    serde_json::to_string(value).map_err(|e| ToolError::output(e.to_string()))
}

fn emit<W: Write>(out: &mut W, line: &str) -> Result<(), ToolError> {
    writeln!(out, "{}", line).map_err(|e| ToolError::output(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_query_defaults_to_match_all() {
        assert_eq!(parse_query(None).unwrap(), json!({ "match_all": {} }));
        assert_eq!(
            parse_query(Some(r#"{"term":{"id":"t-1"}}"#)).unwrap(),
            json!({ "term": { "id": "t-1" } })
        );
        assert!(matches!(
            parse_query(Some("{not json")),
            Err(ToolError::InputError(_))
        ));
    }

    #[test]
    fn test_read_mapping_missing_file() {
        let err = read_mapping(Path::new("/nonexistent/mapping.json")).unwrap_err();
        assert!(matches!(err, ToolError::InputError(_)));
    }
}
