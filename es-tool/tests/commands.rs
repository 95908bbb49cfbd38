//! Integration tests for subcommand execution against a mock cluster.

use mockito::{Matcher, Server, ServerGuard};
use serde_json::json;
use tokio_util::sync::CancellationToken;

use es_repository::{ElasticClientConfig, OpenSearchClient, RetryPolicy, Sort};
use es_tool::cli::Command;
use es_tool::{commands, ToolError};

fn client_for(server: &ServerGuard) -> OpenSearchClient {
    let config = ElasticClientConfig::new(server.url()).with_retry(RetryPolicy::disabled());
    OpenSearchClient::new(&config).unwrap()
}

async fn run(client: &OpenSearchClient, command: Command) -> Result<String, ToolError> {
    let mut out = Vec::new();
    commands::run(client, &command, &CancellationToken::new(), &mut out).await?;
    Ok(String::from_utf8(out).unwrap())
}

#[tokio::test]
async fn test_count_prints_total() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/transfers-1/_count")
        .match_query(Matcher::Any)
        .match_body(Matcher::PartialJson(json!({ "query": { "term": { "asset": "usdc" } } })))
        .with_status(200)
        .with_body(json!({ "count": 7 }).to_string())
        .create_async()
        .await;

    let client = client_for(&server);
    let output = run(
        &client,
        Command::Count {
            index: "transfers-1".to_string(),
            query: Some(r#"{"term":{"asset":"usdc"}}"#.to_string()),
        },
    )
    .await
    .unwrap();

    assert_eq!(output, "7\n");
}

#[tokio::test]
async fn test_indices_prints_json_map() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/_cat/indices")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(
            "health status index       uuid\n\
             green  open   transfers-0 u1\n\
             green  open   blocks-3    u2\n",
        )
        .create_async()
        .await;

    let client = client_for(&server);
    let output = run(
        &client,
        Command::Indices {
            prefixes: vec!["transfers".to_string(), "blocks".to_string(), "logs".to_string()],
        },
    )
    .await
    .unwrap();

    assert_eq!(
        output,
        "{\"blocks\":[\"blocks-3\"],\"transfers\":[\"transfers-0\"]}\n"
    );
}

#[tokio::test]
async fn test_dump_writes_ndjson() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/transfers-1/_search")
        .match_query(Matcher::Any)
        .match_body(Matcher::PartialJson(json!({
            "sort": [{ "timestamp": { "order": "asc" } }]
        })))
        .with_status(200)
        .with_body(
            json!({
                "_scroll_id": "cursor-9",
                "hits": {
                    "total": { "value": 2, "relation": "eq" },
                    "hits": [
                        { "_id": "a", "_source": { "id": "a", "amount": 1 } },
                        { "_id": "b", "_source": { "id": "b", "amount": 2 } }
                    ]
                }
            })
            .to_string(),
        )
        .create_async()
        .await;
    server
        .mock("POST", "/_search/scroll")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(
            json!({
                "_scroll_id": "cursor-9",
                "hits": { "total": { "value": 2, "relation": "eq" }, "hits": [] }
            })
            .to_string(),
        )
        .create_async()
        .await;
    server
        .mock("DELETE", "/_search/scroll")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(json!({ "succeeded": true, "num_freed": 1 }).to_string())
        .create_async()
        .await;

    let client = client_for(&server);
    let output = run(
        &client,
        Command::Dump {
            index: "transfers-1".to_string(),
            query: None,
            sort: Some(Sort::asc("timestamp")),
            page_size: Some(2),
            keep_alive: "1m".to_string(),
        },
    )
    .await
    .unwrap();

    let lines: Vec<serde_json::Value> = output
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(
        lines,
        vec![json!({ "id": "a", "amount": 1 }), json!({ "id": "b", "amount": 2 })]
    );
}

#[tokio::test]
async fn test_invalid_query_is_input_error() {
    let server = Server::new_async().await;
    let client = client_for(&server);

    let err = run(
        &client,
        Command::Count {
            index: "transfers-1".to_string(),
            query: Some("{oops".to_string()),
        },
    )
    .await
    .unwrap_err();

    assert!(matches!(err, ToolError::InputError(_)));
}

#[tokio::test]
async fn test_cluster_errors_are_wrapped() {
    let mut server = Server::new_async().await;
    server
        .mock("PUT", "/missing/_mapping")
        .match_query(Matcher::Any)
        .with_status(404)
        .with_body(r#"{"error":{"type":"index_not_found_exception"}}"#)
        .create_async()
        .await;

    let client = client_for(&server);
    let err = run(
        &client,
        Command::PutMapping {
            index: "missing".to_string(),
            key: "height".to_string(),
            value_type: "long".to_string(),
            root: None,
        },
    )
    .await
    .unwrap_err();

    match err {
        ToolError::ElasticError(e) => assert_eq!(e.operation(), Some("put_mapping")),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_flush_flushes_index() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/blocks-0/_flush")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(json!({ "_shards": { "total": 1, "successful": 1, "failed": 0 } }).to_string())
        .create_async()
        .await;

    let client = client_for(&server);
    let output = run(
        &client,
        Command::Flush {
            index: "blocks-0".to_string(),
        },
    )
    .await
    .unwrap();

    assert!(output.is_empty());
    mock.assert_async().await;
}
