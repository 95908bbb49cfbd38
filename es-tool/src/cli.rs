//! Command line definition.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use es_repository::{Sort, DEFAULT_SCROLL_KEEP_ALIVE};

use crate::config::ConnectionArgs;

#[derive(Debug, Parser)]
#[command(
    name = "es-tool",
    version,
    about = "Query and maintain an Elasticsearch-compatible cluster"
)]
pub struct Cli {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Subcommand)]
pub enum Command {
    /// Print cluster name and version.
    Ping,

    /// List index names per prefix, e.g. `transfers` matches `transfers-0`, `transfers-12`.
    Indices {
        #[arg(required = true)]
        prefixes: Vec<String>,
    },

    /// Count documents matching a query.
    Count {
        index: String,
        /// Query clause as JSON; matches everything when omitted.
        #[arg(long)]
        query: Option<String>,
    },

    /// Write every matching document to stdout as NDJSON.
    Dump {
        index: String,
        /// Query clause as JSON; matches everything when omitted.
        #[arg(long)]
        query: Option<String>,
        /// `field[:asc|desc]`
        #[arg(long)]
        sort: Option<Sort>,
        #[arg(long)]
        page_size: Option<i64>,
        #[arg(long, default_value = DEFAULT_SCROLL_KEEP_ALIVE)]
        keep_alive: String,
    },

    /// Flush an index.
    Flush { index: String },

    /// Create an index from a settings/mappings file unless it exists.
    EnsureIndex {
        index: String,
        #[arg(long)]
        mapping: PathBuf,
    },

    /// Add a field mapping, optionally nested under an object field.
    PutMapping {
        index: String,
        key: String,
        value_type: String,
        #[arg(long)]
        root: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dump() {
        let cli = Cli::try_parse_from([
            "es-tool",
            "dump",
            "transfers-1",
            "--sort",
            "timestamp:desc",
            "--page-size",
            "500",
        ])
        .unwrap();

        assert_eq!(
            cli.command,
            Command::Dump {
                index: "transfers-1".to_string(),
                query: None,
                sort: Some(Sort::desc("timestamp")),
                page_size: Some(500),
                keep_alive: DEFAULT_SCROLL_KEEP_ALIVE.to_string(),
            }
        );
    }

    #[test]
    fn test_parse_put_mapping_with_root() {
        let cli = Cli::try_parse_from([
            "es-tool",
            "put-mapping",
            "blocks-0",
            "color",
            "keyword",
            "--root",
            "attr",
        ])
        .unwrap();

        assert_eq!(
            cli.command,
            Command::PutMapping {
                index: "blocks-0".to_string(),
                key: "color".to_string(),
                value_type: "keyword".to_string(),
                root: Some("attr".to_string()),
            }
        );
    }

    #[test]
    fn test_rejects_bad_sort_and_missing_prefixes() {
        assert!(Cli::try_parse_from(["es-tool", "dump", "transfers-1", "--sort", "a:sideways"]).is_err());
        assert!(Cli::try_parse_from(["es-tool", "indices"]).is_err());
    }

    #[test]
    fn test_connection_flags() {
        let cli = Cli::try_parse_from([
            "es-tool",
            "--url",
            "http://search:9200",
            "--connection-mode",
            "retry",
            "ping",
        ])
        .unwrap();

        assert_eq!(cli.connection.endpoint, "http://search:9200");
        assert_eq!(cli.connection.connection_mode, crate::config::ConnectionMode::Retry);
        assert_eq!(cli.command, Command::Ping);
    }
}
