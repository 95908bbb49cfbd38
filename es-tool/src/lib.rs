//! # ES Tool
//!
//! Operator command line over `es-repository`.
//!
//! ## Modules
//!
//! - [`cli`]: Argument parsing
//! - [`config`]: Connection settings and session construction
//! - [`commands`]: Subcommand execution

pub mod cli;
pub mod commands;
pub mod config;

pub use config::Dependencies;

use es_repository::ElasticError;
use thiserror::Error;

/// Errors that can occur while running a command.
#[derive(Error, Debug)]
pub enum ToolError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Invalid command input, e.g. a malformed query.
    #[error("Invalid input: {0}")]
    InputError(String),

    /// Writing results failed.
    #[error("Output error: {0}")]
    OutputError(String),

    /// Error returned by the search cluster.
    #[error("Elasticsearch error: {0}")]
    ElasticError(#[from] ElasticError),
}

impl ToolError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Create an input error.
    pub fn input(msg: impl Into<String>) -> Self {
        Self::InputError(msg.into())
    }

    /// Create an output error.
    pub fn output(msg: impl Into<String>) -> Self {
        Self::OutputError(msg.into())
    }

    /// Whether the command stopped because it was interrupted.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::ElasticError(e) if e.is_cancelled())
    }
}
