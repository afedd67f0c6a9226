use std::fmt;

use thiserror::Error;

use crate::pipeline::capability::{Capability, Direction};

/// Central error type for pipeline assembly and execution
#[derive(Error, Debug)]
pub enum LinkError {
    // ============================================================================
    // Resolution Errors
    // ============================================================================
    #[error("Stage not found: {identifier} ({reason})")]
    StageNotFound { identifier: String, reason: String },

    #[error("'{identifier}' is not a pipeline stage type")]
    NotAStageType { identifier: String },

    // ============================================================================
    // Capability Errors
    // ============================================================================
    #[error("Stage '{stage}' does not {direction} capability '{capability}'")]
    UnsupportedCapability {
        stage: String,
        capability: Capability,
        direction: Direction,
    },

    #[error("Stage type '{stage}' declares '{capability}' more than once as a capability it can {direction}")]
    DuplicateCapability {
        stage: String,
        capability: Capability,
        direction: Direction,
    },

    #[error("Chain broken: {0}")]
    ChainBroken(ChainBreak),

    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Invalid configuration for '{key}': {reason}")]
    InvalidConfiguration { key: String, reason: String },

    #[error("Invalid schema in unit '{unit}': {reason}")]
    InvalidSchema { unit: String, reason: String },

    #[error("Invalid pipeline document: {0}")]
    InvalidDocument(String),

    // ============================================================================
    // Execution Errors
    // ============================================================================
    #[error("Stage '{stage}' used out of order: {reason}")]
    InvalidStageState { stage: String, reason: String },

    #[error("Stage '{stage}' failed: {source}")]
    StageFailed {
        stage: String,
        #[source]
        source: Box<LinkError>,
    },

    /// Raised by stage handlers
    #[error("{0}")]
    Handler(String),

    // ============================================================================
    // Generic/System Errors
    // ============================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Where a chain failed to link
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainBreak {
    /// The first stage cannot start a pipeline
    NoSource { stage: String },

    /// Two consecutive stages share no capability
    NoLink {
        upstream: String,
        downstream: String,
        offered: Vec<Capability>,
    },

    /// The last stage cannot end a pipeline
    NoSink { stage: String },
}

impl fmt::Display for ChainBreak {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainBreak::NoSource { stage } => write!(
                f,
                "first stage '{}' does not consume '{}'",
                stage,
                Capability::SOURCE
            ),
            ChainBreak::NoLink {
                upstream,
                downstream,
                offered,
            } => {
                let offered: Vec<&str> = offered.iter().map(Capability::as_str).collect();
                write!(
                    f,
                    "'{}' consumes none of [{}] emitted by '{}'",
                    downstream,
                    offered.join(", "),
                    upstream
                )
            }
            ChainBreak::NoSink { stage } => write!(
                f,
                "last stage '{}' does not emit '{}'",
                stage,
                Capability::SINK
            ),
        }
    }
}

impl LinkError {
    /// Shorthand for handler failures
    pub fn handler(message: impl Into<String>) -> Self {
        LinkError::Handler(message.into())
    }
}

// Helper type alias for Results
pub type LinkResult<T> = Result<T, LinkError>;
