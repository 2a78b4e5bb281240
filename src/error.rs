use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error, Diagnostic)]
pub enum SignalTableError {
    #[error("invalid genomic range {chromosome}:{start}-{end}: start is past end")]
    InvalidRange {
        chromosome: String,
        start: u64,
        end: u64,
    },

    #[error("invalid location: {0}")]
    #[diagnostic(help("expected a location like chr1:1000-100000"))]
    InvalidLocus(String),

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("query set does not describe a complete range; missing {}", .missing.join(", "))]
    IncompleteRange { missing: Vec<&'static str> },

    #[error("invalid aggregate kind: {0}")]
    InvalidAggregate(String),

    #[error("no signal sources given")]
    NoSources,

    #[error("failed to open signal source {locator}: {message}")]
    SourceOpen { locator: String, message: String },

    #[error("signal source {locator} query failed: {message}")]
    Fetch { locator: String, message: String },

    #[error("malformed tabular model: {0}")]
    MalformedModel(String),

    #[error("data sources must be built inside a tokio runtime")]
    NoRuntime,

    #[error("readiness cycle aborted: {0}")]
    CycleAborted(String),

    #[error("missing config file signal-table.json in current directory")]
    MissingConfig,

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),
}
