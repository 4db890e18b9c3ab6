//! Error taxonomy for a selection run.
//!
//! Only [`ConfigError`] (and a failed publish) ends a run. Everything that
//! can go wrong with a single candidate is recoverable and is turned into a
//! retry decision by the orchestrator.

use std::path::PathBuf;
use thiserror::Error;

/// Fatal configuration problems. These abort the run with a nonzero exit.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("source pool '{0}' has no endpoints")]
    EmptyPool(String),
    #[error("no primary pool configured")]
    NoPrimaryPool,
    #[error("source '{0}' is not defined under `sources`")]
    UnknownSource(String),
    #[error("no fallback url configured")]
    MissingFallback,
    #[error("invalid url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("invalid selector `{name}` ({selector}): {reason}")]
    InvalidSelector {
        name: &'static str,
        selector: String,
        reason: String,
    },
    #[error("cannot build http client: {0}")]
    HttpClient(String),
}

/// A single GET that did not produce a successful body.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} timed out")]
    Timeout { url: String },
    #[error("request to {url} failed: {message}")]
    Network { url: String, message: String },
    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },
}

/// Turning fetched content into a candidate failed.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("malformed document: {0}")]
    Parse(String),
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    #[error("unparseable publication date '{0}'")]
    InvalidDate(String),
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

/// Reading or writing the publication record failed.
#[derive(Debug, Error)]
pub enum StateStoreError {
    #[error("state file io: {0}")]
    Io(#[from] std::io::Error),
    #[error("state record encoding: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Image download or storage failed. Never blocks acceptance.
#[derive(Debug, Error)]
pub enum ImageError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("no image url on page {0}")]
    NotFound(String),
    #[error("cannot write image to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The external publisher refused the item.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("publisher rejected item: {0}")]
    Rejected(String),
    #[error("publisher unreachable: {0}")]
    Unavailable(String),
}

/// Terminal failure of a whole run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Publish(#[from] PublishError),
    #[error(transparent)]
    State(#[from] StateStoreError),
}
