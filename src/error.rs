use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("parse error: {source}")]
    Parse {
        #[from]
        source: ParseError,
    },

    #[error("route config error: {source}")]
    RouteConfig {
        #[from]
        source: RouteConfigError,
    },

    #[error("not found: {source}")]
    NotFound {
        #[from]
        source: NotFoundError,
    },

    #[error("data access error: {source}")]
    DataAccess {
        #[from]
        source: DataAccessError,
    },

    #[error("serialization error: {source}")]
    Serialization {
        #[from]
        source: SerializationError,
    },

    #[error("config error: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    #[error("no routes registered, add at least one route before starting the server")]
    NoRoutes,

    #[error("route `{pattern}` needs a data executor but none is configured")]
    ExecutorUnavailable { pattern: String },

    #[error("handler failed: {0}")]
    Handler(String),
}

impl Error {
    pub fn handler<S: ToString>(reason: S) -> Self {
        Self::Handler(reason.to_string())
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("malformed request line: {line:?}")]
    MalformedRequestLine { line: String },

    #[error("boundary not found in Content-Type header: {header:?}")]
    MissingBoundary { header: String },
}

impl ParseError {
    pub fn malformed_request_line<S: ToString>(line: S) -> Self {
        Self::MalformedRequestLine { line: line.to_string() }
    }

    pub fn missing_boundary<S: ToString>(header: S) -> Self {
        Self::MissingBoundary { header: header.to_string() }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouteConfigError {
    #[error("allowed methods are GET, POST, PUT, OPTIONS; method {method:?} is not supported")]
    UnsupportedMethod { method: String },
}

#[derive(Debug, Error)]
pub enum NotFoundError {
    #[error("file not found at {route}")]
    File { route: String },

    #[error("path {route} escapes the static root")]
    OutsideRoot { route: String },
}

#[derive(Debug, Error)]
pub enum DataAccessError {
    #[error("query failed: {reason}")]
    Query { reason: String },

    #[error("expected to update one row, but updated {affected} rows")]
    UnexpectedRowCount { affected: u64 },

    #[error("expected one row but query returned {rows}")]
    TooManyRows { rows: usize },

    #[error("failed to map row: {source}")]
    RowMapping {
        #[from]
        source: serde_json::Error,
    },
}

impl DataAccessError {
    pub fn query<S: ToString>(reason: S) -> Self {
        Self::Query { reason: reason.to_string() }
    }
}

#[derive(Debug, Error)]
pub enum SerializationError {
    #[error("value is not representable as json: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    #[error("failed to parse config file: {source}")]
    Parse {
        #[from]
        source: serde_json::Error,
    },

    #[error("invalid config: {reason}")]
    Invalid { reason: String },
}
