//! Search error types.
//!
//! This module defines the error types that can occur while querying the
//! search cluster.

use thiserror::Error;

/// Errors that can occur during search cluster operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SearchError {
    /// Failed to reach the node.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The request did not complete in time.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// The node answered with a throttling or server-side status.
    #[error("Node unavailable (status {status}): {message}")]
    Unavailable { status: u16, message: String },

    /// The query was rejected.
    #[error("Query error: {0}")]
    QueryError(String),

    /// Failed to parse a response from the search engine.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// The scroll context was released or expired on the cluster.
    #[error("Scroll expired: {0}")]
    ScrollExpired(String),

    /// No client is configured for the requested endpoint.
    #[error("Unknown endpoint: {0}")]
    UnknownEndpoint(String),
}

impl SearchError {
    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::ConnectionError(msg.into())
    }

    /// Create a timeout error.
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Create an unavailable error for the given HTTP status.
    pub fn unavailable(status: u16, msg: impl Into<String>) -> Self {
        Self::Unavailable {
            status,
            message: msg.into(),
        }
    }

    /// Create a query error.
    pub fn query(msg: impl Into<String>) -> Self {
        Self::QueryError(msg.into())
    }

    /// Create a parse error.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }

    /// Transient failures worth retrying against another node.
    pub fn is_retryable(&self) -> bool {
        match self {
            SearchError::ConnectionError(_)
            | SearchError::Timeout(_)
            | SearchError::Unavailable { .. } => true,
            SearchError::QueryError(_)
            | SearchError::ParseError(_)
            | SearchError::ScrollExpired(_)
            | SearchError::UnknownEndpoint(_) => false,
        }
    }
}
