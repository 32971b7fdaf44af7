// =============================================================================
// error.rs - FOUR WAYS TO DISAPPOINT A CALLER
// =============================================================================
//
// Every failure the engine can surface falls into exactly one bucket:
//
//   Validation  the caller asked for something malformed (bad CIK, bad year)
//   NotFound    the upstream has nothing for that CIK/year, nobody's fault
//   Upstream    EDGAR would not give us the document, even after retries
//   Parse       EDGAR gave us a document we could not make sense of
//
// Callers branch on `kind()`, never on message text. Mapping kinds to HTTP
// statuses belongs to whatever routing layer sits on top of us; the mapping
// it is expected to use lives on `ErrorKind::http_status` for reference.
// =============================================================================

use std::fmt;

/// Result alias used throughout the engine.
pub type Result<T> = std::result::Result<T, HoldingsError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HoldingsError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("upstream error fetching {url}: {cause}")]
    Upstream { url: String, cause: String },

    #[error("parse error: {0}")]
    Parse(String),

    /// The HTTP client itself could not be built. Happens at construction,
    /// never per request.
    #[error("http client error: {0}")]
    Client(String),
}

/// The error taxonomy without payloads, for branching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Upstream,
    Parse,
    Client,
}

impl HoldingsError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            HoldingsError::Validation(_) => ErrorKind::Validation,
            HoldingsError::NotFound(_) => ErrorKind::NotFound,
            HoldingsError::Upstream { .. } => ErrorKind::Upstream,
            HoldingsError::Parse(_) => ErrorKind::Parse,
            HoldingsError::Client(_) => ErrorKind::Client,
        }
    }

    pub(crate) fn upstream(url: impl Into<String>, cause: impl Into<String>) -> Self {
        HoldingsError::Upstream {
            url: url.into(),
            cause: cause.into(),
        }
    }
}

impl ErrorKind {
    /// The status a routing layer is expected to answer with.
    pub fn http_status(self) -> u16 {
        match self {
            ErrorKind::Validation => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::Upstream | ErrorKind::Parse | ErrorKind::Client => 500,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Validation => write!(f, "VALIDATION"),
            ErrorKind::NotFound => write!(f, "NOT_FOUND"),
            ErrorKind::Upstream => write!(f, "UPSTREAM"),
            ErrorKind::Parse => write!(f, "PARSE"),
            ErrorKind::Client => write!(f, "CLIENT"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_maps_to_routing_status() {
        assert_eq!(HoldingsError::Validation("x".into()).kind().http_status(), 400);
        assert_eq!(HoldingsError::NotFound("x".into()).kind().http_status(), 404);
        assert_eq!(HoldingsError::upstream("u", "boom").kind().http_status(), 500);
        assert_eq!(HoldingsError::Parse("x".into()).kind().http_status(), 500);
    }

    #[test]
    fn test_upstream_message_carries_url_and_cause() {
        let err = HoldingsError::upstream("https://example.test/doc.xml", "HTTP 503");
        let msg = err.to_string();
        assert!(msg.contains("https://example.test/doc.xml"));
        assert!(msg.contains("HTTP 503"));
    }
}
