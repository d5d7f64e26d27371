//! Error types for the `pdfqa-rag` crate.
//!
//! Provider adapters report failures as [`ProviderFault`]s. The embedding
//! gateway and the answer generator translate those into [`RagError`]
//! variants after retries, so no transport error type crosses the crate
//! boundary.

use thiserror::Error;

/// Errors that can occur in RAG operations.
#[derive(Debug, Error)]
pub enum RagError {
    /// The document produced no extractable text.
    #[error("Document '{document_id}' contains no extractable text")]
    EmptyDocument {
        /// The identifier of the rejected document.
        document_id: String,
    },

    /// A page was numbered 0; page numbers are 1-based.
    #[error("Document '{document_id}' has invalid page number {page_number} (pages are 1-based)")]
    InvalidPage {
        /// The identifier of the rejected document.
        document_id: String,
        /// The offending page number.
        page_number: u32,
    },

    /// The question was blank.
    #[error("Question must not be empty")]
    EmptyQuestion,

    /// The embedding provider failed with a non-retryable fault, or retries
    /// were exhausted.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingProvider {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The embedding provider returned a vector of unexpected length.
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// The dimensionality the provider advertises.
        expected: usize,
        /// The dimensionality actually returned.
        actual: usize,
    },

    /// An error occurred in the similarity index backend.
    #[error("Vector store error ({backend}): {message}")]
    VectorStore {
        /// The index backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// The completion provider could not produce an answer.
    #[error("Generation unavailable ({provider}) after {attempts} attempt(s): {message}")]
    GenerationUnavailable {
        /// The completion provider that produced the error.
        provider: String,
        /// How many attempts were made before giving up.
        attempts: u32,
        /// A description of the last failure.
        message: String,
    },

    /// A configuration validation or loading error.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;

/// Classification of a provider failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// The provider throttled the request (HTTP 429).
    RateLimited,
    /// The request timed out, locally or at the provider.
    Timeout,
    /// The provider is temporarily unavailable (5xx, connection failure).
    Unavailable,
    /// Credentials were rejected.
    Auth,
    /// The provider rejected the request as invalid.
    InvalidRequest,
    /// The response could not be understood.
    Malformed,
}

impl FaultKind {
    /// Whether a request failing this way may succeed when retried.
    pub fn is_transient(self) -> bool {
        matches!(self, FaultKind::RateLimited | FaultKind::Timeout | FaultKind::Unavailable)
    }

    /// Classify an HTTP status code returned by a provider.
    pub fn from_status(status: u16) -> Self {
        match status {
            429 => FaultKind::RateLimited,
            408 => FaultKind::Timeout,
            401 | 403 => FaultKind::Auth,
            500..=599 => FaultKind::Unavailable,
            _ => FaultKind::InvalidRequest,
        }
    }
}

/// A failure reported by an embedding or completion provider.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind:?}: {message}")]
pub struct ProviderFault {
    /// What kind of failure this is.
    pub kind: FaultKind,
    /// A description of the failure.
    pub message: String,
}

impl ProviderFault {
    /// Create a fault of the given kind.
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    /// Create a fault from an HTTP status and response detail.
    pub fn from_status(status: u16, detail: impl AsRef<str>) -> Self {
        Self::new(FaultKind::from_status(status), format!("HTTP {status}: {}", detail.as_ref()))
    }

    /// Whether the failed request may be retried.
    pub fn is_transient(&self) -> bool {
        self.kind.is_transient()
    }
}

/// Result type returned by provider adapters.
pub type ProviderResult<T> = std::result::Result<T, ProviderFault>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert_eq!(FaultKind::from_status(429), FaultKind::RateLimited);
        assert_eq!(FaultKind::from_status(503), FaultKind::Unavailable);
        assert_eq!(FaultKind::from_status(401), FaultKind::Auth);
        assert_eq!(FaultKind::from_status(400), FaultKind::InvalidRequest);
        assert!(ProviderFault::from_status(408, "slow").is_transient());
        assert!(!ProviderFault::from_status(403, "denied").is_transient());
    }
}
