use thiserror::Error;

/// Every error kind the core distinguishes.
///
/// Variants map onto surfaced HTTP-equivalent categories at the dispatch
/// layer: `NotFound`/`Validation`/`SignatureInvalid`/`PackageExpired` are
/// 4xx-equivalent, `BreakerOpen`/`UpstreamTransient`/`UpstreamMalformed` are
/// upstream-unavailable-equivalent, and `Store` is an infrastructure failure
/// with no named kind.
#[derive(Debug, Error)]
pub enum MnemoError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("llm circuit breaker open")]
    BreakerOpen,

    #[error("upstream llm call failed after retries: {0}")]
    UpstreamTransient(String),

    #[error("upstream llm returned malformed output: {0}")]
    UpstreamMalformed(String),

    #[error("shared package signature invalid")]
    SignatureInvalid,

    #[error("shared package expired")]
    PackageExpired,

    #[error("job handler failed: {0}")]
    JobHandlerError(String),

    #[error(transparent)]
    Store(#[from] sqlx::Error),
}

impl MnemoError {
    /// Whether this error kind is the caller's fault (4xx-equivalent) as
    /// opposed to an upstream/infrastructure failure.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            MnemoError::NotFound(_)
                | MnemoError::Validation(_)
                | MnemoError::SignatureInvalid
                | MnemoError::PackageExpired
        )
    }
}
