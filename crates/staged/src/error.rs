use stratum_kv::{KvError, KvReadError};

/// Error type for staged transactions and cursors.
#[derive(thiserror::Error, Debug)]
pub enum StagedError {
    /// Error from an underlying store, propagated verbatim.
    #[error(transparent)]
    Store(#[from] KvError),

    /// The operation is not implemented on a staged cursor. Carries the
    /// operation name so callers can discriminate and fall back.
    #[error("unsupported staged cursor operation: {0}")]
    Unsupported(&'static str),

    /// A relative move was issued before any positioning call succeeded.
    #[error("staged cursor is not positioned")]
    NotPositioned,
}

impl StagedError {
    /// Wrap a base-store error.
    pub(crate) fn from_base<E: KvReadError>(err: E) -> Self {
        StagedError::Store(err.into_kv_error())
    }

    /// True if this error is [`StagedError::Unsupported`].
    pub const fn is_unsupported(&self) -> bool {
        matches!(self, StagedError::Unsupported(_) | StagedError::Store(KvError::Unsupported(_)))
    }
}

impl KvReadError for StagedError {
    fn into_kv_error(self) -> KvError {
        match self {
            StagedError::Store(e) => e,
            StagedError::Unsupported(op) => KvError::Unsupported(op),
            e @ StagedError::NotPositioned => KvError::from_err(e),
        }
    }
}

/// Result type for staged operations.
pub type StagedResult<T> = Result<T, StagedError>;
