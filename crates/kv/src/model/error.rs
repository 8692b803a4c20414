/// Error type for store operations.
#[derive(thiserror::Error, Debug)]
pub enum KvError {
    /// Boxed error. Indicates an issue with the store backend.
    #[error(transparent)]
    Inner(#[from] Box<dyn std::error::Error + Send + Sync + 'static>),

    /// The operation is not implemented by this cursor or store. Carries the
    /// operation name so callers can discriminate and fall back.
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),
}

impl KvError {
    /// Internal helper to create a [`KvError::Inner`] from any error.
    pub fn from_err<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        KvError::Inner(Box::new(err))
    }

    /// True if this error is [`KvError::Unsupported`].
    pub const fn is_unsupported(&self) -> bool {
        matches!(self, KvError::Unsupported(_))
    }
}

/// Trait to convert backend-specific read errors into [`KvError`].
pub trait KvReadError: std::error::Error + Send + Sync + 'static {
    /// Convert the error into a [`KvError`].
    fn into_kv_error(self) -> KvError;
}

impl KvReadError for KvError {
    fn into_kv_error(self) -> KvError {
        self
    }
}

/// Result type for store operations.
pub type KvResult<T> = Result<T, KvError>;
