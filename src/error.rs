use rusqlite::ErrorCode;

/// Closed failure taxonomy for the core. The embedding layer maps these
/// onto HTTP statuses (`Forbidden` -> 403, `NotFound` -> 404, `Conflict`
/// -> 409, `Validation` -> 400, `Store` -> 500/retry).
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// The actor lacks scope or authorization. The message never reveals
    /// whether the resource exists.
    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// Composite unique violation, e.g. a duplicate grade key created
    /// outside the upsert path.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A required identifier is missing or malformed.
    #[error("validation: {0}")]
    Validation(String),

    /// Underlying store failure. Transactional callers should treat this
    /// as retryable; the whole enclosing transaction has rolled back.
    #[error("store: {0}")]
    Store(rusqlite::Error),
}

impl CoreError {
    /// Stable machine-readable code for the embedding layer's error
    /// envelope.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::Forbidden(_) => "forbidden",
            CoreError::NotFound(_) => "not_found",
            CoreError::Conflict(_) => "conflict",
            CoreError::Validation(_) => "bad_params",
            CoreError::Store(_) => "db_query_failed",
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(e: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(f, _) = &e {
            if f.code == ErrorCode::ConstraintViolation {
                return CoreError::Conflict(e.to_string());
            }
        }
        CoreError::Store(e)
    }
}
