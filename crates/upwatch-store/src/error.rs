/// Errors that can occur within the storage layer.
///
/// Scheduler passes treat [`StoreError::NotFound`] as a skip rather than a
/// failure: entities may be deleted concurrently with a pass referencing
/// them.
///
/// # Examples
///
/// ```rust
/// use upwatch_store::error::StoreError;
///
/// let err = StoreError::NotFound {
///     entity: "service",
///     id: "svc-99".to_string(),
/// };
/// assert!(err.to_string().contains("service"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A required record was not found.
    #[error("store: {entity} not found (id={id})")]
    NotFound { entity: &'static str, id: String },

    /// A uniqueness constraint was violated (e.g. duplicate monitor token).
    #[error("store: {entity} conflict on {field}: {value}")]
    Conflict {
        entity: &'static str,
        field: &'static str,
        value: String,
    },

    /// JSON serialization or deserialization failure (channel config blobs).
    #[error("store: JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic storage error for cases not covered by other variants.
    #[error("store: {0}")]
    Other(String),
}

impl StoreError {
    /// True when the error is a [`StoreError::NotFound`], the variant
    /// scheduler passes skip over.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// Convenience `Result` alias for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;
