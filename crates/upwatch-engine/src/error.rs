use upwatch_store::StoreError;

/// Errors surfaced by the engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Adding the edge would close a loop in the dependency graph. The edge
    /// is rejected before anything is persisted.
    #[error("dependency edge {dependent} -> {dependency} would create a cycle")]
    CycleDetected {
        dependent: String,
        dependency: String,
    },

    /// No monitor owns the presented check-in token.
    #[error("unknown monitor token")]
    UnknownToken,
}

impl EngineError {
    /// True for conditions a scheduler pass skips over rather than logs as
    /// failures: entities deleted concurrently with the pass.
    pub fn is_not_found(&self) -> bool {
        matches!(self, EngineError::Store(e) if e.is_not_found())
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
