use crate::types::DbId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// Every `_N` suffix up to the attempt cap is already taken.
    #[error("Namespace {namespace_id} exhausted: no free {field} for '{value}' after {attempts} attempts")]
    NamespaceExhausted {
        namespace_id: DbId,
        field: &'static str,
        value: String,
        attempts: u32,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}
