use thiserror::Error;
use uuid::Uuid;

/// Errors from flagging operations.
#[derive(Error, Debug)]
pub enum FlagError {
    /// A flaggable type was declared with an empty vocabulary.
    #[error("flaggable type {flaggable_type} must declare at least one flag")]
    MissingFlags { flaggable_type: String },

    /// The target's type was never declared flaggable.
    #[error("{flaggable_type} is not a flaggable type")]
    InvalidFlaggable { flaggable_type: String },

    /// The actor's type was never declared a flagger.
    #[error("{flagger_type} is not a flagger type")]
    InvalidFlagger { flagger_type: String },

    /// The flag name is outside the target type's vocabulary.
    #[error("flag {flag:?} is not allowed on {flaggable_type}")]
    InvalidFlag {
        flag: String,
        flaggable_type: String,
    },

    #[error("already flagged")]
    AlreadyFlagged,

    #[error("not flagged")]
    NotFlagged,

    #[error("invalid declaration: {0}")]
    InvalidDeclaration(String),

    #[error("flagging {0} not found")]
    FlaggingNotFound(Uuid),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("invalid registry document: {0}")]
    Registry(#[from] serde_json::Error),
}

/// Result type for flagging operations.
pub type Result<T> = std::result::Result<T, FlagError>;
