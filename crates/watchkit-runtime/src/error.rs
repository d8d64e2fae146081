use thiserror::Error;
use watchkit_core::ExprError;

pub type Result<T> = std::result::Result<T, ObserveError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ObserveError {
    /// A pass kept re-running until the cycle limit: some callback keeps
    /// changing state that another (or the same) watch observes.
    #[error("feedback loop suspected: pass did not settle within {max_cycles} cycles")]
    FeedbackLoop { max_cycles: usize },

    #[error("invalid map result declaration for property `{property}`")]
    InvalidMapResult { property: String },

    #[error("expression error: {0}")]
    Expr(#[from] ExprError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl ObserveError {
    #[must_use]
    pub fn is_feedback_loop(&self) -> bool {
        matches!(self, Self::FeedbackLoop { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("max_cycles must be at least 2")]
    InvalidMaxCycles,

    #[error("cannot parse policy: {message}")]
    Parse { message: String },
}
