use thiserror::Error;

pub type Result<T> = std::result::Result<T, ExprError>;

/// Expression compilation and assignment failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExprError {
    #[error("empty expression")]
    Empty,

    #[error("cannot parse expression `{expr}`: {message}")]
    Parse { expr: String, message: String },

    #[error("unknown formatter: {name}")]
    UnknownFormatter { name: String },

    #[error("expression is not assignable: {expr}")]
    NotAssignable { expr: String },

    #[error("cannot write through `{expr}`: target does not hold members")]
    NotWritable { expr: String },
}

impl ExprError {
    #[must_use]
    pub fn parse(expr: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            expr: expr.into(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn not_assignable(expr: impl Into<String>) -> Self {
        Self::NotAssignable { expr: expr.into() }
    }
}
