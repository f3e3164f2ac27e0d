use thiserror::Error;

/// Errors raised by the pattern algebra.
///
/// `Argument` is raised synchronously when a combinator is built with an
/// illegal scalar. `Lookup` and `TypeMismatch` arise at query time; the
/// query path drops the offending event and reports through `tracing`
/// rather than aborting the whole query.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PatternError {
    #[error("illegal argument to {operator}: {message}")]
    Argument {
        operator: &'static str,
        message: String,
    },

    #[error("unknown {kind} name: {name}")]
    Lookup { kind: &'static str, name: String },

    #[error("expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: String,
    },
}

impl PatternError {
    pub fn argument(operator: &'static str, message: impl Into<String>) -> Self {
        PatternError::Argument {
            operator,
            message: message.into(),
        }
    }

    pub fn lookup(kind: &'static str, name: impl Into<String>) -> Self {
        PatternError::Lookup {
            kind,
            name: name.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PatternError>;
