//! Error type shared by the element model, the fluent builder and the compiler.

use thiserror::Error;

use crate::element::ElementKind;

/// Every failure is a contract violation raised synchronously at the call
/// that broke it; nothing here is retryable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    /// A required reference (such as the parent of a non-root element) is missing.
    #[error("argument `{argument}` must not be empty")]
    NullArgument { argument: &'static str },

    /// A required string argument is empty or blank, or a value is otherwise unusable.
    #[error("invalid argument `{argument}`: {message}")]
    Validation {
        argument: &'static str,
        message: String,
    },

    /// A value lies outside the supported set; `value` echoes what was passed.
    #[error("argument `{argument}` is out of range: {value}")]
    OutOfRange {
        argument: &'static str,
        value: String,
    },

    /// The one-time `child` slot of an element was assigned a second time.
    #[error("child element is already set on `{kind}` element")]
    ChildAlreadySet { kind: ElementKind },

    /// The chain handed to the compiler has broken or mismatched links.
    #[error("inconsistent filter chain: {message}")]
    Inconsistent { message: String },
}

impl FilterError {
    pub(crate) fn validation(argument: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            argument,
            message: message.into(),
        }
    }

    pub(crate) fn out_of_range(argument: &'static str, value: impl Into<String>) -> Self {
        Self::OutOfRange {
            argument,
            value: value.into(),
        }
    }

    pub(crate) fn inconsistent(message: impl Into<String>) -> Self {
        Self::Inconsistent {
            message: message.into(),
        }
    }
}
