//! Error types for the search expression engine.
//!
//! All failures are surfaced while a rule is parsed and resolved into a
//! [`SearchExpression`](crate::expression::SearchExpression). Evaluation and
//! SQL compilation of a successfully built expression are infallible.

use thiserror::Error;

use crate::value::SearchValueType;

/// Result alias for fallible search operations.
pub type SearchResult<T> = Result<T, SearchError>;

/// Top-level error for the search engine.
#[derive(Error, Debug)]
pub enum SearchError {
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Errors raised while parsing a rule string or resolving its variables.
#[derive(Error, Debug)]
pub enum ParseError {
    /// The rule text does not match the grammar.
    #[error("syntax error at position {position}: {message}")]
    Syntax { message: String, position: usize },

    /// A `{variable}` uses a prefix no resolver claims.
    #[error("unknown search term '{prefix}', expected one of: {valid}")]
    UnknownTerm { prefix: String, valid: String },

    /// An identifier contains characters outside `[A-Za-z0-9_]`.
    #[error("invalid identifier '{value}': only letters, digits and underscores are allowed")]
    InvalidIdentifier { value: String },

    /// A `["study"]` discriminator was used on a term that does not support it.
    #[error("the '{prefix}' term does not support cross-study search")]
    UnsupportedCrossStudy { prefix: String },

    /// A study-discriminated term was compared to `null`. The compiled query
    /// requires the sibling enrollment to exist, so a missing datum there is
    /// not observable and the comparison cannot be expressed.
    #[error("a study-discriminated '{prefix}' term cannot be compared to null")]
    CrossStudyNullComparison { prefix: String },

    /// A variable matched a resolver but does not have the shape it expects.
    #[error("malformed variable '{variable}': expected {expected}")]
    MalformedVariable { variable: String, expected: &'static str },

    /// A field name is not searchable for the given term.
    #[error("unknown field '{field}' for term '{term}'")]
    UnknownField { term: String, field: String },

    /// A function name is not part of the function catalog.
    #[error("unknown function '{name}'")]
    UnknownFunction { name: String },

    /// A function was called with the wrong number of arguments.
    #[error("function '{name}' expects {expected} argument(s), got {actual}")]
    FunctionArity {
        name: String,
        expected: &'static str,
        actual: usize,
    },

    /// A function argument has a type the function cannot operate on.
    #[error("function '{name}' cannot be applied to a {actual} argument")]
    FunctionArgumentType {
        name: String,
        actual: SearchValueType,
    },

    /// The two sides of a comparison have incompatible types.
    #[error("cannot apply '{operator}' to {left} and {right}")]
    TypeMismatch {
        operator: String,
        left: SearchValueType,
        right: SearchValueType,
    },
}

impl ParseError {
    pub(crate) fn syntax(message: impl Into<String>, position: usize) -> Self {
        ParseError::Syntax {
            message: message.into(),
            position,
        }
    }
}
