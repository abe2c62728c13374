//! Errors raised while compiling a condition tree into a filter expression.

use thiserror::Error;

/// Failure of a single filter compilation. All variants are terminal for the
/// call that raised them; no partial expression is ever returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    /// The condition's operator has no registered interpreter, or the
    /// interpreter registered under that name does not accept the node's
    /// shape (field vs. compound).
    #[error("Unsupported operator: {0}")]
    UnsupportedOperator(String),

    /// The schema has no column for this field name.
    #[error("Unknown field: {0}")]
    UnknownField(String),

    /// The condition's value payload does not fit the operator, e.g. a list
    /// handed to an ordering comparison.
    #[error("operator `{operator}` cannot be applied to a {value_kind} value")]
    InvalidValue {
        operator: String,
        value_kind: &'static str,
    },

    /// The authorization-rule engine failed to produce rules. This crate
    /// never constructs this variant itself; `RuleSource` implementations
    /// use it to surface their own failures.
    #[error("rule retrieval failed: {0}")]
    RuleRetrieval(String),
}
