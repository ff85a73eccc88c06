use crate::functions::Arity;
use crate::term::ExpressionTerm;
use oxrdf::{NamedNode, Variable};
use std::error::Error;

/// The error type of hooks and extension functions.
pub type HookError = Box<dyn Error + Send + Sync>;

/// An expression evaluation error
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum EvaluationError {
    /// The variable is not bound in the given bindings
    #[error("The variable {0} is not bound")]
    UnboundVariable(Variable),
    /// The expression can not be turned into an evaluable tree
    #[error("Invalid expression: {0}")]
    InvalidExpression(String),
    /// A function got a number of arguments it does not accept
    #[error("{function} expects {expected} argument(s), {actual} given")]
    InvalidArity {
        function: String,
        expected: Arity,
        actual: usize,
    },
    #[error("The operator {0} is not supported")]
    UnknownOperator(String),
    /// The function IRI is neither a built-in function nor a registered extension function
    #[error("The function {0} is not supported")]
    UnknownNamedOperator(NamedNode),
    /// No implementation of the function accepts the argument types
    #[error("{function} is not defined for arguments of type ({})", .arguments.join(", "))]
    NoOverloadMatch {
        function: String,
        arguments: Vec<String>,
    },
    /// An extension function failed
    #[error("The extension function {name} failed: {source}")]
    ExtensionFunctionError {
        name: NamedNode,
        #[source]
        source: HookError,
    },
    #[error("EXISTS is not supported by this evaluator")]
    NoExistenceHook,
    #[error("Aggregates are not supported by this evaluator")]
    NoAggregator,
    /// A function got a value it can not work with
    #[error("{term} of type {datatype} is not {expected}")]
    TypeCoercion {
        term: String,
        datatype: String,
        expected: &'static str,
    },
    /// A function got well typed but unusable values
    #[error("{0}")]
    InvalidArgument(String),
    #[error("{0} and {1} can not be compared")]
    IncomparableValues(String, String),
    /// Error returned by an existence or aggregate hook
    #[error(transparent)]
    HookFailure(HookError),
    /// The synchronous evaluation met a hook that did not complete immediately
    #[error("The evaluation has been suspended by an asynchronous hook")]
    Suspended,
}

impl EvaluationError {
    pub(crate) fn type_coercion(term: &ExpressionTerm, expected: &'static str) -> Self {
        Self::TypeCoercion {
            term: term.to_string(),
            datatype: term.type_name(),
            expected,
        }
    }

    pub(crate) fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub(crate) fn incomparable(a: &ExpressionTerm, b: &ExpressionTerm) -> Self {
        Self::IncomparableValues(a.to_string(), b.to_string())
    }
}
