//! Workflow Evaluation System
//!
//! Evaluates an expression tree whose leaves may be asynchronous calls. The
//! evaluator makes as much progress as it can, parks calls that are waiting on an
//! external result, and picks up exactly where it stopped once a result arrives.
//!
//! # Core Components
//!
//! ## Evaluator
//! Drives repeated passes over the tree and owns the per-node evaluation state.
//! See [`evaluator::Evaluator`].
//!
//! ## Pending Registry
//! Tracks in-flight asynchronous calls by token, together with the path of the
//! node that is waiting on each one. See [`registry::PendingRegistry`].
//!
//! ## Built-ins
//! The closed namespace of callable operations, synchronous or asynchronous.
//!
//! # Resumption
//!
//! There is no saved call stack. Every resumption re-walks the tree from the root;
//! nodes that already hold a value or a parked token are skipped, so completed
//! subtrees are never executed twice.

pub mod builtins;
pub mod evaluator;
pub mod operators;
pub mod registry;
pub mod value;

use thiserror::Error;

use crate::{ast::NodeId, dispatch::DispatchError, path::PathError};

pub use evaluator::{Evaluator, NodeState, RunStatus};
pub use registry::{PendingEntry, PendingRegistry, Token};
pub use value::Value;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("name '{0}' is not defined")]
    Name(String),
    #[error("{function}() got multiple values for keyword argument '{keyword}'")]
    ArgumentConflict { function: String, keyword: String },
    #[error("{function}() missing required argument '{argument}'")]
    MissingArgument { function: String, argument: String },
    #[error("{function}() got an unexpected argument '{argument}'")]
    UnexpectedArgument { function: String, argument: String },
    #[error("{function}() takes {expected} positional argument(s) but {given} were given")]
    TooManyArguments {
        function: String,
        expected: usize,
        given: usize,
    },
    #[error("'{0}' is not callable")]
    NotCallable(String),
    #[error("unsupported operand types: {left} {op} {right}")]
    TypeMismatch {
        op: String,
        left: String,
        right: String,
    },
    #[error("integer overflow in '{op}'")]
    Overflow { op: String },
    #[error("division by zero")]
    DivisionByZero,
    #[error("argument after {spread} must be a {expected}, not {found}")]
    InvalidSpread {
        spread: &'static str,
        expected: &'static str,
        found: String,
    },
    #[error("any() needs at least one argument")]
    EmptyAny,
    #[error("node {0} has no value yet")]
    Unresolved(NodeId),
    #[error("Path error: {0}")]
    Path(#[from] PathError),
    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),
}

pub type EvalResult<T> = Result<T, EvalError>;
