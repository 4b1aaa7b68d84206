use thiserror::Error;

use crate::dispatch::DispatchError;
use crate::eval::EvalError;
use crate::parser::ParseError;
use crate::path::PathError;
use crate::preprocessor::RewriteError;
use crate::session::SessionError;
use crate::worker::WorkerError;

#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),
    #[error("Rewrite error: {0}")]
    Rewrite(#[from] RewriteError),
    #[error("Path error: {0}")]
    Path(#[from] PathError),
    #[error("Eval error: {0}")]
    Eval(#[from] EvalError),
    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),
    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Config error: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Evaluation did not complete within {0:?}")]
    Timeout(std::time::Duration),
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;

impl WorkflowError {
    pub fn internal<S: Into<String>>(message: S) -> Self {
        WorkflowError::Internal(message.into())
    }
}
