//! # Dispatch Boundary
//!
//! Asynchronous built-ins hand their work to an external worker through a
//! [`Dispatcher`]. The request carries everything the worker needs to report back:
//! the callback address of the evaluator, the pending token, and the arguments.
//! The evaluator never waits on the dispatcher; the result arrives later through
//! the resolution entry point.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

use crate::eval::{builtins::Builtin, Token, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchRequest {
    /// Where the worker delivers the result.
    pub callback: String,
    pub token: Token,
    pub operation: Builtin,
    pub arguments: Vec<Value>,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DispatchError {
    #[error("No dispatcher is attached; cannot run '{0}'")]
    Unavailable(String),
    #[error("Dispatch channel closed")]
    ChannelClosed,
}

#[cfg_attr(test, mockall::automock)]
pub trait Dispatcher: Send + Sync {
    fn dispatch(&self, request: DispatchRequest) -> Result<(), DispatchError>;
}

/// Rejects every request. Evaluators without a transport use this.
#[derive(Debug, Default, Clone, Copy)]
pub struct DetachedDispatcher;

impl Dispatcher for DetachedDispatcher {
    fn dispatch(&self, request: DispatchRequest) -> Result<(), DispatchError> {
        Err(DispatchError::Unavailable(request.operation.to_string()))
    }
}

/// Forwards requests into a tokio channel, typically drained by a
/// [`WorkerPool`](crate::worker::WorkerPool).
#[derive(Debug, Clone)]
pub struct ChannelDispatcher {
    sender: mpsc::UnboundedSender<DispatchRequest>,
}

impl ChannelDispatcher {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<DispatchRequest>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl Dispatcher for ChannelDispatcher {
    fn dispatch(&self, request: DispatchRequest) -> Result<(), DispatchError> {
        debug!(
            "dispatching {} for token {} to {}",
            request.operation, request.token, request.callback
        );
        self.sender.send(request).map_err(|_| DispatchError::ChannelClosed)
    }
}
