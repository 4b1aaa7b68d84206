//! # Session
//!
//! Runs one [`Evaluator`] on its own tokio task and feeds it results through a
//! bounded queue. The task is the only writer of the evaluator's state, so results
//! delivered concurrently by many workers are applied strictly one at a time.
//!
//! ```text
//! worker ─┐
//! worker ─┼─ Resolver ─► mpsc ─► session task ─► Evaluator::resolve
//! worker ─┘
//! ```

use thiserror::Error;
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use tracing::{debug, info};

use crate::eval::{EvalError, Evaluator, RunStatus, Token, Value};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    #[error("Evaluation failed: {0}")]
    Eval(#[from] EvalError),
    #[error("Session closed before the evaluation completed")]
    Closed,
}

pub type SessionResult<T> = Result<T, SessionError>;

/// Result of one pending call, on its way into a session.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub token: Token,
    pub value: Value,
}

/// Cloneable handle to a session's resolution entry point.
#[derive(Debug, Clone)]
pub struct Resolver {
    sender: mpsc::Sender<Resolution>,
}

impl Resolver {
    /// Creates a resolver together with the queue it feeds.
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<Resolution>) {
        let (sender, receiver) = mpsc::channel(buffer);
        (Self { sender }, receiver)
    }

    /// Queues the result for `token`. Results for unknown or already completed
    /// tokens are accepted here and ignored by the evaluator.
    pub async fn resolve(&self, token: Token, value: Value) -> SessionResult<()> {
        self.sender
            .send(Resolution { token, value })
            .await
            .map_err(|_| SessionError::Closed)
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

pub struct Session {
    resolver: Resolver,
    completion: oneshot::Receiver<Value>,
    task: JoinHandle<Result<(), EvalError>>,
}

impl Session {
    /// Moves `evaluator` onto a new task and runs it. Must be called from within a
    /// tokio runtime. Replaces any completion callback set on the evaluator.
    pub fn start(evaluator: Evaluator, buffer: usize) -> Self {
        let (resolver, resolutions) = Resolver::channel(buffer);
        Self::attach(evaluator, resolver, resolutions)
    }

    /// Like [`Session::start`], with a queue created beforehand so the resolver can
    /// be handed out before the first pass dispatches anything.
    pub fn attach(
        evaluator: Evaluator,
        resolver: Resolver,
        resolutions: mpsc::Receiver<Resolution>,
    ) -> Self {
        let (done, completion) = oneshot::channel();
        let evaluator = evaluator.on_complete(move |value| {
            let _ = done.send(value.clone());
        });
        let task = tokio::spawn(drive(evaluator, resolutions));
        Self {
            resolver,
            completion,
            task,
        }
    }

    pub fn resolver(&self) -> Resolver {
        self.resolver.clone()
    }

    /// Waits for the final value. Dropping the last resolver of a suspended
    /// session ends it with [`SessionError::Closed`].
    pub async fn wait(self) -> SessionResult<Value> {
        let Session {
            resolver,
            completion,
            task,
        } = self;
        drop(resolver);
        match completion.await {
            Ok(value) => Ok(value),
            Err(_) => match task.await {
                Ok(Err(e)) => Err(SessionError::Eval(e)),
                _ => Err(SessionError::Closed),
            },
        }
    }
}

async fn drive(
    mut evaluator: Evaluator,
    mut resolutions: mpsc::Receiver<Resolution>,
) -> Result<(), EvalError> {
    let mut status = evaluator.run()?;
    while let RunStatus::Suspended { pending } = status {
        debug!("session waiting on {} pending call(s)", pending);
        let Some(Resolution { token, value }) = resolutions.recv().await else {
            info!("all resolvers dropped; abandoning evaluation");
            return Ok(());
        };
        status = evaluator.resolve(&token, value)?;
    }
    Ok(())
}
