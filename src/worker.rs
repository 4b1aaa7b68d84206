//! # Workers
//!
//! In-process stand-ins for the external services that compute asynchronous
//! built-ins. A [`WorkerPool`] drains dispatched requests, runs each one on its own
//! task, and posts the result to the session registered under the request's
//! callback address.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, error, warn};

use crate::{
    ast::BinaryOperator,
    dispatch::DispatchRequest,
    eval::{builtins::Builtin, operators, EvalError, Value},
    session::Resolver,
};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum WorkerError {
    #[error("Operation '{0}' is not handled by this worker")]
    Unsupported(Builtin),
    #[error("{operation} expects {expected} argument(s), got {given}")]
    Arity {
        operation: Builtin,
        expected: usize,
        given: usize,
    },
    #[error("Operation failed: {0}")]
    Eval(#[from] EvalError),
}

pub type WorkerResult<T> = Result<T, WorkerError>;

#[async_trait]
pub trait Worker: Send + Sync {
    async fn perform(&self, operation: Builtin, arguments: Vec<Value>) -> WorkerResult<Value>;
}

/// Computes `add`, `mul` and `echo` after a fixed delay.
#[derive(Debug, Clone, Default)]
pub struct ArithmeticWorker {
    delay: Duration,
}

impl ArithmeticWorker {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

fn expect_arity(operation: Builtin, arguments: &[Value], expected: usize) -> WorkerResult<()> {
    if arguments.len() != expected {
        return Err(WorkerError::Arity {
            operation,
            expected,
            given: arguments.len(),
        });
    }
    Ok(())
}

#[async_trait]
impl Worker for ArithmeticWorker {
    async fn perform(&self, operation: Builtin, arguments: Vec<Value>) -> WorkerResult<Value> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match operation {
            Builtin::Add => {
                expect_arity(operation, &arguments, 2)?;
                Ok(operators::apply(BinaryOperator::Add, &arguments[0], &arguments[1])?)
            }
            Builtin::Mul => {
                expect_arity(operation, &arguments, 2)?;
                Ok(operators::apply(BinaryOperator::Multiply, &arguments[0], &arguments[1])?)
            }
            Builtin::Echo => {
                expect_arity(operation, &arguments, 1)?;
                Ok(arguments.into_iter().next().unwrap_or_default())
            }
            other => Err(WorkerError::Unsupported(other)),
        }
    }
}

/// Routes results back by callback address.
#[derive(Clone)]
pub struct WorkerPool {
    worker: Arc<dyn Worker>,
    routes: Arc<DashMap<String, Resolver>>,
}

impl WorkerPool {
    pub fn new(worker: Arc<dyn Worker>) -> Self {
        Self {
            worker,
            routes: Arc::new(DashMap::new()),
        }
    }

    pub fn register(&self, callback: impl Into<String>, resolver: Resolver) {
        self.routes.insert(callback.into(), resolver);
    }

    pub fn deregister(&self, callback: &str) {
        self.routes.remove(callback);
    }

    pub fn routes(&self) -> usize {
        self.routes.len()
    }

    /// Drains `requests` until the sending side is dropped.
    pub fn spawn(&self, mut requests: mpsc::UnboundedReceiver<DispatchRequest>) -> JoinHandle<()> {
        let pool = self.clone();
        tokio::spawn(async move {
            while let Some(request) = requests.recv().await {
                let pool = pool.clone();
                tokio::spawn(async move { pool.handle(request).await });
            }
            debug!("dispatch channel closed; worker pool stopping");
        })
    }

    /// Performs one request and delivers its result.
    pub async fn handle(&self, request: DispatchRequest) {
        let DispatchRequest {
            callback,
            token,
            operation,
            arguments,
        } = request;
        let value = match self.worker.perform(operation, arguments).await {
            Ok(value) => value,
            Err(e) => {
                error!("{} for token {} failed: {}", operation, token, e);
                return;
            }
        };
        // Clone out of the map so no shard lock is held across the await.
        let Some(resolver) = self.routes.get(&callback).map(|entry| entry.value().clone()) else {
            warn!("no session registered at {}; dropping result for {}", callback, token);
            return;
        };
        if let Err(e) = resolver.resolve(token, value).await {
            debug!("result for {} not delivered: {}", token, e);
        }
    }
}
