use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    ast::Tree,
    config::SystemConfig,
    dispatch::ChannelDispatcher,
    error::{WorkflowError, WorkflowResult},
    eval::{Evaluator, Value},
    parser,
    session::{Resolver, Session},
    worker::{ArithmeticWorker, Worker, WorkerPool},
};

/// Wires evaluators to a shared worker pool. Every evaluation runs in its own
/// session, reachable by workers under a unique callback address.
pub struct System {
    config: SystemConfig,
    dispatcher: ChannelDispatcher,
    pool: WorkerPool,
    pool_task: JoinHandle<()>,
}

impl System {
    pub async fn new(config: SystemConfig) -> WorkflowResult<Self> {
        let worker = Arc::new(ArithmeticWorker::new(config.worker.delay));
        Self::with_worker(config, worker).await
    }

    pub async fn with_worker(config: SystemConfig, worker: Arc<dyn Worker>) -> WorkflowResult<Self> {
        config.validate()?;
        let (dispatcher, requests) = ChannelDispatcher::new();
        let pool = WorkerPool::new(worker);
        let pool_task = pool.spawn(requests);
        debug!("system started: {:?}", config);
        Ok(Self {
            config,
            dispatcher,
            pool,
            pool_task,
        })
    }

    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    pub async fn evaluate(&self, source: &str) -> WorkflowResult<Value> {
        let tree = parser::parse(source)?;
        self.evaluate_tree(tree).await
    }

    pub async fn evaluate_tree(&self, tree: Tree) -> WorkflowResult<Value> {
        let callback = format!("{}/{}", self.config.callback_address, Uuid::new_v4().simple());
        let evaluator = Evaluator::new(tree)?
            .with_dispatcher(Arc::new(self.dispatcher.clone()), callback.clone());

        let (resolver, resolutions) = Resolver::channel(self.config.resolution_buffer_size);
        self.pool.register(callback.clone(), resolver.clone());
        let session = Session::attach(evaluator, resolver, resolutions);

        let timeout = self.config.evaluation_timeout;
        let outcome = tokio::time::timeout(timeout, session.wait()).await;
        self.pool.deregister(&callback);

        match outcome {
            Ok(result) => {
                let value = result?;
                info!("{} finished with {}", callback, value);
                Ok(value)
            }
            Err(_) => Err(WorkflowError::Timeout(timeout)),
        }
    }

    pub fn shutdown(self) {
        self.pool_task.abort();
    }
}
