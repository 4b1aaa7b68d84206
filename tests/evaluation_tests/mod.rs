mod parallel_test;
mod resume_test;

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;
use workflow::{
    dispatch::{ChannelDispatcher, DispatchRequest},
    Evaluator,
};

/// An evaluator wired to a channel, so tests play the part of the worker.
pub struct Harness {
    pub evaluator: Evaluator,
    requests: UnboundedReceiver<DispatchRequest>,
}

impl Harness {
    pub fn new(source: &str) -> Self {
        let (dispatcher, requests) = ChannelDispatcher::new();
        let evaluator = Evaluator::from_string(source)
            .unwrap()
            .with_dispatcher(Arc::new(dispatcher), "harness");
        Self {
            evaluator,
            requests,
        }
    }

    /// Requests dispatched since the last call.
    pub fn dispatched(&mut self) -> Vec<DispatchRequest> {
        let mut requests = Vec::new();
        while let Ok(request) = self.requests.try_recv() {
            requests.push(request);
        }
        requests
    }
}
