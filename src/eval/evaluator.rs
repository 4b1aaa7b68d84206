use core::fmt;
use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::{
    ast::{Call, Composition, Node, NodeId, Tree},
    dispatch::{DetachedDispatcher, Dispatcher},
    error::WorkflowResult,
    parser,
    path::NodePath,
    preprocessor::{Preprocessor, RewriteError},
};

use super::{
    builtins::{Builtin, CallArgs, CallContext, CallOutcome},
    operators, EvalError, EvalResult, PendingRegistry, Token, Value,
};

/// Evaluation state of one node. Moves out of `Unresolved` at most once, except
/// that a parked node becomes concrete when its result arrives.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum NodeState {
    #[default]
    Unresolved,
    Concrete(Value),
    /// Waiting on an external result.
    Parked(Token),
}

impl NodeState {
    pub fn value(&self) -> Option<&Value> {
        match self {
            NodeState::Concrete(value) => Some(value),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunStatus {
    Complete(Value),
    Suspended { pending: usize },
}

type CompletionCallback = Box<dyn FnOnce(&Value) + Send>;

/// Resumable evaluator over one [`Tree`].
///
/// Each call to [`Evaluator::run`] performs passes until either the root holds a
/// value or a pass makes no progress. In the latter case the evaluator is
/// suspended and only [`Evaluator::resolve`] moves it forward again.
///
/// ```rust
/// use workflow::eval::{Evaluator, RunStatus, Value};
///
/// let mut evaluator = Evaluator::from_string("1 + 2").unwrap();
/// assert_eq!(evaluator.run().unwrap(), RunStatus::Complete(Value::Integer(3)));
/// ```
pub struct Evaluator {
    tree: Tree,
    states: Vec<NodeState>,
    registry: PendingRegistry,
    dispatcher: Arc<dyn Dispatcher>,
    callback: String,
    running: bool,
    complete: bool,
    return_value: Option<Value>,
    failure: Option<EvalError>,
    on_complete: Option<CompletionCallback>,
    passes: usize,
    progressed: bool,
}

impl fmt::Debug for Evaluator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Evaluator")
            .field("tree", &self.tree.id())
            .field("callback", &self.callback)
            .field("running", &self.running)
            .field("complete", &self.complete)
            .field("return_value", &self.return_value)
            .field("pending", &self.registry.outstanding().len())
            .field("passes", &self.passes)
            .finish()
    }
}

impl Evaluator {
    /// Rewrites parallel combinators in `tree` and prepares a fresh evaluation.
    pub fn new(mut tree: Tree) -> Result<Self, RewriteError> {
        Preprocessor::new().process(&mut tree)?;
        let states = vec![NodeState::Unresolved; tree.len()];
        Ok(Self {
            tree,
            states,
            registry: PendingRegistry::new(),
            dispatcher: Arc::new(DetachedDispatcher),
            callback: "local".to_string(),
            running: false,
            complete: false,
            return_value: None,
            failure: None,
            on_complete: None,
            passes: 0,
            progressed: false,
        })
    }

    pub fn from_string(source: &str) -> WorkflowResult<Self> {
        let tree = parser::parse(source)?;
        Ok(Self::new(tree)?)
    }

    /// Routes asynchronous calls through `dispatcher`; workers report back to
    /// `callback`.
    pub fn with_dispatcher(mut self, dispatcher: Arc<dyn Dispatcher>, callback: impl Into<String>) -> Self {
        self.dispatcher = dispatcher;
        self.callback = callback.into();
        self
    }

    /// Called once with the final value when the root resolves.
    pub fn on_complete<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(&Value) + Send + 'static,
    {
        self.on_complete = Some(Box::new(callback));
        self
    }

    /// Advances until complete or blocked on pending calls.
    pub fn run(&mut self) -> EvalResult<RunStatus> {
        if let Some(failure) = &self.failure {
            return Err(failure.clone());
        }
        self.running = !self.complete;
        while self.running && !self.complete {
            if let Err(e) = self.pass() {
                warn!("evaluation aborted: {}", e);
                self.running = false;
                self.failure = Some(e.clone());
                return Err(e);
            }
        }
        Ok(self.status())
    }

    /// Delivers the result of a pending call and resumes evaluation.
    ///
    /// Unknown and already completed tokens are ignored and leave the evaluator
    /// untouched. A result that arrives after completion is recorded but does not
    /// trigger another pass.
    #[tracing::instrument(level = "debug", skip(self, value))]
    pub fn resolve(&mut self, token: &Token, value: Value) -> EvalResult<RunStatus> {
        if let Some(failure) = &self.failure {
            return Err(failure.clone());
        }
        let Some(path) = self.registry.awaiting(token) else {
            return Ok(self.status());
        };
        let node = path.resolve(&self.tree)?;
        debug!("result for {} arrived at {}", token, path);
        self.states[node.index()] = NodeState::Concrete(value.clone());
        self.registry.complete(token, value);
        if self.complete {
            return Ok(self.status());
        }
        self.run()
    }

    pub fn status(&self) -> RunStatus {
        if self.complete {
            RunStatus::Complete(self.return_value.clone().unwrap_or_default())
        } else {
            RunStatus::Suspended {
                pending: self.registry.outstanding().len(),
            }
        }
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn return_value(&self) -> Option<&Value> {
        self.return_value.as_ref()
    }

    pub fn state(&self, id: NodeId) -> Option<&NodeState> {
        self.states.get(id.index())
    }

    pub fn registry(&self) -> &PendingRegistry {
        &self.registry
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    /// Number of passes performed so far.
    pub fn passes(&self) -> usize {
        self.passes
    }

    fn pass(&mut self) -> EvalResult<()> {
        self.passes += 1;
        self.progressed = false;
        let root = self.tree.root();
        self.visit(root, &NodePath::root())?;
        debug!(
            "pass {} finished (progress: {}, pending: {})",
            self.passes,
            self.progressed,
            self.registry.outstanding().len()
        );
        if !self.complete && !self.progressed {
            self.running = false;
            info!(
                "suspended after {} pass(es) with {} pending call(s)",
                self.passes,
                self.registry.outstanding().len()
            );
        }
        Ok(())
    }

    fn is_concrete(&self, id: NodeId) -> bool {
        matches!(self.states[id.index()], NodeState::Concrete(_))
    }

    fn visit(&mut self, id: NodeId, path: &NodePath) -> EvalResult<()> {
        if !matches!(self.states[id.index()], NodeState::Unresolved) {
            return Ok(());
        }

        let children = self.tree.children(id);
        let ready = match self.tree.node(id).composition() {
            Composition::Sequential => {
                let mut ready = true;
                for child in children {
                    self.visit_child(path, child)?;
                    if !self.is_concrete(child) {
                        ready = false;
                        break;
                    }
                }
                ready
            }
            Composition::All => {
                for &child in &children {
                    self.visit_child(path, child)?;
                }
                children.iter().all(|&child| self.is_concrete(child))
            }
            Composition::Any => {
                if children.is_empty() {
                    return Err(EvalError::EmptyAny);
                }
                for &child in &children {
                    self.visit_child(path, child)?;
                }
                children.iter().any(|&child| self.is_concrete(child))
            }
        };
        if !ready {
            return Ok(());
        }

        match self.evaluate(id, path)? {
            CallOutcome::Ready(value) => {
                self.progressed = true;
                if id == self.tree.root() {
                    self.finish(value.clone());
                }
                self.states[id.index()] = NodeState::Concrete(value);
            }
            CallOutcome::Pending(token) => {
                debug!("{} parked on {}", path, token);
                self.states[id.index()] = NodeState::Parked(token);
            }
        }
        Ok(())
    }

    fn visit_child(&mut self, parent: &NodePath, child: NodeId) -> EvalResult<()> {
        let path = parent.append(&self.tree, child)?;
        self.visit(child, &path)
    }

    fn value_of(&self, id: NodeId) -> EvalResult<&Value> {
        self.states[id.index()]
            .value()
            .ok_or(EvalError::Unresolved(id))
    }

    /// Kind-specific rule, run once the children satisfy the node's composition.
    fn evaluate(&mut self, id: NodeId, path: &NodePath) -> EvalResult<CallOutcome> {
        let value = match self.tree.node(id) {
            Node::Literal(literal) => Value::from(literal),
            Node::Operator(op) => Value::Operator(*op),
            Node::Name(name) => Value::Builtin(Builtin::lookup(name)?),
            Node::Expr { value } | Node::Keyword { value, .. } => self.value_of(*value)?.clone(),
            Node::BinaryOp { left, op, right } => {
                let operator = match self.value_of(*op)? {
                    Value::Operator(operator) => *operator,
                    other => return Err(EvalError::NotCallable(other.to_string())),
                };
                operators::apply(operator, self.value_of(*left)?, self.value_of(*right)?)?
            }
            Node::Call(call) => {
                let call = call.clone();
                return self.evaluate_call(id, path, &call);
            }
            Node::All { args } => Value::List(
                args.iter()
                    .map(|&arg| self.value_of(arg).cloned())
                    .collect::<EvalResult<_>>()?,
            ),
            Node::Any { args } => args
                .iter()
                .find_map(|&arg| self.states[arg.index()].value())
                .cloned()
                .ok_or(EvalError::Unresolved(id))?,
            Node::Module { body } => match body.last() {
                Some(&last) => self.value_of(last)?.clone(),
                None => Value::Null,
            },
        };
        Ok(CallOutcome::Ready(value))
    }

    fn evaluate_call(&mut self, id: NodeId, path: &NodePath, call: &Call) -> EvalResult<CallOutcome> {
        let builtin = match self.value_of(call.func)? {
            Value::Builtin(builtin) => *builtin,
            other => return Err(EvalError::NotCallable(other.to_string())),
        };

        let mut positional = call
            .args
            .iter()
            .map(|&arg| self.value_of(arg).cloned())
            .collect::<EvalResult<Vec<_>>>()?;
        if let Some(starargs) = call.starargs {
            match self.value_of(starargs)? {
                Value::List(items) => positional.extend(items.iter().cloned()),
                other => {
                    return Err(EvalError::InvalidSpread {
                        spread: "*",
                        expected: "list",
                        found: other.type_name().to_string(),
                    })
                }
            }
        }

        let mut keywords = HashMap::with_capacity(call.keywords.len());
        for &keyword in &call.keywords {
            if let Node::Keyword { name, .. } = self.tree.node(keyword) {
                keywords.insert(name.clone(), self.value_of(keyword)?.clone());
            }
        }
        if let Some(kwargs) = call.kwargs {
            let Value::Map(entries) = self.value_of(kwargs)? else {
                return Err(EvalError::InvalidSpread {
                    spread: "**",
                    expected: "map",
                    found: self.value_of(kwargs)?.type_name().to_string(),
                });
            };
            let mut names: Vec<_> = entries.keys().collect();
            names.sort();
            for name in names {
                if keywords.contains_key(name) {
                    return Err(EvalError::ArgumentConflict {
                        function: builtin.to_string(),
                        keyword: name.clone(),
                    });
                }
                keywords.insert(name.clone(), entries[name].clone());
            }
        }

        let mut context = CallContext {
            node: id,
            path,
            registry: &mut self.registry,
            dispatcher: self.dispatcher.as_ref(),
            callback: &self.callback,
        };
        builtin.invoke(CallArgs { positional, keywords }, &mut context)
    }

    fn finish(&mut self, value: Value) {
        info!("evaluation complete after {} pass(es): {}", self.passes, value);
        self.complete = true;
        self.running = false;
        if let Some(callback) = self.on_complete.take() {
            callback(&value);
        }
        self.return_value = Some(value);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::dispatch::{ChannelDispatcher, DispatchRequest, MockDispatcher};

    fn channel_evaluator(source: &str) -> (Evaluator, tokio::sync::mpsc::UnboundedReceiver<DispatchRequest>) {
        let (dispatcher, receiver) = ChannelDispatcher::new();
        let evaluator = Evaluator::from_string(source)
            .unwrap()
            .with_dispatcher(Arc::new(dispatcher), "test");
        (evaluator, receiver)
    }

    #[test]
    fn test_literal_completes_immediately() {
        let mut evaluator = Evaluator::from_string("42").unwrap();
        assert_eq!(evaluator.run().unwrap(), RunStatus::Complete(Value::Integer(42)));
        assert!(evaluator.registry().is_empty());
        assert!(!evaluator.is_running());
    }

    #[test]
    fn test_binary_completes_in_one_pass() {
        let mut evaluator = Evaluator::from_string("1 + 2").unwrap();
        assert_eq!(evaluator.run().unwrap(), RunStatus::Complete(Value::Integer(3)));
        assert_eq!(evaluator.passes(), 1);
    }

    #[test]
    fn test_last_statement_is_result() {
        let mut evaluator = Evaluator::from_string("1; \"two\"").unwrap();
        assert_eq!(
            evaluator.run().unwrap(),
            RunStatus::Complete(Value::String("two".to_string()))
        );
    }

    #[test]
    fn test_empty_module_is_null() {
        let mut evaluator = Evaluator::from_string("").unwrap();
        assert_eq!(evaluator.run().unwrap(), RunStatus::Complete(Value::Null));
    }

    #[test]
    fn test_unknown_name_aborts() {
        let mut evaluator = Evaluator::from_string("launch(1)").unwrap();
        assert_eq!(
            evaluator.run(),
            Err(EvalError::Name("launch".to_string()))
        );
        assert!(evaluator.run().is_err());
    }

    #[test]
    fn test_parks_on_dispatch() {
        let (mut evaluator, mut receiver) = channel_evaluator("add(1, 2)");
        assert_eq!(evaluator.run().unwrap(), RunStatus::Suspended { pending: 1 });

        let request = receiver.try_recv().unwrap();
        assert_eq!(request.operation, Builtin::Add);
        assert_eq!(request.callback, "test");

        let call: NodePath = "/0/".parse().unwrap();
        let call = call.resolve(evaluator.tree()).unwrap();
        assert_eq!(evaluator.state(call), Some(&NodeState::Parked(request.token)));
    }

    #[test]
    fn test_mock_dispatcher_receives_bound_arguments() {
        let mut dispatcher = MockDispatcher::new();
        dispatcher
            .expect_dispatch()
            .withf(|request| request.arguments == vec![Value::Integer(2), Value::Integer(5)])
            .times(1)
            .returning(|_| Ok(()));

        let mut evaluator = Evaluator::from_string("mul(y=5, x=2)")
            .unwrap()
            .with_dispatcher(Arc::new(dispatcher), "test");
        assert_eq!(evaluator.run().unwrap(), RunStatus::Suspended { pending: 1 });
    }

    #[test]
    fn test_detached_dispatch_fails() {
        let mut evaluator = Evaluator::from_string("echo(1)").unwrap();
        assert!(matches!(evaluator.run(), Err(EvalError::Dispatch(_))));
    }

    #[test]
    fn test_completion_callback_fires_once() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let (dispatcher, mut receiver) = ChannelDispatcher::new();
        let mut evaluator = Evaluator::from_string("echo(7)")
            .unwrap()
            .with_dispatcher(Arc::new(dispatcher), "test")
            .on_complete(move |value| sink.lock().unwrap().push(value.clone()));

        evaluator.run().unwrap();
        assert!(seen.lock().unwrap().is_empty());

        let token = receiver.try_recv().unwrap().token;
        evaluator.resolve(&token, Value::Integer(7)).unwrap();
        evaluator.resolve(&token, Value::Integer(8)).unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![Value::Integer(7)]);
        assert_eq!(evaluator.return_value(), Some(&Value::Integer(7)));
    }

    #[test]
    fn test_starargs_and_kwargs() {
        let mut evaluator = Evaluator::from_string("list(1, *list(2, 3))").unwrap();
        assert_eq!(
            evaluator.run().unwrap(),
            RunStatus::Complete(Value::List(vec![
                Value::Integer(1),
                Value::Integer(2),
                Value::Integer(3)
            ]))
        );

        let mut evaluator = Evaluator::from_string("dict(a=1, **dict(b=2))").unwrap();
        let RunStatus::Complete(Value::Map(entries)) = evaluator.run().unwrap() else {
            panic!("expected a map");
        };
        assert_eq!(entries.len(), 2);
        assert_eq!(entries["b"], Value::Integer(2));
    }

    #[test]
    fn test_keyword_conflict() {
        let mut evaluator = Evaluator::from_string("dict(x=1, **dict(x=2))").unwrap();
        assert_eq!(
            evaluator.run(),
            Err(EvalError::ArgumentConflict {
                function: "dict".to_string(),
                keyword: "x".to_string()
            })
        );
    }

    #[test]
    fn test_invalid_spread() {
        let mut evaluator = Evaluator::from_string("list(*1)").unwrap();
        assert!(matches!(
            evaluator.run(),
            Err(EvalError::InvalidSpread { spread: "*", .. })
        ));
    }

    #[test]
    fn test_empty_any_and_all() {
        let mut evaluator = Evaluator::from_string("any()").unwrap();
        assert_eq!(evaluator.run(), Err(EvalError::EmptyAny));

        let mut evaluator = Evaluator::from_string("all()").unwrap();
        assert_eq!(evaluator.run().unwrap(), RunStatus::Complete(Value::List(vec![])));
    }
}
