//! # Built-in Namespace
//!
//! The closed set of operations a `Name` node can resolve to. Asynchronous
//! built-ins do not compute anything locally: they register a pending call and
//! dispatch the work, returning the token as their result for this pass.

use std::collections::HashMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

use crate::{
    ast::NodeId,
    dispatch::{DispatchRequest, Dispatcher},
    path::NodePath,
};

use super::{registry::PendingRegistry, EvalError, EvalResult, Token, Value};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display, AsRefStr, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Builtin {
    /// `add(x, y)`, computed by a worker.
    Add,
    /// `mul(x, y)`, computed by a worker.
    Mul,
    /// `echo(value)`, a worker round trip returning its argument.
    Echo,
    /// `list(*items)`
    List,
    /// `dict(**entries)`
    Dict,
}

impl Builtin {
    pub fn lookup(name: &str) -> EvalResult<Self> {
        Builtin::from_str(name).map_err(|_| EvalError::Name(name.to_string()))
    }

    pub fn is_async(self) -> bool {
        matches!(self, Builtin::Add | Builtin::Mul | Builtin::Echo)
    }

    fn parameters(self) -> &'static [&'static str] {
        match self {
            Builtin::Add | Builtin::Mul => &["x", "y"],
            Builtin::Echo => &["value"],
            Builtin::List | Builtin::Dict => &[],
        }
    }

    pub fn invoke(self, args: CallArgs, context: &mut CallContext<'_>) -> EvalResult<CallOutcome> {
        match self {
            Builtin::Add | Builtin::Mul | Builtin::Echo => {
                let arguments = args.bind(self.as_ref(), self.parameters())?;
                context.defer(self, arguments).map(CallOutcome::Pending)
            }
            Builtin::List => {
                if let Some(argument) = args.keywords.keys().min() {
                    return Err(EvalError::UnexpectedArgument {
                        function: self.to_string(),
                        argument: argument.clone(),
                    });
                }
                Ok(CallOutcome::Ready(Value::List(args.positional)))
            }
            Builtin::Dict => {
                if !args.positional.is_empty() {
                    return Err(EvalError::TooManyArguments {
                        function: self.to_string(),
                        expected: 0,
                        given: args.positional.len(),
                    });
                }
                Ok(CallOutcome::Ready(Value::Map(args.keywords)))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CallOutcome {
    Ready(Value),
    Pending(Token),
}

/// Fully resolved arguments of one call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallArgs {
    pub positional: Vec<Value>,
    pub keywords: HashMap<String, Value>,
}

impl CallArgs {
    /// Binds the arguments to named parameters, positionals first.
    pub fn bind(mut self, function: &str, parameters: &[&str]) -> EvalResult<Vec<Value>> {
        if self.positional.len() > parameters.len() {
            return Err(EvalError::TooManyArguments {
                function: function.to_string(),
                expected: parameters.len(),
                given: self.positional.len(),
            });
        }
        let mut bound = Vec::with_capacity(parameters.len());
        let mut positional = std::mem::take(&mut self.positional).into_iter();
        for parameter in parameters {
            match positional.next() {
                Some(value) => {
                    if self.keywords.contains_key(*parameter) {
                        return Err(EvalError::ArgumentConflict {
                            function: function.to_string(),
                            keyword: parameter.to_string(),
                        });
                    }
                    bound.push(value);
                }
                None => match self.keywords.remove(*parameter) {
                    Some(value) => bound.push(value),
                    None => {
                        return Err(EvalError::MissingArgument {
                            function: function.to_string(),
                            argument: parameter.to_string(),
                        })
                    }
                },
            }
        }
        if let Some(argument) = self.keywords.keys().min() {
            return Err(EvalError::UnexpectedArgument {
                function: function.to_string(),
                argument: argument.clone(),
            });
        }
        Ok(bound)
    }
}

/// Contextual parameters handed to every built-in invocation.
pub struct CallContext<'a> {
    pub node: NodeId,
    pub path: &'a NodePath,
    pub(crate) registry: &'a mut PendingRegistry,
    pub(crate) dispatcher: &'a dyn Dispatcher,
    pub(crate) callback: &'a str,
}

impl CallContext<'_> {
    /// Registers a pending call for the current node and dispatches it.
    pub fn defer(&mut self, operation: Builtin, arguments: Vec<Value>) -> EvalResult<Token> {
        let token = self.registry.register(self.node, self.path.clone());
        let request = DispatchRequest {
            callback: self.callback.to_string(),
            token,
            operation,
            arguments,
        };
        if let Err(e) = self.dispatcher.dispatch(request) {
            self.registry.discard(&token);
            return Err(e.into());
        }
        Ok(token)
    }
}
