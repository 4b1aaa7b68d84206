use thiserror::Error;
use tracing::debug;

use crate::ast::{Node, NodeId, Tree};

const ANY: &str = "any";
const ALL: &str = "all";

/// Deepest tree the evaluator accepts. Evaluation recurses once per level.
pub const MAX_TREE_DEPTH: usize = 320;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RewriteError {
    #[error("{function}() takes positional arguments only")]
    UnsupportedArguments { function: String, node: NodeId },
    #[error("Tree is {depth} levels deep; at most {limit} are supported")]
    TooDeep { depth: usize, limit: usize },
}

/// Structural passes applied to a tree before it is evaluated.
#[derive(Debug, Default)]
pub struct Preprocessor;

impl Preprocessor {
    pub fn new() -> Self {
        Self
    }

    pub fn process(&self, tree: &mut Tree) -> Result<(), RewriteError> {
        let depth = tree.depth();
        if depth > MAX_TREE_DEPTH {
            return Err(RewriteError::TooDeep {
                depth,
                limit: MAX_TREE_DEPTH,
            });
        }
        let rewritten = self.rewrite_parallel(tree)?;
        debug!("rewrote {} parallel combinator(s)", rewritten);
        Ok(())
    }

    /// Replaces every reachable call to `any(...)`/`all(...)` with a dedicated
    /// parallel node. The replacement keeps the call's [`NodeId`] and its argument
    /// ids in order, so paths through the arguments stay valid.
    pub fn rewrite_parallel(&self, tree: &mut Tree) -> Result<usize, RewriteError> {
        let mut rewritten = 0;
        for id in tree.reachable() {
            let Node::Call(call) = tree.node(id) else {
                continue;
            };
            let function = match tree.node(call.func) {
                Node::Name(name) if name == ANY || name == ALL => name.clone(),
                _ => continue,
            };
            if !call.keywords.is_empty() || call.starargs.is_some() || call.kwargs.is_some() {
                return Err(RewriteError::UnsupportedArguments { function, node: id });
            }
            let args = call.args.clone();
            let parallel = if function == ANY {
                Node::Any { args }
            } else {
                Node::All { args }
            };
            tree.replace(id, parallel);
            rewritten += 1;
        }
        Ok(rewritten)
    }
}
