//! # Path Addressing
//!
//! A [`NodePath`] names the location of a node by the structural steps taken from
//! the root of a [`Tree`]. Paths never depend on evaluation state, so a path
//! recorded when an asynchronous call was issued still locates the same node when
//! the result arrives.
//!
//! ## Canonical form
//!
//! `/` followed by the `/`-joined step tokens; the empty path renders as `/`.
//!
//! | token        | meaning                                   | used by            |
//! |--------------|-------------------------------------------|--------------------|
//! | `3`          | index into a module body                  | `Module`           |
//! | (empty)      | the single wrapped value                  | `Expr`, `Keyword`  |
//! | `left` ...   | a fixed field                             | `BinaryOp`, `Call` |
//! | `args:0` ... | an indexed slot of a variadic list        | `Call`, `Any`, `All` |
//!
//! Equality and hashing go through the rendered string only, so two paths built
//! against different trees of the same shape compare equal.

use core::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::OnceLock;

use strum_macros::{AsRefStr, Display, EnumString};
use thiserror::Error;

use crate::ast::{Node, NodeId, NodeKind, Tree, TreeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum Field {
    Left,
    Op,
    Right,
    Func,
    Starargs,
    Kwargs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum SlotKind {
    Args,
    Keywords,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    Index(usize),
    Value,
    Field(Field),
    Slot(SlotKind, usize),
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Step::Index(index) => write!(f, "{}", index),
            Step::Value => Ok(()),
            Step::Field(field) => write!(f, "{}", field),
            Step::Slot(kind, index) => write!(f, "{}:{}", kind, index),
        }
    }
}

/// Digits as rendered by `Display`: no sign and no leading zeros.
fn canonical_index(digits: &str) -> Option<usize> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if digits.len() > 1 && digits.starts_with('0') {
        return None;
    }
    digits.parse().ok()
}

impl FromStr for Step {
    type Err = PathError;

    fn from_str(token: &str) -> PathResult<Self> {
        if token.is_empty() {
            return Ok(Step::Value);
        }
        if token.bytes().all(|b| b.is_ascii_digit()) {
            return canonical_index(token)
                .map(Step::Index)
                .ok_or_else(|| PathError::invalid_step(token));
        }
        if let Some((kind, index)) = token.split_once(':') {
            let kind = SlotKind::from_str(kind).map_err(|_| PathError::invalid_step(token))?;
            let index = canonical_index(index).ok_or_else(|| PathError::invalid_step(token))?;
            return Ok(Step::Slot(kind, index));
        }
        Field::from_str(token)
            .map(Step::Field)
            .map_err(|_| PathError::invalid_step(token))
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PathError {
    #[error("Malformed path '{0}': a path starts with '/'")]
    Malformed(String),
    #[error("Invalid path step '{step}'")]
    InvalidStep { step: String },
    #[error("Step '{step}' does not apply to a {kind} node")]
    NotApplicable { step: String, kind: NodeKind },
    #[error("Step '{step}' is out of range ({len} entries)")]
    OutOfRange { step: String, len: usize },
    #[error("{child} is not a structural child of {kind} node {parent}")]
    NotAChild {
        parent: NodeId,
        kind: NodeKind,
        child: NodeId,
    },
    #[error("Node {0} does not belong to this tree")]
    UnknownNode(NodeId),
}

impl PathError {
    fn invalid_step(token: &str) -> Self {
        PathError::InvalidStep {
            step: token.to_string(),
        }
    }

    fn not_applicable(step: Step, kind: NodeKind) -> Self {
        PathError::NotApplicable {
            step: step.to_string(),
            kind,
        }
    }
}

pub type PathResult<T> = Result<T, PathError>;

#[derive(Debug, Clone, Default)]
pub struct NodePath {
    steps: Vec<Step>,
    resolved: OnceLock<(TreeId, NodeId)>,
}

impl NodePath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn from_steps(steps: Vec<Step>) -> Self {
        Self {
            steps,
            resolved: OnceLock::new(),
        }
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn is_root(&self) -> bool {
        self.steps.is_empty()
    }

    /// Walks the steps from the root of `tree`. The result is cached per tree, so
    /// repeated calls with the same tree do not walk again.
    pub fn resolve(&self, tree: &Tree) -> PathResult<NodeId> {
        if let Some((tree_id, node)) = self.resolved.get() {
            if *tree_id == tree.id() {
                return Ok(*node);
            }
        }
        let node = self
            .steps
            .iter()
            .try_fold(tree.root(), |node, step| step_into(tree, node, *step))?;
        let _ = self.resolved.set((tree.id(), node));
        Ok(node)
    }

    /// Extends this path by the step that leads from the node it resolves to down to
    /// `child`. Fails when `child` is not one of that node's structural children.
    pub fn append(&self, tree: &Tree, child: NodeId) -> PathResult<NodePath> {
        let parent = self.resolve(tree)?;
        let step = step_towards(tree, parent, child)?;
        let mut steps = Vec::with_capacity(self.steps.len() + 1);
        steps.extend_from_slice(&self.steps);
        steps.push(step);
        Ok(NodePath {
            steps,
            resolved: OnceLock::from((tree.id(), child)),
        })
    }
}

impl FromStr for NodePath {
    type Err = PathError;

    fn from_str(rendered: &str) -> PathResult<Self> {
        let Some(rest) = rendered.strip_prefix('/') else {
            return Err(PathError::Malformed(rendered.to_string()));
        };
        if rest.is_empty() {
            return Ok(NodePath::root());
        }
        let steps = rest
            .split('/')
            .map(Step::from_str)
            .collect::<PathResult<Vec<_>>>()?;
        Ok(NodePath::from_steps(steps))
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "/")?;
        for (i, step) in self.steps.iter().enumerate() {
            if i > 0 {
                write!(f, "/")?;
            }
            write!(f, "{}", step)?;
        }
        Ok(())
    }
}

impl PartialEq for NodePath {
    fn eq(&self, other: &Self) -> bool {
        self.to_string() == other.to_string()
    }
}

impl Eq for NodePath {}

impl Hash for NodePath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.to_string().hash(state);
    }
}

fn indexed(list: &[NodeId], index: usize, step: Step) -> PathResult<NodeId> {
    list.get(index).copied().ok_or(PathError::OutOfRange {
        step: step.to_string(),
        len: list.len(),
    })
}

/// Interprets one step against the kind of `node`.
fn step_into(tree: &Tree, node: NodeId, step: Step) -> PathResult<NodeId> {
    let current = tree.get(node).ok_or(PathError::UnknownNode(node))?;
    match (current, step) {
        (Node::Module { body }, Step::Index(index)) => indexed(body, index, step),
        (Node::Expr { value }, Step::Value) | (Node::Keyword { value, .. }, Step::Value) => {
            Ok(*value)
        }
        (Node::BinaryOp { left, op, right }, Step::Field(field)) => match field {
            Field::Left => Ok(*left),
            Field::Op => Ok(*op),
            Field::Right => Ok(*right),
            _ => Err(PathError::not_applicable(step, current.kind())),
        },
        (Node::Call(call), Step::Field(field)) => match field {
            Field::Func => Ok(call.func),
            Field::Starargs => call
                .starargs
                .ok_or_else(|| PathError::not_applicable(step, current.kind())),
            Field::Kwargs => call
                .kwargs
                .ok_or_else(|| PathError::not_applicable(step, current.kind())),
            _ => Err(PathError::not_applicable(step, current.kind())),
        },
        (Node::Call(call), Step::Slot(SlotKind::Args, index)) => indexed(&call.args, index, step),
        (Node::Call(call), Step::Slot(SlotKind::Keywords, index)) => {
            indexed(&call.keywords, index, step)
        }
        (Node::Any { args }, Step::Slot(SlotKind::Args, index))
        | (Node::All { args }, Step::Slot(SlotKind::Args, index)) => indexed(args, index, step),
        _ => Err(PathError::not_applicable(step, current.kind())),
    }
}

/// Finds which structural slot of `parent` holds `child`, by identity.
fn step_towards(tree: &Tree, parent: NodeId, child: NodeId) -> PathResult<Step> {
    let current = tree.get(parent).ok_or(PathError::UnknownNode(parent))?;
    let position = |list: &[NodeId]| list.iter().position(|id| *id == child);
    let step = match current {
        Node::Module { body } => position(body).map(Step::Index),
        Node::Expr { value } | Node::Keyword { value, .. } => {
            (*value == child).then_some(Step::Value)
        }
        Node::BinaryOp { left, op, right } => {
            if child == *left {
                Some(Step::Field(Field::Left))
            } else if child == *op {
                Some(Step::Field(Field::Op))
            } else if child == *right {
                Some(Step::Field(Field::Right))
            } else {
                None
            }
        }
        Node::Call(call) => {
            if child == call.func {
                Some(Step::Field(Field::Func))
            } else if call.starargs == Some(child) {
                Some(Step::Field(Field::Starargs))
            } else if call.kwargs == Some(child) {
                Some(Step::Field(Field::Kwargs))
            } else if let Some(index) = position(&call.args) {
                Some(Step::Slot(SlotKind::Args, index))
            } else {
                position(&call.keywords).map(|index| Step::Slot(SlotKind::Keywords, index))
            }
        }
        Node::Any { args } | Node::All { args } => {
            position(args).map(|index| Step::Slot(SlotKind::Args, index))
        }
        Node::Literal(_) | Node::Operator(_) | Node::Name(_) => None,
    };
    step.ok_or(PathError::NotAChild {
        parent,
        kind: current.kind(),
        child,
    })
}
