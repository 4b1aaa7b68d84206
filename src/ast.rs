//! # Node Model
//!
//! Expression trees are stored in a flat arena owned by [`Tree`]. Every node is
//! addressed by a [`NodeId`], an index into that arena, so identity comparisons
//! (which child slot does this node occupy?) are plain integer comparisons.
//!
//! The tree is append-only: nodes are never removed during an evaluation. The
//! parallel rewrite in [`crate::preprocessor`] replaces a node *in place*, keeping
//! its id and the ids of its arguments.

use core::fmt;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use uuid::Uuid;

/// Stable identity of a node inside one [`Tree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identity of one tree instance. Clones and rewritten trees get a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TreeId(Uuid);

impl TreeId {
    fn fresh() -> Self {
        TreeId(Uuid::new_v4())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Integer(i64),
    Float(f64),
    String(String),
    Boolean(bool),
    Null,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display, AsRefStr, Serialize, Deserialize,
)]
pub enum BinaryOperator {
    #[strum(serialize = "+")]
    Add,
    #[strum(serialize = "-")]
    Subtract,
    #[strum(serialize = "*")]
    Multiply,
    #[strum(serialize = "/")]
    Divide,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub func: NodeId,
    pub args: Vec<NodeId>,
    pub keywords: Vec<NodeId>,
    pub starargs: Option<NodeId>,
    pub kwargs: Option<NodeId>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Root wrapper. Its value is the value of its last statement.
    Module { body: Vec<NodeId> },
    /// A top-level statement.
    Expr { value: NodeId },
    Literal(Literal),
    BinaryOp {
        left: NodeId,
        op: NodeId,
        right: NodeId,
    },
    Operator(BinaryOperator),
    Call(Call),
    /// `name=value` inside a call.
    Keyword { name: String, value: NodeId },
    Name(String),
    Any { args: Vec<NodeId> },
    All { args: Vec<NodeId> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum NodeKind {
    Module,
    Expr,
    Literal,
    BinaryOp,
    Operator,
    Call,
    Keyword,
    Name,
    Any,
    All,
}

/// How a node waits on its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Composition {
    /// Children resolve strictly left to right; every child is required.
    Sequential,
    /// Every child is required, all of them are driven at once.
    All,
    /// The first resolved child is enough.
    Any,
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Module { .. } => NodeKind::Module,
            Node::Expr { .. } => NodeKind::Expr,
            Node::Literal(_) => NodeKind::Literal,
            Node::BinaryOp { .. } => NodeKind::BinaryOp,
            Node::Operator(_) => NodeKind::Operator,
            Node::Call(_) => NodeKind::Call,
            Node::Keyword { .. } => NodeKind::Keyword,
            Node::Name(_) => NodeKind::Name,
            Node::Any { .. } => NodeKind::Any,
            Node::All { .. } => NodeKind::All,
        }
    }

    pub fn composition(&self) -> Composition {
        match self {
            Node::Any { .. } => Composition::Any,
            Node::All { .. } => Composition::All,
            _ => Composition::Sequential,
        }
    }

    /// Structural children in declared order.
    pub fn children(&self) -> Vec<NodeId> {
        match self {
            Node::Module { body } => body.clone(),
            Node::Expr { value } | Node::Keyword { value, .. } => vec![*value],
            Node::BinaryOp { left, op, right } => vec![*left, *op, *right],
            Node::Call(call) => {
                let mut children = Vec::with_capacity(1 + call.args.len() + call.keywords.len() + 2);
                children.push(call.func);
                children.extend(call.args.iter().copied());
                children.extend(call.keywords.iter().copied());
                children.extend(call.starargs);
                children.extend(call.kwargs);
                children
            }
            Node::Any { args } | Node::All { args } => args.clone(),
            Node::Literal(_) | Node::Operator(_) | Node::Name(_) => Vec::new(),
        }
    }
}

#[derive(Debug)]
pub struct Tree {
    id: TreeId,
    nodes: Vec<Node>,
    root: NodeId,
}

impl Clone for Tree {
    fn clone(&self) -> Self {
        Self {
            id: TreeId::fresh(),
            nodes: self.nodes.clone(),
            root: self.root,
        }
    }
}

impl Tree {
    pub fn builder() -> TreeBuilder {
        TreeBuilder::default()
    }

    pub fn id(&self) -> TreeId {
        self.id
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    /// Panics if `id` was not handed out by this tree.
    pub(crate) fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.get(id).map(Node::children).unwrap_or_default()
    }

    /// Every node reachable from the root, parents before children.
    pub fn reachable(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            order.push(id);
            let mut children = self.children(id);
            children.reverse();
            stack.extend(children);
        }
        order
    }

    /// Number of nodes on the longest path from the root down to a leaf.
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut stack = vec![(self.root, 1)];
        while let Some((id, depth)) = stack.pop() {
            deepest = deepest.max(depth);
            stack.extend(self.children(id).into_iter().map(|child| (child, depth + 1)));
        }
        deepest
    }

    /// Swaps in `node` under the same id. The tree takes a new [`TreeId`], so
    /// paths resolved before the swap walk again.
    pub(crate) fn replace(&mut self, id: NodeId, node: Node) {
        self.nodes[id.0] = node;
        self.id = TreeId::fresh();
    }
}

/// Programmatic construction of a [`Tree`].
///
/// ```rust
/// use workflow::ast::{BinaryOperator, Literal, Tree};
///
/// let mut builder = Tree::builder();
/// let left = builder.literal(Literal::Integer(1));
/// let right = builder.literal(Literal::Integer(2));
/// let sum = builder.binary(left, BinaryOperator::Add, right);
/// let statement = builder.expr(sum);
/// let tree = builder.finish(vec![statement]);
/// assert_eq!(tree.children(tree.root()), vec![statement]);
/// ```
#[derive(Debug, Default)]
pub struct TreeBuilder {
    nodes: Vec<Node>,
}

impl TreeBuilder {
    pub fn push(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    pub fn literal(&mut self, literal: Literal) -> NodeId {
        self.push(Node::Literal(literal))
    }

    pub fn name(&mut self, name: impl Into<String>) -> NodeId {
        self.push(Node::Name(name.into()))
    }

    pub fn binary(&mut self, left: NodeId, op: BinaryOperator, right: NodeId) -> NodeId {
        let op = self.push(Node::Operator(op));
        self.push(Node::BinaryOp { left, op, right })
    }

    pub fn keyword(&mut self, name: impl Into<String>, value: NodeId) -> NodeId {
        self.push(Node::Keyword {
            name: name.into(),
            value,
        })
    }

    pub fn call(&mut self, call: Call) -> NodeId {
        self.push(Node::Call(call))
    }

    /// Shorthand for a call to a named built-in with positional arguments.
    pub fn call_named(&mut self, function: &str, args: Vec<NodeId>) -> NodeId {
        let func = self.name(function);
        self.call(Call {
            func,
            args,
            keywords: Vec::new(),
            starargs: None,
            kwargs: None,
        })
    }

    pub fn expr(&mut self, value: NodeId) -> NodeId {
        self.push(Node::Expr { value })
    }

    pub fn finish(mut self, body: Vec<NodeId>) -> Tree {
        let root = self.push(Node::Module { body });
        Tree {
            id: TreeId::fresh(),
            nodes: self.nodes,
            root,
        }
    }
}
