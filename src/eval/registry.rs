//! # Pending Registry
//!
//! Maps each in-flight asynchronous call to the location of the node waiting on
//! it. A token is registered once and completes at most once; any later delivery
//! for the same token, or a delivery for a token this registry never issued, is
//! ignored.

use core::fmt;
use std::collections::HashMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{ast::NodeId, path::NodePath};

use super::Value;

/// Opaque identifier of one pending call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Token(Uuid);

impl Token {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for Token {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl FromStr for Token {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Token)
    }
}

#[derive(Debug, Clone)]
pub struct PendingEntry {
    pub node: NodeId,
    pub path: NodePath,
    pub completed: bool,
    pub value: Option<Value>,
}

#[derive(Debug, Default)]
pub struct PendingRegistry {
    entries: HashMap<Token, PendingEntry>,
}

impl PendingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mints a fresh token for the call at `node`/`path`. The caller parks the node
    /// on the returned token and dispatches the external request.
    pub fn register(&mut self, node: NodeId, path: NodePath) -> Token {
        let token = Token::new();
        debug!("registered pending call {} at {}", token, path);
        self.entries.insert(
            token,
            PendingEntry {
                node,
                path,
                completed: false,
                value: None,
            },
        );
        token
    }

    /// Path of a call that is still waiting on `token`, or `None` when the token is
    /// unknown or already completed.
    pub fn awaiting(&self, token: &Token) -> Option<&NodePath> {
        match self.entries.get(token) {
            None => {
                warn!("ignoring result for unknown token {}", token);
                None
            }
            Some(entry) if entry.completed => {
                debug!("ignoring duplicate result for token {}", token);
                None
            }
            Some(entry) => Some(&entry.path),
        }
    }

    /// Marks `token` completed with `value`. Returns `false` without touching the
    /// entry if it is unknown or already completed.
    pub fn complete(&mut self, token: &Token, value: Value) -> bool {
        match self.entries.get_mut(token) {
            Some(entry) if !entry.completed => {
                entry.completed = true;
                entry.value = Some(value);
                true
            }
            _ => false,
        }
    }

    /// Drops an entry whose request never left the evaluator.
    pub(crate) fn discard(&mut self, token: &Token) {
        self.entries.remove(token);
    }

    pub fn get(&self, token: &Token) -> Option<&PendingEntry> {
        self.entries.get(token)
    }

    /// Tokens whose results have not arrived yet.
    pub fn outstanding(&self) -> Vec<Token> {
        self.entries
            .iter()
            .filter(|(_, entry)| !entry.completed)
            .map(|(token, _)| *token)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with_entry() -> (PendingRegistry, Token) {
        let mut registry = PendingRegistry::new();
        let path: NodePath = "/0//args:1".parse().unwrap();
        let node = crate::parser::parse("1").unwrap().root();
        let token = registry.register(node, path);
        (registry, token)
    }

    #[test]
    fn test_register_is_outstanding() {
        let (registry, token) = registry_with_entry();
        assert_eq!(registry.outstanding(), vec![token]);
        assert_eq!(
            registry.awaiting(&token).map(ToString::to_string),
            Some("/0//args:1".to_string())
        );
    }

    #[test]
    fn test_complete_once() {
        let (mut registry, token) = registry_with_entry();
        assert!(registry.complete(&token, Value::Integer(4)));
        assert!(!registry.complete(&token, Value::Integer(5)));

        let entry = registry.get(&token).unwrap();
        assert!(entry.completed);
        assert_eq!(entry.value, Some(Value::Integer(4)));
        assert!(registry.awaiting(&token).is_none());
        assert!(registry.outstanding().is_empty());
    }

    #[test]
    fn test_unknown_token_ignored() {
        let (mut registry, _) = registry_with_entry();
        let stranger = Token::new();
        assert!(registry.awaiting(&stranger).is_none());
        assert!(!registry.complete(&stranger, Value::Null));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_tokens_are_unique_and_parse_back() {
        let a = Token::new();
        let b = Token::new();
        assert_ne!(a, b);
        assert_eq!(a.to_string().len(), 32);
        assert_eq!(a.to_string().parse::<Token>().unwrap(), a);
    }
}
