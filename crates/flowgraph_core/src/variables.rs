// SPDX-License-Identifier: MIT OR Apache-2.0
//! Named variable scopes shared by `basic/variable` nodes.
//!
//! Every graph has its own local scope and a handle to a shared scope.
//! The shared scope is an explicit value: a host creates it, hands it to the
//! root graph, and the graph passes the same handle down to every nested
//! graph. Two hosts that want to share variables pass the same handle.

use indexmap::IndexMap;
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::Arc;

/// Handle to a shared variable scope; clones share storage
#[derive(Debug, Clone, Default)]
pub struct Variables {
    values: Arc<RwLock<IndexMap<String, Value>>>,
}

impl Variables {
    /// Create an empty scope
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of `name`
    pub fn get(&self, name: &str) -> Option<Value> {
        self.values.read().get(name).cloned()
    }

    /// Set `name`, returning the previous value
    pub fn set(&self, name: &str, value: Value) -> Option<Value> {
        self.values.write().insert(name.to_string(), value)
    }

    /// Remove `name`, returning its value
    pub fn remove(&self, name: &str) -> Option<Value> {
        self.values.write().shift_remove(name)
    }

    /// Names in the order they were first set
    pub fn names(&self) -> Vec<String> {
        self.values.read().keys().cloned().collect()
    }

    /// Number of variables
    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    /// Whether no variable is set
    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty()
    }

    /// Whether both handles point at the same storage
    pub fn shares_with(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.values, &other.values)
    }
}
