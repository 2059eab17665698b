// SPDX-License-Identifier: MIT OR Apache-2.0
//! Registry mapping node type names to factories.

use crate::error::{GraphError, Result};
use crate::node::Node;
use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;

/// Builds a fresh node of one type
pub type NodeFactory = Arc<dyn Fn() -> Node + Send + Sync>;

/// Node type category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeCategory {
    /// Graph structure (subgraphs, boundary nodes)
    Graph,
    /// Constants and sources
    Input,
    /// Sinks and observers
    Output,
    /// Logic/flow control
    Logic,
    /// Utility nodes
    Utility,
    /// Custom/user-defined
    Custom,
}

/// Node type definition
#[derive(Clone)]
pub struct NodeType {
    /// Unique type identifier, e.g. `logic/AND`
    pub id: String,
    /// Display name
    pub name: String,
    /// Category
    pub category: NodeCategory,
    /// Description
    pub description: String,
    factory: NodeFactory,
}

impl NodeType {
    /// Describe a node type built by `factory`
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        category: NodeCategory,
        description: impl Into<String>,
        factory: impl Fn() -> Node + Send + Sync + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category,
            description: description.into(),
            factory: Arc::new(factory),
        }
    }
}

impl fmt::Debug for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeType")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("category", &self.category)
            .finish_non_exhaustive()
    }
}

/// Registry of available node types.
///
/// Built once by the embedding application and passed explicitly to the
/// operations that instantiate nodes (configure, clone).
#[derive(Debug, Default)]
pub struct NodeRegistry {
    /// Registered node types by ID
    types: IndexMap<String, NodeType>,
}

impl NodeRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            types: IndexMap::new(),
        }
    }

    /// Register a node type, replacing any previous one with the same ID
    pub fn register(&mut self, node_type: NodeType) {
        if self.types.contains_key(&node_type.id) {
            tracing::debug!("Replacing node type {}", node_type.id);
        }
        self.types.insert(node_type.id.clone(), node_type);
    }

    /// Get a node type by ID
    pub fn get(&self, id: &str) -> Option<&NodeType> {
        self.types.get(id)
    }

    /// Whether a type is registered
    pub fn contains(&self, id: &str) -> bool {
        self.types.contains_key(id)
    }

    /// Get all registered types
    pub fn types(&self) -> impl Iterator<Item = &NodeType> {
        self.types.values()
    }

    /// Get types by category
    pub fn types_in_category(&self, category: NodeCategory) -> impl Iterator<Item = &NodeType> {
        self.types.values().filter(move |t| t.category == category)
    }

    /// Create a node from a type ID
    pub fn create_node(&self, type_id: &str) -> Result<Node> {
        let node_type = self
            .get(type_id)
            .ok_or_else(|| GraphError::UnknownNodeType(type_id.to_string()))?;
        let mut node = (node_type.factory)();
        node.type_name = node_type.id.clone();
        if node.title == node.type_name {
            node.title = node_type.name.clone();
        }
        Ok(node)
    }
}
