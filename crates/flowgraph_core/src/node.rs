// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node definitions for the graph runtime.
//!
//! A [`Node`] is plain data (slots, properties, layout) plus a boxed
//! [`NodeBehavior`] carrying whichever hooks its type implements. Hooks
//! that a behavior leaves at their default are simply not there: the graph
//! calls them and nothing happens.

use crate::error::{GraphError, NodeError};
use crate::evaluation::NodeContext;
use crate::graph::Graph;
use crate::registry::NodeRegistry;
use crate::serialization::NodeData;
use crate::slot::{InputSlot, OutputSlot, SlotType};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier for a node.
///
/// Serialized as a bare number or a UUID string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeId {
    /// Sequential, unique inside one graph
    Index(u64),
    /// Random, unique process-wide
    Uuid(Uuid),
}

impl NodeId {
    /// Placeholder carried by nodes not yet added to a graph
    pub const UNASSIGNED: Self = Self::Index(0);

    /// Create a new random node ID
    pub fn random() -> Self {
        Self::Uuid(Uuid::new_v4())
    }

    /// Sequential index, if this is one
    pub fn index(&self) -> Option<u64> {
        match self {
            Self::Index(index) => Some(*index),
            Self::Uuid(_) => None,
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(index) => write!(f, "{index}"),
            Self::Uuid(uuid) => write!(f, "{uuid}"),
        }
    }
}

impl FromStr for NodeId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.parse::<u64>() {
            Ok(index) => Ok(Self::Index(index)),
            Err(_) => Uuid::parse_str(s).map(Self::Uuid),
        }
    }
}

/// When the scheduler runs a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeMode {
    /// Executed on every pass
    #[default]
    Always,
    /// Skipped by the pass; reacts to actions through `on_action`
    OnEvent,
    /// Never executed and ignores actions
    Never,
    /// Skipped by the pass; an incoming action runs `on_execute`
    OnTrigger,
}

/// Editor display flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NodeFlags {
    /// Whether the node is collapsed in the UI
    #[serde(default)]
    pub collapsed: bool,
}

/// Outcome of a property change hook
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyChange {
    /// Keep the new value
    Accept,
    /// Restore the previous value
    Reject,
}

/// A file handed to a node by the embedding application
#[derive(Debug, Clone)]
pub struct DroppedFile {
    /// File name as reported by the host
    pub name: String,
    /// Raw file contents
    pub contents: Vec<u8>,
}

impl DroppedFile {
    /// Contents decoded as UTF-8, lossily
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.contents).into_owned()
    }
}

/// Optional hooks implemented by a node type.
///
/// Every method has a no-op default; a type overrides exactly the
/// capabilities it has.
pub trait NodeBehavior: fmt::Debug {
    /// Run one evaluation of the node
    fn on_execute(&mut self, _cx: &mut NodeContext<'_>) -> Result<(), NodeError> {
        Ok(())
    }

    /// React to an action arriving on the input slot named `action`
    fn on_action(
        &mut self,
        _action: &str,
        _param: Option<&Value>,
        _cx: &mut NodeContext<'_>,
    ) -> Result<(), NodeError> {
        Ok(())
    }

    /// Called after `name` has been written to the property bag
    fn on_property_changed(
        &mut self,
        _name: &str,
        _value: &Value,
        _cx: &mut NodeContext<'_>,
    ) -> PropertyChange {
        PropertyChange::Accept
    }

    /// Called once the generic part of `data` has been applied
    fn on_configure(
        &mut self,
        _data: &NodeData,
        _registry: &NodeRegistry,
        _cx: &mut NodeContext<'_>,
    ) -> Result<(), GraphError> {
        Ok(())
    }

    /// Add type-specific state to a serialized record
    fn on_serialize(&self, _data: &mut NodeData) {}

    /// Called after the node's links are gone, before it leaves the graph
    fn on_removed(&mut self, _cx: &mut NodeContext<'_>) {}

    /// Accept a file dropped onto the node; returns whether it was used
    fn on_drop_file(&mut self, _file: &DroppedFile, _cx: &mut NodeContext<'_>) -> bool {
        false
    }

    /// Title shown by a renderer instead of the stored one
    fn title(&self, _node: &Node) -> Option<String> {
        None
    }

    /// Nested graph, for subgraph nodes
    fn subgraph(&self) -> Option<&Graph> {
        None
    }

    /// Mutable nested graph, for subgraph nodes
    fn subgraph_mut(&mut self) -> Option<&mut Graph> {
        None
    }
}

/// A node instance in a graph
#[derive(Debug)]
pub struct Node {
    pub(crate) id: NodeId,
    pub(crate) type_name: String,
    /// Display name (can be customized)
    pub title: String,
    /// Position in the editor
    pub position: [f32; 2],
    /// Size in the editor
    pub size: [f32; 2],
    /// Scheduling mode
    pub mode: NodeMode,
    /// Display flags
    pub flags: NodeFlags,
    pub(crate) inputs: Vec<InputSlot>,
    pub(crate) outputs: Vec<OutputSlot>,
    pub(crate) properties: IndexMap<String, Value>,
    /// Taken out while one of its hooks runs
    pub(crate) behavior: Option<Box<dyn NodeBehavior>>,
}

impl Node {
    /// Create a node of `type_name` driven by `behavior`
    pub fn new(type_name: impl Into<String>, behavior: impl NodeBehavior + 'static) -> Self {
        let type_name = type_name.into();
        Self {
            id: NodeId::UNASSIGNED,
            title: type_name.clone(),
            type_name,
            position: [0.0, 0.0],
            size: [140.0, 30.0],
            mode: NodeMode::Always,
            flags: NodeFlags::default(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            properties: IndexMap::new(),
            behavior: Some(Box::new(behavior)),
        }
    }

    /// Add an input slot
    pub fn with_input(mut self, name: impl Into<String>, slot_type: impl Into<SlotType>) -> Self {
        self.inputs.push(InputSlot::new(name, slot_type.into()));
        self
    }

    /// Add an output slot
    pub fn with_output(mut self, name: impl Into<String>, slot_type: impl Into<SlotType>) -> Self {
        self.outputs.push(OutputSlot::new(name, slot_type.into()));
        self
    }

    /// Add a property with its default value
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    /// Set the scheduling mode
    pub fn with_mode(mut self, mode: NodeMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the display title
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Set the size
    pub fn with_size(mut self, width: f32, height: f32) -> Self {
        self.size = [width, height];
        self
    }

    /// Set the position
    pub fn with_position(mut self, x: f32, y: f32) -> Self {
        self.position = [x, y];
        self
    }

    /// Node ID (`NodeId::UNASSIGNED` until added to a graph)
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Registry key this node was created from
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Get an input slot by index
    pub fn input(&self, index: usize) -> Option<&InputSlot> {
        self.inputs.get(index)
    }

    /// Get an output slot by index
    pub fn output(&self, index: usize) -> Option<&OutputSlot> {
        self.outputs.get(index)
    }

    /// All input slots
    pub fn inputs(&self) -> &[InputSlot] {
        &self.inputs
    }

    /// All output slots
    pub fn outputs(&self) -> &[OutputSlot] {
        &self.outputs
    }

    /// Index of the first input slot called `name`
    pub fn find_input(&self, name: &str) -> Option<usize> {
        self.inputs.iter().position(|s| s.name == name)
    }

    /// Index of the first output slot called `name`
    pub fn find_output(&self, name: &str) -> Option<usize> {
        self.outputs.iter().position(|s| s.name == name)
    }

    /// Append an unconnected input slot, returning its index
    pub fn add_input(&mut self, name: impl Into<String>, slot_type: impl Into<SlotType>) -> usize {
        self.inputs.push(InputSlot::new(name, slot_type.into()));
        self.inputs.len() - 1
    }

    /// Append an unconnected output slot, returning its index
    pub fn add_output(&mut self, name: impl Into<String>, slot_type: impl Into<SlotType>) -> usize {
        self.outputs.push(OutputSlot::new(name, slot_type.into()));
        self.outputs.len() - 1
    }

    /// Get a property value
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    /// The property bag
    pub fn properties(&self) -> &IndexMap<String, Value> {
        &self.properties
    }

    /// Title a renderer should show
    pub fn display_title(&self) -> String {
        self.behavior
            .as_ref()
            .and_then(|b| b.title(self))
            .unwrap_or_else(|| self.title.clone())
    }

    /// Nested graph, for subgraph nodes
    pub fn subgraph(&self) -> Option<&Graph> {
        self.behavior.as_ref().and_then(|b| b.subgraph())
    }

    /// Whether one of this node's hooks is currently running
    pub fn is_busy(&self) -> bool {
        self.behavior.is_none()
    }
}
