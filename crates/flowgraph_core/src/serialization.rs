// SPDX-License-Identifier: MIT OR Apache-2.0
//! Serialized graph records, loading, and cloning.
//!
//! [`GraphData`] is the plain record a graph writes out and `configure`
//! reads back. Runtime state (staged output values, link data, the clock)
//! is never part of it.

use crate::config::EngineConfig;
use crate::error::{FormatError, GraphError, Result};
use crate::evaluation::TriggerTrace;
use crate::graph::{BoundarySlot, Graph};
use crate::link::{Link, LinkId};
use crate::node::{Node, NodeFlags, NodeId, NodeMode};
use crate::registry::NodeRegistry;
use crate::remap::IdRemapper;
use crate::slot::{InputSlot, OutputSlot, SlotType};
use indexmap::IndexMap;
use ron::ser::PrettyConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Version written into every graph record
pub const FORMAT_VERSION: u32 = 1;

fn format_version() -> u32 {
    FORMAT_VERSION
}

/// Serialized node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeData {
    /// Node ID; absent on records used as clone templates
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<NodeId>,
    /// Registry key
    #[serde(rename = "type")]
    pub type_name: String,
    /// Display title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Position
    #[serde(default)]
    pub pos: [f32; 2],
    /// Size
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<[f32; 2]>,
    /// Display flags
    #[serde(default)]
    pub flags: NodeFlags,
    /// Scheduling mode
    #[serde(default)]
    pub mode: NodeMode,
    /// Input slots with their link references
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inputs: Option<Vec<InputSlot>>,
    /// Output slots with their link references
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs: Option<Vec<OutputSlot>>,
    /// Property bag
    #[serde(default)]
    pub properties: IndexMap<String, Value>,
    /// Nested graph of a subgraph node
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subgraph: Option<Box<GraphData>>,
}

/// Serialized link: `[id, origin_id, origin_slot, target_id, target_slot, type]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkData(
    pub LinkId,
    pub NodeId,
    pub usize,
    pub NodeId,
    pub usize,
    pub SlotType,
);

impl From<&Link> for LinkData {
    fn from(link: &Link) -> Self {
        Self(
            link.id,
            link.origin_id,
            link.origin_slot,
            link.target_id,
            link.target_slot,
            link.link_type.clone(),
        )
    }
}

/// Serialized graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphData {
    /// Format version
    #[serde(default = "format_version")]
    pub version: u32,
    /// Last sequential node ID handed out
    #[serde(default)]
    pub last_node_id: u64,
    /// Last sequential link ID handed out
    #[serde(default)]
    pub last_link_id: u64,
    /// Nodes in pass order
    #[serde(default)]
    pub nodes: Vec<NodeData>,
    /// Links
    #[serde(default)]
    pub links: Vec<LinkData>,
    /// Named boundary inputs
    #[serde(default)]
    pub inputs: IndexMap<String, BoundarySlot>,
    /// Named boundary outputs
    #[serde(default)]
    pub outputs: IndexMap<String, BoundarySlot>,
}

impl Default for GraphData {
    fn default() -> Self {
        Self {
            version: FORMAT_VERSION,
            last_node_id: 0,
            last_link_id: 0,
            nodes: Vec::new(),
            links: Vec::new(),
            inputs: IndexMap::new(),
            outputs: IndexMap::new(),
        }
    }
}

impl GraphData {
    /// Encode as pretty JSON
    pub fn to_json(&self) -> std::result::Result<String, FormatError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Decode from JSON
    pub fn from_json(text: &str) -> std::result::Result<Self, FormatError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Encode as pretty RON
    pub fn to_ron(&self) -> std::result::Result<String, FormatError> {
        Ok(ron::ser::to_string_pretty(self, PrettyConfig::default())?)
    }

    /// Decode from RON
    pub fn from_ron(text: &str) -> std::result::Result<Self, FormatError> {
        Ok(ron::from_str(text)?)
    }

    /// Visit every node record in this graph and all nested graphs
    pub fn walk<'a>(&'a self, f: &mut impl FnMut(&'a GraphData, &'a NodeData)) {
        for node in &self.nodes {
            f(self, node);
            if let Some(inner) = &node.subgraph {
                inner.walk(f);
            }
        }
    }
}

impl Node {
    /// Capture the node as a record
    pub fn serialize(&self) -> NodeData {
        let mut data = NodeData {
            id: Some(self.id),
            type_name: self.type_name.clone(),
            title: Some(self.title.clone()),
            pos: self.position,
            size: Some(self.size),
            flags: self.flags,
            mode: self.mode,
            inputs: Some(self.inputs.clone()),
            outputs: Some(self.outputs.iter().map(OutputSlot::persisted).collect()),
            properties: self.properties.clone(),
            subgraph: None,
        };
        if let Some(behavior) = &self.behavior {
            behavior.on_serialize(&mut data);
        }
        data
    }

    /// Apply the type-independent part of a record
    fn apply(&mut self, data: &NodeData) {
        if let Some(title) = &data.title {
            self.title.clone_from(title);
        }
        self.position = data.pos;
        if let Some(size) = data.size {
            self.size = size;
        }
        self.flags = data.flags;
        self.mode = data.mode;
        if let Some(inputs) = &data.inputs {
            self.inputs.clone_from(inputs);
        }
        if let Some(outputs) = &data.outputs {
            self.outputs = outputs.iter().map(OutputSlot::persisted).collect();
        }
        for (name, value) in &data.properties {
            self.properties.insert(name.clone(), value.clone());
        }
    }
}

impl Graph {
    /// Capture the graph, including nested graphs, as a record
    pub fn serialize(&self) -> GraphData {
        GraphData {
            version: FORMAT_VERSION,
            last_node_id: self.last_node_id,
            last_link_id: self.last_link_id,
            nodes: self.nodes.values().map(Node::serialize).collect(),
            links: self.links.values().map(LinkData::from).collect(),
            inputs: self.inputs.clone(),
            outputs: self.outputs.clone(),
        }
    }

    /// Replace the contents of this graph with `data`.
    ///
    /// Nodes are created through `registry` under their recorded IDs. All
    /// nodes receive their slots and properties before any type-specific
    /// configure hook runs, so hooks may inspect neighbours.
    pub fn configure(&mut self, data: &GraphData, registry: &NodeRegistry) -> Result<()> {
        self.nodes.clear();
        self.links.clear();
        self.take_boundary_events();
        self.drain_triggered_outputs();
        self.last_node_id = data.last_node_id;
        self.last_link_id = data.last_link_id;
        self.inputs = data.inputs.clone();
        self.outputs = data.outputs.clone();

        let mut ids = Vec::with_capacity(data.nodes.len());
        for record in &data.nodes {
            let id = record
                .id
                .ok_or_else(|| GraphError::MissingNodeId(record.type_name.clone()))?;
            let node = registry.create_node(&record.type_name)?;
            self.insert_node(node, id)?;
            ids.push(id);
        }

        for LinkData(id, origin_id, origin_slot, target_id, target_slot, link_type) in &data.links {
            if self.links.contains_key(id) {
                return Err(GraphError::DuplicateLinkId(*id));
            }
            for node in [origin_id, target_id] {
                if !self.nodes.contains_key(node) {
                    return Err(GraphError::DanglingLink { link: *id, node: *node });
                }
            }
            if let LinkId::Index(index) = id {
                self.last_link_id = self.last_link_id.max(*index);
            }
            let link = Link::new(*id, *origin_id, *origin_slot, *target_id, *target_slot, link_type.clone());
            self.links.insert(*id, link);
        }

        for (id, record) in ids.iter().zip(&data.nodes) {
            if let Some(node) = self.nodes.get_mut(id) {
                node.apply(record);
            }
        }
        self.check_link_slots()?;

        for (id, record) in ids.iter().zip(&data.nodes) {
            self.run_configure_hooks(*id, record, registry)?;
        }

        tracing::debug!(
            "Configured graph with {} nodes and {} links",
            self.nodes.len(),
            self.links.len()
        );
        Ok(())
    }

    /// Both directions must agree: every link sits in the slots it names,
    /// and every slot reference resolves to a link that names that slot.
    fn check_link_slots(&self) -> Result<()> {
        for link in self.links.values() {
            let origin = self.nodes.get(&link.origin_id)
                .ok_or(GraphError::DanglingLink { link: link.id, node: link.origin_id })?;
            let output = origin.outputs.get(link.origin_slot)
                .ok_or(GraphError::OutputSlotOutOfRange { node: link.origin_id, slot: link.origin_slot })?;
            if !output.links.contains(&link.id) {
                return Err(GraphError::LinkSlotMismatch { link: link.id, node: link.origin_id });
            }
            let target = self.nodes.get(&link.target_id)
                .ok_or(GraphError::DanglingLink { link: link.id, node: link.target_id })?;
            let input = target.inputs.get(link.target_slot)
                .ok_or(GraphError::InputSlotOutOfRange { node: link.target_id, slot: link.target_slot })?;
            if input.link != Some(link.id) {
                return Err(GraphError::LinkSlotMismatch { link: link.id, node: link.target_id });
            }
        }

        for node in self.nodes.values() {
            for (slot, input) in node.inputs.iter().enumerate() {
                let Some(link_id) = input.link else {
                    continue;
                };
                let link = self.links.get(&link_id).ok_or(GraphError::LinkNotFound(link_id))?;
                if link.target_id != node.id || link.target_slot != slot {
                    return Err(GraphError::LinkSlotMismatch { link: link_id, node: node.id });
                }
            }
            for (slot, output) in node.outputs.iter().enumerate() {
                for link_id in &output.links {
                    let link = self.links.get(link_id).ok_or(GraphError::LinkNotFound(*link_id))?;
                    if link.origin_id != node.id || link.origin_slot != slot {
                        return Err(GraphError::LinkSlotMismatch { link: *link_id, node: node.id });
                    }
                }
            }
        }
        Ok(())
    }

    /// Replay every property through the change hook, then run `on_configure`
    fn run_configure_hooks(&mut self, node_id: NodeId, record: &NodeData, registry: &NodeRegistry) -> Result<()> {
        let mut trace = TriggerTrace::default();
        for (name, value) in &record.properties {
            self.with_behavior(node_id, &mut trace, |behavior, cx| {
                behavior.on_property_changed(name, value, cx)
            });
        }
        match self.with_behavior(node_id, &mut trace, |behavior, cx| {
            behavior.on_configure(record, registry, cx)
        }) {
            Some(result) => result,
            None => Ok(()),
        }
    }

    /// Apply a record to an existing node
    pub fn configure_node(&mut self, node_id: NodeId, data: &NodeData, registry: &NodeRegistry) -> Result<()> {
        let node = self.nodes.get_mut(&node_id)
            .ok_or(GraphError::NodeNotFound(node_id))?;
        node.apply(data);
        self.run_configure_hooks(node_id, data, registry)
    }

    /// Build a graph from a record
    pub fn from_data(data: &GraphData, registry: &NodeRegistry, config: EngineConfig) -> Result<Self> {
        let mut graph = Self::with_config(config);
        graph.configure(data, registry)?;
        Ok(graph)
    }

    /// Serialize as pretty JSON
    pub fn to_json(&self) -> std::result::Result<String, FormatError> {
        self.serialize().to_json()
    }

    /// Load a graph from JSON
    pub fn from_json(text: &str, registry: &NodeRegistry) -> std::result::Result<Self, FormatError> {
        let data = GraphData::from_json(text)?;
        Ok(Self::from_data(&data, registry, EngineConfig::default())?)
    }

    /// Serialize as pretty RON
    pub fn to_ron(&self) -> std::result::Result<String, FormatError> {
        self.serialize().to_ron()
    }

    /// Load a graph from RON
    pub fn from_ron(text: &str, registry: &NodeRegistry) -> std::result::Result<Self, FormatError> {
        let data = GraphData::from_ron(text)?;
        Ok(Self::from_data(&data, registry, EngineConfig::default())?)
    }

    /// Copy a node into this graph under a fresh ID.
    ///
    /// A nested graph is copied with fresh identifiers throughout. The copy
    /// keeps the source's slot lists, names, types and labels included, but
    /// starts unconnected.
    pub fn clone_node(&mut self, node_id: NodeId, registry: &NodeRegistry) -> Result<NodeId> {
        let node = self.nodes.get(&node_id).ok_or(GraphError::NodeNotFound(node_id))?;
        let mut data = node.serialize();

        if let Some(inner) = data.subgraph.as_deref_mut() {
            let mut remapper = IdRemapper::for_data(&self.config, inner);
            remapper.reserve_graph(self);
            remapper.remap(inner)?;
        }

        data.id = None;
        for input in data.inputs.iter_mut().flatten() {
            input.link = None;
        }
        for output in data.outputs.iter_mut().flatten() {
            output.links.clear();
        }

        let copy = registry.create_node(&data.type_name)?;
        let copy_id = self.add_node(copy);
        self.configure_node(copy_id, &data, registry)?;
        tracing::debug!("Cloned node {node_id} as {copy_id}");
        Ok(copy_id)
    }

    /// Copy the whole graph with fresh identifiers throughout
    pub fn duplicate(&self, registry: &NodeRegistry) -> Result<Graph> {
        let mut data = self.serialize();
        let mut remapper = IdRemapper::for_data(&self.config, &data);
        remapper.reserve_graph(self);
        remapper.remap(&mut data)?;
        let mut copy = Self::from_data(&data, registry, self.config.clone())?;
        copy.set_globals(self.globals().clone());
        Ok(copy)
    }
}
