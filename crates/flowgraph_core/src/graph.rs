// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph data structure containing nodes, links and the named boundary.

use crate::config::{EngineConfig, IdMode};
use crate::error::{GraphError, Result};
use crate::evaluation::TriggerTrace;
use crate::link::{Link, LinkId};
use crate::node::{Node, NodeId, NodeMode, PropertyChange};
use crate::slot::{is_compatible, SlotType};
use crate::subgraph::BoundaryEvent;
use crate::variables::Variables;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::{Duration, Instant};

/// Scheduler state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GraphStatus {
    /// No automatic passes
    #[default]
    Stopped,
    /// `update` runs a pass on every call
    Running,
}

/// A named entry or exit point declared on a graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundarySlot {
    /// Declared type
    #[serde(rename = "type")]
    pub slot_type: SlotType,
    /// Current value
    #[serde(default)]
    pub value: Option<Value>,
}

/// An event raised on a named boundary output during a pass
#[derive(Debug, Clone, PartialEq)]
pub struct TriggeredOutput {
    /// Boundary output name
    pub name: String,
    /// Event parameter
    pub param: Option<Value>,
}

type AfterExecute = Box<dyn FnMut(&Graph)>;

/// A node graph.
///
/// Nodes are kept in insertion order, which is also the order a pass
/// visits them in. No topological sort is applied: an ALWAYS node placed
/// before its upstream producer reads the producer's value from the
/// previous pass.
pub struct Graph {
    pub(crate) config: EngineConfig,
    status: GraphStatus,
    global_time: f64,
    iteration: u64,
    last_pass_duration: Duration,
    pub(crate) last_node_id: u64,
    pub(crate) last_link_id: u64,
    pub(crate) nodes: IndexMap<NodeId, Node>,
    pub(crate) links: IndexMap<LinkId, Link>,
    pub(crate) inputs: IndexMap<String, BoundarySlot>,
    pub(crate) outputs: IndexMap<String, BoundarySlot>,
    /// Owned by a subgraph node; boundary edits are queued for mirroring
    nested: bool,
    boundary_events: Vec<BoundaryEvent>,
    triggered_outputs: Vec<TriggeredOutput>,
    on_after_execute: Option<AfterExecute>,
    /// Variables local to this graph (runtime only)
    vars: IndexMap<String, Value>,
    /// Scope shared with nested graphs and whoever else holds the handle
    globals: Variables,
}

impl Graph {
    /// Create a new empty graph with the default configuration
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Create a new empty graph
    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            config,
            status: GraphStatus::Stopped,
            global_time: 0.0,
            iteration: 0,
            last_pass_duration: Duration::ZERO,
            last_node_id: 0,
            last_link_id: 0,
            nodes: IndexMap::new(),
            links: IndexMap::new(),
            inputs: IndexMap::new(),
            outputs: IndexMap::new(),
            nested: false,
            boundary_events: Vec::new(),
            triggered_outputs: Vec::new(),
            on_after_execute: None,
            vars: IndexMap::new(),
            globals: Variables::new(),
        }
    }

    /// Create the inner graph of a subgraph node
    pub(crate) fn new_nested() -> Self {
        let mut graph = Self::new();
        graph.nested = true;
        graph
    }

    /// Whether this graph is owned by a subgraph node
    pub fn is_nested(&self) -> bool {
        self.nested
    }

    /// Engine configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Replace the configuration of this graph and every nested graph
    pub fn set_config(&mut self, config: EngineConfig) {
        for node in self.nodes.values_mut() {
            if let Some(subgraph) = node.behavior.as_mut().and_then(|b| b.subgraph_mut()) {
                subgraph.set_config(config.clone());
            }
        }
        self.config = config;
    }

    /// Handle to the shared variable scope
    pub fn globals(&self) -> &Variables {
        &self.globals
    }

    /// Use `globals` as the shared scope of this graph and every nested graph
    pub fn set_globals(&mut self, globals: Variables) {
        for node in self.nodes.values_mut() {
            if let Some(subgraph) = node.behavior.as_mut().and_then(|b| b.subgraph_mut()) {
                subgraph.set_globals(globals.clone());
            }
        }
        self.globals = globals;
    }

    /// Graph-local variable
    pub fn var(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    /// Set a graph-local variable
    pub fn set_var(&mut self, name: &str, value: Value) {
        self.vars.insert(name.to_string(), value);
    }

    /// Remove a graph-local variable
    pub fn remove_var(&mut self, name: &str) -> Option<Value> {
        self.vars.shift_remove(name)
    }

    // ------------------------------------------------------------------
    // Scheduler
    // ------------------------------------------------------------------

    /// Current scheduler state
    pub fn status(&self) -> GraphStatus {
        self.status
    }

    /// Whether `update` will run passes
    pub fn is_running(&self) -> bool {
        self.status == GraphStatus::Running
    }

    /// Switch to RUNNING; no-op when already running
    pub fn start(&mut self) {
        if self.status == GraphStatus::Running {
            return;
        }
        self.status = GraphStatus::Running;
        tracing::debug!("Graph started");
    }

    /// Switch to STOPPED. A pass already in progress is never interrupted.
    pub fn stop(&mut self) {
        if self.status == GraphStatus::Stopped {
            return;
        }
        self.status = GraphStatus::Stopped;
        tracing::debug!("Graph stopped after {} passes", self.iteration);
    }

    /// Execute exactly `passes` full passes, whatever the status
    pub fn run_step(&mut self, passes: usize) {
        for _ in 0..passes {
            self.run_pass();
        }
    }

    /// Run one pass if RUNNING; returns whether a pass ran
    pub fn update(&mut self) -> bool {
        if !self.is_running() {
            return false;
        }
        self.run_pass();
        true
    }

    /// Accumulated graph clock in seconds
    pub fn global_time(&self) -> f64 {
        self.global_time
    }

    /// Number of completed passes
    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    /// Wall time spent in the last pass
    pub fn last_pass_duration(&self) -> Duration {
        self.last_pass_duration
    }

    /// Install the hook fired after every completed pass
    pub fn set_on_after_execute(&mut self, hook: impl FnMut(&Graph) + 'static) {
        self.on_after_execute = Some(Box::new(hook));
    }

    /// Remove the after-pass hook
    pub fn clear_on_after_execute(&mut self) {
        self.on_after_execute = None;
    }

    fn run_pass(&mut self) {
        let started = Instant::now();
        let order: Vec<NodeId> = self.nodes.keys().copied().collect();

        for id in order {
            // Earlier nodes may have removed this one
            let Some(node) = self.nodes.get(&id) else {
                continue;
            };
            if node.mode != NodeMode::Always {
                continue;
            }
            let type_name = node.type_name.clone();
            if let Err(err) = self.execute_node(id) {
                tracing::error!("Node {id} ({type_name}) failed: {err}");
            }
        }

        self.global_time += self.config.fixed_time_step;
        self.iteration += 1;
        self.last_pass_duration = started.elapsed();

        if let Some(mut hook) = self.on_after_execute.take() {
            hook(self);
            if self.on_after_execute.is_none() {
                self.on_after_execute = Some(hook);
            }
        }
    }

    // ------------------------------------------------------------------
    // Nodes
    // ------------------------------------------------------------------

    /// Last sequential node ID handed out
    pub fn last_node_id(&self) -> u64 {
        self.last_node_id
    }

    /// Last sequential link ID handed out
    pub fn last_link_id(&self) -> u64 {
        self.last_link_id
    }

    pub(crate) fn fresh_node_id(&mut self) -> NodeId {
        loop {
            let id = match self.config.id_mode {
                IdMode::Sequential => {
                    self.last_node_id += 1;
                    NodeId::Index(self.last_node_id)
                }
                IdMode::Uuid => NodeId::random(),
            };
            if !self.nodes.contains_key(&id) {
                return id;
            }
        }
    }

    pub(crate) fn fresh_link_id(&mut self) -> LinkId {
        loop {
            let id = match self.config.id_mode {
                IdMode::Sequential => {
                    self.last_link_id += 1;
                    LinkId::Index(self.last_link_id)
                }
                IdMode::Uuid => LinkId::random(),
            };
            if !self.links.contains_key(&id) {
                return id;
            }
        }
    }

    /// Add a node to the end of the pass order, assigning it a fresh ID
    pub fn add_node(&mut self, mut node: Node) -> NodeId {
        let id = self.fresh_node_id();
        node.id = id;
        self.attach(node);
        id
    }

    /// Add a node under a known ID (used when loading)
    pub(crate) fn insert_node(&mut self, mut node: Node, id: NodeId) -> Result<()> {
        if self.nodes.contains_key(&id) {
            return Err(GraphError::DuplicateNodeId(id));
        }
        if let NodeId::Index(index) = id {
            self.last_node_id = self.last_node_id.max(index);
        }
        node.id = id;
        self.attach(node);
        Ok(())
    }

    fn attach(&mut self, mut node: Node) {
        if let Some(subgraph) = node.behavior.as_mut().and_then(|b| b.subgraph_mut()) {
            subgraph.set_config(self.config.clone());
            subgraph.set_globals(self.globals.clone());
        }
        tracing::debug!("Added node {} ({})", node.id, node.type_name);
        self.nodes.insert(node.id, node);
    }

    /// Remove a node, its links, and whatever boundary entry it declared
    pub fn remove_node(&mut self, node_id: NodeId) -> Result<Node> {
        if !self.nodes.contains_key(&node_id) {
            return Err(GraphError::NodeNotFound(node_id));
        }

        let attached: Vec<LinkId> = self
            .links
            .values()
            .filter(|l| l.involves_node(node_id))
            .map(|l| l.id)
            .collect();
        for link_id in attached {
            self.disconnect(link_id)?;
        }

        let mut trace = TriggerTrace::default();
        self.with_behavior(node_id, &mut trace, |behavior, cx| behavior.on_removed(cx));

        let node = self
            .nodes
            .shift_remove(&node_id)
            .ok_or(GraphError::NodeNotFound(node_id))?;
        tracing::debug!("Removed node {} ({})", node_id, node.type_name);
        Ok(node)
    }

    /// Get a node by ID
    pub fn node(&self, node_id: NodeId) -> Option<&Node> {
        self.nodes.get(&node_id)
    }

    /// Get a mutable node by ID
    pub fn node_mut(&mut self, node_id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&node_id)
    }

    /// Whether a node is present
    pub fn contains_node(&self, node_id: NodeId) -> bool {
        self.nodes.contains_key(&node_id)
    }

    /// Get all nodes in pass order
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Get all node IDs in pass order
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    /// Get the number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Nodes created from `type_name`
    pub fn find_nodes_by_type<'a>(&'a self, type_name: &'a str) -> impl Iterator<Item = &'a Node> {
        self.nodes.values().filter(move |n| n.type_name == type_name)
    }

    // ------------------------------------------------------------------
    // Links
    // ------------------------------------------------------------------

    /// Link an output slot to an input slot.
    ///
    /// Returns `Ok(None)` without touching the graph when the slot types are
    /// incompatible. An existing link on the input slot is replaced.
    pub fn connect(
        &mut self,
        origin_id: NodeId,
        origin_slot: usize,
        target_id: NodeId,
        target_slot: usize,
    ) -> Result<Option<LinkId>> {
        let origin = self.nodes.get(&origin_id)
            .ok_or(GraphError::NodeNotFound(origin_id))?;
        let output = origin.outputs.get(origin_slot).ok_or(GraphError::OutputSlotOutOfRange {
            node: origin_id,
            slot: origin_slot,
        })?;
        let target = self.nodes.get(&target_id)
            .ok_or(GraphError::NodeNotFound(target_id))?;
        let input = target.inputs.get(target_slot).ok_or(GraphError::InputSlotOutOfRange {
            node: target_id,
            slot: target_slot,
        })?;

        if !is_compatible(&output.slot_type, &input.slot_type) {
            tracing::debug!(
                "Refused link {origin_id}:{origin_slot} -> {target_id}:{target_slot} ({:?} into {:?})",
                output.slot_type.as_str(),
                input.slot_type.as_str()
            );
            return Ok(None);
        }

        let link_type = output.slot_type.clone();
        let staged = output.value.clone();
        if let Some(existing) = input.link {
            self.disconnect(existing)?;
        }

        let id = self.fresh_link_id();
        let mut link = Link::new(id, origin_id, origin_slot, target_id, target_slot, link_type);
        link.data = staged;
        self.links.insert(id, link);

        if let Some(slot) = self.nodes.get_mut(&origin_id).and_then(|n| n.outputs.get_mut(origin_slot)) {
            slot.links.push(id);
        }
        if let Some(slot) = self.nodes.get_mut(&target_id).and_then(|n| n.inputs.get_mut(target_slot)) {
            slot.link = Some(id);
        }

        tracing::debug!("Linked {origin_id}:{origin_slot} -> {target_id}:{target_slot} as {id}");
        Ok(Some(id))
    }

    /// Remove a link from the link table and from both of its slots
    pub fn disconnect(&mut self, link_id: LinkId) -> Result<Link> {
        let link = self.links.get(&link_id).ok_or(GraphError::LinkNotFound(link_id))?;
        let (origin_id, origin_slot) = (link.origin_id, link.origin_slot);
        let (target_id, target_slot) = (link.target_id, link.target_slot);

        if let Some(slot) = self.nodes.get_mut(&origin_id).and_then(|n| n.outputs.get_mut(origin_slot)) {
            slot.links.retain(|l| *l != link_id);
        }
        if let Some(slot) = self.nodes.get_mut(&target_id).and_then(|n| n.inputs.get_mut(target_slot)) {
            if slot.link == Some(link_id) {
                slot.link = None;
            }
        }

        let link = self.links.shift_remove(&link_id).ok_or(GraphError::LinkNotFound(link_id))?;
        tracing::debug!("Unlinked {link_id}");
        Ok(link)
    }

    /// Remove the link feeding an input slot, if any
    pub fn disconnect_input(&mut self, node_id: NodeId, slot: usize) -> Result<Option<Link>> {
        let input = self.input_slot(node_id, slot)?;
        match input.link {
            Some(link_id) => self.disconnect(link_id).map(Some),
            None => Ok(None),
        }
    }

    /// Remove every link leaving an output slot; returns how many went
    pub fn disconnect_output(&mut self, node_id: NodeId, slot: usize) -> Result<usize> {
        let links = self.output_slot(node_id, slot)?.links.clone();
        for link_id in &links {
            self.disconnect(*link_id)?;
        }
        Ok(links.len())
    }

    /// Get a link by ID
    pub fn link(&self, link_id: LinkId) -> Option<&Link> {
        self.links.get(&link_id)
    }

    /// Get all links
    pub fn links(&self) -> impl Iterator<Item = &Link> {
        self.links.values()
    }

    /// Get links involving a node
    pub fn links_for_node(&self, node_id: NodeId) -> impl Iterator<Item = &Link> {
        self.links.values().filter(move |l| l.involves_node(node_id))
    }

    /// Get the number of links
    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// Links whose ALWAYS-mode origin runs at or after its ALWAYS-mode
    /// target in pass order; the target reads last pass's value.
    pub fn order_hazards(&self) -> Vec<LinkId> {
        self.links
            .values()
            .filter(|link| !link.carries_events())
            .filter(|link| {
                let origin = self.nodes.get_full(&link.origin_id);
                let target = self.nodes.get_full(&link.target_id);
                match (origin, target) {
                    (Some((o, _, origin)), Some((t, _, target))) => {
                        origin.mode == NodeMode::Always && target.mode == NodeMode::Always && o >= t
                    }
                    _ => false,
                }
            })
            .map(|link| link.id)
            .collect()
    }

    // ------------------------------------------------------------------
    // Slot values
    // ------------------------------------------------------------------

    /// Value most recently propagated into an input slot
    pub fn input_value(&self, node_id: NodeId, slot: usize) -> Option<&Value> {
        let link_id = self.nodes.get(&node_id)?.inputs.get(slot)?.link?;
        self.links.get(&link_id)?.data.as_ref()
    }

    /// Value most recently staged on an output slot
    pub fn output_value(&self, node_id: NodeId, slot: usize) -> Option<&Value> {
        self.nodes.get(&node_id)?.outputs.get(slot)?.value.as_ref()
    }

    /// Stage a value on an output slot for every current outbound link
    pub fn set_output_value(&mut self, node_id: NodeId, slot: usize, value: Option<Value>) -> Result<()> {
        let node = self.nodes.get_mut(&node_id)
            .ok_or(GraphError::NodeNotFound(node_id))?;
        let output = node.outputs.get_mut(slot)
            .ok_or(GraphError::OutputSlotOutOfRange { node: node_id, slot })?;
        for link_id in &output.links {
            if let Some(link) = self.links.get_mut(link_id) {
                link.data.clone_from(&value);
            }
        }
        output.value = value;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Slots
    // ------------------------------------------------------------------

    fn input_slot(&self, node_id: NodeId, slot: usize) -> Result<&crate::slot::InputSlot> {
        self.nodes
            .get(&node_id)
            .ok_or(GraphError::NodeNotFound(node_id))?
            .inputs
            .get(slot)
            .ok_or(GraphError::InputSlotOutOfRange { node: node_id, slot })
    }

    fn output_slot(&self, node_id: NodeId, slot: usize) -> Result<&crate::slot::OutputSlot> {
        self.nodes
            .get(&node_id)
            .ok_or(GraphError::NodeNotFound(node_id))?
            .outputs
            .get(slot)
            .ok_or(GraphError::OutputSlotOutOfRange { node: node_id, slot })
    }

    /// Append an input slot to a node
    pub fn add_input_slot(&mut self, node_id: NodeId, name: &str, slot_type: SlotType) -> Result<usize> {
        let node = self.nodes.get_mut(&node_id)
            .ok_or(GraphError::NodeNotFound(node_id))?;
        Ok(node.add_input(name, slot_type))
    }

    /// Append an output slot to a node
    pub fn add_output_slot(&mut self, node_id: NodeId, name: &str, slot_type: SlotType) -> Result<usize> {
        let node = self.nodes.get_mut(&node_id)
            .ok_or(GraphError::NodeNotFound(node_id))?;
        Ok(node.add_output(name, slot_type))
    }

    /// Remove an input slot, its link, and shift later slots down
    pub fn remove_input_slot(&mut self, node_id: NodeId, slot: usize) -> Result<()> {
        self.disconnect_input(node_id, slot)?;
        if let Some(node) = self.nodes.get_mut(&node_id) {
            node.inputs.remove(slot);
        }
        for link in self.links.values_mut() {
            if link.target_id == node_id && link.target_slot > slot {
                link.target_slot -= 1;
            }
        }
        Ok(())
    }

    /// Remove an output slot, its links, and shift later slots down
    pub fn remove_output_slot(&mut self, node_id: NodeId, slot: usize) -> Result<()> {
        self.disconnect_output(node_id, slot)?;
        if let Some(node) = self.nodes.get_mut(&node_id) {
            node.outputs.remove(slot);
        }
        for link in self.links.values_mut() {
            if link.origin_id == node_id && link.origin_slot > slot {
                link.origin_slot -= 1;
            }
        }
        Ok(())
    }

    /// Change an input slot's type, dropping its link if it no longer fits
    pub fn set_input_slot_type(&mut self, node_id: NodeId, slot: usize, slot_type: SlotType) -> Result<()> {
        let input = self.input_slot(node_id, slot)?;
        if input.slot_type == slot_type {
            return Ok(());
        }
        if let Some(link_id) = input.link {
            let fits = self
                .links
                .get(&link_id)
                .and_then(|l| self.nodes.get(&l.origin_id)?.outputs.get(l.origin_slot))
                .is_some_and(|origin| is_compatible(&origin.slot_type, &slot_type));
            if !fits {
                self.disconnect(link_id)?;
            }
        }
        if let Some(input) = self.nodes.get_mut(&node_id).and_then(|n| n.inputs.get_mut(slot)) {
            input.slot_type = slot_type;
        }
        Ok(())
    }

    /// Change an output slot's type, dropping links that no longer fit
    pub fn set_output_slot_type(&mut self, node_id: NodeId, slot: usize, slot_type: SlotType) -> Result<()> {
        let output = self.output_slot(node_id, slot)?;
        if output.slot_type == slot_type {
            return Ok(());
        }
        for link_id in output.links.clone() {
            let fits = self
                .links
                .get(&link_id)
                .and_then(|l| self.nodes.get(&l.target_id)?.inputs.get(l.target_slot))
                .is_some_and(|target| is_compatible(&slot_type, &target.slot_type));
            if fits {
                if let Some(link) = self.links.get_mut(&link_id) {
                    link.link_type = slot_type.clone();
                }
            } else {
                self.disconnect(link_id)?;
            }
        }
        if let Some(output) = self.nodes.get_mut(&node_id).and_then(|n| n.outputs.get_mut(slot)) {
            output.slot_type = slot_type;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Properties
    // ------------------------------------------------------------------

    /// Write a property and run the node's change hook.
    ///
    /// Returns `false` when the hook rejected the value, in which case the
    /// previous value is restored.
    pub fn set_property(&mut self, node_id: NodeId, name: &str, value: Value) -> Result<bool> {
        let node = self.nodes.get_mut(&node_id)
            .ok_or(GraphError::NodeNotFound(node_id))?;
        let previous = node.properties.insert(name.to_string(), value.clone());

        let mut trace = TriggerTrace::default();
        let outcome = self
            .with_behavior(node_id, &mut trace, |behavior, cx| {
                behavior.on_property_changed(name, &value, cx)
            })
            .unwrap_or(PropertyChange::Accept);

        if outcome == PropertyChange::Reject {
            if let Some(node) = self.nodes.get_mut(&node_id) {
                match previous {
                    Some(previous) => {
                        node.properties.insert(name.to_string(), previous);
                    }
                    None => {
                        node.properties.shift_remove(name);
                    }
                }
            }
            return Ok(false);
        }
        Ok(true)
    }

    // ------------------------------------------------------------------
    // Named boundary
    // ------------------------------------------------------------------

    fn record(&mut self, event: BoundaryEvent) {
        if self.nested {
            self.boundary_events.push(event);
        }
    }

    pub(crate) fn take_boundary_events(&mut self) -> Vec<BoundaryEvent> {
        std::mem::take(&mut self.boundary_events)
    }

    /// Declare a boundary input; an existing entry keeps its value
    pub fn add_boundary_input(&mut self, name: &str, slot_type: SlotType, value: Option<Value>) {
        add_entry(&mut self.inputs, name, slot_type.clone(), value);
        self.record(BoundaryEvent::InputAdded { name: name.to_string(), slot_type });
    }

    /// Rename a boundary input; fails if `old` is missing or `new` taken
    pub fn rename_boundary_input(&mut self, old: &str, new: &str) -> bool {
        if !rename_entry(&mut self.inputs, old, new) {
            return false;
        }
        self.record(BoundaryEvent::InputRenamed { old: old.to_string(), new: new.to_string() });
        true
    }

    /// Change a boundary input's type; returns whether anything changed
    pub fn set_boundary_input_type(&mut self, name: &str, slot_type: SlotType) -> bool {
        let Some(entry) = self.inputs.get_mut(name) else {
            return false;
        };
        if entry.slot_type == slot_type {
            return false;
        }
        entry.slot_type = slot_type.clone();
        self.record(BoundaryEvent::InputTypeChanged { name: name.to_string(), slot_type });
        true
    }

    /// Remove a boundary input
    pub fn remove_boundary_input(&mut self, name: &str) -> bool {
        if self.inputs.shift_remove(name).is_none() {
            return false;
        }
        self.record(BoundaryEvent::InputRemoved { name: name.to_string() });
        true
    }

    /// Set the value of an existing boundary input
    pub fn set_boundary_input_value(&mut self, name: &str, value: Option<Value>) -> bool {
        match self.inputs.get_mut(name) {
            Some(entry) => {
                entry.value = value;
                true
            }
            None => false,
        }
    }

    /// Get a boundary input
    pub fn boundary_input(&self, name: &str) -> Option<&BoundarySlot> {
        self.inputs.get(name)
    }

    /// All boundary inputs in declaration order
    pub fn boundary_inputs(&self) -> &IndexMap<String, BoundarySlot> {
        &self.inputs
    }

    /// Declare a boundary output; an existing entry keeps its value
    pub fn add_boundary_output(&mut self, name: &str, slot_type: SlotType, value: Option<Value>) {
        add_entry(&mut self.outputs, name, slot_type.clone(), value);
        self.record(BoundaryEvent::OutputAdded { name: name.to_string(), slot_type });
    }

    /// Rename a boundary output; fails if `old` is missing or `new` taken
    pub fn rename_boundary_output(&mut self, old: &str, new: &str) -> bool {
        if !rename_entry(&mut self.outputs, old, new) {
            return false;
        }
        self.record(BoundaryEvent::OutputRenamed { old: old.to_string(), new: new.to_string() });
        true
    }

    /// Change a boundary output's type; returns whether anything changed
    pub fn set_boundary_output_type(&mut self, name: &str, slot_type: SlotType) -> bool {
        let Some(entry) = self.outputs.get_mut(name) else {
            return false;
        };
        if entry.slot_type == slot_type {
            return false;
        }
        entry.slot_type = slot_type.clone();
        self.record(BoundaryEvent::OutputTypeChanged { name: name.to_string(), slot_type });
        true
    }

    /// Remove a boundary output
    pub fn remove_boundary_output(&mut self, name: &str) -> bool {
        if self.outputs.shift_remove(name).is_none() {
            return false;
        }
        self.record(BoundaryEvent::OutputRemoved { name: name.to_string() });
        true
    }

    /// Set the value of an existing boundary output
    pub fn set_boundary_output_value(&mut self, name: &str, value: Option<Value>) -> bool {
        match self.outputs.get_mut(name) {
            Some(entry) => {
                entry.value = value;
                true
            }
            None => false,
        }
    }

    /// Get a boundary output
    pub fn boundary_output(&self, name: &str) -> Option<&BoundarySlot> {
        self.outputs.get(name)
    }

    /// All boundary outputs in declaration order
    pub fn boundary_outputs(&self) -> &IndexMap<String, BoundarySlot> {
        &self.outputs
    }

    /// Raise an event on a named boundary output
    pub fn trigger_output(&mut self, name: &str, param: Option<Value>) {
        self.triggered_outputs.push(TriggeredOutput {
            name: name.to_string(),
            param,
        });
    }

    /// Take the boundary output events raised since the last drain
    pub fn drain_triggered_outputs(&mut self) -> Vec<TriggeredOutput> {
        std::mem::take(&mut self.triggered_outputs)
    }
}

fn add_entry(map: &mut IndexMap<String, BoundarySlot>, name: &str, slot_type: SlotType, value: Option<Value>) {
    match map.get_mut(name) {
        Some(entry) => {
            entry.slot_type = slot_type;
            if value.is_some() {
                entry.value = value;
            }
        }
        None => {
            map.insert(name.to_string(), BoundarySlot { slot_type, value });
        }
    }
}

fn rename_entry(map: &mut IndexMap<String, BoundarySlot>, old: &str, new: &str) -> bool {
    if !map.contains_key(old) {
        return false;
    }
    if map.contains_key(new) {
        tracing::warn!("Boundary already has an entry named {new:?}");
        return false;
    }
    *map = std::mem::take(map)
        .into_iter()
        .map(|(name, entry)| if name == old { (new.to_string(), entry) } else { (name, entry) })
        .collect();
    true
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph")
            .field("status", &self.status)
            .field("iteration", &self.iteration)
            .field("nested", &self.nested)
            .field("nodes", &self.nodes)
            .field("links", &self.links)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .field("vars", &self.vars)
            .finish_non_exhaustive()
    }
}
