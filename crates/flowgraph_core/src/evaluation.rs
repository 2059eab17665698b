// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node execution and event propagation.
//!
//! Data moves by pull: a node stages values on its outputs and a
//! downstream node reads them when it next runs. Events move by push:
//! triggering an output slot walks its event links right away, depth first,
//! and delivers an action to each target.

use crate::config::{EngineConfig, EventGuard};
use crate::error::{GraphError, NodeError, Result};
use crate::graph::Graph;
use crate::link::LinkId;
use crate::node::{DroppedFile, Node, NodeBehavior, NodeId, NodeMode};
use serde_json::Value;
use std::collections::HashSet;

/// Book-keeping shared by everything one trigger call sets off.
///
/// Each link fires at most once per trigger, which cuts event cycles.
/// With [`EventGuard::PerNode`] each node also receives at most one action.
#[derive(Debug, Default)]
pub struct TriggerTrace {
    links: HashSet<LinkId>,
    nodes: HashSet<NodeId>,
}

impl TriggerTrace {
    /// Links fired so far
    pub fn fired_links(&self) -> &HashSet<LinkId> {
        &self.links
    }

    /// Nodes that received an action so far
    pub fn reached_nodes(&self) -> &HashSet<NodeId> {
        &self.nodes
    }
}

/// What a hook sees of the graph while it runs.
///
/// The running node's behavior is checked out of the graph for the
/// duration of the hook, so the graph can be borrowed mutably here.
pub struct NodeContext<'a> {
    graph: &'a mut Graph,
    node_id: NodeId,
    trace: &'a mut TriggerTrace,
}

impl<'a> NodeContext<'a> {
    pub(crate) fn new(graph: &'a mut Graph, node_id: NodeId, trace: &'a mut TriggerTrace) -> Self {
        Self {
            graph,
            node_id,
            trace,
        }
    }

    /// ID of the node whose hook is running
    pub fn id(&self) -> NodeId {
        self.node_id
    }

    /// The graph holding the node
    pub fn graph(&self) -> &Graph {
        &*self.graph
    }

    /// The graph holding the node, mutably
    pub fn graph_mut(&mut self) -> &mut Graph {
        &mut *self.graph
    }

    /// Engine configuration
    pub fn config(&self) -> &EngineConfig {
        self.graph.config()
    }

    /// Seconds accumulated on the graph clock
    pub fn global_time(&self) -> f64 {
        self.graph.global_time()
    }

    /// The node's data (slots, properties, layout)
    pub fn node(&self) -> Option<&Node> {
        self.graph.node(self.node_id)
    }

    /// The node's data, mutably
    pub fn node_mut(&mut self) -> Option<&mut Node> {
        self.graph.node_mut(self.node_id)
    }

    /// Number of input slots
    pub fn input_count(&self) -> usize {
        self.node().map_or(0, |n| n.inputs.len())
    }

    /// Number of output slots
    pub fn output_count(&self) -> usize {
        self.node().map_or(0, |n| n.outputs.len())
    }

    /// Value waiting on input slot `slot`
    pub fn input(&self, slot: usize) -> Option<&Value> {
        self.graph.input_value(self.node_id, slot)
    }

    /// Value waiting on the first input slot called `name`
    pub fn input_by_name(&self, name: &str) -> Option<&Value> {
        let slot = self.node()?.find_input(name)?;
        self.input(slot)
    }

    /// Whether a link feeds input slot `slot`
    pub fn is_input_connected(&self, slot: usize) -> bool {
        self.node()
            .and_then(|n| n.inputs.get(slot))
            .is_some_and(|s| s.is_connected())
    }

    /// Input `name` when linked and carrying a value, else property `name`
    pub fn input_or_property(&self, name: &str) -> Option<&Value> {
        self.input_by_name(name).or_else(|| self.property(name))
    }

    /// Read a property
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.node()?.property(name)
    }

    /// Write a property without running the change hook
    pub fn set_property(&mut self, name: &str, value: Value) {
        if let Some(node) = self.node_mut() {
            node.properties.insert(name.to_string(), value);
        }
    }

    /// Stage a value on output slot `slot`; out-of-range slots are ignored
    pub fn set_output(&mut self, slot: usize, value: Option<Value>) {
        if let Err(err) = self.graph.set_output_value(self.node_id, slot, value) {
            tracing::debug!("Ignoring output write: {err}");
        }
    }

    /// Fire the event links of output slot `slot`
    pub fn trigger(&mut self, slot: usize, param: Option<Value>) -> Result<()> {
        self.graph.propagate(self.node_id, slot, param, &mut *self.trace)
    }
}

impl Graph {
    /// Run `f` with the node's behavior checked out.
    ///
    /// Returns `None` when the node is missing or one of its hooks is
    /// already running.
    pub(crate) fn with_behavior<R>(
        &mut self,
        node_id: NodeId,
        trace: &mut TriggerTrace,
        f: impl FnOnce(&mut dyn NodeBehavior, &mut NodeContext<'_>) -> R,
    ) -> Option<R> {
        let mut behavior = self.nodes.get_mut(&node_id)?.behavior.take()?;
        let result = {
            let mut cx = NodeContext::new(self, node_id, trace);
            f(behavior.as_mut(), &mut cx)
        };
        if let Some(node) = self.nodes.get_mut(&node_id) {
            node.behavior = Some(behavior);
        }
        Some(result)
    }

    /// Evaluate one node now, whatever its mode
    pub fn execute_node(&mut self, node_id: NodeId) -> std::result::Result<(), NodeError> {
        if !self.contains_node(node_id) {
            return Err(GraphError::NodeNotFound(node_id).into());
        }
        let mut trace = TriggerTrace::default();
        match self.with_behavior(node_id, &mut trace, |behavior, cx| behavior.on_execute(cx)) {
            Some(result) => result,
            None => {
                tracing::warn!("Node {node_id} is already executing");
                Ok(())
            }
        }
    }

    /// Fire output slot `slot` of `node_id`, delivering `param` to every
    /// node reachable over event links
    pub fn trigger_slot(&mut self, node_id: NodeId, slot: usize, param: Option<Value>) -> Result<TriggerTrace> {
        let mut trace = TriggerTrace::default();
        self.propagate(node_id, slot, param, &mut trace)?;
        Ok(trace)
    }

    pub(crate) fn propagate(
        &mut self,
        node_id: NodeId,
        slot: usize,
        param: Option<Value>,
        trace: &mut TriggerTrace,
    ) -> Result<()> {
        let node = self.nodes.get(&node_id).ok_or(GraphError::NodeNotFound(node_id))?;
        let output = node
            .outputs
            .get(slot)
            .ok_or(GraphError::OutputSlotOutOfRange { node: node_id, slot })?;

        for link_id in output.links.clone() {
            let Some(link) = self.links.get(&link_id) else {
                tracing::warn!("Output {node_id}:{slot} references missing link {link_id}");
                continue;
            };
            if !link.carries_events() {
                continue;
            }
            if !trace.links.insert(link_id) {
                tracing::debug!("Link {link_id} already fired by this trigger");
                continue;
            }
            let (target, target_slot) = (link.target_id, link.target_slot);
            if !trace.nodes.insert(target) && self.config.event_guard == EventGuard::PerNode {
                tracing::debug!("Node {target} already reached by this trigger");
                continue;
            }
            self.deliver_action(target, target_slot, param.as_ref(), trace);
        }
        Ok(())
    }

    fn deliver_action(
        &mut self,
        target: NodeId,
        target_slot: usize,
        param: Option<&Value>,
        trace: &mut TriggerTrace,
    ) {
        let Some(node) = self.nodes.get(&target) else {
            tracing::warn!("Event link points at missing node {target}");
            return;
        };
        let mode = node.mode;
        if mode == NodeMode::Never {
            return;
        }
        let action = node
            .inputs
            .get(target_slot)
            .map(|s| s.name.clone())
            .unwrap_or_default();
        let type_name = node.type_name.clone();

        let outcome = self.with_behavior(target, trace, |behavior, cx| match mode {
            NodeMode::OnTrigger => behavior.on_execute(cx),
            _ => behavior.on_action(&action, param, cx),
        });
        match outcome {
            None => tracing::warn!("Node {target} is busy; dropped action {action:?}"),
            Some(Err(err)) => tracing::error!("Node {target} ({type_name}) failed on {action:?}: {err}"),
            Some(Ok(())) => {}
        }
    }

    /// Deliver an action to every boundary input node named `name`
    pub fn send_action(&mut self, name: &str, param: Option<Value>) {
        let targets: Vec<NodeId> = self
            .nodes
            .values()
            .filter(|n| {
                n.type_name == crate::boundary::GRAPH_INPUT_TYPE
                    && n.property("name").and_then(Value::as_str) == Some(name)
            })
            .map(|n| n.id)
            .collect();
        if targets.is_empty() {
            tracing::debug!("No graph input named {name:?}");
            return;
        }

        let mut trace = TriggerTrace::default();
        for target in targets {
            let outcome = self.with_behavior(target, &mut trace, |behavior, cx| {
                behavior.on_action(name, param.as_ref(), cx)
            });
            if let Some(Err(err)) = outcome {
                tracing::error!("Graph input {name:?} failed: {err}");
            }
        }
    }

    /// Hand a file to a node; returns whether the node used it
    pub fn drop_file(&mut self, node_id: NodeId, file: &DroppedFile) -> Result<bool> {
        if !self.contains_node(node_id) {
            return Err(GraphError::NodeNotFound(node_id));
        }
        let mut trace = TriggerTrace::default();
        Ok(self
            .with_behavior(node_id, &mut trace, |behavior, cx| behavior.on_drop_file(file, cx))
            .unwrap_or(false))
    }
}
