// SPDX-License-Identifier: MIT OR Apache-2.0
//! Subgraph nodes: a whole graph embedded as one node.
//!
//! The inner graph declares its boundary through `graph/input` and
//! `graph/output` nodes. Every edit to that boundary is queued as a
//! [`BoundaryEvent`] and replayed onto the owning node's slot list, so the
//! outer interface always mirrors the inner declaration. Nothing flows the
//! other way.

use crate::error::{GraphError, NodeError, Result};
use crate::evaluation::NodeContext;
use crate::graph::Graph;
use crate::node::{Node, NodeBehavior, NodeId};
use crate::nodes::truthy;
use crate::registry::NodeRegistry;
use crate::serialization::NodeData;
use crate::slot::SlotType;
use serde_json::Value;

/// Registry key of the subgraph node
pub const SUBGRAPH_TYPE: &str = "graph/subgraph";

/// A change to a graph's named boundary
#[derive(Debug, Clone, PartialEq)]
pub enum BoundaryEvent {
    /// Input declared (or redeclared with a new type)
    InputAdded {
        /// Input name
        name: String,
        /// Declared type
        slot_type: SlotType,
    },
    /// Input renamed
    InputRenamed {
        /// Previous name
        old: String,
        /// New name
        new: String,
    },
    /// Input type changed
    InputTypeChanged {
        /// Input name
        name: String,
        /// New type
        slot_type: SlotType,
    },
    /// Input removed
    InputRemoved {
        /// Input name
        name: String,
    },
    /// Output declared (or redeclared with a new type)
    OutputAdded {
        /// Output name
        name: String,
        /// Declared type
        slot_type: SlotType,
    },
    /// Output renamed
    OutputRenamed {
        /// Previous name
        old: String,
        /// New name
        new: String,
    },
    /// Output type changed
    OutputTypeChanged {
        /// Output name
        name: String,
        /// New type
        slot_type: SlotType,
    },
    /// Output removed
    OutputRemoved {
        /// Output name
        name: String,
    },
}

/// Node owning a nested graph
#[derive(Debug)]
pub struct SubgraphNode {
    graph: Graph,
}

impl SubgraphNode {
    /// Wrap an empty nested graph
    pub fn new() -> Self {
        Self {
            graph: Graph::new_nested(),
        }
    }

    /// Build a fresh `graph/subgraph` node
    pub fn node() -> Node {
        Node::new(SUBGRAPH_TYPE, Self::new())
            .with_title("Subgraph")
            .with_property("enabled", true)
            .with_size(140.0, 80.0)
    }

    /// Mirror queued boundary edits and re-emit triggered outputs
    fn sync(&mut self, cx: &mut NodeContext<'_>) -> Result<()> {
        let events = self.graph.take_boundary_events();
        let id = cx.id();
        cx.graph_mut().apply_boundary_events(id, &events)?;

        for triggered in self.graph.drain_triggered_outputs() {
            match cx.node().and_then(|n| n.find_output(&triggered.name)) {
                Some(slot) => cx.trigger(slot, triggered.param)?,
                None => tracing::warn!("Subgraph {id} has no output named {:?}", triggered.name),
            }
        }
        Ok(())
    }
}

impl Default for SubgraphNode {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeBehavior for SubgraphNode {
    fn on_execute(&mut self, cx: &mut NodeContext<'_>) -> std::result::Result<(), NodeError> {
        let enabled = cx.input_or_property("enabled").map_or(true, truthy);
        if !enabled {
            return Ok(());
        }

        let incoming: Vec<(String, Option<Value>)> = match cx.node() {
            Some(node) => node
                .inputs()
                .iter()
                .enumerate()
                .map(|(slot, input)| (input.name.clone(), cx.input(slot).cloned()))
                .collect(),
            None => Vec::new(),
        };
        for (name, value) in incoming {
            self.graph.set_boundary_input_value(&name, value);
        }

        self.graph.run_step(1);

        let outgoing: Vec<Option<Value>> = match cx.node() {
            Some(node) => node
                .outputs()
                .iter()
                .map(|slot| self.graph.boundary_output(&slot.name).and_then(|entry| entry.value.clone()))
                .collect(),
            None => Vec::new(),
        };
        for (slot, value) in outgoing.into_iter().enumerate() {
            cx.set_output(slot, value);
        }

        self.sync(cx)?;
        Ok(())
    }

    fn on_action(
        &mut self,
        action: &str,
        param: Option<&Value>,
        cx: &mut NodeContext<'_>,
    ) -> std::result::Result<(), NodeError> {
        self.graph.send_action(action, param.cloned());
        self.sync(cx)?;
        Ok(())
    }

    fn on_configure(
        &mut self,
        data: &NodeData,
        registry: &NodeRegistry,
        cx: &mut NodeContext<'_>,
    ) -> Result<()> {
        if let Some(inner) = &data.subgraph {
            self.graph.configure(inner, registry)?;
        }
        self.sync(cx)
    }

    fn on_serialize(&self, data: &mut NodeData) {
        data.subgraph = Some(Box::new(self.graph.serialize()));
    }

    fn subgraph(&self) -> Option<&Graph> {
        Some(&self.graph)
    }

    fn subgraph_mut(&mut self) -> Option<&mut Graph> {
        Some(&mut self.graph)
    }
}

impl Graph {
    /// Replay boundary edits of a nested graph onto the slots of the
    /// subgraph node `node_id`
    pub(crate) fn apply_boundary_events(&mut self, node_id: NodeId, events: &[BoundaryEvent]) -> Result<()> {
        for event in events {
            let node = self.nodes.get(&node_id).ok_or(GraphError::NodeNotFound(node_id))?;
            match event {
                BoundaryEvent::InputAdded { name, slot_type } => match node.find_input(name) {
                    Some(slot) => self.set_input_slot_type(node_id, slot, slot_type.clone())?,
                    None => {
                        self.add_input_slot(node_id, name, slot_type.clone())?;
                    }
                },
                BoundaryEvent::InputRenamed { old, new } => {
                    if let Some(slot) = node.find_input(old) {
                        if let Some(input) = self.nodes.get_mut(&node_id).and_then(|n| n.inputs.get_mut(slot)) {
                            input.name.clone_from(new);
                        }
                    }
                }
                BoundaryEvent::InputTypeChanged { name, slot_type } => {
                    if let Some(slot) = node.find_input(name) {
                        self.set_input_slot_type(node_id, slot, slot_type.clone())?;
                    }
                }
                BoundaryEvent::InputRemoved { name } => {
                    if let Some(slot) = node.find_input(name) {
                        self.remove_input_slot(node_id, slot)?;
                    }
                }
                BoundaryEvent::OutputAdded { name, slot_type } => match node.find_output(name) {
                    Some(slot) => self.set_output_slot_type(node_id, slot, slot_type.clone())?,
                    None => {
                        self.add_output_slot(node_id, name, slot_type.clone())?;
                    }
                },
                BoundaryEvent::OutputRenamed { old, new } => {
                    if let Some(slot) = node.find_output(old) {
                        if let Some(output) = self.nodes.get_mut(&node_id).and_then(|n| n.outputs.get_mut(slot)) {
                            output.name.clone_from(new);
                        }
                    }
                }
                BoundaryEvent::OutputTypeChanged { name, slot_type } => {
                    if let Some(slot) = node.find_output(name) {
                        self.set_output_slot_type(node_id, slot, slot_type.clone())?;
                    }
                }
                BoundaryEvent::OutputRemoved { name } => {
                    if let Some(slot) = node.find_output(name) {
                        self.remove_output_slot(node_id, slot)?;
                    }
                }
            }
            tracing::debug!("Mirrored {event:?} onto subgraph node {node_id}");
        }
        Ok(())
    }

    /// Edit the nested graph of subgraph node `node_id`.
    ///
    /// Boundary changes made inside `f` are mirrored onto the node's slots,
    /// and boundary outputs triggered inside are re-emitted on the node's
    /// matching output slots, before this returns.
    pub fn with_subgraph<R>(&mut self, node_id: NodeId, f: impl FnOnce(&mut Graph) -> R) -> Result<R> {
        let inner = self
            .nodes
            .get_mut(&node_id)
            .ok_or(GraphError::NodeNotFound(node_id))?
            .behavior
            .as_mut()
            .and_then(|behavior| behavior.subgraph_mut())
            .ok_or(GraphError::NotASubgraph(node_id))?;

        let result = f(inner);
        let events = inner.take_boundary_events();
        let triggered = inner.drain_triggered_outputs();

        self.apply_boundary_events(node_id, &events)?;
        for output in triggered {
            let slot = self.nodes.get(&node_id).and_then(|n| n.find_output(&output.name));
            match slot {
                Some(slot) => {
                    self.trigger_slot(node_id, slot, output.param)?;
                }
                None => tracing::warn!("Subgraph {node_id} has no output named {:?}", output.name),
            }
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::{GraphInputNode, GraphOutputNode};

    fn declare(graph: &mut Graph, node: Node, name: &str) -> NodeId {
        let id = graph.add_node(node);
        graph.set_property(id, "name", Value::from(name)).unwrap();
        id
    }

    #[test]
    fn test_boundary_mirrors_onto_outer_slots() {
        let mut graph = Graph::new();
        let sub = graph.add_node(SubgraphNode::node());

        let (input, output) = graph
            .with_subgraph(sub, |inner| {
                let input = declare(inner, GraphInputNode::node(), "a");
                let output = declare(inner, GraphOutputNode::node(), "result");
                (input, output)
            })
            .unwrap();

        let node = graph.node(sub).unwrap();
        assert_eq!(node.inputs().len(), 1);
        assert_eq!(node.input(0).unwrap().name, "a");
        assert_eq!(node.input(0).unwrap().slot_type, SlotType::named("number"));
        assert_eq!(node.output(0).unwrap().name, "result");

        graph
            .with_subgraph(sub, |inner| {
                inner.set_property(input, "name", Value::from("b")).unwrap();
                inner.set_property(input, "type", Value::from("string")).unwrap();
            })
            .unwrap();
        let node = graph.node(sub).unwrap();
        assert_eq!(node.input(0).unwrap().name, "b");
        assert_eq!(node.input(0).unwrap().slot_type, SlotType::named("string"));

        graph
            .with_subgraph(sub, |inner| {
                inner.remove_node(output).unwrap();
            })
            .unwrap();
        assert!(graph.node(sub).unwrap().outputs().is_empty());
    }

    #[test]
    fn test_removed_boundary_disconnects_outer_link() {
        let mut graph = Graph::new();
        let source = graph.add_node(GraphInputNode::node());
        let sub = graph.add_node(SubgraphNode::node());
        let inner_input = graph
            .with_subgraph(sub, |inner| declare(inner, GraphInputNode::node(), "a"))
            .unwrap();
        graph.connect(source, 0, sub, 0).unwrap().unwrap();
        assert_eq!(graph.link_count(), 1);

        graph
            .with_subgraph(sub, |inner| {
                inner.remove_node(inner_input).unwrap();
            })
            .unwrap();
        assert_eq!(graph.link_count(), 0);
        assert!(graph.node(sub).unwrap().inputs().is_empty());
        assert!(graph.node(source).unwrap().output(0).unwrap().links.is_empty());
    }

    #[test]
    fn test_with_subgraph_requires_subgraph() {
        let mut graph = Graph::new();
        let plain = graph.add_node(GraphInputNode::node());
        assert!(matches!(
            graph.with_subgraph(plain, |_| ()),
            Err(GraphError::NotASubgraph(_))
        ));
    }

    #[test]
    fn test_pass_copies_values_through() {
        let mut graph = Graph::new();
        let source = graph.add_node(GraphInputNode::node().with_property("value", 9));
        let sub = graph.add_node(SubgraphNode::node());
        graph
            .with_subgraph(sub, |inner| {
                let input = declare(inner, GraphInputNode::node(), "a");
                let output = declare(inner, GraphOutputNode::node(), "b");
                inner.connect(input, 0, output, 0).unwrap().unwrap();
            })
            .unwrap();
        graph.connect(source, 0, sub, 0).unwrap().unwrap();

        graph.run_step(1);
        assert_eq!(graph.output_value(sub, 0), Some(&Value::from(9)));
    }
}
