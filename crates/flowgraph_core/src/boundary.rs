// SPDX-License-Identifier: MIT OR Apache-2.0
//! Boundary declaration nodes.
//!
//! A `graph/input` node declares a named entry on the graph that owns it
//! and a `graph/output` node a named exit. Renaming, retyping or removing
//! the node edits the graph's boundary map, which a subgraph node in turn
//! mirrors onto its own slots.

use crate::error::{GraphError, NodeError};
use crate::evaluation::NodeContext;
use crate::node::{Node, NodeBehavior, PropertyChange};
use crate::registry::NodeRegistry;
use crate::serialization::NodeData;
use crate::slot::SlotType;
use serde_json::Value;

/// Registry key of the boundary input node
pub const GRAPH_INPUT_TYPE: &str = "graph/input";
/// Registry key of the boundary output node
pub const GRAPH_OUTPUT_TYPE: &str = "graph/output";

/// Names a boundary entry may not take
const RESERVED_NAME: &str = "enabled";

/// Slot type stored in a `type` property
fn declared_type(value: Option<&Value>) -> SlotType {
    match value {
        Some(Value::String(name)) => SlotType::parse(name),
        Some(Value::Number(n)) if n.as_i64() == Some(-1) => SlotType::Event,
        _ => SlotType::Any,
    }
}

fn collapsed_title(node: &Node) -> Option<String> {
    if !node.flags.collapsed {
        return None;
    }
    node.property("name").and_then(Value::as_str).map(str::to_string)
}

/// Declares a named input on its graph and emits the value fed into it
#[derive(Debug, Default)]
pub struct GraphInputNode {
    /// Name currently registered on the graph, empty until declared
    name_in_graph: String,
}

impl GraphInputNode {
    /// Build a fresh `graph/input` node
    pub fn node() -> Node {
        Node::new(GRAPH_INPUT_TYPE, Self::default())
            .with_title("Input")
            .with_output("", "number")
            .with_property("name", "")
            .with_property("type", "number")
            .with_property("value", 0)
            .with_size(180.0, 90.0)
    }

    fn update_type(&self, cx: &mut NodeContext<'_>) -> Result<(), GraphError> {
        let slot_type = declared_type(cx.property("type"));
        let id = cx.id();
        cx.graph_mut().set_output_slot_type(id, 0, slot_type.clone())?;
        if !self.name_in_graph.is_empty() {
            cx.graph_mut().set_boundary_input_type(&self.name_in_graph, slot_type);
        }
        Ok(())
    }
}

impl NodeBehavior for GraphInputNode {
    fn on_execute(&mut self, cx: &mut NodeContext<'_>) -> Result<(), NodeError> {
        let name = cx.property("name").and_then(Value::as_str).unwrap_or_default();
        let value = cx
            .graph()
            .boundary_input(name)
            .and_then(|entry| entry.value.clone())
            .or_else(|| cx.property("value").cloned());
        cx.set_output(0, value);
        Ok(())
    }

    fn on_action(
        &mut self,
        _action: &str,
        param: Option<&Value>,
        cx: &mut NodeContext<'_>,
    ) -> Result<(), NodeError> {
        if declared_type(cx.property("type")).is_event() {
            cx.trigger(0, param.cloned())?;
        }
        Ok(())
    }

    fn on_property_changed(&mut self, name: &str, value: &Value, cx: &mut NodeContext<'_>) -> PropertyChange {
        match name {
            "name" => {
                let Some(new_name) = value.as_str() else {
                    return PropertyChange::Reject;
                };
                if new_name.is_empty() || new_name == self.name_in_graph || new_name == RESERVED_NAME {
                    return PropertyChange::Reject;
                }
                let slot_type = declared_type(cx.property("type"));
                let graph = cx.graph_mut();
                if self.name_in_graph.is_empty() || graph.boundary_input(&self.name_in_graph).is_none() {
                    graph.add_boundary_input(new_name, slot_type, None);
                } else if !graph.rename_boundary_input(&self.name_in_graph, new_name) {
                    return PropertyChange::Reject;
                }
                self.name_in_graph = new_name.to_string();
                PropertyChange::Accept
            }
            "type" => match self.update_type(cx) {
                Ok(()) => PropertyChange::Accept,
                Err(err) => {
                    tracing::warn!("Cannot retype graph input {:?}: {err}", self.name_in_graph);
                    PropertyChange::Reject
                }
            },
            _ => PropertyChange::Accept,
        }
    }

    fn on_configure(
        &mut self,
        _data: &NodeData,
        _registry: &NodeRegistry,
        cx: &mut NodeContext<'_>,
    ) -> Result<(), GraphError> {
        self.update_type(cx)
    }

    fn on_removed(&mut self, cx: &mut NodeContext<'_>) {
        if !self.name_in_graph.is_empty() {
            cx.graph_mut().remove_boundary_input(&self.name_in_graph);
        }
    }

    fn title(&self, node: &Node) -> Option<String> {
        collapsed_title(node)
    }
}

/// Declares a named output on its graph and publishes the value fed into it
#[derive(Debug, Default)]
pub struct GraphOutputNode {
    name_in_graph: String,
}

impl GraphOutputNode {
    /// Build a fresh `graph/output` node
    pub fn node() -> Node {
        Node::new(GRAPH_OUTPUT_TYPE, Self::default())
            .with_title("Output")
            .with_input("", "")
            .with_property("name", "")
            .with_property("type", "")
            .with_size(180.0, 60.0)
    }

    fn update_type(&self, cx: &mut NodeContext<'_>) -> Result<(), GraphError> {
        let slot_type = declared_type(cx.property("type"));
        let id = cx.id();
        cx.graph_mut().set_input_slot_type(id, 0, slot_type.clone())?;
        if !self.name_in_graph.is_empty() {
            cx.graph_mut().set_boundary_output_type(&self.name_in_graph, slot_type);
        }
        Ok(())
    }
}

impl NodeBehavior for GraphOutputNode {
    fn on_execute(&mut self, cx: &mut NodeContext<'_>) -> Result<(), NodeError> {
        let value = cx.input(0).cloned();
        let name = cx.property("name").and_then(Value::as_str).unwrap_or_default().to_string();
        cx.graph_mut().set_boundary_output_value(&name, value);
        Ok(())
    }

    fn on_action(
        &mut self,
        _action: &str,
        param: Option<&Value>,
        cx: &mut NodeContext<'_>,
    ) -> Result<(), NodeError> {
        if declared_type(cx.property("type")).is_event() {
            let name = cx.property("name").and_then(Value::as_str).unwrap_or_default().to_string();
            cx.graph_mut().trigger_output(&name, param.cloned());
        }
        Ok(())
    }

    fn on_property_changed(&mut self, name: &str, value: &Value, cx: &mut NodeContext<'_>) -> PropertyChange {
        match name {
            "name" => {
                let Some(new_name) = value.as_str() else {
                    return PropertyChange::Reject;
                };
                if new_name.is_empty() || new_name == self.name_in_graph || new_name == RESERVED_NAME {
                    return PropertyChange::Reject;
                }
                let slot_type = declared_type(cx.property("type"));
                let graph = cx.graph_mut();
                if self.name_in_graph.is_empty() || graph.boundary_output(&self.name_in_graph).is_none() {
                    graph.add_boundary_output(new_name, slot_type, None);
                } else if !graph.rename_boundary_output(&self.name_in_graph, new_name) {
                    return PropertyChange::Reject;
                }
                self.name_in_graph = new_name.to_string();
                PropertyChange::Accept
            }
            "type" => match self.update_type(cx) {
                Ok(()) => PropertyChange::Accept,
                Err(err) => {
                    tracing::warn!("Cannot retype graph output {:?}: {err}", self.name_in_graph);
                    PropertyChange::Reject
                }
            },
            _ => PropertyChange::Accept,
        }
    }

    fn on_configure(
        &mut self,
        _data: &NodeData,
        _registry: &NodeRegistry,
        cx: &mut NodeContext<'_>,
    ) -> Result<(), GraphError> {
        self.update_type(cx)
    }

    fn on_removed(&mut self, cx: &mut NodeContext<'_>) {
        if !self.name_in_graph.is_empty() {
            cx.graph_mut().remove_boundary_output(&self.name_in_graph);
        }
    }

    fn title(&self, node: &Node) -> Option<String> {
        collapsed_title(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Graph;

    #[test]
    fn test_input_declares_and_renames() {
        let mut graph = Graph::new();
        let input = graph.add_node(GraphInputNode::node());
        assert!(graph.boundary_inputs().is_empty());

        assert!(graph.set_property(input, "name", Value::from("speed")).unwrap());
        assert_eq!(
            graph.boundary_input("speed").unwrap().slot_type,
            SlotType::named("number")
        );

        assert!(graph.set_property(input, "name", Value::from("velocity")).unwrap());
        assert!(graph.boundary_input("speed").is_none());
        assert!(graph.boundary_input("velocity").is_some());
    }

    #[test]
    fn test_input_rejects_reserved_names() {
        let mut graph = Graph::new();
        let input = graph.add_node(GraphInputNode::node());
        graph.set_property(input, "name", Value::from("a")).unwrap();

        assert!(!graph.set_property(input, "name", Value::from("")).unwrap());
        assert!(!graph.set_property(input, "name", Value::from("enabled")).unwrap());
        assert!(!graph.set_property(input, "name", Value::from("a")).unwrap());
        assert_eq!(graph.node(input).unwrap().property("name"), Some(&Value::from("a")));
        assert_eq!(graph.boundary_inputs().len(), 1);
    }

    #[test]
    fn test_input_emits_boundary_or_default_value() {
        let mut graph = Graph::new();
        let input = graph.add_node(GraphInputNode::node().with_property("value", 7));
        graph.set_property(input, "name", Value::from("x")).unwrap();

        graph.run_step(1);
        assert_eq!(graph.output_value(input, 0), Some(&Value::from(7)));

        graph.set_boundary_input_value("x", Some(Value::from(2)));
        graph.run_step(1);
        assert_eq!(graph.output_value(input, 0), Some(&Value::from(2)));
    }

    #[test]
    fn test_input_retype_updates_slot_and_boundary() {
        let mut graph = Graph::new();
        let input = graph.add_node(GraphInputNode::node());
        graph.set_property(input, "name", Value::from("go")).unwrap();
        graph.set_property(input, "type", Value::from("event")).unwrap();

        assert_eq!(graph.node(input).unwrap().output(0).unwrap().slot_type, SlotType::Event);
        assert_eq!(graph.boundary_input("go").unwrap().slot_type, SlotType::Event);
    }

    #[test]
    fn test_removal_drops_boundary_entry() {
        let mut graph = Graph::new();
        let input = graph.add_node(GraphInputNode::node());
        let output = graph.add_node(GraphOutputNode::node());
        graph.set_property(input, "name", Value::from("in")).unwrap();
        graph.set_property(output, "name", Value::from("out")).unwrap();

        graph.remove_node(input).unwrap();
        graph.remove_node(output).unwrap();
        assert!(graph.boundary_inputs().is_empty());
        assert!(graph.boundary_outputs().is_empty());
    }

    #[test]
    fn test_output_publishes_input_value() {
        let mut graph = Graph::new();
        let input = graph.add_node(GraphInputNode::node().with_property("value", 4));
        let output = graph.add_node(GraphOutputNode::node());
        graph.set_property(input, "name", Value::from("in")).unwrap();
        graph.set_property(output, "name", Value::from("out")).unwrap();
        graph.connect(input, 0, output, 0).unwrap().unwrap();

        graph.run_step(1);
        assert_eq!(graph.boundary_output("out").unwrap().value, Some(Value::from(4)));
    }

    #[test]
    fn test_collapsed_title_shows_name() {
        let mut graph = Graph::new();
        let input = graph.add_node(GraphInputNode::node());
        graph.set_property(input, "name", Value::from("speed")).unwrap();
        assert_eq!(graph.node(input).unwrap().display_title(), "Input");

        graph.node_mut(input).unwrap().flags.collapsed = true;
        assert_eq!(graph.node(input).unwrap().display_title(), "speed");
    }
}
