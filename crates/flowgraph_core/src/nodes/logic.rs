// SPDX-License-Identifier: MIT OR Apache-2.0
//! Boolean logic and flow control nodes.

use super::{number, truthy};
use crate::error::NodeError;
use crate::evaluation::NodeContext;
use crate::node::{Node, NodeBehavior, NodeMode, PropertyChange};
use crate::registry::{NodeCategory, NodeRegistry, NodeType};
use serde_json::Value;

/// Register the logic node types
pub fn register(registry: &mut NodeRegistry) {
    registry.register(NodeType::new(
        "logic/AND",
        "AND",
        NodeCategory::Logic,
        "Return true if all inputs are true",
        || {
            Node::new("logic/AND", And)
                .with_input("a", "boolean")
                .with_input("b", "boolean")
                .with_output("out", "boolean")
        },
    ));
    registry.register(NodeType::new(
        "logic/OR",
        "OR",
        NodeCategory::Logic,
        "Return true if at least one input is true",
        || {
            Node::new("logic/OR", Or)
                .with_input("a", "boolean")
                .with_input("b", "boolean")
                .with_output("out", "boolean")
        },
    ));
    registry.register(NodeType::new(
        "logic/NOT",
        "NOT",
        NodeCategory::Logic,
        "Return the logical negation",
        || {
            Node::new("logic/NOT", Not)
                .with_input("in", "boolean")
                .with_output("out", "boolean")
        },
    ));
    registry.register(NodeType::new(
        "logic/CompareBool",
        "bool == bool",
        NodeCategory::Logic,
        "Compare for logical equality",
        || {
            Node::new("logic/CompareBool", CompareBool)
                .with_input("a", "boolean")
                .with_input("b", "boolean")
                .with_output("out", "boolean")
        },
    ));
    registry.register(NodeType::new(
        "logic/selector",
        "Selector",
        NodeCategory::Logic,
        "Selects one of its inputs",
        Selector::node,
    ));
    registry.register(NodeType::new(
        "logic/sequence",
        "Sequence",
        NodeCategory::Logic,
        "Select one element from a comma separated sequence",
        Sequence::node,
    ));
    registry.register(NodeType::new(
        "logic/IF",
        "Branch",
        NodeCategory::Logic,
        "Branch execution on condition",
        || {
            Node::new("logic/IF", Branch)
                .with_input("onTrigger", "action")
                .with_input("condition", "boolean")
                .with_output("true", "event")
                .with_output("false", "event")
                .with_mode(NodeMode::OnTrigger)
        },
    ));
}

fn input_truths(cx: &NodeContext<'_>) -> Vec<bool> {
    (0..cx.input_count())
        .map(|slot| cx.input(slot).is_some_and(truthy))
        .collect()
}

/// True when every input is truthy
#[derive(Debug)]
pub struct And;

impl NodeBehavior for And {
    fn on_execute(&mut self, cx: &mut NodeContext<'_>) -> Result<(), NodeError> {
        let result = input_truths(cx).into_iter().all(|b| b);
        cx.set_output(0, Some(Value::Bool(result)));
        Ok(())
    }
}

/// True when any input is truthy
#[derive(Debug)]
pub struct Or;

impl NodeBehavior for Or {
    fn on_execute(&mut self, cx: &mut NodeContext<'_>) -> Result<(), NodeError> {
        let result = input_truths(cx).into_iter().any(|b| b);
        cx.set_output(0, Some(Value::Bool(result)));
        Ok(())
    }
}

/// Negation
#[derive(Debug)]
pub struct Not;

impl NodeBehavior for Not {
    fn on_execute(&mut self, cx: &mut NodeContext<'_>) -> Result<(), NodeError> {
        let result = !cx.input(0).is_some_and(truthy);
        cx.set_output(0, Some(Value::Bool(result)));
        Ok(())
    }
}

/// True when all inputs carry the same value
#[derive(Debug)]
pub struct CompareBool;

impl NodeBehavior for CompareBool {
    fn on_execute(&mut self, cx: &mut NodeContext<'_>) -> Result<(), NodeError> {
        let first = cx.input(0);
        let result = (1..cx.input_count()).all(|slot| cx.input(slot) == first);
        cx.set_output(0, Some(Value::Bool(result)));
        Ok(())
    }
}

/// Routes data input `round(sel) mod n` to its output.
///
/// Negative selectors wrap around, so `-1` picks the last data input.
#[derive(Debug, Default)]
pub struct Selector {
    selected: usize,
}

impl Selector {
    /// Build a selector with four data inputs
    pub fn node() -> Node {
        Node::new("logic/selector", Self::default())
            .with_input("sel", "number")
            .with_input("A", "")
            .with_input("B", "")
            .with_input("C", "")
            .with_input("D", "")
            .with_output("out", "")
    }
}

impl NodeBehavior for Selector {
    fn on_execute(&mut self, cx: &mut NodeContext<'_>) -> Result<(), NodeError> {
        let choices = cx.input_count().saturating_sub(1);
        if choices == 0 {
            return Ok(());
        }
        let sel = match cx.input(0) {
            None => 0.0,
            Some(value) => number(value).ok_or_else(|| NodeError::InvalidInput {
                slot: 0,
                reason: format!("selector {value} is not a number"),
            })?,
        }
        .round();
        #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap, clippy::cast_sign_loss)]
        let index = (sel as i64).rem_euclid(choices as i64) as usize;
        self.selected = index;

        if let Some(value) = cx.input(index + 1).cloned() {
            cx.set_output(0, Some(value));
        }
        Ok(())
    }
}

/// Picks one element of a comma separated list by index
#[derive(Debug)]
pub struct Sequence {
    values: Vec<String>,
    current: Option<String>,
}

impl Sequence {
    const DEFAULT: &'static str = "A,B,C";

    /// Build a sequence node over `A,B,C`
    pub fn node() -> Node {
        let behavior = Self {
            values: split(Self::DEFAULT),
            current: None,
        };
        Node::new("logic/sequence", behavior)
            .with_input("index", "number")
            .with_input("seq", "")
            .with_output("out", "")
            .with_property("sequence", Self::DEFAULT)
    }
}

fn split(list: &str) -> Vec<String> {
    list.split(',').map(str::to_string).collect()
}

impl NodeBehavior for Sequence {
    fn on_execute(&mut self, cx: &mut NodeContext<'_>) -> Result<(), NodeError> {
        if let Some(seq) = cx.input(1).and_then(Value::as_str) {
            if !seq.is_empty() && self.current.as_deref() != Some(seq) {
                self.values = split(seq);
                self.current = Some(seq.to_string());
            }
        }
        if self.values.is_empty() {
            return Ok(());
        }

        let index = cx.input(0).and_then(number).unwrap_or(0.0).round();
        #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap, clippy::cast_sign_loss)]
        let index = (index as i64).rem_euclid(self.values.len() as i64) as usize;
        let value = Value::String(self.values[index].clone());
        cx.set_output(0, Some(value));
        Ok(())
    }

    fn on_property_changed(&mut self, name: &str, value: &Value, _cx: &mut NodeContext<'_>) -> PropertyChange {
        if name == "sequence" {
            match value.as_str() {
                Some(list) => self.values = split(list),
                None => return PropertyChange::Reject,
            }
        }
        PropertyChange::Accept
    }
}

/// Fires `true` or `false` depending on its condition input when triggered
#[derive(Debug)]
pub struct Branch;

impl NodeBehavior for Branch {
    fn on_execute(&mut self, cx: &mut NodeContext<'_>) -> Result<(), NodeError> {
        let slot = if cx.input(1).is_some_and(truthy) { 0 } else { 1 };
        cx.trigger(slot, None)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Graph;
    use crate::node::NodeId;
    use crate::nodes::create_default_registry;

    fn constant(graph: &mut Graph, type_name: &str, value: Value) -> NodeId {
        let registry = create_default_registry();
        let mut node = registry.create_node(type_name).unwrap();
        node.properties.insert("value".to_string(), value);
        graph.add_node(node)
    }

    fn gate(graph: &mut Graph, type_name: &str, a: bool, b: bool) -> Option<Value> {
        let registry = create_default_registry();
        let x = constant(graph, "basic/boolean", Value::Bool(a));
        let y = constant(graph, "basic/boolean", Value::Bool(b));
        let gate = graph.add_node(registry.create_node(type_name).unwrap());
        graph.connect(x, 0, gate, 0).unwrap().unwrap();
        graph.connect(y, 0, gate, 1).unwrap().unwrap();
        graph.run_step(1);
        graph.output_value(gate, 0).cloned()
    }

    #[test]
    fn test_and_or() {
        assert_eq!(gate(&mut Graph::new(), "logic/AND", true, false), Some(Value::Bool(false)));
        assert_eq!(gate(&mut Graph::new(), "logic/AND", true, true), Some(Value::Bool(true)));
        assert_eq!(gate(&mut Graph::new(), "logic/OR", true, false), Some(Value::Bool(true)));
        assert_eq!(gate(&mut Graph::new(), "logic/OR", false, false), Some(Value::Bool(false)));
        assert_eq!(gate(&mut Graph::new(), "logic/CompareBool", true, true), Some(Value::Bool(true)));
        assert_eq!(gate(&mut Graph::new(), "logic/CompareBool", true, false), Some(Value::Bool(false)));
    }

    #[test]
    fn test_unconnected_inputs_are_false() {
        let registry = create_default_registry();
        let mut graph = Graph::new();
        let and = graph.add_node(registry.create_node("logic/AND").unwrap());
        let not = graph.add_node(registry.create_node("logic/NOT").unwrap());
        graph.run_step(1);
        assert_eq!(graph.output_value(and, 0), Some(&Value::Bool(false)));
        assert_eq!(graph.output_value(not, 0), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_selector_wraps() {
        let registry = create_default_registry();
        let mut graph = Graph::new();
        let sel = constant(&mut graph, "basic/const", Value::from(5));
        let a = constant(&mut graph, "basic/string", Value::from("a"));
        let b = constant(&mut graph, "basic/string", Value::from("b"));
        let selector = graph.add_node(registry.create_node("logic/selector").unwrap());
        graph.connect(sel, 0, selector, 0).unwrap().unwrap();
        graph.connect(a, 0, selector, 1).unwrap().unwrap();
        graph.connect(b, 0, selector, 2).unwrap().unwrap();

        graph.run_step(1);
        assert_eq!(graph.output_value(selector, 0), Some(&Value::from("b")));
    }

    #[test]
    fn test_selector_negative_wraps_to_last() {
        let registry = create_default_registry();
        let mut graph = Graph::new();
        let sel = constant(&mut graph, "basic/const", Value::from(-1));
        let a = constant(&mut graph, "basic/string", Value::from("a"));
        let d = constant(&mut graph, "basic/string", Value::from("d"));
        let selector = graph.add_node(registry.create_node("logic/selector").unwrap());
        graph.connect(sel, 0, selector, 0).unwrap().unwrap();
        graph.connect(a, 0, selector, 1).unwrap().unwrap();
        graph.connect(d, 0, selector, 4).unwrap().unwrap();

        graph.run_step(1);
        assert_eq!(graph.output_value(selector, 0), Some(&Value::from("d")));
    }

    #[test]
    fn test_selector_rejects_non_numeric() {
        let registry = create_default_registry();
        let mut graph = Graph::new();
        let word = constant(&mut graph, "basic/string", Value::from("x"));
        let cast = graph.add_node(registry.create_node("basic/cast").unwrap());
        let selector = graph.add_node(registry.create_node("logic/selector").unwrap());
        graph.connect(word, 0, cast, 0).unwrap().unwrap();
        graph.connect(cast, 0, selector, 0).unwrap().unwrap();

        graph.run_step(1);
        let err = graph.execute_node(selector).unwrap_err();
        assert!(matches!(err, NodeError::InvalidInput { slot: 0, .. }));
        assert_eq!(graph.output_value(selector, 0), None);
    }

    #[test]
    fn test_branch_fires_one_side() {
        let registry = create_default_registry();
        let mut graph = Graph::new();
        let cond = constant(&mut graph, "basic/boolean", Value::Bool(false));
        let source = graph.add_node(registry.create_node("logic/IF").unwrap());
        let branch = graph.add_node(registry.create_node("logic/IF").unwrap());
        let yes = graph.add_node(registry.create_node("basic/console").unwrap());
        let no = graph.add_node(registry.create_node("basic/console").unwrap());
        graph.connect(cond, 0, branch, 1).unwrap().unwrap();
        graph.connect(source, 1, branch, 0).unwrap().unwrap();
        graph.connect(branch, 0, yes, 0).unwrap().unwrap();
        graph.connect(branch, 1, no, 0).unwrap().unwrap();
        graph.run_step(1);

        let trace = graph.trigger_slot(source, 1, None).unwrap();
        assert!(trace.reached_nodes().contains(&branch));
        assert!(trace.reached_nodes().contains(&no));
        assert!(!trace.reached_nodes().contains(&yes));
    }

    #[test]
    fn test_sequence() {
        let registry = create_default_registry();
        let mut graph = Graph::new();
        let index = constant(&mut graph, "basic/const", Value::from(4));
        let seq = graph.add_node(registry.create_node("logic/sequence").unwrap());
        graph.connect(index, 0, seq, 0).unwrap().unwrap();

        graph.run_step(1);
        assert_eq!(graph.output_value(seq, 0), Some(&Value::from("B")));

        assert!(graph.set_property(seq, "sequence", Value::from("x,y")).unwrap());
        graph.run_step(1);
        assert_eq!(graph.output_value(seq, 0), Some(&Value::from("x")));
    }
}
