// SPDX-License-Identifier: MIT OR Apache-2.0
//! Built-in node library.
//!
//! Small nodes that exercise the execution contract: constants and sinks,
//! structured values and variables, boolean logic, event branching, and a
//! sandboxed script node.

pub mod basic;
pub mod logic;
pub mod objects;
pub mod script;

use crate::boundary::{GraphInputNode, GraphOutputNode, GRAPH_INPUT_TYPE, GRAPH_OUTPUT_TYPE};
use crate::registry::{NodeCategory, NodeRegistry, NodeType};
use crate::subgraph::{SubgraphNode, SUBGRAPH_TYPE};
use serde_json::Value;

/// Truthiness of a slot value: null, `false`, zero, NaN and the empty
/// string are false; everything else is true
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Numeric reading of a value; numeric strings are parsed
pub fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(f64::from(u8::from(*b))),
        _ => None,
    }
}

/// Short human-readable rendering used by watch labels and titles
pub fn display_value(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => "null".to_string(),
        Some(Value::Number(n)) => match n.as_f64() {
            Some(f) => format!("{f:.3}"),
            None => n.to_string(),
        },
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(items)) => {
            let items: Vec<String> = items.iter().map(|v| display_value(Some(v))).collect();
            format!("[{}]", items.join(","))
        }
        Some(other) => other.to_string(),
    }
}

fn register_graph_nodes(registry: &mut NodeRegistry) {
    registry.register(NodeType::new(
        SUBGRAPH_TYPE,
        "Subgraph",
        NodeCategory::Graph,
        "Graph inside a node",
        SubgraphNode::node,
    ));
    registry.register(NodeType::new(
        GRAPH_INPUT_TYPE,
        "Input",
        NodeCategory::Graph,
        "Named input of the owning graph",
        GraphInputNode::node,
    ));
    registry.register(NodeType::new(
        GRAPH_OUTPUT_TYPE,
        "Output",
        NodeCategory::Graph,
        "Named output of the owning graph",
        GraphOutputNode::node,
    ));
}

/// Registry holding every built-in node type
pub fn create_default_registry() -> NodeRegistry {
    let mut registry = NodeRegistry::new();
    register_graph_nodes(&mut registry);
    basic::register(&mut registry);
    objects::register(&mut registry);
    logic::register(&mut registry);
    script::register(&mut registry);
    tracing::debug!("Registered {} built-in node types", registry.types().count());
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_truthy() {
        assert!(!truthy(&Value::Null));
        assert!(!truthy(&json!(false)));
        assert!(!truthy(&json!(0)));
        assert!(!truthy(&json!("")));
        assert!(truthy(&json!(0.5)));
        assert!(truthy(&json!("no")));
        assert!(truthy(&json!([])));
    }

    #[test]
    fn test_number() {
        assert_eq!(number(&json!(2)), Some(2.0));
        assert_eq!(number(&json!(" 4.5 ")), Some(4.5));
        assert_eq!(number(&json!(true)), Some(1.0));
        assert_eq!(number(&json!("x")), None);
    }

    #[test]
    fn test_display_value() {
        assert_eq!(display_value(None), "null");
        assert_eq!(display_value(Some(&json!(1.5))), "1.500");
        assert_eq!(display_value(Some(&json!([1, "a"]))), "[1.000,a]");
        assert_eq!(display_value(Some(&json!(true))), "true");
    }

    #[test]
    fn test_default_registry() {
        let registry = create_default_registry();
        for id in [
            "graph/subgraph",
            "graph/input",
            "graph/output",
            "basic/time",
            "basic/const",
            "basic/boolean",
            "basic/string",
            "basic/data",
            "basic/file",
            "basic/watch",
            "basic/cast",
            "basic/console",
            "basic/alert",
            "basic/download",
            "basic/object",
            "basic/jsonparse",
            "basic/array",
            "basic/set_array",
            "basic/array[]",
            "basic/table[][]",
            "basic/object_property",
            "basic/object_keys",
            "basic/set_object",
            "basic/merge_objects",
            "basic/variable",
            "basic/script",
            "basic/CompareValues",
            "logic/AND",
            "logic/OR",
            "logic/NOT",
            "logic/CompareBool",
            "logic/selector",
            "logic/sequence",
            "logic/IF",
        ] {
            assert!(registry.contains(id), "missing {id}");
        }
        assert_eq!(registry.types_in_category(NodeCategory::Graph).count(), 3);
    }
}
