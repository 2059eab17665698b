// SPDX-License-Identifier: MIT OR Apache-2.0
//! Structured values: objects, arrays, tables and variables.
//!
//! Slot values are plain JSON, so these nodes edit copies: a `set_*` node
//! outputs the changed value and never touches what its upstream staged.

use super::number;
use crate::error::NodeError;
use crate::evaluation::NodeContext;
use crate::node::{Node, NodeBehavior, PropertyChange};
use crate::registry::{NodeCategory, NodeRegistry, NodeType};
use serde_json::{Map, Value};

/// Register the object, array and variable node types
pub fn register(registry: &mut NodeRegistry) {
    registry.register(NodeType::new(
        "basic/object",
        "Const Object",
        NodeCategory::Input,
        "Constant object",
        || {
            Node::new("basic/object", ConstObject::default())
                .with_output("obj", "object")
                .with_size(120.0, 30.0)
        },
    ));
    registry.register(NodeType::new(
        "basic/jsonparse",
        "JSON Parse",
        NodeCategory::Utility,
        "Parse a JSON string into an object",
        || {
            Node::new("basic/jsonparse", JsonParse::default())
                .with_input("parse", "action")
                .with_input("json", "string")
                .with_output("done", "event")
                .with_output("object", "object")
        },
    ));
    registry.register(NodeType::new(
        "basic/array",
        "Const Array",
        NodeCategory::Input,
        "Constant array",
        || {
            Node::new("basic/array", ConstArray::default())
                .with_input("json", "")
                .with_output("arrayOut", "array")
                .with_output("length", "number")
                .with_property("value", "[]")
                .with_size(140.0, 50.0)
        },
    ));
    registry.register(NodeType::new(
        "basic/set_array",
        "Set Array",
        NodeCategory::Utility,
        "Set one element of an array",
        || {
            Node::new("basic/set_array", SetArray)
                .with_input("arr", "array")
                .with_input("value", "")
                .with_output("arr", "array")
                .with_property("index", 0)
        },
    ));
    registry.register(NodeType::new(
        "basic/array[]",
        "Array[i]",
        NodeCategory::Utility,
        "Element of an array or character of a string",
        || {
            Node::new("basic/array[]", ArrayElement)
                .with_input("array", "array,table,string")
                .with_input("index", "number")
                .with_output("value", "")
                .with_property("index", 0)
        },
    ));
    registry.register(NodeType::new(
        "basic/table[][]",
        "Table[row][col]",
        NodeCategory::Utility,
        "Cell of a table",
        || {
            Node::new("basic/table[][]", TableElement)
                .with_input("table", "table")
                .with_input("row", "number")
                .with_input("col", "number")
                .with_output("value", "")
                .with_property("row", 0)
                .with_property("column", 0)
        },
    ));
    registry.register(NodeType::new(
        "basic/object_property",
        "Object property",
        NodeCategory::Utility,
        "Property of an object",
        || {
            Node::new("basic/object_property", ObjectProperty)
                .with_input("obj", "object")
                .with_output("property", "")
                .with_property("value", "")
                .with_size(140.0, 30.0)
        },
    ));
    registry.register(NodeType::new(
        "basic/object_keys",
        "Object keys",
        NodeCategory::Utility,
        "Keys of an object",
        || {
            Node::new("basic/object_keys", ObjectKeys)
                .with_input("obj", "")
                .with_output("keys", "array")
                .with_size(140.0, 30.0)
        },
    ));
    registry.register(NodeType::new(
        "basic/set_object",
        "Set Object",
        NodeCategory::Utility,
        "Set one property of an object",
        || {
            Node::new("basic/set_object", SetObject)
                .with_input("obj", "")
                .with_input("value", "")
                .with_output("obj", "")
                .with_property("property", "")
        },
    ));
    registry.register(NodeType::new(
        "basic/merge_objects",
        "Merge Objects",
        NodeCategory::Utility,
        "Accumulate the properties of two objects",
        || {
            Node::new("basic/merge_objects", MergeObjects::default())
                .with_input("A", "object")
                .with_input("B", "object")
                .with_input("clear", "action")
                .with_output("out", "object")
        },
    ));
    registry.register(NodeType::new(
        "basic/variable",
        "Variable",
        NodeCategory::Utility,
        "Store or read a named variable",
        || {
            Node::new("basic/variable", Variable)
                .with_input("in", "")
                .with_output("out", "")
                .with_property("varname", "myname")
                .with_property("container", "global")
                .with_size(60.0, 30.0)
        },
    ));
}

/// Non-negative integer index; fractions are floored
fn index(value: &Value) -> Option<usize> {
    let n = number(value)?.floor();
    if n < 0.0 || !n.is_finite() {
        return None;
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let at = n as usize;
    Some(at)
}

/// Index from input `slot` when fed, else from property `name`
fn index_input(cx: &NodeContext<'_>, slot: usize, name: &str) -> Option<usize> {
    cx.input(slot).or_else(|| cx.property(name)).and_then(index)
}

fn not_a(slot: usize, expected: &str, value: &Value) -> NodeError {
    NodeError::InvalidInput {
        slot,
        reason: format!("expected {expected}, got {value}"),
    }
}

/// Emits an object it owns
#[derive(Debug, Default)]
pub struct ConstObject {
    object: Map<String, Value>,
}

impl NodeBehavior for ConstObject {
    fn on_execute(&mut self, cx: &mut NodeContext<'_>) -> Result<(), NodeError> {
        cx.set_output(0, Some(Value::Object(self.object.clone())));
        Ok(())
    }
}

/// Parses its `json` input when told to and fires `done` on success
#[derive(Debug, Default)]
pub struct JsonParse {
    parsed: Option<Value>,
}

impl JsonParse {
    fn parse(&mut self, cx: &mut NodeContext<'_>) -> Result<(), NodeError> {
        let Some(text) = cx.input(1).and_then(Value::as_str) else {
            return Ok(());
        };
        match serde_json::from_str(text) {
            Ok(parsed) => {
                self.parsed = Some(parsed);
                cx.trigger(0, None)?;
            }
            Err(err) => tracing::warn!("Node {} could not parse its input: {err}", cx.id()),
        }
        Ok(())
    }
}

impl NodeBehavior for JsonParse {
    fn on_execute(&mut self, cx: &mut NodeContext<'_>) -> Result<(), NodeError> {
        cx.set_output(1, self.parsed.clone());
        Ok(())
    }

    fn on_action(&mut self, action: &str, _param: Option<&Value>, cx: &mut NodeContext<'_>) -> Result<(), NodeError> {
        if action == "parse" {
            self.parse(cx)?;
        }
        Ok(())
    }
}

/// Emits the array held in its `value` property, or a copy of a non-empty
/// array fed into `json`
#[derive(Debug, Default)]
pub struct ConstArray {
    value: Vec<Value>,
}

impl NodeBehavior for ConstArray {
    fn on_execute(&mut self, cx: &mut NodeContext<'_>) -> Result<(), NodeError> {
        if let Some(Value::Array(items)) = cx.input(0) {
            if !items.is_empty() {
                self.value.clone_from(items);
            }
        }
        cx.set_output(0, Some(Value::Array(self.value.clone())));
        cx.set_output(1, Some(Value::from(self.value.len())));
        Ok(())
    }

    fn on_property_changed(&mut self, name: &str, value: &Value, cx: &mut NodeContext<'_>) -> PropertyChange {
        if name != "value" {
            return PropertyChange::Accept;
        }
        match value {
            Value::String(text) if text.trim().is_empty() => {}
            Value::String(text) => {
                // Bare lists like `1, 2, 3` are accepted too
                let text = text.trim();
                let parsed = if text.starts_with('[') {
                    serde_json::from_str::<Vec<Value>>(text)
                } else {
                    serde_json::from_str::<Vec<Value>>(&format!("[{text}]"))
                };
                match parsed {
                    Ok(items) => self.value = items,
                    Err(err) => tracing::warn!("Node {} holds an invalid array: {err}", cx.id()),
                }
            }
            Value::Array(items) => self.value.clone_from(items),
            _ => return PropertyChange::Reject,
        }
        PropertyChange::Accept
    }
}

/// Writes `value` at position `index`, growing the array with nulls
#[derive(Debug)]
pub struct SetArray;

impl NodeBehavior for SetArray {
    fn on_execute(&mut self, cx: &mut NodeContext<'_>) -> Result<(), NodeError> {
        let mut items = match cx.input(0) {
            None | Some(Value::Null) => return Ok(()),
            Some(Value::Array(items)) => items.clone(),
            Some(other) => return Err(not_a(0, "an array", other)),
        };
        let Some(value) = cx.input(1).cloned() else {
            return Ok(());
        };
        let Some(at) = cx.property("index").and_then(index) else {
            return Err(NodeError::Custom("index property is not a non-negative number".to_string()));
        };

        if at >= items.len() {
            items.resize(at + 1, Value::Null);
        }
        items[at] = value;
        cx.set_output(0, Some(Value::Array(items)));
        Ok(())
    }
}

/// Element `index` of an array, or character `index` of a string
#[derive(Debug)]
pub struct ArrayElement;

impl NodeBehavior for ArrayElement {
    fn on_execute(&mut self, cx: &mut NodeContext<'_>) -> Result<(), NodeError> {
        let Some(container) = cx.input(0) else {
            return Ok(());
        };
        let Some(at) = index_input(cx, 1, "index") else {
            return Ok(());
        };
        let element = match container {
            Value::Array(items) => items.get(at).cloned(),
            Value::String(text) => text.chars().nth(at).map(|c| Value::String(c.to_string())),
            _ => None,
        };
        cx.set_output(0, element);
        Ok(())
    }
}

/// Cell `[row][col]` of an array of arrays; null when the row is missing
#[derive(Debug)]
pub struct TableElement;

impl NodeBehavior for TableElement {
    fn on_execute(&mut self, cx: &mut NodeContext<'_>) -> Result<(), NodeError> {
        let Some(table) = cx.input(0) else {
            return Ok(());
        };
        let (Some(row), Some(col)) = (index_input(cx, 1, "row"), index_input(cx, 2, "column")) else {
            return Ok(());
        };
        let cell = match table.as_array().and_then(|rows| rows.get(row)) {
            Some(Value::Array(cells)) => cells.get(col).cloned(),
            Some(_) => None,
            None => Some(Value::Null),
        };
        cx.set_output(0, cell);
        Ok(())
    }
}

/// Property key from a string or numeric property value
fn key(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

/// Emits the property named by its `value` property
#[derive(Debug)]
pub struct ObjectProperty;

impl NodeBehavior for ObjectProperty {
    fn on_execute(&mut self, cx: &mut NodeContext<'_>) -> Result<(), NodeError> {
        let Some(data) = cx.input(0) else {
            return Ok(());
        };
        let name = key(cx.property("value"));
        let property = match data {
            Value::Object(map) => map.get(&name).cloned(),
            Value::Array(items) => name.parse::<usize>().ok().and_then(|i| items.get(i)).cloned(),
            _ => None,
        };
        cx.set_output(0, property);
        Ok(())
    }

    fn title(&self, node: &Node) -> Option<String> {
        node.flags
            .collapsed
            .then(|| format!("in.{}", key(node.property("value"))))
    }
}

/// Keys of an object; indices, as strings, of an array or string
#[derive(Debug)]
pub struct ObjectKeys;

impl NodeBehavior for ObjectKeys {
    fn on_execute(&mut self, cx: &mut NodeContext<'_>) -> Result<(), NodeError> {
        let Some(data) = cx.input(0) else {
            return Ok(());
        };
        let keys: Vec<Value> = match data {
            Value::Object(map) => map.keys().cloned().map(Value::String).collect(),
            Value::Array(items) => (0..items.len()).map(|i| Value::String(i.to_string())).collect(),
            Value::String(text) => (0..text.chars().count()).map(|i| Value::String(i.to_string())).collect(),
            _ => Vec::new(),
        };
        cx.set_output(0, Some(Value::Array(keys)));
        Ok(())
    }
}

/// Sets the property named by its `property` property
#[derive(Debug)]
pub struct SetObject;

impl NodeBehavior for SetObject {
    fn on_execute(&mut self, cx: &mut NodeContext<'_>) -> Result<(), NodeError> {
        let mut object = match cx.input(0) {
            None | Some(Value::Null) => return Ok(()),
            Some(Value::Object(map)) => map.clone(),
            Some(other) => return Err(not_a(0, "an object", other)),
        };
        let Some(value) = cx.input(1).cloned() else {
            return Ok(());
        };
        let name = key(cx.property("property"));
        if !name.is_empty() {
            object.insert(name, value);
        }
        cx.set_output(0, Some(Value::Object(object)));
        Ok(())
    }
}

/// Copies the properties of `A` then `B` into an object kept across passes
#[derive(Debug, Default)]
pub struct MergeObjects {
    result: Map<String, Value>,
}

impl NodeBehavior for MergeObjects {
    fn on_execute(&mut self, cx: &mut NodeContext<'_>) -> Result<(), NodeError> {
        for slot in 0..2 {
            match cx.input(slot) {
                Some(Value::Object(map)) => {
                    for (name, value) in map {
                        self.result.insert(name.clone(), value.clone());
                    }
                }
                None | Some(Value::Null) => {}
                Some(other) => return Err(not_a(slot, "an object", other)),
            }
        }
        cx.set_output(0, Some(Value::Object(self.result.clone())));
        Ok(())
    }

    fn on_action(&mut self, action: &str, _param: Option<&Value>, _cx: &mut NodeContext<'_>) -> Result<(), NodeError> {
        if action == "clear" {
            self.result.clear();
        }
        Ok(())
    }
}

/// Where a variable node keeps its value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Container {
    /// Local to the graph holding the node
    Graph,
    /// The shared scope handed down from the root graph
    Global,
}

impl Container {
    fn from_property(value: Option<&Value>) -> Self {
        match value {
            Some(Value::String(s)) if s == "graph" => Self::Graph,
            Some(Value::Number(n)) if n.as_u64() == Some(1) => Self::Graph,
            _ => Self::Global,
        }
    }
}

/// Stores its input under `varname` when fed, otherwise emits the stored
/// value
#[derive(Debug)]
pub struct Variable;

impl NodeBehavior for Variable {
    fn on_execute(&mut self, cx: &mut NodeContext<'_>) -> Result<(), NodeError> {
        let name = key(cx.property("varname"));
        let container = Container::from_property(cx.property("container"));

        if cx.is_input_connected(0) {
            let value = cx.input(0).cloned();
            match (container, value.clone()) {
                (Container::Graph, Some(v)) => cx.graph_mut().set_var(&name, v),
                (Container::Graph, None) => {
                    cx.graph_mut().remove_var(&name);
                }
                (Container::Global, Some(v)) => {
                    cx.graph().globals().set(&name, v);
                }
                (Container::Global, None) => {
                    cx.graph().globals().remove(&name);
                }
            }
            cx.set_output(0, value);
            return Ok(());
        }

        let value = match container {
            Container::Graph => cx.graph().var(&name).cloned(),
            Container::Global => cx.graph().globals().get(&name),
        };
        cx.set_output(0, value);
        Ok(())
    }

    fn title(&self, node: &Node) -> Option<String> {
        Some(key(node.property("varname")))
    }
}
