// SPDX-License-Identifier: MIT OR Apache-2.0
//! Constants, sources and sinks.

use super::{display_value, number, truthy};
use crate::error::NodeError;
use crate::evaluation::NodeContext;
use crate::node::{DroppedFile, Node, NodeBehavior, NodeMode, PropertyChange};
use crate::registry::{NodeCategory, NodeRegistry, NodeType};
use parking_lot::Mutex;
use serde_json::Value;
use std::cmp::Ordering;
use std::path::PathBuf;
use std::sync::Arc;

/// Register the basic node types
pub fn register(registry: &mut NodeRegistry) {
    registry.register(NodeType::new(
        "basic/time",
        "Time",
        NodeCategory::Input,
        "Graph clock in milliseconds and seconds",
        || {
            Node::new("basic/time", Time)
                .with_output("in ms", "number")
                .with_output("in sec", "number")
        },
    ));
    registry.register(NodeType::new(
        "basic/const",
        "Const Number",
        NodeCategory::Input,
        "Constant number",
        || {
            Node::new("basic/const", ConstNumber)
                .with_output("value", "number")
                .with_property("value", 1.0)
                .with_size(180.0, 30.0)
        },
    ));
    registry.register(NodeType::new(
        "basic/boolean",
        "Const Boolean",
        NodeCategory::Input,
        "Constant boolean, flipped by its toggle action",
        || {
            Node::new("basic/boolean", ConstBoolean)
                .with_input("toggle", "action")
                .with_output("bool", "boolean")
                .with_property("value", true)
        },
    ));
    registry.register(NodeType::new(
        "basic/string",
        "Const String",
        NodeCategory::Input,
        "Constant string",
        || {
            Node::new("basic/string", ConstString)
                .with_output("string", "string")
                .with_property("value", "")
        },
    ));
    registry.register(NodeType::new(
        "basic/data",
        "Const Data",
        NodeCategory::Input,
        "Constant object parsed from JSON",
        || {
            Node::new("basic/data", ConstData::default())
                .with_output("data", "object")
                .with_property("value", "")
        },
    ));
    registry.register(NodeType::new(
        "basic/file",
        "Const File",
        NodeCategory::Input,
        "Contents of a local file",
        || {
            Node::new("basic/file", ConstFile::default())
                .with_input("url", "")
                .with_output("file", "")
                .with_property("url", "")
                .with_property("type", "text")
        },
    ));
    registry.register(NodeType::new(
        "basic/watch",
        "Watch",
        NodeCategory::Output,
        "Show the value of its input",
        || {
            Node::new("basic/watch", Watch::default())
                .with_input("value", "")
                .with_size(60.0, 30.0)
        },
    ));
    registry.register(NodeType::new(
        "basic/cast",
        "Cast",
        NodeCategory::Utility,
        "Pass its input through untyped",
        || {
            Node::new("basic/cast", Cast)
                .with_input("in", "")
                .with_output("out", "")
        },
    ));
    registry.register(NodeType::new(
        "basic/console",
        "Console",
        NodeCategory::Output,
        "Write a message to the log",
        || {
            Node::new("basic/console", Console)
                .with_input("log", "action")
                .with_input("msg", "")
                .with_property("msg", "")
                .with_mode(NodeMode::OnEvent)
        },
    ));
    registry.register(NodeType::new(
        "basic/alert",
        "Alert",
        NodeCategory::Output,
        "Raise a warning when it receives an action",
        || {
            Node::new("basic/alert", Alert)
                .with_input("", "event")
                .with_property("msg", "")
                .with_mode(NodeMode::OnEvent)
                .with_size(200.0, 30.0)
        },
    ));
    registry.register(NodeType::new(
        "basic/download",
        "Download",
        NodeCategory::Output,
        "Write its input to a file when it receives an action",
        || {
            Node::new("basic/download", Download::default())
                .with_input("data", "")
                .with_input("download", "action")
                .with_property("filename", "data.json")
                .with_size(60.0, 30.0)
        },
    ));
    registry.register(NodeType::new(
        "basic/CompareValues",
        "Compare *",
        NodeCategory::Logic,
        "Compare two values of any type",
        || {
            Node::new("basic/CompareValues", CompareValues)
                .with_input("A", "")
                .with_input("B", "")
                .with_output("true", "boolean")
                .with_output("false", "boolean")
                .with_property("A", 1)
                .with_property("B", 1)
                .with_property("OP", "==")
        },
    ));
}

/// Graph clock
#[derive(Debug)]
pub struct Time;

impl NodeBehavior for Time {
    fn on_execute(&mut self, cx: &mut NodeContext<'_>) -> Result<(), NodeError> {
        let seconds = cx.global_time();
        cx.set_output(0, Some(Value::from(seconds * 1000.0)));
        cx.set_output(1, Some(Value::from(seconds)));
        Ok(())
    }
}

/// Emits its `value` property as a number
#[derive(Debug)]
pub struct ConstNumber;

impl NodeBehavior for ConstNumber {
    fn on_execute(&mut self, cx: &mut NodeContext<'_>) -> Result<(), NodeError> {
        let value = cx.property("value").and_then(number).unwrap_or(0.0);
        cx.set_output(0, Some(Value::from(value)));
        Ok(())
    }

    fn title(&self, node: &Node) -> Option<String> {
        node.flags
            .collapsed
            .then(|| display_value(node.property("value")))
    }
}

/// Emits its `value` property as a boolean
#[derive(Debug)]
pub struct ConstBoolean;

impl NodeBehavior for ConstBoolean {
    fn on_execute(&mut self, cx: &mut NodeContext<'_>) -> Result<(), NodeError> {
        let value = cx.property("value").is_some_and(truthy);
        cx.set_output(0, Some(Value::Bool(value)));
        Ok(())
    }

    fn on_action(
        &mut self,
        _action: &str,
        _param: Option<&Value>,
        cx: &mut NodeContext<'_>,
    ) -> Result<(), NodeError> {
        let flipped = !cx.property("value").is_some_and(truthy);
        cx.set_property("value", Value::Bool(flipped));
        Ok(())
    }
}

/// Emits its `value` property unchanged
#[derive(Debug)]
pub struct ConstString;

impl NodeBehavior for ConstString {
    fn on_execute(&mut self, cx: &mut NodeContext<'_>) -> Result<(), NodeError> {
        let value = cx.property("value").cloned();
        cx.set_output(0, value);
        Ok(())
    }

    fn on_drop_file(&mut self, file: &DroppedFile, cx: &mut NodeContext<'_>) -> bool {
        cx.set_property("value", Value::String(file.text()));
        true
    }
}

/// Emits the JSON document held in its `value` property
#[derive(Debug, Default)]
pub struct ConstData {
    parsed: Option<Value>,
}

impl NodeBehavior for ConstData {
    fn on_execute(&mut self, cx: &mut NodeContext<'_>) -> Result<(), NodeError> {
        cx.set_output(0, self.parsed.clone());
        Ok(())
    }

    fn on_property_changed(&mut self, name: &str, value: &Value, cx: &mut NodeContext<'_>) -> PropertyChange {
        if name != "value" {
            return PropertyChange::Accept;
        }
        self.parsed = match value {
            Value::String(text) if text.is_empty() => None,
            Value::String(text) => match serde_json::from_str(text) {
                Ok(parsed) => Some(parsed),
                Err(err) => {
                    tracing::warn!("Node {} holds invalid JSON: {err}", cx.id());
                    None
                }
            },
            other => Some(other.clone()),
        };
        PropertyChange::Accept
    }
}

/// How `basic/file` decodes what it reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileKind {
    Text,
    Json,
    Bytes,
}

impl FileKind {
    fn from_property(value: Option<&Value>) -> Self {
        match value.and_then(Value::as_str) {
            Some("json") => Self::Json,
            Some("arraybuffer" | "bytes") => Self::Bytes,
            _ => Self::Text,
        }
    }

    fn decode(self, contents: &[u8]) -> Result<Value, String> {
        match self {
            Self::Text => Ok(Value::String(String::from_utf8_lossy(contents).into_owned())),
            Self::Json => serde_json::from_slice(contents).map_err(|e| e.to_string()),
            Self::Bytes => Ok(Value::Array(contents.iter().map(|b| Value::from(*b)).collect())),
        }
    }
}

#[derive(Debug, Default)]
struct FileSlot {
    generation: u64,
    data: Option<Value>,
}

/// Loads a local file in the background and emits its contents
#[derive(Debug, Default)]
pub struct ConstFile {
    loaded: Option<(String, FileKind)>,
    slot: Arc<Mutex<FileSlot>>,
}

impl ConstFile {
    fn fetch(&mut self, url: &str, kind: FileKind) {
        self.loaded = Some((url.to_string(), kind));
        let generation = {
            let mut slot = self.slot.lock();
            slot.generation += 1;
            slot.data = None;
            slot.generation
        };

        if url.starts_with("http://") || url.starts_with("https://") {
            tracing::warn!("Remote file {url} not fetched: only local paths are supported");
            return;
        }
        let path = PathBuf::from(url.strip_prefix("file://").unwrap_or(url));
        let slot = Arc::clone(&self.slot);

        std::thread::spawn(move || {
            let decoded = std::fs::read(&path)
                .map_err(|e| e.to_string())
                .and_then(|contents| kind.decode(&contents));
            match decoded {
                Ok(value) => {
                    let mut slot = slot.lock();
                    if slot.generation == generation {
                        slot.data = Some(value);
                    }
                }
                Err(err) => tracing::warn!("Failed to load {}: {err}", path.display()),
            }
        });
    }
}

impl NodeBehavior for ConstFile {
    fn on_execute(&mut self, cx: &mut NodeContext<'_>) -> Result<(), NodeError> {
        let url = cx
            .input(0)
            .and_then(Value::as_str)
            .filter(|u| !u.is_empty())
            .or_else(|| cx.property("url").and_then(Value::as_str))
            .unwrap_or_default()
            .to_string();
        let kind = FileKind::from_property(cx.property("type"));

        let current = self.loaded.as_ref().map(|(u, k)| (u.as_str(), *k));
        if !url.is_empty() && current != Some((url.as_str(), kind)) {
            self.fetch(&url, kind);
        }

        let data = self.slot.lock().data.clone();
        cx.set_output(0, data);
        Ok(())
    }

    fn on_drop_file(&mut self, file: &DroppedFile, cx: &mut NodeContext<'_>) -> bool {
        let kind = FileKind::from_property(cx.property("type"));
        let decoded = match kind.decode(&file.contents) {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!("Dropped file {} could not be decoded: {err}", file.name);
                return false;
            }
        };
        cx.set_property("url", Value::String(file.name.clone()));
        self.loaded = Some((file.name.clone(), kind));

        let mut slot = self.slot.lock();
        slot.generation += 1;
        slot.data = Some(decoded);
        true
    }
}

/// Keeps the last value it received and shows it as its input label
#[derive(Debug, Default)]
pub struct Watch {
    value: Option<Value>,
}

impl NodeBehavior for Watch {
    fn on_execute(&mut self, cx: &mut NodeContext<'_>) -> Result<(), NodeError> {
        self.value = cx.input(0).cloned();
        let label = display_value(self.value.as_ref());
        if let Some(slot) = cx.node_mut().and_then(|n| n.inputs.get_mut(0)) {
            slot.label = Some(label);
        }
        Ok(())
    }
}

/// Identity
#[derive(Debug)]
pub struct Cast;

impl NodeBehavior for Cast {
    fn on_execute(&mut self, cx: &mut NodeContext<'_>) -> Result<(), NodeError> {
        let value = cx.input(0).cloned();
        cx.set_output(0, value);
        Ok(())
    }
}

/// Writes a message to the log when it receives an action
#[derive(Debug)]
pub struct Console;

impl Console {
    fn message(cx: &NodeContext<'_>, param: Option<&Value>) -> String {
        let msg = cx
            .input(1)
            .or_else(|| cx.property("msg").filter(|m| m.as_str() != Some("")))
            .or(param);
        display_value(msg)
    }
}

impl NodeBehavior for Console {
    fn on_execute(&mut self, cx: &mut NodeContext<'_>) -> Result<(), NodeError> {
        if let Some(msg) = cx.input(1).cloned() {
            cx.set_property("msg", msg);
        }
        tracing::info!(node = %cx.id(), "{}", Self::message(cx, None));
        Ok(())
    }

    fn on_action(&mut self, action: &str, param: Option<&Value>, cx: &mut NodeContext<'_>) -> Result<(), NodeError> {
        let msg = Self::message(cx, param);
        match action {
            "warn" => tracing::warn!(node = %cx.id(), "{msg}"),
            "error" => tracing::error!(node = %cx.id(), "{msg}"),
            _ => tracing::info!(node = %cx.id(), "{msg}"),
        }
        Ok(())
    }
}

/// Logs its `msg` property as a warning on every action
#[derive(Debug)]
pub struct Alert;

impl NodeBehavior for Alert {
    fn on_action(&mut self, _action: &str, _param: Option<&Value>, cx: &mut NodeContext<'_>) -> Result<(), NodeError> {
        let msg = display_value(cx.property("msg"));
        tracing::warn!(node = %cx.id(), "{msg}");
        Ok(())
    }
}

/// Keeps the last value fed into `data` and writes it to `filename` on
/// `download`; strings are written as-is, anything else as JSON
#[derive(Debug, Default)]
pub struct Download {
    value: Option<Value>,
}

impl NodeBehavior for Download {
    fn on_execute(&mut self, cx: &mut NodeContext<'_>) -> Result<(), NodeError> {
        self.value = cx.input(0).cloned();
        Ok(())
    }

    fn on_action(&mut self, _action: &str, _param: Option<&Value>, cx: &mut NodeContext<'_>) -> Result<(), NodeError> {
        let Some(value) = self.value.as_ref().or_else(|| cx.input(0)) else {
            return Ok(());
        };
        let contents = match value {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        };
        let path = cx
            .property("filename")
            .and_then(Value::as_str)
            .filter(|name| !name.is_empty())
            .unwrap_or("data.json")
            .to_string();

        std::fs::write(&path, contents).map_err(|source| NodeError::Write {
            path: path.clone(),
            source,
        })?;
        tracing::info!(node = %cx.id(), "Wrote {path}");
        Ok(())
    }

    fn title(&self, node: &Node) -> Option<String> {
        if !node.flags.collapsed {
            return None;
        }
        node.property("filename").and_then(Value::as_str).map(str::to_string)
    }
}

/// Compares inputs `A` and `B` (or the matching properties) with `OP`
#[derive(Debug)]
pub struct CompareValues;

impl CompareValues {
    /// Operators understood by the `OP` property
    pub const OPERATORS: [&'static str; 8] = ["==", "!=", ">", "<", ">=", "<=", "||", "&&"];

    fn compare(op: &str, a: &Value, b: &Value) -> bool {
        match op {
            "==" => loose_eq(a, b),
            "!=" => !loose_eq(a, b),
            ">" => order(a, b) == Some(Ordering::Greater),
            "<" => order(a, b) == Some(Ordering::Less),
            ">=" => matches!(order(a, b), Some(Ordering::Greater | Ordering::Equal)),
            "<=" => matches!(order(a, b), Some(Ordering::Less | Ordering::Equal)),
            "||" => truthy(a) || truthy(b),
            "&&" => truthy(a) && truthy(b),
            _ => false,
        }
    }
}

/// Same kind of value and equal; numbers compare by value
fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn order(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

impl NodeBehavior for CompareValues {
    fn on_execute(&mut self, cx: &mut NodeContext<'_>) -> Result<(), NodeError> {
        let a = cx.input_or_property("A").cloned().unwrap_or(Value::Null);
        let b = cx.input_or_property("B").cloned().unwrap_or(Value::Null);
        let op = cx.property("OP").and_then(Value::as_str).unwrap_or("==");
        if !Self::OPERATORS.contains(&op) {
            return Err(NodeError::Custom(format!("Unknown comparison operator {op:?}")));
        }

        let result = Self::compare(op, &a, &b);
        cx.set_output(0, Some(Value::Bool(result)));
        cx.set_output(1, Some(Value::Bool(!result)));
        Ok(())
    }

    fn title(&self, node: &Node) -> Option<String> {
        let op = node.property("OP").and_then(Value::as_str).unwrap_or("==");
        Some(format!("*A {op} *B"))
    }
}
