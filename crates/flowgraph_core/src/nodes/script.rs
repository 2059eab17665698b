// SPDX-License-Identifier: MIT OR Apache-2.0
//! Script node backed by a sandboxed Rhai engine.
//!
//! The script sees its inputs as `A`, `B` and `C` and a `DATA` map that
//! persists between executions; its result is written to the `out` slot:
//!
//! ```rhai
//! if A > B { A - B } else { DATA.hits = (DATA.hits ?? 0) + 1; 0 }
//! ```
//!
//! Compilation is refused (the node stays inert) when the engine
//! configuration disallows scripts, when the source is longer than the
//! configured maximum, or when it mentions a forbidden word.

use crate::config::EngineConfig;
use crate::error::{GraphError, NodeError};
use crate::evaluation::NodeContext;
use crate::node::{Node, NodeBehavior, PropertyChange};
use crate::registry::{NodeCategory, NodeRegistry, NodeType};
use crate::serialization::NodeData;
use rhai::{Dynamic, Engine, Map, Scope, AST};
use serde_json::Value;
use std::fmt;

/// Registry key of the script node
pub const SCRIPT_TYPE: &str = "basic/script";

/// Words a script may not contain, compared case-insensitively
const FORBIDDEN_WORDS: [&str; 6] = ["script", "body", "document", "eval", "nodescript", "function"];

/// Names the inputs are bound to inside the script
const INPUT_NAMES: [&str; 3] = ["A", "B", "C"];

/// Register the script node type
pub fn register(registry: &mut NodeRegistry) {
    registry.register(NodeType::new(
        SCRIPT_TYPE,
        "Script",
        NodeCategory::Utility,
        "Evaluate a Rhai expression over its inputs",
        ScriptNode::node,
    ));
}

/// Evaluates the Rhai source held in its `onExecute` property
pub struct ScriptNode {
    engine: Engine,
    /// Source of the last compile attempt, successful or not
    source: Option<String>,
    compiled: Option<AST>,
    data: Map,
}

impl fmt::Debug for ScriptNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptNode")
            .field("source", &self.source)
            .field("compiled", &self.compiled.is_some())
            .finish_non_exhaustive()
    }
}

impl Default for ScriptNode {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptNode {
    /// Create an uncompiled script node behavior
    pub fn new() -> Self {
        let mut engine = Engine::new();
        engine.set_max_expr_depths(64, 64);
        engine.set_max_call_levels(32);
        engine.set_max_operations(10_000);
        engine.set_max_string_size(10_000);
        engine.set_max_array_size(1_000);
        engine.set_max_map_size(1_000);
        engine.disable_symbol("eval");

        Self {
            engine,
            source: None,
            compiled: None,
            data: Map::new(),
        }
    }

    /// Build a fresh `basic/script` node
    pub fn node() -> Node {
        Node::new(SCRIPT_TYPE, Self::new())
            .with_input("A", "")
            .with_input("B", "")
            .with_input("C", "")
            .with_output("out", "")
            .with_property("onExecute", "return A;")
            .with_size(180.0, 30.0)
    }

    /// Whether the current source compiled
    pub fn is_compiled(&self) -> bool {
        self.compiled.is_some()
    }

    fn compile(&mut self, code: &str, config: &EngineConfig) {
        self.source = Some(code.to_string());
        self.compiled = None;

        if !config.allow_scripts {
            tracing::warn!("Script not compiled: scripts are disabled in this engine");
            return;
        }
        if code.chars().count() > config.script_max_len {
            tracing::warn!("Script not compiled: longer than {} characters", config.script_max_len);
            return;
        }
        let lowered = code.to_lowercase();
        if let Some(word) = FORBIDDEN_WORDS.iter().find(|w| lowered.contains(*w)) {
            tracing::warn!("Script not compiled: contains forbidden word {word:?}");
            return;
        }

        match self.engine.compile(code) {
            Ok(ast) => {
                self.compiled = Some(ast);
                tracing::debug!("Script compiled");
            }
            Err(err) => tracing::warn!("Script not compiled: {err}"),
        }
    }

    /// Compile the `onExecute` property unless it was already attempted
    fn ensure_compiled(&mut self, cx: &NodeContext<'_>) {
        let code = cx.property("onExecute").and_then(Value::as_str).unwrap_or_default();
        if self.source.as_deref() != Some(code) {
            let code = code.to_string();
            self.compile(&code, cx.config());
        }
    }
}

fn script_error(err: impl fmt::Display) -> NodeError {
    NodeError::Script(err.to_string())
}

impl NodeBehavior for ScriptNode {
    fn on_execute(&mut self, cx: &mut NodeContext<'_>) -> Result<(), NodeError> {
        self.ensure_compiled(cx);
        let Some(ast) = self.compiled.as_ref() else {
            return Ok(());
        };

        let mut scope = Scope::new();
        for (slot, name) in INPUT_NAMES.iter().enumerate() {
            let value = match cx.input(slot) {
                Some(value) => rhai::serde::to_dynamic(value).map_err(script_error)?,
                None => Dynamic::UNIT,
            };
            scope.push_dynamic(*name, value);
        }
        scope.push("DATA", std::mem::take(&mut self.data));

        let result = self.engine.eval_ast_with_scope::<Dynamic>(&mut scope, ast);
        self.data = scope.get_value::<Map>("DATA").unwrap_or_default();

        let result = result.map_err(script_error)?;
        let value: Value = rhai::serde::from_dynamic(&result).map_err(script_error)?;
        cx.set_output(0, Some(value));
        Ok(())
    }

    fn on_property_changed(&mut self, name: &str, value: &Value, cx: &mut NodeContext<'_>) -> PropertyChange {
        if name == "onExecute" {
            match value.as_str() {
                Some(code) => self.compile(code, cx.config()),
                None => return PropertyChange::Reject,
            }
        }
        PropertyChange::Accept
    }

    fn on_configure(
        &mut self,
        _data: &NodeData,
        _registry: &NodeRegistry,
        cx: &mut NodeContext<'_>,
    ) -> Result<(), GraphError> {
        self.ensure_compiled(cx);
        Ok(())
    }
}
