// SPDX-License-Identifier: MIT OR Apache-2.0
//! Slot definitions for node inputs/outputs and link type compatibility.

use crate::link::LinkId;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;

/// Declared type of a slot.
///
/// Serialized as a string: `""` for the wildcard, `"event"` for events and
/// the raw comma separated type list otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SlotType {
    /// Accepts and produces anything
    #[default]
    Any,
    /// Event/action slot, only links to other event slots
    Event,
    /// One type name or a comma separated set of acceptable names
    Named(String),
}

impl SlotType {
    /// Parse a type string.
    ///
    /// `""`, `"0"` and `"*"` are wildcards; `"event"`, `"action"` and `"-1"`
    /// name the event type (case-insensitive).
    pub fn parse(source: &str) -> Self {
        let trimmed = source.trim();
        match trimmed {
            "" | "0" | "*" => Self::Any,
            "-1" => Self::Event,
            t if t.eq_ignore_ascii_case("event") || t.eq_ignore_ascii_case("action") => {
                Self::Event
            }
            t => Self::Named(t.to_string()),
        }
    }

    /// Shorthand for a named type
    pub fn named(name: impl Into<String>) -> Self {
        Self::parse(&name.into())
    }

    /// Whether this is the wildcard type
    pub fn is_any(&self) -> bool {
        matches!(self, Self::Any)
    }

    /// Whether this is the event/action type
    pub fn is_event(&self) -> bool {
        matches!(self, Self::Event)
    }

    /// Individual type names, lowercased, empty entries dropped
    pub fn names(&self) -> Vec<String> {
        match self {
            Self::Named(list) => list
                .split(',')
                .map(|n| n.trim().to_ascii_lowercase())
                .filter(|n| !n.is_empty())
                .collect(),
            _ => Vec::new(),
        }
    }

    /// String form used in serialized graphs
    pub fn as_str(&self) -> &str {
        match self {
            Self::Any => "",
            Self::Event => "event",
            Self::Named(name) => name,
        }
    }
}

impl fmt::Display for SlotType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for SlotType {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}

impl Serialize for SlotType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SlotType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(i64),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(text) => Self::parse(&text),
            Raw::Number(-1) => Self::Event,
            Raw::Number(_) => Self::Any,
        })
    }
}

/// Decide whether an output of type `output` may feed an input of type `input`.
///
/// Rules, in order: a wildcard on either side matches; textually equal types
/// match; a type list matches when the two lists share a name; events only
/// match events. Nothing is coerced.
pub fn is_compatible(output: &SlotType, input: &SlotType) -> bool {
    match (output, input) {
        (SlotType::Any, _) | (_, SlotType::Any) => true,
        (SlotType::Event, SlotType::Event) => true,
        (SlotType::Event, _) | (_, SlotType::Event) => false,
        (SlotType::Named(a), SlotType::Named(b)) => {
            if a.eq_ignore_ascii_case(b) {
                return true;
            }
            let accepted = input.names();
            output.names().iter().any(|name| accepted.contains(name))
        }
    }
}

/// An input slot on a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputSlot {
    /// Slot name
    pub name: String,
    /// Declared type
    #[serde(rename = "type")]
    pub slot_type: SlotType,
    /// The single inbound link, if connected
    #[serde(default)]
    pub link: Option<LinkId>,
    /// Display label override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl InputSlot {
    /// Create an unconnected input slot
    pub fn new(name: impl Into<String>, slot_type: SlotType) -> Self {
        Self {
            name: name.into(),
            slot_type,
            link: None,
            label: None,
        }
    }

    /// Whether a link feeds this slot
    pub fn is_connected(&self) -> bool {
        self.link.is_some()
    }
}

/// An output slot on a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSlot {
    /// Slot name
    pub name: String,
    /// Declared type
    #[serde(rename = "type")]
    pub slot_type: SlotType,
    /// Outbound links, in connection order
    #[serde(default)]
    pub links: Vec<LinkId>,
    /// Display label override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Last staged value (runtime only)
    #[serde(skip)]
    pub value: Option<Value>,
}

impl OutputSlot {
    /// Create an unconnected output slot
    pub fn new(name: impl Into<String>, slot_type: SlotType) -> Self {
        Self {
            name: name.into(),
            slot_type,
            links: Vec::new(),
            label: None,
            value: None,
        }
    }

    /// Whether any link leaves this slot
    pub fn is_connected(&self) -> bool {
        !self.links.is_empty()
    }

    /// Copy without the runtime value, as written to disk
    pub(crate) fn persisted(&self) -> Self {
        Self {
            value: None,
            ..self.clone()
        }
    }
}
