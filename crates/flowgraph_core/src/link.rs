// SPDX-License-Identifier: MIT OR Apache-2.0
//! Link (edge) definitions for the graph.

use crate::node::NodeId;
use crate::slot::SlotType;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier for a link.
///
/// Serialized as a bare number or a UUID string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LinkId {
    /// Sequential, unique inside one graph
    Index(u64),
    /// Random, unique process-wide
    Uuid(Uuid),
}

impl LinkId {
    /// Create a new random link ID
    pub fn random() -> Self {
        Self::Uuid(Uuid::new_v4())
    }

    /// Sequential index, if this is one
    pub fn index(&self) -> Option<u64> {
        match self {
            Self::Index(index) => Some(*index),
            Self::Uuid(_) => None,
        }
    }
}

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(index) => write!(f, "{index}"),
            Self::Uuid(uuid) => write!(f, "{uuid}"),
        }
    }
}

impl FromStr for LinkId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.parse::<u64>() {
            Ok(index) => Ok(Self::Index(index)),
            Err(_) => Uuid::parse_str(s).map(Self::Uuid),
        }
    }
}

/// A directed link from an output slot to an input slot
#[derive(Debug, Clone)]
pub struct Link {
    /// Unique link ID
    pub id: LinkId,
    /// Source node ID
    pub origin_id: NodeId,
    /// Source output slot index
    pub origin_slot: usize,
    /// Target node ID
    pub target_id: NodeId,
    /// Target input slot index
    pub target_slot: usize,
    /// Type propagated along the link (the origin slot's type)
    pub link_type: SlotType,
    /// Last value staged by the origin (runtime only)
    pub data: Option<Value>,
}

impl Link {
    /// Create a new link
    pub fn new(
        id: LinkId,
        origin_id: NodeId,
        origin_slot: usize,
        target_id: NodeId,
        target_slot: usize,
        link_type: SlotType,
    ) -> Self {
        Self {
            id,
            origin_id,
            origin_slot,
            target_id,
            target_slot,
            link_type,
            data: None,
        }
    }

    /// Check if this link involves a specific node
    pub fn involves_node(&self, node_id: NodeId) -> bool {
        self.origin_id == node_id || self.target_id == node_id
    }

    /// Whether actions travel along this link
    pub fn carries_events(&self) -> bool {
        self.link_type.is_event()
    }
}
