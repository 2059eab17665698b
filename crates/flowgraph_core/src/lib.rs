// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node-graph execution runtime.
//!
//! Typed nodes connected by data and event links, evaluated pass by pass
//! under a small scheduler.
//!
//! ## Architecture
//!
//! - Slots carry a declared type; links are only created between
//!   compatible slots
//! - Data moves by pull (a node reads what its upstream staged), events by
//!   synchronous push along event links
//! - A subgraph node embeds a whole graph and mirrors its named boundary
//!   onto its own slots
//! - Copies of graphs get fresh identifiers through the remapper
//! - Nodes are created through an explicit [`NodeRegistry`]

pub mod boundary;
pub mod config;
pub mod error;
pub mod evaluation;
pub mod graph;
pub mod link;
pub mod node;
pub mod nodes;
pub mod registry;
pub mod remap;
pub mod serialization;
pub mod slot;
pub mod subgraph;
pub mod variables;

pub use config::{ConfigError, EngineConfig, EventGuard, IdMode, RemapScope};
pub use error::{FormatError, GraphError, NodeError, RemapError, Result};
pub use evaluation::{NodeContext, TriggerTrace};
pub use graph::{BoundarySlot, Graph, GraphStatus, TriggeredOutput};
pub use link::{Link, LinkId};
pub use node::{DroppedFile, Node, NodeBehavior, NodeFlags, NodeId, NodeMode, PropertyChange};
pub use nodes::create_default_registry;
pub use registry::{NodeCategory, NodeRegistry, NodeType};
pub use remap::{IdRemap, IdRemapper, IdSource, SequentialIds, UuidIds};
pub use serialization::{GraphData, LinkData, NodeData};
pub use slot::{is_compatible, InputSlot, OutputSlot, SlotType};
pub use subgraph::{BoundaryEvent, SubgraphNode};
pub use variables::Variables;

pub use serde_json::Value;
