// SPDX-License-Identifier: MIT OR Apache-2.0
//! Error types for graph editing, execution and persistence.

use crate::link::LinkId;
use crate::node::NodeId;
use thiserror::Error;

/// Structural failure while editing or loading a graph.
///
/// These are never recovered from automatically: continuing after one of
/// them would leave the link table pointing at nodes or slots that do not
/// exist.
#[derive(Debug, Error)]
pub enum GraphError {
    /// Node not found
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// Link not found
    #[error("Link not found: {0}")]
    LinkNotFound(LinkId),

    /// A node with the same ID is already present
    #[error("Duplicate node ID: {0}")]
    DuplicateNodeId(NodeId),

    /// A link with the same ID is already present
    #[error("Duplicate link ID: {0}")]
    DuplicateLinkId(LinkId),

    /// Serialized node record carries no ID
    #[error("Serialized node of type {0:?} has no ID")]
    MissingNodeId(String),

    /// Input slot index out of range
    #[error("Node {node} has no input slot {slot}")]
    InputSlotOutOfRange {
        /// Node that was addressed
        node: NodeId,
        /// Requested slot index
        slot: usize,
    },

    /// Output slot index out of range
    #[error("Node {node} has no output slot {slot}")]
    OutputSlotOutOfRange {
        /// Node that was addressed
        node: NodeId,
        /// Requested slot index
        slot: usize,
    },

    /// Type name has no registered factory
    #[error("Unknown node type: {0}")]
    UnknownNodeType(String),

    /// Link references a node absent from the graph
    #[error("Link {link} references missing node {node}")]
    DanglingLink {
        /// Offending link
        link: LinkId,
        /// Node that could not be resolved
        node: NodeId,
    },

    /// A slot and the link table disagree about a link
    #[error("Link {link} does not match the slot that references it on node {node}")]
    LinkSlotMismatch {
        /// Offending link
        link: LinkId,
        /// Node whose slot list disagrees
        node: NodeId,
    },

    /// Node does not own a nested graph
    #[error("Node {0} is not a subgraph")]
    NotASubgraph(NodeId),

    /// Identifier remapping failed
    #[error(transparent)]
    Remap(#[from] RemapError),
}

/// Failure while regenerating identifiers for a cloned graph.
#[derive(Debug, Error)]
pub enum RemapError {
    /// Generated node ID already present in the mapping table
    #[error("Node ID collision while remapping: old {old}, new {new}")]
    NodeIdCollision {
        /// Identifier being replaced
        old: NodeId,
        /// Freshly generated identifier
        new: NodeId,
    },

    /// Generated link ID already present in the mapping table
    #[error("Link ID collision while remapping: old {old}, new {new}")]
    LinkIdCollision {
        /// Identifier being replaced
        old: LinkId,
        /// Freshly generated identifier
        new: LinkId,
    },

    /// Link references a node that is not in the mapping
    #[error("Old node ID not found in mapping: {0}")]
    UnknownNode(NodeId),

    /// Slot references a link that is not in the mapping
    #[error("Old link ID not found in mapping: {0}")]
    UnknownLink(LinkId),

    /// Serialized node record carries no ID
    #[error("Serialized node of type {0:?} has no ID")]
    MissingNodeId(String),
}

/// Recoverable fault raised by a node hook.
///
/// The scheduler logs these and moves on to the next node.
#[derive(Debug, Error)]
pub enum NodeError {
    /// Input value had an unexpected shape
    #[error("Invalid input on slot {slot}: {reason}")]
    InvalidInput {
        /// Input slot index
        slot: usize,
        /// What was wrong
        reason: String,
    },

    /// Writing node output to a file failed
    #[error("Failed to write {path}: {source}")]
    Write {
        /// Destination path
        path: String,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Script evaluation failed
    #[error("Script error: {0}")]
    Script(String),

    /// Structural error surfaced while the node was running
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// Custom error
    #[error("{0}")]
    Custom(String),
}

/// Failure encoding or decoding a serialized graph.
#[derive(Debug, Error)]
pub enum FormatError {
    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// RON encoding error
    #[error("RON error: {0}")]
    RonEncode(#[from] ron::Error),

    /// RON decoding error
    #[error("RON error: {0}")]
    RonDecode(#[from] ron::error::SpannedError),

    /// Decoded data could not be applied to a graph
    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Result type for structural graph operations
pub type Result<T> = std::result::Result<T, GraphError>;
