// SPDX-License-Identifier: MIT OR Apache-2.0
//! Identifier remapping for copied graph records.
//!
//! Identifiers are only unique inside the graph that generated them, so a
//! copied record must get fresh node and link IDs, with every
//! cross-reference (link endpoints, slot link references, nested graphs)
//! rewritten to match, before it can live next to the original.

use crate::config::{EngineConfig, IdMode, RemapScope};
use crate::error::RemapError;
use crate::graph::Graph;
use crate::link::LinkId;
use crate::node::NodeId;
use crate::serialization::GraphData;
use crate::subgraph::SUBGRAPH_TYPE;
use indexmap::IndexMap;
use std::collections::HashSet;

/// Generator of fresh identifiers
pub trait IdSource {
    /// Next node ID
    fn next_node_id(&mut self) -> NodeId;

    /// Next link ID
    fn next_link_id(&mut self) -> LinkId;

    /// Never hand out indices at or below these again
    fn advance_past(&mut self, _node_index: u64, _link_index: u64) {}
}

/// Counting IDs, starting above everything in a record tree
#[derive(Debug, Clone)]
pub struct SequentialIds {
    last_node: u64,
    last_link: u64,
}

impl SequentialIds {
    /// Start right after the given indices
    pub fn after(last_node: u64, last_link: u64) -> Self {
        Self { last_node, last_link }
    }

    /// Start above every index used anywhere in `data`, nested graphs included
    pub fn above(data: &GraphData) -> Self {
        let mut ids = Self::after(data.last_node_id, data.last_link_id);
        ids.advance_past_links(data);
        data.walk(&mut |_, node| {
            if let Some(NodeId::Index(index)) = node.id {
                ids.last_node = ids.last_node.max(index);
            }
            if let Some(inner) = &node.subgraph {
                ids.last_node = ids.last_node.max(inner.last_node_id);
                ids.last_link = ids.last_link.max(inner.last_link_id);
                ids.advance_past_links(inner);
            }
        });
        ids
    }

    fn advance_past_links(&mut self, data: &GraphData) {
        for link in &data.links {
            if let LinkId::Index(index) = link.0 {
                self.last_link = self.last_link.max(index);
            }
        }
    }
}

impl IdSource for SequentialIds {
    fn next_node_id(&mut self) -> NodeId {
        self.last_node += 1;
        NodeId::Index(self.last_node)
    }

    fn next_link_id(&mut self) -> LinkId {
        self.last_link += 1;
        LinkId::Index(self.last_link)
    }

    fn advance_past(&mut self, node_index: u64, link_index: u64) {
        self.last_node = self.last_node.max(node_index);
        self.last_link = self.last_link.max(link_index);
    }
}

/// Random v4 UUIDs
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidIds;

impl IdSource for UuidIds {
    fn next_node_id(&mut self) -> NodeId {
        NodeId::random()
    }

    fn next_link_id(&mut self) -> LinkId {
        LinkId::random()
    }
}

/// Old-to-new identifier tables produced by one remap
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdRemap {
    /// Node IDs of this level
    pub nodes: IndexMap<NodeId, NodeId>,
    /// Link IDs of this level
    pub links: IndexMap<LinkId, LinkId>,
    /// Tables of nested graphs, keyed by the subgraph node's new ID
    pub nested: IndexMap<NodeId, IdRemap>,
}

impl IdRemap {
    /// New ID of a node on this level
    pub fn node(&self, old: NodeId) -> Option<NodeId> {
        self.nodes.get(&old).copied()
    }

    /// New ID of a link on this level
    pub fn link(&self, old: LinkId) -> Option<LinkId> {
        self.links.get(&old).copied()
    }

    /// Number of nodes remapped, nested levels included
    pub fn node_count(&self) -> usize {
        self.nodes.len() + self.nested.values().map(IdRemap::node_count).sum::<usize>()
    }

    /// Number of links remapped, nested levels included
    pub fn link_count(&self) -> usize {
        self.links.len() + self.nested.values().map(IdRemap::link_count).sum::<usize>()
    }
}

/// Rewrites every identifier in a graph record
pub struct IdRemapper {
    source: Box<dyn IdSource>,
    scope: RemapScope,
    reserved_nodes: HashSet<NodeId>,
    reserved_links: HashSet<LinkId>,
}

impl IdRemapper {
    /// Remap with IDs from `source`
    pub fn new(source: impl IdSource + 'static, scope: RemapScope) -> Self {
        Self {
            source: Box::new(source),
            scope,
            reserved_nodes: HashSet::new(),
            reserved_links: HashSet::new(),
        }
    }

    /// Remapper matching the configured ID mode and scope for `data`
    pub fn for_data(config: &EngineConfig, data: &GraphData) -> Self {
        match config.id_mode {
            IdMode::Sequential => Self::new(SequentialIds::above(data), config.remap_scope),
            IdMode::Uuid => Self::new(UuidIds, config.remap_scope),
        }
    }

    /// Collision scope
    pub fn scope(&self) -> RemapScope {
        self.scope
    }

    /// Reserve every ID live in `graph` and its nested graphs.
    ///
    /// Only has an effect in [`RemapScope::Tree`]; in [`RemapScope::Call`]
    /// collisions are checked against the current remap tables alone.
    pub fn reserve_graph(&mut self, graph: &Graph) {
        if self.scope != RemapScope::Tree {
            return;
        }
        let (mut node_max, mut link_max) = (0, 0);
        for node in graph.nodes() {
            self.reserved_nodes.insert(node.id());
            node_max = node_max.max(node.id().index().unwrap_or(0));
            if let Some(inner) = node.subgraph() {
                self.reserve_graph(inner);
            }
        }
        for link in graph.links() {
            self.reserved_links.insert(link.id);
            link_max = link_max.max(link.id.index().unwrap_or(0));
        }
        self.source.advance_past(node_max, link_max);
    }

    /// Give every node and link in `data` (recursively) a fresh ID.
    ///
    /// A generated ID that is already present in the tables of the current
    /// level (as an old or a new ID), or reserved, is a fatal collision.
    pub fn remap(&mut self, data: &mut GraphData) -> Result<IdRemap, RemapError> {
        let mut map = IdRemap::default();

        let mut seen_nodes = HashSet::new();
        for node in &mut data.nodes {
            let old = node
                .id
                .ok_or_else(|| RemapError::MissingNodeId(node.type_name.clone()))?;
            let new = self.source.next_node_id();
            if seen_nodes.contains(&old) || seen_nodes.contains(&new) || self.reserved_nodes.contains(&new) {
                return Err(RemapError::NodeIdCollision { old, new });
            }
            seen_nodes.insert(old);
            seen_nodes.insert(new);
            map.nodes.insert(old, new);
            node.id = Some(new);
        }

        let mut seen_links = HashSet::new();
        for link in &mut data.links {
            let old = link.0;
            let new = self.source.next_link_id();
            if seen_links.contains(&old) || seen_links.contains(&new) || self.reserved_links.contains(&new) {
                return Err(RemapError::LinkIdCollision { old, new });
            }
            seen_links.insert(old);
            seen_links.insert(new);
            map.links.insert(old, new);
            link.0 = new;
            link.1 = map.node(link.1).ok_or(RemapError::UnknownNode(link.1))?;
            link.3 = map.node(link.3).ok_or(RemapError::UnknownNode(link.3))?;
        }

        for node in &mut data.nodes {
            for input in node.inputs.iter_mut().flatten() {
                if let Some(old) = input.link {
                    input.link = Some(map.link(old).ok_or(RemapError::UnknownLink(old))?);
                }
            }
            for output in node.outputs.iter_mut().flatten() {
                for link in &mut output.links {
                    *link = map.link(*link).ok_or(RemapError::UnknownLink(*link))?;
                }
            }
        }

        for node in &mut data.nodes {
            if node.type_name != SUBGRAPH_TYPE {
                continue;
            }
            if let (Some(id), Some(inner)) = (node.id, node.subgraph.as_deref_mut()) {
                let nested = self.remap(inner)?;
                map.nested.insert(id, nested);
            }
        }

        for new in map.nodes.values() {
            if let NodeId::Index(index) = new {
                data.last_node_id = data.last_node_id.max(*index);
            }
        }
        for new in map.links.values() {
            if let LinkId::Index(index) = new {
                data.last_link_id = data.last_link_id.max(*index);
            }
        }

        tracing::debug!(
            "Remapped {} nodes and {} links",
            map.nodes.len(),
            map.links.len()
        );
        Ok(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::create_default_registry;
    use crate::subgraph::SubgraphNode;
    use serde_json::Value;

    /// Hands out a fixed list of node IDs, then sequential link IDs
    struct Scripted {
        nodes: Vec<NodeId>,
        links: u64,
    }

    impl IdSource for Scripted {
        fn next_node_id(&mut self) -> NodeId {
            self.nodes.remove(0)
        }

        fn next_link_id(&mut self) -> LinkId {
            self.links += 1;
            LinkId::Index(self.links)
        }
    }

    fn chain() -> GraphData {
        let registry = create_default_registry();
        let mut graph = Graph::new();
        let a = graph.add_node(registry.create_node("basic/const").unwrap());
        let b = graph.add_node(registry.create_node("basic/watch").unwrap());
        graph.connect(a, 0, b, 0).unwrap().unwrap();
        graph.serialize()
    }

    #[test]
    fn test_remap_rewrites_references() {
        let mut data = chain();
        let map = IdRemapper::for_data(&EngineConfig::default(), &data)
            .remap(&mut data)
            .unwrap();

        assert_eq!(map.node(NodeId::Index(1)), Some(NodeId::Index(3)));
        assert_eq!(map.node(NodeId::Index(2)), Some(NodeId::Index(4)));
        assert_eq!(map.link(LinkId::Index(1)), Some(LinkId::Index(2)));

        let link = &data.links[0];
        assert_eq!((link.0, link.1, link.3), (LinkId::Index(2), NodeId::Index(3), NodeId::Index(4)));
        assert_eq!(data.nodes[1].inputs.as_ref().unwrap()[0].link, Some(LinkId::Index(2)));
        assert_eq!(data.nodes[0].outputs.as_ref().unwrap()[0].links, vec![LinkId::Index(2)]);
        assert_eq!(data.last_node_id, 4);
        assert_eq!(data.last_link_id, 2);
    }

    #[test]
    fn test_uuid_mode() {
        let mut data = chain();
        let config = EngineConfig {
            id_mode: IdMode::Uuid,
            ..EngineConfig::default()
        };
        IdRemapper::for_data(&config, &data).remap(&mut data).unwrap();
        assert!(data.nodes.iter().all(|n| matches!(n.id, Some(NodeId::Uuid(_)))));
        assert!(matches!(data.links[0].0, LinkId::Uuid(_)));
    }

    #[test]
    fn test_generated_duplicate_is_fatal() {
        let mut data = chain();
        let source = Scripted {
            nodes: vec![NodeId::Index(7), NodeId::Index(7)],
            links: 10,
        };
        let err = IdRemapper::new(source, RemapScope::Call).remap(&mut data).unwrap_err();
        assert!(matches!(err, RemapError::NodeIdCollision { new: NodeId::Index(7), .. }));
    }

    #[test]
    fn test_new_id_equal_to_pending_old_id_is_fatal() {
        let mut data = chain();
        // node 1 becomes 2 while node 2 still waits to be remapped
        let source = Scripted {
            nodes: vec![NodeId::Index(2), NodeId::Index(9)],
            links: 10,
        };
        let err = IdRemapper::new(source, RemapScope::Call).remap(&mut data).unwrap_err();
        assert!(matches!(err, RemapError::NodeIdCollision { old: NodeId::Index(2), .. }));
    }

    #[test]
    fn test_unknown_references_are_fatal() {
        let mut data = chain();
        data.links[0].1 = NodeId::Index(50);
        let err = IdRemapper::for_data(&EngineConfig::default(), &data)
            .remap(&mut data)
            .unwrap_err();
        assert!(matches!(err, RemapError::UnknownNode(NodeId::Index(50))));

        let mut data = chain();
        data.nodes[1].inputs.as_mut().unwrap()[0].link = Some(LinkId::Index(99));
        let err = IdRemapper::for_data(&EngineConfig::default(), &data)
            .remap(&mut data)
            .unwrap_err();
        assert!(matches!(err, RemapError::UnknownLink(LinkId::Index(99))));
    }

    #[test]
    fn test_scope_decides_outside_collisions() {
        let registry = create_default_registry();
        let mut host = Graph::new();
        host.add_node(registry.create_node("basic/const").unwrap());

        let scripted = || Scripted {
            nodes: vec![NodeId::Index(1), NodeId::Index(20)],
            links: 10,
        };

        // node 1 lives elsewhere in the host tree; only Tree scope sees it
        let mut data = chain();
        data.nodes[0].id = Some(NodeId::Index(5));
        data.links[0].1 = NodeId::Index(5);
        let mut call = IdRemapper::new(scripted(), RemapScope::Call);
        call.reserve_graph(&host);
        assert!(call.remap(&mut data).is_ok());

        let mut data = chain();
        data.nodes[0].id = Some(NodeId::Index(5));
        data.links[0].1 = NodeId::Index(5);
        let mut tree = IdRemapper::new(scripted(), RemapScope::Tree);
        tree.reserve_graph(&host);
        assert!(matches!(
            tree.remap(&mut data),
            Err(RemapError::NodeIdCollision { new: NodeId::Index(1), .. })
        ));
    }

    #[test]
    fn test_tree_scope_sequential_skips_reserved() {
        let registry = create_default_registry();
        let mut host = Graph::new();
        for _ in 0..6 {
            host.add_node(registry.create_node("basic/const").unwrap());
        }
        let config = EngineConfig {
            remap_scope: RemapScope::Tree,
            ..EngineConfig::default()
        };
        let mut data = chain();
        let mut remapper = IdRemapper::for_data(&config, &data);
        remapper.reserve_graph(&host);
        let map = remapper.remap(&mut data).unwrap();
        assert_eq!(map.node(NodeId::Index(1)), Some(NodeId::Index(7)));
    }

    #[test]
    fn test_nested_graphs_are_remapped() {
        let registry = create_default_registry();
        let mut graph = Graph::new();
        let sub = graph.add_node(SubgraphNode::node());
        graph
            .with_subgraph(sub, |inner| {
                let input = inner.add_node(registry.create_node("graph/input").unwrap());
                inner.set_property(input, "name", Value::from("x")).unwrap();
                let watch = inner.add_node(registry.create_node("basic/watch").unwrap());
                inner.connect(input, 0, watch, 0).unwrap().unwrap();
            })
            .unwrap();

        let mut data = graph.serialize();
        let map = IdRemapper::for_data(&EngineConfig::default(), &data)
            .remap(&mut data)
            .unwrap();

        assert_eq!(map.node_count(), 3);
        assert_eq!(map.link_count(), 1);
        let new_sub = map.node(sub).unwrap();
        let nested = &map.nested[&new_sub];
        let inner = data.nodes[0].subgraph.as_ref().unwrap();
        let link = &inner.links[0];
        assert_eq!(Some(link.1), nested.node(NodeId::Index(1)));
        assert_eq!(Some(link.3), nested.node(NodeId::Index(2)));
    }
}
