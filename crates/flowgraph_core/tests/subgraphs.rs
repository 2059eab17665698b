// SPDX-License-Identifier: MIT OR Apache-2.0
//! Nested graphs: boundary mirroring, persistence and cloning.

use flowgraph_core::{
    create_default_registry, EngineConfig, Graph, GraphData, NodeId, NodeRegistry, RemapScope, Value,
};
use serde_json::json;
use std::collections::HashSet;

fn add(graph: &mut Graph, registry: &NodeRegistry, type_name: &str) -> NodeId {
    graph.add_node(registry.create_node(type_name).unwrap())
}

fn boundary(graph: &mut Graph, registry: &NodeRegistry, type_name: &str, name: &str) -> NodeId {
    let id = add(graph, registry, type_name);
    assert!(graph.set_property(id, "name", json!(name)).unwrap());
    id
}

/// const(3) -> [x -> [y -> z] -> w] -> watch
fn nested(registry: &NodeRegistry, config: EngineConfig) -> (Graph, NodeId, NodeId) {
    let mut outer = Graph::with_config(config);
    let source = add(&mut outer, registry, "basic/const");
    outer.set_property(source, "value", json!(3)).unwrap();
    let sub = add(&mut outer, registry, "graph/subgraph");

    outer
        .with_subgraph(sub, |level1| {
            let x = boundary(level1, registry, "graph/input", "x");
            let inner = add(level1, registry, "graph/subgraph");
            level1
                .with_subgraph(inner, |level2| {
                    let y = boundary(level2, registry, "graph/input", "y");
                    let z = boundary(level2, registry, "graph/output", "z");
                    level2.connect(y, 0, z, 0).unwrap().unwrap();
                })
                .unwrap();
            let w = boundary(level1, registry, "graph/output", "w");
            level1.connect(x, 0, inner, 0).unwrap().unwrap();
            level1.connect(inner, 0, w, 0).unwrap().unwrap();
        })
        .unwrap();

    let watch = add(&mut outer, registry, "basic/watch");
    outer.connect(source, 0, sub, 0).unwrap().unwrap();
    outer.connect(sub, 0, watch, 0).unwrap().unwrap();
    (outer, sub, watch)
}

fn all_ids(data: &GraphData) -> HashSet<NodeId> {
    let mut ids = HashSet::new();
    data.walk(&mut |_, node| {
        ids.extend(node.id);
    });
    ids
}

/// Type names and link endpoints by slot, level by level
fn shape(data: &GraphData) -> Vec<String> {
    let mut out = Vec::new();
    let position: Vec<Option<NodeId>> = data.nodes.iter().map(|n| n.id).collect();
    for node in &data.nodes {
        out.push(node.type_name.clone());
        if let Some(inner) = &node.subgraph {
            out.push("{".to_string());
            out.extend(shape(inner));
            out.push("}".to_string());
        }
    }
    for link in &data.links {
        let origin = position.iter().position(|id| *id == Some(link.1));
        let target = position.iter().position(|id| *id == Some(link.3));
        out.push(format!("{origin:?}:{}->{target:?}:{}", link.2, link.4));
    }
    out
}

#[test]
fn test_values_flow_through_two_levels() {
    let registry = create_default_registry();
    let (mut graph, sub, watch) = nested(&registry, EngineConfig::default());

    let node = graph.node(sub).unwrap();
    assert_eq!(node.input(0).unwrap().name, "x");
    assert_eq!(node.output(0).unwrap().name, "w");

    graph.run_step(1);
    assert_eq!(graph.output_value(sub, 0), Some(&json!(3.0)));
    assert_eq!(graph.input_value(watch, 0), Some(&json!(3.0)));
}

#[test]
fn test_nested_round_trip() {
    let registry = create_default_registry();
    let (mut graph, sub, _) = nested(&registry, EngineConfig::default());
    graph.run_step(1);
    let data = graph.serialize();

    let from_json = Graph::from_json(&graph.to_json().unwrap(), &registry).unwrap();
    assert_eq!(from_json.serialize(), data);

    let mut from_ron = Graph::from_ron(&graph.to_ron().unwrap(), &registry).unwrap();
    assert_eq!(from_ron.serialize(), data);

    from_ron.run_step(1);
    assert_eq!(from_ron.output_value(sub, 0), Some(&json!(3.0)));
}

#[test]
fn test_duplicate_has_fresh_ids_and_same_shape() {
    let registry = create_default_registry();
    let (graph, _, _) = nested(&registry, EngineConfig::default());
    let original = graph.serialize();

    let mut copy = graph.duplicate(&registry).unwrap();
    let copied = copy.serialize();

    assert!(all_ids(&original).is_disjoint(&all_ids(&copied)));
    assert_eq!(shape(&original), shape(&copied));

    copy.run_step(1);
    let sub = copied.nodes[1].id.unwrap();
    assert_eq!(copy.output_value(sub, 0), Some(&json!(3.0)));
}

fn clone_scope(scope: RemapScope) -> Vec<NodeId> {
    let registry = create_default_registry();
    let mut graph = Graph::with_config(EngineConfig {
        remap_scope: scope,
        ..EngineConfig::default()
    });
    for _ in 0..5 {
        add(&mut graph, &registry, "basic/const");
    }
    let sub = add(&mut graph, &registry, "graph/subgraph");
    graph
        .with_subgraph(sub, |inner| {
            boundary(inner, &registry, "graph/input", "x");
        })
        .unwrap();

    let copy = graph.clone_node(sub, &registry).unwrap();
    let inner = graph.node(copy).unwrap().subgraph().unwrap();
    let ids = inner.node_ids().collect();
    ids
}

#[test]
fn test_remap_scope_choices() {
    // Call scope only avoids the copied record's own IDs
    assert_eq!(clone_scope(RemapScope::Call), vec![NodeId::Index(2)]);
    // Tree scope also avoids every ID live in the host graph
    assert_eq!(clone_scope(RemapScope::Tree), vec![NodeId::Index(7)]);
}

#[test]
fn test_disabled_subgraph_keeps_outputs() {
    let registry = create_default_registry();
    let (mut graph, sub, _) = nested(&registry, EngineConfig::default());
    let source = graph.node_ids().next().unwrap();

    graph.run_step(1);
    assert_eq!(graph.output_value(sub, 0), Some(&json!(3.0)));

    graph.set_property(sub, "enabled", json!(false)).unwrap();
    graph.set_property(source, "value", json!(8)).unwrap();
    graph.run_step(1);
    assert_eq!(graph.output_value(sub, 0), Some(&json!(3.0)));

    graph.set_property(sub, "enabled", json!(true)).unwrap();
    graph.run_step(1);
    assert_eq!(graph.output_value(sub, 0), Some(&json!(8.0)));
}

#[test]
fn test_events_cross_the_boundary() {
    let registry = create_default_registry();
    let mut graph = Graph::new();
    let source = add(&mut graph, &registry, "logic/IF");
    let sub = add(&mut graph, &registry, "graph/subgraph");
    let toggle = add(&mut graph, &registry, "basic/boolean");

    graph
        .with_subgraph(sub, |inner| {
            let go = boundary(inner, &registry, "graph/input", "go");
            inner.set_property(go, "type", json!("event")).unwrap();
            let done = boundary(inner, &registry, "graph/output", "done");
            inner.set_property(done, "type", json!("event")).unwrap();
            inner.connect(go, 0, done, 0).unwrap().unwrap();
        })
        .unwrap();
    assert!(graph.node(sub).unwrap().input(0).unwrap().slot_type.is_event());

    graph.connect(source, 1, sub, 0).unwrap().unwrap();
    graph.connect(sub, 0, toggle, 0).unwrap().unwrap();

    let trace = graph.trigger_slot(source, 1, None).unwrap();
    assert!(trace.reached_nodes().contains(&toggle));
    assert_eq!(graph.node(toggle).unwrap().property("value"), Some(&Value::Bool(false)));
}

#[test]
fn test_boundary_values_from_the_host() {
    let registry = create_default_registry();
    let mut graph = Graph::new();
    let input = boundary(&mut graph, &registry, "graph/input", "gain");
    let output = boundary(&mut graph, &registry, "graph/output", "result");
    graph.connect(input, 0, output, 0).unwrap().unwrap();

    graph.set_boundary_input_value("gain", Some(json!(0.5)));
    graph.run_step(1);
    assert_eq!(
        graph.boundary_output("result").and_then(|entry| entry.value.clone()),
        Some(json!(0.5))
    );
}
