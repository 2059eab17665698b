// SPDX-License-Identifier: MIT OR Apache-2.0
//! End-to-end behavior of the scheduler, links and event propagation.

use flowgraph_core::{
    create_default_registry, EngineConfig, EventGuard, Graph, GraphStatus, Node, NodeBehavior, NodeContext,
    NodeError, NodeId, NodeRegistry, Value,
};
use serde_json::json;

fn add(graph: &mut Graph, registry: &NodeRegistry, type_name: &str) -> NodeId {
    graph.add_node(registry.create_node(type_name).unwrap())
}

fn constant(graph: &mut Graph, registry: &NodeRegistry, type_name: &str, value: Value) -> NodeId {
    let id = add(graph, registry, type_name);
    graph.set_property(id, "value", value).unwrap();
    id
}

#[test]
fn test_start_step_stop() {
    let registry = create_default_registry();
    let mut graph = Graph::new();
    let time = add(&mut graph, &registry, "basic/time");

    assert_eq!(graph.status(), GraphStatus::Stopped);
    assert!(!graph.update());
    assert_eq!(graph.iteration(), 0);

    graph.run_step(2);
    assert_eq!(graph.iteration(), 2);
    assert_eq!(graph.status(), GraphStatus::Stopped);

    graph.start();
    assert!(graph.is_running());
    assert!(graph.update());
    assert!(graph.update());
    assert_eq!(graph.iteration(), 4);
    assert!((graph.global_time() - 0.04).abs() < 1e-9);
    assert!(graph.output_value(time, 1).is_some());

    graph.stop();
    assert!(!graph.update());
    assert_eq!(graph.iteration(), 4);
}

#[test]
fn test_selector_and_gates() {
    let registry = create_default_registry();
    let mut graph = Graph::new();
    let sel = constant(&mut graph, &registry, "basic/const", json!(5));
    let a = constant(&mut graph, &registry, "basic/string", json!("A"));
    let b = constant(&mut graph, &registry, "basic/string", json!("B"));
    let selector = add(&mut graph, &registry, "logic/selector");
    graph.connect(sel, 0, selector, 0).unwrap().unwrap();
    graph.connect(a, 0, selector, 1).unwrap().unwrap();
    graph.connect(b, 0, selector, 2).unwrap().unwrap();

    let yes = constant(&mut graph, &registry, "basic/boolean", json!(true));
    let no = constant(&mut graph, &registry, "basic/boolean", json!(false));
    let and = add(&mut graph, &registry, "logic/AND");
    let or = add(&mut graph, &registry, "logic/OR");
    for gate in [and, or] {
        graph.connect(yes, 0, gate, 0).unwrap().unwrap();
        graph.connect(no, 0, gate, 1).unwrap().unwrap();
    }

    graph.run_step(1);
    assert_eq!(graph.output_value(selector, 0), Some(&json!("B")));
    assert_eq!(graph.output_value(and, 0), Some(&json!(false)));
    assert_eq!(graph.output_value(or, 0), Some(&json!(true)));
}

#[test]
fn test_connect_replaces_existing_input_link() {
    let registry = create_default_registry();
    let mut graph = Graph::new();
    let first = constant(&mut graph, &registry, "basic/const", json!(1));
    let second = constant(&mut graph, &registry, "basic/const", json!(2));
    let watch = add(&mut graph, &registry, "basic/watch");

    let old = graph.connect(first, 0, watch, 0).unwrap().unwrap();
    let new = graph.connect(second, 0, watch, 0).unwrap().unwrap();

    assert_ne!(old, new);
    assert_eq!(graph.link_count(), 1);
    assert!(graph.link(old).is_none());
    assert!(graph.node(first).unwrap().output(0).unwrap().links.is_empty());
    assert_eq!(graph.node(watch).unwrap().input(0).unwrap().link, Some(new));

    graph.run_step(1);
    assert_eq!(graph.input_value(watch, 0), Some(&json!(2.0)));
}

#[test]
fn test_incompatible_connect_is_refused() {
    let registry = create_default_registry();
    let mut graph = Graph::new();
    let number = add(&mut graph, &registry, "basic/const");
    let branch = add(&mut graph, &registry, "logic/IF");

    assert_eq!(graph.connect(number, 0, branch, 0).unwrap(), None);
    assert_eq!(graph.link_count(), 0);
}

#[test]
fn test_trigger_reaches_event_chain_only() {
    let registry = create_default_registry();
    let mut graph = Graph::new();
    let source = add(&mut graph, &registry, "logic/IF");
    let first = add(&mut graph, &registry, "logic/IF");
    let second = add(&mut graph, &registry, "logic/IF");
    let sink = add(&mut graph, &registry, "basic/console");
    let untouched = add(&mut graph, &registry, "basic/console");
    let watch = add(&mut graph, &registry, "basic/watch");

    // Without a condition both branches take their `false` output
    graph.connect(source, 1, first, 0).unwrap().unwrap();
    graph.connect(first, 1, second, 0).unwrap().unwrap();
    graph.connect(second, 1, sink, 0).unwrap().unwrap();
    graph.connect(first, 0, untouched, 0).unwrap().unwrap();
    graph.connect(source, 1, watch, 0).unwrap().unwrap();

    let trace = graph.trigger_slot(source, 1, Some(json!("ping"))).unwrap();
    let reached = trace.reached_nodes();
    assert!(reached.contains(&first));
    assert!(reached.contains(&second));
    assert!(reached.contains(&sink));
    assert!(reached.contains(&watch));
    assert!(!reached.contains(&untouched));
    assert_eq!(trace.fired_links().len(), 4);
}

/// Counts the actions it receives in its `count` property
#[derive(Debug)]
struct Counter;

impl NodeBehavior for Counter {
    fn on_action(&mut self, _action: &str, _param: Option<&Value>, cx: &mut NodeContext<'_>) -> Result<(), NodeError> {
        let count = cx.property("count").and_then(Value::as_u64).unwrap_or(0);
        cx.set_property("count", json!(count + 1));
        Ok(())
    }
}

/// source fans out to two branches that both end on one counter, each
/// through its own event input
fn diamond(guard: EventGuard) -> u64 {
    let registry = create_default_registry();
    let mut graph = Graph::with_config(EngineConfig {
        event_guard: guard,
        ..EngineConfig::default()
    });
    let source = add(&mut graph, &registry, "logic/IF");
    let left = add(&mut graph, &registry, "logic/IF");
    let right = add(&mut graph, &registry, "logic/IF");
    let counter = graph.add_node(
        Node::new("test/counter", Counter)
            .with_input("first", "action")
            .with_input("second", "action")
            .with_property("count", 0),
    );
    graph.connect(source, 1, left, 0).unwrap().unwrap();
    graph.connect(source, 1, right, 0).unwrap().unwrap();
    graph.connect(left, 1, counter, 0).unwrap().unwrap();
    graph.connect(right, 1, counter, 1).unwrap().unwrap();
    assert_eq!(graph.link_count(), 4);

    let trace = graph.trigger_slot(source, 1, None).unwrap();
    assert_eq!(trace.fired_links().len(), 4);
    graph.node(counter).unwrap().property("count").and_then(Value::as_u64).unwrap()
}

#[test]
fn test_event_guard_choices() {
    // Each link fires once; only the per-node guard also dedupes the counter
    assert_eq!(diamond(EventGuard::PerLink), 2);
    assert_eq!(diamond(EventGuard::PerNode), 1);
}

#[test]
fn test_faulty_node_does_not_abort_pass() {
    let registry = create_default_registry();
    let mut graph = Graph::new();
    let compare = add(&mut graph, &registry, "basic/CompareValues");
    graph.set_property(compare, "OP", json!("<>")).unwrap();
    let after = constant(&mut graph, &registry, "basic/const", json!(3));

    graph.run_step(1);
    assert_eq!(graph.output_value(compare, 0), None);
    assert_eq!(graph.output_value(after, 0), Some(&json!(3.0)));
}
