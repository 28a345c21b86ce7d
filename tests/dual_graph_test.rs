//! Integration tests for dual graph transactions
//!
//! Verifies commit publication, rollback, nesting and handle misuse.

use dualgraph::{
    AttributeType, AttributeValue, DualGraph, ElementId, ElementType, Graph, GraphError,
    GraphReadMethods, GraphWriteMethods,
};

fn name_attribute(graph: &DualGraph) -> dualgraph::AttributeId {
    let mut wg = graph.get_writable_graph("Add name", true).unwrap();
    let name = wg
        .add_attribute(ElementType::Vertex, AttributeType::String, "name", "Vertex name", None, None)
        .unwrap();
    wg.commit().unwrap();
    name
}

#[test]
fn test_hello_scenario() {
    let graph = DualGraph::new(Graph::new());
    let name = name_attribute(&graph);

    let mut wg = graph.get_writable_graph("Add vertex", true).unwrap();
    let v = wg.add_vertex().unwrap();
    wg.set_string_value(name, v, "Hello".to_string()).unwrap();
    wg.commit().unwrap();

    let mut rg = graph.get_readable_graph();
    assert_eq!(rg.vertex_count().unwrap(), 1);
    assert_eq!(rg.get_string_value(name, v).unwrap(), "Hello");
    let before = rg.global_modification_counter().unwrap();
    rg.release().unwrap();

    // Writing the value it already holds is not a modification
    let mut wg = graph.get_writable_graph("No-op", false).unwrap();
    wg.set_string_value(name, v, "Hello".to_string()).unwrap();
    wg.commit().unwrap();

    let rg = graph.get_readable_graph();
    assert_eq!(rg.global_modification_counter().unwrap(), before);
}

#[test]
fn test_commit_counter_equivalence() {
    let graph = DualGraph::new(Graph::new());
    let name = name_attribute(&graph);

    let mut wg = graph.get_writable_graph("Build", true).unwrap();
    let a = wg.add_vertex().unwrap();
    let b = wg.add_vertex().unwrap();
    wg.add_transaction(a, b, true).unwrap();
    wg.add_transaction(b, a, false).unwrap();
    wg.set_string_value(name, a, "a".to_string()).unwrap();
    wg.remove_vertex(b).unwrap();
    let expected = wg.modification_counters().unwrap();
    wg.commit().unwrap();

    let rg = graph.get_readable_graph();
    assert_eq!(rg.modification_counters().unwrap(), expected);
    assert_eq!(rg.vertex_count().unwrap(), 1);
    assert_eq!(rg.transaction_count().unwrap(), 0);
}

#[test]
fn test_both_targets_converge() {
    let graph = DualGraph::new(Graph::new());
    let name = name_attribute(&graph);

    for round in 0..4 {
        let mut wg = graph.get_writable_graph("Round", true).unwrap();
        let v = wg.add_vertex().unwrap();
        wg.set_string_value(name, v, format!("v{}", round)).unwrap();
        if round % 2 == 1 {
            let first = wg.vertex(0).unwrap().unwrap();
            wg.add_transaction(first, v, true).unwrap();
        }
        wg.commit().unwrap();
    }

    let published = {
        let rg = graph.get_readable_graph();
        (
            rg.vertex_count().unwrap(),
            rg.transaction_count().unwrap(),
            rg.modification_counters().unwrap(),
        )
    };

    // The write target is the replayed former read target
    let mut wg = graph.get_writable_graph("Inspect", false).unwrap();
    assert_eq!(wg.vertex_count().unwrap(), published.0);
    assert_eq!(wg.transaction_count().unwrap(), published.1);
    assert_eq!(wg.modification_counters().unwrap(), published.2);
    for position in 0..published.0 {
        let v = wg.vertex(position).unwrap().unwrap();
        assert_eq!(wg.get_string_value(name, v).unwrap(), format!("v{}", v.as_u32()));
    }
    wg.roll_back().unwrap();
}

#[test]
fn test_rollback_leaves_read_target_unchanged() {
    let graph = DualGraph::new(Graph::new());
    let name = name_attribute(&graph);
    let mut wg = graph.get_writable_graph("Seed", true).unwrap();
    let v = wg.add_vertex().unwrap();
    wg.set_string_value(name, v, "kept".to_string()).unwrap();
    wg.commit().unwrap();

    let before = graph.get_readable_graph().modification_counters().unwrap();

    let mut wg = graph.get_writable_graph("Discard", true).unwrap();
    let w = wg.add_vertex().unwrap();
    wg.add_transaction(v, w, false).unwrap();
    wg.set_string_value(name, v, "changed".to_string()).unwrap();
    wg.remove_attribute(name).unwrap();
    wg.roll_back().unwrap();

    let rg = graph.get_readable_graph();
    assert_eq!(rg.modification_counters().unwrap(), before);
    assert_eq!(rg.vertex_count().unwrap(), 1);
    assert_eq!(rg.get_string_value(name, v).unwrap(), "kept");
    drop(rg);

    // The write target was restored as well
    let mut wg = graph.get_writable_graph("Check", false).unwrap();
    assert_eq!(wg.modification_counters().unwrap(), before);
    assert_eq!(wg.get_string_value(name, v).unwrap(), "kept");
    assert_eq!(wg.transaction_count().unwrap(), 0);
    wg.commit().unwrap();
}

#[test]
fn test_nesting_is_transparent() {
    let nested = DualGraph::new(Graph::new());
    let flat = DualGraph::new(Graph::new());

    let mut outer = nested.get_writable_graph("Outer", true).unwrap();
    let a = outer.add_vertex().unwrap();
    let mut inner = nested.get_writable_graph("Inner", false).unwrap();
    assert_eq!(inner.depth(), 2);
    let b = inner.add_vertex().unwrap();
    inner.add_transaction(a, b, true).unwrap();
    inner.commit().unwrap();
    outer.commit().unwrap();

    let mut wg = flat.get_writable_graph("Single", true).unwrap();
    let a2 = wg.add_vertex().unwrap();
    let b2 = wg.add_vertex().unwrap();
    wg.add_transaction(a2, b2, true).unwrap();
    wg.commit().unwrap();

    let left = nested.get_readable_graph();
    let right = flat.get_readable_graph();
    assert_eq!(left.modification_counters().unwrap(), right.modification_counters().unwrap());
    assert_eq!(left.vertex_count().unwrap(), right.vertex_count().unwrap());
    assert_eq!(left.link_count().unwrap(), right.link_count().unwrap());
}

#[test]
fn test_inner_rollback_keeps_outer_changes() {
    let graph = DualGraph::new(Graph::new());
    let mut outer = graph.get_writable_graph("Outer", true).unwrap();
    let a = outer.add_vertex().unwrap();
    let after_outer = outer.modification_counters().unwrap();

    let mut inner = graph.get_writable_graph("Inner", true).unwrap();
    inner.add_vertex().unwrap();
    inner.add_vertex().unwrap();
    inner.roll_back().unwrap();

    assert_eq!(outer.vertex_count().unwrap(), 1);
    assert!(outer.has_vertex(a).unwrap());
    assert_eq!(outer.modification_counters().unwrap(), after_outer);
    outer.commit().unwrap();

    assert_eq!(graph.get_readable_graph().vertex_count().unwrap(), 1);
}

#[test]
fn test_outer_commit_with_open_inner_fails() {
    let graph = DualGraph::new(Graph::new());
    let mut outer = graph.get_writable_graph("Outer", true).unwrap();
    let mut inner = graph.get_writable_graph("Inner", true).unwrap();

    assert!(matches!(outer.commit(), Err(GraphError::IllegalState(_))));
    inner.commit().unwrap();
    outer.commit().unwrap();
    assert!(matches!(outer.commit(), Err(GraphError::IllegalState(_))));
    assert!(matches!(outer.roll_back(), Err(GraphError::IllegalState(_))));
}

#[test]
fn test_release_is_not_idempotent() {
    let graph = DualGraph::new(Graph::new());
    let mut rg = graph.get_readable_graph();
    rg.release().unwrap();
    assert!(rg.is_released());
    assert!(matches!(rg.release(), Err(GraphError::IllegalState(_))));
    assert!(matches!(rg.vertex_count(), Err(GraphError::IllegalState(_))));
    assert_eq!(graph.lock_snapshot().readers, 0);
}

#[test]
fn test_write_while_reading_fails() {
    let graph = DualGraph::new(Graph::new());
    let rg = graph.get_readable_graph();
    assert!(matches!(
        graph.get_writable_graph("Blocked", true),
        Err(GraphError::IllegalState(_))
    ));
    drop(rg);
    assert!(graph.get_writable_graph("Granted", true).is_ok());
}

#[test]
fn test_reader_on_writer_thread_sees_committed_state() {
    let graph = DualGraph::new(Graph::new());
    let mut wg = graph.get_writable_graph("Pending", true).unwrap();
    wg.add_vertex().unwrap();

    let rg = graph.get_readable_graph();
    assert_eq!(rg.vertex_count().unwrap(), 0);
    assert!(matches!(wg.commit(), Err(GraphError::IllegalState(_))));
    drop(rg);
    wg.commit().unwrap();
    assert_eq!(graph.get_readable_graph().vertex_count().unwrap(), 1);
}

#[test]
fn test_flush_publishes_and_keeps_lock() {
    let graph = DualGraph::new(Graph::new());
    let mut wg = graph.get_writable_graph("Batch", true).unwrap();
    wg.add_vertex().unwrap();
    wg.flush().unwrap();
    assert_eq!(graph.get_readable_graph().vertex_count().unwrap(), 1);
    assert_eq!(graph.lock_snapshot().writer_depth, 1);

    // Rollback only discards what came after the flush
    wg.add_vertex().unwrap();
    wg.roll_back().unwrap();
    assert_eq!(graph.get_readable_graph().vertex_count().unwrap(), 1);
    assert_eq!(graph.lock_snapshot().writer_depth, 0);
}

#[test]
fn test_graph_level_attributes() {
    let graph = DualGraph::new(Graph::new());
    let mut wg = graph.get_writable_graph("Title", true).unwrap();
    let title = wg
        .add_attribute(ElementType::Graph, AttributeType::String, "title", "", None, None)
        .unwrap();
    wg.set_value(title, ElementId::GRAPH, "Flights").unwrap();
    wg.commit().unwrap();

    let rg = graph.get_readable_graph();
    assert_eq!(rg.element_count(ElementType::Graph).unwrap(), 1);
    assert_eq!(
        rg.get_value(title, ElementId::GRAPH).unwrap(),
        AttributeValue::String("Flights".to_string())
    );
}

#[test]
fn test_deserialization_setters_reach_readers() {
    let graph = DualGraph::new(Graph::new());
    let name = name_attribute(&graph);
    let mut wg = graph.get_writable_graph("Load", true).unwrap();
    wg.set_modification_counters(100, 40, 20).unwrap();
    wg.set_value_modification_counter(name, 7).unwrap();
    wg.commit().unwrap();

    let rg = graph.get_readable_graph();
    assert_eq!(rg.global_modification_counter().unwrap(), 100);
    assert_eq!(rg.structure_modification_counter().unwrap(), 40);
    assert_eq!(rg.attribute_modification_counter().unwrap(), 20);
    assert_eq!(rg.value_modification_counter(name).unwrap(), 7);
}

#[test]
fn test_dropping_outer_handle_discards_open_inner_handles() {
    let graph = DualGraph::new(Graph::new());
    let before = graph.get_readable_graph().global_modification_counter().unwrap();

    let outer = graph.get_writable_graph("Outer", true).unwrap();
    outer.add_vertex().unwrap();
    let mut inner = graph.get_writable_graph("Inner", false).unwrap();
    inner.add_vertex().unwrap();

    drop(outer);
    assert_eq!(graph.lock_snapshot().writer_depth, 0);
    assert!(matches!(inner.commit(), Err(GraphError::IllegalState(_))));
    assert!(matches!(inner.add_vertex(), Err(GraphError::IllegalState(_))));
    drop(inner);

    let other = {
        let graph = graph.clone();
        std::thread::spawn(move || {
            let granted = graph
                .try_get_writable_graph("Other", true, std::time::Duration::from_millis(200))
                .unwrap();
            granted.map(|mut wg| {
                let count = wg.vertex_count().unwrap();
                wg.roll_back().unwrap();
                count
            })
        })
    };
    assert_eq!(other.join().unwrap(), Some(0));

    let rg = graph.get_readable_graph();
    assert_eq!(rg.vertex_count().unwrap(), 0);
    assert_eq!(rg.global_modification_counter().unwrap(), before);
}

#[test]
fn test_dropping_middle_handle_keeps_outer_open() {
    let graph = DualGraph::new(Graph::new());
    let mut outer = graph.get_writable_graph("Outer", true).unwrap();
    let kept = outer.add_vertex().unwrap();

    let middle = graph.get_writable_graph("Middle", false).unwrap();
    middle.add_vertex().unwrap();
    let inner = graph.get_writable_graph("Inner", false).unwrap();
    inner.add_vertex().unwrap();

    drop(middle);
    assert_eq!(graph.lock_snapshot().writer_depth, 1);
    drop(inner);
    assert_eq!(graph.lock_snapshot().writer_depth, 1);

    outer.commit().unwrap();
    let rg = graph.get_readable_graph();
    assert_eq!(rg.vertex_count().unwrap(), 1);
    assert!(rg.has_vertex(kept).unwrap());
}
