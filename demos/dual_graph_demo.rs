//! Demonstration of the dual graph
//!
//! This example shows:
//! - Building a dual graph from YAML settings
//! - Nested write transactions, commit and rollback
//! - Readers working while a writer holds the lock
//! - Primary key validation with merging
//! - Commit listeners

use anyhow::Result;
use dualgraph::{
    AttributeType, CommitEvent, CommitListener, DualGraphConfig, ElementType, GraphReadMethods,
    GraphWriteMethods,
};
use std::sync::Arc;
use std::thread;

struct PrintingListener;

impl CommitListener for PrintingListener {
    fn graph_committed(&self, event: &CommitEvent) {
        println!(
            "   -> committed '{}' ({} edits, global counter {})",
            event.name,
            event.edits,
            event.counters.global()
        );
    }
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    println!("=== Dual Graph Demo ===\n");

    // 1. Configure
    println!("1. Building graph from settings");
    let config = DualGraphConfig::from_yaml_str("schema: bare\nvertex_capacity: 128\n")?;
    let graph = config.build()?;
    graph.add_commit_listener(Arc::new(PrintingListener));
    println!("   Graph {} with schema '{}'\n", graph.id(), config.schema);

    // 2. Write with a nested transaction
    println!("2. Adding airports and a route");
    let mut wg = graph.get_writable_graph("Add airports", true)?;
    let code = wg.add_attribute(ElementType::Vertex, AttributeType::String, "code", "Airport code", None, None)?;
    let city = wg.add_attribute(ElementType::Vertex, AttributeType::String, "city", "City served", None, None)?;
    let minutes = wg.add_attribute(ElementType::Transaction, AttributeType::Integer, "minutes", "Flight time", None, None)?;
    wg.set_primary_key(ElementType::Vertex, &[code])?;

    let syd = wg.add_vertex()?;
    wg.set_string_value(code, syd, "SYD".to_string())?;
    let mel = wg.add_vertex()?;
    wg.set_string_value(code, mel, "MEL".to_string())?;

    let mut route = graph.get_writable_graph("Add route", false)?;
    let flight = route.add_transaction(syd, mel, true)?;
    route.set_int_value(minutes, flight, 85)?;
    route.commit()?;
    wg.commit()?;

    // 3. Read while another thread writes
    println!("\n3. Reading while a writer is busy");
    let writer = {
        let graph = graph.clone();
        thread::spawn(move || -> dualgraph::GraphResult<()> {
            let mut wg = graph.get_writable_graph("Add duplicate", true)?;
            let dup = wg.add_vertex()?;
            wg.set_string_value(code, dup, "SYD".to_string())?;
            wg.set_string_value(city, dup, "Sydney".to_string())?;
            wg.commit()
        })
    };
    {
        let rg = graph.get_readable_graph();
        println!(
            "   Reader sees {} vertices and {} transactions",
            rg.vertex_count()?,
            rg.transaction_count()?
        );
    }
    writer
        .join()
        .map_err(|_| anyhow::anyhow!("writer thread panicked"))??;

    // 4. Merge duplicate keys
    println!("\n4. Validating airport codes");
    let mut wg = graph.get_writable_graph("Merge airports", true)?;
    wg.validate_key(ElementType::Vertex, true)?;
    wg.commit()?;
    let rg = graph.get_readable_graph();
    println!(
        "   {} vertices remain, SYD serves '{}'",
        rg.vertex_count()?,
        rg.get_string_value(city, syd)?
    );
    drop(rg);

    // 5. Roll back
    println!("\n5. Rolling back an unwanted edit");
    let mut wg = graph.get_writable_graph("Remove SYD", true)?;
    wg.remove_vertex(syd)?;
    wg.roll_back()?;
    let rg = graph.get_readable_graph();
    println!("   Still {} vertices after rollback", rg.vertex_count()?);

    println!("\n{:?}", graph.lock_snapshot());
    Ok(())
}
