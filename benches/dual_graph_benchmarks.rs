use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use dualgraph::{
    AttributeType, DualGraph, ElementType, Graph, GraphReadMethods, GraphWriteMethods,
};

/// Benchmark commit throughput, including replay onto the former read target
fn bench_commit(c: &mut Criterion) {
    let mut group = c.benchmark_group("commit");

    for size in [10, 100, 1000].iter() {
        let graph = DualGraph::new(Graph::new());
        let name = {
            let mut wg = graph.get_writable_graph("Setup", true).unwrap();
            let name = wg
                .add_attribute(ElementType::Vertex, AttributeType::String, "name", "", None, None)
                .unwrap();
            wg.commit().unwrap();
            name
        };

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| {
                let mut wg = graph.get_writable_graph("Batch", true).unwrap();
                let mut previous = None;
                for i in 0..size {
                    let v = wg.add_vertex().unwrap();
                    wg.set_string_value(name, v, format!("Vertex{}", i)).unwrap();
                    if let Some(p) = previous {
                        wg.add_transaction(p, v, true).unwrap();
                    }
                    previous = Some(v);
                }
                wg.commit().unwrap();
            });
        });
    }
    group.finish();
}

/// Benchmark rolling back a batch of edits
fn bench_roll_back(c: &mut Criterion) {
    let mut group = c.benchmark_group("roll_back");

    for size in [10, 100, 1000].iter() {
        let graph = DualGraph::new(Graph::new());

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| {
                let mut wg = graph.get_writable_graph("Discard", true).unwrap();
                for _ in 0..size {
                    wg.add_vertex().unwrap();
                }
                wg.roll_back().unwrap();
            });
        });
    }
    group.finish();
}

/// Benchmark read handle acquisition and a small query
fn bench_read(c: &mut Criterion) {
    let graph = DualGraph::new(Graph::new());
    {
        let mut wg = graph.get_writable_graph("Setup", true).unwrap();
        for _ in 0..1000 {
            wg.add_vertex().unwrap();
        }
        wg.commit().unwrap();
    }

    c.bench_function("read_handle", |b| {
        b.iter(|| {
            let rg = graph.get_readable_graph();
            criterion::black_box(rg.vertex_count().unwrap());
        });
    });
}

criterion_group!(benches, bench_commit, bench_roll_back, bench_read);
criterion_main!(benches);
