//! Benchmarks for reachability closures and sub-graph extraction.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use warren::graph::Graph;

/// node_0 -> node_1 -> ... -> node_{n-1}
fn build_linear_graph(node_count: usize) -> Graph<String> {
    let graph = Graph::new();
    for index in 0..node_count.saturating_sub(1) {
        graph.add_edge(format!("node_{index}"), format!("node_{}", index + 1));
    }
    graph
}

/// root -> worker_i -> sink, for `width` workers.
fn build_fanout_graph(width: usize) -> Graph<String> {
    let graph = Graph::new();
    for index in 0..width {
        graph.add_edge("root".to_string(), format!("worker_{index}"));
        graph.add_edge(format!("worker_{index}"), "sink".to_string());
    }
    graph
}

/// `depth` layers of `width` nodes, each node feeding one node of the next
/// layer.
fn build_layered_graph(depth: usize, width: usize) -> Graph<String> {
    let graph = Graph::new();
    for layer in 0..depth.saturating_sub(1) {
        for index in 0..width {
            graph.add_edge(
                format!("L{layer}_N{index}"),
                format!("L{}_N{index}", layer + 1),
            );
        }
    }
    graph
}

fn bench_closures(c: &mut Criterion) {
    let mut group = c.benchmark_group("closures");

    for size in [10, 100, 1000] {
        let graph = build_linear_graph(size);
        let head = "node_0".to_string();
        group.bench_with_input(BenchmarkId::new("downstream_linear", size), &size, |b, _| {
            b.iter(|| graph.downstream(&head));
        });
    }

    for width in [10, 100, 1000] {
        let graph = build_fanout_graph(width);
        let sink = "sink".to_string();
        group.bench_with_input(BenchmarkId::new("upstream_fanout", width), &width, |b, _| {
            b.iter(|| graph.upstream(&sink));
        });
    }

    group.finish();
}

fn bench_subgraph(c: &mut Criterion) {
    let mut group = c.benchmark_group("subgraph");

    for (depth, width) in [(5, 10), (10, 10), (5, 50)] {
        let graph = build_layered_graph(depth, width);
        group.bench_with_input(
            BenchmarkId::new("select_defaults", format!("{depth}x{width}")),
            &(depth, width),
            |b, _| {
                b.iter(|| graph.subgraph(None, None));
            },
        );
    }

    group.finish();
}

fn bench_subgraph_edges(c: &mut Criterion) {
    let mut group = c.benchmark_group("subgraph_edges");

    for (depth, width) in [(5, 10), (10, 10), (5, 50)] {
        let graph = build_layered_graph(depth, width);
        let sub = graph.subgraph(None, None);
        group.bench_with_input(
            BenchmarkId::new("enumerate", format!("{depth}x{width}")),
            &(depth, width),
            |b, _| {
                b.iter(|| graph.subgraph_edges(&sub));
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_closures, bench_subgraph, bench_subgraph_edges);
criterion_main!(benches);
