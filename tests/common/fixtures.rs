#![allow(dead_code)]

use std::sync::Arc;

use warren::graph::Graph;

/// Shorthand for owned node names in test graphs.
pub fn s(name: &str) -> String {
    name.to_string()
}

/// Builds a graph from string edge pairs.
pub fn graph_of(edges: &[(&str, &str)]) -> Arc<Graph<String>> {
    let graph = Graph::new();
    for (pre, suc) in edges {
        graph.add_edge((*pre).to_string(), (*suc).to_string());
    }
    Arc::new(graph)
}

/// Two-level fan-out with one cross edge:
///
/// ```text
/// a -> b0 -> {c00 -> dx0, c01 -> dx1}, b0 -> dx1
/// a -> b1 -> {c10 -> dx0, c11 -> dx1}
/// ```
pub fn branching_graph() -> Arc<Graph<String>> {
    graph_of(&[
        ("a", "b0"),
        ("a", "b1"),
        ("b0", "c00"),
        ("b0", "c01"),
        ("b1", "c10"),
        ("b1", "c11"),
        ("c00", "dx0"),
        ("c01", "dx1"),
        ("c10", "dx0"),
        ("c11", "dx1"),
        ("b0", "dx1"),
    ])
}

fn tier(prefix: &str, level: usize, index: usize) -> String {
    format!("{prefix}{level}-{index}")
}

/// Edges of a pyramid `depth` levels deep with the given `fanout`.
///
/// The upper half fans out away from a single apex; the lower half mirrors
/// it, contracting toward a single sink. Both halves share an `X`-prefixed
/// widest row so that gluing them yields a diamond.
pub fn pyramid_edges(depth: usize, fanout: usize, upper: bool) -> Vec<(String, String)> {
    let prefix = if upper { "U" } else { "L" };
    let mut edges = Vec::new();
    for level in 1..depth {
        let row_prefix = if level + 1 == depth { "X" } else { prefix };
        let row = fanout.pow(level as u32);
        for index in 0..row {
            let current = tier(row_prefix, level, index);
            let parent = tier(prefix, level - 1, index / fanout);
            if upper {
                edges.push((parent, current));
            } else {
                edges.push((current, parent));
            }
        }
    }
    edges
}

/// A diamond: an upper pyramid fanning out from `U0-0` glued at its widest
/// row to a lower pyramid contracting to `L0-0`.
pub fn diamond_edges(half_depth: usize, fanout: usize) -> Vec<(String, String)> {
    let mut edges = pyramid_edges(half_depth, fanout, true);
    edges.extend(pyramid_edges(half_depth, fanout, false));
    edges
}

/// Builds a graph from owned edge pairs (generator output).
pub fn graph_from_edges(edges: &[(String, String)]) -> Arc<Graph<String>> {
    let graph = Graph::new();
    for (pre, suc) in edges {
        graph.add_edge(pre.clone(), suc.clone());
    }
    Arc::new(graph)
}
