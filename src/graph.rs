//! Dependency graph storage and reachability queries.
//!
//! [`Graph`] is a mutable store of nodes and directed edges with mirrored
//! adjacency: every edge is recorded on both endpoints, so predecessor and
//! successor lookups are symmetric and O(1) per node. On top of the adjacency
//! store it offers breadth-first closures ([`upstream`](Graph::upstream) /
//! [`downstream`](Graph::downstream)), boundary queries
//! ([`source_nodes`](Graph::source_nodes) / [`sink_nodes`](Graph::sink_nodes)),
//! and sub-graph extraction ([`subgraph`](Graph::subgraph) /
//! [`subgraph_edges`](Graph::subgraph_edges)), the slice of the graph the
//! scheduler executes.
//!
//! Nodes are opaque caller-chosen identities; the graph only requires
//! `Clone + Eq + Hash`. Consumers assume the graph is acyclic, but the graph
//! itself does not enforce that: traversals terminate on cyclic input because
//! nodes are never enqueued twice.
//!
//! All operations take `&self` and are safe for concurrent callers; every
//! query returns an owned snapshot, never a live view into the store.
//!
//! # Examples
//!
//! ```
//! use warren::graph::Graph;
//!
//! let graph = Graph::new();
//! graph.add_edge("fetch", "build");
//! graph.add_edge("build", "package");
//!
//! assert!(graph.downstream(&"fetch").contains(&"package"));
//! assert_eq!(graph.source_nodes().len(), 1);
//!
//! let sub = graph.subgraph(None, None);
//! assert_eq!(sub.nodes.len(), 3);
//! ```

use std::collections::VecDeque;
use std::hash::Hash;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use rustc_hash::{FxHashMap, FxHashSet};

/// Edge direction relative to a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Direction {
    Incoming,
    Outgoing,
}

impl Direction {
    fn invert(self) -> Self {
        match self {
            Direction::Incoming => Direction::Outgoing,
            Direction::Outgoing => Direction::Incoming,
        }
    }
}

/// Mirrored neighbour sets for one node.
#[derive(Clone, Debug)]
struct Adjacency<N> {
    incoming: FxHashSet<N>,
    outgoing: FxHashSet<N>,
}

impl<N> Adjacency<N> {
    fn new() -> Self {
        Self {
            incoming: FxHashSet::default(),
            outgoing: FxHashSet::default(),
        }
    }

    fn side(&self, direction: Direction) -> &FxHashSet<N> {
        match direction {
            Direction::Incoming => &self.incoming,
            Direction::Outgoing => &self.outgoing,
        }
    }

    fn side_mut(&mut self, direction: Direction) -> &mut FxHashSet<N> {
        match direction {
            Direction::Incoming => &mut self.incoming,
            Direction::Outgoing => &mut self.outgoing,
        }
    }
}

type AdjacencyMap<N> = FxHashMap<N, Adjacency<N>>;

/// A directed edge reported out of a sub-graph enumeration.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Edge<N> {
    pub predecessor: N,
    pub successor: N,
}

/// The initials/terminals-bounded slice of a graph selected for one run.
///
/// `nodes` is the intersection of everything downstream of the initials with
/// everything upstream of the terminals; `initials` and `terminals` are the
/// boundary sets restricted to `nodes`. Produced by [`Graph::subgraph`] and
/// consumed by [`Graph::subgraph_edges`] and the scheduler.
#[derive(Clone, Debug)]
pub struct Subgraph<N> {
    pub initials: FxHashSet<N>,
    pub terminals: FxHashSet<N>,
    pub nodes: FxHashSet<N>,
}

impl<N: Eq + Hash> Subgraph<N> {
    /// Number of nodes in the slice.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// `true` when the slice selected no nodes at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Membership test against the constituent node set.
    pub fn contains(&self, node: &N) -> bool {
        self.nodes.contains(node)
    }
}

/// Mutable dependency graph with mirrored adjacency.
///
/// The store is guarded by a single reader/writer lock, so a shared
/// `Arc<Graph<N>>` can be read and extended from any thread. Queries for
/// nodes the graph has never seen are permissive: they answer with empty
/// sets rather than errors.
pub struct Graph<N> {
    nodes: RwLock<AdjacencyMap<N>>,
}

impl<N: Clone + Eq + Hash> Default for Graph<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N: Clone + Eq + Hash> Graph<N> {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: RwLock::new(AdjacencyMap::default()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, AdjacencyMap<N>> {
        self.nodes.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, AdjacencyMap<N>> {
        self.nodes.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds `node` to the graph. No-op if it is already present.
    pub fn add_node(&self, node: N) {
        self.write().entry(node).or_insert_with(Adjacency::new);
    }

    /// `true` if `node` exists in this graph.
    pub fn has_node(&self, node: &N) -> bool {
        self.read().contains_key(node)
    }

    /// Snapshot of every node in the graph.
    #[must_use]
    pub fn nodes(&self) -> FxHashSet<N> {
        self.read().keys().cloned().collect()
    }

    /// Records the edge `predecessor -> successor`, implicitly adding both
    /// endpoints. The adjacency is mirrored: the successor lands in the
    /// predecessor's outgoing set and the predecessor in the successor's
    /// incoming set.
    pub fn add_edge(&self, predecessor: N, successor: N) {
        let mut map = self.write();
        map.entry(predecessor.clone())
            .or_insert_with(Adjacency::new)
            .side_mut(Direction::Outgoing)
            .insert(successor.clone());
        map.entry(successor)
            .or_insert_with(Adjacency::new)
            .side_mut(Direction::Outgoing.invert())
            .insert(predecessor);
    }

    /// Immediate predecessors of `node`; empty if the node is unknown.
    #[must_use]
    pub fn predecessors(&self, node: &N) -> FxHashSet<N> {
        Self::neighbours(&self.read(), node, Direction::Incoming)
    }

    /// Immediate successors of `node`; empty if the node is unknown.
    #[must_use]
    pub fn successors(&self, node: &N) -> FxHashSet<N> {
        Self::neighbours(&self.read(), node, Direction::Outgoing)
    }

    /// Every node that can reach `node`, including `node` itself.
    #[must_use]
    pub fn upstream(&self, node: &N) -> FxHashSet<N> {
        Self::trace(&self.read(), node, Direction::Incoming)
    }

    /// Every node reachable from `node`, including `node` itself.
    #[must_use]
    pub fn downstream(&self, node: &N) -> FxHashSet<N> {
        Self::trace(&self.read(), node, Direction::Outgoing)
    }

    /// Nodes with no predecessors.
    #[must_use]
    pub fn source_nodes(&self) -> FxHashSet<N> {
        Self::boundary(&self.read(), Direction::Incoming)
    }

    /// Nodes with no successors.
    #[must_use]
    pub fn sink_nodes(&self) -> FxHashSet<N> {
        Self::boundary(&self.read(), Direction::Outgoing)
    }

    /// Selects the slice of the graph bounded by `initials` and `terminals`.
    ///
    /// When a boundary is `None` it defaults independently: initials to the
    /// graph's sources, terminals to its sinks. The constituent set is the
    /// intersection of downstream-from-initials with upstream-from-terminals;
    /// the reported boundaries are the given ones restricted to that set.
    ///
    /// The whole computation runs under one read guard, so it observes a
    /// single consistent graph state. The graph itself is not modified.
    #[must_use]
    pub fn subgraph(&self, initials: Option<&[N]>, terminals: Option<&[N]>) -> Subgraph<N> {
        let map = self.read();

        let initials: FxHashSet<N> = match initials {
            Some(given) => given.iter().cloned().collect(),
            None => Self::boundary(&map, Direction::Incoming),
        };
        let terminals: FxHashSet<N> = match terminals {
            Some(given) => given.iter().cloned().collect(),
            None => Self::boundary(&map, Direction::Outgoing),
        };

        let mut nodes = FxHashSet::default();
        for initial in &initials {
            nodes.extend(Self::trace(&map, initial, Direction::Outgoing));
        }
        let mut upstreams = FxHashSet::default();
        for terminal in &terminals {
            upstreams.extend(Self::trace(&map, terminal, Direction::Incoming));
        }
        nodes.retain(|node| upstreams.contains(node));

        let initials = initials
            .into_iter()
            .filter(|node| nodes.contains(node))
            .collect();
        let terminals = terminals
            .into_iter()
            .filter(|node| nodes.contains(node))
            .collect();

        Subgraph {
            initials,
            terminals,
            nodes,
        }
    }

    /// Enumerates the edges of `subgraph`, expanding breadth-first from its
    /// initials and keeping only successors inside the constituent set.
    ///
    /// Enqueue is guarded by a scheduled marker so each node is expanded
    /// exactly once; an interior node with several in-scope predecessors
    /// does not get its outgoing edges emitted more than once.
    #[must_use]
    pub fn subgraph_edges(&self, subgraph: &Subgraph<N>) -> Vec<Edge<N>> {
        let map = self.read();
        let mut scheduled: FxHashSet<N> = subgraph.initials.clone();
        let mut pending: VecDeque<N> = subgraph.initials.iter().cloned().collect();
        let mut edges = Vec::new();

        while let Some(current) = pending.pop_front() {
            for successor in Self::neighbours(&map, &current, Direction::Outgoing) {
                if !subgraph.nodes.contains(&successor) {
                    continue;
                }
                edges.push(Edge {
                    predecessor: current.clone(),
                    successor: successor.clone(),
                });
                if scheduled.insert(successor.clone()) {
                    pending.push_back(successor);
                }
            }
        }
        edges
    }

    fn neighbours(map: &AdjacencyMap<N>, node: &N, direction: Direction) -> FxHashSet<N> {
        map.get(node)
            .map(|adjacency| adjacency.side(direction).clone())
            .unwrap_or_default()
    }

    /// Breadth-first closure from `start` in `direction`, including `start`
    /// itself. Empty if `start` is not in the graph. Nodes are recorded at
    /// enqueue time, so cyclic input still terminates in O(V+E).
    fn trace(map: &AdjacencyMap<N>, start: &N, direction: Direction) -> FxHashSet<N> {
        let mut reached = FxHashSet::default();
        if !map.contains_key(start) {
            return reached;
        }
        reached.insert(start.clone());
        let mut pending = VecDeque::new();
        pending.push_back(start.clone());

        while let Some(current) = pending.pop_front() {
            if let Some(adjacency) = map.get(&current) {
                for neighbour in adjacency.side(direction) {
                    if reached.insert(neighbour.clone()) {
                        pending.push_back(neighbour.clone());
                    }
                }
            }
        }
        reached
    }

    fn boundary(map: &AdjacencyMap<N>, direction: Direction) -> FxHashSet<N> {
        map.iter()
            .filter(|(_, adjacency)| adjacency.side(direction).is_empty())
            .map(|(node, _)| node.clone())
            .collect()
    }
}
