//! Concurrent, dependency-aware execution of a graph slice.
//!
//! [`Rabbit`] binds a [`Graph`] to an [`Operator`] and, per
//! [`run`](Rabbit::run), drives a bounded number of concurrent operator
//! invocations through a topological execution of the selected sub-graph:
//! a node is dispatched only after every predecessor inside the sub-graph
//! has succeeded.
//!
//! Failure containment follows the failure's own classification. A non-fatal
//! failure blocks exactly the failing node's downstream closure within the
//! sub-graph; siblings and unrelated branches keep making progress. A fatal
//! failure (or the expiry of the run's wall-clock budget) stops new dispatch,
//! raises the cooperative [`CancelSignal`], lets in-flight invocations
//! finish, and cancels everything that never started.
//!
//! All run bookkeeping (remaining-predecessor counters, the ready queue, the
//! outcome table) is owned by the single dispatch loop inside `run`; worker
//! tasks only execute the operator and report back through their join
//! handles. Every transition therefore has exactly one writer, so the classic
//! races of this design (two workers moving the same node to ready, or
//! double-dispatching it) cannot occur.
//!
//! After the run, per-node outcomes are read back through
//! [`result`](Rabbit::result), [`blocked`](Rabbit::blocked),
//! [`cancelled`](Rabbit::cancelled), and [`outcome`](Rabbit::outcome).

use std::collections::VecDeque;
use std::fmt::Debug;
use std::hash::Hash;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use miette::Diagnostic;
use rustc_hash::{FxHashMap, FxHashSet};
use thiserror::Error;
use tokio::task::{JoinError, JoinSet};
use tracing::instrument;

use crate::graph::Graph;
use crate::operator::{CancelSignal, Operator, OperatorContext, OperatorFailure};

/// Terminal state of one node after a run.
#[derive(Clone, Debug, PartialEq)]
pub enum NodeOutcome<V> {
    /// The operator returned a value.
    Succeeded(V),
    /// The operator returned a classified failure.
    Failed(OperatorFailure),
    /// An upstream non-fatal failure made this node unreachable.
    Blocked,
    /// A fatal failure, timeout, or stall ended the run before this node
    /// was dispatched.
    Cancelled,
}

/// Per-node bookkeeping while a run is in progress.
enum Slot<V> {
    /// Waiting on `remaining` in-scope predecessors.
    Pending { remaining: usize },
    /// All predecessors succeeded; queued for dispatch.
    Ready,
    /// An operator invocation is in flight.
    Running,
    Done(NodeOutcome<V>),
}

/// What happened over one whole run, returned on normal completion.
#[derive(Clone, Debug)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
    /// Size of the selected sub-graph.
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub blocked: usize,
    pub cancelled: usize,
}

/// Fatal-class conditions reported by [`Rabbit::run`].
///
/// Per-node non-fatal failures are not run errors; they surface lazily via
/// [`Rabbit::result`].
#[derive(Debug, Error, Diagnostic)]
pub enum RunError {
    #[error("worker count must be at least 1")]
    #[diagnostic(code(warren::scheduler::worker_count))]
    InvalidWorkerCount,

    #[error("fatal operator failure on node {node} aborted the run")]
    #[diagnostic(
        code(warren::scheduler::fatal),
        help("inspect the per-node outcomes for work that completed before the abort")
    )]
    Fatal {
        node: String,
        #[source]
        failure: OperatorFailure,
    },

    #[error("run exceeded its wall-clock budget of {timeout:?}")]
    #[diagnostic(code(warren::scheduler::timeout))]
    TimeoutExpired { timeout: Duration },

    #[error("no runnable work left with {remaining} nodes still waiting on unmet dependencies")]
    #[diagnostic(
        code(warren::scheduler::stalled),
        help("the selected sub-graph most likely contains a cycle")
    )]
    Stalled { remaining: usize },

    #[error("operator task failed outside the operator's own unwind boundary")]
    #[diagnostic(code(warren::scheduler::join))]
    Join(#[from] JoinError),
}

/// Errors answered by [`Rabbit::result`].
#[derive(Debug, Error, Diagnostic)]
pub enum ResultError {
    /// The node ran and its operator failed; carries the captured failure.
    #[error(transparent)]
    #[diagnostic(code(warren::scheduler::node_failed))]
    Failed(#[from] OperatorFailure),

    /// The node was part of the run but never executed (blocked upstream or
    /// cancelled by an abort).
    #[error("node {node} was not executed: {reason}")]
    #[diagnostic(code(warren::scheduler::not_executed))]
    NotExecuted { node: String, reason: SkipReason },

    /// The node was not part of the last run's sub-graph (or no run has
    /// happened yet).
    #[error("node {node} was not part of the last run")]
    #[diagnostic(code(warren::scheduler::unknown_node))]
    Unknown { node: String },
}

/// Why a node in the sub-graph never executed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    Blocked,
    Cancelled,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::Blocked => write!(f, "blocked by an upstream failure"),
            SkipReason::Cancelled => write!(f, "cancelled before dispatch"),
        }
    }
}

/// The scheduler: a graph, an operator, and the outcome table of the most
/// recent run.
///
/// Construction binds the collaborators and performs no work. A single graph
/// may be shared by several `Rabbit`s, and one `Rabbit` may run repeatedly
/// with different sub-graph selections; each run replaces the outcome table
/// wholesale.
pub struct Rabbit<N, V> {
    graph: Arc<Graph<N>>,
    operator: Arc<dyn Operator<N, V>>,
    outcomes: FxHashMap<N, NodeOutcome<V>>,
}

impl<N, V> Rabbit<N, V>
where
    N: Clone + Eq + Hash + Debug + Send + Sync + 'static,
    V: Send + 'static,
{
    /// Binds a graph and an operator. No work happens until
    /// [`run`](Self::run).
    pub fn new(graph: Arc<Graph<N>>, operator: impl Operator<N, V> + 'static) -> Self {
        Self::from_arc(graph, Arc::new(operator))
    }

    /// Variant of [`new`](Self::new) for an operator already behind an `Arc`.
    pub fn from_arc(graph: Arc<Graph<N>>, operator: Arc<dyn Operator<N, V>>) -> Self {
        Self {
            graph,
            operator,
            outcomes: FxHashMap::default(),
        }
    }

    /// Executes the selected sub-graph to completion.
    ///
    /// Selects the sub-graph (`initials`/`terminals` default to sources and
    /// sinks, see [`Graph::subgraph`]), seeds the ready queue with nodes
    /// whose in-scope predecessor count is zero, and dispatches up to
    /// `workers` concurrent operator invocations until every sub-graph node
    /// reaches a terminal state or the run aborts. `timeout` bounds the whole
    /// run's wall-clock time.
    ///
    /// Returns a [`RunReport`] on normal completion, which includes runs
    /// where some nodes failed non-fatally or were blocked; those surface
    /// per-node through [`result`](Self::result). An `Err` means a
    /// fatal-class condition: a fatal operator failure, timeout expiry, a
    /// stall (cyclic input), or `workers == 0`.
    ///
    /// On abort, in-flight invocations are never preempted: the run raises
    /// the cooperative cancel signal, waits for them to finish, records their
    /// outcomes, and marks everything that never started as cancelled.
    #[instrument(skip(self, initials, terminals), err)]
    pub async fn run(
        &mut self,
        workers: usize,
        timeout: Duration,
        initials: Option<&[N]>,
        terminals: Option<&[N]>,
    ) -> Result<RunReport, RunError> {
        if workers == 0 {
            return Err(RunError::InvalidWorkerCount);
        }
        // A new run invalidates the previous table even if it aborts early.
        self.outcomes.clear();

        let started_at = Utc::now();
        let started = Instant::now();

        let sub = self.graph.subgraph(initials, terminals);
        let total = sub.nodes.len();
        tracing::debug!(
            total,
            initials = sub.initials.len(),
            terminals = sub.terminals.len(),
            "sub-graph selected"
        );

        let mut slots: FxHashMap<N, Slot<V>> = FxHashMap::default();
        let mut ready: VecDeque<N> = VecDeque::new();
        for node in &sub.nodes {
            let remaining = self
                .graph
                .predecessors(node)
                .iter()
                .filter(|predecessor| sub.nodes.contains(*predecessor))
                .count();
            if remaining == 0 {
                slots.insert(node.clone(), Slot::Ready);
                ready.push_back(node.clone());
            } else {
                slots.insert(node.clone(), Slot::Pending { remaining });
            }
        }

        let deadline = tokio::time::Instant::now() + timeout;
        let cancel = CancelSignal::new();
        let mut tasks: JoinSet<(N, Result<V, OperatorFailure>)> = JoinSet::new();
        let mut terminal = 0usize;
        let mut fatal: Option<RunError> = None;

        loop {
            if fatal.is_none() {
                while tasks.len() < workers {
                    let Some(node) = ready.pop_front() else { break };
                    slots.insert(node.clone(), Slot::Running);
                    tracing::debug!(node = ?node, in_flight = tasks.len() + 1, "dispatching operator");
                    let operator = Arc::clone(&self.operator);
                    let ctx = OperatorContext::new(cancel.clone());
                    tasks.spawn(async move {
                        let applied = AssertUnwindSafe(operator.apply(node.clone(), ctx))
                            .catch_unwind()
                            .await;
                        let outcome = match applied {
                            Ok(result) => result,
                            Err(payload) => Err(OperatorFailure::fatal(format!(
                                "operator panicked: {}",
                                panic_message(payload.as_ref())
                            ))),
                        };
                        (node, outcome)
                    });
                }
            }

            if tasks.is_empty() {
                if terminal >= total || fatal.is_some() {
                    break;
                }
                if ready.is_empty() {
                    // Nothing in flight, nothing ready, work remains: the
                    // sub-graph cannot make progress (cyclic input).
                    let remaining = total - terminal;
                    tracing::warn!(remaining, "no runnable work left; aborting");
                    fatal = Some(RunError::Stalled { remaining });
                    break;
                }
                continue;
            }

            let joined = if fatal.is_some() {
                // Winding down: no new dispatch, no deadline, just drain
                // the invocations that are already in flight.
                tasks.join_next().await
            } else {
                tokio::select! {
                    joined = tasks.join_next() => joined,
                    _ = tokio::time::sleep_until(deadline) => {
                        tracing::warn!(elapsed = ?started.elapsed(), "wall-clock budget expired; winding down");
                        fatal = Some(RunError::TimeoutExpired { timeout });
                        cancel.trigger();
                        ready.clear();
                        continue;
                    }
                }
            };

            let Some(joined) = joined else { continue };
            let (node, outcome) = match joined {
                Ok(pair) => pair,
                Err(join_error) => {
                    // Workers are never aborted and operator panics are
                    // caught inside the task, so this is a crash outside the
                    // unwind boundary. Treat it like a fatal failure.
                    tracing::error!(error = %join_error, "worker task crashed");
                    if fatal.is_none() {
                        fatal = Some(RunError::Join(join_error));
                        cancel.trigger();
                        ready.clear();
                    }
                    continue;
                }
            };

            terminal += 1;
            match outcome {
                Ok(value) => {
                    tracing::debug!(node = ?node, "node succeeded");
                    slots.insert(node.clone(), Slot::Done(NodeOutcome::Succeeded(value)));
                    for successor in self.graph.successors(&node) {
                        if !sub.nodes.contains(&successor) {
                            continue;
                        }
                        let now_ready = match slots.get_mut(&successor) {
                            Some(Slot::Pending { remaining }) => {
                                *remaining -= 1;
                                *remaining == 0
                            }
                            _ => false,
                        };
                        if now_ready {
                            slots.insert(successor.clone(), Slot::Ready);
                            ready.push_back(successor);
                        }
                    }
                }
                Err(failure) if failure.is_fatal() => {
                    tracing::warn!(node = ?node, %failure, "fatal operator failure");
                    if fatal.is_none() {
                        fatal = Some(RunError::Fatal {
                            node: format!("{node:?}"),
                            failure: failure.clone(),
                        });
                        cancel.trigger();
                        ready.clear();
                    }
                    slots.insert(node, Slot::Done(NodeOutcome::Failed(failure)));
                }
                Err(failure) => {
                    tracing::debug!(node = ?node, %failure, "non-fatal failure; blocking downstream");
                    let closure = self.graph.downstream(&node);
                    slots.insert(node.clone(), Slot::Done(NodeOutcome::Failed(failure)));
                    for reached in closure {
                        if reached == node || !sub.nodes.contains(&reached) {
                            continue;
                        }
                        if let Some(Slot::Pending { .. }) = slots.get(&reached) {
                            slots.insert(reached, Slot::Done(NodeOutcome::Blocked));
                            terminal += 1;
                        }
                    }
                }
            }
        }

        if fatal.is_some() {
            for slot in slots.values_mut() {
                if !matches!(slot, Slot::Done(_)) {
                    *slot = Slot::Done(NodeOutcome::Cancelled);
                }
            }
        }

        let mut report = RunReport {
            started_at,
            elapsed: started.elapsed(),
            total,
            succeeded: 0,
            failed: 0,
            blocked: 0,
            cancelled: 0,
        };
        self.outcomes = slots
            .into_iter()
            .filter_map(|(node, slot)| match slot {
                Slot::Done(outcome) => {
                    match &outcome {
                        NodeOutcome::Succeeded(_) => report.succeeded += 1,
                        NodeOutcome::Failed(_) => report.failed += 1,
                        NodeOutcome::Blocked => report.blocked += 1,
                        NodeOutcome::Cancelled => report.cancelled += 1,
                    }
                    Some((node, outcome))
                }
                _ => None,
            })
            .collect();

        match fatal {
            Some(error) => Err(error),
            None => {
                tracing::debug!(
                    elapsed = ?report.elapsed,
                    succeeded = report.succeeded,
                    failed = report.failed,
                    blocked = report.blocked,
                    "run complete"
                );
                Ok(report)
            }
        }
    }

    /// The stored success value for `node`, cloned out of the outcome table.
    ///
    /// A node that ran and failed answers [`ResultError::Failed`] with the
    /// captured classified failure. A node that was part of the run but
    /// never executed answers the distinct [`ResultError::NotExecuted`]; a
    /// node outside the last run's sub-graph answers
    /// [`ResultError::Unknown`].
    pub fn result(&self, node: &N) -> Result<V, ResultError>
    where
        V: Clone,
    {
        match self.outcomes.get(node) {
            Some(NodeOutcome::Succeeded(value)) => Ok(value.clone()),
            Some(NodeOutcome::Failed(failure)) => Err(ResultError::Failed(failure.clone())),
            Some(NodeOutcome::Blocked) => Err(ResultError::NotExecuted {
                node: format!("{node:?}"),
                reason: SkipReason::Blocked,
            }),
            Some(NodeOutcome::Cancelled) => Err(ResultError::NotExecuted {
                node: format!("{node:?}"),
                reason: SkipReason::Cancelled,
            }),
            None => Err(ResultError::Unknown {
                node: format!("{node:?}"),
            }),
        }
    }

    /// Nodes skipped because an upstream non-fatal failure made them
    /// unreachable in the last run.
    #[must_use]
    pub fn blocked(&self) -> FxHashSet<N> {
        self.nodes_with(|outcome| matches!(outcome, NodeOutcome::Blocked))
    }

    /// Nodes never dispatched because the last run was aborted.
    #[must_use]
    pub fn cancelled(&self) -> FxHashSet<N> {
        self.nodes_with(|outcome| matches!(outcome, NodeOutcome::Cancelled))
    }

    /// Borrow of `node`'s terminal outcome from the last run, if any.
    #[must_use]
    pub fn outcome(&self, node: &N) -> Option<&NodeOutcome<V>> {
        self.outcomes.get(node)
    }

    fn nodes_with(&self, keep: impl Fn(&NodeOutcome<V>) -> bool) -> FxHashSet<N> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| keep(outcome))
            .map(|(node, _)| node.clone())
            .collect()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
