//! # Warren: Dependency-Graph Task Execution
//!
//! Warren is a library for running a unit of work once per node of a directed
//! acyclic graph. Predecessors always finish before their successors start,
//! parallelism is bounded, and failures are contained: one bad node does not
//! have to take the whole batch down with it.
//!
//! ## Core Concepts
//!
//! - **Graph**: node/edge store with mirrored adjacency, reachability
//!   closures, and sub-graph extraction
//! - **Operator**: the caller-supplied async capability mapping a node
//!   identity to a value or a classified failure
//! - **Rabbit**: the scheduler, driving a bounded pool of concurrent operator
//!   invocations through a topological execution of a selected sub-graph
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use async_trait::async_trait;
//! use warren::graph::Graph;
//! use warren::operator::{Operator, OperatorContext, OperatorFailure};
//! use warren::scheduler::Rabbit;
//!
//! /// Resolves each node to its upper-cased name.
//! struct Shout;
//!
//! #[async_trait]
//! impl Operator<String, String> for Shout {
//!     async fn apply(
//!         &self,
//!         node: String,
//!         _ctx: OperatorContext,
//!     ) -> Result<String, OperatorFailure> {
//!         Ok(node.to_uppercase())
//!     }
//! }
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let graph = Arc::new(Graph::new());
//! graph.add_edge("fetch".to_string(), "build".to_string());
//! graph.add_edge("build".to_string(), "package".to_string());
//!
//! let mut rabbit = Rabbit::new(graph, Shout);
//! rabbit.run(4, Duration::from_secs(30), None, None).await?;
//! assert_eq!(rabbit.result(&"build".to_string())?, "BUILD");
//! # Ok(())
//! # }
//! ```
//!
//! ## Failure Semantics
//!
//! Operators classify their own failures. A
//! [`Severity::NonFatal`](operator::Severity) failure blocks only the failing
//! node's downstream closure; everything else keeps running, and the run
//! still completes normally. A [`Severity::Fatal`](operator::Severity)
//! failure (or the run's timeout) aborts: new dispatch stops, in-flight work
//! is asked to stop cooperatively and allowed to finish, and whatever never
//! started is cancelled. Per-node failures are never raised across a worker
//! boundary; they are stored and surface through
//! [`Rabbit::result`](scheduler::Rabbit::result).
//!
//! ## Module Guide
//!
//! - [`graph`] - Dependency graph storage, reachability, sub-graph extraction
//! - [`operator`] - The operator capability, failure classification, and
//!   cooperative cancellation
//! - [`scheduler`] - The `Rabbit` executor and its run/outcome types
//! - [`telemetry`] - Tracing subscriber setup helpers

pub mod graph;
pub mod operator;
pub mod scheduler;
pub mod telemetry;
