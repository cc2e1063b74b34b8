//! The operator capability consumed by the scheduler.
//!
//! An [`Operator`] is the single unit of work the caller supplies: an async
//! mapping from a node identity to either a success value or a classified
//! [`OperatorFailure`]. The scheduler invokes it once per node of the active
//! sub-graph and never provides an implementation of its own.
//!
//! Failure classification is explicit, not inferred from error subtypes: the
//! operator tags each failure [`Severity::Fatal`] (abort the whole run) or
//! [`Severity::NonFatal`] (block only this node's downstream closure).
//!
//! Every invocation receives an [`OperatorContext`] carrying a cooperative
//! cancellation signal. Long-running operators should poll
//! [`OperatorContext::is_cancelled`] and bail out early when a fatal failure
//! or timeout has ended the run; the scheduler never preempts an invocation
//! by force.
//!
//! # Examples
//!
//! ```
//! use async_trait::async_trait;
//! use warren::operator::{Operator, OperatorContext, OperatorFailure};
//!
//! /// Resolves a node name to its length, refusing empty names.
//! struct Measure;
//!
//! #[async_trait]
//! impl Operator<String, usize> for Measure {
//!     async fn apply(
//!         &self,
//!         node: String,
//!         _ctx: OperatorContext,
//!     ) -> Result<usize, OperatorFailure> {
//!         if node.is_empty() {
//!             return Err(OperatorFailure::non_fatal("empty node name"));
//!         }
//!         Ok(node.len())
//!     }
//! }
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How far an operator failure reaches.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    /// Unrecoverable: the whole run aborts and unstarted work is cancelled.
    Fatal,
    /// Locally contained: only the failing node's downstream closure is
    /// blocked; unrelated branches keep running.
    NonFatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Fatal => write!(f, "fatal"),
            Severity::NonFatal => write!(f, "non-fatal"),
        }
    }
}

/// A classified failure produced by an operator invocation.
///
/// The severity is part of the value, chosen by the operator itself; the
/// scheduler never guesses. `details` is free-form structured context that
/// travels with the failure into the outcome table and back out of
/// [`result`](crate::scheduler::Rabbit::result).
#[derive(Clone, Debug, PartialEq, Error, Diagnostic, Serialize, Deserialize)]
#[error("{severity} operator failure: {message}")]
#[diagnostic(code(warren::operator::failure))]
pub struct OperatorFailure {
    pub severity: Severity,
    pub message: String,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub details: serde_json::Value,
}

impl OperatorFailure {
    /// A failure that aborts the entire run.
    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Fatal,
            message: message.into(),
            details: serde_json::Value::Null,
        }
    }

    /// A failure contained to the failing node's downstream closure.
    pub fn non_fatal(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::NonFatal,
            message: message.into(),
            details: serde_json::Value::Null,
        }
    }

    /// Attach structured context to the failure.
    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }

    /// `true` for [`Severity::Fatal`].
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        self.severity == Severity::Fatal
    }
}

/// Shared flag raised when a run winds down before all work has started.
///
/// Clones observe the same underlying flag. Once triggered it never resets
/// within a run.
#[derive(Clone, Debug, Default)]
pub struct CancelSignal {
    flag: Arc<AtomicBool>,
}

impl CancelSignal {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn trigger(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// `true` once the run has asked in-flight work to stop.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// Execution context passed to every operator invocation.
///
/// Currently carries the run's cancellation signal; operators that fan work
/// out further can take their own clone via
/// [`cancel_signal`](Self::cancel_signal).
#[derive(Clone, Debug)]
pub struct OperatorContext {
    cancel: CancelSignal,
}

impl OperatorContext {
    pub(crate) fn new(cancel: CancelSignal) -> Self {
        Self { cancel }
    }

    /// A context with a signal nobody will ever trigger. Useful for invoking
    /// an operator directly, outside a scheduler run.
    #[must_use]
    pub fn detached() -> Self {
        Self::new(CancelSignal::new())
    }

    /// `true` once the run has asked in-flight work to stop.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Clone of the underlying cancellation signal.
    #[must_use]
    pub fn cancel_signal(&self) -> CancelSignal {
        self.cancel.clone()
    }
}

/// The user-supplied unit of work, applied once per node of a run.
///
/// `N` is the node identity type, `V` the success value. Implementations must
/// be `Send + Sync` because the scheduler shares one operator across all
/// concurrent invocations.
///
/// Failures are returned, not thrown; a panic that does escape `apply` is
/// caught by the scheduler and recorded as a fatal failure, since an escape
/// the caller did not classify cannot be assumed contained.
#[async_trait]
pub trait Operator<N, V>: Send + Sync {
    /// Perform the work for `node`.
    async fn apply(&self, node: N, ctx: OperatorContext) -> Result<V, OperatorFailure>;
}
