#![allow(dead_code)]

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::time::{Duration, sleep};
use warren::operator::{Operator, OperatorContext, OperatorFailure};

/// Echoes each node back as its own result, recording visit order.
///
/// Failure injection is keyed on the node name: `TEX…` fails fatally,
/// `TNT…` fails non-fatally, anything else succeeds. The visit is recorded
/// either way.
#[derive(Debug, Default)]
pub struct EchoOperator {
    visits: Mutex<Vec<String>>,
}

impl EchoOperator {
    pub fn new() -> Self {
        Self::default()
    }

    /// The nodes applied so far, in completion order.
    pub fn visits(&self) -> Vec<String> {
        self.visits.lock().unwrap().clone()
    }
}

#[async_trait]
impl Operator<String, String> for EchoOperator {
    async fn apply(
        &self,
        node: String,
        _ctx: OperatorContext,
    ) -> Result<String, OperatorFailure> {
        self.visits.lock().unwrap().push(node.clone());
        if node.starts_with("TEX") {
            return Err(OperatorFailure::fatal(format!("refusing {node}")));
        }
        if node.starts_with("TNT") {
            return Err(OperatorFailure::non_fatal(format!("refusing {node}")));
        }
        Ok(node)
    }
}

/// Sleeps up to `delay` in small ticks, bailing out early once the run's
/// cancel signal is raised; then echoes the node.
#[derive(Debug)]
pub struct DelayOperator {
    pub delay: Duration,
}

#[async_trait]
impl Operator<String, String> for DelayOperator {
    async fn apply(
        &self,
        node: String,
        ctx: OperatorContext,
    ) -> Result<String, OperatorFailure> {
        let tick = Duration::from_millis(10);
        let mut waited = Duration::ZERO;
        while waited < self.delay && !ctx.is_cancelled() {
            sleep(tick).await;
            waited += tick;
        }
        Ok(node)
    }
}

/// Tracks the highest number of simultaneously active invocations.
#[derive(Debug)]
pub struct GaugeOperator {
    active: AtomicUsize,
    peak: AtomicUsize,
    dwell: Duration,
}

impl GaugeOperator {
    pub fn new(dwell: Duration) -> Self {
        Self {
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            dwell,
        }
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Operator<String, String> for GaugeOperator {
    async fn apply(
        &self,
        node: String,
        _ctx: OperatorContext,
    ) -> Result<String, OperatorFailure> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        sleep(self.dwell).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(node)
    }
}

/// Panics on nodes named `BOOM…`, echoes everything else.
#[derive(Debug, Default)]
pub struct PanicOperator;

#[async_trait]
impl Operator<String, String> for PanicOperator {
    async fn apply(
        &self,
        node: String,
        _ctx: OperatorContext,
    ) -> Result<String, OperatorFailure> {
        if node.starts_with("BOOM") {
            panic!("unclassified escape from {node}");
        }
        Ok(node)
    }
}
