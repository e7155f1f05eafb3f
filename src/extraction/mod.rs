//! Raw-metrics extraction from the external project-data source.
//!
//! Returns from the source are untrusted: every field of the raw DTOs is
//! optional and normalization degrades missing data to documented
//! defaults instead of failing. Network access lives behind the
//! [`ProjectSource`] trait so the engine and orchestrator never touch a
//! client directly.

pub mod file;
pub mod http;
pub mod normalize;

use async_trait::async_trait;
use chrono::NaiveDate;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::watch;

use crate::errors::Result;

/// Caller-side cancellation signal, propagated down to in-flight
/// requests so a transport-layer timeout can cut off a slow source
/// without leaving orphaned work.
#[derive(Debug, Clone)]
pub struct AbortSignal {
    rx: watch::Receiver<bool>,
    /// Keeps the channel open for signals with no controlling handle
    _keepalive: Option<std::sync::Arc<watch::Sender<bool>>>,
}

impl AbortSignal {
    /// A signal that never fires
    pub fn none() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            rx,
            _keepalive: Some(std::sync::Arc::new(tx)),
        }
    }

    pub fn is_aborted(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves when the paired handle aborts; pends forever otherwise
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow() {
                return;
            }
            if rx.changed().await.is_err() {
                // sender gone without aborting; nothing will ever fire
                futures::future::pending::<()>().await;
            }
        }
    }
}

/// The controlling end of an [`AbortSignal`]
#[derive(Debug)]
pub struct AbortHandle {
    tx: watch::Sender<bool>,
}

impl AbortHandle {
    pub fn abort(&self) {
        let _ = self.tx.send(true);
    }
}

/// A linked handle/signal pair
pub fn abort_pair() -> (AbortHandle, AbortSignal) {
    let (tx, rx) = watch::channel(false);
    (
        AbortHandle { tx },
        AbortSignal {
            rx,
            _keepalive: None,
        },
    )
}

/// Bounded retry with exponential backoff and jitter. External fetches
/// fail closed after `max_attempts`; nothing in the extractor blocks
/// indefinitely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff_ms: 250,
            max_backoff_ms: 5_000,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based): doubled each time,
    /// capped, with up to 25% random jitter on top
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        let shift = attempt.saturating_sub(1).min(16) as u32;
        let exp = self
            .base_backoff_ms
            .saturating_mul(1u64 << shift)
            .min(self.max_backoff_ms);
        let jitter = rand::thread_rng().gen_range(0..=exp / 4);
        Duration::from_millis(exp + jitter)
    }
}

/// Work-item row as the source returns it; trust nothing
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawWorkItem {
    pub id: Option<u64>,
    pub subject: Option<String>,
    pub done_ratio: Option<f64>,
    pub estimated_hours: Option<f64>,
    pub spent_hours: Option<f64>,
    pub start_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub status: Option<String>,
    pub closed: Option<bool>,
    pub assigned_to_id: Option<u64>,
    #[serde(default)]
    pub predecessor_ids: Vec<u64>,
    #[serde(default)]
    pub successor_ids: Vec<u64>,
}

/// Time-log row as the source returns it
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawTimeEntry {
    pub hours: Option<f64>,
    pub spent_on: Option<NaiveDate>,
    pub user_id: Option<u64>,
    pub work_item_id: Option<u64>,
    pub activity: Option<String>,
}

/// Budget row as the source returns it
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawBudget {
    pub id: Option<u64>,
    pub subject: Option<String>,
    pub amount: Option<f64>,
}

/// Read API of the external project-data source
#[async_trait]
pub trait ProjectSource: Send + Sync {
    async fn list_work_items(
        &self,
        project_id: u64,
        abort: &AbortSignal,
    ) -> Result<Vec<RawWorkItem>>;

    async fn list_time_entries(
        &self,
        project_id: u64,
        range: Option<(NaiveDate, NaiveDate)>,
        abort: &AbortSignal,
    ) -> Result<Vec<RawTimeEntry>>;

    async fn list_budgets(&self, project_id: u64, abort: &AbortSignal) -> Result<Vec<RawBudget>>;
}
