//! [`WipeRegistry`]: hands out wipe scopes and flushes them on a bounded pool.

use std::sync::Arc;

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::debug;

use super::scope::WipeScope;
use super::WipeError;

/// Default share of available cores used for parallel destruction.
pub const DEFAULT_THREAD_LIMIT_PERCENTAGE: f64 = 0.34;

/// Sizing of the flush worker pool.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WipeConfig {
    /// Fraction of available cores to use, clamped to `1.0`.
    pub thread_limit_percentage: f64,
}

impl WipeConfig {
    /// Number of flush workers for a machine with `available` cores.
    ///
    /// Never less than one, never more than `available`.
    pub fn worker_count(&self, available: usize) -> usize {
        let pct = if self.thread_limit_percentage.is_finite() {
            self.thread_limit_percentage.clamp(0.0, 1.0)
        } else {
            DEFAULT_THREAD_LIMIT_PERCENTAGE
        };
        ((available as f64 * pct).floor() as usize).max(1)
    }

    fn available_cores() -> usize {
        std::thread::available_parallelism().map_or(1, usize::from)
    }
}

impl Default for WipeConfig {
    fn default() -> Self {
        Self {
            thread_limit_percentage: DEFAULT_THREAD_LIMIT_PERCENTAGE,
        }
    }
}

/// Outcome of one flush.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WipeReport {
    /// Members that were alive and have now been destroyed.
    pub destroyed: usize,
    /// Members whose owners had already dropped them (zeroized on drop).
    pub expired: usize,
}

/// Creates [`WipeScope`]s and destroys their contents at unit-of-work end.
///
/// Cheap to clone; all clones share one worker pool.
#[derive(Clone)]
pub struct WipeRegistry {
    pool: Arc<ThreadPool>,
    workers: usize,
}

impl WipeRegistry {
    /// Build a registry whose flush pool is sized from `cfg`.
    ///
    /// # Errors
    ///
    /// Returns [`WipeError::WorkerPool`] if the worker threads cannot be spawned.
    pub fn new(cfg: WipeConfig) -> Result<Self, WipeError> {
        let workers = cfg.worker_count(WipeConfig::available_cores());
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("wipe-worker-{i}"))
            .build()?;
        debug!(workers, "wipe registry initialised");
        Ok(Self {
            pool: Arc::new(pool),
            workers,
        })
    }

    /// Number of threads used for parallel destruction.
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Start a new unit of work.
    pub fn begin(&self) -> WipeScope {
        WipeScope::new()
    }

    /// Detach the scope's current set and destroy every member.
    ///
    /// The detach happens under the scope's lock before any destruction
    /// starts, so a member is never destroyed twice and a registration racing
    /// with the flush is either destroyed here or kept for the next flush.
    /// Flushing a scope with nothing tracked is a no-op.
    pub fn flush(&self, scope: &WipeScope) -> WipeReport {
        let Some(set) = scope.detach() else {
            return WipeReport::default();
        };
        let members = set.into_members();
        let total = members.len();
        let destroyed = self
            .pool
            .install(|| members.par_iter().filter(|m| m.destroy()).count());
        let report = WipeReport {
            destroyed,
            expired: total - destroyed,
        };
        debug!(
            scope = %scope.id(),
            destroyed = report.destroyed,
            expired = report.expired,
            "wipe scope flushed"
        );
        report
    }
}

impl std::fmt::Debug for WipeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WipeRegistry")
            .field("workers", &self.workers)
            .finish()
    }
}
