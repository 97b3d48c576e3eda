//! Progress reporting shared by the parser and the sampler
//!
//! Callbacks may be invoked from whichever thread does the work (the caller's
//! thread, a `spawn_blocking` worker, or a rayon sampling thread), so they
//! must be `Send + Sync`.

use serde::Serialize;
use std::sync::Arc;

/// Which stage is reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressPhase {
    HeaderParsing,
    Sampling,
}

/// One progress tick: `current` of `total` units done in `phase`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub phase: ProgressPhase,
    pub current: u64,
    pub total: u64,
}

impl Progress {
    pub fn new(phase: ProgressPhase, current: u64, total: u64) -> Self {
        Self {
            phase,
            current,
            total,
        }
    }

    /// Completed fraction in [0, 1]; an empty job counts as done
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            (self.current as f64 / self.total as f64).min(1.0)
        }
    }
}

/// Progress callback
pub type ProgressFn = Arc<dyn Fn(Progress) + Send + Sync>;

/// Invoke an optional callback
pub(crate) fn report(progress: Option<&ProgressFn>, phase: ProgressPhase, current: u64, total: u64) {
    if let Some(cb) = progress {
        cb(Progress::new(phase, current, total));
    }
}
