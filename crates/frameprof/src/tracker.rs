//! Per-callable accumulator: sums one render's worth of time, commits it as
//! a single sample on the next render boundary, and forwards commits into a
//! [`TieredSketch`].

use serde::Serialize;

use crate::bin_pool::BinPool;
use crate::sketch::{SketchExport, TieredSketch};
use crate::sketch_params::SketchParams;

/// Value-semantic export of a [`ScriptTracker`]'s accumulated state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackerExport {
    pub commits: u64,
    pub calls: u64,
    pub total_time: f64,
    pub sketch: SketchExport,
    pub dependent: bool,
}

/// Per-callable accumulator.
///
/// Many sub-calls of the same callable within a single render are summed
/// into one pending total and committed as a single sample the moment a
/// `record` call observes a different frame index (or at `export`). This is
/// the engine's single most load-bearing invariant: **one commit per
/// (tracker, render) pair** (§4.4).
#[derive(Debug, Clone)]
pub struct ScriptTracker {
    sketch: TieredSketch,
    total_time: f64,
    commits: u64,
    calls: u64,
    frame_time: f64,
    frame_calls: u64,
    last_frame_index: u64,
    dependent: bool,
}

impl ScriptTracker {
    /// Creates a tracker with an empty sketch, pinned to `frame_index` as
    /// the render it was created in.
    #[must_use]
    pub fn new(params: SketchParams, outlier_capacity: usize, dependent: bool, frame_index: u64) -> Self {
        Self {
            sketch: TieredSketch::new(params, outlier_capacity),
            total_time: 0.0,
            commits: 0,
            calls: 0,
            frame_time: 0.0,
            frame_calls: 0,
            last_frame_index: frame_index,
            dependent,
        }
    }

    #[must_use]
    pub const fn dependent(&self) -> bool {
        self.dependent
    }

    #[must_use]
    pub const fn commits(&self) -> u64 {
        self.commits
    }

    #[must_use]
    pub const fn calls(&self) -> u64 {
        self.calls
    }

    #[must_use]
    pub const fn total_time(&self) -> f64 {
        self.total_time
    }

    /// Adds `delta_ms` to the pending total for the render at
    /// `frame_index`. Committing any prior render's pending total happens
    /// implicitly here, the moment `frame_index` is observed to differ from
    /// the last one seen.
    ///
    /// Must be cheap: a compare, at most one commit's worth of bookkeeping,
    /// and two adds.
    pub fn record(&mut self, delta_ms: f64, frame_index: u64, pool: &mut BinPool) {
        if frame_index != self.last_frame_index {
            self.commit(pool);
            self.last_frame_index = frame_index;
        }
        self.frame_time += delta_ms;
        self.frame_calls += 1;
    }

    /// Pushes the pending frame total into the sketch as one sample, if any
    /// calls were recorded since the last commit. A no-op when there is
    /// nothing pending — in particular, calling this twice in a row without
    /// an intervening `record` is a no-op the second time.
    pub fn commit(&mut self, pool: &mut BinPool) {
        if self.frame_calls == 0 {
            return;
        }
        self.sketch.push(self.frame_time, pool);
        self.commits += 1;
        self.calls += self.frame_calls;
        self.total_time += self.frame_time;
        self.frame_time = 0.0;
        self.frame_calls = 0;
    }

    /// `true` iff, after flushing any pending total, this tracker has
    /// recorded at least one commit since the last reset.
    pub fn should_export(&mut self, pool: &mut BinPool) -> bool {
        self.commit(pool);
        self.commits > 0
    }

    /// Flushes pending state and returns a value-semantic export.
    pub fn export(&mut self, pool: &mut BinPool) -> TrackerExport {
        self.commit(pool);
        TrackerExport {
            commits: self.commits,
            calls: self.calls,
            total_time: self.total_time,
            sketch: self.sketch.export(),
            dependent: self.dependent,
        }
    }

    /// Zeros every accumulator and re-pins `last_frame_index` to
    /// `frame_index`, so the next `record` call does not spuriously commit
    /// an empty pending total.
    pub fn reset(&mut self, frame_index: u64) {
        self.sketch.reset();
        self.total_time = 0.0;
        self.commits = 0;
        self.calls = 0;
        self.frame_time = 0.0;
        self.frame_calls = 0;
        self.last_frame_index = frame_index;
    }
}
