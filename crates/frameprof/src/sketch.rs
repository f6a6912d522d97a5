//! Three-tiered distributional sketch: a trivial counter for observations at
//! or below the noise floor, an exact [`TopK`] for the long-tail extrema,
//! and a lazily-allocated log-binned histogram for everything in between.

use serde::Serialize;

use crate::bin_pool::BinPool;
use crate::sketch_params::SketchParams;
use crate::topk::{TopK, TopKPush};

/// Value-semantic snapshot of a [`TieredSketch`], suitable for embedding in
/// a [`crate::snapshot::Snapshot`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SketchExport {
    pub count: u64,
    pub trivial_count: u64,
    /// Absent until the sketch's first eviction into the histogram tier.
    pub bins: Option<Vec<u64>>,
    /// Exact contents of the outlier heap, order unspecified.
    pub outliers: Vec<f64>,
}

/// A per-tracker distributional sketch.
#[derive(Debug, Clone)]
pub struct TieredSketch {
    params: SketchParams,
    count: u64,
    trivial_count: u64,
    bins: Option<Vec<u64>>,
    outliers: TopK,
}

impl TieredSketch {
    /// Creates an empty sketch with no bin vector allocated yet.
    #[must_use]
    pub fn new(params: SketchParams, outlier_capacity: usize) -> Self {
        Self {
            params,
            count: 0,
            trivial_count: 0,
            bins: None,
            outliers: TopK::new(outlier_capacity),
        }
    }

    #[must_use]
    pub const fn params(&self) -> &SketchParams {
        &self.params
    }

    #[must_use]
    pub const fn count(&self) -> u64 {
        self.count
    }

    /// `true` once the histogram tier has been activated by a first
    /// eviction; never reverts to `false` for the life of the sketch.
    #[must_use]
    pub const fn has_bins(&self) -> bool {
        self.bins.is_some()
    }

    /// Records one observation, non-negative and in milliseconds.
    ///
    /// `pool` is only touched the first time an observation above
    /// [`SketchParams::trivial_cutoff`] gets evicted from the outlier heap;
    /// every push below that threshold, and every push while the heap still
    /// has room, is pool-free.
    pub fn push(&mut self, x: f64, pool: &mut BinPool) {
        debug_assert!(x >= 0.0, "observations must be non-negative, got {x}");
        self.count += 1;

        if x <= self.params.trivial_cutoff {
            self.trivial_count += 1;
            return;
        }

        match self.outliers.push(x) {
            TopKPush::Inserted => {}
            TopKPush::Evicted(evicted) => self.bin(evicted, pool),
            TopKPush::Rejected(rejected) => self.bin(rejected, pool),
        }
    }

    fn bin(&mut self, value: f64, pool: &mut BinPool) {
        if self.bins.is_none() {
            self.bins = Some(pool.acquire());
        }
        let capacity = pool.bin_capacity();
        let idx = self.params.clamp_bin_index(self.params.bin_index(value), capacity);
        if let Some(bins) = &mut self.bins {
            bins[idx] += 1;
        }
    }

    /// Zeros all counters and clears the outlier heap; the bin vector, if
    /// allocated, is zeroed in place and kept on loan rather than returned
    /// to the pool.
    pub fn reset(&mut self) {
        self.count = 0;
        self.trivial_count = 0;
        if let Some(bins) = &mut self.bins {
            bins.fill(0);
        }
        self.outliers.clear();
    }

    /// Produces a value-semantic snapshot of the current state.
    #[must_use]
    pub fn export(&self) -> SketchExport {
        SketchExport {
            count: self.count,
            trivial_count: self.trivial_count,
            bins: self.bins.clone(),
            outliers: self.outliers.contents().to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sketch(outlier_capacity: usize) -> (TieredSketch, BinPool) {
        let params = SketchParams::new(0.05);
        let pool = BinPool::new(params.bin_capacity_for(100.0), 4);
        (TieredSketch::new(params, outlier_capacity), pool)
    }

    #[test]
    fn trivial_only_stream() {
        let (mut s, mut pool) = sketch(10);
        for _ in 0..1000 {
            s.push(0.1, &mut pool);
        }
        assert_eq!(s.count(), 1000);
        let export = s.export();
        assert_eq!(export.trivial_count, 1000);
        assert!(export.outliers.is_empty());
        assert!(export.bins.is_none());
    }

    #[test]
    fn observation_exactly_at_cutoff_is_trivial() {
        let (mut s, mut pool) = sketch(10);
        let cutoff = s.params().trivial_cutoff;
        s.push(cutoff, &mut pool);
        let export = s.export();
        assert_eq!(export.trivial_count, 1);
        assert!(export.outliers.is_empty());
    }

    #[test]
    fn top_k_only_when_fewer_than_k_outliers() {
        let (mut s, mut pool) = sketch(5);
        for v in [0.1, 5.0, 3.0, 27.0, 2.0, 7.0] {
            s.push(v, &mut pool);
        }
        let export = s.export();
        assert_eq!(export.count, 6);
        assert_eq!(export.trivial_count, 1);
        assert!(export.bins.is_none());
        let mut outliers = export.outliers.clone();
        outliers.sort_by(f64::total_cmp);
        assert_eq!(outliers, vec![2.0, 3.0, 5.0, 7.0, 27.0]);
    }

    #[test]
    fn overflow_spills_into_bins() {
        let (mut s, mut pool) = sketch(5);
        for v in [5.0, 3.0, 27.0, 2.0, 7.0, 32.0, 27.0, 1.0, 3.0, 100.0] {
            s.push(v, &mut pool);
        }
        let export = s.export();
        assert_eq!(export.count, 10);
        assert!(export.bins.is_some());
        let mut outliers = export.outliers.clone();
        outliers.sort_by(f64::total_cmp);
        assert_eq!(outliers, vec![7.0, 27.0, 27.0, 32.0, 100.0]);

        let bins_total: u64 = export.bins.as_ref().unwrap().iter().sum();
        // Every pushed value here is above the (~0.5ms) cutoff, so nothing
        // is trivial; the five values evicted from the outlier heap (2, 3,
        // 1, 3, 5, in eviction order) all land in bins.
        assert_eq!(bins_total, 5);
        assert_eq!(export.trivial_count, 0);
        assert_eq!(
            export.count,
            export.trivial_count + bins_total + export.outliers.len() as u64
        );
    }

    #[test]
    fn reset_clears_everything_but_keeps_bin_vector_loaned() {
        let (mut s, mut pool) = sketch(2);
        for v in [5.0, 10.0, 20.0] {
            s.push(v, &mut pool);
        }
        assert!(s.has_bins());
        s.reset();
        assert_eq!(s.count(), 0);
        let export = s.export();
        assert_eq!(export.trivial_count, 0);
        assert!(export.outliers.is_empty());
        // Bin vector stays allocated (state machine never reverts).
        assert!(export.bins.is_some());
        assert!(export.bins.unwrap().iter().all(|&b| b == 0));
        assert!(s.has_bins());
    }

    #[test]
    fn repeated_export_without_push_is_idempotent() {
        let (mut s, mut pool) = sketch(5);
        s.push(7.0, &mut pool);
        assert_eq!(s.export(), s.export());
    }

    mod proptest_sketch {
        use super::*;
        use proptest::prelude::*;

        fn pt_config() -> ProptestConfig {
            ProptestConfig {
                cases: 300,
                max_shrink_iters: 2000,
                ..ProptestConfig::default()
            }
        }

        proptest! {
            #![proptest_config(pt_config())]

            /// `count == trivial_count + sum(bins) + |outliers|` for any
            /// observation stream, once bins have been allocated (§8 invariant 2).
            #[test]
            fn prop_accounting_invariant_holds(
                k in 1..=10usize,
                values in prop::collection::vec(0.0..50.0f64, 0..300),
            ) {
                let params = SketchParams::new(0.05);
                let mut pool = BinPool::new(params.bin_capacity_for(100.0), 2);
                let mut s = TieredSketch::new(params, k);
                for &v in &values {
                    s.push(v, &mut pool);
                }
                let export = s.export();
                let bins_total: u64 = export.bins.as_ref().map_or(0, |b| b.iter().sum());
                prop_assert_eq!(
                    export.count,
                    export.trivial_count + bins_total + export.outliers.len() as u64
                );
                prop_assert!(export.outliers.len() <= k);
            }
        }
    }
}
