//! Derived parameters shared by every [`crate::sketch::TieredSketch`] an
//! engine instance creates.
//!
//! The parameters are computed once, from `alpha`, and embedded verbatim
//! into every snapshot so an off-line viewer can reconstruct bin edges
//! without access to the running engine.

use serde::Serialize;

/// Nominal trivial-observation cutoff, in milliseconds, used only to derive
/// [`SketchParams::bin_offset`]. The *actual* cutoff is the recomputed
/// `gamma^bin_offset`, which lands close to but not exactly at this value —
/// it is quantized to a bin boundary.
const NOMINAL_TRIVIAL_CUTOFF_MS: f64 = 0.5;

/// Relative-error parameters for the log-binned histogram tier of a
/// [`crate::sketch::TieredSketch`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SketchParams {
    /// Target relative error, e.g. `0.05` for 5%.
    pub alpha: f64,
    /// Bin growth base, `(1 + alpha) / (1 - alpha)`.
    pub gamma: f64,
    /// Offset subtracted from `ceil(log_gamma(x))` to form a bin index.
    pub bin_offset: i64,
    /// Observations at or below this value are trivial and never occupy a
    /// bin or an outlier slot.
    pub trivial_cutoff: f64,
}

impl SketchParams {
    /// Derives sketch parameters for relative error `alpha`.
    ///
    /// # Panics
    ///
    /// Panics if `alpha` is not in `(0, 1)`. Callers that accept `alpha` from
    /// untrusted/host input should validate with [`crate::config::EngineConfig::validated`]
    /// first; this constructor is for the already-validated value.
    #[must_use]
    pub fn new(alpha: f64) -> Self {
        assert!(
            alpha > 0.0 && alpha < 1.0,
            "alpha must be in (0, 1), got {alpha}"
        );
        let gamma = (1.0 + alpha) / (1.0 - alpha);
        let bin_offset = (NOMINAL_TRIVIAL_CUTOFF_MS.ln() / gamma.ln()).ceil() as i64;
        let trivial_cutoff = gamma.powi(i32::try_from(bin_offset).unwrap_or(i32::MAX));
        Self {
            alpha,
            gamma,
            bin_offset,
            trivial_cutoff,
        }
    }

    /// Bin index for an observation `x` strictly greater than
    /// [`Self::trivial_cutoff`].
    ///
    /// A small epsilon is subtracted before rounding up so that a value
    /// landing exactly on a bin's left edge (as `left_edge(i)` does, modulo
    /// floating-point round-trip error through `powi`/`ln`) maps back to
    /// that same bin rather than drifting into the next one.
    #[must_use]
    pub fn bin_index(&self, x: f64) -> i64 {
        debug_assert!(x > self.trivial_cutoff);
        const EPS: f64 = 1e-9;
        (x.ln() / self.gamma.ln() - EPS).ceil() as i64 - self.bin_offset
    }

    /// Left (inclusive) edge of bin `i`.
    #[must_use]
    pub fn left_edge(&self, i: i64) -> f64 {
        self.gamma
            .powi(i32::try_from(i + self.bin_offset).unwrap_or(i32::MAX))
    }

    /// Number of bins needed to hold any observation up to `max_observed_ms`
    /// without resizing, plus one "overflow" slot observations beyond that
    /// range clamp into.
    #[must_use]
    pub fn bin_capacity_for(&self, max_observed_ms: f64) -> usize {
        let highest = self.bin_index(max_observed_ms).max(0);
        usize::try_from(highest).unwrap_or(usize::MAX).saturating_add(1)
    }

    /// Clamps a bin index into `[0, capacity - 1]`, per the "clamp to the
    /// last bin" policy (see §4.2/§7 `BinOverflow`).
    #[must_use]
    pub fn clamp_bin_index(&self, idx: i64, capacity: usize) -> usize {
        if capacity == 0 {
            return 0;
        }
        let idx = idx.max(0);
        usize::try_from(idx)
            .unwrap_or(usize::MAX)
            .min(capacity - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trivial_cutoff_is_approximately_half_a_millisecond() {
        let params = SketchParams::new(0.05);
        assert!((params.trivial_cutoff - 0.5).abs() < 0.1);
        assert!((params.gamma - 1.1053).abs() < 1e-3);
    }

    #[test]
    fn bin_index_round_trips_through_left_edge() {
        let params = SketchParams::new(0.05);
        for i in 0..200_i64 {
            let edge = params.left_edge(i);
            assert_eq!(params.bin_index(edge), i, "left_edge({i}) = {edge}");
        }
    }

    #[test]
    fn observation_lands_within_its_bin_bounds() {
        let params = SketchParams::new(0.05);
        for raw in [1.0_f64, 2.5, 10.0, 37.3, 99.9, 500.0] {
            if raw <= params.trivial_cutoff {
                continue;
            }
            let idx = params.bin_index(raw);
            let lo = params.left_edge(idx);
            let hi = params.left_edge(idx + 1);
            assert!(lo <= raw, "{lo} <= {raw} failed for bin {idx}");
            assert!(raw < hi, "{raw} < {hi} failed for bin {idx}");
        }
    }

    mod proptest_sketch_params {
        use super::*;
        use proptest::prelude::*;

        fn pt_config() -> ProptestConfig {
            ProptestConfig {
                cases: 500,
                max_shrink_iters: 2000,
                ..ProptestConfig::default()
            }
        }

        proptest! {
            #![proptest_config(pt_config())]

            /// `left_edge(bin(x)) <= x < left_edge(bin(x) + 1)` for any `x`
            /// above the trivial cutoff within the supported range (§8 invariant 3).
            #[test]
            fn prop_observation_lands_within_its_bin(raw in 0.51..100_000.0f64) {
                let params = SketchParams::new(0.05);
                let idx = params.bin_index(raw);
                let lo = params.left_edge(idx);
                let hi = params.left_edge(idx + 1);
                prop_assert!(lo <= raw);
                prop_assert!(raw < hi);
            }

            /// `bin(left_edge(i)) == i` for representable bin indices (§8 invariant 4).
            #[test]
            fn prop_left_edge_round_trips(i in 0..500_i64) {
                let params = SketchParams::new(0.05);
                let edge = params.left_edge(i);
                prop_assert_eq!(params.bin_index(edge), i);
            }
        }
    }
}
