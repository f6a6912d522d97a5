//! Process-wide pool of fixed-size bin vectors, so activating the
//! log-binned histogram tier of a sketch for the first time does not have to
//! allocate on the in-combat hot path.
//!
//! Unlike the source this is modeled on, the pool is not a global singleton:
//! it is owned by the [`crate::registry::TrackerRegistry`] and injected into
//! sketches through [`BinPool::acquire`] rather than reached for through a
//! process-wide static.

use tracing::warn;

/// An owned, zero-initialized bin vector on loan from a [`BinPool`].
///
/// Vectors are never returned to the pool mid-encounter (see §4.3); they are
/// dropped along with their owning sketch on shutdown.
pub type BinVec = Vec<u64>;

/// Preallocated pool of bin vectors, all of the same fixed length.
#[derive(Debug)]
pub struct BinPool {
    bin_capacity: usize,
    free: Vec<BinVec>,
    /// Set once per encounter the first time the pool runs dry, so the
    /// `PoolExhausted` diagnostic (§7) is logged at most once per encounter
    /// rather than once per exhausting acquisition.
    exhausted_logged: bool,
}

impl BinPool {
    /// Preallocates `preallocate` vectors of `bin_capacity` zeroed `u64`
    /// counters each.
    #[must_use]
    pub fn new(bin_capacity: usize, preallocate: usize) -> Self {
        let free = (0..preallocate)
            .map(|_| vec![0u64; bin_capacity])
            .collect();
        Self {
            bin_capacity,
            free,
            exhausted_logged: false,
        }
    }

    /// Fixed length every vector this pool hands out has.
    #[must_use]
    pub const fn bin_capacity(&self) -> usize {
        self.bin_capacity
    }

    /// Number of vectors currently sitting idle in the pool.
    #[must_use]
    pub fn available(&self) -> usize {
        self.free.len()
    }

    /// Returns a zero-initialized bin vector, reusing a pooled one if
    /// available. On an empty pool this allocates directly and logs
    /// `PoolExhausted` once per encounter (reset by [`Self::reset_exhaustion_log`]).
    pub fn acquire(&mut self) -> BinVec {
        if let Some(vec) = self.free.pop() {
            return vec;
        }
        if !self.exhausted_logged {
            warn!(bin_capacity = self.bin_capacity, "bin-vector pool exhausted, allocating directly");
            self.exhausted_logged = true;
        }
        vec![0u64; self.bin_capacity]
    }

    /// Clears the once-per-encounter exhaustion log flag. Called when an
    /// encounter opens.
    pub fn reset_exhaustion_log(&mut self) {
        self.exhausted_logged = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_returns_zeroed_vectors_of_fixed_length() {
        let mut pool = BinPool::new(8, 2);
        let v = pool.acquire();
        assert_eq!(v.len(), 8);
        assert!(v.iter().all(|&b| b == 0));
    }

    #[test]
    fn acquire_falls_back_to_direct_allocation_when_empty() {
        let mut pool = BinPool::new(4, 1);
        let _first = pool.acquire();
        assert_eq!(pool.available(), 0);
        let second = pool.acquire();
        assert_eq!(second.len(), 4);
    }
}
