//! Latency reservoirs and per-fingerprint aggregates.

/// Number of slots in a latency reservoir.
pub const TIME_BUCKETS: usize = 10_000;

/// Fixed-size latency sample buffer with random-index replacement.
///
/// Slots hold nanoseconds; zero marks an empty slot, so aggregates skip
/// zero values. A real query never takes 0ns, which is what makes the
/// sentinel safe.
pub struct Reservoir {
    slots: Box<[u64]>,
}

impl Reservoir {
    pub fn new() -> Self {
        Self {
            slots: vec![0u64; TIME_BUCKETS].into_boxed_slice(),
        }
    }

    /// Write a sample into the given slot, overwriting any prior value.
    /// The caller supplies the slot so one uniform draw can be shared
    /// across the flow, global, and per-fingerprint reservoirs.
    pub fn set(&mut self, slot: usize, nanos: u64) {
        debug_assert!(slot < TIME_BUCKETS);
        if let Some(v) = self.slots.get_mut(slot) {
            *v = nanos;
        }
    }

    /// Min/avg/max over the occupied slots, in milliseconds.
    pub fn summary(&self) -> LatencySummary {
        let mut min = 0u64;
        let mut max = 0u64;
        let mut total = 0u64;
        let mut count = 0u64;
        let mut has_min = false;

        for &v in self.slots.iter() {
            if v == 0 {
                continue;
            }
            if !has_min || v < min {
                has_min = true;
                min = v;
            }
            if v > max {
                max = v;
            }
            total += v;
            count += 1;
        }

        let avg = if count > 0 { total / count } else { 0 };
        LatencySummary {
            min_ms: min as f64 / 1_000_000.0,
            avg_ms: avg as f64 / 1_000_000.0,
            max_ms: max as f64 / 1_000_000.0,
        }
    }
}

impl Default for Reservoir {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Reservoir {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reservoir")
            .field("summary", &self.summary())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatencySummary {
    pub min_ms: f64,
    pub avg_ms: f64,
    pub max_ms: f64,
}

/// Aggregated statistics for one fingerprint.
#[derive(Debug, Default)]
pub struct QueryStats {
    /// Times the fingerprint was observed.
    pub count: u64,
    /// Request payload plus response bytes attributed to it.
    pub bytes: u64,
    pub times: Reservoir,
}
