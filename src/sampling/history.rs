//! Rolling per-operation latency statistics.
//!
//! Backs anomaly scoring: each operation label keeps a bounded FIFO of
//! recent latency samples and a cached mean/stddev recomputed on an
//! adaptive cadence.

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::collections::VecDeque;
use std::time::Duration;

/// Cached latency statistics for one operation label, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LatencyStat {
    pub mean_ms: f64,
    pub stddev_ms: f64,
}

const INITIAL_RECALC_THRESHOLD: usize = 100;
const RECALC_THRESHOLD_STEP: usize = 100;
const MAX_RECALC_THRESHOLD: usize = 2000;

/// Historical latency pool keyed by operation label.
///
/// Writes go through a single write lock; stat reads take the read lock,
/// so scoring can proceed concurrently with unrelated recording.
pub struct HistPool {
    inner: RwLock<PoolInner>,
}

struct PoolInner {
    limit: usize,
    samples: FxHashMap<String, VecDeque<f64>>,
    stats: FxHashMap<String, LatencyStat>,
    recalc_threshold: usize,
    adds_since_recalc: usize,
}

impl HistPool {
    /// Creates a pool keeping at most `pool_height` samples per label.
    pub fn new(pool_height: usize) -> Self {
        HistPool {
            inner: RwLock::new(PoolInner {
                limit: pool_height,
                samples: FxHashMap::default(),
                stats: FxHashMap::default(),
                recalc_threshold: INITIAL_RECALC_THRESHOLD,
                adds_since_recalc: 0,
            }),
        }
    }

    /// Records one latency sample for `label`, evicting the oldest sample
    /// once the label's FIFO is full.
    ///
    /// Every add bumps a global counter; when it reaches the adaptive
    /// threshold all cached stats are recomputed and the threshold grows
    /// by 100 up to a cap of 2000, amortising recompute cost as history
    /// stabilises.
    pub fn add(&self, label: &str, duration: Duration) {
        let mut inner = self.inner.write();

        let limit = inner.limit;
        let fifo = inner.samples.entry(label.to_string()).or_default();
        fifo.push_back(duration.as_secs_f64() * 1000.0);
        if fifo.len() > limit {
            fifo.pop_front();
        }

        inner.adds_since_recalc += 1;
        if inner.adds_since_recalc >= inner.recalc_threshold {
            inner.recalculate_all();
            inner.adds_since_recalc = 0;
            if inner.recalc_threshold < MAX_RECALC_THRESHOLD {
                inner.recalc_threshold += RECALC_THRESHOLD_STEP;
            }
        }
    }

    /// Returns the cached statistics for `label`, or zeros when unknown.
    pub fn stats(&self, label: &str) -> LatencyStat {
        self.inner
            .read()
            .stats
            .get(label)
            .copied()
            .unwrap_or_default()
    }
}

impl PoolInner {
    fn recalculate_all(&mut self) {
        for (label, fifo) in &self.samples {
            let count = fifo.len() as f64;
            let mut sum = 0.0;
            let mut sum_sq = 0.0;
            for &value in fifo {
                sum += value;
                sum_sq += value * value;
            }
            let mean = sum / count;
            // Clamp absorbs floating-point drift in E[x^2] - E[x]^2
            let variance = (sum_sq / count - mean * mean).max(0.0);
            self.stats.insert(
                label.clone(),
                LatencyStat {
                    mean_ms: mean,
                    stddev_ms: variance.sqrt(),
                },
            );
        }
    }
}
