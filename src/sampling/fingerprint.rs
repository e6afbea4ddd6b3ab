//! Structural trace fingerprinting and anomaly scoring.
//!
//! Reduces a trace to a type id (hex SHA-1 of its sibling-sorted BFS
//! label sequence) and a boolean anomaly verdict backed by the
//! historical latency pool.

use crate::core::{Span, SpanId, Trace, TypeId};
use crate::sampling::history::HistPool;
use rustc_hash::FxHashMap;
use sha1::{Digest, Sha1};
use std::collections::VecDeque;
use std::fmt::Write as _;
use std::sync::Arc;

/// How many standard deviations above the mean a span may run before its
/// trace counts as a latency anomaly.
const ANOMALY_SIGMA: f64 = 5.0;

/// Encodes traces into structural type ids and anomaly flags.
pub struct TraceEncoder {
    pool: Arc<HistPool>,
}

impl TraceEncoder {
    pub fn new(pool: Arc<HistPool>) -> Self {
        TraceEncoder { pool }
    }

    /// Encodes `trace` into its structural type id and anomaly verdict.
    ///
    /// Every span's latency is recorded into the history pool as a side
    /// effect; the anomaly threshold uses the post-update statistics.
    /// Traces without a root span get the `empty_root` sentinel id but
    /// still receive an anomaly judgement.
    pub fn encode(&self, trace: &Trace) -> (TypeId, bool) {
        let mut span_by_id: FxHashMap<&SpanId, &Span> = FxHashMap::default();
        let mut children: FxHashMap<&SpanId, Vec<&SpanId>> = FxHashMap::default();
        let mut root: Option<&SpanId> = None;

        for span in &trace.spans {
            span_by_id.insert(&span.span_id, span);
            match &span.parent_span_id {
                None => root = Some(&span.span_id),
                Some(parent) => children.entry(parent).or_default().push(&span.span_id),
            }
        }

        let is_abnormal = self.score_anomaly(trace);

        let Some(root) = root else {
            return (TypeId::empty_root(), is_abnormal);
        };

        // BFS with lexicographically sorted siblings per level, so the
        // fingerprint is invariant to sibling arrival order.
        let mut path: Vec<String> = Vec::with_capacity(trace.spans.len());
        let mut queue: VecDeque<&SpanId> = VecDeque::new();
        queue.push_back(root);

        while !queue.is_empty() {
            let mut level: Vec<(String, &Span)> = queue
                .drain(..)
                .filter_map(|id| span_by_id.get(id).copied())
                .map(|span| (span.label(), span))
                .collect();
            level.sort_by(|a, b| a.0.cmp(&b.0));

            for (label, span) in level {
                path.push(label);
                if let Some(kids) = children.get(&span.span_id) {
                    queue.extend(kids.iter().copied());
                }
            }
        }

        let mut hasher = Sha1::new();
        hasher.update(path.join("->").as_bytes());
        let digest = hasher.finalize();

        let mut hex = String::with_capacity(digest.len() * 2);
        for byte in digest {
            let _ = write!(hex, "{:02x}", byte);
        }

        (TypeId::from_digest(hex), is_abnormal)
    }

    /// A trace is abnormal when any span carries an error status, or its
    /// total latency exceeds the summed `mean + 5 * stddev` thresholds of
    /// its operations (and that threshold sum is positive — with no
    /// history the rule stays silent).
    fn score_anomaly(&self, trace: &Trace) -> bool {
        let mut expected_ms = 0.0;
        let mut actual_ms = 0.0;
        let mut has_error = false;

        for span in &trace.spans {
            if span.status.is_error() {
                has_error = true;
            }
            let label = span.label();
            self.pool.add(&label, span.duration);
            let stat = self.pool.stats(&label);
            expected_ms += stat.mean_ms + ANOMALY_SIGMA * stat.stddev_ms;
            actual_ms += span.duration_ms() as f64;
        }

        has_error || (actual_ms > expected_ms && expected_ms > 0.0)
    }
}
