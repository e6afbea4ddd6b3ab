//! Latency-matrix projection.
//!
//! Projects traces onto a `(trace x label)` matrix of per-operation
//! latencies, the representation consumed by the group sampler's
//! percentile-profile fitness.

use crate::core::Trace;
use crate::sampling::buffer::NormalPartition;
use rustc_hash::FxHashMap;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Collects the unique operation labels across a whole batch — both the
/// normal and the abnormal partition — and assigns stable column indices
/// in sorted label order.
pub fn collect_labels(
    normal_by_type: &NormalPartition,
    abnormal: &[Arc<Trace>],
) -> (Vec<String>, FxHashMap<String, usize>) {
    let mut label_set: BTreeSet<String> = BTreeSet::new();
    for traces in normal_by_type.values() {
        for trace in traces {
            for span in &trace.spans {
                label_set.insert(span.label());
            }
        }
    }
    for trace in abnormal {
        for span in &trace.spans {
            label_set.insert(span.label());
        }
    }

    let labels: Vec<String> = label_set.into_iter().collect();
    let label_index = labels
        .iter()
        .enumerate()
        .map(|(i, label)| (label.clone(), i))
        .collect();
    (labels, label_index)
}

/// Builds the latency matrix for `traces`.
///
/// Each cell holds the duration in whole milliseconds of the last span in
/// delivery order bearing that label; duplicate labels within a trace
/// overwrite earlier occurrences. Labels a trace never emits stay NaN and
/// are ignored by the percentile computation downstream.
pub fn build_latency_matrix(
    traces: &[Arc<Trace>],
    label_index: &FxHashMap<String, usize>,
    num_labels: usize,
) -> Vec<Vec<f64>> {
    traces
        .iter()
        .map(|trace| {
            let mut row = vec![f64::NAN; num_labels];
            for span in &trace.spans {
                if let Some(&idx) = label_index.get(&span.label()) {
                    row[idx] = span.duration_ms() as f64;
                }
            }
            row
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ServiceName, Span, SpanId, SpanStatus, Trace, TraceId, TypeId};
    use std::time::Duration;

    fn make_trace(n: u32, ops: &[(&str, &str, u64)]) -> Arc<Trace> {
        let trace_id = TraceId::new(format!("trace{:04}", n)).unwrap();
        let spans = ops
            .iter()
            .enumerate()
            .map(|(i, (service, op, ms))| {
                let mut builder = Span::builder()
                    .trace_id(trace_id.clone())
                    .span_id(SpanId::new(format!("s{:04}_{}", n, i)).unwrap())
                    .service_name(ServiceName::new(service.to_string()).unwrap())
                    .operation_name(*op)
                    .duration(Duration::from_millis(*ms))
                    .status(SpanStatus::Ok);
                if i > 0 {
                    builder =
                        builder.parent_span_id(SpanId::new(format!("s{:04}_0", n)).unwrap());
                }
                builder.build().unwrap()
            })
            .collect();
        Arc::new(Trace::from_spans(trace_id, spans).unwrap())
    }

    #[test]
    fn test_labels_union_both_partitions() {
        let mut normal = NormalPartition::default();
        normal.insert(
            TypeId::from_digest("t1".to_string()),
            vec![make_trace(0, &[("api", "get", 10)])],
        );
        let abnormal = vec![make_trace(1, &[("db", "query", 50)])];

        let (labels, index) = collect_labels(&normal, &abnormal);
        assert_eq!(labels, vec!["api:get".to_string(), "db:query".to_string()]);
        assert_eq!(index.len(), 2);
        assert_eq!(index["api:get"], 0);
        assert_eq!(index["db:query"], 1);
    }

    #[test]
    fn test_matrix_cells_and_nan() {
        let traces = vec![
            make_trace(0, &[("api", "get", 10), ("db", "query", 50)]),
            make_trace(1, &[("api", "get", 20)]),
        ];
        let mut index = FxHashMap::default();
        index.insert("api:get".to_string(), 0);
        index.insert("db:query".to_string(), 1);

        let matrix = build_latency_matrix(&traces, &index, 2);
        assert_eq!(matrix.len(), 2);
        assert_eq!(matrix[0][0], 10.0);
        assert_eq!(matrix[0][1], 50.0);
        assert_eq!(matrix[1][0], 20.0);
        assert!(matrix[1][1].is_nan());
    }

    #[test]
    fn test_duplicate_label_keeps_last() {
        let traces = vec![make_trace(0, &[("api", "get", 10), ("api", "get", 30)])];
        let mut index = FxHashMap::default();
        index.insert("api:get".to_string(), 0);

        let matrix = build_latency_matrix(&traces, &index, 1);
        assert_eq!(matrix[0][0], 30.0);
    }
}
