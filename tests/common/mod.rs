//! Common test utilities and fixtures.

use std::time::{Duration, SystemTime};
use tracepick::core::{ServiceName, Span, SpanId, SpanStatus, Trace, TraceId};

/// Test fixture builder for creating spans with sensible defaults.
pub struct TestSpanBuilder {
    trace_num: u32,
    span_num: u32,
    service: String,
    operation: String,
    has_error: bool,
    is_root: bool,
    duration_ms: u64,
}

impl TestSpanBuilder {
    pub fn new(trace_num: u32, span_num: u32) -> Self {
        Self {
            trace_num,
            span_num,
            service: "test-service".to_string(),
            operation: format!("operation-{}", span_num),
            has_error: false,
            is_root: span_num == 0,
            duration_ms: 100,
        }
    }

    pub fn service(mut self, service: &str) -> Self {
        self.service = service.to_string();
        self
    }

    pub fn operation(mut self, operation: &str) -> Self {
        self.operation = operation.to_string();
        self
    }

    pub fn with_error(mut self) -> Self {
        self.has_error = true;
        self
    }

    pub fn duration_ms(mut self, ms: u64) -> Self {
        self.duration_ms = ms;
        self
    }

    pub fn build(self) -> Span {
        let trace_id = TraceId::new(format!("trace_{:06}", self.trace_num)).unwrap();
        let span_id = if self.is_root {
            SpanId::new(format!("root_{:06}", self.trace_num)).unwrap()
        } else {
            SpanId::new(format!("s_{:06}_{:02}", self.trace_num, self.span_num)).unwrap()
        };

        let mut builder = Span::builder()
            .trace_id(trace_id)
            .span_id(span_id)
            .service_name(ServiceName::new(self.service).unwrap())
            .operation_name(self.operation)
            .start_time(SystemTime::now())
            .duration(Duration::from_millis(self.duration_ms))
            .status(if self.has_error {
                SpanStatus::Error("test error".to_string())
            } else {
                SpanStatus::Ok
            });

        if !self.is_root {
            builder = builder
                .parent_span_id(SpanId::new(format!("root_{:06}", self.trace_num)).unwrap());
        }

        builder.build().unwrap()
    }
}

/// A trace with a single root span.
pub fn single_span_trace(trace_num: u32, service: &str, operation: &str, ms: u64) -> Trace {
    let span = TestSpanBuilder::new(trace_num, 0)
        .service(service)
        .operation(operation)
        .duration_ms(ms)
        .build();
    Trace::from_spans(span.trace_id.clone(), vec![span]).unwrap()
}

/// A trace with a single root span carrying an error status.
pub fn error_trace(trace_num: u32, service: &str, operation: &str, ms: u64) -> Trace {
    let span = TestSpanBuilder::new(trace_num, 0)
        .service(service)
        .operation(operation)
        .duration_ms(ms)
        .with_error()
        .build();
    Trace::from_spans(span.trace_id.clone(), vec![span]).unwrap()
}

/// A root span plus one child per `(service, operation, ms)` entry.
pub fn tree_trace(trace_num: u32, root: (&str, &str, u64), children: &[(&str, &str, u64)]) -> Trace {
    let mut spans = vec![TestSpanBuilder::new(trace_num, 0)
        .service(root.0)
        .operation(root.1)
        .duration_ms(root.2)
        .build()];
    for (i, (service, operation, ms)) in children.iter().enumerate() {
        spans.push(
            TestSpanBuilder::new(trace_num, i as u32 + 1)
                .service(service)
                .operation(operation)
                .duration_ms(*ms)
                .build(),
        );
    }
    Trace::from_spans(spans[0].trace_id.clone(), spans).unwrap()
}

/// Linear-interpolation percentile over raw values.
pub fn percentile_of(values: &[f64], p: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    assert!(!sorted.is_empty());
    if p <= 0.0 {
        return sorted[0];
    }
    if p >= 100.0 {
        return sorted[sorted.len() - 1];
    }
    let position = p / 100.0 * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    if lower == upper {
        return sorted[lower];
    }
    let weight = position - lower as f64;
    sorted[lower] * (1.0 - weight) + sorted[upper] * weight
}
