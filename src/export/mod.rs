//! Downstream trace consumers.
//!
//! The sampler hands every selected trace to a [`TraceSink`] one at a
//! time; sink errors are logged by the processor and never propagate back
//! to producers.

use crate::core::{Result, SamplerError, Trace};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::io::Write;

/// Next consumer in the pipeline, accepting traces one at a time.
#[async_trait]
pub trait TraceSink: Send + Sync {
    /// Consumes one sampled trace.
    async fn consume_trace(&self, trace: &Trace) -> Result<()>;
}

/// Writes each sampled trace as one JSON line.
pub struct JsonLinesSink<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        JsonLinesSink {
            writer: Mutex::new(writer),
        }
    }

    /// Flushes and returns the underlying writer.
    pub fn into_inner(self) -> Result<W> {
        let mut writer = self.writer.into_inner();
        writer.flush()?;
        Ok(writer)
    }
}

#[async_trait]
impl<W: Write + Send> TraceSink for JsonLinesSink<W> {
    async fn consume_trace(&self, trace: &Trace) -> Result<()> {
        let line = serde_json::to_string(trace)?;
        let mut writer = self.writer.lock();
        writer
            .write_all(line.as_bytes())
            .and_then(|_| writer.write_all(b"\n"))
            .map_err(|e| SamplerError::export(format!("failed to write trace: {}", e)))
    }
}

/// Collects sampled traces in memory.
///
/// The terminal sink for tests and for embedders that drain results
/// themselves.
#[derive(Default)]
pub struct CollectorSink {
    traces: Mutex<Vec<Trace>>,
}

impl CollectorSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of everything collected so far.
    pub fn collected(&self) -> Vec<Trace> {
        self.traces.lock().clone()
    }

    /// Number of traces collected so far.
    pub fn len(&self) -> usize {
        self.traces.lock().len()
    }

    /// Returns true if nothing was collected yet.
    pub fn is_empty(&self) -> bool {
        self.traces.lock().is_empty()
    }
}

#[async_trait]
impl TraceSink for CollectorSink {
    async fn consume_trace(&self, trace: &Trace) -> Result<()> {
        self.traces.lock().push(trace.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ServiceName, Span, SpanId, SpanStatus, TraceId};
    use std::time::Duration;

    fn make_trace(n: u32) -> Trace {
        let trace_id = TraceId::new(format!("trace{:04}", n)).unwrap();
        let span = Span::builder()
            .trace_id(trace_id.clone())
            .span_id(SpanId::new(format!("span{:04}", n)).unwrap())
            .service_name(ServiceName::new("svc".to_string()).unwrap())
            .operation_name("op")
            .duration(Duration::from_millis(10))
            .status(SpanStatus::Ok)
            .build()
            .unwrap();
        Trace::from_spans(trace_id, vec![span]).unwrap()
    }

    #[tokio::test]
    async fn test_collector_sink() {
        let sink = CollectorSink::new();
        assert!(sink.is_empty());

        sink.consume_trace(&make_trace(0)).await.unwrap();
        sink.consume_trace(&make_trace(1)).await.unwrap();

        assert_eq!(sink.len(), 2);
        let collected = sink.collected();
        assert_eq!(collected[0].trace_id.as_str(), "trace0000");
        assert_eq!(collected[1].trace_id.as_str(), "trace0001");
    }

    #[tokio::test]
    async fn test_json_lines_sink() {
        let sink = JsonLinesSink::new(Vec::new());
        sink.consume_trace(&make_trace(0)).await.unwrap();
        sink.consume_trace(&make_trace(1)).await.unwrap();

        let buffer = sink.into_inner().unwrap();
        let output = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 2);
        for line in lines {
            let parsed: Trace = serde_json::from_str(line).unwrap();
            assert_eq!(parsed.span_count(), 1);
        }
    }
}
