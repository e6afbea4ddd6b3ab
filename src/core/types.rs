use crate::core::error::{Result, SamplerError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, SystemTime};

/// Unique identifier for a trace
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TraceId(String);

/// Unique identifier for a span within a trace
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpanId(String);

/// Service name identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceName(String);

impl TraceId {
    /// Creates a new TraceId after validation
    pub fn new(id: String) -> Result<Self> {
        if id.is_empty() {
            return Err(SamplerError::invalid_span("TraceId cannot be empty"));
        }
        // OTEL trace IDs are 16 bytes = 32 hex characters
        if id.len() > 32 {
            return Err(SamplerError::invalid_span(format!(
                "TraceId cannot exceed 32 characters, got {}",
                id.len()
            )));
        }
        Ok(TraceId(id))
    }

    /// Returns the string representation of the trace ID
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl SpanId {
    /// Creates a new SpanId after validation
    pub fn new(id: String) -> Result<Self> {
        if id.is_empty() {
            return Err(SamplerError::invalid_span("SpanId cannot be empty"));
        }
        // OTEL span IDs are 8 bytes = 16 hex characters
        if id.len() > 16 {
            return Err(SamplerError::invalid_span(format!(
                "SpanId cannot exceed 16 characters, got {}",
                id.len()
            )));
        }
        Ok(SpanId(id))
    }

    /// Returns the string representation of the span ID
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl ServiceName {
    /// Creates a new ServiceName after validation
    pub fn new(name: String) -> Result<Self> {
        if name.is_empty() {
            return Err(SamplerError::invalid_span("ServiceName cannot be empty"));
        }
        if name.len() > 255 {
            return Err(SamplerError::invalid_span(
                "ServiceName cannot exceed 255 characters",
            ));
        }
        Ok(ServiceName(name))
    }

    /// Returns the string representation of the service name
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Structural type identifier for a trace.
///
/// The hex SHA-1 of the trace's sibling-sorted BFS label sequence. Two
/// traces share a type id exactly when their span trees are isomorphic
/// under label equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(String);

impl TypeId {
    const EMPTY_ROOT: &'static str = "empty_root";

    /// Wraps a computed fingerprint digest
    pub fn from_digest(hex: String) -> Self {
        TypeId(hex)
    }

    /// Sentinel for traces in which no root span could be found
    pub fn empty_root() -> Self {
        TypeId(Self::EMPTY_ROOT.to_string())
    }

    /// Returns true if this is the rootless-trace sentinel
    pub fn is_empty_root(&self) -> bool {
        self.0 == Self::EMPTY_ROOT
    }

    /// Returns the string representation of the type ID
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Status of a span execution
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum SpanStatus {
    /// Span completed successfully
    Ok,
    /// Span completed with an error
    Error(String),
    /// Span was cancelled before completion
    Cancelled,
    /// Span status is unknown
    Unknown,
}

impl SpanStatus {
    /// Returns true if the span status indicates an error
    pub fn is_error(&self) -> bool {
        matches!(self, SpanStatus::Error(_))
    }

    /// Returns true if the span completed successfully
    pub fn is_ok(&self) -> bool {
        matches!(self, SpanStatus::Ok)
    }
}

/// Represents a single span in a distributed trace
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Span {
    /// Unique identifier for the trace this span belongs to
    pub trace_id: TraceId,
    /// Unique identifier for this span
    pub span_id: SpanId,
    /// Parent span ID; `None` identifies a root span
    pub parent_span_id: Option<SpanId>,
    /// Name of the service that generated this span
    pub service_name: ServiceName,
    /// Name of the operation this span represents
    pub operation_name: String,
    /// When the span started
    pub start_time: SystemTime,
    /// How long the span took to complete
    pub duration: Duration,
    /// Status of the span execution
    pub status: SpanStatus,
    /// Key-value attributes associated with the span
    pub attributes: HashMap<String, String>,
}

impl Span {
    /// Creates a new span builder
    pub fn builder() -> SpanBuilder {
        SpanBuilder::default()
    }

    /// Returns true if this span is a root span (has no parent)
    pub fn is_root(&self) -> bool {
        self.parent_span_id.is_none()
    }

    /// Returns the operation label `"{service}:{operation}"`.
    ///
    /// The unit of historical latency modelling and of the latency-matrix
    /// column space.
    pub fn label(&self) -> String {
        format!("{}:{}", self.service_name, self.operation_name)
    }

    /// Returns the duration in whole milliseconds
    pub fn duration_ms(&self) -> u64 {
        self.duration.as_millis() as u64
    }
}

/// Builder for creating Span instances
#[derive(Default)]
pub struct SpanBuilder {
    trace_id: Option<TraceId>,
    span_id: Option<SpanId>,
    parent_span_id: Option<SpanId>,
    service_name: Option<ServiceName>,
    operation_name: Option<String>,
    start_time: Option<SystemTime>,
    duration: Option<Duration>,
    status: Option<SpanStatus>,
    attributes: HashMap<String, String>,
}

impl SpanBuilder {
    pub fn trace_id(mut self, trace_id: TraceId) -> Self {
        self.trace_id = Some(trace_id);
        self
    }

    pub fn span_id(mut self, span_id: SpanId) -> Self {
        self.span_id = Some(span_id);
        self
    }

    pub fn parent_span_id(mut self, parent_span_id: SpanId) -> Self {
        self.parent_span_id = Some(parent_span_id);
        self
    }

    pub fn service_name(mut self, service_name: ServiceName) -> Self {
        self.service_name = Some(service_name);
        self
    }

    pub fn operation_name<S: Into<String>>(mut self, operation_name: S) -> Self {
        self.operation_name = Some(operation_name.into());
        self
    }

    pub fn start_time(mut self, start_time: SystemTime) -> Self {
        self.start_time = Some(start_time);
        self
    }

    pub fn duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn status(mut self, status: SpanStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn attribute<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> Result<Span> {
        Ok(Span {
            trace_id: self
                .trace_id
                .ok_or_else(|| SamplerError::invalid_span("trace_id is required"))?,
            span_id: self
                .span_id
                .ok_or_else(|| SamplerError::invalid_span("span_id is required"))?,
            parent_span_id: self.parent_span_id,
            service_name: self
                .service_name
                .ok_or_else(|| SamplerError::invalid_span("service_name is required"))?,
            operation_name: self
                .operation_name
                .ok_or_else(|| SamplerError::invalid_span("operation_name is required"))?,
            start_time: self.start_time.unwrap_or_else(SystemTime::now),
            duration: self.duration.unwrap_or(Duration::from_millis(0)),
            status: self.status.unwrap_or(SpanStatus::Unknown),
            attributes: self.attributes,
        })
    }
}

/// A complete distributed trace, delivered atomically by the upstream
/// trace assembler and treated as immutable once received.
///
/// Spans keep their delivery order; the latency matrix's last-occurrence
/// rule and the fingerprint's root resolution both depend on it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trace {
    /// Unique identifier for this trace
    pub trace_id: TraceId,
    /// All spans that are part of this trace, in delivery order
    pub spans: Vec<Span>,
}

impl Trace {
    /// Creates a trace from a collection of spans
    pub fn from_spans(trace_id: TraceId, spans: Vec<Span>) -> Result<Self> {
        if spans.is_empty() {
            return Err(SamplerError::invalid_span(
                "Trace must contain at least one span",
            ));
        }
        Ok(Trace { trace_id, spans })
    }

    /// Returns the number of spans in this trace
    pub fn span_count(&self) -> usize {
        self.spans.len()
    }

    /// Returns the root span, if any.
    ///
    /// With multiple roots the last one in delivery order wins, matching
    /// the fingerprint's root resolution.
    pub fn root_span(&self) -> Option<&Span> {
        self.spans.iter().rev().find(|span| span.is_root())
    }

    /// Returns true if any span carries an error status
    pub fn has_error(&self) -> bool {
        self.spans.iter().any(|span| span.status.is_error())
    }

    /// Returns child spans for a given parent span ID
    pub fn child_spans(&self, parent_id: &SpanId) -> Vec<&Span> {
        self.spans
            .iter()
            .filter(|span| span.parent_span_id.as_ref() == Some(parent_id))
            .collect()
    }
}
