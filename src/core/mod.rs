//! Domain models and shared infrastructure.
//!
//! Owns the trace data model, error types, and configuration used by
//! every other module.

pub mod config;
pub mod error;
pub mod types;

pub use config::{Config, ConfigBuilder, EvolutionConfig, LogLevel, LoggingConfig, SamplerConfig};
pub use error::{Result, SamplerError};
pub use types::{ServiceName, Span, SpanBuilder, SpanId, SpanStatus, Trace, TraceId, TypeId};
