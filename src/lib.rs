//! Tracepick - tail-based representative trace sampling.
//!
//! Tracepick sits at the end of a distributed-tracing collection
//! pipeline. Completed traces stream in; the sampler keeps every trace
//! that looks anomalous and a budgeted subset of the normal ones whose
//! latency distribution stays representative of the full population.
//!
//! # How it works
//!
//! - **Fingerprinting**: each trace is reduced to a structural type id
//!   (SHA-1 of its sibling-sorted BFS label sequence) and scored against
//!   a rolling per-operation latency history.
//! - **Batching**: traces accumulate in a bounded buffer partitioned by
//!   type; a full buffer is swapped out atomically so ingestion never
//!   blocks on sampling.
//! - **Quota allocation**: a dynamic program splits the batch budget
//!   across types, balancing per-type history against current supply.
//! - **Group sampling**: an evolutionary search picks the concrete traces
//!   per type whose latency-percentile profile best matches the batch.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tracepick::core::ConfigBuilder;
//! use tracepick::export::{CollectorSink, TraceSink};
//! use tracepick::processor::TailSampler;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConfigBuilder::new()
//!         .sample_rate(0.1)
//!         .buffer_size(4000)
//!         .build()?;
//!
//!     let sink = Arc::new(CollectorSink::new());
//!     let sampler = TailSampler::new(config, Arc::clone(&sink) as Arc<dyn TraceSink>)?;
//!     sampler.start();
//!
//!     // sampler.consume_trace(trace)? for every completed trace...
//!
//!     sampler.shutdown().await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod core;
pub mod export;
pub mod processor;
pub mod sampling;

pub use crate::core::{Config, ConfigBuilder, Result, SamplerError};
pub use crate::export::TraceSink;
pub use crate::processor::TailSampler;
