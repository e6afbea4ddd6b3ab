//! Tail-sampling building blocks.
//!
//! The pieces the processor composes into the batch pipeline:
//! - `history`: rolling per-operation latency statistics
//! - `fingerprint`: structural type ids and anomaly scoring
//! - `buffer`: bounded accumulator with atomic swap-and-clear
//! - `quota`: per-type budget allocation
//! - `matrix`: latency-matrix projection
//! - `evolution`: representative subset selection via evolutionary search

pub mod buffer;
pub mod evolution;
pub mod fingerprint;
pub mod history;
pub mod matrix;
pub mod quota;

pub use buffer::{NormalPartition, SharedBuffer};
pub use evolution::{Individual, SampleOptimizer, SampleProblem, PERCENTILES};
pub use fingerprint::TraceEncoder;
pub use history::{HistPool, LatencyStat};
pub use matrix::{build_latency_matrix, collect_labels};
pub use quota::allocate_quota;
