//! Pipeline façade for tail-based sampling.
//!
//! Owns the history pool, encoder, buffer, quota allocator and group
//! sampler, schedules batch sampling on a single background worker, and
//! exports selected traces to the downstream sink.
//!
//! The ingest path never blocks on batch processing: a full buffer is
//! swapped out in O(1) and handed to the worker through a length-one
//! queue. If the worker is still busy when the next batch arrives, the
//! oldest queued batch is dropped and logged.

use crate::core::config::EvolutionConfig;
use crate::core::{Config, Result, SamplerError, Trace, TypeId};
use crate::export::TraceSink;
use crate::sampling::buffer::NormalPartition;
use crate::sampling::{
    allocate_quota, build_latency_matrix, collect_labels, HistPool, SampleOptimizer,
    SampleProblem, SharedBuffer, TraceEncoder,
};
use dashmap::DashMap;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

/// One swapped-out buffer fill, processed as a unit.
struct Batch {
    normal_by_type: NormalPartition,
    abnormal: Vec<Arc<Trace>>,
    count: u64,
}

/// Tail-based trace sampler.
///
/// Accepts completed traces from any number of producer tasks, batches
/// them until the buffer fills, then keeps every anomalous trace plus a
/// representative subset of the normal ones and forwards the result to
/// the downstream sink.
pub struct TailSampler {
    inner: Arc<Inner>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

struct Inner {
    config: Config,
    encoder: TraceEncoder,
    buffer: SharedBuffer,
    /// Cumulative sampled-trace count per type across batches. Process
    /// local; resets on restart.
    path_counter: DashMap<TypeId, u64>,
    sink: Arc<dyn TraceSink>,
    pending: Mutex<Option<Batch>>,
    batch_ready: Notify,
    shutting_down: AtomicBool,
}

impl TailSampler {
    /// Creates a sampler forwarding to `sink`.
    pub fn new(config: Config, sink: Arc<dyn TraceSink>) -> Result<Self> {
        config.validate()?;
        let pool = Arc::new(HistPool::new(config.sampler.pool_height));
        let buffer = SharedBuffer::new(config.sampler.buffer_size);
        Ok(TailSampler {
            inner: Arc::new(Inner {
                encoder: TraceEncoder::new(pool),
                buffer,
                path_counter: DashMap::new(),
                sink,
                pending: Mutex::new(None),
                batch_ready: Notify::new(),
                shutting_down: AtomicBool::new(false),
                config,
            }),
            worker: Mutex::new(None),
        })
    }

    /// Spawns the batch worker. Must run inside a tokio runtime; calling
    /// it twice is a no-op.
    pub fn start(&self) {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            return;
        }
        let inner = Arc::clone(&self.inner);
        *worker = Some(tokio::spawn(async move {
            loop {
                let batch = inner.pending.lock().take();
                match batch {
                    Some(batch) => inner.run_batch(batch).await,
                    None => {
                        if inner.shutting_down.load(Ordering::Acquire) {
                            break;
                        }
                        inner.batch_ready.notified().await;
                    }
                }
            }
        }));
    }

    /// Ingests one completed trace. Non-blocking and infallible by
    /// design: batch-time problems surface through the fallback ladder
    /// and logging, never here.
    pub fn consume_trace(&self, trace: Trace) -> Result<()> {
        let inner = &self.inner;
        let trace = Arc::new(trace);
        let (type_id, is_abnormal) = inner.encoder.encode(&trace);
        inner.buffer.add(type_id, trace, is_abnormal);

        let count = inner.buffer.count();
        let full = inner.buffer.is_full();
        if count % 10 == 0 || full {
            tracing::debug!(
                count,
                limit = inner.config.sampler.buffer_size,
                full,
                "buffer status"
            );
        }

        if full {
            tracing::info!(traces = count, "buffer full, scheduling batch sampling");
            let (normal_by_type, abnormal, count) = inner.buffer.swap_and_clear();
            inner.enqueue(Batch {
                normal_by_type,
                abnormal,
                count,
            });
        }
        Ok(())
    }

    /// Stops the worker and drains the buffer through one final batch.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("processor shutting down, processing remaining traces");
        self.inner.shutting_down.store(true, Ordering::Release);
        self.inner.batch_ready.notify_one();

        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            handle.await?;
        }

        // Anything the worker did not pick up, plus the partial buffer.
        let queued = self.inner.pending.lock().take();
        if let Some(batch) = queued {
            self.inner.run_batch(batch).await;
        }

        let (normal_by_type, abnormal, count) = self.inner.buffer.swap_and_clear();
        if count > 0 {
            tracing::info!(count, "processing remaining traces during shutdown");
            self.inner
                .run_batch(Batch {
                    normal_by_type,
                    abnormal,
                    count,
                })
                .await;
        }
        Ok(())
    }

    /// Current number of buffered traces.
    pub fn buffered(&self) -> u64 {
        self.inner.buffer.count()
    }
}

impl Inner {
    fn enqueue(&self, batch: Batch) {
        if batch.count == 0 {
            return;
        }
        let dropped = self.pending.lock().replace(batch);
        if let Some(old) = dropped {
            tracing::warn!(
                dropped_traces = old.count,
                "batch worker busy, dropping oldest queued batch"
            );
        }
        self.batch_ready.notify_one();
    }

    async fn run_batch(&self, batch: Batch) {
        let Batch {
            normal_by_type,
            abnormal,
            count,
        } = batch;
        if count == 0 {
            return;
        }
        tracing::info!(
            total_traces = count,
            abnormal_traces = abnormal.len(),
            normal_trace_types = normal_by_type.len(),
            "starting tail sampling analysis"
        );

        // Anomalies are never sampled away.
        let mut selected: Vec<Arc<Trace>> = abnormal.clone();

        let target = (count as f64 * self.config.sampler.sample_rate) as usize;
        let remaining = target as i64 - abnormal.len() as i64;
        tracing::info!(
            target_sample_count = target,
            abnormal_kept = abnormal.len(),
            remaining_quota = remaining,
            "sampling calculation"
        );

        if remaining > 0 && !normal_by_type.is_empty() {
            self.sample_normal(&normal_by_type, &abnormal, remaining as usize, &mut selected);
        }

        let mut exported = 0usize;
        for trace in &selected {
            match self.sink.consume_trace(trace).await {
                Ok(()) => exported += 1,
                Err(error) => tracing::error!(
                    trace_id = %trace.trace_id,
                    %error,
                    "failed to send trace to next consumer"
                ),
            }
        }

        tracing::info!(
            input_traces = count,
            output_traces = selected.len(),
            exported,
            realized_sampling_rate = selected.len() as f64 / count as f64 * 100.0,
            "tail sampling completed"
        );
    }

    /// Chooses `quota` normal traces and appends them to `selected`.
    fn sample_normal(
        &self,
        normal_by_type: &NormalPartition,
        abnormal: &[Arc<Trace>],
        quota: usize,
        selected: &mut Vec<Arc<Trace>>,
    ) {
        let type_counts: FxHashMap<TypeId, usize> = normal_by_type
            .iter()
            .map(|(type_id, traces)| (type_id.clone(), traces.len()))
            .collect();
        let historical_counts: FxHashMap<TypeId, u64> = self
            .path_counter
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect();
        let quota_map = allocate_quota(&type_counts, &historical_counts, quota);

        // Flatten in sorted type order so index ranges are deterministic.
        let mut sorted_types: Vec<&TypeId> = normal_by_type.keys().collect();
        sorted_types.sort();

        let mut quotas = Vec::with_capacity(sorted_types.len());
        let mut bases = Vec::with_capacity(sorted_types.len());
        let mut all_normal: Vec<Arc<Trace>> = Vec::new();
        for type_id in &sorted_types {
            let traces = &normal_by_type[*type_id];
            bases.push(traces.len());
            quotas.push(quota_map.get(*type_id).copied().unwrap_or(0));
            all_normal.extend(traces.iter().cloned());
        }

        let (labels, label_index) = collect_labels(normal_by_type, abnormal);
        let raw_dist = build_latency_matrix(&all_normal, &label_index, labels.len());
        let ab_dist = build_latency_matrix(abnormal, &label_index, labels.len());

        let mut rng = match self.config.evolution.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        match self.optimize(raw_dist, ab_dist, &quotas, &bases, &mut rng) {
            Ok(indices) => {
                let mut splits = Vec::with_capacity(bases.len());
                let mut sum = 0;
                for &base in &bases {
                    sum += base;
                    splits.push(sum);
                }

                let mut sampled_by_type: FxHashMap<TypeId, u64> = FxHashMap::default();
                for idx in indices {
                    if idx < all_normal.len() {
                        selected.push(Arc::clone(&all_normal[idx]));
                        let group = splits.partition_point(|&split| split <= idx);
                        *sampled_by_type
                            .entry((*sorted_types[group]).clone())
                            .or_insert(0) += 1;
                    }
                }
                for (type_id, sampled) in sampled_by_type {
                    *self.path_counter.entry(type_id).or_insert(0) += sampled;
                }
            }
            Err(error) => {
                // Total collapse: keep the anomaly set, fill the rest of
                // the quota uniformly from the normal population.
                tracing::warn!(
                    %error,
                    "all optimizer attempts failed, filling quota by uniform random sampling"
                );
                let take = quota.min(all_normal.len());
                for idx in rand::seq::index::sample(&mut rng, all_normal.len(), take) {
                    selected.push(Arc::clone(&all_normal[idx]));
                }
            }
        }
    }

    /// Runs the evolutionary search with the configured knobs, falling
    /// back through progressively cheaper configurations before giving
    /// up. The ladder never aborts the batch; the caller handles the
    /// terminal error with a uniform random fill.
    fn optimize(
        &self,
        raw_dist: Vec<Vec<f64>>,
        ab_dist: Vec<Vec<f64>>,
        quotas: &[usize],
        bases: &[usize],
        rng: &mut StdRng,
    ) -> Result<Vec<usize>> {
        let problem = SampleProblem::new(
            raw_dist,
            ab_dist,
            quotas.to_vec(),
            bases.to_vec(),
            self.config.sampler.combination_count,
            rng,
        )?;

        let primary = self.config.evolution.clone();
        let reduced = EvolutionConfig {
            population_size: 10,
            generations: 5,
            ..primary.clone()
        };
        let compact = EvolutionConfig {
            population_size: 20,
            generations: 10,
            ..primary.clone()
        };

        let mut last_error = None;
        for (attempt, config) in [primary, reduced, compact].into_iter().enumerate() {
            if attempt > 0 {
                tracing::warn!(
                    attempt,
                    population = config.population_size,
                    generations = config.generations,
                    "falling back to alternate search configuration"
                );
            }
            match SampleOptimizer::new(&problem, config).optimize(rng) {
                Ok(best) => return Ok(problem.indices_for(&best.genome)),
                Err(error) => {
                    tracing::warn!(attempt, %error, "evolutionary search attempt failed");
                    last_error = Some(error);
                }
            }
        }
        Err(last_error
            .unwrap_or_else(|| SamplerError::optimization("no search attempt executed")))
    }
}
