//! Group sampling via evolutionary search.
//!
//! Given per-type quotas over a flattened normal population, chooses the
//! concrete trace indices whose latency-percentile profile best matches
//! the full batch. The search space is quantised up front: for every type
//! a fixed set of pre-sampled index combinations is drawn, and the
//! optimizer only picks one combination per type.

use crate::core::config::EvolutionConfig;
use crate::core::{Result, SamplerError};
use rand::Rng;
use std::fmt;

/// Percentile points of the latency profile.
pub const PERCENTILES: [f64; 8] = [0.0, 25.0, 50.0, 75.0, 90.0, 95.0, 99.0, 100.0];

/// Guard against a zero denominator when a label has no spread.
const NORM_EPSILON: f64 = 1e-7;

/// One pre-sampled subset of indices within a single type's index range,
/// sized to that type's quota.
#[derive(Debug, Clone)]
pub struct Combination {
    indices: Vec<usize>,
}

impl Combination {
    /// Draws `quota` distinct indices uniformly from `[start, end)`.
    fn draw<R: Rng>(rng: &mut R, start: usize, end: usize, quota: usize) -> Self {
        let mut indices: Vec<usize> = rand::seq::index::sample(rng, end - start, quota)
            .into_iter()
            .map(|i| start + i)
            .collect();
        indices.sort_unstable();
        Combination { indices }
    }

    /// The selected indices, sorted ascending.
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }
}

/// The group-sampling optimization problem.
///
/// Holds the latency matrices, the combination table and the normalized
/// percentile profile of the full batch. Rebuilt per batch and discarded
/// once the batch's optimization completes.
pub struct SampleProblem {
    raw_dist: Vec<Vec<f64>>,
    ab_dist: Vec<Vec<f64>>,
    quotas: Vec<usize>,
    splits: Vec<usize>,
    total_quota: usize,
    num_labels: usize,
    comb_count: usize,
    /// `combinations[c][i]` is combination variant `c` for type `i`.
    combinations: Vec<Vec<Combination>>,
    /// Normalized percentile profile of the full batch, per label.
    origin_profile: Vec<Vec<f64>>,
    min_v: Vec<f64>,
    max_v: Vec<f64>,
}

impl fmt::Debug for SampleProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SampleProblem")
            .field("num_types", &self.quotas.len())
            .field("num_labels", &self.num_labels)
            .field("total_quota", &self.total_quota)
            .field("comb_count", &self.comb_count)
            .finish()
    }
}

impl SampleProblem {
    /// Builds the problem and pre-samples the combination table.
    ///
    /// `raw_dist` is the `(trace x label)` latency matrix of the flattened
    /// normal population, `ab_dist` the matrix of the abnormal traces.
    /// `quotas` and `bases` are aligned to the flattening order; the index
    /// range of type `i` is `[sum(bases[..i]), sum(bases[..=i]))`.
    pub fn new<R: Rng>(
        raw_dist: Vec<Vec<f64>>,
        ab_dist: Vec<Vec<f64>>,
        quotas: Vec<usize>,
        bases: Vec<usize>,
        comb_count: usize,
        rng: &mut R,
    ) -> Result<Self> {
        if comb_count < 2 {
            return Err(SamplerError::CombinationCount(comb_count));
        }
        if quotas.len() != bases.len() {
            return Err(SamplerError::config(format!(
                "quota vector length {} does not match base vector length {}",
                quotas.len(),
                bases.len()
            )));
        }
        if raw_dist.is_empty() {
            return Err(SamplerError::config(
                "cannot build a sampling problem over an empty normal population",
            ));
        }
        for (i, (&quota, &base)) in quotas.iter().zip(&bases).enumerate() {
            if quota > base {
                return Err(SamplerError::QuotaExceedsPopulation {
                    group: i,
                    quota,
                    population: base,
                });
            }
        }

        let mut splits = Vec::with_capacity(bases.len());
        let mut sum = 0;
        for &base in &bases {
            sum += base;
            splits.push(sum);
        }
        if sum != raw_dist.len() {
            return Err(SamplerError::config(format!(
                "base vector covers {} traces but the latency matrix has {} rows",
                sum,
                raw_dist.len()
            )));
        }

        let total_quota = quotas.iter().sum();
        let num_labels = raw_dist[0].len();

        let mut combinations = Vec::with_capacity(comb_count);
        for _ in 0..comb_count {
            let mut variants = Vec::with_capacity(quotas.len());
            for (i, &quota) in quotas.iter().enumerate() {
                let start = if i == 0 { 0 } else { splits[i - 1] };
                variants.push(Combination::draw(rng, start, splits[i], quota));
            }
            combinations.push(variants);
        }

        // Percentile profile of the full population (normal plus abnormal),
        // normalized per label.
        let mut origin_profile = Vec::with_capacity(num_labels);
        let mut min_v = Vec::with_capacity(num_labels);
        let mut max_v = Vec::with_capacity(num_labels);
        for j in 0..num_labels {
            let column = raw_dist
                .iter()
                .chain(ab_dist.iter())
                .map(|row| row[j]);
            let sorted = finite_sorted(column);
            if sorted.is_empty() {
                origin_profile.push(vec![0.0; PERCENTILES.len()]);
                min_v.push(0.0);
                max_v.push(0.0);
                continue;
            }
            let lo = sorted[0];
            let hi = sorted[sorted.len() - 1];
            let denom = hi - lo + NORM_EPSILON;
            origin_profile.push(
                PERCENTILES
                    .iter()
                    .map(|&p| (percentile(&sorted, p) - lo) / denom)
                    .collect(),
            );
            min_v.push(lo);
            max_v.push(hi);
        }

        Ok(SampleProblem {
            raw_dist,
            ab_dist,
            quotas,
            splits,
            total_quota,
            num_labels,
            comb_count,
            combinations,
            origin_profile,
            min_v,
            max_v,
        })
    }

    /// Number of decision variables (one per trace type).
    pub fn num_types(&self) -> usize {
        self.quotas.len()
    }

    /// Number of combination variants per type.
    pub fn comb_count(&self) -> usize {
        self.comb_count
    }

    /// Total number of traces a realized genome selects.
    pub fn total_quota(&self) -> usize {
        self.total_quota
    }

    /// Resolves a genome to its concrete trace indices.
    pub fn indices_for(&self, genome: &[usize]) -> Vec<usize> {
        let mut selected = Vec::with_capacity(self.total_quota);
        for (i, &variant) in genome.iter().enumerate() {
            selected.extend_from_slice(self.combinations[variant][i].indices());
        }
        selected
    }

    /// Scores a genome: the mean-squared error between the realized
    /// sample's normalized percentile profile and the full batch's,
    /// summed over labels. Lower is better.
    ///
    /// The genome must come from this problem's domain: one entry per
    /// type, each within `[0, comb_count)`.
    pub fn evaluate(&self, genome: &[usize]) -> f64 {
        let indices = self.indices_for(genome);
        let mut total = 0.0;
        for j in 0..self.num_labels {
            // The selected traces' column plus the full abnormal column,
            // which stabilizes the profile against anomaly-tail content.
            let column = indices
                .iter()
                .map(|&idx| self.raw_dist[idx][j])
                .chain(self.ab_dist.iter().map(|row| row[j]));
            let sorted = finite_sorted(column);
            if sorted.is_empty() {
                // The label vanished from the sample entirely; score the
                // worst normalized error so the search avoids this genome.
                total += 1.0;
                continue;
            }
            let denom = self.max_v[j] - self.min_v[j] + NORM_EPSILON;
            let mse = PERCENTILES
                .iter()
                .enumerate()
                .map(|(k, &p)| {
                    let normalized = (percentile(&sorted, p) - self.min_v[j]) / denom;
                    let diff = normalized - self.origin_profile[j][k];
                    diff * diff
                })
                .sum::<f64>()
                / PERCENTILES.len() as f64;
            total += mse;
        }
        total
    }
}

/// One candidate solution with its cached fitness.
#[derive(Debug, Clone)]
pub struct Individual {
    /// One combination-variant index per trace type.
    pub genome: Vec<usize>,
    /// Percentile-profile error; lower is better.
    pub fitness: f64,
}

/// Generational evolutionary optimizer over a [`SampleProblem`].
pub struct SampleOptimizer<'a> {
    problem: &'a SampleProblem,
    config: EvolutionConfig,
}

const TOURNAMENT_CONTESTANTS: usize = 3;

impl<'a> SampleOptimizer<'a> {
    pub fn new(problem: &'a SampleProblem, config: EvolutionConfig) -> Self {
        SampleOptimizer { problem, config }
    }

    /// Runs the generational search and returns the hall-of-fame head.
    ///
    /// Tournament selection with three contestants, single-point
    /// crossover, single-coordinate uniform mutation, generation-cap
    /// termination.
    pub fn optimize<R: Rng>(&self, rng: &mut R) -> Result<Individual> {
        let dim = self.problem.num_types();
        if dim == 0 {
            return Err(SamplerError::optimization(
                "problem has no decision variables",
            ));
        }
        if self.config.population_size == 0 {
            return Err(SamplerError::optimization("population size is zero"));
        }

        let ub = self.problem.comb_count();
        let pop_size = self.config.population_size;

        let mut population: Vec<Individual> = (0..pop_size)
            .map(|_| {
                let genome: Vec<usize> = (0..dim).map(|_| rng.gen_range(0..ub)).collect();
                self.individual(genome)
            })
            .collect();

        let mut hall: Vec<Individual> = Vec::new();
        self.update_hall(&mut hall, &population);

        for _ in 0..self.config.generations {
            let mut offspring = Vec::with_capacity(pop_size);
            while offspring.len() < pop_size {
                let mut a = tournament(rng, &population).genome.clone();
                let mut b = tournament(rng, &population).genome.clone();

                if dim > 1 && rng.gen::<f64>() < self.config.crossover_rate {
                    let point = rng.gen_range(0..dim);
                    for k in point..dim {
                        std::mem::swap(&mut a[k], &mut b[k]);
                    }
                }

                for child in [&mut a, &mut b] {
                    if rng.gen::<f64>() < self.config.mutation_rate {
                        let idx = rng.gen_range(0..dim);
                        child[idx] = rng.gen_range(0..ub);
                    }
                }

                offspring.push(self.individual(a));
                if offspring.len() < pop_size {
                    offspring.push(self.individual(b));
                }
            }
            population = offspring;
            self.update_hall(&mut hall, &population);
        }

        let best = hall
            .first()
            .cloned()
            .ok_or_else(|| SamplerError::optimization("no hall-of-fame individual"))?;
        if best.genome.len() != dim {
            return Err(SamplerError::optimization(format!(
                "unexpected genome shape: {} genes for {} types",
                best.genome.len(),
                dim
            )));
        }
        Ok(best)
    }

    fn individual(&self, genome: Vec<usize>) -> Individual {
        let fitness = self.problem.evaluate(&genome);
        Individual { genome, fitness }
    }

    fn update_hall(&self, hall: &mut Vec<Individual>, population: &[Individual]) {
        hall.extend(population.iter().cloned());
        hall.sort_by(|a, b| a.fitness.total_cmp(&b.fitness));
        hall.truncate(self.config.hall_of_fame_size);
    }
}

fn tournament<'p, R: Rng>(rng: &mut R, population: &'p [Individual]) -> &'p Individual {
    let mut best = &population[rng.gen_range(0..population.len())];
    for _ in 1..TOURNAMENT_CONTESTANTS {
        let contestant = &population[rng.gen_range(0..population.len())];
        if contestant.fitness.total_cmp(&best.fitness).is_lt() {
            best = contestant;
        }
    }
    best
}

/// Collects the finite values of `column` in ascending order; NaN cells
/// (labels a trace never emitted) are dropped.
fn finite_sorted(column: impl Iterator<Item = f64>) -> Vec<f64> {
    let mut values: Vec<f64> = column.filter(|v| v.is_finite()).collect();
    values.sort_by(f64::total_cmp);
    values
}

/// Linear-interpolation percentile over an ascending-sorted slice.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
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

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    /// Two types of four traces each over one label; the values are the
    /// trace index so selections are easy to reason about.
    fn small_problem(quotas: Vec<usize>) -> SampleProblem {
        let raw: Vec<Vec<f64>> = (0..8).map(|i| vec![i as f64]).collect();
        SampleProblem::new(raw, vec![], quotas, vec![4, 4], 4, &mut rng()).unwrap()
    }

    #[test]
    fn test_percentile_interpolation() {
        let data = vec![1.0, 2.0, 3.0, 4.0];
        assert_eq!(percentile(&data, 0.0), 1.0);
        assert_eq!(percentile(&data, 100.0), 4.0);
        assert_eq!(percentile(&data, 50.0), 2.5);
        assert!((percentile(&data, 25.0) - 1.75).abs() < 1e-9);
    }

    #[test]
    fn test_percentile_monotone_in_p() {
        let data = vec![3.0, 1.0, 4.0, 1.0, 5.0, 9.0, 2.0, 6.0];
        let sorted = finite_sorted(data.into_iter());
        let mut last = f64::NEG_INFINITY;
        for p in 0..=100 {
            let value = percentile(&sorted, p as f64);
            assert!(value >= last, "percentile not monotone at p={}", p);
            last = value;
        }
    }

    #[test]
    fn test_finite_sorted_drops_nan() {
        let sorted = finite_sorted(vec![3.0, f64::NAN, 1.0].into_iter());
        assert_eq!(sorted, vec![1.0, 3.0]);
    }

    #[test]
    fn test_comb_count_rejected() {
        let raw = vec![vec![1.0]];
        let result = SampleProblem::new(raw, vec![], vec![1], vec![1], 1, &mut rng());
        assert!(matches!(result, Err(SamplerError::CombinationCount(1))));
    }

    #[test]
    fn test_quota_over_population_rejected() {
        let raw: Vec<Vec<f64>> = (0..3).map(|i| vec![i as f64]).collect();
        let result = SampleProblem::new(raw, vec![], vec![5], vec![3], 4, &mut rng());
        assert!(matches!(
            result,
            Err(SamplerError::QuotaExceedsPopulation {
                group: 0,
                quota: 5,
                population: 3
            })
        ));
    }

    #[test]
    fn test_combination_table_ranges() {
        let problem = small_problem(vec![2, 3]);
        for variants in &problem.combinations {
            assert_eq!(variants.len(), 2);
            assert_eq!(variants[0].indices().len(), 2);
            assert_eq!(variants[1].indices().len(), 3);
            assert!(variants[0].indices().iter().all(|&i| i < 4));
            assert!(variants[1].indices().iter().all(|&i| (4..8).contains(&i)));
            // Distinct within a combination
            for pair in variants[0].indices().windows(2) {
                assert!(pair[0] < pair[1]);
            }
        }
    }

    #[test]
    fn test_genome_resolution() {
        let problem = small_problem(vec![2, 2]);
        let indices = problem.indices_for(&[1, 3]);
        assert_eq!(indices.len(), 4);
        assert_eq!(&indices[..2], problem.combinations[1][0].indices());
        assert_eq!(&indices[2..], problem.combinations[3][1].indices());
    }

    #[test]
    fn test_full_selection_scores_zero() {
        // Quota equals population, so every combination selects everything
        // and the realized profile matches the origin exactly.
        let problem = small_problem(vec![4, 4]);
        let fitness = problem.evaluate(&[0, 0]);
        assert!(fitness.abs() < 1e-12, "fitness was {}", fitness);
    }

    #[test]
    fn test_optimizer_finds_improvement() {
        let raw: Vec<Vec<f64>> = (0..40).map(|i| vec![(i % 20) as f64]).collect();
        let problem =
            SampleProblem::new(raw, vec![], vec![5, 5], vec![20, 20], 16, &mut rng()).unwrap();

        let config = EvolutionConfig {
            population_size: 20,
            generations: 30,
            ..EvolutionConfig::default()
        };
        let mut r = rng();
        let best = SampleOptimizer::new(&problem, config)
            .optimize(&mut r)
            .unwrap();
        assert_eq!(best.genome.len(), 2);
        assert!(best.genome.iter().all(|&g| g < 16));
        assert_eq!(best.fitness, problem.evaluate(&best.genome));

        // 600 evaluated genomes over a near-uniform population leave the
        // hall-of-fame head with a tight profile match.
        assert!(best.fitness < 0.05, "fitness was {}", best.fitness);
    }

    #[test]
    fn test_optimizer_is_deterministic_with_seed() {
        let problem = small_problem(vec![2, 2]);
        let config = EvolutionConfig::default();

        let mut r1 = StdRng::seed_from_u64(7);
        let mut r2 = StdRng::seed_from_u64(7);
        let a = SampleOptimizer::new(&problem, config.clone())
            .optimize(&mut r1)
            .unwrap();
        let b = SampleOptimizer::new(&problem, config)
            .optimize(&mut r2)
            .unwrap();
        assert_eq!(a.genome, b.genome);
        assert_eq!(a.fitness, b.fitness);
    }
}
