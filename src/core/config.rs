//! Configuration management for the tail sampler.
//!
//! Provides serde-backed configuration with:
//! - YAML file support
//! - Validation and defaults
//! - A builder for programmatic construction

use crate::core::{Result, SamplerError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Complete configuration for the tail sampler
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Buffer and sampling-rate configuration
    pub sampler: SamplerConfig,
    /// Evolutionary search knobs
    pub evolution: EvolutionConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Buffer and sampling-rate configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Fraction of each batch to retain, within (0.0, 1.0]
    pub sample_rate: f64,
    /// Number of buffered traces that triggers a batch
    pub buffer_size: u64,
    /// Per-label FIFO depth of the historical latency pool
    pub pool_height: usize,
    /// Number of pre-sampled combinations per trace type (at least 2)
    pub combination_count: usize,
    /// Reserved; accepted for compatibility but not consumed by the core path
    #[serde(with = "humantime_serde")]
    pub decision_wait: Duration,
}

/// Evolutionary search knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvolutionConfig {
    /// Population size per generation
    pub population_size: usize,
    /// Number of generations before termination
    pub generations: usize,
    /// Number of best-of-run individuals retained
    pub hall_of_fame_size: usize,
    /// Probability of single-point crossover per offspring pair
    pub crossover_rate: f64,
    /// Probability of single-coordinate mutation per offspring
    pub mutation_rate: f64,
    /// Fixed RNG seed; random when unset
    pub seed: Option<u64>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: LogLevel,
    /// Structured (JSON-ish) log output
    pub structured: bool,
}

/// Log levels
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            sampler: SamplerConfig::default(),
            evolution: EvolutionConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for SamplerConfig {
    fn default() -> Self {
        SamplerConfig {
            sample_rate: 0.1,
            buffer_size: 4000,
            pool_height: 1000,
            combination_count: 100,
            decision_wait: Duration::from_secs(30),
        }
    }
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        EvolutionConfig {
            population_size: 50,
            generations: 100,
            hall_of_fame_size: 10,
            crossover_rate: 0.8,
            mutation_rate: 0.1,
            seed: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: LogLevel::Info,
            structured: false,
        }
    }
}

impl Config {
    /// Create new config with defaults
    pub fn new() -> Result<Self> {
        let config = Config::default();
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.sampler.sample_rate <= 0.0 || self.sampler.sample_rate > 1.0 {
            return Err(SamplerError::InvalidSampleRate(self.sampler.sample_rate));
        }

        if self.sampler.buffer_size == 0 {
            return Err(SamplerError::config("buffer_size must be greater than 0"));
        }

        if self.sampler.pool_height == 0 {
            return Err(SamplerError::config("pool_height must be greater than 0"));
        }

        if self.sampler.combination_count < 2 {
            return Err(SamplerError::CombinationCount(
                self.sampler.combination_count,
            ));
        }

        if self.evolution.population_size == 0 {
            return Err(SamplerError::config(
                "population_size must be greater than 0",
            ));
        }

        if self.evolution.generations == 0 {
            return Err(SamplerError::config("generations must be greater than 0"));
        }

        if self.evolution.hall_of_fame_size == 0 {
            return Err(SamplerError::config(
                "hall_of_fame_size must be greater than 0",
            ));
        }

        for (name, rate) in [
            ("crossover_rate", self.evolution.crossover_rate),
            ("mutation_rate", self.evolution.mutation_rate),
        ] {
            if !(0.0..=1.0).contains(&rate) {
                return Err(SamplerError::config(format!(
                    "{} must be between 0.0 and 1.0, got {}",
                    name, rate
                )));
            }
        }

        Ok(())
    }
}

impl LogLevel {
    /// Convert to tracing filter string
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Configuration builder for programmatic construction
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder with defaults
    pub fn new() -> Self {
        ConfigBuilder {
            config: Config::default(),
        }
    }

    /// Load configuration from YAML string
    pub fn from_yaml(mut self, yaml: &str) -> Result<Self> {
        self.config = serde_yaml::from_str(yaml)
            .map_err(|e| SamplerError::config(format!("Failed to parse YAML config: {}", e)))?;
        Ok(self)
    }

    /// Set the per-batch sample rate
    pub fn sample_rate(mut self, rate: f64) -> Self {
        self.config.sampler.sample_rate = rate;
        self
    }

    /// Set the batch-triggering buffer size
    pub fn buffer_size(mut self, size: u64) -> Self {
        self.config.sampler.buffer_size = size;
        self
    }

    /// Set the historical latency pool depth
    pub fn pool_height(mut self, height: usize) -> Self {
        self.config.sampler.pool_height = height;
        self
    }

    /// Set the combination table cardinality
    pub fn combination_count(mut self, count: usize) -> Self {
        self.config.sampler.combination_count = count;
        self
    }

    /// Set the evolutionary search population size
    pub fn population_size(mut self, size: usize) -> Self {
        self.config.evolution.population_size = size;
        self
    }

    /// Set the evolutionary search generation cap
    pub fn generations(mut self, generations: usize) -> Self {
        self.config.evolution.generations = generations;
        self
    }

    /// Pin the evolutionary search RNG seed
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.evolution.seed = Some(seed);
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
