//! The GA run configuration record (§3 "GA configuration", §4.M).
//!
//! A plain, immutable config struct built only through a validating
//! builder, so every field is checked once at `build()` rather than
//! scattered across call sites.

use symreg_error::{SymregError, SymregResult};

pub const DEFAULT_CROSSOVER_PROBABILITY: f32 = 0.9;
pub const DEFAULT_MUTATION_PROBABILITY: f32 = 0.1;
pub const DEFAULT_LOCAL_SEARCH_PROBABILITY: f32 = 0.25;
pub const DEFAULT_LAMARCKIAN_PROBABILITY: f32 = 1.0;
pub const DEFAULT_EPSILON: f64 = 1e-9;

/// `{ generations, evaluations, iterations (local-search), population_size,
/// pool_size, crossover_probability, mutation_probability,
/// local_search_probability, lamarckian_probability, time_limit, seed,
/// epsilon }` (§3).
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GaConfig {
    pub generations: usize,
    pub evaluations: u64,
    pub iterations: usize,
    pub population_size: usize,
    pub pool_size: usize,
    pub crossover_probability: f32,
    pub mutation_probability: f32,
    pub local_search_probability: f32,
    pub lamarckian_probability: f32,
    pub time_limit: std::time::Duration,
    pub seed: u64,
    /// Whether `seed` was supplied by the caller (`true`) or drawn from OS
    /// entropy by the builder (`false`) — lets a run report whether it is
    /// reproducible.
    pub seed_is_explicit: bool,
    pub epsilon: f64,
}

pub struct GaConfigBuilder {
    generations: usize,
    evaluations: u64,
    iterations: usize,
    population_size: usize,
    pool_size: Option<usize>,
    crossover_probability: f32,
    mutation_probability: f32,
    local_search_probability: f32,
    lamarckian_probability: f32,
    time_limit: std::time::Duration,
    seed: Option<u64>,
    epsilon: f64,
}

impl Default for GaConfigBuilder {
    fn default() -> Self {
        GaConfigBuilder {
            generations: usize::MAX,
            evaluations: u64::MAX,
            iterations: 0,
            population_size: 100,
            pool_size: None,
            crossover_probability: DEFAULT_CROSSOVER_PROBABILITY,
            mutation_probability: DEFAULT_MUTATION_PROBABILITY,
            local_search_probability: DEFAULT_LOCAL_SEARCH_PROBABILITY,
            lamarckian_probability: DEFAULT_LAMARCKIAN_PROBABILITY,
            time_limit: std::time::Duration::from_secs(u64::MAX / 2),
            seed: None,
            epsilon: DEFAULT_EPSILON,
        }
    }
}

impl GaConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generations(mut self, v: usize) -> Self {
        self.generations = v;
        self
    }

    pub fn evaluations(mut self, v: u64) -> Self {
        self.evaluations = v;
        self
    }

    pub fn iterations(mut self, v: usize) -> Self {
        self.iterations = v;
        self
    }

    pub fn population_size(mut self, v: usize) -> Self {
        self.population_size = v;
        self
    }

    pub fn pool_size(mut self, v: usize) -> Self {
        self.pool_size = Some(v);
        self
    }

    pub fn crossover_probability(mut self, v: f32) -> Self {
        self.crossover_probability = v;
        self
    }

    pub fn mutation_probability(mut self, v: f32) -> Self {
        self.mutation_probability = v;
        self
    }

    pub fn local_search_probability(mut self, v: f32) -> Self {
        self.local_search_probability = v;
        self
    }

    pub fn lamarckian_probability(mut self, v: f32) -> Self {
        self.lamarckian_probability = v;
        self
    }

    pub fn time_limit(mut self, v: std::time::Duration) -> Self {
        self.time_limit = v;
        self
    }

    pub fn seed(mut self, v: u64) -> Self {
        self.seed = Some(v);
        self
    }

    pub fn epsilon(mut self, v: f64) -> Self {
        self.epsilon = v;
        self
    }

    pub fn build(self) -> SymregResult<GaConfig> {
        let pool_size = self.pool_size.unwrap_or(self.population_size);

        if self.population_size == 0 {
            return Err(SymregError::invalid_argument("population_size must be non-zero"));
        }
        if pool_size == 0 {
            return Err(SymregError::invalid_argument("pool_size must be non-zero"));
        }
        for (name, p) in [
            ("crossover_probability", self.crossover_probability),
            ("mutation_probability", self.mutation_probability),
            ("local_search_probability", self.local_search_probability),
            ("lamarckian_probability", self.lamarckian_probability),
        ] {
            if !(0.0..=1.0).contains(&p) {
                return Err(SymregError::invalid_argument(format!(
                    "{name} must lie in [0.0, 1.0], got {p}"
                )));
            }
        }
        if self.epsilon < 0.0 {
            return Err(SymregError::invalid_argument("epsilon must be non-negative"));
        }

        let (seed, seed_is_explicit) = match self.seed {
            Some(s) => (s, true),
            None => (symreg_core::domain::random_provider::random::<u64>(), false),
        };

        Ok(GaConfig {
            generations: self.generations,
            evaluations: self.evaluations,
            iterations: self.iterations,
            population_size: self.population_size,
            pool_size,
            crossover_probability: self.crossover_probability,
            mutation_probability: self.mutation_probability,
            local_search_probability: self.local_search_probability,
            lamarckian_probability: self.lamarckian_probability,
            time_limit: self.time_limit,
            seed,
            seed_is_explicit,
            epsilon: self.epsilon,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_pool_size_equal_population_size() {
        let cfg = GaConfigBuilder::new().population_size(50).build().unwrap();
        assert_eq!(cfg.pool_size, 50);
    }

    #[test]
    fn rejects_out_of_range_probability() {
        let err = GaConfigBuilder::new().crossover_probability(1.5).build();
        assert!(err.is_err());
    }

    #[test]
    fn rejects_zero_population() {
        assert!(GaConfigBuilder::new().population_size(0).build().is_err());
    }

    #[test]
    fn explicit_seed_is_recorded_as_such() {
        let cfg = GaConfigBuilder::new().seed(1234).build().unwrap();
        assert!(cfg.seed_is_explicit);
        assert_eq!(cfg.seed, 1234);
    }

    #[test]
    fn unsupplied_seed_is_generated_and_marked_non_explicit() {
        let cfg = GaConfigBuilder::new().build().unwrap();
        assert!(!cfg.seed_is_explicit);
    }
}
