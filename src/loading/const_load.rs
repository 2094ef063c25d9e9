use super::LoadEstimator;
use crate::config::ConfigMap;
use crate::errors::ProgError;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use std::sync::Mutex;

/// Configuration key for the base load profile.
pub const LOADING_KEY: &str = "LoadEstimator.Loading";
/// Configuration key for the optional per-channel noise.
pub const STDDEV_KEY: &str = "LoadEstimator.noise_sigma";

struct SampleCache {
    draws: Vec<Vec<f64>>,
    rng: StdRng,
}

/// Produces a constant load estimate.
///
/// In the deterministic mode every call returns the configured profile. When
/// a per-channel standard deviation is configured, the estimator becomes
/// sample based: each sample index maps to one gaussian realization of the
/// profile, memoized so that repeated queries for the same sample within a
/// prediction see the same draw. The memo is kept under a mutex because the
/// predictor queries from many threads at once.
pub struct ConstLoadEstimator {
    profile: Vec<f64>,
    stddev: Option<Vec<f64>>,
    cache: Mutex<SampleCache>,
}

impl ConstLoadEstimator {
    /// A deterministic estimator that always returns `profile`.
    pub fn new(profile: Vec<f64>) -> ConstLoadEstimator {
        ConstLoadEstimator {
            profile,
            stddev: None,
            cache: Mutex::new(SampleCache {
                draws: Vec::new(),
                rng: StdRng::from_entropy(),
            }),
        }
    }

    /// A gaussian estimator: per-sample realizations of `profile` with
    /// zero-mean noise of the given per-channel standard deviation.
    pub fn with_noise(profile: Vec<f64>, stddev: Vec<f64>) -> Result<ConstLoadEstimator, ProgError> {
        if stddev.len() != profile.len() {
            return Err(ProgError::BadConfig(
                "noise sigma length does not match the load profile".to_owned(),
            ));
        }
        let mut estimator = ConstLoadEstimator::new(profile);
        estimator.stddev = Some(stddev);
        Ok(estimator)
    }

    /// Builds an estimator from `LoadEstimator.Loading` and the optional
    /// `LoadEstimator.noise_sigma`.
    pub fn from_config(config: &ConfigMap) -> Result<ConstLoadEstimator, ProgError> {
        config.require_keys(&[LOADING_KEY])?;
        let profile = config.get_f64s(LOADING_KEY)?;

        if config.has_key(STDDEV_KEY) {
            let stddev = config.get_f64s(STDDEV_KEY)?;
            if stddev.len() != profile.len() {
                warn!(
                    "loading ({} channels) and noise sigma ({} channels) do not match; \
                     treating the load as constant",
                    profile.len(),
                    stddev.len()
                );
            } else {
                debug!("inferred uncertainty type: gaussian");
                return ConstLoadEstimator::with_noise(profile, stddev);
            }
        }
        Ok(ConstLoadEstimator::new(profile))
    }

    fn draw(profile: &[f64], stddev: &[f64], rng: &mut StdRng) -> Vec<f64> {
        profile
            .iter()
            .zip(stddev.iter())
            .map(|(&base, &sigma)| base + sigma * rng.sample::<f64, _>(StandardNormal))
            .collect()
    }
}

impl LoadEstimator for ConstLoadEstimator {
    fn is_sample_based(&self) -> bool {
        self.stddev.is_some()
    }

    fn set_sample_count(&mut self, samples: usize) -> Result<(), ProgError> {
        let stddev = match &self.stddev {
            Some(stddev) => stddev,
            None => {
                return Err(ProgError::BadInput(
                    "load estimator is not sample based".to_owned(),
                ))
            }
        };
        let cache = self.cache.get_mut().expect("load sample cache poisoned");
        cache.draws.clear();
        for _ in 0..samples {
            let draw = ConstLoadEstimator::draw(&self.profile, stddev, &mut cache.rng);
            cache.draws.push(draw);
        }
        Ok(())
    }

    fn estimate_load(&self, _t: f64, sample: usize) -> Vec<f64> {
        match &self.stddev {
            None => self.profile.clone(),
            Some(stddev) => {
                let mut cache = self.cache.lock().expect("load sample cache poisoned");
                while cache.draws.len() <= sample {
                    let draw = ConstLoadEstimator::draw(&self.profile, stddev, &mut cache.rng);
                    cache.draws.push(draw);
                }
                cache.draws[sample].clone()
            }
        }
    }
}
