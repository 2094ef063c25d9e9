use super::LoadEstimator;
use crate::config::ConfigMap;
use crate::errors::ProgError;

/// Configuration key for the optional window size.
pub const WINDOW_KEY: &str = "LoadEstimator.Window";

/// Number of past loads averaged when `LoadEstimator.Window` is not set.
pub const DEFAULT_WINDOW: usize = 10;

/// Produces a constant load estimate equal to the element-wise mean of the
/// last `window` observed loads.
///
/// The estimator requires historical loading: the caller feeds each observed
/// load through [`LoadEstimator::add_load`], which rotates it into a ring
/// buffer and refreshes the cached mean. Until real loads arrive, every slot
/// of the ring holds the configured base profile.
pub struct MovingAverageLoadEstimator {
    past: Vec<Vec<f64>>,
    position: usize,
    current: Vec<f64>,
}

impl MovingAverageLoadEstimator {
    pub fn new(profile: Vec<f64>, window: usize) -> Result<MovingAverageLoadEstimator, ProgError> {
        if window == 0 {
            return Err(ProgError::BadConfig(
                "moving average window must be positive".to_owned(),
            ));
        }
        if profile.is_empty() {
            return Err(ProgError::BadConfig("load profile is empty".to_owned()));
        }
        Ok(MovingAverageLoadEstimator {
            past: vec![profile.clone(); window],
            position: 0,
            current: profile,
        })
    }

    /// Builds an estimator from `LoadEstimator.Loading` and the optional
    /// `LoadEstimator.Window`.
    pub fn from_config(config: &ConfigMap) -> Result<MovingAverageLoadEstimator, ProgError> {
        config.require_keys(&[super::const_load::LOADING_KEY])?;
        let profile = config.get_f64s(super::const_load::LOADING_KEY)?;
        let window = if config.has_key(WINDOW_KEY) {
            config.get_u64(WINDOW_KEY)? as usize
        } else {
            DEFAULT_WINDOW
        };
        MovingAverageLoadEstimator::new(profile, window)
    }

    fn recompute_mean(&mut self) {
        let window = self.past.len() as f64;
        for (channel, value) in self.current.iter_mut().enumerate() {
            *value = self.past.iter().map(|load| load[channel]).sum::<f64>() / window;
        }
    }
}

impl LoadEstimator for MovingAverageLoadEstimator {
    fn uses_historical_loading(&self) -> bool {
        true
    }

    fn add_load(&mut self, load: &[f64]) -> Result<(), ProgError> {
        if load.len() != self.current.len() {
            return Err(ProgError::BadInput(format!(
                "load has {} channels, expected {}",
                load.len(),
                self.current.len()
            )));
        }
        self.past[self.position] = load.to_vec();
        self.position = (self.position + 1) % self.past.len();
        self.recompute_mean();
        Ok(())
    }

    fn estimate_load(&self, _t: f64, _sample: usize) -> Vec<f64> {
        self.current.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_the_base_profile() {
        let estimator = MovingAverageLoadEstimator::new(vec![2.0, 4.0], 4).unwrap();
        assert!(estimator.uses_historical_loading());
        assert_eq!(estimator.estimate_load(0.0, 0), vec![2.0, 4.0]);
    }

    #[test]
    fn averages_the_window() {
        let mut estimator = MovingAverageLoadEstimator::new(vec![0.0], 4).unwrap();
        estimator.add_load(&[4.0]).unwrap();
        // Ring: [4, 0, 0, 0].
        assert_eq!(estimator.estimate_load(0.0, 0), vec![1.0]);
        estimator.add_load(&[4.0]).unwrap();
        estimator.add_load(&[4.0]).unwrap();
        estimator.add_load(&[4.0]).unwrap();
        assert_eq!(estimator.estimate_load(0.0, 0), vec![4.0]);
        // The oldest entry rotates out.
        estimator.add_load(&[0.0]).unwrap();
        assert_eq!(estimator.estimate_load(0.0, 0), vec![3.0]);
    }

    #[test]
    fn rejects_mismatched_loads() {
        let mut estimator = MovingAverageLoadEstimator::new(vec![1.0, 2.0], 3).unwrap();
        assert!(matches!(
            estimator.add_load(&[1.0]),
            Err(ProgError::BadInput(_))
        ));
    }

    #[test]
    fn window_from_config() {
        let mut config = ConfigMap::new();
        config.set_values(super::super::const_load::LOADING_KEY, &[5.0]);
        config.set_scalar(WINDOW_KEY, 2u64);
        let mut estimator = MovingAverageLoadEstimator::from_config(&config).unwrap();
        estimator.add_load(&[1.0]).unwrap();
        assert_eq!(estimator.estimate_load(0.0, 0), vec![3.0]);
    }
}
