use crate::errors::ProgError;

mod const_load;
mod moving_average;

pub use self::const_load::{ConstLoadEstimator, LOADING_KEY, STDDEV_KEY};
pub use self::moving_average::{MovingAverageLoadEstimator, DEFAULT_WINDOW, WINDOW_KEY};

/// Estimates the future loading of the system.
///
/// Implementations advertise two optional capabilities: sample-based
/// estimators produce a coherent per-sample realization of the future load
/// and require the caller to set the sample count first; history-based
/// estimators require the caller to feed past loads through
/// [`LoadEstimator::add_load`]. The uniform call site is
/// [`LoadEstimator::estimate_load`].
///
/// `estimate_load` must be callable concurrently for distinct sample
/// indices; the Monte-Carlo predictor calls it from every worker thread.
/// Implementations that memoize must synchronize internally.
pub trait LoadEstimator {
    /// Whether this estimator draws one load realization per sample. When
    /// true, callers must invoke [`LoadEstimator::set_sample_count`] before
    /// estimating.
    fn is_sample_based(&self) -> bool {
        false
    }

    /// Sets the number of per-sample realizations to maintain.
    fn set_sample_count(&mut self, _samples: usize) -> Result<(), ProgError> {
        Err(ProgError::BadInput(
            "load estimator is not sample based".to_owned(),
        ))
    }

    /// Whether this estimator builds its estimate from historical loading.
    /// When true, callers must feed each observed load through
    /// [`LoadEstimator::add_load`].
    fn uses_historical_loading(&self) -> bool {
        false
    }

    /// Records the load measured at the current timestep.
    fn add_load(&mut self, _load: &[f64]) -> Result<(), ProgError> {
        Err(ProgError::BadInput(
            "load estimator does not use historical loading".to_owned(),
        ))
    }

    /// The estimated load vector at time `t` for the given sample index.
    fn estimate_load(&self, t: f64, sample: usize) -> Vec<f64>;
}
