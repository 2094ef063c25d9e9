use crate::errors::ProgError;
use crate::udata::UData;

mod ekf;
mod particle_filter;
mod ukf;

pub use self::ekf::ExtendedKalmanFilter;
pub use self::particle_filter::{
    ParticleFilter, Particles, MIN_EFFECTIVE_KEY, PARTICLE_COUNT_KEY, PROCESS_NOISE_KEY,
    SENSOR_NOISE_KEY,
};
pub use self::ukf::{
    SigmaPoints, UnscentedKalmanFilter, ALPHA_KEY, BETA_KEY, KAPPA_KEY, Q_KEY, R_KEY,
};

/// Maintains a recursive posterior over a model's state given a stream of
/// inputs and outputs.
///
/// An observer is created uninitialized; [`Observer::initialize`] seeds it
/// with a first state and input, after which [`Observer::step`] folds in one
/// measurement at a time. Timestamps must be strictly increasing. A step
/// that fails leaves the observer exactly as it was before the call.
pub trait Observer {
    /// Seeds the observer with the initial time, state and input.
    fn initialize(&mut self, t0: f64, x0: &[f64], u0: &[f64]) -> Result<(), ProgError>;

    /// Folds in the measurement `z` taken at time `t` under input `u`.
    fn step(&mut self, t: f64, u: &[f64], z: &[f64]) -> Result<(), ProgError>;

    fn is_initialized(&self) -> bool;

    /// The posterior state estimate with uncertainty, one [`UData`] per
    /// state variable.
    fn state_estimate(&self) -> Vec<UData>;

    /// The posterior mean state.
    fn state_mean(&self) -> &[f64];

    /// The output prediction for the posterior mean state.
    fn output_mean(&self) -> &[f64];
}
