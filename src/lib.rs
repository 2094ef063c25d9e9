/*! # prognostics

A model-based prognostics toolkit: it fuses streaming sensor measurements
into a probabilistic estimate of a system's state, then projects that
estimate forward under uncertain future loading to predict when a failure
threshold will be crossed.

The crate is built from three tightly coupled subsystems sharing one
numerical backbone:

- [`linalg`] provides the dense matrix kernel (Cholesky, Crout LU,
  adjoint inverse, weighted mean and covariance) everything else runs on.
- [`observers`] maintain a recursive posterior over the model state from
  the measurement stream: an unscented Kalman filter, a particle filter,
  and an extended Kalman filter.
- [`predictors`] draw state samples from that posterior and simulate them
  to the failure threshold, producing a sampled time-of-event distribution
  and optional save-point trajectories.

User systems plug in through the [`models::SystemModel`] and
[`models::PrognosticsModel`] traits and the [`loading::LoadEstimator`]
trait; uncertain quantities travel as [`udata::UData`] values.
*/

#[macro_use]
extern crate log;

/// In-memory configuration multimap read by the observer, predictor and
/// load-estimator constructors.
pub mod config;

/// The crate-wide error taxonomy.
pub mod errors;

/// The dense linear algebra kernel.
pub mod linalg;

/// Future-load estimation.
pub mod loading;

/// The model contract and the battery fixture models.
pub mod models;

/// State observers: UKF, particle filter, EKF.
pub mod observers;

/// Model-based prediction of future events.
pub mod predictors;

/// Uncertain scalar values.
pub mod udata;

pub use crate::errors::ProgError;
