use super::prediction::{DataPoint, Prediction, ProgEvent};
use super::{Predictor, SavePointProvider};
use crate::config::ConfigMap;
use crate::errors::ProgError;
use crate::linalg::Matrix;
use crate::loading::LoadEstimator;
use crate::models::PrognosticsModel;
use crate::udata::{covar, UData, UType, MEAN};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use rayon::prelude::*;

/// Configuration key for the number of Monte-Carlo samples.
pub const SAMPLE_COUNT_KEY: &str = "Predictor.SampleCount";
/// Configuration key for the prediction horizon in seconds.
pub const HORIZON_KEY: &str = "Predictor.Horizon";
/// Configuration key for the per-state process-noise variance vector.
pub const PROCESS_NOISE_KEY: &str = "Model.ProcessNoise";

/// Everything one sample writes: its time of event and, per save point, the
/// event state, predicted outputs and state snapshot. Save points the sample
/// never reached stay NaN.
struct SampleResult {
    toe: f64,
    event_states: Vec<f64>,
    predicted: Vec<Vec<f64>>,
    states: Vec<Vec<f64>>,
}

/// A Monte-Carlo predictor.
///
/// Each predict call draws `sample_count` states from the gaussian implied
/// by the observer's estimate, simulates each forward under a per-sample
/// future load and fresh process noise until the threshold fires or the
/// horizon runs out, and collects the resulting time-of-event distribution
/// plus save-point snapshots.
///
/// The samples are independent, so they run as a rayon fork-join; each
/// worker owns its RNG and writes only its own output slots. A sample that
/// never reaches the event keeps a TOE of `+inf` so the distribution always
/// has exactly `sample_count` points.
pub struct MonteCarloPredictor<M> {
    model: M,
    load_estimator: Box<dyn LoadEstimator + Send + Sync>,
    save_point_provider: Box<dyn SavePointProvider + Send + Sync>,
    sample_count: usize,
    horizon: f64,
    process_noise: Vec<f64>,
}

impl<M: PrognosticsModel + Send + Sync> MonteCarloPredictor<M> {
    /// Creates a predictor from `Predictor.SampleCount`, `Predictor.Horizon`
    /// and `Model.ProcessNoise`.
    pub fn new(
        model: M,
        load_estimator: Box<dyn LoadEstimator + Send + Sync>,
        save_point_provider: Box<dyn SavePointProvider + Send + Sync>,
        config: &ConfigMap,
    ) -> Result<MonteCarloPredictor<M>, ProgError> {
        config.require_keys(&[SAMPLE_COUNT_KEY, HORIZON_KEY, PROCESS_NOISE_KEY])?;
        let sample_count = config.get_u64(SAMPLE_COUNT_KEY)? as usize;
        let horizon = config.get_f64(HORIZON_KEY)?;
        let process_noise = config.get_f64s(PROCESS_NOISE_KEY)?;

        if sample_count == 0 {
            return Err(ProgError::BadConfig("sample count must be positive".to_owned()));
        }
        if horizon <= 0.0 {
            return Err(ProgError::BadConfig("horizon must be positive".to_owned()));
        }
        if process_noise.len() != model.state_size() {
            return Err(ProgError::BadConfig(format!(
                "process noise has {} entries, the model has {} states",
                process_noise.len(),
                model.state_size()
            )));
        }
        if model.events().is_empty() {
            return Err(ProgError::BadConfig("model declares no events".to_owned()));
        }

        info!("created Monte-Carlo predictor with {} samples", sample_count);
        Ok(MonteCarloPredictor {
            model,
            load_estimator,
            save_point_provider,
            sample_count,
            horizon,
            process_noise,
        })
    }

    /// Simulates one sample from `t0` until the threshold fires or the
    /// horizon runs out. Runs on a rayon worker; everything it touches is
    /// either immutable, synchronized inside the load estimator, or local.
    fn simulate_sample(
        &self,
        t0: f64,
        x_mean: &Matrix,
        covariance_factor: &Matrix,
        save_points: &[f64],
        sample_index: usize,
    ) -> SampleResult {
        let nx = self.model.state_size();
        let mut rng = StdRng::from_entropy();

        // Draw the initial state: x = mean + L xi with xi standard normal.
        let mut xi = Matrix::new(nx, 1);
        for i in 0..nx {
            xi[(i, 0)] = rng.sample::<f64, _>(StandardNormal);
        }
        let x0 = x_mean + &(covariance_factor * &xi);
        let mut x: Vec<f64> = (0..nx).map(|i| x0[(i, 0)]).collect();

        let mut result = SampleResult {
            toe: f64::INFINITY,
            event_states: vec![f64::NAN; save_points.len()],
            predicted: vec![Vec::new(); save_points.len()],
            states: vec![Vec::new(); save_points.len()],
        };

        let dt = self.model.default_time_step();
        let zero_noise_z = vec![0.0; self.model.output_size()];
        let mut save_index = 0;
        let mut t = t0;
        while t <= t0 + self.horizon {
            let load = self.load_estimator.estimate_load(t, sample_index);

            // First event crossing wins; the sample stops there.
            if self.model.threshold_eqn(t, &x, &load) {
                result.toe = t;
                break;
            }

            while save_index < save_points.len() && t >= save_points[save_index] {
                let z = self.model.output_eqn(t, &x, &load, &zero_noise_z);
                result.predicted[save_index] = self.model.predicted_output_eqn(t, &x, &load, &z);
                result.event_states[save_index] = self.model.event_state_eqn(&x);
                result.states[save_index] = x.clone();
                save_index += 1;
            }

            let noise: Vec<f64> = self
                .process_noise
                .iter()
                .map(|&variance| variance.sqrt() * rng.sample::<f64, _>(StandardNormal))
                .collect();
            x = self.model.state_eqn(t, &x, &load, &noise, dt);
            t += dt;
        }
        result
    }
}

impl<M: PrognosticsModel + Send + Sync> Predictor for MonteCarloPredictor<M> {
    fn predict(&mut self, t0: f64, state: &[UData]) -> Result<Prediction, ProgError> {
        trace!("starting prediction at t = {}", t0);
        let nx = self.model.state_size();
        if state.len() != nx {
            return Err(ProgError::BadInput(format!(
                "state estimate has {} entries, the model has {} states",
                state.len(),
                nx
            )));
        }

        // Rebuild the gaussian the observer summarized: mean vector and
        // covariance rows straight out of the MeanCovar entries.
        let mut x_mean = Matrix::new(nx, 1);
        let mut pxx = Matrix::new(nx, nx);
        for (i, entry) in state.iter().enumerate() {
            x_mean[(i, 0)] = entry.get(MEAN);
            pxx.set_row_slice(i, &entry.get_vec(covar(0))?)?;
        }
        let covariance_factor = pxx.chol()?;

        let state_timestamp = state.iter().map(|entry| entry.updated()).min().unwrap_or(0);
        let save_points = self.save_point_provider.save_points();

        if self.load_estimator.is_sample_based() {
            self.load_estimator.set_sample_count(self.sample_count)?;
        }

        // Fork-join over samples; each worker owns its RNG and local state.
        let model_ref = &*self;
        let results: Vec<SampleResult> = (0..self.sample_count)
            .into_par_iter()
            .map(|sample_index| {
                model_ref.simulate_sample(t0, &x_mean, &covariance_factor, &save_points, sample_index)
            })
            .collect();

        // Recombine the per-sample slots into the prediction envelopes.
        let mut toe = UData::sized(UType::Samples, self.sample_count);
        for (k, sample_result) in results.iter().enumerate() {
            toe.set(k, sample_result.toe)?;
        }
        toe.set_updated(state_timestamp);

        let mut event_state = Vec::with_capacity(save_points.len());
        let mut system_state = Vec::with_capacity(save_points.len());
        for j in 0..save_points.len() {
            let mut health = UData::sized(UType::Samples, self.sample_count);
            let mut snapshot =
                vec![UData::sized(UType::Samples, self.sample_count); nx];
            for (k, sample_result) in results.iter().enumerate() {
                health.set(k, sample_result.event_states[j])?;
                if !sample_result.states[j].is_empty() {
                    for (i, state_entry) in snapshot.iter_mut().enumerate() {
                        state_entry.set(k, sample_result.states[j][i])?;
                    }
                }
            }
            event_state.push(health);
            system_state.push(snapshot);
        }

        let mut sys_trajectories: Vec<DataPoint> = self
            .model
            .predicted_outputs()
            .iter()
            .map(|name| DataPoint::new(name, UType::Samples, save_points.len(), self.sample_count))
            .collect();
        for (k, sample_result) in results.iter().enumerate() {
            for (j, outputs) in sample_result.predicted.iter().enumerate() {
                for (p, &value) in outputs.iter().enumerate() {
                    sys_trajectories[p][j].set(k, value)?;
                }
            }
        }

        let unreached = results.iter().filter(|r| r.toe.is_infinite()).count();
        if unreached > 0 {
            warn!(
                "{} of {} samples did not reach {} within the horizon",
                unreached,
                self.sample_count,
                self.model.events()[0]
            );
        }

        trace!("prediction complete");
        Ok(Prediction {
            events: vec![ProgEvent {
                event_id: self.model.events()[0].to_owned(),
                toe,
                event_state,
                system_state,
            }],
            sys_trajectories,
        })
    }
}
