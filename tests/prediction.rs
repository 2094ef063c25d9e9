extern crate prognostics;

use prognostics::config::ConfigMap;
use prognostics::errors::ProgError;
use prognostics::loading::{ConstLoadEstimator, MovingAverageLoadEstimator};
use prognostics::models::{BatteryModel, PrognosticsModel, SystemModel};
use prognostics::predictors::{
    MonteCarloPredictor, Prediction, Predictor, TrajectoryService,
};
use prognostics::udata::{covar, UData, UType, MEAN};
use std::io;

/// A tank draining at the commanded rate; empty is the event.
#[derive(Clone, Copy)]
struct DrainModel {
    capacity: f64,
}

impl SystemModel for DrainModel {
    fn state_size(&self) -> usize {
        1
    }

    fn inputs(&self) -> &[&str] {
        &["rate"]
    }

    fn outputs(&self) -> &[&str] {
        &["level"]
    }

    fn state_eqn(&self, _t: f64, x: &[f64], u: &[f64], n: &[f64], dt: f64) -> Vec<f64> {
        vec![x[0] - u[0] * dt + n[0]]
    }

    fn output_eqn(&self, _t: f64, x: &[f64], _u: &[f64], n: &[f64]) -> Vec<f64> {
        vec![x[0] + n[0]]
    }

    fn initialize(&self, _u: &[f64], z: &[f64]) -> Vec<f64> {
        vec![z[0]]
    }
}

impl PrognosticsModel for DrainModel {
    fn events(&self) -> &[&str] {
        &["Empty"]
    }

    fn predicted_outputs(&self) -> &[&str] {
        &["level"]
    }

    fn threshold_eqn(&self, _t: f64, x: &[f64], _u: &[f64]) -> bool {
        x[0] <= 0.0
    }

    fn event_state_eqn(&self, x: &[f64]) -> f64 {
        (x[0] / self.capacity).max(0.0).min(1.0)
    }

    fn predicted_output_eqn(&self, _t: f64, x: &[f64], _u: &[f64], _z: &[f64]) -> Vec<f64> {
        vec![x[0]]
    }
}

/// Builds a MeanCovar state estimate with a diagonal covariance.
fn gaussian_state(mean: &[f64], variance: f64) -> Vec<UData> {
    let nx = mean.len();
    mean.iter()
        .enumerate()
        .map(|(i, &value)| {
            let mut entry = UData::sized(UType::MeanCovar, nx);
            entry.set(MEAN, value).unwrap();
            let mut row = vec![0.0; nx];
            row[i] = variance;
            entry.set_vec(covar(0), &row).unwrap();
            entry
        })
        .collect()
}

fn predictor_config(sample_count: u64, horizon: f64, process_noise: &[f64]) -> ConfigMap {
    let mut config = ConfigMap::new();
    config.set_scalar("Predictor.SampleCount", sample_count);
    config.set_scalar("Predictor.Horizon", horizon);
    config.set_values("Model.ProcessNoise", process_noise);
    config
}

fn toe_samples(prediction: &Prediction) -> Vec<f64> {
    prediction.events[0].toe.get_vec(0).unwrap()
}

#[test]
fn missing_config_keys_fail_construction() {
    let model = DrainModel { capacity: 100.0 };
    let config = ConfigMap::new();
    let result = MonteCarloPredictor::new(
        model,
        Box::new(ConstLoadEstimator::new(vec![1.0])),
        Box::new(TrajectoryService::new()),
        &config,
    );
    match result {
        Ok(_) => panic!("expected construction to fail"),
        Err(ProgError::BadConfig(msg)) => {
            assert!(msg.contains("Predictor.SampleCount"));
            assert!(msg.contains("Predictor.Horizon"));
            assert!(msg.contains("Model.ProcessNoise"));
        }
        Err(e) => panic!("unexpected error {}", e),
    }
}

#[test]
fn process_noise_must_match_the_state_size() {
    let model = DrainModel { capacity: 100.0 };
    let config = predictor_config(10, 200.0, &[0.0, 0.0]);
    let result = MonteCarloPredictor::new(
        model,
        Box::new(ConstLoadEstimator::new(vec![1.0])),
        Box::new(TrajectoryService::new()),
        &config,
    );
    assert!(matches!(result, Err(ProgError::BadConfig(_))));
}

/// With a deterministic model, zero process noise, a point-mass prior and a
/// constant load, every sample must reproduce the deterministic simulation.
#[test]
fn deterministic_prediction_collapses_to_a_point() {
    let model = DrainModel { capacity: 100.0 };
    let config = predictor_config(20, 200.0, &[0.0]);
    let mut predictor = MonteCarloPredictor::new(
        model,
        Box::new(ConstLoadEstimator::new(vec![1.0])),
        Box::new(TrajectoryService::from_points(vec![10.0, 50.0])),
        &config,
    )
    .unwrap();

    let state = gaussian_state(&[100.0], 0.0);
    let expected_stamp = state.iter().map(|entry| entry.updated()).min().unwrap();
    let prediction = predictor.predict(0.0, &state).unwrap();

    assert_eq!(prediction.events.len(), 1);
    let event = &prediction.events[0];
    assert_eq!(event.event_id, "Empty");
    assert_eq!(event.toe.npoints(), 20);
    assert_eq!(event.toe.updated(), expected_stamp);
    for toe in toe_samples(&prediction) {
        assert!((toe - 100.0).abs() < 1e-9, "TOE was {}", toe);
    }

    // Save-point snapshots: level 90 at t = 10 and 50 at t = 50.
    for k in 0..20 {
        assert!((event.event_state[0].get(k) - 0.9).abs() < 1e-9);
        assert!((event.event_state[1].get(k) - 0.5).abs() < 1e-9);
        assert!((event.system_state[0][0].get(k) - 90.0).abs() < 1e-9);
        assert!((prediction.sys_trajectories[0][0].get(k) - 90.0).abs() < 1e-9);
        assert!((prediction.sys_trajectories[0][1].get(k) - 50.0).abs() < 1e-9);
    }
    assert_eq!(prediction.sys_trajectories[0].name, "level");
    assert_eq!(prediction.sys_trajectories[0].num_times(), 2);
}

/// With process noise, the TOE spreads but its mean stays near the
/// deterministic value.
#[test]
fn noisy_prediction_brackets_the_deterministic_time() {
    let model = DrainModel { capacity: 100.0 };
    let config = predictor_config(100, 400.0, &[0.25]);
    let mut predictor = MonteCarloPredictor::new(
        model,
        Box::new(ConstLoadEstimator::new(vec![1.0])),
        Box::new(TrajectoryService::new()),
        &config,
    )
    .unwrap();

    let prediction = predictor.predict(0.0, &gaussian_state(&[100.0], 0.0)).unwrap();
    let samples = toe_samples(&prediction);
    assert!(samples.iter().all(|toe| toe.is_finite()));
    let mean = samples.iter().sum::<f64>() / samples.len() as f64;
    assert!(mean > 90.0 && mean < 110.0, "mean TOE was {}", mean);
    // The noise actually spread the distribution.
    let distinct = samples
        .iter()
        .filter(|&&toe| (toe - samples[0]).abs() > 1e-12)
        .count();
    assert!(distinct > 0);
}

/// An event past the horizon is a legitimate all-infinity result, and save
/// points before the horizon are still recorded.
#[test]
fn horizon_bounds_the_prediction() {
    let model = DrainModel { capacity: 100.0 };
    let config = predictor_config(10, 50.0, &[0.0]);
    let mut predictor = MonteCarloPredictor::new(
        model,
        Box::new(MovingAverageLoadEstimator::new(vec![1.0], 5).unwrap()),
        Box::new(TrajectoryService::from_points(vec![10.0])),
        &config,
    )
    .unwrap();

    let prediction = predictor.predict(0.0, &gaussian_state(&[100.0], 0.0)).unwrap();
    assert!(toe_samples(&prediction).iter().all(|toe| toe.is_infinite()));
    let event = &prediction.events[0];
    for k in 0..10 {
        assert!((event.event_state[0].get(k) - 0.9).abs() < 1e-9);
    }
}

/// A sample-based load estimator gives each sample its own coherent load
/// realization, so the TOE distribution actually spreads.
#[test]
fn sample_based_loading_spreads_the_distribution() {
    let model = DrainModel { capacity: 100.0 };
    let config = predictor_config(50, 1000.0, &[0.0]);
    let mut predictor = MonteCarloPredictor::new(
        model,
        Box::new(ConstLoadEstimator::with_noise(vec![1.0], vec![0.05]).unwrap()),
        Box::new(TrajectoryService::new()),
        &config,
    )
    .unwrap();

    let prediction = predictor.predict(0.0, &gaussian_state(&[100.0], 0.0)).unwrap();
    let samples = toe_samples(&prediction);
    assert!(samples.iter().all(|toe| toe.is_finite()));
    let distinct = samples
        .iter()
        .filter(|&&toe| (toe - samples[0]).abs() > 1e-9)
        .count();
    assert!(distinct > 0, "per-sample loads should differ");
}

#[test]
fn bad_state_estimates_are_rejected() {
    let model = DrainModel { capacity: 100.0 };
    let config = predictor_config(10, 200.0, &[0.0]);
    let mut predictor = MonteCarloPredictor::new(
        model,
        Box::new(ConstLoadEstimator::new(vec![1.0])),
        Box::new(TrajectoryService::new()),
        &config,
    )
    .unwrap();

    // Wrong number of state entries.
    assert!(matches!(
        predictor.predict(0.0, &gaussian_state(&[1.0, 2.0], 0.0)),
        Err(ProgError::BadInput(_))
    ));
    // A covariance that is not positive semi-definite cannot be factored.
    assert!(matches!(
        predictor.predict(0.0, &gaussian_state(&[100.0], -1.0)),
        Err(ProgError::DomainError(_))
    ));
}

/// The battery prognosis scenario: 10 samples, a 5000 s horizon, a constant
/// 8 W draw from a fully charged pack. Every sampled end of discharge must
/// land mid-horizon and the pack must report nearly full health at the
/// first save point.
#[test]
fn battery_end_of_discharge_prognosis() {
    let _ = pretty_env_logger::try_init();
    let model = BatteryModel::new();
    let x0 = model.initialize(&[0.0], &[20.0, 4.2]);
    assert_eq!(model.events(), &["EOD"]);

    let config = predictor_config(10, 5000.0, &[1e-5; 8]);
    let mut predictor = MonteCarloPredictor::new(
        model,
        Box::new(ConstLoadEstimator::new(vec![8.0])),
        Box::new(TrajectoryService::from_points(vec![10.0])),
        &config,
    )
    .unwrap();

    let prediction = predictor.predict(0.0, &gaussian_state(&x0, 1e-5)).unwrap();
    let event = &prediction.events[0];
    for toe in toe_samples(&prediction) {
        assert!(
            toe > 2500.0 && toe < 3500.0,
            "end of discharge at {} s",
            toe
        );
    }
    for k in 0..10 {
        assert!(
            event.event_state[0].get(k) > 0.97,
            "state of health at the first save point was {}",
            event.event_state[0].get(k)
        );
        // The SOC trajectory mirrors the event state for this model.
        assert!(prediction.sys_trajectories[0][0].get(k) > 0.97);
    }
}

/// Mirrors the estimation pipeline end to end: serialize the sampled TOE
/// distribution as one CSV record.
#[test]
fn csv_serialize_toe_samples() {
    let model = DrainModel { capacity: 100.0 };
    let config = predictor_config(5, 200.0, &[0.0]);
    let mut predictor = MonteCarloPredictor::new(
        model,
        Box::new(ConstLoadEstimator::new(vec![1.0])),
        Box::new(TrajectoryService::new()),
        &config,
    )
    .unwrap();
    let prediction = predictor.predict(0.0, &gaussian_state(&[100.0], 0.0)).unwrap();

    let mut wtr = csv::Writer::from_writer(io::stdout());
    wtr.serialize(toe_samples(&prediction))
        .expect("could not write to stdout");
}
