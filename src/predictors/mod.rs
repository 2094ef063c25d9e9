use crate::errors::ProgError;
use crate::udata::UData;

mod monte_carlo;
mod prediction;

pub use self::monte_carlo::{
    MonteCarloPredictor, HORIZON_KEY, PROCESS_NOISE_KEY, SAMPLE_COUNT_KEY,
};
pub use self::prediction::{DataPoint, Prediction, ProgEvent};

/// Supplies the times at which a predictor must record per-sample snapshots
/// of the system state and event state. The returned list is sorted
/// ascending and may be empty.
pub trait SavePointProvider {
    fn save_points(&self) -> Vec<f64>;
}

/// An ordered, deduplicated collection of save points, maintained between
/// predictions by whoever drives the predictor.
#[derive(Clone, Debug, Default)]
pub struct TrajectoryService {
    points: Vec<f64>,
}

impl TrajectoryService {
    pub fn new() -> TrajectoryService {
        TrajectoryService::default()
    }

    pub fn from_points(mut points: Vec<f64>) -> TrajectoryService {
        points.sort_by(|a, b| a.partial_cmp(b).expect("save points must be ordered"));
        points.dedup();
        TrajectoryService { points }
    }

    /// Inserts a save point, keeping the collection sorted.
    pub fn add_save_point(&mut self, t: f64) {
        match self
            .points
            .binary_search_by(|p| p.partial_cmp(&t).expect("save points must be ordered"))
        {
            Ok(_) => (),
            Err(index) => self.points.insert(index, t),
        }
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

impl SavePointProvider for TrajectoryService {
    fn save_points(&self) -> Vec<f64> {
        self.points.clone()
    }
}

/// Projects a state estimate forward to predict future events and system
/// variables.
pub trait Predictor {
    /// Predicts from the state estimate valid at time `t`, given as one
    /// [`UData`] per state variable.
    fn predict(&mut self, t: f64, state: &[UData]) -> Result<Prediction, ProgError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trajectory_service_keeps_points_ordered() {
        let mut service = TrajectoryService::new();
        service.add_save_point(50.0);
        service.add_save_point(10.0);
        service.add_save_point(30.0);
        service.add_save_point(10.0);
        assert_eq!(service.save_points(), vec![10.0, 30.0, 50.0]);
        service.clear();
        assert!(service.is_empty());
    }

    #[test]
    fn from_points_sorts_and_dedups() {
        let service = TrajectoryService::from_points(vec![3.0, 1.0, 2.0, 1.0]);
        assert_eq!(service.save_points(), vec![1.0, 2.0, 3.0]);
    }
}
