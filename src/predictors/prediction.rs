use crate::udata::{UData, UType};
use serde_derive::{Deserialize, Serialize};
use std::ops::{Index, IndexMut};

/// The predicted occurrence of one event.
///
/// `toe` holds the sampled time-of-event distribution: one slot per
/// Monte-Carlo sample, `+inf` for samples that never crossed the threshold
/// within the horizon. `event_state` and `system_state` hold per-save-point
/// snapshots: the health indicator distribution and the per-state-variable
/// sample distributions respectively.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct ProgEvent {
    pub event_id: String,
    pub toe: UData,
    pub event_state: Vec<UData>,
    pub system_state: Vec<Vec<UData>>,
}

/// A predicted-output trajectory: one sample distribution per save point.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct DataPoint {
    pub name: String,
    points: Vec<UData>,
}

impl DataPoint {
    /// Allocates a trajectory of `num_times` save points, each holding a
    /// distribution of `sample_count` points in the given representation.
    pub fn new(name: &str, uncertainty: UType, num_times: usize, sample_count: usize) -> DataPoint {
        DataPoint {
            name: name.to_owned(),
            points: vec![UData::sized(uncertainty, sample_count); num_times],
        }
    }

    /// The number of save points in the trajectory.
    pub fn num_times(&self) -> usize {
        self.points.len()
    }
}

impl Index<usize> for DataPoint {
    type Output = UData;

    fn index(&self, save_point: usize) -> &UData {
        &self.points[save_point]
    }
}

impl IndexMut<usize> for DataPoint {
    fn index_mut(&mut self, save_point: usize) -> &mut UData {
        &mut self.points[save_point]
    }
}

/// The result of one predict call: a [`ProgEvent`] per tracked event plus a
/// [`DataPoint`] trajectory per predicted output.
///
/// A prediction whose TOE slots are all `+inf` is a legitimate result: the
/// event was not reached within the horizon.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Prediction {
    pub events: Vec<ProgEvent>,
    pub sys_trajectories: Vec<DataPoint>,
}
