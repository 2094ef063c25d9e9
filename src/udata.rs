use crate::errors::ProgError;
use serde_derive::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Index of the mean in `MeanSD` and `MeanCovar` data.
pub const MEAN: usize = 0;
/// Index of the standard deviation in `MeanSD` data.
pub const SD: usize = 1;

/// Index of the i-th covariance term in `MeanCovar` data.
pub const fn covar(i: usize) -> usize {
    i + 1
}

/// Index of the i-th sample in `WeightedSamples` data.
pub const fn sample(i: usize) -> usize {
    2 * i
}

/// Index of the i-th weight in `WeightedSamples` data.
pub const fn weight(i: usize) -> usize {
    2 * i + 1
}

/// The representation used by a [`UData`] value.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum UType {
    /// A point value with no uncertainty. One backing cell.
    Point,
    /// A mean and a standard deviation. Two backing cells.
    MeanSD,
    /// A mean followed by a row of covariance terms. `1 + npoints` cells.
    MeanCovar,
    /// Unweighted samples. `npoints` cells.
    Samples,
    /// Interleaved (sample, weight) pairs. `2 * npoints` cells.
    WeightedSamples,
}

impl UType {
    fn storage(self, npoints: usize) -> usize {
        match self {
            UType::Point => 1,
            UType::MeanSD => 2,
            UType::MeanCovar => 1 + npoints,
            UType::Samples => npoints,
            UType::WeightedSamples => 2 * npoints,
        }
    }
}

/// Milliseconds since the Unix epoch; the resolution of UData update stamps.
pub type TimeTicks = u64;

fn now_ticks() -> TimeTicks {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as TimeTicks)
        .unwrap_or(0)
}

/// A scalar-with-uncertainty in one of five representations.
///
/// The backing array length is derived from the representation tag and the
/// sample count; the index helpers ([`MEAN`], [`SD`], [`covar`], [`sample`],
/// [`weight`]) give semantic names to positions within it. Changing the
/// representation or the sample count reinitializes the storage, so data
/// loss is explicit rather than accidental.
///
/// A freshly constructed UData is invalid and all cells read NaN; the first
/// successful write marks it valid and stamps the update time.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct UData {
    uncertainty: UType,
    npoints: usize,
    valid: bool,
    updated: TimeTicks,
    data: Vec<f64>,
}

impl Default for UData {
    fn default() -> UData {
        UData::new(UType::Point)
    }
}

impl UData {
    pub fn new(uncertainty: UType) -> UData {
        UData {
            uncertainty,
            npoints: 1,
            valid: false,
            updated: 0,
            data: vec![f64::NAN; uncertainty.storage(1)],
        }
    }

    /// Creates a UData with the given representation and sample count.
    pub fn sized(uncertainty: UType, npoints: usize) -> UData {
        let mut u = UData::new(uncertainty);
        u.set_npoints(npoints);
        u
    }

    pub fn uncertainty(&self) -> UType {
        self.uncertainty
    }

    /// Changes the representation, discarding all stored data.
    pub fn set_uncertainty(&mut self, uncertainty: UType) {
        self.uncertainty = uncertainty;
        self.data = vec![f64::NAN; uncertainty.storage(self.npoints)];
        self.valid = false;
    }

    pub fn npoints(&self) -> usize {
        self.npoints
    }

    /// Changes the sample count, resizing the backing array. Newly exposed
    /// cells read NaN.
    pub fn set_npoints(&mut self, npoints: usize) {
        self.npoints = npoints;
        self.data.resize(self.uncertainty.storage(npoints), f64::NAN);
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// A UData is valid once it has been written to and its first cell holds
    /// an actual number.
    pub fn valid(&self) -> bool {
        self.valid && !self.data.first().map_or(true, |v| v.is_nan())
    }

    pub fn invalidate(&mut self) {
        self.valid = false;
    }

    pub fn updated(&self) -> TimeTicks {
        self.updated
    }

    pub fn set_updated(&mut self, ticks: TimeTicks) {
        self.updated = ticks;
    }

    /// Reads cell `i`; NaN for an invalid or never-written cell.
    pub fn get(&self, i: usize) -> f64 {
        self.data.get(i).copied().unwrap_or(f64::NAN)
    }

    /// Writes cell `i`, marking the value valid and stamping the update
    /// time.
    ///
    /// Under `MeanSD`, writing a standard deviation smaller than machine
    /// epsilon stores the smallest positive double instead, so downstream
    /// divisions by sigma stay finite.
    pub fn set(&mut self, i: usize, value: f64) -> Result<(), ProgError> {
        if i >= self.data.len() {
            return Err(ProgError::OutOfRange(format!(
                "index {} of a {}-cell UData",
                i,
                self.data.len()
            )));
        }
        let mut value = value;
        if self.uncertainty == UType::MeanSD && i == SD && value < f64::EPSILON {
            value = f64::MIN_POSITIVE;
        }
        self.data[i] = value;
        self.valid = true;
        self.updated = now_ticks();
        Ok(())
    }

    /// Reads the pair of cells starting at `i`.
    pub fn get_pair(&self, i: usize) -> Result<(f64, f64), ProgError> {
        if i + 2 > self.data.len() {
            return Err(ProgError::OutOfRange(format!(
                "pair at {} of a {}-cell UData",
                i,
                self.data.len()
            )));
        }
        Ok((self.data[i], self.data[i + 1]))
    }

    /// Writes the pair of cells starting at `i`.
    pub fn set_pair(&mut self, i: usize, pair: (f64, f64)) -> Result<(), ProgError> {
        if i + 2 > self.data.len() {
            return Err(ProgError::OutOfRange(format!(
                "pair at {} of a {}-cell UData",
                i,
                self.data.len()
            )));
        }
        self.set(i, pair.0)?;
        self.set(i + 1, pair.1)
    }

    /// Copies all cells from `i` onward into a new vector.
    pub fn get_vec(&self, i: usize) -> Result<Vec<f64>, ProgError> {
        if i > self.data.len() {
            return Err(ProgError::OutOfRange(format!(
                "index {} of a {}-cell UData",
                i,
                self.data.len()
            )));
        }
        Ok(self.data[i..].to_vec())
    }

    /// Bulk-writes `values` into the cells starting at `i`.
    pub fn set_vec(&mut self, i: usize, values: &[f64]) -> Result<(), ProgError> {
        if i + values.len() > self.data.len() {
            return Err(ProgError::OutOfRange(format!(
                "{} values at {} of a {}-cell UData",
                values.len(),
                i,
                self.data.len()
            )));
        }
        for (k, &v) in values.iter().enumerate() {
            self.set(i + k, v)?;
        }
        Ok(())
    }
}

/// Equality ignores the update stamp and treats NaN cells as equal, so two
/// never-written UData of the same shape compare equal.
impl PartialEq for UData {
    fn eq(&self, rhs: &UData) -> bool {
        self.uncertainty == rhs.uncertainty
            && self.npoints == rhs.npoints
            && self.valid == rhs.valid
            && self.data.len() == rhs.data.len()
            && self
                .data
                .iter()
                .zip(rhs.data.iter())
                .all(|(a, b)| a == b || (a.is_nan() && b.is_nan()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_round_trip() {
        let mut u = UData::new(UType::Point);
        assert!(!u.valid());
        assert!(u.get(0).is_nan());
        u.set(0, 42.0).unwrap();
        assert!(u.valid());
        assert_eq!(u.get(0), 42.0);
        assert!(u.updated() > 0);
    }

    #[test]
    fn storage_follows_tag_and_npoints() {
        let mut u = UData::sized(UType::MeanCovar, 4);
        assert_eq!(u.size(), 5);
        u.set_uncertainty(UType::WeightedSamples);
        assert_eq!(u.size(), 8);
        u.set_npoints(2);
        assert_eq!(u.size(), 4);
        u.set_uncertainty(UType::Samples);
        assert_eq!(u.size(), 2);
        u.set_uncertainty(UType::MeanSD);
        assert_eq!(u.size(), 2);
    }

    #[test]
    fn changing_uncertainty_clears_data() {
        let mut u = UData::new(UType::Point);
        u.set(0, 1.0).unwrap();
        u.set_uncertainty(UType::MeanSD);
        u.set_uncertainty(UType::Point);
        assert!(u.get(0).is_nan());
        assert!(!u.valid());
    }

    #[test]
    fn mean_sd_clamps_tiny_sigma() {
        let mut u = UData::new(UType::MeanSD);
        u.set(MEAN, 1.0).unwrap();
        u.set(SD, 0.0).unwrap();
        assert!(u.get(SD) > 0.0);
        assert_eq!(u.get(SD), f64::MIN_POSITIVE);
        // A real sigma passes through untouched.
        u.set(SD, 0.5).unwrap();
        assert_eq!(u.get(SD), 0.5);
    }

    #[test]
    fn index_helpers() {
        let mut u = UData::sized(UType::WeightedSamples, 3);
        u.set(sample(2), 7.0).unwrap();
        u.set(weight(2), 0.25).unwrap();
        assert_eq!(u.get_pair(sample(2)).unwrap(), (7.0, 0.25));

        let mut mc = UData::sized(UType::MeanCovar, 2);
        mc.set(MEAN, 1.0).unwrap();
        mc.set_vec(covar(0), &[0.1, 0.2]).unwrap();
        assert_eq!(mc.get_vec(covar(0)).unwrap(), vec![0.1, 0.2]);
    }

    #[test]
    fn out_of_range_access() {
        let mut u = UData::new(UType::Point);
        assert!(matches!(u.set(1, 0.0), Err(ProgError::OutOfRange(_))));
        assert!(matches!(u.get_pair(0), Err(ProgError::OutOfRange(_))));
        assert!(matches!(
            u.set_vec(0, &[1.0, 2.0]),
            Err(ProgError::OutOfRange(_))
        ));
        // Unchecked-style get is NaN-safe rather than panicking.
        assert!(u.get(10).is_nan());
    }

    #[test]
    fn all_nan_udata_compare_equal() {
        let a = UData::sized(UType::Samples, 3);
        let b = UData::sized(UType::Samples, 3);
        assert_eq!(a, b);
        let mut c = UData::sized(UType::Samples, 3);
        c.set(0, 1.0).unwrap();
        assert_ne!(a, c);
    }
}
