//! Fixed-window block averaging.

use ndarray::{ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::flight::FlightSeries;
use crate::IgcError;

/// Mean of each consecutive, non-overlapping block of `window` samples.
///
/// The trailing remainder that does not fill a whole block is dropped, so the
/// result has `sequence.len() / window` elements.
pub fn average(sequence: &[f64], window: usize) -> Result<Vec<f64>, IgcError> {
    if window == 0 {
        return Err(IgcError::InvalidParameter(
            "averaging window must be > 0".into(),
        ));
    }
    let blocks = sequence.len() / window;
    if blocks == 0 {
        return Ok(Vec::new());
    }
    let view = ArrayView2::from_shape((blocks, window), &sequence[..blocks * window])
        .map_err(|e| IgcError::InvalidParameter(e.to_string()))?;
    Ok(view
        .mean_axis(Axis(1))
        .map(|means| means.to_vec())
        .unwrap_or_default())
}

/// Block means of a [`FlightSeries`]. Every field uses the same window, so
/// index `i` of each sequence refers to the same block of fixes.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AveragedSeries {
    pub timestamps: Vec<f64>,
    pub latitudes: Vec<f64>,
    pub longitudes: Vec<f64>,
    pub altitudes: Vec<f64>,
}

impl AveragedSeries {
    pub fn from_series(series: &FlightSeries, window: usize) -> Result<Self, IgcError> {
        Ok(Self {
            timestamps: average(&series.timestamps_f64(), window)?,
            latitudes: average(&series.latitudes, window)?,
            longitudes: average(&series.longitudes, window)?,
            altitudes: average(&series.altitudes, window)?,
        })
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_is_floor_of_ratio() {
        let seq: Vec<f64> = (0..137).map(|v| v as f64).collect();
        for window in 1..=140 {
            assert_eq!(average(&seq, window).unwrap().len(), 137 / window);
        }
    }

    #[test]
    fn test_window_one_is_identity() {
        let seq = vec![3.5, -1.0, 7.25, 0.0];
        assert_eq!(average(&seq, 1).unwrap(), seq);
    }

    #[test]
    fn test_short_sequence_is_empty() {
        assert!(average(&[1.0, 2.0], 3).unwrap().is_empty());
        assert!(average(&[], 60).unwrap().is_empty());
    }

    #[test]
    fn test_block_means_drop_remainder() {
        let seq = vec![1.0, 3.0, 10.0, 20.0, 99.0];
        assert_eq!(average(&seq, 2).unwrap(), vec![2.0, 15.0]);
    }

    #[test]
    fn test_zero_window_rejected() {
        assert!(matches!(
            average(&[1.0], 0),
            Err(IgcError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_series_fields_stay_aligned() {
        let series = FlightSeries {
            timestamps: vec![0, 1, 2, 3, 4, 5, 6],
            latitudes: vec![1.0; 7],
            longitudes: vec![2.0; 7],
            altitudes: vec![10.0, 20.0, 30.0, 40.0, 50.0, 60.0, 70.0],
            enl: vec![None; 7],
        };
        let avg = AveragedSeries::from_series(&series, 3).unwrap();
        assert_eq!(avg.len(), 2);
        assert_eq!(avg.timestamps, vec![1.0, 4.0]);
        assert_eq!(avg.latitudes, vec![1.0, 1.0]);
        assert_eq!(avg.longitudes, vec![2.0, 2.0]);
        assert_eq!(avg.altitudes, vec![20.0, 50.0]);
    }
}
