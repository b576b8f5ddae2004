//! Conversions between sample indices and timestamps.

use crate::error::{ResyncError, Result, Stream};

/// Sample indices to seconds.
pub fn index_to_time(indices: &[usize], sampling_rate: u32) -> Vec<f64> {
    let sf = sampling_rate as f64;
    indices.iter().map(|&i| i as f64 / sf).collect()
}

/// Sample indices to milliseconds.
pub fn index_to_time_ms(indices: &[usize], sampling_rate: u32) -> Vec<f64> {
    let sf = sampling_rate as f64;
    indices.iter().map(|&i| i as f64 * 1000.0 / sf).collect()
}

/// Seconds to fractional sample positions.
pub fn time_to_index(times: &[f64], sampling_rate: u32) -> Vec<f64> {
    let sf = sampling_rate as f64;
    times.iter().map(|&t| t * sf).collect()
}

/// Milliseconds to fractional sample positions.
pub fn time_to_index_ms(times_ms: &[f64], sampling_rate: u32) -> Vec<f64> {
    let sf = sampling_rate as f64;
    times_ms.iter().map(|&t| t * sf / 1000.0).collect()
}

/// Time axis `[0, 1/sf, 2/sf, ...]` for a channel of `len` samples.
pub fn timescale(len: usize, sampling_rate: u32) -> Vec<f64> {
    let sf = sampling_rate as f64;
    (0..len).map(|i| i as f64 / sf).collect()
}

/// Snaps a time picked on a plot to the timestamp of the closest sample.
pub fn snap_to_sample(time: f64, sampling_rate: u32, len: usize) -> Option<f64> {
    if len == 0 || !time.is_finite() {
        return None;
    }
    let sf = sampling_rate as f64;
    let index = (time * sf).round().clamp(0.0, (len - 1) as f64);
    Some(index / sf)
}

/// Picks the curated entries out of a detected list.
pub fn extract_elements<T: Copy>(values: &[T], indices: &[usize], stream: Stream) -> Result<Vec<T>> {
    indices
        .iter()
        .map(|&i| {
            values
                .get(i)
                .copied()
                .ok_or(ResyncError::CuratedIndexOutOfRange {
                    stream,
                    index: i,
                    detected: values.len(),
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn converts_indices_to_seconds_and_back() {
        assert_eq!(index_to_time(&[4000], 2000), vec![2.0]);
        assert_eq!(index_to_time_ms(&[250, 500], 250), vec![1000.0, 2000.0]);
        assert_eq!(time_to_index(&[2.0, 0.5], 2000), vec![4000.0, 1000.0]);
        assert_eq!(time_to_index_ms(&[1000.0], 250), vec![250.0]);
    }

    #[test]
    fn timescale_steps_by_sample_period() {
        let axis = timescale(5, 4);
        assert_eq!(axis.len(), 5);
        assert_approx_eq!(axis[4], 1.0, 1e-12);
    }

    #[test]
    fn snapping_picks_closest_sample() {
        assert_approx_eq!(snap_to_sample(10.0031, 250, 10_000).unwrap(), 10.004, 1e-12);
        assert_approx_eq!(snap_to_sample(-3.0, 250, 10).unwrap(), 0.0, 1e-12);
        assert_approx_eq!(snap_to_sample(99.0, 250, 10).unwrap(), 9.0 / 250.0, 1e-12);
        assert!(snap_to_sample(1.0, 250, 0).is_none());
    }

    #[test]
    fn extraction_rejects_out_of_range_indices() {
        let times = [1.0, 2.0, 3.0];
        assert_eq!(extract_elements(&times, &[2, 0], Stream::Lfp).unwrap(), vec![3.0, 1.0]);
        assert!(matches!(
            extract_elements(&times, &[3], Stream::External),
            Err(ResyncError::CuratedIndexOutOfRange { index: 3, detected: 3, .. })
        ));
    }
}
