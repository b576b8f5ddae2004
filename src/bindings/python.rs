use crate::error::ResyncError;
use crate::processing::crop::crop_recordings;
use crate::processing::detectors::external::DEFAULT_THRESHOLD;
use crate::processing::detectors::{
    ArtefactDetector, ExternalDetector, ExternalDetectorConfig, Kernel, LfpDetector,
    LfpDetectorConfig,
};
use crate::processing::filters::{HighPassFilter, HighPassFilterConfig};
use crate::processing::timing;
use crate::recording::MultiChannelRecording;

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

impl From<ResyncError> for PyErr {
    fn from(err: ResyncError) -> PyErr {
        PyValueError::new_err(err.to_string())
    }
}

#[pyfunction]
#[pyo3(signature = (data, cutoff = 0.05, remove_clipping = true))]
pub fn preprocess_external(data: Vec<f64>, cutoff: f64, remove_clipping: bool) -> PyResult<Vec<f64>> {
    let filter = HighPassFilter::new(HighPassFilterConfig {
        cutoff,
        remove_clipping,
    })?;
    Ok(filter.apply(&data))
}

#[pyfunction]
#[pyo3(signature = (data, sampling_rate, threshold = DEFAULT_THRESHOLD, ignore_first_seconds = None, consider_first_seconds = None))]
pub fn detect_external_artefacts(
    data: Vec<f64>,
    sampling_rate: u32,
    threshold: f64,
    ignore_first_seconds: Option<f64>,
    consider_first_seconds: Option<f64>,
) -> PyResult<Vec<usize>> {
    let detector = ExternalDetector::new(ExternalDetectorConfig {
        threshold,
        ignore_first_seconds,
        consider_first_seconds,
    });
    Ok(detector.detect(&data, sampling_rate)?.indices)
}

/// Returns the candidate indices and whether the signal was read inverted.
#[pyfunction]
#[pyo3(signature = (data, sampling_rate, kernel = "1", consider_first_seconds = None))]
pub fn detect_lfp_artefacts(
    data: Vec<f64>,
    sampling_rate: u32,
    kernel: &str,
    consider_first_seconds: Option<f64>,
) -> PyResult<(Vec<usize>, bool)> {
    let kernel: Kernel = kernel.parse()?;
    let detection = LfpDetector::new(LfpDetectorConfig {
        kernel,
        consider_first_seconds,
    })
    .detect(&data, sampling_rate)?;
    Ok((detection.indices, detection.inverted))
}

#[pyfunction]
pub fn convert_index_to_time(indices: Vec<usize>, sampling_rate: u32) -> Vec<f64> {
    timing::index_to_time(&indices, sampling_rate)
}

#[pyfunction]
pub fn snap_to_sample(time: f64, sampling_rate: u32, len: usize) -> Option<f64> {
    timing::snap_to_sample(time, sampling_rate, len)
}

/// Crops channel-major arrays around their first artefact and returns the two
/// aligned arrays.
#[pyfunction]
#[pyo3(signature = (lfp_data, lfp_channel_names, sampling_rate_lfp, external_data, external_channel_names, sampling_rate_external, lfp_artefact_times, external_artefact_times, manual_lfp_correction = 0.0))]
#[allow(clippy::too_many_arguments)]
pub fn crop(
    lfp_data: Vec<Vec<f64>>,
    lfp_channel_names: Vec<String>,
    sampling_rate_lfp: u32,
    external_data: Vec<Vec<f64>>,
    external_channel_names: Vec<String>,
    sampling_rate_external: u32,
    lfp_artefact_times: Vec<f64>,
    external_artefact_times: Vec<f64>,
    manual_lfp_correction: f64,
) -> PyResult<(Vec<Vec<f64>>, Vec<Vec<f64>>)> {
    let lfp = MultiChannelRecording::new(lfp_data, sampling_rate_lfp, lfp_channel_names)?;
    let external =
        MultiChannelRecording::new(external_data, sampling_rate_external, external_channel_names)?;
    let aligned = crop_recordings(
        &lfp,
        &external,
        &lfp_artefact_times,
        &external_artefact_times,
        Some(manual_lfp_correction),
    )?;
    Ok((aligned.lfp.rows().to_vec(), aligned.external.rows().to_vec()))
}

/// A Python module implemented in Rust.
#[pymodule]
pub fn stim_resync(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(preprocess_external, m)?)?;
    m.add_function(wrap_pyfunction!(detect_external_artefacts, m)?)?;
    m.add_function(wrap_pyfunction!(detect_lfp_artefacts, m)?)?;
    m.add_function(wrap_pyfunction!(convert_index_to_time, m)?)?;
    m.add_function(wrap_pyfunction!(snap_to_sample, m)?)?;
    m.add_function(wrap_pyfunction!(crop, m)?)?;
    Ok(())
}
