use super::crop::{crop_recordings, AlignedPair};
use super::detectors::{
    ArtefactDetector, Detection, ExternalDetector, ExternalDetectorConfig, LfpDetector,
    LfpDetectorConfig,
};
use super::filters::{HighPassFilter, HighPassFilterConfig};
use super::Diagnostic;
use crate::error::Result;
use crate::recording::{resolve_reference_channel, MultiChannelRecording};

// RESYNC STAGE ----------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct ResyncConfig {
    pub lfp_channel_index: usize,
    /// Explicit external reference channel, takes precedence over the hardware table.
    pub external_channel_name: Option<String>,
    pub external_hardware: Option<String>,
    pub lfp_detector: LfpDetectorConfig,
    pub external_detector: ExternalDetectorConfig,
    pub filter: HighPassFilterConfig,
    /// Hand-picked time of the first intracerebral artefact, seconds. Zero means none.
    pub manual_lfp_correction: Option<f64>,
}

impl Default for ResyncConfig {
    fn default() -> Self {
        Self {
            lfp_channel_index: 0,
            external_channel_name: None,
            external_hardware: None,
            lfp_detector: LfpDetectorConfig::default(),
            external_detector: ExternalDetectorConfig::default(),
            filter: HighPassFilterConfig::default(),
            manual_lfp_correction: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResyncOutcome {
    pub aligned: AlignedPair,
    pub lfp_detection: Detection,
    pub external_detection: Detection,
    /// Position of the external reference channel that was used.
    pub external_channel_index: usize,
    /// Everything reported by the detectors and the crop, in stage order.
    pub diagnostics: Vec<Diagnostic>,
}

/// Detects the first artefact in both recordings and crops them around it.
pub fn run_resync(
    lfp: &MultiChannelRecording,
    external: &MultiChannelRecording,
    config: &ResyncConfig,
) -> Result<ResyncOutcome> {
    let lfp_channel = lfp.channel(config.lfp_channel_index)?;
    let external_channel_index = resolve_reference_channel(
        external,
        config.external_channel_name.as_deref(),
        config.external_hardware.as_deref(),
    )?;
    let external_channel = external.channel(external_channel_index)?;

    let lfp_detection =
        LfpDetector::new(config.lfp_detector.clone()).detect(lfp_channel, lfp.sampling_rate())?;
    lfp_detection.first_index()?;

    let filtered = HighPassFilter::new(config.filter.clone())?.apply(external_channel);
    let external_detection = ExternalDetector::new(config.external_detector.clone())
        .detect(&filtered, external.sampling_rate())?;
    external_detection.first_index()?;

    let aligned = crop_recordings(
        lfp,
        external,
        &lfp_detection.times(lfp.sampling_rate()),
        &external_detection.times(external.sampling_rate()),
        config.manual_lfp_correction,
    )?;

    let diagnostics = lfp_detection
        .diagnostics
        .iter()
        .chain(&external_detection.diagnostics)
        .chain(&aligned.diagnostics)
        .cloned()
        .collect();

    Ok(ResyncOutcome {
        aligned,
        lfp_detection,
        external_detection,
        external_channel_index,
        diagnostics,
    })
}
