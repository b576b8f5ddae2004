use serde::Serialize;

use super::detectors::{
    ArtefactDetector, Detection, ExternalDetector, ExternalDetectorConfig, Kernel, LfpDetector,
    LfpDetectorConfig,
};
use super::filters::{HighPassFilter, HighPassFilterConfig};
use super::timing::extract_elements;
use super::Diagnostic;
use crate::error::{ResyncError, Result, Stream};
use crate::recording::MultiChannelRecording;

/// Mean residual delay above which the curation or the recording is suspect.
pub const MAX_MEAN_DELAY_MS: f64 = 100.0;

#[derive(Debug, Clone, PartialEq)]
pub struct TimeshiftConfig {
    pub lfp_channel_index: usize,
    pub external_channel_index: usize,
    pub kernel: Kernel,
    pub external_threshold: f64,
    pub filter: HighPassFilterConfig,
    /// Positions, in the re-detected intracerebral list, of the artefacts seen in both streams.
    pub curated_lfp: Vec<usize>,
    /// Matching positions in the re-detected external list.
    pub curated_external: Vec<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DelayPoint {
    pub lfp_time: f64,
    pub external_time: f64,
    pub delay_ms: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimeshiftReport {
    pub delays: Vec<DelayPoint>,
    pub mean_delay_ms: f64,
    /// Delay at the last curated artefact.
    pub timeshift_ms: f64,
    /// Intracerebral time of the last curated artefact, seconds into the aligned recording.
    pub last_artefact_time: f64,
    pub lfp_detection: Detection,
    pub external_detection: Detection,
}

impl TimeshiftReport {
    pub fn diagnostics(&self) -> impl Iterator<Item = &Diagnostic> {
        self.lfp_detection
            .diagnostics
            .iter()
            .chain(&self.external_detection.diagnostics)
    }
}

/// A completed analysis. `LargeDelay` still carries every computed value.
#[must_use]
#[derive(Debug, Clone, PartialEq)]
pub enum TimeshiftOutcome {
    Consistent(TimeshiftReport),
    LargeDelay(TimeshiftReport),
}

impl TimeshiftOutcome {
    pub fn report(&self) -> &TimeshiftReport {
        match self {
            TimeshiftOutcome::Consistent(report) | TimeshiftOutcome::LargeDelay(report) => report,
        }
    }

    pub fn into_report(self) -> TimeshiftReport {
        match self {
            TimeshiftOutcome::Consistent(report) | TimeshiftOutcome::LargeDelay(report) => report,
        }
    }

    pub fn is_consistent(&self) -> bool {
        matches!(self, TimeshiftOutcome::Consistent(_))
    }
}

/// Re-detects the artefacts in an aligned pair and measures the residual delay
/// between the curated matches.
pub fn analyze_timeshift(
    lfp: &MultiChannelRecording,
    external: &MultiChannelRecording,
    config: &TimeshiftConfig,
) -> Result<TimeshiftOutcome> {
    let lfp_channel = lfp.channel(config.lfp_channel_index)?;
    let external_channel = external.channel(config.external_channel_index)?;

    let lfp_detection = LfpDetector::new(LfpDetectorConfig {
        kernel: config.kernel,
        consider_first_seconds: None,
    })
    .detect(lfp_channel, lfp.sampling_rate())?;

    let filtered = HighPassFilter::new(config.filter.clone())?.apply(external_channel);
    let external_detection = ExternalDetector::new(ExternalDetectorConfig {
        threshold: config.external_threshold,
        ignore_first_seconds: None,
        consider_first_seconds: None,
    })
    .detect(&filtered, external.sampling_rate())?;

    let delays = delay_series(
        &lfp_detection.times(lfp.sampling_rate()),
        &external_detection.times(external.sampling_rate()),
        &config.curated_lfp,
        &config.curated_external,
    )?;

    Ok(summarize(delays, lfp_detection, external_detection))
}

/// Pairs the curated entries of both detected time lists and computes their delays.
pub fn delay_series(
    lfp_times: &[f64],
    external_times: &[f64],
    curated_lfp: &[usize],
    curated_external: &[usize],
) -> Result<Vec<DelayPoint>> {
    if curated_lfp.len() > lfp_times.len() {
        return Err(ResyncError::CuratedCountExceedsDetected {
            stream: Stream::Lfp,
            curated: curated_lfp.len(),
            detected: lfp_times.len(),
        });
    }
    if curated_external.len() > external_times.len() {
        return Err(ResyncError::CuratedCountExceedsDetected {
            stream: Stream::External,
            curated: curated_external.len(),
            detected: external_times.len(),
        });
    }
    if curated_lfp.len() != curated_external.len() {
        return Err(ResyncError::CuratedLengthMismatch {
            lfp: curated_lfp.len(),
            external: curated_external.len(),
            detected_lfp: lfp_times.len(),
            detected_external: external_times.len(),
        });
    }
    if curated_lfp.is_empty() {
        return Err(ResyncError::InvalidConfig(
            "index_real_artefacts_lfp and index_real_artefacts_external are empty, select at least one artefact seen in both recordings".to_string(),
        ));
    }

    let lfp_selected = extract_elements(lfp_times, curated_lfp, Stream::Lfp)?;
    let external_selected = extract_elements(external_times, curated_external, Stream::External)?;

    Ok(lfp_selected
        .into_iter()
        .zip(external_selected)
        .map(|(lfp_time, external_time)| DelayPoint {
            lfp_time,
            external_time,
            delay_ms: (external_time - lfp_time) * 1000.0,
        })
        .collect())
}

fn summarize(
    delays: Vec<DelayPoint>,
    lfp_detection: Detection,
    external_detection: Detection,
) -> TimeshiftOutcome {
    let mean_delay_ms = delays.iter().map(|d| d.delay_ms).sum::<f64>() / delays.len() as f64;
    let (timeshift_ms, last_artefact_time) = delays
        .last()
        .map_or((0.0, 0.0), |d| (d.delay_ms, d.lfp_time));

    let report = TimeshiftReport {
        delays,
        mean_delay_ms,
        timeshift_ms,
        last_artefact_time,
        lfp_detection,
        external_detection,
    };

    if mean_delay_ms.abs() > MAX_MEAN_DELAY_MS {
        tracing::warn!(
            mean_delay_ms,
            timeshift_ms,
            detected_lfp = report.lfp_detection.len(),
            detected_external = report.external_detection.len(),
            "mean timeshift is very high, the selected artefacts might not be correct or the recording contains packet loss"
        );
        TimeshiftOutcome::LargeDelay(report)
    } else {
        tracing::info!(
            mean_delay_ms,
            timeshift_ms,
            last_artefact_time,
            "timeshift analysis performed"
        );
        TimeshiftOutcome::Consistent(report)
    }
}
