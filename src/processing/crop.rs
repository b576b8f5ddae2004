use super::{push_diagnostic, Diagnostic};
use crate::error::{ResyncError, Result, Stream};
use crate::recording::MultiChannelRecording;

/// Signal kept before the first artefact, in seconds.
pub const LEAD_IN_SECONDS: f64 = 1.0;

// Rate-scaled times land a hair off whole samples.
const INDEX_TOLERANCE: f64 = 1e-6;

/// Both recordings trimmed to start one second before their first artefact and
/// to last equally long.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedPair {
    pub lfp: MultiChannelRecording,
    pub external: MultiChannelRecording,
    /// Index in the original LFP recording of the first kept sample.
    pub lfp_start_index: usize,
    /// Index in the original external recording of the first kept sample.
    pub external_start_index: usize,
    pub diagnostics: Vec<Diagnostic>,
}

impl AlignedPair {
    pub fn duration_seconds(&self) -> f64 {
        self.lfp.duration_seconds().min(self.external.duration_seconds())
    }
}

/// Crops both recordings around their first artefact.
///
/// A non-zero `manual_lfp_correction` (seconds, in the uncropped LFP) moves the
/// LFP crop point by its distance to the detected first artefact, keeping the
/// lead-in measured from the detected one.
pub fn crop_recordings(
    lfp: &MultiChannelRecording,
    external: &MultiChannelRecording,
    lfp_artefact_times: &[f64],
    external_artefact_times: &[f64],
    manual_lfp_correction: Option<f64>,
) -> Result<AlignedPair> {
    let first_lfp = *lfp_artefact_times
        .first()
        .ok_or(ResyncError::NoArtefactDetected { stream: Stream::Lfp })?;
    let first_external = *external_artefact_times
        .first()
        .ok_or(ResyncError::NoArtefactDetected {
            stream: Stream::External,
        })?;

    let sf_lfp = lfp.sampling_rate() as f64;
    let sf_external = external.sampling_rate() as f64;
    let mut diagnostics = Vec::new();

    let mut lfp_start = (first_lfp - LEAD_IN_SECONDS) * sf_lfp;
    if let Some(corrected) = manual_lfp_correction.filter(|&t| t != 0.0) {
        lfp_start += (corrected - first_lfp) * sf_lfp;
        tracing::info!(
            detected = first_lfp,
            corrected,
            "using manually corrected intracerebral artefact"
        );
    }
    let external_start = (first_external - LEAD_IN_SECONDS) * sf_external;

    let lfp_start = start_index(lfp_start, lfp, Stream::Lfp, &mut diagnostics)?;
    let external_start = start_index(external_start, external, Stream::External, &mut diagnostics)?;

    let mut lfp_end = lfp.sample_count();
    let mut external_end = external.sample_count();
    let lfp_duration = (lfp_end - lfp_start) as f64 / sf_lfp;
    let external_duration = (external_end - external_start) as f64 / sf_external;

    if lfp_duration > external_duration {
        lfp_end = lfp_start + floor_index(external_duration * sf_lfp);
    } else if external_duration > lfp_duration {
        external_end = external_start + floor_index(lfp_duration * sf_external);
    }

    let aligned = AlignedPair {
        lfp: lfp.slice_samples(lfp_start, lfp_end),
        external: external.slice_samples(external_start, external_end),
        lfp_start_index: lfp_start,
        external_start_index: external_start,
        diagnostics,
    };

    tracing::info!(
        lfp_start,
        external_start,
        lfp_samples = aligned.lfp.sample_count(),
        external_samples = aligned.external.sample_count(),
        duration = aligned.duration_seconds(),
        "recordings cropped"
    );

    Ok(aligned)
}

fn start_index(
    position: f64,
    recording: &MultiChannelRecording,
    stream: Stream,
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<usize> {
    if position < 0.0 {
        push_diagnostic(
            diagnostics,
            Diagnostic::LeadInTruncated {
                stream,
                missing_seconds: -position / recording.sampling_rate() as f64,
            },
        );
        return Ok(0);
    }
    let index = ceil_index(position);
    if index >= recording.sample_count() {
        return Err(ResyncError::InvalidRecording(format!(
            "the {} crop point (sample {}) lies beyond the end of the recording ({} samples)",
            stream,
            index,
            recording.sample_count()
        )));
    }
    Ok(index)
}

fn ceil_index(position: f64) -> usize {
    let nearest = position.round();
    if (position - nearest).abs() < INDEX_TOLERANCE {
        nearest as usize
    } else {
        position.ceil() as usize
    }
}

fn floor_index(position: f64) -> usize {
    let nearest = position.round();
    if (position - nearest).abs() < INDEX_TOLERANCE {
        nearest as usize
    } else {
        position.floor() as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn recording(seconds: f64, sampling_rate: u32, channels: usize) -> MultiChannelRecording {
        let samples = (seconds * sampling_rate as f64).round() as usize;
        let data = (0..channels)
            .map(|c| (0..samples).map(|i| (c * 1_000_000 + i) as f64).collect())
            .collect();
        let names = (0..channels).map(|c| format!("ch{}", c)).collect();
        MultiChannelRecording::new(data, sampling_rate, names).unwrap()
    }

    #[test]
    fn crops_to_equal_duration_with_one_second_lead_in() {
        let lfp = recording(30.0, 250, 2);
        let external = recording(30.0, 4000, 3);

        let aligned = crop_recordings(&lfp, &external, &[10.0, 20.0], &[10.2], None).unwrap();

        assert_eq!(aligned.lfp_start_index, 2250);
        assert_eq!(aligned.external_start_index, 36800);
        assert_eq!(aligned.external.sample_count(), 83200);
        assert_eq!(aligned.lfp.sample_count(), 5200);
        assert_approx_eq!(
            aligned.lfp.duration_seconds(),
            aligned.external.duration_seconds(),
            1.0 / 250.0
        );
        // First kept sample is the original sample at artefact - 1 s.
        assert_eq!(aligned.lfp.rows()[0][0], 2250.0);
        assert_eq!(aligned.external.rows()[2][0], (2_000_000 + 36800) as f64);
        assert_eq!(aligned.lfp.channel_names(), lfp.channel_names());
    }

    #[test]
    fn longer_external_recording_is_truncated() {
        let lfp = recording(20.0, 250, 1);
        let external = recording(40.0, 2000, 1);

        let aligned = crop_recordings(&lfp, &external, &[5.0], &[3.0], None).unwrap();

        assert_eq!(aligned.lfp.sample_count(), 4000);
        assert_eq!(aligned.external_start_index, 4000);
        assert_eq!(aligned.external.sample_count(), 32000);
    }

    #[test]
    fn equal_durations_leave_both_untouched() {
        let lfp = recording(12.0, 250, 1);
        let external = recording(12.0, 1000, 1);

        let aligned = crop_recordings(&lfp, &external, &[2.0], &[2.0], None).unwrap();

        assert_eq!(aligned.lfp_start_index, 250);
        assert_eq!(aligned.external_start_index, 1000);
        assert_eq!(aligned.lfp.sample_count(), 2750);
        assert_eq!(aligned.external.sample_count(), 11000);
    }

    #[test]
    fn manual_correction_shifts_the_lfp_crop_point() {
        let lfp = recording(30.0, 250, 1);
        let external = recording(30.0, 4000, 1);

        let aligned = crop_recordings(&lfp, &external, &[10.0], &[10.2], Some(10.4)).unwrap();

        // 1 s before the detected artefact, moved by the 0.4 s correction.
        assert_eq!(aligned.lfp_start_index, 2350);
        assert_eq!(aligned.external_start_index, 36800);
        assert_approx_eq!(
            aligned.lfp.duration_seconds(),
            aligned.external.duration_seconds(),
            1.0 / 250.0
        );
    }

    #[test]
    fn zero_correction_means_no_override() {
        let lfp = recording(30.0, 250, 1);
        let external = recording(30.0, 4000, 1);

        let plain = crop_recordings(&lfp, &external, &[10.0], &[10.2], None).unwrap();
        let zero = crop_recordings(&lfp, &external, &[10.0], &[10.2], Some(0.0)).unwrap();

        assert_eq!(plain, zero);
    }

    #[test]
    fn empty_artefact_lists_are_rejected() {
        let lfp = recording(5.0, 250, 1);
        let external = recording(5.0, 1000, 1);

        let lfp_missing = crop_recordings(&lfp, &external, &[], &[2.0], None);
        assert!(matches!(
            lfp_missing,
            Err(ResyncError::NoArtefactDetected { stream: Stream::Lfp })
        ));
        let external_missing = crop_recordings(&lfp, &external, &[2.0], &[], None);
        assert!(matches!(
            external_missing,
            Err(ResyncError::NoArtefactDetected {
                stream: Stream::External
            })
        ));
    }

    #[test]
    fn short_lead_in_is_clamped_and_reported() {
        let lfp = recording(10.0, 250, 1);
        let external = recording(10.0, 1000, 1);

        let aligned = crop_recordings(&lfp, &external, &[0.5], &[2.0], None).unwrap();

        assert_eq!(aligned.lfp_start_index, 0);
        assert!(matches!(
            aligned.diagnostics.as_slice(),
            [Diagnostic::LeadInTruncated {
                stream: Stream::Lfp,
                ..
            }]
        ));
    }

    #[test]
    fn crop_point_past_the_end_fails() {
        let lfp = recording(5.0, 250, 1);
        let external = recording(5.0, 1000, 1);
        assert!(crop_recordings(&lfp, &external, &[9.0], &[2.0], None).is_err());
    }
}
