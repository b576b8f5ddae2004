use super::{check_channel, seconds_to_samples, ArtefactDetector, Detection};
use crate::error::{Result, Stream};
use crate::processing::{push_diagnostic, Diagnostic};
use serde::{Deserialize, Serialize};

pub const DEFAULT_THRESHOLD: f64 = -0.001;

// Starts this close to the window start mean the recording began mid-stimulation.
const START_GUARD_SECONDS: f64 = 0.2;
// Quiet period that confirms a stimulation train has ended.
const END_CONFIRMATION_SECONDS: f64 = 0.5;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ExternalDetectorConfig {
    pub threshold: f64,
    /// Skip this many seconds at the start of the recording.
    pub ignore_first_seconds: Option<f64>,
    /// Only scan this many seconds at the start and at the end.
    pub consider_first_seconds: Option<f64>,
}

impl Default for ExternalDetectorConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            ignore_first_seconds: None,
            consider_first_seconds: None,
        }
    }
}

/// Threshold state machine over the detrended bipolar channel. Stimulation is
/// "on" from the first sharp negative local minimum until a local minimum that
/// is followed by half a second without threshold crossings.
pub struct ExternalDetector {
    config: ExternalDetectorConfig,
}

impl ExternalDetector {
    pub fn new(config: ExternalDetectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExternalDetectorConfig {
        &self.config
    }
}

impl ArtefactDetector for ExternalDetector {
    fn stream(&self) -> Stream {
        Stream::External
    }

    fn detect(&self, channel: &[f64], sampling_rate: u32) -> Result<Detection> {
        check_channel(channel, sampling_rate, 3)?;
        let mut diagnostics = Vec::new();

        let (signal, reversed) = normalize_polarity(channel);
        if reversed {
            push_diagnostic(&mut diagnostics, Diagnostic::ExternalSignalReversed);
        }

        let last = signal.len() - 2;
        let start = self
            .config
            .ignore_first_seconds
            .map_or(0, |s| seconds_to_samples(s, sampling_rate));
        let stop = self
            .config
            .consider_first_seconds
            .map_or(last, |s| seconds_to_samples(s, sampling_rate).min(last));

        let mut scan = StimulationScan {
            signal: &signal,
            threshold: self.config.threshold,
            guard: seconds_to_samples(START_GUARD_SECONDS, sampling_rate),
            confirmation: seconds_to_samples(END_CONFIRMATION_SECONDS, sampling_rate),
            stimulation_on: false,
            starts: Vec::new(),
            diagnostics,
        };

        scan.run(start, stop, true);
        if self.config.consider_first_seconds.is_some() {
            // Windows longer than half the recording would overlap.
            scan.run((signal.len() - stop).max(stop), last, false);
        }

        tracing::info!(
            count = scan.starts.len(),
            "artefact starts found in external channel"
        );

        Ok(Detection {
            stream: Stream::External,
            indices: scan.starts,
            inverted: reversed,
            diagnostics: scan.diagnostics,
        })
    }
}

/// Copies the channel, sign-inverting it when the largest deflection points upwards.
fn normalize_polarity(channel: &[f64]) -> (Vec<f64>, bool) {
    let max = channel.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = channel.iter().copied().fold(f64::INFINITY, f64::min);
    if max.abs() > min.abs() {
        (channel.iter().map(|&s| -s).collect(), true)
    } else {
        (channel.to_vec(), false)
    }
}

struct StimulationScan<'a> {
    signal: &'a [f64],
    threshold: f64,
    guard: usize,
    confirmation: usize,
    stimulation_on: bool,
    starts: Vec<usize>,
    diagnostics: Vec<Diagnostic>,
}

impl StimulationScan<'_> {
    fn run(&mut self, start: usize, stop: usize, guard_start: bool) {
        for q in start.max(1)..stop {
            if !self.is_crossing_minimum(q) {
                continue;
            }

            if !self.stimulation_on {
                if guard_start && q < start + self.guard {
                    push_diagnostic(
                        &mut self.diagnostics,
                        Diagnostic::StartedDuringStimulation { index: q },
                    );
                } else {
                    self.starts.push(q);
                }
                self.stimulation_on = true;
            }

            // A lone pulse both starts and ends stimulation on the same sample.
            if self.stimulation_on && self.quiet_after(q) {
                self.stimulation_on = false;
            }
        }
    }

    fn is_crossing_minimum(&self, q: usize) -> bool {
        let value = self.signal[q];
        value <= self.threshold && value < self.signal[q + 1] && value < self.signal[q - 1]
    }

    fn quiet_after(&self, q: usize) -> bool {
        let from = (q + 2).min(self.signal.len());
        let to = (q + 2 + self.confirmation).min(self.signal.len());
        self.signal[from..to].iter().all(|&s| s > self.threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> ExternalDetector {
        ExternalDetector::new(ExternalDetectorConfig::default())
    }

    fn with_config(ignore: Option<f64>, consider: Option<f64>) -> ExternalDetector {
        ExternalDetector::new(ExternalDetectorConfig {
            ignore_first_seconds: ignore,
            consider_first_seconds: consider,
            ..Default::default()
        })
    }

    // Two bursts of pulses every 15 samples lasting two seconds.
    fn two_trains(sampling_rate: u32) -> Vec<f64> {
        let sf = sampling_rate as usize;
        let mut signal = vec![0.0; 20 * sf];
        for start in [3 * sf, 12 * sf] {
            for offset in (0..2 * sf).step_by(15) {
                signal[start + offset] = -0.05;
            }
        }
        signal
    }

    #[test]
    fn finds_single_v_shaped_dip() {
        let mut signal = vec![0.0; 10_000];
        for (i, v) in (3998..4003).zip([-0.004, -0.007, -0.01, -0.007, -0.004]) {
            signal[i] = v;
        }
        let detection = detector().detect(&signal, 2000).unwrap();
        assert_eq!(detection.indices, vec![4000]);
        assert_eq!(detection.times(2000), vec![2.0]);
        assert!(!detection.inverted);
    }

    #[test]
    fn single_local_minimum_is_returned() {
        for k in [500, 1234, 7000] {
            let mut signal = vec![0.0; 8000];
            signal[k] = -0.02;
            let detection = detector().detect(&signal, 1000).unwrap();
            assert_eq!(detection.indices, vec![k]);
        }
    }

    #[test]
    fn pulse_trains_report_only_their_first_pulse() {
        let detection = detector().detect(&two_trains(2000), 2000).unwrap();
        assert_eq!(detection.indices, vec![6000, 24000]);
    }

    #[test]
    fn upward_artefacts_are_inverted_first() {
        let flipped: Vec<f64> = two_trains(2000).iter().map(|s| -s).collect();
        let detection = detector().detect(&flipped, 2000).unwrap();
        assert_eq!(detection.indices, vec![6000, 24000]);
        assert!(detection.inverted);
        assert!(detection
            .diagnostics
            .contains(&Diagnostic::ExternalSignalReversed));
    }

    #[test]
    fn recording_started_during_stimulation_is_not_an_artefact() {
        let sf = 2000;
        let mut signal = vec![0.0; 20 * sf];
        for offset in (100..2 * sf).step_by(15) {
            signal[offset] = -0.05;
        }
        for offset in (10 * sf..12 * sf).step_by(15) {
            signal[offset] = -0.05;
        }
        let detection = detector().detect(&signal, sf as u32).unwrap();
        assert_eq!(detection.indices, vec![20000]);
        assert!(detection
            .diagnostics
            .contains(&Diagnostic::StartedDuringStimulation { index: 100 }));
    }

    #[test]
    fn consider_window_keeps_head_and_tail_only() {
        let detection = with_config(None, Some(5.0))
            .detect(&two_trains(2000), 2000)
            .unwrap();
        assert_eq!(detection.indices, vec![6000]);
    }

    #[test]
    fn overlapping_consider_windows_report_each_start_once() {
        let detection = with_config(None, Some(15.0))
            .detect(&two_trains(2000), 2000)
            .unwrap();
        assert_eq!(detection.indices, vec![6000, 24000]);
    }

    #[test]
    fn ignore_window_skips_the_beginning() {
        let detection = with_config(Some(5.0), None)
            .detect(&two_trains(2000), 2000)
            .unwrap();
        assert_eq!(detection.indices, vec![24000]);
    }

    #[test]
    fn silent_channel_yields_empty_list() {
        let detection = detector().detect(&vec![0.0; 1000], 1000).unwrap();
        assert!(detection.is_empty());
        assert!(detection.first_index().is_err());
    }

    #[test]
    fn detection_is_repeatable_and_leaves_input_intact() {
        let signal: Vec<f64> = two_trains(2000).iter().map(|s| -s).collect();
        let copy = signal.clone();
        let first = detector().detect(&signal, 2000).unwrap();
        let second = detector().detect(&signal, 2000).unwrap();
        assert_eq!(first, second);
        assert_eq!(signal, copy);
    }

    #[test]
    fn rejects_too_short_channels() {
        assert!(detector().detect(&[0.0, -1.0], 1000).is_err());
    }
}
