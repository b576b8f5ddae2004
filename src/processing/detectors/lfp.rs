use super::peaks::find_peaks;
use super::{check_channel, ArtefactDetector, Detection};
use crate::error::{ResyncError, Result, Stream};
use crate::processing::{push_diagnostic, Diagnostic};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const PEAK_HEIGHT_FRACTION: f64 = 0.3;
// First positive and negative peaks closer than this need a width check.
const AMBIGUOUS_PEAK_DISTANCE: usize = 50;
const NOISE_MIN_CANDIDATES: usize = 20;
const NOISE_MIN_RATIO: f64 = 8.0;
const NOISE_MAX_WINDOW_SECONDS: usize = 30;
const NOISE_STD_WINDOW_SECONDS: usize = 5;
const AMPLITUDE_HALF_WINDOW: usize = 5;
const AMPLITUDE_TOLERANCE: f64 = 0.66;
const POLARITY_FRACTION: f64 = 0.5;

/// Matched-filter template.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "KernelSetting", into = "String")]
pub enum Kernel {
    /// `[1, -1]`: a sharp single-sample drop.
    #[default]
    Step,
    /// Sharp drop followed by a slow linear recovery.
    StepRecovery,
}

impl Kernel {
    pub fn taps(&self) -> Vec<f64> {
        match self {
            Kernel::Step => vec![1.0, -1.0],
            Kernel::StepRecovery => {
                let mut taps = vec![1.0, 0.0, -1.0];
                taps.extend((0..20).map(|i| -1.0 + i as f64 / 19.0));
                taps
            }
        }
    }
}

impl fmt::Display for Kernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kernel::Step => write!(f, "1"),
            Kernel::StepRecovery => write!(f, "2"),
        }
    }
}

impl FromStr for Kernel {
    type Err = ResyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "1" => Ok(Kernel::Step),
            "2" => Ok(Kernel::StepRecovery),
            other => Err(ResyncError::InvalidKernel(other.to_string())),
        }
    }
}

impl From<Kernel> for String {
    fn from(kernel: Kernel) -> Self {
        kernel.to_string()
    }
}

// Config files write the selector either as "2" or as 2.
#[derive(Deserialize)]
#[serde(untagged)]
enum KernelSetting {
    Text(String),
    Number(u64),
}

impl TryFrom<KernelSetting> for Kernel {
    type Error = ResyncError;

    fn try_from(setting: KernelSetting) -> Result<Self> {
        match setting {
            KernelSetting::Text(text) => text.parse(),
            KernelSetting::Number(number) => number.to_string().parse(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct LfpDetectorConfig {
    pub kernel: Kernel,
    /// Only keep candidates within this many seconds of either end.
    pub consider_first_seconds: Option<f64>,
}

impl Default for LfpDetectorConfig {
    fn default() -> Self {
        Self {
            kernel: Kernel::default(),
            consider_first_seconds: None,
        }
    }
}

/// Kernel dot-product scan of the intracerebral channel.
pub struct LfpDetector {
    config: LfpDetectorConfig,
    taps: Vec<f64>,
}

impl LfpDetector {
    pub fn new(config: LfpDetectorConfig) -> Self {
        let taps = config.kernel.taps();
        Self { config, taps }
    }

    pub fn config(&self) -> &LfpDetectorConfig {
        &self.config
    }
}

impl ArtefactDetector for LfpDetector {
    fn stream(&self) -> Stream {
        Stream::Lfp
    }

    fn detect(&self, channel: &[f64], sampling_rate: u32) -> Result<Detection> {
        check_channel(channel, sampling_rate, self.taps.len() + 3)?;
        let mut diagnostics = Vec::new();

        let mut response = matched_filter(channel, &self.taps);
        let max = response.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if !(max > 0.0 && max.is_finite()) {
            push_diagnostic(&mut diagnostics, Diagnostic::FlatResponse);
            return Ok(Detection::empty(Stream::Lfp, diagnostics));
        }
        response.iter_mut().for_each(|r| *r /= max);
        let min = response.iter().copied().fold(f64::INFINITY, f64::min);

        let distance = sampling_rate as usize;
        let positive = find_peaks(&response, PEAK_HEIGHT_FRACTION, distance);
        let negated: Vec<f64> = response.iter().map(|r| -r).collect();
        let negative = find_peaks(&negated, -PEAK_HEIGHT_FRACTION * min, distance);

        let inverted = is_inverted(&response, min, &positive, &negative, &mut diagnostics);
        let mut candidates = if inverted { negative } else { positive };

        let ratio = max_to_std_ratio(&response, sampling_rate as usize);
        if candidates.len() > NOISE_MIN_CANDIDATES && ratio < NOISE_MIN_RATIO {
            push_diagnostic(
                &mut diagnostics,
                Diagnostic::NoRealArtefactSuspected {
                    candidates: candidates.len(),
                    ratio,
                },
            );
        }

        if let Some(seconds) = self.config.consider_first_seconds {
            let border = seconds * sampling_rate as f64;
            let border_end = channel.len() as f64 - border;
            candidates.retain(|&i| (i as f64) < border || (i as f64) > border_end);
        }

        let candidates = filter_by_amplitude(channel, candidates, inverted);

        tracing::info!(
            count = candidates.len(),
            kernel = %self.config.kernel,
            inverted,
            "artefact starts found in intracerebral channel"
        );

        Ok(Detection {
            stream: Stream::Lfp,
            indices: candidates,
            inverted,
            diagnostics,
        })
    }
}

/// Dot product of the kernel with every window starting at `0..len - taps`.
pub fn matched_filter(channel: &[f64], taps: &[f64]) -> Vec<f64> {
    let count = channel.len().saturating_sub(taps.len());
    (0..count)
        .map(|i| {
            taps.iter()
                .zip(&channel[i..i + taps.len()])
                .map(|(k, s)| k * s)
                .sum()
        })
        .collect()
}

// Normal artefacts give a positive response peak first.
fn is_inverted(
    response: &[f64],
    min: f64,
    positive: &[usize],
    negative: &[usize],
    diagnostics: &mut Vec<Diagnostic>,
) -> bool {
    let (first_pos, first_neg) = match (positive.first(), negative.first()) {
        (Some(&p), Some(&n)) => (p, n),
        (None, Some(_)) => {
            push_diagnostic(diagnostics, Diagnostic::SignalInverted);
            return true;
        }
        _ => return false,
    };
    if first_neg >= first_pos {
        return false;
    }
    push_diagnostic(diagnostics, Diagnostic::SignalInverted);

    // A small positive LFP bump just before a negative artefact looks like an inversion.
    if first_pos - first_neg < AMBIGUOUS_PEAK_DISTANCE {
        let width_pos = run_length(response, first_pos, |r| r > PEAK_HEIGHT_FRACTION);
        let width_neg = run_length(response, first_neg, |r| r < min * PEAK_HEIGHT_FRACTION);
        tracing::debug!(width_pos, width_neg, "re-checking inversion");
        if width_pos > 2 * width_neg {
            push_diagnostic(diagnostics, Diagnostic::InversionUndone);
            return false;
        }
    }
    true
}

fn run_length(response: &[f64], start: usize, holds: impl Fn(f64) -> bool) -> usize {
    response[start..].iter().take_while(|&&r| holds(r)).count()
}

fn max_to_std_ratio(response: &[f64], sampling_rate: usize) -> f64 {
    let head = &response[..response.len().min(sampling_rate * NOISE_MAX_WINDOW_SECONDS)];
    let baseline = &response[..response.len().min(sampling_rate * NOISE_STD_WINDOW_SECONDS)];

    let peak = head.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mean = baseline.iter().sum::<f64>() / baseline.len() as f64;
    let std_dev = (baseline.iter().map(|r| (r - mean).powi(2)).sum::<f64>()
        / baseline.len() as f64)
        .sqrt();

    if std_dev == 0.0 {
        f64::INFINITY
    } else {
        peak / std_dev
    }
}

fn window(channel: &[f64], index: usize) -> &[f64] {
    let from = index.saturating_sub(AMPLITUDE_HALF_WINDOW);
    let to = (index + AMPLITUDE_HALF_WINDOW).min(channel.len());
    &channel[from..to.max(from)]
}

// True stimulation artefacts share a stable amplitude and the expected polarity.
fn filter_by_amplitude(channel: &[f64], candidates: Vec<usize>, inverted: bool) -> Vec<usize> {
    if candidates.is_empty() {
        return candidates;
    }

    let heights: Vec<f64> = candidates
        .iter()
        .map(|&i| window(channel, i).iter().fold(0.0, |m: f64, s| m.max(s.abs())))
        .collect();
    let median_height = median(&heights);

    candidates
        .into_iter()
        .zip(heights)
        .filter(|&(index, height)| {
            let consistent = (height - median_height).abs() < median_height * AMPLITUDE_TOLERANCE;
            if !consistent {
                tracing::debug!(index, height, median_height, "dropped: amplitude outlier");
            }
            consistent
        })
        .filter(|&(index, _)| {
            let snippet = window(channel, index);
            let polar = if inverted {
                snippet.iter().copied().fold(f64::NEG_INFINITY, f64::max)
                    > median_height * POLARITY_FRACTION
            } else {
                snippet.iter().copied().fold(f64::INFINITY, f64::min)
                    < -median_height * POLARITY_FRACTION
            };
            if !polar {
                tracing::debug!(index, "dropped: wrong polarity");
            }
            polar
        })
        .map(|(index, _)| index)
        .collect()
}

pub(crate) fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let n = sorted.len();
    if n == 0 {
        f64::NAN
    } else if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}
