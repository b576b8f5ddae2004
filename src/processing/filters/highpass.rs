use crate::error::{ResyncError, Result};
use serde::{Deserialize, Serialize};

// Odd-extension length used on each side before forward-backward filtering.
const PAD_LENGTH: usize = 6;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct HighPassFilterConfig {
    /// Cutoff as a fraction of the Nyquist frequency.
    pub cutoff: f64,
    /// Clamp everything above the channel mean to the mean before filtering.
    pub remove_clipping: bool,
}

impl Default for HighPassFilterConfig {
    fn default() -> Self {
        Self {
            cutoff: 0.05,
            remove_clipping: true,
        }
    }
}

/// First-order Butterworth section, bilinear transform of s / (s + wc).
#[derive(Debug, Clone)]
struct FirstOrderFilter {
    a: [f64; 2],
    b: [f64; 2],
    x: f64,
    y: f64,
}

impl FirstOrderFilter {
    fn high_pass(cutoff: f64) -> Self {
        let k = (std::f64::consts::PI * cutoff / 2.0).tan();
        let b0 = 1.0 / (1.0 + k);
        FirstOrderFilter {
            a: [1.0, (k - 1.0) / (k + 1.0)],
            b: [b0, -b0],
            x: 0.0,
            y: 0.0,
        }
    }

    // Steady state for a constant input, so the edges do not ring.
    fn prime(&mut self, input: f64) {
        let dc_gain = (self.b[0] + self.b[1]) / (self.a[0] + self.a[1]);
        self.x = input;
        self.y = dc_gain * input;
    }

    fn calculate_output(&mut self, input: f64) -> f64 {
        let output = (self.b[0] / self.a[0]) * input + (self.b[1] / self.a[0]) * self.x
            - (self.a[1] / self.a[0]) * self.y;

        self.x = input;
        self.y = output;

        output
    }

    fn run(&mut self, signal: &[f64]) -> Vec<f64> {
        let Some(&first) = signal.first() else {
            return Vec::new();
        };
        self.prime(first);
        signal.iter().map(|&s| self.calculate_output(s)).collect()
    }
}

pub struct HighPassFilter {
    config: HighPassFilterConfig,
    section: FirstOrderFilter,
}

impl HighPassFilter {
    pub fn new(config: HighPassFilterConfig) -> Result<Self> {
        if !(config.cutoff > 0.0 && config.cutoff < 1.0) {
            return Err(ResyncError::InvalidConfig(format!(
                "high-pass cutoff must lie strictly between 0 and 1 (fraction of Nyquist), got {}",
                config.cutoff
            )));
        }
        let section = FirstOrderFilter::high_pass(config.cutoff);
        Ok(Self { config, section })
    }

    /// Detrends the external reference channel. The input is left untouched.
    pub fn apply(&self, channel: &[f64]) -> Vec<f64> {
        let cleaned = if self.config.remove_clipping {
            remove_clipping(channel)
        } else {
            channel.to_vec()
        };
        self.filtfilt(&cleaned)
    }

    /// Zero-phase filtering: forward pass, backward pass, padded with an odd extension.
    pub fn filtfilt(&self, signal: &[f64]) -> Vec<f64> {
        let n = signal.len();
        if n < 2 {
            return signal.to_vec();
        }
        let pad = PAD_LENGTH.min(n - 1);
        let head = signal[0];
        let tail = signal[n - 1];

        let mut extended = Vec::with_capacity(n + 2 * pad);
        extended.extend((1..=pad).rev().map(|i| 2.0 * head - signal[i]));
        extended.extend_from_slice(signal);
        extended.extend((1..=pad).map(|i| 2.0 * tail - signal[n - 1 - i]));

        let mut forward = self.section.clone().run(&extended);
        forward.reverse();
        let mut backward = self.section.clone().run(&forward);
        backward.reverse();

        backward[pad..pad + n].to_vec()
    }
}

/// Replaces every sample above the channel mean by the mean (amplifier saturation clean-up).
pub fn remove_clipping(signal: &[f64]) -> Vec<f64> {
    if signal.is_empty() {
        return Vec::new();
    }
    let mean = signal.iter().sum::<f64>() / signal.len() as f64;
    signal.iter().map(|&s| if s > mean { mean } else { s }).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn filter(remove_clipping: bool) -> HighPassFilter {
        HighPassFilter::new(HighPassFilterConfig {
            cutoff: 0.05,
            remove_clipping,
        })
        .unwrap()
    }

    #[test]
    fn rejects_cutoff_outside_unit_interval() {
        for cutoff in [0.0, 1.0, -0.2, 3.0] {
            let config = HighPassFilterConfig {
                cutoff,
                remove_clipping: false,
            };
            assert!(HighPassFilter::new(config).is_err());
        }
    }

    #[test]
    fn removes_constant_offset() {
        let signal = vec![5.0; 400];
        let filtered = filter(false).filtfilt(&signal);
        assert_eq!(filtered.len(), signal.len());
        for value in filtered {
            assert_approx_eq!(value, 0.0, 1e-9);
        }
    }

    #[test]
    fn removes_slow_drift_but_keeps_sharp_dips() {
        let mut signal: Vec<f64> = (0..2000).map(|i| 1.0 + i as f64 * 1e-3).collect();
        signal[1000] -= 1.0;
        let filtered = filter(false).filtfilt(&signal);
        assert!(filtered[1500].abs() < 0.05);
        assert!(filtered[1000] < -0.5);
    }

    #[test]
    fn clipping_removal_clamps_to_mean() {
        let cleaned = remove_clipping(&[0.0, 4.0, -2.0, 2.0]);
        assert_eq!(cleaned, vec![0.0, 1.0, -2.0, 1.0]);
    }

    #[test]
    fn apply_does_not_mutate_input() {
        let signal: Vec<f64> = (0..100).map(|i| (i as f64 * 0.3).sin()).collect();
        let copy = signal.clone();
        let _ = filter(true).apply(&signal);
        assert_eq!(signal, copy);
    }

    #[test]
    fn short_signals_pass_through() {
        assert_eq!(filter(false).filtfilt(&[1.5]), vec![1.5]);
        assert!(filter(false).filtfilt(&[]).is_empty());
    }
}
