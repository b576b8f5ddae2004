use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::detectors::Kernel;
use crate::error::{ResyncError, Result};
use crate::recording::MultiChannelRecording;

// SIMULATING DATA -------------------------------------------------------------

pub const LFP_CHANNEL_NAMES: [&str; 2] = ["LFP_L_03", "LFP_R_03"];
pub const EXTERNAL_CHANNEL_NAMES: [&str; 2] = ["EMG 1", "BIP 01"];

// Right hemisphere picks up a weaker copy of each artefact.
const RIGHT_HEMISPHERE_GAIN: f64 = 0.8;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SimulationConfig {
    pub sampling_rate_lfp: u32,
    pub sampling_rate_external: u32,
    pub duration_seconds: f64,
    /// Stimulation onsets on the intracerebral clock, seconds.
    pub artefact_times: Vec<f64>,
    /// The external device started recording this much earlier.
    pub external_offset_seconds: f64,
    /// Fractional rate error of the external clock.
    pub clock_drift: f64,
    pub kernel: Kernel,
    pub lfp_amplitude: f64,
    pub lfp_noise: f64,
    pub pulse_amplitude: f64,
    pub pulse_period_samples: usize,
    pub train_seconds: f64,
    pub external_noise: f64,
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            sampling_rate_lfp: 250,
            sampling_rate_external: 4000,
            duration_seconds: 30.0,
            artefact_times: vec![10.0, 14.0, 18.0, 22.0],
            external_offset_seconds: 0.2,
            clock_drift: 0.0,
            kernel: Kernel::StepRecovery,
            lfp_amplitude: 50.0,
            lfp_noise: 0.1,
            pulse_amplitude: 0.05,
            pulse_period_samples: 30,
            train_seconds: 1.0,
            external_noise: 0.0002,
            seed: 7,
        }
    }
}

/// A synthetic pair of recordings with known artefact positions.
#[derive(Debug, Clone)]
pub struct SimulatedSession {
    pub lfp: MultiChannelRecording,
    pub external: MultiChannelRecording,
    /// Exact sample times of the embedded artefacts.
    pub lfp_artefact_times: Vec<f64>,
    pub external_artefact_times: Vec<f64>,
}

/// Builds an intracerebral recording with kernel-shaped artefacts and an external
/// recording with a stimulation pulse train at the matching time on its own clock.
pub fn simulate_session(config: &SimulationConfig) -> Result<SimulatedSession> {
    if config.sampling_rate_lfp == 0 || config.sampling_rate_external == 0 {
        return Err(ResyncError::InvalidConfig(
            "simulated sampling rates must be positive".to_string(),
        ));
    }
    if config.pulse_period_samples == 0 {
        return Err(ResyncError::InvalidConfig(
            "pulse_period_samples must be positive".to_string(),
        ));
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let sf_lfp = config.sampling_rate_lfp as f64;
    let sf_external = config.sampling_rate_external as f64;
    let lfp_len = (config.duration_seconds * sf_lfp).round() as usize;
    let external_len = (config.duration_seconds * sf_external).round() as usize;

    let mut lfp: Vec<Vec<f64>> = (0..LFP_CHANNEL_NAMES.len())
        .map(|_| noise(&mut rng, lfp_len, config.lfp_noise))
        .collect();
    let mut external: Vec<Vec<f64>> = (0..EXTERNAL_CHANNEL_NAMES.len())
        .map(|_| noise(&mut rng, external_len, config.external_noise))
        .collect();

    let taps = config.kernel.taps();
    let train_len = (config.train_seconds * sf_external).round() as usize;
    let mut lfp_artefact_times = Vec::with_capacity(config.artefact_times.len());
    let mut external_artefact_times = Vec::with_capacity(config.artefact_times.len());

    for &time in &config.artefact_times {
        let onset = (time * sf_lfp).round() as usize;
        if onset + taps.len() > lfp_len {
            return Err(ResyncError::InvalidConfig(format!(
                "artefact at {}s does not fit in a {}s recording",
                time, config.duration_seconds
            )));
        }
        for (j, tap) in taps.iter().enumerate() {
            lfp[0][onset + j] += config.lfp_amplitude * tap;
            lfp[1][onset + j] += RIGHT_HEMISPHERE_GAIN * config.lfp_amplitude * tap;
        }
        lfp_artefact_times.push(onset as f64 / sf_lfp);

        let external_time = config.external_offset_seconds + time * (1.0 + config.clock_drift);
        let first_pulse = (external_time * sf_external).round() as usize;
        if first_pulse + train_len > external_len {
            return Err(ResyncError::InvalidConfig(format!(
                "stimulation train at {}s does not fit in the external recording",
                external_time
            )));
        }
        for pulse in (first_pulse..first_pulse + train_len).step_by(config.pulse_period_samples) {
            external[1][pulse] -= config.pulse_amplitude;
        }
        external_artefact_times.push(first_pulse as f64 / sf_external);
    }

    tracing::debug!(
        artefacts = config.artefact_times.len(),
        seed = config.seed,
        "simulated session generated"
    );

    Ok(SimulatedSession {
        lfp: MultiChannelRecording::new(
            lfp,
            config.sampling_rate_lfp,
            LFP_CHANNEL_NAMES.iter().map(|s| s.to_string()).collect(),
        )?,
        external: MultiChannelRecording::new(
            external,
            config.sampling_rate_external,
            EXTERNAL_CHANNEL_NAMES.iter().map(|s| s.to_string()).collect(),
        )?,
        lfp_artefact_times,
        external_artefact_times,
    })
}

fn noise(rng: &mut StdRng, len: usize, amplitude: f64) -> Vec<f64> {
    if amplitude > 0.0 {
        (0..len).map(|_| rng.gen_range(-amplitude..amplitude)).collect()
    } else {
        vec![0.0; len]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_session_shape() {
        let session = simulate_session(&SimulationConfig::default()).unwrap();
        assert_eq!(session.lfp.sample_count(), 7500);
        assert_eq!(session.external.sample_count(), 120_000);
        assert_eq!(session.lfp.channel_names(), &LFP_CHANNEL_NAMES);
        assert_eq!(session.external.channel_names(), &EXTERNAL_CHANNEL_NAMES);
        assert_eq!(session.lfp_artefact_times, vec![10.0, 14.0, 18.0, 22.0]);
        assert_eq!(session.external_artefact_times[0], 10.2);
    }

    #[test]
    fn same_seed_same_session() {
        let a = simulate_session(&SimulationConfig::default()).unwrap();
        let b = simulate_session(&SimulationConfig::default()).unwrap();
        assert_eq!(a.lfp, b.lfp);
        assert_eq!(a.external, b.external);
    }

    #[test]
    fn drift_stretches_external_times() {
        let config = SimulationConfig {
            clock_drift: 0.001,
            ..Default::default()
        };
        let session = simulate_session(&config).unwrap();
        let first = session.external_artefact_times[0];
        let last = session.external_artefact_times[3];
        assert!((last - first - 12.012).abs() < 1e-9);
    }

    #[test]
    fn artefacts_must_fit() {
        let config = SimulationConfig {
            artefact_times: vec![29.99],
            ..Default::default()
        };
        assert!(simulate_session(&config).is_err());
    }
}
