use assert_approx_eq::assert_approx_eq;
use stim_resync::processing::simulation::{simulate_session, SimulationConfig};
use stim_resync::processing::timing::index_to_time;
use stim_resync::{
    analyze_timeshift, crop_recordings, run_resync, ArtefactDetector, ExternalDetector,
    ExternalDetectorConfig, HighPassFilterConfig, Kernel, LfpDetectorConfig,
    MultiChannelRecording, ResyncConfig, TimeshiftConfig, TimeshiftOutcome,
};

fn ramp_recording(seconds: usize, sampling_rate: u32, names: &[&str]) -> MultiChannelRecording {
    let samples = seconds * sampling_rate as usize;
    let data = names
        .iter()
        .map(|_| (0..samples).map(|i| i as f64).collect())
        .collect();
    MultiChannelRecording::new(
        data,
        sampling_rate,
        names.iter().map(|n| n.to_string()).collect(),
    )
    .unwrap()
}

fn resync_config() -> ResyncConfig {
    ResyncConfig {
        external_channel_name: Some("bip 01".to_string()),
        lfp_detector: LfpDetectorConfig {
            kernel: Kernel::StepRecovery,
            consider_first_seconds: None,
        },
        ..Default::default()
    }
}

#[test]
fn v_shaped_dip_is_found_at_its_minimum() {
    let mut channel = vec![0.0; 10_000];
    for (i, v) in (4000..4006).zip([-0.01, -0.008, -0.006, -0.004, -0.002, -0.001]) {
        channel[i] = v;
    }
    channel[3999] = -0.004;
    channel[3998] = -0.002;

    let detection = ExternalDetector::new(ExternalDetectorConfig::default())
        .detect(&channel, 2000)
        .unwrap();
    assert_eq!(detection.indices, vec![4000]);
    assert_eq!(index_to_time(&detection.indices, 2000), vec![2.0]);
}

#[test]
fn crop_gives_equal_durations_one_second_before_artefacts() {
    let lfp = ramp_recording(30, 250, &["LFP_L_03", "LFP_R_03"]);
    let external = ramp_recording(30, 4000, &["EMG 1", "BIP 01", "ACC X"]);

    let aligned = crop_recordings(&lfp, &external, &[10.0], &[10.2], None).unwrap();

    assert_approx_eq!(
        aligned.lfp.duration_seconds(),
        aligned.external.duration_seconds(),
        1.0 / 250.0
    );
    // Ramp values are original sample indices.
    assert_approx_eq!(aligned.lfp.rows()[0][0] / 250.0, 9.0, 1.0 / 250.0);
    assert_approx_eq!(aligned.external.rows()[1][0] / 4000.0, 9.2, 1.0 / 4000.0);
    assert_eq!(aligned.external.channel_names(), external.channel_names());
}

#[test]
fn simulated_session_is_aligned_and_consistent() {
    let session = simulate_session(&SimulationConfig::default()).unwrap();
    let outcome = run_resync(&session.lfp, &session.external, &resync_config()).unwrap();
    assert_eq!(outcome.external_channel_index, 1);

    let timeshift = analyze_timeshift(
        &outcome.aligned.lfp,
        &outcome.aligned.external,
        &TimeshiftConfig {
            lfp_channel_index: 0,
            external_channel_index: outcome.external_channel_index,
            kernel: Kernel::StepRecovery,
            external_threshold: -0.001,
            filter: HighPassFilterConfig::default(),
            curated_lfp: vec![0, 1, 2, 3],
            curated_external: vec![0, 1, 2, 3],
        },
    )
    .unwrap();

    match timeshift {
        TimeshiftOutcome::Consistent(report) => {
            assert_eq!(report.delays.len(), 4);
            assert_approx_eq!(report.delays[0].lfp_time, 1.0, 1.0 / 250.0);
            assert_approx_eq!(report.delays[0].external_time, 1.0, 1.0 / 4000.0);
            assert!(report.timeshift_ms.abs() <= 4.0);
        }
        TimeshiftOutcome::LargeDelay(report) => {
            panic!("unexpected large delay: {:?}", report.delays)
        }
    }
}

#[test]
fn manual_correction_moves_the_intracerebral_crop_point() {
    let session = simulate_session(&SimulationConfig::default()).unwrap();
    let config = ResyncConfig {
        manual_lfp_correction: Some(10.4),
        ..resync_config()
    };
    let outcome = run_resync(&session.lfp, &session.external, &config).unwrap();

    assert_eq!(outcome.aligned.lfp_start_index, 2350);
    assert_eq!(outcome.aligned.external_start_index, 36800);
}

#[test]
fn unequal_curation_fails_before_any_delay() {
    let session = simulate_session(&SimulationConfig::default()).unwrap();
    let outcome = run_resync(&session.lfp, &session.external, &resync_config()).unwrap();

    let result = analyze_timeshift(
        &outcome.aligned.lfp,
        &outcome.aligned.external,
        &TimeshiftConfig {
            lfp_channel_index: 0,
            external_channel_index: 1,
            kernel: Kernel::StepRecovery,
            external_threshold: -0.001,
            filter: HighPassFilterConfig::default(),
            curated_lfp: vec![0, 1, 2],
            curated_external: vec![0, 1],
        },
    );
    assert!(matches!(
        result,
        Err(stim_resync::ResyncError::CuratedLengthMismatch {
            lfp: 3,
            external: 2,
            ..
        })
    ));
}
