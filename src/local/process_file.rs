use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::Config;
use crate::error::{ResyncError, Result};
use crate::processing::crop::AlignedPair;
use crate::processing::resync::{run_resync, ResyncOutcome};
use crate::processing::timeshift::{analyze_timeshift, TimeshiftOutcome};
use crate::recording::MultiChannelRecording;
use crate::utils::log::{log_csv, log_with_header};

pub const RUN_LOG: &str = "resync.log";
pub const DELAY_REPORT: &str = "timeshift_delays.csv";

pub fn lfp_filename(subject_id: &str, sampling_rate: u32) -> String {
    format!("Intracerebral_LFP_{}_{}Hz.csv", subject_id, sampling_rate)
}

pub fn external_filename(subject_id: &str, sampling_rate: u32) -> String {
    format!("External_data_{}_{}Hz.csv", subject_id, sampling_rate)
}

/// Reads a CSV with one column per channel, channel names in the header and one
/// row per sample.
pub fn load_recording_csv<P: AsRef<Path>>(path: P, sampling_rate: u32) -> Result<MultiChannelRecording> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ResyncError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("data file not found at path: {}", path.display()),
        )));
    }

    let mut reader = csv::Reader::from_path(path)?;
    let channel_names: Vec<String> = reader.headers()?.iter().map(|h| h.trim().to_string()).collect();
    let mut data = vec![Vec::new(); channel_names.len()];

    for (row, record) in reader.records().enumerate() {
        let record = record?;
        for (channel, field) in record.iter().enumerate() {
            let value = field.trim().parse::<f64>().map_err(|_| {
                ResyncError::InvalidRecording(format!(
                    "{}: row {} column {} holds '{}', which is not a number",
                    path.display(),
                    row + 1,
                    channel + 1,
                    field
                ))
            })?;
            data[channel].push(value);
        }
    }

    tracing::debug!(
        path = %path.display(),
        channels = channel_names.len(),
        samples = data.first().map_or(0, Vec::len),
        "recording loaded"
    );
    MultiChannelRecording::new(data, sampling_rate, channel_names)
}

pub fn save_recording_csv<P: AsRef<Path>>(recording: &MultiChannelRecording, path: P) -> Result<()> {
    let mut writer = csv::Writer::from_path(path.as_ref())?;
    writer.write_record(recording.channel_names())?;
    let rows = recording.rows();
    for sample in 0..recording.sample_count() {
        writer.write_record(rows.iter().map(|channel| channel[sample].to_string()))?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes both aligned recordings into `output_dir` and returns their paths.
pub fn save_aligned(
    aligned: &AlignedPair,
    subject_id: &str,
    output_dir: &Path,
) -> Result<(PathBuf, PathBuf)> {
    fs::create_dir_all(output_dir)?;
    let lfp_path = output_dir.join(lfp_filename(subject_id, aligned.lfp.sampling_rate()));
    let external_path =
        output_dir.join(external_filename(subject_id, aligned.external.sampling_rate()));
    save_recording_csv(&aligned.lfp, &lfp_path)?;
    save_recording_csv(&aligned.external, &external_path)?;
    Ok((lfp_path, external_path))
}

/// Loads the aligned pair written by a previous resync run.
pub fn load_aligned(
    config: &Config,
    output_dir: &Path,
) -> Result<(MultiChannelRecording, MultiChannelRecording)> {
    let lfp = load_recording_csv(
        output_dir.join(lfp_filename(&config.subject_id, config.sf_lfp)),
        config.sf_lfp,
    )?;
    let external = load_recording_csv(
        output_dir.join(external_filename(&config.subject_id, config.sf_external)),
        config.sf_external,
    )?;
    Ok((lfp, external))
}

#[derive(Debug)]
pub struct ResyncRun {
    pub outcome: ResyncOutcome,
    pub output_dir: PathBuf,
    pub lfp_path: PathBuf,
    pub external_path: PathBuf,
}

pub fn run_resync_files(
    config: &Config,
    lfp_path: &Path,
    external_path: &Path,
    output_dir: Option<&Path>,
) -> Result<ResyncRun> {
    let output_dir = config.output_directory(output_dir)?;
    let start_time = Instant::now();

    let lfp = load_recording_csv(lfp_path, config.sf_lfp)?;
    let external = load_recording_csv(external_path, config.sf_external)?;
    let outcome = run_resync(&lfp, &external, &config.resync_config())?;
    let (lfp_out, external_out) = save_aligned(&outcome.aligned, &config.subject_id, &output_dir)?;

    tracing::info!(
        subject = %config.subject_id,
        duration = ?start_time.elapsed(),
        output = %output_dir.display(),
        "alignment saved"
    );

    let message = format!(
        "intracerebral: {}\nexternal: {}\nexternal reference channel: {} ({})\nfirst artefacts: {:.4}s / {:.4}s\naligned duration: {:.4}s\ndiagnostics: {:?}",
        lfp_path.display(),
        external_path.display(),
        external.channel_names()[outcome.external_channel_index],
        outcome.external_channel_index,
        outcome.lfp_detection.times(config.sf_lfp)[0],
        outcome.external_detection.times(config.sf_external)[0],
        outcome.aligned.duration_seconds(),
        outcome.diagnostics,
    );
    log_with_header(&output_dir, RUN_LOG, &format!("resync {}", config.subject_id), &message)?;

    Ok(ResyncRun {
        outcome,
        output_dir,
        lfp_path: lfp_out,
        external_path: external_out,
    })
}

pub fn run_timeshift_files(config: &Config, output_dir: Option<&Path>) -> Result<TimeshiftOutcome> {
    let output_dir = config.output_directory(output_dir)?;
    let timeshift_config = config.timeshift_config()?;
    let (lfp, external) = load_aligned(config, &output_dir)?;

    let outcome = analyze_timeshift(&lfp, &external, &timeshift_config)?;
    let report = outcome.report();

    let rows: Vec<Vec<String>> = report
        .delays
        .iter()
        .zip(timeshift_config.curated_lfp.iter().zip(&timeshift_config.curated_external))
        .map(|(delay, (lfp_index, external_index))| {
            vec![
                config.subject_id.clone(),
                lfp_index.to_string(),
                external_index.to_string(),
                delay.lfp_time.to_string(),
                delay.external_time.to_string(),
                delay.delay_ms.to_string(),
            ]
        })
        .collect();
    log_csv(
        &output_dir,
        DELAY_REPORT,
        &[
            "subject_id",
            "lfp_artefact",
            "external_artefact",
            "lfp_time_s",
            "external_time_s",
            "delay_ms",
        ],
        &rows,
    )?;

    let status = if outcome.is_consistent() {
        "consistent"
    } else {
        "large delay"
    };
    let message = format!(
        "status: {}\nmean delay: {:.3}ms\ntimeshift at last artefact: {:.3}ms after {:.3}s",
        status, report.mean_delay_ms, report.timeshift_ms, report.last_artefact_time
    );
    log_with_header(&output_dir, RUN_LOG, &format!("timeshift {}", config.subject_id), &message)?;

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filenames_encode_subject_and_rate() {
        assert_eq!(lfp_filename("024", 250), "Intracerebral_LFP_024_250Hz.csv");
        assert_eq!(external_filename("024", 4000), "External_data_024_4000Hz.csv");
    }

    #[test]
    fn csv_layout_has_no_index_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rec.csv");
        let recording = MultiChannelRecording::new(
            vec![vec![1.0, 2.0], vec![-0.5, 0.25]],
            250,
            vec!["LFP_L".to_string(), "LFP_R".to_string()],
        )
        .unwrap();

        save_recording_csv(&recording, &path).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text, "LFP_L,LFP_R\n1,-0.5\n2,0.25\n");

        let loaded = load_recording_csv(&path, 250).unwrap();
        assert_eq!(loaded, recording);
    }

    #[test]
    fn non_numeric_cells_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        fs::write(&path, "a,b\n1,x\n").unwrap();
        assert!(matches!(
            load_recording_csv(&path, 250),
            Err(ResyncError::InvalidRecording(_))
        ));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        assert!(matches!(
            load_recording_csv("/nonexistent/file.csv", 250),
            Err(ResyncError::Io(_))
        ));
    }
}
