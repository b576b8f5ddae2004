use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use stim_resync::config::{load_config, save_config, store_external_channel_index, Config};
use stim_resync::local::process_file::{run_resync_files, run_timeshift_files, save_recording_csv};
use stim_resync::processing::packet_loss::check_session_file;
use stim_resync::processing::simulation::{simulate_session, SimulationConfig};
use stim_resync::processing::timeshift::TimeshiftOutcome;
use stim_resync::{Diagnostic, Kernel, Result};

#[derive(Parser, Debug)]
#[command(
    name = "resync",
    version,
    about = "Align intracerebral LFP and external recordings on their stimulation artefacts"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Detect the first artefact in both recordings and save the aligned pair
    Resync {
        /// YAML or JSON session config
        #[arg(long)]
        config: PathBuf,
        /// Intracerebral recording, one column per channel
        #[arg(long)]
        lfp: PathBuf,
        /// External recording, one column per channel
        #[arg(long)]
        external: PathBuf,
        /// Output folder, overrides saving_path
        #[arg(long)]
        output: Option<PathBuf>,
        /// Hand-picked time (s) of the first intracerebral artefact
        #[arg(long)]
        manual_lfp_correction: Option<f64>,
        /// Store the selected external channel index in the config file.
        /// Other settings in the file, including the manual correction, are left as stored.
        #[arg(long)]
        write_back: bool,
    },
    /// Measure the residual delay between the curated artefacts of an aligned pair
    Timeshift {
        #[arg(long)]
        config: PathBuf,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Look for lost packets in a JSON session report
    PacketLoss {
        #[arg(long)]
        report: PathBuf,
    },
    /// Write a synthetic session and a matching config file
    Simulate {
        #[arg(long)]
        output: PathBuf,
        #[arg(long, default_value = "sim")]
        subject: String,
        #[arg(long, default_value_t = 7)]
        seed: u64,
        /// Fractional rate error of the external clock
        #[arg(long, default_value_t = 0.0)]
        clock_drift: f64,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match run(cli.command) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{} {}", "Error:".red().bold(), err);
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command) -> Result<ExitCode> {
    match command {
        Command::Resync {
            config,
            lfp,
            external,
            output,
            manual_lfp_correction,
            write_back,
        } => resync(&config, &lfp, &external, output.as_deref(), manual_lfp_correction, write_back),
        Command::Timeshift { config, output } => timeshift(&config, output.as_deref()),
        Command::PacketLoss { report } => packet_loss(&report),
        Command::Simulate {
            output,
            subject,
            seed,
            clock_drift,
        } => simulate(&output, &subject, seed, clock_drift),
    }
}

fn print_diagnostics<'a>(diagnostics: impl IntoIterator<Item = &'a Diagnostic>) {
    for diagnostic in diagnostics {
        println!("  {} {:?}", "warning:".yellow(), diagnostic);
    }
}

fn resync(
    config_path: &Path,
    lfp: &Path,
    external: &Path,
    output: Option<&Path>,
    manual_lfp_correction: Option<f64>,
    write_back: bool,
) -> Result<ExitCode> {
    let mut config = load_config(config_path)?;
    if manual_lfp_correction.is_some() {
        config.real_art_time_lfp = manual_lfp_correction;
    }

    let run = run_resync_files(&config, lfp, external, output)?;
    let outcome = &run.outcome;

    println!("{}", "Alignment done!".green().bold());
    println!(
        "  first artefacts: {:.4}s intracerebral, {:.4}s external",
        outcome.lfp_detection.times(config.sf_lfp)[0],
        outcome.external_detection.times(config.sf_external)[0]
    );
    println!(
        "  aligned duration: {:.3}s",
        outcome.aligned.duration_seconds()
    );
    println!("  {}", run.lfp_path.display());
    println!("  {}", run.external_path.display());
    print_diagnostics(&outcome.diagnostics);

    if write_back {
        store_external_channel_index(config_path, outcome.external_channel_index)?;
        println!(
            "  external_ch_index = {} written to {}",
            outcome.external_channel_index,
            config_path.display()
        );
    }
    Ok(ExitCode::SUCCESS)
}

fn timeshift(config_path: &Path, output: Option<&Path>) -> Result<ExitCode> {
    let config = load_config(config_path)?;
    let outcome = run_timeshift_files(&config, output)?;
    let report = outcome.report();

    for (i, delay) in report.delays.iter().enumerate() {
        println!(
            "  artefact {}: {:.3}s intracerebral, {:.3}s external, delay {:.2}ms",
            i + 1,
            delay.lfp_time,
            delay.external_time,
            delay.delay_ms
        );
    }
    print_diagnostics(report.diagnostics());

    let code = match &outcome {
        TimeshiftOutcome::Consistent(report) => {
            println!("{}", "Timeshift analysis performed!".green().bold());
            println!(
                "  {:.2}ms delay at the last artefact, after a recording duration of {:.3}s (mean {:.2}ms)",
                report.timeshift_ms, report.last_artefact_time, report.mean_delay_ms
            );
            ExitCode::SUCCESS
        }
        TimeshiftOutcome::LargeDelay(report) => {
            println!(
                "{}",
                format!(
                    "The mean timeshift is very high: {:.2}ms. The selected artefacts might not be correct, or the recording contains packet loss.",
                    report.mean_delay_ms
                )
                .yellow()
                .bold()
            );
            println!(
                "  {} artefacts detected intracerebrally, {} externally; current timeshift {:.2}ms",
                report.lfp_detection.len(),
                report.external_detection.len(),
                report.timeshift_ms
            );
            ExitCode::from(2)
        }
    };
    Ok(code)
}

fn packet_loss(report: &Path) -> Result<ExitCode> {
    let reports = check_session_file(report)?;
    let mut missing = false;
    for streaming in &reports {
        let channel = streaming.channel.as_deref().unwrap_or("unknown channel");
        if streaming.data_is_missing() {
            missing = true;
            println!(
                "  {} {}: LFP data is missing ({} irregular packet intervals)",
                streaming.streaming,
                channel,
                streaming.gaps.len()
            );
            for gap in &streaming.gaps {
                println!("      packet {}: {}ms", gap.packet, gap.interval_ms);
            }
        } else {
            println!("  {} {}: {}", streaming.streaming, channel, "no packet lost".green());
        }
    }
    Ok(if missing {
        println!("{}", "Packet loss found".red().bold());
        ExitCode::from(2)
    } else {
        ExitCode::SUCCESS
    })
}

fn simulate(output: &Path, subject: &str, seed: u64, clock_drift: f64) -> Result<ExitCode> {
    let simulation = SimulationConfig {
        seed,
        clock_drift,
        ..Default::default()
    };
    let session = simulate_session(&simulation)?;
    std::fs::create_dir_all(output)?;

    let lfp_path = output.join(format!("{}_lfp_raw.csv", subject));
    let external_path = output.join(format!("{}_external_raw.csv", subject));
    save_recording_csv(&session.lfp, &lfp_path)?;
    save_recording_csv(&session.external, &external_path)?;

    let config = Config {
        subject_id: subject.to_string(),
        saving_path: Some(output.join("results")),
        sf_lfp: simulation.sampling_rate_lfp,
        sf_external: simulation.sampling_rate_external,
        thresh_external: None,
        kernel: Kernel::StepRecovery,
        ignore_first_seconds_external: None,
        consider_first_seconds_external: None,
        consider_first_seconds_lfp: None,
        lfp_ch_index: 0,
        external_ch_index: None,
        ch_name_external: Some("BIP 01".to_string()),
        external_hardware: None,
        real_art_time_lfp: None,
        highpass_cutoff: 0.05,
        remove_clipping: true,
        index_real_artefacts_lfp: (0..simulation.artefact_times.len()).collect(),
        index_real_artefacts_external: (0..simulation.artefact_times.len()).collect(),
    };
    let config_path = output.join("config.yaml");
    save_config(&config, &config_path)?;

    println!("{}", "Simulated session written".green().bold());
    println!("  {}", lfp_path.display());
    println!("  {}", external_path.display());
    println!("  {}", config_path.display());
    Ok(ExitCode::SUCCESS)
}
