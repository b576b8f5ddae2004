//! Packet-loss check for intracerebral streamings exported in a session report.
//!
//! The implant sends one packet every 250 ms and stamps it with a millisecond tick
//! counter; any other spacing between consecutive ticks means packets were lost.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ResyncError, Result};

pub const PACKET_INTERVAL_MS: f64 = 250.0;

#[derive(Debug, Deserialize)]
struct SessionReport {
    #[serde(rename = "BrainSenseTimeDomain")]
    streamings: Option<Vec<Streaming>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Streaming {
    ticks_in_mses: String,
    #[serde(default)]
    global_packet_sizes: Option<String>,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    time_domain_data: Vec<f64>,
}

/// Jump between two consecutive packet ticks that is not one packet interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TickGap {
    /// Position of the packet after the gap.
    pub packet: usize,
    pub interval_ms: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PacketReport {
    /// Position of the streaming in the session report.
    pub streaming: usize,
    pub channel: Option<String>,
    pub packet_count: usize,
    /// Sum of the declared packet sizes, when the report carries them.
    pub declared_samples: Option<usize>,
    pub sample_count: usize,
    pub gaps: Vec<TickGap>,
}

impl PacketReport {
    pub fn data_is_missing(&self) -> bool {
        !self.gaps.is_empty()
    }
}

/// Parses a comma separated list of numbers, tolerating one trailing comma.
pub fn parse_number_list(list: &str) -> Result<Vec<f64>> {
    let trimmed = list.trim();
    let trimmed = trimmed.strip_suffix(',').unwrap_or(trimmed);
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    trimmed
        .split(',')
        .map(|value| {
            value.trim().parse::<f64>().map_err(|_| {
                ResyncError::InvalidPacketReport(format!("'{}' is not a number", value.trim()))
            })
        })
        .collect()
}

/// Every consecutive tick difference that differs from the packet interval.
pub fn find_tick_gaps(ticks_ms: &[f64]) -> Vec<TickGap> {
    ticks_ms
        .windows(2)
        .enumerate()
        .filter_map(|(i, pair)| {
            let interval_ms = pair[1] - pair[0];
            ((interval_ms - PACKET_INTERVAL_MS).abs() > 1e-9).then_some(TickGap {
                packet: i + 1,
                interval_ms,
            })
        })
        .collect()
}

/// Checks every `BrainSenseTimeDomain` streaming of a JSON session report.
pub fn check_session_report(json: &str) -> Result<Vec<PacketReport>> {
    let report: SessionReport = serde_json::from_str(json)?;
    let streamings = report.streamings.ok_or_else(|| {
        ResyncError::InvalidPacketReport(
            "the session report has no BrainSenseTimeDomain streaming".to_string(),
        )
    })?;

    streamings
        .iter()
        .enumerate()
        .map(|(index, streaming)| check_streaming(index, streaming))
        .collect()
}

pub fn check_session_file(path: impl AsRef<Path>) -> Result<Vec<PacketReport>> {
    let path = path.as_ref();
    if path.extension().and_then(|e| e.to_str()) != Some("json") {
        return Err(ResyncError::InvalidPacketReport(format!(
            "{} does not have a .json extension",
            path.display()
        )));
    }
    check_session_report(&fs::read_to_string(path)?)
}

fn check_streaming(index: usize, streaming: &Streaming) -> Result<PacketReport> {
    let ticks = parse_number_list(&streaming.ticks_in_mses)?;
    let declared_samples = streaming
        .global_packet_sizes
        .as_deref()
        .map(parse_number_list)
        .transpose()?
        .map(|sizes| sizes.iter().map(|&s| s.max(0.0) as usize).sum());

    let report = PacketReport {
        streaming: index,
        channel: streaming.channel.clone(),
        packet_count: ticks.len(),
        declared_samples,
        sample_count: streaming.time_domain_data.len(),
        gaps: find_tick_gaps(&ticks),
    };

    if report.data_is_missing() {
        tracing::warn!(
            streaming = index,
            channel = report.channel.as_deref().unwrap_or("unknown"),
            gaps = report.gaps.len(),
            "LFP data is missing"
        );
    } else {
        tracing::info!(
            streaming = index,
            "no LFP data missing based on timestamp differences between data packets"
        );
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_lists_with_trailing_comma() {
        assert_eq!(parse_number_list("1,251,501,").unwrap(), vec![1.0, 251.0, 501.0]);
        assert_eq!(parse_number_list("62, 62").unwrap(), vec![62.0, 62.0]);
        assert!(parse_number_list("").unwrap().is_empty());
        assert!(parse_number_list("1,,2").is_err());
    }

    #[test]
    fn regular_ticks_have_no_gaps() {
        assert!(find_tick_gaps(&[100.0, 350.0, 600.0, 850.0]).is_empty());
    }

    #[test]
    fn reports_each_irregular_interval() {
        let gaps = find_tick_gaps(&[100.0, 350.0, 850.0, 1100.0, 1340.0]);
        assert_eq!(
            gaps,
            vec![
                TickGap { packet: 2, interval_ms: 500.0 },
                TickGap { packet: 4, interval_ms: 240.0 },
            ]
        );
    }

    #[test]
    fn checks_every_streaming_of_a_report() {
        let json = r#"{
            "BrainSenseTimeDomain": [
                {
                    "Channel": "ZERO_TWO_LEFT",
                    "TicksInMses": "1000,1250,1500,",
                    "GlobalPacketSizes": "62,63,62,",
                    "TimeDomainData": [0.1, 0.2, 0.3]
                },
                {
                    "Channel": "ZERO_TWO_RIGHT",
                    "TicksInMses": "1000,1250,1750"
                }
            ]
        }"#;
        let reports = check_session_report(json).unwrap();
        assert_eq!(reports.len(), 2);
        assert!(!reports[0].data_is_missing());
        assert_eq!(reports[0].declared_samples, Some(187));
        assert_eq!(reports[0].sample_count, 3);
        assert!(reports[1].data_is_missing());
        assert_eq!(reports[1].declared_samples, None);
    }

    #[test]
    fn report_without_streamings_is_rejected() {
        assert!(matches!(
            check_session_report(r#"{"LfpMontageTimeDomain": []}"#),
            Err(ResyncError::InvalidPacketReport(_))
        ));
        assert!(matches!(
            check_session_report("not json"),
            Err(ResyncError::Json(_))
        ));
    }
}
