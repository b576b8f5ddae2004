// src/config/mod.rs
use serde::{Deserialize, Deserializer, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ResyncError, Result};
use crate::processing::detectors::external::DEFAULT_THRESHOLD;
use crate::processing::detectors::{ExternalDetectorConfig, Kernel, LfpDetectorConfig};
use crate::processing::filters::HighPassFilterConfig;
use crate::processing::resync::ResyncConfig;
use crate::processing::timeshift::TimeshiftConfig;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Config {
    #[serde(alias = "SUBJECT_ID", alias = "subject_ID", default)]
    pub subject_id: String,
    /// Parent folder of the per-subject output folder.
    #[serde(alias = "SAVING_PATH", default, deserialize_with = "text_or_unset")]
    pub saving_path: Option<PathBuf>,
    #[serde(alias = "sf_LFP")]
    pub sf_lfp: u32,
    pub sf_external: u32,
    #[serde(default, deserialize_with = "number_or_unset")]
    pub thresh_external: Option<f64>,
    #[serde(alias = "KERNEL", default)]
    pub kernel: Kernel,
    #[serde(alias = "ignore_first_seconds_BIP", default)]
    pub ignore_first_seconds_external: Option<f64>,
    #[serde(alias = "consider_first_seconds_BIP", default)]
    pub consider_first_seconds_external: Option<f64>,
    #[serde(alias = "consider_first_seconds_LFP", default)]
    pub consider_first_seconds_lfp: Option<f64>,
    #[serde(alias = "LFP_CH_INDEX", default)]
    pub lfp_ch_index: usize,
    /// Index of the external reference channel, filled in after a resync run.
    #[serde(alias = "BIP_CH_INDEX", alias = "BIP_ch_index", default)]
    pub external_ch_index: Option<usize>,
    #[serde(alias = "ch_name_BIP", default, deserialize_with = "text_or_unset")]
    pub ch_name_external: Option<String>,
    #[serde(default, deserialize_with = "text_or_unset")]
    pub external_hardware: Option<String>,
    /// Manually picked time (s) of the first intracerebral artefact.
    #[serde(alias = "real_art_time_LFP", default, deserialize_with = "number_or_unset")]
    pub real_art_time_lfp: Option<f64>,
    #[serde(default = "default_highpass_cutoff")]
    pub highpass_cutoff: f64,
    #[serde(default = "default_remove_clipping")]
    pub remove_clipping: bool,
    #[serde(alias = "index_real_artefacts_LFP", default)]
    pub index_real_artefacts_lfp: Vec<usize>,
    #[serde(alias = "index_real_artefacts_BIP", default)]
    pub index_real_artefacts_external: Vec<usize>,
}

fn default_highpass_cutoff() -> f64 {
    HighPassFilterConfig::default().cutoff
}

fn default_remove_clipping() -> bool {
    HighPassFilterConfig::default().remove_clipping
}

// Sentinels the config files use for "not set".
#[derive(Deserialize)]
#[serde(untagged)]
enum TextSetting {
    Text(String),
    Flag(bool),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberSetting {
    Number(f64),
    Text(String),
    Flag(bool),
}

fn is_unset_text(text: &str) -> bool {
    let text = text.trim();
    text.is_empty() || text.eq_ignore_ascii_case("not set")
}

fn text_or_unset<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: From<String>,
{
    match Option::<TextSetting>::deserialize(deserializer)? {
        None | Some(TextSetting::Flag(false)) => Ok(None),
        Some(TextSetting::Text(text)) if is_unset_text(&text) => Ok(None),
        Some(TextSetting::Text(text)) => Ok(Some(T::from(text))),
        Some(TextSetting::Flag(true)) => Err(serde::de::Error::custom(
            "expected a string, null or false",
        )),
    }
}

fn number_or_unset<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<NumberSetting>::deserialize(deserializer)? {
        None | Some(NumberSetting::Flag(false)) => Ok(None),
        Some(NumberSetting::Number(value)) => Ok(Some(value)),
        Some(NumberSetting::Text(text)) if is_unset_text(&text) => Ok(None),
        Some(NumberSetting::Text(text)) => text
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("'{}' is not a number", text))),
        Some(NumberSetting::Flag(true)) => Err(serde::de::Error::custom(
            "expected a number, null or false",
        )),
    }
}

impl Config {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.subject_id.trim().is_empty() {
            return Err(ResyncError::MissingSubjectId);
        }
        if self.sf_lfp == 0 || self.sf_external == 0 {
            return Err(ResyncError::InvalidConfig(
                "sf_lfp and sf_external must be positive integers".to_string(),
            ));
        }
        if !(self.highpass_cutoff > 0.0 && self.highpass_cutoff < 1.0) {
            return Err(ResyncError::InvalidConfig(format!(
                "highpass_cutoff must lie strictly between 0 and 1, got {}",
                self.highpass_cutoff
            )));
        }
        let windows = [
            ("ignore_first_seconds_external", self.ignore_first_seconds_external),
            ("consider_first_seconds_external", self.consider_first_seconds_external),
            ("consider_first_seconds_lfp", self.consider_first_seconds_lfp),
        ];
        for (name, value) in windows {
            if let Some(seconds) = value {
                if !(seconds.is_finite() && seconds >= 0.0) {
                    return Err(ResyncError::InvalidConfig(format!(
                        "{} must be a non-negative number of seconds, got {}",
                        name, seconds
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn external_threshold(&self) -> f64 {
        self.thresh_external.unwrap_or(DEFAULT_THRESHOLD)
    }

    pub fn filter_config(&self) -> HighPassFilterConfig {
        HighPassFilterConfig {
            cutoff: self.highpass_cutoff,
            remove_clipping: self.remove_clipping,
        }
    }

    pub fn resync_config(&self) -> ResyncConfig {
        ResyncConfig {
            lfp_channel_index: self.lfp_ch_index,
            external_channel_name: self.ch_name_external.clone(),
            external_hardware: self.external_hardware.clone(),
            lfp_detector: LfpDetectorConfig {
                kernel: self.kernel,
                consider_first_seconds: self.consider_first_seconds_lfp,
            },
            external_detector: ExternalDetectorConfig {
                threshold: self.external_threshold(),
                ignore_first_seconds: self.ignore_first_seconds_external,
                consider_first_seconds: self.consider_first_seconds_external,
            },
            filter: self.filter_config(),
            manual_lfp_correction: self.real_art_time_lfp,
        }
    }

    /// Needs the external channel index found by a previous resync run.
    pub fn timeshift_config(&self) -> Result<TimeshiftConfig> {
        let external_channel_index = self.external_ch_index.ok_or_else(|| {
            ResyncError::InvalidConfig(
                "external_ch_index is not set, run the resync stage first".to_string(),
            )
        })?;
        Ok(TimeshiftConfig {
            lfp_channel_index: self.lfp_ch_index,
            external_channel_index,
            kernel: self.kernel,
            external_threshold: self.external_threshold(),
            filter: self.filter_config(),
            curated_lfp: self.index_real_artefacts_lfp.clone(),
            curated_external: self.index_real_artefacts_external.clone(),
        })
    }

    /// `<saving_path>/<subject_id>`, unless the caller picked a folder.
    pub fn output_directory(&self, chosen: Option<&Path>) -> Result<PathBuf> {
        match (chosen, &self.saving_path) {
            (Some(folder), _) => Ok(folder.to_path_buf()),
            (None, Some(parent)) => Ok(parent.join(&self.subject_id)),
            (None, None) => Err(ResyncError::OutputDirectoryNotSet),
        }
    }
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let config_str = fs::read_to_string(path)?;
    Config::from_yaml_str(&config_str)
}

pub fn save_config<P: AsRef<Path>>(config: &Config, path: P) -> Result<()> {
    let yaml = serde_yaml::to_string(config)?;
    fs::write(path, yaml)?;
    Ok(())
}

/// Records the selected external channel in the config file, leaving every
/// other setting as it is stored on disk.
pub fn store_external_channel_index<P: AsRef<Path>>(path: P, index: usize) -> Result<Config> {
    let path = path.as_ref();
    let mut config = load_config(path)?;
    config.external_ch_index = Some(index);
    save_config(&config, path)?;
    Ok(config)
}
