use crate::error::{ResyncError, Result};

// Known acquisition setups whose bipolar stimulation channel has a fixed name.
const KNOWN_REFERENCE_CHANNELS: &[(&str, u32, &str)] = &[
    ("tmsi saga", 4000, "BIP 01"),
    ("tmsi saga", 4096, "BIP 01"),
    ("tmsi porti", 2048, "BIP 01"),
];

/// Channel-major multi-channel recording with its sampling rate and channel labels.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiChannelRecording {
    data: Vec<Vec<f64>>,
    sampling_rate: u32,
    channel_names: Vec<String>,
}

impl MultiChannelRecording {
    pub fn new(data: Vec<Vec<f64>>, sampling_rate: u32, channel_names: Vec<String>) -> Result<Self> {
        if sampling_rate == 0 {
            return Err(ResyncError::InvalidRecording(
                "sampling rate must be a positive integer".to_string(),
            ));
        }
        if data.len() != channel_names.len() {
            return Err(ResyncError::InvalidRecording(format!(
                "{} channel names given for {} channels",
                channel_names.len(),
                data.len()
            )));
        }
        if let Some(first) = data.first() {
            if data.iter().any(|row| row.len() != first.len()) {
                return Err(ResyncError::InvalidRecording(
                    "all channels must have the same number of samples".to_string(),
                ));
            }
        }
        for (i, name) in channel_names.iter().enumerate() {
            if channel_names[..i].contains(name) {
                return Err(ResyncError::InvalidRecording(format!(
                    "channel name '{}' is not unique",
                    name
                )));
            }
        }

        Ok(Self {
            data,
            sampling_rate,
            channel_names,
        })
    }

    pub fn sampling_rate(&self) -> u32 {
        self.sampling_rate
    }

    pub fn channel_names(&self) -> &[String] {
        &self.channel_names
    }

    pub fn channel_count(&self) -> usize {
        self.data.len()
    }

    pub fn sample_count(&self) -> usize {
        self.data.first().map_or(0, Vec::len)
    }

    pub fn duration_seconds(&self) -> f64 {
        self.sample_count() as f64 / self.sampling_rate as f64
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.data
    }

    /// Reference channel by position.
    pub fn channel(&self, index: usize) -> Result<&[f64]> {
        self.data
            .get(index)
            .map(Vec::as_slice)
            .ok_or(ResyncError::ChannelIndexOutOfRange {
                index,
                channel_count: self.data.len(),
            })
    }

    /// Case-insensitive lookup of a channel position by its label.
    pub fn channel_index(&self, name: &str) -> Result<usize> {
        let wanted = name.to_lowercase();
        self.channel_names
            .iter()
            .position(|candidate| candidate.to_lowercase() == wanted)
            .ok_or_else(|| ResyncError::ChannelNotFound {
                requested: name.to_string(),
                available: self.channel_names.clone(),
            })
    }

    /// Copy of the samples in `[start, end)` for every channel.
    pub(crate) fn slice_samples(&self, start: usize, end: usize) -> Self {
        let end = end.min(self.sample_count());
        let start = start.min(end);
        Self {
            data: self.data.iter().map(|row| row[start..end].to_vec()).collect(),
            sampling_rate: self.sampling_rate,
            channel_names: self.channel_names.clone(),
        }
    }

    /// Relabels the channels, keeping the samples.
    pub fn with_channel_names(self, channel_names: Vec<String>) -> Result<Self> {
        Self::new(self.data, self.sampling_rate, channel_names)
    }
}

/// Name of the bipolar reference channel used by a known hardware setup.
pub fn reference_channel_for(hardware: &str, sampling_rate: u32) -> Result<&'static str> {
    let hardware_lower = hardware.trim().to_lowercase();
    KNOWN_REFERENCE_CHANNELS
        .iter()
        .find(|(name, rate, _)| *name == hardware_lower && *rate == sampling_rate)
        .map(|(_, _, channel)| *channel)
        .ok_or_else(|| ResyncError::UnknownHardware {
            hardware: hardware.to_string(),
            sampling_rate,
        })
}

/// Resolves the external reference channel from an explicit name, falling back to
/// the hardware table. Returns the channel position.
pub fn resolve_reference_channel(
    recording: &MultiChannelRecording,
    channel_name: Option<&str>,
    hardware: Option<&str>,
) -> Result<usize> {
    let name = match (channel_name, hardware) {
        (Some(name), _) => name,
        (None, Some(hardware)) => reference_channel_for(hardware, recording.sampling_rate())?,
        (None, None) => return Err(ResyncError::MissingReferenceChannel),
    };
    let index = recording.channel_index(name)?;
    tracing::info!(
        channel = %recording.channel_names()[index],
        index,
        "external reference channel selected"
    );
    Ok(index)
}
