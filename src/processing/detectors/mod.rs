pub mod external;
pub mod lfp;
pub mod peaks;

use super::timing::index_to_time;
use super::Diagnostic;
use crate::error::{ResyncError, Result, Stream};

pub use external::{ExternalDetector, ExternalDetectorConfig};
pub use lfp::{Kernel, LfpDetector, LfpDetectorConfig};

// DETECTOR COMPONENT ----------------------------------------------------------
pub trait ArtefactDetector {
    /// Stream this detector is tuned for.
    fn stream(&self) -> Stream;

    /// Scans a reference channel and returns candidate artefact onsets.
    fn detect(&self, channel: &[f64], sampling_rate: u32) -> Result<Detection>;
}

/// Candidate artefact onsets found in one reference channel.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub stream: Stream,
    /// Ascending sample indices.
    pub indices: Vec<usize>,
    /// The channel was read with flipped polarity.
    pub inverted: bool,
    pub diagnostics: Vec<Diagnostic>,
}

impl Detection {
    pub(crate) fn empty(stream: Stream, diagnostics: Vec<Diagnostic>) -> Self {
        Self {
            stream,
            indices: Vec::new(),
            inverted: false,
            diagnostics,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// First candidate, the one alignment relies on.
    pub fn first_index(&self) -> Result<usize> {
        self.indices
            .first()
            .copied()
            .ok_or(ResyncError::NoArtefactDetected {
                stream: self.stream,
            })
    }

    pub fn times(&self, sampling_rate: u32) -> Vec<f64> {
        index_to_time(&self.indices, sampling_rate)
    }
}

pub(crate) fn check_channel(channel: &[f64], sampling_rate: u32, required: usize) -> Result<()> {
    if sampling_rate == 0 {
        return Err(ResyncError::InvalidRecording(
            "sampling rate must be a positive integer".to_string(),
        ));
    }
    if channel.len() < required {
        return Err(ResyncError::ChannelTooShort {
            len: channel.len(),
            required,
        });
    }
    Ok(())
}

pub(crate) fn seconds_to_samples(seconds: f64, sampling_rate: u32) -> usize {
    (seconds * sampling_rate as f64).round().max(0.0) as usize
}
