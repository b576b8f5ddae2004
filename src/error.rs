use std::fmt;
use thiserror::Error;

/// Which of the two recordings an error or diagnostic refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Lfp,
    External,
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stream::Lfp => write!(f, "intracerebral"),
            Stream::External => write!(f, "external"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ResyncError {
    #[error("Please fill in the subject_id in the config file as a string")]
    MissingSubjectId,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("No saving path is set in the config file and none was given on the command line")]
    OutputDirectoryNotSet,

    #[error("No reference channel is known for hardware '{hardware}' at {sampling_rate} Hz, please set ch_name_external in the config file")]
    UnknownHardware { hardware: String, sampling_rate: u32 },

    #[error("Neither ch_name_external nor external_hardware is set in the config file, the external reference channel cannot be selected")]
    MissingReferenceChannel,

    #[error("The channel '{requested}' does not exist in the recording. Please choose a channel in the following list and write its name in the config file: {available:?}")]
    ChannelNotFound {
        requested: String,
        available: Vec<String>,
    },

    #[error("Channel index {index} is out of range for a recording with {channel_count} channels")]
    ChannelIndexOutOfRange { index: usize, channel_count: usize },

    #[error("Invalid recording: {0}")]
    InvalidRecording(String),

    #[error("Channel has {len} samples, at least {required} are required")]
    ChannelTooShort { len: usize, required: usize },

    #[error("Kernel selector must be \"1\" or \"2\", got {0:?}")]
    InvalidKernel(String),

    #[error("No artefact was detected in the {stream} recording, alignment is impossible")]
    NoArtefactDetected { stream: Stream },

    #[error("Curated index {index} is incorrect for the {stream} recording, which contains {detected} artefacts. Please check the detected artefacts and change the config file accordingly")]
    CuratedIndexOutOfRange {
        stream: Stream,
        index: usize,
        detected: usize,
    },

    #[error("{curated} curated indexes were given for the {stream} recording, which contains {detected} artefacts. Please check the detected artefacts and change the config file accordingly")]
    CuratedCountExceedsDetected {
        stream: Stream,
        curated: usize,
        detected: usize,
    },

    #[error("The number of artefacts should be the same in both recordings ({lfp} intracerebral vs {external} external curated). If an artefact is detected only in one of the recordings, do not select it. Intracerebral contains {detected_lfp} artefacts, external contains {detected_external} artefacts")]
    CuratedLengthMismatch {
        lfp: usize,
        external: usize,
        detected_lfp: usize,
        detected_external: usize,
    },

    #[error("Invalid packet report: {0}")]
    InvalidPacketReport(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ResyncError>;
