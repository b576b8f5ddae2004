pub mod config;
pub mod error;
pub mod processing;
pub mod recording;

pub mod local {
    pub mod process_file;
}

pub mod utils {
    pub mod log;
}

#[cfg(feature = "python")]
pub mod bindings {
    pub mod python;
}

pub use config::{load_config, save_config, Config};
pub use error::{ResyncError, Result, Stream};
pub use processing::crop::{crop_recordings, AlignedPair};
pub use processing::detectors::{
    ArtefactDetector, Detection, ExternalDetector, ExternalDetectorConfig, Kernel, LfpDetector,
    LfpDetectorConfig,
};
pub use processing::filters::{HighPassFilter, HighPassFilterConfig};
pub use processing::resync::{run_resync, ResyncConfig, ResyncOutcome};
pub use processing::timeshift::{analyze_timeshift, TimeshiftConfig, TimeshiftOutcome, TimeshiftReport};
pub use processing::Diagnostic;
pub use recording::MultiChannelRecording;
