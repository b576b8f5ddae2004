pub mod highpass;

pub use highpass::{remove_clipping, HighPassFilter, HighPassFilterConfig};
