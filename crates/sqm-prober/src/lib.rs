//! Subprocess-based stream quality probing (codec/resolution/fps/bitrate)
//! via a single `ffmpeg` analysis invocation per probe.

pub mod codec;
pub mod error;
pub mod parse;
pub mod process;
pub mod prober;

pub use error::{ProberError, Result};
pub use parse::ParsedStats;
pub use prober::{ProbeOptions, ProbeResult, ProbeStatus, StreamProber};
