pub mod config;
pub mod format;
pub mod misc;
pub mod progress;
