pub mod catalog;
pub mod classifier;
pub mod duplicate;
pub mod engine;
pub mod error;
pub mod ffmpeg;
pub mod hash;
pub mod report;
