//! Finds duplicate videos in one directory by comparing perceptual
//! fingerprints.
//!
//! The pipeline is [`CatalogBuilder`] → [`FingerprintEngine`] →
//! [`find_duplicates`] → [`report`]; [`pipeline::run`] wires it together.

pub mod config;
pub mod core;
pub mod pipeline;

pub use crate::config::{HashOptions, ScanOptions};
pub use crate::core::catalog::{Catalog, CatalogBuilder, FingerprintState, VideoRecord};
pub use crate::core::classifier::{ClassificationError, FileClassifier, VideoClassifier};
pub use crate::core::duplicate::{DuplicatePair, PairOrder, find_duplicates};
pub use crate::core::engine::FingerprintEngine;
pub use crate::core::error::ScanError;
pub use crate::core::ffmpeg::FfmpegHasher;
pub use crate::core::hash::{Fingerprint, FingerprintError, HashedVideo, VideoHasher};
pub use crate::core::report;
