//! # Vlogger
//!
//! Compose a sequence of video clips into one vlog: timed captions per clip,
//! selective muting, background music looped and faded to fit, and a single
//! encode with configurable codec settings.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use vlogger::{
//!     composition::CompositionEngine,
//!     config::VlogConfig,
//!     media::FfmpegEngine,
//! };
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let config = VlogConfig::from_file("vlog.toml")?;
//! let engine = CompositionEngine::new(FfmpegEngine::from_config(&config));
//!
//! let report = engine.render(&config, "output.mp4").await?;
//! println!("Rendered {:.1}s of video", report.duration);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! The library is organized into several key modules:
//!
//! - [`config`] - Configuration management
//! - [`video`] - Caption resolution, clip composition and the timeline
//! - [`audio`] - Mute routing, background music and mixing
//! - [`media`] - Media engine capability interface and the ffmpeg backend
//! - [`composition`] - Main composition engine
//!
//! ## Custom Media Engines
//!
//! The composition engine only needs the [`MediaEngine`](media::MediaEngine)
//! capabilities, so another backend can be plugged in by implementing that
//! trait.

pub mod audio;
pub mod composition;
pub mod config;
pub mod error;
pub mod media;
pub mod video;

// Re-export commonly used types for convenience
pub use crate::{
    composition::{CompositionEngine, RenderReport},
    config::VlogConfig,
    error::{Result, VlogError},
    media::{FfmpegEngine, MediaEngine},
};
