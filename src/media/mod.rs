//! # Media Capability Layer
//!
//! The composition engine never decodes or encodes media itself. It talks to a
//! [`MediaEngine`], which can open clips and audio files as duration-bearing
//! handles, release them, and finally encode a fully described [`RenderJob`].
//!
//! Captions, concatenation, trimming, volume, fades and mixing are carried by
//! the job as plain data (see [`crate::video::Timeline`] and
//! [`crate::audio::AudioMix`]); the engine realizes all of them in one encode.
//! The bundled [`FfmpegEngine`] compiles the job into a single ffmpeg filter
//! graph.

pub mod ffmpeg;
pub mod filter_graph;
pub mod probe;
pub mod scope;

#[cfg(test)]
pub(crate) mod fake;

use std::future::Future;
use std::path::{Path, PathBuf};

use crate::config::{CaptionStyle, EncodingSettings};
use crate::error::Result;
use crate::video::Timeline;

pub use ffmpeg::FfmpegEngine;
pub use scope::ResourceScope;

/// Identifier of an opened media handle, unique per engine
pub type HandleId = u64;

/// Audio codec used for every output container
pub const OUTPUT_AUDIO_CODEC: &str = "aac";

/// What the engine learned when opening a media file
#[derive(Debug, Clone, PartialEq)]
pub struct MediaInfo {
    /// Duration in seconds
    pub duration: f64,

    /// Whether the file carries an audio stream
    pub has_audio: bool,

    /// Video resolution (width, height), if the file has video
    pub resolution: Option<(u32, u32)>,

    /// Video frame rate, if known
    pub frame_rate: Option<f64>,
}

impl MediaInfo {
    /// Info for an audio-only source
    pub fn audio(duration: f64) -> Self {
        Self {
            duration,
            has_audio: true,
            resolution: None,
            frame_rate: None,
        }
    }

    /// Info for a video source
    pub fn video(duration: f64, resolution: (u32, u32), frame_rate: f64, has_audio: bool) -> Self {
        Self {
            duration,
            has_audio,
            resolution: Some(resolution),
            frame_rate: Some(frame_rate),
        }
    }
}

/// An opened media source. Each open yields a distinct handle, even for the
/// same path, and each handle must be released exactly once.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaHandle {
    pub id: HandleId,
    pub path: PathBuf,
    pub info: MediaInfo,
}

impl MediaHandle {
    pub fn duration(&self) -> f64 {
        self.info.duration
    }
}

/// Everything the encoder needs for the final render
#[derive(Debug, Clone, Copy)]
pub struct RenderJob<'a> {
    /// Composed timeline with the mixed audio attached
    pub timeline: &'a Timeline,

    pub encoding: &'a EncodingSettings,

    pub caption_style: &'a CaptionStyle,
}

impl<'a> RenderJob<'a> {
    pub fn audio_codec(&self) -> &'static str {
        OUTPUT_AUDIO_CODEC
    }
}

/// Capability interface of the external media engine
///
/// Implementations must be usable from worker threads: independent opens may
/// run concurrently.
pub trait MediaEngine: Send + Sync {
    /// Short backend name for logging
    fn name(&self) -> &str;

    /// Open a video clip
    fn open_clip(&self, path: &Path) -> Result<MediaHandle>;

    /// Open an audio file
    fn open_audio(&self, path: &Path) -> Result<MediaHandle>;

    /// Release a handle. Must not panic, and must tolerate ids that are
    /// unknown or already released.
    fn release(&self, id: HandleId);

    /// Encode the job to `output`. Dropping the returned future cancels the
    /// encode.
    fn encode(&self, job: &RenderJob<'_>, output: &Path) -> impl Future<Output = Result<()>> + Send;
}
