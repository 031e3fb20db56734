use tracing::debug;

use crate::error::{ConfigError, Result};
use crate::video::types::{ComposedClip, Timeline, DEFAULT_CANVAS, DEFAULT_FRAME_RATE, MAX_FRAME_RATE};

impl Timeline {
    /// Join composed clips back to back, in order.
    ///
    /// Clips of differing size or frame rate are letterboxed into a common
    /// canvas (the largest width and height, rounded up to even) at the
    /// highest frame rate, so nothing is spliced at the byte level.
    pub fn concat(clips: Vec<ComposedClip>) -> Result<Self> {
        if clips.is_empty() {
            return Err(ConfigError::NoVideos.into());
        }

        let total_duration = clips.iter().map(ComposedClip::duration).sum();

        let canvas = clips
            .iter()
            .filter_map(|clip| clip.source.info.resolution)
            .reduce(|(w1, h1), (w2, h2)| (w1.max(w2), h1.max(h2)))
            .map(|(w, h)| (round_up_even(w), round_up_even(h)))
            .unwrap_or(DEFAULT_CANVAS);

        let frame_rate = clips
            .iter()
            .filter_map(|clip| clip.source.info.frame_rate)
            .filter(|fps| fps.is_finite() && *fps > 0.0)
            .reduce(f64::max)
            .map(|fps| fps.min(MAX_FRAME_RATE))
            .unwrap_or(DEFAULT_FRAME_RATE);

        debug!(
            "Timeline: {} clips, {:.2}s, canvas {}x{} @ {:.2} fps",
            clips.len(),
            total_duration,
            canvas.0,
            canvas.1,
            frame_rate
        );

        Ok(Self {
            clips,
            total_duration,
            canvas,
            frame_rate,
            audio: None,
        })
    }
}

fn round_up_even(value: u32) -> u32 {
    value + (value % 2)
}
