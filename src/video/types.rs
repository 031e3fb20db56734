use std::path::PathBuf;

use crate::audio::AudioMix;
use crate::config::Position;
use crate::media::MediaHandle;

/// Canvas used when no clip reports its resolution
pub const DEFAULT_CANVAS: (u32, u32) = (1920, 1080);

/// Frame rate used when no clip reports one
pub const DEFAULT_FRAME_RATE: f64 = 30.0;

/// Output frame rate ceiling. Variable-rate clips can report a timebase-sized
/// nominal rate.
pub const MAX_FRAME_RATE: f64 = 120.0;

/// Half-open time window `[start, start + duration)`, in clip-local seconds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayWindow {
    pub start: f64,
    pub duration: f64,
}

impl OverlayWindow {
    pub fn new(start: f64, duration: f64) -> Self {
        Self { start, duration }
    }

    pub fn end(&self) -> f64 {
        self.start + self.duration
    }

    pub fn is_empty(&self) -> bool {
        self.duration <= 0.0
    }

    /// Intersection with `[0, clip_duration)`, or `None` when nothing of the
    /// window is visible
    pub fn visible_within(&self, clip_duration: f64) -> Option<Self> {
        let start = self.start.max(0.0);
        let end = self.end().min(clip_duration);
        (end > start).then(|| Self::new(start, end - start))
    }
}

/// Font face for a caption
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FontFace {
    /// A font file on disk
    File(PathBuf),
    /// A font family resolved by the system font configuration
    Family(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFont {
    pub face: FontFace,
    pub size: u32,
}

/// One coordinate of a caption anchor
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AnchorCoord {
    /// Fraction of the frame size, measured to the caption's top/left edge
    Fraction(f64),
    /// Caption flush with the left/top edge
    Start,
    /// Caption centered
    Center,
    /// Caption flush with the right/bottom edge
    End,
}

/// Relative placement of a caption on the frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchor {
    pub x: AnchorCoord,
    pub y: AnchorCoord,
}

/// A caption with every optional field filled in
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedOverlay {
    pub text: String,
    pub window: OverlayWindow,
    pub position: Position,
    pub font: ResolvedFont,
}

/// One clip after mute and captions have been applied
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedClip {
    /// Handle of the base footage
    pub source: MediaHandle,

    /// Whether the clip's native audio is kept
    pub audio: bool,

    /// Burned-in captions, already clipped to the clip duration
    pub captions: Vec<ResolvedOverlay>,
}

impl ComposedClip {
    pub fn duration(&self) -> f64 {
        self.source.duration()
    }
}

/// Ordered, gapless sequence of composed clips
#[derive(Debug, Clone, PartialEq)]
pub struct Timeline {
    pub(crate) clips: Vec<ComposedClip>,
    pub(crate) total_duration: f64,
    pub(crate) canvas: (u32, u32),
    pub(crate) frame_rate: f64,
    pub(crate) audio: Option<AudioMix>,
}

impl Timeline {
    pub fn clips(&self) -> &[ComposedClip] {
        &self.clips
    }

    /// Sum of the clip durations
    pub fn total_duration(&self) -> f64 {
        self.total_duration
    }

    /// Output frame size every clip is letterboxed into
    pub fn canvas(&self) -> (u32, u32) {
        self.canvas
    }

    pub fn frame_rate(&self) -> f64 {
        self.frame_rate
    }

    /// Whether any clip contributes native audio
    pub fn has_native_audio(&self) -> bool {
        self.clips.iter().any(|clip| clip.audio)
    }

    pub fn caption_count(&self) -> usize {
        self.clips.iter().map(|clip| clip.captions.len()).sum()
    }

    /// Final audio stream, once attached
    pub fn audio(&self) -> Option<&AudioMix> {
        self.audio.as_ref()
    }

    /// Replace the timeline's audio with the mixer output
    pub fn attach_audio(&mut self, audio: Option<AudioMix>) {
        self.audio = audio;
    }
}
