use std::path::PathBuf;

use crate::media::MediaHandle;

/// Background music sized to the timeline: looped copies of the source,
/// trimmed to `duration`, then volume and fades.
#[derive(Debug, Clone, PartialEq)]
pub struct BackgroundTrack {
    /// BGM file the copies were opened from
    pub source_path: PathBuf,

    /// Native duration of the BGM file in seconds
    pub source_duration: f64,

    /// Independent handles, one per loop, in playback order
    pub copies: Vec<MediaHandle>,

    /// Length after trimming; equal to the timeline duration
    pub duration: f64,

    /// Linear gain, only when the volume differs from 100%
    pub gain: Option<f64>,

    /// Fade-in length from the start
    pub fade_in: Option<f64>,

    /// Fade-out length at the end
    pub fade_out: Option<f64>,
}

impl BackgroundTrack {
    pub fn loop_count(&self) -> usize {
        self.copies.len()
    }

    /// Time at which the fade-out begins
    pub fn fade_out_start(&self) -> Option<f64> {
        self.fade_out.map(|fade| (self.duration - fade).max(0.0))
    }
}

/// One input of the final audio mix
#[derive(Debug, Clone, PartialEq)]
pub enum AudioSource {
    /// The concatenated clips' own audio
    Timeline,
    /// The looped background music
    Background(BackgroundTrack),
}

/// Final audio stream: one or two time-aligned sources summed together
#[derive(Debug, Clone, PartialEq)]
pub struct AudioMix {
    pub(crate) sources: Vec<AudioSource>,
    pub(crate) duration: f64,
}

impl AudioMix {
    pub fn sources(&self) -> &[AudioSource] {
        &self.sources
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Whether the clips' own audio is part of the mix
    pub fn includes_timeline(&self) -> bool {
        self.sources.iter().any(|s| matches!(s, AudioSource::Timeline))
    }

    pub fn background(&self) -> Option<&BackgroundTrack> {
        self.sources.iter().find_map(|s| match s {
            AudioSource::Background(track) => Some(track),
            AudioSource::Timeline => None,
        })
    }
}
