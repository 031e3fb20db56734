use tracing::debug;

use crate::audio::types::{AudioMix, AudioSource, BackgroundTrack};
use crate::video::Timeline;

/// Combine the timeline's native audio (if any clip kept it) with the
/// background track (if one was built).
///
/// Both sources start at offset 0 and span the timeline duration. A lone
/// source is still wrapped in a mix and passes through unchanged; `None`
/// means the output has no audio at all.
pub fn mix(timeline: &Timeline, background: Option<BackgroundTrack>) -> Option<AudioMix> {
    let mut sources = Vec::with_capacity(2);

    if timeline.has_native_audio() {
        sources.push(AudioSource::Timeline);
    }
    if let Some(track) = background {
        sources.push(AudioSource::Background(track));
    }

    if sources.is_empty() {
        debug!("No audio sources, output will be silent");
        return None;
    }

    debug!("Mixing {} audio source(s)", sources.len());
    Some(AudioMix {
        sources,
        duration: timeline.total_duration(),
    })
}
