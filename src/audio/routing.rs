use crate::config::VideoItem;

/// Whether a clip's native audio is muted: the clip's own setting wins,
/// otherwise the global default applies.
pub fn resolve_mute(clip_override: Option<bool>, global_mute: bool) -> bool {
    clip_override.unwrap_or(global_mute)
}

/// Mute decision for every clip, in playback order
pub fn mute_decisions(videos: &[VideoItem], global_mute: bool) -> Vec<bool> {
    videos
        .iter()
        .map(|video| resolve_mute(video.mute, global_mute))
        .collect()
}
