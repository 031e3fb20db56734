use std::path::Path;

use rayon::prelude::*;
use rayon::ThreadPool;
use tracing::debug;

use crate::config::{FontSettings, VideoItem};
use crate::error::Result;
use crate::media::{MediaEngine, ResourceScope};
use crate::video::overlay::resolve_overlay;
use crate::video::types::{ComposedClip, ResolvedOverlay};

/// Turns one configured clip into a [`ComposedClip`]
pub struct ClipCompositor<'a> {
    global_font: &'a FontSettings,
    pool: &'a ThreadPool,
}

impl<'a> ClipCompositor<'a> {
    pub fn new(global_font: &'a FontSettings, pool: &'a ThreadPool) -> Self {
        Self { global_font, pool }
    }

    /// Open the clip's footage, apply the mute decision and resolve captions.
    ///
    /// The opened handle is tracked by `scope`. A missing or unreadable file
    /// aborts with the engine's error.
    pub fn compose<E: MediaEngine>(
        &self,
        scope: &mut ResourceScope<'_, E>,
        video: &VideoItem,
        mute: bool,
    ) -> Result<ComposedClip> {
        let source = scope.open_clip(Path::new(&video.path))?;
        let duration = source.duration();

        let audio = source.info.has_audio && !mute;
        if mute && source.info.has_audio {
            debug!("Muting native audio of {}", video.path);
        }

        let captions = self.resolve_captions(video, duration);

        debug!(
            "Composed {}: {:.2}s, {} caption(s), audio {}",
            video.path,
            duration,
            captions.len(),
            if audio { "on" } else { "off" }
        );

        Ok(ComposedClip {
            source,
            audio,
            captions,
        })
    }

    /// Resolve captions in parallel, keeping their configured order. Blank
    /// captions and captions that fall entirely outside the clip are dropped.
    fn resolve_captions(&self, video: &VideoItem, clip_duration: f64) -> Vec<ResolvedOverlay> {
        let global_font = self.global_font;

        self.pool.install(|| {
            video
                .overlays
                .par_iter()
                .filter_map(|overlay| {
                    let mut resolved = resolve_overlay(overlay, clip_duration, global_font)?;
                    match resolved.window.visible_within(clip_duration) {
                        Some(window) => {
                            resolved.window = window;
                            Some(resolved)
                        }
                        None => {
                            debug!(
                                "Caption {:?} is outside the {:.2}s clip, skipping",
                                overlay.text, clip_duration
                            );
                            None
                        }
                    }
                })
                .collect()
        })
    }
}
