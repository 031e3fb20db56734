use std::path::Path;

use rayon::ThreadPool;
use tracing::{debug, info, warn};

use crate::audio::types::BackgroundTrack;
use crate::config::BgmSettings;
use crate::error::{ResourceError, Result};
use crate::media::{MediaEngine, ResourceScope};

/// Slack for floating point noise when dividing durations
const LOOP_TOLERANCE: f64 = 1e-9;

/// Number of source copies needed to cover `target` seconds: `ceil(target / source)`,
/// at least one.
pub fn loop_count(target: f64, source: f64) -> usize {
    ((target / source) - LOOP_TOLERANCE).ceil().max(1.0) as usize
}

/// Builds the background track from the BGM settings
pub struct BackgroundTrackBuilder<'a> {
    pool: &'a ThreadPool,
}

impl<'a> BackgroundTrackBuilder<'a> {
    pub fn new(pool: &'a ThreadPool) -> Self {
        Self { pool }
    }

    /// Build a track of exactly `target` seconds, or `None` when there is no
    /// usable BGM.
    ///
    /// The source is opened once to learn its duration, then once more per
    /// loop so every copy has its own handle. Trim, volume and fades are
    /// applied to the looped whole, never per copy.
    pub fn build<E: MediaEngine>(
        &self,
        scope: &mut ResourceScope<'_, E>,
        bgm: Option<&BgmSettings>,
        target: f64,
    ) -> Result<Option<BackgroundTrack>> {
        let bgm = match bgm {
            Some(bgm) if bgm.is_enabled() => bgm,
            _ => {
                debug!("No background music configured");
                return Ok(None);
            }
        };

        if target <= 0.0 {
            warn!("Timeline has no duration, skipping background music");
            return Ok(None);
        }

        let path = Path::new(bgm.path.trim());
        let probe = scope.open_audio(path)?;
        let source_duration = probe.duration();

        if !source_duration.is_finite() || source_duration <= 0.0 {
            return Err(ResourceError::InvalidMedia {
                path: path.display().to_string(),
                details: format!("duration {} is not positive", source_duration),
            }
            .into());
        }

        let loops = loop_count(target, source_duration);
        let copies = scope.open_audio_copies(self.pool, path, loops)?;

        let gain = (bgm.volume_percentage != 100.0).then(|| bgm.volume_percentage / 100.0);
        let fade_in = (bgm.fade_in > 0.0).then(|| bgm.fade_in.min(target));
        let fade_out = (bgm.fade_out > 0.0).then(|| bgm.fade_out.min(target));

        info!(
            "   BGM: {:.2}s source looped {} time(s), trimmed to {:.2}s",
            source_duration, loops, target
        );

        Ok(Some(BackgroundTrack {
            source_path: path.to_path_buf(),
            source_duration,
            copies,
            duration: target,
            gain,
            fade_in,
            fade_out,
        }))
    }
}
