use std::path::{Path, PathBuf};

use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, info};

use crate::{
    audio::{mix, mute_decisions, BackgroundTrackBuilder},
    config::VlogConfig,
    error::{EncodingError, Result, VlogError},
    media::{MediaEngine, RenderJob, ResourceScope},
    video::{ClipCompositor, Timeline},
};

/// Summary of a finished render
#[derive(Debug, Clone, PartialEq)]
pub struct RenderReport {
    /// Where the video was written
    pub output: PathBuf,

    /// Length of the output in seconds
    pub duration: f64,

    pub clips: usize,

    /// Captions that ended up visible
    pub captions: usize,

    /// Background music loops, zero without BGM
    pub background_loops: usize,

    /// Media handles released after the encode
    pub handles_released: usize,
}

/// Drives a whole render: compose clips, build the background track, mix
/// and encode
///
/// The engine follows a clear pipeline:
/// 1. Clip Composition - Open each clip, apply its mute decision and captions
/// 2. Timeline - Join the composed clips back to back
/// 3. Background Music - Loop, trim and fade the BGM to the timeline length
/// 4. Audio Mix - Combine native audio with the background track
/// 5. Output - Encode to a temporary file next to the output, then move it in place
///
/// Every media handle opened along the way is released exactly once, whether
/// the render succeeds, fails or is cancelled.
pub struct CompositionEngine<E: MediaEngine> {
    media: E,
}

impl<E: MediaEngine> CompositionEngine<E> {
    pub fn new(media: E) -> Self {
        Self { media }
    }

    pub fn media(&self) -> &E {
        &self.media
    }

    /// Render `config` to `output`
    ///
    /// The configuration is validated before any media is opened. Dropping
    /// the returned future cancels the render and releases everything.
    pub async fn render<P: AsRef<Path>>(&self, config: &VlogConfig, output: P) -> Result<RenderReport> {
        let output = output.as_ref();
        config.validate()?;

        info!("🎬 Starting vlog render");
        info!("   Clips: {}", config.videos.len());
        info!("   Output: {:?}", output);
        info!("   Engine: {}", self.media.name());

        let pool = build_pool(config.worker_threads())?;
        let mut scope = ResourceScope::new(&self.media);

        // Pipeline Step 1: Clip Composition
        info!("📹 Step 1: Composing {} clip(s)...", config.videos.len());
        let compositor = ClipCompositor::new(&config.global_font, &pool);
        let mutes = mute_decisions(&config.videos, config.global_mute);

        let mut clips = Vec::with_capacity(config.videos.len());
        for (video, mute) in config.videos.iter().zip(mutes) {
            clips.push(compositor.compose(&mut scope, video, mute)?);
        }

        // Pipeline Step 2: Timeline
        let mut timeline = Timeline::concat(clips)?;
        info!(
            "⏱️  Step 2: Timeline is {:.2}s with {} caption(s)",
            timeline.total_duration(),
            timeline.caption_count()
        );

        // Pipeline Step 3: Background Music
        info!("🎵 Step 3: Building background track...");
        let background = BackgroundTrackBuilder::new(&pool).build(
            &mut scope,
            config.bgm.as_ref(),
            timeline.total_duration(),
        )?;
        let background_loops = background.as_ref().map(|t| t.loop_count()).unwrap_or(0);

        // Pipeline Step 4: Audio Mix
        let audio = mix(&timeline, background);
        info!(
            "🎚️  Step 4: Audio mix has {} source(s)",
            audio.as_ref().map(|m| m.sources().len()).unwrap_or(0)
        );
        timeline.attach_audio(audio);

        // Pipeline Step 5: Output
        info!(
            "🎞️  Step 5: Encoding with {} at {}...",
            config.encoding.codec, config.encoding.bitrate
        );
        let job = RenderJob {
            timeline: &timeline,
            encoding: &config.encoding,
            caption_style: &config.caption_style,
        };
        self.write_output(&job, output).await?;

        let handles_released = scope.release_all();
        debug!("Released {} handle(s)", handles_released);

        info!("🎉 Render complete! Output saved to: {:?}", output);

        Ok(RenderReport {
            output: output.to_path_buf(),
            duration: timeline.total_duration(),
            clips: timeline.clips().len(),
            captions: timeline.caption_count(),
            background_loops,
            handles_released,
        })
    }

    /// Encode into a temporary file in the output directory and move it over
    /// `output` only once the encoder succeeded. The temporary file is removed
    /// on failure or cancellation.
    async fn write_output(&self, job: &RenderJob<'_>, output: &Path) -> Result<()> {
        let output_failed = |reason: String| -> VlogError {
            EncodingError::OutputFailed {
                path: output.display().to_string(),
                reason,
            }
            .into()
        };

        let directory = match output.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        if !directory.is_dir() {
            return Err(output_failed(format!("directory {} does not exist", directory.display())));
        }

        let suffix = output
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();

        let temp = tempfile::Builder::new()
            .prefix(".vlogger-")
            .suffix(&suffix)
            .tempfile_in(directory)
            .map_err(|e| output_failed(e.to_string()))?
            .into_temp_path();
        debug!("Encoding to temporary file {:?}", temp);

        self.media.encode(job, &temp).await?;

        temp.persist(output).map_err(|e| output_failed(e.error.to_string()))?;
        Ok(())
    }
}

fn build_pool(threads: usize) -> Result<ThreadPool> {
    ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("vlogger-worker-{}", i))
        .build()
        .map_err(|e| VlogError::generic(format!("Failed to start worker pool: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BgmSettings, OverlayText, Position, VideoItem};
    use crate::error::{ConfigError, ResourceError};
    use crate::media::fake::{EncodeBehavior, FakeMedia};
    use crate::video::OverlayWindow;
    use std::time::Duration;
    use tempfile::tempdir;

    fn config(videos: Vec<VideoItem>) -> VlogConfig {
        VlogConfig {
            videos,
            processing_threads: Some(2),
            ..VlogConfig::default()
        }
    }

    fn three_clip_media() -> FakeMedia {
        FakeMedia::new()
            .with_clip("a.mp4", 5.0, true)
            .with_clip("b.mp4", 10.0, true)
            .with_clip("c.mp4", 5.0, true)
            .with_audio("bgm.mp3", 6.0)
    }

    fn three_clip_config() -> VlogConfig {
        let mut config = config(vec![
            VideoItem::new("a.mp4"),
            VideoItem::new("b.mp4").with_mute(true),
            VideoItem::new("c.mp4"),
        ]);
        config.bgm = Some(BgmSettings {
            fade_in: 1.0,
            fade_out: 1.0,
            volume_percentage: 50.0,
            ..BgmSettings::new("bgm.mp3")
        });
        config
    }

    fn dir_entries(dir: &Path) -> Vec<String> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_render_three_clips_with_background() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("vlog.mp4");
        let engine = CompositionEngine::new(three_clip_media());
        let config = three_clip_config();

        let report = engine.render(&config, &output).await.unwrap();

        assert_eq!(report.duration, 20.0);
        assert_eq!(report.clips, 3);
        assert_eq!(report.background_loops, 4);
        // three clips, one BGM duration read, four loop copies
        assert_eq!(report.handles_released, 8);
        engine.media().assert_all_released_once();

        assert_eq!(std::fs::read(&output).unwrap(), b"fake media");
        assert_eq!(dir_entries(dir.path()), vec!["vlog.mp4"]);

        let (timeline, _) = engine.media().encoded().unwrap();
        let audio: Vec<bool> = timeline.clips().iter().map(|c| c.audio).collect();
        assert_eq!(audio, vec![true, false, true]);

        let mixed = timeline.audio().unwrap();
        assert!(mixed.includes_timeline());
        let track = mixed.background().unwrap();
        assert_eq!(track.duration, 20.0);

        let plan = crate::media::filter_graph::compile(&RenderJob {
            timeline: &timeline,
            encoding: &config.encoding,
            caption_style: &config.caption_style,
        })
        .unwrap();
        assert!(plan.filter_graph.contains(
            "atrim=start=0:end=20,asetpts=PTS-STARTPTS,volume=0.5,afade=t=in:st=0:d=1,afade=t=out:st=19:d=1[bgm]"
        ));
    }

    #[tokio::test]
    async fn test_empty_video_list_opens_nothing() {
        let dir = tempdir().unwrap();
        let engine = CompositionEngine::new(three_clip_media());

        let err = engine.render(&config(Vec::new()), dir.path().join("out.mp4")).await.unwrap_err();

        assert!(matches!(err, VlogError::Config(ConfigError::NoVideos)));
        assert!(engine.media().opened().is_empty());
        assert!(engine.media().encoded().is_none());
    }

    #[tokio::test]
    async fn test_missing_clip_releases_opened_clips() {
        let dir = tempdir().unwrap();
        let engine = CompositionEngine::new(three_clip_media());
        let config = config(vec![VideoItem::new("a.mp4"), VideoItem::new("missing.mp4")]);

        let err = engine.render(&config, dir.path().join("out.mp4")).await.unwrap_err();

        assert!(matches!(err, VlogError::Resource(ResourceError::NotFound { .. })));
        assert_eq!(engine.media().released().len(), 1);
        engine.media().assert_all_released_once();
        assert!(dir_entries(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_encoder_failure_leaves_no_output() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("out.mp4");
        let engine = CompositionEngine::new(three_clip_media().with_encode(EncodeBehavior::Fail));

        let err = engine.render(&three_clip_config(), &output).await.unwrap_err();

        match err {
            VlogError::Encoding(EncodingError::EncoderFailed { diagnostics, .. }) => {
                assert!(diagnostics.contains("Unknown encoder"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        engine.media().assert_all_released_once();
        assert_eq!(engine.media().released().len(), 8);
        assert!(dir_entries(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_render_releases_everything() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("out.mp4");
        let engine = CompositionEngine::new(three_clip_media().with_encode(EncodeBehavior::Hang));
        let config = three_clip_config();

        let result = tokio::time::timeout(Duration::from_millis(100), engine.render(&config, &output)).await;

        assert!(result.is_err(), "render should still be running");
        engine.media().assert_all_released_once();
        assert_eq!(engine.media().released().len(), 8);
        assert!(dir_entries(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_overlay_timing_reaches_encoder() {
        let dir = tempdir().unwrap();
        let media = FakeMedia::new().with_clip("a.mp4", 5.0, false);
        let engine = CompositionEngine::new(media);
        let config = config(vec![VideoItem::new("a.mp4")
            .with_overlay(OverlayText::new("Hi", Position::Center).with_duration(3.0))
            .with_overlay(OverlayText::new("Late", Position::RightTop).with_start_time(2.0))
            .with_overlay(OverlayText::new("Gone", Position::LeftBottom).with_start_time(7.0))
            .with_overlay(OverlayText::new("  ", Position::Center))]);

        let report = engine.render(&config, dir.path().join("out.mp4")).await.unwrap();
        assert_eq!(report.captions, 2);
        assert_eq!(report.background_loops, 0);

        let (timeline, _) = engine.media().encoded().unwrap();
        let windows: Vec<_> = timeline.clips()[0].captions.iter().map(|c| c.window).collect();
        assert_eq!(windows, vec![OverlayWindow::new(0.0, 3.0), OverlayWindow::new(2.0, 3.0)]);
        assert!(timeline.audio().is_none());
    }

    #[tokio::test]
    async fn test_missing_output_directory() {
        let dir = tempdir().unwrap();
        let engine = CompositionEngine::new(three_clip_media());
        let config = config(vec![VideoItem::new("a.mp4")]);

        let err = engine
            .render(&config, dir.path().join("nested").join("out.mp4"))
            .await
            .unwrap_err();

        assert!(matches!(err, VlogError::Encoding(EncodingError::OutputFailed { .. })));
        engine.media().assert_all_released_once();
    }
}
