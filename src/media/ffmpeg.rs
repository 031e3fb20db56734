use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use tracing::{debug, warn};

use crate::config::VlogConfig;
use crate::error::{EncodingError, ResourceError, Result};
use crate::media::filter_graph::{build_ffmpeg_args, compile};
use crate::media::probe::{probe_audio_duration, probe_with_ffprobe};
use crate::media::{HandleId, MediaEngine, MediaHandle, MediaInfo, RenderJob};

/// Lines of encoder stderr kept in error reports
const DIAGNOSTIC_LINES: usize = 20;

/// Media engine backed by the ffmpeg/ffprobe command line tools
pub struct FfmpegEngine {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
    next_handle: AtomicU64,
    open: Mutex<HashMap<HandleId, PathBuf>>,
    probe_cache: Mutex<HashMap<PathBuf, MediaInfo>>,
}

impl FfmpegEngine {
    pub fn new<P: Into<PathBuf>, Q: Into<PathBuf>>(ffmpeg: P, ffprobe: Q) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
            next_handle: AtomicU64::new(1),
            open: Mutex::new(HashMap::new()),
            probe_cache: Mutex::new(HashMap::new()),
        }
    }

    /// Engine using the binaries named in the configuration
    pub fn from_config(config: &VlogConfig) -> Self {
        Self::new(config.ffmpeg_binary.trim(), config.ffprobe_binary())
    }

    /// Check that both binaries can be run
    pub fn check_available(&self) -> Result<()> {
        for binary in [&self.ffmpeg, &self.ffprobe] {
            let ok = Command::new(binary)
                .arg("-version")
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .map(|status| status.success())
                .unwrap_or(false);

            if !ok {
                return Err(EncodingError::EncoderNotFound {
                    binary: binary.display().to_string(),
                }
                .into());
            }
        }
        Ok(())
    }

    /// Handles opened and not yet released
    pub fn open_handles(&self) -> usize {
        lock(&self.open).len()
    }

    fn register(&self, path: &Path, info: MediaInfo) -> MediaHandle {
        let id = self.next_handle.fetch_add(1, Ordering::SeqCst);
        lock(&self.open).insert(id, path.to_path_buf());
        debug!("Opened handle {} for {}", id, path.display());

        MediaHandle {
            id,
            path: path.to_path_buf(),
            info,
        }
    }

    /// Probe once per path; later opens of the same file reuse the result
    fn probe_cached<F>(&self, path: &Path, probe: F) -> Result<MediaInfo>
    where
        F: FnOnce(&Path) -> Result<MediaInfo>,
    {
        if let Some(info) = lock(&self.probe_cache).get(path) {
            return Ok(info.clone());
        }

        let info = probe(path)?;
        lock(&self.probe_cache).insert(path.to_path_buf(), info.clone());
        Ok(info)
    }
}

impl MediaEngine for FfmpegEngine {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    fn open_clip(&self, path: &Path) -> Result<MediaHandle> {
        ensure_exists(path)?;

        let info = self.probe_cached(path, |path| probe_with_ffprobe(&self.ffprobe, path))?;
        if info.resolution.is_none() {
            return Err(ResourceError::InvalidMedia {
                path: path.display().to_string(),
                details: "no video stream".to_string(),
            }
            .into());
        }
        if info.duration <= 0.0 {
            return Err(ResourceError::InvalidMedia {
                path: path.display().to_string(),
                details: format!("duration {} is not positive", info.duration),
            }
            .into());
        }

        Ok(self.register(path, info))
    }

    fn open_audio(&self, path: &Path) -> Result<MediaHandle> {
        ensure_exists(path)?;

        let info = self.probe_cached(path, |path| match probe_audio_duration(path) {
            Ok(duration) => Ok(MediaInfo::audio(duration)),
            Err(e) => {
                debug!("symphonia could not read {}: {}, trying ffprobe", path.display(), e);
                let info = probe_with_ffprobe(&self.ffprobe, path)?;
                if !info.has_audio {
                    return Err(ResourceError::InvalidMedia {
                        path: path.display().to_string(),
                        details: "no audio stream".to_string(),
                    }
                    .into());
                }
                Ok(MediaInfo::audio(info.duration))
            }
        })?;

        Ok(self.register(path, info))
    }

    fn release(&self, id: HandleId) {
        match lock(&self.open).remove(&id) {
            Some(path) => debug!("Released handle {} for {}", id, path.display()),
            None => warn!("Release of unknown media handle {}", id),
        }
    }

    fn encode(&self, job: &RenderJob<'_>, output: &Path) -> impl Future<Output = Result<()>> + Send {
        let ffmpeg = self.ffmpeg.clone();
        let output = output.to_path_buf();
        let args = compile(job).map(|plan| {
            debug!("Filter graph: {}", plan.filter_graph);
            build_ffmpeg_args(&plan, &output)
        });

        async move { run_ffmpeg(&ffmpeg, &args?, &output).await }
    }
}

/// Run ffmpeg to completion. The child is killed if the future is dropped.
async fn run_ffmpeg(ffmpeg: &Path, args: &[String], output: &Path) -> Result<()> {
    debug!("Running {} with {} arguments", ffmpeg.display(), args.len());

    let result = tokio::process::Command::new(ffmpeg)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => EncodingError::EncoderNotFound {
                binary: ffmpeg.display().to_string(),
            },
            _ => EncodingError::EncoderFailed {
                status: "not started".to_string(),
                diagnostics: e.to_string(),
            },
        })?;

    if !result.status.success() {
        return Err(EncodingError::EncoderFailed {
            status: result.status.to_string(),
            diagnostics: stderr_tail(&result.stderr),
        }
        .into());
    }

    match std::fs::metadata(output) {
        Ok(meta) if meta.len() > 0 => Ok(()),
        Ok(_) => Err(EncodingError::OutputFailed {
            path: output.display().to_string(),
            reason: "encoder produced an empty file".to_string(),
        }
        .into()),
        Err(e) => Err(EncodingError::OutputFailed {
            path: output.display().to_string(),
            reason: e.to_string(),
        }
        .into()),
    }
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(DIAGNOSTIC_LINES);
    lines[start..].join("\n")
}

fn ensure_exists(path: &Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(ResourceError::NotFound {
            path: path.display().to_string(),
        }
        .into())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
