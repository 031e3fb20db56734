//! In-memory media engine for tests. Records every open, release and encode.

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::error::{EncodingError, ResourceError, Result};
use crate::media::{HandleId, MediaEngine, MediaHandle, MediaInfo, RenderJob};
use crate::video::Timeline;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EncodeBehavior {
    Succeed,
    Fail,
    Hang,
}

#[derive(Default)]
struct FakeState {
    opened: Vec<(HandleId, PathBuf)>,
    released: Vec<HandleId>,
    encoded: Option<(Timeline, PathBuf)>,
}

pub(crate) struct FakeMedia {
    clips: HashMap<PathBuf, MediaInfo>,
    audio: HashMap<PathBuf, MediaInfo>,
    encode: EncodeBehavior,
    open_budget: Option<usize>,
    opens: AtomicUsize,
    next_id: AtomicU64,
    state: Mutex<FakeState>,
}

impl FakeMedia {
    pub(crate) fn new() -> Self {
        Self {
            clips: HashMap::new(),
            audio: HashMap::new(),
            encode: EncodeBehavior::Succeed,
            open_budget: None,
            opens: AtomicUsize::new(0),
            next_id: AtomicU64::new(1),
            state: Mutex::new(FakeState::default()),
        }
    }

    pub(crate) fn with_clip(mut self, path: &str, duration: f64, has_audio: bool) -> Self {
        self.clips
            .insert(PathBuf::from(path), MediaInfo::video(duration, (1280, 720), 30.0, has_audio));
        self
    }

    pub(crate) fn with_audio(mut self, path: &str, duration: f64) -> Self {
        self.audio.insert(PathBuf::from(path), MediaInfo::audio(duration));
        self
    }

    pub(crate) fn with_encode(mut self, behavior: EncodeBehavior) -> Self {
        self.encode = behavior;
        self
    }

    /// Only the first `count` opens succeed
    pub(crate) fn failing_after_opens(mut self, count: usize) -> Self {
        self.open_budget = Some(count);
        self
    }

    pub(crate) fn opened(&self) -> Vec<(HandleId, PathBuf)> {
        self.lock().opened.clone()
    }

    pub(crate) fn released(&self) -> Vec<HandleId> {
        self.lock().released.clone()
    }

    pub(crate) fn encoded(&self) -> Option<(Timeline, PathBuf)> {
        self.lock().encoded.clone()
    }

    pub(crate) fn assert_all_released_once(&self) {
        let state = self.lock();
        let mut opened: Vec<_> = state.opened.iter().map(|(id, _)| *id).collect();
        let mut released = state.released.clone();
        opened.sort_unstable();
        released.sort_unstable();
        assert_eq!(opened, released, "every opened handle must be released exactly once");
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn open(&self, table: &HashMap<PathBuf, MediaInfo>, path: &Path) -> Result<MediaHandle> {
        let info = table.get(path).cloned().ok_or_else(|| ResourceError::NotFound {
            path: path.display().to_string(),
        })?;

        if let Some(budget) = self.open_budget {
            if self.opens.fetch_add(1, Ordering::SeqCst) >= budget {
                return Err(ResourceError::ProbeFailed {
                    path: path.display().to_string(),
                    reason: "open budget exhausted".to_string(),
                }
                .into());
            }
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.lock().opened.push((id, path.to_path_buf()));
        Ok(MediaHandle {
            id,
            path: path.to_path_buf(),
            info,
        })
    }
}

impl MediaEngine for FakeMedia {
    fn name(&self) -> &str {
        "fake"
    }

    fn open_clip(&self, path: &Path) -> Result<MediaHandle> {
        self.open(&self.clips, path)
    }

    fn open_audio(&self, path: &Path) -> Result<MediaHandle> {
        self.open(&self.audio, path)
    }

    fn release(&self, id: HandleId) {
        self.lock().released.push(id);
    }

    fn encode(&self, job: &RenderJob<'_>, output: &Path) -> impl Future<Output = Result<()>> + Send {
        let behavior = self.encode;
        let result: Result<()> = match behavior {
            EncodeBehavior::Fail => Err(EncodingError::EncoderFailed {
                status: "exit status: 1".to_string(),
                diagnostics: "Unknown encoder 'libx264'".to_string(),
            }
            .into()),
            EncodeBehavior::Succeed | EncodeBehavior::Hang => {
                self.lock().encoded = Some((job.timeline.clone(), output.to_path_buf()));
                std::fs::write(output, b"fake media").map_err(Into::into)
            }
        };

        async move {
            if behavior == EncodeBehavior::Hang {
                std::future::pending::<()>().await;
            }
            result
        }
    }
}
