use std::path::Path;

use rayon::prelude::*;
use rayon::ThreadPool;
use tracing::debug;

use crate::error::Result;
use crate::media::{HandleId, MediaEngine, MediaHandle};

/// Tracks every handle opened during one render and releases each of them
/// exactly once, either explicitly through [`release_all`](Self::release_all)
/// or when the scope is dropped (failure, early return, cancellation).
pub struct ResourceScope<'e, E: MediaEngine> {
    engine: &'e E,
    open: Vec<HandleId>,
}

impl<'e, E: MediaEngine> ResourceScope<'e, E> {
    pub fn new(engine: &'e E) -> Self {
        Self {
            engine,
            open: Vec::new(),
        }
    }

    /// Open a clip and track its handle
    pub fn open_clip(&mut self, path: &Path) -> Result<MediaHandle> {
        let handle = self.engine.open_clip(path)?;
        self.open.push(handle.id);
        Ok(handle)
    }

    /// Open an audio file and track its handle
    pub fn open_audio(&mut self, path: &Path) -> Result<MediaHandle> {
        let handle = self.engine.open_audio(path)?;
        self.open.push(handle.id);
        Ok(handle)
    }

    /// Open `count` independent handles on the same audio file using the
    /// worker pool. Handles come back in open order.
    ///
    /// If any open fails, the handles that did open are still tracked so they
    /// get released with the rest of the scope.
    pub fn open_audio_copies(
        &mut self,
        pool: &ThreadPool,
        path: &Path,
        count: usize,
    ) -> Result<Vec<MediaHandle>> {
        let engine = self.engine;
        let results: Vec<Result<MediaHandle>> =
            pool.install(|| (0..count).into_par_iter().map(|_| engine.open_audio(path)).collect());

        let mut handles = Vec::with_capacity(count);
        let mut first_error = None;

        for result in results {
            match result {
                Ok(handle) => {
                    self.open.push(handle.id);
                    handles.push(handle);
                }
                Err(e) => {
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(handles),
        }
    }

    /// Number of handles currently tracked
    pub fn open_count(&self) -> usize {
        self.open.len()
    }

    /// Release every tracked handle, newest first. Returns how many were
    /// released by this call; a second call releases nothing.
    pub fn release_all(&mut self) -> usize {
        let count = self.open.len();
        while let Some(id) = self.open.pop() {
            self.engine.release(id);
        }

        if count > 0 {
            debug!("Released {} media handles via {}", count, self.engine.name());
        }
        count
    }
}

impl<E: MediaEngine> Drop for ResourceScope<'_, E> {
    fn drop(&mut self) {
        self.release_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::fake::FakeMedia;

    fn pool() -> ThreadPool {
        rayon::ThreadPoolBuilder::new().num_threads(2).build().unwrap()
    }

    #[test]
    fn test_release_all_releases_each_handle_once() {
        let media = FakeMedia::new().with_clip("a.mp4", 5.0, true).with_audio("bgm.mp3", 3.0);

        let mut scope = ResourceScope::new(&media);
        scope.open_clip(Path::new("a.mp4")).unwrap();
        scope.open_audio(Path::new("bgm.mp3")).unwrap();
        assert_eq!(scope.open_count(), 2);

        assert_eq!(scope.release_all(), 2);
        assert_eq!(scope.release_all(), 0);
        drop(scope);

        media.assert_all_released_once();
        assert_eq!(media.released().len(), 2);
    }

    #[test]
    fn test_drop_releases_handles() {
        let media = FakeMedia::new().with_clip("a.mp4", 5.0, true);
        {
            let mut scope = ResourceScope::new(&media);
            scope.open_clip(Path::new("a.mp4")).unwrap();
            scope.open_clip(Path::new("a.mp4")).unwrap();
        }
        media.assert_all_released_once();
        assert_eq!(media.released().len(), 2);
    }

    #[test]
    fn test_failed_open_is_not_tracked() {
        let media = FakeMedia::new();
        let mut scope = ResourceScope::new(&media);

        assert!(scope.open_clip(Path::new("missing.mp4")).is_err());
        assert_eq!(scope.open_count(), 0);
    }

    #[test]
    fn test_audio_copies_are_independent_and_ordered() {
        let media = FakeMedia::new().with_audio("bgm.mp3", 6.0);
        let mut scope = ResourceScope::new(&media);

        let copies = scope.open_audio_copies(&pool(), Path::new("bgm.mp3"), 4).unwrap();
        assert_eq!(copies.len(), 4);

        let mut ids: Vec<_> = copies.iter().map(|h| h.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 4, "each copy must be its own handle");
        assert!(copies.iter().all(|h| h.duration() == 6.0));

        drop(scope);
        media.assert_all_released_once();
    }

    #[test]
    fn test_partial_copy_failure_still_releases_opened_copies() {
        let media = FakeMedia::new().with_audio("bgm.mp3", 6.0).failing_after_opens(2);
        let mut scope = ResourceScope::new(&media);

        assert!(scope.open_audio_copies(&pool(), Path::new("bgm.mp3"), 4).is_err());
        assert_eq!(scope.open_count(), 2);

        drop(scope);
        media.assert_all_released_once();
        assert_eq!(media.released().len(), 2);
    }
}
