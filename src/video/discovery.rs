use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::{VideoItem, VlogConfig};
use crate::error::{ConfigError, Result};

/// Parse a comma-separated extension list such as `"mp4, MOV"`
pub fn parse_extensions(list: &str) -> Vec<String> {
    list.split(',')
        .map(|ext| ext.trim().trim_start_matches('.').to_lowercase())
        .filter(|ext| !ext.is_empty())
        .collect()
}

/// List video files in `directory` whose extension matches one of
/// `extensions` (case-insensitive). Hidden files are skipped and the result
/// is sorted by file name.
pub fn find_videos<P: AsRef<Path>>(directory: P, extensions: &[String]) -> Result<Vec<PathBuf>> {
    let directory = directory.as_ref();

    if !directory.is_dir() {
        return Err(ConfigError::InvalidValue {
            key: "dir".to_string(),
            value: directory.display().to_string(),
        }
        .into());
    }

    let mut videos = Vec::new();
    for entry in std::fs::read_dir(directory)? {
        let path = entry?.path();

        if path.is_file() && !is_hidden_file(&path) && has_extension(&path, extensions) {
            debug!("Found video: {}", path.display());
            videos.push(path);
        }
    }

    videos.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(videos)
}

/// Configuration template listing the videos found in `directory`.
///
/// Falls back to [`VlogConfig::example`] when nothing matches.
pub fn template_from_directory<P: AsRef<Path>>(directory: P, extensions: &[String]) -> Result<VlogConfig> {
    let directory = directory.as_ref();
    let videos = find_videos(directory, extensions)?;

    let mut config = VlogConfig::example();
    if videos.is_empty() {
        info!(
            "No video files ({}) found in {}, generating the generic template",
            extensions.join(","),
            directory.display()
        );
        return Ok(config);
    }

    info!("Found {} video file(s) in {}", videos.len(), directory.display());
    config.videos = videos
        .into_iter()
        .map(|path| VideoItem::new(path.display().to_string()))
        .collect();
    Ok(config)
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| extensions.iter().any(|wanted| wanted.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

fn is_hidden_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}
