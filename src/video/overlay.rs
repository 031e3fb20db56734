//! Caption timing, font and placement resolution.

use std::path::{Path, PathBuf};

use crate::config::{FontSettings, OverlayText, Position, DEFAULT_FONT_SIZE};
use crate::video::types::{
    Anchor, AnchorCoord, FontFace, OverlayWindow, ResolvedFont, ResolvedOverlay,
};

/// Family used when neither the overlay nor the global font names one
pub const FALLBACK_FONT_FAMILY: &str = "DejaVu Sans";

const FONT_FILE_EXTENSIONS: &[&str] = &["ttf", "otf", "ttc", "otc", "woff", "woff2", "pfb"];

/// Resolve a caption for a clip of `clip_duration` seconds.
///
/// Returns `None` for blank text, which is skipped during compositing.
pub fn resolve_overlay(
    overlay: &OverlayText,
    clip_duration: f64,
    global_font: &FontSettings,
) -> Option<ResolvedOverlay> {
    if overlay.text.trim().is_empty() {
        return None;
    }

    Some(ResolvedOverlay {
        text: overlay.text.clone(),
        window: resolve_window(overlay.start_time, overlay.duration, clip_duration),
        position: overlay.position,
        font: resolve_font(overlay.font.as_ref(), global_font),
    })
}

/// Caption visibility window.
///
/// 1. start and duration: `[start, start + duration)`
/// 2. start only: `[start, clip_duration)`, empty when start is past the end
/// 3. duration only: `[0, duration)`
/// 4. neither: `[0, clip_duration)`
pub fn resolve_window(start_time: Option<f64>, duration: Option<f64>, clip_duration: f64) -> OverlayWindow {
    match (start_time, duration) {
        (Some(start), Some(duration)) => OverlayWindow::new(start, duration),
        (Some(start), None) => OverlayWindow::new(start, (clip_duration - start).max(0.0)),
        (None, Some(duration)) => OverlayWindow::new(0.0, duration),
        (None, None) => OverlayWindow::new(0.0, clip_duration),
    }
}

/// Per-field font resolution: overlay, then global, then the fixed fallback.
pub fn resolve_font(overlay: Option<&FontSettings>, global: &FontSettings) -> ResolvedFont {
    let path = first_present([
        overlay.and_then(|font| non_blank(font.font_path.as_deref())),
        non_blank(global.font_path.as_deref()),
    ]);

    let size = first_present([overlay.and_then(|font| font.font_size), global.font_size])
        .unwrap_or(DEFAULT_FONT_SIZE);

    ResolvedFont {
        face: path.map(font_face).unwrap_or_else(|| FontFace::Family(FALLBACK_FONT_FAMILY.to_string())),
        size,
    }
}

fn first_present<T>(candidates: impl IntoIterator<Item = Option<T>>) -> Option<T> {
    candidates.into_iter().flatten().next()
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// A setting with a path separator or a font file extension is a file,
/// anything else is a family name.
fn font_face(setting: &str) -> FontFace {
    let path = Path::new(setting);
    let has_font_extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| FONT_FILE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false);

    if has_font_extension || setting.contains('/') || setting.contains('\\') {
        FontFace::File(PathBuf::from(setting))
    } else {
        FontFace::Family(setting.to_string())
    }
}

impl Position {
    /// Relative anchor on the frame
    pub fn anchor(&self) -> Anchor {
        match self {
            Self::LeftBottom => Anchor {
                x: AnchorCoord::Fraction(0.025),
                y: AnchorCoord::Fraction(0.9),
            },
            Self::Center => Anchor {
                x: AnchorCoord::Center,
                y: AnchorCoord::Center,
            },
            Self::RightTop => Anchor {
                x: AnchorCoord::End,
                y: AnchorCoord::Start,
            },
        }
    }
}
