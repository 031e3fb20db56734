//! # Video Composition Module
//!
//! Resolves caption timing and placement, composes each clip, and joins the
//! composed clips into a single [`Timeline`].

pub mod compositor;
pub mod discovery;
pub mod overlay;
pub mod timeline;
pub mod types;

pub use compositor::ClipCompositor;
pub use overlay::{resolve_font, resolve_overlay, resolve_window, FALLBACK_FONT_FAMILY};
pub use types::{
    Anchor, AnchorCoord, ComposedClip, FontFace, OverlayWindow, ResolvedFont, ResolvedOverlay, Timeline,
};
