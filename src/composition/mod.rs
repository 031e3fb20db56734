//! # Composition Engine
//!
//! Coordinates clip composition, background music and mixing, then hands the
//! finished timeline to the media engine for encoding.

pub mod engine;

// Re-exports for convenience
pub use engine::{CompositionEngine, RenderReport};
