//! # Audio Routing and Mixing Module
//!
//! Decides which clips keep their native audio, builds the background music
//! track (looped, trimmed to the timeline, volume and fades applied) and
//! combines both into the final [`AudioMix`].
//!
//! ## Usage
//!
//! ```rust
//! use vlogger::audio::loop_count;
//!
//! // A 3 second loop needs four copies to cover 10 seconds
//! assert_eq!(loop_count(10.0, 3.0), 4);
//! ```

pub mod background;
pub mod mixer;
pub mod routing;
pub mod types;

pub use background::{loop_count, BackgroundTrackBuilder};
pub use mixer::mix;
pub use routing::{mute_decisions, resolve_mute};
pub use types::{AudioMix, AudioSource, BackgroundTrack};
