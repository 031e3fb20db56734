use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Font size used when neither the overlay nor the global font sets one
pub const DEFAULT_FONT_SIZE: u32 = 24;

/// Main configuration for a vlog render
///
/// Scalar settings come first so the TOML representation keeps them above
/// the `[[videos]]`, `[bgm]` and other tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VlogConfig {
    /// Mute every clip's native audio unless the clip says otherwise
    #[serde(default)]
    pub global_mute: bool,

    /// Path to the FFmpeg binary
    #[serde(default = "default_ffmpeg_binary")]
    pub ffmpeg_binary: String,

    /// Path to the ffprobe binary (defaults to the one next to `ffmpeg_binary`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ffprobe_binary: Option<String>,

    /// Path to the ImageMagick `convert` binary
    #[serde(default = "default_imagemagick_binary")]
    pub imagemagick_binary: String,

    /// Worker threads for caption resolution and BGM loading (one per CPU
    /// when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_threads: Option<usize>,

    /// Videos to concatenate, in playback order
    #[serde(default)]
    pub videos: Vec<VideoItem>,

    /// Background music
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bgm: Option<BgmSettings>,

    /// Output encoding settings
    #[serde(default)]
    pub encoding: EncodingSettings,

    /// Font used by overlays that don't specify their own
    #[serde(default)]
    pub global_font: FontSettings,

    /// How captions are drawn
    #[serde(default)]
    pub caption_style: CaptionStyle,
}

fn default_ffmpeg_binary() -> String {
    "ffmpeg".to_string()
}

fn default_imagemagick_binary() -> String {
    "convert".to_string()
}

impl Default for VlogConfig {
    fn default() -> Self {
        Self {
            global_mute: false,
            ffmpeg_binary: default_ffmpeg_binary(),
            ffprobe_binary: None,
            imagemagick_binary: default_imagemagick_binary(),
            processing_threads: None,
            videos: Vec::new(),
            bgm: None,
            encoding: EncodingSettings::default(),
            global_font: FontSettings::default(),
            caption_style: CaptionStyle::default(),
        }
    }
}

impl VlogConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound { path: path.display().to_string() })?;

        Self::from_toml_str(&content).map_err(|e| {
            ConfigError::ParseFailed {
                path: path.display().to_string(),
                reason: e.to_string(),
            }
            .into()
        })
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::InvalidValue {
            key: "config".to_string(),
            value: e.to_string(),
        })?;

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate the configuration
    ///
    /// An empty video list is reported first, as [`ConfigError::NoVideos`].
    pub fn validate(&self) -> Result<()> {
        if self.videos.is_empty() {
            return Err(ConfigError::NoVideos.into());
        }

        if self.processing_threads == Some(0) {
            return Err(invalid("processing_threads", 0));
        }

        if self.ffmpeg_binary.trim().is_empty() {
            return Err(invalid("ffmpeg_binary", "\"\""));
        }

        for (i, video) in self.videos.iter().enumerate() {
            video.validate(&format!("videos[{}]", i))?;
        }

        if let Some(bgm) = &self.bgm {
            bgm.validate()?;
        }

        self.global_font.validate("global_font")?;
        Ok(())
    }

    /// Worker pool size, resolved on the machine doing the render
    pub fn worker_threads(&self) -> usize {
        self.processing_threads.unwrap_or_else(num_cpus::get)
    }

    /// ffprobe location: explicit setting, or the sibling of `ffmpeg_binary`
    pub fn ffprobe_binary(&self) -> String {
        if let Some(ffprobe) = self.ffprobe_binary.as_deref().map(str::trim) {
            if !ffprobe.is_empty() {
                return ffprobe.to_string();
            }
        }

        let ffmpeg = Path::new(self.ffmpeg_binary.trim());
        match (ffmpeg.parent(), ffmpeg.file_name().and_then(|n| n.to_str())) {
            (Some(dir), Some(name)) if !dir.as_os_str().is_empty() => dir
                .join(name.replacen("ffmpeg", "ffprobe", 1))
                .display()
                .to_string(),
            _ => "ffprobe".to_string(),
        }
    }

    /// Sample configuration used for template generation
    pub fn example() -> Self {
        Self {
            videos: vec![
                VideoItem::new("op.mp4").with_overlay(OverlayText::new("Welcome to OP", Position::Center)),
                VideoItem::new("video1.mp4")
                    .with_overlay(OverlayText::new("Video 1", Position::LeftBottom))
                    .with_overlay(OverlayText::new("Video 1 :)", Position::RightTop)),
                VideoItem::new("ed.mp4").with_overlay(OverlayText::new("This is ED", Position::Center)),
            ],
            bgm: Some(BgmSettings {
                path: "bgm.mp3".to_string(),
                fade_in: 2.0,
                fade_out: 3.0,
                volume_percentage: 100.0,
            }),
            global_font: FontSettings {
                font_path: None,
                font_size: Some(100),
            },
            ..Self::default()
        }
    }
}

fn invalid(key: &str, value: impl fmt::Display) -> crate::error::VlogError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
    .into()
}

/// A single source clip with its captions
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VideoItem {
    /// Path to the video file
    pub path: String,

    /// Captions shown on top of this clip
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub overlays: Vec<OverlayText>,

    /// Per-clip mute override; falls back to `global_mute` when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mute: Option<bool>,
}

impl VideoItem {
    pub fn new<S: Into<String>>(path: S) -> Self {
        Self {
            path: path.into(),
            overlays: Vec::new(),
            mute: None,
        }
    }

    pub fn with_overlay(mut self, overlay: OverlayText) -> Self {
        self.overlays.push(overlay);
        self
    }

    pub fn with_mute(mut self, mute: bool) -> Self {
        self.mute = Some(mute);
        self
    }

    fn validate(&self, key: &str) -> Result<()> {
        if self.path.trim().is_empty() {
            return Err(invalid(&format!("{}.path", key), "\"\""));
        }

        for (i, overlay) in self.overlays.iter().enumerate() {
            overlay.validate(&format!("{}.overlays[{}]", key, i))?;
        }
        Ok(())
    }
}

/// Where a caption is anchored on the frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Position {
    #[default]
    LeftBottom,
    Center,
    RightTop,
}

/// Timed caption attached to a clip
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OverlayText {
    /// Text to display. Blank text is skipped.
    pub text: String,

    /// Start time in seconds, relative to the clip
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<f64>,

    /// How long the caption stays visible, in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,

    #[serde(default)]
    pub position: Position,

    /// Font overrides for this caption only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font: Option<FontSettings>,
}

impl OverlayText {
    pub fn new<S: Into<String>>(text: S, position: Position) -> Self {
        Self {
            text: text.into(),
            start_time: None,
            duration: None,
            position,
            font: None,
        }
    }

    pub fn with_start_time(mut self, start_time: f64) -> Self {
        self.start_time = Some(start_time);
        self
    }

    pub fn with_duration(mut self, duration: f64) -> Self {
        self.duration = Some(duration);
        self
    }

    fn validate(&self, key: &str) -> Result<()> {
        if let Some(start) = self.start_time {
            if !start.is_finite() || start < 0.0 {
                return Err(invalid(&format!("{}.start_time", key), start));
            }
        }

        if let Some(duration) = self.duration {
            if !duration.is_finite() || duration <= 0.0 {
                return Err(invalid(&format!("{}.duration", key), duration));
            }
        }

        if let Some(font) = &self.font {
            font.validate(&format!("{}.font", key))?;
        }
        Ok(())
    }
}

/// Font settings; every field is optional so overlays can override one at a time
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FontSettings {
    /// Font file path or font family name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<u32>,
}

impl FontSettings {
    fn validate(&self, key: &str) -> Result<()> {
        if self.font_size == Some(0) {
            return Err(invalid(&format!("{}.font_size", key), 0));
        }
        Ok(())
    }
}

/// Background music settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BgmSettings {
    /// Path to the audio file. Blank means no background music.
    pub path: String,

    /// Fade-in length in seconds
    #[serde(default)]
    pub fade_in: f64,

    /// Fade-out length in seconds
    #[serde(default)]
    pub fade_out: f64,

    /// Volume in percent; 100 leaves the source untouched
    #[serde(default = "default_volume_percentage")]
    pub volume_percentage: f64,
}

fn default_volume_percentage() -> f64 {
    100.0
}

impl BgmSettings {
    pub fn new<S: Into<String>>(path: S) -> Self {
        Self {
            path: path.into(),
            fade_in: 0.0,
            fade_out: 0.0,
            volume_percentage: default_volume_percentage(),
        }
    }

    /// Whether a background track should be built at all
    pub fn is_enabled(&self) -> bool {
        !self.path.trim().is_empty()
    }

    fn validate(&self) -> Result<()> {
        if !self.fade_in.is_finite() || self.fade_in < 0.0 {
            return Err(invalid("bgm.fade_in", self.fade_in));
        }

        if !self.fade_out.is_finite() || self.fade_out < 0.0 {
            return Err(invalid("bgm.fade_out", self.fade_out));
        }

        if !self.volume_percentage.is_finite() || self.volume_percentage < 0.0 {
            return Err(invalid("bgm.volume_percentage", self.volume_percentage));
        }
        Ok(())
    }
}

/// Video codecs accepted for the final render
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum VideoCodec {
    #[default]
    #[serde(rename = "libx264")]
    Libx264,
    #[serde(rename = "libx265")]
    Libx265,
    #[serde(rename = "libvpx-vp9")]
    LibvpxVp9,
    #[serde(rename = "libaom-av1")]
    LibaomAv1,
    #[serde(rename = "mpeg4")]
    Mpeg4,
}

impl VideoCodec {
    /// Encoder name as understood by ffmpeg
    pub fn ffmpeg_name(&self) -> &'static str {
        match self {
            Self::Libx264 => "libx264",
            Self::Libx265 => "libx265",
            Self::LibvpxVp9 => "libvpx-vp9",
            Self::LibaomAv1 => "libaom-av1",
            Self::Mpeg4 => "mpeg4",
        }
    }

    /// Only the x264/x265 encoders understand `-preset`
    pub fn supports_preset(&self) -> bool {
        matches!(self, Self::Libx264 | Self::Libx265)
    }
}

impl fmt::Display for VideoCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.ffmpeg_name())
    }
}

/// x264/x265 speed presets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    Ultrafast,
    Superfast,
    Veryfast,
    Faster,
    Fast,
    #[default]
    Medium,
    Slow,
    Slower,
    Veryslow,
    Placebo,
}

impl Preset {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ultrafast => "ultrafast",
            Self::Superfast => "superfast",
            Self::Veryfast => "veryfast",
            Self::Faster => "faster",
            Self::Fast => "fast",
            Self::Medium => "medium",
            Self::Slow => "slow",
            Self::Slower => "slower",
            Self::Veryslow => "veryslow",
            Self::Placebo => "placebo",
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Target bitrate such as `8000k`, `8M` or `2.5M`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Bitrate(String);

impl Bitrate {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Bitrate {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        let trimmed = value.trim();
        let number = trimmed
            .strip_suffix(['k', 'K', 'm', 'M'])
            .unwrap_or(trimmed);
        let (whole, fraction) = match number.split_once('.') {
            Some((whole, fraction)) => (whole, Some(fraction)),
            None => (number, None),
        };

        let is_digits = |part: &str| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit());
        if !is_digits(whole) || !fraction.map_or(true, is_digits) {
            return Err(format!("invalid bitrate '{}', expected e.g. 8000k, 8M or 2.5M", value));
        }
        Ok(Self(trimmed.to_string()))
    }
}

impl From<Bitrate> for String {
    fn from(bitrate: Bitrate) -> Self {
        bitrate.0
    }
}

impl Default for Bitrate {
    fn default() -> Self {
        Self("8000k".to_string())
    }
}

impl fmt::Display for Bitrate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Output encoding settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EncodingSettings {
    #[serde(default)]
    pub codec: VideoCodec,

    #[serde(default)]
    pub bitrate: Bitrate,

    #[serde(default)]
    pub preset: Preset,
}

/// How captions are drawn
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CaptionStyle {
    /// Text color (ffmpeg color syntax)
    #[serde(default = "default_text_color")]
    pub text_color: String,

    /// Background box color; no box when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub box_color: Option<String>,

    /// Box padding around the text, in pixels
    #[serde(default)]
    pub box_padding: u32,

    /// Text outline color; no outline when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border_color: Option<String>,

    /// Text outline width, in pixels
    #[serde(default)]
    pub border_width: u32,
}

fn default_text_color() -> String {
    "black".to_string()
}

impl Default for CaptionStyle {
    fn default() -> Self {
        Self {
            text_color: default_text_color(),
            box_color: Some("white".to_string()),
            box_padding: 10,
            border_color: None,
            border_width: 0,
        }
    }
}

impl CaptionStyle {
    /// Plain text with no box and no outline
    pub fn plain<S: Into<String>>(text_color: S) -> Self {
        Self {
            text_color: text_color.into(),
            box_color: None,
            box_padding: 0,
            border_color: None,
            border_width: 0,
        }
    }
}
