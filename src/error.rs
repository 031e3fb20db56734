use thiserror::Error;

/// Main error type for the vlogger library
#[derive(Error, Debug)]
pub enum VlogError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Resource error: {0}")]
    Resource(#[from] ResourceError),

    #[error("Encoding error: {0}")]
    Encoding(#[from] EncodingError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Generic error: {0}")]
    Generic(String),
}

/// Configuration errors. Raised before any media is opened.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("No videos specified.")]
    NoVideos,

    #[error("Invalid configuration value: {key} = {value}")]
    InvalidValue { key: String, value: String },

    #[error("Failed to parse configuration file {path}: {reason}")]
    ParseFailed { path: String, reason: String },

    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },
}

/// Missing or unreadable media
#[derive(Error, Debug)]
pub enum ResourceError {
    #[error("Media file not found: {path}")]
    NotFound { path: String },

    #[error("Failed to probe media file {path}: {reason}")]
    ProbeFailed { path: String, reason: String },

    #[error("Invalid media file {path}: {details}")]
    InvalidMedia { path: String, details: String },
}

/// Encoder failures
#[derive(Error, Debug)]
pub enum EncodingError {
    #[error("Encoder binary not found: {binary}")]
    EncoderNotFound { binary: String },

    #[error("Encoder exited with {status}: {diagnostics}")]
    EncoderFailed { status: String, diagnostics: String },

    #[error("Failed to write output {path}: {reason}")]
    OutputFailed { path: String, reason: String },
}

/// Convenience type alias for Results using VlogError
pub type Result<T> = std::result::Result<T, VlogError>;

impl VlogError {
    /// Create a generic error with a custom message
    pub fn generic<S: Into<String>>(message: S) -> Self {
        Self::Generic(message.into())
    }

    /// Check if retrying the same render could succeed.
    ///
    /// The engine itself never retries; this is a hint for callers.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Io(_) => true,
            Self::Resource(ResourceError::ProbeFailed { .. }) => true,
            Self::Encoding(EncodingError::OutputFailed { .. }) => true,
            _ => false,
        }
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::Config(ConfigError::NoVideos) => {
                "No videos specified. Add at least one [[videos]] entry to the configuration.".to_string()
            }
            Self::Config(ConfigError::FileNotFound { path }) => {
                format!("Configuration file '{}' not found.", path)
            }
            Self::Resource(ResourceError::NotFound { path }) => {
                format!("Could not find media file '{}'. Please check the path in your configuration.", path)
            }
            Self::Encoding(EncodingError::EncoderNotFound { binary }) => {
                format!("Could not run '{}'. Install FFmpeg or set ffmpeg_binary in the configuration.", binary)
            }
            _ => self.to_string(),
        }
    }
}
