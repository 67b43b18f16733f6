use thiserror::Error;

/// Failures of the pure job core: tokenizing raw args and building
/// argument vectors. Nothing here touches a process or the filesystem.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum JobError {
    #[error("invalid command line: trailing escape")]
    TrailingEscape,
    #[error("invalid command line: unclosed quote")]
    UnclosedQuote,
    #[error("rawArgs is required for raw mode")]
    EmptyRawArgs,
    #[error("inputPath and outputPath are required")]
    MissingPaths,
    #[error("{field} is required because raw args contain {placeholder}")]
    MissingPlaceholderPath {
        field: &'static str,
        placeholder: &'static str,
    },
    #[error("unsupported preset: {0}")]
    UnsupportedPreset(String),
}

/// Failures of the process-facing collaborators: spawning ffmpeg/ffprobe,
/// decoding probe output, loading job files.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Job(#[from] JobError),
    #[error("another transcode is already running; stop it first")]
    Busy,
    #[error("{tool} binary not found; install FFmpeg or pass an explicit path")]
    BinaryNotFound { tool: &'static str },
    #[error("failed to start {tool}: {source}")]
    Spawn {
        tool: &'static str,
        source: std::io::Error,
    },
    #[error("{tool} failed: {message}")]
    Tool {
        tool: &'static str,
        message: String,
    },
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl RunError {
    pub(crate) fn spawn(tool: &'static str, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            RunError::BinaryNotFound { tool }
        } else {
            RunError::Spawn { tool, source }
        }
    }
}
