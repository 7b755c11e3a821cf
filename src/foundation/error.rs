pub type CollageResult<T> = Result<T, CollageError>;

#[derive(thiserror::Error, Debug)]
pub enum CollageError {
    #[error("validation error: {0}")]
    Validation(String),

    /// Network failure, timeout, or non-2xx status on a remote resource.
    #[error("source fetch error: {0}")]
    SourceFetch(String),

    /// Malformed or unsupported image/animation payload.
    #[error("decode error: {0}")]
    Decode(String),

    #[error("encode error: {0}")]
    Encode(String),

    /// No usable realtime-capture backend (e.g. `ffmpeg` missing, no codec supported).
    #[error("recording unsupported: {0}")]
    RecordingUnsupported(String),

    /// Selection size out of range, malformed wallet address, export without a selection.
    #[error("invalid input: {0}")]
    UserInput(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CollageError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn source_fetch(msg: impl Into<String>) -> Self {
        Self::SourceFetch(msg.into())
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }

    pub fn recording_unsupported(msg: impl Into<String>) -> Self {
        Self::RecordingUnsupported(msg.into())
    }

    pub fn user_input(msg: impl Into<String>) -> Self {
        Self::UserInput(msg.into())
    }

    /// Failures the orchestrator answers by degrading to the static path.
    pub fn is_degradable(&self) -> bool {
        matches!(self, Self::Encode(_) | Self::RecordingUnsupported(_))
    }
}
