/// Errors that can occur while encoding or decoding frame files
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// I/O error during file operations
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file does not start with the frame-file magic
    #[error("not a frame file (bad magic)")]
    BadMagic,

    /// A frame carried an unknown frame-type tag
    #[error("unknown frame type tag: {0}")]
    UnknownFrameType(u8),

    /// A value carried an unknown type tag
    #[error("unknown value tag: {0}")]
    UnknownValueTag(u8),

    /// A units field carried an unknown tag
    #[error("unknown timestream units tag: {0}")]
    UnknownUnits(u8),

    /// A key or string value was not valid UTF-8
    #[error("invalid UTF-8 in string: {0}")]
    InvalidString(#[from] std::string::FromUtf8Error),

    /// Structurally invalid data (oversized lengths, truncated payloads)
    #[error("corrupt frame data: {0}")]
    Corrupt(String),
}
