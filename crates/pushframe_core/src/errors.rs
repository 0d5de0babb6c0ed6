#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("unknown column '{column}' in frame '{frame}'")]
    UnknownColumn { column: String, frame: String },

    #[error("duplicate column '{column}' in frame '{frame}'")]
    DuplicateColumn { column: String, frame: String },

    #[error("empty column selection for frame '{frame}'")]
    EmptySelection { frame: String },

    #[error("no table or view named '{0}' in the database")]
    NoSuchObject(String),

    #[error(
        "no active AutoDeleteContext; run inside a context or set an explicit name in '{param}'"
    )]
    MissingContext { param: &'static str },

    #[error("no active AutoDeleteContext to register '{0}' with")]
    InactiveContext(String),

    #[error("invalid operation on frame '{frame}': {message}")]
    InvalidOperation { frame: String, message: String },

    #[error("connection error: {0}")]
    Connection(String),
}

pub type Result<T, E = FrameError> = std::result::Result<T, E>;
