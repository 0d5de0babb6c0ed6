use pushframe_core::FrameError;

#[derive(Debug, thiserror::Error)]
pub enum AnalyticsError {
    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error(
        "missing id column: pass id_column or set an indexer on the input frame"
    )]
    MissingIdColumn,

    #[error("model '{0}' not found; train it with fit() first")]
    NoSuchModel(String),

    #[error("procedure {proc} did not produce the expected result: {detail}")]
    UnexpectedResult { proc: String, detail: String },
}

pub type Result<T, E = AnalyticsError> = std::result::Result<T, E>;
