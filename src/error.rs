use thiserror::Error;

/// Failures surfaced by the aggregation engine.
///
/// Sorting problems never show up here: a bad column falls back to `Plays`
/// and a failed sort serves the unsorted view.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// A history file is not a JSON array of objects.
    #[error("malformed input in {file}: {reason}")]
    MalformedInput { file: String, reason: String },

    #[error("no listening history has been loaded")]
    NoSessionLoaded,

    #[error("unknown aggregation level '{0}' (expected song, album or artist)")]
    UnknownAggregationLevel(String),

    #[error("unknown detail type '{0}' (expected album or artist)")]
    UnknownDetailType(String),
}

impl EngineError {
    pub(crate) fn malformed(file: &str, reason: impl Into<String>) -> Self {
        Self::MalformedInput {
            file: file.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
