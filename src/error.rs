use thiserror::Error;

/// Failures raised by the indexing pipeline.
///
/// File-local variants (`Parse`, `UnsupportedLanguage`, `FileTooLarge`) are
/// contained by the batch coordinator and reported in the batch summary.
/// `Persistence` aborts the transaction in progress and propagates.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("parse error in {path}: {message}")]
    Parse { path: String, message: String },

    #[error("unsupported language `{0}`")]
    UnsupportedLanguage(String),

    #[error("{path} is {size} bytes, above the {limit} byte limit")]
    FileTooLarge { path: String, size: usize, limit: usize },

    #[error("unexpected `{kind}` node at {path}:{line}")]
    Extraction {
        path: String,
        kind: String,
        line: i64,
    },

    #[error("persistence failed for {scope}: {source}")]
    Persistence {
        scope: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("provisional caller {0} was never assigned a row id")]
    ResolutionInconsistency(usize),
}

impl IndexError {
    pub fn persistence(scope: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        IndexError::Persistence {
            scope: scope.into(),
            source: source.into(),
        }
    }

    /// True for errors that only concern one file and must not abort a batch.
    pub fn is_file_local(&self) -> bool {
        matches!(
            self,
            IndexError::Parse { .. }
                | IndexError::UnsupportedLanguage(_)
                | IndexError::FileTooLarge { .. }
                | IndexError::Extraction { .. }
        )
    }
}
