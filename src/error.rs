use thiserror::Error;

/// Failure side of a computation outcome. Never panics across the
/// scheduler boundary: a panicking computation is reported as `Panicked`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComputeError {
    #[error("source {source_name} row {index} is not an object")]
    InvalidRow { source_name: String, index: usize },
    #[error("duplicate column key: {0}")]
    DuplicateColumn(String),
    #[error("join field not declared in metadata: {0}")]
    UnknownJoinField(String),
    #[error("sort column not declared in metadata: {0}")]
    UnknownSortColumn(String),
    #[error("page size must be positive")]
    InvalidPageSize,
    #[error("computation panicked: {0}")]
    Panicked(String),
}

impl ComputeError {
    pub fn code(&self) -> &'static str {
        match self {
            ComputeError::InvalidRow { .. } => "invalid_row",
            ComputeError::DuplicateColumn(_) => "duplicate_column",
            ComputeError::UnknownJoinField(_) => "unknown_join_field",
            ComputeError::UnknownSortColumn(_) => "unknown_sort_column",
            ComputeError::InvalidPageSize => "invalid_page_size",
            ComputeError::Panicked(_) => "panicked",
        }
    }
}

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("feed io: {0}")]
    Io(#[from] std::io::Error),
}
