use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read collection file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse json in {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("document without an id in {path} (line {line})")]
    MissingId { path: String, line: usize },
}

#[derive(Debug, Error)]
pub enum MigrateError {
    #[error("migration cancelled")]
    Cancelled,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Source(#[from] SourceError),
}
