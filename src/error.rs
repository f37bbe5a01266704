use std::path::PathBuf;

/// Errors surfaced by the analysis core and the ingest layer.
///
/// Every variant names the collaborator (`embeddings`, `links`, `performance`,
/// `volumes`) so the caller can report it without further context.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{collaborator}: malformed {field}: {message}")]
    InputShape {
        collaborator: &'static str,
        field: String,
        message: String,
    },

    #[error("{collaborator}: required column `{column}` not found (available: {available})")]
    MissingColumn {
        collaborator: &'static str,
        column: &'static str,
        available: String,
    },

    #[error("reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{collaborator}: csv error: {source}")]
    Csv {
        collaborator: &'static str,
        #[source]
        source: csv::Error,
    },

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
