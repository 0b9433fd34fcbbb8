use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScoutError {
    #[error("State file I/O error at {path}: {source}")]
    StateIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("State file could not be parsed: {0}")]
    StateCorrupt(String),

    #[error("Unknown pipeline stage: {0}")]
    InvalidStage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Profile search error: {0}")]
    Search(String),

    #[error("Enrichment error: {0}")]
    Enrichment(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Export error: {0}")]
    Export(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
