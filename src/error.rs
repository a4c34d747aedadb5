use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Settings file is not valid TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Settings could not be written: {0}")]
    TomlWrite(#[from] toml::ser::Error),

    #[error("Template error: {0}")]
    Template(#[from] tera::Error),

    #[error("Stored collection '{key}' is corrupt: {source}")]
    CorruptStore {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: i64 },

    #[error("Client name is required to save a client")]
    MissingClientName,

    #[error("Please enter recipient email")]
    MissingRecipient,

    #[error("An invoice is already being sent")]
    SendInProgress,

    #[error("PDF rendering failed: {0}")]
    Render(String),

    #[error("Printing failed: {0}")]
    Print(String),

    #[error("{0}")]
    Mail(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
