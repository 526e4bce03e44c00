// Error types for the previous-items pipeline
// Malformed records are skipped, never raised; empty results are not errors.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CatalogError>;

#[derive(Error, Debug)]
pub enum CatalogError {
    /// Transport or service failure while querying a list
    #[error("query on '{collection}' failed: {message}")]
    RemoteQuery { collection: String, message: String },

    /// The list service answered with a non-success status
    #[error("query on '{collection}' returned {status}: {body}")]
    RemoteStatus {
        collection: String,
        status: u16,
        body: String,
    },

    /// The response body did not have the expected shape
    #[error("could not decode '{collection}' response: {message}")]
    Decode { collection: String, message: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CatalogError {
    pub fn remote(collection: impl Into<String>, message: impl ToString) -> Self {
        CatalogError::RemoteQuery {
            collection: collection.into(),
            message: message.to_string(),
        }
    }

    /// Which list the failure came from, when it came from a list at all
    pub fn collection(&self) -> Option<&str> {
        match self {
            CatalogError::RemoteQuery { collection, .. }
            | CatalogError::RemoteStatus { collection, .. }
            | CatalogError::Decode { collection, .. } => Some(collection),
            _ => None,
        }
    }
}
