//! Error types for the Charfolio core library.

use thiserror::Error;

/// All errors that can occur within the Charfolio core library.
#[derive(Debug, Error)]
pub enum CharfolioError {
    /// A folder ID was referenced that does not exist in the current list.
    #[error("Folder not found: {0}")]
    FolderNotFound(String),

    /// Creating or moving a folder would nest it deeper than the maximum depth.
    #[error("Depth exceeded: {0}")]
    DepthExceeded(String),

    /// A move would relocate root, or make a folder its own ancestor.
    #[error("Invalid move: {0}")]
    InvalidMove(String),

    /// Durable storage or the local cache could not be read or written.
    #[error("Storage error: {0}")]
    Storage(String),

    /// The persisted folder document is not an array of folder records.
    #[error("Corrupt folder data: {0}")]
    CorruptData(String),

    /// A user-supplied value was rejected before any mutation.
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// The tag subsystem could not resolve a tag or its members.
    #[error("Tag lookup failed: {0}")]
    TagLookup(String),

    /// A PIN is configured and must be entered before revealing private folders.
    #[error("PIN required to change visibility")]
    PinRequired,

    /// The entered PIN does not match the stored hash.
    #[error("Wrong PIN")]
    WrongPin,

    /// An I/O operation on the filesystem failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Folder data could not be serialized or deserialized as JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience alias that pins the error type to [`CharfolioError`].
pub type Result<T> = std::result::Result<T, CharfolioError>;

impl CharfolioError {
    /// Returns a short, human-readable message suitable for a dismissable toast.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::FolderNotFound(_) => "Folder no longer exists".to_string(),
            Self::DepthExceeded(_) => {
                "Folders cannot be nested that deep".to_string()
            }
            Self::InvalidMove(msg) => msg.clone(),
            Self::Storage(e) => format!("Failed to save folders: {e}"),
            Self::CorruptData(_) => "Saved folder data could not be read".to_string(),
            Self::ValidationFailed(msg) => msg.clone(),
            Self::TagLookup(e) => format!("Could not read tag: {e}"),
            Self::PinRequired => "Enter your PIN to show private folders".to_string(),
            Self::WrongPin => "Wrong PIN, please try again".to_string(),
            Self::Io(e) => format!("File error: {e}"),
            Self::Json(e) => format!("Data format error: {e}"),
        }
    }
}
