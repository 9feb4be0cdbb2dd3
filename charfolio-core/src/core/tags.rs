//! The tag subsystem as seen from the folder engine.
//!
//! Tags are owned elsewhere; the folder store only needs to read a tag's
//! members and, after a successful conversion, ask for the tag to be removed.
//! Confirmation dialogs are modelled by [`Prompter`] so that every user
//! decision is an explicit await point.

use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A tag record as handed over by the tag subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub id: String,
    pub name: String,
    /// Background colour of the tag chip, if any.
    #[serde(default)]
    pub color: Option<String>,
}

/// Read/delete access to tags and their character membership.
#[async_trait]
pub trait TagDirectory: Send + Sync {
    /// Character ids currently carrying `tag_id`.
    async fn members(&self, tag_id: &str) -> Result<Vec<String>>;

    async fn delete_tag(&self, tag_id: &str) -> Result<()>;
}

/// Confirmation and text-entry dialogs.
#[async_trait]
pub trait Prompter: Send + Sync {
    /// Returns `true` if the user accepted.
    async fn confirm(&self, message: &str) -> bool;

    /// Returns `None` if the user cancelled.
    async fn prompt_text(&self, message: &str, default: &str) -> Option<String>;
}

/// What happened during a tag-to-folder conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ConvertOutcome {
    /// The user declined the conversion; nothing changed.
    Cancelled,

    /// A root-level folder with the same name already exists; nothing changed.
    DuplicateName { existing_id: String },

    /// A folder was created and the tag's characters moved into it.
    Converted {
        folder_id: String,
        moved_count: usize,
        tag_deleted: bool,
    },
}
