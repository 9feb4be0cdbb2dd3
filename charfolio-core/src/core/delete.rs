//! Delete strategy and result types for folder removal.
//!
//! Two strategies are supported:
//!
//! - [`DeleteStrategy::Cascade`] removes the folder and its whole subtree.
//! - [`DeleteStrategy::Rescue`] removes only the folder and re-parents its
//!   direct children to root. Rescued children land at depth 1, which is
//!   always legal, and carry their own subtrees with them.
//!
//! Characters assigned to removed folders are simply unassigned; they are
//! owned by the host and never deleted here.
//!
//! ```rust
//! use charfolio_core::{DeleteResult, DeleteStrategy};
//!
//! let json = serde_json::to_string(&DeleteStrategy::Rescue).unwrap();
//! assert_eq!(json, r#""Rescue""#);
//!
//! let result = DeleteResult {
//!     deleted_count: 1,
//!     affected_ids: vec!["a".to_string()],
//!     rescued_ids: vec![],
//! };
//! assert!(serde_json::to_string(&result).unwrap().contains("deletedCount"));
//! ```

use serde::{Deserialize, Serialize};

/// Determines how child folders are handled when a folder is deleted.
///
/// Serialized as a PascalCase string so a front-end can send `"Cascade"` or
/// `"Rescue"` without a mapping layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum DeleteStrategy {
    /// Delete the folder and every descendant.
    Cascade,

    /// Delete only the folder; its direct children move to root.
    Rescue,
}

impl DeleteStrategy {
    /// Maps the boolean `cascade` flag used by simple confirm dialogs.
    pub fn from_cascade(cascade: bool) -> Self {
        if cascade {
            Self::Cascade
        } else {
            Self::Rescue
        }
    }
}

/// The outcome of a folder delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResult {
    /// Number of folders removed from the list.
    pub deleted_count: usize,

    /// IDs of every removed folder, the target first.
    pub affected_ids: Vec<String>,

    /// Former direct children re-parented to root by [`DeleteStrategy::Rescue`].
    pub rescued_ids: Vec<String>,
}
