//! Private-folder visibility and the PIN gate in front of it.

use crate::core::folder::Folder;
use crate::core::tree::{find_folder, get_all_descendant_folder_ids, get_folder_chain};
use crate::{CharfolioError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Which folders the panel shows with respect to their `private` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VisibilityMode {
    /// Private folders (and everything inside them) are hidden.
    #[default]
    Hidden,
    /// Every folder is shown.
    ShowAll,
    /// Only private folders, their contents, and the path leading to them.
    PrivateOnly,
}

impl VisibilityMode {
    /// The next mode in the toggle order `Hidden → ShowAll → PrivateOnly → Hidden`.
    pub fn next(self) -> Self {
        match self {
            Self::Hidden => Self::ShowAll,
            Self::ShowAll => Self::PrivateOnly,
            Self::PrivateOnly => Self::Hidden,
        }
    }

    /// Whether entering this mode reveals private folders.
    pub fn reveals_private(self) -> bool {
        self != Self::Hidden
    }
}

/// Whether `folder` is shown under `mode`. Root is always visible.
pub fn is_folder_visible(folder: &Folder, folders: &[Folder], mode: VisibilityMode) -> bool {
    if folder.is_root() {
        return true;
    }
    match mode {
        VisibilityMode::ShowAll => true,
        VisibilityMode::Hidden => !folder.private,
        VisibilityMode::PrivateOnly => {
            folder.private
                || get_folder_chain(&folder.id, folders).iter().any(|f| f.private)
                || get_all_descendant_folder_ids(&folder.id, folders)
                    .iter()
                    .filter_map(|id| find_folder(id, folders))
                    .any(|f| f.private)
        }
    }
}

/// Hex-encoded SHA-256 of a PIN, ignoring surrounding whitespace.
pub fn hash_pin(pin: &str) -> String {
    hex::encode(Sha256::digest(pin.trim().as_bytes()))
}

/// Session-scoped unlock state for private folders.
///
/// Without a stored PIN hash the gate is always open. Once the right PIN has
/// been entered the gate stays open until [`lock`](Self::lock) is called.
#[derive(Debug, Clone, Default)]
pub struct PrivacyGate {
    pin_hash: Option<String>,
    unlocked: bool,
}

impl PrivacyGate {
    pub fn new(pin_hash: Option<String>) -> Self {
        Self {
            pin_hash: pin_hash.filter(|h| !h.is_empty()),
            unlocked: false,
        }
    }

    pub fn is_unlocked(&self) -> bool {
        self.pin_hash.is_none() || self.unlocked
    }

    /// # Errors
    ///
    /// Returns [`CharfolioError::WrongPin`] if `pin` does not match.
    pub fn unlock(&mut self, pin: &str) -> Result<()> {
        match &self.pin_hash {
            None => Ok(()),
            Some(expected) if *expected == hash_pin(pin) => {
                self.unlocked = true;
                log::debug!("private folders unlocked for this session");
                Ok(())
            }
            Some(_) => {
                log::warn!("rejected PIN for private folders");
                Err(CharfolioError::WrongPin)
            }
        }
    }

    pub fn lock(&mut self) {
        self.unlocked = false;
    }

    /// Checks that switching to `mode` is allowed, unlocking with `pin` if needed.
    ///
    /// # Errors
    ///
    /// Returns [`CharfolioError::PinRequired`] when a PIN is needed and none was
    /// given, or [`CharfolioError::WrongPin`] when it does not match.
    pub fn authorize(&mut self, mode: VisibilityMode, pin: Option<&str>) -> Result<()> {
        if !mode.reveals_private() || self.is_unlocked() {
            return Ok(());
        }
        match pin {
            Some(pin) => self.unlock(pin),
            None => Err(CharfolioError::PinRequired),
        }
    }
}
