//! The folder store: sole writer of the persisted folder list.
//!
//! Every mutator follows the same discipline: reload the full list from
//! storage, apply the change to that fresh copy, and save the full list back.
//! Reloading first narrows (but does not close) the window in which two
//! independently triggered mutators overwrite each other; there is no version
//! field and no locking. Validation happens before any save, so a rejected
//! call leaves the persisted list untouched.

use crate::core::folder::{normalize_folders, Folder, ROOT_ID};
use crate::core::tree::{
    find_folder, find_folder_of_character, fits_under, get_all_descendant_folder_ids,
    get_folder_depth, get_max_folder_subtree_depth,
};
use crate::{
    AttachmentStorage, CharfolioError, ConvertOutcome, DeleteResult, DeleteStrategy, LocalCache,
    Prompter, Result, Tag, TagDirectory,
};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

/// Local-cache key holding the pointer to the latest uploaded folder document.
pub const FOLDERS_URL_KEY: &str = "charfolio_folders_url";

/// Local-cache key holding a plaintext copy of the latest saved folder document.
pub const FOLDERS_CACHE_KEY: &str = "charfolio_folders_cache";

const ATTACHMENT_PREFIX: &str = "charfolio-folders";

/// Name offered when interactively creating a folder.
pub const NEW_FOLDER_NAME: &str = "New Folder";

/// Where a [`FolderStore::save`] actually landed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Persistence {
    /// Uploaded to attachment storage and cached locally.
    Durable { url: String },
    /// The upload failed; only the local cache holds the new list.
    CacheOnly,
}

/// Owns the canonical folder list behind `load`/`save`.
///
/// Consumers receive the store by injection and re-`load()` after each
/// mutation rather than holding on to folder references. Mutators take
/// `&mut self`; callers that share one store across surfaces wrap it in a
/// mutex.
pub struct FolderStore {
    attachments: Arc<dyn AttachmentStorage>,
    cache: Arc<dyn LocalCache>,
    folders: Vec<Folder>,
}

impl FolderStore {
    pub fn new(attachments: Arc<dyn AttachmentStorage>, cache: Arc<dyn LocalCache>) -> Self {
        Self {
            attachments,
            cache,
            folders: Vec::new(),
        }
    }

    /// The list as of the last load or save. May be stale; prefer [`load`](Self::load).
    pub fn snapshot(&self) -> &[Folder] {
        &self.folders
    }

    /// Returns the current folder list.
    ///
    /// Resolution order: the attachment named by the cached pointer, then the
    /// cached plaintext copy, then a fresh root-only list (which is saved).
    /// Unreadable or corrupt sources are logged and skipped.
    ///
    /// # Errors
    ///
    /// Only fails when a fresh list has to be written and the local cache
    /// rejects the write.
    pub async fn load(&mut self) -> Result<Vec<Folder>> {
        if let Some(list) = self.load_remote().await {
            self.folders = list.clone();
            return Ok(list);
        }

        if let Some(list) = self.load_cached() {
            self.folders = list.clone();
            return Ok(list);
        }

        log::info!("no stored folders found; initialising a root-only list");
        let fresh = vec![Folder::root()];
        self.save(&fresh).await?;
        Ok(fresh)
    }

    async fn load_remote(&self) -> Option<Vec<Folder>> {
        let url = match self.cache.get(FOLDERS_URL_KEY) {
            Ok(Some(url)) if !url.is_empty() => url,
            Ok(_) => return None,
            Err(e) => {
                log::warn!("could not read folder pointer from cache: {e}");
                return None;
            }
        };

        let content = match self.attachments.fetch(&url).await {
            Ok(content) => content,
            Err(e) => {
                log::warn!("could not fetch folders from {url}: {e}");
                return None;
            }
        };

        match parse_document(&content) {
            Ok(list) => Some(list),
            Err(e) => {
                log::warn!("ignoring folder attachment {url}: {e}");
                None
            }
        }
    }

    fn load_cached(&self) -> Option<Vec<Folder>> {
        let content = match self.cache.get(FOLDERS_CACHE_KEY) {
            Ok(Some(content)) => content,
            Ok(None) => return None,
            Err(e) => {
                log::warn!("could not read cached folders: {e}");
                return None;
            }
        };

        match parse_document(&content) {
            Ok(list) => Some(list),
            Err(e) => {
                log::warn!("ignoring cached folders: {e}");
                None
            }
        }
    }

    /// Persists the full list: uploads it, then refreshes the cached pointer,
    /// the cached plaintext copy and the in-memory copy. Once the new pointer
    /// is cached, the attachment it replaced is removed.
    ///
    /// A failed upload is not fatal. The stale pointer is dropped so that the
    /// next load reads the newer cached copy, and [`Persistence::CacheOnly`]
    /// is returned.
    ///
    /// # Errors
    ///
    /// Returns [`CharfolioError::Json`] if the list cannot be serialized, or
    /// the cache's error if the local copy cannot be written.
    pub async fn save(&mut self, folders: &[Folder]) -> Result<Persistence> {
        let json = serde_json::to_string(folders)?;
        let name = format!(
            "{ATTACHMENT_PREFIX}-{}.json",
            chrono::Utc::now().timestamp_millis()
        );

        let previous = self.cache.get(FOLDERS_URL_KEY).ok().flatten();

        let persistence = match self.attachments.upload(&name, &BASE64.encode(&json)).await {
            Ok(url) => {
                self.cache.set(FOLDERS_URL_KEY, &url)?;
                if let Some(old) = previous.filter(|old| !old.is_empty() && *old != url) {
                    if let Err(e) = self.attachments.remove(&old).await {
                        log::warn!("could not remove superseded folder attachment {old}: {e}");
                    }
                }
                Persistence::Durable { url }
            }
            Err(e) => {
                log::warn!("folder upload failed, keeping local copy only: {e}");
                self.cache.remove(FOLDERS_URL_KEY)?;
                Persistence::CacheOnly
            }
        };

        self.cache.set(FOLDERS_CACHE_KEY, &json)?;
        self.folders = folders.to_vec();
        log::debug!("saved {} folders ({persistence:?})", folders.len());
        Ok(persistence)
    }

    /// Creates an empty folder under `parent_id` and returns its id.
    ///
    /// # Errors
    ///
    /// Returns [`CharfolioError::ValidationFailed`] for a blank name and
    /// [`CharfolioError::DepthExceeded`] if the parent is missing or already
    /// at the maximum depth.
    pub async fn add_folder(
        &mut self,
        name: &str,
        parent_id: &str,
        color: Option<&str>,
    ) -> Result<String> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CharfolioError::ValidationFailed(
                "Folder name cannot be empty".to_string(),
            ));
        }

        let mut folders = self.load().await?;
        let id = insert_folder(&mut folders, name, parent_id, color)?;
        self.save(&folders).await?;
        log::info!("created folder {id} under {parent_id}");
        Ok(id)
    }

    /// Asks for a name and creates the folder; `None` if the user cancelled.
    ///
    /// # Errors
    ///
    /// As for [`add_folder`](Self::add_folder).
    pub async fn add_folder_with_prompt(
        &mut self,
        parent_id: &str,
        prompter: &dyn Prompter,
    ) -> Result<Option<String>> {
        let Some(name) = prompter.prompt_text("Folder name", NEW_FOLDER_NAME).await else {
            return Ok(None);
        };
        if name.trim().is_empty() {
            return Ok(None);
        }
        self.add_folder(&name, parent_id, None).await.map(Some)
    }

    /// Renames a folder. A name that trims to empty is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`CharfolioError::FolderNotFound`] if `id` does not exist.
    pub async fn rename_folder(&mut self, id: &str, new_name: &str) -> Result<()> {
        let new_name = new_name.trim();
        if new_name.is_empty() {
            return Ok(());
        }
        let mut folders = self.load().await?;
        folder_mut(&mut folders, id)?.name = new_name.to_string();
        self.save(&folders).await?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`CharfolioError::FolderNotFound`] if `id` does not exist.
    pub async fn set_folder_color(&mut self, id: &str, color: &str) -> Result<()> {
        let mut folders = self.load().await?;
        folder_mut(&mut folders, id)?.color = color.trim().to_string();
        self.save(&folders).await?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`CharfolioError::FolderNotFound`] if `id` does not exist.
    pub async fn set_folder_icon(&mut self, id: &str, icon: &str) -> Result<()> {
        let mut folders = self.load().await?;
        folder_mut(&mut folders, id)?.icon = icon.trim().to_string();
        self.save(&folders).await?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`CharfolioError::FolderNotFound`] if `id` does not exist.
    pub async fn set_folder_privacy(&mut self, id: &str, private: bool) -> Result<()> {
        let mut folders = self.load().await?;
        folder_mut(&mut folders, id)?.private = private;
        self.save(&folders).await?;
        Ok(())
    }

    /// Puts every character in `character_ids` into `folder_id`, taking it out
    /// of whichever folder held it before. Saves once for the whole batch.
    ///
    /// # Errors
    ///
    /// Returns [`CharfolioError::FolderNotFound`] if the target does not exist.
    pub async fn assign_characters_to_folder(
        &mut self,
        folder_id: &str,
        character_ids: &[String],
    ) -> Result<()> {
        let mut folders = self.load().await?;
        assign_characters(&mut folders, folder_id, character_ids)?;
        self.save(&folders).await?;
        log::debug!("assigned {} characters to {folder_id}", character_ids.len());
        Ok(())
    }

    /// Removes one character from one folder; a no-op if it was not there.
    ///
    /// # Errors
    ///
    /// Returns [`CharfolioError::FolderNotFound`] if the folder does not exist.
    pub async fn remove_character_from_folder(
        &mut self,
        folder_id: &str,
        character_id: &str,
    ) -> Result<()> {
        let mut folders = self.load().await?;
        folder_mut(&mut folders, folder_id)?
            .characters
            .retain(|c| c != character_id);
        self.save(&folders).await?;
        Ok(())
    }

    /// Re-parents `id` (with its subtree) under `new_parent_id`, appending it
    /// to the destination's children. Moving to the current parent keeps the
    /// sibling order and only re-saves.
    ///
    /// # Errors
    ///
    /// - [`CharfolioError::InvalidMove`] when moving root, moving a folder
    ///   into itself, or into one of its descendants
    /// - [`CharfolioError::FolderNotFound`] if `id` does not exist
    /// - [`CharfolioError::DepthExceeded`] if the destination does not exist
    ///   or the subtree would end up too deep
    pub async fn move_folder(&mut self, id: &str, new_parent_id: &str) -> Result<()> {
        if id == ROOT_ID {
            return Err(CharfolioError::InvalidMove("Root cannot be moved".to_string()));
        }
        if id == new_parent_id {
            return Err(CharfolioError::InvalidMove(
                "A folder cannot be its own parent".to_string(),
            ));
        }

        let mut folders = self.load().await?;
        let current_parent = find_folder(id, &folders)
            .ok_or_else(|| CharfolioError::FolderNotFound(id.to_string()))?
            .parent_id
            .clone();

        if get_folder_depth(new_parent_id, &folders).is_none() {
            return Err(CharfolioError::DepthExceeded(format!(
                "destination '{new_parent_id}' does not exist"
            )));
        }
        if get_all_descendant_folder_ids(id, &folders)
            .iter()
            .any(|d| d == new_parent_id)
        {
            return Err(CharfolioError::InvalidMove(
                "Move would create a cycle".to_string(),
            ));
        }

        let listed_by_parent = find_folder(new_parent_id, &folders)
            .is_some_and(|p| p.children.iter().any(|c| c == id));
        if listed_by_parent && current_parent.as_deref() == Some(new_parent_id) {
            self.save(&folders).await?;
            return Ok(());
        }

        let subtree = get_max_folder_subtree_depth(id, &folders);
        if !fits_under(new_parent_id, subtree, &folders) {
            return Err(CharfolioError::DepthExceeded(format!(
                "a subtree of depth {subtree} does not fit under '{new_parent_id}'"
            )));
        }

        for folder in &mut folders {
            folder.children.retain(|c| c != id);
        }
        folder_mut(&mut folders, new_parent_id)?
            .children
            .push(id.to_string());
        folder_mut(&mut folders, id)?.parent_id = Some(new_parent_id.to_string());

        self.save(&folders).await?;
        log::info!("moved folder {id} under {new_parent_id}");
        Ok(())
    }

    /// Applies a user-chosen order to the children of `parent_id`.
    ///
    /// Listed ids that are current children come first, in the given order.
    /// Unknown or repeated ids are ignored, and children not listed keep
    /// their relative order after the listed ones.
    ///
    /// # Errors
    ///
    /// Returns [`CharfolioError::FolderNotFound`] if the parent does not exist.
    pub async fn reorder_children(
        &mut self,
        parent_id: &str,
        ordered_ids: &[String],
    ) -> Result<()> {
        let mut folders = self.load().await?;
        let parent = folder_mut(&mut folders, parent_id)?;

        let current: HashSet<&String> = parent.children.iter().collect();
        let mut placed = HashSet::new();
        let mut reordered: Vec<String> = ordered_ids
            .iter()
            .filter(|id| current.contains(id) && placed.insert(id.as_str()))
            .cloned()
            .collect();
        reordered.extend(
            parent
                .children
                .iter()
                .filter(|id| !placed.contains(id.as_str()))
                .cloned(),
        );
        parent.children = reordered;

        self.save(&folders).await?;
        Ok(())
    }

    /// Deletes a folder using `strategy`. The id is scrubbed from every
    /// `children` array before anything else, and the list is saved once.
    ///
    /// # Errors
    ///
    /// Returns [`CharfolioError::InvalidMove`] for root and
    /// [`CharfolioError::FolderNotFound`] if `id` does not exist.
    pub async fn delete_folder(
        &mut self,
        id: &str,
        strategy: DeleteStrategy,
    ) -> Result<DeleteResult> {
        if id == ROOT_ID {
            return Err(CharfolioError::InvalidMove("Root cannot be deleted".to_string()));
        }

        let mut folders = self.load().await?;
        let target = find_folder(id, &folders)
            .ok_or_else(|| CharfolioError::FolderNotFound(id.to_string()))?;
        let direct_children = target.children.clone();
        let descendants = get_all_descendant_folder_ids(id, &folders);

        for folder in &mut folders {
            folder.children.retain(|c| c != id);
        }

        let result = match strategy {
            DeleteStrategy::Cascade => {
                let mut affected_ids = vec![id.to_string()];
                affected_ids.extend(descendants);
                let removed: HashSet<&str> = affected_ids.iter().map(String::as_str).collect();
                folders.retain(|f| !removed.contains(f.id.as_str()));
                for folder in &mut folders {
                    folder.children.retain(|c| !removed.contains(c.as_str()));
                }
                DeleteResult {
                    deleted_count: affected_ids.len(),
                    affected_ids,
                    rescued_ids: Vec::new(),
                }
            }
            DeleteStrategy::Rescue => {
                let mut rescued_ids = Vec::new();
                for child_id in direct_children {
                    let Some(child) = folders.iter_mut().find(|f| f.id == child_id) else {
                        continue;
                    };
                    child.parent_id = Some(ROOT_ID.to_string());
                    let root = folder_mut(&mut folders, ROOT_ID)?;
                    if !root.children.contains(&child_id) {
                        root.children.push(child_id.clone());
                    }
                    rescued_ids.push(child_id);
                }
                folders.retain(|f| f.id != id);
                DeleteResult {
                    deleted_count: 1,
                    affected_ids: vec![id.to_string()],
                    rescued_ids,
                }
            }
        };

        self.save(&folders).await?;
        log::info!(
            "deleted {} folder(s) starting at {id} ({strategy:?})",
            result.deleted_count
        );
        Ok(result)
    }

    /// Turns a tag into a root-level folder holding the tag's characters.
    ///
    /// The user is asked to confirm first. A root-level folder with the same
    /// name (case-insensitive) blocks the conversion. Members are read before
    /// anything is written. The folder is created and filled in a single save,
    /// and the tag is only offered for deletion after that save succeeded, so
    /// a failure part-way never leaves an empty folder or loses the tag.
    ///
    /// # Errors
    ///
    /// Propagates tag lookup failures and any store error; in either case the
    /// tag is left untouched.
    pub async fn convert_tag_to_folder(
        &mut self,
        tag: &Tag,
        tags: &dyn TagDirectory,
        prompter: &dyn Prompter,
    ) -> Result<ConvertOutcome> {
        let tag_name = tag.name.trim();
        if tag_name.is_empty() {
            return Err(CharfolioError::ValidationFailed(
                "Tag has no name to use for a folder".to_string(),
            ));
        }

        let prompt = format!("Convert tag \"{tag_name}\" into a folder?");
        if !prompter.confirm(&prompt).await {
            return Ok(ConvertOutcome::Cancelled);
        }

        let mut folders = self.load().await?;
        let wanted = tag_name.to_lowercase();
        let duplicate = find_folder(ROOT_ID, &folders)
            .into_iter()
            .flat_map(|root| root.children.iter())
            .filter_map(|id| find_folder(id, &folders))
            .find(|f| f.name.trim().to_lowercase() == wanted);
        if let Some(existing) = duplicate {
            log::warn!("a root folder named '{tag_name}' already exists; tag not converted");
            return Ok(ConvertOutcome::DuplicateName {
                existing_id: existing.id.clone(),
            });
        }

        let members = tags.members(&tag.id).await.map_err(|e| {
            log::warn!("could not read members of tag {}: {e}", tag.id);
            e
        })?;

        let folder_id = insert_folder(&mut folders, tag_name, ROOT_ID, tag.color.as_deref())?;
        assign_characters(&mut folders, &folder_id, &members)?;
        if let Err(e) = self.save(&folders).await {
            log::warn!("tag {} was not converted: {e}", tag.id);
            return Err(e);
        }

        let prompt =
            format!("Delete the tag \"{tag_name}\" now that its characters are in a folder?");
        let tag_deleted = if prompter.confirm(&prompt).await {
            match tags.delete_tag(&tag.id).await {
                Ok(()) => true,
                Err(e) => {
                    log::warn!("folder created but tag {} could not be deleted: {e}", tag.id);
                    false
                }
            }
        } else {
            false
        };

        log::info!(
            "converted tag {} into folder {folder_id} with {} characters",
            tag.id,
            members.len()
        );
        Ok(ConvertOutcome::Converted {
            folder_id,
            moved_count: members.len(),
            tag_deleted,
        })
    }

    /// Drops character ids that no longer exist in the roster. Saves only if
    /// something was removed; returns how many assignments were dropped.
    ///
    /// # Errors
    ///
    /// Propagates storage errors from the reload or save.
    pub async fn prune_orphaned_characters(&mut self, roster_ids: &[String]) -> Result<usize> {
        let mut folders = self.load().await?;
        let roster: HashSet<&str> = roster_ids.iter().map(String::as_str).collect();

        let mut removed = 0;
        for folder in &mut folders {
            let before = folder.characters.len();
            folder.characters.retain(|c| roster.contains(c.as_str()));
            removed += before - folder.characters.len();
        }

        if removed > 0 {
            self.save(&folders).await?;
            log::info!("pruned {removed} orphaned character assignment(s)");
        }
        Ok(removed)
    }

    /// The id of the folder currently holding `character_id`.
    ///
    /// # Errors
    ///
    /// Propagates storage errors from the reload.
    pub async fn folder_of_character(&mut self, character_id: &str) -> Result<Option<String>> {
        let folders = self.load().await?;
        Ok(find_folder_of_character(character_id, &folders).map(|f| f.id.clone()))
    }
}

/// Parses a persisted document and normalises it.
fn parse_document(content: &str) -> Result<Vec<Folder>> {
    let value: serde_json::Value = serde_json::from_str(content)
        .map_err(|e| CharfolioError::CorruptData(format!("not JSON: {e}")))?;
    if !value.is_array() {
        return Err(CharfolioError::CorruptData(
            "folder document is not an array".to_string(),
        ));
    }
    let folders: Vec<Folder> = serde_json::from_value(value)
        .map_err(|e| CharfolioError::CorruptData(format!("malformed folder record: {e}")))?;
    Ok(normalize_folders(folders))
}

/// Adds an empty folder under `parent_id` to an in-memory list.
fn insert_folder(
    folders: &mut Vec<Folder>,
    name: &str,
    parent_id: &str,
    color: Option<&str>,
) -> Result<String> {
    if !fits_under(parent_id, 1, folders) {
        return Err(CharfolioError::DepthExceeded(format!(
            "cannot create a folder under '{parent_id}'"
        )));
    }

    let id = Uuid::new_v4().to_string();
    folder_mut(folders, parent_id)?.children.push(id.clone());
    folders.push(Folder::new(
        id.clone(),
        name.to_string(),
        parent_id,
        color.map(str::to_string),
    ));
    Ok(id)
}

/// Moves each character into `folder_id`, taking it out of any other folder.
fn assign_characters(
    folders: &mut [Folder],
    folder_id: &str,
    character_ids: &[String],
) -> Result<()> {
    if find_folder(folder_id, folders).is_none() {
        return Err(CharfolioError::FolderNotFound(folder_id.to_string()));
    }

    for character_id in character_ids {
        for folder in folders.iter_mut().filter(|f| f.id != folder_id) {
            folder.characters.retain(|c| c != character_id);
        }
        let target = folder_mut(folders, folder_id)?;
        if !target.has_character(character_id) {
            target.characters.push(character_id.clone());
        }
    }
    Ok(())
}

fn folder_mut<'a>(folders: &'a mut [Folder], id: &str) -> Result<&'a mut Folder> {
    folders
        .iter_mut()
        .find(|f| f.id == id)
        .ok_or_else(|| CharfolioError::FolderNotFound(id.to_string()))
}
