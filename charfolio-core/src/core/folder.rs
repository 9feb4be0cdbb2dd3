//! The folder record and the normalisation applied to every loaded list.
//!
//! Folders live in a flat arena: each record names its parent by id and lists
//! its children by id, and the whole `Vec<Folder>` is persisted as one JSON
//! array. Fields the current code does not know about are kept in
//! [`Folder::extra`] so that a load/save cycle never drops them.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

/// Reserved id of the permanent top-level folder.
pub const ROOT_ID: &str = "root";

/// Display name given to a freshly initialised root.
pub const ROOT_NAME: &str = "Root";

/// Icon used when a folder has none.
pub const DEFAULT_ICON: &str = "fa-folder";

/// Brand purple used when a folder has no usable colour.
pub const DEFAULT_COLOR: &str = "#8b2ae6";

/// Deepest level a folder may occupy; root sits at depth 0.
pub const MAX_FOLDER_DEPTH: usize = 5;

/// A node in the folder tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Folder {
    pub id: String,
    pub name: String,
    #[serde(default = "default_icon", deserialize_with = "string_or_default_icon")]
    pub icon: String,
    #[serde(default = "default_color", deserialize_with = "string_or_default_color")]
    pub color: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub children: Vec<String>,
    #[serde(default)]
    pub characters: Vec<String>,
    #[serde(default, deserialize_with = "truthy")]
    pub private: bool,
    /// Unrecognised fields, written back verbatim on save.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_icon() -> String {
    DEFAULT_ICON.to_string()
}

fn default_color() -> String {
    DEFAULT_COLOR.to_string()
}

fn string_or_default_icon<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(d)?.unwrap_or_else(default_icon))
}

fn string_or_default_color<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(d)?.unwrap_or_else(default_color))
}

/// Accepts any JSON value for a flag and coerces it the way a loosely typed
/// writer would have meant it (`null`, `0`, `""` and `false` are all false).
fn truthy<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Null => false,
        Value::Bool(b) => b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    })
}

impl Folder {
    /// Builds an empty folder attached (by id) under `parent_id`.
    pub fn new(id: String, name: String, parent_id: &str, color: Option<String>) -> Self {
        Self {
            id,
            name,
            icon: default_icon(),
            color: color.filter(|c| is_usable_color(c)).unwrap_or_else(default_color),
            parent_id: Some(parent_id.to_string()),
            children: Vec::new(),
            characters: Vec::new(),
            private: false,
            extra: Map::new(),
        }
    }

    /// The root folder of a fresh list.
    pub fn root() -> Self {
        Self {
            id: ROOT_ID.to_string(),
            name: ROOT_NAME.to_string(),
            icon: default_icon(),
            color: default_color(),
            parent_id: None,
            children: Vec::new(),
            characters: Vec::new(),
            private: false,
            extra: Map::new(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.id == ROOT_ID
    }

    /// Colour to display, falling back to the default when unset.
    pub fn effective_color(&self) -> &str {
        if is_usable_color(&self.color) {
            &self.color
        } else {
            DEFAULT_COLOR
        }
    }

    /// Icon to display, falling back to the generic folder glyph.
    pub fn effective_icon(&self) -> &str {
        if self.icon.trim().is_empty() {
            DEFAULT_ICON
        } else {
            &self.icon
        }
    }

    pub fn has_character(&self, character_id: &str) -> bool {
        self.characters.iter().any(|c| c == character_id)
    }
}

/// An empty string or a bare `#` means "no colour chosen".
pub fn is_usable_color(color: &str) -> bool {
    let trimmed = color.trim();
    !trimmed.is_empty() && trimmed != "#"
}

/// Repairs a freshly parsed list so that the rest of the crate can rely on the
/// structural invariants.
///
/// - duplicate folder ids keep their first record
/// - root exists and has no parent
/// - unset colours and icons get their defaults
/// - `children` loses duplicates, self references, root and ids not in the list
/// - `characters` loses duplicates
/// - parent links are rebuilt by [`relink_parents`]
pub fn normalize_folders(folders: Vec<Folder>) -> Vec<Folder> {
    let mut seen = HashSet::new();
    let mut list: Vec<Folder> = folders
        .into_iter()
        .filter(|f| !f.id.is_empty() && seen.insert(f.id.clone()))
        .collect();

    if !list.iter().any(Folder::is_root) {
        log::warn!("folder list had no root; recreating it");
        list.insert(0, Folder::root());
    }

    let known: HashSet<String> = list.iter().map(|f| f.id.clone()).collect();

    for folder in &mut list {
        if !is_usable_color(&folder.color) {
            folder.color = default_color();
        }
        if folder.icon.trim().is_empty() {
            folder.icon = default_icon();
        }

        let mut child_seen = HashSet::new();
        let own_id = folder.id.clone();
        folder.children.retain(|c| {
            *c != own_id && c != ROOT_ID && known.contains(c) && child_seen.insert(c.clone())
        });

        let mut char_seen = HashSet::new();
        folder.characters.retain(|c| char_seen.insert(c.clone()));
    }

    relink_parents(&mut list);
    list
}

/// Makes `children` the single source of truth for parent links.
///
/// The first folder (in list order) that lists a child owns it; later claims
/// are dropped. A folder nobody lists is appended to the folder its
/// `parentId` names, or to root when that folder is missing. Folders that end
/// up detached from root (a corrupt cycle) are re-attached under root. Finally
/// every `parentId` is rewritten to match its owner.
fn relink_parents(list: &mut [Folder]) {
    let mut owner: HashMap<String, String> = HashMap::new();
    for folder in list.iter_mut() {
        let parent_id = folder.id.clone();
        folder.children.retain(|c| match owner.entry(c.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(parent_id.clone());
                true
            }
        });
    }

    let known: HashSet<String> = list.iter().map(|f| f.id.clone()).collect();
    let unlisted: Vec<(String, String)> = list
        .iter()
        .filter(|f| !f.is_root() && !owner.contains_key(&f.id))
        .map(|f| {
            let parent = f
                .parent_id
                .clone()
                .filter(|p| *p != f.id && known.contains(p))
                .unwrap_or_else(|| ROOT_ID.to_string());
            (f.id.clone(), parent)
        })
        .collect();
    for (id, parent) in unlisted {
        log::warn!("folder {id} was not listed by its parent; attaching it to {parent}");
        if let Some(p) = list.iter_mut().find(|f| f.id == parent) {
            p.children.push(id.clone());
        }
        owner.insert(id, parent);
    }

    loop {
        let stray = {
            let reachable = reachable_from_root(list);
            list.iter()
                .find(|f| !reachable.contains(f.id.as_str()))
                .map(|f| f.id.clone())
        };
        let Some(stray) = stray else {
            break;
        };
        log::warn!("folder {stray} was detached from root; re-attaching it");
        for folder in list.iter_mut() {
            folder.children.retain(|c| *c != stray);
        }
        if let Some(root) = list.iter_mut().find(|f| f.is_root()) {
            root.children.push(stray.clone());
        }
        owner.insert(stray, ROOT_ID.to_string());
    }

    for folder in list.iter_mut() {
        folder.parent_id = if folder.is_root() {
            None
        } else {
            Some(
                owner
                    .get(&folder.id)
                    .cloned()
                    .unwrap_or_else(|| ROOT_ID.to_string()),
            )
        };
    }
}

fn reachable_from_root(list: &[Folder]) -> HashSet<&str> {
    let index: HashMap<&str, &Folder> = list.iter().map(|f| (f.id.as_str(), f)).collect();
    let mut reached = HashSet::from([ROOT_ID]);
    let mut stack = vec![ROOT_ID];
    while let Some(id) = stack.pop() {
        let Some(&folder) = index.get(id) else {
            continue;
        };
        for child in &folder.children {
            if reached.insert(child.as_str()) {
                stack.push(child.as_str());
            }
        }
    }
    reached
}
