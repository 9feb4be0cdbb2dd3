//! Pure queries over a folder list snapshot.
//!
//! Nothing here mutates the list or fails: unknown ids produce empty results,
//! `0` or `None`. Depth is always computed by walking the live tree, so there
//! is no cached depth to go stale after a move.
//!
//! Depth convention used throughout the crate: root is depth 0, and the
//! subtree depth of a folder counts the folder itself (a leaf has subtree
//! depth 1). Placing a subtree of depth `s` under a target at depth `d` puts
//! its deepest node at `d + s`, which must not exceed [`MAX_FOLDER_DEPTH`].

use crate::core::folder::{Folder, MAX_FOLDER_DEPTH, ROOT_ID};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// One entry of a flattened "choose a folder" list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderOption {
    pub id: String,
    pub name: String,
    /// Indentation level; direct children of the walk's start are depth 0.
    pub depth: usize,
}

pub fn find_folder<'a>(id: &str, folders: &'a [Folder]) -> Option<&'a Folder> {
    folders.iter().find(|f| f.id == id)
}

/// The folder currently holding `character_id`, if any.
pub fn find_folder_of_character<'a>(
    character_id: &str,
    folders: &'a [Folder],
) -> Option<&'a Folder> {
    folders.iter().find(|f| f.has_character(character_id))
}

/// Ancestors of `id` from just below root down to and including `id` itself.
///
/// Parents are located through `children` arrays. If corrupt data lets more
/// than one folder claim the same child, the first one in list order wins.
pub fn get_folder_chain(id: &str, folders: &[Folder]) -> Vec<Folder> {
    if id == ROOT_ID {
        return Vec::new();
    }
    let Some(start) = find_folder(id, folders) else {
        return Vec::new();
    };

    let mut chain = vec![start.clone()];
    let mut visited: HashSet<&str> = HashSet::from([start.id.as_str()]);
    let mut current = start.id.as_str();

    while let Some(parent) = folders.iter().find(|f| f.children.iter().any(|c| c == current)) {
        if parent.is_root() || !visited.insert(parent.id.as_str()) {
            break;
        }
        chain.push(parent.clone());
        current = parent.id.as_str();
    }

    chain.reverse();
    chain
}

/// Every folder id below `id` in pre-order, excluding `id` itself.
pub fn get_all_descendant_folder_ids(id: &str, folders: &[Folder]) -> Vec<String> {
    let index = index_by_id(folders);
    let mut out = Vec::new();
    let mut visited = HashSet::from([id.to_string()]);
    collect_descendants(id, &index, &mut visited, &mut out);
    out
}

fn collect_descendants(
    id: &str,
    index: &HashMap<&str, &Folder>,
    visited: &mut HashSet<String>,
    out: &mut Vec<String>,
) {
    let Some(folder) = index.get(id) else {
        return;
    };
    for child in &folder.children {
        if !visited.insert(child.clone()) {
            continue;
        }
        out.push(child.clone());
        collect_descendants(child, index, visited, out);
    }
}

/// Height of the subtree rooted at `id`, counting `id` as 1. Unknown ids give 0.
pub fn get_max_folder_subtree_depth(id: &str, folders: &[Folder]) -> usize {
    let index = index_by_id(folders);
    let mut path = HashSet::new();
    subtree_depth(id, &index, &mut path)
}

fn subtree_depth<'a>(
    id: &str,
    index: &HashMap<&'a str, &'a Folder>,
    path: &mut HashSet<&'a str>,
) -> usize {
    let Some(&folder) = index.get(id) else {
        return 0;
    };
    if !path.insert(folder.id.as_str()) {
        return 0;
    }
    let deepest_child = folder
        .children
        .iter()
        .map(|c| subtree_depth(c.as_str(), index, path))
        .max()
        .unwrap_or(0);
    path.remove(folder.id.as_str());
    deepest_child + 1
}

/// Distance of `id` from root (root is 0). `None` if `id` is not in the list.
pub fn get_folder_depth(id: &str, folders: &[Folder]) -> Option<usize> {
    if id == ROOT_ID {
        return find_folder(ROOT_ID, folders).map(|_| 0);
    }
    find_folder(id, folders)?;
    Some(get_folder_chain(id, folders).len())
}

/// Whether a subtree of height `subtree_depth` may be attached under `target_id`.
///
/// This is the single depth rule shared by folder creation (a new folder has
/// subtree depth 1), moves, and drop validation.
pub fn fits_under(target_id: &str, subtree_depth: usize, folders: &[Folder]) -> bool {
    match get_folder_depth(target_id, folders) {
        Some(depth) => depth + subtree_depth <= MAX_FOLDER_DEPTH,
        None => false,
    }
}

/// Flattened, depth-annotated pre-order walk from `parent_id` for folder pickers.
///
/// Ids in `exclude_ids` are hidden individually; the walk still visits their
/// children, which keep their nominal depth.
pub fn get_folder_options_tree(
    folders: &[Folder],
    exclude_ids: &[String],
    parent_id: &str,
) -> Vec<FolderOption> {
    let index = index_by_id(folders);
    let excluded: HashSet<&str> = exclude_ids.iter().map(String::as_str).collect();
    let mut out = Vec::new();
    let mut visited = HashSet::from([parent_id.to_string()]);
    collect_options(parent_id, 0, &index, &excluded, &mut visited, &mut out);
    out
}

fn collect_options(
    parent_id: &str,
    depth: usize,
    index: &HashMap<&str, &Folder>,
    excluded: &HashSet<&str>,
    visited: &mut HashSet<String>,
    out: &mut Vec<FolderOption>,
) {
    let Some(parent) = index.get(parent_id) else {
        return;
    };
    for child_id in &parent.children {
        let Some(child) = index.get(child_id.as_str()) else {
            continue;
        };
        if !visited.insert(child.id.clone()) {
            continue;
        }
        if !excluded.contains(child.id.as_str()) {
            out.push(FolderOption {
                id: child.id.clone(),
                name: child.name.clone(),
                depth,
            });
        }
        collect_options(&child.id, depth + 1, index, excluded, visited, out);
    }
}

/// Admission check before any drag-and-drop or programmatic reparent.
///
/// Rejects dropping a folder onto itself or one of its descendants, and any
/// drop that would push the dragged subtree past the depth limit.
pub fn validate_drop_target(dragged_id: &str, target_id: &str, folders: &[Folder]) -> bool {
    if dragged_id == target_id || dragged_id == ROOT_ID {
        return false;
    }
    if get_all_descendant_folder_ids(dragged_id, folders)
        .iter()
        .any(|d| d == target_id)
    {
        return false;
    }
    let subtree = get_max_folder_subtree_depth(dragged_id, folders);
    if subtree == 0 {
        return false;
    }
    fits_under(target_id, subtree, folders)
}

/// Characters assigned to `id` and to every folder below it.
pub fn count_characters_recursive(id: &str, folders: &[Folder]) -> usize {
    let direct = find_folder(id, folders).map_or(0, |f| f.characters.len());
    direct
        + get_all_descendant_folder_ids(id, folders)
            .iter()
            .filter_map(|d| find_folder(d, folders))
            .map(|f| f.characters.len())
            .sum::<usize>()
}

fn index_by_id(folders: &[Folder]) -> HashMap<&str, &Folder> {
    let mut index = HashMap::with_capacity(folders.len());
    for folder in folders {
        index.entry(folder.id.as_str()).or_insert(folder);
    }
    index
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Builds a well-formed list from `(id, parent)` pairs, in order.
    pub(crate) fn build(pairs: &[(&str, &str)]) -> Vec<Folder> {
        let mut folders = vec![Folder::root()];
        for (id, parent) in pairs {
            folders.push(Folder::new(id.to_string(), id.to_uppercase(), parent, None));
            if let Some(p) = folders.iter_mut().find(|f| f.id == *parent) {
                p.children.push(id.to_string());
            }
        }
        folders
    }

    fn chain_ids(id: &str, folders: &[Folder]) -> Vec<String> {
        get_folder_chain(id, folders).into_iter().map(|f| f.id).collect()
    }

    #[test]
    fn test_chain_runs_from_below_root_to_target() {
        let list = build(&[("a", "root"), ("b", "a"), ("c", "b")]);
        assert_eq!(chain_ids("c", &list), vec!["a", "b", "c"]);
        assert_eq!(chain_ids("a", &list), vec!["a"]);
    }

    #[test]
    fn test_chain_empty_for_root_and_unknown() {
        let list = build(&[("a", "root")]);
        assert!(get_folder_chain(ROOT_ID, &list).is_empty());
        assert!(get_folder_chain("nope", &list).is_empty());
    }

    #[test]
    fn test_chain_terminates_on_corrupt_cycle() {
        let mut list = build(&[("a", "root"), ("b", "a")]);
        // b also claims a as its child, forming a loop detached from root.
        list[2].children.push("a".into());
        list[0].children.clear();
        let chain = get_folder_chain("b", &list);
        assert!(chain.len() <= 2);
    }

    #[test]
    fn test_descendants_pre_order_excluding_self() {
        let list = build(&[("a", "root"), ("b", "a"), ("d", "b"), ("c", "a")]);
        assert_eq!(get_all_descendant_folder_ids("a", &list), vec!["b", "d", "c"]);
        assert!(get_all_descendant_folder_ids("d", &list).is_empty());
        assert!(get_all_descendant_folder_ids("ghost", &list).is_empty());
    }

    #[test]
    fn test_no_folder_is_its_own_descendant() {
        let list = build(&[("a", "root"), ("b", "a"), ("c", "b"), ("d", "root")]);
        for folder in &list {
            assert!(!get_all_descendant_folder_ids(&folder.id, &list).contains(&folder.id));
        }
    }

    #[test]
    fn test_subtree_depth_counts_self() {
        let list = build(&[("a", "root"), ("b", "a"), ("c", "b"), ("x", "a")]);
        assert_eq!(get_max_folder_subtree_depth("c", &list), 1);
        assert_eq!(get_max_folder_subtree_depth("a", &list), 3);
        assert_eq!(get_max_folder_subtree_depth("ghost", &list), 0);
    }

    #[test]
    fn test_folder_depth_from_root() {
        let list = build(&[("a", "root"), ("b", "a")]);
        assert_eq!(get_folder_depth(ROOT_ID, &list), Some(0));
        assert_eq!(get_folder_depth("a", &list), Some(1));
        assert_eq!(get_folder_depth("b", &list), Some(2));
        assert_eq!(get_folder_depth("ghost", &list), None);
    }

    #[test]
    fn test_options_tree_indents_and_skips_excluded_only() {
        let list = build(&[("a", "root"), ("b", "a"), ("c", "b"), ("d", "root")]);
        let options = get_folder_options_tree(&list, &["b".to_string()], ROOT_ID);
        let flat: Vec<(&str, usize)> = options.iter().map(|o| (o.id.as_str(), o.depth)).collect();
        assert_eq!(flat, vec![("a", 0), ("c", 2), ("d", 0)]);
    }

    #[test]
    fn test_options_tree_from_subfolder() {
        let list = build(&[("a", "root"), ("b", "a"), ("c", "b")]);
        let options = get_folder_options_tree(&list, &[], "a");
        assert_eq!(options[0].id, "b");
        assert_eq!(options[0].name, "B");
        assert_eq!(options[1].depth, 1);
    }

    #[test]
    fn test_drop_between_siblings_is_valid() {
        let list = build(&[("f1", "root"), ("f2", "root")]);
        assert!(validate_drop_target("f1", "f2", &list));
    }

    #[test]
    fn test_drop_onto_self_or_descendant_is_invalid() {
        let list = build(&[("a", "root"), ("b", "a"), ("c", "b")]);
        assert!(!validate_drop_target("a", "a", &list));
        assert!(!validate_drop_target("a", "c", &list));
        assert!(validate_drop_target("c", "a", &list));
    }

    #[test]
    fn test_drop_respects_depth_limit() {
        let list = build(&[
            ("a", "root"),
            ("b", "a"),
            ("c", "b"),
            ("d", "c"),
            ("x", "root"),
            ("y", "x"),
        ]);
        // d is at depth 4; a leaf lands at 5, which is allowed.
        assert!(validate_drop_target("y", "d", &list));
        // x has subtree depth 2; its child would land at depth 6.
        assert!(!validate_drop_target("x", "d", &list));
        // Dropping onto root always fits a subtree of depth <= 5.
        assert!(validate_drop_target("y", ROOT_ID, &list));
    }

    #[test]
    fn test_drop_onto_unknown_target_is_invalid() {
        let list = build(&[("a", "root")]);
        assert!(!validate_drop_target("a", "ghost", &list));
        assert!(!validate_drop_target("ghost", "a", &list));
    }

    #[test]
    fn test_count_characters_recursive() {
        let mut list = build(&[("a", "root"), ("b", "a"), ("c", "root")]);
        list[1].characters = vec!["c1".into()];
        list[2].characters = vec!["c2".into(), "c3".into()];
        list[3].characters = vec!["c4".into()];
        assert_eq!(count_characters_recursive("a", &list), 3);
        assert_eq!(count_characters_recursive(ROOT_ID, &list), 4);
    }
}
