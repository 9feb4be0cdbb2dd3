//! Renderable view model for the folder panel.
//!
//! [`render`] is a pure function from a folder list, the character roster, a
//! focused folder id and a visibility mode to a [`FolderView`]. It never
//! fails: a focus that no longer resolves (deleted, or hidden by the current
//! mode) renders as root, and assigned character ids missing from the roster
//! are skipped. [`FolderBrowser`] carries the transient session state (focus,
//! mode, PIN gate) on top of it.

use crate::core::folder::{Folder, ROOT_ID};
use crate::core::privacy::{is_folder_visible, PrivacyGate, VisibilityMode};
use crate::core::settings::ExtensionSettings;
use crate::core::tree::{find_folder, get_folder_chain};
use crate::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};

/// Anything in the host roster that can be identified by a character id.
pub trait RosterEntry {
    fn character_id(&self) -> &str;
}

/// A roster entry as the host typically hands it over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Character {
    pub id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Character {
    pub fn new(id: &str, display_name: &str) -> Self {
        Self {
            id: id.to_string(),
            display_name: display_name.to_string(),
            extra: Map::new(),
        }
    }
}

impl RosterEntry for Character {
    fn character_id(&self) -> &str {
        &self.id
    }
}

/// One step of the breadcrumb trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Breadcrumb {
    pub id: String,
    pub name: String,
}

/// A child folder as shown inside the focused folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderCard {
    pub id: String,
    pub name: String,
    pub icon: String,
    pub color: String,
    pub private: bool,
    /// Visible sub-folders directly inside this folder.
    pub child_folder_count: usize,
    /// Characters assigned directly to this folder that exist in the roster.
    /// `None` when counts are switched off.
    pub direct_count: Option<usize>,
    /// `direct_count` plus that of every visible descendant.
    pub total_count: Option<usize>,
}

/// Everything needed to draw the panel for one focused folder.
#[derive(Debug, Clone, PartialEq)]
pub struct FolderView<'r, R> {
    /// The folder actually rendered; root when the requested one did not resolve.
    pub focused_id: String,
    pub breadcrumbs: Vec<Breadcrumb>,
    pub folders: Vec<FolderCard>,
    pub characters: Vec<&'r R>,
    /// True when rendered from a search match rather than normal navigation.
    pub searching: bool,
}

impl<R> FolderView<'_, R> {
    pub fn is_root(&self) -> bool {
        self.focused_id == ROOT_ID
    }

    pub fn is_empty(&self) -> bool {
        self.folders.is_empty() && self.characters.is_empty()
    }
}

/// Renders `focus_id` under `mode`, with character counts on every card.
pub fn render<'r, R: RosterEntry>(
    folders: &[Folder],
    roster: &'r [R],
    focus_id: &str,
    mode: VisibilityMode,
) -> FolderView<'r, R> {
    render_with(folders, roster, focus_id, mode, true)
}

fn render_with<'r, R: RosterEntry>(
    folders: &[Folder],
    roster: &'r [R],
    focus_id: &str,
    mode: VisibilityMode,
    with_counts: bool,
) -> FolderView<'r, R> {
    let focused_id = resolve_focus(folders, focus_id, mode);
    let by_id = roster_index(roster);

    let breadcrumbs = get_folder_chain(&focused_id, folders)
        .into_iter()
        .map(|f| Breadcrumb { id: f.id, name: f.name })
        .collect();

    let Some(focused) = find_folder(&focused_id, folders) else {
        return FolderView {
            focused_id,
            breadcrumbs,
            folders: Vec::new(),
            characters: Vec::new(),
            searching: false,
        };
    };

    let cards = focused
        .children
        .iter()
        .filter_map(|id| find_folder(id, folders))
        .filter(|f| is_folder_visible(f, folders, mode))
        .map(|f| folder_card(f, folders, &by_id, mode, with_counts))
        .collect();

    FolderView {
        characters: resolve_characters(focused, &by_id, |_| true),
        focused_id,
        breadcrumbs,
        folders: cards,
        searching: false,
    }
}

/// A precomputed search match handed over by the host's search box: the
/// folder holding a matching character and the predicate that matched it.
#[derive(Debug, Clone)]
pub struct SearchFilter<F> {
    pub folder_id: String,
    pub predicate: F,
}

impl<F> SearchFilter<F> {
    pub fn new(folder_id: &str, predicate: F) -> Self {
        Self {
            folder_id: folder_id.to_string(),
            predicate,
        }
    }
}

/// Renders the characters of a search match: the folder the caller found a
/// match in, filtered by `predicate`, with no breadcrumbs or sub-folders.
pub fn render_search<'r, R, F>(
    folders: &[Folder],
    roster: &'r [R],
    folder_id: &str,
    mode: VisibilityMode,
    predicate: F,
) -> FolderView<'r, R>
where
    R: RosterEntry,
    F: Fn(&R) -> bool,
{
    let focused_id = resolve_focus(folders, folder_id, mode);
    let by_id = roster_index(roster);
    let characters = find_folder(&focused_id, folders)
        .map(|f| resolve_characters(f, &by_id, &predicate))
        .unwrap_or_default();

    FolderView {
        focused_id,
        breadcrumbs: Vec::new(),
        folders: Vec::new(),
        characters,
        searching: true,
    }
}

/// Falls back to root when `focus_id` is missing or it (or an ancestor) is hidden.
fn resolve_focus(folders: &[Folder], focus_id: &str, mode: VisibilityMode) -> String {
    if focus_id == ROOT_ID {
        return ROOT_ID.to_string();
    }
    let Some(folder) = find_folder(focus_id, folders) else {
        log::debug!("focused folder {focus_id} no longer exists; showing root");
        return ROOT_ID.to_string();
    };
    let chain = get_folder_chain(&folder.id, folders);
    if chain.iter().all(|f| is_folder_visible(f, folders, mode)) {
        folder.id.clone()
    } else {
        ROOT_ID.to_string()
    }
}

fn roster_index<R: RosterEntry>(roster: &[R]) -> HashMap<&str, &R> {
    roster.iter().map(|r| (r.character_id(), r)).collect()
}

fn resolve_characters<'r, R, F>(
    folder: &Folder,
    by_id: &HashMap<&str, &'r R>,
    predicate: F,
) -> Vec<&'r R>
where
    F: Fn(&R) -> bool,
{
    folder
        .characters
        .iter()
        .filter_map(|id| by_id.get(id.as_str()).copied())
        .filter(|&r| predicate(r))
        .collect()
}

fn folder_card<R>(
    folder: &Folder,
    folders: &[Folder],
    by_id: &HashMap<&str, &R>,
    mode: VisibilityMode,
    with_counts: bool,
) -> FolderCard {
    let (direct_count, total_count) = if with_counts {
        let direct = resolved_count(folder, by_id);
        let mut visited = HashSet::from([folder.id.as_str()]);
        let below = visible_descendant_count(folder, folders, by_id, mode, &mut visited);
        (Some(direct), Some(direct + below))
    } else {
        (None, None)
    };
    FolderCard {
        id: folder.id.clone(),
        name: folder.name.clone(),
        icon: folder.effective_icon().to_string(),
        color: folder.effective_color().to_string(),
        private: folder.private,
        child_folder_count: folder
            .children
            .iter()
            .filter_map(|id| find_folder(id, folders))
            .filter(|f| is_folder_visible(f, folders, mode))
            .count(),
        direct_count,
        total_count,
    }
}

fn resolved_count<R>(folder: &Folder, by_id: &HashMap<&str, &R>) -> usize {
    folder
        .characters
        .iter()
        .filter(|id| by_id.contains_key(id.as_str()))
        .count()
}

fn visible_descendant_count<'a, R>(
    folder: &Folder,
    folders: &'a [Folder],
    by_id: &HashMap<&str, &R>,
    mode: VisibilityMode,
    visited: &mut HashSet<&'a str>,
) -> usize {
    let mut total = 0;
    for child_id in &folder.children {
        let Some(child) = find_folder(child_id, folders) else {
            continue;
        };
        if !visited.insert(child.id.as_str()) || !is_folder_visible(child, folders, mode) {
            continue;
        }
        total += resolved_count(child, by_id)
            + visible_descendant_count(child, folders, by_id, mode, visited);
    }
    total
}

/// Session state of one folder panel: focus, visibility mode and PIN gate.
#[derive(Debug, Clone)]
pub struct FolderBrowser {
    focused: String,
    mode: VisibilityMode,
    gate: PrivacyGate,
    show_counts: bool,
}

impl Default for FolderBrowser {
    fn default() -> Self {
        Self::new(&ExtensionSettings::default())
    }
}

impl FolderBrowser {
    /// Starts at root in the mode the settings prescribe.
    pub fn new(settings: &ExtensionSettings) -> Self {
        Self {
            focused: ROOT_ID.to_string(),
            mode: settings.initial_visibility(),
            gate: PrivacyGate::new(settings.pin_hash.clone()),
            show_counts: settings.show_folder_counts,
        }
    }

    pub fn focused_id(&self) -> &str {
        &self.focused
    }

    pub fn mode(&self) -> VisibilityMode {
        self.mode
    }

    /// Focuses `folder_id`; resolution happens at render time.
    pub fn open(&mut self, folder_id: &str) {
        self.focused = folder_id.to_string();
    }

    /// Focuses the parent of the current folder (root stays at root).
    pub fn go_up(&mut self, folders: &[Folder]) {
        let parent = find_folder(&self.focused, folders)
            .and_then(|f| f.parent_id.clone())
            .unwrap_or_else(|| ROOT_ID.to_string());
        self.focused = parent;
    }

    /// Switches the visibility mode, asking the gate first.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CharfolioError::PinRequired`] or
    /// [`crate::CharfolioError::WrongPin`]; the mode is unchanged on failure.
    pub fn set_mode(&mut self, mode: VisibilityMode, pin: Option<&str>) -> Result<()> {
        self.gate.authorize(mode, pin)?;
        self.mode = mode;
        Ok(())
    }

    /// Advances to the next mode in the toggle order.
    ///
    /// # Errors
    ///
    /// As for [`set_mode`](Self::set_mode).
    pub fn cycle_mode(&mut self, pin: Option<&str>) -> Result<VisibilityMode> {
        let next = self.mode.next();
        self.set_mode(next, pin)?;
        Ok(next)
    }

    /// Hides private folders again and forgets the session unlock.
    pub fn lock(&mut self) {
        self.gate.lock();
        self.mode = VisibilityMode::Hidden;
    }

    /// Renders the focused folder, snapping focus back to root if it no
    /// longer resolves. Card counts follow the `show_folder_counts` setting.
    pub fn render<'r, R: RosterEntry>(
        &mut self,
        folders: &[Folder],
        roster: &'r [R],
    ) -> FolderView<'r, R> {
        let view = render_with(folders, roster, &self.focused, self.mode, self.show_counts);
        self.focused.clone_from(&view.focused_id);
        view
    }

    /// Renders a search match without touching the navigation focus.
    pub fn render_search<'r, R, F>(
        &self,
        folders: &[Folder],
        roster: &'r [R],
        filter: &SearchFilter<F>,
    ) -> FolderView<'r, R>
    where
        R: RosterEntry,
        F: Fn(&R) -> bool,
    {
        render_search(folders, roster, &filter.folder_id, self.mode, &filter.predicate)
    }

    /// Called when the search term is cleared.
    pub fn clear_search(&mut self) {
        self.focused = ROOT_ID.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::privacy::hash_pin;
    use crate::core::tree::tests::build;
    use crate::CharfolioError;

    fn roster() -> Vec<Character> {
        vec![
            Character::new("c1", "Alice"),
            Character::new("c2", "Bob"),
            Character::new("c3", "Cleo"),
            Character::new("c4", "Dax"),
        ]
    }

    /// root → a → b, root → p (private) → q; characters spread around.
    fn sample() -> Vec<Folder> {
        let mut list = build(&[("a", "root"), ("b", "a"), ("p", "root"), ("q", "p")]);
        list[1].characters = vec!["c1".into(), "gone".into()];
        list[2].characters = vec!["c2".into()];
        list[3].private = true;
        list[3].characters = vec!["c3".into()];
        list[4].characters = vec!["c4".into()];
        list
    }

    fn names<R: RosterEntry>(view: &FolderView<'_, R>) -> Vec<String> {
        view.characters.iter().map(|c| c.character_id().to_string()).collect()
    }

    #[test]
    fn test_root_view_hides_private_folders() {
        let list = sample();
        let roster = roster();
        let view = render(&list, &roster, ROOT_ID, VisibilityMode::Hidden);
        assert!(view.is_root());
        assert!(view.breadcrumbs.is_empty());
        let ids: Vec<&str> = view.folders.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["a"]);
        assert_eq!(view.folders[0].direct_count, Some(1));
        assert_eq!(view.folders[0].total_count, Some(2));
        assert_eq!(view.folders[0].child_folder_count, 1);
    }

    #[test]
    fn test_show_all_counts_private_subtrees() {
        let list = sample();
        let roster = roster();
        let view = render(&list, &roster, ROOT_ID, VisibilityMode::ShowAll);
        assert_eq!(view.folders.len(), 2);
        let p = view.folders.iter().find(|c| c.id == "p").unwrap();
        assert!(p.private);
        assert_eq!(p.total_count, Some(2));
    }

    #[test]
    fn test_private_only_view() {
        let list = sample();
        let roster = roster();
        let view = render(&list, &roster, ROOT_ID, VisibilityMode::PrivateOnly);
        let ids: Vec<&str> = view.folders.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["p"]);
    }

    #[test]
    fn test_nested_focus_has_breadcrumbs_and_skips_orphans() {
        let list = sample();
        let roster = roster();
        let view = render(&list, &roster, "a", VisibilityMode::Hidden);
        let crumbs: Vec<&str> = view.breadcrumbs.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(crumbs, vec!["a"]);
        assert_eq!(names(&view), vec!["c1"]);

        let view = render(&list, &roster, "b", VisibilityMode::Hidden);
        let crumbs: Vec<&str> = view.breadcrumbs.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(crumbs, vec!["A", "B"]);
        assert_eq!(names(&view), vec!["c2"]);
    }

    #[test]
    fn test_unknown_focus_falls_back_to_root() {
        let list = sample();
        let roster = roster();
        let view = render(&list, &roster, "deleted", VisibilityMode::Hidden);
        assert_eq!(view.focused_id, ROOT_ID);
    }

    #[test]
    fn test_focus_inside_hidden_private_folder_falls_back_to_root() {
        let list = sample();
        let roster = roster();
        let view = render(&list, &roster, "q", VisibilityMode::Hidden);
        assert_eq!(view.focused_id, ROOT_ID);
        let view = render(&list, &roster, "q", VisibilityMode::ShowAll);
        assert_eq!(view.focused_id, "q");
        assert_eq!(names(&view), vec!["c4"]);
    }

    #[test]
    fn test_empty_list_renders_empty_root() {
        let roster = roster();
        let view = render(&[], &roster, "a", VisibilityMode::Hidden);
        assert!(view.is_root());
        assert!(view.is_empty());
    }

    #[test]
    fn test_search_filters_characters_without_breadcrumbs() {
        let list = sample();
        let roster = roster();
        let view = render_search(&list, &roster, "a", VisibilityMode::Hidden, |c: &Character| {
            c.display_name.starts_with('A')
        });
        assert!(view.searching);
        assert!(view.breadcrumbs.is_empty());
        assert!(view.folders.is_empty());
        assert_eq!(names(&view), vec!["c1"]);
    }

    #[test]
    fn test_browser_search_keeps_navigation_focus() {
        let list = sample();
        let roster = roster();
        let mut browser = FolderBrowser::default();
        browser.open("a");
        let filter = SearchFilter::new("b", |c: &Character| c.display_name == "Bob");
        let view = browser.render_search(&list, &roster, &filter);
        assert_eq!(view.focused_id, "b");
        assert_eq!(names(&view), vec!["c2"]);
        assert_eq!(browser.focused_id(), "a");

        // A match inside a hidden private folder is not revealed.
        let filter = SearchFilter::new("q", |_: &Character| true);
        let view = browser.render_search(&list, &roster, &filter);
        assert!(view.is_root());
    }

    #[test]
    fn test_browser_snaps_deleted_focus_to_root() {
        let mut list = sample();
        let roster = roster();
        let mut browser = FolderBrowser::default();
        browser.open("b");
        assert_eq!(browser.render(&list, &roster).focused_id, "b");

        list.retain(|f| f.id != "b");
        list[1].children.clear();
        let view = browser.render(&list, &roster);
        assert!(view.is_root());
        assert_eq!(browser.focused_id(), ROOT_ID);
    }

    #[test]
    fn test_browser_omits_counts_when_switched_off() {
        let list = sample();
        let roster = roster();
        let mut settings = ExtensionSettings::default();
        settings.show_folder_counts = false;
        let view = FolderBrowser::new(&settings).render(&list, &roster);
        assert_eq!(view.folders[0].direct_count, None);
        assert_eq!(view.folders[0].total_count, None);
        assert_eq!(view.folders[0].child_folder_count, 1);

        let view = FolderBrowser::default().render(&list, &roster);
        assert_eq!(view.folders[0].total_count, Some(2));
    }

    #[test]
    fn test_browser_go_up_and_clear_search() {
        let list = sample();
        let mut browser = FolderBrowser::default();
        browser.open("b");
        browser.go_up(&list);
        assert_eq!(browser.focused_id(), "a");
        browser.go_up(&list);
        assert_eq!(browser.focused_id(), ROOT_ID);
        browser.go_up(&list);
        assert_eq!(browser.focused_id(), ROOT_ID);

        browser.open("a");
        browser.clear_search();
        assert_eq!(browser.focused_id(), ROOT_ID);
    }

    #[test]
    fn test_browser_mode_needs_pin_once_per_session() {
        let mut settings = ExtensionSettings::default();
        settings.pin_hash = Some(hash_pin("1234"));
        let mut browser = FolderBrowser::new(&settings);
        assert_eq!(browser.mode(), VisibilityMode::Hidden);

        let err = browser.set_mode(VisibilityMode::ShowAll, None).unwrap_err();
        assert!(matches!(err, CharfolioError::PinRequired));
        assert_eq!(browser.mode(), VisibilityMode::Hidden);

        browser.set_mode(VisibilityMode::ShowAll, Some("1234")).unwrap();
        assert_eq!(browser.cycle_mode(None).unwrap(), VisibilityMode::PrivateOnly);
        assert_eq!(browser.cycle_mode(None).unwrap(), VisibilityMode::Hidden);

        browser.lock();
        assert!(browser.set_mode(VisibilityMode::ShowAll, None).is_err());
    }
}
