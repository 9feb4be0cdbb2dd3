//! Core library for Charfolio, a folder hierarchy for organising chat characters.
//!
//! The primary entry point is [`FolderStore`], which owns the persisted folder
//! list; every mutation goes through its methods. The pure query functions in
//! [`tree`] and the view model in [`view`] work on the `Vec<Folder>` snapshots
//! that [`FolderStore::load`] returns.
//!
//! Types are re-exported from their respective sub-modules for convenience;
//! consumers should import from the crate root rather than the `core` module.

pub mod core;

pub use core::tree;
pub use core::view;

// Re-export commonly used types.
#[doc(inline)]
pub use core::{
    delete::{DeleteResult, DeleteStrategy},
    error::{CharfolioError, Result},
    folder::{
        is_usable_color, normalize_folders, Folder, DEFAULT_COLOR, DEFAULT_ICON,
        MAX_FOLDER_DEPTH, ROOT_ID, ROOT_NAME,
    },
    privacy::{hash_pin, is_folder_visible, PrivacyGate, VisibilityMode},
    settings::{load_settings, save_settings, ExtensionSettings, MIN_PIN_LENGTH, SETTINGS_KEY},
    storage::{
        AttachmentStorage, DirectoryAttachmentStorage, FileCache, LocalCache,
        MemoryAttachmentStorage, MemoryCache,
    },
    store::{FolderStore, Persistence, FOLDERS_CACHE_KEY, FOLDERS_URL_KEY, NEW_FOLDER_NAME},
    tags::{ConvertOutcome, Prompter, Tag, TagDirectory},
    tree::{
        count_characters_recursive, find_folder, find_folder_of_character, fits_under,
        get_all_descendant_folder_ids, get_folder_chain, get_folder_depth,
        get_folder_options_tree, get_max_folder_subtree_depth, validate_drop_target,
        FolderOption,
    },
    view::{
        render, render_search, Breadcrumb, Character, FolderBrowser, FolderCard, FolderView,
        RosterEntry, SearchFilter,
    },
};
