//! Internal domain modules for the Charfolio core library.
//!
//! All public types from these modules are re-exported at the crate root
//! with `#[doc(inline)]`; import from there in preference to this module.

pub mod delete;
pub mod error;
pub mod folder;
pub mod privacy;
pub mod settings;
pub mod storage;
pub mod store;
pub mod tags;
pub mod tree;
pub mod view;

#[doc(inline)]
pub use delete::{DeleteResult, DeleteStrategy};
#[doc(inline)]
pub use error::{CharfolioError, Result};
#[doc(inline)]
pub use folder::Folder;
#[doc(inline)]
pub use privacy::{PrivacyGate, VisibilityMode};
#[doc(inline)]
pub use settings::ExtensionSettings;
#[doc(inline)]
pub use storage::{AttachmentStorage, LocalCache};
#[doc(inline)]
pub use store::FolderStore;
#[doc(inline)]
pub use tags::{ConvertOutcome, Prompter, Tag, TagDirectory};
#[doc(inline)]
pub use view::{FolderBrowser, FolderView};
