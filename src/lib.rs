//! component-vcs: Version Control for UI Component Trees
//!
//! Don't diff markup, diff the component tree.
//!
//! Git-like history for a visual page builder:
//! - Component snapshots with value semantics (no back-pointers, no aliasing)
//! - Typed change records (create, delete, field update, content, style, reorder)
//! - Ancestor resolution over a commit DAG with merge commits
//! - Structural 3-way merge with explicit conflicts
//! - Branch table with protected default branch
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`tree`] | Component / snapshot model, flattening and structural equality |
//! | [`diff`] | Change detection and replay |
//! | [`ancestry`] | Ancestor sets and common ancestor resolution |
//! | [`merge`] | Structural 3-way merge with conflict detection |
//! | [`store`] | Append-only commit store |
//! | [`commit`] | Commit, branch and user types |
//! | [`repository`] | Branch manager: commit, branch, history, merge |
//! | [`roster`] | Users attached to the repository and their branch |
//! | [`shared`] | Mutex-guarded handle for multi-threaded hosts |
//! | [`config`] | Repository configuration |
//! | [`error`] | Error taxonomy |
//!
//! # Quick Start
//!
//! ```
//! use component_vcs::{Component, Repository, Snapshot, User};
//!
//! let mut repo = Repository::new();
//! repo.set_current_user(User::new("u1", "Ada", "ada@example.com"));
//!
//! let page = Snapshot::from(vec![
//!     Component::new("title", "heading", "Title").with_content("text", "Hello"),
//! ]);
//! repo.create_commit(&page, "add title", None).unwrap();
//!
//! repo.create_branch("redesign", None).unwrap();
//! repo.switch_branch("redesign").unwrap();
//! let mut edited = repo.head_snapshot(None).unwrap();
//! edited.find_mut("title").unwrap().style.insert("color".into(), "red".into());
//! repo.create_commit(&edited, "red title", None).unwrap();
//!
//! let outcome = repo.merge_branches("redesign", "main", "merge redesign").unwrap();
//! assert!(outcome.success);
//! assert_eq!(outcome.changes.len(), 1);
//! ```
//!
//! Author: Moroya Sakamoto

pub mod ancestry;
pub mod commit;
pub mod config;
pub mod diff;
pub mod error;
pub mod merge;
pub mod repository;
pub mod roster;
pub mod shared;
pub mod store;
pub mod tree;

pub use ancestry::{ancestors_of, common_ancestor, is_ancestor};
pub use commit::{Author, Branch, Commit, CommitId, User};
pub use config::{AncestorStrategy, RepositoryConfig, DEFAULT_BRANCH};
pub use diff::{apply_changes, detect_changes, ChangeKind, ChangeRecord, ChangeValue};
pub use error::{Error, Result};
pub use merge::{merge, ConflictKind, MergeConflict, MergeResult};
pub use repository::{MergeOutcome, Repository};
pub use roster::{Participant, Roster};
pub use shared::SharedRepository;
pub use store::CommitStore;
pub use tree::{deep_clone, flatten, structural_equals, Component, ComponentId, PropertyMap, Snapshot};
