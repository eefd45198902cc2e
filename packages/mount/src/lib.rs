//! # remount
//!
//! Mounts a subtree of a remote content repository into a local namespace.
//!
//! Reads go through a [`Resolver`] session: resources are fetched on first
//! access (the JSON rendering first, a WebDAV `PROPFIND` when that is not
//! available) and kept in a bounded LRU cache. Mutations are validated and
//! recorded in a [`ChangeSet`]; [`Resolver::commit`] replays them in order
//! against the remote as Sling-style POST requests.
//!
//! ```ignore
//! use remount::{MountConfig, RemoteMount};
//! use remount_core::rpath;
//!
//! let config = MountConfig::new("http://localhost:4502", "/mnt/remote")
//!     .with_credentials("admin", "admin");
//! let mount = RemoteMount::connect(config)?;
//!
//! let mut session = mount.resolver();
//! for child in session.children(&rpath!("/mnt/remote/content")) {
//!     println!("{} {:?}", child.path(), child.primary_type());
//! }
//!
//! session.set_property(&rpath!("/mnt/remote/content/site"), "title", "Home")?;
//! session.commit()?;
//! ```
//!
//! ## Crate Structure
//!
//! - [`config`]: mount configuration
//! - [`node`]: loaded resources
//! - [`loader`]: fetching one resource and its listing
//! - [`cache`]: the per-session LRU cache
//! - [`changeset`]: pending mutations
//! - [`writer`]: turning mutations into write requests
//! - [`resolver`]: the session tying these together
//! - [`provider`]: the host-facing traits

pub mod binary;
pub mod cache;
pub mod changeset;
pub mod config;
mod error;
pub mod loader;
pub mod mount;
pub mod node;
pub mod provider;
pub mod resolver;
pub mod writer;

pub use binary::BinaryStream;
pub use cache::{CacheEntry, ResolverCache};
pub use changeset::{ChangeRecord, ChangeSet, Lookup, Operation, OrderHint};
pub use config::MountConfig;
pub use error::Error;
pub use loader::{Loaded, ResourceLoader};
pub use mount::{MountContext, RemoteMount};
pub use node::{Children, NodeId, RemoteNode, ResourceKind};
pub use provider::{ResourceProvider, ResourceReader, ResourceWriter};
pub use resolver::{Resolver, UploadOptions};
pub use writer::{CommitEntry, CommitReport, Outcome, RecordFailure, Writer};

pub use remount_core::{PropertyMap, ResourcePath, Value};
