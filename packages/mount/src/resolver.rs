//! Session view of a mounted tree.

use std::num::NonZeroUsize;
use std::sync::Arc;

use bytes::Bytes;
use remount_core::{codec, Binary, InlineBinary, PropertyMap, ResourcePath, Value};
use tracing::{debug, info};

use crate::binary::BinaryStream;
use crate::cache::{CacheEntry, ResolverCache};
use crate::changeset::{ChangeRecord, ChangeSet, Lookup, OrderHint};
use crate::loader::ResourceLoader;
use crate::mount::MountContext;
use crate::node::{
    Children, RemoteNode, ResourceKind, JCR_DATA, NT_FILE, NT_UNSTRUCTURED, PRIMARY_TYPE,
};
use crate::writer::{CommitReport, Writer};
use crate::Error;

/// How uploaded content is described to the remote.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadOptions {
    /// Defaults to the resource name.
    pub filename: Option<String>,
    /// Defaults to `application/octet-stream`.
    pub mime_type: Option<String>,
    pub charset: Option<String>,
}

impl UploadOptions {
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn with_charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = Some(charset.into());
        self
    }
}

/// One session against a mount: a bounded cache of loaded resources plus
/// the changes not yet committed.
///
/// Pending changes shadow the cache, so an edited or created node is seen
/// by later reads of the same session even after its cache slot is evicted.
/// Cloning yields a fresh session on the same mount.
pub struct Resolver {
    context: Arc<MountContext>,
    cache: ResolverCache,
    changes: ChangeSet,
}

impl Resolver {
    pub fn new(context: Arc<MountContext>) -> Self {
        let capacity = NonZeroUsize::new(context.config().cache_size).unwrap_or(NonZeroUsize::MIN);
        Self {
            context,
            cache: ResolverCache::new(capacity),
            changes: ChangeSet::new(),
        }
    }

    pub fn context(&self) -> &Arc<MountContext> {
        &self.context
    }

    pub fn mount_root(&self) -> &ResourcePath {
        self.context.translator().mount_root()
    }

    pub fn cache(&self) -> &ResolverCache {
        &self.cache
    }

    /// Pending changes in commit order.
    pub fn changes(&self) -> &ChangeSet {
        &self.changes
    }

    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    /// The resource at `path`, if it exists.
    ///
    /// Paths outside the mount and ignored paths resolve to nothing.
    pub fn resolve(&mut self, path: &ResourcePath) -> Option<RemoteNode> {
        self.lookup(path, false)
    }

    /// Children of the resource at `path`, loading them on first use.
    ///
    /// Pending creates and moves into the resource are included, deleted and
    /// moved-away children are not. A listing that cannot be loaded is empty.
    pub fn children(&mut self, path: &ResourcePath) -> Vec<RemoteNode> {
        let Some(node) = self.resolve(path) else {
            return Vec::new();
        };

        let mut names = match node.children() {
            Children::Resolved(names) => names.clone(),
            Children::Unresolved => self.load_children(path),
        };
        for name in self.changes.pending_children(path) {
            if !names.contains(&name) {
                names.push(name);
            }
        }

        names
            .iter()
            .filter_map(|name| path.child(name).ok())
            .filter_map(|child| self.lookup(&child, true))
            .collect()
    }

    /// Set a property on an existing resource.
    pub fn set_property(
        &mut self,
        path: &ResourcePath,
        name: &str,
        value: impl Into<Value>,
    ) -> Result<(), Error> {
        let value = value.into();
        validate(&value)?;
        let node = self.require(path)?;
        self.changes.edit(node).edit().insert(name.to_string(), value);
        Ok(())
    }

    /// Remove a property, returning its last value.
    pub fn remove_property(
        &mut self,
        path: &ResourcePath,
        name: &str,
    ) -> Result<Option<Value>, Error> {
        let node = self.require(path)?;
        if !node.properties().contains_key(name) {
            return Ok(None);
        }
        Ok(self.changes.edit(node).edit().shift_remove(name))
    }

    /// Create a resource below `parent`.
    ///
    /// `jcr:primaryType` defaults to `nt:unstructured`.
    pub fn create(
        &mut self,
        parent: &ResourcePath,
        name: &str,
        mut properties: PropertyMap,
    ) -> Result<RemoteNode, Error> {
        self.require(parent)?;
        let path = self.vacant_child(parent, name)?;
        for value in properties.values() {
            validate(value)?;
        }
        if !properties.contains_key(PRIMARY_TYPE) {
            properties.shift_insert(0, PRIMARY_TYPE.to_string(), Value::from(NT_UNSTRUCTURED));
        }

        let node = RemoteNode::pending_create(path, properties);
        debug!(path = %node.path(), "Recording create");
        self.changes.insert(ChangeRecord::Create { node: node.clone() });
        Ok(node)
    }

    /// Upload file content as an `nt:file` resource below `parent`,
    /// replacing any file of the same name.
    pub fn upload(
        &mut self,
        parent: &ResourcePath,
        name: &str,
        content: impl Into<Bytes>,
        options: UploadOptions,
    ) -> Result<RemoteNode, Error> {
        self.require(parent)?;
        let path = parent.child(name)?;
        self.ensure_mounted(&path)?;

        let content = InlineBinary {
            data: content.into(),
            filename: options.filename,
            mime_type: options.mime_type,
        };
        let mut properties = PropertyMap::new();
        properties.insert(PRIMARY_TYPE.to_string(), Value::from(NT_FILE));
        properties.insert(JCR_DATA.to_string(), Value::Binary(Binary::Inline(content.clone())));
        let node =
            RemoteNode::new(path, ResourceKind::File, properties).with_children(Children::empty());

        debug!(path = %node.path(), size = content.data.len(), "Recording upload");
        self.changes.insert(ChangeRecord::Upload {
            node: node.clone(),
            content,
            charset: options.charset,
        });
        Ok(node)
    }

    /// Copy a resource into `destination_parent`, keeping its name.
    pub fn copy(
        &mut self,
        source: &ResourcePath,
        destination_parent: &ResourcePath,
    ) -> Result<RemoteNode, Error> {
        let node = self.require(source)?;
        self.require(destination_parent)?;
        if destination_parent.has_prefix(source) {
            return Err(Error::invalid(format!(
                "cannot copy '{}' into itself",
                source
            )));
        }
        let target = self.vacant_child(destination_parent, source.name())?;

        let copy = node.relocated(target, false);
        debug!(source = %source, target = %copy.path(), "Recording copy");
        self.changes.insert(ChangeRecord::Copy {
            node: copy.clone(),
            source: source.clone(),
        });
        Ok(copy)
    }

    /// Move a resource into `destination_parent`, keeping its name.
    ///
    /// Moving within the same parent only reorders.
    pub fn move_to(
        &mut self,
        source: &ResourcePath,
        destination_parent: &ResourcePath,
        order: Option<OrderHint>,
    ) -> Result<RemoteNode, Error> {
        let node = self.require(source)?;
        if source == self.mount_root() {
            return Err(Error::invalid("cannot move the mount root"));
        }
        self.require(destination_parent)?;

        if source.parent().as_ref() == Some(destination_parent) {
            return match order {
                Some(hint) => self.order(source, hint),
                None => Ok(node),
            };
        }
        if destination_parent.has_prefix(source) {
            return Err(Error::invalid(format!(
                "cannot move '{}' into itself",
                source
            )));
        }
        let target = self.vacant_child(destination_parent, source.name())?;

        let moved = node.relocated(target, true);
        debug!(source = %source, target = %moved.path(), "Recording move");
        self.changes.insert(ChangeRecord::Move {
            node: moved.clone(),
            source: source.clone(),
            order,
        });
        self.discard(source);
        Ok(moved)
    }

    /// Reorder a resource among its siblings.
    pub fn order(&mut self, path: &ResourcePath, hint: OrderHint) -> Result<RemoteNode, Error> {
        let node = self.require(path)?;
        if self.changes.set_order(path, hint.clone()) {
            return Ok(node);
        }
        if let Some(record) = self.changes.get(path) {
            if !matches!(record, ChangeRecord::Modify { .. }) {
                return Err(Error::invalid(format!(
                    "commit the pending {} of '{}' before reordering it",
                    record.operation(),
                    path
                )));
            }
        }

        debug!(path = %path, order = %hint, "Recording reorder");
        self.changes.insert(ChangeRecord::Move {
            node: node.clone(),
            source: path.clone(),
            order: Some(hint),
        });
        Ok(node)
    }

    /// Delete a resource and everything below it.
    pub fn delete(&mut self, path: &ResourcePath) -> Result<(), Error> {
        let node = self.require(path)?;
        if path == self.mount_root() {
            return Err(Error::invalid("cannot delete the mount root"));
        }
        debug!(path = %path, "Recording delete");
        self.changes.insert(ChangeRecord::Delete { node });
        self.discard(path);
        Ok(())
    }

    /// Forget a resource for the rest of the session: its subtree leaves
    /// the cache, it leaves its parent's listing and resolves as missing.
    pub fn discard(&mut self, path: &ResourcePath) {
        debug!(path = %path, "Discarding");
        self.cache.discard(path);

        let Some(parent) = path.parent() else {
            return;
        };
        if let Some(parent_node) = self.cache.node_mut(&parent) {
            if let Children::Resolved(names) = parent_node.children() {
                let remaining = names
                    .iter()
                    .filter(|name| name.as_str() != path.name())
                    .cloned()
                    .collect();
                parent_node.set_children(Children::Resolved(remaining));
            }
        }
    }

    /// Send every pending change to the remote, in order.
    ///
    /// All records are attempted. Pending changes and the cache are cleared
    /// whether or not some records failed.
    pub fn commit(&mut self) -> Result<CommitReport, Error> {
        let records = self.changes.drain();
        if records.is_empty() {
            return Ok(CommitReport::default());
        }

        let report = Writer::new(&self.context).commit(&records);
        self.cache.clear();

        let failures = report.failures();
        info!(
            records = report.entries.len(),
            applied = report.applied(),
            failed = failures.len(),
            "Committed changes"
        );
        if failures.is_empty() {
            Ok(report)
        } else {
            Err(Error::Commit { failures })
        }
    }

    /// Drop pending changes and cached state.
    pub fn rollback(&mut self) {
        debug!(pending = self.changes.len(), "Rolling back");
        self.changes.clear();
        self.cache.clear();
    }

    /// Stream a binary property. Nothing is fetched until the first read.
    pub fn open_binary(
        &mut self,
        path: &ResourcePath,
        property: &str,
    ) -> Result<BinaryStream, Error> {
        let node = self.require(path)?;
        match node.get(property) {
            Some(Value::Binary(Binary::Remote(remote))) => Ok(BinaryStream::remote(
                self.context.transport().clone(),
                remote.url.clone(),
            )),
            Some(Value::Binary(Binary::Inline(inline))) => {
                Ok(BinaryStream::inline(inline.data.clone()))
            }
            _ => Err(Error::NotBinary {
                path: path.clone(),
                property: property.to_string(),
            }),
        }
    }

    fn lookup(&mut self, path: &ResourcePath, known_child: bool) -> Option<RemoteNode> {
        let translator = self.context.translator();
        if !translator.is_local(path) || translator.is_ignored(path.as_str()) {
            return None;
        }

        match self.changes.lookup(path) {
            Lookup::Pending(node) => return Some(node.clone()),
            Lookup::Gone => return None,
            Lookup::Unknown => {}
        }

        // Beneath a pending copy or move the content is still at its source.
        if let Some(source) = self.changes.source_of(path) {
            debug!(path = %path, source = %source, "Resolving through pending relocation");
            return self
                .fetch(&source, known_child)
                .map(|node| node.relocated(path.clone(), true));
        }
        self.fetch(path, known_child)
    }

    /// Cached or freshly loaded remote state, ignoring pending changes.
    fn fetch(&mut self, path: &ResourcePath, known_child: bool) -> Option<RemoteNode> {
        if let Some(entry) = self.cache.get(path) {
            debug!(path = %path, "Cache hit");
            return entry.node().cloned();
        }
        debug!(path = %path, "Cache miss");

        let loaded = ResourceLoader::new(&self.context).load(path, known_child);
        match loaded {
            Some(loaded) => {
                self.remember_listed(loaded.children);
                self.remember(path.clone(), CacheEntry::Present(loaded.node.clone()));
                Some(loaded.node)
            }
            None => {
                self.remember(path.clone(), CacheEntry::Missing);
                None
            }
        }
    }

    /// Load the listing of a resolved node and record it on the node.
    fn load_children(&mut self, path: &ResourcePath) -> Vec<String> {
        let source = self.changes.source_of(path).unwrap_or_else(|| path.clone());
        debug!(path = %path, source = %source, "Loading children");
        let names = match ResourceLoader::new(&self.context).load(&source, true) {
            Some(loaded) => {
                let names = loaded
                    .node
                    .children()
                    .names()
                    .map(<[String]>::to_vec)
                    .unwrap_or_default();
                self.remember_listed(loaded.children);
                names
            }
            None => Vec::new(),
        };

        let children = Children::Resolved(names.clone());
        if let Some(node) = self.cache.node_mut(&source) {
            node.set_children(children.clone());
        }
        if let Some(node) = self.changes.node_mut(path) {
            node.set_children(children);
        }
        names
    }

    /// Cache resources seen in a listing, without replacing what is cached.
    ///
    /// Listed children keep the state the loader gave them: resolved-empty
    /// when the listing showed nothing below them, unresolved otherwise.
    fn remember_listed(&mut self, listed: Vec<RemoteNode>) {
        for child in listed {
            if self.cache.contains(child.path()) {
                continue;
            }
            let path = child.path().clone();
            self.remember(path, CacheEntry::Present(child));
        }
    }

    fn remember(&mut self, path: ResourcePath, entry: CacheEntry) {
        if let Some(evicted) = self.cache.insert(path, entry) {
            debug!(path = %evicted, "Evicted from cache");
        }
    }

    fn require(&mut self, path: &ResourcePath) -> Result<RemoteNode, Error> {
        self.ensure_mounted(path)?;
        self.resolve(path).ok_or_else(|| Error::NotFound { path: path.clone() })
    }

    fn ensure_mounted(&self, path: &ResourcePath) -> Result<(), Error> {
        let translator = self.context.translator();
        if !translator.is_local(path) || translator.is_ignored(path.as_str()) {
            return Err(Error::NotLocal { path: path.clone() });
        }
        Ok(())
    }

    /// The path of a new child, which must not exist yet.
    fn vacant_child(&mut self, parent: &ResourcePath, name: &str) -> Result<ResourcePath, Error> {
        let path = parent.child(name)?;
        self.ensure_mounted(&path)?;
        if self.resolve(&path).is_some() {
            return Err(Error::AlreadyExists { path });
        }
        Ok(path)
    }
}

impl Clone for Resolver {
    fn clone(&self) -> Self {
        Resolver::new(self.context.clone())
    }
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("mount_root", self.mount_root())
            .field("cache", &self.cache)
            .field("pending", &self.changes.len())
            .finish()
    }
}

/// Binaries are sent as file parts; everything else must have a wire form.
fn validate(value: &Value) -> Result<(), Error> {
    if !value.is_binary() {
        codec::encode_field(value)?;
    }
    Ok(())
}
