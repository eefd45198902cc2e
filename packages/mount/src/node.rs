//! Mirrored resources.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, FixedOffset};
use remount_core::{PropertyMap, ResourcePath, Value};

pub const PRIMARY_TYPE: &str = "jcr:primaryType";
pub const RESOURCE_TYPE: &str = "sling:resourceType";
pub const JCR_DATA: &str = "jcr:data";
pub const NT_UNSTRUCTURED: &str = "nt:unstructured";
pub const NT_FILE: &str = "nt:file";
pub const NT_FOLDER: &str = "nt:folder";
pub const SLING_FOLDER: &str = "sling:Folder";
pub const SLING_ORDERED_FOLDER: &str = "sling:OrderedFolder";

/// Marker property set on resources the remote refused to describe.
pub const NOT_ACCESSIBLE: &str = "remote:notAccessible";

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique node identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    fn next() -> Self {
        NodeId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

/// Coarse classification of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResourceKind {
    Folder,
    File,
    #[default]
    Unknown,
}

impl ResourceKind {
    /// Classify by `jcr:primaryType`.
    pub fn from_primary_type(primary_type: &str) -> Self {
        match primary_type {
            NT_FOLDER | SLING_FOLDER | SLING_ORDERED_FOLDER => ResourceKind::Folder,
            NT_FILE => ResourceKind::File,
            _ => ResourceKind::Unknown,
        }
    }

    /// Primary type to report when the remote didn't send one.
    pub fn default_primary_type(self) -> &'static str {
        match self {
            ResourceKind::Folder => NT_FOLDER,
            ResourceKind::File => NT_FILE,
            ResourceKind::Unknown => NT_UNSTRUCTURED,
        }
    }
}

/// Child state of a node.
///
/// `Unresolved` means nobody has looked yet; `Resolved(vec![])` means the
/// remote was asked and reported none.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Children {
    #[default]
    Unresolved,
    Resolved(Vec<String>),
}

impl Children {
    pub fn empty() -> Self {
        Children::Resolved(Vec::new())
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Children::Resolved(_))
    }

    /// Child names, `None` while unresolved.
    pub fn names(&self) -> Option<&[String]> {
        match self {
            Children::Resolved(names) => Some(names),
            Children::Unresolved => None,
        }
    }
}

/// One resource of the mirrored tree.
///
/// Parent and children are referred to by path and name, never by pointer;
/// the resolver looks them up on demand.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteNode {
    id: NodeId,
    path: ResourcePath,
    kind: ResourceKind,
    properties: PropertyMap,
    children: Children,
    pending: Option<PropertyMap>,
}

impl RemoteNode {
    pub fn new(path: ResourcePath, kind: ResourceKind, properties: PropertyMap) -> Self {
        Self {
            id: NodeId::next(),
            path,
            kind,
            properties,
            children: Children::Unresolved,
            pending: None,
        }
    }

    /// Stub for a resource that exists but could not be read.
    pub fn not_accessible(path: ResourcePath) -> Self {
        let mut properties = PropertyMap::new();
        properties.insert(NOT_ACCESSIBLE.to_string(), Value::Boolean(true));
        Self::new(path, ResourceKind::Unknown, properties).with_children(Children::empty())
    }

    pub fn with_children(mut self, children: Children) -> Self {
        self.children = children;
        self
    }

    /// A node created locally: every property is a pending edit.
    pub(crate) fn pending_create(path: ResourcePath, properties: PropertyMap) -> Self {
        let kind = properties
            .get(PRIMARY_TYPE)
            .and_then(Value::as_str)
            .map(ResourceKind::from_primary_type)
            .unwrap_or_default();
        let mut node = Self::new(path, kind, PropertyMap::new()).with_children(Children::empty());
        node.pending = Some(properties);
        node
    }

    /// The same resource under another path, with the current view of its
    /// properties as the new origin. Child names carry over unchanged.
    pub(crate) fn relocated(&self, path: ResourcePath, keep_identity: bool) -> Self {
        Self {
            id: if keep_identity { self.id } else { NodeId::next() },
            path,
            kind: self.kind,
            properties: self.properties().clone(),
            children: self.children.clone(),
            pending: None,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn path(&self) -> &ResourcePath {
        &self.path
    }

    pub fn name(&self) -> &str {
        self.path.name()
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn children(&self) -> &Children {
        &self.children
    }

    pub(crate) fn set_children(&mut self, children: Children) {
        self.children = children;
    }

    /// Current view of the properties, pending edits included.
    pub fn properties(&self) -> &PropertyMap {
        self.pending.as_ref().unwrap_or(&self.properties)
    }

    /// Properties as last read from the remote.
    pub fn origin_properties(&self) -> &PropertyMap {
        &self.properties
    }

    pub fn pending(&self) -> Option<&PropertyMap> {
        self.pending.as_ref()
    }

    pub fn has_pending_edits(&self) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|pending| pending != &self.properties)
    }

    /// Open the node for modification.
    pub(crate) fn edit(&mut self) -> &mut PropertyMap {
        let origin = &self.properties;
        self.pending.get_or_insert_with(|| origin.clone())
    }

    pub fn is_accessible(&self) -> bool {
        self.get_bool(NOT_ACCESSIBLE) != Some(true)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.properties().get(name)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    pub fn get_long(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Value::as_long)
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(Value::as_bool)
    }

    pub fn get_date(&self, name: &str) -> Option<&DateTime<FixedOffset>> {
        self.get(name).and_then(Value::as_date)
    }

    pub fn primary_type(&self) -> Option<&str> {
        self.get_str(PRIMARY_TYPE)
    }

    /// `sling:resourceType`, falling back to `jcr:primaryType`.
    pub fn resource_type(&self) -> Option<&str> {
        self.get_str(RESOURCE_TYPE).or_else(|| self.primary_type())
    }
}
