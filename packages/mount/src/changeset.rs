//! Pending mutations of one session.

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use remount_core::{InlineBinary, ResourcePath};

use crate::node::RemoteNode;

/// Position of a resource among its siblings, rendered into `:order`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderHint {
    First,
    Last,
    Before(String),
    After(String),
    Index(usize),
}

impl fmt::Display for OrderHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderHint::First => f.write_str("first"),
            OrderHint::Last => f.write_str("last"),
            OrderHint::Before(name) => write!(f, "before {}", name),
            OrderHint::After(name) => write!(f, "after {}", name),
            OrderHint::Index(index) => write!(f, "{}", index),
        }
    }
}

impl FromStr for OrderHint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s {
            "first" => return Ok(OrderHint::First),
            "last" => return Ok(OrderHint::Last),
            _ => {}
        }
        if let Some(name) = s.strip_prefix("before ") {
            return Ok(OrderHint::Before(name.trim().to_string()));
        }
        if let Some(name) = s.strip_prefix("after ") {
            return Ok(OrderHint::After(name.trim().to_string()));
        }
        s.parse()
            .map(OrderHint::Index)
            .map_err(|_| format!("invalid order hint '{}'", s))
    }
}

/// Kind of a pending mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Modify,
    Create,
    Upload,
    Copy,
    Move,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::Modify => "modify",
            Operation::Create => "create",
            Operation::Upload => "upload",
            Operation::Copy => "copy",
            Operation::Move => "move",
            Operation::Delete => "delete",
        })
    }
}

/// One pending mutation, keyed by the path it affects.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeRecord {
    Modify {
        node: RemoteNode,
    },
    Create {
        node: RemoteNode,
    },
    Upload {
        node: RemoteNode,
        content: InlineBinary,
        charset: Option<String>,
    },
    Copy {
        node: RemoteNode,
        source: ResourcePath,
    },
    Move {
        node: RemoteNode,
        source: ResourcePath,
        order: Option<OrderHint>,
    },
    Delete {
        node: RemoteNode,
    },
}

impl ChangeRecord {
    pub fn node(&self) -> &RemoteNode {
        match self {
            ChangeRecord::Modify { node }
            | ChangeRecord::Create { node }
            | ChangeRecord::Upload { node, .. }
            | ChangeRecord::Copy { node, .. }
            | ChangeRecord::Move { node, .. }
            | ChangeRecord::Delete { node } => node,
        }
    }

    pub(crate) fn node_mut(&mut self) -> &mut RemoteNode {
        match self {
            ChangeRecord::Modify { node }
            | ChangeRecord::Create { node }
            | ChangeRecord::Upload { node, .. }
            | ChangeRecord::Copy { node, .. }
            | ChangeRecord::Move { node, .. }
            | ChangeRecord::Delete { node } => node,
        }
    }

    /// Target path.
    pub fn path(&self) -> &ResourcePath {
        self.node().path()
    }

    pub fn operation(&self) -> Operation {
        match self {
            ChangeRecord::Modify { .. } => Operation::Modify,
            ChangeRecord::Create { .. } => Operation::Create,
            ChangeRecord::Upload { .. } => Operation::Upload,
            ChangeRecord::Copy { .. } => Operation::Copy,
            ChangeRecord::Move { .. } => Operation::Move,
            ChangeRecord::Delete { .. } => Operation::Delete,
        }
    }

    /// Path this record makes disappear, if any.
    fn removes(&self) -> Option<&ResourcePath> {
        match self {
            ChangeRecord::Delete { node } => Some(node.path()),
            ChangeRecord::Move { node, source, .. } if source != node.path() => Some(source),
            _ => None,
        }
    }
}

/// What the pending changes say about a path.
#[derive(Debug, PartialEq)]
pub enum Lookup<'a> {
    /// A pending record holds the node.
    Pending(&'a RemoteNode),
    /// Deleted or moved away, itself or through an ancestor.
    Gone,
    /// No pending change applies.
    Unknown,
}

/// Ordered pending mutations, at most one per path.
///
/// Structural records (create, upload, copy, move, delete) replace an
/// existing record for the same path and go to the end of the commit order.
/// Property edits merge into whatever record already holds the node.
#[derive(Debug, Default, Clone)]
pub struct ChangeSet {
    records: IndexMap<ResourcePath, ChangeRecord>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in commit order.
    pub fn iter(&self) -> impl Iterator<Item = &ChangeRecord> {
        self.records.values()
    }

    pub fn get(&self, path: &ResourcePath) -> Option<&ChangeRecord> {
        self.records.get(path)
    }

    /// Add a structural record, replacing any record for the same path.
    pub fn insert(&mut self, record: ChangeRecord) {
        let path = record.path().clone();
        self.records.shift_remove(&path);
        self.records.insert(path, record);
    }

    /// The node to apply property edits to.
    ///
    /// An existing record for the path keeps collecting edits; otherwise
    /// `node` is recorded as a new modification.
    pub fn edit(&mut self, node: RemoteNode) -> &mut RemoteNode {
        let path = node.path().clone();
        self.records
            .entry(path)
            .or_insert_with(|| ChangeRecord::Modify { node })
            .node_mut()
    }

    /// Mutable access to the node of an existing record.
    pub(crate) fn node_mut(&mut self, path: &ResourcePath) -> Option<&mut RemoteNode> {
        self.records.get_mut(path).map(ChangeRecord::node_mut)
    }

    /// Replace the order hint of a pending move. False if `path` has no
    /// move record.
    pub(crate) fn set_order(&mut self, path: &ResourcePath, hint: OrderHint) -> bool {
        match self.records.get_mut(path) {
            Some(ChangeRecord::Move { order, .. }) => {
                *order = Some(hint);
                true
            }
            _ => false,
        }
    }

    pub fn lookup(&self, path: &ResourcePath) -> Lookup<'_> {
        for record in self.records.values().rev() {
            if let Some(removed) = record.removes() {
                if path.has_prefix(removed) {
                    return Lookup::Gone;
                }
            }
            if record.path() == path && record.operation() != Operation::Delete {
                return Lookup::Pending(record.node());
            }
        }
        Lookup::Unknown
    }

    /// Where the remote still keeps what a pending copy or move shows at
    /// `path`: the record's source, or the matching path beneath it.
    pub fn source_of(&self, path: &ResourcePath) -> Option<ResourcePath> {
        for record in self.records.values().rev() {
            let (target, source) = match record {
                ChangeRecord::Copy { node, source } => (node.path(), source),
                ChangeRecord::Move { node, source, .. } if source != node.path() => {
                    (node.path(), source)
                }
                _ => continue,
            };
            if let Some(rest) = path.strip_prefix(target) {
                return source.join(rest).ok();
            }
        }
        None
    }

    /// Names of pending resources directly below `parent`, in record order.
    pub fn pending_children(&self, parent: &ResourcePath) -> Vec<String> {
        self.records
            .values()
            .filter(|record| record.operation() != Operation::Delete)
            .filter(|record| record.path().parent().as_ref() == Some(parent))
            .map(|record| record.path().name().to_string())
            .collect()
    }

    /// Take every record in commit order, leaving the set empty.
    pub fn drain(&mut self) -> Vec<ChangeRecord> {
        self.records.drain(..).map(|(_, record)| record).collect()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}
