//! The contract a host repository uses to drive a mount session.

use bytes::Bytes;
use remount_core::{PropertyMap, ResourcePath, Value};

use crate::binary::BinaryStream;
use crate::changeset::OrderHint;
use crate::node::RemoteNode;
use crate::resolver::{Resolver, UploadOptions};
use crate::writer::CommitReport;
use crate::Error;

/// Read access to a mounted tree.
///
/// Reads never fail for missing or unreadable remote resources; those
/// resolve to `None` or to a stub marked not accessible.
///
/// # Object Safety
///
/// This trait is object-safe: you can use `Box<dyn ResourceReader>`.
pub trait ResourceReader: Send {
    fn resolve(&mut self, path: &ResourcePath) -> Option<RemoteNode>;

    fn children(&mut self, path: &ResourcePath) -> Vec<RemoteNode>;

    fn open_binary(&mut self, path: &ResourcePath, property: &str) -> Result<BinaryStream, Error>;
}

/// Buffered mutations of a mounted tree.
///
/// Mutations are validated immediately and recorded; nothing reaches the
/// remote before [`commit`](ResourceWriter::commit).
pub trait ResourceWriter: Send {
    fn set_property(&mut self, path: &ResourcePath, name: &str, value: Value) -> Result<(), Error>;

    fn remove_property(&mut self, path: &ResourcePath, name: &str) -> Result<Option<Value>, Error>;

    fn create(
        &mut self,
        parent: &ResourcePath,
        name: &str,
        properties: PropertyMap,
    ) -> Result<RemoteNode, Error>;

    fn upload(
        &mut self,
        parent: &ResourcePath,
        name: &str,
        content: Bytes,
        options: UploadOptions,
    ) -> Result<RemoteNode, Error>;

    fn copy(
        &mut self,
        source: &ResourcePath,
        destination_parent: &ResourcePath,
    ) -> Result<RemoteNode, Error>;

    fn move_to(
        &mut self,
        source: &ResourcePath,
        destination_parent: &ResourcePath,
        order: Option<OrderHint>,
    ) -> Result<RemoteNode, Error>;

    fn order(&mut self, path: &ResourcePath, hint: OrderHint) -> Result<RemoteNode, Error>;

    fn delete(&mut self, path: &ResourcePath) -> Result<(), Error>;

    fn commit(&mut self) -> Result<CommitReport, Error>;

    fn rollback(&mut self);

    fn has_changes(&self) -> bool;
}

/// Combined read/write access, implemented for anything that does both.
pub trait ResourceProvider: ResourceReader + ResourceWriter {}
impl<T: ResourceReader + ResourceWriter> ResourceProvider for T {}

impl ResourceReader for Resolver {
    fn resolve(&mut self, path: &ResourcePath) -> Option<RemoteNode> {
        Resolver::resolve(self, path)
    }

    fn children(&mut self, path: &ResourcePath) -> Vec<RemoteNode> {
        Resolver::children(self, path)
    }

    fn open_binary(&mut self, path: &ResourcePath, property: &str) -> Result<BinaryStream, Error> {
        Resolver::open_binary(self, path, property)
    }
}

impl ResourceWriter for Resolver {
    fn set_property(&mut self, path: &ResourcePath, name: &str, value: Value) -> Result<(), Error> {
        Resolver::set_property(self, path, name, value)
    }

    fn remove_property(&mut self, path: &ResourcePath, name: &str) -> Result<Option<Value>, Error> {
        Resolver::remove_property(self, path, name)
    }

    fn create(
        &mut self,
        parent: &ResourcePath,
        name: &str,
        properties: PropertyMap,
    ) -> Result<RemoteNode, Error> {
        Resolver::create(self, parent, name, properties)
    }

    fn upload(
        &mut self,
        parent: &ResourcePath,
        name: &str,
        content: Bytes,
        options: UploadOptions,
    ) -> Result<RemoteNode, Error> {
        Resolver::upload(self, parent, name, content, options)
    }

    fn copy(
        &mut self,
        source: &ResourcePath,
        destination_parent: &ResourcePath,
    ) -> Result<RemoteNode, Error> {
        Resolver::copy(self, source, destination_parent)
    }

    fn move_to(
        &mut self,
        source: &ResourcePath,
        destination_parent: &ResourcePath,
        order: Option<OrderHint>,
    ) -> Result<RemoteNode, Error> {
        Resolver::move_to(self, source, destination_parent, order)
    }

    fn order(&mut self, path: &ResourcePath, hint: OrderHint) -> Result<RemoteNode, Error> {
        Resolver::order(self, path, hint)
    }

    fn delete(&mut self, path: &ResourcePath) -> Result<(), Error> {
        Resolver::delete(self, path)
    }

    fn commit(&mut self) -> Result<CommitReport, Error> {
        Resolver::commit(self)
    }

    fn rollback(&mut self) {
        Resolver::rollback(self)
    }

    fn has_changes(&self) -> bool {
        Resolver::has_changes(self)
    }
}

// Blanket implementations for references and boxes

impl<T: ResourceReader + ?Sized> ResourceReader for &mut T {
    fn resolve(&mut self, path: &ResourcePath) -> Option<RemoteNode> {
        (**self).resolve(path)
    }

    fn children(&mut self, path: &ResourcePath) -> Vec<RemoteNode> {
        (**self).children(path)
    }

    fn open_binary(&mut self, path: &ResourcePath, property: &str) -> Result<BinaryStream, Error> {
        (**self).open_binary(path, property)
    }
}

impl<T: ResourceReader + ?Sized> ResourceReader for Box<T> {
    fn resolve(&mut self, path: &ResourcePath) -> Option<RemoteNode> {
        self.as_mut().resolve(path)
    }

    fn children(&mut self, path: &ResourcePath) -> Vec<RemoteNode> {
        self.as_mut().children(path)
    }

    fn open_binary(&mut self, path: &ResourcePath, property: &str) -> Result<BinaryStream, Error> {
        self.as_mut().open_binary(path, property)
    }
}

macro_rules! forward_writer {
    ($($deref:tt)*) => {
        fn set_property(
            &mut self,
            path: &ResourcePath,
            name: &str,
            value: Value,
        ) -> Result<(), Error> {
            ($($deref)* self).set_property(path, name, value)
        }

        fn remove_property(
            &mut self,
            path: &ResourcePath,
            name: &str,
        ) -> Result<Option<Value>, Error> {
            ($($deref)* self).remove_property(path, name)
        }

        fn create(
            &mut self,
            parent: &ResourcePath,
            name: &str,
            properties: PropertyMap,
        ) -> Result<RemoteNode, Error> {
            ($($deref)* self).create(parent, name, properties)
        }

        fn upload(
            &mut self,
            parent: &ResourcePath,
            name: &str,
            content: Bytes,
            options: UploadOptions,
        ) -> Result<RemoteNode, Error> {
            ($($deref)* self).upload(parent, name, content, options)
        }

        fn copy(
            &mut self,
            source: &ResourcePath,
            destination_parent: &ResourcePath,
        ) -> Result<RemoteNode, Error> {
            ($($deref)* self).copy(source, destination_parent)
        }

        fn move_to(
            &mut self,
            source: &ResourcePath,
            destination_parent: &ResourcePath,
            order: Option<OrderHint>,
        ) -> Result<RemoteNode, Error> {
            ($($deref)* self).move_to(source, destination_parent, order)
        }

        fn order(&mut self, path: &ResourcePath, hint: OrderHint) -> Result<RemoteNode, Error> {
            ($($deref)* self).order(path, hint)
        }

        fn delete(&mut self, path: &ResourcePath) -> Result<(), Error> {
            ($($deref)* self).delete(path)
        }

        fn commit(&mut self) -> Result<CommitReport, Error> {
            ($($deref)* self).commit()
        }

        fn rollback(&mut self) {
            ($($deref)* self).rollback()
        }

        fn has_changes(&self) -> bool {
            ($($deref)* self).has_changes()
        }
    };
}

impl<T: ResourceWriter + ?Sized> ResourceWriter for &mut T {
    forward_writer!(**);
}

impl<T: ResourceWriter + ?Sized> ResourceWriter for Box<T> {
    forward_writer!(**);
}
