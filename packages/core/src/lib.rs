//! Core types for mirroring a remote resource tree.
//!
//! This crate holds the pieces that need no I/O:
//! - `ResourcePath`: absolute, normalized resource paths
//! - `Value`: typed property values (the repository's property taxonomy)
//! - `codec`: conversion between wire strings and typed values
//! - `PathTranslator`: mapping between the local mount and the remote root
//!
//! # Example
//!
//! ```rust
//! use remount_core::{codec, rpath, PathTranslator, Value};
//!
//! let translator = PathTranslator::new(rpath!("/mnt/remote"), &[] as &[&str]).unwrap();
//! assert_eq!(translator.to_remote(&rpath!("/mnt/remote/content")), rpath!("/content"));
//! assert_eq!(codec::decode_string("{Long}42"), Value::Long(42));
//! ```

pub use bytes::Bytes;

pub mod codec;
mod error;
mod path;
mod translator;
mod value;

pub use codec::WireField;
pub use error::CodecError;
pub use path::{Ancestors, PathError, ResourcePath};
pub use translator::{PathTranslator, MOUNT_ROOT_PLACEHOLDER, SELF_MOUNT_PATTERN};
pub use value::{Binary, Decimal, InlineBinary, PropertyMap, PropertyType, RemoteBinary, Value};
