//! Absolute, normalized resource paths.

use std::fmt;
use std::str::FromStr;

/// Errors related to path parsing and validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    /// A path segment is not a valid resource name.
    InvalidSegment {
        segment: String,
        position: usize,
        message: String,
    },
    /// The path string is invalid.
    InvalidPath { message: String },
}

impl fmt::Display for PathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathError::InvalidSegment {
                segment,
                position,
                message,
            } => {
                write!(
                    f,
                    "invalid path segment '{}' at position {}: {}",
                    segment, position, message
                )
            }
            PathError::InvalidPath { message } => {
                write!(f, "invalid path: {}", message)
            }
        }
    }
}

impl std::error::Error for PathError {}

/// An absolute path in a hierarchical resource tree.
///
/// Always starts with `/`, never ends with `/` (except the root itself) and
/// never contains empty, `.` or `..` segments. Segments may contain any other
/// character, including the `:` namespace separator (`jcr:content`).
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct ResourcePath {
    inner: String,
}

impl ResourcePath {
    /// The root path `/`.
    pub fn root() -> Self {
        Self {
            inner: "/".to_string(),
        }
    }

    /// Parse and normalize an absolute path.
    ///
    /// Repeated and trailing slashes are collapsed.
    ///
    /// ```rust
    /// use remount_core::ResourcePath;
    ///
    /// let path = ResourcePath::parse("/content//site/").unwrap();
    /// assert_eq!(path.as_str(), "/content/site");
    /// assert!(ResourcePath::parse("content").is_err());
    /// ```
    pub fn parse(s: &str) -> Result<Self, PathError> {
        if !s.starts_with('/') {
            return Err(PathError::InvalidPath {
                message: format!("'{}' is not absolute", s),
            });
        }

        let mut inner = String::with_capacity(s.len());
        for (i, segment) in s.split('/').filter(|c| !c.is_empty()).enumerate() {
            Self::validate_segment(segment, i)?;
            inner.push('/');
            inner.push_str(segment);
        }

        if inner.is_empty() {
            return Ok(Self::root());
        }
        Ok(Self { inner })
    }

    /// Build a path from segments, validating each.
    pub fn from_segments<I, S>(segments: I) -> Result<Self, PathError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut path = Self::root();
        for segment in segments {
            path = path.child(segment.as_ref())?;
        }
        Ok(path)
    }

    fn validate_segment(segment: &str, position: usize) -> Result<(), PathError> {
        let message = if segment.is_empty() {
            "empty segment"
        } else if segment == "." || segment == ".." {
            "relative segments are not allowed"
        } else if segment.contains('/') {
            "segment contains '/'"
        } else {
            return Ok(());
        };

        Err(PathError::InvalidSegment {
            segment: segment.to_string(),
            position,
            message: message.to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.inner
    }

    pub fn is_root(&self) -> bool {
        self.inner == "/"
    }

    /// Number of segments (the root has none).
    pub fn depth(&self) -> usize {
        self.segments().count()
    }

    /// Iterate over segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.inner.split('/').filter(|c| !c.is_empty())
    }

    /// Last segment, or `""` for the root.
    pub fn name(&self) -> &str {
        match self.inner.rfind('/') {
            Some(i) => &self.inner[i + 1..],
            None => "",
        }
    }

    /// Parent path, or `None` for the root.
    pub fn parent(&self) -> Option<ResourcePath> {
        if self.is_root() {
            return None;
        }
        match self.inner.rfind('/') {
            Some(0) => Some(Self::root()),
            Some(i) => Some(Self {
                inner: self.inner[..i].to_string(),
            }),
            None => None,
        }
    }

    /// Append a single segment.
    pub fn child(&self, name: &str) -> Result<ResourcePath, PathError> {
        Self::validate_segment(name, self.depth())?;
        let inner = if self.is_root() {
            format!("/{}", name)
        } else {
            format!("{}/{}", self.inner, name)
        };
        Ok(Self { inner })
    }

    /// Append a relative path (`a/b`); leading slashes are ignored.
    pub fn join(&self, relative: &str) -> Result<ResourcePath, PathError> {
        let mut path = self.clone();
        for segment in relative.split('/').filter(|c| !c.is_empty()) {
            path = path.child(segment)?;
        }
        Ok(path)
    }

    /// True if `self` equals `prefix` or lies beneath it.
    pub fn has_prefix(&self, prefix: &ResourcePath) -> bool {
        if prefix.is_root() || self == prefix {
            return true;
        }
        self.inner.starts_with(prefix.as_str())
            && self.inner.as_bytes().get(prefix.inner.len()) == Some(&b'/')
    }

    /// True if `self` lies strictly beneath `ancestor`.
    pub fn is_descendant_of(&self, ancestor: &ResourcePath) -> bool {
        self != ancestor && self.has_prefix(ancestor)
    }

    /// Strip a prefix, returning the remainder as `""` (equal) or `/rest`.
    ///
    /// Returns `None` if the prefix doesn't match.
    pub fn strip_prefix(&self, prefix: &ResourcePath) -> Option<&str> {
        if !self.has_prefix(prefix) {
            return None;
        }
        if prefix.is_root() {
            if self.is_root() {
                return Some("");
            }
            return Some(&self.inner);
        }
        Some(&self.inner[prefix.inner.len()..])
    }

    /// Ancestors from the immediate parent up to the root.
    pub fn ancestors(&self) -> Ancestors {
        Ancestors {
            next: self.parent(),
        }
    }
}

/// Iterator returned by [`ResourcePath::ancestors`].
pub struct Ancestors {
    next: Option<ResourcePath>,
}

impl Iterator for Ancestors {
    type Item = ResourcePath;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next.take()?;
        self.next = current.parent();
        Some(current)
    }
}

impl fmt::Display for ResourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inner)
    }
}

impl FromStr for ResourcePath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<&str> for ResourcePath {
    type Error = PathError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Self::parse(s)
    }
}

impl AsRef<str> for ResourcePath {
    fn as_ref(&self) -> &str {
        &self.inner
    }
}

/// Macro for creating paths from literals.
///
/// # Example
///
/// ```rust
/// use remount_core::rpath;
///
/// let p = rpath!("/content/site");
/// assert_eq!(p.depth(), 2);
/// ```
#[macro_export]
macro_rules! rpath {
    ($s:expr) => {
        $crate::ResourcePath::parse($s).expect("invalid path literal")
    };
}
