//! Mapping between the local mount namespace and the remote namespace.

use regex::Regex;

use crate::path::ResourcePath;

/// Placeholder substituted with the (escaped) mount root in ignore patterns.
pub const MOUNT_ROOT_PLACEHOLDER: &str = "${mount_root}";

/// Ignore pattern that keeps a mount from mirroring itself when the remote
/// repository is the local one.
pub const SELF_MOUNT_PATTERN: &str = "^${mount_root}${mount_root}(/.*)?$";

/// Translates paths between a local mount root and the remote root.
#[derive(Debug, Clone)]
pub struct PathTranslator {
    mount_root: ResourcePath,
    ignore: Vec<Regex>,
}

impl PathTranslator {
    /// Create a translator, compiling the ignore patterns.
    ///
    /// Every occurrence of `${mount_root}` in a pattern is replaced with the
    /// regex-escaped mount root before compilation.
    pub fn new<S: AsRef<str>>(
        mount_root: ResourcePath,
        ignore_patterns: &[S],
    ) -> Result<Self, regex::Error> {
        let escaped = regex::escape(mount_root.as_str());
        let ignore = ignore_patterns
            .iter()
            .map(|p| Regex::new(&p.as_ref().replace(MOUNT_ROOT_PLACEHOLDER, &escaped)))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { mount_root, ignore })
    }

    pub fn mount_root(&self) -> &ResourcePath {
        &self.mount_root
    }

    /// Strip the mount root prefix; paths outside the mount pass through.
    pub fn to_remote(&self, path: &ResourcePath) -> ResourcePath {
        match path.strip_prefix(&self.mount_root) {
            Some("") => ResourcePath::root(),
            Some(rest) => ResourcePath::parse(rest).unwrap_or_else(|_| path.clone()),
            None => path.clone(),
        }
    }

    /// Prepend the mount root unless the path is already rooted there.
    pub fn to_local(&self, path: &ResourcePath) -> ResourcePath {
        if self.is_local(path) {
            return path.clone();
        }
        self.mount_root
            .join(path.as_str())
            .unwrap_or_else(|_| self.mount_root.clone())
    }

    /// True iff the path is the mount root or beneath it.
    pub fn is_local(&self, path: &ResourcePath) -> bool {
        path.has_prefix(&self.mount_root)
    }

    /// True iff any ignore pattern matches.
    pub fn is_ignored(&self, path: &str) -> bool {
        self.ignore.iter().any(|re| re.is_match(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpath;

    fn translator() -> PathTranslator {
        PathTranslator::new(rpath!("/mnt/remote"), &[SELF_MOUNT_PATTERN, r"\.lock$"]).unwrap()
    }

    #[test]
    fn to_remote_strips_mount_root() {
        let t = translator();
        assert_eq!(t.to_remote(&rpath!("/mnt/remote/content/a")), rpath!("/content/a"));
        assert_eq!(t.to_remote(&rpath!("/mnt/remote")), ResourcePath::root());
        assert_eq!(t.to_remote(&rpath!("/elsewhere")), rpath!("/elsewhere"));
    }

    #[test]
    fn to_local_prepends_mount_root() {
        let t = translator();
        assert_eq!(t.to_local(&rpath!("/content/a")), rpath!("/mnt/remote/content/a"));
        assert_eq!(t.to_local(&ResourcePath::root()), rpath!("/mnt/remote"));
        assert_eq!(t.to_local(&rpath!("/mnt/remote/x")), rpath!("/mnt/remote/x"));
    }

    #[test]
    fn local_remote_roundtrip() {
        let t = translator();
        for p in ["/mnt/remote", "/mnt/remote/a", "/mnt/remote/a/jcr:content/b c"] {
            let local = rpath!(p);
            assert_eq!(t.to_local(&t.to_remote(&local)), local);
        }
    }

    #[test]
    fn to_local_is_always_local() {
        let t = translator();
        for p in ["/", "/a", "/mnt", "/mnt/remote/z", "/mnt/remotely"] {
            assert!(t.is_local(&t.to_local(&rpath!(p))), "{}", p);
        }
    }

    #[test]
    fn is_local_respects_segments() {
        let t = translator();
        assert!(t.is_local(&rpath!("/mnt/remote")));
        assert!(t.is_local(&rpath!("/mnt/remote/a")));
        assert!(!t.is_local(&rpath!("/mnt/remotely")));
        assert!(!t.is_local(&rpath!("/mnt")));
    }

    #[test]
    fn ignore_patterns_substitute_mount_root() {
        let t = translator();
        assert!(t.is_ignored("/mnt/remote/mnt/remote"));
        assert!(t.is_ignored("/mnt/remote/mnt/remote/deeper"));
        assert!(!t.is_ignored("/mnt/remote/mnt/remotely"));
        assert!(!t.is_ignored("/mnt/remote/content"));
        assert!(t.is_ignored("/mnt/remote/content/.lock"));
    }

    #[test]
    fn invalid_pattern_rejected() {
        assert!(PathTranslator::new(rpath!("/m"), &["(unclosed"]).is_err());
    }
}
