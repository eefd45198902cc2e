//! Fetching one resource and its immediate children.
//!
//! The JSON rendering is tried first. Any non-200 status, transport failure
//! or unparsable body falls through to a depth-1 PROPFIND. What WebDAV can't
//! answer either becomes absence or an inaccessible stub, never an error.

pub(crate) mod json;
pub(crate) mod webdav;

use remount_core::{codec, Binary, PropertyMap, RemoteBinary, ResourcePath, Value};
use tracing::{debug, warn};

use crate::mount::MountContext;
use crate::node::{Children, RemoteNode, ResourceKind, JCR_DATA, PRIMARY_TYPE};

/// Why a response body could not be understood.
#[derive(thiserror::Error, Debug)]
pub(crate) enum ParseError {
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed XML: {0}")]
    Xml(#[from] xmlparser::Error),

    #[error("unexpected structure: {0}")]
    Structure(&'static str),
}

#[derive(thiserror::Error, Debug)]
enum JsonUnavailable {
    #[error("{0}")]
    Transport(#[from] remount_http::Error),

    #[error("status {0}")]
    Status(u16),

    #[error("{0}")]
    Parse(#[from] ParseError),
}

/// A loaded resource together with the children listed alongside it.
#[derive(Debug, Clone)]
pub struct Loaded {
    pub node: RemoteNode,
    pub children: Vec<RemoteNode>,
}

impl Loaded {
    fn stub(path: &ResourcePath) -> Self {
        Self {
            node: RemoteNode::not_accessible(path.clone()),
            children: Vec::new(),
        }
    }
}

/// Loads resources of one mount.
pub struct ResourceLoader<'a> {
    context: &'a MountContext,
}

impl<'a> ResourceLoader<'a> {
    pub fn new(context: &'a MountContext) -> Self {
        Self { context }
    }

    /// Load the resource at a local path.
    ///
    /// `known_child` marks a resource some listing already reported; a 404
    /// for it yields a stub instead of absence.
    pub fn load(&self, path: &ResourcePath, known_child: bool) -> Option<Loaded> {
        let translator = self.context.translator();
        if translator.is_ignored(path.as_str()) {
            debug!(path = %path, "Ignored path");
            return None;
        }
        let remote = translator.to_remote(path);

        debug!(path = %path, remote = %remote, "Loading JSON rendering");
        match self.load_json(path, &remote) {
            Ok(loaded) => return Some(loaded),
            Err(reason) => {
                debug!(
                    path = %path,
                    reason = %reason,
                    "JSON rendering unavailable, falling back to WebDAV"
                );
            }
        }

        self.load_webdav(path, &remote, known_child)
    }

    fn load_json(
        &self,
        path: &ResourcePath,
        remote: &ResourcePath,
    ) -> Result<Loaded, JsonUnavailable> {
        let response = self.context.transport().get_json(remote.as_str())?;
        if response.status != 200 {
            return Err(JsonUnavailable::Status(response.status));
        }

        let parsed = json::parse(&response.body)?;

        let mut names = Vec::new();
        let mut children = Vec::new();
        for (name, child) in parsed.children {
            let Some((child_path, child_remote)) = self.child_paths(path, remote, &name) else {
                continue;
            };
            let child_children = if child.nested {
                Children::Unresolved
            } else {
                Children::empty()
            };
            children.push(
                self.json_node(child_path, &child_remote, child.properties)
                    .with_children(child_children),
            );
            names.push(name);
        }

        let node = self
            .json_node(path.clone(), remote, parsed.properties)
            .with_children(Children::Resolved(names));
        Ok(Loaded { node, children })
    }

    fn json_node(
        &self,
        path: ResourcePath,
        remote: &ResourcePath,
        mut properties: PropertyMap,
    ) -> RemoteNode {
        self.attach_binaries(&mut properties, remote);
        let kind = properties
            .get(PRIMARY_TYPE)
            .and_then(Value::as_str)
            .map(ResourceKind::from_primary_type)
            .unwrap_or_default();
        RemoteNode::new(path, kind, properties)
    }

    /// `:jcr:data = 1234` announces a binary; expose it under `jcr:data`.
    fn attach_binaries(&self, properties: &mut PropertyMap, remote: &ResourcePath) {
        let binaries: Vec<(String, i64)> = properties
            .iter()
            .filter_map(|(name, value)| {
                let bare = name.strip_prefix(':')?;
                if !bare.starts_with("jcr:") {
                    return None;
                }
                Some((bare.to_string(), value.as_long()?))
            })
            .collect();

        for (name, length) in binaries {
            let url = self.context.transport().property_url(remote.as_str(), &name);
            properties.insert(name, self.remote_binary(url, Some(length)));
        }
    }

    fn remote_binary(&self, url: String, length: Option<i64>) -> Value {
        Value::Binary(Binary::Remote(RemoteBinary {
            url,
            length,
            origin: self.context.origin().to_string(),
        }))
    }

    fn child_paths(
        &self,
        path: &ResourcePath,
        remote: &ResourcePath,
        name: &str,
    ) -> Option<(ResourcePath, ResourcePath)> {
        let (local, remote) = match (path.child(name), remote.child(name)) {
            (Ok(local), Ok(remote)) => (local, remote),
            _ => {
                debug!(path = %path, name, "Skipping child with unusable name");
                return None;
            }
        };
        if self.context.translator().is_ignored(local.as_str()) {
            debug!(path = %local, "Ignored child");
            return None;
        }
        Some((local, remote))
    }

    fn load_webdav(
        &self,
        path: &ResourcePath,
        remote: &ResourcePath,
        known_child: bool,
    ) -> Option<Loaded> {
        debug!(path = %path, remote = %remote, "Loading via PROPFIND");
        let response = match self.context.transport().propfind(remote.as_str()) {
            Ok(response) => response,
            Err(e) => {
                if known_child {
                    warn!(path = %path, error = %e, "PROPFIND failed, resource not accessible");
                    return Some(Loaded::stub(path));
                }
                debug!(path = %path, error = %e, "PROPFIND failed");
                return None;
            }
        };

        if response.status == 404 && !known_child {
            debug!(path = %path, "Resource does not exist");
            return None;
        }
        if !response.is_multi_status() {
            warn!(path = %path, status = response.status, "Resource not accessible");
            return Some(Loaded::stub(path));
        }

        match self.webdav_listing(path, remote, &response.text()) {
            Ok(loaded) => Some(loaded),
            Err(e) => {
                warn!(path = %path, error = %e, "Unreadable multistatus, resource not accessible");
                Some(Loaded::stub(path))
            }
        }
    }

    fn webdav_listing(
        &self,
        path: &ResourcePath,
        remote: &ResourcePath,
        body: &str,
    ) -> Result<Loaded, ParseError> {
        let responses = webdav::parse_multistatus(body)?;
        let base_path = webdav::href_path(self.context.transport().base_url());

        let mut own = None;
        let mut names = Vec::new();
        let mut children = Vec::new();
        for response in &responses {
            let location = webdav::locate(&response.href, &base_path);
            let Ok(item) = ResourcePath::parse(&location.path) else {
                continue;
            };

            if &item == remote {
                own = Some((response, location.trailing_slash));
                continue;
            }
            if item.parent().as_ref() != Some(remote) {
                continue;
            }
            let Some((child_path, child_remote)) = self.child_paths(path, remote, item.name())
            else {
                continue;
            };
            names.push(item.name().to_string());
            children.push(self.dav_node(
                child_path,
                &child_remote,
                response,
                location.trailing_slash,
            ));
        }

        let (response, trailing_slash) =
            own.ok_or(ParseError::Structure("requested resource missing from multistatus"))?;
        let node = self
            .dav_node(path.clone(), remote, response, trailing_slash)
            .with_children(Children::Resolved(names));
        Ok(Loaded { node, children })
    }

    fn dav_node(
        &self,
        path: ResourcePath,
        remote: &ResourcePath,
        response: &webdav::DavResponse,
        trailing_slash: bool,
    ) -> RemoteNode {
        let mut properties = PropertyMap::new();
        for (name, text) in &response.properties {
            properties.insert(name.clone(), codec::decode_string(text));
        }

        let raw = |name: &str| {
            response
                .properties
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.trim())
        };
        let content_length = raw("dav:getcontentlength");

        let kind = if response.collection || trailing_slash {
            ResourceKind::Folder
        } else if content_length.is_some() || raw("dav:getcontenttype").is_some() {
            ResourceKind::File
        } else {
            ResourceKind::Unknown
        };

        if !properties.contains_key(PRIMARY_TYPE) {
            properties.insert(
                PRIMARY_TYPE.to_string(),
                Value::from(kind.default_primary_type()),
            );
        }
        if kind == ResourceKind::File && !properties.contains_key(JCR_DATA) {
            let length = content_length.and_then(|l| l.parse().ok());
            let url = self.context.transport().url_for(remote.as_str());
            properties.insert(JCR_DATA.to_string(), self.remote_binary(url, length));
        }

        RemoteNode::new(path, kind, properties)
    }
}
