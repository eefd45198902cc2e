//! Reading `207 Multi-Status` PROPFIND responses.
//!
//! Only the parts needed to mirror one level of a tree are understood:
//! `response`, `href`, `propstat`, `prop`, `status` and the `collection`
//! marker inside `resourcetype`. Properties are reported as text; structured
//! property values are dropped.

use std::borrow::Cow;

use lazy_static::lazy_static;
use percent_encoding::percent_decode_str;
use regex::Regex;
use url::Url;
use xmlparser::{ElementEnd, Token, Tokenizer};

use super::ParseError;

const DAV_NS: &str = "DAV:";

lazy_static! {
    static ref HREF_PATTERN: Regex = Regex::new(r"^(.*)/([^/]+)(/?)$").unwrap();
}

/// One `<D:response>` element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct DavResponse {
    pub href: String,
    /// Properties from successful propstats, in document order.
    pub properties: Vec<(String, String)>,
    pub collection: bool,
}

/// A location reported in an href, relative to the remote root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DavLocation {
    /// Normalized remote path, no trailing slash.
    pub path: String,
    /// The href ended in a slash.
    pub trailing_slash: bool,
}

/// The path of an href, which is either an absolute URL or already a path.
pub(crate) fn href_path(href: &str) -> String {
    match Url::parse(href) {
        Ok(url) => url.path().to_owned(),
        Err(_) => href.to_owned(),
    }
}

/// Map an href to a remote path.
///
/// The href is stripped of scheme and host, percent-decoded, and stripped of
/// the remote root's own path (`base_path`).
pub(crate) fn locate(href: &str, base_path: &str) -> DavLocation {
    let raw = href_path(href);
    let decoded = percent_decode_str(&raw).decode_utf8_lossy();
    let mut path: &str = &decoded;

    let base_decoded = percent_decode_str(base_path).decode_utf8_lossy();
    let base = base_decoded.trim_end_matches('/');
    if !base.is_empty() {
        if path == base {
            path = "/";
        } else if path.starts_with(base) && path.as_bytes().get(base.len()) == Some(&b'/') {
            path = &path[base.len()..];
        }
    }

    match HREF_PATTERN.captures(path) {
        Some(caps) => {
            let parent = caps.get(1).map_or("", |m| m.as_str());
            let name = caps.get(2).map_or("", |m| m.as_str());
            let trailing_slash = caps.get(3).is_some_and(|m| !m.as_str().is_empty());
            DavLocation {
                path: format!("{}/{}", parent, name),
                trailing_slash,
            }
        }
        None => DavLocation {
            path: "/".to_string(),
            trailing_slash: path.ends_with('/'),
        },
    }
}

/// Replace the predefined and numeric XML entities.
pub(crate) fn unescape(text: &str) -> Cow<'_, str> {
    if !text.contains('&') {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let after = &rest[start..];
        let Some(end) = after.find(';') else {
            out.push_str(after);
            return Cow::Owned(out);
        };

        let entity = &after[1..end];
        let replacement = match entity {
            "lt" => Some('<'),
            "gt" => Some('>'),
            "amp" => Some('&'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            _ => entity
                .strip_prefix("#x")
                .or_else(|| entity.strip_prefix("#X"))
                .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                .and_then(char::from_u32),
        };

        match replacement {
            Some(c) => out.push(c),
            None => out.push_str(&after[..=end]),
        }
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Cow::Owned(out)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tag {
    Response,
    Href,
    PropStat,
    Prop,
    Status,
    Property,
    Collection,
    Other,
}

struct Open {
    tag: Tag,
    /// Namespace bindings in scope before this element.
    mark: usize,
}

#[derive(Default)]
struct PropStat {
    properties: Vec<(String, String)>,
    collection: bool,
    status: Option<String>,
}

impl PropStat {
    fn is_ok(&self) -> bool {
        match &self.status {
            Some(status) => status.split_whitespace().nth(1) == Some("200"),
            None => true,
        }
    }
}

#[derive(Default)]
struct MultiStatusParser {
    responses: Vec<DavResponse>,
    bindings: Vec<(String, String)>,
    stack: Vec<Open>,
    response: Option<DavResponse>,
    propstat: Option<PropStat>,
    /// Key of the property being read and whether it has element content.
    property: Option<(String, bool)>,
    text: String,
}

impl MultiStatusParser {
    fn namespace(&self, prefix: &str) -> Option<&str> {
        self.bindings
            .iter()
            .rev()
            .find(|(p, _)| p == prefix)
            .map(|(_, uri)| uri.as_str())
    }

    fn parent(&self) -> Option<Tag> {
        self.stack.last().map(|open| open.tag)
    }

    fn open(&mut self, prefix: &str, local: &str, mark: usize) {
        let is_dav = self.namespace(prefix) == Some(DAV_NS);
        let parent = self.parent();

        let tag = match (is_dav, local, parent) {
            (true, "response", _) => {
                self.response = Some(DavResponse::default());
                Tag::Response
            }
            (true, "href", Some(Tag::Response)) => Tag::Href,
            (true, "propstat", Some(Tag::Response)) => {
                self.propstat = Some(PropStat::default());
                Tag::PropStat
            }
            (true, "prop", Some(Tag::PropStat)) => Tag::Prop,
            (true, "status", Some(Tag::PropStat)) => Tag::Status,
            (_, _, Some(Tag::Prop)) => {
                let key = if is_dav {
                    format!("dav:{}", local)
                } else if prefix.is_empty() {
                    local.to_string()
                } else {
                    format!("{}:{}", prefix, local)
                };
                self.property = Some((key, false));
                Tag::Property
            }
            (true, "collection", Some(Tag::Property)) => {
                if let Some(propstat) = self.propstat.as_mut() {
                    propstat.collection = true;
                }
                Tag::Collection
            }
            _ => Tag::Other,
        };

        if matches!(parent, Some(Tag::Property)) {
            if let Some((_, complex)) = self.property.as_mut() {
                *complex = true;
            }
        }
        if matches!(tag, Tag::Href | Tag::Status | Tag::Property) {
            self.text.clear();
        }
        self.stack.push(Open { tag, mark });
    }

    fn close(&mut self) {
        let Some(open) = self.stack.pop() else {
            return;
        };
        self.bindings.truncate(open.mark);

        match open.tag {
            Tag::Href => {
                if let Some(response) = self.response.as_mut() {
                    response.href = self.text.trim().to_string();
                }
            }
            Tag::Status => {
                if let Some(propstat) = self.propstat.as_mut() {
                    propstat.status = Some(self.text.trim().to_string());
                }
            }
            Tag::Property => {
                if let (Some((key, complex)), Some(propstat)) =
                    (self.property.take(), self.propstat.as_mut())
                {
                    if !complex {
                        propstat
                            .properties
                            .push((key, std::mem::take(&mut self.text)));
                    }
                }
            }
            Tag::PropStat => {
                if let (Some(propstat), Some(response)) =
                    (self.propstat.take(), self.response.as_mut())
                {
                    if propstat.is_ok() {
                        response.properties.extend(propstat.properties);
                        response.collection |= propstat.collection;
                    }
                }
            }
            Tag::Response => {
                if let Some(response) = self.response.take() {
                    if !response.href.is_empty() {
                        self.responses.push(response);
                    }
                }
            }
            Tag::Prop | Tag::Collection | Tag::Other => {}
        }
    }

    fn text(&mut self, text: &str) {
        if matches!(self.parent(), Some(Tag::Href | Tag::Status | Tag::Property)) {
            self.text.push_str(&unescape(text));
        }
    }

    fn cdata(&mut self, text: &str) {
        if matches!(self.parent(), Some(Tag::Href | Tag::Status | Tag::Property)) {
            self.text.push_str(text);
        }
    }
}

/// Parse a multistatus document.
pub(crate) fn parse_multistatus(body: &str) -> Result<Vec<DavResponse>, ParseError> {
    let mut parser = MultiStatusParser::default();
    let mut pending: Option<(String, String, usize)> = None;
    let mut saw_root = false;

    for token in Tokenizer::from(body) {
        match token? {
            Token::ElementStart { prefix, local, .. } => {
                saw_root = true;
                pending = Some((
                    prefix.as_str().to_string(),
                    local.as_str().to_string(),
                    parser.bindings.len(),
                ));
            }
            Token::Attribute { prefix, local, value, .. } => {
                let binding = match (prefix.as_str(), local.as_str()) {
                    ("xmlns", name) => Some(name.to_string()),
                    ("", "xmlns") => Some(String::new()),
                    _ => None,
                };
                if let Some(name) = binding {
                    parser
                        .bindings
                        .push((name, unescape(value.as_str()).into_owned()));
                }
            }
            Token::ElementEnd { end, .. } => match end {
                ElementEnd::Open => {
                    if let Some((prefix, local, mark)) = pending.take() {
                        parser.open(&prefix, &local, mark);
                    }
                }
                ElementEnd::Empty => {
                    if let Some((prefix, local, mark)) = pending.take() {
                        parser.open(&prefix, &local, mark);
                        parser.close();
                    }
                }
                ElementEnd::Close(..) => parser.close(),
            },
            Token::Text { text } => parser.text(text.as_str()),
            Token::Cdata { text, .. } => parser.cdata(text.as_str()),
            _ => {}
        }
    }

    if !saw_root {
        return Err(ParseError::Structure("empty multistatus document"));
    }
    Ok(parser.responses)
}
