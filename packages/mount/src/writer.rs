//! Turning pending changes into write requests.
//!
//! Every record becomes one POST against the remote in the style of the
//! Sling POST servlet: `:operation`, `:dest` and `:order` control fields,
//! `name@TypeHint` and `name@Delete` suffix fields, and multipart file parts
//! for binaries. Records are applied in order; a failing record is reported
//! and the next one is tried.

use std::fmt;

use remount_core::{codec, Binary, ResourcePath, Value};
use remount_http::{FilePart, RequestBody};
use tracing::{debug, info, warn};

use crate::changeset::{ChangeRecord, Operation};
use crate::mount::MountContext;
use crate::node::{RemoteNode, NT_FILE};
use crate::Error;

pub const OPERATION_FIELD: &str = ":operation";
pub const DEST_FIELD: &str = ":dest";
pub const ORDER_FIELD: &str = ":order";
pub const TYPE_HINT_SUFFIX: &str = "@TypeHint";
pub const DELETE_SUFFIX: &str = "@Delete";

const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Result of applying one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    /// Nothing differed from the remote state; no request was sent.
    NoChanges,
    Failed(String),
}

/// Outcome of one record of a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitEntry {
    pub path: ResourcePath,
    pub operation: Operation,
    pub outcome: Outcome,
}

/// A record the remote did not accept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordFailure {
    pub path: ResourcePath,
    pub operation: Operation,
    pub reason: String,
}

impl fmt::Display for RecordFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.operation, self.path, self.reason)
    }
}

/// Per-record outcomes of a commit, in commit order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitReport {
    pub entries: Vec<CommitEntry>,
}

impl CommitReport {
    pub fn is_success(&self) -> bool {
        self.entries
            .iter()
            .all(|e| !matches!(e.outcome, Outcome::Failed(_)))
    }

    pub fn applied(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.outcome == Outcome::Applied)
            .count()
    }

    pub fn failures(&self) -> Vec<RecordFailure> {
        self.entries
            .iter()
            .filter_map(|e| match &e.outcome {
                Outcome::Failed(reason) => Some(RecordFailure {
                    path: e.path.clone(),
                    operation: e.operation,
                    reason: reason.clone(),
                }),
                _ => None,
            })
            .collect()
    }
}

/// A POST to send: remote target path and body.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteRequest {
    pub target: String,
    pub body: RequestBody,
}

/// Applies change records through the mount's transport.
pub struct Writer<'a> {
    context: &'a MountContext,
}

impl<'a> Writer<'a> {
    pub fn new(context: &'a MountContext) -> Self {
        Self { context }
    }

    /// Apply records in order, continuing past failures.
    pub fn commit<'r, I>(&self, records: I) -> CommitReport
    where
        I: IntoIterator<Item = &'r ChangeRecord>,
    {
        let mut report = CommitReport::default();
        for record in records {
            let outcome = self.apply(record);
            match &outcome {
                Outcome::Applied => {
                    info!(path = %record.path(), operation = %record.operation(), "Applied change");
                }
                Outcome::NoChanges => {
                    debug!(
                        path = %record.path(),
                        operation = %record.operation(),
                        "No changes made"
                    );
                }
                Outcome::Failed(reason) => {
                    warn!(
                        path = %record.path(),
                        operation = %record.operation(),
                        reason = %reason,
                        "Change failed"
                    );
                }
            }
            report.entries.push(CommitEntry {
                path: record.path().clone(),
                operation: record.operation(),
                outcome,
            });
        }
        report
    }

    /// Send the requests of one record.
    pub fn apply(&self, record: &ChangeRecord) -> Outcome {
        let requests = match self.requests(record) {
            Ok(requests) => requests,
            Err(e) => return Outcome::Failed(e.to_string()),
        };
        if requests.is_empty() {
            return Outcome::NoChanges;
        }

        for request in requests {
            match self.context.transport().post(&request.target, request.body) {
                Ok(response) if response.is_success() => {}
                Ok(response) => {
                    return Outcome::Failed(format!(
                        "HTTP {} {}",
                        response.status, response.status_text
                    ))
                }
                Err(e) => return Outcome::Failed(e.to_string()),
            }
        }
        Outcome::Applied
    }

    /// Requests for one record. Empty when the record changes nothing.
    ///
    /// Copies, moves and uploads whose node was edited afterwards get a
    /// second request carrying the property changes.
    pub fn requests(&self, record: &ChangeRecord) -> Result<Vec<WriteRequest>, Error> {
        let mut requests = Vec::new();

        match record {
            ChangeRecord::Delete { node } => {
                requests.push(WriteRequest {
                    target: self.remote(node.path()),
                    body: RequestBody::Form(vec![field(OPERATION_FIELD, "delete")]),
                });
                return Ok(requests);
            }
            ChangeRecord::Modify { .. } | ChangeRecord::Create { .. } => {}
            ChangeRecord::Copy { node, source } => {
                requests.push(WriteRequest {
                    target: self.remote(source),
                    body: RequestBody::Form(vec![
                        field(OPERATION_FIELD, "copy"),
                        field(DEST_FIELD, &self.remote(node.path())),
                    ]),
                });
            }
            ChangeRecord::Move {
                node,
                source,
                order,
            } => {
                if source == node.path() {
                    if let Some(order) = order {
                        requests.push(WriteRequest {
                            target: self.remote(source),
                            body: RequestBody::Form(vec![field(ORDER_FIELD, &order.to_string())]),
                        });
                    }
                } else {
                    let mut fields = vec![
                        field(OPERATION_FIELD, "move"),
                        field(DEST_FIELD, &self.remote(node.path())),
                    ];
                    if let Some(order) = order {
                        fields.push(field(ORDER_FIELD, &order.to_string()));
                    }
                    requests.push(WriteRequest {
                        target: self.remote(source),
                        body: RequestBody::Form(fields),
                    });
                }
            }
            ChangeRecord::Upload {
                node,
                content,
                charset,
            } => {
                let parent = node.path().parent().ok_or_else(|| Error::InvalidOperation {
                    message: "cannot upload to the repository root".to_string(),
                })?;
                let name = node.name();
                requests.push(WriteRequest {
                    target: self.remote(&parent),
                    body: RequestBody::Multipart {
                        fields: vec![field(&format!("{}{}", name, TYPE_HINT_SUFFIX), NT_FILE)],
                        files: vec![FilePart {
                            name: name.to_string(),
                            filename: content.filename.clone().unwrap_or_else(|| name.to_string()),
                            content_type: content
                                .mime_type
                                .clone()
                                .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string()),
                            charset: charset.clone(),
                            data: content.data.clone(),
                        }],
                    },
                });
            }
        }

        if let Some(body) = self.property_changes(record.node())? {
            requests.push(WriteRequest {
                target: self.remote(record.path()),
                body,
            });
        }
        Ok(requests)
    }

    /// Fields for every property that differs from the last remote state.
    fn property_changes(&self, node: &RemoteNode) -> Result<Option<RequestBody>, Error> {
        let Some(overlay) = node.pending() else {
            return Ok(None);
        };
        let origin = node.origin_properties();

        let mut fields = Vec::new();
        let mut files = Vec::new();
        for (name, value) in overlay {
            if name.starts_with(':') || origin.get(name) == Some(value) {
                continue;
            }
            match value {
                Value::Binary(binary) => {
                    if let Some(part) = self.file_part(name, binary)? {
                        files.push(part);
                    }
                }
                // An empty multi-value has no fields to carry its hint.
                Value::Array(items) if items.is_empty() => {
                    fields.push((format!("{}{}", name, DELETE_SUFFIX), String::new()));
                }
                _ => {
                    let wire = codec::encode_field(value)?;
                    for literal in wire.values {
                        fields.push((name.clone(), literal));
                    }
                    if let Some(hint) = wire.type_hint {
                        fields.push((format!("{}{}", name, TYPE_HINT_SUFFIX), hint));
                    }
                }
            }
        }

        for name in origin.keys() {
            if !name.starts_with(':') && !overlay.contains_key(name) {
                fields.push((format!("{}{}", name, DELETE_SUFFIX), String::new()));
            }
        }

        Ok(match (fields.is_empty(), files.is_empty()) {
            (true, true) => None,
            (_, true) => Some(RequestBody::Form(fields)),
            _ => Some(RequestBody::Multipart { fields, files }),
        })
    }

    /// A binary value as a file part. Content read from this very mount is
    /// already on the remote and is skipped.
    fn file_part(&self, name: &str, binary: &Binary) -> Result<Option<FilePart>, Error> {
        match binary {
            Binary::Inline(inline) => Ok(Some(FilePart {
                name: name.to_string(),
                filename: inline.filename.clone().unwrap_or_else(|| name.to_string()),
                content_type: inline
                    .mime_type
                    .clone()
                    .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string()),
                charset: None,
                data: inline.data.clone(),
            })),
            Binary::Remote(remote) if remote.origin == self.context.origin() => Ok(None),
            Binary::Remote(remote) => {
                debug!(url = %remote.url, "Fetching binary from another mount");
                let response = self.context.transport().get_url(&remote.url)?;
                if !response.is_success() {
                    return Err(remount_http::Error::transport(format!(
                        "GET {} returned {}",
                        remote.url, response.status
                    ))
                    .into());
                }
                let content_type = response
                    .header("content-type")
                    .unwrap_or(DEFAULT_MIME_TYPE)
                    .to_string();
                Ok(Some(FilePart {
                    name: name.to_string(),
                    filename: name.to_string(),
                    content_type,
                    charset: None,
                    data: response.body,
                }))
            }
        }
    }

    fn remote(&self, path: &ResourcePath) -> String {
        self.context.translator().to_remote(path).as_str().to_string()
    }
}

fn field(name: &str, value: &str) -> (String, String) {
    (name.to_string(), value.to_string())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use bytes::Bytes;
    use chrono::DateTime;
    use remount_core::{rpath, InlineBinary, PropertyMap, RemoteBinary};
    use remount_http::executor::mock::MockExecutor;
    use remount_http::Method;

    use super::*;
    use crate::changeset::OrderHint;
    use crate::config::MountConfig;
    use crate::node::ResourceKind;

    fn context(mock: &MockExecutor) -> MountContext {
        MountContext::new(
            MountConfig::new("http://remote:4502", "/mnt/remote"),
            Arc::new(mock.clone()),
        )
        .unwrap()
    }

    fn loaded(path: &str, pairs: &[(&str, Value)]) -> RemoteNode {
        let properties: PropertyMap = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        RemoteNode::new(rpath!(path), ResourceKind::Unknown, properties)
    }

    fn single(requests: Vec<WriteRequest>) -> WriteRequest {
        assert_eq!(requests.len(), 1, "{:?}", requests);
        requests.into_iter().next().unwrap()
    }

    #[test]
    fn delete_sends_operation_only() {
        let mock = MockExecutor::new();
        let ctx = context(&mock);
        let record = ChangeRecord::Delete {
            node: loaded("/mnt/remote/a", &[]),
        };

        let request = single(Writer::new(&ctx).requests(&record).unwrap());
        assert_eq!(request.target, "/a");
        assert_eq!(
            request.body,
            RequestBody::Form(vec![(":operation".to_string(), "delete".to_string())])
        );
    }

    #[test]
    fn modify_sends_diff_with_type_hints() {
        let mock = MockExecutor::new();
        let ctx = context(&mock);
        let mut node = loaded(
            "/mnt/remote/a",
            &[
                ("jcr:primaryType", "nt:unstructured".into()),
                ("title", "old".into()),
                ("gone", "x".into()),
                (":jcr:data", 4i64.into()),
            ],
        );
        let date = DateTime::parse_from_rfc3339("2024-03-01T10:00:00+01:00").unwrap();
        {
            let props = node.edit();
            props.insert("title".to_string(), "new".into());
            props.insert("count".to_string(), 3i64.into());
            props.insert("flag".to_string(), true.into());
            props.insert("when".to_string(), date.into());
            props.insert("tags".to_string(), Value::Array(vec!["x".into()]));
            props.shift_remove("gone");
        }
        let record = ChangeRecord::Modify { node };

        let request = single(Writer::new(&ctx).requests(&record).unwrap());
        assert_eq!(request.target, "/a");
        let body = &request.body;
        assert!(!body.is_multipart());
        assert_eq!(body.field("title"), Some("new"));
        assert_eq!(body.field("title@TypeHint"), None);
        assert_eq!(body.field("count"), Some("3"));
        assert_eq!(body.field("count@TypeHint"), Some("Long"));
        assert_eq!(body.field("flag@TypeHint"), Some("Boolean"));
        assert_eq!(body.field("when"), Some("2024-03-01T10:00:00.000+01:00"));
        assert_eq!(body.field("when@TypeHint"), Some("Date"));
        assert_eq!(body.field_values("tags"), vec!["x"]);
        assert_eq!(body.field("tags@TypeHint"), Some("String[]"));
        assert_eq!(body.field("gone@Delete"), Some(""));
        assert_eq!(body.field("jcr:primaryType"), None);
        assert!(body.fields().iter().all(|(k, _)| !k.starts_with(':')));
    }

    #[test]
    fn emptied_array_is_deleted() {
        let mock = MockExecutor::new();
        let ctx = context(&mock);
        let mut node = loaded(
            "/mnt/remote/a",
            &[("tags", Value::Array(vec!["x".into(), "y".into()]))],
        );
        node.edit().insert("tags".to_string(), Value::Array(Vec::new()));
        let record = ChangeRecord::Modify { node };

        let request = single(Writer::new(&ctx).requests(&record).unwrap());
        assert_eq!(
            request.body,
            RequestBody::Form(vec![("tags@Delete".to_string(), String::new())])
        );
    }

    #[test]
    fn unchanged_record_is_a_no_op() {
        let mock = MockExecutor::new();
        let ctx = context(&mock);
        let mut node = loaded("/mnt/remote/a", &[("title", "same".into())]);
        node.edit().insert("title".to_string(), "same".into());
        let record = ChangeRecord::Modify { node };

        let writer = Writer::new(&ctx);
        assert!(writer.requests(&record).unwrap().is_empty());
        assert_eq!(writer.apply(&record), Outcome::NoChanges);
        assert_eq!(mock.request_count(), 0);
    }

    #[test]
    fn binaries_become_file_parts() {
        let mock = MockExecutor::new();
        let ctx = context(&mock);
        let mut node = loaded("/mnt/remote/a", &[]);
        let mut inline = InlineBinary::new(Bytes::from_static(b"png"));
        inline.mime_type = Some("image/png".to_string());
        node.edit().insert("image".to_string(), Value::Binary(Binary::Inline(inline)));
        node.edit().insert(
            "echo".to_string(),
            Value::Binary(Binary::Remote(RemoteBinary {
                url: "http://remote:4502/a/echo".to_string(),
                length: Some(3),
                origin: ctx.origin().to_string(),
            })),
        );
        let record = ChangeRecord::Modify { node };

        let request = single(Writer::new(&ctx).requests(&record).unwrap());
        let files = request.body.files();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name, "image");
        assert_eq!(files[0].filename, "image");
        assert_eq!(files[0].content_type, "image/png");
        assert!(request.body.is_multipart());
    }

    #[test]
    fn foreign_binaries_are_fetched() {
        let mock = MockExecutor::new().with_response(
            Method::GET,
            "http://other:4502/doc/jcr:data",
            MockExecutor::ok("remote bytes").with_header("Content-Type", "application/pdf"),
        );
        let ctx = context(&mock);
        let mut node = loaded("/mnt/remote/a", &[]);
        node.edit().insert(
            "doc".to_string(),
            Value::Binary(Binary::Remote(RemoteBinary {
                url: "http://other:4502/doc/jcr:data".to_string(),
                length: None,
                origin: "http://other:4502#/mnt/other".to_string(),
            })),
        );

        let request = single(Writer::new(&ctx).requests(&ChangeRecord::Modify { node }).unwrap());
        let files = request.body.files();
        assert_eq!(files[0].content_type, "application/pdf");
        assert_eq!(files[0].data, Bytes::from_static(b"remote bytes"));
    }

    #[test]
    fn mixed_arrays_fail_the_record() {
        let mock = MockExecutor::new();
        let ctx = context(&mock);
        let mut node = loaded("/mnt/remote/a", &[]);
        node.edit().insert(
            "bad".to_string(),
            Value::Array(vec![Value::Long(1), Value::from("x")]),
        );

        let outcome = Writer::new(&ctx).apply(&ChangeRecord::Modify { node });
        assert!(matches!(outcome, Outcome::Failed(_)));
        assert_eq!(mock.request_count(), 0);
    }

    #[test]
    fn copy_and_move_target_the_source() {
        let mock = MockExecutor::new();
        let ctx = context(&mock);
        let writer = Writer::new(&ctx);

        let copy = ChangeRecord::Copy {
            node: loaded("/mnt/remote/dst/a", &[]),
            source: rpath!("/mnt/remote/src/a"),
        };
        let request = single(writer.requests(&copy).unwrap());
        assert_eq!(request.target, "/src/a");
        assert_eq!(request.body.field(":operation"), Some("copy"));
        assert_eq!(request.body.field(":dest"), Some("/dst/a"));

        let mv = ChangeRecord::Move {
            node: loaded("/mnt/remote/dst/a", &[]),
            source: rpath!("/mnt/remote/src/a"),
            order: Some(OrderHint::Before("b".to_string())),
        };
        let request = single(writer.requests(&mv).unwrap());
        assert_eq!(request.body.field(":operation"), Some("move"));
        assert_eq!(request.body.field(":dest"), Some("/dst/a"));
        assert_eq!(request.body.field(":order"), Some("before b"));
    }

    #[test]
    fn reorder_sends_order_only() {
        let mock = MockExecutor::new();
        let ctx = context(&mock);
        let record = ChangeRecord::Move {
            node: loaded("/mnt/remote/p/a", &[]),
            source: rpath!("/mnt/remote/p/a"),
            order: Some(OrderHint::First),
        };

        let request = single(Writer::new(&ctx).requests(&record).unwrap());
        assert_eq!(request.target, "/p/a");
        assert_eq!(
            request.body,
            RequestBody::Form(vec![(":order".to_string(), "first".to_string())])
        );
    }

    #[test]
    fn edited_copy_gets_a_second_request() {
        let mock = MockExecutor::new();
        let ctx = context(&mock);
        let mut node = loaded("/mnt/remote/dst/a", &[("title", "t".into())]);
        node.edit().insert("title".to_string(), "copied".into());
        let record = ChangeRecord::Copy {
            node,
            source: rpath!("/mnt/remote/src/a"),
        };

        let requests = Writer::new(&ctx).requests(&record).unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].target, "/dst/a");
        assert_eq!(requests[1].body.field("title"), Some("copied"));
    }

    #[test]
    fn upload_posts_to_parent() {
        let mock = MockExecutor::new();
        let ctx = context(&mock);
        let mut properties = PropertyMap::new();
        properties.insert("jcr:primaryType".to_string(), NT_FILE.into());
        let record = ChangeRecord::Upload {
            node: RemoteNode::new(rpath!("/mnt/remote/docs/a.txt"), ResourceKind::File, properties),
            content: InlineBinary {
                data: Bytes::from_static(b"hello"),
                filename: None,
                mime_type: Some("text/plain".to_string()),
            },
            charset: Some("utf-8".to_string()),
        };

        let request = single(Writer::new(&ctx).requests(&record).unwrap());
        assert_eq!(request.target, "/docs");
        assert_eq!(request.body.field("a.txt@TypeHint"), Some("nt:file"));
        let file = &request.body.files()[0];
        assert_eq!(file.name, "a.txt");
        assert_eq!(file.filename, "a.txt");
        assert_eq!(file.full_content_type(), "text/plain; charset=utf-8");
    }

    #[test]
    fn commit_continues_past_failures() {
        let mock = MockExecutor::new()
            .with_response(Method::POST, "http://remote:4502/a", MockExecutor::status(500))
            .with_response(Method::POST, "http://remote:4502/b", MockExecutor::status(200));
        let ctx = context(&mock);
        let records = vec![
            ChangeRecord::Delete {
                node: loaded("/mnt/remote/a", &[]),
            },
            ChangeRecord::Delete {
                node: loaded("/mnt/remote/b", &[]),
            },
            ChangeRecord::Modify {
                node: loaded("/mnt/remote/c", &[]),
            },
        ];

        let report = Writer::new(&ctx).commit(&records);

        assert_eq!(report.entries.len(), 3);
        assert!(matches!(report.entries[0].outcome, Outcome::Failed(_)));
        assert_eq!(report.entries[1].outcome, Outcome::Applied);
        assert_eq!(report.entries[2].outcome, Outcome::NoChanges);
        assert_eq!(report.applied(), 1);
        assert!(!report.is_success());

        let failures = report.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].path, rpath!("/mnt/remote/a"));
        assert_eq!(failures[0].to_string(), "delete /mnt/remote/a: HTTP 500 Internal Server Error");
        assert_eq!(mock.request_count(), 2);
    }
}
