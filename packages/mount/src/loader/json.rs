//! Ingestion of the depth-1 JSON rendering.
//!
//! The document is flattened into a token stream and fed through an explicit
//! state machine. Only one level of child objects is expanded; anything deeper
//! (objects inside children, objects or arrays inside arrays) is skipped.

use remount_core::{codec, PropertyMap, Value};
use serde_json::Value as Json;

use super::ParseError;

/// One token of a JSON document.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum JsonEvent<'a> {
    BeginObject,
    EndObject,
    BeginArray,
    EndArray,
    Name(&'a str),
    Scalar(&'a Json),
}

/// Flatten a parsed document into tokens, in document order.
pub(crate) fn events(document: &Json) -> Vec<JsonEvent<'_>> {
    let mut out = Vec::new();
    push_events(document, &mut out);
    out
}

fn push_events<'a>(value: &'a Json, out: &mut Vec<JsonEvent<'a>>) {
    match value {
        Json::Object(map) => {
            out.push(JsonEvent::BeginObject);
            for (name, member) in map {
                out.push(JsonEvent::Name(name));
                push_events(member, out);
            }
            out.push(JsonEvent::EndObject);
        }
        Json::Array(items) => {
            out.push(JsonEvent::BeginArray);
            for item in items {
                push_events(item, out);
            }
            out.push(JsonEvent::EndArray);
        }
        scalar => out.push(JsonEvent::Scalar(scalar)),
    }
}

/// A parsed resource: its properties and, for the top level, its children.
#[derive(Debug, Default, PartialEq)]
pub(crate) struct ParsedResource {
    pub properties: PropertyMap,
    /// Expanded children in document order.
    pub children: Vec<(String, ParsedResource)>,
    /// Whether the object held any nested object at all.
    pub nested: bool,
}

/// Parse a response body.
pub(crate) fn parse(body: &[u8]) -> Result<ParsedResource, ParseError> {
    let document: Json = serde_json::from_slice(body)?;
    let tokens = events(&document);
    let mut stream = tokens.into_iter();

    match stream.next() {
        Some(JsonEvent::BeginObject) => parse_object(&mut stream, true),
        _ => Err(ParseError::Structure("document is not an object")),
    }
}

/// Run the state machine over one object whose `BeginObject` was consumed.
fn parse_object<'a, I>(stream: &mut I, expand_children: bool) -> Result<ParsedResource, ParseError>
where
    I: Iterator<Item = JsonEvent<'a>>,
{
    let mut resource = ParsedResource::default();
    let mut pending: Option<&str> = None;
    let mut array: Option<(&str, Vec<Value>)> = None;
    let mut skip = 0usize;

    while let Some(event) = stream.next() {
        if skip > 0 {
            match event {
                JsonEvent::BeginObject | JsonEvent::BeginArray => skip += 1,
                JsonEvent::EndObject | JsonEvent::EndArray => skip -= 1,
                JsonEvent::Name(_) | JsonEvent::Scalar(_) => {}
            }
            continue;
        }

        match event {
            JsonEvent::Name(name) => pending = Some(name),
            JsonEvent::Scalar(scalar) => match array.as_mut() {
                Some((_, items)) => {
                    if let Some(value) = ingest(scalar) {
                        items.push(value);
                    }
                }
                None => {
                    let name = pending
                        .take()
                        .ok_or(ParseError::Structure("value without a name"))?;
                    if let Some(value) = ingest(scalar) {
                        resource.properties.insert(name.to_string(), value);
                    }
                }
            },
            JsonEvent::BeginArray => {
                if array.is_some() {
                    skip = 1;
                } else {
                    let name = pending
                        .take()
                        .ok_or(ParseError::Structure("array without a name"))?;
                    array = Some((name, Vec::new()));
                }
            }
            JsonEvent::EndArray => {
                let (name, items) = array
                    .take()
                    .ok_or(ParseError::Structure("unbalanced array end"))?;
                resource
                    .properties
                    .insert(name.to_string(), Value::Array(items));
            }
            JsonEvent::BeginObject => {
                if array.is_some() {
                    skip = 1;
                    continue;
                }
                let name = pending
                    .take()
                    .ok_or(ParseError::Structure("object without a name"))?;
                resource.nested = true;
                if expand_children {
                    let child = parse_object(stream, false)?;
                    resource.children.push((name.to_string(), child));
                } else {
                    skip = 1;
                }
            }
            JsonEvent::EndObject => {
                if array.is_some() {
                    return Err(ParseError::Structure("unterminated array"));
                }
                return Ok(resource);
            }
        }
    }

    Err(ParseError::Structure("unexpected end of document"))
}

/// Convert a JSON scalar. Nulls carry no value.
fn ingest(scalar: &Json) -> Option<Value> {
    match scalar {
        Json::Null => None,
        Json::Bool(b) => Some(Value::Boolean(*b)),
        Json::Number(n) => match n.as_i64() {
            Some(long) => Some(Value::Long(long)),
            None => n.as_f64().map(Value::Double),
        },
        Json::String(s) => Some(codec::decode_string(s)),
        Json::Array(_) | Json::Object(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_str(s: &str) -> Result<ParsedResource, ParseError> {
        parse(s.as_bytes())
    }

    #[test]
    fn top_level_with_one_child() {
        let parsed = parse_str(
            r#"{"jcr:primaryType":"nt:unstructured","b":{"jcr:primaryType":"nt:unstructured"}}"#,
        )
        .unwrap();

        assert_eq!(
            parsed.properties.get("jcr:primaryType"),
            Some(&Value::from("nt:unstructured"))
        );
        assert_eq!(parsed.children.len(), 1);
        let (name, child) = &parsed.children[0];
        assert_eq!(name, "b");
        assert!(!child.nested);
        assert!(child.children.is_empty());
    }

    #[test]
    fn scalars_are_typed() {
        let parsed = parse_str(
            r#"{"count":42,"ratio":0.5,"big":18446744073709551615,"flag":true,
                "typed":"{Long}7","word":"off","gone":null}"#,
        )
        .unwrap();
        let p = &parsed.properties;
        assert_eq!(p.get("count"), Some(&Value::Long(42)));
        assert_eq!(p.get("ratio"), Some(&Value::Double(0.5)));
        assert!(matches!(p.get("big"), Some(Value::Double(_))));
        assert_eq!(p.get("flag"), Some(&Value::Boolean(true)));
        assert_eq!(p.get("typed"), Some(&Value::Long(7)));
        assert_eq!(p.get("word"), Some(&Value::Boolean(false)));
        assert!(!p.contains_key("gone"));
        assert!(!parsed.nested);
    }

    #[test]
    fn arrays_keep_order() {
        let parsed = parse_str(r#"{"tags":["b","a","c"],"empty":[]}"#).unwrap();
        assert_eq!(
            parsed.properties.get("tags"),
            Some(&Value::Array(vec!["b".into(), "a".into(), "c".into()]))
        );
        assert_eq!(parsed.properties.get("empty"), Some(&Value::Array(vec![])));
    }

    #[test]
    fn structures_inside_arrays_are_skipped() {
        let parsed =
            parse_str(r#"{"mixed":["x",{"deep":{"deeper":1}},["nested"],"y"],"after":1}"#).unwrap();
        assert_eq!(
            parsed.properties.get("mixed"),
            Some(&Value::Array(vec!["x".into(), "y".into()]))
        );
        assert_eq!(parsed.properties.get("after"), Some(&Value::Long(1)));
        assert!(parsed.children.is_empty());
    }

    #[test]
    fn grandchildren_are_not_expanded() {
        let parsed = parse_str(
            r#"{"child":{"title":"c","grand":{"title":"g","x":{"y":1}},"tail":"t"},"z":1}"#,
        )
        .unwrap();
        let (_, child) = &parsed.children[0];
        assert!(child.nested);
        assert!(child.children.is_empty());
        assert_eq!(child.properties.get("title"), Some(&Value::from("c")));
        assert_eq!(child.properties.get("tail"), Some(&Value::from("t")));
        assert!(!child.properties.contains_key("grand"));
        assert_eq!(parsed.properties.get("z"), Some(&Value::Long(1)));
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(matches!(parse_str("{not json"), Err(ParseError::Json(_))));
        assert!(matches!(parse_str("[1,2]"), Err(ParseError::Structure(_))));
        assert!(matches!(parse_str("\"text\""), Err(ParseError::Structure(_))));
    }

    #[test]
    fn unnamed_tokens_are_protocol_violations() {
        let stream = vec![JsonEvent::Scalar(&Json::Bool(true)), JsonEvent::EndObject];
        let result = parse_object(&mut stream.into_iter(), true);
        assert!(matches!(result, Err(ParseError::Structure(_))));

        let stream = vec![JsonEvent::BeginObject, JsonEvent::EndObject, JsonEvent::EndObject];
        let result = parse_object(&mut stream.into_iter(), true);
        assert!(matches!(result, Err(ParseError::Structure(_))));

        let stream = vec![JsonEvent::EndArray];
        let result = parse_object(&mut stream.into_iter(), true);
        assert!(matches!(result, Err(ParseError::Structure(_))));
    }

    #[test]
    fn truncated_stream_is_an_error() {
        let stream = vec![JsonEvent::Name("a")];
        let result = parse_object(&mut stream.into_iter(), true);
        assert!(matches!(result, Err(ParseError::Structure(_))));
    }

    #[test]
    fn events_follow_document_order() {
        let doc: Json = serde_json::from_str(r#"{"a":[1],"b":{}}"#).unwrap();
        let tokens = events(&doc);
        assert_eq!(tokens.len(), 9);
        assert_eq!(tokens[1], JsonEvent::Name("a"));
        assert_eq!(tokens[2], JsonEvent::BeginArray);
        assert_eq!(tokens[5], JsonEvent::Name("b"));
        assert_eq!(tokens[6], JsonEvent::BeginObject);
    }
}
