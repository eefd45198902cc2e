use std::sync::Arc;

use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use remount_http::{
    Credentials, FilePart, HttpRequest, RequestBody, ReqwestExecutor, Transport,
};

fn transport(uri: &str) -> Transport {
    let executor = Arc::new(ReqwestExecutor::with_default_timeout().unwrap());
    Transport::new(executor, uri).unwrap()
}

#[tokio::test]
async fn test_get_json_rendering() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/content/a/.1.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "jcr:primaryType": "nt:unstructured"
        })))
        .mount(&server)
        .await;

    let uri = server.uri();

    let response = tokio::task::spawn_blocking(move || {
        transport(&uri).get_json("/content/a").unwrap()
    })
    .await
    .unwrap();

    assert_eq!(response.status, 200);
    assert!(response.text().contains("nt:unstructured"));
}

#[tokio::test]
async fn test_propfind_sends_depth_and_allprop() {
    let server = MockServer::start().await;

    Mock::given(method("PROPFIND"))
        .and(path("/content"))
        .and(header("Depth", "1"))
        .and(body_string_contains("allprop"))
        .respond_with(
            ResponseTemplate::new(207).set_body_string(r#"<D:multistatus xmlns:D="DAV:"/>"#),
        )
        .mount(&server)
        .await;

    let uri = server.uri();

    let response = tokio::task::spawn_blocking(move || {
        transport(&uri).propfind("/content").unwrap()
    })
    .await
    .unwrap();

    assert!(response.is_multi_status());
}

#[tokio::test]
async fn test_form_post_with_preemptive_auth() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/content/a"))
        .and(header("Authorization", "Basic YWRtaW46YWRtaW4="))
        .and(header("Content-Type", "application/x-www-form-urlencoded"))
        .and(body_string_contains("title=Hello"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let uri = server.uri();

    let response = tokio::task::spawn_blocking(move || {
        transport(&uri)
            .with_credentials(Credentials::new("admin", "admin"), true)
            .post(
                "/content/a",
                RequestBody::Form(vec![("title".to_string(), "Hello".to_string())]),
            )
            .unwrap()
    })
    .await
    .unwrap();

    assert!(response.is_success());
}

#[tokio::test]
async fn test_multipart_post_carries_file_part() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/content/files"))
        .and(body_string_contains("filename=\"notes.txt\""))
        .and(body_string_contains("remote content"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;

    let uri = server.uri();

    let response = tokio::task::spawn_blocking(move || {
        let body = RequestBody::Multipart {
            fields: vec![("notes.txt@TypeHint".to_string(), "nt:file".to_string())],
            files: vec![FilePart {
                name: "notes.txt".to_string(),
                filename: "notes.txt".to_string(),
                content_type: "text/plain".to_string(),
                charset: Some("utf-8".to_string()),
                data: bytes::Bytes::from_static(b"remote content"),
            }],
        };
        transport(&uri).post("/content/files", body).unwrap()
    })
    .await
    .unwrap();

    assert_eq!(response.status, 201);
}

#[tokio::test]
async fn test_extra_headers_are_sent() {
    let server = MockServer::start().await;

    Mock::given(method("HEAD"))
        .and(path("/content"))
        .and(header("X-Env", "stage"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let uri = server.uri();

    let exists = tokio::task::spawn_blocking(move || {
        transport(&uri)
            .with_extra_headers(&["X-Env=stage"])
            .exists("/content")
            .unwrap()
    })
    .await
    .unwrap();

    assert!(exists);
}

#[tokio::test]
async fn test_missing_resource_is_not_an_error() {
    let server = MockServer::start().await;
    let uri = server.uri();

    let (exists, response) = tokio::task::spawn_blocking(move || {
        let t = transport(&uri);
        let exists = t.exists("/nothing").unwrap();
        let response = t.execute(HttpRequest::get(t.url_for("/nothing"))).unwrap();
        (exists, response)
    })
    .await
    .unwrap();

    assert!(!exists);
    assert_eq!(response.status, 404);
    assert!(response.is_client_error());
}
