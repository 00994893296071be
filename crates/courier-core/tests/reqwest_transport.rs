//! Reqwest transport integration tests
//!
//! Drives `create_request` against a local wiremock server.

use courier_core::http::error::{
    TransportErrorCode, NETWORK_ERROR_CODE, REQUEST_TIMEOUT_CODE, REQUEST_TIMEOUT_MSG,
};
use courier_core::testing::StaticProbe;
use courier_core::{
    create_request, ClientOptions, Code, ErrorKind, FilePart, FormFields, RequestDescriptor,
    RequestOptions, RequestPipeline, Transport,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::{
    matchers::{body_string, header, method, path},
    Mock, MockServer, ResponseTemplate,
};

fn api(base_url: &str, options: RequestOptions) -> RequestPipeline {
    let client = ClientOptions::new()
        .base_url(base_url)
        .header("X-App", "courier");
    create_request(client, options.probe(Arc::new(StaticProbe::new(true)))).unwrap()
}

#[tokio::test]
async fn test_resolves_backend_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/1"))
        .and(header("x-app", "courier"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 200,
            "data": {"id": 1, "name": "ada"},
            "message": "ok"
        })))
        .mount(&server)
        .await;

    let api = api(&server.uri(), RequestOptions::new());
    let response = api.get("/users/1").await.unwrap();

    assert_eq!(response.status.as_u16(), 200);
    assert_eq!(api.config().extract_data(&response.body), Some(&json!({"id": 1, "name": "ada"})));
    assert_eq!(response.request.url, format!("{}/users/1", server.uri()));
}

#[tokio::test]
async fn test_not_found_is_http_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such thing"))
        .mount(&server)
        .await;

    let err = api(&server.uri(), RequestOptions::new())
        .get("/missing")
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Http);
    assert_eq!(err.code(), &Code::Number(404));
    assert_eq!(err.msg(), "Not Found");
    assert_eq!(err.response().map(|r| r.body.clone()), Some(json!("no such thing")));
}

#[tokio::test]
async fn test_backend_failure_from_server_payload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/orders"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "E_STOCK",
            "msg": "out of stock"
        })))
        .mount(&server)
        .await;

    let options = RequestOptions::new()
        .code_key("status")
        .msg_key("msg")
        .success_code("OK");
    let err = api(&server.uri(), options)
        .post("/orders", json!({"sku": "X1"}))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Backend);
    assert_eq!(err.code(), &Code::from("E_STOCK"));
    assert_eq!(err.msg(), "out of stock");
}

#[tokio::test]
async fn test_urlencoded_body_on_the_wire() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/login"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string("a=1&b=x"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"code": 200})))
        .expect(1)
        .mount(&server)
        .await;

    let descriptor = RequestDescriptor::post("/login")
        .content_type("application/x-www-form-urlencoded")
        .json(json!({"a": 1, "b": "x"}));
    api(&server.uri(), RequestOptions::new())
        .request(&descriptor)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_multipart_body_on_the_wire() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"code": 200})))
        .mount(&server)
        .await;

    let descriptor = RequestDescriptor::post("/upload")
        .content_type("multipart/form-data")
        .form(
            FormFields::new().field("title", "pics").files(
                "file",
                vec![
                    FilePart::from_bytes("f1.txt", b"first".to_vec()),
                    FilePart::from_bytes("f2.txt", b"second".to_vec()),
                ],
            ),
        );
    api(&server.uri(), RequestOptions::new())
        .request(&descriptor)
        .await
        .unwrap();

    let received = server.received_requests().await.unwrap();
    assert_eq!(received.len(), 1);

    let content_type = received[0]
        .headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("multipart/form-data; boundary="));

    let body = String::from_utf8_lossy(&received[0].body).into_owned();
    let first = body.find("filename=\"f1.txt\"").unwrap();
    let second = body.find("filename=\"f2.txt\"").unwrap();
    assert!(first < second);
    assert!(body.contains("name=\"title\""));
}

#[tokio::test]
async fn test_slow_server_is_request_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"code": 200}))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let descriptor = RequestDescriptor::get("/slow").timeout(Duration::from_millis(100));
    let err = api(&server.uri(), RequestOptions::new())
        .request(&descriptor)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Transport);
    assert_eq!(err.raw_error.code, TransportErrorCode::TimedOut);
    assert_eq!(err.code(), &Code::from(REQUEST_TIMEOUT_CODE));
    assert_eq!(err.msg(), REQUEST_TIMEOUT_MSG);
}

#[tokio::test]
async fn test_refused_connection_is_network_error() {
    // Nothing listens on port 1
    let err = api("http://127.0.0.1:1", RequestOptions::new())
        .get("/anything")
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Transport);
    assert_eq!(err.raw_error.code, TransportErrorCode::Network);
    assert_eq!(err.code(), &Code::from(NETWORK_ERROR_CODE));
}

#[tokio::test]
async fn test_transport_returns_failures_as_responses() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/locked"))
        .respond_with(ResponseTemplate::new(423))
        .mount(&server)
        .await;

    let api = api(&server.uri(), RequestOptions::new());
    let response = api
        .transport()
        .send(RequestDescriptor::delete("/locked"))
        .await
        .unwrap();

    assert_eq!(response.status.as_u16(), 423);
    assert_eq!(response.body, serde_json::Value::Null);
}
