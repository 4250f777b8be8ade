//! reqwest transport against a local wiremock server.

use std::time::{Duration, Instant};

use serde_json::json;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_json, body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use clarity_translate::translate::http::{
    Header, HttpRequest, HttpTransport, ReqwestTransport, RequestBody, SessionConfig,
    TransportErrorKind,
};

fn transport() -> ReqwestTransport {
    ReqwestTransport::new().unwrap()
}

fn session(timeout: Duration) -> SessionConfig {
    SessionConfig {
        timeout,
        adaptive_timeout: false,
        ..SessionConfig::default()
    }
}

#[tokio::test]
async fn posts_json_with_headers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_json(json!({"model": "m", "temperature": 0.3})))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"ok\":true}"))
        .expect(1)
        .mount(&server)
        .await;

    let request = HttpRequest {
        url: format!("{}/v1/chat/completions", server.uri()),
        headers: vec![Header::new("Authorization", "Bearer sk-test")],
        body: RequestBody::Json(json!({"model": "m", "temperature": 0.3})),
    };
    let resp = transport()
        .execute(&request, &session(Duration::from_secs(5)), &CancellationToken::new())
        .await;

    assert!(resp.is_success());
    assert_eq!(resp.text, "{\"ok\":true}");
}

#[tokio::test]
async fn posts_form_fields() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/NiuTransServer/translation"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string_contains("src_text=hello+world"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"tgt_text\":\"x\"}"))
        .expect(1)
        .mount(&server)
        .await;

    let request = HttpRequest {
        url: format!("{}/NiuTransServer/translation", server.uri()),
        headers: Vec::new(),
        body: RequestBody::Form(vec![
            ("from".into(), "auto".into()),
            ("src_text".into(), "hello world".into()),
        ]),
    };
    let resp = transport()
        .execute(&request, &session(Duration::from_secs(5)), &CancellationToken::new())
        .await;
    assert_eq!(resp.status, 200);
}

#[tokio::test]
async fn gets_with_query() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/translate_a/single"))
        .and(query_param("client", "gtx"))
        .respond_with(ResponseTemplate::new(200).set_body_string("[[[\"Hi\",\"やあ\"]]]"))
        .mount(&server)
        .await;

    let request = HttpRequest {
        url: format!("{}/translate_a/single?client=gtx&q=%E3%82%84%E3%81%82", server.uri()),
        headers: Vec::new(),
        body: RequestBody::None,
    };
    let resp = transport()
        .execute(&request, &session(Duration::from_secs(5)), &CancellationToken::new())
        .await;
    assert!(resp.is_success());
    assert!(resp.text.contains("Hi"));
}

#[tokio::test]
async fn surfaces_status_and_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("retry-after", "3")
                .set_body_string("too many requests"),
        )
        .mount(&server)
        .await;

    let request = HttpRequest {
        url: server.uri(),
        headers: Vec::new(),
        body: RequestBody::Json(json!({})),
    };
    let resp = transport()
        .execute(&request, &session(Duration::from_secs(5)), &CancellationToken::new())
        .await;
    assert_eq!(resp.status, 429);
    assert!(resp.error.is_none());
    assert_eq!(resp.retry_after, Some(Duration::from_secs(3)));
    assert_eq!(resp.text, "too many requests");
}

#[tokio::test]
async fn slow_server_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let request = HttpRequest {
        url: server.uri(),
        headers: Vec::new(),
        body: RequestBody::None,
    };
    let resp = transport()
        .execute(&request, &session(Duration::from_millis(200)), &CancellationToken::new())
        .await;
    let error = resp.error.unwrap();
    assert_eq!(error.kind, TransportErrorKind::Timeout);
    assert_eq!(resp.status, 0);
}

#[tokio::test]
async fn cancellation_interrupts_in_flight_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(10)))
        .mount(&server)
        .await;

    let request = HttpRequest {
        url: server.uri(),
        headers: Vec::new(),
        body: RequestBody::None,
    };
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let resp = transport()
        .execute(&request, &session(Duration::from_secs(30)), &cancel)
        .await;
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(resp.error.unwrap().kind, TransportErrorKind::Cancelled);
}
