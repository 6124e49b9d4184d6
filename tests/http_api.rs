//! HTTP surface tests against a server bound to an ephemeral port.

use std::net::SocketAddr;

use serde_json::{json, Value};

use inference_server::lifecycle::Shutdown;
use inference_server::HttpServer;

mod common;

const ADMIN_KEY: &str = "test-admin-key";

struct TestServer {
    addr: SocketAddr,
    shutdown: Shutdown,
    harness: common::Harness,
}

impl TestServer {
    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

async fn start(mut config: inference_server::ServerConfig) -> TestServer {
    config.admin.enabled = true;
    config.admin.api_key = ADMIN_KEY.into();
    let harness = common::harness(config);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server = HttpServer::new(harness.services.clone());
    tokio::spawn(server.run(listener, shutdown.subscribe()));

    TestServer {
        addr,
        shutdown,
        harness,
    }
}

fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

#[tokio::test]
async fn infer_returns_prediction() {
    let server = start(common::test_config()).await;

    let res = client()
        .post(server.url("/infer"))
        .json(&json!({ "text": "This is a great product!" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert!(res.headers().contains_key("x-request-id"));

    let body: Value = res.json().await.unwrap();
    assert_eq!(body["prediction"], "positive");
    assert_eq!(body["cache_hit"], false);
    assert_eq!(body["worker_id"], "worker-test");
    assert_eq!(body["probabilities"].as_object().unwrap().len(), 3);

    server.shutdown.trigger();
}

#[tokio::test]
async fn request_id_is_echoed_and_audited() {
    let server = start(common::test_config()).await;

    let res = client()
        .post(server.url("/infer"))
        .header("x-request-id", "client-chosen-id")
        .json(&json!({ "text": "okay" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()["x-request-id"], "client-chosen-id");
    assert_eq!(server.harness.logs.request_ids(), vec!["client-chosen-id"]);
}

#[tokio::test]
async fn invalid_input_is_rejected() {
    let server = start(common::test_config()).await;
    let client = client();

    for body in [json!({ "text": "" }), json!({ "text": "   " }), json!({ "wrong": 1 })] {
        let res = client
            .post(server.url("/infer"))
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 422, "body {} should be rejected", body);
        let err: Value = res.json().await.unwrap();
        assert_eq!(err["error_type"], "ValidationError");
        assert_eq!(err["worker_id"], "worker-test");
    }

    let long = "a".repeat(10_001);
    let res = client
        .post(server.url("/infer"))
        .json(&json!({ "text": long }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 422);

    // Nothing reached the model.
    assert_eq!(server.harness.classifier.calls(), 0);
}

#[tokio::test]
async fn idempotency_header_replays() {
    let server = start(common::test_config()).await;
    let client = client();

    let mut bodies = Vec::new();
    for _ in 0..2 {
        let res = client
            .post(server.url("/infer"))
            .header("x-idempotency-key", "abc-123")
            .json(&json!({ "text": "awful" }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 200);
        bodies.push(res.json::<Value>().await.unwrap());
    }

    assert_eq!(bodies[0]["idempotency_hit"], false);
    assert_eq!(bodies[1]["idempotency_hit"], true);

    // Every other field, floats included, comes back unchanged.
    let mut replayed = bodies[1].clone();
    replayed["idempotency_hit"] = json!(false);
    assert_eq!(replayed, bodies[0]);
    assert_eq!(server.harness.classifier.calls(), 1);
}

#[tokio::test]
async fn model_failure_returns_error_envelope() {
    let server = start(common::test_config()).await;
    server
        .harness
        .classifier
        .failing
        .store(true, std::sync::atomic::Ordering::SeqCst);

    let res = client()
        .post(server.url("/infer"))
        .header("x-request-id", "req-fail")
        .json(&json!({ "text": "boom" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 500);

    let err: Value = res.json().await.unwrap();
    assert_eq!(err["error_type"], "ModelInferenceError");
    assert_eq!(err["request_id"], "req-fail");
}

#[tokio::test]
async fn probes_report_dependencies() {
    let server = start(common::test_config()).await;
    let client = client();

    let health: Value = client
        .get(server.url("/healthz"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "healthy");

    server.harness.kv.set_down(true);
    let res = client.get(server.url("/readyz")).send().await.unwrap();
    // Store outages degrade, they do not make the worker unready.
    assert_eq!(res.status(), 200);
    let ready: Value = res.json().await.unwrap();
    assert_eq!(ready["ready"], true);
    assert_eq!(ready["checks"]["model_loaded"], true);
    assert_eq!(ready["checks"]["cache_available"], false);
    assert_eq!(ready["checks"]["database_available"], true);
}

#[tokio::test]
async fn admin_requires_bearer_token() {
    let server = start(common::test_config()).await;
    let client = client();

    let res = client.get(server.url("/admin/status")).send().await.unwrap();
    assert_eq!(res.status(), 401);

    let res = client
        .get(server.url("/admin/status"))
        .bearer_auth("wrong")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 401);

    let res = client
        .get(server.url("/admin/circuits"))
        .bearer_auth(ADMIN_KEY)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let circuits: Value = res.json().await.unwrap();
    assert_eq!(circuits[0]["dependency"], "kv");
    assert_eq!(circuits[1]["state"], "closed");
}

#[tokio::test]
async fn admin_flush_drains_buffer() {
    let server = start(common::test_config()).await;
    let client = client();

    server.harness.logs.set_down(true);
    client
        .post(server.url("/infer"))
        .json(&json!({ "text": "normal" }))
        .send()
        .await
        .unwrap();

    let buffer: Value = client
        .get(server.url("/admin/buffer"))
        .bearer_auth(ADMIN_KEY)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(buffer["depth"], 1);

    server.harness.logs.set_down(false);
    let flushed: Value = client
        .post(server.url("/admin/flush"))
        .bearer_auth(ADMIN_KEY)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(flushed["flushed"], 1);
    assert_eq!(flushed["remaining"], 0);

    let stats: Value = client
        .get(server.url("/admin/stats"))
        .bearer_auth(ADMIN_KEY)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["total_requests"], 1);
}

#[tokio::test]
async fn rate_limit_rejects_burst() {
    let mut config = common::test_config();
    config.rate_limit.enabled = true;
    config.rate_limit.requests_per_minute = 1;
    config.rate_limit.burst = 2;
    let server = start(config).await;
    let client = client();

    let mut statuses = Vec::new();
    for _ in 0..3 {
        let res = client
            .post(server.url("/infer"))
            .json(&json!({ "text": "fine" }))
            .send()
            .await
            .unwrap();
        statuses.push(res.status().as_u16());
    }
    assert_eq!(statuses, vec![200, 200, 429]);

    // Probes are not rate limited.
    let res = client.get(server.url("/healthz")).send().await.unwrap();
    assert_eq!(res.status(), 200);
}
