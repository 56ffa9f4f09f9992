//! HTTP API against an in-process server on an ephemeral port.

use std::sync::Arc;

use project_resolver::config::Config;
use project_resolver::context::ResolverContext;
use project_resolver::server::router;
use project_resolver_core::fake::{ScriptedCompleter, StaticEmbedder};
use serde_json::{json, Value};
use tempfile::TempDir;

struct TestServer {
    base: String,
    client: reqwest::Client,
    _tmp: TempDir,
}

impl TestServer {
    async fn start(completions: Vec<String>) -> Self {
        let tmp = TempDir::new().unwrap();
        let config: Config = toml::from_str(&format!(
            "[registry]\npath = \"{}/projects.json\"\n",
            tmp.path().display()
        ))
        .unwrap();
        let ctx = Arc::new(ResolverContext::new(
            config,
            Arc::new(StaticEmbedder::new()),
            Arc::new(ScriptedCompleter::new(completions)),
        ));
        ctx.init().await.unwrap();

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(ctx)).await.unwrap();
        });

        Self {
            base: format!("http://{addr}"),
            client: reqwest::Client::new(),
            _tmp: tmp,
        }
    }

    async fn get(&self, path: &str) -> (u16, Value) {
        let resp = self
            .client
            .get(format!("{}{}", self.base, path))
            .send()
            .await
            .unwrap();
        (resp.status().as_u16(), resp.json().await.unwrap())
    }

    async fn post(&self, path: &str, body: Value) -> (u16, Value) {
        let resp = self
            .client
            .post(format!("{}{}", self.base, path))
            .json(&body)
            .send()
            .await
            .unwrap();
        (resp.status().as_u16(), resp.json().await.unwrap())
    }

    async fn delete(&self, path: &str) -> (u16, Value) {
        let resp = self
            .client
            .delete(format!("{}{}", self.base, path))
            .send()
            .await
            .unwrap();
        (resp.status().as_u16(), resp.json().await.unwrap())
    }
}

async fn create_payment_gateway(server: &TestServer) {
    let (status, body) = server
        .post(
            "/api/admin/projects",
            json!({"name": "Payment Gateway", "aliases": ["PG"], "category": "Business Systems"}),
        )
        .await;
    assert_eq!(status, 200, "{body}");
}

#[tokio::test]
async fn health_reports_version() {
    let server = TestServer::start(vec![]).await;
    let (status, body) = server.get("/health").await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn resolve_returns_projects() {
    let extraction = json!({"raw_mentions": ["PG upgrade"], "work_categories": {"Maintenance": 1}});
    let server = TestServer::start(vec![extraction.to_string()]).await;
    create_payment_gateway(&server).await;

    let (status, body) = server
        .post("/api/resolve", json!({"text": "Finished the PG upgrade"}))
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["projects"][0]["name"], "Payment Gateway");
    assert_eq!(body["projects"][0]["mention_count"], 1);
    assert_eq!(body["work_categories"]["Maintenance"], 1);
}

#[tokio::test]
async fn empty_text_is_a_bad_request() {
    let server = TestServer::start(vec![]).await;
    let (status, body) = server.post("/api/resolve", json!({"text": "  "})).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "bad_request");
}

#[tokio::test]
async fn registry_errors_map_to_status_codes() {
    let server = TestServer::start(vec![]).await;
    create_payment_gateway(&server).await;

    let (status, body) = server.get("/api/admin/projects/Nowhere").await;
    assert_eq!(status, 404);
    assert_eq!(body["error"]["code"], "not_found");

    let (status, body) = server
        .post(
            "/api/admin/projects",
            json!({"name": "Ledger", "aliases": ["pg"]}),
        )
        .await;
    assert_eq!(status, 409);
    assert_eq!(body["error"]["code"], "conflict");
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("Payment Gateway"));

    let (status, _) = server
        .post("/api/admin/pending/Nobody/approve", json!({}))
        .await;
    assert_eq!(status, 404);

    let (status, body) = server
        .post("/api/suggest/project", json!({"name": "   "}))
        .await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "bad_request");
}

#[tokio::test]
async fn review_workflow_over_http() {
    let server = TestServer::start(vec![]).await;
    create_payment_gateway(&server).await;

    let (status, _) = server
        .post(
            "/api/suggest/project",
            json!({"name": "Atlas", "suggested_by": "dana"}),
        )
        .await;
    assert_eq!(status, 200);
    server
        .post("/api/suggest/project", json!({"name": "pay gw"}))
        .await;
    server
        .post(
            "/api/suggest/sub-item",
            json!({"parent": "PG", "name": "Refunds"}),
        )
        .await;

    let (_, pending) = server.get("/api/admin/pending").await;
    assert_eq!(pending.as_array().unwrap().len(), 3);

    let (status, _) = server
        .post(
            "/api/admin/pending/Atlas/approve?category=Internal%20Tools",
            json!({}),
        )
        .await;
    assert_eq!(status, 200);
    let (status, _) = server
        .post(
            "/api/admin/pending/pay%20gw/merge",
            json!({"target": "Payment Gateway"}),
        )
        .await;
    assert_eq!(status, 200);
    let (status, _) = server
        .post(
            "/api/admin/pending/Payment%20Gateway/sub-items/Refunds/approve",
            json!({}),
        )
        .await;
    assert_eq!(status, 200);

    let (_, atlas) = server.get("/api/admin/projects/Atlas").await;
    assert_eq!(atlas["category"], "Internal Tools");
    let (_, pg) = server.get("/api/admin/projects/Payment%20Gateway").await;
    assert_eq!(pg["aliases"], json!(["PG", "pay gw"]));
    assert_eq!(pg["sub_items"][0]["name"], "Refunds");

    let (_, active) = server.get("/api/projects").await;
    assert_eq!(active.as_array().unwrap().len(), 2);
    let (_, pending) = server.get("/api/admin/pending").await;
    assert!(pending.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn categories_and_rejections() {
    let server = TestServer::start(vec![]).await;

    let (status, _) = server
        .post("/api/admin/categories", json!({"name": "Research"}))
        .await;
    assert_eq!(status, 200);
    let (status, _) = server
        .post("/api/admin/categories", json!({"name": "Research"}))
        .await;
    assert_eq!(status, 409);
    let (status, _) = server.delete("/api/admin/categories/Research").await;
    assert_eq!(status, 200);
    let (status, _) = server.delete("/api/admin/categories/Research").await;
    assert_eq!(status, 404);

    server
        .post("/api/suggest/project", json!({"name": "standup"}))
        .await;
    server
        .post("/api/admin/pending/standup/reject", json!({}))
        .await;
    let (_, rejected) = server.get("/api/admin/rejected").await;
    assert_eq!(rejected, json!(["standup"]));
    let (status, _) = server.delete("/api/admin/rejected/standup").await;
    assert_eq!(status, 200);
    let (status, _) = server.delete("/api/admin/rejected/standup").await;
    assert_eq!(status, 404);
}
