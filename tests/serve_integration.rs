//! Purpose: End-to-end tests for the HTTP call endpoint.
//! Exports: None (integration test module).
//! Role: Validate envelopes across TCP and shutdown on inactivity.
//! Invariants: Uses a loopback listener on an ephemeral port and a fake catalog.
//! Invariants: Bounded waits avoid test flakiness.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use channel_search::api::{
    Catalog, DEFAULT_BASE_PATH, DEFAULT_MAX_BODY_BYTES, Error, IdleTimer, Launcher, ResultMeta,
    ServeConfig, build_dispatcher, serve_with_listener,
};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

struct StaticCatalog;

#[async_trait]
impl Catalog for StaticCatalog {
    async fn get_item_ids_for_search(&self, query: &str) -> Result<Vec<String>, Error> {
        Ok(vec![format!("c/{query}?sci"), "c/art?art".to_string()])
    }

    async fn get_metadata_for_item_ids(
        &self,
        item_ids: &[String],
    ) -> Result<Vec<ResultMeta>, Error> {
        Ok(item_ids.iter().map(|id| ResultMeta::new(id.clone())).collect())
    }
}

struct NoopLauncher;

#[async_trait]
impl Launcher for NoopLauncher {
    async fn launch_uri(&self, _uri: &str) -> Result<(), Error> {
        Ok(())
    }
}

fn config() -> ServeConfig {
    ServeConfig {
        bind: "127.0.0.1:0".parse().expect("bind"),
        catalog_url: "http://127.0.0.1:1".to_string(),
        catalog_token: None,
        base_path: DEFAULT_BASE_PATH.to_string(),
        scheme: "x-test".to_string(),
        launcher: "true".to_string(),
        inactivity_timeout_ms: 20_000,
        allow_non_loopback: false,
        max_body_bytes: DEFAULT_MAX_BODY_BYTES,
    }
}

async fn start(idle_timeout: Duration) -> (SocketAddr, JoinHandle<Result<(), Error>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let dispatcher = build_dispatcher(
        &config(),
        Arc::new(StaticCatalog),
        Arc::new(NoopLauncher),
        Arc::new(IdleTimer::new(idle_timeout)),
    );
    let server = tokio::spawn(serve_with_listener(
        listener,
        Arc::new(dispatcher),
        DEFAULT_MAX_BODY_BYTES as usize,
    ));
    (addr, server)
}

/// Returns `(status, body)` for a POST to `/v0/call`.
async fn post_call(addr: SocketAddr, body: String) -> (u16, Value) {
    tokio::task::spawn_blocking(move || {
        let url = format!("http://{addr}/v0/call");
        let response = match ureq::post(&url)
            .set("Content-Type", "application/json")
            .send_string(&body)
        {
            Ok(response) => response,
            Err(ureq::Error::Status(_, response)) => response,
            Err(err) => panic!("request failed: {err}"),
        };
        let status = response.status();
        let text = response.into_string().expect("body");
        (status, serde_json::from_str(&text).expect("json"))
    })
    .await
    .expect("join")
}

#[tokio::test]
async fn call_endpoint_returns_scoped_results() {
    let (addr, server) = start(Duration::from_secs(20)).await;

    let call = json!({
        "path": format!("{DEFAULT_BASE_PATH}/channel_sci"),
        "interface": "org.gnome.Shell.SearchProvider2",
        "method": "GetInitialResultSet",
        "args": [["newton"]],
    });
    let (status, reply) = post_call(addr, call.to_string()).await;
    assert_eq!(status, 200);
    assert_eq!(reply, json!({ "result": ["c/newton?sci"] }));

    server.abort();
}

#[tokio::test]
async fn call_endpoint_reports_bus_errors_in_envelope() {
    let (addr, server) = start(Duration::from_secs(20)).await;

    let call = json!({
        "path": "/nowhere",
        "interface": "org.gnome.Shell.SearchProvider2",
        "method": "GetInitialResultSet",
        "args": [["newton"]],
    });
    let (status, reply) = post_call(addr, call.to_string()).await;
    assert_eq!(status, 200);
    assert_eq!(
        reply["error"]["name"],
        "org.freedesktop.DBus.Error.UnknownObject"
    );

    let (status, reply) = post_call(addr, "{not json".to_string()).await;
    assert_eq!(status, 400);
    assert_eq!(reply["error"]["kind"], "InvalidArgs");

    server.abort();
}

#[tokio::test]
async fn healthz_reports_ok() {
    let (addr, server) = start(Duration::from_secs(20)).await;

    let body = tokio::task::spawn_blocking(move || {
        ureq::get(&format!("http://{addr}/healthz"))
            .call()
            .expect("healthz")
            .into_string()
            .expect("body")
    })
    .await
    .expect("join");
    let value: Value = serde_json::from_str(&body).expect("json");
    assert_eq!(value, json!({ "ok": true }));

    server.abort();
}

#[tokio::test]
async fn server_stops_after_inactivity() {
    let (_addr, server) = start(Duration::from_millis(200)).await;

    let result = tokio::time::timeout(Duration::from_secs(10), server)
        .await
        .expect("server stops on its own")
        .expect("join");
    result.expect("clean shutdown");
}
