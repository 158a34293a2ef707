//! Purpose: Reach the content catalog over HTTP/JSON.
//! Exports: `RemoteCatalog`.
//! Role: Default `Catalog` implementation used by `serve`.
//! Invariants: Requests are `POST {base}/v0/search` and `POST {base}/v0/metadata`.
//! Invariants: Blocking I/O runs on the blocking pool, never on the event loop.
//! Invariants: Every request is bounded by connect and read timeouts.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

use super::{Catalog, ResultMeta};
use crate::core::error::{Error, ErrorKind};

type CatalogResult<T> = Result<T, Error>;

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct RemoteCatalog {
    inner: Arc<RemoteCatalogInner>,
}

struct RemoteCatalogInner {
    base_url: Url,
    token: Option<String>,
    agent: ureq::Agent,
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
}

#[derive(Deserialize)]
struct SearchEnvelope {
    item_ids: Vec<String>,
}

#[derive(Serialize)]
struct MetadataRequest<'a> {
    item_ids: &'a [String],
}

#[derive(Deserialize)]
struct MetadataEnvelope {
    metadata: Vec<ResultMeta>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: RemoteError,
}

#[derive(Deserialize)]
struct RemoteError {
    kind: String,
    message: Option<String>,
}

impl RemoteCatalog {
    pub fn new(base_url: impl Into<String>) -> CatalogResult<Self> {
        Self::with_timeouts(base_url, DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_TIMEOUT)
    }

    /// Builds a client whose requests give up after `connect` and `read` elapse.
    pub fn with_timeouts(
        base_url: impl Into<String>,
        connect: Duration,
        read: Duration,
    ) -> CatalogResult<Self> {
        let base_url = normalize_base_url(base_url.into())?;
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(connect)
            .timeout_read(read)
            .timeout_write(read)
            .build();
        Ok(Self {
            inner: Arc::new(RemoteCatalogInner {
                base_url,
                token: None,
                agent,
            }),
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        let token = Some(token.into());
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            inner.token = token;
        } else {
            self.inner = Arc::new(RemoteCatalogInner {
                base_url: self.inner.base_url.clone(),
                token,
                agent: self.inner.agent.clone(),
            });
        }
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    fn post_json<T, R>(&self, segments: &[&str], body: &T) -> CatalogResult<R>
    where
        T: Serialize,
        R: DeserializeOwned,
    {
        let url = build_url(&self.inner.base_url, segments)?;
        let payload = serde_json::to_string(body).map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("failed to encode catalog request")
                .with_source(err)
        })?;

        let mut request = self
            .inner
            .agent
            .post(url.as_str())
            .set("Accept", "application/json")
            .set("Content-Type", "application/json");
        if let Some(token) = &self.inner.token {
            request = request.set("Authorization", &format!("Bearer {token}"));
        }

        match request.send_string(&payload) {
            Ok(resp) => read_json_response(resp),
            Err(ureq::Error::Status(code, resp)) => Err(parse_error_response(code, resp)),
            Err(ureq::Error::Transport(err)) => Err(Error::new(ErrorKind::Upstream)
                .with_message("catalog request failed")
                .with_source(err)),
        }
    }
}

#[async_trait]
impl Catalog for RemoteCatalog {
    async fn get_item_ids_for_search(&self, query: &str) -> CatalogResult<Vec<String>> {
        let client = self.clone();
        let query = query.to_string();
        let envelope: SearchEnvelope = run_blocking(move || {
            client.post_json(&["v0", "search"], &SearchRequest { query: &query })
        })
        .await?;
        Ok(envelope.item_ids)
    }

    async fn get_metadata_for_item_ids(
        &self,
        item_ids: &[String],
    ) -> CatalogResult<Vec<ResultMeta>> {
        let client = self.clone();
        let item_ids = item_ids.to_vec();
        let envelope: MetadataEnvelope = run_blocking(move || {
            client.post_json(
                &["v0", "metadata"],
                &MetadataRequest {
                    item_ids: &item_ids,
                },
            )
        })
        .await?;
        Ok(envelope.metadata)
    }
}

async fn run_blocking<R, F>(job: F) -> CatalogResult<R>
where
    R: Send + 'static,
    F: FnOnce() -> CatalogResult<R> + Send + 'static,
{
    tokio::task::spawn_blocking(job).await.map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("catalog request task failed")
            .with_source(err)
    })?
}

fn normalize_base_url(raw: String) -> CatalogResult<Url> {
    let mut url = Url::parse(&raw).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message("invalid catalog base url")
            .with_source(err)
    })?;
    let scheme = url.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("catalog base url must use http or https scheme"));
    }
    if url.path() != "/" && !url.path().is_empty() {
        return Err(
            Error::new(ErrorKind::Usage).with_message("catalog base url must not include a path")
        );
    }
    url.set_path("/");
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

fn build_url(base_url: &Url, segments: &[&str]) -> CatalogResult<Url> {
    let mut url = base_url.clone();
    {
        let mut path = url.path_segments_mut().map_err(|_| {
            Error::new(ErrorKind::Usage).with_message("catalog base url cannot be a base")
        })?;
        path.clear();
        for segment in segments {
            path.push(segment);
        }
    }
    Ok(url)
}

fn read_json_response<R>(response: ureq::Response) -> CatalogResult<R>
where
    R: DeserializeOwned,
{
    let body = response.into_string().map_err(|err| {
        Error::new(ErrorKind::Upstream)
            .with_message("failed to read catalog response body")
            .with_source(err)
    })?;
    serde_json::from_str(&body).map_err(|err| {
        Error::new(ErrorKind::Upstream)
            .with_message("invalid catalog response json")
            .with_source(err)
    })
}

fn parse_error_response(status: u16, response: ureq::Response) -> Error {
    let body = response.into_string().unwrap_or_default();
    error_from_body(status, &body)
}

fn error_from_body(status: u16, body: &str) -> Error {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => {
            let message = envelope
                .error
                .message
                .unwrap_or_else(|| format!("catalog error status {status}"));
            Error::new(ErrorKind::Upstream).with_message(format!("{}: {message}", envelope.error.kind))
        }
        Err(_) => Error::new(ErrorKind::Upstream)
            .with_message(format!("catalog error status {status}")),
    }
}

#[cfg(test)]
mod tests {
    use super::{RemoteCatalog, build_url, error_from_body, normalize_base_url};
    use crate::core::error::ErrorKind;
    use std::time::Duration;

    #[test]
    fn normalize_base_url_strips_query() {
        let url = normalize_base_url("http://localhost:8080?x=1".to_string()).expect("url");
        assert_eq!(url.as_str(), "http://localhost:8080/");
    }

    #[test]
    fn normalize_base_url_rejects_paths_and_schemes() {
        let err = normalize_base_url("http://localhost:8080/api".to_string()).expect_err("path");
        assert_eq!(err.kind(), ErrorKind::Usage);
        let err = normalize_base_url("ftp://localhost".to_string()).expect_err("scheme");
        assert_eq!(err.kind(), ErrorKind::Usage);
    }

    #[test]
    fn build_url_appends_segments() {
        let base = normalize_base_url("http://127.0.0.1:9000".to_string()).expect("url");
        let url = build_url(&base, &["v0", "search"]).expect("url");
        assert_eq!(url.as_str(), "http://127.0.0.1:9000/v0/search");
    }

    #[test]
    fn remote_error_envelopes_become_upstream_errors() {
        let err = error_from_body(
            500,
            r#"{"error":{"kind":"SearchHandlerFailed","message":"index missing"}}"#,
        );
        assert_eq!(err.kind(), ErrorKind::Upstream);
        assert_eq!(err.message(), Some("SearchHandlerFailed: index missing"));

        let err = error_from_body(502, "<html>bad gateway</html>");
        assert_eq!(err.kind(), ErrorKind::Upstream);
        assert_eq!(err.message(), Some("catalog error status 502"));
    }

    #[test]
    fn with_token_keeps_base_url() {
        let catalog = RemoteCatalog::new("http://localhost:9000")
            .expect("catalog")
            .with_token("secret");
        assert_eq!(catalog.base_url().as_str(), "http://localhost:9000/");
    }

    #[tokio::test]
    async fn unreachable_catalog_reports_upstream() {
        use super::Catalog;
        // Port 9 (discard) on loopback is expected to refuse connections.
        let catalog = RemoteCatalog::new("http://127.0.0.1:9").expect("catalog");
        let err = catalog
            .get_item_ids_for_search("newton")
            .await
            .expect_err("unreachable");
        assert_eq!(err.kind(), ErrorKind::Upstream);
    }

    #[tokio::test]
    async fn silent_catalog_times_out_as_upstream() {
        use super::Catalog;
        // Connections complete through the backlog but nothing ever answers.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr");
        let catalog = RemoteCatalog::with_timeouts(
            format!("http://{addr}"),
            Duration::from_secs(1),
            Duration::from_millis(200),
        )
        .expect("catalog");

        let err = tokio::time::timeout(
            Duration::from_secs(10),
            catalog.get_item_ids_for_search("newton"),
        )
        .await
        .expect("request gives up on its own")
        .expect_err("timed out");
        assert_eq!(err.kind(), ErrorKind::Upstream);
        drop(listener);
    }
}
