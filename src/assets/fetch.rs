use std::path::Path;

use async_trait::async_trait;
use base64::Engine as _;

use crate::foundation::error::{CollageError, CollageResult};

/// Byte-level access to an image or animation source.
///
/// Implementations must not apply their own deadline; callers wrap the whole load in
/// `tokio::time::timeout` so that fetch and decode share one cancellable future.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn fetch(&self, source: &str) -> CollageResult<Vec<u8>>;
}

/// Default fetcher.
///
/// - `data:` URLs are decoded inline.
/// - `http(s)` URLs go through `{relay_base}/proxy/{encoded}` when a relay is configured,
///   and straight to the origin otherwise. The origin is retried directly only when the relay
///   is unreachable or answers 5xx; a 4xx from the relay (policy refusal, bad target) is final.
/// - anything else is read as a local file path.
#[derive(Clone, Debug)]
pub struct HttpSourceFetcher {
    client: reqwest::Client,
    relay_base: Option<String>,
}

impl HttpSourceFetcher {
    pub fn new(relay_base: Option<String>) -> CollageResult<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| CollageError::source_fetch(format!("build http client: {e}")))?;
        Ok(Self::with_client(client, relay_base))
    }

    pub fn with_client(client: reqwest::Client, relay_base: Option<String>) -> Self {
        let relay_base = relay_base
            .map(|b| b.trim_end_matches('/').to_string())
            .filter(|b| !b.is_empty());
        Self { client, relay_base }
    }

    /// The first URL requested for `source`.
    pub fn request_url(&self, source: &str) -> String {
        match &self.relay_base {
            Some(base) => format!("{base}/proxy/{}", urlencoding::encode(source)),
            None => source.to_string(),
        }
    }
}

#[async_trait]
impl SourceFetcher for HttpSourceFetcher {
    async fn fetch(&self, source: &str) -> CollageResult<Vec<u8>> {
        if source.starts_with("data:") {
            return decode_data_url(source);
        }
        if !is_http_url(source) {
            return tokio::fs::read(Path::new(source))
                .await
                .map_err(|e| CollageError::source_fetch(format!("read '{source}': {e}")));
        }

        let Some(base) = &self.relay_base else {
            return self.get(source).await;
        };
        let relayed = format!("{base}/proxy/{}", urlencoding::encode(source));
        let resp = match self.send(&relayed).await {
            Ok(resp) if !resp.status().is_server_error() => resp,
            Ok(resp) => {
                tracing::debug!(status = resp.status().as_u16(), "relay failed, trying origin");
                return self.get(source).await;
            }
            Err(e) => {
                tracing::debug!(error = %e, "relay unreachable, trying origin");
                return self.get(source).await;
            }
        };
        Self::body(&relayed, resp).await
    }
}

impl HttpSourceFetcher {
    async fn get(&self, url: &str) -> CollageResult<Vec<u8>> {
        let resp = self.send(url).await?;
        Self::body(url, resp).await
    }

    async fn send(&self, url: &str) -> CollageResult<reqwest::Response> {
        tracing::debug!(%url, "fetching source");
        self.client
            .get(url)
            .send()
            .await
            .map_err(|e| CollageError::source_fetch(format!("GET {url}: {e}")))
    }

    async fn body(url: &str, resp: reqwest::Response) -> CollageResult<Vec<u8>> {
        let status = resp.status();
        if !status.is_success() {
            return Err(CollageError::source_fetch(format!(
                "GET {url}: HTTP {}",
                status.as_u16()
            )));
        }
        let body = resp
            .bytes()
            .await
            .map_err(|e| CollageError::source_fetch(format!("read body of {url}: {e}")))?;
        Ok(body.to_vec())
    }
}

pub fn is_http_url(source: &str) -> bool {
    let lower = source.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Decode an RFC 2397 `data:` URL into its payload bytes.
pub fn decode_data_url(url: &str) -> CollageResult<Vec<u8>> {
    let rest = url
        .strip_prefix("data:")
        .ok_or_else(|| CollageError::decode("not a data: URL"))?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| CollageError::decode("data: URL has no ',' separator"))?;

    if meta.split(';').any(|p| p.eq_ignore_ascii_case("base64")) {
        let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
        base64::engine::general_purpose::STANDARD
            .decode(compact.as_bytes())
            .map_err(|e| CollageError::decode(format!("data: URL base64: {e}")))
    } else {
        Ok(urlencoding::decode_binary(payload.as_bytes()).into_owned())
    }
}
