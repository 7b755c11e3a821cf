use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderValue, Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use reqwest::Url;
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::foundation::config::RelayConfig;
use crate::foundation::error::{CollageError, CollageResult};
use crate::relay::policy::{PolicyViolation, RelayPolicy};

const DEFAULT_CONTENT_TYPE: &str = "image/jpeg";
const CACHE_CONTROL: &str = "public, max-age=3600";
const MAX_REDIRECTS: usize = 5;

/// Relay failures, each mapped to a status code and a JSON `{ "error": … }` body.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Method not allowed")]
    MethodNotAllowed,
    #[error("Missing or invalid URL parameter")]
    BadUrl,
    #[error("{0}")]
    Forbidden(#[from] PolicyViolation),
    #[error("Request timeout")]
    Timeout,
    #[error("Failed to fetch image")]
    Upstream(StatusCode),
    #[error("Internal server error")]
    Internal,
}

impl RelayError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::BadUrl => StatusCode::BAD_REQUEST,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Timeout => StatusCode::REQUEST_TIMEOUT,
            Self::Upstream(status) => *status,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        (self.status(), axum::Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Shared handler state.
#[derive(Clone)]
pub struct RelayState {
    client: reqwest::Client,
    policy: Arc<RelayPolicy>,
    cfg: Arc<RelayConfig>,
}

impl RelayState {
    pub fn new(cfg: RelayConfig) -> CollageResult<Self> {
        let policy = Arc::new(RelayPolicy::new(
            cfg.allowed_domains.clone(),
            cfg.allow_private_hosts,
        ));

        // Every redirect hop is held to the same policy as the original URL.
        let redirect_policy = {
            let policy = policy.clone();
            reqwest::redirect::Policy::custom(move |attempt| {
                if attempt.previous().len() >= MAX_REDIRECTS {
                    attempt.error("too many redirects")
                } else if let Err(v) = policy.check(attempt.url()) {
                    attempt.error(v)
                } else {
                    attempt.follow()
                }
            })
        };

        let client = reqwest::Client::builder()
            .user_agent(cfg.user_agent.clone())
            .redirect(redirect_policy)
            .build()
            .map_err(|e| CollageError::validation(format!("build relay http client: {e}")))?;

        Ok(Self {
            client,
            policy,
            cfg: Arc::new(cfg),
        })
    }
}

/// `/proxy/{encoded-url}` and `/proxy?url={encoded-url}`, every method routed to one handler.
pub fn router(state: RelayState) -> Router {
    Router::new()
        .route("/proxy", any(proxy))
        .route("/proxy/", any(proxy))
        .route("/proxy/{*target}", any(proxy))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until Ctrl-C.
pub async fn serve(cfg: RelayConfig) -> CollageResult<()> {
    let bind = cfg.bind.clone();
    let app = router(RelayState::new(cfg)?);
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .map_err(|e| CollageError::validation(format!("bind relay on {bind}: {e}")))?;
    tracing::info!(%bind, "fetch relay listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
        })
        .await
        .map_err(|e| CollageError::Other(anyhow::Error::new(e).context("relay server")))?;
    Ok(())
}

#[tracing::instrument(skip(state), fields(target))]
async fn proxy(State(state): State<RelayState>, method: Method, uri: Uri) -> Response {
    match relay(&state, &method, &uri).await {
        Ok(resp) => resp,
        Err(e) => {
            tracing::warn!(status = %e.status(), error = %e, "relay request rejected");
            e.into_response()
        }
    }
}

async fn relay(state: &RelayState, method: &Method, uri: &Uri) -> Result<Response, RelayError> {
    if method != Method::GET {
        return Err(RelayError::MethodNotAllowed);
    }

    let target = target_url(uri).ok_or(RelayError::BadUrl)?;
    tracing::Span::current().record("target", target.as_str());
    let url = Url::parse(&target).map_err(|_| RelayError::BadUrl)?;
    state.policy.check(&url)?;

    let upstream = state
        .client
        .get(url)
        .header(header::ACCEPT, "image/*,*/*")
        .timeout(state.cfg.upstream_timeout())
        .send()
        .await
        .map_err(classify)?;

    let status = upstream.status();
    if !status.is_success() {
        tracing::warn!(%status, "upstream returned non-success");
        return Err(RelayError::Upstream(
            StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::BAD_GATEWAY),
        ));
    }

    let content_type = upstream
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| HeaderValue::from_bytes(v.as_bytes()).ok())
        .unwrap_or_else(|| HeaderValue::from_static(DEFAULT_CONTENT_TYPE));
    let body = upstream.bytes().await.map_err(classify)?;
    tracing::debug!(bytes = body.len(), "relayed upstream body");

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*")
        .header(header::ACCESS_CONTROL_ALLOW_METHODS, "GET, OPTIONS")
        .header(header::ACCESS_CONTROL_ALLOW_HEADERS, "Content-Type")
        .header(header::CACHE_CONTROL, CACHE_CONTROL)
        .body(Body::from(body))
        .map_err(|_| RelayError::Internal)
}

fn classify(e: reqwest::Error) -> RelayError {
    if e.is_timeout() {
        return RelayError::Timeout;
    }
    if e.is_redirect() {
        let violation = std::iter::successors(std::error::Error::source(&e), |err| err.source())
            .find_map(|err| err.downcast_ref::<PolicyViolation>().copied());
        if let Some(v) = violation {
            tracing::warn!(violation = %v, "redirect target refused");
            return RelayError::Forbidden(v);
        }
    }
    tracing::warn!(error = %e, "upstream fetch failed");
    RelayError::Internal
}

/// Decoded target URL from either the path form or the `url` query parameter.
///
/// In the path form everything after `/proxy/`, including any query string, belongs to the
/// target.
pub fn target_url(uri: &Uri) -> Option<String> {
    let path = uri.path();
    let raw = if let Some(rest) = path.strip_prefix("/proxy/") {
        match uri.query() {
            Some(q) => format!("{rest}?{q}"),
            None => rest.to_string(),
        }
    } else {
        let query = uri.query()?;
        let value = query
            .split('&')
            .find_map(|pair| pair.strip_prefix("url="))?;
        value.replace('+', " ")
    };

    let decoded = urlencoding::decode(&raw).ok()?.into_owned();
    let decoded = decoded.trim();
    (!decoded.is_empty()).then(|| decoded.to_string())
}
