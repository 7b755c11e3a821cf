//! Remote and local source resolution: raw bytes, static bitmaps, the logo tile.

pub mod decode;
pub mod fetch;

use std::time::Duration;

use crate::foundation::core::Bitmap;

pub use fetch::{HttpSourceFetcher, SourceFetcher};

/// Outcome of resolving one image source: a decoded bitmap, or the defined "unavailable" result
/// (missing URL, fetch failure, timeout, undecodable payload).
#[derive(Clone, Debug)]
pub enum Resolved {
    Ready(Bitmap),
    Unavailable,
}

impl Resolved {
    pub fn bitmap(&self) -> Option<&Bitmap> {
        match self {
            Self::Ready(b) => Some(b),
            Self::Unavailable => None,
        }
    }
}

/// Fetch and decode `source` as a single still image.
///
/// The timeout wraps fetch and decode as one future, so a load can never outlive its caller.
#[tracing::instrument(skip(fetcher))]
pub async fn resolve_bitmap(
    fetcher: &dyn SourceFetcher,
    source: Option<&str>,
    timeout: Duration,
) -> Resolved {
    let Some(source) = source.filter(|s| !s.trim().is_empty()) else {
        tracing::warn!("no image source, slot will use a placeholder");
        return Resolved::Unavailable;
    };

    let load = async {
        let bytes = fetcher.fetch(source).await?;
        decode::decode_image(&bytes)
    };

    match tokio::time::timeout(timeout, load).await {
        Ok(Ok(bitmap)) => Resolved::Ready(bitmap),
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "image load failed");
            Resolved::Unavailable
        }
        Err(_) => {
            tracing::warn!(?timeout, "image load timed out");
            Resolved::Unavailable
        }
    }
}

/// Load the fixed logo tile from disk; `None` selects the drawn fallback tile.
pub async fn load_logo(path: &std::path::Path, timeout: Duration) -> Option<Bitmap> {
    let load = async {
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            crate::CollageError::source_fetch(format!("read logo '{}': {e}", path.display()))
        })?;
        decode::decode_image(&bytes)
    };
    match tokio::time::timeout(timeout, load).await {
        Ok(Ok(bitmap)) => Some(bitmap),
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "failed to load logo, using fallback tile");
            None
        }
        Err(_) => {
            tracing::warn!("logo load timeout, using fallback tile");
            None
        }
    }
}
