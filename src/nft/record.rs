use serde::Serialize;
use serde_json::Value;

use crate::foundation::error::{CollageError, CollageResult};

/// One owned token, normalized at ingestion. Immutable for the session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NftRecord {
    pub token_id: String,
    pub name: String,
    pub image_url: Option<String>,
    pub animation_url: Option<String>,
    pub is_animated: bool,
}

impl NftRecord {
    pub fn new(
        token_id: impl Into<String>,
        name: impl Into<String>,
        image_url: Option<String>,
        animation_url: Option<String>,
    ) -> Self {
        let is_animated = detect_animated(image_url.as_deref(), animation_url.as_deref());
        Self {
            token_id: token_id.into(),
            name: name.into(),
            image_url,
            animation_url,
            is_animated,
        }
    }

    /// Source used for frame extraction: the animation URL, else the image.
    pub fn animation_source(&self) -> Option<&str> {
        self.animation_url.as_deref().or(self.image_url.as_deref())
    }
}

/// Case-insensitive substring test: `gif` anywhere in the image URL, or a video/GIF
/// extension anywhere in the animation URL.
pub fn detect_animated(image_url: Option<&str>, animation_url: Option<&str>) -> bool {
    let image = image_url
        .map(|u| u.to_ascii_lowercase().contains("gif"))
        .unwrap_or(false);
    let animation = animation_url
        .map(|u| {
            let u = u.to_ascii_lowercase();
            [".gif", ".mp4", ".webm", ".mov"]
                .iter()
                .any(|ext| u.contains(ext))
        })
        .unwrap_or(false);
    image || animation
}

const IMAGE_FIELDS: [&str; 6] = [
    "/image/originalUrl",
    "/image/pngUrl",
    "/image/url",
    "/media/0/gateway",
    "/media/0/raw",
    "/rawMetadata/image",
];

const ANIMATION_FIELDS: [&str; 3] = [
    "/animationUrl",
    "/media/0/gateway",
    "/rawMetadata/animation_url",
];

/// Parse a `getNFTsForOwner` response body into records.
///
/// Fields resolve by first non-empty match in priority order. An absent or empty
/// `ownedNfts` array yields an empty list.
pub fn ingest_owned_nfts(body: &Value, collection_name: &str) -> CollageResult<Vec<NftRecord>> {
    let owned = match body.get("ownedNfts") {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(items)) => items,
        Some(_) => {
            return Err(CollageError::decode(
                "ownership response: 'ownedNfts' is not an array",
            ));
        }
    };
    Ok(owned
        .iter()
        .map(|nft| ingest_one(nft, collection_name))
        .collect())
}

fn ingest_one(nft: &Value, collection_name: &str) -> NftRecord {
    let token_id = match nft.get("tokenId") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    };

    let image_url = first_non_empty(nft, &IMAGE_FIELDS).or_else(|| {
        (!token_id.is_empty()).then(|| format!("https://ipfs.io/ipfs/{token_id}"))
    });
    let animation_url = first_non_empty(nft, &ANIMATION_FIELDS);

    let name = nft
        .get("name")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("{collection_name} #{token_id}"));

    let record = NftRecord::new(token_id, name, image_url, animation_url);
    tracing::debug!(
        token_id = %record.token_id,
        animated = record.is_animated,
        "ingested token"
    );
    record
}

fn first_non_empty(nft: &Value, pointers: &[&str]) -> Option<String> {
    pointers
        .iter()
        .filter_map(|p| nft.pointer(p).and_then(Value::as_str))
        .find(|s| !s.is_empty())
        .map(str::to_string)
}
