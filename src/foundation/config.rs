//! Runtime configuration.
//!
//! Every field has a default, so a config file only needs to name what it overrides.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

use crate::encode::codec::VideoCodec;
use crate::foundation::error::{CollageError, CollageResult};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CollageConfig {
    /// Contract whose tokens are eligible for the collage.
    pub contract_address: String,
    /// `getNFTsForOwner` endpoint (including any API key path segment).
    pub ownership_api_url: String,
    /// Used for fallback display names (`"{collection} #{token_id}"`).
    pub collection_name: String,
    pub min_selection: usize,
    pub max_selection: usize,
    /// Base URL of the fetch relay; cross-origin sources go through `{relay_base}/proxy/…`.
    pub relay_base: Option<String>,
    /// Fixed logo tile image on disk.
    pub logo_path: PathBuf,
    pub timeouts: TimeoutConfig,
    /// Upper bound on normalized frames for the animated-image export.
    pub gif_max_frames: usize,
    pub video: VideoConfig,
    pub output_dir: PathBuf,
    pub relay: RelayConfig,
}

impl Default for CollageConfig {
    fn default() -> Self {
        Self {
            contract_address: "0x95bc4c2e01c2e2d9e537e7a9fe58187e88dd8019".to_string(),
            ownership_api_url: "https://base-mainnet.g.alchemy.com/nft/v3/demo/getNFTsForOwner"
                .to_string(),
            collection_name: "NODES".to_string(),
            min_selection: 2,
            max_selection: 8,
            relay_base: None,
            logo_path: PathBuf::from("logo.png"),
            timeouts: TimeoutConfig::default(),
            gif_max_frames: 30,
            video: VideoConfig::default(),
            output_dir: PathBuf::from("."),
            relay: RelayConfig::default(),
        }
    }
}

/// Bounded waits, in milliseconds.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Raw-byte fetch for frame extraction.
    pub extract_fetch_ms: u64,
    pub preview_image_ms: u64,
    pub hd_image_ms: u64,
    pub logo_ms: u64,
    /// Wallet ownership lookup.
    pub ownership_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            extract_fetch_ms: 15_000,
            preview_image_ms: 8_000,
            hd_image_ms: 10_000,
            logo_ms: 5_000,
            ownership_ms: 15_000,
        }
    }
}

impl TimeoutConfig {
    pub fn extract_fetch(&self) -> Duration {
        Duration::from_millis(self.extract_fetch_ms)
    }

    pub fn preview_image(&self) -> Duration {
        Duration::from_millis(self.preview_image_ms)
    }

    pub fn hd_image(&self) -> Duration {
        Duration::from_millis(self.hd_image_ms)
    }

    pub fn logo(&self) -> Duration {
        Duration::from_millis(self.logo_ms)
    }

    pub fn ownership(&self) -> Duration {
        Duration::from_millis(self.ownership_ms)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    pub fps: u32,
    pub duration_seconds: u32,
    /// Unique content frames looped across the recording.
    pub base_frames: usize,
    /// Ticks drawn before capture is armed.
    pub warmup_ticks: usize,
    /// Wait after the last tick before finalizing the container.
    pub grace_ms: u64,
    pub bitrate_bps: u64,
    /// Codec preference, most preferred first.
    pub codecs: Vec<VideoCodec>,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            fps: 30,
            duration_seconds: 2,
            base_frames: 16,
            warmup_ticks: 16,
            grace_ms: 200,
            bitrate_bps: 10_000_000,
            codecs: VideoCodec::PREFERENCE.to_vec(),
        }
    }
}

impl VideoConfig {
    pub fn total_ticks(&self) -> usize {
        (self.fps as usize) * (self.duration_seconds as usize)
    }

    pub fn validate(&self) -> CollageResult<()> {
        if self.fps == 0 || self.duration_seconds == 0 {
            return Err(CollageError::validation(
                "video fps and duration must be non-zero",
            ));
        }
        if self.base_frames == 0 {
            return Err(CollageError::validation(
                "video base frame count must be non-zero",
            ));
        }
        if self.codecs.is_empty() {
            return Err(CollageError::validation(
                "video codec preference list must not be empty",
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub bind: String,
    pub upstream_timeout_ms: u64,
    pub user_agent: String,
    /// When set, only hosts equal to or ending in one of these domains are relayed.
    pub allowed_domains: Option<Vec<String>>,
    /// Permit loopback/private/link-local upstreams. Local development only.
    pub allow_private_hosts: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8000".to_string(),
            upstream_timeout_ms: 15_000,
            user_agent: "Mozilla/5.0 (compatible; NODES-NFT-Collage-Maker/1.0)".to_string(),
            allowed_domains: None,
            allow_private_hosts: false,
        }
    }
}

impl RelayConfig {
    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_millis(self.upstream_timeout_ms)
    }
}

impl CollageConfig {
    pub fn from_json_file(path: &Path) -> CollageResult<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read config '{}'", path.display()))?;
        let cfg: Self = serde_json::from_str(&raw)
            .with_context(|| format!("parse config JSON '{}'", path.display()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> CollageResult<()> {
        if self.min_selection < 1 || self.min_selection > self.max_selection {
            return Err(CollageError::validation(
                "selection bounds must satisfy 1 <= min <= max",
            ));
        }
        // Slot 0 is the logo, leaving eight tiles.
        if self.max_selection > 8 {
            return Err(CollageError::validation(
                "max_selection cannot exceed the 8 non-logo grid slots",
            ));
        }
        let t = &self.timeouts;
        if [t.extract_fetch_ms, t.preview_image_ms, t.hd_image_ms, t.logo_ms, t.ownership_ms]
            .contains(&0)
        {
            return Err(CollageError::validation("timeouts must be non-zero"));
        }
        if self.gif_max_frames == 0 {
            return Err(CollageError::validation("gif_max_frames must be non-zero"));
        }
        self.video.validate()
    }
}
