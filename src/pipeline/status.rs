//! The single user-visible status line.

pub const MSG_FETCH_ERROR: &str =
    "Failed to fetch NFTs. Please check the wallet address and try again.";
pub const MSG_GENERATE_SUCCESS: &str = "Collage generated successfully! You can now download it.";
pub const MSG_DOWNLOAD_ERROR: &str = "Please generate a collage first";
pub const MSG_STATIC_GIF_FALLBACK: &str = "Failed to create GIF. Downloading as PNG instead.";
pub const MSG_NO_FRAMES_FALLBACK: &str =
    "Failed to extract animation frames. Creating static collage instead.";
pub const MSG_ANIMATED_FALLBACK: &str =
    "Failed to create animated collage. Creating static collage instead.";
pub const MSG_VIDEO_FALLBACK: &str = "Failed to create video. Downloading as PNG instead.";
pub const MSG_VIDEO_NOT_ANIMATED: &str = "No animated NFTs detected. Downloading as PNG instead.";

pub fn no_nfts(collection: &str) -> String {
    format!("No {collection} NFTs found in this wallet")
}

/// Current status message plus everything shown before it.
///
/// Each update is mirrored into the log.
#[derive(Clone, Debug, Default)]
pub struct StatusBoard {
    history: Vec<String>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, msg: impl Into<String>) {
        let msg = msg.into();
        tracing::info!(status = %msg);
        self.history.push(msg);
    }

    pub fn current(&self) -> Option<&str> {
        self.history.last().map(String::as_str)
    }

    pub fn history(&self) -> &[String] {
        &self.history
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.history.iter().any(|m| m.contains(needle))
    }
}
