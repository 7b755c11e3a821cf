use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::Serialize;

use crate::foundation::error::CollageResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// 600x600 on-screen collage.
    PreviewPng,
    /// 2400x2400 still.
    HdPng,
    /// One 1000 ms frame.
    StaticGif,
    AnimatedGif,
    Video,
}

impl ArtifactKind {
    pub fn file_prefix(self) -> &'static str {
        match self {
            Self::HdPng => "nodes-collage-hd",
            Self::PreviewPng | Self::StaticGif => "nodes-collage",
            Self::AnimatedGif | Self::Video => "nodes-animated-collage",
        }
    }
}

/// Encoded output of one export.
#[derive(Clone, Debug)]
pub struct ExportArtifact {
    pub kind: ArtifactKind,
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub frame_count: usize,
    /// Produced by the static fallback instead of the requested path.
    pub degraded: bool,
}

impl ExportArtifact {
    pub fn write_to(&self, dir: &Path) -> CollageResult<PathBuf> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("create output dir '{}'", dir.display()))?;
        let path = dir.join(&self.file_name);
        std::fs::write(&path, &self.bytes)
            .with_context(|| format!("write '{}'", path.display()))?;
        Ok(path)
    }
}

/// Millisecond timestamps that never repeat within a process.
#[derive(Debug, Default)]
pub struct FileNamer {
    last_ms: u128,
}

impl FileNamer {
    pub fn name(&mut self, kind: ArtifactKind, ext: &str) -> String {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        let stamp = now.max(self.last_ms + 1);
        self.last_ms = stamp;
        format!("{}-{stamp}.{ext}", kind.file_prefix())
    }
}
