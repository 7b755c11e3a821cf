//! Video NFT sources decoded through the system `ffmpeg`.

use std::process::Stdio;

use crate::animation::sequence::{DecodedFrame, FrameSequence};
use crate::encode::ffmpeg::{TempFileGuard, is_ffmpeg_on_path, scratch_path};
use crate::foundation::core::Bitmap;
use crate::foundation::error::{CollageError, CollageResult};

const SAMPLE_FPS: u32 = 10;
const MAX_FRAMES: usize = 30;
const FRAME_SIZE: u32 = 400;

/// ISO-BMFF (`mp4`, `mov`) or Matroska/WebM.
pub fn is_video_container(bytes: &[u8]) -> bool {
    let iso = bytes
        .get(4..8)
        .is_some_and(|tag| matches!(tag, b"ftyp" | b"moov" | b"mdat" | b"wide"));
    let ebml = bytes.starts_with(&[0x1A, 0x45, 0xDF, 0xA3]);
    iso || ebml
}

/// Sample up to 30 frames at 10 fps, scaled to 400x400, each lasting 100 ms.
///
/// The decoder child is killed if this future is dropped before it finishes, so a caller's
/// `tokio::time::timeout` bounds the whole decode.
pub async fn decode_video(bytes: Vec<u8>) -> CollageResult<FrameSequence> {
    if !is_ffmpeg_on_path() {
        return Err(CollageError::decode(
            "decoding a video source needs ffmpeg on PATH",
        ));
    }

    let input = TempFileGuard(Some(scratch_path("nodes_collage_source", "bin")));
    let input_path = input
        .path()
        .ok_or_else(|| CollageError::decode("video scratch path already released"))?;
    tokio::fs::write(input_path, &bytes).await.map_err(|e| {
        CollageError::decode(format!(
            "write video scratch '{}': {e}",
            input_path.display()
        ))
    })?;

    let mut cmd = tokio::process::Command::new("ffmpeg");
    cmd.args(["-hide_banner", "-loglevel", "error", "-i"])
        .arg(input_path)
        .args([
            "-vf",
            &format!("fps={SAMPLE_FPS},scale={FRAME_SIZE}:{FRAME_SIZE}"),
            "-frames:v",
            &MAX_FRAMES.to_string(),
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba",
            "pipe:1",
        ]);
    let out = run_decoder(spawn_decoder(cmd)?).await?;

    let log = String::from_utf8_lossy(&out.stderr);
    if !out.status.success() {
        return Err(CollageError::decode(format!(
            "ffmpeg exited with status {}: {}",
            out.status,
            log.trim()
        )));
    }
    if !log.trim().is_empty() {
        tracing::debug!(log = %log.trim(), "ffmpeg decode finished with output");
    }

    frames_from_raw(&out.stdout)
}

fn spawn_decoder(mut cmd: tokio::process::Command) -> CollageResult<tokio::process::Child> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| CollageError::decode(format!("failed to spawn ffmpeg: {e}")))
}

/// Collect stdout and stderr concurrently until the child exits.
async fn run_decoder(child: tokio::process::Child) -> CollageResult<std::process::Output> {
    child
        .wait_with_output()
        .await
        .map_err(|e| CollageError::decode(format!("collect ffmpeg output: {e}")))
}

fn frames_from_raw(raw: &[u8]) -> CollageResult<FrameSequence> {
    let frame_len = (FRAME_SIZE as usize) * (FRAME_SIZE as usize) * 4;
    let frames = raw
        .chunks_exact(frame_len)
        .take(MAX_FRAMES)
        .map(|chunk| {
            Ok(DecodedFrame {
                bitmap: Bitmap::from_straight_rgba8(FRAME_SIZE, FRAME_SIZE, chunk.to_vec())?,
                duration_ms: 1000 / SAMPLE_FPS,
            })
        })
        .collect::<CollageResult<Vec<_>>>()?;
    FrameSequence::new(frames).ok_or_else(|| CollageError::decode("video produced no frames"))
}
