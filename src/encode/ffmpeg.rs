use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::OnceLock;
use std::thread::JoinHandle;

use crate::encode::codec::{CodecSupport, VideoCodec};
use crate::encode::sink::{FrameSink, SinkConfig};
use crate::foundation::core::CanvasFrame;
use crate::foundation::error::{CollageError, CollageResult};
use crate::foundation::math::flatten_to_opaque_rgba8;

/// Options for [`FfmpegSink`].
#[derive(Clone, Debug)]
pub struct FfmpegSinkOpts {
    pub codec: VideoCodec,
    pub bitrate_bps: u64,
    /// Fill behind transparent canvas pixels (straight RGBA8).
    pub bg_rgba: [u8; 4],
}

/// WebM capture through the system `ffmpeg`.
///
/// Frames are written to the child's stdin as opaque RGBA8; `end` waits for the muxer and
/// hands back the finished container.
pub struct FfmpegSink {
    opts: FfmpegSinkOpts,
    webm: TempFileGuard,
    encoder: Option<Encoder>,
    opaque: Vec<u8>,
    next_idx: u64,
}

struct Encoder {
    cfg: SinkConfig,
    child: Child,
    stdin: Option<ChildStdin>,
    log: JoinHandle<std::io::Result<Vec<u8>>>,
}

impl Encoder {
    fn spawn(cfg: SinkConfig, mut cmd: Command) -> CollageResult<Self> {
        let mut child = cmd
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                CollageError::recording_unsupported(format!("could not start ffmpeg: {e}"))
            })?;

        let (Some(stdin), Some(mut stderr)) = (child.stdin.take(), child.stderr.take()) else {
            let _ = child.kill();
            return Err(CollageError::encode("ffmpeg pipes unavailable"));
        };
        let log = std::thread::spawn(move || {
            let mut buf = Vec::new();
            stderr.read_to_end(&mut buf).map(|_| buf)
        });

        Ok(Self {
            cfg,
            child,
            stdin: Some(stdin),
            log,
        })
    }

    fn write(&mut self, rgba: &[u8]) -> CollageResult<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| CollageError::encode("capture already closed"))?;
        stdin
            .write_all(rgba)
            .map_err(|e| CollageError::encode(format!("ffmpeg stopped accepting frames: {e}")))
    }

    /// Stop an unfinished capture and reap the child.
    fn abort(mut self) {
        self.stdin = None;
        if let Err(e) = self.child.kill() {
            tracing::debug!(error = %e, "ffmpeg already exited");
        }
        if let Err(e) = self.child.wait() {
            tracing::debug!(error = %e, "reaping ffmpeg failed");
        }
    }

    fn finish(mut self) -> CollageResult<()> {
        // EOF on stdin lets ffmpeg flush and write the cues.
        self.stdin = None;
        let status = self
            .child
            .wait()
            .map_err(|e| CollageError::encode(format!("ffmpeg wait: {e}")))?;
        let log = match self.log.join() {
            Ok(Ok(bytes)) => String::from_utf8_lossy(&bytes).trim().to_owned(),
            Ok(Err(e)) => format!("<stderr unreadable: {e}>"),
            Err(_) => String::from("<stderr reader panicked>"),
        };
        if status.success() {
            if !log.is_empty() {
                tracing::debug!(%log, "ffmpeg finished with output");
            }
            Ok(())
        } else {
            Err(CollageError::encode(format!("ffmpeg failed ({status}): {log}")))
        }
    }
}

impl FfmpegSink {
    pub fn new(opts: FfmpegSinkOpts) -> Self {
        let webm = TempFileGuard(Some(scratch_path(
            "nodes_collage_capture",
            opts.codec.file_extension(),
        )));
        Self {
            opts,
            webm,
            encoder: None,
            opaque: Vec::new(),
            next_idx: 0,
        }
    }
}

/// Command line for raw RGBA on stdin muxed into WebM at `out`.
fn capture_args(cfg: SinkConfig, opts: &FfmpegSinkOpts, out: &Path) -> Vec<String> {
    let mut args: Vec<String> = [
        "-y",
        "-loglevel",
        "error",
        "-f",
        "rawvideo",
        "-pix_fmt",
        "rgba",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    args.push("-video_size".into());
    args.push(format!("{}x{}", cfg.width, cfg.height));
    args.push("-framerate".into());
    args.push(cfg.fps.to_string());
    args.extend(["-i", "pipe:0", "-an"].map(String::from));
    if let Some(encoder) = opts.codec.ffmpeg_encoder() {
        args.push("-c:v".into());
        args.push(encoder.into());
    }
    args.push("-b:v".into());
    args.push(opts.bitrate_bps.to_string());
    args.extend(["-pix_fmt", "yuv420p", "-f", "webm"].map(String::from));
    args.push(out.to_string_lossy().into_owned());
    args
}

impl FrameSink for FfmpegSink {
    fn begin(&mut self, cfg: SinkConfig) -> CollageResult<()> {
        if cfg.fps == 0 || cfg.width == 0 || cfg.height == 0 {
            return Err(CollageError::validation(format!(
                "capture needs a non-empty canvas and frame rate, got {}x{} @ {}",
                cfg.width, cfg.height, cfg.fps
            )));
        }
        // yuv420p subsamples chroma 2x2.
        if cfg.width % 2 != 0 || cfg.height % 2 != 0 {
            return Err(CollageError::validation(format!(
                "capture canvas {}x{} must have even sides",
                cfg.width, cfg.height
            )));
        }
        if !is_ffmpeg_on_path() {
            return Err(CollageError::recording_unsupported(
                "video capture needs ffmpeg on PATH",
            ));
        }
        let out = self
            .webm
            .path()
            .ok_or_else(|| CollageError::encode("capture file already released"))?;

        let args = capture_args(cfg, &self.opts, out);
        tracing::debug!(?args, "starting ffmpeg capture");
        if let Some(stale) = self.encoder.take() {
            stale.abort();
        }
        let mut cmd = Command::new("ffmpeg");
        cmd.args(&args);
        self.encoder = Some(Encoder::spawn(cfg, cmd)?);
        self.opaque = vec![0u8; cfg.width as usize * cfg.height as usize * 4];
        self.next_idx = 0;
        Ok(())
    }

    fn push_frame(&mut self, idx: u64, frame: &CanvasFrame) -> CollageResult<()> {
        let encoder = self
            .encoder
            .as_mut()
            .ok_or_else(|| CollageError::encode("capture not started"))?;
        if idx < self.next_idx {
            return Err(CollageError::encode(format!(
                "capture index {idx} arrived after {}",
                self.next_idx - 1
            )));
        }
        if (frame.width, frame.height) != (encoder.cfg.width, encoder.cfg.height) {
            return Err(CollageError::validation(format!(
                "canvas changed size mid-capture: {}x{} vs {}x{}",
                frame.width, frame.height, encoder.cfg.width, encoder.cfg.height
            )));
        }
        if !flatten_to_opaque_rgba8(&mut self.opaque, &frame.data, self.opts.bg_rgba) {
            return Err(CollageError::validation("canvas buffer is not width*height*4"));
        }
        encoder.write(&self.opaque)?;
        self.next_idx = idx + 1;
        Ok(())
    }

    fn end(&mut self) -> CollageResult<Vec<u8>> {
        let encoder = self
            .encoder
            .take()
            .ok_or_else(|| CollageError::encode("capture not started"))?;
        encoder.finish()?;

        let path = self
            .webm
            .path()
            .ok_or_else(|| CollageError::encode("capture file already released"))?;
        std::fs::read(path)
            .map_err(|e| CollageError::encode(format!("read {}: {e}", path.display())))
    }
}

impl Drop for FfmpegSink {
    fn drop(&mut self) {
        if let Some(encoder) = self.encoder.take() {
            tracing::debug!("capture dropped before end, stopping ffmpeg");
            encoder.abort();
        }
    }
}

/// Encoder availability from `ffmpeg -encoders`, probed once per process.
#[derive(Clone, Copy, Debug, Default)]
pub struct FfmpegCodecSupport;

impl CodecSupport for FfmpegCodecSupport {
    fn is_supported(&self, codec: VideoCodec) -> bool {
        let Some(listing) = encoder_listing() else {
            return false;
        };
        match codec.ffmpeg_encoder() {
            Some(name) => encoder_listed(listing, name),
            // The webm muxer picks libvpx-vp9 or libvpx on its own.
            None => ["libvpx-vp9", "libvpx"]
                .iter()
                .any(|name| encoder_listed(listing, name)),
        }
    }
}

fn encoder_listing() -> Option<&'static str> {
    static LISTING: OnceLock<Option<String>> = OnceLock::new();
    LISTING
        .get_or_init(|| {
            let out = Command::new("ffmpeg")
                .args(["-hide_banner", "-encoders"])
                .stdin(Stdio::null())
                .stderr(Stdio::null())
                .output()
                .ok()
                .filter(|out| out.status.success())?;
            String::from_utf8(out.stdout).ok()
        })
        .as_deref()
}

/// Lines look like ` V....D libvpx-vp9           libvpx VP9`.
fn encoder_listed(listing: &str, name: &str) -> bool {
    listing
        .lines()
        .any(|line| line.split_whitespace().nth(1) == Some(name))
}

pub fn is_ffmpeg_on_path() -> bool {
    static FOUND: OnceLock<bool> = OnceLock::new();
    *FOUND.get_or_init(|| {
        Command::new("ffmpeg")
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .is_ok_and(|s| s.success())
    })
}

/// `<tmp>/<prefix>_<pid>_<nanos>.<ext>`
pub(crate) fn scratch_path(prefix: &str, ext: &str) -> PathBuf {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0, |d| d.as_nanos());
    std::env::temp_dir().join(format!("{prefix}_{}_{nanos}.{ext}", std::process::id()))
}

/// Deletes the wrapped file when dropped.
pub(crate) struct TempFileGuard(pub(crate) Option<PathBuf>);

impl TempFileGuard {
    pub(crate) fn path(&self) -> Option<&Path> {
        self.0.as_deref()
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if let Some(path) = self.0.take() {
            let _ = std::fs::remove_file(path);
        }
    }
}
