//! Output encoders.
//!
//! Frame-based encoders (PNG, GIF) consume finished canvases; sinks consume frames in capture
//! order while the video recorder is running.

/// Video codec preference and negotiation.
pub mod codec;
/// `ffmpeg`-based capture sink (WebM output via system `ffmpeg`).
pub mod ffmpeg;
/// Looping animated-image encoder.
pub mod gif;
/// Single-frame raster export.
pub mod png;
/// Generic frame sink trait and built-in sinks.
pub mod sink;
