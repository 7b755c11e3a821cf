use serde::{Deserialize, Serialize};

use crate::foundation::error::{CollageError, CollageResult};

/// Container/codec pairs the recorder can capture into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoCodec {
    Vp9Webm,
    Vp8Webm,
    /// WebM with whatever video encoder the runtime picks.
    Webm,
}

impl VideoCodec {
    /// Most compatible first.
    pub const PREFERENCE: [VideoCodec; 3] = [Self::Vp9Webm, Self::Vp8Webm, Self::Webm];

    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Vp9Webm => "video/webm;codecs=vp9",
            Self::Vp8Webm => "video/webm;codecs=vp8",
            Self::Webm => "video/webm",
        }
    }

    pub fn file_extension(self) -> &'static str {
        "webm"
    }

    /// `ffmpeg` encoder name, `None` when the muxer default is used.
    pub fn ffmpeg_encoder(self) -> Option<&'static str> {
        match self {
            Self::Vp9Webm => Some("libvpx-vp9"),
            Self::Vp8Webm => Some("libvpx"),
            Self::Webm => None,
        }
    }
}

/// Runtime capability query used during codec negotiation.
pub trait CodecSupport {
    fn is_supported(&self, codec: VideoCodec) -> bool;
}

/// Pick the first codec in `preference` the runtime supports.
pub fn negotiate_codec(
    preference: &[VideoCodec],
    support: &dyn CodecSupport,
) -> CollageResult<VideoCodec> {
    for &codec in preference {
        if support.is_supported(codec) {
            tracing::debug!(mime = codec.mime_type(), "negotiated video codec");
            return Ok(codec);
        }
        tracing::debug!(mime = codec.mime_type(), "video codec unsupported, trying next");
    }
    Err(CollageError::recording_unsupported(
        "no codec in the preference list is supported by the capture backend",
    ))
}
