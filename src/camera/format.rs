use serde::{Deserialize, Serialize};
use std::fmt;

/// Pixel encoding of the preview stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameEncoding {
    Mjpeg,
    Yuyv,
}

impl fmt::Display for FrameEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameEncoding::Mjpeg => write!(f, "MJPEG"),
            FrameEncoding::Yuyv => write!(f, "YUYV"),
        }
    }
}

/// Preview size and encoding requested from the camera
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PreviewFormat {
    pub width: u32,
    pub height: u32,
    pub encoding: FrameEncoding,
}

impl PreviewFormat {
    pub const fn new(width: u32, height: u32, encoding: FrameEncoding) -> Self {
        Self {
            width,
            height,
            encoding,
        }
    }

    /// 1280x720 MJPEG
    pub const fn hd_mjpeg() -> Self {
        Self::new(1280, 720, FrameEncoding::Mjpeg)
    }

    /// 640x480 YUYV, the default every UVC camera is expected to offer
    pub const fn uvc_default() -> Self {
        Self::new(640, 480, FrameEncoding::Yuyv)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Display for PreviewFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{} {}", self.width, self.height, self.encoding)
    }
}

/// Outcome of preview format negotiation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "format", rename_all = "snake_case")]
pub enum NegotiatedFormat {
    /// Camera accepted the configured primary format
    Primary(PreviewFormat),
    /// Primary was rejected, the fallback was accepted
    Fallback(PreviewFormat),
    /// Neither format was accepted; the camera keeps its own default
    Unconfigured,
}

impl NegotiatedFormat {
    pub fn format(&self) -> Option<PreviewFormat> {
        match self {
            NegotiatedFormat::Primary(format) | NegotiatedFormat::Fallback(format) => Some(*format),
            NegotiatedFormat::Unconfigured => None,
        }
    }
}

impl fmt::Display for NegotiatedFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NegotiatedFormat::Primary(format) => write!(f, "{}", format),
            NegotiatedFormat::Fallback(format) => write!(f, "{} (fallback)", format),
            NegotiatedFormat::Unconfigured => write!(f, "camera default"),
        }
    }
}
