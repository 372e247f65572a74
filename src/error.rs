use std::fmt;
use thiserror::Error;

/// Result type alias for extraction operations
pub type Result<T> = std::result::Result<T, ExtractionError>;

/// Sub-reason for a media load failure, mirroring platform media-error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaLoadReason {
    /// Loading was aborted before the media could be opened
    Aborted,
    /// A network error occurred while fetching the media
    Network,
    /// The media could not be decoded
    Decode,
    /// The container or codec is not supported
    UnsupportedFormat,
}

impl fmt::Display for MediaLoadReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            MediaLoadReason::Aborted => "media loading was aborted",
            MediaLoadReason::Network => "a network error occurred while fetching the media",
            MediaLoadReason::Decode => "the media could not be decoded",
            MediaLoadReason::UnsupportedFormat => "the media format is not supported",
        };
        f.write_str(msg)
    }
}

/// Errors raised by the frame sampling and batch extraction pipeline.
///
/// Audio decode failures are deliberately absent: the audio extractor
/// degrades to an empty payload instead of failing its caller.
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("failed to load video: {reason} ({detail})")]
    MediaLoad {
        reason: MediaLoadReason,
        detail: String,
    },

    #[error("no frames could be extracted; the video may be too short or corrupted")]
    NoFramesExtracted,

    #[error("seek timed out at {timestamp:.2}s; the video may be corrupted")]
    SeekTimeout { timestamp: f64 },

    #[error("frame encoding failed: {0}")]
    FrameEncode(#[from] image::ImageError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ExtractionError {
    pub fn media_load(reason: MediaLoadReason, detail: impl Into<String>) -> Self {
        ExtractionError::MediaLoad {
            reason,
            detail: detail.into(),
        }
    }
}
