/// AdLens - Video Ad Creative Analyzer
///
/// High-performance extraction pipeline for video ad creatives: samples
/// JPEG frames and decodes audio to WAV from uploaded ads, then hands the
/// merged payload to a hosted generative-AI scoring backend.

pub mod analysis;
pub mod audio;
pub mod config;
pub mod error;
pub mod frames;
pub mod media;
pub mod notify;
pub mod processing;
pub mod wav;

// Re-export main types for easy access
pub use crate::analysis::{
    AnalysisBackend, AnalysisContext, AnalysisRequest, AnalysisResponse, HttpAnalysisBackend,
    Platform,
};
pub use crate::audio::AudioExtractor;
pub use crate::config::{Config, ConfigBuilder};
pub use crate::error::{ExtractionError, MediaLoadReason};
pub use crate::frames::{FrameSampler, FrameSequence};
pub use crate::media::{
    discover_videos, image_to_base64, AudioBuffer, AudioDecoder, FfmpegAudioDecoder, FfmpegOpener,
    FfmpegSource, MediaMetadata, MediaOpener, MediaSource, RawFrame,
};
pub use crate::notify::{LogNotifier, MemoryNotifier, NoticeLevel, Notifier};
pub use crate::processing::{
    BatchExtractor, ExtractionPhase, ExtractionReport, FileExtraction, ProgressEvent,
};
