use std::path::Path;
use tracing::{debug, warn};

use crate::media::{AudioDecoder, FfmpegAudioDecoder};
use crate::notify::Notifier;
use crate::wav;

/// Decodes a media file's audio track and serializes it to a base64 WAV
/// payload.
///
/// Audio is an enhancement to the analysis, not a hard requirement: any
/// decode failure is reported through the notification side-channel and
/// the empty-string sentinel is returned so the pipeline continues in
/// video-only mode. This extractor never fails its caller.
pub struct AudioExtractor {
    decoder: Box<dyn AudioDecoder>,
}

impl AudioExtractor {
    pub fn new() -> Self {
        Self::with_decoder(Box::new(FfmpegAudioDecoder))
    }

    pub fn with_decoder(decoder: Box<dyn AudioDecoder>) -> Self {
        Self { decoder }
    }

    /// Decode the file's full audio track and WAV-encode it. Returns `""`
    /// when the track is missing or undecodable.
    pub async fn extract_audio(&self, path: &Path, notifier: &dyn Notifier) -> String {
        match self.decoder.decode(path).await {
            Ok(buffer) => {
                debug!(
                    "🎵 Audio decoded: {} ({} frames, {}Hz, {} channels)",
                    path.display(),
                    buffer.frame_count(),
                    buffer.sample_rate,
                    buffer.channels.len()
                );
                wav::encode_wav_base64(&buffer)
            }
            Err(e) => {
                warn!("Audio decode failed for {}: {}", path.display(), e);
                notifier.info(
                    "Audio could not be decoded. Analysis will continue with visual content only.",
                );
                String::new()
            }
        }
    }
}

impl Default for AudioExtractor {
    fn default() -> Self {
        Self::new()
    }
}
