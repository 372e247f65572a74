use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::ImageEncoder;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::ExtractionConfig;
use crate::error::{ExtractionError, Result};
use crate::media::{MediaSource, RawFrame};

/// Ordered JPEG frame payloads sampled from one video, chronological order,
/// plus the source's fixed pixel dimensions. Length is always ≥ 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameSequence {
    /// Base64 JPEG payloads, no data-URL prefix
    pub frames: Vec<String>,
    pub width: u32,
    pub height: u32,
}

/// Samples one JPEG frame per interval tick from a video timeline.
///
/// Seeks are strictly sequential: a media source exposes one decode
/// position at a time, so frame `i` is fully rasterized before the seek
/// for frame `i+1` begins.
#[derive(Debug, Clone)]
pub struct FrameSampler {
    interval: f64,
    seek_timeout: Duration,
    jpeg_quality: u8,
}

impl FrameSampler {
    pub fn new(interval: f64, seek_timeout: Duration, jpeg_quality: u8) -> Self {
        Self {
            interval,
            seek_timeout,
            jpeg_quality,
        }
    }

    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self::new(
            config.frame_interval_secs,
            Duration::from_secs(config.seek_timeout_secs),
            config.jpeg_quality,
        )
    }

    /// Extract one frame per interval tick, reporting per-frame progress in
    /// [0, 100]. The source's resource handle is released exactly once,
    /// whether extraction succeeds or fails.
    pub async fn extract_frames<F>(
        &self,
        source: &mut dyn MediaSource,
        on_progress: F,
    ) -> Result<FrameSequence>
    where
        F: FnMut(f64) + Send,
    {
        let result = self.sample(source, on_progress).await;
        source.release();
        result
    }

    async fn sample<F>(&self, source: &mut dyn MediaSource, mut on_progress: F) -> Result<FrameSequence>
    where
        F: FnMut(f64) + Send,
    {
        let metadata = source.load_metadata().await?;

        let duration = match metadata.duration {
            Some(d) if d.is_finite() && d > 0.0 => d,
            // Some containers report no usable duration until the decoder
            // is forced to the end of the stream. A failed probe leaves
            // the duration at zero and falls through to NoFramesExtracted.
            _ => match source.probe_duration().await {
                Ok(d) => {
                    debug!("Duration probe resolved {:.2}s", d);
                    d
                }
                Err(e) => {
                    warn!("Duration probe failed: {}", e);
                    0.0
                }
            },
        };

        let total_frames = (duration / self.interval).floor() as i64;
        if total_frames <= 0 {
            return Err(ExtractionError::NoFramesExtracted);
        }

        let mut frames = Vec::with_capacity(total_frames as usize);
        for i in 0..total_frames {
            let timestamp = i as f64 * self.interval;

            match tokio::time::timeout(self.seek_timeout, source.seek(timestamp)).await {
                Ok(result) => result?,
                Err(_) => return Err(ExtractionError::SeekTimeout { timestamp }),
            }

            let frame = source.capture_frame().await?;
            frames.push(encode_frame_jpeg(&frame, self.jpeg_quality)?);
            on_progress((i + 1) as f64 / total_frames as f64 * 100.0);
        }

        Ok(FrameSequence {
            frames,
            width: metadata.width,
            height: metadata.height,
        })
    }
}

/// JPEG-encode a raw frame at the given quality and base64 the bytes
pub fn encode_frame_jpeg(frame: &RawFrame, quality: u8) -> Result<String> {
    let mut jpeg = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut jpeg, quality);
    encoder.write_image(
        &frame.pixels,
        frame.width,
        frame.height,
        image::ExtendedColorType::Rgb8,
    )?;
    Ok(BASE64.encode(&jpeg))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MediaLoadReason;
    use crate::media::mock::MockSource;

    fn sampler() -> FrameSampler {
        FrameSampler::new(1.0, Duration::from_secs(5), 80)
    }

    #[tokio::test]
    async fn test_frame_count_matches_floor_of_duration() {
        let mut source = MockSource::new(Some(10.0), 64, 48);
        let sequence = sampler().extract_frames(&mut source, |_| {}).await.unwrap();

        assert_eq!(sequence.frames.len(), 10);
        assert_eq!(sequence.width, 64);
        assert_eq!(sequence.height, 48);
        assert_eq!(source.seeks, (0..10).map(|i| i as f64).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_fractional_duration_rounds_down() {
        let mut source = MockSource::new(Some(3.9), 64, 48);
        let sequence = sampler().extract_frames(&mut source, |_| {}).await.unwrap();
        assert_eq!(sequence.frames.len(), 3);
    }

    #[tokio::test]
    async fn test_frames_decode_to_source_resolution() {
        let mut source = MockSource::new(Some(2.0), 64, 48);
        let sequence = sampler().extract_frames(&mut source, |_| {}).await.unwrap();

        for frame in &sequence.frames {
            let bytes = BASE64.decode(frame).unwrap();
            let decoded = image::load_from_memory(&bytes).unwrap();
            assert_eq!(decoded.width(), 64);
            assert_eq!(decoded.height(), 48);
        }
    }

    #[tokio::test]
    async fn test_progress_is_monotonic_and_ends_at_100() {
        let mut source = MockSource::new(Some(8.0), 32, 32);
        let mut reported = Vec::new();
        sampler()
            .extract_frames(&mut source, |p| reported.push(p))
            .await
            .unwrap();

        assert_eq!(reported.len(), 8);
        assert!(reported.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(*reported.last().unwrap(), 100.0);
    }

    #[tokio::test]
    async fn test_too_short_video_yields_no_frames_error() {
        let mut source = MockSource::new(Some(0.5), 32, 32);
        let err = sampler().extract_frames(&mut source, |_| {}).await.unwrap_err();
        assert!(matches!(err, ExtractionError::NoFramesExtracted));
        assert_eq!(source.release_count(), 1);
    }

    #[tokio::test]
    async fn test_unreported_duration_recovered_by_probe() {
        let mut source = MockSource::new(None, 32, 32);
        source.probe_result = Some(3.0);
        let sequence = sampler().extract_frames(&mut source, |_| {}).await.unwrap();
        assert_eq!(sequence.frames.len(), 3);
    }

    #[tokio::test]
    async fn test_zero_duration_and_failed_probe_reject() {
        let mut source = MockSource::new(None, 32, 32);
        let err = sampler().extract_frames(&mut source, |_| {}).await.unwrap_err();
        assert!(matches!(err, ExtractionError::NoFramesExtracted));
        assert_eq!(source.release_count(), 1);
    }

    #[tokio::test]
    async fn test_load_failure_propagates_and_releases() {
        let mut source = MockSource::new(Some(5.0), 32, 32);
        source.load_failure = Some(MediaLoadReason::UnsupportedFormat);
        let err = sampler().extract_frames(&mut source, |_| {}).await.unwrap_err();
        assert!(matches!(
            err,
            ExtractionError::MediaLoad {
                reason: MediaLoadReason::UnsupportedFormat,
                ..
            }
        ));
        assert_eq!(source.release_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_seek_times_out_with_timestamp() {
        let mut source = MockSource::new(Some(5.0), 32, 32);
        source.seek_delay = Some(Duration::from_secs(6));
        let err = sampler().extract_frames(&mut source, |_| {}).await.unwrap_err();
        match err {
            ExtractionError::SeekTimeout { timestamp } => assert_eq!(timestamp, 0.0),
            other => panic!("expected SeekTimeout, got {:?}", other),
        }
        assert_eq!(source.release_count(), 1);
    }

    #[tokio::test]
    async fn test_release_happens_exactly_once_on_success() {
        let mut source = MockSource::new(Some(2.0), 32, 32);
        sampler().extract_frames(&mut source, |_| {}).await.unwrap();
        assert_eq!(source.release_count(), 1);
    }
}
