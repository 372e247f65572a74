use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::error::{ExtractionError, MediaLoadReason, Result};

/// Metadata reported by a media container on load
#[derive(Debug, Clone)]
pub struct MediaMetadata {
    pub width: u32,
    pub height: u32,
    /// Container-reported duration in seconds. `None` when the container
    /// reports a non-finite or zero duration (streamed/fragmented files);
    /// callers must fall back to `probe_duration`.
    pub duration: Option<f64>,
    pub has_audio: bool,
    pub sample_rate: u32,
    pub channels: u16,
    pub format: String,
}

/// A single decoded video frame, tightly packed RGB24
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

/// Decoded multi-channel audio at native rate, floating-point samples in [-1, 1]
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    pub sample_rate: u32,
    pub channels: Vec<Vec<f32>>,
}

impl AudioBuffer {
    /// Number of sample frames (samples per channel)
    pub fn frame_count(&self) -> usize {
        self.channels.first().map(|c| c.len()).unwrap_or(0)
    }
}

/// A stateful, seekable video decode handle.
///
/// A source exposes exactly one decode position at a time, so seeks must be
/// issued sequentially: `seek` settles the decoder on the frame at the
/// requested timestamp, and `capture_frame` rasterizes that frame. Callers
/// own the release of the underlying resource handle and must call
/// `release` exactly once after the extraction settles, success or failure.
#[async_trait]
pub trait MediaSource: Send {
    /// Open the container and read its reported metadata (no playback)
    async fn load_metadata(&mut self) -> Result<MediaMetadata>;

    /// Settle the decoder on the frame at `timestamp` seconds. Resolves
    /// once the frame is fully decoded.
    async fn seek(&mut self, timestamp: f64) -> Result<()>;

    /// Rasterize the currently-settled frame at native resolution
    async fn capture_frame(&mut self) -> Result<RawFrame>;

    /// Force the decoder to the end of the stream and report the resolved
    /// duration, for containers whose metadata omits it.
    async fn probe_duration(&mut self) -> Result<f64>;

    /// Release the underlying resource handle. Idempotent.
    fn release(&mut self);
}

/// Factory seam for the orchestrator: opens a `MediaSource` per input
#[async_trait]
pub trait MediaOpener: Send + Sync {
    async fn open(&self, input: &str) -> Result<Box<dyn MediaSource>>;
}

/// Decodes a file's full audio track into raw samples
#[async_trait]
pub trait AudioDecoder: Send + Sync {
    async fn decode(&self, path: &Path) -> Result<AudioBuffer>;
}

/// A resolved media input: a local file, or a remote resource staged into
/// a temporary file for the decoder. Dropping the staged file is the
/// release of the resource handle.
#[derive(Debug)]
pub struct MediaResource {
    path: PathBuf,
    staged: Option<NamedTempFile>,
}

impl MediaResource {
    /// Resolve an input string to a decodable local path. `http(s)` inputs
    /// are streamed to a temporary file.
    pub async fn resolve(input: &str) -> Result<Self> {
        if input.starts_with("http://") || input.starts_with("https://") {
            debug!("Staging remote media input: {}", input);
            let mut response = reqwest::get(input)
                .await
                .map_err(|e| ExtractionError::media_load(MediaLoadReason::Network, e.to_string()))?;

            if !response.status().is_success() {
                return Err(ExtractionError::media_load(
                    MediaLoadReason::Network,
                    format!("HTTP {} for {}", response.status(), input),
                ));
            }

            let mut staged = NamedTempFile::new()?;
            while let Some(chunk) = response
                .chunk()
                .await
                .map_err(|e| ExtractionError::media_load(MediaLoadReason::Network, e.to_string()))?
            {
                staged.write_all(&chunk)?;
            }
            staged.flush()?;

            Ok(Self {
                path: staged.path().to_path_buf(),
                staged: Some(staged),
            })
        } else {
            Ok(Self {
                path: PathBuf::from(input),
                staged: None,
            })
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the staged file, if any. Safe to call more than once, but
    /// the handle is freed only on the first call.
    pub fn release(&mut self) {
        if let Some(staged) = self.staged.take() {
            debug!("Releasing staged media file: {}", staged.path().display());
            drop(staged);
        }
    }
}

/// FFmpeg-backed video decode source.
///
/// Metadata comes from ffprobe; each seek runs a bounded single-frame
/// decode producing rawvideo RGB24 on stdout. The duration probe decodes
/// the stream to its end and reads the final timestamp.
pub struct FfmpegSource {
    resource: MediaResource,
    metadata: Option<MediaMetadata>,
    settled_frame: Option<RawFrame>,
}

impl FfmpegSource {
    pub async fn open(input: &str) -> Result<Self> {
        let resource = MediaResource::resolve(input).await?;
        Ok(Self {
            resource,
            metadata: None,
            settled_frame: None,
        })
    }

    fn loaded_metadata(&self) -> Result<&MediaMetadata> {
        self.metadata.as_ref().ok_or_else(|| {
            ExtractionError::media_load(MediaLoadReason::Decode, "metadata not loaded before seek")
        })
    }
}

#[async_trait]
impl MediaSource for FfmpegSource {
    async fn load_metadata(&mut self) -> Result<MediaMetadata> {
        let path = self.resource.path().to_path_buf();
        let output = tokio::process::Command::new("ffprobe")
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(&path)
            .output()
            .await?;

        if !output.status.success() {
            return Err(ExtractionError::media_load(
                MediaLoadReason::UnsupportedFormat,
                format!("ffprobe failed for {}", path.display()),
            ));
        }

        let probe: serde_json::Value = serde_json::from_slice(&output.stdout)
            .map_err(|e| ExtractionError::media_load(MediaLoadReason::Decode, e.to_string()))?;

        let streams = probe["streams"].as_array().cloned().unwrap_or_default();
        let video_stream = streams
            .iter()
            .find(|s| s["codec_type"] == "video")
            .ok_or_else(|| {
                ExtractionError::media_load(MediaLoadReason::Decode, "no video stream found")
            })?;

        let audio_stream = streams.iter().find(|s| s["codec_type"] == "audio");

        let duration = probe["format"]["duration"]
            .as_str()
            .and_then(|s| s.parse::<f64>().ok())
            .filter(|d| d.is_finite() && *d > 0.0);

        let metadata = MediaMetadata {
            width: video_stream["width"].as_u64().unwrap_or(0) as u32,
            height: video_stream["height"].as_u64().unwrap_or(0) as u32,
            duration,
            has_audio: audio_stream.is_some(),
            sample_rate: audio_stream
                .and_then(|s| s["sample_rate"].as_str())
                .and_then(|s| s.parse().ok())
                .unwrap_or(44100),
            channels: audio_stream
                .and_then(|s| s["channels"].as_u64())
                .unwrap_or(0) as u16,
            format: probe["format"]["format_name"]
                .as_str()
                .unwrap_or("unknown")
                .to_string(),
        };

        if metadata.width == 0 || metadata.height == 0 {
            return Err(ExtractionError::media_load(
                MediaLoadReason::Decode,
                "video stream reports zero dimensions",
            ));
        }

        info!(
            "📹 Loaded media: {} ({}x{}, {})",
            path.display(),
            metadata.width,
            metadata.height,
            metadata
                .duration
                .map(|d| format!("{:.1}s", d))
                .unwrap_or_else(|| "unknown duration".to_string()),
        );

        self.metadata = Some(metadata.clone());
        Ok(metadata)
    }

    async fn seek(&mut self, timestamp: f64) -> Result<()> {
        let (width, height) = {
            let meta = self.loaded_metadata()?;
            (meta.width, meta.height)
        };
        let path = self.resource.path().to_path_buf();

        let output = tokio::process::Command::new("ffmpeg")
            .args(["-v", "error", "-i"])
            .arg(&path)
            .args([
                "-ss",
                &format!("{:.3}", timestamp),
                "-frames:v",
                "1",
                "-f",
                "rawvideo",
                "-pix_fmt",
                "rgb24",
                "-",
            ])
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            return Err(ExtractionError::media_load(
                MediaLoadReason::Decode,
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        let expected = width as usize * height as usize * 3;
        if output.stdout.len() < expected {
            return Err(ExtractionError::media_load(
                MediaLoadReason::Decode,
                format!("decoder produced no frame at {:.2}s", timestamp),
            ));
        }

        self.settled_frame = Some(RawFrame {
            width,
            height,
            pixels: output.stdout[..expected].to_vec(),
        });
        Ok(())
    }

    async fn capture_frame(&mut self) -> Result<RawFrame> {
        self.settled_frame.clone().ok_or_else(|| {
            ExtractionError::media_load(MediaLoadReason::Decode, "no frame settled before capture")
        })
    }

    async fn probe_duration(&mut self) -> Result<f64> {
        let path = self.resource.path().to_path_buf();
        debug!("Probing duration by decoding to end: {}", path.display());

        let output = tokio::process::Command::new("ffmpeg")
            .arg("-i")
            .arg(&path)
            .args(["-f", "null", "-"])
            .kill_on_drop(true)
            .output()
            .await?;

        // ffmpeg reports decode progress on stderr regardless of exit status
        let stderr = String::from_utf8_lossy(&output.stderr);
        parse_final_decode_time(&stderr).ok_or_else(|| {
            ExtractionError::media_load(
                MediaLoadReason::Decode,
                format!("could not resolve duration for {}", path.display()),
            )
        })
    }

    fn release(&mut self) {
        self.settled_frame = None;
        self.resource.release();
    }
}

/// Default opener producing ffmpeg-backed sources
#[derive(Debug, Default, Clone)]
pub struct FfmpegOpener;

#[async_trait]
impl MediaOpener for FfmpegOpener {
    async fn open(&self, input: &str) -> Result<Box<dyn MediaSource>> {
        Ok(Box::new(FfmpegSource::open(input).await?))
    }
}

/// FFmpeg-backed full-track audio decode at native rate and channel count
#[derive(Debug, Default, Clone)]
pub struct FfmpegAudioDecoder;

#[async_trait]
impl AudioDecoder for FfmpegAudioDecoder {
    async fn decode(&self, path: &Path) -> Result<AudioBuffer> {
        let probe = tokio::process::Command::new("ffprobe")
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_streams",
                "-select_streams",
                "a:0",
            ])
            .arg(path)
            .output()
            .await?;

        if !probe.status.success() {
            return Err(ExtractionError::media_load(
                MediaLoadReason::UnsupportedFormat,
                format!("ffprobe failed for {}", path.display()),
            ));
        }

        let probe_data: serde_json::Value = serde_json::from_slice(&probe.stdout)
            .map_err(|e| ExtractionError::media_load(MediaLoadReason::Decode, e.to_string()))?;
        let stream = probe_data["streams"]
            .as_array()
            .and_then(|s| s.first())
            .cloned()
            .ok_or_else(|| {
                ExtractionError::media_load(MediaLoadReason::Decode, "no audio stream found")
            })?;

        let sample_rate: u32 = stream["sample_rate"]
            .as_str()
            .and_then(|s| s.parse().ok())
            .unwrap_or(44100);
        let channel_count = stream["channels"].as_u64().unwrap_or(0) as usize;
        if channel_count == 0 {
            return Err(ExtractionError::media_load(
                MediaLoadReason::Decode,
                "audio stream reports zero channels",
            ));
        }

        let output = tokio::process::Command::new("ffmpeg")
            .args(["-v", "error", "-i"])
            .arg(path)
            .args(["-vn", "-acodec", "pcm_f32le", "-f", "f32le", "-"])
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            return Err(ExtractionError::media_load(
                MediaLoadReason::Decode,
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        let samples: Vec<f32> = output
            .stdout
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes(b.try_into().unwrap()))
            .collect();

        let frame_count = samples.len() / channel_count;
        let mut channels = vec![Vec::with_capacity(frame_count); channel_count];
        for frame in samples.chunks_exact(channel_count) {
            for (channel, sample) in frame.iter().enumerate() {
                channels[channel].push(*sample);
            }
        }

        debug!(
            "🎵 Decoded audio: {} frames, {}Hz, {} channels",
            frame_count, sample_rate, channel_count
        );

        Ok(AudioBuffer {
            sample_rate,
            channels,
        })
    }
}

/// Parse the final `time=HH:MM:SS.cc` decode timestamp from ffmpeg stderr
fn parse_final_decode_time(stderr: &str) -> Option<f64> {
    let mut last = None;
    for part in stderr.split("time=").skip(1) {
        let token: String = part
            .chars()
            .take_while(|c| c.is_ascii_digit() || *c == ':' || *c == '.')
            .collect();
        if let Some(seconds) = parse_clock_time(&token) {
            last = Some(seconds);
        }
    }
    last.filter(|d| d.is_finite() && *d > 0.0)
}

fn parse_clock_time(token: &str) -> Option<f64> {
    let mut fields = token.split(':').rev();
    let seconds: f64 = fields.next()?.parse().ok()?;
    let minutes: f64 = fields.next().map_or(Some(0.0), |m| m.parse().ok())?;
    let hours: f64 = fields.next().map_or(Some(0.0), |h| h.parse().ok())?;
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}

/// Video containers the pipeline accepts
pub const SUPPORTED_EXTENSIONS: [&str; 6] = ["mp4", "mkv", "avi", "mov", "webm", "m4v"];

/// Discover all video files in a directory recursively
pub async fn discover_videos(dir: &Path) -> Result<Vec<PathBuf>> {
    use std::future::Future;
    use std::pin::Pin;

    fn discover_recursive(dir: &Path) -> Pin<Box<dyn Future<Output = Result<Vec<PathBuf>>> + Send + '_>> {
        Box::pin(async move {
            let mut videos = Vec::new();
            let mut entries = tokio::fs::read_dir(dir).await?;

            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if path.is_dir() {
                    let mut sub_videos = discover_recursive(&path).await?;
                    videos.append(&mut sub_videos);
                } else if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
                    if SUPPORTED_EXTENSIONS.contains(&ext.to_lowercase().as_str()) {
                        videos.push(path);
                    }
                }
            }

            videos.sort();
            Ok(videos)
        })
    }

    let videos = discover_recursive(dir).await?;
    if videos.is_empty() {
        warn!("No videos found in {}", dir.display());
    }
    Ok(videos)
}

/// Read a plain image file into a base64 payload, for the results-image
/// ingestion workflow (no frame sampling involved).
pub async fn image_to_base64(path: &Path) -> Result<String> {
    let bytes = tokio::fs::read(path).await?;
    Ok(BASE64.encode(bytes))
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Scripted media source for pipeline tests
    pub struct MockSource {
        pub metadata: MediaMetadata,
        pub load_failure: Option<MediaLoadReason>,
        /// What the duration probe resolves to; `None` makes the probe fail
        pub probe_result: Option<f64>,
        pub seek_delay: Option<Duration>,
        pub released: Arc<AtomicUsize>,
        pub seeks: Vec<f64>,
    }

    impl MockSource {
        pub fn new(duration: Option<f64>, width: u32, height: u32) -> Self {
            Self {
                metadata: MediaMetadata {
                    width,
                    height,
                    duration,
                    has_audio: true,
                    sample_rate: 44100,
                    channels: 2,
                    format: "mock".to_string(),
                },
                load_failure: None,
                probe_result: None,
                seek_delay: None,
                released: Arc::new(AtomicUsize::new(0)),
                seeks: Vec::new(),
            }
        }

        pub fn release_count(&self) -> usize {
            self.released.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl MediaSource for MockSource {
        async fn load_metadata(&mut self) -> Result<MediaMetadata> {
            if let Some(reason) = self.load_failure {
                return Err(ExtractionError::media_load(reason, "scripted failure"));
            }
            Ok(self.metadata.clone())
        }

        async fn seek(&mut self, timestamp: f64) -> Result<()> {
            if let Some(delay) = self.seek_delay {
                tokio::time::sleep(delay).await;
            }
            self.seeks.push(timestamp);
            Ok(())
        }

        async fn capture_frame(&mut self) -> Result<RawFrame> {
            let len = (self.metadata.width * self.metadata.height * 3) as usize;
            Ok(RawFrame {
                width: self.metadata.width,
                height: self.metadata.height,
                pixels: vec![128; len],
            })
        }

        async fn probe_duration(&mut self) -> Result<f64> {
            self.probe_result.ok_or_else(|| {
                ExtractionError::media_load(MediaLoadReason::Decode, "probe failed")
            })
        }

        fn release(&mut self) {
            self.released.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Opener handing out scripted sources keyed by input name
    #[derive(Default)]
    pub struct MockOpener {
        durations: HashMap<String, Option<f64>>,
        pub opened: Arc<Mutex<Vec<String>>>,
        pub released: Arc<AtomicUsize>,
    }

    impl MockOpener {
        pub fn new(durations: &[(&str, Option<f64>)]) -> Self {
            Self {
                durations: durations
                    .iter()
                    .map(|(k, v)| (k.to_string(), *v))
                    .collect(),
                opened: Arc::new(Mutex::new(Vec::new())),
                released: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl MediaOpener for MockOpener {
        async fn open(&self, input: &str) -> Result<Box<dyn MediaSource>> {
            self.opened.lock().unwrap().push(input.to_string());
            let duration = *self.durations.get(input).unwrap_or(&Some(4.0));
            let mut source = MockSource::new(duration, 64, 48);
            if duration.is_none() {
                source.load_failure = Some(MediaLoadReason::Decode);
            }
            source.released = Arc::clone(&self.released);
            Ok(Box::new(source))
        }
    }

    /// Scripted audio decoder; `None` simulates an undecodable track
    pub struct MockDecoder {
        pub buffer: Option<AudioBuffer>,
    }

    #[async_trait]
    impl AudioDecoder for MockDecoder {
        async fn decode(&self, _path: &Path) -> Result<AudioBuffer> {
            self.buffer.clone().ok_or_else(|| {
                ExtractionError::media_load(MediaLoadReason::Decode, "undecodable audio")
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_clock_time() {
        assert_eq!(parse_clock_time("00:00:10.00"), Some(10.0));
        assert_eq!(parse_clock_time("01:02:03.50"), Some(3723.5));
        assert_eq!(parse_clock_time("42.25"), Some(42.25));
        assert_eq!(parse_clock_time(""), None);
    }

    #[test]
    fn test_parse_final_decode_time_takes_last() {
        let stderr = "frame= 10 time=00:00:01.00 bitrate=N/A\n\
                      frame= 99 time=00:00:09.97 bitrate=N/A speed=30x\n";
        assert_eq!(parse_final_decode_time(stderr), Some(9.97));
    }

    #[test]
    fn test_parse_final_decode_time_rejects_garbage() {
        assert_eq!(parse_final_decode_time("no timestamps here"), None);
        assert_eq!(parse_final_decode_time("time=00:00:00.00"), None);
    }

    #[tokio::test]
    async fn test_resolve_local_path_has_no_staged_file() {
        let resource = MediaResource::resolve("/tmp/sample.mp4").await.unwrap();
        assert_eq!(resource.path(), Path::new("/tmp/sample.mp4"));
    }

    #[tokio::test]
    async fn test_discover_videos_filters_extensions() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nested");
        tokio::fs::create_dir(&nested).await.unwrap();
        tokio::fs::write(dir.path().join("ad.mp4"), b"x").await.unwrap();
        tokio::fs::write(nested.join("spot.webm"), b"x").await.unwrap();
        tokio::fs::write(dir.path().join("notes.txt"), b"x").await.unwrap();

        let videos = discover_videos(dir.path()).await.unwrap();
        assert_eq!(videos.len(), 2);
        assert!(videos.iter().all(|p| {
            let ext = p.extension().unwrap().to_str().unwrap();
            SUPPORTED_EXTENSIONS.contains(&ext)
        }));
    }

    #[tokio::test]
    async fn test_image_to_base64_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.png");
        tokio::fs::write(&path, b"fake image bytes").await.unwrap();

        let encoded = image_to_base64(&path).await.unwrap();
        let decoded = BASE64.decode(encoded).unwrap();
        assert_eq!(decoded, b"fake image bytes");
    }
}
