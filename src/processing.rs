use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::audio::AudioExtractor;
use crate::config::ExtractionConfig;
use crate::error::Result;
use crate::frames::{FrameSampler, FrameSequence};
use crate::media::{FfmpegOpener, MediaOpener};
use crate::notify::{LogNotifier, Notifier};

/// Named phase of the consuming workflow. Progress resets to 0 at the
/// start of each phase, so events carry their phase explicitly instead of
/// leaving callers to infer it from call order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExtractionPhase {
    Frames,
    Audio,
    Submission,
}

/// Phase-tagged progress, percent in [0, 100]
#[derive(Debug, Clone, Copy)]
pub struct ProgressEvent {
    pub phase: ExtractionPhase,
    pub percent: f64,
}

/// Merged extraction output for a single video
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileExtraction {
    pub frames: FrameSequence,
    /// Base64 WAV payload, or `""` when audio was unavailable
    pub audio_base64: String,
}

/// Summary of a batch extraction run, saved alongside the payloads
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionReport {
    pub total: usize,
    pub extracted_at: DateTime<Utc>,
    pub files: Vec<FileReportEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileReportEntry {
    pub input: String,
    pub frame_count: usize,
    pub width: u32,
    pub height: u32,
    pub has_audio: bool,
}

/// Coordinates frame sampling and audio extraction per file.
///
/// For one file the two decode pipelines run concurrently and are joined
/// before returning. Across a batch, files run strictly sequentially:
/// each file's frame sampling monopolizes a decode handle, and sequential
/// order keeps progress accounting simple. File `i` of `N` owns the
/// overall-progress slice `[i/N*100, (i+1)/N*100)`.
pub struct BatchExtractor {
    sampler: FrameSampler,
    audio_extractor: AudioExtractor,
    opener: Box<dyn MediaOpener>,
    notifier: Arc<dyn Notifier>,
}

impl BatchExtractor {
    pub fn new(config: &ExtractionConfig) -> Self {
        Self::with_components(
            FrameSampler::from_config(config),
            AudioExtractor::new(),
            Box::new(FfmpegOpener),
            Arc::new(LogNotifier),
        )
    }

    pub fn with_components(
        sampler: FrameSampler,
        audio_extractor: AudioExtractor,
        opener: Box<dyn MediaOpener>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            sampler,
            audio_extractor,
            opener,
            notifier,
        }
    }

    /// Extract frames and audio from one input, concurrently, and join the
    /// results. Frame failures are fatal; audio failures degrade to an
    /// empty payload inside the audio extractor.
    pub async fn extract_file<F>(&self, input: &str, mut on_progress: F) -> Result<FileExtraction>
    where
        F: FnMut(ProgressEvent) + Send,
    {
        info!("🎬 Extracting: {}", input);

        let mut source = self.opener.open(input).await?;
        let frames_future = self.sampler.extract_frames(source.as_mut(), |percent| {
            on_progress(ProgressEvent {
                phase: ExtractionPhase::Frames,
                percent,
            })
        });
        let audio_future = self
            .audio_extractor
            .extract_audio(Path::new(input), self.notifier.as_ref());

        let (frames_result, audio_base64) = tokio::join!(frames_future, audio_future);
        let frames = frames_result?;

        on_progress(ProgressEvent {
            phase: ExtractionPhase::Audio,
            percent: 100.0,
        });

        info!(
            "✅ Extracted {} frames ({}x{}), audio: {}",
            frames.frames.len(),
            frames.width,
            frames.height,
            if audio_base64.is_empty() { "unavailable" } else { "present" },
        );

        Ok(FileExtraction {
            frames,
            audio_base64,
        })
    }

    /// Extract a multi-video batch, mapping per-file frame progress into
    /// equal slices of the overall range. Any single failure fails the
    /// whole batch; partial results are discarded by the caller.
    pub async fn extract_batch<F>(
        &self,
        inputs: &[String],
        mut on_overall: F,
    ) -> Result<Vec<FileExtraction>>
    where
        F: FnMut(f64) + Send,
    {
        let count = inputs.len();
        let mut results = Vec::with_capacity(count);

        for (index, input) in inputs.iter().enumerate() {
            info!("📹 Processing video {}/{}: {}", index + 1, count, input);

            let slice_start = index as f64 / count as f64 * 100.0;
            let slice_width = 100.0 / count as f64;

            let extraction = self
                .extract_file(input, |event| {
                    if event.phase == ExtractionPhase::Frames {
                        on_overall(slice_start + event.percent / 100.0 * slice_width);
                    }
                })
                .await?;
            results.push(extraction);
        }

        Ok(results)
    }

    /// Write each payload plus a run summary to the output directory
    pub async fn save_payloads(
        &self,
        inputs: &[String],
        results: &[FileExtraction],
        output_dir: &Path,
    ) -> anyhow::Result<ExtractionReport> {
        tokio::fs::create_dir_all(output_dir).await?;

        let mut files = Vec::with_capacity(results.len());
        for (input, extraction) in inputs.iter().zip(results) {
            let stem = Path::new(input)
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("payload");
            let payload_path = output_dir.join(format!("{}.payload.json", stem));
            let json = serde_json::to_string_pretty(extraction)?;
            tokio::fs::write(&payload_path, json).await?;

            files.push(FileReportEntry {
                input: input.clone(),
                frame_count: extraction.frames.frames.len(),
                width: extraction.frames.width,
                height: extraction.frames.height,
                has_audio: !extraction.audio_base64.is_empty(),
            });
        }

        let report = ExtractionReport {
            total: results.len(),
            extracted_at: Utc::now(),
            files,
        };
        let report_path = output_dir.join("extraction_report.json");
        tokio::fs::write(&report_path, serde_json::to_string_pretty(&report)?).await?;
        info!("💾 Report saved to: {}", report_path.display());

        Ok(report)
    }
}
