use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::debug;

use crate::config::AnalysisConfig;
use crate::processing::FileExtraction;

/// Ad platform whose creative-effectiveness rubric scores the video
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Platform {
    Facebook,
    Instagram,
    TikTok,
    Amazon,
    Snapchat,
    YouTube,
    Google,
}

impl Platform {
    pub const ALL: [Platform; 7] = [
        Platform::Facebook,
        Platform::Instagram,
        Platform::TikTok,
        Platform::Amazon,
        Platform::Snapchat,
        Platform::YouTube,
        Platform::Google,
    ];

    pub fn parse(name: &str) -> Option<Platform> {
        match name.to_lowercase().as_str() {
            "facebook" => Some(Platform::Facebook),
            "instagram" => Some(Platform::Instagram),
            "tiktok" => Some(Platform::TikTok),
            "amazon" => Some(Platform::Amazon),
            "snapchat" => Some(Platform::Snapchat),
            "youtube" => Some(Platform::YouTube),
            "google" => Some(Platform::Google),
            _ => None,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Platform::Facebook => "Facebook",
            Platform::Instagram => "Instagram",
            Platform::TikTok => "TikTok",
            Platform::Amazon => "Amazon",
            Platform::Snapchat => "Snapchat",
            Platform::YouTube => "YouTube",
            Platform::Google => "Google",
        };
        f.write_str(name)
    }
}

/// User-supplied categorical context merged into the request. Which fields
/// apply depends on the platform's rubric; unset fields are omitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisContext {
    pub platform: Platform,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub objective: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audience: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ad_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ad_format: Option<String>,
}

impl AnalysisContext {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            objective: None,
            audience: None,
            ad_type: None,
            ad_format: None,
        }
    }
}

/// Everything the backend receives for one video: ordered base64 JPEG
/// frames, source dimensions, the WAV payload (or `""`), and the
/// categorical context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub frames: Vec<String>,
    pub width: u32,
    pub height: u32,
    pub audio_base64: String,
    pub context: AnalysisContext,
}

impl AnalysisRequest {
    pub fn from_extraction(extraction: &FileExtraction, context: AnalysisContext) -> Self {
        Self {
            frames: extraction.frames.frames.clone(),
            width: extraction.frames.width,
            height: extraction.frames.height,
            audio_base64: extraction.audio_base64.clone(),
            context,
        }
    }
}

/// Structured scoring response; schema interpretation is the caller's
#[derive(Debug, Clone)]
pub struct AnalysisResponse {
    pub content: String,
    pub tokens_used: Option<u32>,
}

/// External analysis collaborator accepting extraction payloads
#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResponse>;
    async fn is_available(&self) -> bool;
}

#[derive(Debug, Serialize)]
struct BackendRequest {
    contents: Vec<BackendContent>,
    #[serde(rename = "generationConfig")]
    generation_config: BackendGenerationConfig,
}

#[derive(Debug, Serialize)]
struct BackendContent {
    parts: Vec<BackendPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum BackendPart {
    Text {
        text: String,
    },
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Debug, Serialize)]
struct InlineData {
    #[serde(rename = "mimeType")]
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
struct BackendGenerationConfig {
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct BackendResponse {
    candidates: Vec<BackendCandidate>,
    #[serde(rename = "usageMetadata")]
    usage_metadata: Option<BackendUsage>,
}

#[derive(Debug, Deserialize)]
struct BackendCandidate {
    content: BackendCandidateContent,
}

#[derive(Debug, Deserialize)]
struct BackendCandidateContent {
    parts: Vec<BackendTextPart>,
}

#[derive(Debug, Deserialize)]
struct BackendTextPart {
    text: String,
}

/// Hosted generative-AI backend reached over HTTP.
///
/// The multimodal body carries one text part with the serialized context,
/// one inline JPEG part per frame in chronological order, and one inline
/// WAV part when audio is present.
pub struct HttpAnalysisBackend {
    config: AnalysisConfig,
    client: reqwest::Client,
}

impl HttpAnalysisBackend {
    pub fn new(config: AnalysisConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self { config, client })
    }

    fn build_parts(request: &AnalysisRequest) -> Vec<BackendPart> {
        let mut parts = Vec::with_capacity(request.frames.len() + 2);

        let context_text = serde_json::to_string(&request.context).unwrap_or_default();
        parts.push(BackendPart::Text {
            text: format!(
                "Score this {}x{} video ad. Context: {}",
                request.width, request.height, context_text
            ),
        });

        for frame in &request.frames {
            parts.push(BackendPart::Inline {
                inline_data: InlineData {
                    mime_type: "image/jpeg".to_string(),
                    data: frame.clone(),
                },
            });
        }

        if !request.audio_base64.is_empty() {
            parts.push(BackendPart::Inline {
                inline_data: InlineData {
                    mime_type: "audio/wav".to_string(),
                    data: request.audio_base64.clone(),
                },
            });
        }

        parts
    }
}

#[async_trait]
impl AnalysisBackend for HttpAnalysisBackend {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResponse> {
        let endpoint = self
            .config
            .endpoint
            .as_ref()
            .ok_or_else(|| anyhow!("analysis endpoint not configured"))?;
        let api_key = self
            .config
            .api_key
            .as_ref()
            .ok_or_else(|| anyhow!("analysis API key not configured"))?;

        let body = BackendRequest {
            contents: vec![BackendContent {
                parts: Self::build_parts(request),
            }],
            generation_config: BackendGenerationConfig {
                max_output_tokens: self.config.max_output_tokens,
                temperature: self.config.temperature,
            },
        };

        let url = format!("{}/{}:generateContent?key={}", endpoint, self.config.model, api_key);

        debug!(
            "Submitting {} frames to analysis backend ({})",
            request.frames.len(),
            request.context.platform
        );

        let response = self.client.post(&url).json(&body).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow!("analysis backend error {}: {}", status, text));
        }

        let backend_response: BackendResponse = response.json().await?;

        let content = backend_response
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.clone())
            .ok_or_else(|| anyhow!("empty response from analysis backend"))?;

        let tokens_used = backend_response.usage_metadata.map(|u| u.total_token_count);

        Ok(AnalysisResponse {
            content,
            tokens_used,
        })
    }

    async fn is_available(&self) -> bool {
        self.config.endpoint.is_some() && self.config.api_key.is_some()
    }
}

#[derive(Debug, Deserialize)]
struct BackendUsage {
    #[serde(rename = "totalTokenCount")]
    total_token_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frames::FrameSequence;

    fn request_with_audio(audio: &str) -> AnalysisRequest {
        let extraction = FileExtraction {
            frames: FrameSequence {
                frames: vec!["aaa".to_string(), "bbb".to_string()],
                width: 1280,
                height: 720,
            },
            audio_base64: audio.to_string(),
        };
        AnalysisRequest::from_extraction(&extraction, AnalysisContext::new(Platform::TikTok))
    }

    #[test]
    fn test_parts_order_text_then_frames_then_audio() {
        let parts = HttpAnalysisBackend::build_parts(&request_with_audio("wav-bytes"));
        assert_eq!(parts.len(), 4);

        let json = serde_json::to_value(&parts).unwrap();
        assert!(json[0]["text"].as_str().unwrap().contains("1280x720"));
        assert_eq!(json[1]["inlineData"]["mimeType"], "image/jpeg");
        assert_eq!(json[1]["inlineData"]["data"], "aaa");
        assert_eq!(json[2]["inlineData"]["data"], "bbb");
        assert_eq!(json[3]["inlineData"]["mimeType"], "audio/wav");
    }

    #[test]
    fn test_empty_audio_sentinel_omits_audio_part() {
        let parts = HttpAnalysisBackend::build_parts(&request_with_audio(""));
        assert_eq!(parts.len(), 3);
        let json = serde_json::to_value(&parts).unwrap();
        assert_eq!(json[2]["inlineData"]["mimeType"], "image/jpeg");
    }

    #[test]
    fn test_platform_parse_round_trip() {
        for platform in Platform::ALL {
            assert_eq!(Platform::parse(&platform.to_string()), Some(platform));
        }
        assert_eq!(Platform::parse("myspace"), None);
    }

    #[test]
    fn test_context_omits_unset_fields() {
        let mut context = AnalysisContext::new(Platform::Facebook);
        context.objective = Some("conversions".to_string());

        let json = serde_json::to_value(&context).unwrap();
        assert_eq!(json["objective"], "conversions");
        assert!(json.get("audience").is_none());
    }
}
