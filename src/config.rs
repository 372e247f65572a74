use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the ad creative analyzer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Frame sampling and audio extraction settings
    pub extraction: ExtractionConfig,

    /// Analysis backend settings
    pub analysis: AnalysisConfig,

    /// Output and storage settings
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Time spacing in seconds between sampled frames
    pub frame_interval_secs: f64,

    /// Bounded wait for a single seek to settle, in seconds
    pub seek_timeout_secs: u64,

    /// JPEG encoder quality, 1-100
    pub jpeg_quality: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Base URL of the hosted model endpoint
    pub endpoint: Option<String>,

    /// API key for the analysis backend
    pub api_key: Option<String>,

    /// Model to request
    pub model: String,

    /// Maximum tokens the backend may generate
    pub max_output_tokens: u32,

    /// Temperature for generation (low = consistent scoring)
    pub temperature: f32,

    /// Request timeout in seconds
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Base output directory
    pub base_dir: PathBuf,

    /// Write per-file payload JSON next to the report
    pub save_payloads: bool,

    /// Log level
    pub log_level: String,
}

impl Config {
    /// Load configuration from file
    pub fn load() -> Result<Self> {
        let config_paths = [
            "adlens.toml",
            "config/adlens.toml",
            "~/.config/adlens/config.toml",
            "/etc/adlens/config.toml",
        ];

        for path in &config_paths {
            if let Ok(config_str) = std::fs::read_to_string(path) {
                match toml::from_str(&config_str) {
                    Ok(config) => {
                        tracing::info!("📄 Loaded configuration from: {}", path);
                        return Ok(config);
                    }
                    Err(e) => {
                        tracing::warn!("Failed to parse config file {}: {}", path, e);
                    }
                }
            }
        }

        Self::from_env()
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(interval) = std::env::var("ADLENS_FRAME_INTERVAL") {
            config.extraction.frame_interval_secs = interval.parse().unwrap_or(1.0);
        }

        if let Ok(timeout) = std::env::var("ADLENS_SEEK_TIMEOUT") {
            config.extraction.seek_timeout_secs = timeout.parse().unwrap_or(5);
        }

        if let Ok(quality) = std::env::var("ADLENS_JPEG_QUALITY") {
            config.extraction.jpeg_quality = quality.parse().unwrap_or(80);
        }

        if let Ok(endpoint) = std::env::var("ADLENS_ENDPOINT") {
            config.analysis.endpoint = Some(endpoint);
        }

        if let Ok(api_key) = std::env::var("ADLENS_API_KEY") {
            config.analysis.api_key = Some(api_key);
        }

        if let Ok(output_dir) = std::env::var("ADLENS_OUTPUT_DIR") {
            config.output.base_dir = PathBuf::from(output_dir);
        }

        if let Ok(log_level) = std::env::var("ADLENS_LOG_LEVEL") {
            config.output.log_level = log_level;
        }

        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &str) -> Result<()> {
        let config_str = toml::to_string_pretty(self)?;
        std::fs::write(path, config_str)?;
        tracing::info!("💾 Configuration saved to: {}", path);
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.extraction.frame_interval_secs <= 0.0 {
            return Err(anyhow!("frame_interval_secs must be greater than 0"));
        }

        if self.extraction.seek_timeout_secs == 0 {
            return Err(anyhow!("seek_timeout_secs must be greater than 0"));
        }

        if self.extraction.jpeg_quality == 0 || self.extraction.jpeg_quality > 100 {
            return Err(anyhow!("jpeg_quality must be in 1..=100"));
        }

        if !self.output.base_dir.exists() {
            if let Err(e) = std::fs::create_dir_all(&self.output.base_dir) {
                return Err(anyhow!("Cannot create output directory: {}", e));
            }
        }

        Ok(())
    }

    /// Get runtime configuration summary
    pub fn summary(&self) -> String {
        format!(
            "AdLens Configuration:\n\
            - Frame Interval: {}s\n\
            - Seek Timeout: {}s\n\
            - JPEG Quality: {}\n\
            - Analysis Model: {}\n\
            - Backend Configured: {}\n\
            - Output Directory: {}",
            self.extraction.frame_interval_secs,
            self.extraction.seek_timeout_secs,
            self.extraction.jpeg_quality,
            self.analysis.model,
            self.analysis.endpoint.is_some() && self.analysis.api_key.is_some(),
            self.output.base_dir.display(),
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            extraction: ExtractionConfig {
                frame_interval_secs: 1.0,
                seek_timeout_secs: 5,
                jpeg_quality: 80,
            },
            analysis: AnalysisConfig {
                endpoint: Some(
                    "https://generativelanguage.googleapis.com/v1beta/models".to_string(),
                ),
                api_key: None,
                model: "gemini-2.5-flash".to_string(),
                max_output_tokens: 8192,
                temperature: 0.1, // Low temperature for consistent scoring
                timeout_seconds: 120,
            },
            output: OutputConfig {
                base_dir: PathBuf::from("./output"),
                save_payloads: true,
                log_level: "info".to_string(),
            },
        }
    }
}

/// Configuration builder for programmatic config creation
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_frame_interval(mut self, seconds: f64) -> Self {
        self.config.extraction.frame_interval_secs = seconds;
        self
    }

    pub fn with_seek_timeout(mut self, seconds: u64) -> Self {
        self.config.extraction.seek_timeout_secs = seconds;
        self
    }

    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.config.extraction.jpeg_quality = quality;
        self
    }

    pub fn with_endpoint(mut self, endpoint: String) -> Self {
        self.config.analysis.endpoint = Some(endpoint);
        self
    }

    pub fn with_api_key(mut self, api_key: String) -> Self {
        self.config.analysis.api_key = Some(api_key);
        self
    }

    pub fn with_output_dir(mut self, dir: PathBuf) -> Self {
        self.config.output.base_dir = dir;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
