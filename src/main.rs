use anyhow::Result;
use clap::{Arg, Command};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use adlens::analysis::{AnalysisBackend, AnalysisContext, AnalysisRequest, HttpAnalysisBackend, Platform};
use adlens::config::Config;
use adlens::media::discover_videos;
use adlens::processing::BatchExtractor;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter("adlens=info,warn")
        .init();

    let matches = Command::new("AdLens")
        .version("0.1.0")
        .about("High-performance video ad creative analysis")
        .arg(
            Arg::new("inputs")
                .value_name("VIDEO")
                .help("Video files or URLs to analyze")
                .num_args(0..)
        )
        .arg(
            Arg::new("video-dir")
                .short('d')
                .long("video-dir")
                .value_name("DIR")
                .help("Directory to scan for videos")
        )
        .arg(
            Arg::new("output-dir")
                .short('o')
                .long("output-dir")
                .value_name("DIR")
                .help("Output directory for payloads and reports")
                .default_value("./output")
        )
        .arg(
            Arg::new("platform")
                .short('p')
                .long("platform")
                .value_name("NAME")
                .help("Target ad platform (facebook, instagram, tiktok, amazon, snapchat, youtube, google)")
                .default_value("facebook")
        )
        .arg(
            Arg::new("objective")
                .long("objective")
                .value_name("TEXT")
                .help("Campaign objective context")
        )
        .arg(
            Arg::new("audience")
                .long("audience")
                .value_name("TEXT")
                .help("Target audience context")
        )
        .arg(
            Arg::new("ad-type")
                .long("ad-type")
                .value_name("TEXT")
                .help("Ad type context")
        )
        .arg(
            Arg::new("ad-format")
                .long("ad-format")
                .value_name("TEXT")
                .help("Ad format context")
        )
        .arg(
            Arg::new("analyze")
                .long("analyze")
                .help("Submit extracted payloads to the analysis backend")
                .action(clap::ArgAction::SetTrue)
        )
        .get_matches();

    // Load configuration
    let config = Config::load().unwrap_or_else(|e| {
        warn!("Failed to load config, using defaults: {}", e);
        Config::default()
    });
    config.validate()?;

    let output_dir = PathBuf::from(matches.get_one::<String>("output-dir").unwrap());
    let platform_name = matches.get_one::<String>("platform").unwrap();
    let platform = Platform::parse(platform_name)
        .ok_or_else(|| anyhow::anyhow!("Unknown platform: {}", platform_name))?;

    let mut inputs: Vec<String> = matches
        .get_many::<String>("inputs")
        .map(|values| values.cloned().collect())
        .unwrap_or_default();

    if let Some(dir) = matches.get_one::<String>("video-dir") {
        let discovered = discover_videos(Path::new(dir)).await?;
        inputs.extend(discovered.iter().map(|p| p.display().to_string()));
    }

    if inputs.is_empty() {
        error!("No input videos given; pass files or --video-dir");
        return Err(anyhow::anyhow!("no input videos"));
    }

    info!("🚀 AdLens starting...");
    info!("📹 Inputs: {}", inputs.len());
    info!("🎯 Platform: {}", platform);
    info!("📂 Output directory: {}", output_dir.display());

    // Run the extraction pipeline
    let extractor = BatchExtractor::new(&config.extraction);
    let start_time = std::time::Instant::now();

    let mut last_logged = -1i64;
    let results = extractor
        .extract_batch(&inputs, |percent| {
            let rounded = percent.floor() as i64;
            if rounded > last_logged {
                last_logged = rounded;
                info!("⏳ Extraction progress: {:.1}%", percent);
            }
        })
        .await?;

    info!(
        "🎉 Extraction completed in {:.2}s ({} videos)",
        start_time.elapsed().as_secs_f64(),
        results.len()
    );

    if config.output.save_payloads {
        extractor.save_payloads(&inputs, &results, &output_dir).await?;
    }

    // Optional backend submission
    if matches.get_flag("analyze") {
        let backend = HttpAnalysisBackend::new(config.analysis.clone())?;
        if !backend.is_available().await {
            return Err(anyhow::anyhow!(
                "analysis backend not configured; set ADLENS_ENDPOINT and ADLENS_API_KEY"
            ));
        }

        let mut context = AnalysisContext::new(platform);
        context.objective = matches.get_one::<String>("objective").cloned();
        context.audience = matches.get_one::<String>("audience").cloned();
        context.ad_type = matches.get_one::<String>("ad-type").cloned();
        context.ad_format = matches.get_one::<String>("ad-format").cloned();

        for (input, extraction) in inputs.iter().zip(&results) {
            info!("📤 Submitting for analysis: {}", input);
            let request = AnalysisRequest::from_extraction(extraction, context.clone());
            let response = backend.analyze(&request).await?;

            let stem = Path::new(input)
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("analysis");
            let response_path = output_dir.join(format!("{}.analysis.txt", stem));
            tokio::fs::write(&response_path, &response.content).await?;

            info!(
                "✅ Analysis saved to {} ({} tokens)",
                response_path.display(),
                response.tokens_used.map(|t| t.to_string()).unwrap_or_else(|| "?".to_string())
            );
        }
    }

    Ok(())
}
