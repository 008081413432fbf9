//! storyreel command line.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use reel_gemini::{AnalysisClient, GeminiClient, GeminiConfig, GenerationClient, ReferenceImage};
use reel_models::encoding::MERGE_EXTENSION;
use reel_models::{
    output_filename, AnalysisResult, AspectRatio, GeneratedClip, SceneId, StoryboardError,
};
use reel_studio::{Session, StudioConfig, StudioError};

#[derive(Debug, Parser)]
#[command(name = "storyreel", version, about = "Turn a reference video into a storyboard and regenerate it scene by scene")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Analyze a video into a storyboard
    Analyze {
        /// Reference video
        video: PathBuf,
        /// Write the storyboard JSON here instead of printing it
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Analyze, generate scenes and merge them
    Run {
        /// Reference video
        video: PathBuf,
        /// Scene ids to generate, e.g. 1,3 (default: all)
        #[arg(long, value_delimiter = ',')]
        scenes: Vec<u32>,
        /// Aspect ratio of generated clips (16:9 or 9:16)
        #[arg(long)]
        aspect: Option<AspectRatio>,
        /// Reference image used as the first frame of every clip
        #[arg(long)]
        image: Option<PathBuf>,
        /// Directory for the merged video
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Merge existing clips
    Merge {
        /// Clip for a scene, as ID=PATH
        #[arg(long = "clip", value_parser = parse_clip, required = true)]
        clips: Vec<(u32, PathBuf)>,
        /// Title used for the output file name
        #[arg(long, default_value = "storyboard")]
        title: String,
        /// Directory for the merged video
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Print the storyboard JSON Schema
    Schema,
}

fn parse_clip(value: &str) -> Result<(u32, PathBuf), String> {
    let (id, path) = value
        .split_once('=')
        .ok_or_else(|| format!("expected ID=PATH, got '{}'", value))?;
    let id = id
        .trim()
        .parse()
        .map_err(|_| format!("invalid scene id '{}'", id))?;
    if path.trim().is_empty() {
        return Err(format!("missing path for scene {}", id));
    }
    Ok((id, PathBuf::from(path.trim())))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider (required for TLS/HTTPS)
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install rustls crypto provider"))?;

    dotenvy::dotenv().ok();
    init_tracing()?;

    let cli = Cli::parse();
    let config = StudioConfig::from_env()?;

    match cli.command {
        Commands::Analyze { video, out } => analyze(&video, out.as_deref()).await,
        Commands::Run {
            video,
            scenes,
            aspect,
            image,
            output_dir,
        } => {
            let aspect = aspect.unwrap_or(config.default_aspect);
            let output_dir = output_dir.unwrap_or_else(|| config.output_dir.clone());
            run(&config, &video, &scenes, aspect, image.as_deref(), &output_dir).await
        }
        Commands::Merge {
            clips,
            title,
            output_dir,
        } => {
            let output_dir = output_dir.unwrap_or_else(|| config.output_dir.clone());
            merge(&config, clips, &title, &output_dir).await
        }
        Commands::Schema => {
            let schema = schemars::schema_for!(AnalysisResult);
            println!("{}", serde_json::to_string_pretty(&schema)?);
            Ok(())
        }
    }
}

/// Colored output for dev, JSON when `LOG_FORMAT=json`.
fn init_tracing() -> anyhow::Result<()> {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("reel=info".parse()?)
        .add_directive("storyreel=info".parse()?);

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    Ok(())
}

fn gemini_client() -> anyhow::Result<GeminiClient> {
    let config = GeminiConfig::from_env()?;
    info!(
        base_url = %config.base_url,
        models = ?config.analysis_models,
        video_model = %config.video_model,
        "Gemini client configured"
    );
    Ok(GeminiClient::new(config)?)
}

async fn analyze(video: &Path, out: Option<&Path>) -> anyhow::Result<()> {
    let client = AnalysisClient::new(gemini_client()?);
    let result = client.analyze(video).await.map_err(StudioError::from).map_err(with_hint)?;

    let json = serde_json::to_string_pretty(&result)?;
    match out {
        Some(path) => {
            tokio::fs::write(path, json)
                .await
                .with_context(|| format!("writing {}", path.display()))?;
            info!(path = %path.display(), scenes = result.scenes.len(), "Storyboard written");
        }
        None => println!("{}", json),
    }
    Ok(())
}

async fn run(
    config: &StudioConfig,
    video: &Path,
    scenes: &[u32],
    aspect: AspectRatio,
    image: Option<&Path>,
    output_dir: &Path,
) -> anyhow::Result<()> {
    let client = gemini_client()?;
    let reference_image = match image {
        Some(path) => Some(ReferenceImage::from_path(path).await?),
        None => None,
    };

    let mut session = Session::new(
        AnalysisClient::new(client.clone()),
        GenerationClient::new(client),
        config.merge_engine(),
        &config.work_dir,
    );
    info!(session_id = %session.session_id(), "Session started");

    let storyboard = session.analyze(video).await.map_err(with_hint)?;
    let mut ids: Vec<SceneId> = if scenes.is_empty() {
        storyboard.scenes().map(|s| s.id).collect()
    } else {
        scenes.iter().copied().map(SceneId).collect()
    };
    ids.sort();
    ids.dedup();

    if let Some(missing) = ids.iter().find(|id| storyboard.get(**id).is_none()) {
        return Err(with_hint(StoryboardError::SceneNotFound(*missing).into()));
    }

    for id in ids {
        if let Err(e) = session
            .generate_scene(id, aspect, reference_image.clone())
            .await
        {
            warn!(scene_id = %id, "Skipping scene: {}", e);
        }
    }

    let outcome = session.merge(output_dir).await.map_err(with_hint)?;
    println!("{}", outcome.path.display());
    Ok(())
}

async fn merge(
    config: &StudioConfig,
    clips: Vec<(u32, PathBuf)>,
    title: &str,
    output_dir: &Path,
) -> anyhow::Result<()> {
    let mut generated = Vec::with_capacity(clips.len());
    for (id, path) in clips {
        let bytes = tokio::fs::metadata(&path)
            .await
            .with_context(|| format!("reading clip {}", path.display()))?
            .len();
        generated.push(GeneratedClip::new(SceneId(id), path, bytes));
    }

    let output = output_dir.join(output_filename(title, MERGE_EXTENSION));
    let outcome = config
        .merge_engine()
        .merge(&generated, &output)
        .await
        .map_err(StudioError::from)
        .map_err(with_hint)?;

    if !outcome.skipped.is_empty() {
        warn!(skipped = ?outcome.skipped, "Some clips could not be decoded");
    }
    println!("{}", outcome.path.display());
    Ok(())
}

/// Attach the user hint, if any, to the error shown on exit.
fn with_hint(err: StudioError) -> anyhow::Error {
    match err.user_hint() {
        Some(hint) => anyhow::Error::new(err).context(hint),
        None => anyhow::Error::new(err),
    }
}
