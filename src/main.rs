use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use vlogger::{
    composition::CompositionEngine,
    config::VlogConfig,
    media::FfmpegEngine,
    video::discovery::{parse_extensions, template_from_directory},
};

#[derive(Parser)]
#[command(
    name = "vlogger",
    version,
    about = "Compose video clips into a captioned vlog with background music",
    long_about = "Vlogger joins your clips in order, burns in timed captions, mutes the clips you choose and lays looped background music under the whole video."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a vlog from a configuration file
    Create {
        /// Configuration file (TOML)
        #[arg(short, long)]
        config: PathBuf,

        /// Output video file path
        #[arg(short, long, default_value = "output.mp4")]
        output: PathBuf,

        /// Enable verbose logging
        #[arg(short, long)]
        verbose: bool,
    },

    /// Write a configuration template
    GenerateConfig {
        /// Directory to scan for video files
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Comma-separated video file extensions
        #[arg(short, long, default_value = "mp4")]
        extension: String,

        /// Where to write the template
        #[arg(short, long, default_value = "config_template.toml")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let verbose = matches!(cli.command, Commands::Create { verbose: true, .. });
    init_logging(verbose);

    match cli.command {
        Commands::Create { config, output, .. } => create(config, output).await,
        Commands::GenerateConfig { dir, extension, output } => generate_config(dir, &extension, output),
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn create(config_path: PathBuf, output: PathBuf) -> Result<()> {
    info!("Starting vlogger v{}", env!("CARGO_PKG_VERSION"));
    info!("Loading configuration from {:?}", config_path);

    let config = VlogConfig::from_file(&config_path).map_err(|e| anyhow::anyhow!(e.user_message()))?;
    config.validate().map_err(|e| anyhow::anyhow!(e.user_message()))?;

    let media = FfmpegEngine::from_config(&config);
    if let Err(e) = media.check_available() {
        error!("{}", e.user_message());
        return Err(e.into());
    }

    let engine = CompositionEngine::new(media);

    tokio::select! {
        result = engine.render(&config, &output) => {
            let report = result.map_err(|e| anyhow::anyhow!(e.user_message()))?;
            info!(
                "Wrote {:.1}s of video ({} clips, {} captions) to {:?}",
                report.duration, report.clips, report.captions, report.output
            );
            Ok(())
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for Ctrl-C")?;
            warn!("Interrupted, render cancelled");
            anyhow::bail!("render cancelled by user")
        }
    }
}

fn generate_config(dir: Option<PathBuf>, extension: &str, output: PathBuf) -> Result<()> {
    let config = match dir {
        Some(dir) => {
            let extensions = parse_extensions(extension);
            if extensions.is_empty() {
                anyhow::bail!("No extensions given in {:?}", extension);
            }
            template_from_directory(&dir, &extensions)
                .with_context(|| format!("Failed to scan {:?}", dir))?
        }
        None => VlogConfig::example(),
    };

    config
        .save_to_file(&output)
        .with_context(|| format!("Failed to write {:?}", output))?;

    info!("Configuration template written to {:?}", output);
    Ok(())
}
