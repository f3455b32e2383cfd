use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tunedl::config::{CliConfig, DownloadConfig, FileConfig};
use tunedl::convert::{AudioFormat, FfmpegTranscoder};
use tunedl::download::{BatchSummary, DownloadManager};
use tunedl::fetch::HttpAudioFetcher;
use tunedl::gather::SongGatherer;
use tunedl::progress::DisplayManager;
use tunedl::providers::{
    HttpLyricsProvider, SpotifyCatalogProvider, YtMusicSearchProvider,
};
use tunedl::song::Song;
use tunedl::tag::LoftyTagWriter;
use tunedl::tracking::TRACKING_EXTENSION;

#[derive(Parser, Debug)]
#[clap(name = "tunedl", about = "Download, convert and tag songs from catalog queries")]
struct CliArgs {
    /// Track/album/playlist/artist URLs, free-text search terms, or
    /// tracking files from an interrupted run to resume.
    pub queries: Vec<String>,

    /// Directory where final audio files are written.
    #[clap(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Directory holding in-flight partial downloads.
    #[clap(long)]
    pub temp_dir: Option<PathBuf>,

    /// Target audio format.
    #[clap(short = 'f', long = "output-format")]
    pub format: Option<AudioFormat>,

    /// Maximum number of songs downloaded concurrently.
    #[clap(long)]
    pub pool_size: Option<usize>,

    /// Path to the ffmpeg binary.
    #[clap(long)]
    pub ffmpeg: Option<String>,

    /// Path to a TOML config file.
    #[clap(short, long)]
    pub config: Option<PathBuf>,

    /// Also download the authorized user's saved tracks.
    #[clap(long)]
    pub saved: bool,

    /// Timeout in seconds for audio fetch requests.
    #[clap(long, default_value_t = 300)]
    pub fetch_timeout_sec: u64,

    /// Suppress progress bars.
    #[clap(short, long)]
    pub quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .unwrap();

    if cli_args.queries.is_empty() && !cli_args.saved {
        bail!("Nothing to do: pass at least one query, tracking file or --saved");
    }

    let file_config = match &cli_args.config {
        Some(path) => Some(FileConfig::load(path)?),
        None => None,
    };
    let spotify_client_id = credential(
        "SPOTIFY_CLIENT_ID",
        file_config.as_ref().and_then(|f| f.spotify_client_id.clone()),
    );
    let spotify_client_secret = credential(
        "SPOTIFY_CLIENT_SECRET",
        file_config
            .as_ref()
            .and_then(|f| f.spotify_client_secret.clone()),
    );

    let cli_config = CliConfig {
        output_dir: cli_args.output_dir.clone(),
        temp_dir: cli_args.temp_dir.clone(),
        format: cli_args.format,
        pool_size: cli_args.pool_size,
        ffmpeg_path: cli_args.ffmpeg.clone(),
    };
    let config = DownloadConfig::resolve(&cli_config, file_config)?;
    config.validate().await?;

    // Tracking files resume as-is; everything else goes through gathering.
    let (resume_files, gather_queries): (Vec<_>, Vec<_>) = cli_args
        .queries
        .iter()
        .cloned()
        .partition(|q| q.ends_with(TRACKING_EXTENSION));

    let display = if cli_args.quiet {
        Arc::new(DisplayManager::hidden())
    } else {
        Arc::new(DisplayManager::new())
    };
    let manager = DownloadManager::new(
        config.clone(),
        Arc::new(YtMusicSearchProvider::new()),
        Arc::new(HttpAudioFetcher::new(cli_args.fetch_timeout_sec)),
        Arc::new(FfmpegTranscoder::new(config.ffmpeg_path.clone())),
        Arc::new(LoftyTagWriter::new()),
        display,
    );

    let mut failed = 0usize;

    for path in &resume_files {
        info!("Resuming from {}", path);
        let summary = manager.resume_from_tracking(path.as_ref()).await?;
        failed += report(&summary);
    }

    if !gather_queries.is_empty() || cli_args.saved {
        // The catalog is only reached when something has to be gathered.
        let (client_id, client_secret) = match (spotify_client_id, spotify_client_secret) {
            (Some(id), Some(secret)) => (id, secret),
            _ => bail!(
                "Spotify credentials required: set SPOTIFY_CLIENT_ID and \
                 SPOTIFY_CLIENT_SECRET or add them to the config file"
            ),
        };
        let catalog = SpotifyCatalogProvider::connect(&client_id, &client_secret)
            .await
            .context("Failed to authenticate with the catalog")?;
        let gatherer = SongGatherer::new(Arc::new(catalog), Arc::new(HttpLyricsProvider::new()));

        let mut songs: Vec<Song> = Vec::new();
        for query in &gather_queries {
            songs.extend(gatherer.from_query(query).await?);
        }
        if cli_args.saved {
            songs.extend(gatherer.from_saved().await?);
        }

        if songs.is_empty() {
            info!("No songs matched the given queries");
        } else {
            info!("Downloading {} song(s)...", songs.len());
            let summary = manager.run_all(songs).await?;
            failed += report(&summary);
        }
    }

    if failed > 0 {
        bail!("{} download(s) failed", failed);
    }
    Ok(())
}

/// Environment variable first, config file value second.
fn credential(env_var: &str, file_value: Option<String>) -> Option<String> {
    std::env::var(env_var).ok().filter(|v| !v.is_empty()).or(file_value)
}

/// Log the batch outcome and return the failure count.
fn report(summary: &BatchSummary) -> usize {
    info!(
        "Done: {} downloaded, {} skipped, {} failed",
        summary.counts.completed, summary.counts.skipped, summary.counts.failed
    );
    for failure in &summary.failures {
        match &failure.source_link {
            Some(link) => error!("  {} ({}): {}", failure.display_name, link, failure.reason),
            None => error!("  {}: {}", failure.display_name, failure.reason),
        }
    }
    summary.counts.failed
}
