use clap::{Parser, Subcommand};
use rgenimage::{
    logger::{self, LogLevel, LoggerConfig},
    ImageRecord, ProgressPhase, StudioClient, StudioConfig,
};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "rgenimage", version, about = "Generate images from a text prompt")]
struct Cli {
    /// Log level: trace, debug, info, warn, error
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Also append log lines to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Emit log lines as JSON objects
    #[arg(long, global = true)]
    json_logs: bool,

    /// Directory holding the persisted history
    #[arg(long, global = true)]
    history_dir: Option<PathBuf>,

    /// Override the generation endpoint
    #[arg(long, global = true)]
    endpoint: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a batch of images and record it in history
    Generate {
        prompt: String,
        /// Number of images, clamped to 1..=4
        #[arg(short = 'n', long, default_value_t = 1)]
        count: usize,
        /// Save embedded images into this directory
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// List stored images, newest first
    History,
    /// Remove every stored image
    Clear,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dotenv_loaded = dotenv::dotenv().is_ok();
    let cli = Cli::parse();

    let level = LogLevel::parse(&cli.log_level).unwrap_or(LogLevel::Info);
    let mut log_config = LoggerConfig::default()
        .with_level(level)
        .with_json_output(cli.json_logs);
    if let Some(path) = &cli.log_file {
        log_config = log_config.with_file_output(path.to_string_lossy());
    }
    logger::init_with_config(log_config)?;
    logger::log_startup_info(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    if !dotenv_loaded {
        log::debug!("No .env file found, using process environment");
    }

    let mut config = StudioConfig::from_env();
    if let Some(endpoint) = cli.endpoint {
        config = config.with_endpoint(endpoint);
    }
    if let Some(dir) = cli.history_dir {
        let history = config.history.clone().with_directory(dir);
        config = config.with_history(history);
    }
    logger::log_config_info(&config);

    let studio = StudioClient::new(config).await?;

    match cli.command {
        Command::Generate { prompt, count, out } => generate(&studio, &prompt, count, out).await?,
        Command::History => {
            let items = studio.history().items().await;
            if items.is_empty() {
                println!("No images yet");
            }
            for (i, item) in items.iter().enumerate() {
                println!("{:>2}. {}  {}", i + 1, item.created_at.format("%Y-%m-%d %H:%M"), item.prompt);
                println!("    {}", summarize(&item.reference));
            }
        }
        Command::Clear => {
            studio.history().clear().await;
            println!("Gallery cleared");
        }
    }

    Ok(())
}

async fn generate(
    studio: &StudioClient,
    prompt: &str,
    count: usize,
    out: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut progress = studio.progress();
    let reporter = tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            let current = *progress.borrow();
            if let ProgressPhase::InFlight { .. } | ProgressPhase::Settling = current.phase {
                log::info!("Generating… {}%", current.percent);
            }
        }
    });

    // Ctrl-C abandons the batch instead of killing the process mid-write.
    let cancel = CancellationToken::new();
    let ctrl_c = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        }
    });

    let outcome = studio.generate_with_cancel(prompt, count, cancel).await;
    ctrl_c.abort();
    reporter.abort();

    let records = match outcome {
        Ok(records) => records,
        Err(e) => {
            log::error!("Could not generate image: {}", e);
            return Err(e.into());
        }
    };
    if records.is_empty() {
        println!("Nothing to generate: the prompt is empty");
        return Ok(());
    }

    for (i, record) in records.iter().enumerate() {
        println!("{}. {}", i + 1, summarize(&record.reference));
        if let Some(dir) = out.as_deref() {
            match save(record, dir, i).await {
                Ok(Some(path)) => println!("   saved to {}", path.display()),
                Ok(None) => {}
                Err(e) => log::error!("Failed to save image {}: {}", i + 1, e),
            }
        }
    }
    Ok(())
}

/// Writes embedded images to `dir`; URLs are left for the caller to fetch.
async fn save(record: &ImageRecord, dir: &Path, index: usize) -> std::io::Result<Option<PathBuf>> {
    let Some((_, bytes)) = record.decode_data() else {
        return Ok(None);
    };
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(record.download_file_name("rgenimage", index));
    tokio::fs::write(&path, bytes).await?;
    Ok(Some(path))
}

fn summarize(reference: &str) -> String {
    const MAX: usize = 96;
    if reference.len() <= MAX {
        reference.to_string()
    } else {
        let cut = (0..=MAX).rev().find(|i| reference.is_char_boundary(*i)).unwrap_or(0);
        format!("{}… ({} chars)", &reference[..cut], reference.len())
    }
}
