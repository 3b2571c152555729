use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::io::Write;
use std::path::{Path, PathBuf};

use feedagg::config::Config;
use feedagg::pipeline::Aggregator;
use feedagg::render;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    /// RSS 2.0 document
    Rss,
    /// One JSON object per line
    Json,
}

#[derive(Parser, Debug)]
#[command(
    name = "feedagg",
    version,
    about = "Merge many RSS/Atom feeds into one, newest items first"
)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, value_name = "FILE", required_unless_present = "feeds")]
    config: Option<PathBuf>,

    /// Write the result to this file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value_t = Format::Rss)]
    format: Format,

    /// Maximum number of feeds fetched at the same time (overrides the config file)
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u16).range(1..))]
    concurrency: Option<u16>,

    /// Emit items as soon as each feed delivers them instead of newest first
    #[arg(long)]
    unsorted: bool,

    /// Extra feed URLs, fetched after the ones listed in the config file
    #[arg(value_name = "FEED_URL")]
    feeds: Vec<String>,
}

/// Write `content` to `dst` through a temp file and a rename, so readers
/// never see a partial document.
fn write_atomic(dst: &Path, content: &[u8]) -> Result<()> {
    use std::time::{SystemTime, UNIX_EPOCH};
    let random_suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let temp_path = dst.with_extension(format!("tmp.{:016x}", random_suffix));

    let mut temp_file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&temp_path)
        .with_context(|| {
            format!(
                "Failed to create temporary file '{}': check directory permissions",
                temp_path.display()
            )
        })?;

    temp_file.write_all(content).with_context(|| {
        let _ = std::fs::remove_file(&temp_path);
        format!(
            "Failed to write to temporary file '{}': disk may be full",
            temp_path.display()
        )
    })?;

    temp_file.sync_all().with_context(|| {
        let _ = std::fs::remove_file(&temp_path);
        format!(
            "Failed to sync temporary file '{}' to disk",
            temp_path.display()
        )
    })?;

    drop(temp_file);

    // On Windows, rename fails if destination exists, so remove it first
    #[cfg(windows)]
    if dst.exists() {
        std::fs::remove_file(dst).with_context(|| {
            let _ = std::fs::remove_file(&temp_path);
            format!(
                "Failed to remove existing '{}' before atomic replace",
                dst.display()
            )
        })?;
    }

    std::fs::rename(&temp_path, dst).with_context(|| {
        let _ = std::fs::remove_file(&temp_path);
        format!(
            "Failed to rename '{}' to '{}': check permissions",
            temp_path.display(),
            dst.display()
        )
    })?;

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };

    let canonical = path
        .canonicalize()
        .with_context(|| format!("Failed to resolve config file: {}", path.display()))?;
    Config::load(&canonical)
        .with_context(|| format!("Failed to load config file: {}", canonical.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout only carries the rendered document
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = load_config(args.config.as_deref())?;
    if let Some(concurrency) = args.concurrency {
        config.concurrency = usize::from(concurrency);
    }
    if args.unsorted {
        config.sorted = false;
    }
    config.feeds.extend(args.feeds);

    if config.feeds.is_empty() {
        tracing::warn!("No feeds configured, output will be empty");
    }

    let mut aggregator = Aggregator::with_http(config.aggregator_options())
        .context("Failed to build HTTP client")?;

    // Failures are reported as they happen; they never stop the run
    let errors = aggregator.take_errors().map(|mut errors| {
        tokio::spawn(async move {
            let mut count = 0usize;
            while let Some(err) = errors.recv().await {
                eprintln!("{err}");
                count += 1;
            }
            count
        })
    });

    for feed in &config.feeds {
        aggregator.submit(feed.as_str());
    }
    let items = aggregator.finish().collect_all().await;

    let failed = match errors {
        Some(handle) => handle.await.context("Error reporter task failed")?,
        None => 0,
    };
    tracing::info!(
        feeds = config.feeds.len(),
        failed = failed,
        items = items.len(),
        "Aggregation finished"
    );

    let content = match args.format {
        Format::Rss => render::rss(&config.channel, &items)?,
        Format::Json => render::json_lines(&items)?,
    };

    match &args.output {
        Some(path) => {
            write_atomic(path, content.as_bytes())?;
            println!("{} created", path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(content.as_bytes())
                .context("Failed to write to stdout")?;
            stdout.flush().context("Failed to flush stdout")?;
        }
    }

    Ok(())
}
