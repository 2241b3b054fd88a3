use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use labelscan::config::{self, AppConfig};
use labelscan::history::{FileStore, HistoryStore};
use labelscan::knowledge::{self, KnowledgeBase};
use labelscan::recognition::{LineRecognizer, TextRecognizer, VisionClient};
use labelscan::{ScanOutcome, ScanPipeline};

#[derive(Parser, Debug)]
#[command(name = "labelscan", version, about = "Check ingredient labels against an additive knowledge base")]
struct Cli {
    /// Data directory (config and history)
    #[arg(long, env = "LABELSCAN_HOME", global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Classify ingredient text (argument, --file, or stdin)
    Classify {
        text: Option<String>,
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Recognize text on an image, classify it and record it in history
    Scan {
        image: String,
        /// Use text lines already recognized on the device (one per line)
        /// instead of calling the text detection service
        #[arg(long)]
        lines: Option<PathBuf>,
    },
    /// Show scan history, newest first
    History {
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Delete all scan history
    ClearHistory,
    /// Validate the configured knowledge base
    CheckKb,
    /// Write a default config file to the data directory
    InitConfig {
        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run(Cli::parse()) {
        log::error!("{:#}", e);
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let data_dir = cli.data_dir.unwrap_or_else(config::data_dir);
    let load_config = || config::load_config(&config::config_path(&data_dir));

    match cli.command {
        Command::Classify { text, file } => {
            let kb = load_kb(&load_config()?)?;
            let text = read_input(text, file)?;
            let matches = knowledge::classify(&text, &kb);
            if matches.is_empty() {
                println!("{}", ScanOutcome::NoFindings.message());
            } else {
                println!("{}", knowledge::render_matches(&matches));
            }
        }
        Command::Scan { image, lines } => {
            let config = load_config()?;
            match lines {
                Some(path) => {
                    let recognizer = LineRecognizer::new(move |_: &str| read_lines(&path));
                    scan(&config, &data_dir, recognizer, &image)?;
                }
                None => scan(&config, &data_dir, VisionClient::new(&config.vision), &image)?,
            }
        }
        Command::History { limit } => {
            let history = open_history(&load_config()?, &data_dir);
            let records = history.list().context("failed to read scan history")?;
            if records.is_empty() {
                println!("No scans yet.");
            }
            for record in records.iter().take(limit.unwrap_or(usize::MAX)) {
                println!("[{}] {}", record.timestamp, record.image_reference);
                if record.analysis_text.is_empty() {
                    println!("  (no text detected)");
                }
                for line in record.analysis_text.lines() {
                    println!("  {}", line);
                }
                println!();
            }
        }
        Command::ClearHistory => {
            open_history(&load_config()?, &data_dir)
                .clear()
                .context("failed to clear scan history")?;
            println!("Scan history cleared.");
        }
        Command::CheckKb => {
            let kb = load_kb(&load_config()?)?;
            println!("Knowledge base OK: {} entries", kb.len());
        }
        Command::InitConfig { force } => {
            let path = config::config_path(&data_dir);
            if config::init_config(&path, force)? {
                println!("Wrote default config to {}", path.display());
            } else {
                println!(
                    "Config already exists at {} (use --force to overwrite)",
                    path.display()
                );
            }
        }
    }

    Ok(())
}

fn load_kb(config: &AppConfig) -> Result<KnowledgeBase> {
    knowledge::load_knowledge_base(config.knowledge_base_path.as_deref())
        .context("refusing to classify with an invalid knowledge base")
}

fn scan<R: TextRecognizer>(
    config: &AppConfig,
    data_dir: &Path,
    recognizer: R,
    image: &str,
) -> Result<()> {
    let kb = load_kb(config)?;
    let pipeline = ScanPipeline::new(
        Arc::new(kb),
        Arc::new(open_history(config, data_dir)),
        recognizer,
    )
    .with_policy(config.policy.clone())
    .with_timestamp_format(&config.timestamp_format);

    let report = pipeline.scan(image).context("failed to record scan")?;
    println!("{}", report.outcome.message());
    if let ScanOutcome::RecognitionFailed { reason } = &report.outcome {
        log::debug!("Recognition failure detail: {}", reason);
    }
    Ok(())
}

fn open_history(config: &AppConfig, data_dir: &Path) -> HistoryStore<FileStore> {
    HistoryStore::new(FileStore::new(config.history_dir_or(data_dir)))
        .with_key(&config.history_key)
        .with_max_records(config.max_history)
}

fn read_input(text: Option<String>, file: Option<PathBuf>) -> Result<String> {
    if let Some(text) = text {
        return Ok(text);
    }
    if let Some(path) = file {
        return fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()));
    }
    let mut buf = String::new();
    io::stdin()
        .read_to_string(&mut buf)
        .context("failed to read stdin")?;
    Ok(buf)
}

/// Non-blank lines of a recognized-text file
fn read_lines(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read recognized lines from {}", path.display()))?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect())
}
