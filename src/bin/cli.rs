// TubeFetch - Video Downloads for Android
// Copyright (C) 2025 Henning Berge
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tubefetch_core::api::resolver::{format_duration, format_view_count};
use tubefetch_core::notify::LogNotifier;
use tubefetch_core::{init_logging, CoreConfig, TubeFetchCore, VideoFormat, VideoQuality, WorkerOutcome};

#[derive(Parser)]
#[command(name = "tubefetch-cli")]
#[command(about = "TubeFetch CLI - Desktop testing tool", long_about = None)]
struct Cli {
    /// JSON config file (defaults are used when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the output directory
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show metadata for a video URL
    Info {
        url: String,
    },
    /// Download a video and wait for it to finish
    Download {
        url: String,
        /// auto, 360p, 480p, 720p, 1080p, 1440p, 2160p
        #[arg(short, long, default_value = "auto")]
        quality: String,
        /// mp4, mp3, webm, m4a, wav
        #[arg(short, long, default_value = "mp4")]
        format: String,
    },
    /// List download history
    List,
    /// Pause a download
    Pause {
        id: String,
    },
    /// Retry a failed or paused download and wait for it
    Retry {
        id: String,
    },
    /// Delete a download and its file
    Delete {
        id: String,
    },
    /// Remove completed downloads from history
    ClearCompleted,
}

async fn load_config(cli: &Cli) -> anyhow::Result<CoreConfig> {
    let mut config = match &cli.config {
        Some(path) => CoreConfig::load(path)
            .await
            .with_context(|| format!("loading {}", path.display()))?,
        None => CoreConfig::default(),
    };

    if let Some(output) = &cli.output {
        config.download.output_directory = output.clone();
    }

    Ok(config)
}

async fn wait_and_report(core: &TubeFetchCore, id: &str) -> anyhow::Result<()> {
    match core.manager().wait(id).await {
        Some(WorkerOutcome::Completed { record }) => {
            println!("✓ {} ({})", record.title, record.file_size);
            if let Some(path) = record.download_path {
                println!("  {}", path);
            }
            Ok(())
        }
        Some(WorkerOutcome::Paused) => {
            println!("⏸ Paused {}", id);
            Ok(())
        }
        Some(WorkerOutcome::Failed { failure }) => bail!("Download failed: {:?}", failure),
        None => bail!("No worker running for {}", id),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let cli = Cli::parse();
    let config = load_config(&cli).await?;
    let core = TubeFetchCore::open(config, Arc::new(LogNotifier)).await?;

    let result = run(&core, cli.command).await;
    core.close().await?;
    result
}

async fn run(core: &TubeFetchCore, command: Commands) -> anyhow::Result<()> {
    let manager = core.manager();

    match command {
        Commands::Info { url } => {
            let info = manager.fetch_video_info(&url).await?;
            println!("{}", info.title);
            println!("  Channel:  {}", info.channel);
            println!("  Duration: {}", format_duration(info.duration));
            println!("  Views:    {}", format_view_count(info.view_count));
            println!("  Uploaded: {}", info.upload_date);
        }
        Commands::Download { url, quality, format } => {
            let quality = VideoQuality::from_label(&quality)?;
            let format = VideoFormat::from_extension(&format)?;

            let id = manager.enqueue_url(&url, quality, format).await?;
            println!("Started download {}", id);
            wait_and_report(core, &id).await?;
        }
        Commands::List => {
            let records = manager.list().await?;
            if records.is_empty() {
                println!("No downloads");
            }
            for record in records {
                println!(
                    "{}  {:<11} {:>5.1}%  {}",
                    record.id,
                    record.status.as_str(),
                    record.progress_percentage(),
                    record.title
                );
                if let Some(error) = record.error_message {
                    println!("    {}", error);
                }
            }
        }
        Commands::Pause { id } => {
            manager.pause(&id).await?;
            println!("Paused {}", id);
        }
        Commands::Retry { id } => {
            manager.retry(&id).await?;
            wait_and_report(core, &id).await?;
        }
        Commands::Delete { id } => {
            if manager.delete(&id).await? {
                println!("Deleted {}", id);
            } else {
                println!("No download with id {}", id);
            }
        }
        Commands::ClearCompleted => {
            let cleared = manager.clear_completed().await?;
            println!("Cleared {} completed downloads", cleared);
        }
    }

    Ok(())
}
