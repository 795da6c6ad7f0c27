// Copyright 2025 bookdrop developers
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::{path::PathBuf, sync::Arc};

use bookdrop_common_telemetry::{
    logging::{LoggingOptions, init_global_logging},
    panic_hook::set_panic_hook,
};
use bookdrop_downloads::{
    DirectoryJanitor, DownloadCoordinator, DownloadId, DownloadRegistry, DownloadsConfig,
    DownloadsHost, HttpDownloadService, InstanceDirectory, Presentation,
};
use clap::{Args, Parser, Subcommand};
use parking_lot::Mutex;
use snafu::{ResultExt, Whatever, whatever};
use tracing::{error, info, warn};

#[derive(Debug, Parser)]
#[clap(
    name = "bookdrop",
    about = "Download books into a local library",
    author = env!("CARGO_PKG_AUTHORS"),
    version = env!("CARGO_PKG_VERSION")
)]
struct Cli {
    /// Settings file (JSON). Defaults to the platform config directory.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log filter, e.g. `info` or `info,bookdrop_downloads=debug`.
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Keep all data (library, staging, logs, settings) under this directory.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    commands: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    Fetch(FetchArgs),
    Clean(CleanArgs),
}

#[derive(Debug, Clone, Args)]
#[command(flatten_help = true)]
#[command(long_about = r"

Download one or more books into the library.
Exits once every download has finished. Ctrl-C cancels all of them.
Examples:

bookdrop fetch https://example.org/books/Moon.bloompub

")]
struct FetchArgs {
    /// Book URLs
    #[arg(required = true)]
    urls: Vec<String>,
}

/// Collects what happened for the final report.
#[derive(Default)]
struct CliHost {
    added:  Mutex<Vec<PathBuf>>,
    failed: Mutex<Vec<DownloadId>>,
}

impl DownloadsHost for CliHost {
    fn book_added(&self, book: &std::path::Path) {
        self.added.lock().push(book.to_path_buf());
    }

    fn download_failed(&self, id: DownloadId) {
        self.failed.lock().push(id);
    }
}

impl FetchArgs {
    async fn run(self, config: &DownloadsConfig) -> Result<(), Whatever> {
        let host = Arc::new(CliHost::default());
        let coordinator = DownloadCoordinator::attach(
            &InstanceDirectory::new(),
            config,
            Arc::new(HttpDownloadService::new()),
            host.clone(),
        );
        coordinator.refresh_from_external_state().await;

        let mut started = 0;
        for url in &self.urls {
            match coordinator.start_download(url).await {
                Ok(id) => {
                    info!(download_id = %id, url, "download queued");
                    started += 1;
                }
                Err(e) => error!(url, error = %e, "cannot start download"),
            }
        }
        if started == 0 {
            whatever!("none of the downloads could be started");
        }

        let mut presentation = coordinator.subscribe_presentation();
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);
        while !coordinator.registry().is_empty() {
            tokio::select! {
                _ = &mut ctrl_c => {
                    warn!("interrupted, cancelling downloads");
                    coordinator.cancel_all_downloads().await;
                    whatever!("cancelled");
                }
                changed = presentation.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    if let Presentation::Downloading { percent, .. } = *presentation.borrow_and_update() {
                        info!(percent, "downloading");
                    }
                }
            }
        }

        let added = host.added.lock().clone();
        for book in &added {
            println!("{}", book.display());
        }
        let failed = host.failed.lock().len();
        if failed > 0 {
            whatever!("{failed} download(s) failed");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Args)]
#[command(flatten_help = true)]
#[command(long_about = r"

Delete leftover files from the staging directory.
Do not run while another bookdrop process is downloading.
Examples:

bookdrop clean

")]
struct CleanArgs {}

impl CleanArgs {
    async fn run(&self, config: &DownloadsConfig) -> Result<(), Whatever> {
        let janitor = DirectoryJanitor::new(config);
        let removed = janitor.cleanup_if_idle(&DownloadRegistry::new()).await;
        println!(
            "removed {removed} leftover file(s) from {}",
            janitor.dir().display()
        );
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Whatever> {
    let cli = Cli::parse();
    if let Some(dir) = &cli.data_dir {
        bookdrop_paths::set_custom_data_dir(dir);
    }

    let logging = LoggingOptions::builder()
        .dir(bookdrop_paths::logs_dir().display().to_string())
        .maybe_level(cli.log_level.clone())
        .build();
    let _guards = init_global_logging("bookdrop", &logging);
    set_panic_hook();

    let settings = cli
        .config
        .clone()
        .unwrap_or_else(|| bookdrop_paths::settings_file().clone());
    let config = DownloadsConfig::load(&settings)
        .with_whatever_context(|e| format!("failed to load {}: {e}", settings.display()))?;

    match cli.commands {
        Commands::Fetch(args) => args.run(&config).await,
        Commands::Clean(args) => args.run(&config).await,
    }
}
