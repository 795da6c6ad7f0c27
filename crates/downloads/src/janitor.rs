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

use std::path::{MAIN_SEPARATOR, Path, PathBuf};

use tokio::fs;
use tracing::{debug, info, warn};

use crate::{config::DownloadsConfig, registry::DownloadRegistry};

/// Owns the shared temporary destination directory.
#[derive(Debug, Clone)]
pub struct DirectoryJanitor {
    dir:       PathBuf,
    /// `/<subdir>/`, matched against paths reported by the service
    marker:    String,
    extension: String,
}

impl DirectoryJanitor {
    #[must_use]
    pub fn new(config: &DownloadsConfig) -> Self {
        Self {
            dir:       config.staging_dir(),
            marker:    format!("{MAIN_SEPARATOR}{}{MAIN_SEPARATOR}", config.staging_subdir),
            extension: config.book_extension.clone(),
        }
    }

    #[must_use]
    pub fn dir(&self) -> &Path { &self.dir }

    /// `<staging dir>/<name>.<extension>`, creating the directory if needed.
    pub async fn destination_for(&self, name: &str) -> std::io::Result<PathBuf> {
        fs::create_dir_all(&self.dir).await?;
        Ok(self.dir.join(format!("{name}.{}", self.extension)))
    }

    /// Whether `path` lies under a directory named like ours. This is a
    /// plain string check: the service knows nothing else about who started
    /// a download.
    #[must_use]
    pub fn owns(&self, path: &Path) -> bool { path.to_string_lossy().contains(&self.marker) }

    /// Delete every file in the staging directory, unless a download is
    /// still tracked. Returns how many files were deleted.
    pub async fn cleanup_if_idle(&self, registry: &DownloadRegistry) -> usize {
        if !registry.is_empty() {
            debug!(active = registry.len(), "downloads in flight, skipping cleanup");
            return 0;
        }

        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return 0,
            Err(e) => {
                warn!(dir = %self.dir.display(), error = %e, "failed to list staging directory");
                return 0;
            }
        };

        let mut removed = 0;
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!(dir = %self.dir.display(), error = %e, "failed to read staging directory");
                    break;
                }
            };
            let path = entry.path();
            if !entry.file_type().await.is_ok_and(|t| t.is_file()) {
                continue;
            }
            match fs::remove_file(&path).await {
                Ok(()) => removed += 1,
                Err(e) => warn!(path = %path.display(), error = %e, "failed to delete leftover"),
            }
        }

        if removed > 0 {
            info!(count = removed, dir = %self.dir.display(), "cleaned up staging directory");
        }
        removed
    }
}
