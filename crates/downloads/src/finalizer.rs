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

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use snafu::ResultExt;
use tokio::fs;
use tracing::{info, warn};

use crate::{
    error::{CopySnafu, CreateLibrarySnafu, FinalizeError},
    service::{DownloadId, DownloadService},
};

/// Book name for a file name or path: the directory and the last extension
/// are stripped. `"/a/b/Moon.v2.bloompub"` becomes `"Moon.v2"`.
#[must_use]
pub fn book_name(path: &str) -> &str {
    let file_name = path.rsplit('/').next().unwrap_or(path);
    file_name
        .rfind('.')
        .map_or(file_name, |dot| &file_name[..dot])
}

/// What finalizing a download produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Finalized {
    /// The book is now at this library path.
    Moved(PathBuf),
    /// There was no temporary file, so nothing was produced. Another
    /// coordinator sharing the directory may have moved it already.
    Missing,
}

/// Moves completed downloads into the library.
pub struct FileFinalizer {
    library_dir: PathBuf,
    extension:   String,
    service:     Arc<dyn DownloadService>,
}

impl FileFinalizer {
    pub fn new(library_dir: PathBuf, extension: String, service: Arc<dyn DownloadService>) -> Self {
        Self {
            library_dir,
            extension,
            service,
        }
    }

    /// Library path a temporary file finalizes to.
    #[must_use]
    pub fn canonical_path(&self, temp: &Path, id: DownloadId) -> PathBuf {
        let name = temp
            .file_name()
            .map(|name| book_name(&name.to_string_lossy()).to_owned())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| id.to_string());
        self.library_dir.join(format!("{name}.{}", self.extension))
    }

    /// Copy `temp` into the library, delete it and deregister `id` with the
    /// service.
    ///
    /// A missing `temp` is not an error: the id is deregistered and
    /// [`Finalized::Missing`] returned. On a copy failure the temporary file
    /// and the service entry are left alone.
    pub async fn finalize(&self, temp: &Path, id: DownloadId) -> Result<Finalized, FinalizeError> {
        if !fs::try_exists(temp).await.unwrap_or(false) {
            info!(download_id = %id, path = %temp.display(), "finished download has no file, ignoring");
            self.deregister(id).await;
            return Ok(Finalized::Missing);
        }

        fs::create_dir_all(&self.library_dir)
            .await
            .context(CreateLibrarySnafu {
                path: &self.library_dir,
            })?;
        let dest = self.canonical_path(temp, id);
        fs::copy(temp, &dest).await.context(CopySnafu {
            from: temp,
            to:   &dest,
        })?;

        if let Err(e) = fs::remove_file(temp).await {
            warn!(path = %temp.display(), error = %e, "failed to delete temporary download");
        }
        // With the file gone, removing the entry can no longer delete it.
        self.deregister(id).await;

        info!(download_id = %id, path = %dest.display(), "book added to library");
        Ok(Finalized::Moved(dest))
    }

    async fn deregister(&self, id: DownloadId) {
        if let Err(e) = self.service.remove(id).await {
            warn!(download_id = %id, error = %e, "failed to remove download from service");
        }
    }
}
