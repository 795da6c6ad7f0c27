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

//! Sorting the service's ledger into what a resumed coordinator should do
//! with each row.

use std::path::PathBuf;

use tracing::warn;
use url::Url;

use crate::{
    finalizer::book_name,
    janitor::DirectoryJanitor,
    service::{DownloadQuery, DownloadStatus},
};

/// What to do with one row of the service's ledger on resume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Plan {
    /// Not staged by us, or the reported location is unusable.
    NotOurs,
    /// Ours, but failed.
    Skip,
    /// Still transferring: track it again under this destination.
    Track { destination: PathBuf, book: String },
    /// Finished while nobody was listening: finalize it.
    Finish { destination: PathBuf },
}

/// Filesystem path of a `file://` URI reported by the service.
pub(crate) fn local_path(uri: &str) -> Option<PathBuf> {
    Url::parse(uri).ok()?.to_file_path().ok()
}

pub(crate) fn plan(janitor: &DirectoryJanitor, query: &DownloadQuery) -> Plan {
    let Some(uri) = query.local_uri.as_deref() else {
        return Plan::NotOurs;
    };
    let Some(destination) = local_path(uri) else {
        warn!(download_id = %query.id, uri, "cannot derive a path from service URI, skipping");
        return Plan::NotOurs;
    };
    if !janitor.owns(&destination) {
        return Plan::NotOurs;
    }

    match query.status {
        DownloadStatus::Failed => Plan::Skip,
        // Pending is tracked too, not skipped: an untracked id would have its
        // completion notice ignored as foreign.
        DownloadStatus::Pending | DownloadStatus::Running | DownloadStatus::Paused => {
            let book = book_name(&destination.to_string_lossy()).to_owned();
            Plan::Track { destination, book }
        }
        DownloadStatus::Successful => Plan::Finish { destination },
    }
}
