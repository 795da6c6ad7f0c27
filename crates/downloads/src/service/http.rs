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
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use futures::StreamExt;
use parking_lot::Mutex;
use snafu::{ResultExt, ensure};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
    sync::broadcast,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use super::{CompletionNotice, DownloadId, DownloadQuery, DownloadRequest, DownloadService, DownloadStatus};
use crate::error::{IoSnafu, RejectedSnafu, ServiceError, TransferSnafu};

const NOTICE_CAPACITY: usize = 64;

/// In-process download service backed by `reqwest`.
///
/// Each request runs on its own task and moves through
/// `Pending -> Running -> Successful | Failed`. The ledger lives in memory, so
/// it does not survive a restart.
#[derive(Clone)]
pub struct HttpDownloadService {
    shared: Arc<Shared>,
}

struct Shared {
    client:  reqwest::Client,
    next_id: AtomicU64,
    entries: Mutex<HashMap<DownloadId, Entry>>,
    notices: broadcast::Sender<CompletionNotice>,
}

struct Entry {
    destination:      PathBuf,
    status:           DownloadStatus,
    bytes_total:      Option<u64>,
    bytes_downloaded: u64,
    cancel:           CancellationToken,
}

impl Default for HttpDownloadService {
    fn default() -> Self { Self::new() }
}

impl HttpDownloadService {
    #[must_use]
    pub fn new() -> Self { Self::with_client(reqwest::Client::new()) }

    #[must_use]
    pub fn with_client(client: reqwest::Client) -> Self {
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                client,
                next_id: AtomicU64::new(1),
                entries: Mutex::new(HashMap::new()),
                notices,
            }),
        }
    }
}

impl Shared {
    /// Apply `f` to the entry if it is still in the ledger.
    fn update(&self, id: DownloadId, f: impl FnOnce(&mut Entry)) {
        if let Some(entry) = self.entries.lock().get_mut(&id) {
            f(entry);
        }
    }

    async fn fetch(&self, id: DownloadId, request: &DownloadRequest) -> Result<(), ServiceError> {
        let url = request.url.as_str();
        let response = self
            .client
            .get(request.url.clone())
            .send()
            .await
            .context(TransferSnafu { url })?;

        ensure!(
            response.status().is_success(),
            RejectedSnafu {
                url,
                reason: format!("HTTP {}", response.status()),
            }
        );

        let total = response.content_length();
        self.update(id, |entry| {
            entry.status = DownloadStatus::Running;
            entry.bytes_total = total;
        });

        if let Some(parent) = request.destination.parent() {
            fs::create_dir_all(parent)
                .await
                .context(IoSnafu { path: parent })?;
        }
        let path = request.destination.as_path();
        let mut file = File::create(path).await.context(IoSnafu { path })?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.context(TransferSnafu { url })?;
            file.write_all(&chunk).await.context(IoSnafu { path })?;
            self.update(id, |entry| entry.bytes_downloaded += chunk.len() as u64);
        }
        file.sync_all().await.context(IoSnafu { path })?;
        Ok(())
    }
}

async fn run_transfer(
    shared: Arc<Shared>,
    id: DownloadId,
    request: DownloadRequest,
    cancel: CancellationToken,
) {
    let result = tokio::select! {
        biased;
        () = cancel.cancelled() => {
            debug!(download_id = %id, "transfer aborted");
            remove_if_present(&request.destination).await.ok();
            return;
        }
        result = shared.fetch(id, &request) => result,
    };

    match result {
        Ok(()) => {
            info!(download_id = %id, path = %request.destination.display(), "transfer finished");
            shared.update(id, |entry| {
                entry.status = DownloadStatus::Successful;
                if entry.bytes_total.is_none() {
                    entry.bytes_total = Some(entry.bytes_downloaded);
                }
            });
        }
        Err(e) => {
            warn!(download_id = %id, url = %request.url, error = %e, "transfer failed");
            if let Err(e) = remove_if_present(&request.destination).await {
                warn!(download_id = %id, error = %e, "failed to delete partial download");
            }
            shared.update(id, |entry| entry.status = DownloadStatus::Failed);
        }
    }

    // Nobody listening is fine; the ledger still has the final status.
    let _ = shared.notices.send(CompletionNotice { id });
}

async fn remove_if_present(path: &Path) -> std::io::Result<()> {
    match fs::remove_file(path).await {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

fn snapshot(id: DownloadId, entry: &Entry) -> DownloadQuery {
    DownloadQuery {
        id,
        status: entry.status,
        bytes_total: entry.bytes_total,
        bytes_downloaded: entry.bytes_downloaded,
        local_uri: Url::from_file_path(&entry.destination)
            .ok()
            .map(String::from),
    }
}

#[async_trait::async_trait]
impl DownloadService for HttpDownloadService {
    async fn enqueue(&self, request: DownloadRequest) -> Result<DownloadId, ServiceError> {
        let id = DownloadId::new(self.shared.next_id.fetch_add(1, Ordering::Relaxed));
        let cancel = CancellationToken::new();
        self.shared.entries.lock().insert(
            id,
            Entry {
                destination:      request.destination.clone(),
                status:           DownloadStatus::Pending,
                bytes_total:      None,
                bytes_downloaded: 0,
                cancel:           cancel.clone(),
            },
        );
        debug!(
            download_id = %id,
            url = %request.url,
            title = request.title.as_deref().unwrap_or_default(),
            "download queued"
        );
        tokio::spawn(run_transfer(self.shared.clone(), id, request, cancel));
        Ok(id)
    }

    async fn query(&self, id: DownloadId) -> Result<Option<DownloadQuery>, ServiceError> {
        Ok(self
            .shared
            .entries
            .lock()
            .get(&id)
            .map(|entry| snapshot(id, entry)))
    }

    async fn query_all(&self) -> Result<Vec<DownloadQuery>, ServiceError> {
        let mut all: Vec<_> = self
            .shared
            .entries
            .lock()
            .iter()
            .map(|(id, entry)| snapshot(*id, entry))
            .collect();
        all.sort_by_key(|query| query.id);
        Ok(all)
    }

    async fn remove(&self, id: DownloadId) -> Result<(), ServiceError> {
        let Some(entry) = self.shared.entries.lock().remove(&id) else {
            return Ok(());
        };
        entry.cancel.cancel();
        let path = entry.destination;
        remove_if_present(&path).await.context(IoSnafu { path: &path })?;
        debug!(download_id = %id, "download removed");
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<CompletionNotice> { self.shared.notices.subscribe() }
}
