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

#![allow(dead_code)]

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
    time::Duration,
};

use bookdrop_downloads::{
    CompletionNotice, DownloadCoordinator, DownloadId, DownloadQuery, DownloadRequest,
    DownloadService, DownloadStatus, DownloadsConfig, DownloadsHost, InstanceDirectory,
    ServiceError,
};
use jiff::SignedDuration;
use tempfile::TempDir;
use tokio::sync::broadcast;
use url::Url;

/// Scripted stand-in for an external download service. Tests drive status
/// changes and notices by hand.
pub struct FakeService {
    state:   Mutex<FakeState>,
    notices: broadcast::Sender<CompletionNotice>,
}

#[derive(Default)]
struct FakeState {
    next_id: u64,
    rows:    BTreeMap<DownloadId, Row>,
    removed: Vec<DownloadId>,
    titles:  Vec<String>,
}

struct Row {
    local_uri:  Option<String>,
    status:     DownloadStatus,
    total:      Option<u64>,
    downloaded: u64,
}

impl FakeService {
    pub fn new() -> Arc<Self> { Self::with_capacity(16) }

    pub fn with_capacity(capacity: usize) -> Arc<Self> {
        let (notices, _) = broadcast::channel(capacity);
        Arc::new(Self {
            state: Mutex::new(FakeState::default()),
            notices,
        })
    }

    fn insert(&self, local_uri: Option<String>, status: DownloadStatus) -> DownloadId {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = DownloadId::new(state.next_id);
        state.rows.insert(
            id,
            Row {
                local_uri,
                status,
                total: None,
                downloaded: 0,
            },
        );
        id
    }

    /// A row this process did not enqueue, e.g. one left over from a
    /// previous run.
    pub fn insert_existing(&self, path: &Path, status: DownloadStatus) -> DownloadId {
        self.insert(Some(file_uri(path)), status)
    }

    pub fn insert_raw(&self, local_uri: Option<&str>, status: DownloadStatus) -> DownloadId {
        self.insert(local_uri.map(str::to_owned), status)
    }

    pub fn set_running(&self, id: DownloadId, downloaded: u64, total: Option<u64>) {
        let mut state = self.state.lock().unwrap();
        let row = state.rows.get_mut(&id).unwrap();
        row.status = DownloadStatus::Running;
        row.downloaded = downloaded;
        row.total = total;
    }

    pub fn set_status(&self, id: DownloadId, status: DownloadStatus) {
        self.state.lock().unwrap().rows.get_mut(&id).unwrap().status = status;
    }

    pub fn notify(&self, id: DownloadId) { let _ = self.notices.send(CompletionNotice { id }); }

    pub fn complete(&self, id: DownloadId) {
        self.set_status(id, DownloadStatus::Successful);
        self.notify(id);
    }

    pub fn fail(&self, id: DownloadId) {
        self.set_status(id, DownloadStatus::Failed);
        self.notify(id);
    }

    pub fn removed(&self) -> Vec<DownloadId> { self.state.lock().unwrap().removed.clone() }

    pub fn contains(&self, id: DownloadId) -> bool { self.state.lock().unwrap().rows.contains_key(&id) }

    pub fn titles(&self) -> Vec<String> { self.state.lock().unwrap().titles.clone() }

    pub fn destination(&self, id: DownloadId) -> PathBuf {
        let state = self.state.lock().unwrap();
        let uri = state.rows[&id].local_uri.clone().unwrap();
        Url::parse(&uri).unwrap().to_file_path().unwrap()
    }
}

fn file_uri(path: &Path) -> String { Url::from_file_path(path).unwrap().to_string() }

#[async_trait::async_trait]
impl DownloadService for FakeService {
    async fn enqueue(&self, request: DownloadRequest) -> Result<DownloadId, ServiceError> {
        if let Some(title) = request.title {
            self.state.lock().unwrap().titles.push(title);
        }
        Ok(self.insert(Some(file_uri(&request.destination)), DownloadStatus::Pending))
    }

    async fn query(&self, id: DownloadId) -> Result<Option<DownloadQuery>, ServiceError> {
        let state = self.state.lock().unwrap();
        Ok(state.rows.get(&id).map(|row| to_query(id, row)))
    }

    async fn query_all(&self) -> Result<Vec<DownloadQuery>, ServiceError> {
        let state = self.state.lock().unwrap();
        Ok(state.rows.iter().map(|(id, row)| to_query(*id, row)).collect())
    }

    async fn remove(&self, id: DownloadId) -> Result<(), ServiceError> {
        let row = {
            let mut state = self.state.lock().unwrap();
            state.removed.push(id);
            state.rows.remove(&id)
        };
        if let Some(path) = row
            .and_then(|row| row.local_uri)
            .and_then(|uri| Url::parse(&uri).ok())
            .and_then(|url| url.to_file_path().ok())
        {
            let _ = std::fs::remove_file(path);
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<CompletionNotice> { self.notices.subscribe() }
}

fn to_query(id: DownloadId, row: &Row) -> DownloadQuery {
    DownloadQuery {
        id,
        status: row.status,
        bytes_total: row.total,
        bytes_downloaded: row.downloaded,
        local_uri: row.local_uri.clone(),
    }
}

#[derive(Default)]
pub struct RecordingHost {
    pub added:    Mutex<Vec<PathBuf>>,
    pub opened:   Mutex<Vec<PathBuf>>,
    pub returned: Mutex<usize>,
    pub failed:   Mutex<Vec<DownloadId>>,
}

impl DownloadsHost for RecordingHost {
    fn book_added(&self, book: &Path) { self.added.lock().unwrap().push(book.to_path_buf()); }

    fn open_book(&self, book: &Path) { self.opened.lock().unwrap().push(book.to_path_buf()); }

    fn return_to_library(&self) { *self.returned.lock().unwrap() += 1; }

    fn download_failed(&self, id: DownloadId) { self.failed.lock().unwrap().push(id); }
}

/// Everything a coordinator test needs, rooted in a temporary directory.
pub struct Harness {
    pub root:      TempDir,
    pub config:    DownloadsConfig,
    pub service:   Arc<FakeService>,
    pub host:      Arc<RecordingHost>,
    pub instances: InstanceDirectory,
}

impl Harness {
    pub fn new() -> Self { Self::with_service(FakeService::new()) }

    pub fn with_service(service: Arc<FakeService>) -> Self {
        bookdrop_common_telemetry::logging::init_default_ut_logging();
        let root = TempDir::new().unwrap();
        let config = DownloadsConfig::builder()
            .staging_root(root.path().join("stage"))
            .library_dir(root.path().join("library"))
            .poll_interval(SignedDuration::from_millis(20))
            .build();
        Self {
            root,
            config,
            service,
            host: Arc::new(RecordingHost::default()),
            instances: InstanceDirectory::new(),
        }
    }

    pub fn coordinator(&self) -> DownloadCoordinator {
        DownloadCoordinator::attach(
            &self.instances,
            &self.config,
            self.service.clone(),
            self.host.clone(),
        )
    }

    pub fn staging_dir(&self) -> PathBuf { self.config.staging_dir() }

    pub fn library_book(&self, name: &str) -> PathBuf {
        self.config.library_dir.join(format!("{name}.bloompub"))
    }

    pub fn staged_files(&self) -> Vec<PathBuf> {
        match std::fs::read_dir(self.staging_dir()) {
            Ok(entries) => entries.map(|entry| entry.unwrap().path()).collect(),
            Err(_) => Vec::new(),
        }
    }
}

/// Wait until `check` holds, failing the test after two seconds.
pub async fn eventually(what: &str, mut check: impl FnMut() -> bool) {
    let waited = tokio::time::timeout(Duration::from_secs(2), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "timed out waiting for: {what}");
}

/// Give background tasks a chance to (wrongly) act.
pub async fn pause() { tokio::time::sleep(Duration::from_millis(100)).await; }
