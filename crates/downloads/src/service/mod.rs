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

//! The external download service, seen from the coordinator.
//!
//! The coordinator never moves bytes over the network itself. It hands a
//! [`DownloadRequest`] to a [`DownloadService`], polls it by id, and listens
//! on its completion channel. Ids are issued by the service and survive
//! process restarts on the service side.

mod http;

use std::path::PathBuf;

use bon::Builder;
use derive_more::{Display, From};
use serde::{Deserialize, Serialize};
use strum_macros::{Display as StrumDisplay, EnumString};
use tokio::sync::broadcast;
use url::Url;

pub use self::http::HttpDownloadService;
use crate::error::ServiceError;

/// Identifier issued by the download service.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, From, Serialize, Deserialize,
)]
#[display("{_0}")]
pub struct DownloadId(u64);

impl DownloadId {
    #[must_use]
    pub const fn new(raw: u64) -> Self { Self(raw) }

    #[must_use]
    pub const fn get(self) -> u64 { self.0 }
}

/// Status of a download as reported by the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, StrumDisplay, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
pub enum DownloadStatus {
    /// Accepted but not started
    Pending,
    /// Transferring bytes
    Running,
    /// Held by the service, will resume on its own
    Paused,
    /// Finished, the file is at the local URI
    Successful,
    /// Gave up
    Failed,
}

impl DownloadStatus {
    /// Whether the service is done with this download, successfully or not.
    #[must_use]
    pub const fn is_finished(self) -> bool { matches!(self, Self::Successful | Self::Failed) }
}

/// One row of the service's ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadQuery {
    pub id:               DownloadId,
    pub status:           DownloadStatus,
    /// Unknown until the transfer has seen a length
    pub bytes_total:      Option<u64>,
    pub bytes_downloaded: u64,
    /// `file://` URI of the file the service writes to
    pub local_uri:        Option<String>,
}

impl DownloadQuery {
    /// Progress this row implies, if it implies one.
    ///
    /// Running downloads report `floor(downloaded * 100 / total)` once the
    /// total is known; successful ones report 100. Every other status leaves
    /// the previous value in place.
    #[must_use]
    pub fn progress_percent(&self) -> Option<u8> {
        match self.status {
            DownloadStatus::Running => {
                let total = self.bytes_total.filter(|total| *total > 0)?;
                let percent = (u128::from(self.bytes_downloaded) * 100 / u128::from(total)).min(100);
                u8::try_from(percent).ok()
            }
            DownloadStatus::Successful => Some(100),
            DownloadStatus::Pending | DownloadStatus::Paused | DownloadStatus::Failed => None,
        }
    }
}

/// Pushed by the service once per finished download, successful or not.
/// Delivery is at-least-once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionNotice {
    pub id: DownloadId,
}

/// A request to download a file into a given destination
#[derive(Debug, Clone, Builder)]
pub struct DownloadRequest {
    /// URL to download from
    pub url:         Url,
    /// Path the service should write the file to
    #[builder(into)]
    pub destination: PathBuf,
    /// Human readable title shown by services that show one
    #[builder(into)]
    pub title:       Option<String>,
}

/// An out-of-process (or at least out-of-coordinator) download manager.
#[async_trait::async_trait]
pub trait DownloadService: Send + Sync + 'static {
    /// Queue a request and return its id. The transfer happens in the
    /// background.
    async fn enqueue(&self, request: DownloadRequest) -> Result<DownloadId, ServiceError>;

    /// Current state of one download, `None` if the service does not know
    /// the id.
    async fn query(&self, id: DownloadId) -> Result<Option<DownloadQuery>, ServiceError>;

    /// Every download the service knows about, whoever started it.
    async fn query_all(&self) -> Result<Vec<DownloadQuery>, ServiceError>;

    /// Forget a download, aborting it if it is still transferring and
    /// deleting its file if the file is still where the service put it.
    async fn remove(&self, id: DownloadId) -> Result<(), ServiceError>;

    /// Subscribe to completion notices.
    fn subscribe(&self) -> broadcast::Receiver<CompletionNotice>;
}
