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

//! Download lifecycle coordination for bookdrop.
//!
//! A [`DownloadCoordinator`] hands requests to an external
//! [`DownloadService`], polls it for progress while anything is in flight,
//! reacts to its completion notices by moving finished books from a shared
//! staging directory into the library, and tells every other live
//! coordinator in the same [`InstanceDirectory`] about it.
//!
//! ```text
//! start_download -> registry -> poller (every poll_interval)
//!                                  ^
//! completion notice ---------------+--> finalize -> fan out -> Presentation
//! ```
//!
//! Nothing is persisted besides the staging directory and the library. On
//! resume, [`DownloadCoordinator::refresh_from_external_state`] rebuilds the
//! in-memory state from the service's own ledger.

mod config;
mod coordinator;
pub mod error;
mod finalizer;
mod host;
mod instances;
mod janitor;
mod poller;
mod presentation;
mod reconcile;
mod registry;
mod service;

pub use config::DownloadsConfig;
pub use coordinator::{DownloadCoordinator, book_name_from_url};
pub use error::{ConfigError, CoordinatorError, FinalizeError, ServiceError};
pub use finalizer::{FileFinalizer, Finalized, book_name};
pub use host::{DownloadsHost, NoopHost};
pub use instances::{InstanceDirectory, InstanceId};
pub use janitor::DirectoryJanitor;
pub use presentation::Presentation;
pub use registry::{DownloadRecord, DownloadRegistry, PollerLease};
pub use service::{
    CompletionNotice, DownloadId, DownloadQuery, DownloadRequest, DownloadService, DownloadStatus,
    HttpDownloadService,
};
