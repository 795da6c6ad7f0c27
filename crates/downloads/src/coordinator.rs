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
    sync::{Arc, Weak},
    time::Duration,
};

use bookdrop_common_worker::{WorkerHandle, spawn_interval};
use parking_lot::Mutex;
use percent_encoding::percent_decode_str;
use snafu::{OptionExt, ResultExt};
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::{
    config::DownloadsConfig,
    error::{CoordinatorError, InvalidUrlSnafu, MissingFileNameSnafu, ServiceSnafu, StagingSnafu},
    finalizer::{FileFinalizer, Finalized, book_name},
    host::DownloadsHost,
    instances::{InstanceDirectory, InstanceId, InstanceMember},
    janitor::DirectoryJanitor,
    poller::ProgressPoller,
    presentation::Presentation,
    reconcile::{self, Plan},
    registry::{DownloadRecord, DownloadRegistry},
    service::{CompletionNotice, DownloadId, DownloadRequest, DownloadService, DownloadStatus},
};

/// Book name a download URL stages under, `None` if the URL names no file.
#[must_use]
pub fn book_name_from_url(url: &Url) -> Option<String> {
    let path = percent_decode_str(url.path()).decode_utf8_lossy();
    let name = book_name(&path);
    (!name.is_empty()).then(|| name.to_owned())
}

/// One live coordinator instance, typically one per visible UI surface.
///
/// Creating it attaches it to an [`InstanceDirectory`] and subscribes it to
/// the service's completion notices; dropping it (or calling
/// [`detach`](Self::detach)) undoes both and stops its poller. Downloads in
/// flight are left with the service and can be picked up again by
/// [`refresh_from_external_state`](Self::refresh_from_external_state).
pub struct DownloadCoordinator {
    inner:    Arc<Inner>,
    instance: InstanceId,
}

struct Inner {
    service:      Arc<dyn DownloadService>,
    host:         Arc<dyn DownloadsHost>,
    registry:     Arc<DownloadRegistry>,
    janitor:      DirectoryJanitor,
    finalizer:    FileFinalizer,
    instances:    InstanceDirectory,
    presentation: Arc<watch::Sender<Presentation>>,
    poller:       Mutex<Option<WorkerHandle>>,
    poll_period:  Duration,
    shutdown:     CancellationToken,
}

impl DownloadCoordinator {
    /// Create an instance and attach it to `instances`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn attach(
        instances: &InstanceDirectory,
        config: &DownloadsConfig,
        service: Arc<dyn DownloadService>,
        host: Arc<dyn DownloadsHost>,
    ) -> Self {
        let (presentation, _) = watch::channel(Presentation::Hidden);
        let inner = Arc::new(Inner {
            finalizer: FileFinalizer::new(
                config.library_dir.clone(),
                config.book_extension.clone(),
                service.clone(),
            ),
            janitor: DirectoryJanitor::new(config),
            registry: Arc::new(DownloadRegistry::new()),
            instances: instances.clone(),
            presentation: Arc::new(presentation),
            poller: Mutex::new(None),
            poll_period: config.poll_period(),
            shutdown: CancellationToken::new(),
            service,
            host,
        });

        // Subscribe before returning so no notice sent after `attach` is missed.
        let notices = inner.service.subscribe();
        let member: Weak<dyn InstanceMember> = Arc::downgrade(&inner) as Weak<dyn InstanceMember>;
        let instance = instances.attach(member);
        tokio::spawn(listen(Arc::downgrade(&inner), notices, inner.shutdown.clone()));

        info!(instance = %instance, staging = %inner.janitor.dir().display(), "download coordinator attached");
        Self { inner, instance }
    }

    /// Detach from the instance directory and stop listening.
    pub fn detach(self) { drop(self) }

    #[must_use]
    pub const fn instance_id(&self) -> InstanceId { self.instance }

    /// Watch what this instance wants shown.
    #[must_use]
    pub fn subscribe_presentation(&self) -> watch::Receiver<Presentation> { self.inner.presentation.subscribe() }

    #[must_use]
    pub fn presentation(&self) -> Presentation { self.inner.presentation.borrow().clone() }

    #[must_use]
    pub fn registry(&self) -> &DownloadRegistry { &self.inner.registry }

    #[must_use]
    pub fn janitor(&self) -> &DirectoryJanitor { &self.inner.janitor }

    /// Whether a progress poller is currently running for this instance.
    #[must_use]
    pub fn is_polling(&self) -> bool {
        self.inner
            .poller
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stage and enqueue a download of `url`.
    ///
    /// The book name is the URL's last path segment, percent-decoded, without
    /// its extension.
    pub async fn start_download(&self, url: &str) -> Result<DownloadId, CoordinatorError> {
        let parsed = Url::parse(url).context(InvalidUrlSnafu { url })?;
        let book = book_name_from_url(&parsed).context(MissingFileNameSnafu { url })?;
        let destination = self
            .inner
            .janitor
            .destination_for(&book)
            .await
            .context(StagingSnafu {
                path: self.inner.janitor.dir(),
            })?;

        let request = DownloadRequest::builder()
            .url(parsed)
            .destination(destination.clone())
            .title(format!("Downloading {book}"))
            .build();
        let id = self.inner.service.enqueue(request).await.context(ServiceSnafu)?;

        info!(download_id = %id, book, "download started");
        self.inner.track(id, destination, &book);
        Ok(id)
    }

    /// Abort every tracked download, delete its temporary file and stop the
    /// poller. No completion is processed for the aborted downloads.
    pub async fn cancel_all_downloads(&self) {
        let records = self.inner.registry.clear();
        self.inner.stop_poller();

        for record in &records {
            if let Err(e) = self.inner.service.remove(record.id).await {
                warn!(download_id = %record.id, error = %e, "failed to cancel download");
            }
            delete_temp(&record.destination).await;
        }
        self.inner.registry.reset_multiple_if_empty();
        self.inner
            .presentation
            .send_if_modified(Presentation::drop_progress);
        info!(count = records.len(), "cancelled all downloads");
    }

    /// Rebuild this instance's state from the service's ledger. Call when
    /// the hosting surface becomes visible again.
    pub async fn refresh_from_external_state(&self) { self.inner.reconcile().await }

    /// Dismiss the ready message on every instance, then open the book this
    /// instance named, or go back to the library if it named none.
    pub fn dismiss_ready(&self) {
        let shown = self.inner.presentation.borrow().clone();
        self.inner.instances.clear_ready();
        match shown {
            Presentation::Ready { book: Some(book) } => self.inner.host.open_book(&book),
            _ => self.inner.host.return_to_library(),
        }
    }
}

impl Drop for DownloadCoordinator {
    fn drop(&mut self) {
        self.inner.instances.detach(self.instance);
        self.inner.shutdown.cancel();
        self.inner.stop_poller();
        debug!(instance = %self.instance, "download coordinator detached");
    }
}

impl std::fmt::Debug for DownloadCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadCoordinator")
            .field("instance", &self.instance)
            .field("active", &self.inner.registry.len())
            .finish_non_exhaustive()
    }
}

async fn listen(
    inner: Weak<Inner>,
    mut notices: broadcast::Receiver<CompletionNotice>,
    shutdown: CancellationToken,
) {
    loop {
        let received = tokio::select! {
            biased;
            () = shutdown.cancelled() => break,
            received = notices.recv() => received,
        };
        let Some(coordinator) = inner.upgrade() else { break };
        match received {
            Ok(notice) => coordinator.on_completion(notice.id).await,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "missed completion notices, checking tracked downloads");
                coordinator.sweep_finished().await;
            }
            Err(broadcast::error::RecvError::Closed) => {
                debug!("completion channel closed");
                break;
            }
        }
    }
}

async fn delete_temp(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "deleted temporary download"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "failed to delete temporary download"),
    }
}

impl Inner {
    fn track(&self, id: DownloadId, destination: PathBuf, book: &str) {
        let Some(active) = self.registry.put(id, destination) else {
            debug!(download_id = %id, "download already tracked");
            return;
        };
        self.presentation
            .send_modify(|presentation| presentation.download_added(book, active));
        self.ensure_poller();
    }

    /// Start a poller unless one holds the lease.
    fn ensure_poller(&self) {
        let Some(lease) = self.registry.claim_poller() else {
            return;
        };
        let poller = ProgressPoller::new(
            self.registry.clone(),
            self.service.clone(),
            self.presentation.clone(),
            lease,
        );
        let handle = spawn_interval(poller, self.poll_period);
        if let Some(previous) = self.poller.lock().replace(handle) {
            previous.cancel();
        }
    }

    fn stop_poller(&self) {
        if let Some(handle) = self.poller.lock().take() {
            handle.cancel();
        }
    }

    async fn on_completion(&self, id: DownloadId) {
        if !self.registry.contains(id) {
            debug!(download_id = %id, "completion for untracked download, ignoring");
            return;
        }

        let status = match self.service.query(id).await {
            Ok(query) => query.map(|query| query.status),
            Err(e) => {
                warn!(download_id = %id, error = %e, "failed to query finished download");
                None
            }
        };

        // Whoever removes the record owns the completion.
        let Some(record) = self.registry.remove(id) else {
            debug!(download_id = %id, "completion already handled");
            return;
        };

        if status == Some(DownloadStatus::Failed) {
            self.fail(record).await;
        } else {
            // A failed move keeps its temporary file for the next attempt.
            let moved = self.finish(record).await;
            self.settle(moved).await;
        }
    }

    /// Finalize a finished download and fan the result out. Returns false
    /// if the book could not be moved, in which case the temporary file must
    /// survive.
    async fn finish(&self, record: DownloadRecord) -> bool {
        let Some(_claim) = self.instances.claim_finalize(&record.destination) else {
            debug!(download_id = %record.id, "another instance is finalizing this download");
            return true;
        };
        match self.finalizer.finalize(&record.destination, record.id).await {
            Ok(Finalized::Moved(book)) => {
                self.host.book_added(&book);
                self.instances.notify_completion(&book);
                true
            }
            Ok(Finalized::Missing) => true,
            Err(e) => {
                error!(download_id = %record.id, error = %e, "failed to move download into library");
                false
            }
        }
    }

    async fn fail(&self, record: DownloadRecord) {
        warn!(download_id = %record.id, path = %record.destination.display(), "download failed");
        if let Err(e) = self.service.remove(record.id).await {
            warn!(download_id = %record.id, error = %e, "failed to remove download from service");
        }
        delete_temp(&record.destination).await;
        self.host.download_failed(record.id);
        self.settle(true).await;
    }

    /// Once nothing is tracked: clean the staging directory if asked to,
    /// leave multiple mode and drop a progress display nothing replaced.
    async fn settle(&self, cleanup: bool) {
        if !self.registry.is_empty() {
            return;
        }
        if cleanup {
            if self.instances.is_finalizing() {
                debug!("another instance is moving a staged file, skipping cleanup");
            } else {
                self.janitor.cleanup_if_idle(&self.registry).await;
            }
        }
        if self.registry.reset_multiple_if_empty() {
            self.presentation.send_if_modified(Presentation::drop_progress);
        }
    }

    /// Recover notices lost to a lagging subscription.
    async fn sweep_finished(&self) {
        for id in self.registry.ids() {
            match self.service.query(id).await {
                Ok(Some(query)) if !query.status.is_finished() => {}
                Ok(_) => self.on_completion(id).await,
                Err(e) => warn!(download_id = %id, error = %e, "failed to query download"),
            }
        }
    }

    async fn reconcile(&self) {
        self.presentation.send_if_modified(Presentation::drop_progress);
        self.registry.clear();
        self.stop_poller();

        let ledger = match self.service.query_all().await {
            Ok(ledger) => ledger,
            Err(e) => {
                warn!(error = %e, "failed to list downloads, nothing to reconcile");
                return;
            }
        };

        let mut all_moved = true;
        for query in &ledger {
            match reconcile::plan(&self.janitor, query) {
                Plan::NotOurs => {}
                Plan::Skip => debug!(download_id = %query.id, "skipping failed download"),
                Plan::Track { destination, book } => {
                    info!(download_id = %query.id, book, "resuming download");
                    self.track(query.id, destination, &book);
                }
                Plan::Finish { destination } => {
                    info!(download_id = %query.id, "download finished while away");
                    let record = DownloadRecord {
                        id: query.id,
                        destination,
                        progress: 100,
                    };
                    all_moved &= self.finish(record).await;
                }
            }
        }

        self.settle(all_moved).await;
        debug!(active = self.registry.len(), "reconciled with download service");
    }
}

impl InstanceMember for Inner {
    fn notify_completion(&self, book: &Path) {
        if !self.registry.is_empty() {
            debug!(book = %book.display(), "still downloading, keeping progress");
            return;
        }
        let ready = Presentation::ready(book, self.registry.multiple_recently());
        self.presentation.send_replace(ready);
    }

    fn clear_ready(&self) { self.presentation.send_if_modified(Presentation::drop_ready); }
}
