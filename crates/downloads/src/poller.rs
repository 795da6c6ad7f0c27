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

use std::sync::Arc;

use bookdrop_common_worker::{WorkResult, Worker, WorkerContext};
use tokio::sync::watch;
use tracing::{debug, trace, warn};

use crate::{
    presentation::Presentation,
    registry::{DownloadRegistry, PollerLease},
    service::DownloadService,
};

/// Queries the service for every tracked download on each tick and
/// publishes the mean progress.
///
/// Stops itself once the registry is empty or its lease is revoked.
pub(crate) struct ProgressPoller {
    registry:     Arc<DownloadRegistry>,
    service:      Arc<dyn DownloadService>,
    presentation: Arc<watch::Sender<Presentation>>,
    lease:        PollerLease,
}

impl ProgressPoller {
    pub fn new(
        registry: Arc<DownloadRegistry>,
        service: Arc<dyn DownloadService>,
        presentation: Arc<watch::Sender<Presentation>>,
        lease: PollerLease,
    ) -> Self {
        Self {
            registry,
            service,
            presentation,
            lease,
        }
    }
}

#[async_trait::async_trait]
impl Worker for ProgressPoller {
    fn name() -> &'static str { "progress-poller" }

    async fn work(&mut self, ctx: &WorkerContext) -> WorkResult {
        if self.registry.retire_poller_if_idle(self.lease) {
            debug!("no downloads left to poll");
            ctx.stop();
            return Ok(());
        }

        for id in self.registry.ids() {
            if ctx.is_cancelled() {
                return Ok(());
            }
            match self.service.query(id).await {
                Ok(Some(query)) => {
                    if let Some(progress) = query.progress_percent() {
                        self.registry.set_progress(id, progress);
                    }
                }
                Ok(None) => trace!(download_id = %id, "service no longer knows download"),
                Err(e) => warn!(download_id = %id, error = %e, "failed to query download"),
            }
        }

        if let Some(aggregate) = self.registry.aggregate_progress() {
            trace!(percent = aggregate, "download progress");
            self.presentation
                .send_if_modified(|presentation| presentation.set_percent(aggregate));
        }
        Ok(())
    }
}
