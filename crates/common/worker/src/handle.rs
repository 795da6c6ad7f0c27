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

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Handle to a spawned worker.
///
/// Dropping the handle does not stop the worker; call [`cancel`](Self::cancel)
/// for that.
pub struct WorkerHandle {
    name:         &'static str,
    cancel_token: CancellationToken,
    join:         JoinHandle<()>,
}

impl WorkerHandle {
    pub(crate) const fn new(
        name: &'static str,
        cancel_token: CancellationToken,
        join: JoinHandle<()>,
    ) -> Self {
        Self {
            name,
            cancel_token,
            join,
        }
    }

    pub const fn name(&self) -> &'static str { self.name }

    /// Request the worker to stop. It finishes its current iteration, runs
    /// `on_shutdown`, then exits.
    pub fn cancel(&self) { self.cancel_token.cancel() }

    /// Whether a stop has been requested, by the owner or by the worker
    /// itself.
    pub fn is_cancelled(&self) -> bool { self.cancel_token.is_cancelled() }

    /// Whether the worker task has exited.
    pub fn is_finished(&self) -> bool { self.join.is_finished() }

    /// Wait for the worker task to exit.
    pub async fn join(self) {
        if let Err(e) = self.join.await {
            tracing::warn!(worker = self.name, error = %e, "worker task did not exit cleanly");
        }
    }
}

impl std::fmt::Debug for WorkerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerHandle")
            .field("name", &self.name)
            .field("cancelled", &self.is_cancelled())
            .field("finished", &self.is_finished())
            .finish()
    }
}
