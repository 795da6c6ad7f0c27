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

use tokio_util::sync::CancellationToken;

/// Context passed to each worker invocation.
#[derive(Clone)]
pub struct WorkerContext {
    name:         &'static str,
    cancel_token: CancellationToken,
}

impl WorkerContext {
    pub(crate) const fn new(name: &'static str, cancel_token: CancellationToken) -> Self {
        Self { name, cancel_token }
    }

    /// Worker name, for logging.
    pub const fn name(&self) -> &'static str { self.name }

    /// Check if cancellation has been requested.
    pub fn is_cancelled(&self) -> bool { self.cancel_token.is_cancelled() }

    /// Wait for cancellation signal.
    pub async fn cancelled(&self) { self.cancel_token.cancelled().await }

    /// Ask the loop to finish after the current iteration.
    ///
    /// Equivalent to cancelling from the owning handle; `on_shutdown` still
    /// runs.
    pub fn stop(&self) { self.cancel_token.cancel() }

    /// Get a child cancellation token for sub-tasks.
    pub fn child_token(&self) -> CancellationToken { self.cancel_token.child_token() }
}
