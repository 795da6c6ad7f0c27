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

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::{context::WorkerContext, driver::IntervalDriver, err::WorkResult, handle::WorkerHandle};

/// Core worker trait for background tasks.
///
/// Implementors only define single-shot execution logic in `work()`. The
/// framework handles looping, timing, and lifecycle management.
#[async_trait::async_trait]
pub trait Worker: Send + 'static {
    /// Worker name for logging and debugging.
    fn name() -> &'static str
    where
        Self: Sized;

    /// Called once before the first `work()` execution. A fatal error skips
    /// the loop entirely.
    async fn on_start(&mut self, _ctx: &WorkerContext) -> WorkResult { Ok(()) }

    /// Single execution unit, called on every tick.
    async fn work(&mut self, ctx: &WorkerContext) -> WorkResult;

    /// Called once after the last `work()` execution, on every exit path.
    async fn on_shutdown(&mut self, _ctx: &WorkerContext) -> WorkResult { Ok(()) }
}

/// Spawn `worker` on the current tokio runtime, running every `period`.
pub fn spawn_interval<W: Worker>(worker: W, period: Duration) -> WorkerHandle {
    spawn_interval_with_token(worker, period, CancellationToken::new())
}

/// Like [`spawn_interval`], but stops when `token` (or a parent of it) is
/// cancelled.
pub fn spawn_interval_with_token<W: Worker>(
    worker: W,
    period: Duration,
    token: CancellationToken,
) -> WorkerHandle {
    let name = W::name();
    let ctx = WorkerContext::new(name, token.clone());
    let join = tokio::spawn(run(worker, IntervalDriver::new(period), ctx));
    WorkerHandle::new(name, token, join)
}

async fn run<W: Worker>(mut worker: W, mut driver: IntervalDriver, ctx: WorkerContext) {
    let name = W::name();
    debug!(worker = name, "worker started");

    let started = match worker.on_start(&ctx).await {
        Ok(()) => true,
        Err(e) if e.is_transient() => {
            warn!(worker = name, error = %e, "worker start hook failed");
            true
        }
        Err(e) => {
            error!(worker = name, error = %e, "worker start hook failed, not running");
            false
        }
    };

    if started {
        while driver.wait_next(&ctx).await {
            match worker.work(&ctx).await {
                Ok(()) => {}
                Err(e) if e.is_transient() => {
                    warn!(worker = name, error = %e, "worker iteration failed");
                }
                Err(e) => {
                    error!(worker = name, error = %e, "worker stopped on fatal error");
                    break;
                }
            }
        }
    }

    if let Err(e) = worker.on_shutdown(&ctx).await {
        warn!(worker = name, error = %e, "worker shutdown hook failed");
    }
    debug!(worker = name, "worker stopped");
}
