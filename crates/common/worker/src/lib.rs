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

//! Cancellable interval workers.
//!
//! A [`Worker`] defines one unit of work; [`spawn_interval`] runs it on a
//! fixed period on the tokio runtime until one of:
//! - the worker calls [`WorkerContext::stop`] (e.g. it ran out of work)
//! - the owner calls [`WorkerHandle::cancel`]
//! - `work()` returns a fatal [`WorkError`]
//!
//! Lifecycle hooks `on_start` and `on_shutdown` bracket the loop, and
//! `on_shutdown` runs on every exit path.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use bookdrop_common_worker::{WorkResult, Worker, WorkerContext, spawn_interval};
//!
//! struct Ticker {
//!     remaining: u32,
//! }
//!
//! #[async_trait::async_trait]
//! impl Worker for Ticker {
//!     fn name() -> &'static str { "ticker" }
//!
//!     async fn work(&mut self, ctx: &WorkerContext) -> WorkResult {
//!         self.remaining -= 1;
//!         if self.remaining == 0 {
//!             ctx.stop();
//!         }
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let handle = spawn_interval(Ticker { remaining: 3 }, Duration::from_millis(500));
//!     handle.join().await;
//! }
//! ```

mod context;
mod driver;
mod err;
mod handle;
mod worker;

pub use context::WorkerContext;
pub use err::{ErrorSeverity, WorkError, WorkResult};
pub use handle::WorkerHandle;
pub use worker::{Worker, spawn_interval, spawn_interval_with_token};
