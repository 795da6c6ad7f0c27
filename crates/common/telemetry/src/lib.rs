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

//! # Telemetry
//!
//! Structured logging and panic reporting shared by every bookdrop crate.
//!
//! - **[`logging`]**: `tracing` subscriber setup with stdout, rotating file
//!   and error-only file outputs in text or JSON format
//! - **[`panic_hook`]**: panics reported as tracing error events with a
//!   backtrace
//!
//! ```rust,no_run
//! use bookdrop_common_telemetry::{
//!     logging::{LoggingOptions, init_global_logging},
//!     panic_hook::set_panic_hook,
//! };
//!
//! let _guards = init_global_logging("bookdrop", &LoggingOptions::default());
//! set_panic_hook();
//! tracing::info!("ready");
//! ```

pub mod logging;
pub mod panic_hook;
