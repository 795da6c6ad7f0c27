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

use std::fmt;

/// Result type for worker operations.
pub type WorkResult<T = ()> = std::result::Result<T, WorkError>;

/// Error severity level for worker operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// The loop logs the error and runs again on the next tick.
    Transient,

    /// The loop stops after calling `on_shutdown()`.
    Fatal,
}

/// Errors that can occur during worker execution.
///
/// # Example
///
/// ```rust
/// use bookdrop_common_worker::{WorkError, WorkResult};
///
/// fn poll_once(reachable: bool) -> WorkResult {
///     if !reachable {
///         return Err(WorkError::transient("service temporarily unavailable"));
///     }
///     Ok(())
/// }
///
/// assert!(poll_once(false).unwrap_err().is_transient());
/// ```
#[derive(Debug)]
pub struct WorkError {
    severity: ErrorSeverity,
    message:  String,
    source:   Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl WorkError {
    /// Creates a new transient error.
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            severity: ErrorSeverity::Transient,
            message:  message.into(),
            source:   None,
        }
    }

    /// Creates a new fatal error.
    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            severity: ErrorSeverity::Fatal,
            message:  message.into(),
            source:   None,
        }
    }

    /// Creates a transient error with a source error.
    pub fn transient_with_source<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            severity: ErrorSeverity::Transient,
            message:  message.into(),
            source:   Some(Box::new(source)),
        }
    }

    /// Creates a fatal error with a source error.
    pub fn fatal_with_source<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            severity: ErrorSeverity::Fatal,
            message:  message.into(),
            source:   Some(Box::new(source)),
        }
    }

    pub const fn severity(&self) -> ErrorSeverity { self.severity }

    pub fn is_fatal(&self) -> bool { self.severity == ErrorSeverity::Fatal }

    pub fn is_transient(&self) -> bool { self.severity == ErrorSeverity::Transient }

    pub fn message(&self) -> &str { &self.message }
}

impl fmt::Display for WorkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = match self.severity {
            ErrorSeverity::Transient => "transient",
            ErrorSeverity::Fatal => "fatal",
        };
        write!(f, "[{}] {}", severity, self.message)
    }
}

impl std::error::Error for WorkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}
