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

use std::path::PathBuf;

use snafu::Snafu;

/// Failures reported by a [`DownloadService`](crate::DownloadService)
/// implementation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ServiceError {
    #[snafu(display("Download service rejected {url}: {reason}"))]
    Rejected {
        url:    String,
        reason: String,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(display("I/O error at {}: {source}", path.display()))]
    Io {
        path:   PathBuf,
        #[snafu(source)]
        source: std::io::Error,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(display("Transfer of {url} failed: {source}"))]
    Transfer {
        url:    String,
        #[snafu(source)]
        source: reqwest::Error,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },
}

/// Failures surfaced to the host by
/// [`DownloadCoordinator::start_download`](crate::DownloadCoordinator::start_download).
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum CoordinatorError {
    #[snafu(display("Invalid download URL {url}"))]
    InvalidUrl {
        url:    String,
        #[snafu(source)]
        source: url::ParseError,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(display("Download URL {url} does not name a file"))]
    MissingFileName {
        url: String,
        #[snafu(implicit)]
        loc: snafu::Location,
    },

    #[snafu(display("Failed to prepare staging directory {}", path.display()))]
    Staging {
        path:   PathBuf,
        #[snafu(source)]
        source: std::io::Error,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(display("Download service refused the request"))]
    Service {
        #[snafu(source)]
        source: ServiceError,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },
}

/// A finished download could not be moved into the library. The temporary
/// file is left where it was.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum FinalizeError {
    #[snafu(display("Failed to create library directory {}", path.display()))]
    CreateLibrary {
        path:   PathBuf,
        #[snafu(source)]
        source: std::io::Error,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(display("Failed to copy {} to {}", from.display(), to.display()))]
    Copy {
        from:   PathBuf,
        to:     PathBuf,
        #[snafu(source)]
        source: std::io::Error,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ConfigError {
    #[snafu(display("Failed to read settings file {}", path.display()))]
    ReadSettings {
        path:   PathBuf,
        #[snafu(source)]
        source: std::io::Error,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(display("Failed to parse settings file {}", path.display()))]
    ParseSettings {
        path:   PathBuf,
        #[snafu(source)]
        source: serde_json::Error,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(display("Poll interval in {} must be positive, got {interval}", path.display()))]
    InvalidPollInterval {
        path:     PathBuf,
        interval: jiff::SignedDuration,
        #[snafu(implicit)]
        loc:      snafu::Location,
    },
}
