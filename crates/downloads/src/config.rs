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
    time::Duration,
};

use bon::Builder;
use jiff::SignedDuration;
use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;
use snafu::{ResultExt, ensure};

use crate::error::{ConfigError, InvalidPollIntervalSnafu, ParseSettingsSnafu, ReadSettingsSnafu};

const MIN_POLL_PERIOD: Duration = Duration::from_millis(1);

/// Configuration for the download coordinator
#[derive(Debug, Clone, PartialEq, Eq, SmartDefault, Builder, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadsConfig {
    /// Directory the download service may write into (default: user cache
    /// dir / bookdrop)
    #[default(bookdrop_paths::staging_root().clone())]
    #[builder(default = bookdrop_paths::staging_root().clone(), into)]
    pub staging_root: PathBuf,

    /// Private subdirectory of `staging_root` holding in-flight downloads.
    /// Also used to recognise our downloads in the service's ledger.
    #[default("bl-downloads".to_string())]
    #[builder(default = "bl-downloads".to_string(), into)]
    pub staging_subdir: String,

    /// Where finished books are kept
    #[default(bookdrop_paths::library_dir().clone())]
    #[builder(default = bookdrop_paths::library_dir().clone(), into)]
    pub library_dir: PathBuf,

    /// Extension given to every staged and finalized book, without the dot
    #[default("bloompub".to_string())]
    #[builder(default = "bloompub".to_string(), into)]
    pub book_extension: String,

    /// How often the progress poller queries the service
    #[default(SignedDuration::from_millis(500))]
    #[builder(default = SignedDuration::from_millis(500))]
    pub poll_interval: SignedDuration,
}

impl DownloadsConfig {
    /// Load settings from a JSON file. A missing file yields the defaults; a
    /// poll interval that is not positive is rejected.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no settings file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(e).context(ReadSettingsSnafu { path }),
        };
        let config: Self = serde_json::from_str(&content).context(ParseSettingsSnafu { path })?;
        ensure!(
            config.poll_interval.is_positive(),
            InvalidPollIntervalSnafu {
                path,
                interval: config.poll_interval,
            }
        );
        Ok(config)
    }

    /// The private temporary destination directory.
    #[must_use]
    pub fn staging_dir(&self) -> PathBuf { self.staging_root.join(&self.staging_subdir) }

    /// Poller tick period, never shorter than one millisecond.
    #[must_use]
    pub fn poll_period(&self) -> Duration {
        if self.poll_interval.is_positive() {
            self.poll_interval.unsigned_abs().max(MIN_POLL_PERIOD)
        } else {
            MIN_POLL_PERIOD
        }
    }
}
