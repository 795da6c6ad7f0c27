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
    sync::OnceLock,
};

static HOME_DIR: OnceLock<PathBuf> = OnceLock::new();

/// A custom data directory override, set only by `set_custom_data_dir`.
static CUSTOM_DATA_DIR: OnceLock<PathBuf> = OnceLock::new();

/// The resolved data directory, combining custom override or platform defaults.
/// On macOS, this is `~/Library/Application Support/Bookdrop`.
/// On Linux/FreeBSD, this is `$XDG_DATA_HOME/bookdrop`.
static CURRENT_DATA_DIR: OnceLock<PathBuf> = OnceLock::new();

/// The resolved config directory.
/// On Linux/FreeBSD, this is `$XDG_CONFIG_HOME/bookdrop`.
static CONFIG_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Returns the path to the user's home directory, or the system temp
/// directory on platforms without one.
pub fn home_dir() -> &'static PathBuf {
    HOME_DIR.get_or_init(|| dirs::home_dir().unwrap_or_else(std::env::temp_dir))
}

/// Returns the path to the configuration directory used by bookdrop.
pub fn config_dir() -> &'static PathBuf {
    CONFIG_DIR.get_or_init(|| {
        if let Some(custom_dir) = CUSTOM_DATA_DIR.get() {
            custom_dir.join("config")
        } else if cfg!(target_os = "windows") {
            dirs::config_dir()
                .unwrap_or_else(|| home_dir().join("AppData").join("Roaming"))
                .join("Bookdrop")
        } else if cfg!(any(target_os = "linux", target_os = "freebsd")) {
            dirs::config_dir()
                .unwrap_or_else(|| home_dir().join(".config"))
                .join("bookdrop")
        } else {
            home_dir().join(".config").join("bookdrop")
        }
    })
}

/// Returns the path to the data directory used by bookdrop.
pub fn data_dir() -> &'static PathBuf {
    CURRENT_DATA_DIR.get_or_init(|| {
        if let Some(custom_dir) = CUSTOM_DATA_DIR.get() {
            custom_dir.clone()
        } else if cfg!(any(target_os = "linux", target_os = "freebsd")) {
            dirs::data_local_dir()
                .unwrap_or_else(|| home_dir().join(".local").join("share"))
                .join("bookdrop")
        } else {
            dirs::data_local_dir()
                .unwrap_or_else(|| home_dir().clone())
                .join("Bookdrop")
        }
    })
}

/// Sets a custom directory for all user data, overriding the default data
/// directory. Must be called before any other path function that depends on
/// the data directory. Relative paths are canonicalized when possible; the
/// directory is created if it doesn't exist.
///
/// # Panics
///
/// Panics if:
/// * Called after the data directory has been initialized (e.g., via `data_dir`
///   or `config_dir`)
/// * The directory cannot be created
pub fn set_custom_data_dir<P: ?Sized + AsRef<Path>>(dir: &P) -> &'static PathBuf {
    assert!(
        CURRENT_DATA_DIR.get().is_none() && CONFIG_DIR.get().is_none(),
        "set_custom_data_dir called after data_dir or config_dir was initialized"
    );
    CUSTOM_DATA_DIR.get_or_init(|| {
        let mut path = dir.as_ref().to_path_buf();
        if path.is_relative()
            && let Ok(abs) = path.canonicalize()
        {
            path = abs;
        }

        std::fs::create_dir_all(&path).unwrap_or_else(|e| {
            panic!(
                "failed to create custom data directory {}: {e}",
                path.display()
            )
        });

        path
    })
}

/// Returns the directory an out-of-process download service may write into.
///
/// Unlike [`data_dir`], this lives under the user cache directory, which is
/// readable and writable by other processes run by the same user.
pub fn staging_root() -> &'static PathBuf {
    static STAGING_ROOT: OnceLock<PathBuf> = OnceLock::new();
    STAGING_ROOT.get_or_init(|| {
        if let Some(custom_dir) = CUSTOM_DATA_DIR.get() {
            return custom_dir.join("cache");
        }
        dirs::cache_dir()
            .unwrap_or_else(|| home_dir().join(".cache"))
            .join(if cfg!(any(target_os = "linux", target_os = "freebsd")) {
                "bookdrop"
            } else {
                "Bookdrop"
            })
    })
}

/// Returns the canonical library directory where finished books live.
pub fn library_dir() -> &'static PathBuf {
    static LIBRARY_DIR: OnceLock<PathBuf> = OnceLock::new();
    LIBRARY_DIR.get_or_init(|| data_dir().join("books"))
}

/// Returns the path to the logs directory.
pub fn logs_dir() -> &'static PathBuf {
    static LOGS_DIR: OnceLock<PathBuf> = OnceLock::new();
    LOGS_DIR.get_or_init(|| {
        if cfg!(target_os = "macos") && CUSTOM_DATA_DIR.get().is_none() {
            home_dir().join("Library/Logs/Bookdrop")
        } else {
            data_dir().join("logs")
        }
    })
}

/// Returns the path to the `settings.json` file.
pub fn settings_file() -> &'static PathBuf {
    static SETTINGS_FILE: OnceLock<PathBuf> = OnceLock::new();
    SETTINGS_FILE.get_or_init(|| config_dir().join("settings.json"))
}
