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

use std::path::{Path, PathBuf};

/// What a coordinator instance wants its UI surface to show.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Presentation {
    #[default]
    Hidden,
    /// Progress of everything in flight. `book` is `None` in multiple mode.
    Downloading { book: Option<String>, percent: u8 },
    /// Downloads finished. `book` is `None` for the generic "books are
    /// ready" message.
    Ready { book: Option<PathBuf> },
}

impl Presentation {
    #[must_use]
    pub const fn is_ready(&self) -> bool { matches!(self, Self::Ready { .. }) }

    #[must_use]
    pub const fn is_downloading(&self) -> bool { matches!(self, Self::Downloading { .. }) }

    /// A download was added; `active` counts it.
    ///
    /// The first one replaces whatever was shown with a single-title
    /// progress, any further one switches to multiple mode.
    pub(crate) fn download_added(&mut self, book: &str, active: usize) {
        *self = match self {
            Self::Downloading { percent, .. } if active > 1 => Self::Downloading {
                book:    None,
                percent: *percent,
            },
            _ if active > 1 => Self::Downloading {
                book:    None,
                percent: 0,
            },
            _ => Self::Downloading {
                book:    Some(book.to_owned()),
                percent: 0,
            },
        };
    }

    /// Returns whether anything changed.
    pub(crate) fn set_percent(&mut self, value: u8) -> bool {
        match self {
            Self::Downloading { percent, .. } if *percent != value => {
                *percent = value;
                true
            }
            _ => false,
        }
    }

    pub(crate) fn ready(book: &Path, multiple: bool) -> Self {
        Self::Ready {
            book: (!multiple).then(|| book.to_path_buf()),
        }
    }

    /// Hide progress; a ready message stays. Returns whether anything
    /// changed.
    pub(crate) fn drop_progress(&mut self) -> bool {
        if self.is_downloading() {
            *self = Self::Hidden;
            true
        } else {
            false
        }
    }

    /// Hide a ready message. Returns whether anything changed.
    pub(crate) fn drop_ready(&mut self) -> bool {
        if self.is_ready() {
            *self = Self::Hidden;
            true
        } else {
            false
        }
    }
}
