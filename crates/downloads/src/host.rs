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

use std::path::Path;

use crate::service::DownloadId;

/// Callbacks into the hosting application. Every method defaults to doing
/// nothing.
pub trait DownloadsHost: Send + Sync + 'static {
    /// A book landed in the library.
    fn book_added(&self, _book: &Path) {}

    /// The user dismissed a ready message naming this book.
    fn open_book(&self, _book: &Path) {}

    /// The user dismissed a generic ready message.
    fn return_to_library(&self) {}

    /// The service gave up on a download this instance was tracking.
    fn download_failed(&self, _id: DownloadId) {}
}

/// A host that ignores every callback.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHost;

impl DownloadsHost for NoopHost {}
