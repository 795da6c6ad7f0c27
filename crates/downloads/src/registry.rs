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

use std::{collections::BTreeMap, path::PathBuf};

use parking_lot::Mutex;

use crate::service::DownloadId;

/// Per-download state kept while the coordinator believes the download is
/// still active with the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRecord {
    pub id:          DownloadId,
    /// Where the service writes the file
    pub destination: PathBuf,
    /// 0..=100
    pub progress:    u8,
}

/// Proof that the holder is the one progress poller allowed to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerLease(u64);

/// Thread-safe `id -> DownloadRecord` map.
///
/// A single mutex covers the records, the multiple-downloads flag and the
/// poller lease, so "remove then check emptiness" and "start the poller if
/// none is running" are atomic with respect to each other. No method holds
/// the lock across an await point.
#[derive(Debug, Default)]
pub struct DownloadRegistry {
    state: Mutex<State>,
}

#[derive(Debug, Default)]
struct State {
    records:           BTreeMap<DownloadId, DownloadRecord>,
    multiple_recently: bool,
    poller:            Option<u64>,
    next_lease:        u64,
}

impl DownloadRegistry {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Track a new download at 0%.
    ///
    /// Returns the number of tracked downloads after the insert, or `None`
    /// if `id` was already tracked (the call is then a no-op). Inserting
    /// next to an existing record turns on the multiple-downloads flag.
    pub fn put(&self, id: DownloadId, destination: PathBuf) -> Option<usize> {
        let mut state = self.state.lock();
        if state.records.contains_key(&id) {
            return None;
        }
        if !state.records.is_empty() {
            state.multiple_recently = true;
        }
        state.records.insert(
            id,
            DownloadRecord {
                id,
                destination,
                progress: 0,
            },
        );
        Some(state.records.len())
    }

    #[must_use]
    pub fn get(&self, id: DownloadId) -> Option<DownloadRecord> { self.state.lock().records.get(&id).cloned() }

    pub fn remove(&self, id: DownloadId) -> Option<DownloadRecord> { self.state.lock().records.remove(&id) }

    #[must_use]
    pub fn len(&self) -> usize { self.state.lock().records.len() }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.state.lock().records.is_empty() }

    #[must_use]
    pub fn contains(&self, id: DownloadId) -> bool { self.state.lock().records.contains_key(&id) }

    /// Snapshot of the tracked ids, in ascending order.
    #[must_use]
    pub fn ids(&self) -> Vec<DownloadId> { self.state.lock().records.keys().copied().collect() }

    /// Drop every record and retire the current poller lease. Returns the
    /// dropped records.
    pub fn clear(&self) -> Vec<DownloadRecord> {
        let mut state = self.state.lock();
        state.poller = None;
        std::mem::take(&mut state.records).into_values().collect()
    }

    /// Record new progress for `id`. Returns false if `id` is no longer
    /// tracked.
    pub fn set_progress(&self, id: DownloadId, progress: u8) -> bool {
        match self.state.lock().records.get_mut(&id) {
            Some(record) => {
                record.progress = progress.min(100);
                true
            }
            None => false,
        }
    }

    /// Mean progress over every tracked download, rounded down. `None` when
    /// nothing is tracked.
    #[must_use]
    pub fn aggregate_progress(&self) -> Option<u8> {
        let state = self.state.lock();
        let count = state.records.len() as u64;
        if count == 0 {
            return None;
        }
        let sum: u64 = state
            .records
            .values()
            .map(|record| u64::from(record.progress))
            .sum();
        u8::try_from(sum / count).ok()
    }

    /// Whether more than one download has been tracked at once since the
    /// registry was last empty.
    #[must_use]
    pub fn multiple_recently(&self) -> bool { self.state.lock().multiple_recently }

    /// Clear the multiple-downloads flag if nothing is tracked. Returns
    /// whether the registry was empty.
    pub fn reset_multiple_if_empty(&self) -> bool {
        let mut state = self.state.lock();
        if state.records.is_empty() {
            state.multiple_recently = false;
            true
        } else {
            false
        }
    }

    /// Hand out the poller lease if there is work and no poller holds it.
    pub fn claim_poller(&self) -> Option<PollerLease> {
        let mut state = self.state.lock();
        if state.records.is_empty() || state.poller.is_some() {
            return None;
        }
        state.next_lease += 1;
        let lease = state.next_lease;
        state.poller = Some(lease);
        Some(PollerLease(lease))
    }

    /// Called by the poller on every tick. Returns true when the poller
    /// should stop: either its lease was revoked, or nothing is left to poll
    /// (the lease is then released so the next `put` can start a new one).
    pub fn retire_poller_if_idle(&self, lease: PollerLease) -> bool {
        let mut state = self.state.lock();
        if state.poller != Some(lease.0) {
            return true;
        }
        if state.records.is_empty() {
            state.poller = None;
            return true;
        }
        false
    }
}
