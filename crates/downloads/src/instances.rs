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
    collections::HashSet,
    path::{Path, PathBuf},
    sync::{
        Arc, Weak,
        atomic::{AtomicU64, Ordering},
    },
};

use derive_more::Display;
use parking_lot::Mutex;

/// Identifies one attached coordinator instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[display("instance-{_0}")]
pub struct InstanceId(u64);

/// Something that can be told about finished downloads.
pub(crate) trait InstanceMember: Send + Sync {
    /// A download finished and its book is now at `book`. The member
    /// decides on its own whether to show it.
    fn notify_completion(&self, book: &Path);

    /// The user dismissed the ready message somewhere.
    fn clear_ready(&self);
}

/// The set of live coordinator instances.
///
/// Membership is by weak reference: the directory never keeps an instance
/// alive, and an instance may outlive the directory. Cloning shares the
/// same set.
///
/// Members share one staging directory, so the directory also hands out
/// [`FinalizeClaim`]s: only the claim holder moves a staged file.
#[derive(Clone, Default)]
pub struct InstanceDirectory {
    shared: Arc<Shared>,
}

#[derive(Default)]
struct Shared {
    next_id:    AtomicU64,
    members:    Mutex<Vec<(InstanceId, Weak<dyn InstanceMember>)>>,
    finalizing: Mutex<HashSet<PathBuf>>,
}

/// Exclusive right to finalize one staged file. Released on drop.
pub(crate) struct FinalizeClaim {
    shared: Arc<Shared>,
    path:   PathBuf,
}

impl Drop for FinalizeClaim {
    fn drop(&mut self) { self.shared.finalizing.lock().remove(&self.path); }
}

impl InstanceDirectory {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    pub(crate) fn attach(&self, member: Weak<dyn InstanceMember>) -> InstanceId {
        let id = InstanceId(self.shared.next_id.fetch_add(1, Ordering::Relaxed));
        self.shared.members.lock().push((id, member));
        id
    }

    /// Returns whether `id` was attached.
    pub(crate) fn detach(&self, id: InstanceId) -> bool {
        let mut members = self.shared.members.lock();
        let before = members.len();
        members.retain(|(member, _)| *member != id);
        members.len() != before
    }

    /// Number of live members.
    #[must_use]
    pub fn len(&self) -> usize {
        let mut members = self.shared.members.lock();
        members.retain(|(_, member)| member.strong_count() > 0);
        members.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.len() == 0 }

    /// Claim `staged` for finalizing. `None` if another member holds it.
    pub(crate) fn claim_finalize(&self, staged: &Path) -> Option<FinalizeClaim> {
        self.shared
            .finalizing
            .lock()
            .insert(staged.to_path_buf())
            .then(|| FinalizeClaim {
                shared: self.shared.clone(),
                path:   staged.to_path_buf(),
            })
    }

    /// Whether any member is moving a staged file right now.
    pub(crate) fn is_finalizing(&self) -> bool { !self.shared.finalizing.lock().is_empty() }

    /// Members alive right now. Callbacks run on this snapshot, outside the
    /// lock, so a member may attach or detach from inside one.
    fn live(&self) -> Vec<Arc<dyn InstanceMember>> {
        self.shared
            .members
            .lock()
            .iter()
            .filter_map(|(_, member)| member.upgrade())
            .collect()
    }

    pub(crate) fn notify_completion(&self, book: &Path) {
        for member in self.live() {
            member.notify_completion(book);
        }
    }

    pub(crate) fn clear_ready(&self) {
        for member in self.live() {
            member.clear_ready();
        }
    }
}

impl std::fmt::Debug for InstanceDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceDirectory")
            .field("members", &self.shared.members.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[derive(Default)]
    struct Recorder {
        books:   Mutex<Vec<PathBuf>>,
        cleared: AtomicU64,
    }

    impl InstanceMember for Recorder {
        fn notify_completion(&self, book: &Path) { self.books.lock().push(book.to_path_buf()); }

        fn clear_ready(&self) { self.cleared.fetch_add(1, Ordering::SeqCst); }
    }

    fn attach(directory: &InstanceDirectory) -> (Arc<Recorder>, InstanceId) {
        let recorder = Arc::new(Recorder::default());
        let weak: Weak<dyn InstanceMember> = Arc::downgrade(&recorder) as Weak<dyn InstanceMember>;
        (recorder, directory.attach(weak))
    }

    #[test]
    fn test_fan_out_reaches_every_member() {
        let directory = InstanceDirectory::new();
        let (a, _) = attach(&directory);
        let (b, _) = attach(&directory);

        directory.notify_completion(Path::new("/lib/Moon.bloompub"));
        directory.clear_ready();

        for member in [&a, &b] {
            assert_eq!(member.books.lock().as_slice(), [PathBuf::from("/lib/Moon.bloompub")]);
            assert_eq!(member.cleared.load(Ordering::SeqCst), 1);
        }
    }

    #[test]
    fn test_detached_member_is_skipped() {
        let directory = InstanceDirectory::new();
        let (a, a_id) = attach(&directory);
        let (b, _) = attach(&directory);

        assert!(directory.detach(a_id));
        assert!(!directory.detach(a_id));
        directory.notify_completion(Path::new("/lib/x.bloompub"));

        assert!(a.books.lock().is_empty());
        assert_eq!(b.books.lock().len(), 1);
    }

    #[test]
    fn test_finalize_claim_is_exclusive_until_dropped() {
        let directory = InstanceDirectory::new();
        let other = directory.clone();
        let staged = Path::new("/stage/bl-downloads/Moon.bloompub");

        let claim = directory.claim_finalize(staged).unwrap();
        assert!(other.claim_finalize(staged).is_none());
        assert!(other.claim_finalize(Path::new("/stage/bl-downloads/Sun.bloompub")).is_some());
        assert!(other.is_finalizing());

        drop(claim);
        assert!(!directory.is_finalizing());
        assert!(other.claim_finalize(staged).is_some());
    }

    #[test]
    fn test_membership_does_not_own() {
        let directory = InstanceDirectory::new();
        let (a, _) = attach(&directory);
        assert_eq!(directory.len(), 1);
        drop(a);
        assert!(directory.is_empty());
        directory.notify_completion(Path::new("/lib/x.bloompub"));
    }
}
