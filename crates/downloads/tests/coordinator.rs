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

mod common;

use std::path::PathBuf;

use bookdrop_downloads::{CoordinatorError, DownloadService, DownloadStatus, Presentation};
use common::{FakeService, Harness, eventually, pause};
use jiff::SignedDuration;

const MOON: &str = "https://books.example/dl/Moon.bloompub";
const SUN: &str = "https://books.example/dl/Sun.bloompub";
const STAR: &str = "https://books.example/dl/Star.bloompub";

#[tokio::test]
async fn test_single_download_starts_poller() {
    let h = Harness::new();
    let coordinator = h.coordinator();

    let id = coordinator.start_download(MOON).await.unwrap();

    assert_eq!(coordinator.registry().ids(), vec![id]);
    assert!(!coordinator.registry().multiple_recently());
    assert!(coordinator.is_polling());
    assert_eq!(h.service.destination(id), h.staging_dir().join("Moon.bloompub"));
    assert_eq!(h.service.titles(), vec!["Downloading Moon".to_string()]);
    assert_eq!(
        coordinator.presentation(),
        Presentation::Downloading {
            book:    Some("Moon".into()),
            percent: 0,
        }
    );
}

#[tokio::test]
async fn test_second_download_enters_multiple_mode() {
    let h = Harness::new();
    let coordinator = h.coordinator();

    coordinator.start_download(MOON).await.unwrap();
    coordinator.start_download(SUN).await.unwrap();

    assert_eq!(coordinator.registry().len(), 2);
    assert!(coordinator.registry().multiple_recently());
    assert!(matches!(
        coordinator.presentation(),
        Presentation::Downloading { book: None, .. }
    ));
}

#[tokio::test]
async fn test_zero_poll_interval_still_polls() {
    let mut h = Harness::new();
    h.config.poll_interval = SignedDuration::ZERO;
    let coordinator = h.coordinator();

    let moon = coordinator.start_download(MOON).await.unwrap();
    assert!(coordinator.is_polling());

    h.service.set_running(moon, 1, Some(2));
    eventually("progress published", || {
        coordinator.registry().aggregate_progress() == Some(50)
    })
    .await;
}

#[tokio::test]
async fn test_progress_is_mean_of_tracked_downloads() {
    let h = Harness::new();
    let coordinator = h.coordinator();
    let moon = coordinator.start_download(MOON).await.unwrap();
    let sun = coordinator.start_download(SUN).await.unwrap();

    h.service.set_running(moon, 50, Some(100));
    h.service.set_running(sun, 1, Some(4));

    let mut presentation = coordinator.subscribe_presentation();
    eventually("aggregate progress published", || {
        *presentation.borrow_and_update()
            == Presentation::Downloading {
                book:    None,
                percent: 37,
            }
    })
    .await;
    assert_eq!(coordinator.registry().aggregate_progress(), Some(37));

    // Unknown total and paused downloads keep their last value.
    h.service.set_running(moon, 70, None);
    h.service.set_status(sun, DownloadStatus::Paused);
    pause().await;
    assert_eq!(coordinator.registry().aggregate_progress(), Some(37));
}

#[tokio::test]
async fn test_completions_with_another_download_in_flight() {
    let h = Harness::new();
    let coordinator = h.coordinator();
    let moon = coordinator.start_download(MOON).await.unwrap();
    let sun = coordinator.start_download(SUN).await.unwrap();
    std::fs::write(h.service.destination(moon), b"moon").unwrap();
    std::fs::write(h.service.destination(sun), b"sun partial").unwrap();

    h.service.complete(moon);
    eventually("moon finalized", || coordinator.registry().len() == 1).await;

    assert_eq!(std::fs::read(h.library_book("Moon")).unwrap(), b"moon");
    assert!(!h.service.destination(sun).with_file_name("Moon.bloompub").exists());
    assert!(h.service.removed().contains(&moon));
    assert!(coordinator.registry().multiple_recently());
    // Sun is still downloading: no cleanup, no ready message.
    assert!(h.service.destination(sun).exists());
    assert!(coordinator.presentation().is_downloading());

    std::fs::write(h.service.destination(sun), b"sun").unwrap();
    h.service.complete(sun);
    eventually("sun finalized", || coordinator.registry().is_empty()).await;
    eventually("ready shown", || coordinator.presentation().is_ready()).await;

    assert_eq!(std::fs::read(h.library_book("Sun")).unwrap(), b"sun");
    // Both finished in the same session, so the message is generic.
    assert_eq!(coordinator.presentation(), Presentation::Ready { book: None });
    assert!(!coordinator.registry().multiple_recently());
    assert!(h.staged_files().is_empty());
    assert_eq!(h.host.added.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_single_completion_names_the_book() {
    let h = Harness::new();
    let coordinator = h.coordinator();
    let moon = coordinator.start_download(MOON).await.unwrap();
    std::fs::write(h.service.destination(moon), b"moon").unwrap();

    h.service.complete(moon);
    eventually("ready shown", || coordinator.presentation().is_ready()).await;

    assert_eq!(
        coordinator.presentation(),
        Presentation::Ready {
            book: Some(h.library_book("Moon")),
        }
    );
    assert_eq!(*h.host.added.lock().unwrap(), vec![h.library_book("Moon")]);
    assert!(!h.service.contains(moon));
}

#[tokio::test]
async fn test_missing_temp_file_is_a_quiet_no_op() {
    let h = Harness::new();
    let coordinator = h.coordinator();
    let moon = coordinator.start_download(MOON).await.unwrap();

    h.service.complete(moon);
    eventually("moon dropped", || coordinator.registry().is_empty()).await;
    pause().await;

    assert_eq!(h.service.removed(), vec![moon]);
    assert!(!h.library_book("Moon").exists());
    assert!(h.host.added.lock().unwrap().is_empty());
    assert_eq!(coordinator.presentation(), Presentation::Hidden);
}

#[tokio::test]
async fn test_copy_failure_keeps_the_staged_file() {
    let h = Harness::new();
    // A plain file where the library should be makes every move fail.
    std::fs::write(&h.config.library_dir, b"not a directory").unwrap();
    let coordinator = h.coordinator();
    let moon = coordinator.start_download(MOON).await.unwrap();
    let temp = h.service.destination(moon);
    std::fs::write(&temp, b"moon").unwrap();

    h.service.complete(moon);
    eventually("moon dropped", || coordinator.registry().is_empty()).await;
    pause().await;

    assert_eq!(std::fs::read(&temp).unwrap(), b"moon");
    assert_eq!(h.staged_files(), vec![temp]);
    assert!(h.service.contains(moon));
    assert!(h.service.removed().is_empty());
    assert!(h.host.added.lock().unwrap().is_empty());
    assert!(!coordinator.registry().multiple_recently());
    assert_eq!(coordinator.presentation(), Presentation::Hidden);
}

#[tokio::test]
async fn test_duplicate_and_foreign_notices_are_ignored() {
    let h = Harness::new();
    let coordinator = h.coordinator();
    let moon = coordinator.start_download(MOON).await.unwrap();
    std::fs::write(h.service.destination(moon), b"moon").unwrap();

    h.service.complete(moon);
    eventually("moon finalized", || h.library_book("Moon").exists()).await;
    pause().await;

    let foreign = h
        .service
        .insert_existing(&PathBuf::from("/home/reader/Downloads/x.pdf"), DownloadStatus::Successful);
    h.service.notify(moon);
    h.service.notify(foreign);
    pause().await;

    assert_eq!(h.host.added.lock().unwrap().len(), 1);
    assert_eq!(h.service.removed(), vec![moon]);
    assert!(h.service.contains(foreign));
    assert_eq!(std::fs::read(h.library_book("Moon")).unwrap(), b"moon");
}

#[tokio::test]
async fn test_cancel_all_is_terminal() {
    let h = Harness::new();
    let coordinator = h.coordinator();
    let moon = coordinator.start_download(MOON).await.unwrap();
    let sun = coordinator.start_download(SUN).await.unwrap();
    let moon_temp = h.service.destination(moon);
    let sun_temp = h.service.destination(sun);
    std::fs::write(&moon_temp, b"mo").unwrap();
    std::fs::write(&sun_temp, b"su").unwrap();

    coordinator.cancel_all_downloads().await;

    assert!(coordinator.registry().is_empty());
    assert!(!coordinator.registry().multiple_recently());
    assert!(!moon_temp.exists());
    assert!(!sun_temp.exists());
    assert_eq!(h.service.removed(), vec![moon, sun]);
    assert_eq!(coordinator.presentation(), Presentation::Hidden);
    eventually("poller stopped", || !coordinator.is_polling()).await;

    // A late notice for a cancelled download changes nothing.
    std::fs::write(&moon_temp, b"late").unwrap();
    h.service.notify(moon);
    pause().await;
    assert!(!h.library_book("Moon").exists());
    assert!(h.host.added.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_poller_stops_when_idle_and_restarts() {
    let h = Harness::new();
    let coordinator = h.coordinator();
    let moon = coordinator.start_download(MOON).await.unwrap();
    std::fs::write(h.service.destination(moon), b"moon").unwrap();

    h.service.complete(moon);
    eventually("poller stopped", || !coordinator.is_polling()).await;

    let sun = coordinator.start_download(SUN).await.unwrap();
    assert!(coordinator.is_polling());
    h.service.set_running(sun, 3, Some(4));
    eventually("new poller reports", || {
        coordinator.registry().aggregate_progress() == Some(75)
    })
    .await;
}

#[tokio::test]
async fn test_failed_download_is_dropped_and_reported() {
    let h = Harness::new();
    let coordinator = h.coordinator();
    let moon = coordinator.start_download(MOON).await.unwrap();
    let temp = h.service.destination(moon);
    std::fs::write(&temp, b"partial").unwrap();

    h.service.fail(moon);
    eventually("failure handled", || !h.host.failed.lock().unwrap().is_empty()).await;

    assert_eq!(*h.host.failed.lock().unwrap(), vec![moon]);
    assert!(coordinator.registry().is_empty());
    assert!(!temp.exists());
    assert!(!h.service.contains(moon));
    assert!(!h.library_book("Moon").exists());
    assert_eq!(coordinator.presentation(), Presentation::Hidden);
}

#[tokio::test]
async fn test_rejects_bad_urls() {
    let h = Harness::new();
    let coordinator = h.coordinator();

    assert!(matches!(
        coordinator.start_download("not a url").await,
        Err(CoordinatorError::InvalidUrl { .. })
    ));
    assert!(matches!(
        coordinator.start_download("https://books.example/").await,
        Err(CoordinatorError::MissingFileName { .. })
    ));
    assert!(coordinator.registry().is_empty());
    assert!(h.service.titles().is_empty());
}

#[tokio::test]
async fn test_url_path_is_percent_decoded() {
    let h = Harness::new();
    let coordinator = h.coordinator();

    let id = coordinator
        .start_download("https://books.example/dl/Moon%20and%20Cap.bloompub?token=abc")
        .await
        .unwrap();

    assert_eq!(h.service.titles(), vec!["Downloading Moon and Cap".to_string()]);
    assert_eq!(
        h.service.destination(id),
        h.staging_dir().join("Moon and Cap.bloompub")
    );
}

#[tokio::test]
async fn test_reconcile_resumes_only_our_downloads() {
    let h = Harness::new();
    std::fs::create_dir_all(h.staging_dir()).unwrap();
    let ours = h
        .service
        .insert_existing(&h.staging_dir().join("Sun.bloompub"), DownloadStatus::Running);
    let theirs = h.service.insert_existing(
        &h.root.path().join("Downloads").join("Other.bloompub"),
        DownloadStatus::Running,
    );

    let coordinator = h.coordinator();
    coordinator.refresh_from_external_state().await;

    assert_eq!(coordinator.registry().ids(), vec![ours]);
    assert!(!coordinator.registry().contains(theirs));
    assert!(coordinator.is_polling());
    assert_eq!(
        coordinator.presentation(),
        Presentation::Downloading {
            book:    Some("Sun".into()),
            percent: 0,
        }
    );

    h.service.set_running(ours, 30, Some(100));
    eventually("resumed download reports progress", || {
        coordinator.presentation()
            == Presentation::Downloading {
                book:    Some("Sun".into()),
                percent: 30,
            }
    })
    .await;
}

#[tokio::test]
async fn test_reconcile_finalizes_downloads_finished_while_away() {
    let h = Harness::new();
    std::fs::create_dir_all(h.staging_dir()).unwrap();
    let star_temp = h.staging_dir().join("Star.bloompub");
    std::fs::write(&star_temp, b"star").unwrap();
    std::fs::write(h.staging_dir().join("leftover.tmp"), b"junk").unwrap();
    let star = h
        .service
        .insert_existing(&star_temp, DownloadStatus::Successful);

    let coordinator = h.coordinator();
    coordinator.refresh_from_external_state().await;

    assert_eq!(std::fs::read(h.library_book("Star")).unwrap(), b"star");
    assert!(h.service.removed().contains(&star));
    assert!(coordinator.registry().is_empty());
    assert!(h.staged_files().is_empty(), "idle staging dir is cleaned");
    assert_eq!(
        coordinator.presentation(),
        Presentation::Ready {
            book: Some(h.library_book("Star")),
        }
    );
}

#[tokio::test]
async fn test_reconcile_skips_failed_and_unparsable_rows() {
    let h = Harness::new();
    std::fs::create_dir_all(h.staging_dir()).unwrap();
    let failed = h
        .service
        .insert_existing(&h.staging_dir().join("Moon.bloompub"), DownloadStatus::Failed);
    h.service
        .insert_raw(Some("::not a uri::"), DownloadStatus::Running);
    h.service.insert_raw(None, DownloadStatus::Running);

    let coordinator = h.coordinator();
    coordinator.refresh_from_external_state().await;

    assert!(coordinator.registry().is_empty());
    assert!(h.service.contains(failed));
    assert!(!coordinator.is_polling());
    assert_eq!(coordinator.presentation(), Presentation::Hidden);
}

#[tokio::test]
async fn test_reconcile_keeps_ready_and_drops_stale_progress() {
    let h = Harness::new();
    let coordinator = h.coordinator();
    let moon = coordinator.start_download(MOON).await.unwrap();

    // The service forgot the download while we were away.
    h.service.remove(moon).await.unwrap();
    coordinator.refresh_from_external_state().await;
    assert!(coordinator.registry().is_empty());
    assert_eq!(coordinator.presentation(), Presentation::Hidden);

    let sun = coordinator.start_download(SUN).await.unwrap();
    std::fs::write(h.service.destination(sun), b"sun").unwrap();
    h.service.complete(sun);
    eventually("ready shown", || coordinator.presentation().is_ready()).await;

    coordinator.refresh_from_external_state().await;
    assert!(coordinator.presentation().is_ready());
}

#[tokio::test]
async fn test_cleanup_waits_for_running_download() {
    let h = Harness::new();
    std::fs::create_dir_all(h.staging_dir()).unwrap();
    let stray = h.staging_dir().join("stray.bloompub");
    std::fs::write(&stray, b"old").unwrap();
    let sun = h
        .service
        .insert_existing(&h.staging_dir().join("Sun.bloompub"), DownloadStatus::Running);

    let coordinator = h.coordinator();
    coordinator.refresh_from_external_state().await;
    assert!(stray.exists(), "cleanup must not run while a download is tracked");

    std::fs::write(h.staging_dir().join("Sun.bloompub"), b"sun").unwrap();
    h.service.complete(sun);
    eventually("sun finalized", || coordinator.registry().is_empty()).await;
    eventually("staging cleaned", || !stray.exists()).await;
}

#[tokio::test]
async fn test_instances_sharing_staging_finalize_once() {
    let h = Harness::new();
    std::fs::create_dir_all(h.staging_dir()).unwrap();
    let temp = h.staging_dir().join("Moon.bloompub");
    let moon = h.service.insert_existing(&temp, DownloadStatus::Running);

    let first = h.coordinator();
    let second = h.coordinator();
    first.refresh_from_external_state().await;
    second.refresh_from_external_state().await;
    assert!(first.registry().contains(moon));
    assert!(second.registry().contains(moon));

    std::fs::write(&temp, b"moon").unwrap();
    h.service.complete(moon);

    let ready = Presentation::Ready {
        book: Some(h.library_book("Moon")),
    };
    eventually("both instances show the book", || {
        first.presentation() == ready && second.presentation() == ready
    })
    .await;
    pause().await;

    assert!(first.registry().is_empty());
    assert!(second.registry().is_empty());
    assert_eq!(std::fs::read(h.library_book("Moon")).unwrap(), b"moon");
    assert_eq!(std::fs::read_dir(&h.config.library_dir).unwrap().count(), 1);
    assert_eq!(*h.host.added.lock().unwrap(), vec![h.library_book("Moon")]);
    assert!(!temp.exists());
    assert!(h.staged_files().is_empty());
    assert_eq!(h.service.removed(), vec![moon]);
}

#[tokio::test]
async fn test_completion_fans_out_to_every_instance() {
    let h = Harness::new();
    let starter = h.coordinator();
    let other = h.coordinator();
    assert_eq!(h.instances.len(), 2);

    let moon = starter.start_download(MOON).await.unwrap();
    std::fs::write(h.service.destination(moon), b"moon").unwrap();
    h.service.complete(moon);

    let ready = Presentation::Ready {
        book: Some(h.library_book("Moon")),
    };
    eventually("starter shows ready", || starter.presentation() == ready).await;
    assert_eq!(other.presentation(), ready);

    other.dismiss_ready();
    assert_eq!(starter.presentation(), Presentation::Hidden);
    assert_eq!(other.presentation(), Presentation::Hidden);
    assert_eq!(*h.host.opened.lock().unwrap(), vec![h.library_book("Moon")]);
}

#[tokio::test]
async fn test_busy_instance_keeps_its_progress() {
    let h = Harness::new();
    let idle_one = h.coordinator();
    let busy_one = h.coordinator();

    let moon = idle_one.start_download(MOON).await.unwrap();
    busy_one.start_download(SUN).await.unwrap();
    std::fs::write(h.service.destination(moon), b"moon").unwrap();
    h.service.complete(moon);

    eventually("ready shown", || idle_one.presentation().is_ready()).await;
    pause().await;
    assert_eq!(
        busy_one.presentation(),
        Presentation::Downloading {
            book:    Some("Sun".into()),
            percent: 0,
        }
    );
    assert_eq!(busy_one.registry().len(), 1);
}

#[tokio::test]
async fn test_generic_ready_returns_to_library() {
    let h = Harness::new();
    let coordinator = h.coordinator();
    let moon = coordinator.start_download(MOON).await.unwrap();
    let sun = coordinator.start_download(SUN).await.unwrap();
    for id in [moon, sun] {
        std::fs::write(h.service.destination(id), b"book").unwrap();
        h.service.complete(id);
    }
    eventually("ready shown", || coordinator.presentation().is_ready()).await;

    coordinator.dismiss_ready();
    assert_eq!(*h.host.returned.lock().unwrap(), 1);
    assert!(h.host.opened.lock().unwrap().is_empty());
    assert_eq!(coordinator.presentation(), Presentation::Hidden);
}

#[tokio::test]
async fn test_detached_instance_stops_listening() {
    let h = Harness::new();
    let coordinator = h.coordinator();
    let moon = coordinator.start_download(MOON).await.unwrap();
    std::fs::write(h.service.destination(moon), b"moon").unwrap();

    coordinator.detach();
    assert!(h.instances.is_empty());

    h.service.complete(moon);
    pause().await;
    assert!(!h.library_book("Moon").exists());
    assert!(h.service.contains(moon), "left for the next instance to reconcile");

    let resumed = h.coordinator();
    resumed.refresh_from_external_state().await;
    assert_eq!(std::fs::read(h.library_book("Moon")).unwrap(), b"moon");
}

#[tokio::test]
async fn test_lagged_subscription_still_finalizes_everything() {
    let h = Harness::with_service(FakeService::with_capacity(1));
    let coordinator = h.coordinator();
    let mut ids = Vec::new();
    for url in [MOON, SUN, STAR] {
        ids.push(coordinator.start_download(url).await.unwrap());
    }
    for id in &ids {
        std::fs::write(h.service.destination(*id), b"book").unwrap();
    }
    for id in &ids {
        h.service.complete(*id);
    }

    eventually("all finalized", || coordinator.registry().is_empty()).await;
    for name in ["Moon", "Sun", "Star"] {
        assert!(h.library_book(name).exists(), "{name} missing from library");
    }
    assert_eq!(h.host.added.lock().unwrap().len(), 3);
}
