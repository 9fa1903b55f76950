//! Progress reporter lifecycle tests
//!
//! The clock is paused, so reporter ticks land exactly on whole seconds after
//! a session's start.

mod helpers;

use helpers::{room, settle, TestHarness};
use roomq_ap::playback::LoopMode;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::time;

#[tokio::test(start_paused = true)]
async fn test_reporter_updates_every_tick() {
    let h = TestHarness::new();
    let r = room("r1");
    h.enqueue_all(&r, &["A"]).await;
    h.orchestrator.start_if_idle(&r).await;
    assert_eq!(h.orchestrator.active_reporters(), 1);

    time::sleep(Duration::from_millis(3500)).await;

    let display = h.presenter.latest().unwrap();
    let elapsed: Vec<u64> = display
        .updates
        .lock()
        .unwrap()
        .iter()
        .map(|p| p.elapsed_secs)
        .collect();
    assert_eq!(elapsed, vec![1, 2, 3]);
    assert_eq!(display.last_update().unwrap().clock, "00:03 / 03:00");
}

#[tokio::test(start_paused = true)]
async fn test_rapid_skips_leave_one_reporter() {
    let h = TestHarness::new();
    let r = room("r1");
    h.enqueue_all(&r, &["A", "B", "C", "D", "E"]).await;
    h.orchestrator.start_if_idle(&r).await;

    for _ in 0..4 {
        h.orchestrator.skip(&r).await.unwrap();
        settle().await;
    }
    assert_eq!(h.now_playing(&r).await.as_deref(), Some("E"));

    time::sleep(Duration::from_millis(2500)).await;

    assert_eq!(h.orchestrator.active_reporters(), 1);
    let displays = h.presenter.displays();
    assert_eq!(displays.len(), 5);
    for old in &displays[..4] {
        assert!(old.is_deleted(), "{}", old.id);
        assert_eq!(old.update_count(), 0, "{}", old.id);
        assert_eq!(old.stale_calls.load(Ordering::SeqCst), 0, "{}", old.id);
    }
    let live = &displays[4];
    assert_eq!(live.title, "E");
    assert_eq!(live.update_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_overrun_clears_controls_and_keeps_panel() {
    let h = TestHarness::new();
    let r = room("r1");
    h.resolver.duration("A", Some(3));
    h.enqueue_all(&r, &["A"]).await;
    h.orchestrator.start_if_idle(&r).await;

    // The transport never reports completion
    time::sleep(Duration::from_secs(10)).await;

    let display = h.presenter.latest().unwrap();
    assert_eq!(h.orchestrator.active_reporters(), 0);
    assert!(display.controls_cleared.load(Ordering::SeqCst));
    assert!(!display.is_deleted());
    // Ticks 1..=4 rendered; tick 5 hit duration plus grace
    assert_eq!(display.update_count(), 4);
    assert_eq!(h.now_playing(&r).await.as_deref(), Some("A"));
}

#[tokio::test(start_paused = true)]
async fn test_live_stream_reports_until_superseded() {
    let h = TestHarness::new();
    let r = room("r1");
    h.resolver.duration("radio", None);
    h.enqueue_all(&r, &["radio"]).await;
    h.orchestrator.start_if_idle(&r).await;

    time::sleep(Duration::from_millis(5500)).await;
    let display = h.presenter.latest().unwrap();
    assert_eq!(display.update_count(), 5);
    let last = display.last_update().unwrap();
    assert_eq!(last.bar, "LIVE");
    assert_eq!(last.total_secs, None);

    h.transport.finish(&r);
    time::sleep(Duration::from_millis(1500)).await;

    assert_eq!(h.orchestrator.active_reporters(), 0);
    assert!(display.is_deleted());
    assert_eq!(display.update_count(), 5);
    assert_eq!(display.stale_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_paused_session_is_not_rendered() {
    let h = TestHarness::new();
    let r = room("r1");
    h.enqueue_all(&r, &["A"]).await;
    h.orchestrator.start_if_idle(&r).await;

    time::sleep(Duration::from_millis(2500)).await;
    h.orchestrator.pause(&r).await.unwrap();
    time::sleep(Duration::from_secs(3)).await;

    let display = h.presenter.latest().unwrap();
    assert_eq!(display.update_count(), 2);
    assert_eq!(h.orchestrator.active_reporters(), 1);

    h.orchestrator.resume(&r).await.unwrap();
    time::sleep(Duration::from_secs(1)).await;
    assert_eq!(display.update_count(), 3);
    assert_eq!(display.last_update().unwrap().elapsed_secs, 3);
}

#[tokio::test(start_paused = true)]
async fn test_song_loop_replaces_reporter() {
    let h = TestHarness::new();
    let r = room("r1");
    h.enqueue_all(&r, &["A"]).await;
    h.orchestrator.start_if_idle(&r).await;
    h.orchestrator.set_loop_mode(&r, LoopMode::SongOn).await.unwrap();

    time::sleep(Duration::from_millis(1500)).await;
    h.transport.finish(&r);
    time::sleep(Duration::from_millis(1500)).await;

    let displays = h.presenter.displays();
    assert_eq!(displays.len(), 2);
    assert!(displays[0].is_deleted());
    assert_eq!(displays[0].update_count(), 1);
    assert_eq!(h.orchestrator.active_reporters(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_silences_live_reporter() {
    let h = TestHarness::new();
    let r = room("r1");
    h.enqueue_all(&r, &["A"]).await;
    h.orchestrator.start_if_idle(&r).await;

    time::sleep(Duration::from_millis(2500)).await;
    let display = h.presenter.latest().unwrap();
    assert_eq!(display.update_count(), 2);

    h.orchestrator.disconnect(&r).await;
    time::sleep(Duration::from_secs(3)).await;

    assert_eq!(h.orchestrator.active_reporters(), 0);
    assert!(display.is_deleted());
    assert_eq!(display.update_count(), 2);
    assert_eq!(display.stale_calls.load(Ordering::SeqCst), 0);

    // Behaves like the room's first-ever start
    h.enqueue_all(&r, &["B"]).await;
    assert!(h.orchestrator.start_if_idle(&r).await);
    let now = h.orchestrator.snapshot(&r, 0).await.now_playing.unwrap();
    assert_eq!(now.token, 1);
    assert_eq!(now.title, "B");
}
