use std::sync::Arc;
use tokio::sync::mpsc;

use jamtune::catalog::Track;
use jamtune::error::MediaErrorKind;
use jamtune::player::{
    ControllerEvent, ControllerOptions, LoadBehavior, MemorySink, MemorySinkHandle,
    PlaybackController, PlaybackState, RepeatMode, SinkCall,
};

/// Helper to create a controller driving a scripted sink
fn create_test_controller() -> (PlaybackController<MemorySink>, MemorySinkHandle) {
    let (tx, rx) = mpsc::unbounded_channel();
    let sink = MemorySink::new(tx);
    let handle = sink.handle();
    let mut controller = PlaybackController::new(ControllerOptions::default());
    controller.attach(sink, rx);
    (controller, handle)
}

fn make_queue(n: usize) -> Vec<Arc<Track>> {
    (0..n)
        .map(|i| {
            Arc::new(
                Track::new(&format!("t{}", i), &format!("Track {}", i), 120)
                    .with_audio(&format!("http://cdn/{}.mp3", i)),
            )
        })
        .collect()
}

#[tokio::test]
async fn test_queue_end_without_repeat_goes_idle() {
    let (mut c, handle) = create_test_controller();
    let queue = make_queue(3);

    c.play(queue[2].clone(), Some((queue.clone(), 2))).await.unwrap();
    c.process_pending_events().await;
    assert!(c.player().is_playing());

    handle.finish();
    c.process_pending_events().await;

    assert_eq!(c.player().state(), PlaybackState::Idle);
    assert!(!c.player().is_playing());
    assert_eq!(c.queue().len(), 3);
    assert_eq!(c.queue().current_index(), Some(2));
}

#[tokio::test]
async fn test_queue_end_with_repeat_all_wraps() {
    let (mut c, handle) = create_test_controller();
    let queue = make_queue(3);
    c.queue_mut().set_repeat_mode(RepeatMode::All);

    c.play(queue[2].clone(), Some((queue.clone(), 2))).await.unwrap();
    c.process_pending_events().await;
    handle.clear_calls();

    handle.finish();
    c.process_pending_events().await;

    assert_eq!(c.queue().current_index(), Some(0));
    assert_eq!(c.player().current_track().unwrap().id, "t0");
    let calls = handle.calls();
    assert!(calls.contains(&SinkCall::SetSource("http://cdn/0.mp3".into())));
    assert!(calls.contains(&SinkCall::Play));
}

#[tokio::test]
async fn test_repeat_one_replays_current() {
    let (mut c, handle) = create_test_controller();
    let queue = make_queue(3);
    c.queue_mut().set_repeat_mode(RepeatMode::One);
    c.queue_mut().set_shuffle(true);

    c.play(queue[1].clone(), Some((queue.clone(), 1))).await.unwrap();
    c.process_pending_events().await;
    handle.finish();
    c.process_pending_events().await;

    assert_eq!(c.queue().current_index(), Some(1));
    assert_eq!(c.player().current_track().unwrap().id, "t1");
}

#[tokio::test]
async fn test_auto_advance_disabled_stops_after_track() {
    let (tx, rx) = mpsc::unbounded_channel();
    let sink = MemorySink::new(tx);
    let handle = sink.handle();
    let mut c = PlaybackController::new(ControllerOptions {
        auto_advance: false,
        ..ControllerOptions::default()
    });
    c.attach(sink, rx);
    let queue = make_queue(3);

    c.play(queue[0].clone(), Some((queue.clone(), 0))).await.unwrap();
    c.process_pending_events().await;
    handle.finish();
    c.process_pending_events().await;

    assert_eq!(c.player().state(), PlaybackState::Idle);
    assert_eq!(c.queue().current_index(), Some(0));
}

#[tokio::test(start_paused = true)]
async fn test_media_error_skips_after_delay() {
    let (mut c, handle) = create_test_controller();
    let queue = make_queue(3);

    c.play(queue[0].clone(), Some((queue.clone(), 0))).await.unwrap();
    c.process_pending_events().await;

    handle.fail(MediaErrorKind::Network);
    c.process_pending_events().await;
    assert_eq!(c.player().state(), PlaybackState::Error);
    assert_eq!(c.player().last_error(), Some("Network connection problem"));
    assert!(c.pending_advance().is_some());

    let event = c.next_event().await;
    assert_eq!(event, ControllerEvent::AdvanceDue);
    c.dispatch(event).await;

    assert_eq!(c.queue().current_index(), Some(1));
    assert!(c.player().last_error().is_none());
    assert!(c.pending_advance().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_hanging_source_times_out_then_falls_back() {
    let (mut c, handle) = create_test_controller();
    handle.set_default_behavior(LoadBehavior::Hang);
    let queue = make_queue(1);

    let outcome = c.play(queue[0].clone(), None).await.unwrap();
    assert!(matches!(
        outcome,
        jamtune::player::PlayOutcome::Started { fallback: true, .. }
    ));
}

#[tokio::test]
async fn test_history_keeps_fifty_distinct_entries() {
    let (mut c, _handle) = create_test_controller();
    let queue = make_queue(51);

    c.play(queue[0].clone(), None).await.unwrap();
    c.play(queue[0].clone(), None).await.unwrap();
    assert_eq!(c.player().history().count(), 1);

    for track in &queue[1..] {
        c.play(track.clone(), None).await.unwrap();
    }
    let history: Vec<&str> = c.player().history().collect();
    assert_eq!(history.len(), 50);
    assert_eq!(history[0], "t50");
    assert!(!history.contains(&"t0"));
}

#[tokio::test]
async fn test_volume_is_clamped_and_forwarded() {
    let (mut c, handle) = create_test_controller();
    assert_eq!(c.set_volume(150), 100);
    assert_eq!(handle.volume(), 1.0);
    assert_eq!(c.set_volume(-5), 0);
    assert_eq!(handle.volume(), 0.0);
}

#[tokio::test]
async fn test_empty_queue_has_nothing_next() {
    let (mut c, _handle) = create_test_controller();
    c.queue_mut().set_queue(Vec::new(), 3);
    assert_eq!(c.queue().current_index(), None);
    assert!(c.queue_mut().advance_to(0).is_none());
    assert_eq!(c.next().await.unwrap(), None);
}
