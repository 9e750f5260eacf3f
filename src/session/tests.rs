use super::*;
use crate::player::{MockControl, MockPlayer};
use std::path::PathBuf;
use std::sync::Arc;

const POLL: Duration = Duration::from_millis(100);

fn timing() -> SessionTiming {
    SessionTiming {
        settle: Duration::from_millis(500),
        start_grace: Duration::from_secs(1),
        state_poll: POLL,
        max_playback: None,
    }
}

fn mock_session(
    durations: &[Duration],
    timing: SessionTiming,
) -> (MediaSession, Vec<MockControl>, CancellationToken) {
    let mut handles: Vec<Box<dyn PlayerHandle>> = Vec::new();
    let mut controls = Vec::new();
    for (index, duration) in durations.iter().enumerate() {
        let (player, control) = MockPlayer::with_control(format!("mock[{}]", index), *duration);
        handles.push(Box::new(player));
        controls.push(control);
    }

    let shutdown = CancellationToken::new();
    (
        MediaSession::new(handles, timing, shutdown.clone()),
        controls,
        shutdown,
    )
}

fn single(name: &str) -> PlayableUnit {
    PlayableUnit::Single(PathBuf::from(format!("/media/{}.mp4", name)))
}

fn pair(name: &str) -> PlayableUnit {
    PlayableUnit::Pair {
        left: PathBuf::from(format!("/media/{}_left.mp4", name)),
        right: PathBuf::from(format!("/media/{}_right.mp4", name)),
    }
}

#[tokio::test(start_paused = true)]
async fn test_prepare_idle_shows_paused_first_frame() {
    let (session, controls, _shutdown) = mock_session(&[Duration::from_secs(5)], timing());
    let start = Instant::now();

    assert!(session.prepare_idle(&single("a")).await);

    assert!(start.elapsed() >= Duration::from_millis(500));
    assert!(session.is_initialized());
    assert_eq!(controls[0].calls(), vec!["load", "play", "pause"]);
    assert_eq!(controls[0].state(), PlayerState::Paused);
}

#[tokio::test(start_paused = true)]
async fn test_prepare_idle_reports_load_failure() {
    let (session, controls, _shutdown) = mock_session(&[Duration::from_secs(5)], timing());
    controls[0].fail_loads(true);

    assert!(!session.prepare_idle(&single("a")).await);
    assert!(!session.is_initialized());
}

#[tokio::test(start_paused = true)]
async fn test_single_playback_completes() {
    let (session, controls, _shutdown) = mock_session(&[Duration::from_secs(2)], timing());
    let unit = single("a");
    assert!(session.prepare_idle(&unit).await);
    controls[0].clear_calls();

    let start = Instant::now();
    let outcome = session.play_to_completion(&unit).await;

    assert_eq!(outcome, PlaybackOutcome::Completed);
    assert!(start.elapsed() >= Duration::from_secs(2));
    assert!(start.elapsed() <= Duration::from_secs(2) + POLL);
    // Already loaded by prepare_idle, so only rewound
    assert_eq!(controls[0].call_count("load"), 0);
    assert_eq!(controls[0].call_count("seek_start"), 1);
    assert!(!session.is_playing());
}

#[tokio::test(start_paused = true)]
async fn test_dual_playback_waits_for_slower_screen() {
    let (session, controls, _shutdown) = mock_session(
        &[Duration::from_secs(1), Duration::from_secs(3)],
        timing(),
    );
    let unit = pair("a");

    let start = Instant::now();
    let outcome = session.play_to_completion(&unit).await;

    assert_eq!(outcome, PlaybackOutcome::Completed);
    assert!(start.elapsed() >= Duration::from_secs(3));
    assert_eq!(controls[0].state(), PlayerState::Ended);
    assert_eq!(controls[1].state(), PlayerState::Ended);
    assert_eq!(
        controls[1].loaded(),
        Some(PathBuf::from("/media/a_right.mp4"))
    );
}

#[tokio::test(start_paused = true)]
async fn test_new_unit_is_loaded_before_playing() {
    let (session, controls, _shutdown) = mock_session(&[Duration::from_secs(1)], timing());
    assert!(session.prepare_idle(&single("a")).await);

    let outcome = session.play_to_completion(&single("b")).await;

    assert_eq!(outcome, PlaybackOutcome::Completed);
    assert_eq!(controls[0].call_count("load"), 2);
    assert_eq!(controls[0].loaded(), Some(PathBuf::from("/media/b.mp4")));
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_aborts_within_one_poll() {
    let (session, controls, shutdown) = mock_session(&[Duration::from_secs(60)], timing());

    let canceller = shutdown.clone();
    tokio::spawn(async move {
        sleep(Duration::from_millis(1500)).await;
        canceller.cancel();
    });

    let start = Instant::now();
    let outcome = session.play_to_completion(&single("a")).await;

    assert_eq!(outcome, PlaybackOutcome::Aborted);
    assert!(start.elapsed() <= Duration::from_millis(1500) + POLL);
    // Handles are left as they are; release happens at shutdown
    assert_eq!(controls[0].call_count("stop"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_playback_is_busy() {
    let (session, _controls, _shutdown) = mock_session(&[Duration::from_secs(2)], timing());
    let session = Arc::new(session);

    let first = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { session.play_to_completion(&single("a")).await })
    };

    sleep(Duration::from_millis(200)).await;
    assert!(session.is_playing());
    assert_eq!(
        session.play_to_completion(&single("a")).await,
        PlaybackOutcome::Busy
    );

    assert_eq!(first.await.unwrap(), PlaybackOutcome::Completed);
    assert!(!session.is_playing());
}

#[tokio::test(start_paused = true)]
async fn test_screen_error_is_reported() {
    let (session, controls, _shutdown) = mock_session(
        &[Duration::from_secs(2), Duration::from_secs(2)],
        timing(),
    );
    controls[1].error_after(Some(Duration::from_millis(1200)));

    let outcome = session.play_to_completion(&pair("a")).await;

    assert_eq!(
        outcome,
        PlaybackOutcome::CompletedWithErrors {
            failed_screens: vec![1]
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_unreadable_state_counts_as_error() {
    let (session, controls, _shutdown) = mock_session(
        &[Duration::from_secs(2), Duration::from_secs(2)],
        timing(),
    );
    assert!(session.prepare_idle(&pair("a")).await);
    controls[0].fail_state_reads(true);

    let outcome = session.play_to_completion(&pair("a")).await;

    assert_eq!(
        outcome,
        PlaybackOutcome::CompletedWithErrors {
            failed_screens: vec![0]
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_max_playback_times_out() {
    let mut timing = timing();
    timing.max_playback = Some(Duration::from_secs(2));
    let (session, controls, _shutdown) = mock_session(&[Duration::from_secs(30)], timing);

    let start = Instant::now();
    let outcome = session.play_to_completion(&single("a")).await;

    assert_eq!(outcome, PlaybackOutcome::TimedOut);
    assert!(start.elapsed() < Duration::from_secs(3));
    assert_eq!(controls[0].state(), PlayerState::Paused);
}

#[tokio::test(start_paused = true)]
async fn test_fan_out_mismatch_fails() {
    let (session, _controls, _shutdown) = mock_session(&[Duration::from_secs(1)], timing());

    let outcome = session.play_to_completion(&pair("a")).await;
    assert!(matches!(outcome, PlaybackOutcome::Failed(_)));
    assert!(!session.prepare_idle(&pair("a")).await);
    assert!(!session.is_playing());
}

#[tokio::test(start_paused = true)]
async fn test_release_is_idempotent() {
    let (session, controls, _shutdown) = mock_session(
        &[Duration::from_secs(1), Duration::from_secs(1)],
        timing(),
    );

    // Nothing was ever loaded
    session.release().await.unwrap();
    session.release().await.unwrap();

    assert!(session.is_released());
    assert!(controls.iter().all(|c| c.is_released()));
    assert_eq!(controls[0].call_count("release"), 1);

    assert_eq!(
        session.play_to_completion(&pair("a")).await,
        PlaybackOutcome::Busy
    );
    assert!(!session.prepare_idle(&pair("a")).await);
}

#[test]
fn test_outcome_rotation_rule() {
    assert!(PlaybackOutcome::Completed.was_attempted());
    assert!(PlaybackOutcome::Failed("x".to_string()).was_attempted());
    assert!(PlaybackOutcome::TimedOut.was_attempted());
    assert!(!PlaybackOutcome::Aborted.was_attempted());
    assert!(!PlaybackOutcome::Busy.was_attempted());
    assert_eq!(
        PlaybackOutcome::CompletedWithErrors {
            failed_screens: vec![1]
        }
        .to_string(),
        "completed with errors on screens [1]"
    );
}
