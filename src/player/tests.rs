use super::mpv::{mpv_args, state_from_properties};
use super::*;
use crate::config::{MotionplayConfig, PlaybackMode, ScreenConfig};
use std::path::Path;
use std::time::Duration;

#[test]
fn test_terminal_states() {
    assert!(PlayerState::Ended.is_terminal());
    assert!(PlayerState::Error.is_terminal());
    assert!(PlayerState::Stopped.is_terminal());
    assert!(!PlayerState::Playing.is_terminal());
    assert!(!PlayerState::Paused.is_terminal());
    assert!(!PlayerState::Loading.is_terminal());
    assert_eq!(PlayerState::Ended.to_string(), "ended");
}

#[test]
fn test_mpv_state_mapping() {
    assert_eq!(state_from_properties(false, true, false, false), PlayerState::Stopped);
    assert_eq!(state_from_properties(true, true, false, false), PlayerState::Error);
    assert_eq!(state_from_properties(true, false, true, true), PlayerState::Ended);
    assert_eq!(state_from_properties(true, false, false, true), PlayerState::Paused);
    assert_eq!(state_from_properties(true, false, false, false), PlayerState::Playing);
}

#[test]
fn test_mpv_args_place_screen() {
    let mut config = MotionplayConfig::default().playback;
    config.volume = 80;
    config.screens = vec![
        ScreenConfig::default(),
        ScreenConfig {
            screen: Some(1),
            geometry: Some("720x1280+720+0".to_string()),
        },
    ];
    let socket = Path::new("/tmp/test.sock");

    let first = mpv_args(&config, 0, socket);
    assert!(first.contains(&"--input-ipc-server=/tmp/test.sock".to_string()));
    assert!(first.contains(&"--volume=80".to_string()));
    assert!(first.contains(&"--fs".to_string()));
    assert!(!first.iter().any(|a| a.starts_with("--screen")));

    let second = mpv_args(&config, 1, socket);
    assert!(second.contains(&"--screen=1".to_string()));
    assert!(second.contains(&"--fs-screen=1".to_string()));
    assert!(second.contains(&"--geometry=720x1280+720+0".to_string()));

    config.fullscreen = false;
    assert!(!mpv_args(&config, 0, socket).contains(&"--fs".to_string()));
}

#[tokio::test(start_paused = true)]
async fn test_mock_plays_for_duration() {
    let (mut player, control) = MockPlayer::with_control("mock", Duration::from_secs(2));

    assert_eq!(player.state().await.unwrap(), PlayerState::Stopped);
    player.load(Path::new("/media/a.mp4")).await.unwrap();
    assert_eq!(player.state().await.unwrap(), PlayerState::Paused);

    player.play().await.unwrap();
    tokio::time::advance(Duration::from_millis(1999)).await;
    assert_eq!(player.state().await.unwrap(), PlayerState::Playing);

    tokio::time::advance(Duration::from_millis(1)).await;
    assert_eq!(player.state().await.unwrap(), PlayerState::Ended);

    // Rewinding makes it playable again
    player.seek_start().await.unwrap();
    player.play().await.unwrap();
    assert_eq!(player.state().await.unwrap(), PlayerState::Playing);

    assert_eq!(control.loaded(), Some(Path::new("/media/a.mp4").to_path_buf()));
    assert_eq!(control.call_count("play"), 2);
}

#[tokio::test(start_paused = true)]
async fn test_mock_pause_freezes_position() {
    let mut player = MockPlayer::new("mock", Duration::from_secs(1));
    player.load(Path::new("/media/a.mp4")).await.unwrap();
    player.play().await.unwrap();
    tokio::time::advance(Duration::from_millis(600)).await;
    player.pause().await.unwrap();

    tokio::time::advance(Duration::from_secs(5)).await;
    assert_eq!(player.state().await.unwrap(), PlayerState::Paused);

    player.play().await.unwrap();
    tokio::time::advance(Duration::from_millis(400)).await;
    assert_eq!(player.state().await.unwrap(), PlayerState::Ended);
}

#[tokio::test]
async fn test_mock_scripted_failures() {
    let (mut player, control) = MockPlayer::with_control("mock", Duration::from_secs(1));

    control.fail_loads(true);
    assert!(matches!(
        player.load(Path::new("/media/a.mp4")).await,
        Err(PlayerError::Load { .. })
    ));

    control.fail_loads(false);
    player.load(Path::new("/media/a.mp4")).await.unwrap();
    control.fail_state_reads(true);
    assert!(player.state().await.is_err());
}

#[tokio::test]
async fn test_mock_release_is_final() {
    let (mut player, control) = MockPlayer::with_control("mock", Duration::from_secs(1));
    player.release().await.unwrap();

    assert!(control.is_released());
    assert!(matches!(player.play().await, Err(PlayerError::Released)));
    assert!(matches!(player.state().await, Err(PlayerError::Released)));
}

#[tokio::test]
async fn test_build_mock_players_per_mode() {
    let mut config = MotionplayConfig::default().playback;
    config.backend = crate::config::PlayerBackend::Mock;
    config.volume = 40;

    config.mode = PlaybackMode::Single;
    let players = build_players(&config).await.unwrap();
    assert_eq!(players.len(), 1);

    config.mode = PlaybackMode::Dual;
    let players = build_players(&config).await.unwrap();
    let names: Vec<String> = players.iter().map(|p| p.name()).collect();
    assert_eq!(names, vec!["mock[0]", "mock[1]"]);
}

#[cfg(not(all(target_os = "linux", feature = "gstreamer")))]
#[tokio::test]
async fn test_gstreamer_backend_requires_feature() {
    let mut config = MotionplayConfig::default().playback;
    config.backend = crate::config::PlayerBackend::Gstreamer;

    assert!(matches!(
        build_players(&config).await,
        Err(PlayerError::Spawn { .. })
    ));
}

#[test]
fn test_windowed_only_backend_refuses_fullscreen() {
    assert!(windowed_only("gstreamer", false).is_ok());

    let err = windowed_only("gstreamer", true).unwrap_err();
    assert!(matches!(
        &err,
        PlayerError::Unsupported { backend, operation }
            if backend == "gstreamer" && operation == "fullscreen"
    ));
    assert_eq!(
        err.to_string(),
        "Player backend 'gstreamer' does not support fullscreen"
    );
}
