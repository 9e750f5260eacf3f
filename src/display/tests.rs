use super::*;
use crate::config::MotionplayConfig;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

const LISTING: &str = "\
Screen 0: minimum 320 x 200, current 1920 x 1080, maximum 7680 x 7680
HDMI-1 connected primary 1920x1080+0+0 (normal left inverted right x axis y axis) 527mm x 296mm
   1920x1080     60.00*+  50.00    59.94
   1280x720      60.00    50.00    59.94
HDMI-2 connected (normal left inverted right x axis y axis)
   1280x720      60.00    50.00
DSI-1 disconnected (normal left inverted right x axis y axis)
";

#[test]
fn test_parse_connected_outputs() {
    assert_eq!(parse_connected_outputs(LISTING), vec!["HDMI-1", "HDMI-2"]);
    assert!(parse_connected_outputs("Screen 0: minimum 320 x 200\n").is_empty());
    assert!(parse_connected_outputs("").is_empty());
}

/// Fake xrandr: prints `listing` when run without arguments, logs every
/// invocation, and rejects any command mentioning `reject`.
fn fake_xrandr(dir: &Path, name: &str, listing: &str, reject: &str) -> (PathBuf, PathBuf) {
    let script = dir.join(name);
    let log = dir.join(format!("{}.log", name));
    let body = format!(
        "#!/bin/sh\n\
         echo \"$*\" >> '{log}'\n\
         if [ $# -eq 0 ]; then\n\
         cat <<'LISTING'\n{listing}LISTING\n\
         exit 0\n\
         fi\n\
         case \"$*\" in *{reject}*) echo rejected >&2; exit 1;; esac\n\
         exit 0\n",
        log = log.display(),
        listing = listing,
        reject = reject,
    );
    fs::write(&script, body).unwrap();
    fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
    (script, log)
}

fn invocations(log: &Path) -> Vec<String> {
    fs::read_to_string(log)
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}

// All scenarios that exec a script live in one test so no other test thread
// forks while a script is still open for writing.
#[tokio::test]
async fn test_xrandr_layouts() {
    let dir = tempfile::tempdir().unwrap();
    let config = MotionplayConfig::default().display;
    let single_listing = "HDMI-1 connected primary (normal)\n";

    let (dual_script, dual_log) = fake_xrandr(dir.path(), "dual", LISTING, "__never__");
    let (fallback_script, fallback_log) = fake_xrandr(dir.path(), "fallback", LISTING, "1280x720");
    let (one_script, one_log) = fake_xrandr(dir.path(), "one", single_listing, "__never__");
    let (none_script, _) = fake_xrandr(dir.path(), "none", "Screen 0: minimum\n", "__never__");

    // Dual: first mode on the left output, then the right one beside it
    let display = XrandrDisplay::new(&config).with_binary(dual_script.to_string_lossy());
    assert!(display.prepare(PlaybackMode::Dual).await);
    assert_eq!(
        invocations(&dual_log),
        vec![
            "".to_string(),
            "--output HDMI-1 --mode 1280x720 --rotate left".to_string(),
            "--output HDMI-2 --mode 1280x720 --rotate left --right-of HDMI-1".to_string(),
        ]
    );

    // Rejected mode falls through to the next one in the list
    let display = XrandrDisplay::new(&config).with_binary(fallback_script.to_string_lossy());
    assert!(display.prepare(PlaybackMode::Single).await);
    let calls = invocations(&fallback_log);
    assert_eq!(
        calls.last().unwrap(),
        "--output HDMI-1 --mode 1920x1080 --rotate left"
    );

    // Dual with a single output degrades to single
    let display = XrandrDisplay::new(&config).with_binary(one_script.to_string_lossy());
    assert!(display.prepare(PlaybackMode::Dual).await);
    assert!(!invocations(&one_log).iter().any(|c| c.contains("--right-of")));

    // No connected outputs
    let display = XrandrDisplay::new(&config).with_binary(none_script.to_string_lossy());
    assert!(!display.prepare(PlaybackMode::Single).await);

    // Missing binary
    let display = XrandrDisplay::new(&config).with_binary("/nonexistent/xrandr");
    assert!(!display.prepare(PlaybackMode::Single).await);
}

#[tokio::test]
async fn test_disabled_display_is_noop() {
    let mut config = MotionplayConfig::default().display;
    config.enabled = false;

    let display = build_display(&config);
    assert_eq!(display.name(), "noop");
    assert!(display.prepare(PlaybackMode::Dual).await);

    config.enabled = true;
    assert_eq!(build_display(&config).name(), "xrandr");
}
