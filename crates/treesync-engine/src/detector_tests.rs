use std::path::Path;

use super::*;
use crate::test_support::fake_tool;
use tempfile::TempDir;

fn paths(dir: &TempDir) -> (String, String) {
    let source = dir.path().join("src");
    std::fs::create_dir_all(&source).unwrap();
    let target = dir.path().join("dst");
    (
        source.to_string_lossy().into_owned(),
        target.to_string_lossy().into_owned(),
    )
}

#[tokio::test]
async fn test_no_output_means_no_changes() {
    let dir = TempDir::new().unwrap();
    let (source, target) = paths(&dir);
    let detector = RsyncDetector::new(fake_tool(dir.path(), "exit 0"));

    assert!(!detector.detect(&source, &target).await.unwrap());
    assert!(Path::new(&target).is_dir());
}

#[tokio::test]
async fn test_itemized_output_means_changes() {
    let dir = TempDir::new().unwrap();
    let (source, target) = paths(&dir);
    let detector = RsyncDetector::new(fake_tool(dir.path(), "echo '>f+++++++++ a.txt'"));

    assert!(detector.detect(&source, &target).await.unwrap());
}

#[tokio::test]
async fn test_preview_flags_are_passed() {
    let dir = TempDir::new().unwrap();
    let (source, target) = paths(&dir);
    let args_file = dir.path().join("args");
    let script = format!("echo \"$@\" > {}", args_file.display());
    let detector = RsyncDetector::new(fake_tool(dir.path(), &script));

    detector.detect(&source, &target).await.unwrap();

    let args = std::fs::read_to_string(&args_file).unwrap();
    assert!(args.contains("--dry-run"));
    assert!(args.contains("--itemize-changes"));
    assert!(args.trim_end().ends_with(&format!("{}/ {}/", source, target)));
}

#[tokio::test]
async fn test_metadata_only_output() {
    let dir = TempDir::new().unwrap();
    let (source, target) = paths(&dir);
    let config = fake_tool(dir.path(), "echo '.f...p..... a.txt'");

    let detector = RsyncDetector::new(config.clone());
    assert!(detector.detect(&source, &target).await.unwrap());

    let detector = RsyncDetector::new(SyncToolConfig {
        metadata_changes_trigger_sync: false,
        ..config
    });
    assert!(!detector.detect(&source, &target).await.unwrap());
}

#[tokio::test]
async fn test_created_target_with_directory_times_only() {
    let dir = TempDir::new().unwrap();
    let (source, target) = paths(&dir);
    assert!(!Path::new(&target).exists());
    // Fails unless the target directory exists when the preview starts; the
    // only difference reported is the directory's modification time.
    let script = r#"for last; do :; done
[ -d "$last" ] || { echo "missing $last" >&2; exit 3; }
echo '.d..t...... ./'"#;
    let config = fake_tool(dir.path(), script);

    let detector = RsyncDetector::new(config.clone());
    assert!(detector.detect(&source, &target).await.unwrap());
    assert!(Path::new(&target).is_dir());

    let detector = RsyncDetector::new(SyncToolConfig {
        metadata_changes_trigger_sync: false,
        ..config
    });
    assert!(!detector.detect(&source, &target).await.unwrap());
}

#[tokio::test]
async fn test_partial_transfer_code_is_accepted() {
    let dir = TempDir::new().unwrap();
    let (source, target) = paths(&dir);
    let detector = RsyncDetector::new(fake_tool(dir.path(), "echo '>f+++++++++ a.txt'; exit 24"));

    assert!(detector.detect(&source, &target).await.unwrap());
}

#[tokio::test]
async fn test_failure_carries_stderr() {
    let dir = TempDir::new().unwrap();
    let (source, target) = paths(&dir);
    let detector = RsyncDetector::new(fake_tool(
        dir.path(),
        "echo '  rsync: change_dir failed  ' >&2; exit 12",
    ));

    match detector.detect(&source, &target).await.unwrap_err() {
        EngineError::Detection(msg) => assert_eq!(msg, "rsync: change_dir failed"),
        other => panic!("expected Detection, got {:?}", other),
    }
}

#[tokio::test]
async fn test_failure_without_stderr_reports_code() {
    let dir = TempDir::new().unwrap();
    let (source, target) = paths(&dir);
    let detector = RsyncDetector::new(fake_tool(dir.path(), "exit 5"));

    let err = detector.detect(&source, &target).await.unwrap_err();
    assert!(err.to_string().contains("exited with 5"));
}

#[tokio::test]
async fn test_missing_program_is_detection_error() {
    let dir = TempDir::new().unwrap();
    let (source, target) = paths(&dir);
    let detector = RsyncDetector::new(SyncToolConfig {
        program: dir.path().join("missing").to_string_lossy().into_owned(),
        ..SyncToolConfig::default()
    });

    let err = detector.detect(&source, &target).await.unwrap_err();
    assert!(matches!(err, EngineError::Detection(_)));
}
