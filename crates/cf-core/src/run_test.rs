use super::*;

fn counts(inserted: u64, updated: u64, unchanged: u64, failed: u64) -> RunCounts {
    RunCounts {
        processed: inserted + updated + unchanged + failed,
        inserted,
        updated,
        unchanged,
        failed,
    }
}

#[test]
fn test_status_decision() {
    assert_eq!(counts(3, 0, 0, 0).decide(), RunStatus::Success);
    assert_eq!(counts(0, 0, 0, 0).decide(), RunStatus::Success);
    assert_eq!(counts(1, 1, 0, 1).decide(), RunStatus::Partial);
    assert_eq!(counts(0, 0, 0, 4).decide(), RunStatus::Failed);
}

#[test]
fn test_unchanged_writes_count_towards_partial() {
    assert_eq!(counts(0, 0, 2, 1).decide(), RunStatus::Partial);
    assert_eq!(counts(0, 0, 2, 1).written(), 2);
}

#[test]
fn test_status_round_trips_through_text() {
    for status in [
        RunStatus::Running,
        RunStatus::Success,
        RunStatus::Failed,
        RunStatus::Partial,
    ] {
        assert_eq!(status.as_str().parse::<RunStatus>().unwrap(), status);
    }
    assert!("DONE".parse::<RunStatus>().is_err());
    assert!(!RunStatus::Running.is_terminal());
    assert!(RunStatus::Partial.is_terminal());
}
