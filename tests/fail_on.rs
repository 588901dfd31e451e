use iacscan_core::{ScanSummary, Severity};

fn summary(critical: u64, high: u64, medium: u64, low: u64) -> ScanSummary {
    ScanSummary {
        file_name: "main.tf".into(),
        summary_id: "1".into(),
        passed: 0,
        failed: critical + high + medium + low,
        critical,
        high,
        medium,
        low,
    }
}

#[test]
fn fail_on_passes_when_no_matching_severity() {
    // Only medium and low findings, threshold is high
    let s = summary(0, 0, 2, 5);
    assert!(!s.breaches(Some(Severity::High)), "should not fail below high");
}

#[test]
fn fail_on_fails_when_matching_severity_found() {
    // Critical finding present, threshold is medium
    let s = summary(1, 0, 0, 0);
    assert!(s.breaches(Some(Severity::Medium)), "critical meets medium threshold");
}

#[test]
fn fail_on_high_catches_critical_and_high() {
    let threshold = Severity::High;

    assert!(Severity::Critical.meets_threshold(threshold));
    assert!(Severity::High.meets_threshold(threshold));
    assert!(!Severity::Medium.meets_threshold(threshold));
    assert!(!Severity::Low.meets_threshold(threshold));
}

#[test]
fn no_minimum_severity_never_fails() {
    assert!(!summary(9, 9, 9, 9).breaches(None));
}
