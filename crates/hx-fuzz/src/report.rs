//! Report generation for fuzzing results

use crate::harness::FuzzResult;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

/// Fuzzing report for multiple targets
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FuzzReport {
    pub title: String,

    /// UTC, RFC 3339
    pub timestamp: String,

    pub results: Vec<TargetResult>,

    pub summary: FuzzSummary,
}

/// Result for a single fuzz target
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetResult {
    pub name: String,
    pub result: FuzzResult,
}

/// Summary statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FuzzSummary {
    pub total_targets: usize,
    pub passed_targets: usize,
    pub failed_targets: usize,
    pub total_iterations: usize,
    pub total_failures: usize,
    pub total_panics: usize,
    pub total_duration_ms: u64,
}

/// Report output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ReportFormat {
    Text,
    Json,
    #[value(name = "junit")]
    JUnit,
}

impl FuzzReport {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            timestamp: timestamp_now(),
            results: Vec::new(),
            summary: FuzzSummary::default(),
        }
    }

    /// Add a target result
    pub fn add_result(&mut self, name: impl Into<String>, result: FuzzResult) {
        let name = name.into();
        if result.passed {
            self.summary.passed_targets += 1;
            log::debug!("{name}: {}", result.summary());
        } else {
            self.summary.failed_targets += 1;
            log::warn!("{name}: {}", result.summary());
        }
        self.summary.total_targets += 1;
        self.summary.total_iterations += result.iterations;
        self.summary.total_failures += result.failures;
        self.summary.total_panics += result.panics;
        self.summary.total_duration_ms += result.duration_ms;

        self.results.push(TargetResult { name, result });
    }

    pub fn all_passed(&self) -> bool {
        self.summary.failed_targets == 0
    }

    pub fn render(&self, format: ReportFormat) -> String {
        match format {
            ReportFormat::Text => self.to_text(),
            ReportFormat::Json => self.to_json(),
            ReportFormat::JUnit => self.to_junit(),
        }
    }

    /// Plain text
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        let s = &self.summary;

        let _ = writeln!(out, "{}", self.title);
        let _ = writeln!(out, "{}\n", "=".repeat(self.title.len()));
        let _ = writeln!(out, "Timestamp: {}\n", self.timestamp);

        out.push_str("Summary:\n");
        let _ = writeln!(
            out,
            "  Targets: {} total, {} passed, {} failed",
            s.total_targets, s.passed_targets, s.failed_targets
        );
        let _ = writeln!(
            out,
            "  Iterations: {} total, {} failures, {} panics",
            s.total_iterations, s.total_failures, s.total_panics
        );
        let _ = writeln!(out, "  Duration: {} ms\n", s.total_duration_ms);

        out.push_str("Results:\n");
        out.push_str(&"-".repeat(80));
        out.push('\n');

        for target in &self.results {
            let status = if target.result.passed { "PASS" } else { "FAIL" };
            let _ = writeln!(out, "[{status}] {}", target.name);
            let _ = writeln!(out, "    {}", target.result.summary());

            let details = &target.result.failure_details;
            if !details.is_empty() {
                out.push_str("    Failures:\n");
                for (i, failure) in details.iter().take(5).enumerate() {
                    let _ = writeln!(
                        out,
                        "      {}. {:?} at iteration {}: {}",
                        i + 1,
                        failure.failure_type,
                        failure.iteration,
                        failure.description
                    );
                    if failure.input.len() < 200 {
                        let _ = writeln!(out, "         Input: {}", failure.input);
                    }
                }
                if details.len() > 5 {
                    let _ = writeln!(out, "      ... and {} more failures", details.len() - 5);
                }
            }
            out.push('\n');
        }

        out
    }

    /// Pretty JSON
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".into())
    }

    /// JUnit XML, one test case per target
    pub fn to_junit(&self) -> String {
        let mut out = String::new();

        out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        let _ = writeln!(
            out,
            "<testsuite name=\"{}\" tests=\"{}\" failures=\"{}\" time=\"{}\" timestamp=\"{}\">",
            xml_escape(&self.title),
            self.summary.total_targets,
            self.summary.failed_targets,
            self.summary.total_duration_ms as f64 / 1000.0,
            self.timestamp
        );

        for target in &self.results {
            let _ = writeln!(
                out,
                "  <testcase name=\"{}\" time=\"{}\">",
                xml_escape(&target.name),
                target.result.duration_ms as f64 / 1000.0
            );

            if !target.result.passed {
                let message = match target.result.failure_details.first() {
                    Some(first) => format!("{:?}: {}", first.failure_type, first.description),
                    None => "Unknown failure".to_string(),
                };
                let _ = writeln!(
                    out,
                    "    <failure message=\"{}\">{} failures in {} iterations (seed {:?})</failure>",
                    xml_escape(&message),
                    target.result.failures,
                    target.result.iterations,
                    target.result.seed
                );
            }

            out.push_str("  </testcase>\n");
        }

        out.push_str("</testsuite>\n");
        out
    }

    pub fn save<P: AsRef<Path>>(&self, path: P, format: ReportFormat) -> std::io::Result<()> {
        fs::write(path, self.render(format))
    }
}

fn is_leap(year: u64) -> bool {
    year % 4 == 0 && (year % 100 != 0 || year % 400 == 0)
}

fn timestamp_now() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};

    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    format_timestamp(secs)
}

fn format_timestamp(secs: u64) -> String {
    let time_of_day = secs % 86400;
    let (hours, minutes, seconds) = (time_of_day / 3600, (time_of_day % 3600) / 60, time_of_day % 60);

    let mut year = 1970u64;
    let mut remaining_days = secs / 86400;
    loop {
        let days_in_year = if is_leap(year) { 366 } else { 365 };
        if remaining_days < days_in_year {
            break;
        }
        remaining_days -= days_in_year;
        year += 1;
    }

    let february = if is_leap(year) { 29 } else { 28 };
    let days_in_months: [u64; 12] = [31, february, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

    let mut month = 1;
    for (i, &d) in days_in_months.iter().enumerate() {
        if remaining_days < d {
            month = i + 1;
            break;
        }
        remaining_days -= d;
    }
    let day = remaining_days + 1;

    format!("{year:04}-{month:02}-{day:02}T{hours:02}:{minutes:02}:{seconds:02}Z")
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_test_result(passed: bool, failures: usize) -> FuzzResult {
        FuzzResult {
            iterations: 100,
            successes: 100 - failures,
            failures,
            panics: failures / 2,
            timeouts: 0,
            duration_ms: 50,
            seed: Some(42),
            failure_details: vec![],
            passed,
        }
    }

    #[test]
    fn test_report_creation() {
        let mut report = FuzzReport::new("Test Report");
        report.add_result("target1", make_test_result(true, 0));
        report.add_result("target2", make_test_result(false, 5));

        assert_eq!(report.summary.total_targets, 2);
        assert_eq!(report.summary.passed_targets, 1);
        assert_eq!(report.summary.failed_targets, 1);
        assert_eq!(report.summary.total_failures, 5);
        assert!(!report.all_passed());
    }

    #[test]
    fn test_text_report() {
        let mut report = FuzzReport::new("Test Report");
        report.add_result("target1", make_test_result(true, 0));

        let text = report.render(ReportFormat::Text);
        assert!(text.contains("Test Report"));
        assert!(text.contains("[PASS] target1"));
    }

    #[test]
    fn test_junit_escapes_and_counts() {
        let mut report = FuzzReport::new("Suite <1>");
        report.add_result("a&b", make_test_result(false, 3));

        let xml = report.to_junit();
        assert!(xml.contains("Suite &lt;1&gt;"));
        assert!(xml.contains("name=\"a&amp;b\""));
        assert!(xml.contains("failures=\"1\""));
        assert!(xml.contains("<failure message=\"Unknown failure\">"));
    }

    #[test]
    fn test_json_round_trip() {
        let mut report = FuzzReport::new("Json");
        report.add_result("t", make_test_result(true, 0));
        let parsed: FuzzReport = serde_json::from_str(&report.to_json()).expect("parse");
        assert_eq!(parsed.results.len(), 1);
        assert_eq!(parsed.summary.total_iterations, 100);
    }

    #[test]
    fn test_save_to_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("report.xml");
        let mut report = FuzzReport::new("Saved");
        report.add_result("t", make_test_result(true, 0));
        report.save(&path, ReportFormat::JUnit).expect("save");
        assert!(std::fs::read_to_string(&path).expect("read").starts_with("<?xml"));
    }

    #[test]
    fn test_timestamp_format() {
        assert_eq!(format_timestamp(0), "1970-01-01T00:00:00Z");
        // 2024-02-29T12:34:56Z
        assert_eq!(format_timestamp(1_709_210_096), "2024-02-29T12:34:56Z");
    }
}
