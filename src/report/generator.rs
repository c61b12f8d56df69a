//! Report rendering.
//!
//! Turns a [`TallyReport`] into plain text or JSON.

use crate::models::{ReportMetadata, StatusClass, TallyReport};
use anyhow::Result;
use std::io::Write;
use std::path::Path;

/// Generate a human-readable text report.
pub fn generate_text_report(report: &TallyReport) -> String {
    let mut output = String::new();

    output.push_str("Status Tally\n");
    output.push_str("============\n\n");

    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_counts_section(report));
    output.push_str(&generate_class_section(report));

    output
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str(&format!("Source:         {}\n", metadata.source));
    section.push_str(&format!(
        "Started:        {}\n",
        metadata.started_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("URLs submitted: {}\n", metadata.urls_submitted));
    match metadata.max_concurrency {
        Some(limit) => section.push_str(&format!("Concurrency:    {}\n", limit)),
        None => section.push_str("Concurrency:    unbounded\n"),
    }
    section.push_str(&format!("Outcome:        {}\n", metadata.termination));
    section.push_str(&format!(
        "Duration:       {:.1}s\n\n",
        metadata.duration_seconds
    ));

    section
}

/// Generate the per-code table.
fn generate_counts_section(report: &TallyReport) -> String {
    let mut section = String::new();

    section.push_str("Status  Count\n");
    section.push_str("------  -----\n");

    if report.counts.is_empty() {
        section.push_str("(no responses)\n");
    }
    for (code, count) in &report.counts {
        section.push_str(&format!("{:<6}  {}\n", code, count));
    }

    section.push_str(&format!(
        "\nResponses: {} | Unanswered: {}\n",
        report.successful_responses, report.unanswered
    ));

    section
}

/// Generate the per-class rollup.
fn generate_class_section(report: &TallyReport) -> String {
    let classes = report.by_class();
    if classes.is_empty() {
        return String::new();
    }

    let mut section = String::from("\nBy class:\n");
    for (class, count) in classes {
        section.push_str(&format!("  {} {}: {}\n", class.emoji(), class, count));
    }

    section
}

/// Generate a JSON report.
pub fn generate_json_report(report: &TallyReport) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

/// Write rendered report content to a file, or stdout when `path` is `None`.
pub fn write_output(content: &str, path: Option<&Path>) -> Result<()> {
    match path {
        Some(path) => {
            let mut file = std::fs::File::create(path)?;
            file.write_all(content.as_bytes())?;
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(content.as_bytes())?;
            if !content.ends_with('\n') {
                stdout.write_all(b"\n")?;
            }
        }
    }
    Ok(())
}

/// Summary line used for progress output.
pub fn progress_line(counts: &std::collections::BTreeMap<u16, u64>) -> String {
    if counts.is_empty() {
        return "waiting for responses".to_string();
    }
    counts
        .iter()
        .map(|(code, count)| {
            format!("{}{}={}", StatusClass::of(*code).emoji(), code, count)
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Termination;
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn create_test_report() -> TallyReport {
        TallyReport::new(
            ReportMetadata {
                source: "stdin".to_string(),
                started_at: Utc::now(),
                urls_submitted: 4,
                max_concurrency: Some(8),
                termination: Termination::Completed,
                duration_seconds: 0.25,
            },
            BTreeMap::from([(200, 2), (404, 1)]),
        )
    }

    #[test]
    fn test_generate_text_report() {
        let text = generate_text_report(&create_test_report());

        assert!(text.contains("Status Tally"));
        assert!(text.contains("Source:         stdin"));
        assert!(text.contains("Concurrency:    8"));
        assert!(text.contains("200     2"));
        assert!(text.contains("404     1"));
        assert!(text.contains("Responses: 3 | Unanswered: 1"));
        assert!(text.contains("2xx Success: 2"));
    }

    #[test]
    fn test_generate_text_report_without_responses() {
        let mut report = create_test_report();
        report.counts.clear();
        let text = generate_text_report(&report);

        assert!(text.contains("(no responses)"));
        assert!(!text.contains("By class:"));
    }

    #[test]
    fn test_generate_json_report() {
        let json = generate_json_report(&create_test_report()).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed["counts"]["200"], 2);
        assert_eq!(parsed["counts"]["404"], 1);
        assert_eq!(parsed["successful_responses"], 3);
        assert_eq!(parsed["metadata"]["termination"], "completed");
    }

    #[test]
    fn test_write_output_to_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("report.txt");

        write_output("hello", Some(path.as_path())).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello");
    }

    #[test]
    fn test_progress_line() {
        assert_eq!(progress_line(&BTreeMap::new()), "waiting for responses");

        let line = progress_line(&BTreeMap::from([(200, 3), (500, 1)]));
        assert!(line.contains("200=3"));
        assert!(line.contains("500=1"));
    }
}
