//! Plain-text rendering of run and verification reports.

use std::fmt::Write as _;

use frs_core::pipeline::{JobReport, RunReport, VerifyReport};

pub fn run_report(report: &RunReport) -> String {
  let mut out = String::new();
  let _ = writeln!(
    out,
    "run {} ({} mode, {})",
    report.run_id, report.mode, report.today
  );
  let _ = writeln!(
    out,
    "{:<28} {:<16} {:>8} {:>9} {:>7} {:>9} {:>8} {:>7}",
    "table",
    "outcome",
    "inserted",
    "corrected",
    "expired",
    "unchanged",
    "rejected",
    "skipped"
  );
  for job in &report.jobs {
    let _ = writeln!(out, "{}", job_line(job));
  }
  let rejected = report.rejected();
  let _ = writeln!(
    out,
    "total inserted: {}; rejected: {rejected}",
    report.inserted()
  );
  out
}

fn job_line(job: &JobReport) -> String {
  let mut line = format!(
    "{:<28} {:<16} {:>8} {:>9} {:>7} {:>9} {:>8} {:>7}",
    job.table.to_string(),
    job.outcome.to_string(),
    job.inserted,
    job.corrected,
    job.expired,
    job.unchanged,
    job.rejected.total(),
    job.already_loaded + job.below_watermark,
  );
  if let Some(mark) = job.watermark {
    let _ = write!(line, "  watermark {mark}");
  }
  line
}

pub fn verify_report(report: &VerifyReport) -> String {
  if report.is_clean() {
    return "warehouse is consistent\n".to_string();
  }
  let mut out = String::new();
  for violation in &report.timeline {
    let _ = writeln!(out, "dim_mata_kuliah {violation}");
  }
  for duplicate in &report.duplicates {
    let _ = writeln!(
      out,
      "{}: {} key triple(s) loaded more than once",
      duplicate.table, duplicate.triples
    );
  }
  out
}
