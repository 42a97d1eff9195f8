// SPDX-License-Identifier: PMPL-1.0-or-later

//! Autotester-style query files
//!
//! Each case spans five lines: `id - comment`, declarations, the `Select`
//! line, the expected answers (comma separated, `none` for no answers) and a
//! timeout in milliseconds.

use crate::pql::QueryProcessor;
use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchCase {
    pub id: String,
    pub comment: String,
    pub query: String,
    pub expected: BTreeSet<String>,
    pub timeout: Duration,
}

#[derive(Debug, Clone, Serialize)]
pub struct CaseOutcome {
    pub id: String,
    pub comment: String,
    pub query: String,
    pub expected: BTreeSet<String>,
    pub actual: BTreeSet<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub elapsed_ms: u128,
    pub timed_out: bool,
    pub passed: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub cases: Vec<CaseOutcome>,
}

impl BatchReport {
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("serializing batch report")?;
        fs::write(path, json).with_context(|| format!("writing batch report {}", path.display()))
    }
}

pub fn load_cases(path: &Path) -> Result<Vec<BatchCase>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading query file {}", path.display()))?;
    parse_cases(&content).with_context(|| format!("parsing query file {}", path.display()))
}

/// Blank lines are skipped between blocks only; inside a block a blank
/// declarations line means no declarations and a blank answer line means
/// no answers
pub fn parse_cases(content: &str) -> Result<Vec<BatchCase>> {
    let mut lines = content.lines().map(str::trim).peekable();
    let mut cases = Vec::new();

    loop {
        while lines.next_if(|line| line.is_empty()).is_some() {}
        let Some(header) = lines.next() else {
            break;
        };
        let mut block = [header, "", "", "", ""];
        for (offset, slot) in block.iter_mut().enumerate().skip(1) {
            *slot = lines.next().ok_or_else(|| {
                anyhow!(
                    "case '{}' ends after {} of its five lines",
                    header,
                    offset
                )
            })?;
        }
        cases.push(parse_block(&block)?);
    }

    Ok(cases)
}

fn parse_block(block: &[&str; 5]) -> Result<BatchCase> {
    let (id, comment) = match block[0].split_once('-') {
        Some((id, comment)) => (id.trim(), comment.trim()),
        None => (block[0], ""),
    };
    let timeout_ms: u64 = block[4]
        .parse()
        .with_context(|| format!("invalid timeout '{}' in case {}", block[4], id))?;
    let query = if block[1].is_empty() {
        block[2].to_string()
    } else {
        format!("{} {}", block[1], block[2])
    };
    Ok(BatchCase {
        id: id.to_string(),
        comment: comment.to_string(),
        query,
        expected: parse_answers(block[3]),
        timeout: Duration::from_millis(timeout_ms),
    })
}

fn parse_answers(line: &str) -> BTreeSet<String> {
    if line.eq_ignore_ascii_case("none") {
        return BTreeSet::new();
    }
    line.split(',')
        .map(str::trim)
        .filter(|answer| !answer.is_empty())
        .map(String::from)
        .collect()
}

/// Evaluate every case; a query error counts as an empty answer
pub fn run_cases(processor: &QueryProcessor, cases: &[BatchCase]) -> BatchReport {
    let mut report = BatchReport::default();
    for case in cases {
        let started = Instant::now();
        let (actual, error) = match processor.process(&case.query) {
            Ok(lines) => (lines.into_iter().collect(), None),
            Err(err) => {
                warn!(case = %case.id, %err, "query failed");
                (BTreeSet::new(), Some(err.to_string()))
            }
        };
        let elapsed = started.elapsed();
        let timed_out = elapsed > case.timeout;
        let passed = actual == case.expected && !timed_out;

        report.total += 1;
        if passed {
            report.passed += 1;
        } else {
            report.failed += 1;
        }
        report.cases.push(CaseOutcome {
            id: case.id.clone(),
            comment: case.comment.clone(),
            query: case.query.clone(),
            expected: case.expected.clone(),
            actual,
            error,
            elapsed_ms: elapsed.as_millis(),
            timed_out,
            passed,
        });
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineProfile;

    const CASES: &str = "
1 - all assignments
assign a;
Select a
1, 3
5000
2 - nothing follows the last statement
stmt s;
Select s such that Follows(3, s)
none
5000
";

    #[test]
    fn test_parse_cases() {
        let cases = parse_cases(CASES).unwrap();
        assert_eq!(cases.len(), 2);
        assert_eq!(cases[0].id, "1");
        assert_eq!(cases[0].comment, "all assignments");
        assert_eq!(cases[0].query, "assign a; Select a");
        assert!(cases[1].expected.is_empty());
        assert_eq!(cases[1].timeout, Duration::from_millis(5000));
    }

    #[test]
    fn test_blank_answer_line_keeps_blocks_aligned() {
        let content = "1 - nothing after the last statement
stmt s;
Select s such that Follows(3, s)

5000
2 - boolean without declarations

Select BOOLEAN such that Follows(1, 2)
TRUE
5000
";
        let cases = parse_cases(content).unwrap();
        assert_eq!(cases.len(), 2);
        assert!(cases[0].expected.is_empty());
        assert_eq!(cases[0].timeout, Duration::from_millis(5000));
        assert_eq!(cases[1].id, "2");
        assert_eq!(cases[1].query, "Select BOOLEAN such that Follows(1, 2)");
        assert!(cases[1].expected.contains("TRUE"));
    }

    #[test]
    fn test_incomplete_block_rejected() {
        assert!(parse_cases("1 - only\nstmt s;\nSelect s\n").is_err());
    }

    #[test]
    fn test_run_cases() {
        let processor = QueryProcessor::from_source(
            "procedure p { x = 1; print x; y = x; }",
            EngineProfile::default(),
        )
        .unwrap();
        let report = run_cases(&processor, &parse_cases(CASES).unwrap());
        assert_eq!(report.total, 2);
        assert_eq!(report.passed, 2);
        assert!(report.cases.iter().all(|c| c.error.is_none()));
    }
}
