//! Parsers turning test-run output into failure records.
//!
//! Two formats are understood:
//! - JSON: an array of `{id?, test_name, error_message, location_hint?}` objects
//! - cargo / libtest text: `test x ... FAILED` lines with their panic output, and
//!   rustc `error[E....]` diagnostics with their `-->` locations

use serde::Deserialize;

use crate::domain::FailureRecord;

#[derive(Debug, Deserialize)]
struct RawFailure {
    #[serde(default)]
    id: Option<String>,
    #[serde(alias = "testName", alias = "test", alias = "name")]
    test_name: String,
    #[serde(alias = "errorMessage", alias = "message", alias = "error")]
    error_message: String,
    #[serde(default, alias = "locationHint", alias = "location", alias = "file")]
    location_hint: Option<String>,
}

impl From<RawFailure> for FailureRecord {
    fn from(raw: RawFailure) -> Self {
        let mut record = FailureRecord::new(raw.test_name, raw.error_message);
        if let Some(id) = raw.id {
            record = record.with_id(id);
        }
        if let Some(location) = raw.location_hint {
            record = record.with_location(location);
        }
        record
    }
}

/// Parse a JSON failure list. Accepts the whole output or its last line that
/// starts with `[`, so reporters may print a preamble.
pub fn parse_json(output: &str) -> Option<Vec<FailureRecord>> {
    let trimmed = output.trim();
    if let Ok(raw) = serde_json::from_str::<Vec<RawFailure>>(trimmed) {
        return Some(raw.into_iter().map(FailureRecord::from).collect());
    }
    let last = trimmed.lines().rev().find(|l| l.trim_start().starts_with('['))?;
    serde_json::from_str::<Vec<RawFailure>>(last.trim())
        .ok()
        .map(|raw| raw.into_iter().map(FailureRecord::from).collect())
}

/// Parse cargo/libtest and rustc output.
pub fn parse_cargo(output: &str) -> Vec<FailureRecord> {
    let mut records = parse_compile_errors(output);
    records.extend(parse_test_failures(output));
    records
}

/// Parse `error[E0425]: ...` diagnostics and attach the following `-->` location.
fn parse_compile_errors(output: &str) -> Vec<FailureRecord> {
    let mut records: Vec<FailureRecord> = Vec::new();
    let mut awaiting_location = false;

    for line in output.lines() {
        if line.starts_with("error[E") || (line.starts_with("error:") && !is_summary_error(line)) {
            let message = line
                .strip_prefix("error:")
                .or_else(|| line.find("]: ").map(|i| &line[i + 3..]))
                .unwrap_or(line)
                .trim();
            records.push(FailureRecord::new("compile", message));
            awaiting_location = true;
            continue;
        }

        let trimmed = line.trim();
        if awaiting_location {
            if let Some(location) = trimmed.strip_prefix("--> ") {
                if let Some(last) = records.last_mut() {
                    last.location_hint = Some(strip_line_col(location).to_string());
                }
                awaiting_location = false;
            }
        }
    }

    records
}

fn is_summary_error(line: &str) -> bool {
    line.contains("aborting due to")
        || line.contains("could not compile")
        || line.starts_with("error: test failed")
        || line.contains("target failed")
        || line.contains("Some errors have detailed explanations")
}

/// Parse `test name ... FAILED` lines and pull each test's panic message and location
/// from its `---- name stdout ----` section.
fn parse_test_failures(output: &str) -> Vec<FailureRecord> {
    let mut names: Vec<String> = Vec::new();
    for line in output.lines() {
        if line.starts_with("test ") && line.trim_end().ends_with("FAILED") {
            if let Some(name) = line.strip_prefix("test ").and_then(|s| s.split(" ...").next()) {
                let name = name.trim().to_string();
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
    }

    names
        .into_iter()
        .map(|name| {
            let (message, location) = panic_details(output, &name);
            let mut record = FailureRecord::new(name, message.unwrap_or_else(|| "test failed".to_string()));
            if let Some(location) = location {
                record = record.with_location(location);
            }
            record
        })
        .collect()
}

/// Find the panic message and location inside a test's stdout section.
fn panic_details(output: &str, test_name: &str) -> (Option<String>, Option<String>) {
    let header = format!("---- {} stdout ----", test_name);
    let mut lines = output.lines().skip_while(|l| l.trim() != header).skip(1);

    let mut message: Vec<String> = Vec::new();
    let mut location = None;
    let mut in_panic = false;

    for line in lines.by_ref() {
        if line.starts_with("---- ") || (in_panic && line.trim().is_empty()) {
            break;
        }
        if let Some(idx) = line.find("panicked at ") {
            in_panic = true;
            let rest = &line[idx + "panicked at ".len()..];
            if let Some(quoted) = rest.strip_prefix('\'') {
                // Old format: panicked at 'message', src/lib.rs:10:9
                if let Some((msg, loc)) = quoted.rsplit_once("', ") {
                    message.push(msg.to_string());
                    location = Some(strip_line_col(loc).to_string());
                } else {
                    message.push(quoted.trim_end_matches('\'').to_string());
                }
            } else {
                // Current format: panicked at src/lib.rs:10:9:
                location = Some(strip_line_col(rest.trim_end_matches(':')).to_string());
            }
            continue;
        }
        if in_panic {
            if line.starts_with("note: ") || line.starts_with("stack backtrace") {
                break;
            }
            message.push(line.trim().to_string());
        }
    }

    let message = message.join("\n").trim().to_string();
    ((!message.is_empty()).then_some(message), location)
}

/// `src/lib.rs:10:9` -> `src/lib.rs`
fn strip_line_col(location: &str) -> &str {
    let location = location.trim();
    let mut end = location.len();
    for _ in 0..2 {
        match location[..end].rfind(':') {
            Some(i) if location[i + 1..end].chars().all(|c| c.is_ascii_digit()) && i + 1 < end => end = i,
            _ => break,
        }
    }
    &location[..end]
}
