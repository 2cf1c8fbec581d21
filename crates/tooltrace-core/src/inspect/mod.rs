//! Offline inspection of captured logs.
//!
//! Reads a JSONL log back and tallies the tool-use and tool-result blocks
//! found in completed `message` events, so collisions (one id on several
//! tool uses) and gaps (tool uses without an id, results matching no tool
//! use) can be spotted without reading the raw file. Which of these shows
//! up depends entirely on the run; nothing here assumes one.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;

/// One `toolUse` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolUseRecord {
    /// 1-based line number in the log.
    pub line: usize,
    pub tool_use_id: Option<String>,
    pub name: Option<String>,
}

/// One `toolResult` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolResultRecord {
    pub line: usize,
    pub tool_use_id: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogSummary {
    pub lines: usize,
    /// Lines that were not valid JSON.
    pub malformed: usize,
    pub tool_uses: Vec<ToolUseRecord>,
    pub tool_results: Vec<ToolResultRecord>,
}

impl LogSummary {
    /// Ids carried by more than one tool-use block, with their counts.
    pub fn duplicate_ids(&self) -> BTreeMap<&str, usize> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for id in self.tool_uses.iter().filter_map(|u| u.tool_use_id.as_deref()) {
            *counts.entry(id).or_default() += 1;
        }
        counts.retain(|_, n| *n > 1);
        counts
    }

    /// Tool-use blocks without a `toolUseId`.
    pub fn missing_ids(&self) -> usize {
        self.tool_uses.iter().filter(|u| u.tool_use_id.is_none()).count()
    }

    /// Results whose id matches no recorded tool use (or that carry none).
    pub fn unmatched_results(&self) -> Vec<&ToolResultRecord> {
        self.tool_results
            .iter()
            .filter(|r| match r.tool_use_id.as_deref() {
                Some(id) => !self
                    .tool_uses
                    .iter()
                    .any(|u| u.tool_use_id.as_deref() == Some(id)),
                None => true,
            })
            .collect()
    }

    /// Tool-use counts per tool name.
    pub fn calls_by_name(&self) -> BTreeMap<&str, usize> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for use_ in &self.tool_uses {
            *counts.entry(use_.name.as_deref().unwrap_or("?")).or_default() += 1;
        }
        counts
    }

    /// Whether any correlation anomaly was recorded.
    pub fn has_anomalies(&self) -> bool {
        !self.duplicate_ids().is_empty()
            || self.missing_ids() > 0
            || !self.unmatched_results().is_empty()
    }
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(|v| v.as_str()).map(str::to_string)
}

fn record_message(summary: &mut LogSummary, line: usize, message: &Value) {
    let Some(blocks) = message.get("content").and_then(|c| c.as_array()) else {
        return;
    };
    for block in blocks {
        if let Some(tool_use) = block.get("toolUse") {
            summary.tool_uses.push(ToolUseRecord {
                line,
                tool_use_id: string_field(tool_use, "toolUseId"),
                name: string_field(tool_use, "name"),
            });
        }
        if let Some(result) = block.get("toolResult") {
            summary.tool_results.push(ToolResultRecord {
                line,
                tool_use_id: string_field(result, "toolUseId"),
                status: string_field(result, "status"),
            });
        }
    }
}

/// Summarize a log from any line source.
pub fn summarize(reader: impl BufRead) -> Result<LogSummary> {
    let mut summary = LogSummary::default();
    for (index, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("failed to read line {}", index + 1))?;
        summary.lines += 1;
        let Ok(event) = serde_json::from_str::<Value>(&line) else {
            summary.malformed += 1;
            continue;
        };
        if let Some(message) = event.get("message") {
            record_message(&mut summary, index + 1, message);
        }
    }
    Ok(summary)
}

/// Summarize the log file at `path`.
pub fn inspect_log(path: &Path) -> Result<LogSummary> {
    let file = File::open(path).with_context(|| format!("failed to open log {}", path.display()))?;
    summarize(BufReader::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summarize_str(text: &str) -> LogSummary {
        summarize(text.as_bytes()).unwrap()
    }

    const DUPLICATE_LOG: &str = r#"{"init_event_loop":true}
{"message":{"role":"assistant","content":[{"toolUse":{"toolUseId":"call_api","name":"call_api","input":{}}},{"toolUse":{"toolUseId":"call_api","name":"call_api","input":{}}}]}}
{"tool_result":{"toolUseId":"call_api","name":"call_api","status":"success","content":[{"text":"API result: 1"}]}}
{"message":{"role":"user","content":[{"toolResult":{"toolUseId":"call_api","status":"success"}},{"toolResult":{"toolUseId":"call_api","status":"success"}}]}}
"#;

    #[test]
    fn detects_duplicate_ids() {
        let summary = summarize_str(DUPLICATE_LOG);
        assert_eq!(summary.lines, 4);
        assert_eq!(summary.tool_uses.len(), 2);
        assert_eq!(summary.tool_results.len(), 2);
        assert_eq!(summary.duplicate_ids().get("call_api"), Some(&2));
        assert_eq!(summary.missing_ids(), 0);
        assert!(summary.unmatched_results().is_empty());
        assert!(summary.has_anomalies());
        assert_eq!(summary.calls_by_name().get("call_api"), Some(&2));
    }

    #[test]
    fn detects_missing_and_unmatched() {
        let log = r#"{"message":{"role":"assistant","content":[{"toolUse":{"name":"call_api"}}]}}
{"message":{"role":"user","content":[{"toolResult":{"toolUseId":"ghost","status":"error"}}]}}
"#;
        let summary = summarize_str(log);
        assert_eq!(summary.missing_ids(), 1);
        let unmatched = summary.unmatched_results();
        assert_eq!(unmatched.len(), 1);
        assert_eq!(unmatched[0].line, 2);
        assert_eq!(unmatched[0].status.as_deref(), Some("error"));
    }

    #[test]
    fn clean_log_has_no_anomalies() {
        let log = r#"{"message":{"role":"assistant","content":[{"toolUse":{"toolUseId":"a","name":"call_api"}},{"toolUse":{"toolUseId":"b","name":"call_api"}}]}}
{"message":{"role":"user","content":[{"toolResult":{"toolUseId":"a"}},{"toolResult":{"toolUseId":"b"}}]}}
"#;
        assert!(!summarize_str(log).has_anomalies());
    }

    #[test]
    fn malformed_lines_are_counted_not_fatal() {
        let summary = summarize_str("{\"ok\":1}\nnot json\n{\"ok\":2}\n");
        assert_eq!(summary.lines, 3);
        assert_eq!(summary.malformed, 1);
    }

    #[test]
    fn empty_log() {
        let summary = summarize_str("");
        assert_eq!(summary, LogSummary::default());
        assert!(!summary.has_anomalies());
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = inspect_log(&dir.path().join("nope.jsonl")).unwrap_err();
        assert!(err.to_string().contains("failed to open log"));
    }
}
