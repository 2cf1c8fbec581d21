//! `tooltrace inspect` command: summarize a captured log.

use std::path::Path;

use anyhow::Result;

use tooltrace_core::inspect::{LogSummary, inspect_log};

/// Run the inspect command.
pub fn run_inspect(path: &Path) -> Result<()> {
    let summary = inspect_log(path)?;
    println!("Log: {}", path.display());
    for line in summary_lines(&summary) {
        println!("  {line}");
    }
    Ok(())
}

/// Human-readable lines describing a log summary.
pub fn summary_lines(summary: &LogSummary) -> Vec<String> {
    let mut lines = Vec::new();
    if summary.malformed > 0 {
        lines.push(format!(
            "Lines: {} ({} malformed)",
            summary.lines, summary.malformed
        ));
    } else {
        lines.push(format!("Lines: {}", summary.lines));
    }

    lines.push(format!("Tool uses: {}", summary.tool_uses.len()));
    for (name, count) in summary.calls_by_name() {
        lines.push(format!("  {name}: {count}"));
    }
    lines.push(format!("Tool results: {}", summary.tool_results.len()));

    if !summary.has_anomalies() {
        lines.push("No correlation anomalies.".to_string());
        return lines;
    }

    for (id, count) in summary.duplicate_ids() {
        lines.push(format!("DUPLICATE toolUseId {id:?} on {count} tool uses"));
    }
    let missing = summary.missing_ids();
    if missing > 0 {
        lines.push(format!("MISSING toolUseId on {missing} tool use(s)"));
    }
    for result in summary.unmatched_results() {
        let id = result.tool_use_id.as_deref().unwrap_or("<none>");
        lines.push(format!(
            "UNMATCHED result on line {} (toolUseId {id:?})",
            result.line
        ));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use tooltrace_core::inspect::summarize;

    #[test]
    fn clean_log_reports_no_anomalies() {
        let log = r#"{"message":{"role":"assistant","content":[{"toolUse":{"toolUseId":"a","name":"call_api"}}]}}
{"message":{"role":"user","content":[{"toolResult":{"toolUseId":"a","status":"success"}}]}}
"#;
        let lines = summary_lines(&summarize(log.as_bytes()).unwrap());
        assert_eq!(lines[0], "Lines: 2");
        assert!(lines.contains(&"  call_api: 1".to_string()));
        assert_eq!(lines.last().unwrap(), "No correlation anomalies.");
    }

    #[test]
    fn anomalies_are_listed() {
        let log = r#"{"message":{"role":"assistant","content":[{"toolUse":{"toolUseId":"call_api","name":"call_api"}},{"toolUse":{"toolUseId":"call_api","name":"call_api"}},{"toolUse":{"name":"call_api"}}]}}
{"message":{"role":"user","content":[{"toolResult":{"toolUseId":"ghost"}}]}}
not json
"#;
        let lines = summary_lines(&summarize(log.as_bytes()).unwrap());
        assert_eq!(lines[0], "Lines: 3 (1 malformed)");
        assert!(lines.contains(&"DUPLICATE toolUseId \"call_api\" on 2 tool uses".to_string()));
        assert!(lines.contains(&"MISSING toolUseId on 1 tool use(s)".to_string()));
        assert!(lines.contains(&"UNMATCHED result on line 2 (toolUseId \"ghost\")".to_string()));
    }
}
