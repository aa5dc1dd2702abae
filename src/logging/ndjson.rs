use crate::run::CheckpointReport;
use anyhow::{Context, Result};
use serde_json::json;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

pub fn mirror_checkpoint(path: &Path, report: &CheckpointReport) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create journal dir {}", parent.display()))?;
    }
    let mut f = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open journal {}", path.display()))?;
    let line = json!({
        "ts": report.timestamp,
        "files_written": report.files_written,
        "committed": report.committed,
        "entries": report.entries,
    });
    writeln!(f, "{}", line).with_context(|| format!("append journal {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn appends_one_line_per_checkpoint() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("logs").join("checkpoints.ndjson");
        let report = CheckpointReport {
            timestamp: 130,
            files_written: 1,
            committed: true,
            entries: vec!["web-1/users".to_string()],
        };
        mirror_checkpoint(&path, &report).unwrap();
        mirror_checkpoint(&path, &report).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = raw.lines().collect();
        assert_eq!(lines.len(), 2);
        let parsed: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed["ts"], 130);
        assert_eq!(parsed["files_written"], 1);
        assert_eq!(parsed["committed"], true);
        assert_eq!(parsed["entries"][0], "web-1/users");
    }
}
