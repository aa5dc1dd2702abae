use crate::run::Engine;
use crate::vcs::CheckpointSink;
use anyhow::{Context, Result};
use std::io::BufRead;

/// Feeds every line of `input` through the engine, strictly in order.
///
/// Invalid UTF-8 is replaced rather than rejected; such lines fail to decode
/// and are skipped like any other non-matching line.
pub fn replay<S: CheckpointSink, R: BufRead>(engine: &mut Engine<S>, mut input: R) -> Result<()> {
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let read = input
            .read_until(b'\n', &mut buf)
            .context("read log input")?;
        if read == 0 {
            return Ok(());
        }
        let line = String::from_utf8_lossy(&buf);
        let line = line.trim_end_matches(['\n', '\r']);
        let line_no = engine.summary().lines + 1;
        engine
            .process_line(line)
            .with_context(|| format!("process log line {line_no}"))?;
    }
}
