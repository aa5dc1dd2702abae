mod r#loop;
pub mod scheduler;

pub use r#loop::replay;

use crate::config::{self, RepoConfig};
use crate::events::decoder::{self, DEFAULT_MARKER, DecodeOutcome};
use crate::events::projector::{ApplyOutcome, WorkingCache, apply};
use crate::events::Event;
use crate::logging::ndjson;
use crate::store::{DEFAULT_DATA_DIR, SnapshotStore};
use crate::vcs::{self, CheckpointSink, CommitOutcome, CommitSettings};
use anyhow::{Context, Result, bail};
use scheduler::{CheckpointWindow, DEFAULT_WINDOW_SECS};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use tracing::{debug, info, warn};

const DEFAULT_AUTHOR_NAME: &str = "hosttrack";
const DEFAULT_AUTHOR_EMAIL: &str = "hosttrack@localhost";
const DEFAULT_COMMIT_MESSAGE: &str = "auto";

#[derive(Debug, Clone)]
pub struct RunCommand {
    pub log_file: PathBuf,
    pub repo: PathBuf,
    pub window_secs: Option<i64>,
    pub marker: Option<String>,
    pub data_dir: Option<PathBuf>,
    pub no_commit: bool,
    pub final_flush: bool,
    pub log: Option<PathBuf>,
}

/// Effective run settings after merging CLI flags over the repo config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSettings {
    pub data_root: PathBuf,
    pub window_secs: i64,
    pub marker: String,
    pub final_flush: bool,
    pub journal: Option<PathBuf>,
    pub commit: CommitSettings,
}

pub fn resolve_settings(cmd: &RunCommand, repo_cfg: Option<&RepoConfig>) -> Result<RunSettings> {
    let data_dir = match &cmd.data_dir {
        Some(dir) => config::sanitize_relative_dir(&dir.to_string_lossy())
            .context("invalid --data-dir")?,
        None => repo_cfg
            .and_then(|c| c.store.as_ref())
            .and_then(|s| s.data_dir.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR)),
    };
    let window_secs = cmd
        .window_secs
        .or_else(|| {
            repo_cfg
                .and_then(|c| c.checkpoint.as_ref())
                .and_then(|c| c.window_secs)
        })
        .unwrap_or(DEFAULT_WINDOW_SECS);
    if window_secs <= 0 {
        bail!("checkpoint window must be positive, got {window_secs}");
    }
    let marker = cmd
        .marker
        .clone()
        .filter(|m| !m.trim().is_empty())
        .or_else(|| {
            repo_cfg
                .and_then(|c| c.decoder.as_ref())
                .and_then(|d| d.marker.clone())
        })
        .unwrap_or_else(|| DEFAULT_MARKER.to_string());

    let commit_cfg = repo_cfg.and_then(|c| c.commit.as_ref());
    let commit = CommitSettings {
        enabled: !cmd.no_commit && commit_cfg.and_then(|c| c.enabled).unwrap_or(true),
        repo_dir: cmd.repo.clone(),
        pathspec: data_dir.clone(),
        author_name: commit_cfg
            .and_then(|c| c.author_name.clone())
            .unwrap_or_else(|| DEFAULT_AUTHOR_NAME.to_string()),
        author_email: commit_cfg
            .and_then(|c| c.author_email.clone())
            .unwrap_or_else(|| DEFAULT_AUTHOR_EMAIL.to_string()),
        message: commit_cfg
            .and_then(|c| c.message.clone())
            .unwrap_or_else(|| DEFAULT_COMMIT_MESSAGE.to_string()),
    };

    Ok(RunSettings {
        data_root: cmd.repo.join(&data_dir),
        window_secs,
        marker,
        final_flush: cmd.final_flush,
        journal: cmd.log.clone(),
        commit,
    })
}

pub fn execute_run(cmd: RunCommand) -> Result<RunSummary> {
    let repo_cfg = config::load_repo_config(&cmd.repo)?;
    let settings = resolve_settings(&cmd, repo_cfg.as_ref())?;
    info!(
        log_file = %cmd.log_file.display(),
        data_root = %settings.data_root.display(),
        window_secs = settings.window_secs,
        commit = settings.commit.enabled,
        "replaying log"
    );

    let input = File::open(&cmd.log_file)
        .with_context(|| format!("open log file {}", cmd.log_file.display()))?;
    let mut engine = Engine::new(
        SnapshotStore::new(&settings.data_root),
        vcs::sink_for(&settings.commit),
        EngineOptions::from(&settings),
    );
    replay(&mut engine, BufReader::new(input))?;
    let summary = engine.finish(settings.final_flush)?;
    print_summary(&summary);
    Ok(summary)
}

fn print_summary(summary: &RunSummary) {
    println!("lines: {}", summary.lines);
    println!("decoded: {}", summary.decoded);
    for (reason, count) in &summary.skipped {
        println!("skipped[{reason}]: {count}");
    }
    println!(
        "applied: appended={} removed={} absent={} ignored={}",
        summary.appended, summary.removed, summary.absent, summary.ignored
    );
    println!(
        "checkpoints: {} (files_written={} commits={})",
        summary.checkpoints, summary.files_written, summary.commits
    );
    if summary.unflushed_entries > 0 {
        println!("unflushed_entries: {}", summary.unflushed_entries);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOptions {
    pub window_secs: i64,
    pub marker: String,
    pub journal: Option<PathBuf>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            window_secs: DEFAULT_WINDOW_SECS,
            marker: DEFAULT_MARKER.to_string(),
            journal: None,
        }
    }
}

impl From<&RunSettings> for EngineOptions {
    fn from(settings: &RunSettings) -> Self {
        Self {
            window_secs: settings.window_secs,
            marker: settings.marker.clone(),
            journal: settings.journal.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointReport {
    pub timestamp: i64,
    pub files_written: usize,
    pub committed: bool,
    /// `label/query` for every entry persisted.
    pub entries: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub lines: u64,
    pub decoded: u64,
    pub skipped: BTreeMap<&'static str, u64>,
    pub appended: u64,
    pub removed: u64,
    pub absent: u64,
    pub ignored: u64,
    pub checkpoints: u64,
    pub files_written: u64,
    pub commits: u64,
    pub unflushed_entries: usize,
}

/// Reconstruction state for one run: the working cache, the checkpoint
/// window, and the collaborators a checkpoint writes through.
pub struct Engine<S: CheckpointSink> {
    store: SnapshotStore,
    sink: S,
    cache: WorkingCache,
    window: CheckpointWindow,
    marker: String,
    journal: Option<PathBuf>,
    last_ts: Option<i64>,
    summary: RunSummary,
}

impl<S: CheckpointSink> Engine<S> {
    pub fn new(store: SnapshotStore, sink: S, opts: EngineOptions) -> Self {
        Self {
            store,
            sink,
            cache: WorkingCache::new(),
            window: CheckpointWindow::new(opts.window_secs),
            marker: opts.marker,
            journal: opts.journal,
            last_ts: None,
            summary: RunSummary::default(),
        }
    }

    pub fn cache(&self) -> &WorkingCache {
        &self.cache
    }

    pub fn window(&self) -> &CheckpointWindow {
        &self.window
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    /// Decode and apply one raw line. Skipped lines leave state untouched.
    pub fn process_line(&mut self, line: &str) -> Result<Option<CheckpointReport>> {
        self.summary.lines += 1;
        match decoder::decode(line, &self.marker)? {
            DecodeOutcome::Decoded(event) => {
                self.summary.decoded += 1;
                self.process_event(event)
            }
            DecodeOutcome::Skipped(reason) => {
                debug!(reason = reason.label(), "skipped line {}", self.summary.lines);
                *self.summary.skipped.entry(reason.label()).or_default() += 1;
                Ok(None)
            }
        }
    }

    pub fn process_event(&mut self, event: Event) -> Result<Option<CheckpointReport>> {
        let Event {
            entity_label,
            query_name,
            action,
            row,
            timestamp,
            ..
        } = event;
        let store = &self.store;
        let set = self
            .cache
            .entry_or_load(&entity_label, &query_name, |label, query| {
                store.load(label, query)
            })?;
        match apply(set, &action, row) {
            ApplyOutcome::Appended => self.summary.appended += 1,
            ApplyOutcome::Removed => self.summary.removed += 1,
            ApplyOutcome::Absent => {
                debug!(host = %entity_label, query = %query_name, "remove of absent row");
                self.summary.absent += 1;
            }
            ApplyOutcome::Ignored(raw) => {
                warn!(host = %entity_label, query = %query_name, "unknown action: {raw}");
                self.summary.ignored += 1;
            }
        }

        self.last_ts = Some(timestamp);
        if !self.window.is_due(timestamp) {
            return Ok(None);
        }
        self.checkpoint(timestamp).map(Some)
    }

    /// Persist every cached entry and, if anything was written, commit it
    /// and drop the cache so later events reload from disk.
    pub fn checkpoint(&mut self, timestamp: i64) -> Result<CheckpointReport> {
        let mut entries = Vec::new();
        for (label, query, set) in self.cache.iter() {
            self.store.persist(label, query, &set.rows)?;
            entries.push(format!("{label}/{query}"));
        }
        let files_written = entries.len();

        let mut committed = false;
        if files_written > 0 {
            self.sink.stage().context("stage checkpoint")?;
            committed = self.sink.commit(timestamp).context("commit checkpoint")?
                == CommitOutcome::Committed;
            self.cache.clear();
        }
        self.window.mark(timestamp);

        info!(files_written, committed, "flushed {files_written} files at {timestamp}");
        let report = CheckpointReport {
            timestamp,
            files_written,
            committed,
            entries,
        };
        if let Some(path) = &self.journal {
            ndjson::mirror_checkpoint(path, &report)?;
        }
        self.summary.checkpoints += 1;
        self.summary.files_written += files_written as u64;
        if committed {
            self.summary.commits += 1;
        }
        Ok(report)
    }

    /// End of input. Without `final_flush`, anything since the last
    /// checkpoint stays in memory and is dropped with the engine.
    pub fn finish(&mut self, final_flush: bool) -> Result<RunSummary> {
        if final_flush
            && !self.cache.is_empty()
            && let Some(ts) = self.last_ts
        {
            self.checkpoint(ts)?;
        }
        self.summary.unflushed_entries = self.cache.len();
        Ok(self.summary.clone())
    }
}
