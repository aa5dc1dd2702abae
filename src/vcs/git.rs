use crate::vcs::{CheckpointSink, CommitOutcome, CommitSettings};
use anyhow::{Context, Result, anyhow, bail};
use chrono::{DateTime, Utc};
use std::process::{Command, Output};

pub struct GitSink {
    settings: CommitSettings,
}

impl GitSink {
    pub fn new(settings: CommitSettings) -> Self {
        Self { settings }
    }

    fn git(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new("git");
        cmd.arg("-C").arg(&self.settings.repo_dir).args(args);
        cmd
    }

    fn run(&self, mut cmd: Command, what: &str) -> Result<Output> {
        let output = cmd
            .output()
            .with_context(|| format!("git {what} execution failed"))?;
        if !output.status.success() {
            bail!(
                "git {what} failed ({}): {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(output)
    }

    fn has_staged_changes(&self) -> Result<bool> {
        let mut cmd = self.git(&["diff", "--cached", "--quiet", "--"]);
        cmd.arg(&self.settings.pathspec);
        let output = cmd.output().context("git diff execution failed")?;
        match output.status.code() {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => bail!(
                "git diff failed ({}): {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        }
    }
}

impl CheckpointSink for GitSink {
    fn stage(&mut self) -> Result<()> {
        let mut cmd = self.git(&["add", "--all", "--"]);
        cmd.arg(&self.settings.pathspec);
        self.run(cmd, "add")?;
        Ok(())
    }

    fn commit(&mut self, unix_time: i64) -> Result<CommitOutcome> {
        // Rewriting unchanged snapshots stages nothing, and git refuses
        // empty commits.
        if !self.has_staged_changes()? {
            return Ok(CommitOutcome::NothingStaged);
        }
        let date = commit_date(unix_time)?;
        let mut cmd = self.git(&["commit", "-q", "-m", self.settings.message.as_str(), "--"]);
        cmd.arg(&self.settings.pathspec)
            .env("GIT_AUTHOR_NAME", &self.settings.author_name)
            .env("GIT_AUTHOR_EMAIL", &self.settings.author_email)
            .env("GIT_AUTHOR_DATE", &date)
            .env("GIT_COMMITTER_NAME", &self.settings.author_name)
            .env("GIT_COMMITTER_EMAIL", &self.settings.author_email)
            .env("GIT_COMMITTER_DATE", &date);
        self.run(cmd, "commit")?;
        Ok(CommitOutcome::Committed)
    }
}

/// Event time as an explicit-UTC git date.
pub fn commit_date(unix_time: i64) -> Result<String> {
    let dt: DateTime<Utc> = DateTime::from_timestamp(unix_time, 0)
        .ok_or_else(|| anyhow!("unix time {unix_time} is out of range for a commit date"))?;
    Ok(dt.to_rfc3339())
}
