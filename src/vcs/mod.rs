pub mod git;

use anyhow::Result;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed,
    NothingStaged,
}

/// Durable record of one checkpoint: stage what the store wrote, then commit
/// it at the triggering event's time. Errors are fatal to the run.
pub trait CheckpointSink {
    fn stage(&mut self) -> Result<()>;
    fn commit(&mut self, unix_time: i64) -> Result<CommitOutcome>;
}

impl<T: CheckpointSink + ?Sized> CheckpointSink for Box<T> {
    fn stage(&mut self) -> Result<()> {
        (**self).stage()
    }

    fn commit(&mut self, unix_time: i64) -> Result<CommitOutcome> {
        (**self).commit(unix_time)
    }
}

/// Accepts every checkpoint without recording it.
#[derive(Debug, Default)]
pub struct NullSink;

impl CheckpointSink for NullSink {
    fn stage(&mut self) -> Result<()> {
        Ok(())
    }

    fn commit(&mut self, _unix_time: i64) -> Result<CommitOutcome> {
        Ok(CommitOutcome::NothingStaged)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitSettings {
    pub enabled: bool,
    pub repo_dir: PathBuf,
    /// Snapshot root, relative to `repo_dir`.
    pub pathspec: PathBuf,
    pub author_name: String,
    pub author_email: String,
    pub message: String,
}

pub fn sink_for(settings: &CommitSettings) -> Box<dyn CheckpointSink> {
    if !settings.enabled {
        return Box::new(NullSink);
    }
    Box::new(git::GitSink::new(settings.clone()))
}
