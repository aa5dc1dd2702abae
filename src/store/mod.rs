pub mod canonical;

use crate::events::Row;
use anyhow::{Context, Result, bail};
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

pub const DEFAULT_DATA_DIR: &str = "data";

/// Persisted result sets laid out as `<root>/<entity label>/<query name>.json`.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    root: PathBuf,
}

impl SnapshotStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_for(&self, label: &str, query: &str) -> Result<PathBuf> {
        let label = validate_key(label).context("invalid entity label")?;
        let query = validate_key(query).context("invalid query name")?;
        Ok(self.root.join(label).join(format!("{query}.json")))
    }

    /// Rows persisted for the pair; empty when nothing has been written yet.
    pub fn load(&self, label: &str, query: &str) -> Result<Vec<Row>> {
        let path = self.path_for(label, query)?;
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(err).with_context(|| format!("read snapshot {}", path.display()));
            }
        };
        serde_json::from_str(&raw).with_context(|| format!("parse snapshot {}", path.display()))
    }

    pub fn persist(&self, label: &str, query: &str, rows: &[Row]) -> Result<PathBuf> {
        let path = self.path_for(label, query)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create snapshot dir {}", parent.display()))?;
        }
        let bytes = canonical::to_canonical_bytes(rows)
            .with_context(|| format!("serialize snapshot {}", path.display()))?;
        std::fs::write(&path, bytes)
            .with_context(|| format!("write snapshot {}", path.display()))?;
        Ok(path)
    }
}

// Labels and query names come from the log stream; each must stay a single
// path segment under the store root.
fn validate_key(raw: &str) -> Result<&str> {
    if raw.is_empty() {
        bail!("key is empty");
    }
    if raw.contains(['/', '\\']) {
        bail!("key {raw:?} contains a path separator");
    }
    let mut components = Path::new(raw).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(raw),
        _ => bail!("key {raw:?} is not a plain file name"),
    }
}
