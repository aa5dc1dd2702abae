use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

const CONFIG_RELATIVE_PATH: &str = ".hosttrack/config.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepoConfig {
    pub version: u32,
    pub store: Option<StoreConfig>,
    pub checkpoint: Option<CheckpointConfig>,
    pub decoder: Option<DecoderConfig>,
    pub commit: Option<CommitConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointConfig {
    pub window_secs: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecoderConfig {
    pub marker: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitConfig {
    pub enabled: Option<bool>,
    pub author_name: Option<String>,
    pub author_email: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawRepoConfig {
    version: Option<u32>,
    store: Option<RawStoreConfig>,
    checkpoint: Option<RawCheckpointConfig>,
    decoder: Option<RawDecoderConfig>,
    commit: Option<RawCommitConfig>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawStoreConfig {
    data_dir: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawCheckpointConfig {
    window_secs: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawDecoderConfig {
    marker: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawCommitConfig {
    enabled: Option<bool>,
    author_name: Option<String>,
    author_email: Option<String>,
    message: Option<String>,
}

pub fn repo_config_path(repo_root: &Path) -> PathBuf {
    repo_root.join(CONFIG_RELATIVE_PATH)
}

pub fn load_repo_config(repo_root: &Path) -> Result<Option<RepoConfig>> {
    let path = repo_config_path(repo_root);
    if !path.exists() {
        return Ok(None);
    }

    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("read repo config {}", path.display()))?;
    let parsed: RawRepoConfig =
        toml::from_str(&raw).with_context(|| format!("parse {}", path.display()))?;
    Ok(Some(validate_repo_config(parsed, &path)?))
}

fn validate_repo_config(raw: RawRepoConfig, path: &Path) -> Result<RepoConfig> {
    let version = raw
        .version
        .ok_or_else(|| anyhow::anyhow!("{} missing required `version`", path.display()))?;
    if version != 1 {
        bail!(
            "{} has unsupported version {version}; expected version = 1",
            path.display()
        );
    }

    let store = raw
        .store
        .map(|store| {
            let data_dir = sanitize_optional(store.data_dir)
                .map(|dir| {
                    sanitize_relative_dir(&dir).with_context(|| {
                        format!("{} invalid `[store].data_dir`", path.display())
                    })
                })
                .transpose()?;
            Ok::<_, anyhow::Error>(StoreConfig { data_dir })
        })
        .transpose()?;

    let checkpoint = raw
        .checkpoint
        .map(|checkpoint| {
            if let Some(secs) = checkpoint.window_secs
                && secs <= 0
            {
                bail!(
                    "{} has non-positive `[checkpoint].window_secs = {secs}`",
                    path.display()
                );
            }
            Ok(CheckpointConfig {
                window_secs: checkpoint.window_secs,
            })
        })
        .transpose()?;

    let decoder = raw
        .decoder
        .map(|decoder| {
            if matches!(decoder.marker.as_deref(), Some(m) if m.trim().is_empty()) {
                bail!("{} has empty `[decoder].marker`", path.display());
            }
            Ok(DecoderConfig {
                marker: sanitize_optional(decoder.marker),
            })
        })
        .transpose()?;

    let commit = raw.commit.map(|commit| CommitConfig {
        enabled: commit.enabled,
        author_name: sanitize_optional(commit.author_name),
        author_email: sanitize_optional(commit.author_email),
        message: sanitize_optional(commit.message),
    });

    Ok(RepoConfig {
        version,
        store,
        checkpoint,
        decoder,
        commit,
    })
}

fn sanitize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub(crate) fn sanitize_relative_dir(raw: &str) -> Result<PathBuf> {
    let path = PathBuf::from(raw);
    if path.is_absolute() {
        bail!("data directory must be relative to the repository");
    }
    let mut clean = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            Component::ParentDir => bail!("data directory must not contain `..`"),
            Component::RootDir | Component::Prefix(_) => {
                bail!("data directory must be relative to the repository")
            }
        }
    }
    if clean.as_os_str().is_empty() {
        bail!("data directory is empty");
    }
    Ok(clean)
}
