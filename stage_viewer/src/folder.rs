//! Model folder scanning.
//!
//! Reads a directory the user picked, finds the manifest, and keys every
//! file under the manifest's directory by its path relative to it, the way
//! manifest references are written (`textures/texture_00.png`).

use std::path::{Component, Path, PathBuf};

use anyhow::{bail, Context};
use stage_core::{manifest::Manifest, payload::PayloadMap};
use tracing::{debug, info};

/// A scanned model folder, ready to load.
#[derive(Debug, Clone)]
pub struct ModelFolder {
    /// Manifest location on disk.
    pub manifest_path: PathBuf,
    pub manifest: Manifest,
    pub payloads: PayloadMap,
}

/// Joins path components with `/`. Returns `None` for paths that are not
/// plain relative paths.
fn to_key(path: &Path) -> Option<String> {
    let mut parts = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str()?),
            Component::CurDir => {}
            _ => return None,
        }
    }
    Some(parts.join("/"))
}

/// Lists every regular file under `root`, relative to it, in sorted order.
async fn list_files(root: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![PathBuf::new()];

    while let Some(rel_dir) = pending.pop() {
        let dir = root.join(&rel_dir);
        let mut entries = tokio::fs::read_dir(&dir)
            .await
            .with_context(|| format!("read dir {}", dir.display()))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .with_context(|| format!("read dir entry in {}", dir.display()))?
        {
            let file_type = entry.file_type().await.context("file type")?;
            let rel = rel_dir.join(entry.file_name());
            if file_type.is_dir() {
                pending.push(rel);
            } else if file_type.is_file() {
                files.push(rel);
            }
        }
    }

    files.sort();
    Ok(files)
}

impl ModelFolder {
    /// Scans `root` for a file ending in `manifest_suffix` and collects the
    /// payloads next to it.
    pub async fn scan(root: &Path, manifest_suffix: &str) -> anyhow::Result<Self> {
        let files = list_files(root).await?;

        let Some(manifest_rel) = files
            .iter()
            .find(|p| to_key(p).is_some_and(|k| k.ends_with(manifest_suffix)))
            .cloned()
        else {
            bail!("no {manifest_suffix} file found in {}", root.display());
        };

        let manifest_path = root.join(&manifest_rel);
        let text = tokio::fs::read_to_string(&manifest_path)
            .await
            .with_context(|| format!("read {}", manifest_path.display()))?;
        let manifest = Manifest::from_json_str(&text)
            .with_context(|| format!("parse {}", manifest_path.display()))?;

        let model_dir = manifest_rel.parent().unwrap_or(Path::new("")).to_path_buf();
        let mut payloads = PayloadMap::new();
        for rel in &files {
            let Some(key) = rel.strip_prefix(&model_dir).ok().and_then(to_key) else {
                debug!(path = %rel.display(), "Skipping file outside the model directory");
                continue;
            };
            let bytes = tokio::fs::read(root.join(rel))
                .await
                .with_context(|| format!("read {}", rel.display()))?;
            payloads.insert(key, bytes);
        }

        info!(
            manifest = %manifest_path.display(),
            files = payloads.len(),
            "Model folder scanned"
        );

        Ok(Self {
            manifest_path,
            manifest,
            payloads,
        })
    }
}
