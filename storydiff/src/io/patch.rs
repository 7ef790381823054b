//! Patch writer: persists an accepted diff as `<output_dir>/<story_key>.patch`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tracing::{info, instrument};

use crate::core::types::PatchArtifact;

/// File path the artifact will be written to.
pub fn patch_path(output_dir: &Path, story_key: &str) -> Result<PathBuf> {
    validate_story_key(story_key)?;
    Ok(output_dir.join(format!("{story_key}.patch")))
}

/// Create `output_dir` if needed and write the diff verbatim, replacing any
/// earlier patch for the same story.
///
/// The content goes to a temp sibling first and is renamed into place, so a
/// failed write never leaves a partial patch behind.
#[instrument(skip_all, fields(story_key = %artifact.story_key))]
pub fn write_patch(output_dir: &Path, artifact: &PatchArtifact) -> Result<PathBuf> {
    let path = patch_path(output_dir, &artifact.story_key)?;
    fs::create_dir_all(output_dir)
        .with_context(|| format!("create patch directory {}", output_dir.display()))?;

    let tmp_path = output_dir.join(format!(".{}.patch.tmp", artifact.story_key));
    if let Err(err) = fs::write(&tmp_path, artifact.diff.as_bytes()) {
        let _ = fs::remove_file(&tmp_path);
        return Err(err).with_context(|| format!("write patch {}", tmp_path.display()));
    }
    if let Err(err) = fs::rename(&tmp_path, &path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(err).with_context(|| format!("replace patch {}", path.display()));
    }

    info!(path = %path.display(), bytes = artifact.diff.len(), "patch saved");
    Ok(path)
}

fn validate_story_key(key: &str) -> Result<()> {
    if key.trim().is_empty() {
        return Err(anyhow!("story key is empty"));
    }
    if key == "." || key == ".." || key.contains(['/', '\\', '\0']) {
        return Err(anyhow!("story key '{key}' is not a valid file name"));
    }
    Ok(())
}
