//! Repository snapshot reader.
//!
//! Walks a working copy and captures the text of every file whose extension
//! is on the allow-list. Unreadable files are recorded with empty content so
//! one bad file never aborts the snapshot.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, info, instrument, warn};
use walkdir::{DirEntry, WalkDir};

/// Source and structured-config extensions captured in a snapshot.
pub const SNAPSHOT_EXTENSIONS: &[&str] = &["py", "ini", "cfg", "yaml", "yml", "json", "toml"];

/// Relative path (with `/` separators) → file content.
///
/// A `BTreeMap` keeps iteration order stable, which keeps prompts stable.
pub type RepositorySnapshot = BTreeMap<String, String>;

/// True when `path` has an allow-listed extension (case-sensitive).
pub fn is_snapshot_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| SNAPSHOT_EXTENSIONS.contains(&ext))
}

/// Read every allow-listed file under `root`.
///
/// The `.git` metadata directory is skipped. Errors only when `root` itself
/// cannot be walked; per-file failures become empty entries.
#[instrument(skip_all, fields(root = %root.display()))]
pub fn read_snapshot(root: &Path) -> Result<RepositorySnapshot> {
    if !root.is_dir() {
        return Err(anyhow::anyhow!("snapshot root {} is not a directory", root.display()));
    }

    let canonical_root = fs::canonicalize(root)
        .with_context(|| format!("resolve snapshot root {}", root.display()))?;
    let mut snapshot = RepositorySnapshot::new();
    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !is_git_dir(entry));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!(err = %err, "skipping unreadable directory entry");
                continue;
            }
        };
        let file_type = entry.file_type();
        let is_link = file_type.is_symlink();
        // `is_dir` follows the link; a dangling link is not a directory.
        if (is_link && entry.path().is_dir()) || (!is_link && !file_type.is_file()) {
            continue;
        }
        if !is_snapshot_file(entry.path()) {
            continue;
        }
        let rel = relative_key(root, entry.path())?;
        if is_link && !link_stays_inside(&canonical_root, entry.path()) {
            warn!(path = %rel, "link points outside the repository, recording empty content");
            snapshot.insert(rel, String::new());
            continue;
        }
        match fs::read_to_string(entry.path()) {
            Ok(content) => {
                debug!(path = %rel, chars = content.len(), "read file");
                snapshot.insert(rel, content);
            }
            Err(err) => {
                warn!(path = %rel, err = %err, "could not read file, recording empty content");
                snapshot.insert(rel, String::new());
            }
        }
    }

    info!(files = snapshot.len(), "snapshot captured");
    Ok(snapshot)
}

fn is_git_dir(entry: &DirEntry) -> bool {
    entry.depth() > 0 && entry.file_type().is_dir() && entry.file_name() == ".git"
}

/// False only when `path` resolves to a target outside `canonical_root`.
/// Unresolvable links are left to the read, which records them empty.
fn link_stays_inside(canonical_root: &Path, path: &Path) -> bool {
    match fs::canonicalize(path) {
        Ok(target) => target.starts_with(canonical_root),
        Err(_) => true,
    }
}

fn relative_key(root: &Path, path: &Path) -> Result<String> {
    let rel = path
        .strip_prefix(root)
        .with_context(|| format!("{} is outside {}", path.display(), root.display()))?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Ok(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(root: &Path, rel: &str, contents: &[u8]) {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create dirs");
        }
        fs::write(path, contents).expect("write file");
    }

    #[test]
    fn keeps_allow_listed_files_only() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path();
        for rel in [
            "app.py",
            "setup.cfg",
            "tox.ini",
            "conf/settings.yaml",
            "conf/compose.yml",
            "data/fixture.json",
            "pyproject.toml",
        ] {
            write(root, rel, rel.as_bytes());
        }
        for rel in ["README.md", "src/main.rs", "Makefile", "img/logo.png", "notes.PY"] {
            write(root, rel, b"ignored");
        }

        let snapshot = read_snapshot(root).expect("snapshot");
        let keys: Vec<&str> = snapshot.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec![
                "app.py",
                "conf/compose.yml",
                "conf/settings.yaml",
                "data/fixture.json",
                "pyproject.toml",
                "setup.cfg",
                "tox.ini",
            ]
        );
        assert_eq!(snapshot["conf/settings.yaml"], "conf/settings.yaml");
    }

    #[test]
    fn unreadable_file_is_recorded_empty() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path();
        write(root, "good.py", b"print('ok')\n");
        // Invalid UTF-8 cannot be read as text.
        write(root, "bad.py", &[0xff, 0xfe, 0x00, 0x80]);
        write(root, "zz.toml", b"[tool]\n");

        let snapshot = read_snapshot(root).expect("snapshot");
        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot["bad.py"], "");
        assert_eq!(snapshot["good.py"], "print('ok')\n");
        assert_eq!(snapshot["zz.toml"], "[tool]\n");
    }

    #[test]
    fn skips_git_metadata() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path();
        write(root, ".git/config.json", b"{}");
        write(root, "app.py", b"x = 1\n");

        let snapshot = read_snapshot(root).expect("snapshot");
        assert_eq!(snapshot.keys().collect::<Vec<_>>(), vec!["app.py"]);
    }

    #[cfg(unix)]
    #[test]
    fn follows_file_links_inside_the_repository() {
        use std::os::unix::fs::symlink;

        let temp = tempfile::tempdir().expect("tempdir");
        let outside = tempfile::tempdir().expect("outside tempdir");
        let root = temp.path();
        write(root, "real.py", b"print('real')\n");
        write(root, "pkg/mod.py", b"x = 1\n");
        write(outside.path(), "secret.py", b"TOKEN = 'leak'\n");
        symlink(root.join("real.py"), root.join("linked.py")).expect("file link");
        symlink(root.join("missing.py"), root.join("dangling.py")).expect("dangling link");
        symlink(outside.path().join("secret.py"), root.join("outside.py")).expect("outside link");
        symlink(root.join("pkg"), root.join("pkg_link.py")).expect("dir link");

        let snapshot = read_snapshot(root).expect("snapshot");
        let keys: Vec<&str> = snapshot.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec!["dangling.py", "linked.py", "outside.py", "pkg/mod.py", "real.py"]
        );
        assert_eq!(snapshot["linked.py"], "print('real')\n");
        assert_eq!(snapshot["dangling.py"], "");
        assert_eq!(snapshot["outside.py"], "");
    }

    #[test]
    fn empty_tree_yields_empty_snapshot() {
        let temp = tempfile::tempdir().expect("tempdir");
        let snapshot = read_snapshot(temp.path()).expect("snapshot");
        assert!(snapshot.is_empty());
    }

    #[test]
    fn missing_root_is_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = read_snapshot(&temp.path().join("nope")).expect_err("should fail");
        assert!(err.to_string().contains("not a directory"));
    }
}
