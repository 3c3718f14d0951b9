//! Project Scanner (C11): deterministic tree-hash manifests.
//!
//! Walks a project directory, skipping a fixed ignore set, and hashes
//! every retained file. The manifest's `tree_hash` is a pure function of
//! file contents and relative paths — re-scanning unchanged content on
//! any machine reproduces byte-identical output, which is what makes
//! ingestion idempotency checkable without touching the graph or vector
//! stores.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use crate::error::{IngestError, Result};

/// Manifest schema version. Bump when `Manifest`'s shape changes in a way
/// a reader of an on-disk manifest needs to know about.
pub const MANIFEST_SCHEMA_VERSION: u32 = 1;

/// Directory names never descended into.
pub const IGNORED_DIRS: &[&str] = &[
    ".git",
    ".ping-mem",
    "node_modules",
    "target",
    ".venv",
    "venv",
    "__pycache__",
    ".tox",
    "dist",
    "build",
    ".next",
    ".cache",
];

/// File names never retained, regardless of directory.
pub const IGNORED_FILES: &[&str] = &[
    "Cargo.lock",
    "package-lock.json",
    "yarn.lock",
    "pnpm-lock.yaml",
    "poetry.lock",
];

/// One retained file's identity in a manifest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileRecord {
    pub path: String,
    pub sha256: String,
    pub size: u64,
}

/// A full project scan result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Manifest {
    pub project_id: String,
    pub root_path: String,
    pub tree_hash: String,
    pub generated_at: DateTime<Utc>,
    pub schema_version: u32,
    pub files: Vec<FileRecord>,
}

fn is_ignored_dir(name: &str) -> bool {
    IGNORED_DIRS.contains(&name)
}

fn is_ignored_file(name: &str) -> bool {
    IGNORED_FILES.contains(&name)
}

/// `hex12(SHA-256(absolute-root-path))`.
fn project_id_for(root: &Path) -> Result<String> {
    let absolute = root
        .canonicalize()
        .map_err(|e| IngestError::Io(format!("canonicalize {}: {e}", root.display())))?;
    let digest = Sha256::digest(absolute.to_string_lossy().as_bytes());
    let hex = format!("{digest:x}");
    Ok(format!("ping-mem-{}", &hex[..12]))
}

/// Scan `root`, producing a deterministic [`Manifest`].
pub fn scan(root: &Path) -> Result<Manifest> {
    let project_id = project_id_for(root)?;
    let root_path = root
        .canonicalize()
        .map_err(|e| IngestError::Io(format!("canonicalize {}: {e}", root.display())))?
        .to_string_lossy()
        .replace('\\', "/");
    let mut files = Vec::new();

    for entry in WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| {
            if e.file_type().is_dir() {
                e.path() == root
                    || !e
                        .file_name()
                        .to_str()
                        .map(is_ignored_dir)
                        .unwrap_or(false)
            } else {
                true
            }
        })
    {
        let entry = entry.map_err(|e| IngestError::Io(e.to_string()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let file_name = entry.file_name().to_string_lossy().to_string();
        if is_ignored_file(&file_name) {
            continue;
        }

        let bytes = std::fs::read(entry.path())
            .map_err(|e| IngestError::Io(format!("read {}: {e}", entry.path().display())))?;
        let sha256 = format!("{:x}", Sha256::digest(&bytes));
        let relative = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(entry.path())
            .to_string_lossy()
            .replace('\\', "/");

        files.push(FileRecord {
            path: relative,
            sha256,
            size: bytes.len() as u64,
        });
    }

    files.sort_by(|a, b| a.path.as_bytes().cmp(b.path.as_bytes()));

    let joined = files
        .iter()
        .map(|f| format!("{}|{}|{}", f.path, f.sha256, f.size))
        .collect::<Vec<_>>()
        .join("\n");
    let tree_hash = format!("{:x}", Sha256::digest(joined.as_bytes()));

    Ok(Manifest {
        project_id,
        root_path,
        tree_hash,
        generated_at: Utc::now(),
        schema_version: MANIFEST_SCHEMA_VERSION,
        files,
    })
}

/// Whether `current` differs from `previous` by tree hash.
pub fn has_changes(previous: &Manifest, current: &Manifest) -> bool {
    previous.tree_hash != current.tree_hash
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn two_scans_of_identical_content_are_byte_identical() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.txt"), "hello").unwrap();
        fs::write(dir.path().join("b.txt"), "world").unwrap();

        let m1 = scan(dir.path()).unwrap();
        let m2 = scan(dir.path()).unwrap();
        assert_eq!(m1.tree_hash, m2.tree_hash);
        assert_eq!(m1.files.len(), 2);
    }

    #[test]
    fn ignored_dirs_are_skipped() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("node_modules")).unwrap();
        fs::write(dir.path().join("node_modules/dep.js"), "noise").unwrap();
        fs::write(dir.path().join("main.rs"), "fn main() {}").unwrap();

        let manifest = scan(dir.path()).unwrap();
        assert_eq!(manifest.files.len(), 1);
        assert_eq!(manifest.files[0].path, "main.rs");
    }

    #[test]
    fn lockfiles_are_skipped() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("Cargo.lock"), "noise").unwrap();
        fs::write(dir.path().join("Cargo.toml"), "[package]").unwrap();

        let manifest = scan(dir.path()).unwrap();
        assert_eq!(manifest.files.len(), 1);
        assert_eq!(manifest.files[0].path, "Cargo.toml");
    }

    #[test]
    fn modifying_a_file_changes_tree_hash() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.txt"), "hello").unwrap();
        let before = scan(dir.path()).unwrap();

        fs::write(dir.path().join("a.txt"), "hello!").unwrap();
        let after = scan(dir.path()).unwrap();

        assert!(has_changes(&before, &after));
    }

    #[test]
    fn files_sorted_lexicographically_by_path() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("zeta.txt"), "z").unwrap();
        fs::write(dir.path().join("alpha.txt"), "a").unwrap();
        let manifest = scan(dir.path()).unwrap();
        assert_eq!(manifest.files[0].path, "alpha.txt");
        assert_eq!(manifest.files[1].path, "zeta.txt");
    }
}
