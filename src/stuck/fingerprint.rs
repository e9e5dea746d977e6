//! Repository fingerprints for stuck detection.
//!
//! The engine only observes the working tree; it never modifies it.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::scheduler::CANCEL_FILE;
use crate::storage::{REPORT_FILE, STATE_FILE};

/// Runner output directory used by the default output template.
const LOG_DIR: &str = "logs";

/// Computes a digest of the observable repository state.
pub trait Fingerprinter: Send + Sync {
    fn fingerprint(&self, repo_root: &Path) -> Result<String>;
}

/// Hashes `HEAD`, porcelain status and the diff against `HEAD`; outside a
/// git repository falls back to hashing the file tree.
///
/// Files the engine itself writes under the state directory (state file,
/// backups, report, logs, cancel request) are ignored. Everything else in
/// the state directory counts, so checklist and test-status progress is
/// repository change.
#[derive(Debug, Clone)]
pub struct GitFingerprinter {
    state_dir: PathBuf,
}

impl GitFingerprinter {
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            state_dir: state_dir.into(),
        }
    }

    fn git(repo_root: &Path, args: &[&str]) -> Option<Vec<u8>> {
        let output = Command::new("git").args(args).current_dir(repo_root).output().ok()?;
        output.status.success().then_some(output.stdout)
    }

    /// Pathspecs excluding engine-owned files.
    fn excludes(&self) -> Vec<String> {
        let dir = self.state_dir.display();
        vec![
            format!(":(exclude){}/{}*", dir, STATE_FILE),
            format!(":(exclude){}/.*.tmp.*", dir),
            format!(":(exclude){}/{}", dir, REPORT_FILE),
            format!(":(exclude){}/{}", dir, LOG_DIR),
            format!(":(exclude){}/{}", dir, CANCEL_FILE),
        ]
    }

    fn is_engine_owned(&self, relative: &Path) -> bool {
        let Some(name) = relative
            .strip_prefix(&self.state_dir)
            .ok()
            .and_then(|rest| rest.components().next())
        else {
            return false;
        };
        let name = name.as_os_str().to_string_lossy();
        name == LOG_DIR
            || name == CANCEL_FILE
            || name == REPORT_FILE
            || name.starts_with(STATE_FILE)
            || (name.starts_with('.') && name.contains(".tmp."))
    }

    fn git_digest(&self, repo_root: &Path) -> Option<String> {
        Self::git(repo_root, &["rev-parse", "--is-inside-work-tree"])?;

        let mut hasher = Sha256::new();
        // An unborn branch has no HEAD; status still reflects the tree.
        let head = Self::git(repo_root, &["rev-parse", "HEAD"]).unwrap_or_default();
        hasher.update(b"head\0");
        hasher.update(&head);

        let excludes = self.excludes();
        let mut status_args = vec!["status", "--porcelain=v1", "-uall", "--", "."];
        status_args.extend(excludes.iter().map(String::as_str));
        let status = Self::git(repo_root, &status_args)?;
        hasher.update(b"status\0");
        hasher.update(&status);

        let mut diff_args = vec!["diff", "HEAD", "--", "."];
        diff_args.extend(excludes.iter().map(String::as_str));
        let diff = Self::git(repo_root, &diff_args).unwrap_or_default();
        hasher.update(b"diff\0");
        hasher.update(&diff);

        // Untracked file contents are not part of the diff.
        for line in String::from_utf8_lossy(&status).lines() {
            if let Some(path) = line.strip_prefix("?? ") {
                hasher.update(path.as_bytes());
                if let Ok(bytes) = fs::read(repo_root.join(path)) {
                    hasher.update(&bytes);
                }
            }
        }

        Some(hex::encode(hasher.finalize()))
    }

    fn tree_digest(&self, repo_root: &Path) -> Result<String> {
        let mut files = Vec::new();
        self.collect(repo_root, repo_root, &mut files)?;
        files.sort();

        let mut hasher = Sha256::new();
        for relative in files {
            let bytes = fs::read(repo_root.join(&relative))?;
            hasher.update(relative.to_string_lossy().as_bytes());
            hasher.update([0u8]);
            hasher.update(Sha256::digest(&bytes));
        }
        Ok(hex::encode(hasher.finalize()))
    }

    fn collect(&self, root: &Path, dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            let Ok(relative) = path.strip_prefix(root) else {
                continue;
            };
            if relative == Path::new(".git") || self.is_engine_owned(relative) {
                continue;
            }

            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                self.collect(root, &path, files)?;
            } else if file_type.is_file() {
                files.push(relative.to_path_buf());
            }
        }
        Ok(())
    }
}

impl Fingerprinter for GitFingerprinter {
    fn fingerprint(&self, repo_root: &Path) -> Result<String> {
        if let Some(digest) = self.git_digest(repo_root) {
            return Ok(digest);
        }
        log::debug!("{} is not a git work tree, hashing files", repo_root.display());
        self.tree_digest(repo_root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_tree_digest_stable_and_sensitive() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.txt"), "one").unwrap();
        let fp = GitFingerprinter::new(".superloop");

        let first = fp.tree_digest(temp.path()).unwrap();
        assert_eq!(first, fp.tree_digest(temp.path()).unwrap());
        assert_eq!(first.len(), 64);

        fs::write(temp.path().join("a.txt"), "two").unwrap();
        assert_ne!(first, fp.tree_digest(temp.path()).unwrap());
    }

    #[test]
    fn test_tree_digest_ignores_engine_files() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.txt"), "one").unwrap();
        let fp = GitFingerprinter::new(".superloop");
        let before = fp.tree_digest(temp.path()).unwrap();

        fs::create_dir_all(temp.path().join(".superloop/logs")).unwrap();
        fs::write(temp.path().join(".superloop/state.json"), "{}").unwrap();
        fs::write(temp.path().join(".superloop/state.json.20260101T000000.bak"), "{}").unwrap();
        fs::write(temp.path().join(".superloop/.state.json.tmp.42"), "{").unwrap();
        fs::write(temp.path().join(".superloop/report.md"), "# report").unwrap();
        fs::write(temp.path().join(".superloop/cancel"), "").unwrap();
        fs::write(temp.path().join(".superloop/logs/iter-0-planner.log"), "hi").unwrap();
        assert_eq!(before, fp.tree_digest(temp.path()).unwrap());
    }

    #[test]
    fn test_tree_digest_sees_gate_artifacts() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join(".superloop")).unwrap();
        fs::write(temp.path().join(".superloop/checklist.md"), "- [ ] one\n").unwrap();
        let fp = GitFingerprinter::new(".superloop");
        let before = fp.tree_digest(temp.path()).unwrap();

        fs::write(temp.path().join(".superloop/checklist.md"), "- [x] one\n").unwrap();
        assert_ne!(before, fp.tree_digest(temp.path()).unwrap());
    }

    #[test]
    fn test_git_digest_excludes_only_engine_files() {
        let temp = TempDir::new().unwrap();
        let initialized = Command::new("git")
            .args(["init", "-q"])
            .current_dir(temp.path())
            .status()
            .is_ok_and(|s| s.success());
        if !initialized {
            return;
        }
        fs::create_dir_all(temp.path().join(".superloop/logs")).unwrap();
        fs::write(temp.path().join(".superloop/checklist.md"), "- [ ] one\n").unwrap();
        let fp = GitFingerprinter::new(".superloop");
        let before = fp.git_digest(temp.path()).unwrap();

        fs::write(temp.path().join(".superloop/state.json"), "{}").unwrap();
        fs::write(temp.path().join(".superloop/logs/iter-0-tester.log"), "ran").unwrap();
        assert_eq!(before, fp.git_digest(temp.path()).unwrap());

        fs::write(temp.path().join(".superloop/checklist.md"), "- [x] one\n").unwrap();
        assert_ne!(before, fp.git_digest(temp.path()).unwrap());
    }

    #[test]
    fn test_fingerprint_outside_git() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.txt"), "one").unwrap();
        let fp = GitFingerprinter::new(".superloop");
        let digest = fp.fingerprint(temp.path()).unwrap();
        assert_eq!(digest, fp.fingerprint(temp.path()).unwrap());
    }
}
