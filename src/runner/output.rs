//! Runner output files.
//!
//! Output is never overwritten: a file already at the target path is
//! rotated to the first free `<name>.N` before a fresh one is created.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

/// Rotate any existing file at `path` and create an empty one in its place.
pub fn prepare_output(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }

    if path.exists() {
        let rotated = next_rotation(path);
        fs::rename(path, &rotated)?;
        log::debug!("Rotated {} -> {}", path.display(), rotated.display());
    }

    File::create(path)
}

/// First `<path>.N` (N >= 1) that does not exist yet.
pub fn next_rotation(path: &Path) -> PathBuf {
    let mut n: u32 = 1;
    loop {
        let mut name = OsString::from(path.as_os_str());
        name.push(format!(".{}", n));
        let candidate = PathBuf::from(name);
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_prepare_creates_parents() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("logs/deep/out.log");
        prepare_output(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_existing_output_is_rotated() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("out.log");

        let mut first = prepare_output(&path).unwrap();
        first.write_all(b"first").unwrap();
        drop(first);

        let mut second = prepare_output(&path).unwrap();
        second.write_all(b"second").unwrap();
        drop(second);

        prepare_output(&path).unwrap();

        assert_eq!(fs::read_to_string(temp.path().join("out.log.1")).unwrap(), "first");
        assert_eq!(fs::read_to_string(temp.path().join("out.log.2")).unwrap(), "second");
        assert_eq!(fs::read_to_string(&path).unwrap(), "");
    }
}
