//! File lifecycle for direct (legacy-path) downloads.
//!
//! Bytes are written to `<final>.part`; `finalize` renames the temp file onto
//! the final name. A `PartFile` dropped before `finalize` removes its temp file,
//! so an interrupted transfer never leaves a half-written document behind.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Temporary file suffix used before the rename.
pub const TEMP_SUFFIX: &str = ".part";

/// Path for the temp file: appends `.part` to the final path (`a.pdf` -> `a.pdf.part`).
pub fn temp_path(final_path: &Path) -> PathBuf {
    let mut o = final_path.as_os_str().to_owned();
    o.push(TEMP_SUFFIX);
    PathBuf::from(o)
}

/// Returns `dir/name`, or `dir/name (n).ext` for the first `n` that is not taken.
pub fn unique_destination(dir: &Path, name: &str) -> PathBuf {
    let candidate = dir.join(name);
    if !candidate.exists() {
        return candidate;
    }
    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (name, None),
    };
    (1u32..)
        .map(|n| match ext {
            Some(ext) => dir.join(format!("{stem} ({n}).{ext}")),
            None => dir.join(format!("{stem} ({n})")),
        })
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}

/// Temp download file that cleans up after itself unless finalized.
pub struct PartFile {
    file: Option<File>,
    temp_path: PathBuf,
    final_path: PathBuf,
}

impl PartFile {
    /// Create (truncating) `<final_path>.part`, creating parent directories as needed.
    pub fn create(final_path: &Path) -> io::Result<Self> {
        if let Some(parent) = final_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let temp_path = temp_path(final_path);
        let file = File::options()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)?;
        Ok(PartFile {
            file: Some(file),
            temp_path,
            final_path: final_path.to_path_buf(),
        })
    }

    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    pub fn final_path(&self) -> &Path {
        &self.final_path
    }

    /// Sync, close and rename onto the final path. Returns the final path.
    pub fn finalize(self) -> io::Result<PathBuf> {
        let final_path = self.final_path.clone();
        self.finalize_to(&final_path)
    }

    /// Like [`finalize`](Self::finalize) but renames onto `final_path`, which
    /// must be on the same filesystem as the temp file.
    pub fn finalize_to(mut self, final_path: &Path) -> io::Result<PathBuf> {
        if let Some(file) = self.file.take() {
            file.sync_all()?;
        }
        if let Some(parent) = final_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::rename(&self.temp_path, final_path)?;
        // Nothing left to clean up.
        self.temp_path = PathBuf::new();
        Ok(final_path.to_path_buf())
    }

    fn file_mut(&mut self) -> io::Result<&mut File> {
        self.file
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "part file already closed"))
    }
}

impl Write for PartFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file_mut()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file_mut()?.flush()
    }
}

impl Drop for PartFile {
    fn drop(&mut self) {
        drop(self.file.take());
        if self.temp_path.as_os_str().is_empty() {
            return;
        }
        if let Err(e) = std::fs::remove_file(&self.temp_path) {
            if e.kind() != io::ErrorKind::NotFound {
                tracing::warn!(path = %self.temp_path.display(), error = %e, "failed to remove partial file");
            }
        } else {
            tracing::debug!(path = %self.temp_path.display(), "removed partial file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temp_path_appends_suffix() {
        let p = temp_path(Path::new("/tmp/report.pdf"));
        assert_eq!(p, PathBuf::from("/tmp/report.pdf.part"));
    }

    #[test]
    fn finalize_renames() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("sub").join("a.txt");
        let mut part = PartFile::create(&dest).unwrap();
        part.write_all(b"hello").unwrap();
        let tmp = part.temp_path().to_path_buf();
        assert!(tmp.exists());
        let out = part.finalize().unwrap();
        assert_eq!(out, dest);
        assert!(!tmp.exists());
        assert_eq!(std::fs::read(&dest).unwrap(), b"hello");
    }

    #[test]
    fn finalize_to_other_name() {
        let dir = tempfile::tempdir().unwrap();
        let mut part = PartFile::create(&dir.path().join("provisional")).unwrap();
        part.write_all(b"%PDF").unwrap();
        let out = part.finalize_to(&dir.path().join("Tutanak.pdf")).unwrap();
        assert_eq!(std::fs::read(out).unwrap(), b"%PDF");
        assert!(!dir.path().join("provisional.part").exists());
        assert!(!dir.path().join("provisional").exists());
    }

    #[test]
    fn drop_without_finalize_removes_temp() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("b.bin");
        let tmp = {
            let mut part = PartFile::create(&dest).unwrap();
            part.write_all(b"partial").unwrap();
            part.temp_path().to_path_buf()
        };
        assert!(!tmp.exists());
        assert!(!dest.exists());
    }

    #[test]
    fn unique_destination_adds_counter() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(unique_destination(dir.path(), "a.pdf"), dir.path().join("a.pdf"));
        std::fs::write(dir.path().join("a.pdf"), b"x").unwrap();
        std::fs::write(dir.path().join("a (1).pdf"), b"x").unwrap();
        assert_eq!(unique_destination(dir.path(), "a.pdf"), dir.path().join("a (2).pdf"));
        std::fs::write(dir.path().join("notes"), b"x").unwrap();
        assert_eq!(unique_destination(dir.path(), "notes"), dir.path().join("notes (1)"));
    }
}
