use anyhow::{Context, Result};
use log::{debug, error, info};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::domain::email::EmailRecord;

/// One JSON file per fetched page, kept for crash inspection only.
///
/// Nothing reads these files back; a restarted run always begins at the
/// first inbox page.
pub struct BatchCache {
    dir: PathBuf,
    run_stamp: u64,
}

impl BatchCache {
    /// Create the directory if needed and remove files left by earlier runs.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("creating batch cache dir {}", dir.display()))?;
        let run_stamp = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
        let cache = Self { dir, run_stamp };
        cache.clear()?;
        Ok(cache)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Delete every regular file in the cache directory. Per-file failures
    /// are logged and skipped.
    pub fn clear(&self) -> Result<usize> {
        let mut removed = 0;
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            match fs::remove_file(&path) {
                Ok(()) => {
                    debug!("deleted cache file {}", path.display());
                    removed += 1;
                }
                Err(e) => error!("error deleting cache file {}: {e}", path.display()),
            }
        }
        if removed > 0 {
            info!("cleared {removed} batch cache files");
        }
        Ok(removed)
    }

    pub fn page_path(&self, page_no: u64) -> PathBuf {
        self.dir
            .join(format!("batch_{}_{}.json", self.run_stamp, page_no))
    }

    pub fn write_page(&self, page_no: u64, records: &[EmailRecord]) -> Result<PathBuf> {
        let path = self.page_path(page_no);
        let json = serde_json::to_vec(records)?;
        fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str) -> EmailRecord {
        EmailRecord {
            message_id: id.into(),
            subject: "s".into(),
            sender: "f".into(),
            body: "b".into(),
            has_attachments: false,
        }
    }

    #[test]
    fn open_clears_stale_files_but_keeps_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("batch_1_0.json"), "[]").unwrap();
        fs::write(tmp.path().join("batch_1_1.json"), "[]").unwrap();
        fs::create_dir(tmp.path().join("keep")).unwrap();

        let cache = BatchCache::open(tmp.path()).unwrap();
        let left: Vec<_> = fs::read_dir(cache.dir())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(left, vec![std::ffi::OsString::from("keep")]);
    }

    #[test]
    fn writes_ordered_records() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = BatchCache::open(tmp.path().join("nested/batches")).unwrap();
        let path = cache.write_page(3, &[record("a"), record("b")]).unwrap();
        assert!(path.file_name().unwrap().to_string_lossy().ends_with("_3.json"));

        let back: Vec<EmailRecord> =
            serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(back, vec![record("a"), record("b")]);
    }
}
