//! Local staging of the data/count file pair.
//!
//! The remote poller treats the appearance of a count file as "the data file
//! with the same stem is complete". Staging therefore writes the data file
//! first, and both release and clear remove count files first.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use super::error::StagingError;
use crate::record::codec::transcode;

pub const STEM_PREFIX: &str = "REQ-PARSED_";
pub const DATA_EXTENSION: &str = "dat";
pub const COUNT_EXTENSION: &str = "cnt";
pub const COUNT_CONTENT: &str = "1\n";

#[cfg(unix)]
const STAGED_FILE_MODE: u32 = 0o664;

/// A data/count pair sharing one name stem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFilePair {
    stem: String,
    data_file: PathBuf,
    count_file: PathBuf,
}

impl StagedFilePair {
    fn in_directory(directory: &Path, stem: String) -> Self {
        Self {
            data_file: directory.join(format!("{}.{}", stem, DATA_EXTENSION)),
            count_file: directory.join(format!("{}.{}", stem, COUNT_EXTENSION)),
            stem,
        }
    }

    pub fn stem(&self) -> &str {
        &self.stem
    }

    pub fn data_file(&self) -> &Path {
        &self.data_file
    }

    pub fn count_file(&self) -> &Path {
        &self.count_file
    }

    pub fn data_file_name(&self) -> String {
        format!("{}.{}", self.stem, DATA_EXTENSION)
    }

    pub fn count_file_name(&self) -> String {
        format!("{}.{}", self.stem, COUNT_EXTENSION)
    }
}

/// `REQ-PARSED_2024-03-05T10:15:00`
pub fn stem_for(timestamp: DateTime<Local>) -> String {
    format!("{}{}", STEM_PREFIX, timestamp.format("%Y-%m-%dT%H:%M:%S"))
}

/// Trimmed, newline-terminated, replacement-encoded.
pub fn payload_content(payload: &str) -> String {
    format!("{}\n", transcode(payload.trim()))
}

/// The single local directory a pair waits in before handoff.
#[derive(Debug, Clone)]
pub struct TransferStaging {
    directory: PathBuf,
}

impl TransferStaging {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Creates the staging directory if it does not exist yet.
    pub fn ensure_directory(&self) -> Result<(), StagingError> {
        fs::create_dir_all(&self.directory).map_err(|source| StagingError::CreateDirectory {
            path: self.directory.clone(),
            source,
        })
    }

    /// Names of the files currently in the staging directory, sorted.
    /// Subdirectories are not staged files and are not listed.
    pub fn entries(&self) -> Result<Vec<String>, StagingError> {
        let read_err = |source| StagingError::ReadDirectory {
            path: self.directory.clone(),
            source,
        };

        let mut names = Vec::new();
        for entry in fs::read_dir(&self.directory).map_err(read_err)? {
            let entry = entry.map_err(read_err)?;
            if entry.file_type().map_err(read_err)?.is_dir() {
                continue;
            }
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }

    /// Writes the pair for `payload`. Fails without writing anything if the
    /// directory already holds any entry.
    pub fn stage(
        &self,
        timestamp: DateTime<Local>,
        payload: &str,
    ) -> Result<StagedFilePair, StagingError> {
        self.ensure_directory()?;

        let entries = self.entries()?;
        if !entries.is_empty() {
            return Err(StagingError::DirtyStaging {
                path: self.directory.clone(),
                entries,
            });
        }

        let pair = StagedFilePair::in_directory(&self.directory, stem_for(timestamp));

        if let Err(source) = write_new_file(&pair.data_file, payload_content(payload).as_bytes())
        {
            if source.kind() != std::io::ErrorKind::AlreadyExists {
                remove_if_present(&pair.data_file);
            }
            return Err(StagingError::WriteFile {
                path: pair.data_file.clone(),
                source,
            });
        }

        if let Err(source) = write_new_file(&pair.count_file, COUNT_CONTENT.as_bytes()) {
            if source.kind() != std::io::ErrorKind::AlreadyExists {
                remove_if_present(&pair.count_file);
            }
            remove_if_present(&pair.data_file);
            return Err(StagingError::WriteFile {
                path: pair.count_file.clone(),
                source,
            });
        }

        tracing::debug!(stem = %pair.stem, "Staged file pair");
        Ok(pair)
    }

    /// Removes a delivered pair, count file first.
    pub fn release(&self, pair: &StagedFilePair) -> Result<(), StagingError> {
        remove_file(&pair.count_file)?;
        remove_file(&pair.data_file)?;
        tracing::debug!(stem = %pair.stem, "Released staged pair");
        Ok(())
    }

    /// Operator cleanup: removes every file, count files first. Returns the
    /// removed names in removal order. Subdirectories are left alone; they
    /// do not count against the emptiness check either.
    pub fn clear(&self) -> Result<Vec<String>, StagingError> {
        let mut entries = self.entries()?;
        entries.sort_by_key(|name| !name.ends_with(&format!(".{}", COUNT_EXTENSION)));

        let mut removed = Vec::new();
        for name in entries {
            remove_file(&self.directory.join(&name))?;
            removed.push(name);
        }

        tracing::info!(count = removed.len(), "Cleared staging directory");
        Ok(removed)
    }
}

fn write_new_file(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(STAGED_FILE_MODE);
    }

    let mut file = options.open(path)?;
    file.write_all(content)?;
    file.sync_all()?;

    // The umask may have masked group write.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(STAGED_FILE_MODE))?;
    }

    Ok(())
}

fn remove_file(path: &Path) -> Result<(), StagingError> {
    fs::remove_file(path).map_err(|source| StagingError::RemoveFile {
        path: path.to_path_buf(),
        source,
    })
}

fn remove_if_present(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), error = %e, "Failed to clean up partial staged file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 5, h, m, s).unwrap()
    }

    #[test]
    fn test_stem_format() {
        assert_eq!(stem_for(at(9, 5, 7)), "REQ-PARSED_2024-03-05T09:05:07");
    }

    #[test]
    fn test_payload_is_trimmed_and_terminated() {
        assert_eq!(payload_content("  \"a\",\"b\"  \n"), "\"a\",\"b\"\n");
    }

    #[test]
    fn test_stage_writes_pair() {
        let dir = TempDir::new().unwrap();
        let staging = TransferStaging::new(dir.path());

        let pair = staging.stage(at(10, 0, 0), "\"line\"").unwrap();

        assert_eq!(pair.data_file_name(), "REQ-PARSED_2024-03-05T10:00:00.dat");
        assert_eq!(pair.count_file_name(), "REQ-PARSED_2024-03-05T10:00:00.cnt");
        assert_eq!(fs::read_to_string(pair.data_file()).unwrap(), "\"line\"\n");
        assert_eq!(fs::read_to_string(pair.count_file()).unwrap(), "1\n");
        assert_eq!(staging.entries().unwrap().len(), 2);
    }

    #[cfg(unix)]
    #[test]
    fn test_staged_files_are_group_writable() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let staging = TransferStaging::new(dir.path());
        let pair = staging.stage(at(10, 0, 0), "x").unwrap();

        for path in [pair.data_file(), pair.count_file()] {
            let mode = fs::metadata(path).unwrap().permissions().mode() & 0o777;
            assert_eq!(mode, 0o664);
        }
    }

    #[test]
    fn test_stage_refuses_dirty_directory() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("stray.txt"), "left over").unwrap();
        let staging = TransferStaging::new(dir.path());

        let err = staging.stage(at(10, 0, 0), "x").unwrap_err();
        match err {
            StagingError::DirtyStaging { entries, .. } => {
                assert_eq!(entries, vec!["stray.txt".to_string()]);
            }
            other => panic!("expected DirtyStaging, got {other:?}"),
        }
        assert_eq!(staging.entries().unwrap(), vec!["stray.txt".to_string()]);
    }

    #[test]
    fn test_stage_creates_missing_directory() {
        let dir = TempDir::new().unwrap();
        let staging = TransferStaging::new(dir.path().join("spool"));
        staging.stage(at(10, 0, 0), "x").unwrap();
        assert!(dir.path().join("spool").is_dir());
    }

    #[test]
    fn test_release_empties_directory() {
        let dir = TempDir::new().unwrap();
        let staging = TransferStaging::new(dir.path());
        let pair = staging.stage(at(10, 0, 0), "x").unwrap();

        staging.release(&pair).unwrap();
        assert!(staging.entries().unwrap().is_empty());
    }

    #[test]
    fn test_clear_removes_count_files_first() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("A.dat"), "x").unwrap();
        fs::write(dir.path().join("A.cnt"), "1").unwrap();
        fs::write(dir.path().join("B.dat"), "x").unwrap();
        let staging = TransferStaging::new(dir.path());

        let removed = staging.clear().unwrap();
        assert_eq!(removed[0], "A.cnt");
        assert_eq!(removed.len(), 3);
        assert!(staging.entries().unwrap().is_empty());
    }

    #[test]
    fn test_data_file_is_written_before_count_file() {
        let dir = TempDir::new().unwrap();
        let staging = TransferStaging::new(dir.path());

        let pair = staging.stage(at(10, 0, 0), "x").unwrap();

        let data_written = fs::metadata(pair.data_file()).unwrap().modified().unwrap();
        let count_written = fs::metadata(pair.count_file()).unwrap().modified().unwrap();
        assert!(data_written <= count_written);
    }

    #[test]
    fn test_failed_count_write_leaves_no_files() {
        let dir = TempDir::new().unwrap();
        let staging = TransferStaging::new(dir.path());
        // A directory squatting on the count file name makes its creation fail
        // after the data file has been written.
        let count_path = dir.path().join(format!("{}.cnt", stem_for(at(10, 0, 0))));
        fs::create_dir(&count_path).unwrap();

        let err = staging.stage(at(10, 0, 0), "x").unwrap_err();

        match err {
            StagingError::WriteFile { path, .. } => assert_eq!(path, count_path),
            other => panic!("expected WriteFile, got {other:?}"),
        }
        assert!(staging.entries().unwrap().is_empty());
        assert!(count_path.is_dir());
    }

    #[test]
    fn test_subdirectory_does_not_make_staging_dirty() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("archive")).unwrap();
        let staging = TransferStaging::new(dir.path());

        let pair = staging.stage(at(10, 0, 0), "x").unwrap();
        assert_eq!(
            staging.entries().unwrap(),
            vec![pair.count_file_name(), pair.data_file_name()]
        );

        let removed = staging.clear().unwrap();
        assert_eq!(removed.len(), 2);
        assert!(dir.path().join("archive").is_dir());
    }

    #[test]
    fn test_entries_missing_directory_is_error() {
        let dir = TempDir::new().unwrap();
        let staging = TransferStaging::new(dir.path().join("absent"));
        assert!(matches!(
            staging.entries(),
            Err(StagingError::ReadDirectory { .. })
        ));
    }
}
