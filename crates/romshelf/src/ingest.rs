//! Turning user supplied files into library entries

use crate::{
    storage::{RomRecord, StorageManager},
    system::{is_accepted_file, System},
};
use std::{
    fs::{self, File},
    io::{self, Read},
    path::{Path, PathBuf},
};
use thiserror::Error;
use walkdir::WalkDir;
use zip::ZipArchive;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Could not read file: {0}")]
    Io(#[from] io::Error),
    #[error("Could not read archive: {0}")]
    Archive(#[from] zip::result::ZipError),
    #[error("Archive contains no recognised ROM")]
    EmptyArchive,
}

/// One picked or dropped file, already read into memory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl IngestFile {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            bytes,
        }
    }

    /// Reads a file from disk, zip archives expand into every ROM they contain
    pub fn from_path(path: impl AsRef<Path>) -> Result<Vec<Self>, IngestError> {
        let path = path.as_ref();

        if is_zip(path) {
            return Self::from_zip(path);
        }

        Ok(vec![Self::new(file_name(path), fs::read(path)?)])
    }

    fn from_zip(path: &Path) -> Result<Vec<Self>, IngestError> {
        let mut archive = ZipArchive::new(File::open(path)?)?;
        let mut files = Vec::new();

        for index in 0..archive.len() {
            let mut entry = archive.by_index(index)?;

            if !entry.is_file() {
                continue;
            }

            let filename = file_name(Path::new(entry.name()));
            if !is_accepted_file(&filename) {
                tracing::debug!(
                    "Skipping {} inside archive {}",
                    entry.name(),
                    path.display()
                );
                continue;
            }

            let mut bytes = Vec::with_capacity(preallocation(entry.size()));
            entry.read_to_end(&mut bytes)?;

            tracing::debug!(
                "Found {} inside archive {}",
                filename,
                path.display()
            );
            files.push(Self::new(filename, bytes));
        }

        if files.is_empty() {
            return Err(IngestError::EmptyArchive);
        }

        Ok(files)
    }
}

/// Largest buffer reserved up front for an archive entry
///
/// The declared size comes from the archive header and is not trusted, anything
/// past this grows as the entry is actually read.
const MAX_PREALLOCATION: u64 = 64 * 1024 * 1024;

fn preallocation(declared_size: u64) -> usize {
    usize::try_from(declared_size.min(MAX_PREALLOCATION)).unwrap_or(0)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestFailure {
    pub filename: String,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct IngestReport {
    pub added: Vec<RomRecord>,
    pub failures: Vec<IngestFailure>,
}

impl IngestReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Files read from disk plus the ones that could not be read
#[derive(Debug, Default)]
pub struct GatheredFiles {
    pub files: Vec<IngestFile>,
    pub failures: Vec<IngestFailure>,
}

/// Collects files from the given paths, descending into directories
///
/// Directory contents are filtered to the extensions in the system table and zip
/// archives. Paths named explicitly are always taken, detection decides later.
pub fn gather(paths: &[PathBuf], recursive: bool) -> GatheredFiles {
    let mut gathered = GatheredFiles::default();

    for path in paths {
        if path.is_dir() {
            tracing::info!("Inspecting {} for ROMs", path.display());

            let walkdir = WalkDir::new(path)
                .max_depth(if recursive { usize::MAX } else { 1 })
                .sort_by_file_name();

            for entry in walkdir {
                match entry {
                    Ok(entry) => {
                        let entry_path = entry.path();

                        if entry.file_type().is_file()
                            && (is_accepted_file(entry_path) || is_zip(entry_path))
                        {
                            gather_file(entry_path, &mut gathered);
                        }
                    }
                    Err(err) => {
                        tracing::warn!("Could not walk {}: {}", path.display(), err);
                        gathered.failures.push(IngestFailure {
                            filename: err.path().unwrap_or(path.as_path()).display().to_string(),
                            reason: err.to_string(),
                        });
                    }
                }
            }
        } else {
            gather_file(path, &mut gathered);
        }
    }

    gathered
}

fn gather_file(path: &Path, gathered: &mut GatheredFiles) {
    match IngestFile::from_path(path) {
        Ok(files) => gathered.files.extend(files),
        Err(err) => gathered.failures.push(IngestFailure {
            filename: file_name(path),
            reason: err.to_string(),
        }),
    }
}

/// Adds every file in order, a failing file never stops the rest of the batch
pub fn ingest(
    storage: &StorageManager,
    files: impl IntoIterator<Item = IngestFile>,
    explicit_system: Option<System>,
) -> IngestReport {
    let mut report = IngestReport::default();

    for file in files {
        match storage.add_rom(file.bytes, &file.filename, explicit_system) {
            Ok(record) => report.added.push(record),
            Err(err) => {
                tracing::warn!("Could not add {}: {}", file.filename, err);

                report.failures.push(IngestFailure {
                    filename: file.filename,
                    reason: err.to_string(),
                });
            }
        }
    }

    report
}

fn is_zip(path: &Path) -> bool {
    path.extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| extension.eq_ignore_ascii_case("zip"))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.to_string_lossy(), |name| name.to_string_lossy())
        .into_owned()
}
