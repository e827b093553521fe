use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, Read, Write};
use std::path::{Path, PathBuf};

use crate::error::StorageError;
use crate::format::Format;
use crate::sanitize;

const PARTIAL_SUFFIX: &str = "partial";
const COPY_BUFFER: usize = 64 * 1024;

/// Metadata about an upload once it is on disk.
#[derive(Debug, Clone)]
pub struct StoredUpload {
    pub original_name: String,
    pub format: Format,
    pub size_bytes: u64,
    pub path: PathBuf,
}

/// Move a file from `src` to `dst`. Uses `rename` first (atomic on the same
/// filesystem) and falls back to [`copy_into_place`].
fn move_file(src: &Path, dst: &Path) -> Result<(), StorageError> {
    if std::fs::rename(src, dst).is_ok() {
        return Ok(());
    }
    copy_into_place(src, dst)
}

/// Copies `src` into a hidden sibling of `dst`, renames that into place and
/// only then removes `src`, so `dst` never exists in a partially written
/// state.
fn copy_into_place(src: &Path, dst: &Path) -> Result<(), StorageError> {
    let staging = staging_sibling(dst);
    let move_err = |source| StorageError::MoveFile {
        from: src.to_path_buf(),
        to: dst.to_path_buf(),
        source,
    };

    if let Err(e) = std::fs::copy(src, &staging) {
        let _ = std::fs::remove_file(&staging);
        return Err(move_err(e));
    }
    if let Err(e) = std::fs::rename(&staging, dst) {
        let _ = std::fs::remove_file(&staging);
        return Err(move_err(e));
    }
    release_source(src);
    Ok(())
}

/// Removes the source of a completed copy. The data is already at its
/// destination, so a failure only leaves a stray scratch file.
fn release_source(src: &Path) {
    if let Err(e) = std::fs::remove_file(src) {
        log::warn!(
            "Moved {} into place but could not remove it: {}",
            sanitize::redact_path(src),
            e
        );
    }
}

fn staging_sibling(dst: &Path) -> PathBuf {
    let name = dst
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("output");
    dst.with_file_name(format!(".{}.{}", name, PARTIAL_SUFFIX))
}

fn ensure_directory(path: &Path) -> Result<(), StorageError> {
    std::fs::create_dir_all(path).map_err(|e| StorageError::CreateDirectory {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Filesystem gateway for the upload and output roots.
///
/// All file names are derived from the job id, so concurrent jobs never
/// contend for a path and no locking is needed here.
#[derive(Debug)]
pub struct StorageGateway {
    upload_root: PathBuf,
    output_root: PathBuf,
    work_root: PathBuf,
    max_upload_bytes: Option<u64>,
}

impl StorageGateway {
    /// Creates the gateway and all of its directories.
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(
        upload_root: P,
        output_root: Q,
    ) -> Result<Self, StorageError> {
        let output_root = output_root.as_ref().to_path_buf();
        let work_root = output_root.join(".work");
        Self::with_work_root(upload_root, output_root, work_root)
    }

    /// Like [`StorageGateway::new`] with an explicit converter scratch
    /// directory, which may live on a different filesystem.
    pub fn with_work_root<P: AsRef<Path>, Q: AsRef<Path>, W: AsRef<Path>>(
        upload_root: P,
        output_root: Q,
        work_root: W,
    ) -> Result<Self, StorageError> {
        let gateway = Self {
            upload_root: upload_root.as_ref().to_path_buf(),
            output_root: output_root.as_ref().to_path_buf(),
            work_root: work_root.as_ref().to_path_buf(),
            max_upload_bytes: None,
        };
        ensure_directory(&gateway.upload_root)?;
        ensure_directory(&gateway.output_root)?;
        ensure_directory(&gateway.work_root)?;
        Ok(gateway)
    }

    pub fn with_max_upload_bytes(mut self, limit: Option<u64>) -> Self {
        self.max_upload_bytes = limit;
        self
    }

    pub fn upload_root(&self) -> &Path {
        &self.upload_root
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    pub fn work_root(&self) -> &Path {
        &self.work_root
    }

    /// Streams an upload to `<upload_root>/<job_id>_<sanitized name>`.
    ///
    /// The partial file is removed on any failure, including an empty or
    /// oversized stream.
    pub fn save<R: Read>(
        &self,
        job_id: &str,
        reader: R,
        declared_name: &str,
        format: &Format,
    ) -> Result<StoredUpload, StorageError> {
        if !sanitize::is_safe_name(declared_name) {
            return Err(StorageError::UnsafeName(declared_name.to_string()));
        }

        let filename = format!("{}_{}", job_id, sanitize::sanitize_filename(declared_name));
        let path = self.upload_root.join(filename);

        // create_new: O_CREAT | O_EXCL, a job id is never reused
        let mut file = match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(StorageError::FileExists(path));
            }
            Err(e) => {
                return Err(StorageError::WriteFile { path, source: e });
            }
        };

        let written = match self.copy_limited(reader, &mut file, &path) {
            Ok(written) => written,
            Err(e) => {
                drop(file);
                let _ = std::fs::remove_file(&path);
                return Err(e);
            }
        };

        if written == 0 {
            drop(file);
            let _ = std::fs::remove_file(&path);
            return Err(StorageError::EmptyUpload);
        }

        if let Err(e) = file.sync_all() {
            drop(file);
            let _ = std::fs::remove_file(&path);
            return Err(StorageError::WriteFile { path, source: e });
        }

        Ok(StoredUpload {
            original_name: declared_name.to_string(),
            format: format.clone(),
            size_bytes: written,
            path,
        })
    }

    fn copy_limited<R: Read>(
        &self,
        mut reader: R,
        file: &mut File,
        path: &Path,
    ) -> Result<u64, StorageError> {
        let mut buf = vec![0u8; COPY_BUFFER];
        let mut total: u64 = 0;

        loop {
            let n = match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(StorageError::ReadStream(e)),
            };

            total += n as u64;
            if let Some(limit) = self.max_upload_bytes {
                if total > limit {
                    return Err(StorageError::UploadTooLarge { limit });
                }
            }

            file.write_all(&buf[..n])
                .map_err(|e| StorageError::WriteFile {
                    path: path.to_path_buf(),
                    source: e,
                })?;
        }

        Ok(total)
    }

    /// Scratch location a converter writes the job's output to.
    pub fn work_path(&self, job_id: &str, format: &Format) -> PathBuf {
        self.work_root
            .join(format!("{}.{}.{}", job_id, format.extension(), PARTIAL_SUFFIX))
    }

    /// Final output location for a job.
    pub fn output_path(&self, job_id: &str, format: &Format) -> PathBuf {
        self.output_root
            .join(format!("{}.{}", job_id, format.extension()))
    }

    /// Moves a finished conversion result into the output root.
    pub fn persist(
        &self,
        job_id: &str,
        temp_path: &Path,
        format: &Format,
    ) -> Result<PathBuf, StorageError> {
        if std::fs::symlink_metadata(temp_path).is_err() {
            return Err(StorageError::NotFound(temp_path.to_path_buf()));
        }

        let output_path = self.output_path(job_id, format);
        if std::fs::symlink_metadata(&output_path).is_ok() {
            return Err(StorageError::FileExists(output_path));
        }

        move_file(temp_path, &output_path)?;
        Ok(output_path)
    }

    /// Opens a file in the output root for streaming.
    pub fn open_output(&self, path: &Path) -> Result<File, StorageError> {
        open_within(&self.output_root, path)
    }

    /// Opens a file in the upload root for streaming.
    pub fn open_upload(&self, path: &Path) -> Result<File, StorageError> {
        open_within(&self.upload_root, path)
    }

    /// True when `path` exists inside one of the gateway's roots.
    pub fn exists(&self, path: &Path) -> bool {
        [&self.upload_root, &self.output_root, &self.work_root]
            .iter()
            .any(|root| resolve_within(root, path).is_some())
    }

    /// Removes a file. Missing files are treated as success.
    pub fn delete(&self, path: &Path) -> Result<(), StorageError> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::DeleteFile {
                path: path.to_path_buf(),
                source: e,
            }),
        }
    }

    /// Files in the upload and output roots whose job-id prefix is not in
    /// `known_ids`. Nothing is deleted.
    pub fn orphans(&self, known_ids: &HashSet<String>) -> Result<Vec<PathBuf>, StorageError> {
        let mut orphans = Vec::new();

        for root in [&self.upload_root, &self.output_root] {
            let entries = std::fs::read_dir(root).map_err(|e| StorageError::ListDirectory {
                path: root.to_path_buf(),
                source: e,
            })?;

            for entry in entries.flatten() {
                let path = entry.path();
                if !path.is_file() {
                    continue;
                }
                let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                    continue;
                };
                if name.starts_with('.') {
                    continue;
                }
                if !known_ids.contains(job_id_prefix(name)) {
                    orphans.push(path);
                }
            }
        }

        orphans.sort();
        Ok(orphans)
    }
}

/// Job ids are UUIDs, which contain neither `_` nor `.`.
fn job_id_prefix(name: &str) -> &str {
    name.split(['_', '.']).next().unwrap_or(name)
}

fn resolve_within(root: &Path, path: &Path) -> Option<PathBuf> {
    let root = root.canonicalize().ok()?;
    let resolved = path.canonicalize().ok()?;
    if resolved.starts_with(&root) && resolved.is_file() {
        Some(resolved)
    } else {
        None
    }
}

fn open_within(root: &Path, path: &Path) -> Result<File, StorageError> {
    let resolved =
        resolve_within(root, path).ok_or_else(|| StorageError::NotFound(path.to_path_buf()))?;
    File::open(&resolved).map_err(|e| StorageError::OpenFile {
        path: resolved,
        source: e,
    })
}

/// Reports whether a buffered reader yields any bytes, without consuming them.
pub fn has_content<R: BufRead>(reader: &mut R) -> Result<bool, StorageError> {
    loop {
        match reader.fill_buf() {
            Ok(buf) => return Ok(!buf.is_empty()),
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(StorageError::ReadStream(e)),
        }
    }
}
