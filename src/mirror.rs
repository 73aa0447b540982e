//! Directory tree to bucket mirroring
//!
//! A [`MirrorJob`] walks a local directory and uploads every regular file it
//! finds, one at a time, under a key equal to the file's path relative to the
//! job's root. The first failure stops the job; the returned error names the
//! file that failed and how many uploads completed before it.

use std::io;
use std::path::{Component, Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

use crate::error::{MirrorError, Result};
use crate::s3::{ClientFactory, CredentialResolver, ObjectUploader};

/// A single directory to bucket upload run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorJob {
    local_path: PathBuf,
    bucket: String,
    profile: Option<String>,
}

/// A regular file found under the job root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Path on the local filesystem
    pub path: PathBuf,
    /// Object key the file is uploaded under
    pub key: String,
}

/// Totals for a completed job
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MirrorReport {
    pub files: usize,
    pub bytes: u64,
}

impl MirrorJob {
    pub fn new(
        local_path: impl Into<PathBuf>,
        bucket: impl Into<String>,
        profile: Option<String>,
    ) -> Self {
        Self {
            local_path: local_path.into(),
            bucket: bucket.into(),
            profile,
        }
    }

    pub fn local_path(&self) -> &Path {
        &self.local_path
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn profile(&self) -> Option<&str> {
        self.profile.as_deref()
    }

    /// Credential source for this job's profile setting
    pub fn credential_resolver(&self) -> CredentialResolver {
        CredentialResolver::from_profile(self.profile())
    }

    /// Build a client through `factory` and upload the whole tree with it.
    ///
    /// The client is constructed once, after the source directory has been
    /// checked and before the first upload.
    pub async fn mirror<F: ClientFactory>(&self, factory: &F) -> Result<MirrorReport> {
        self.ensure_source_dir()?;

        let resolver = self.credential_resolver();
        let client = factory
            .create_client(&resolver)
            .await
            .map_err(|source| MirrorError::Client { source })?;

        self.upload_tree(&client).await
    }

    /// Upload the whole tree with an existing uploader
    pub async fn mirror_with<U: ObjectUploader + ?Sized>(&self, uploader: &U) -> Result<MirrorReport> {
        self.ensure_source_dir()?;
        self.upload_tree(uploader).await
    }

    /// Regular files under the root, in traversal order.
    ///
    /// A directory's own files come before the contents of its
    /// subdirectories; siblings are visited in file name order. Symlinks to
    /// regular files are included; symlinked directories are not descended
    /// into and dangling links are skipped.
    pub fn entries(&self) -> impl Iterator<Item = Result<FileEntry>> + '_ {
        WalkDir::new(&self.local_path)
            .sort_by(|a, b| {
                a.file_type()
                    .is_dir()
                    .cmp(&b.file_type().is_dir())
                    .then_with(|| a.file_name().cmp(b.file_name()))
            })
            .into_iter()
            .filter_map(move |entry| self.file_entry(entry).transpose())
    }

    fn ensure_source_dir(&self) -> Result<()> {
        if self.local_path.is_dir() {
            Ok(())
        } else {
            Err(MirrorError::NotADirectory {
                path: self.local_path.clone(),
            })
        }
    }

    async fn upload_tree<U: ObjectUploader + ?Sized>(&self, uploader: &U) -> Result<MirrorReport> {
        tracing::info!(
            "Mirroring {:?} to s3://{}",
            self.local_path,
            self.bucket
        );

        let mut report = MirrorReport::default();

        for entry in self.entries() {
            let entry = entry?;

            match uploader.upload_file(&entry.path, &self.bucket, &entry.key).await {
                Ok(bytes) => {
                    tracing::debug!("Uploaded {:?} as {} ({} bytes)", entry.path, entry.key, bytes);
                    report.files += 1;
                    report.bytes += bytes;
                }
                Err(source) => {
                    return Err(MirrorError::Upload {
                        path: entry.path,
                        key: entry.key,
                        uploaded: report.files,
                        source,
                    });
                }
            }
        }

        tracing::info!(
            "Mirrored {} files ({} bytes) to s3://{}",
            report.files,
            report.bytes,
            self.bucket
        );

        Ok(report)
    }

    fn file_entry(&self, entry: walkdir::Result<DirEntry>) -> Result<Option<FileEntry>> {
        let walk_error = |source: walkdir::Error| MirrorError::Walk {
            root: self.local_path.clone(),
            source,
        };

        let entry = entry.map_err(walk_error)?;
        let file_type = entry.file_type();

        if file_type.is_symlink() {
            match std::fs::metadata(entry.path()) {
                Ok(target) if target.is_file() => {}
                Ok(_) => {
                    tracing::debug!("Skipping symlink to non-file {:?}", entry.path());
                    return Ok(None);
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    tracing::debug!("Skipping dangling symlink {:?}", entry.path());
                    return Ok(None);
                }
                Err(source) => {
                    return Err(MirrorError::Io {
                        path: entry.into_path(),
                        source,
                    });
                }
            }
        } else if !file_type.is_file() {
            return Ok(None);
        }

        let key = object_key(&self.local_path, entry.path())?;

        Ok(Some(FileEntry {
            path: entry.into_path(),
            key,
        }))
    }
}

/// Object key for `path` relative to `root`, joined with `/`.
///
/// The root is removed as a path prefix, so trailing separators on the root
/// and a filesystem root both produce keys without a leading `/`.
pub fn object_key(root: &Path, path: &Path) -> Result<String> {
    let relative = path.strip_prefix(root).unwrap_or(path);

    let mut segments = Vec::new();
    for component in relative.components() {
        if let Component::Normal(segment) = component {
            let segment = segment.to_str().ok_or_else(|| MirrorError::NonUnicodeKey {
                path: path.to_path_buf(),
            })?;
            segments.push(segment);
        }
    }

    Ok(segments.join("/"))
}
