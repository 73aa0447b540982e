//! Error types for mirror jobs

use std::path::PathBuf;
use thiserror::Error;

/// Boxed error returned by uploaders and client factories
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that stop a mirror job
#[derive(Debug, Error)]
pub enum MirrorError {
    /// The source path is missing or is not a directory
    #[error("source path {} is not a directory", path.display())]
    NotADirectory { path: PathBuf },

    /// Traversal of the source tree failed
    #[error("failed to walk {}", root.display())]
    Walk {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    /// A file under the root could not be inspected
    #[error("failed to read {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A relative path could not be turned into an object key
    #[error("{} is not valid UTF-8 and cannot be used as an object key", path.display())]
    NonUnicodeKey { path: PathBuf },

    /// The storage client could not be constructed
    #[error("failed to construct storage client")]
    Client {
        #[source]
        source: BoxError,
    },

    /// An upload failed; files after this one were not attempted
    #[error("failed to upload {} as {key} ({uploaded} files uploaded before the failure)", path.display())]
    Upload {
        path: PathBuf,
        key: String,
        uploaded: usize,
        #[source]
        source: BoxError,
    },
}

impl MirrorError {
    /// Local path of the file that was being processed, if any
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            MirrorError::NotADirectory { path }
            | MirrorError::NonUnicodeKey { path }
            | MirrorError::Io { path, .. }
            | MirrorError::Upload { path, .. } => Some(path.as_path()),
            MirrorError::Walk { source, .. } => source.path(),
            MirrorError::Client { .. } => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, MirrorError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;
    use std::io;

    #[test]
    fn test_upload_error_message_names_file_and_key() {
        let err = MirrorError::Upload {
            path: PathBuf::from("/data/set/sub/a.txt"),
            key: "sub/a.txt".to_string(),
            uploaded: 3,
            source: Box::new(io::Error::new(io::ErrorKind::Other, "boom")),
        };

        let msg = err.to_string();
        assert!(msg.contains("/data/set/sub/a.txt"));
        assert!(msg.contains("sub/a.txt"));
        assert!(msg.contains("3 files uploaded"));
        assert_eq!(err.source().unwrap().to_string(), "boom");
        assert_eq!(err.path(), Some(std::path::Path::new("/data/set/sub/a.txt")));
    }

    #[test]
    fn test_client_error_has_no_path() {
        let err = MirrorError::Client {
            source: "no region".into(),
        };
        assert!(err.path().is_none());
    }
}
