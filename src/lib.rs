//! S3 Mirror Library
//!
//! Uploads a local directory tree to an S3 bucket, one file at a time, using
//! each file's path relative to the tree root as its object key.

pub mod cli;
pub mod error;
pub mod mirror;
pub mod s3;

pub use error::{BoxError, MirrorError};
pub use mirror::{FileEntry, MirrorJob, MirrorReport};
