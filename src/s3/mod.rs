//! S3 client wrapper module
//!
//! This module provides AWS S3 functionality including:
//! - [`client::S3Client`] - Upload and inspection operations
//! - [`client::ClientFactory`] / [`client::ObjectUploader`] - Seams used by the mirror driver
//! - [`credentials::CredentialResolver`] - Where credentials come from

pub mod client;
pub mod credentials;

// Re-export commonly used types
pub use client::{ClientFactory, ObjectUploader, S3Client, S3ClientConfig, S3ClientFactory};
pub use credentials::{CredentialResolver, StaticCredentials};
