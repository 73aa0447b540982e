//! AWS credential resolution
//!
//! A [`CredentialResolver`] decides where the S3 client gets its credentials:
//! - A named profile from the shared config/credentials files
//! - The SDK default chain (environment variables, shared files, SSO,
//!   web identity, ECS/EC2 instance roles)
//! - Explicit static credentials (S3-compatible endpoints such as MinIO)
//!
//! Nothing here touches the network. A profile that does not exist surfaces as
//! an authentication failure on the first request.

use aws_config::{BehaviorVersion, ConfigLoader};
use aws_sdk_s3::config::Credentials;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Static access key pair, optionally with a session token
#[derive(Clone, PartialEq, Eq)]
pub struct StaticCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl std::fmt::Debug for StaticCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"** redacted **")
            .field("session_token", &self.session_token.as_ref().map(|_| "** redacted **"))
            .finish()
    }
}

/// Source of credentials for the storage client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialResolver {
    /// Credentials from a named profile in the shared config files
    NamedProfile(String),
    /// The SDK default provider chain
    DefaultChain,
    /// Explicit credentials
    Static(StaticCredentials),
}

impl CredentialResolver {
    /// Pick a resolver from an optional profile name.
    ///
    /// An empty name is treated the same as no name.
    pub fn from_profile(profile: Option<&str>) -> Self {
        match profile {
            Some(name) if !name.is_empty() => CredentialResolver::NamedProfile(name.to_string()),
            _ => CredentialResolver::DefaultChain,
        }
    }

    /// Short label for logging
    pub fn as_str(&self) -> &str {
        match self {
            CredentialResolver::NamedProfile(name) => name,
            CredentialResolver::DefaultChain => "default chain",
            CredentialResolver::Static(_) => "static credentials",
        }
    }

    /// Build an SDK config loader wired to this credential source
    pub fn config_loader(&self) -> ConfigLoader {
        let loader = aws_config::defaults(BehaviorVersion::latest());
        match self {
            CredentialResolver::NamedProfile(name) => loader.profile_name(name),
            CredentialResolver::DefaultChain => loader,
            CredentialResolver::Static(creds) => loader.credentials_provider(Credentials::new(
                creds.access_key_id.clone(),
                creds.secret_access_key.clone(),
                creds.session_token.clone(),
                None,
                "s3-mirror-static",
            )),
        }
    }
}

/// Location of the shared config file, honouring `AWS_CONFIG_FILE`
pub fn shared_config_path() -> PathBuf {
    std::env::var_os("AWS_CONFIG_FILE")
        .map(PathBuf::from)
        .unwrap_or_else(|| aws_dir().join("config"))
}

/// Location of the shared credentials file, honouring `AWS_SHARED_CREDENTIALS_FILE`
pub fn shared_credentials_path() -> PathBuf {
    std::env::var_os("AWS_SHARED_CREDENTIALS_FILE")
        .map(PathBuf::from)
        .unwrap_or_else(|| aws_dir().join("credentials"))
}

fn aws_dir() -> PathBuf {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(|h| PathBuf::from(h).join(".aws"))
        .unwrap_or_else(|| PathBuf::from(".aws"))
}

/// Profile names declared in the given shared config and credentials files.
///
/// Missing or unreadable files contribute nothing.
pub fn known_profiles(config_path: &Path, credentials_path: &Path) -> BTreeSet<String> {
    let mut names = BTreeSet::new();

    if let Ok(content) = std::fs::read_to_string(credentials_path) {
        names.extend(section_names(&content).map(str::to_string));
    }

    if let Ok(content) = std::fs::read_to_string(config_path) {
        for section in section_names(&content) {
            // config uses `[profile name]`, except for `[default]`
            if section == "default" {
                names.insert(section.to_string());
            } else if let Some(name) = section.strip_prefix("profile ") {
                names.insert(name.trim().to_string());
            }
        }
    }

    names
}

/// The named profile `resolver` asks for, if it is missing from `known`
pub fn undeclared_profile<'a>(
    resolver: &'a CredentialResolver,
    known: &BTreeSet<String>,
) -> Option<&'a str> {
    match resolver {
        CredentialResolver::NamedProfile(name) if !known.contains(name) => Some(name.as_str()),
        _ => None,
    }
}

fn section_names(content: &str) -> impl Iterator<Item = &str> {
    content.lines().filter_map(|line| {
        let line = line.trim();
        line.strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'))
            .map(str::trim)
    })
}
