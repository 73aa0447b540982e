//! Command-line arguments

use clap::Parser;
use std::path::PathBuf;

use crate::mirror::MirrorJob;
use crate::s3::S3ClientConfig;

/// Recursively upload a local directory to an S3 bucket.
///
/// Object keys are the files' paths relative to LOCAL_PATH. Credentials come
/// from PROFILE when given, otherwise from the AWS default chain
/// (environment variables, shared credentials file, instance role).
#[derive(Parser, Debug)]
#[clap(name = "s3-mirror", version, about)]
pub struct Cli {
    /// Directory to mirror
    pub local_path: PathBuf,

    /// Destination bucket
    pub bucket_name: String,

    /// Named AWS profile from the shared config/credentials files
    pub profile: Option<String>,

    /// Custom S3 endpoint, e.g. a MinIO server
    #[clap(long)]
    pub endpoint_url: Option<String>,

    /// Region override
    #[clap(long)]
    pub region: Option<String>,

    /// Use path-style bucket addressing
    #[clap(long)]
    pub force_path_style: bool,
}

impl Cli {
    /// Split the arguments into the job and the client settings
    pub fn into_parts(self) -> (MirrorJob, S3ClientConfig) {
        let job = MirrorJob::new(self.local_path, self.bucket_name, self.profile);
        let config = S3ClientConfig {
            endpoint_url: self.endpoint_url,
            force_path_style: self.force_path_style,
            region: self.region,
        };
        (job, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_positional_arguments() {
        let cli = Cli::try_parse_from(["s3-mirror", "/data/set", "my-bucket"]).unwrap();
        let (job, config) = cli.into_parts();

        assert_eq!(job.local_path(), std::path::Path::new("/data/set"));
        assert_eq!(job.bucket(), "my-bucket");
        assert!(job.profile().is_none());
        assert!(config.endpoint_url.is_none());
        assert!(!config.force_path_style);
    }

    #[test]
    fn test_profile_argument() {
        let cli = Cli::try_parse_from(["s3-mirror", "/data/set", "my-bucket", "backup"]).unwrap();
        let (job, _) = cli.into_parts();
        assert_eq!(job.profile(), Some("backup"));
    }

    #[test]
    fn test_endpoint_flags() {
        let cli = Cli::try_parse_from([
            "s3-mirror",
            "--endpoint-url",
            "http://localhost:9000",
            "--force-path-style",
            "--region",
            "us-west-2",
            "src",
            "bucket",
        ])
        .unwrap();
        let (_, config) = cli.into_parts();

        assert_eq!(config.endpoint_url.as_deref(), Some("http://localhost:9000"));
        assert_eq!(config.region.as_deref(), Some("us-west-2"));
        assert!(config.force_path_style);
    }

    #[test]
    fn test_missing_bucket_is_rejected() {
        let err = Cli::try_parse_from(["s3-mirror", "/data/set"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }
}
