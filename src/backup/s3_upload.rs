// backuptool/src/backup/s3_upload.rs
use aws_sdk_s3 as s3;
use s3::config::Region;
use s3::primitives::ByteStream;
use std::path::Path;

use crate::backup::archive::ARCHIVE_SUFFIX;
use crate::config::AwsConfig;
use crate::errors::{BackupError, Result};

/// The two kinds of backup unit; each maps to its own configured key
/// prefix in the bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
    Database,
    Directory,
}

impl UnitKind {
    pub fn label(self) -> &'static str {
        match self {
            UnitKind::Database => "database",
            UnitKind::Directory => "folder",
        }
    }
}

/// Deterministic object key for one archive: `{prefix}/{base_filename}.zip`.
/// The prefix comes from configuration, never inferred, and differs per
/// unit kind. Re-uploading the same base filename overwrites the same key.
pub fn remote_key(aws: &AwsConfig, kind: UnitKind, base_filename: &str) -> String {
    let prefix = match kind {
        UnitKind::Database => &aws.key_prefix_db,
        UnitKind::Directory => &aws.key_prefix_folder,
    };
    format!("{}/{}{}", prefix, base_filename, ARCHIVE_SUFFIX)
}

/// Uploads a local archive to the configured bucket under its remote key.
/// No internal retry; retry policy belongs to the orchestrator.
pub async fn upload_archive(
    aws: &AwsConfig,
    local_path: &Path,
    kind: UnitKind,
    base_filename: &str,
    verbose: bool,
) -> Result<()> {
    let s3_key = remote_key(aws, kind, base_filename);

    if verbose {
        println!(
            "Uploading {} to S3 bucket {} into key \"{}\"...",
            local_path.display(),
            aws.bucket_name,
            s3_key
        );
    }

    let mut loader = aws_config::defaults(s3::config::BehaviorVersion::latest())
        .region(Region::new(aws.region.clone()))
        .credentials_provider(s3::config::Credentials::new(
            &aws.access_key_id,
            &aws.secret_access_key,
            None,     // session_token
            None,     // expiry
            "Static", // provider_name
        ));
    if let Some(endpoint_url) = &aws.endpoint_url {
        loader = loader.endpoint_url(endpoint_url);
    }
    let sdk_config = loader.load().await;
    let client = s3::Client::new(&sdk_config);

    let body = ByteStream::from_path(local_path).await.map_err(|e| {
        BackupError::Upload(format!(
            "Failed to read archive {}: {}",
            local_path.display(),
            e
        ))
    })?;

    client
        .put_object()
        .bucket(&aws.bucket_name)
        .key(&s3_key)
        .body(body)
        .send()
        .await
        .map_err(|e| {
            BackupError::Upload(format!(
                "Failed to upload {} to bucket {} with key {}: {}",
                local_path.display(),
                aws.bucket_name,
                s3_key,
                e
            ))
        })?;

    if verbose {
        println!("+ Upload finished (s3://{}/{})", aws.bucket_name, s3_key);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_aws_config() -> AwsConfig {
        AwsConfig {
            access_key_id: "AKIAEXAMPLE".to_string(),
            secret_access_key: "secret".to_string(),
            bucket_name: "my-backups".to_string(),
            region: "us-east-1".to_string(),
            endpoint_url: None,
            key_prefix_db: "db".to_string(),
            key_prefix_folder: "web".to_string(),
        }
    }

    #[test]
    fn test_remote_key_per_unit_kind() {
        let aws = test_aws_config();
        assert_eq!(
            remote_key(&aws, UnitKind::Database, "mysqldump_orders-20240301100000.sql"),
            "db/mysqldump_orders-20240301100000.sql.zip"
        );
        assert_eq!(
            remote_key(&aws, UnitKind::Directory, "site-20240301100000"),
            "web/site-20240301100000.zip"
        );
    }

    #[test]
    fn test_remote_key_is_deterministic() {
        let aws = test_aws_config();
        let first = remote_key(&aws, UnitKind::Database, "mysqldump_orders-20240301100000.sql");
        let second = remote_key(&aws, UnitKind::Database, "mysqldump_orders-20240301100000.sql");
        assert_eq!(first, second);
    }
}
