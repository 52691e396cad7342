// backuptool/src/config/mod.rs
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::{BackupError, Result};

const DEFAULT_REGION: &str = "us-east-1";

// Structs for deserializing the JSON config document. Field casing follows
// the on-disk format; internal structs use Rust casing.

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum BoolOrString {
    Bool(bool),
    Str(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    Str(String),
    Num(u64),
}

impl StringOrNumber {
    fn into_string(self) -> String {
        match self {
            StringOrNumber::Str(s) => s,
            StringOrNumber::Num(n) => n.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct RawAwsConfig {
    #[serde(rename = "AWS_ACCESS_KEY_ID")]
    access_key_id: String,
    #[serde(rename = "AWS_SECRET_ACCESS_KEY")]
    secret_access_key: String,
    #[serde(rename = "AWS_STORAGE_BUCKET_NAME")]
    bucket_name: String,
    #[serde(rename = "AWS_REGION", default)]
    region: Option<String>,
    #[serde(rename = "AWS_ENDPOINT_URL", default)]
    endpoint_url: Option<String>,
    #[serde(rename = "BUCKET_KEY_DB")]
    bucket_key_db: String,
    #[serde(rename = "BUCKET_KEY_FOLDER")]
    bucket_key_folder: String,
}

#[derive(Debug, Clone, Deserialize)]
struct RawDatabaseUnit {
    #[serde(rename = "NAME")]
    name: String,
    #[serde(rename = "HOST")]
    host: String,
    #[serde(rename = "PORT")]
    port: StringOrNumber,
    #[serde(rename = "USER")]
    user: String,
    #[serde(rename = "PASSWORD")]
    password: String,
}

#[derive(Debug, Clone, Deserialize)]
struct RawDirectoryUnit {
    #[serde(rename = "DIR_NAME")]
    dir_name: PathBuf,
    #[serde(rename = "DIR_SHORT_NAME")]
    dir_short_name: String,
}

#[derive(Debug, Clone, Deserialize)]
struct RawConfig {
    backup_directory: PathBuf,
    #[serde(default)]
    delete_backup: Option<BoolOrString>,
    #[serde(default)]
    job_timeout_secs: Option<u64>,
    aws: RawAwsConfig,
    #[serde(default)]
    databases: Vec<RawDatabaseUnit>,
    #[serde(default)]
    webfolders: Vec<RawDirectoryUnit>,
}

// Application's internal configuration structs. Immutable for the run;
// constructed once in main and passed by reference into every component.

#[derive(Debug, Clone)]
pub struct AwsConfig {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub bucket_name: String,
    pub region: String,
    pub endpoint_url: Option<String>,
    pub key_prefix_db: String,
    pub key_prefix_folder: String,
}

#[derive(Debug, Clone)]
pub struct DatabaseUnit {
    pub name: String,
    pub host: String,
    pub port: String,
    pub user: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct DirectoryUnit {
    pub dir_name: PathBuf,
    pub short_name: String,
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub backup_directory: PathBuf,
    pub delete_after_upload: bool,
    pub job_timeout: Option<Duration>,
    pub verbose: bool,
    pub aws: AwsConfig,
    pub databases: Vec<DatabaseUnit>,
    pub webfolders: Vec<DirectoryUnit>,
}

impl RunConfig {
    pub fn load_from_json(config_path: &Path, verbose: bool) -> Result<Self> {
        let config_content = fs::read_to_string(config_path).map_err(|e| {
            BackupError::Config(format!(
                "Cannot open configuration file {}: {}",
                config_path.display(),
                e
            ))
        })?;
        let raw: RawConfig = serde_json::from_str(&config_content).map_err(|e| {
            BackupError::Config(format!(
                "Cannot parse configuration file {} (must be JSON): {}",
                config_path.display(),
                e
            ))
        })?;

        Self::from_raw(raw, verbose)
    }

    fn from_raw(raw: RawConfig, verbose: bool) -> Result<Self> {
        if raw.backup_directory.as_os_str().is_empty() {
            return Err(BackupError::Config(
                "backup_directory cannot be empty".to_string(),
            ));
        }

        let delete_after_upload = match raw.delete_backup {
            None => false,
            Some(BoolOrString::Bool(b)) => b,
            Some(BoolOrString::Str(s)) => match s.to_ascii_lowercase().as_str() {
                "true" => true,
                "false" => false,
                other => {
                    return Err(BackupError::Config(format!(
                        "delete_backup must be \"true\" or \"false\", got \"{}\"",
                        other
                    )));
                }
            },
        };

        let databases = raw
            .databases
            .into_iter()
            .map(|db| {
                if db.name.trim().is_empty() {
                    return Err(BackupError::Config(
                        "database entry with empty NAME".to_string(),
                    ));
                }
                Ok(DatabaseUnit {
                    name: db.name,
                    host: db.host,
                    port: db.port.into_string(),
                    user: db.user,
                    password: db.password,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let webfolders = raw
            .webfolders
            .into_iter()
            .map(|dir| {
                if dir.dir_short_name.trim().is_empty() {
                    return Err(BackupError::Config(format!(
                        "webfolder entry {} with empty DIR_SHORT_NAME",
                        dir.dir_name.display()
                    )));
                }
                Ok(DirectoryUnit {
                    dir_name: dir.dir_name,
                    short_name: dir.dir_short_name,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(RunConfig {
            backup_directory: raw.backup_directory,
            delete_after_upload,
            job_timeout: raw.job_timeout_secs.map(Duration::from_secs),
            verbose,
            aws: AwsConfig {
                access_key_id: raw.aws.access_key_id,
                secret_access_key: raw.aws.secret_access_key,
                bucket_name: raw.aws.bucket_name,
                region: raw.aws.region.unwrap_or_else(|| DEFAULT_REGION.to_string()),
                endpoint_url: raw.aws.endpoint_url,
                key_prefix_db: raw.aws.bucket_key_db,
                key_prefix_folder: raw.aws.bucket_key_folder,
            },
            databases,
            webfolders,
        })
    }
}
