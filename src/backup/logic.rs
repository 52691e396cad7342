// backuptool/src/backup/logic.rs
use chrono::Local;
use std::fmt;
use std::fs;
use std::io;
use std::path::Path;
use tokio::time::timeout;

use crate::backup::s3_upload::UnitKind;
use crate::backup::{archive, db_dump, s3_upload};
use crate::config::{DatabaseUnit, DirectoryUnit, RunConfig};
use crate::errors::{BackupError, Result};
use crate::utils::{find_mysqldump_executable, naming};

/// Pipeline stage a job is currently in. A job that fails is reported
/// with the stage it failed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStage {
    Produce,
    Compress,
    Upload,
    Cleanup,
}

impl fmt::Display for JobStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobStage::Produce => "produce",
            JobStage::Compress => "compress",
            JobStage::Upload => "upload",
            JobStage::Cleanup => "cleanup",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug)]
pub enum JobOutcome {
    Success,
    Skipped(String),
    Failed { stage: JobStage, error: BackupError },
}

/// Terminal record of one job; the only thing that outlives the job loop.
#[derive(Debug)]
pub struct JobReport {
    pub unit: String,
    pub kind: UnitKind,
    pub base_filename: String,
    pub outcome: JobOutcome,
}

/// One timestamped execution of a backup unit, advancing through the
/// pipeline stages until it is turned into a `JobReport`.
struct BackupJob {
    unit: String,
    kind: UnitKind,
    base_filename: String,
    stage: JobStage,
}

impl BackupJob {
    fn new(unit: String, kind: UnitKind, base_filename: String) -> Self {
        BackupJob {
            unit,
            kind,
            base_filename,
            stage: JobStage::Produce,
        }
    }

    fn advance(&mut self, stage: JobStage) {
        self.stage = stage;
    }

    fn succeed(self) -> JobReport {
        JobReport {
            unit: self.unit,
            kind: self.kind,
            base_filename: self.base_filename,
            outcome: JobOutcome::Success,
        }
    }

    fn skip(self, reason: String) -> JobReport {
        JobReport {
            unit: self.unit,
            kind: self.kind,
            base_filename: self.base_filename,
            outcome: JobOutcome::Skipped(reason),
        }
    }

    /// Logs the failure with unit and stage context, then seals the report.
    /// Failures never unwind past the job loop.
    fn fail(self, error: BackupError) -> JobReport {
        eprintln!(
            "❌ Backup of {} {} failed at {} stage: {}",
            self.kind.label(),
            self.unit,
            self.stage,
            error
        );
        JobReport {
            unit: self.unit,
            kind: self.kind,
            base_filename: self.base_filename,
            outcome: JobOutcome::Failed {
                stage: self.stage,
                error,
            },
        }
    }
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub reports: Vec<JobReport>,
}

impl RunSummary {
    pub fn success_count(&self) -> usize {
        self.count(|o| matches!(o, JobOutcome::Success))
    }

    pub fn skipped_count(&self) -> usize {
        self.count(|o| matches!(o, JobOutcome::Skipped(_)))
    }

    pub fn failed_count(&self) -> usize {
        self.count(|o| matches!(o, JobOutcome::Failed { .. }))
    }

    pub fn has_failures(&self) -> bool {
        self.failed_count() > 0
    }

    fn count(&self, predicate: impl Fn(&JobOutcome) -> bool) -> usize {
        self.reports
            .iter()
            .filter(|r| predicate(&r.outcome))
            .count()
    }
}

/// Runs every configured backup unit through the pipeline, databases
/// first, then web folders, each group in configured order, strictly
/// sequential. Per-job failures are contained; only a failure to set up
/// the backup directory aborts before the loop.
pub async fn perform_backup_orchestration(
    config: &RunConfig,
    run_databases: bool,
    run_folders: bool,
) -> Result<RunSummary> {
    fs::create_dir_all(&config.backup_directory).map_err(|e| {
        BackupError::Config(format!(
            "Cannot create backup directory {}: {}",
            config.backup_directory.display(),
            e
        ))
    })?;

    let mut summary = RunSummary::default();

    if run_databases && !config.databases.is_empty() {
        match find_mysqldump_executable() {
            Ok(mysqldump) => {
                for unit in &config.databases {
                    summary
                        .reports
                        .push(run_database_job(config, &mysqldump, unit).await);
                }
            }
            Err(error) => {
                // Without the dump tool every database job fails at the
                // produce stage, but folder jobs still run.
                let message = error.to_string();
                eprintln!("❌ {}", message);
                for unit in &config.databases {
                    summary.reports.push(JobReport {
                        unit: unit.name.clone(),
                        kind: UnitKind::Database,
                        base_filename: String::new(),
                        outcome: JobOutcome::Failed {
                            stage: JobStage::Produce,
                            error: BackupError::Produce(message.clone()),
                        },
                    });
                }
            }
        }
    }

    if run_folders {
        for unit in &config.webfolders {
            summary.reports.push(run_folder_job(config, unit).await);
        }
    }

    print_summary(config, &summary);
    Ok(summary)
}

async fn run_database_job(
    config: &RunConfig,
    mysqldump: &Path,
    unit: &DatabaseUnit,
) -> JobReport {
    let token = naming::timestamp_token(&Local::now());
    let base_filename =
        naming::database_base_filename(&config.backup_directory, &unit.name, &token);
    let raw_path = config.backup_directory.join(&base_filename);
    let mut job = BackupJob::new(unit.name.clone(), UnitKind::Database, base_filename);

    if config.verbose {
        println!("🚀 Backing up database {}", unit.name);
    }

    if let Err(error) = db_dump::dump_database(
        mysqldump,
        unit,
        &raw_path,
        config.job_timeout,
        config.verbose,
    )
    .await
    {
        // Whatever made it to disk is invalid and must not survive for a
        // later run to pick up.
        if let Err(remove_err) = remove_file_if_exists(&raw_path) {
            eprintln!(
                "⚠️ Failed to remove partial dump file {}: {}",
                raw_path.display(),
                remove_err
            );
        }
        return job.fail(error);
    }

    job.advance(JobStage::Compress);
    let zip_path = match archive::compress_file(&raw_path) {
        Ok(path) => path,
        // The raw dump is intact and stays on disk for the operator.
        Err(error) => return job.fail(error),
    };
    if config.verbose {
        println!("+ Zip file created successfully");
    }
    if let Err(error) = remove_file_if_exists(&raw_path) {
        return job.fail(error.into());
    }

    job.advance(JobStage::Upload);
    if let Err(error) =
        upload_with_deadline(config, &zip_path, UnitKind::Database, &job.base_filename).await
    {
        return job.fail(error);
    }

    job.advance(JobStage::Cleanup);
    if config.delete_after_upload {
        if let Err(error) = remove_file_if_exists(&zip_path) {
            return job.fail(error.into());
        }
    }

    if config.verbose {
        println!("✅ Database {} backed up", unit.name);
    }
    job.succeed()
}

async fn run_folder_job(config: &RunConfig, unit: &DirectoryUnit) -> JobReport {
    let token = naming::timestamp_token(&Local::now());
    let base_filename =
        naming::folder_base_filename(&config.backup_directory, &unit.short_name, &token);
    let zip_path = config
        .backup_directory
        .join(format!("{}{}", base_filename, archive::ARCHIVE_SUFFIX));
    let mut job = BackupJob::new(unit.short_name.clone(), UnitKind::Directory, base_filename);

    if config.verbose {
        println!(
            "🚀 Archiving folder {} to file {}",
            unit.dir_name.display(),
            zip_path.display()
        );
    }

    match archive::archive_directory(&unit.dir_name, &zip_path) {
        Ok(()) => {}
        Err(BackupError::SourceNotFound(path)) => {
            eprintln!(
                "⚠️ Skipping folder {}: directory {} does not exist",
                unit.short_name,
                path.display()
            );
            return job.skip(format!("directory {} does not exist", path.display()));
        }
        Err(error) => return job.fail(error),
    }
    if config.verbose {
        println!("+ Zip file for directory created successfully");
    }

    job.advance(JobStage::Upload);
    if let Err(error) =
        upload_with_deadline(config, &zip_path, UnitKind::Directory, &job.base_filename).await
    {
        return job.fail(error);
    }

    job.advance(JobStage::Cleanup);
    if config.delete_after_upload {
        if let Err(error) = remove_file_if_exists(&zip_path) {
            return job.fail(error.into());
        }
    }

    if config.verbose {
        println!("✅ Folder {} backed up", unit.short_name);
    }
    job.succeed()
}

async fn upload_with_deadline(
    config: &RunConfig,
    zip_path: &Path,
    kind: UnitKind,
    base_filename: &str,
) -> Result<()> {
    let upload =
        s3_upload::upload_archive(&config.aws, zip_path, kind, base_filename, config.verbose);
    match config.job_timeout {
        Some(limit) => match timeout(limit, upload).await {
            Ok(result) => result,
            Err(_) => Err(BackupError::Upload(format!(
                "upload of {} exceeded the {:?} job timeout",
                zip_path.display(),
                limit
            ))),
        },
        None => upload.await,
    }
}

fn remove_file_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

fn print_summary(config: &RunConfig, summary: &RunSummary) {
    // Silent on a fully successful non-verbose run.
    if !config.verbose && !summary.has_failures() {
        return;
    }
    let line = format!(
        "Backup run finished: {} succeeded, {} skipped, {} failed",
        summary.success_count(),
        summary.skipped_count(),
        summary.failed_count()
    );
    if summary.has_failures() {
        eprintln!("❌ {}", line);
        for report in &summary.reports {
            if let JobOutcome::Failed { stage, .. } = &report.outcome {
                eprintln!(
                    "  - {} {} ({}) failed at {} stage",
                    report.kind.label(),
                    report.unit,
                    report.base_filename,
                    stage
                );
            }
        }
    } else {
        println!("✅ {}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AwsConfig;
    use std::fs::File;

    fn test_config(backup_dir: &Path) -> RunConfig {
        RunConfig {
            backup_directory: backup_dir.to_path_buf(),
            delete_after_upload: true,
            job_timeout: None,
            verbose: false,
            aws: AwsConfig {
                access_key_id: "AKIAEXAMPLE".to_string(),
                secret_access_key: "secret".to_string(),
                bucket_name: "my-backups".to_string(),
                region: "us-east-1".to_string(),
                endpoint_url: None,
                key_prefix_db: "db".to_string(),
                key_prefix_folder: "web".to_string(),
            },
            databases: Vec::new(),
            webfolders: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_missing_directory_is_skipped_not_failed() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let config = test_config(dir.path());
        let unit = DirectoryUnit {
            dir_name: dir.path().join("no-such-site"),
            short_name: "site".to_string(),
        };

        let report = run_folder_job(&config, &unit).await;

        assert!(matches!(report.outcome, JobOutcome::Skipped(_)));
        // No archive may be created and no upload attempted for a missing
        // source: the backup directory stays empty.
        assert_eq!(fs::read_dir(dir.path())?.count(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_run_continues_past_skipped_units() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let mut config = test_config(dir.path());
        config.webfolders = vec![
            DirectoryUnit {
                dir_name: dir.path().join("missing-a"),
                short_name: "a".to_string(),
            },
            DirectoryUnit {
                dir_name: dir.path().join("missing-b"),
                short_name: "b".to_string(),
            },
        ];

        let summary = perform_backup_orchestration(&config, true, true).await?;

        assert_eq!(summary.reports.len(), 2);
        assert_eq!(summary.skipped_count(), 2);
        assert!(!summary.has_failures());
        Ok(())
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failed_dump_leaves_no_partial_file() -> anyhow::Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir()?;
        let backup_dir = dir.path().join("backups");
        fs::create_dir_all(&backup_dir)?;
        let config = test_config(&backup_dir);

        let stub = dir.path().join("mysqldump-stub.sh");
        fs::write(&stub, "#!/bin/sh\nprintf 'partial'\nexit 2\n")?;
        let mut perms = fs::metadata(&stub)?.permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&stub, perms)?;

        let unit = DatabaseUnit {
            name: "orders".to_string(),
            host: "127.0.0.1".to_string(),
            port: "3306".to_string(),
            user: "backup".to_string(),
            password: "hunter2".to_string(),
        };

        let report = run_database_job(&config, &stub, &unit).await;

        match report.outcome {
            JobOutcome::Failed { stage, .. } => assert_eq!(stage, JobStage::Produce),
            other => panic!("expected Failed at produce, got {:?}", other),
        }
        // The invalid partial dump must not remain for upload or reuse.
        assert_eq!(fs::read_dir(&backup_dir)?.count(), 0);
        Ok(())
    }

    #[test]
    fn test_remove_file_if_exists() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let present = dir.path().join("archive.zip");
        File::create(&present)?;

        remove_file_if_exists(&present)?;
        assert!(!present.exists());

        // Absent file is not an error.
        remove_file_if_exists(&present)?;
        Ok(())
    }

    #[test]
    fn test_summary_counts() {
        let summary = RunSummary {
            reports: vec![
                JobReport {
                    unit: "orders".to_string(),
                    kind: UnitKind::Database,
                    base_filename: "mysqldump_orders-20240301100000.sql".to_string(),
                    outcome: JobOutcome::Success,
                },
                JobReport {
                    unit: "site".to_string(),
                    kind: UnitKind::Directory,
                    base_filename: "site-20240301100000".to_string(),
                    outcome: JobOutcome::Skipped("directory missing".to_string()),
                },
                JobReport {
                    unit: "users".to_string(),
                    kind: UnitKind::Database,
                    base_filename: "mysqldump_users-20240301100000.sql".to_string(),
                    outcome: JobOutcome::Failed {
                        stage: JobStage::Upload,
                        error: BackupError::Upload("connection reset".to_string()),
                    },
                },
            ],
        };

        assert_eq!(summary.success_count(), 1);
        assert_eq!(summary.skipped_count(), 1);
        assert_eq!(summary.failed_count(), 1);
        assert!(summary.has_failures());
    }
}
