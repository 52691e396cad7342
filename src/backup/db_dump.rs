// backuptool/src/backup/db_dump.rs
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::time::timeout;

use crate::config::DatabaseUnit;
use crate::errors::{BackupError, Result};

/// Read the dump tool's stdout in fixed 4 MiB chunks: bounds peak memory
/// while keeping syscall overhead low. Dumps may be arbitrarily large.
const DUMP_CHUNK_SIZE: usize = 4 * 1024 * 1024;

/// Runs mysqldump for one database unit and streams its stdout to
/// `dest_path`, opened for exclusive write.
///
/// The child's exit status is awaited and checked; a non-zero status is a
/// produce failure with the tool's stderr in the message. On any failure
/// the partial file at `dest_path` is invalid and the caller must remove
/// it before reusing the path. With a deadline set, an overrunning child
/// is killed and the dump fails instead of stalling the run.
pub async fn dump_database(
    mysqldump_path: &Path,
    unit: &DatabaseUnit,
    dest_path: &Path,
    deadline: Option<Duration>,
    verbose: bool,
) -> Result<()> {
    if verbose {
        println!(
            "Dumping MySQL database {} to file {}",
            unit.name,
            dest_path.display()
        );
    }

    let mut child = Command::new(mysqldump_path)
        .arg(&unit.name)
        .args(["-h", &unit.host, "-P", &unit.port, "-u", &unit.user])
        .arg(format!("-p{}", unit.password))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| {
            BackupError::Produce(format!(
                "Failed to spawn {}: {}",
                mysqldump_path.display(),
                e
            ))
        })?;

    match deadline {
        Some(limit) => match timeout(limit, stream_dump(&mut child, dest_path, verbose)).await {
            Ok(result) => result,
            Err(_) => {
                let _ = child.kill().await;
                Err(BackupError::Produce(format!(
                    "mysqldump for database {} exceeded the {:?} job timeout",
                    unit.name, limit
                )))
            }
        },
        None => stream_dump(&mut child, dest_path, verbose).await,
    }
}

async fn stream_dump(child: &mut Child, dest_path: &Path, verbose: bool) -> Result<()> {
    let mut stdout = child
        .stdout
        .take()
        .ok_or_else(|| BackupError::Produce("mysqldump stdout was not captured".to_string()))?;

    // Drain stderr concurrently so a chatty tool cannot deadlock on a full
    // pipe while we read stdout.
    let stderr = child.stderr.take();
    let stderr_task = tokio::spawn(async move {
        let mut collected = Vec::new();
        if let Some(mut stderr) = stderr {
            let _ = stderr.read_to_end(&mut collected).await;
        }
        collected
    });

    let mut dump_file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(dest_path)
        .await
        .map_err(|e| {
            BackupError::Produce(format!(
                "Failed to create dump file {}: {}",
                dest_path.display(),
                e
            ))
        })?;

    let mut chunk = vec![0u8; DUMP_CHUNK_SIZE];
    let mut total_bytes: u64 = 0;
    loop {
        let read = stdout
            .read(&mut chunk)
            .await
            .map_err(|e| BackupError::Produce(format!("Failed to read mysqldump output: {}", e)))?;
        if read == 0 {
            break;
        }
        dump_file.write_all(&chunk[..read]).await.map_err(|e| {
            BackupError::Produce(format!(
                "Failed to write to dump file {}: {}",
                dest_path.display(),
                e
            ))
        })?;
        total_bytes += read as u64;
        if verbose {
            println!("+ Written data chunk ({} bytes)", read);
        }
    }
    dump_file.flush().await.map_err(|e| {
        BackupError::Produce(format!(
            "Failed to flush dump file {}: {}",
            dest_path.display(),
            e
        ))
    })?;

    let status = child
        .wait()
        .await
        .map_err(|e| BackupError::Produce(format!("Failed to await mysqldump: {}", e)))?;
    let stderr_output = stderr_task.await.unwrap_or_default();

    if !status.success() {
        return Err(BackupError::Produce(format!(
            "mysqldump exited with status {}: {}",
            status,
            String::from_utf8_lossy(&stderr_output).trim()
        )));
    }

    if verbose {
        println!("+ Dump finished ({} bytes)", total_bytes);
    }
    Ok(())
}
