pub mod naming;

use std::path::PathBuf;
use which::which;

use crate::errors::{BackupError, Result};

/// Finds the mysqldump executable in the system PATH.
pub fn find_mysqldump_executable() -> Result<PathBuf> {
    which("mysqldump").map_err(|e| {
        BackupError::Produce(format!(
            "mysqldump executable not found in PATH ({}). Please ensure MySQL client tools are installed.",
            e
        ))
    })
}
