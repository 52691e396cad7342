mod logic;
pub(crate) mod archive;
pub(crate) mod db_dump;
pub(crate) mod s3_upload;

pub use logic::{JobOutcome, JobReport, JobStage, RunSummary};
pub use s3_upload::UnitKind;

use crate::config::RunConfig;
use crate::errors::Result;

/// Public entry point for the backup process. Runs the selected unit
/// groups through the pipeline and returns the per-job outcomes.
pub async fn run_backup_flow(
    config: &RunConfig,
    run_databases: bool,
    run_folders: bool,
) -> Result<RunSummary> {
    logic::perform_backup_orchestration(config, run_databases, run_folders).await
}
