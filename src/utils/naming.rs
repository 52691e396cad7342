// backuptool/src/utils/naming.rs
use chrono::{DateTime, Local};
use std::path::Path;

use crate::backup::archive::ARCHIVE_SUFFIX;

/// Suffix of a raw database dump before compression.
pub const DUMP_SUFFIX: &str = ".sql";

/// Timestamp token used in every generated backup filename, second
/// resolution: `YYYYMMDDHHMMSS`.
pub fn timestamp_token(now: &DateTime<Local>) -> String {
    now.format("%Y%m%d%H%M%S").to_string()
}

fn database_stem(db_name: &str, token: &str) -> String {
    format!("mysqldump_{}-{}", db_name, token)
}

fn folder_stem(short_name: &str, token: &str) -> String {
    format!("{}-{}", short_name, token)
}

/// Base filename for a database dump, e.g.
/// `mysqldump_orders-20240301100000.sql`, disambiguated against files
/// already present in `backup_dir`.
pub fn database_base_filename(backup_dir: &Path, db_name: &str, token: &str) -> String {
    unique_base_filename(backup_dir, &database_stem(db_name, token), DUMP_SUFFIX)
}

/// Base filename for a directory archive, e.g. `site-20240301100000`,
/// disambiguated against files already present in `backup_dir`.
pub fn folder_base_filename(backup_dir: &Path, short_name: &str, token: &str) -> String {
    unique_base_filename(backup_dir, &folder_stem(short_name, token), "")
}

/// Two jobs for the same unit started within the same second must not
/// overwrite each other's files, locally or remotely. The timestamp token
/// has one-second resolution, so on collision the stem gets a `-2`, `-3`,
/// ... counter. A candidate collides if either the raw file or its `.zip`
/// already exists in the backup directory.
fn unique_base_filename(backup_dir: &Path, stem: &str, suffix: &str) -> String {
    let candidate = format!("{}{}", stem, suffix);
    if !collides(backup_dir, &candidate) {
        return candidate;
    }
    let mut counter = 2u32;
    loop {
        let candidate = format!("{}-{}{}", stem, counter, suffix);
        if !collides(backup_dir, &candidate) {
            return candidate;
        }
        counter += 1;
    }
}

fn collides(backup_dir: &Path, base_filename: &str) -> bool {
    backup_dir.join(base_filename).exists()
        || backup_dir
            .join(format!("{}{}", base_filename, ARCHIVE_SUFFIX))
            .exists()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::fs::File;

    fn fixed_token() -> String {
        // 2024-03-01 10:00:00 local time
        let at = Local.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        timestamp_token(&at)
    }

    #[test]
    fn test_database_filename_format() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let name = database_base_filename(dir.path(), "orders", &fixed_token());
        assert_eq!(name, "mysqldump_orders-20240301100000.sql");
        Ok(())
    }

    #[test]
    fn test_folder_filename_format() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let name = folder_base_filename(dir.path(), "site", &fixed_token());
        assert_eq!(name, "site-20240301100000");
        Ok(())
    }

    #[test]
    fn test_same_second_collision_gets_counter() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        File::create(dir.path().join("mysqldump_orders-20240301100000.sql"))?;

        let second = database_base_filename(dir.path(), "orders", &fixed_token());
        assert_eq!(second, "mysqldump_orders-20240301100000-2.sql");

        File::create(dir.path().join(&second))?;
        let third = database_base_filename(dir.path(), "orders", &fixed_token());
        assert_eq!(third, "mysqldump_orders-20240301100000-3.sql");
        Ok(())
    }

    #[test]
    fn test_leftover_zip_also_collides() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        // Raw dump already deleted, only the compressed archive remains.
        File::create(dir.path().join("mysqldump_orders-20240301100000.sql.zip"))?;

        let name = database_base_filename(dir.path(), "orders", &fixed_token());
        assert_eq!(name, "mysqldump_orders-20240301100000-2.sql");
        Ok(())
    }

    #[test]
    fn test_folder_collision_on_existing_archive() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        File::create(dir.path().join("site-20240301100000.zip"))?;

        let name = folder_base_filename(dir.path(), "site", &fixed_token());
        assert_eq!(name, "site-20240301100000-2");
        Ok(())
    }
}
