//! Recover command implementation.

use super::App;
use crate::error::CliResult;
use std::path::Path;

/// Restores interrupted transactions and reports what was restored.
pub fn run(config_path: &Path) -> CliResult<()> {
    let app = App::load(config_path)?;
    let restored = app.recover()?;
    if restored.is_empty() {
        println!("No interrupted transactions found");
    } else {
        for path in restored {
            println!("Restored {}", path.display());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::tests::write_config;
    use edusync_storage::backup_path;
    use tempfile::TempDir;

    #[test]
    fn restores_orphaned_backup() {
        let dir = TempDir::new().unwrap();
        let config = write_config(&dir, "{}");
        let data = dir.path().join("data");
        std::fs::create_dir_all(&data).unwrap();
        let tasks = data.join("tasks.csv");
        std::fs::write(&tasks, "half written").unwrap();
        std::fs::write(backup_path(&tasks), "id\n").unwrap();

        run(&config).unwrap();

        assert_eq!(std::fs::read_to_string(&tasks).unwrap(), "id\n");
        assert!(!backup_path(&tasks).exists());
    }
}
