use crate::cli::MigrateCommand;
use crate::{Config, Database};
use anyhow::Result;
use std::path::Path;

pub async fn run(config_path: &Path, command: Option<MigrateCommand>) -> Result<()> {
    let config = Config::load_or_default(config_path)?;
    let db = Database::open(&config.database.path, config.database.pool_size)?;

    match command {
        None => {
            db.migrate()?;
            tracing::info!("Migrations complete");
        }
        Some(MigrateCommand::Status) => show_status(&db)?,
    }

    Ok(())
}

fn show_status(db: &Database) -> Result<()> {
    let statuses = db.migration_status()?;

    println!("\n  {:<10} {}", "Version", "Applied");
    println!("  {}", "-".repeat(40));
    for (version, applied_at) in &statuses {
        let applied = applied_at.as_deref().unwrap_or("pending");
        println!("  {:<10} {}", format!("{:03}", version), applied);
    }

    let pending = statuses.iter().filter(|(_, at)| at.is_none()).count();
    println!();
    if pending > 0 {
        println!("  {} pending. Run `wishlist migrate` to apply.", pending);
    } else {
        println!("  All {} migrations applied.", statuses.len());
    }
    println!();

    Ok(())
}
