use crate::{web, Config, Database};
use anyhow::Result;
use std::path::Path;

pub async fn run(config_path: &Path, host: Option<String>, port: Option<u16>) -> Result<()> {
    let mut config = Config::load_or_default(config_path)?;
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    let db = Database::open(&config.database.path, config.database.pool_size)?;
    db.migrate()?;

    let addr = config.bind_addr();
    tracing::info!(
        attachments = %config.attachments.root().display(),
        max_file_size = config.attachments.max_file_size,
        "Starting server at http://{}",
        addr
    );

    web::serve(config, db, &addr).await?;

    Ok(())
}
