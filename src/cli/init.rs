use anyhow::Result;
use std::path::Path;

const CONFIG_FILE: &str = "wishlist.toml";

pub async fn run(path: &Path) -> Result<()> {
    let config_path = path.join(CONFIG_FILE);
    if config_path.exists() {
        anyhow::bail!("{} already exists", config_path.display());
    }

    std::fs::create_dir_all(path.join("data"))?;
    std::fs::create_dir_all(path.join("data/attachments"))?;

    let config = r#"[server]
host = "127.0.0.1"
port = 8000

[database]
path = "./data/wishlist.db"
pool_size = 10

[attachments]
dir = "./data/attachments"
max_file_size = 5000000

[limits]
max_request_body = 1000000
"#;

    std::fs::write(&config_path, config)?;

    tracing::info!("Created wishlist config at {}", config_path.display());
    tracing::info!("Run 'wishlist migrate' to set up the database");
    tracing::info!("Run 'wishlist serve' to start the server");

    Ok(())
}
