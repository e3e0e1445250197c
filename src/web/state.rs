use crate::services::upload::UploadGuard;
use crate::{Config, Database};
use anyhow::Result;

pub struct AppState {
    pub config: Config,
    pub db: Database,
    pub uploads: UploadGuard,
}

impl AppState {
    pub fn new(config: Config, db: Database) -> Result<Self> {
        config.validate()?;

        let uploads = UploadGuard::new(
            config.attachments.root(),
            config.attachments.max_file_size,
        );

        Ok(Self {
            config,
            db,
            uploads,
        })
    }
}
