// file: src/database/client.rs
// description: sled database handle shared by every ledger
// reference: https://docs.rs/sled

use crate::database::schema::ALL_TREES;
use crate::error::{PipelineError, Result};
use std::path::Path;
use tracing::{debug, info};

/// Cheap to clone; all clones share the same underlying database.
#[derive(Clone)]
pub struct Store {
    db: sled::Db,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                PipelineError::Config(format!(
                    "Failed to create database directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        info!("Opening store at {}", path.display());
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// In-memory database removed on drop, for tests and dry runs.
    pub fn temporary() -> Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: sled::Db) -> Result<Self> {
        for name in ALL_TREES {
            db.open_tree(name)?;
        }
        debug!("Store ready with {} trees", ALL_TREES.len());
        Ok(Self { db })
    }

    pub fn tree(&self, name: &str) -> Result<sled::Tree> {
        Ok(self.db.open_tree(name)?)
    }

    pub async fn flush(&self) -> Result<usize> {
        Ok(self.db.flush_async().await?)
    }

    pub fn size_on_disk(&self) -> Result<u64> {
        Ok(self.db.size_on_disk()?)
    }
}
