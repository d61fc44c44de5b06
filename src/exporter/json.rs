// file: src/exporter/json.rs
// description: json export of stored crawl snapshots

use crate::cache::ContentCache;
use crate::error::Result;
use crate::models::CrawlSnapshot;
use chrono::Utc;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct JsonExporter {
    output_dir: PathBuf,
}

#[derive(Debug, Serialize)]
pub struct ExportManifest {
    pub exported_at: String,
    pub total_items: usize,
    pub files: Vec<String>,
}

impl JsonExporter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Result<Self> {
        let output_dir = output_dir.into();
        fs::create_dir_all(&output_dir)?;
        Ok(Self { output_dir })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Writes `crawl_<date>.json` and returns its path.
    pub fn export_snapshot(&self, snapshot: &CrawlSnapshot, pretty: bool) -> Result<PathBuf> {
        let path = self.output_dir.join(format!("crawl_{}.json", snapshot.date));
        let body = if pretty {
            serde_json::to_vec_pretty(snapshot)?
        } else {
            serde_json::to_vec(snapshot)?
        };
        fs::write(&path, body)?;
        info!(
            "Exported {} items from {} to {}",
            snapshot.item_count,
            snapshot.date,
            path.display()
        );
        Ok(path)
    }

    /// Exports every listed date that has a snapshot, skipping missing
    /// ones, and writes `manifest.json` alongside.
    pub fn export_dates(
        &self,
        cache: &ContentCache,
        dates: &[String],
        pretty: bool,
    ) -> Result<ExportManifest> {
        info!("Starting JSON export to {:?}", self.output_dir);

        let mut manifest = ExportManifest {
            exported_at: Utc::now().to_rfc3339(),
            total_items: 0,
            files: Vec::with_capacity(dates.len()),
        };

        for date in dates {
            let snapshot = match cache.get_snapshot(date) {
                Ok(snapshot) => snapshot,
                Err(e) if e.is_not_found() => {
                    warn!("No snapshot stored for {}, skipping", date);
                    continue;
                }
                Err(e) => return Err(e),
            };
            let path = self.export_snapshot(&snapshot, pretty)?;
            manifest.total_items += snapshot.item_count;
            manifest.files.push(path.display().to_string());
        }

        let manifest_path = self.output_dir.join("manifest.json");
        fs::write(&manifest_path, serde_json::to_vec_pretty(&manifest)?)?;

        info!(
            "Export complete: {} items in {} files",
            manifest.total_items,
            manifest.files.len()
        );
        Ok(manifest)
    }
}
