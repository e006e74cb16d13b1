use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::info;

use crate::core::persistence::export::csv_format::render_csv;
use crate::core::persistence::export::export_path::object_key;
use crate::core::persistence::export::metric_exporter_trait::{ExportRecord, MetricExporter};
use crate::errors::ExportError;

/// Writes CSV files below a local root directory.
pub struct FileExporter {
    root: PathBuf,
}

impl FileExporter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

/// tmp file + rename, so readers never see a half-written CSV.
fn write_atomic(path: &Path, content: &str) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).with_context(|| format!("Failed to create directory {:?}", dir))?;
    }

    let tmp_path = path.with_extension("csv.tmp");
    {
        let file = File::create(&tmp_path)
            .with_context(|| format!("Failed to create temp file {:?}", tmp_path))?;
        let mut writer = BufWriter::new(file);
        writer.write_all(content.as_bytes())?;
        writer.flush()?;
        writer
            .get_ref()
            .sync_all()
            .context("Failed to sync temp export file")?;
    }

    fs::rename(&tmp_path, path).with_context(|| format!("Failed to finalize {:?}", path))?;
    Ok(())
}

#[async_trait]
impl MetricExporter for FileExporter {
    async fn export(&self, record: &ExportRecord<'_>) -> Result<String, ExportError> {
        let path = self.root.join(object_key(record)?);
        let content = render_csv(record.series);

        let target = path.clone();
        tokio::task::spawn_blocking(move || write_atomic(&target, &content))
            .await
            .map_err(|e| ExportError::Sink(format!("export task aborted: {e}")))?
            .map_err(|e| ExportError::Sink(format!("{e:#}")))?;

        let location = path.display().to_string();
        info!(
            project_id = record.project_id,
            metric = record.metric_type,
            instance = record.entity_name,
            points = record.series.len(),
            path = %location,
            "💾 Exported series to file"
        );
        Ok(location)
    }

    fn kind(&self) -> &'static str {
        "FileExporter"
    }
}
