pub mod csv_format;
pub mod export_path;
pub mod file_exporter;
pub mod gcs_exporter;
pub mod metric_exporter_trait;

use std::sync::Arc;

use reqwest::Client;

use crate::core::client::auth::TokenSource;
use crate::core::config::app_config::{AppConfig, ExporterKind};
use crate::errors::ExportError;

use file_exporter::FileExporter;
use gcs_exporter::GcsExporter;
use metric_exporter_trait::MetricExporter;

/// Resolves the configured sink once at startup.
pub fn build_exporter(
    config: &AppConfig,
    http: Client,
    tokens: Arc<dyn TokenSource>,
) -> Result<Arc<dyn MetricExporter>, ExportError> {
    match config.exporter_class {
        ExporterKind::File => Ok(Arc::new(FileExporter::new(config.output_dir.clone()))),
        ExporterKind::Gcs => {
            let bucket = config
                .bucket
                .clone()
                .filter(|b| !b.is_empty())
                .ok_or_else(|| ExportError::Config("GCSExporter requires `bucket`".into()))?;
            Ok(Arc::new(GcsExporter::new(
                http,
                tokens,
                bucket,
                config.output_dir.to_string_lossy(),
                config.retry.to_policy(),
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::client::auth::StaticTokenSource;

    #[test]
    fn exporter_kind_is_resolved_from_config() {
        let tokens: Arc<dyn TokenSource> = Arc::new(StaticTokenSource::new("t"));

        let file = AppConfig::from_yaml_str("{}").unwrap();
        let exporter = build_exporter(&file, Client::new(), tokens.clone()).unwrap();
        assert_eq!(exporter.kind(), "FileExporter");

        let gcs = AppConfig::from_yaml_str("exporterClass: GCSExporter\nbucket: b").unwrap();
        let exporter = build_exporter(&gcs, Client::new(), tokens).unwrap();
        assert_eq!(exporter.kind(), "GCSExporter");
    }
}
