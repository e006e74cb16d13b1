use chrono::Datelike;

use crate::core::persistence::export::metric_exporter_trait::ExportRecord;
use crate::errors::ExportError;

const METRIC_PREFIXES: [&str; 2] = ["compute.googleapis.com/instance/", "agent.googleapis.com/"];

/// `compute.googleapis.com/instance/disk/read_ops_count` -> `disk_read_ops_count`
pub fn metric_title(metric_type: &str) -> String {
    let stripped = METRIC_PREFIXES
        .iter()
        .find_map(|prefix| metric_type.strip_prefix(prefix))
        .unwrap_or(metric_type);
    stripped.replace('/', "_")
}

/// Relative key shared by every sink:
/// `<project>/<YYYY>/<MM>/<DD>/<entity>[/<tag>…]/<localDatetime>[<entity>][<title or unit>].csv`
pub fn object_key(record: &ExportRecord<'_>) -> Result<String, ExportError> {
    let dt = record.local_date_time;

    let mut segments: Vec<String> = vec![
        checked_segment(record.project_id)?.to_string(),
        format!("{:04}", dt.year()),
        format!("{:02}", dt.month()),
        format!("{:02}", dt.day()),
        checked_segment(record.entity_name)?.to_string(),
    ];
    for tag in record.tag_path {
        segments.push(checked_segment(tag)?.to_string());
    }

    let suffix = match record.unit {
        Some(unit) => checked_segment(unit)?.to_string(),
        None => metric_title(record.metric_type),
    };
    segments.push(format!(
        "{}[{}][{}].csv",
        dt.format("%Y-%m-%dT%H:%M:%S"),
        record.entity_name,
        suffix
    ));

    Ok(segments.join("/"))
}

fn checked_segment(segment: &str) -> Result<&str, ExportError> {
    if segment.is_empty() || segment == "." || segment == ".." || segment.contains(['/', '\\']) {
        return Err(ExportError::Sink(format!("unusable path segment `{segment}`")));
    }
    Ok(segment)
}
