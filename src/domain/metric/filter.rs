//! Monitoring filter expressions for discovery and per-entity retrieval.

use crate::errors::ExportError;

pub const INSTANCE_NAME_KEY: &str = "instance_name";
pub const DEVICE_NAME_KEY: &str = "device_name";

/// Rejects values that would break out of the quoted filter literal.
pub fn validate_label_value(value: &str) -> Result<&str, ExportError> {
    if value.contains('"') {
        return Err(ExportError::InvalidLabelValue(value.to_string()));
    }
    Ok(value)
}

/// `metric.type="<metric>"`, used to enumerate entities.
pub fn make_discovery_filter(metric_type: &str) -> Result<String, ExportError> {
    Ok(format!(r#"metric.type="{}""#, validate_label_value(metric_type)?))
}

pub fn make_instance_filter(metric_type: &str, instance_name: &str) -> Result<String, ExportError> {
    Ok(format!(
        r#"{} AND metric.labels.{}="{}""#,
        make_discovery_filter(metric_type)?,
        INSTANCE_NAME_KEY,
        validate_label_value(instance_name)?
    ))
}

pub fn make_disk_filter(
    metric_type: &str,
    instance_name: &str,
    device_name: &str,
) -> Result<String, ExportError> {
    Ok(format!(
        r#"{} AND metric.labels.{}="{}""#,
        make_instance_filter(metric_type, instance_name)?,
        DEVICE_NAME_KEY,
        validate_label_value(device_name)?
    ))
}

/// Agent series carry no `instance_name` label and report one series per
/// memory state, so the instance is matched on its system name and the state
/// is pinned to `used`.
pub fn make_agent_memory_filter(
    metric_type: &str,
    instance_name: &str,
) -> Result<String, ExportError> {
    Ok(format!(
        r#"{} AND metric.labels.state="used" AND metadata.system_labels.name="{}""#,
        make_discovery_filter(metric_type)?,
        validate_label_value(instance_name)?
    ))
}

/// Appends configured fragments verbatim, in order.
pub fn with_and_filters(base: String, and_filters: &[String]) -> String {
    and_filters
        .iter()
        .map(|f| f.trim())
        .filter(|f| !f.is_empty())
        .fold(base, |acc, f| format!("{acc} AND {f}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const CPU: &str = "compute.googleapis.com/instance/cpu/usage_time";
    const DISK: &str = "compute.googleapis.com/instance/disk/write_ops_count";

    #[test]
    fn instance_filter_shape() {
        assert_eq!(
            make_instance_filter(CPU, "vm-a").unwrap(),
            r#"metric.type="compute.googleapis.com/instance/cpu/usage_time" AND metric.labels.instance_name="vm-a""#
        );
    }

    #[test]
    fn builders_are_deterministic() {
        assert_eq!(
            make_instance_filter(CPU, "vm-a").unwrap(),
            make_instance_filter(CPU, "vm-a").unwrap()
        );
        assert_eq!(
            make_disk_filter(DISK, "vm-a", "sdb").unwrap(),
            make_disk_filter(DISK, "vm-a", "sdb").unwrap()
        );
    }

    #[test]
    fn disk_filter_extends_instance_filter() {
        let instance = make_instance_filter(DISK, "vm-a").unwrap();
        let disk = make_disk_filter(DISK, "vm-a", "sdb").unwrap();

        assert!(disk.starts_with(&instance));
        assert_eq!(&disk[instance.len()..], r#" AND metric.labels.device_name="sdb""#);
    }

    #[test]
    fn discovery_filter_only_names_the_metric() {
        assert_eq!(make_discovery_filter(CPU).unwrap(), format!(r#"metric.type="{CPU}""#));
    }

    #[test]
    fn agent_filter_pins_state_and_instance() {
        let f = make_agent_memory_filter("agent.googleapis.com/memory/bytes_used", "vm-a").unwrap();
        assert!(f.contains(r#"metric.labels.state="used""#));
        assert!(f.ends_with(r#"metadata.system_labels.name="vm-a""#));
    }

    #[test]
    fn and_filters_are_appended_in_order() {
        let base = make_discovery_filter(CPU).unwrap();
        let f = with_and_filters(
            base.clone(),
            &[r#"resource.label.zone="a""#.to_string(), " ".to_string(), "x=1".to_string()],
        );
        assert_eq!(f, format!(r#"{base} AND resource.label.zone="a" AND x=1"#));
    }

    #[test]
    fn quoted_values_are_rejected() {
        assert!(matches!(
            make_instance_filter(CPU, r#"vm" OR metric.type="x"#),
            Err(ExportError::InvalidLabelValue(_))
        ));
        assert!(make_disk_filter(DISK, "vm-a", "sd\"b").is_err());
    }
}
