//! Wire types of `projects.timeSeries.list`.

use std::collections::HashMap;

use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListTimeSeriesResponse {
    #[serde(default)]
    pub time_series: Vec<TimeSeriesDto>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSeriesDto {
    #[serde(default)]
    pub metric: MetricDto,
    /// Newest first.
    #[serde(default)]
    pub points: Vec<PointDto>,
}

impl TimeSeriesDto {
    pub fn metric_label(&self, key: &str) -> Option<&str> {
        self.metric.labels.get(key).map(String::as_str)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetricDto {
    #[serde(rename = "type", default)]
    pub metric_type: String,
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PointDto {
    pub interval: TimeIntervalDto,
    pub value: TypedValueDto,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeIntervalDto {
    #[serde(default)]
    pub start_time: Option<String>,
    pub end_time: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypedValueDto {
    #[serde(default)]
    pub double_value: Option<f64>,
    /// int64 travels as a JSON string.
    #[serde(default)]
    pub int64_value: Option<String>,
    #[serde(default)]
    pub bool_value: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_view_response() {
        let body = r#"{
            "timeSeries": [{
                "metric": {
                    "type": "compute.googleapis.com/instance/disk/write_ops_count",
                    "labels": {"instance_name": "vm-a", "device_name": "sdb"}
                },
                "resource": {"type": "gce_instance", "labels": {"zone": "asia-east1-a"}},
                "metricKind": "GAUGE",
                "valueType": "DOUBLE",
                "points": [
                    {"interval": {"startTime": "2024-03-14T15:59:00Z", "endTime": "2024-03-14T16:00:00Z"},
                     "value": {"doubleValue": 0.25}},
                    {"interval": {"endTime": "2024-03-14T15:59:00Z"},
                     "value": {"int64Value": "7"}}
                ]
            }],
            "nextPageToken": "abc"
        }"#;

        let parsed: ListTimeSeriesResponse = serde_json::from_str(body).unwrap();
        let series = &parsed.time_series[0];

        assert_eq!(parsed.next_page_token.as_deref(), Some("abc"));
        assert_eq!(series.metric_label("device_name"), Some("sdb"));
        assert_eq!(series.points[0].value.double_value, Some(0.25));
        assert_eq!(series.points[1].interval.start_time, None);
        assert_eq!(series.points[1].value.int64_value.as_deref(), Some("7"));
    }

    #[test]
    fn empty_response_has_no_series() {
        let parsed: ListTimeSeriesResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.time_series.is_empty());
        assert!(parsed.next_page_token.is_none());
    }
}
