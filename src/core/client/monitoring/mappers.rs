use chrono::{DateTime, Utc};
use tracing::warn;

use crate::core::client::monitoring::time_series_dto::{PointDto, TypedValueDto};
use crate::domain::metric::aligned_series::RawPoint;

/// Maps backend points to raw points, keeping backend (newest-first) order.
///
/// Points are keyed by their interval start; gauge points may omit it, in
/// which case the end time is used. Unparseable points are dropped.
pub fn map_points_to_raw(points: &[PointDto]) -> Vec<RawPoint> {
    points
        .iter()
        .filter_map(|p| {
            let stamp = p.interval.start_time.as_deref().unwrap_or(&p.interval.end_time);
            let time = match DateTime::parse_from_rfc3339(stamp) {
                Ok(t) => t.with_timezone(&Utc),
                Err(e) => {
                    warn!(timestamp = stamp, error = %e, "Skipping point with invalid timestamp");
                    return None;
                }
            };

            match typed_value_as_f64(&p.value) {
                Some(value) => Some(RawPoint { time, value }),
                None => {
                    warn!(timestamp = stamp, "Skipping point that is neither double nor int64");
                    None
                }
            }
        })
        .collect()
}

fn typed_value_as_f64(value: &TypedValueDto) -> Option<f64> {
    value
        .double_value
        .or_else(|| value.int64_value.as_deref().and_then(|s| s.parse::<i64>().ok()).map(|v| v as f64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::client::monitoring::time_series_dto::TimeIntervalDto;

    fn point(start: Option<&str>, end: &str, value: TypedValueDto) -> PointDto {
        PointDto {
            interval: TimeIntervalDto {
                start_time: start.map(str::to_string),
                end_time: end.to_string(),
            },
            value,
        }
    }

    #[test]
    fn keeps_order_and_uses_interval_start() {
        let points = vec![
            point(
                Some("2024-03-14T15:59:00Z"),
                "2024-03-14T16:00:00Z",
                TypedValueDto { double_value: Some(2.0), ..Default::default() },
            ),
            point(
                None,
                "2024-03-14T15:58:00Z",
                TypedValueDto { int64_value: Some("3".into()), ..Default::default() },
            ),
        ];

        let raw = map_points_to_raw(&points);

        assert_eq!(raw.len(), 2);
        assert_eq!(raw[0].time.to_rfc3339(), "2024-03-14T15:59:00+00:00");
        assert_eq!(raw[0].value, 2.0);
        assert_eq!(raw[1].time.to_rfc3339(), "2024-03-14T15:58:00+00:00");
        assert_eq!(raw[1].value, 3.0);
    }

    #[test]
    fn drops_unusable_points() {
        let points = vec![
            point(Some("not-a-time"), "x", TypedValueDto { double_value: Some(1.0), ..Default::default() }),
            point(None, "2024-03-14T15:58:00Z", TypedValueDto::default()),
            point(
                None,
                "2024-03-14T15:57:00Z",
                TypedValueDto { bool_value: Some(true), ..Default::default() },
            ),
        ];

        assert!(map_points_to_raw(&points).is_empty());
    }
}
