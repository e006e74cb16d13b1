use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};

/// One point as returned by the backend, before alignment.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPoint {
    pub time: DateTime<Utc>,
    pub value: f64,
}

/// One grid bucket. `value` is `None` when nothing was reported for it.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricPoint {
    pub time: DateTime<Utc>,
    pub value: Option<f64>,
}

/// Gap-filled series, strictly ascending, one point per bucket of the window.
#[derive(Debug, Clone)]
pub struct AlignedSeries {
    points: Vec<MetricPoint>,
    offset: FixedOffset,
}

impl AlignedSeries {
    pub(crate) fn new(points: Vec<MetricPoint>, offset: FixedOffset) -> Self {
        Self { points, offset }
    }

    pub fn points(&self) -> &[MetricPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Buckets that carry a value.
    pub fn present_count(&self) -> usize {
        self.points.iter().filter(|p| p.value.is_some()).count()
    }

    /// Display-only local time of a bucket.
    pub fn local_time(&self, point: &MetricPoint) -> NaiveDateTime {
        point.time.with_timezone(&self.offset).naive_local()
    }
}
