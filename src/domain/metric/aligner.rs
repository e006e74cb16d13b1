use chrono::Duration;
use tracing::trace;

use crate::domain::metric::aligned_series::{AlignedSeries, MetricPoint, RawPoint};
use crate::domain::metric::time_window::TimeWindow;

/// Backend samples once per minute.
pub const DEFAULT_BUCKET_PERIOD_SECS: i64 = 60;

/// Number of grid buckets covering the window (`duration / period`).
pub fn bucket_count(window: &TimeWindow, period: Duration) -> usize {
    let period_secs = period.num_seconds();
    if period_secs <= 0 {
        return 0;
    }
    let total = window.duration().num_seconds();
    ((total + period_secs - 1) / period_secs) as usize
}

/// Re-samples newest-first raw points onto the ascending grid of `window`.
///
/// A bucket whose timestamp has no raw point with the exact same timestamp
/// becomes a gap. Raw points older than the bucket being filled can never
/// match anymore and are skipped; out-of-order points are dropped the same way.
pub fn align_series(raw: &[RawPoint], window: &TimeWindow, period: Duration) -> AlignedSeries {
    let mut points = Vec::with_capacity(bucket_count(window, period));
    if period <= Duration::zero() {
        return AlignedSeries::new(points, window.offset());
    }

    // raw is newest-first, the grid walks oldest-first
    let mut cursor = raw.iter().rev().peekable();
    let mut t = window.start();

    while t < window.end() {
        while let Some(stale) = cursor.next_if(|p| p.time < t) {
            trace!(time = %stale.time, "dropping raw point behind the grid cursor");
        }

        let value = cursor.next_if(|p| p.time == t).map(|p| p.value);
        points.push(MetricPoint { time: t, value });
        t += period;
    }

    AlignedSeries::new(points, window.offset())
}
