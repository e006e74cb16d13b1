use std::fmt::Write as _;

use crate::domain::metric::aligned_series::AlignedSeries;

pub const CSV_HEADER: &str = "timestamp,datetime,value";

/// Header plus one `<unixSeconds>,<local datetime>,<value>` row per bucket.
/// Both columns carry the shifted local time; gaps leave the value empty.
pub fn render_csv(series: &AlignedSeries) -> String {
    // ~40 bytes per row
    let mut out = String::with_capacity(CSV_HEADER.len() + 1 + series.len() * 40);
    out.push_str(CSV_HEADER);
    out.push('\n');

    for point in series.points() {
        let local = series.local_time(point);
        let epoch = local.and_utc().timestamp();
        let display = local.format("%Y-%m-%d %H:%M:%S");
        let _ = match point.value {
            Some(v) => writeln!(out, "{epoch},{display},{v}"),
            None => writeln!(out, "{epoch},{display},"),
        };
    }

    out
}
