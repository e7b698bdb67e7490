use crate::time::TimeProvider;
use chrono::{TimeZone, Utc};
use std::sync::Arc;
use tracing_subscriber::{fmt::time::FormatTime, EnvFilter};

pub fn ux_ts_to_string(ts: i64) -> String {
    match Utc.timestamp_opt(ts, 0) {
        chrono::LocalResult::Single(dt) => dt.to_rfc3339(),
        _ => format!("invalid ts {}", ts),
    }
}

pub fn parse_datetime_to_utc_timestamp(datetime: &str, fmt: &str) -> Option<i64> {
    chrono::DateTime::parse_from_str(datetime, fmt).map(|dt| dt.timestamp()).ok()
}

/// Start of day (UTC) for the given unix timestamp.
pub fn sod(ts: i64) -> i64 {
    ts - ts.rem_euclid(86_400)
}

struct ProviderTimeFormatter {
    time_provider: Arc<dyn TimeProvider>,
}

impl FormatTime for ProviderTimeFormatter {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", ux_ts_to_string(self.time_provider.now()))
    }
}

/// Initialize tracing. Passing a provider makes log lines carry simulated
/// time instead of wall-clock time, which keeps test output readable.
pub fn start_log(time_provider: Option<Arc<dyn TimeProvider>>) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let result = match time_provider {
        Some(provider) => {
            builder.with_timer(ProviderTimeFormatter { time_provider: provider }).try_init()
        }
        None => builder.try_init(),
    };
    // a second init in the same process is fine, keep the first subscriber
    _ = result;
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn sod_truncates_to_midnight() {
        let ts = parse_datetime_to_utc_timestamp("2024-11-29T17:42:10+00:00", "%Y-%m-%dT%H:%M:%S%z").unwrap();
        let midnight = parse_datetime_to_utc_timestamp("2024-11-29T00:00:00+00:00", "%Y-%m-%dT%H:%M:%S%z").unwrap();
        assert_eq!(sod(ts), midnight);
    }

    #[test]
    fn ts_round_trip() {
        let ts = 1_732_900_000;
        assert_eq!(parse_datetime_to_utc_timestamp(&ux_ts_to_string(ts), "%Y-%m-%dT%H:%M:%S%z"), Some(ts));
    }
}
