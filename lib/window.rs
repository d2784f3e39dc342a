use chrono::{DateTime, Duration, NaiveTime, SecondsFormat, Utc};

/// Time boundaries for one pipeline run, all aligned to midnight so repeated
/// runs within the same day see the same window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunWindow {
    /// Inclusive lower bound of the aggregation window (`createdon >= start`)
    pub start: DateTime<Utc>,
    /// Exclusive upper bound of the aggregation window (`createdon < end`)
    pub end: DateTime<Utc>,
    /// Identity records with `last_activity` before this are purged
    pub purge_cutoff: DateTime<Utc>,
}

impl RunWindow {
    pub fn from_now(now: DateTime<Utc>, days_to_count: i64, kill_days: i64) -> Self {
        let end = midnight(now);
        let start = midnight(now - Duration::days(days_to_count));
        let purge_cutoff = midnight(now - Duration::days(kill_days));
        Self {
            start,
            end,
            purge_cutoff,
        }
    }

    pub fn start_rfc3339(&self) -> String {
        format_ts(self.start)
    }

    pub fn end_rfc3339(&self) -> String {
        format_ts(self.end)
    }

    pub fn purge_cutoff_rfc3339(&self) -> String {
        format_ts(self.purge_cutoff)
    }
}

fn midnight(at: DateTime<Utc>) -> DateTime<Utc> {
    at.date_naive().and_time(NaiveTime::MIN).and_utc()
}

fn format_ts(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}
