//! Fleet level metrics over a store snapshot

use serde::Serialize;
use time::{Duration, OffsetDateTime};

use super::position::PositionRecord;

/// Age up to which a bus counts as active
pub const ACTIVE_WINDOW: Duration = Duration::minutes(5);
/// Age up to which a bus counts as recent
pub const RECENT_WINDOW: Duration = Duration::hours(1);

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub total_buses: usize,
    pub active_buses: usize,
    pub recent_buses: usize,
    pub simulated_buses: usize,
    pub real_buses: usize,
    /// Newest timestamp in the store, `None` when empty
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_update: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub server_time: OffsetDateTime,
}

impl StatsSnapshot {
    /// Single pass over the records, all ages measured against `now`
    pub(crate) fn compute<'a, I>(records: I, now: OffsetDateTime) -> Self
    where
        I: IntoIterator<Item = &'a PositionRecord>,
    {
        let mut stats = Self {
            total_buses: 0,
            active_buses: 0,
            recent_buses: 0,
            simulated_buses: 0,
            real_buses: 0,
            last_update: None,
            server_time: now,
        };

        for rec in records {
            stats.total_buses += 1;

            if !rec.is_older_than(ACTIVE_WINDOW, now) {
                stats.active_buses += 1;
            }
            if !rec.is_older_than(RECENT_WINDOW, now) {
                stats.recent_buses += 1;
            }

            if rec.simulated {
                stats.simulated_buses += 1;
            } else {
                stats.real_buses += 1;
            }

            stats.last_update = match stats.last_update {
                Some(last) if last >= rec.timestamp => Some(last),
                _ => Some(rec.timestamp),
            };
        }

        stats
    }
}
