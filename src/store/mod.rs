//! Position store API
//!
//! Owns the device -> latest position mapping. Every operation takes the
//! single store lock, reads the clock while holding it and applies its
//! changes before releasing it, so readers never observe half a write.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use serde::Serialize;
use time::{Duration, OffsetDateTime};

use crate::error::{FleetError, Result};
use position::device_key;

pub mod clock;
pub mod position;
pub mod stats;

#[cfg(test)]
mod tests;

pub use clock::{Clock, ManualClock, SystemClock};
pub use position::{DeviceIdInput, NumericInput, PositionRecord, PositionReport, ReportRequest};
pub use stats::{StatsSnapshot, ACTIVE_WINDOW, RECENT_WINDOW};

/// Records older than this are dropped while listing
pub const LISTING_RETENTION: Duration = Duration::hours(2);
/// Records older than this are dropped by an explicit cleanup
pub const CLEANUP_WINDOW: Duration = Duration::hours(1);

/// Outcome of an explicit cleanup
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupReport {
    pub removed_count: usize,
    pub remaining_count: usize,
}

struct Inner {
    records: HashMap<String, PositionRecord>,
    /// Draws the speed/direction a report left out
    rng: Box<dyn RngCore + Send>,
}

impl Inner {
    fn upsert(&mut self, report: PositionReport, now: OffsetDateTime) -> PositionRecord {
        let speed = match report.speed {
            Some(s) => s,
            None => self.rng.gen_range(20.0..100.0),
        };
        let direction = match report.direction {
            Some(d) => d,
            None => self.rng.gen_range(0.0..360.0),
        };

        let record = PositionRecord {
            device_id: device_key(&report.device_id).to_string(),
            latitude: report.coordinates.y(),
            longitude: report.coordinates.x(),
            timestamp: now,
            speed,
            direction,
            simulated: report.simulated,
            route: report.route,
            passengers: report.passengers,
        };

        self.records
            .insert(record.device_id.clone(), record.clone());

        record
    }

    fn remove_older_than(&mut self, max_age: Duration, now: OffsetDateTime) -> usize {
        let before = self.records.len();
        self.records.retain(|_, rec| !rec.is_older_than(max_age, now));
        before - self.records.len()
    }

    fn remove_simulated(&mut self) -> usize {
        let before = self.records.len();
        self.records.retain(|_, rec| !rec.simulated);
        before - self.records.len()
    }
}

pub struct PositionStore {
    inner: Mutex<Inner>,
    clock: Arc<dyn Clock>,
}

impl PositionStore {
    /// Store on the wall clock with an entropy seeded generator
    pub fn new() -> Self {
        Self::with_parts(Arc::new(SystemClock), Box::new(StdRng::from_entropy()))
    }

    pub fn with_parts(clock: Arc<dyn Clock>, rng: Box<dyn RngCore + Send>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                records: HashMap::new(),
                rng,
            }),
            clock,
        }
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| FleetError::Internal("position store lock poisoned".to_string()))
    }

    /// Insert or fully replace the record of `report.device_id`
    pub fn upsert(&self, report: PositionReport) -> Result<PositionRecord> {
        report.validate()?;

        let mut inner = self.lock()?;
        let now = self.clock.now();

        Ok(inner.upsert(report, now))
    }

    pub fn get(&self, device_id: &str) -> Result<PositionRecord> {
        let inner = self.lock()?;

        inner
            .records
            .get(device_key(device_id))
            .cloned()
            .ok_or_else(|| FleetError::NotFound(device_id.to_string()))
    }

    /// Drop every record older than `max_age`, then return the survivors
    /// sorted by device id
    pub fn list_fresh(&self, max_age: Duration) -> Result<Vec<PositionRecord>> {
        let mut inner = self.lock()?;
        let now = self.clock.now();

        let pruned = inner.remove_older_than(max_age, now);
        if pruned > 0 {
            debug!("Pruned {} positions older than {}", pruned, max_age);
        }

        let mut records: Vec<PositionRecord> = inner.records.values().cloned().collect();
        records.sort_by(|a, b| a.device_id.cmp(&b.device_id));

        Ok(records)
    }

    pub fn cleanup_older_than(&self, max_age: Duration) -> Result<CleanupReport> {
        let mut inner = self.lock()?;
        let now = self.clock.now();

        let removed_count = inner.remove_older_than(max_age, now);

        Ok(CleanupReport {
            removed_count,
            remaining_count: inner.records.len(),
        })
    }

    pub fn remove_all_simulated(&self) -> Result<usize> {
        let mut inner = self.lock()?;

        Ok(inner.remove_simulated())
    }

    /// Swap the whole simulated batch for `reports` in one critical section.
    ///
    /// Each report goes through the same validation and stamping as
    /// [`PositionStore::upsert`]; nothing is written if any of them fails.
    pub fn replace_simulated(&self, reports: Vec<PositionReport>) -> Result<Vec<PositionRecord>> {
        for report in &reports {
            report.validate()?;
        }

        let mut inner = self.lock()?;
        let now = self.clock.now();

        inner.remove_simulated();

        Ok(reports
            .into_iter()
            .map(|report| inner.upsert(report, now))
            .collect())
    }

    pub fn count(&self) -> Result<usize> {
        Ok(self.lock()?.records.len())
    }

    pub fn count_simulated(&self) -> Result<usize> {
        Ok(self.lock()?.records.values().filter(|r| r.simulated).count())
    }

    pub fn count_real(&self) -> Result<usize> {
        Ok(self.lock()?.records.values().filter(|r| !r.simulated).count())
    }

    /// Pure read: never evicts
    pub fn compute_stats(&self) -> Result<StatsSnapshot> {
        let inner = self.lock()?;
        let now = self.clock.now();

        Ok(StatsSnapshot::compute(inner.records.values(), now))
    }
}

impl Default for PositionStore {
    fn default() -> Self {
        Self::new()
    }
}
