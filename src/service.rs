//! Fleet service: the operations exposed to clients
//!
//! Wires the position store, the simulator and the collaborators together.
//! The collaborators keep their own state; only the store holds positions.

use std::sync::Arc;

use geo::geometry::Point;
use log::{debug, info, warn};
use rand::RngCore;
use serde::Serialize;
use time::OffsetDateTime;

use crate::accounts::CredentialStore;
use crate::error::Result;
use crate::generator::simulator::{SimulationConfig, Simulator};
use crate::reviews::ReviewBoard;
use crate::sources::ReportsSource;
use crate::store::{
    CleanupReport, Clock, PositionRecord, PositionStore, ReportRequest, StatsSnapshot,
    CLEANUP_WINDOW, LISTING_RETENTION,
};
use crate::FleetError;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: String,
    pub version: String,
    pub uptime_seconds: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub server_time: OffsetDateTime,
    pub positions: usize,
    pub reviews: usize,
    pub users: usize,
}

/// Fleet stats along with the public review summary
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FleetStats {
    #[serde(flatten)]
    pub fleet: StatsSnapshot,
    pub review_count: usize,
    pub review_average: f64,
}

/// Result of replaying a reports source
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ReplaySummary {
    pub accepted: usize,
    pub rejected: usize,
}

pub struct FleetService {
    store: PositionStore,
    simulator: Simulator,
    accounts: CredentialStore,
    reviews: ReviewBoard,
    simulation: SimulationConfig,
    clock: Arc<dyn Clock>,
    started: OffsetDateTime,
}

impl FleetService {
    pub fn new(simulation: SimulationConfig) -> Self {
        Self::with_parts(PositionStore::new(), Simulator::new(), simulation)
    }

    /// Service around an existing store; collaborators share its clock
    pub fn with_parts(
        store: PositionStore,
        simulator: Simulator,
        simulation: SimulationConfig,
    ) -> Self {
        let clock = store.clock();

        Self {
            accounts: CredentialStore::new(clock.clone()),
            reviews: ReviewBoard::new(clock.clone()),
            started: clock.now(),
            store,
            simulator,
            simulation,
            clock,
        }
    }

    /// Seeded service, handy for deterministic runs
    pub fn seeded(
        clock: Arc<dyn Clock>,
        store_rng: Box<dyn RngCore + Send>,
        simulator_rng: Box<dyn RngCore + Send>,
        simulation: SimulationConfig,
    ) -> Self {
        Self::with_parts(
            PositionStore::with_parts(clock, store_rng),
            Simulator::with_rng(simulator_rng),
            simulation,
        )
    }

    pub fn store(&self) -> &PositionStore {
        &self.store
    }

    pub fn accounts(&self) -> &CredentialStore {
        &self.accounts
    }

    pub fn reviews(&self) -> &ReviewBoard {
        &self.reviews
    }

    pub fn submit_position(&self, request: &ReportRequest) -> Result<PositionRecord> {
        let report = request.validate()?;
        let record = self.store.upsert(report)?;

        info!(
            "Position received: {} at ({}, {})",
            record.device_id, record.latitude, record.longitude
        );

        Ok(record)
    }

    pub fn get_position(&self, device_id: &str) -> Result<PositionRecord> {
        debug!("Lookup of {}", device_id);

        self.store.get(device_id)
    }

    /// Fresh positions; also evicts the stale ones
    pub fn list_positions(&self) -> Result<Vec<PositionRecord>> {
        self.store.list_fresh(LISTING_RETENTION)
    }

    pub fn cleanup(&self) -> Result<CleanupReport> {
        let report = self.store.cleanup_older_than(CLEANUP_WINDOW)?;

        info!(
            "Cleanup removed {} positions, {} remaining",
            report.removed_count, report.remaining_count
        );

        Ok(report)
    }

    /// Missing count or center fall back to the simulation config
    pub fn simulate(&self, count: Option<i64>, center: Option<Point>) -> Result<Vec<PositionRecord>> {
        let count = count.unwrap_or(self.simulation.count);
        let center = center.unwrap_or_else(|| self.simulation.center());

        if !center.x().is_finite() || !center.y().is_finite() {
            return Err(FleetError::validation("center", "must be finite coordinates"));
        }

        self.simulator.simulate(&self.store, count, center)
    }

    pub fn get_stats(&self) -> Result<StatsSnapshot> {
        self.store.compute_stats()
    }

    pub fn fleet_stats(&self) -> Result<FleetStats> {
        let fleet = self.store.compute_stats()?;
        let reviews = self.reviews.summary()?;

        Ok(FleetStats {
            fleet,
            review_count: reviews.count,
            review_average: reviews.average,
        })
    }

    pub fn health(&self) -> Result<HealthReport> {
        let now = self.clock.now();

        Ok(HealthReport {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: (now - self.started).whole_seconds(),
            server_time: now,
            positions: self.store.count()?,
            reviews: self.reviews.summary()?.count,
            users: self.accounts.count()?,
        })
    }

    /// Submit every report of `source`, in order, through the ingest path
    pub fn replay<SU>(&self, source: &mut SU) -> Result<ReplaySummary>
    where
        SU: ReportsSource,
    {
        let mut summary = ReplaySummary::default();

        for request in source.fetch().map_err(FleetError::Source)? {
            match self.submit_position(&request) {
                Ok(_) => summary.accepted += 1,
                Err(e) if e.is_internal() => return Err(e),
                Err(e) => {
                    warn!("Report rejected: {}", e);
                    summary.rejected += 1;
                }
            }
        }

        Ok(summary)
    }
}

impl Default for FleetService {
    fn default() -> Self {
        Self::new(SimulationConfig::default())
    }
}
