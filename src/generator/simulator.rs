//! Synthetic bus generator

use std::sync::Mutex;

use geo::geometry::Point;
use log::info;
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use serde::Deserialize;

use crate::error::{FleetError, Result};
use crate::store::{PositionRecord, PositionReport, PositionStore};

/// Max offset, in degrees, from the simulation center on each axis
const SPREAD: f64 = 0.05;
const ROUTES: usize = 3;
/// Largest batch a single simulate call may create
pub const MAX_SIMULATED: i64 = 1000;

/// Defaults used when a simulate request leaves fields out
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub count: i64,
    pub center_lat: f64,
    pub center_lon: f64,
}

impl SimulationConfig {
    pub fn center(&self) -> Point {
        Point::new(self.center_lon, self.center_lat)
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            count: 5,
            center_lat: 33.88,
            center_lon: 10.1,
        }
    }
}

pub struct Simulator {
    rng: Mutex<Box<dyn RngCore + Send>>,
}

impl Simulator {
    pub fn new() -> Self {
        Self::with_rng(Box::new(StdRng::from_entropy()))
    }

    pub fn with_rng(rng: Box<dyn RngCore + Send>) -> Self {
        Self {
            rng: Mutex::new(rng),
        }
    }

    /// Build `count` simulated reports scattered around `center`
    pub fn generate(&self, count: usize, center: Point) -> Result<Vec<PositionReport>> {
        let mut rng = self
            .rng
            .lock()
            .map_err(|_| FleetError::Internal("simulator lock poisoned".to_string()))?;

        let reports = (1..=count)
            .map(|i| {
                let lat = center.y() + rng.gen_range(-SPREAD..SPREAD);
                let lon = center.x() + rng.gen_range(-SPREAD..SPREAD);

                PositionReport::basic(format!("bus_{:03}", i), Point::new(lon, lat))
                    .speed(rng.gen_range(20.0..80.0))
                    .direction(rng.gen_range(0.0..360.0))
                    .simulated(format!("Line {}", i % ROUTES + 1), rng.gen_range(0..50))
            })
            .collect();

        Ok(reports)
    }

    /// Replace the previous simulated batch with `count` new buses
    pub fn simulate(
        &self,
        store: &PositionStore,
        count: i64,
        center: Point,
    ) -> Result<Vec<PositionRecord>> {
        if count <= 0 {
            return Err(FleetError::validation("count", "must be a positive integer"));
        }
        if count > MAX_SIMULATED {
            return Err(FleetError::validation(
                "count",
                format!("at most {} buses per simulation", MAX_SIMULATED),
            ));
        }
        let count = usize::try_from(count)
            .map_err(|_| FleetError::validation("count", "too large"))?;

        let reports = self.generate(count, center)?;
        let records = store.replace_simulated(reports)?;

        info!(
            "Simulated {} buses around ({}, {})",
            records.len(),
            center.y(),
            center.x()
        );

        Ok(records)
    }
}

impl Default for Simulator {
    fn default() -> Self {
        Self::new()
    }
}
