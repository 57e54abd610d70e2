//! bustrack - live bus positions, fleet stats and synthetic load

pub mod accounts;
mod error;
pub mod generator;
pub mod reviews;
pub mod service;
pub mod session;
pub mod sources;
pub mod store;

pub use error::{FleetError, Result};
pub use generator::gpx::GpxGenerator;
pub use generator::simulator::{SimulationConfig, Simulator};
pub use service::{FleetService, FleetStats, HealthReport, ReplaySummary};
pub use sources::{FieldsConfiguration, ReportsSource};
pub use store::{
    CleanupReport, DeviceIdInput, NumericInput, PositionRecord, PositionReport, PositionStore,
    ReportRequest, StatsSnapshot,
};
