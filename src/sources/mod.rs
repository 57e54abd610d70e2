//! Reports sources API

use serde::Deserialize;

use crate::ReportRequest;

/// Reports source
pub trait ReportsSource {
    /// Fetch the raw reports, in the order they were received
    fn fetch(&mut self) -> Result<Vec<ReportRequest>, String>;
}

/// Column names of a reports source
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct FieldsConfiguration {
    pub device_id: String,
    /// Single cell holding "lng, lat"
    pub coordinates: String,
    pub speed: String,
    pub direction: String,
    /// Cell holds "lat, lng" instead
    pub flip_coordinates: bool,
}

impl Default for FieldsConfiguration {
    fn default() -> Self {
        Self {
            device_id: "device".to_string(),
            coordinates: "coordinates".to_string(),
            speed: "speed".to_string(),
            direction: "direction".to_string(),
            flip_coordinates: false,
        }
    }
}

impl FieldsConfiguration {
    pub fn device(mut self, name: &str) -> Self {
        self.device_id = name.to_lowercase();
        self
    }

    pub fn coordinates(mut self, name: &str) -> Self {
        self.coordinates = name.to_lowercase();
        self
    }

    pub fn speed(mut self, name: &str) -> Self {
        self.speed = name.to_lowercase();
        self
    }

    pub fn direction(mut self, name: &str) -> Self {
        self.direction = name.to_lowercase();
        self
    }

    pub fn flip(mut self) -> Self {
        self.flip_coordinates = true;
        self
    }
}

#[cfg(feature = "csv")]
mod csv_file;

#[cfg(feature = "csv")]
pub use csv_file::CsvSource;
