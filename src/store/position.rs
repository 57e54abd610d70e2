//! Position definitions

use geo::geometry::Point;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::{Duration, OffsetDateTime};

use crate::error::{FleetError, Result};

/// Latest known state of a device, as held by the store
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PositionRecord {
    pub device_id: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Stamped by the store on every write
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub speed: f64,
    pub direction: f64,
    pub simulated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passengers: Option<u32>,
}

impl PositionRecord {
    pub fn coordinates(&self) -> Point {
        Point::new(self.longitude, self.latitude)
    }

    pub fn age(&self, now: OffsetDateTime) -> Duration {
        now - self.timestamp
    }

    /// True when the record aged past `max_age` at `now`
    pub fn is_older_than(&self, max_age: Duration, now: OffsetDateTime) -> bool {
        self.age(now) > max_age
    }
}

/// Validated report, ready to be written by the store
#[derive(Clone, Debug, PartialEq)]
pub struct PositionReport {
    pub device_id: String,
    pub coordinates: Point,
    pub speed: Option<f64>,
    pub direction: Option<f64>,
    pub simulated: bool,
    pub route: Option<String>,
    pub passengers: Option<u32>,
}

impl PositionReport {
    pub fn basic(device_id: String, coordinates: Point) -> Self {
        Self {
            device_id,
            coordinates,
            speed: None,
            direction: None,
            simulated: false,
            route: None,
            passengers: None,
        }
    }

    pub fn speed(mut self, speed: f64) -> Self {
        self.speed = Some(speed);
        self
    }

    pub fn direction(mut self, direction: f64) -> Self {
        self.direction = Some(direction);
        self
    }

    pub fn simulated(mut self, route: String, passengers: u32) -> Self {
        self.simulated = true;
        self.route = Some(route);
        self.passengers = Some(passengers);
        self
    }

    /// Checks the invariants the store relies on
    pub fn validate(&self) -> Result<()> {
        if device_key(&self.device_id).is_empty() {
            return Err(FleetError::missing("device_id"));
        }
        if !self.coordinates.y().is_finite() {
            return Err(FleetError::validation("latitude", "must be a finite number"));
        }
        if !self.coordinates.x().is_finite() {
            return Err(FleetError::validation("longitude", "must be a finite number"));
        }
        if matches!(self.speed, Some(s) if !s.is_finite()) {
            return Err(FleetError::validation("speed", "must be a finite number"));
        }
        if matches!(self.direction, Some(d) if !d.is_finite()) {
            return Err(FleetError::validation("direction", "must be a finite number"));
        }

        Ok(())
    }
}

/// Number as sent by a client: a JSON number or a numeric string
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NumericInput {
    Number(f64),
    Text(String),
    /// Any other JSON value, rejected on parse so the error names the field
    Other(Value),
}

impl NumericInput {
    /// Parse into a finite number, `None` when the text is blank
    pub fn parse(&self, field: &'static str) -> Result<Option<f64>> {
        let value = match self {
            NumericInput::Number(n) => *n,
            NumericInput::Text(s) if s.trim().is_empty() => return Ok(None),
            NumericInput::Text(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|e| FleetError::validation(field, format!("not a number: {}", e)))?,
            NumericInput::Other(_) => return Err(FleetError::validation(field, "not a number")),
        };

        if !value.is_finite() {
            return Err(FleetError::validation(field, "must be a finite number"));
        }

        Ok(Some(value))
    }
}

impl From<f64> for NumericInput {
    fn from(value: f64) -> Self {
        NumericInput::Number(value)
    }
}

impl From<&str> for NumericInput {
    fn from(value: &str) -> Self {
        NumericInput::Text(value.to_string())
    }
}

/// Device id as sent by a client
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DeviceIdInput {
    Text(String),
    Integer(i64),
    Other(Value),
}

impl DeviceIdInput {
    pub(crate) fn to_id(&self) -> Result<String> {
        match self {
            DeviceIdInput::Text(s) => Ok(s.clone()),
            DeviceIdInput::Integer(n) => Ok(n.to_string()),
            DeviceIdInput::Other(_) => Err(FleetError::validation(
                "device_id",
                "must be a string or an integer",
            )),
        }
    }
}

/// Key a device id is stored and looked up under
pub(crate) fn device_key(device_id: &str) -> &str {
    device_id.trim()
}

/// Raw device report, before validation
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportRequest {
    #[serde(default)]
    pub device_id: Option<DeviceIdInput>,
    #[serde(default)]
    pub latitude: Option<NumericInput>,
    #[serde(default)]
    pub longitude: Option<NumericInput>,
    #[serde(default)]
    pub speed: Option<NumericInput>,
    #[serde(default)]
    pub direction: Option<NumericInput>,
}

impl ReportRequest {
    pub fn new(
        device_id: &str,
        latitude: impl Into<NumericInput>,
        longitude: impl Into<NumericInput>,
    ) -> Self {
        Self {
            device_id: Some(DeviceIdInput::Text(device_id.to_string())),
            latitude: Some(latitude.into()),
            longitude: Some(longitude.into()),
            speed: None,
            direction: None,
        }
    }

    /// Convert into a typed report, failing on the first bad field
    pub fn validate(&self) -> Result<PositionReport> {
        let device_id = match &self.device_id {
            Some(id) => id.to_id()?,
            None => String::new(),
        };
        if device_key(&device_id).is_empty() {
            return Err(FleetError::missing("device_id"));
        }

        let latitude = required(&self.latitude, "latitude")?;
        let longitude = required(&self.longitude, "longitude")?;
        let speed = optional(&self.speed, "speed")?;
        let direction = optional(&self.direction, "direction")?;

        let mut report = PositionReport::basic(device_id, Point::new(longitude, latitude));
        report.speed = speed;
        report.direction = direction;

        Ok(report)
    }
}

fn required(input: &Option<NumericInput>, field: &'static str) -> Result<f64> {
    optional(input, field)?.ok_or_else(|| FleetError::missing(field))
}

fn optional(input: &Option<NumericInput>, field: &'static str) -> Result<Option<f64>> {
    match input {
        Some(n) => n.parse(field),
        None => Ok(None),
    }
}
