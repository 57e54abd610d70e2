//! JSON lines session
//!
//! One request object per input line, one response object per output line.
//! This is the outermost boundary: every error becomes a failure response,
//! internal ones are logged and reported generically.

use std::io::{self, BufRead, Write};

use geo::geometry::Point;
use log::error;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{FleetError, Result};
use crate::reviews::ReviewRequest;
use crate::service::FleetService;
use crate::store::{DeviceIdInput, ReportRequest};

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    Submit(ReportRequest),
    Get {
        device_id: DeviceIdInput,
    },
    List,
    Cleanup,
    Simulate {
        #[serde(default)]
        count: Option<i64>,
        #[serde(default)]
        latitude: Option<f64>,
        #[serde(default)]
        longitude: Option<f64>,
    },
    Stats,
    Health,
    Register {
        #[serde(default)]
        name: String,
        #[serde(default)]
        email: String,
        #[serde(default)]
        password: String,
    },
    Login {
        #[serde(default)]
        email: String,
        #[serde(default)]
        password: String,
    },
    Reviews,
    AddReview(ReviewRequest),
    ReviewSummary,
}

#[derive(Debug, PartialEq, Serialize)]
pub struct Response {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    fn ok(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn failure(err: &FleetError) -> Self {
        let message = if err.is_internal() {
            error!("Request failed: {}", err);
            "Internal server error".to_string()
        } else {
            err.to_string()
        };

        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

/// Parse and run a single request line
pub fn handle_line(service: &FleetService, line: &str) -> Response {
    let outcome = serde_json::from_str::<Request>(line)
        .map_err(|e| FleetError::validation("request", e.to_string()))
        .and_then(|request| dispatch(service, request));

    match outcome {
        Ok(data) => Response::ok(data),
        Err(e) => Response::failure(&e),
    }
}

pub fn dispatch(service: &FleetService, request: Request) -> Result<Value> {
    match request {
        Request::Submit(report) => to_value(service.submit_position(&report)?),
        Request::Get { device_id } => to_value(service.get_position(&device_id.to_id()?)?),
        Request::List => to_value(service.list_positions()?),
        Request::Cleanup => to_value(service.cleanup()?),
        Request::Simulate {
            count,
            latitude,
            longitude,
        } => {
            let center = match (latitude, longitude) {
                (Some(lat), Some(lon)) => Some(Point::new(lon, lat)),
                (None, None) => None,
                _ => {
                    return Err(FleetError::validation(
                        "center",
                        "latitude and longitude go together",
                    ))
                }
            };
            to_value(service.simulate(count, center)?)
        }
        Request::Stats => to_value(service.fleet_stats()?),
        Request::Health => to_value(service.health()?),
        Request::Register {
            name,
            email,
            password,
        } => to_value(service.accounts().register(&name, &email, &password)?),
        Request::Login { email, password } => {
            to_value(service.accounts().login(&email, &password)?)
        }
        Request::Reviews => to_value(service.reviews().list_public()?),
        Request::AddReview(review) => to_value(service.reviews().add(&review)?),
        Request::ReviewSummary => to_value(service.reviews().summary()?),
    }
}

fn to_value<T: Serialize>(data: T) -> Result<Value> {
    serde_json::to_value(data).map_err(|e| FleetError::Internal(e.to_string()))
}

/// Serve requests until the reader is exhausted, returns how many were handled
pub fn run<R, W>(service: &FleetService, reader: R, mut writer: W) -> io::Result<usize>
where
    R: BufRead,
    W: Write,
{
    let mut handled = 0;

    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let response = handle_line(service, &line);
        serde_json::to_writer(&mut writer, &response)?;
        writeln!(writer)?;
        writer.flush()?;

        handled += 1;
    }

    Ok(handled)
}
