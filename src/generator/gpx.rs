//! GPX export of the fleet snapshot

use gpx::{Gpx, GpxVersion, Waypoint};

use crate::store::PositionRecord;

pub struct GpxGenerator {
    pub waypoints: Vec<Waypoint>,
}

impl GpxGenerator {
    pub fn empty() -> Self {
        Self { waypoints: vec![] }
    }

    /// One waypoint per bus, at its latest position
    pub fn from_records(records: &[PositionRecord]) -> Self {
        Self {
            waypoints: records.iter().map(waypoint).collect(),
        }
    }

    pub fn generate(self) -> Gpx {
        let mut gpx: Gpx = Default::default();
        gpx.version = GpxVersion::Gpx11;
        gpx.creator = Some("bustrack".to_string());
        gpx.waypoints = self.waypoints;

        gpx
    }
}

fn waypoint(rec: &PositionRecord) -> Waypoint {
    let mut wp = Waypoint::new(rec.coordinates());

    wp.name = Some(rec.device_id.clone());
    wp.time = Some(rec.timestamp.into());
    wp.speed = Some(rec.speed);
    wp.description = rec.route.clone();
    if rec.simulated {
        wp.comment = Some("simulated".to_string());
    }

    wp
}
