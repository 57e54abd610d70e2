//! CSV file source integration

use std::io::Read;

use csv::{Reader, StringRecord};

use super::{FieldsConfiguration, ReportsSource};
use crate::{DeviceIdInput, NumericInput, ReportRequest};

/// CSV reports source
pub struct CsvSource<T>
where
    T: Read,
{
    rdr: Reader<T>,
    fields: FieldsConfiguration,
}

impl<T> CsvSource<T>
where
    T: Read,
{
    pub fn new(rdr: Reader<T>, fields: Option<FieldsConfiguration>) -> Self {
        Self {
            rdr,
            fields: fields.unwrap_or_default(),
        }
    }
}

impl<T> ReportsSource for CsvSource<T>
where
    T: Read,
{
    fn fetch(&mut self) -> Result<Vec<ReportRequest>, String> {
        let mut reports = vec![];

        let mut header = self
            .rdr
            .headers()
            .map_err(|e| format!("Failed on read the header: {}", e))?
            .clone();
        let header_idx = parse_header(&self.fields, &mut header)?;

        for row in self.rdr.records() {
            let mut rec = row.map_err(|e| format!("Failed on read some row: {}", e))?;

            if rec.len() < 2 {
                continue;
            }

            if let Some(report) = parse_row(&header_idx, &self.fields, &mut rec) {
                reports.push(report);
            }
        }

        Ok(reports)
    }
}

/// Field to index map
#[derive(Debug)]
struct FieldsIndex {
    device: usize,
    coordinates: usize,
    speed: Option<usize>,
    direction: Option<usize>,
}

fn parse_header(
    fields: &FieldsConfiguration,
    header: &mut StringRecord,
) -> Result<FieldsIndex, String> {
    header.trim();

    let find = |name: &str| {
        let name = name.to_lowercase();
        header.iter().position(|h| h.to_lowercase() == name)
    };

    let device = find(&fields.device_id).ok_or("Device header not found")?;
    let coordinates = find(&fields.coordinates).ok_or("Coordinates header not found")?;

    Ok(FieldsIndex {
        device,
        coordinates,
        speed: find(&fields.speed),
        direction: find(&fields.direction),
    })
}

/// Rows without a two part coordinates cell are skipped; field values are
/// left raw so the ingest path can validate them
fn parse_row(
    header: &FieldsIndex,
    fields: &FieldsConfiguration,
    row: &mut StringRecord,
) -> Option<ReportRequest> {
    row.trim();

    let device_id = row.get(header.device)?.to_string();

    let raw_coordinates = row.get(header.coordinates)?;
    let separator = match raw_coordinates {
        s if s.contains(',') => ",",
        s if s.contains(';') => ";",
        _ => " ",
    };
    let parts: Vec<&str> = raw_coordinates
        .split(separator)
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();
    if parts.len() != 2 {
        return None;
    }

    let (ilat, ilng) = if fields.flip_coordinates { (0, 1) } else { (1, 0) };

    let optional = |idx: Option<usize>| {
        idx.and_then(|i| row.get(i))
            .filter(|d| !d.is_empty())
            .map(NumericInput::from)
    };

    Some(ReportRequest {
        device_id: Some(DeviceIdInput::Text(device_id)),
        latitude: Some(NumericInput::from(parts[ilat])),
        longitude: Some(NumericInput::from(parts[ilng])),
        speed: optional(header.speed),
        direction: optional(header.direction),
    })
}
