//! Line parser for tab-separated device-install records.
//!
//! Field count and coordinates are strict; app ids are lenient, bad tokens
//! are dropped without failing the line.

use snafu::prelude::*;

use crate::error::{
    BadLatitudeSnafu, BadLongitudeSnafu, InvalidEncodingSnafu, MalformedLineSnafu, ParseError,
};
use crate::record::Record;

const FIELD_SEPARATOR: char = '\t';
const APP_SEPARATOR: char = ',';

/// Parses `device_type \t device_id \t lat \t lon \t app,app,...` lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordParser;

impl RecordParser {
    /// Parse raw line bytes (without the trailing `\n`).
    pub fn parse_bytes(&self, line: &[u8]) -> Result<Record, ParseError> {
        let line = std::str::from_utf8(line).ok().context(InvalidEncodingSnafu)?;
        self.parse(line)
    }

    /// Parse one line (without the trailing `\n`).
    pub fn parse(&self, line: &str) -> Result<Record, ParseError> {
        let line = line.strip_suffix('\r').unwrap_or(line);
        let fields: Vec<&str> = line.split(FIELD_SEPARATOR).collect();

        let [device_type, device_id, lat, lon, apps] = fields.as_slice() else {
            return MalformedLineSnafu {
                fields: fields.len(),
            }
            .fail();
        };

        let latitude = parse_coordinate(lat).context(BadLatitudeSnafu { value: *lat })?;
        let longitude = parse_coordinate(lon).context(BadLongitudeSnafu { value: *lon })?;

        Ok(Record {
            device_type: device_type.to_string(),
            device_id: device_id.to_string(),
            latitude,
            longitude,
            app_ids: parse_app_ids(apps),
        })
    }
}

fn parse_coordinate(raw: &str) -> Option<f64> {
    raw.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn parse_app_ids(raw: &str) -> Vec<u32> {
    raw.split(APP_SEPARATOR)
        .filter_map(|token| token.parse::<u32>().ok())
        .collect()
}
