//! Turns one IGC file into index-aligned fix sequences.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::enl::{self, EnlColumnSpec};
use crate::record::{self, FixRecord, IgcHeader, IgcRecord};
use crate::IgcError;

/// Fixes that passed the ENL filter. All sequences share one length.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FlightSeries {
    pub timestamps: Vec<i64>,
    pub latitudes: Vec<f64>,
    pub longitudes: Vec<f64>,
    pub altitudes: Vec<f64>,
    pub enl: Vec<Option<u32>>,
}

impl FlightSeries {
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    fn push(&mut self, epoch: i64, fix: &FixRecord) {
        self.timestamps.push(epoch);
        self.latitudes.push(fix.latitude);
        self.longitudes.push(fix.longitude);
        self.altitudes.push(fix.pressure_altitude);
        self.enl.push(fix.enl);
    }

    pub fn timestamps_f64(&self) -> Vec<f64> {
        self.timestamps.iter().map(|&t| t as f64).collect()
    }
}

/// Human-readable row per retained fix, kept for diagnostics output.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FixSample {
    pub time: String,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    pub enl: Option<u32>,
}

#[derive(Clone, Debug, Default)]
pub struct Flight {
    pub header: Option<IgcHeader>,
    pub enl_spec: Option<EnlColumnSpec>,
    pub series: FlightSeries,
    /// Every B-line of the file, retained or not.
    pub raw_lines: Vec<String>,
    pub samples: Vec<FixSample>,
    pub lines_read: usize,
    pub fixes_parsed: usize,
    pub fixes_rejected: usize,
}

/// Parse a whole IGC stream. The first malformed record aborts the file.
pub fn extract_flight<R: BufRead>(mut reader: R) -> Result<Flight, IgcError> {
    let mut flight = Flight::default();
    let mut buf = Vec::new();

    loop {
        buf.clear();
        let n = reader.read_until(b'\n', &mut buf).map_err(IgcError::stream)?;
        if n == 0 {
            break;
        }
        flight.lines_read += 1;
        let line_no = flight.lines_read;
        // recorders occasionally write Latin-1 pilot names into H-records
        let text = String::from_utf8_lossy(&buf);
        let line = text.trim_end_matches(['\r', '\n']);

        match record::parse_line(line).map_err(|e| e.at_line(line_no))? {
            IgcRecord::DateHeader(header) => flight.header = Some(header),
            IgcRecord::EnlSpecHeader(spec) => flight.enl_spec = Some(spec),
            IgcRecord::FixLine(mut fix) => {
                flight.raw_lines.push(line.to_string());
                flight.fixes_parsed += 1;

                let header = flight
                    .header
                    .ok_or(IgcError::MissingDateHeader { line: line_no })?;
                let epoch = fix.epoch_timestamp(&header).ok_or_else(|| {
                    IgcError::MalformedRecord {
                        line: line_no,
                        field: "date",
                        text: line.to_string(),
                    }
                })?;

                fix.enl = enl::extract_enl(flight.enl_spec.as_ref(), line)
                    .map_err(|e| e.at_line(line_no))?;
                if !enl::is_valid(fix.enl) {
                    flight.fixes_rejected += 1;
                    continue;
                }

                flight.samples.push(FixSample {
                    time: header.label(fix.time_of_day),
                    latitude: fix.latitude,
                    longitude: fix.longitude,
                    altitude: fix.pressure_altitude,
                    enl: fix.enl,
                });
                flight.series.push(epoch, &fix);
            }
            IgcRecord::Ignored => {}
        }
    }

    Ok(flight)
}

pub fn read_flight(path: &Path) -> Result<Flight, IgcError> {
    let file = File::open(path).map_err(|e| IgcError::io(path, e))?;
    extract_flight(BufReader::new(file)).map_err(|e| e.with_path(path))
}
