//! Positional parsing of single IGC lines.
//!
//! IGC records are fixed-width text. Every numeric field of a B-record is
//! described by a [`FieldSpec`] so that offsets and widths live in data
//! tables instead of being scattered through slicing code.

use chrono::{NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::enl::EnlColumnSpec;
use crate::IgcError;

pub const DATE_MARKER: &str = "HFDTE";
pub const INFO_MARKER: &str = "I";
pub const FIX_MARKER: &str = "B";
pub const ENL_CODE: &str = "ENL";

/// How the characters of a fixed-width field are turned into a number.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Decoder {
    /// Unsigned decimal digits.
    Digits,
    /// Real number, surrounding whitespace and a leading sign allowed.
    Real,
    /// Single hemisphere character: `-1.0` when it equals the given char, `1.0` otherwise.
    Hemisphere(char),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub start: usize,
    pub len: usize,
    pub decoder: Decoder,
}

impl FieldSpec {
    pub const fn new(name: &'static str, start: usize, len: usize, decoder: Decoder) -> Self {
        Self {
            name,
            start,
            len,
            decoder,
        }
    }

    pub fn end(&self) -> usize {
        self.start + self.len
    }

    fn malformed(&self, line: &str) -> IgcError {
        IgcError::MalformedRecord {
            line: 0,
            field: self.name,
            text: line.to_string(),
        }
    }

    /// Raw characters of this field, or `MalformedRecord` if the line is too short.
    pub fn slice<'a>(&self, line: &'a str) -> Result<&'a str, IgcError> {
        line.get(self.start..self.end())
            .ok_or_else(|| self.malformed(line))
    }

    pub fn decode(&self, line: &str) -> Result<f64, IgcError> {
        let raw = self.slice(line)?;
        match self.decoder {
            Decoder::Digits => {
                if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(self.malformed(line));
                }
                raw.parse::<u32>()
                    .map(f64::from)
                    .map_err(|_| self.malformed(line))
            }
            Decoder::Real => raw
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| self.malformed(line)),
            Decoder::Hemisphere(negative) => {
                if raw.starts_with(negative) {
                    Ok(-1.0)
                } else {
                    Ok(1.0)
                }
            }
        }
    }

    fn decode_u32(&self, line: &str) -> Result<u32, IgcError> {
        // Digits decoder only yields values that came from a u32
        Ok(self.decode(line)? as u32)
    }
}

/// Field layout of a B (fix) record.
///
/// `B HHMMSS DDMMmmmN DDDMMmmmE V PPPPP GGGGG [extensions]`
pub mod b_record {
    use super::{Decoder, FieldSpec};

    pub const HOUR: FieldSpec = FieldSpec::new("hour", 1, 2, Decoder::Digits);
    pub const MINUTE: FieldSpec = FieldSpec::new("minute", 3, 2, Decoder::Digits);
    pub const SECOND: FieldSpec = FieldSpec::new("second", 5, 2, Decoder::Digits);

    pub const LAT_DEGREES: FieldSpec = FieldSpec::new("latitude degrees", 7, 2, Decoder::Digits);
    pub const LAT_MINUTES: FieldSpec = FieldSpec::new("latitude minutes", 9, 2, Decoder::Digits);
    pub const LAT_THOUSANDTHS: FieldSpec =
        FieldSpec::new("latitude thousandths", 11, 3, Decoder::Digits);
    pub const LAT_HEMISPHERE: FieldSpec =
        FieldSpec::new("latitude hemisphere", 14, 1, Decoder::Hemisphere('S'));

    pub const LON_DEGREES: FieldSpec = FieldSpec::new("longitude degrees", 15, 3, Decoder::Digits);
    pub const LON_MINUTES: FieldSpec = FieldSpec::new("longitude minutes", 18, 2, Decoder::Digits);
    pub const LON_THOUSANDTHS: FieldSpec =
        FieldSpec::new("longitude thousandths", 20, 3, Decoder::Digits);
    pub const LON_HEMISPHERE: FieldSpec =
        FieldSpec::new("longitude hemisphere", 23, 1, Decoder::Hemisphere('W'));

    pub const PRESSURE_ALTITUDE: FieldSpec =
        FieldSpec::new("pressure altitude", 25, 5, Decoder::Real);

    /// Degrees, minutes, thousandths of a minute, hemisphere.
    pub type CoordinateFields = [FieldSpec; 4];

    pub const LATITUDE: CoordinateFields = [LAT_DEGREES, LAT_MINUTES, LAT_THOUSANDTHS, LAT_HEMISPHERE];
    pub const LONGITUDE: CoordinateFields = [LON_DEGREES, LON_MINUTES, LON_THOUSANDTHS, LON_HEMISPHERE];
}

/// Field layout of the `HFDTE` date header, relative to the text after the
/// optional `DATE:` label of newer recorders.
pub mod date_record {
    use super::{Decoder, FieldSpec};

    pub const DAY: FieldSpec = FieldSpec::new("day", 0, 2, Decoder::Digits);
    pub const MONTH: FieldSpec = FieldSpec::new("month", 2, 2, Decoder::Digits);
    pub const YEAR: FieldSpec = FieldSpec::new("year", 4, 2, Decoder::Digits);
}

/// Flight date from the `HFDTE` record. Two-digit year, offset by 2000.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IgcHeader {
    pub day: u32,
    pub month: u32,
    pub year: u32,
}

impl IgcHeader {
    pub fn date(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(2000 + self.year as i32, self.month, self.day)
    }

    /// Unix seconds of `time` on this header's date, read as UTC.
    pub fn epoch_seconds(&self, time: NaiveTime) -> Option<i64> {
        self.date().map(|d| d.and_time(time).and_utc().timestamp())
    }

    /// `D-M-20YY H:M:S` label used in fix diagnostics.
    pub fn label(&self, time: NaiveTime) -> String {
        format!(
            "{:02}-{:02}-20{:02} {}:{}:{}",
            self.day,
            self.month,
            self.year,
            time.hour(),
            time.minute(),
            time.second()
        )
    }
}

/// One parsed B-record. `enl` is filled in by the flight extractor when the
/// file declares an ENL column.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FixRecord {
    pub time_of_day: NaiveTime,
    pub latitude: f64,
    pub longitude: f64,
    pub pressure_altitude: f64,
    pub enl: Option<u32>,
}

impl FixRecord {
    pub fn epoch_timestamp(&self, header: &IgcHeader) -> Option<i64> {
        header.epoch_seconds(self.time_of_day)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum IgcRecord {
    DateHeader(IgcHeader),
    EnlSpecHeader(EnlColumnSpec),
    FixLine(FixRecord),
    Ignored,
}

/// Classify and parse one raw line (without its line terminator).
pub fn parse_line(line: &str) -> Result<IgcRecord, IgcError> {
    if let Some(rest) = line.strip_prefix(DATE_MARKER) {
        parse_date(line, rest).map(IgcRecord::DateHeader)
    } else if line.starts_with(INFO_MARKER) {
        match parse_enl_spec(line)? {
            Some(spec) => Ok(IgcRecord::EnlSpecHeader(spec)),
            None => Ok(IgcRecord::Ignored),
        }
    } else if line.starts_with(FIX_MARKER) {
        parse_fix(line).map(IgcRecord::FixLine)
    } else {
        Ok(IgcRecord::Ignored)
    }
}

fn parse_date(line: &str, rest: &str) -> Result<IgcHeader, IgcError> {
    let body = rest.strip_prefix("DATE:").unwrap_or(rest);
    let header = IgcHeader {
        day: date_record::DAY.decode_u32(body).map_err(|e| e.with_text(line))?,
        month: date_record::MONTH.decode_u32(body).map_err(|e| e.with_text(line))?,
        year: date_record::YEAR.decode_u32(body).map_err(|e| e.with_text(line))?,
    };
    if header.date().is_none() {
        return Err(IgcError::MalformedRecord {
            line: 0,
            field: "date",
            text: line.to_string(),
        });
    }
    Ok(header)
}

/// The two two-digit fields right before `ENL` are the start and (inclusive)
/// stop offsets of the noise digits within a B-record.
fn parse_enl_spec(line: &str) -> Result<Option<EnlColumnSpec>, IgcError> {
    let Some(pos) = line.find(ENL_CODE) else {
        return Ok(None);
    };
    let malformed = |field| IgcError::MalformedRecord {
        line: 0,
        field,
        text: line.to_string(),
    };
    let start_at = pos.checked_sub(4).ok_or_else(|| malformed("ENL start"))?;
    let start = FieldSpec::new("ENL start", start_at, 2, Decoder::Digits).decode_u32(line)?;
    let stop = FieldSpec::new("ENL stop", start_at + 2, 2, Decoder::Digits).decode_u32(line)?;
    EnlColumnSpec::new(start as usize, stop as usize)
        .map(Some)
        .ok_or_else(|| malformed("ENL columns"))
}

fn decode_coordinate(line: &str, fields: &b_record::CoordinateFields) -> Result<f64, IgcError> {
    let [degrees, minutes, thousandths, hemisphere] = fields;
    let degrees = degrees.decode(line)?;
    let minutes = minutes.decode(line)?;
    let thousandths = thousandths.decode(line)?;
    let sign = hemisphere.decode(line)?;
    Ok((degrees + (minutes + thousandths / 1000.0) / 60.0) * sign)
}

fn parse_fix(line: &str) -> Result<FixRecord, IgcError> {
    let hour = b_record::HOUR.decode_u32(line)?;
    let minute = b_record::MINUTE.decode_u32(line)?;
    let second = b_record::SECOND.decode_u32(line)?;
    let time_of_day =
        NaiveTime::from_hms_opt(hour, minute, second).ok_or_else(|| IgcError::MalformedRecord {
            line: 0,
            field: "time",
            text: line.to_string(),
        })?;

    Ok(FixRecord {
        time_of_day,
        latitude: decode_coordinate(line, &b_record::LATITUDE)?,
        longitude: decode_coordinate(line, &b_record::LONGITUDE)?,
        pressure_altitude: b_record::PRESSURE_ALTITUDE.decode(line)?,
        enl: None,
    })
}
