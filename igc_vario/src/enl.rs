//! Engine noise level (ENL) extraction and the fix validity rule.

use serde::{Deserialize, Serialize};

use crate::IgcError;

/// Fixes whose engine noise reaches this level are treated as powered flight.
pub const ENL_NOISE_LIMIT: u32 = 60;

/// Character offsets of the ENL digits within a B-record, as declared by an
/// I-record. `stop_index` is inclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnlColumnSpec {
    pub start_index: usize,
    pub stop_index: usize,
}

impl EnlColumnSpec {
    pub fn new(start_index: usize, stop_index: usize) -> Option<Self> {
        (stop_index >= start_index).then_some(Self {
            start_index,
            stop_index,
        })
    }

    /// Read the ENL value of a B-record. The column is clipped at the end of
    /// the line, and surrounding whitespace is ignored.
    pub fn extract(&self, line: &str) -> Result<u32, IgcError> {
        let end = (self.stop_index + 1).min(line.len());
        line.get(self.start_index..end)
            .map(str::trim)
            .filter(|raw| !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|raw| raw.parse::<u32>().ok())
            .ok_or_else(|| IgcError::MalformedRecord {
                line: 0,
                field: "ENL",
                text: line.to_string(),
            })
    }
}

/// ENL of a B-record under an optional column spec. No spec means no value.
pub fn extract_enl(spec: Option<&EnlColumnSpec>, line: &str) -> Result<Option<u32>, IgcError> {
    spec.map(|s| s.extract(line)).transpose()
}

/// A fix is rejected only when it carries an ENL value at or above the limit.
pub fn is_valid(enl: Option<u32>) -> bool {
    !matches!(enl, Some(level) if level >= ENL_NOISE_LIMIT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b_record_with_enl(columns: (usize, usize), digits: &str) -> String {
        let mut line = String::from("B1101355206343N00006198WA0058700558");
        while line.len() < columns.0 {
            line.push('0');
        }
        line.truncate(columns.0);
        line.push_str(digits);
        line
    }

    #[test]
    fn test_threshold() {
        assert!(is_valid(None));
        assert!(is_valid(Some(0)));
        assert!(is_valid(Some(59)));
        assert!(!is_valid(Some(60)));
        assert!(!is_valid(Some(999)));
    }

    #[test]
    fn test_extract_at_declared_columns() {
        let spec = EnlColumnSpec::new(35, 37).unwrap();
        let line = b_record_with_enl((35, 37), "065");
        assert_eq!(&line[spec.start_index..=spec.stop_index], "065");
        assert_eq!(extract_enl(Some(&spec), &line).unwrap(), Some(65));
    }

    #[test]
    fn test_extract_clips_at_line_end() {
        let spec = EnlColumnSpec::new(35, 37).unwrap();
        let line = b_record_with_enl((35, 37), "42");
        assert_eq!(spec.extract(&line).unwrap(), 42);
    }

    #[test]
    fn test_no_spec_means_no_value() {
        let line = b_record_with_enl((35, 37), "999");
        assert_eq!(extract_enl(None, &line).unwrap(), None);
    }

    #[test]
    fn test_non_numeric_enl_is_malformed() {
        let spec = EnlColumnSpec::new(35, 36).unwrap();
        let line = b_record_with_enl((35, 36), "x1");
        assert!(matches!(
            spec.extract(&line),
            Err(IgcError::MalformedRecord { field: "ENL", .. })
        ));
    }

    #[test]
    fn test_missing_enl_column_is_malformed() {
        let spec = EnlColumnSpec::new(60, 62).unwrap();
        assert!(spec.extract("B1101355206343N00006198WA0058700558").is_err());
    }

    #[test]
    fn test_reversed_columns_rejected() {
        assert_eq!(EnlColumnSpec::new(40, 38), None);
    }
}
