//! IGC flight log to vario map core library.
//!
//! Parses IGC flight recorder logs, drops fixes flagged by engine noise,
//! block-averages the track, derives vertical speed and emits the climbing
//! points as GeoJSON features.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

pub mod average;
pub mod enl;
pub mod feature;
pub mod flight;
pub mod record;
pub mod vario;

pub use average::{average, AveragedSeries};
pub use enl::{EnlColumnSpec, ENL_NOISE_LIMIT};
pub use feature::{assemble, feature_collection, VarioSample};
pub use flight::{extract_flight, read_flight, FixSample, Flight, FlightSeries};
pub use record::{parse_line, FixRecord, IgcHeader, IgcRecord};

pub const IGC_EXTENSION: &str = "igc";
pub const DEFAULT_WINDOW: usize = 60;

#[derive(Error, Debug)]
pub enum IgcError {
    #[error("line {line}: B-record before any HFDTE date header")]
    MissingDateHeader { line: usize },
    #[error("line {line}: malformed {field} in {text:?}")]
    MalformedRecord {
        line: usize,
        field: &'static str,
        text: String,
    },
    #[error("cannot derive vario: {0}")]
    DifferentiationPrecondition(String),
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("{}: {}", .path.display(), .source)]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl IgcError {
    pub fn io(path: &Path, source: io::Error) -> Self {
        IgcError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// I/O failure on a stream whose path is filled in later.
    pub(crate) fn stream(source: io::Error) -> Self {
        IgcError::Io {
            path: PathBuf::new(),
            source,
        }
    }

    pub(crate) fn at_line(mut self, n: usize) -> Self {
        match &mut self {
            IgcError::MissingDateHeader { line } | IgcError::MalformedRecord { line, .. } => {
                *line = n
            }
            _ => {}
        }
        self
    }

    pub(crate) fn with_text(mut self, full_line: &str) -> Self {
        if let IgcError::MalformedRecord { text, .. } = &mut self {
            *text = full_line.to_string();
        }
        self
    }

    pub(crate) fn with_path(mut self, file: &Path) -> Self {
        if let IgcError::Io { path, .. } = &mut self {
            if path.as_os_str().is_empty() {
                *path = file.to_path_buf();
            }
        }
        self
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Params {
    /// Number of consecutive fixes averaged into one output point.
    pub window: usize,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
        }
    }
}

impl Params {
    pub fn validate(&self) -> Result<(), IgcError> {
        if self.window == 0 {
            return Err(IgcError::InvalidParameter(
                "averaging window must be > 0".into(),
            ));
        }
        Ok(())
    }
}

/// Per-file counters and the error that stopped the file, if any.
#[derive(Debug)]
pub struct FileReport {
    pub path: PathBuf,
    pub lines_read: usize,
    pub fixes_parsed: usize,
    pub fixes_rejected: usize,
    pub fixes_kept: usize,
    pub averaged_points: usize,
    pub emitted_points: usize,
    pub error: Option<IgcError>,
}

impl FileReport {
    fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            lines_read: 0,
            fixes_parsed: 0,
            fixes_rejected: 0,
            fixes_kept: 0,
            averaged_points: 0,
            emitted_points: 0,
            error: None,
        }
    }
}

#[derive(Debug)]
pub struct FileOutcome {
    pub report: FileReport,
    pub samples: Vec<VarioSample>,
    pub fixes: Vec<FixSample>,
}

/// Average, differentiate and filter one extracted flight.
pub fn compute_vario(flight: &Flight, params: &Params) -> Result<Vec<VarioSample>, IgcError> {
    params.validate()?;
    let averaged = AveragedSeries::from_series(&flight.series, params.window)?;
    if averaged.is_empty() {
        return Err(IgcError::DifferentiationPrecondition(format!(
            "{} fixes do not fill one {}-fix window",
            flight.series.len(),
            params.window
        )));
    }
    let vario = vario::derive(&averaged.altitudes, &averaged.timestamps)?;
    Ok(assemble(&averaged, &vario, &flight.series.enl))
}

/// Run the whole pipeline on one file. Failures are recorded in the report
/// and never escape, so one bad log cannot stop a batch.
pub fn process_file(path: &Path, params: &Params) -> FileOutcome {
    let mut report = FileReport::new(path);

    let flight = match read_flight(path) {
        Ok(flight) => flight,
        Err(err) => {
            warn!("Skipping {}: {}", path.display(), err);
            report.error = Some(err);
            return FileOutcome {
                report,
                samples: Vec::new(),
                fixes: Vec::new(),
            };
        }
    };

    report.lines_read = flight.lines_read;
    report.fixes_parsed = flight.fixes_parsed;
    report.fixes_rejected = flight.fixes_rejected;
    report.fixes_kept = flight.series.len();
    report.averaged_points = flight.series.len() / params.window.max(1);
    if flight.enl_spec.is_none() {
        debug!("{}: no ENL column declared, noise filter off", path.display());
    }

    let samples = match compute_vario(&flight, params) {
        Ok(samples) => samples,
        Err(err) => {
            warn!("No vario for {}: {}", path.display(), err);
            report.error = Some(err);
            Vec::new()
        }
    };
    report.emitted_points = samples.len();
    debug!(
        "{}: {} fixes ({} rejected by ENL), {} averaged, {} climbing",
        path.display(),
        report.fixes_parsed,
        report.fixes_rejected,
        report.averaged_points,
        report.emitted_points
    );

    FileOutcome {
        report,
        samples,
        fixes: flight.samples,
    }
}

fn has_igc_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case(IGC_EXTENSION))
        .unwrap_or(false)
}

/// Regular files directly inside `dir` with an `.igc` extension, sorted by path.
pub fn collect_igc_files(dir: &Path) -> Result<Vec<PathBuf>, IgcError> {
    let entries = fs::read_dir(dir).map_err(|e| IgcError::io(dir, e))?;
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| IgcError::io(dir, e))?;
        let path = entry.path();
        if path.is_file() && has_igc_extension(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[derive(Debug, Default)]
pub struct BatchOutput {
    pub files: Vec<FileOutcome>,
}

impl BatchOutput {
    /// All climbing points, file by file, in file order.
    pub fn samples(&self) -> impl Iterator<Item = &VarioSample> {
        self.files.iter().flat_map(|f| f.samples.iter())
    }

    pub fn feature_collection(&self) -> geojson::FeatureCollection {
        feature_collection(self.samples())
    }

    pub fn failed(&self) -> impl Iterator<Item = &FileReport> {
        self.files
            .iter()
            .map(|f| &f.report)
            .filter(|r| r.error.is_some())
    }
}

/// Process a list of files in parallel; the result keeps the input order.
pub fn process_files(paths: &[PathBuf], params: &Params) -> Result<BatchOutput, IgcError> {
    params.validate()?;
    let files: Vec<FileOutcome> = paths
        .par_iter()
        .map(|path| process_file(path, params))
        .collect();
    let output = BatchOutput { files };
    info!(
        "Processed {} files: {} points, {} files without output",
        output.files.len(),
        output.samples().count(),
        output.failed().count()
    );
    Ok(output)
}

/// Process every `.igc` file of `dir`. An unreadable directory is an error;
/// an empty one yields an empty batch.
pub fn process_directory(dir: &Path, params: &Params) -> Result<BatchOutput, IgcError> {
    let files = collect_igc_files(dir)?;
    if files.is_empty() {
        info!("No .{} files found in {}", IGC_EXTENSION, dir.display());
    }
    process_files(&files, params)
}
