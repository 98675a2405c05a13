use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use clap::{ArgAction, Parser, ValueHint};
use igc_vario::{process_directory, BatchOutput, Params};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const OUTPUT_EXTENSION: &str = "geojson";

#[derive(Parser, Debug)]
#[command(author, version, about = "Convert a directory of IGC flight logs into a GeoJSON vario map", long_about = None)]
struct Cli {
    /// Directory holding the .igc flight logs (not searched recursively)
    #[arg(value_hint = ValueHint::DirPath)]
    dir: PathBuf,

    /// Output base path; writes <dir>/<unix_time>_<name>.geojson
    #[arg(value_hint = ValueHint::FilePath)]
    output: PathBuf,

    /// Averaging window in samples (overrides the params file)
    #[arg(long)]
    window: Option<usize>,

    /// Optional JSON params file
    #[arg(long, value_hint = ValueHint::FilePath)]
    params: Option<PathBuf>,

    /// Also write every retained fix as CSV
    #[arg(long, value_hint = ValueHint::FilePath)]
    fixes_csv: Option<PathBuf>,

    /// Write the GeoJSON to stdout instead of the timestamped file
    #[arg(long, action = ArgAction::SetTrue)]
    stdout: bool,

    /// Pretty-print the GeoJSON
    #[arg(long, action = ArgAction::SetTrue)]
    pretty: bool,

    /// Verbose logging
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    // the output name carries the invocation time, not the completion time
    let started_at = Utc::now().timestamp();

    let mut params = match cli.params.as_ref() {
        Some(path) => load_params(path)?,
        None => Params::default(),
    };
    if let Some(window) = cli.window {
        params.window = window;
    }
    params.validate()?;

    let t_run = Instant::now();
    let batch = process_directory(&cli.dir, &params)
        .with_context(|| format!("failed to process {}", cli.dir.display()))?;
    if cli.verbose {
        info!(
            "Processing stage: {:.1} ms",
            t_run.elapsed().as_secs_f64() * 1000.0
        );
    }
    for report in batch.failed() {
        if let Some(err) = report.error.as_ref() {
            warn!("{} contributed no points: {}", report.path.display(), err);
        }
    }

    if let Some(path) = cli.fixes_csv.as_ref() {
        write_fixes_csv(&batch, path)?;
        info!("Wrote fixes CSV: {}", path.display());
    }

    if cli.stdout {
        let stdout = io::stdout();
        write_geojson(&batch, stdout.lock(), cli.pretty)?;
    } else {
        let path = output_path(&cli.output, started_at)?;
        let file = File::create(&path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        write_geojson(&batch, BufWriter::new(file), cli.pretty)
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!(
            "Wrote {} points from {} files: {}",
            batch.samples().count(),
            batch.files.len(),
            path.display()
        );
    }

    Ok(())
}

fn load_params(path: &Path) -> Result<Params> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read params {}", path.display()))?;
    let params: Params = serde_json::from_str(&text)
        .with_context(|| format!("{} is not a valid params file", path.display()))?;
    Ok(params)
}

/// `<parent>/<epoch>_<name>.geojson`. A name already ending in `.geojson`
/// keeps a single extension.
fn output_path(base: &Path, epoch: i64) -> Result<PathBuf> {
    let name = base
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow!("output path {} has no file name", base.display()))?;
    let suffix = format!(".{}", OUTPUT_EXTENSION);
    let file_name = if name.to_ascii_lowercase().ends_with(&suffix) {
        format!("{}_{}", epoch, name)
    } else {
        format!("{}_{}{}", epoch, name, suffix)
    };
    let parent = base.parent().unwrap_or_else(|| Path::new(""));
    Ok(parent.join(file_name))
}

fn write_geojson<W: Write>(batch: &BatchOutput, mut writer: W, pretty: bool) -> Result<()> {
    let collection = batch.feature_collection();
    if pretty {
        serde_json::to_writer_pretty(&mut writer, &collection)?;
    } else {
        serde_json::to_writer(&mut writer, &collection)?;
    }
    writer.flush()?;
    Ok(())
}

fn write_fixes_csv(batch: &BatchOutput, path: &Path) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut writer = csv::Writer::from_writer(file);
    write_fix_rows(batch, &mut writer)
}

fn write_fix_rows<W: Write>(batch: &BatchOutput, writer: &mut csv::Writer<W>) -> Result<()> {
    writer.write_record(["file", "time", "latitude", "longitude", "altitude", "enl"])?;
    for outcome in &batch.files {
        let file = outcome.report.path.display().to_string();
        for fix in &outcome.fixes {
            writer.write_record([
                file.clone(),
                fix.time.clone(),
                format!("{:.6}", fix.latitude),
                format!("{:.6}", fix.longitude),
                format!("{}", fix.altitude),
                fix.enl.map(|v| v.to_string()).unwrap_or_default(),
            ])?;
        }
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_path_prefixes_epoch() {
        let path = output_path(Path::new("out/dir/map"), 1_700_000_000).unwrap();
        assert_eq!(path, PathBuf::from("out/dir/1700000000_map.geojson"));
    }

    #[test]
    fn test_output_path_without_parent() {
        let path = output_path(Path::new("map"), 42).unwrap();
        assert_eq!(path, PathBuf::from("42_map.geojson"));
    }

    #[test]
    fn test_output_path_keeps_single_extension() {
        let path = output_path(Path::new("maps/thermals.geojson"), 7).unwrap();
        assert_eq!(path, PathBuf::from("maps/7_thermals.geojson"));
    }

    #[test]
    fn test_output_path_needs_file_name() {
        assert!(output_path(Path::new("/"), 1).is_err());
    }

    #[test]
    fn test_load_params() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("params.json");
        fs::write(&path, r#"{"window": 15}"#).unwrap();
        assert_eq!(load_params(&path).unwrap().window, 15);

        fs::write(&path, "window = 15").unwrap();
        assert!(load_params(&path).is_err());
    }

    #[test]
    fn test_geojson_and_csv_for_empty_batch() {
        let batch = BatchOutput::default();
        let mut buf = Vec::new();
        write_geojson(&batch, &mut buf, false).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(json["type"], "FeatureCollection");
        assert_eq!(json["features"].as_array().map(Vec::len), Some(0));

        let mut writer = csv::Writer::from_writer(Vec::new());
        write_fix_rows(&batch, &mut writer).unwrap();
        let text = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        assert_eq!(text, "file,time,latitude,longitude,altitude,enl\n");
    }

    #[test]
    fn test_fix_rows_from_processed_logs() {
        let dir = tempfile::tempdir().unwrap();
        let with_enl = dir.path().join("a_enl.igc");
        fs::write(
            &with_enl,
            "HFDTE010120\nI013334ENL\n\
             B1000004630000N01415000EA0100000012\n\
             B1000014630000N01415000EA0100100007\n",
        )
        .unwrap();
        let plain = dir.path().join("b_plain.igc");
        fs::write(&plain, "HFDTE020120\nB1200004630000S01415000WA0150000000\n").unwrap();

        let params = Params { window: 1 };
        let batch = BatchOutput {
            files: vec![
                igc_vario::process_file(&with_enl, &params),
                igc_vario::process_file(&plain, &params),
            ],
        };

        let mut writer = csv::Writer::from_writer(Vec::new());
        write_fix_rows(&batch, &mut writer).unwrap();
        let text = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        let rows: Vec<&str> = text.lines().collect();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0], "file,time,latitude,longitude,altitude,enl");
        assert_eq!(
            rows[1],
            format!(
                "{},01-01-2020 10:0:0,46.500000,14.250000,1000,12",
                with_enl.display()
            )
        );
        assert_eq!(
            rows[2],
            format!(
                "{},01-01-2020 10:0:1,46.500000,14.250000,1001,7",
                with_enl.display()
            )
        );
        assert_eq!(
            rows[3],
            format!(
                "{},02-01-2020 12:0:0,-46.500000,-14.250000,1500,",
                plain.display()
            )
        );
    }
}
