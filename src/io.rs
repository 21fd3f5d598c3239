// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use std::collections::BTreeMap;
use std::io::{BufWriter, Write};
use std::path::Path;

use ndarray::{Array1, Array2, ArrayView2};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::{DislocSource, FaultPatch, PathSegment, DEFAULT_NU};
use crate::error::{DislocError, Result};
use crate::path::FaultPath;
use crate::processor::DisplacementResult;

/// A fault source read from or written to a model file.
#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    /// A standalone rectangular patch.
    Patch(FaultPatch),
    /// A chain of segments along a node path.
    Path(FaultPath),
}

impl DislocSource for Source {
    fn nu(&self) -> f64 {
        match self {
            Source::Patch(p) => p.nu(),
            Source::Path(p) => p.nu(),
        }
    }

    fn enabled_segments(&self) -> Vec<&FaultPatch> {
        match self {
            Source::Patch(p) => p.enabled_segments(),
            Source::Path(p) => p.enabled_segments(),
        }
    }
}

/// A collection of fault sources forming one forward model.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Model {
    /// Sources in stacking order.
    pub sources: Vec<Source>,
}

impl Model {
    /// Borrow the sources in the form the forward model takes.
    pub fn as_sources(&self) -> Vec<&dyn DislocSource> {
        self.sources
            .iter()
            .map(|s| s as &dyn DislocSource)
            .collect()
    }
}

fn default_nu() -> f64 {
    DEFAULT_NU
}

#[derive(Debug, Serialize, Deserialize)]
struct PathRecord {
    origin_easting: f64,
    origin_northing: f64,
    #[serde(default = "default_nu")]
    nu: f64,
    #[serde(default)]
    nodes: Vec<[f64; 2]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    segments: Option<Vec<PathSegment>>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum SourceRecord {
    Patch(FaultPatch),
    Path(PathRecord),
}

#[derive(Debug, Serialize, Deserialize)]
struct ModelRecord {
    sources: Vec<SourceRecord>,
}

impl TryFrom<ModelRecord> for Model {
    type Error = DislocError;

    fn try_from(record: ModelRecord) -> Result<Self> {
        let mut sources = Vec::with_capacity(record.sources.len());
        for source in record.sources {
            let source = match source {
                SourceRecord::Patch(patch) => {
                    patch.validate()?;
                    Source::Patch(patch)
                }
                SourceRecord::Path(p) => Source::Path(FaultPath::from_parts(
                    [p.origin_easting, p.origin_northing],
                    p.nu,
                    p.nodes,
                    p.segments,
                )?),
            };
            sources.push(source);
        }
        Ok(Model { sources })
    }
}

impl From<&Model> for ModelRecord {
    fn from(model: &Model) -> Self {
        let sources = model
            .sources
            .iter()
            .map(|source| match source {
                Source::Patch(patch) => SourceRecord::Patch(patch.clone()),
                Source::Path(path) => {
                    let [origin_easting, origin_northing] = path.origin();
                    SourceRecord::Path(PathRecord {
                        origin_easting,
                        origin_northing,
                        nu: path.nu(),
                        nodes: path.nodes().to_vec(),
                        segments: Some(path.segments().to_vec()),
                    })
                }
            })
            .collect();
        ModelRecord { sources }
    }
}

/// Supported file formats.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FileFormat {
    /// JSON model or result file.
    Json,
    /// TOML model file.
    Toml,
    /// Comma-separated coordinates or results.
    Csv,
}

/// Infer file format from extension.
pub fn infer_format(path: &Path) -> Result<FileFormat> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => Ok(FileFormat::Json),
        Some("toml") => Ok(FileFormat::Toml),
        Some("csv") => Ok(FileFormat::Csv),
        Some(ext) => Err(DislocError::UnsupportedFileFormat(ext.to_string())),
        None => Err(DislocError::UnsupportedFileFormat(
            "(no extension)".to_string(),
        )),
    }
}

/// Parse a model from JSON or TOML text.
///
/// # Errors
/// Returns an error if the text does not parse or a source is invalid.
pub fn parse_model(text: &str, format: FileFormat) -> Result<Model> {
    let record: ModelRecord = match format {
        FileFormat::Json => serde_json::from_str(text).map_err(|e| DislocError::Parse {
            context: "JSON model".to_string(),
            message: e.to_string(),
        })?,
        FileFormat::Toml => toml::from_str(text).map_err(|e| DislocError::Parse {
            context: "TOML model".to_string(),
            message: e.to_string(),
        })?,
        FileFormat::Csv => {
            return Err(DislocError::UnsupportedFileFormat(
                "csv (models must be json or toml)".to_string(),
            ))
        }
    };
    Model::try_from(record)
}

/// Render a model as JSON or TOML text.
///
/// # Errors
/// Returns an error if the format cannot hold a model or serialization fails.
pub fn model_to_string(model: &Model, format: FileFormat) -> Result<String> {
    let record = ModelRecord::from(model);
    match format {
        FileFormat::Json => serde_json::to_string_pretty(&record)
            .map_err(|e| DislocError::Other(format!("JSON write error: {}", e))),
        FileFormat::Toml => toml::to_string_pretty(&record)
            .map_err(|e| DislocError::Other(format!("TOML write error: {}", e))),
        FileFormat::Csv => Err(DislocError::UnsupportedFileFormat(
            "csv (models must be json or toml)".to_string(),
        )),
    }
}

/// Load a model file, inferring format from extension.
pub fn load_model(path: &Path) -> Result<Model> {
    let format = infer_format(path)?;
    let text = std::fs::read_to_string(path)?;
    let model = parse_model(&text, format)?;
    debug!(path = %path.display(), sources = model.sources.len(), "loaded model");
    Ok(model)
}

/// Save a model file, inferring format from extension.
pub fn save_model(model: &Model, path: &Path) -> Result<()> {
    let text = model_to_string(model, infer_format(path)?)?;
    std::fs::write(path, text)?;
    Ok(())
}

/// Parse observation coordinates from comma-separated text.
///
/// One point per line with 2 (easting, northing) or 3 values; every line
/// must have the same count. Blank lines and lines starting with `#` are
/// skipped. A first record in which no field is numeric is taken as a
/// header; any other non-numeric field is an error.
///
/// # Errors
/// Returns an error naming the offending line.
pub fn parse_coordinates(text: &str, context: &str) -> Result<Array2<f64>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut values: Vec<f64> = Vec::new();
    let mut ncols: Option<usize> = None;
    let mut first = true;

    for record in reader.records() {
        let record = record.map_err(|e| DislocError::Parse {
            context: context.to_string(),
            message: e.to_string(),
        })?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        let line = record.position().map_or(0, |p| p.line());
        let parse_error = |message: String| DislocError::Parse {
            context: format!("{} line {}", context, line),
            message,
        };

        let is_header = first && record.iter().all(|f| f.parse::<f64>().is_err());
        first = false;
        if is_header {
            continue;
        }

        let row = record
            .iter()
            .map(str::parse::<f64>)
            .collect::<std::result::Result<Vec<f64>, _>>()
            .map_err(|e| parse_error(e.to_string()))?;

        if row.len() != 2 && row.len() != 3 {
            return Err(parse_error(format!(
                "expected 2 or 3 values, got {}",
                row.len()
            )));
        }
        match ncols {
            None => ncols = Some(row.len()),
            Some(n) if n != row.len() => {
                return Err(parse_error(format!(
                    "expected {} values like previous lines, got {}",
                    n,
                    row.len()
                )));
            }
            Some(_) => {}
        }
        values.extend(row);
    }

    let ncols = ncols.unwrap_or(2);
    let nrows = values.len() / ncols;
    Array2::from_shape_vec((nrows, ncols), values)
        .map_err(|e| DislocError::Other(format!("shape error: {}", e)))
}

/// Load observation coordinates from a CSV file.
pub fn load_coordinates(path: &Path) -> Result<Array2<f64>> {
    match infer_format(path)? {
        FileFormat::Csv => {}
        _ => {
            return Err(DislocError::UnsupportedFileFormat(format!(
                "{} (coordinates must be csv)",
                path.display()
            )))
        }
    }
    let text = std::fs::read_to_string(path)?;
    parse_coordinates(&text, &path.display().to_string())
}

#[derive(Serialize)]
struct ResultRecord<'a> {
    easting: Vec<f64>,
    northing: Vec<f64>,
    north: Vec<f64>,
    east: Vec<f64>,
    down: Vec<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    los: Option<Vec<f64>>,
    processor_profile: &'a BTreeMap<String, f64>,
}

/// Save a forward-model result next to its coordinates, as CSV or JSON
/// depending on the extension. `los` adds a line-of-sight column.
///
/// # Errors
/// Returns an error if lengths disagree, the extension is unsupported, or
/// writing fails.
pub fn save_result(
    result: &DisplacementResult,
    coords: ArrayView2<'_, f64>,
    los: Option<&Array1<f64>>,
    path: &Path,
) -> Result<()> {
    let n = result.len();
    if coords.nrows() != n || coords.ncols() < 2 {
        return Err(DislocError::ShapeMismatch {
            expected: vec![n, 2],
            got: coords.shape().to_vec(),
        });
    }
    if let Some(los) = los {
        if los.len() != n {
            return Err(DislocError::ShapeMismatch {
                expected: vec![n],
                got: vec![los.len()],
            });
        }
    }

    match infer_format(path)? {
        FileFormat::Csv => {
            let csv_error = |e: csv::Error| DislocError::Other(format!("CSV write error: {}", e));
            let mut w = csv::Writer::from_path(path).map_err(csv_error)?;
            let mut header = vec!["easting", "northing", "north", "east", "down"];
            if los.is_some() {
                header.push("los");
            }
            w.write_record(&header).map_err(csv_error)?;
            for i in 0..n {
                let mut row = vec![
                    coords[[i, 0]],
                    coords[[i, 1]],
                    result.north[i],
                    result.east[i],
                    result.down[i],
                ];
                if let Some(los) = los {
                    row.push(los[i]);
                }
                w.write_record(row.iter().map(f64::to_string))
                    .map_err(csv_error)?;
            }
            w.flush()?;
        }
        FileFormat::Json => {
            let record = ResultRecord {
                easting: coords.column(0).to_vec(),
                northing: coords.column(1).to_vec(),
                north: result.north.to_vec(),
                east: result.east.to_vec(),
                down: result.down.to_vec(),
                los: los.map(|l| l.to_vec()),
                processor_profile: &result.processor_profile,
            };
            let file = std::fs::File::create(path)?;
            let mut w = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut w, &record)
                .map_err(|e| DislocError::Other(format!("JSON write error: {}", e)))?;
            w.flush()?;
        }
        FileFormat::Toml => {
            return Err(DislocError::UnsupportedFileFormat(
                "toml (results must be csv or json)".to_string(),
            ))
        }
    }
    debug!(path = %path.display(), points = n, "saved result");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn sample_model() -> Model {
        let patch = FaultPatch::new(1000.0, 2000.0, 500.0, 8000.0, 4000.0)
            .unwrap()
            .with_strike(120.0)
            .unwrap()
            .with_opening(0.5)
            .unwrap();
        let mut path = FaultPath::new(0.0, 0.0);
        path.add_node(0.0, 3000.0).unwrap();
        path.add_node(2000.0, 5000.0).unwrap();
        path.set_enabled(0, false).unwrap();
        path.segment_mut(1).unwrap().patch.slip = 2.0;
        Model {
            sources: vec![Source::Patch(patch), Source::Path(path)],
        }
    }

    #[test]
    fn infer_format_from_extension() {
        assert_eq!(infer_format(Path::new("m.json")).unwrap(), FileFormat::Json);
        assert_eq!(infer_format(Path::new("m.toml")).unwrap(), FileFormat::Toml);
        assert_eq!(infer_format(Path::new("c.csv")).unwrap(), FileFormat::Csv);
        assert!(matches!(
            infer_format(Path::new("m.yaml")),
            Err(DislocError::UnsupportedFileFormat(_))
        ));
        assert!(matches!(
            infer_format(Path::new("model")),
            Err(DislocError::UnsupportedFileFormat(_))
        ));
    }

    #[test]
    fn json_model_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        let model = sample_model();
        save_model(&model, &path).unwrap();
        let loaded = load_model(&path).unwrap();
        assert_eq!(loaded, model);
    }

    #[test]
    fn toml_model_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.toml");
        let model = sample_model();
        save_model(&model, &path).unwrap();
        let loaded = load_model(&path).unwrap();
        assert_eq!(loaded, model);
        match &loaded.sources[1] {
            Source::Path(p) => {
                assert!(!p.segments()[0].enabled);
                assert_eq!(p.segments()[1].patch.slip, 2.0);
            }
            other => panic!("expected path, got {:?}", other),
        }
    }

    #[test]
    fn toml_model_from_text() {
        let text = r#"
[[sources]]
type = "patch"
easting = 0
northing = 0
depth = 2000
length = 10000
width = 5000
strike = 45
dip = 45

[[sources]]
type = "path"
origin_easting = 0.0
origin_northing = 0.0
nodes = [[0.0, 0.0], [0.0, 1000.0], [1000.0, 1000.0]]
"#;
        let model = parse_model(text, FileFormat::Toml).unwrap();
        assert_eq!(model.sources.len(), 2);
        match &model.sources[0] {
            Source::Patch(p) => {
                assert_eq!(p.depth, 2000.0);
                assert_eq!(p.rake, 90.0);
                assert_eq!(p.nu, DEFAULT_NU);
            }
            other => panic!("expected patch, got {:?}", other),
        }
        match &model.sources[1] {
            Source::Path(p) => {
                assert_eq!(p.len(), 2);
                assert!((p.segments()[1].patch.strike - 90.0).abs() < 1e-9);
            }
            other => panic!("expected path, got {:?}", other),
        }
        assert_eq!(model.as_sources().len(), 2);
    }

    #[test]
    fn model_rejects_invalid_patch() {
        let text = r#"{"sources": [{"type": "patch", "easting": 0, "northing": 0,
            "depth": -5, "length": 10, "width": 5}]}"#;
        assert!(matches!(
            parse_model(text, FileFormat::Json),
            Err(DislocError::InvalidPatch { field: "depth", .. })
        ));
    }

    #[test]
    fn model_rejects_degenerate_path() {
        let text = r#"{"sources": [{"type": "path", "origin_easting": 0,
            "origin_northing": 0, "nodes": [[0, 0], [0, 0]]}]}"#;
        assert!(matches!(
            parse_model(text, FileFormat::Json),
            Err(DislocError::DegenerateSegment { .. })
        ));
    }

    #[test]
    fn model_parse_error_is_reported() {
        let result = parse_model("{ not json", FileFormat::Json);
        assert!(matches!(result, Err(DislocError::Parse { .. })));
    }

    #[test]
    fn coordinates_with_header_and_comments() {
        let text = "easting,northing\n# survey line\n0,0\n\n10.5, -3\n";
        let c = parse_coordinates(text, "test").unwrap();
        assert_eq!(c, array![[0.0, 0.0], [10.5, -3.0]]);
    }

    #[test]
    fn coordinates_typo_in_first_row_is_an_error() {
        let result = parse_coordinates("100,2O0\n300,400\n", "test");
        match result {
            Err(DislocError::Parse { context, .. }) => assert_eq!(context, "test line 1"),
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn coordinates_three_columns() {
        let c = parse_coordinates("1,2,3\n4,5,6\n", "test").unwrap();
        assert_eq!(c.shape(), &[2, 3]);
    }

    #[test]
    fn coordinates_reject_ragged_rows() {
        let result = parse_coordinates("1,2\n3,4,5\n", "test");
        match result {
            Err(DislocError::Parse { context, .. }) => assert_eq!(context, "test line 2"),
            other => panic!("expected parse error, got {:?}", other),
        }
        assert!(matches!(
            parse_coordinates("1,2\nx,y\n", "test"),
            Err(DislocError::Parse { .. })
        ));
        assert!(matches!(
            parse_coordinates("1\n", "test"),
            Err(DislocError::Parse { .. })
        ));
    }

    #[test]
    fn result_csv_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let result = DisplacementResult {
            north: array![0.5, 1.5],
            east: array![-1.0, 2.0],
            down: array![0.25, 0.0],
            processor_profile: BTreeMap::new(),
        };
        let coords = array![[10.0, 20.0], [30.0, 40.0]];
        let los = array![0.1, 0.2];
        save_result(&result, coords.view(), Some(&los), &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "easting,northing,north,east,down,los");
        assert_eq!(lines[1], "10,20,0.5,-1,0.25,0.1");
        assert_eq!(lines[2], "30,40,1.5,2,0,0.2");
    }

    #[test]
    fn result_json_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        let mut profile = BTreeMap::new();
        profile.insert("threads".to_string(), 4.0);
        let result = DisplacementResult {
            north: array![0.5],
            east: array![-1.0],
            down: array![0.25],
            processor_profile: profile,
        };
        let coords = array![[10.0, 20.0]];
        save_result(&result, coords.view(), None, &path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["down"][0], 0.25);
        assert_eq!(value["easting"][0], 10.0);
        assert_eq!(value["processor_profile"]["threads"], 4.0);
        assert!(value.get("los").is_none());
    }

    #[test]
    fn result_length_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let result = DisplacementResult {
            north: array![0.5],
            east: array![-1.0],
            down: array![0.25],
            processor_profile: BTreeMap::new(),
        };
        let coords = array![[10.0, 20.0], [1.0, 2.0]];
        assert!(matches!(
            save_result(&result, coords.view(), None, &path),
            Err(DislocError::ShapeMismatch { .. })
        ));
    }
}
