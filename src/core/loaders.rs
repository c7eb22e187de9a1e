//! Loader for recorded flight trajectory tables.
//!
//! The expected input is a delimited file with a header row that contains at
//! least the columns `Flight_ID`, `Origin`, `Destination`, `Latitude`,
//! `Longitude` and `DRemains`. Extra columns are ignored. Numeric cells that
//! fail to parse are read as NaN, which keeps row alignment intact and lets
//! the range filters drop them naturally.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use csv::ReaderBuilder;
use thiserror::Error;

/// Columns that must be present in every flight table.
pub const REQUIRED_COLUMNS: [&str; 6] = [
    "Flight_ID",
    "Origin",
    "Destination",
    "Latitude",
    "Longitude",
    "DRemains",
];

/// Errors that can occur during file loading.
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Empty file: {0}")]
    EmptyFile(PathBuf),

    #[error("Missing required columns: {0}")]
    MissingColumns(String),
}

/// Result type for loader operations.
pub type Result<T> = std::result::Result<T, LoaderError>;

/// A single recorded trajectory sample.
#[derive(Debug, Clone, PartialEq)]
pub struct FlightPoint {
    pub flight_id: String,
    pub origin: String,
    pub destination: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Normalized fraction of the route still to be flown.
    pub d_remains: f64,
}

/// Open interval on `DRemains` used to keep a sub-window of each route:
/// `min < DRemains < max`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressWindow {
    pub min: f64,
    pub max: f64,
}

impl ProgressWindow {
    #[inline]
    pub fn contains(&self, value: f64) -> bool {
        value > self.min && value < self.max
    }
}

/// Ordered table of flight points, immutable once built.
#[derive(Debug, Clone, Default)]
pub struct FlightTable {
    rows: Vec<FlightPoint>,
}

impl FlightTable {
    pub fn new(rows: Vec<FlightPoint>) -> Self {
        Self { rows }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[FlightPoint] {
        &self.rows
    }

    /// First `n` rows, used for log previews.
    pub fn head(&self, n: usize) -> &[FlightPoint] {
        &self.rows[..n.min(self.rows.len())]
    }

    /// Keep rows heading to `airport` whose `DRemains` lies inside `window`.
    pub fn approaching(&self, airport: &str, window: ProgressWindow) -> FlightTable {
        let rows = self
            .rows
            .iter()
            .filter(|p| p.destination == airport && window.contains(p.d_remains))
            .cloned()
            .collect();
        FlightTable { rows }
    }

    /// Unique flight identifiers in order of first appearance.
    pub fn flight_ids(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.rows
            .iter()
            .filter(|p| seen.insert(p.flight_id.as_str()))
            .map(|p| p.flight_id.clone())
            .collect()
    }

    /// Row counts per origin airport, sorted by code.
    pub fn origin_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for p in &self.rows {
            *counts.entry(p.origin.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// Row counts per destination airport, sorted by code.
    pub fn destination_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for p in &self.rows {
            *counts.entry(p.destination.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// Latitude and longitude columns, in row order.
    pub fn lat_lon_columns(&self) -> (Vec<f64>, Vec<f64>) {
        self.rows.iter().map(|p| (p.latitude, p.longitude)).unzip()
    }
}

impl FromIterator<FlightPoint> for FlightTable {
    fn from_iter<I: IntoIterator<Item = FlightPoint>>(iter: I) -> Self {
        Self {
            rows: iter.into_iter().collect(),
        }
    }
}

/// Load a flight table from a CSV file.
///
/// # Errors
///
/// Returns an error if the file cannot be read, lacks one of
/// [`REQUIRED_COLUMNS`], or contains no data rows.
pub fn load_flight_csv<P: AsRef<Path>>(path: P) -> Result<FlightTable> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let table = read_flight_csv(BufReader::new(file))?;

    if table.is_empty() {
        return Err(LoaderError::EmptyFile(path.to_path_buf()));
    }

    Ok(table)
}

/// Parse a flight table from any reader. An input with a valid header and
/// no rows yields an empty table.
pub fn read_flight_csv<R: Read>(reader: R) -> Result<FlightTable> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader.headers()?.clone();
    let col_map: HashMap<&str, usize> = headers
        .iter()
        .enumerate()
        .map(|(i, name)| (name, i))
        .collect();

    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|c| !col_map.contains_key(c))
        .collect();
    if !missing.is_empty() {
        return Err(LoaderError::MissingColumns(missing.join(", ")));
    }

    let id_idx = col_map["Flight_ID"];
    let origin_idx = col_map["Origin"];
    let dest_idx = col_map["Destination"];
    let lat_idx = col_map["Latitude"];
    let lon_idx = col_map["Longitude"];
    let remain_idx = col_map["DRemains"];

    let text = |record: &csv::StringRecord, idx: usize| -> String {
        record.get(idx).unwrap_or_default().to_string()
    };
    let number = |record: &csv::StringRecord, idx: usize| -> f64 {
        record
            .get(idx)
            .and_then(|s| s.parse().ok())
            .unwrap_or(f64::NAN)
    };

    let mut rows = Vec::with_capacity(4096);
    for result in reader.records() {
        let record = result?;
        rows.push(FlightPoint {
            flight_id: text(&record, id_idx),
            origin: text(&record, origin_idx),
            destination: text(&record, dest_idx),
            latitude: number(&record, lat_idx),
            longitude: number(&record, lon_idx),
            d_remains: number(&record, remain_idx),
        });
    }

    Ok(FlightTable { rows })
}
