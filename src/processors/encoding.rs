//! Flight identifier encoding and per-flight coordinate extraction.
//!
//! Downstream matrix code works on contiguous integer indices, so every
//! flight ID is first mapped to a dense index in `0..N`. The coordinate
//! dictionary then gathers each flight's ordered `[lat, lon]` samples.

use std::collections::{BTreeMap, HashMap};

use crate::core::loaders::FlightTable;

/// Order-preserving bijection between flight IDs and dense indices.
///
/// Index assignment follows input order; repeated IDs keep their first index.
#[derive(Debug, Clone, Default)]
pub struct FlightEncoder {
    ids: Vec<String>,
    index: HashMap<String, usize>,
}

impl FlightEncoder {
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut encoder = Self::default();
        for id in ids {
            let id = id.into();
            if !encoder.index.contains_key(&id) {
                encoder.index.insert(id.clone(), encoder.ids.len());
                encoder.ids.push(id);
            }
        }
        encoder
    }

    #[inline]
    pub fn encode(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    #[inline]
    pub fn decode(&self, index: usize) -> Option<&str> {
        self.ids.get(index).map(String::as_str)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Encoded IDs in index order.
    pub fn ids(&self) -> &[String] {
        &self.ids
    }
}

/// Ordered `[lat, lon]` samples of one flight.
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinateSet {
    pub flight_id: String,
    pub encoded: usize,
    pub points: Vec<[f64; 2]>,
}

impl CoordinateSet {
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Output of [`build_coordinate_dict`].
///
/// `coords[k]` is the trajectory behind row/column `k` of the distance
/// matrix, and `encoded[k]` is its encoded flight index.
#[derive(Debug, Clone, Default)]
pub struct CoordinateDictionary {
    pub encoded: Vec<usize>,
    pub coords: Vec<CoordinateSet>,
    by_index: BTreeMap<usize, usize>,
}

impl CoordinateDictionary {
    /// Number of flights kept.
    #[inline]
    pub fn len(&self) -> usize {
        self.coords.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    /// Coordinate set of the flight with encoded index `encoded`.
    pub fn get(&self, encoded: usize) -> Option<&CoordinateSet> {
        self.by_index.get(&encoded).map(|&row| &self.coords[row])
    }

    /// Total number of samples across every kept flight.
    pub fn total_points(&self) -> usize {
        self.coords.iter().map(CoordinateSet::len).sum()
    }
}

/// Collect each flight's trajectory into a coordinate set.
///
/// Flights are taken in `flight_ids` order and capped at `max_flights`; IDs
/// unknown to `encoder` are skipped. Samples keep table row order and are cut
/// to `max_samples` when given. A flight without rows in `table` gets an empty
/// coordinate set.
pub fn build_coordinate_dict(
    table: &FlightTable,
    encoder: &FlightEncoder,
    flight_ids: &[String],
    max_flights: usize,
    max_samples: Option<usize>,
) -> CoordinateDictionary {
    let mut samples: HashMap<&str, Vec<[f64; 2]>> = HashMap::new();
    for p in table.rows() {
        samples
            .entry(p.flight_id.as_str())
            .or_default()
            .push([p.latitude, p.longitude]);
    }

    let mut dict = CoordinateDictionary::default();

    for id in flight_ids {
        if dict.len() >= max_flights {
            break;
        }
        let Some(encoded) = encoder.encode(id) else {
            log::debug!("flight {} is not encoded, skipping", id);
            continue;
        };
        if dict.by_index.contains_key(&encoded) {
            continue;
        }

        let mut points = samples.get(id.as_str()).cloned().unwrap_or_default();
        if let Some(limit) = max_samples {
            points.truncate(limit);
        }

        dict.by_index.insert(encoded, dict.coords.len());
        dict.encoded.push(encoded);
        dict.coords.push(CoordinateSet {
            flight_id: id.clone(),
            encoded,
            points,
        });
    }

    dict
}
