/// Shared data types for a single station check.
///
/// A `Snapshot` is what one query against the BirdWeather API produced for one
/// aggregation period. Failed fetches still produce a snapshot: the failure is
/// carried in `status` and the data fields stay empty, meaning "unknown" rather
/// than "no detections".

use chrono::{DateTime, FixedOffset};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

// ---------------------------------------------------------------------------
// Aggregation period
// ---------------------------------------------------------------------------

/// Aggregation period of a `topSpecies` query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Granularity {
    Hourly,
    Daily,
}

impl Granularity {
    /// Number of ranked species requested from the API.
    pub fn species_limit(self) -> u32 {
        match self {
            Granularity::Hourly => 10,
            Granularity::Daily => 40,
        }
    }

    /// GraphQL period unit (`period: {count: 1, unit: ...}`).
    pub fn period_unit(self) -> &'static str {
        match self {
            Granularity::Hourly => "hour",
            Granularity::Daily => "day",
        }
    }

    /// Key wrapping the species list in the JSON payload.
    pub fn json_key(self) -> &'static str {
        match self {
            Granularity::Hourly => "hourlytopspecies",
            Granularity::Daily => "dailytopspecies",
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Granularity::Hourly => write!(f, "hourly"),
            Granularity::Daily => write!(f, "daily"),
        }
    }
}

// ---------------------------------------------------------------------------
// Fetch status
// ---------------------------------------------------------------------------

/// Outcome of a single API query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchStatus {
    Ok,
    /// Transport failure, or a 200 response whose body could not be used.
    FetchError(String),
    /// Any HTTP status other than 200.
    BadResponse(u16),
}

impl FetchStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, FetchStatus::Ok)
    }
}

impl fmt::Display for FetchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchStatus::Ok => write!(f, "OK"),
            FetchStatus::FetchError(detail) => write!(f, "ERROR FETCHING DATA: {}", detail),
            FetchStatus::BadResponse(code) => write!(f, "BAD RESPONSE: {}", code),
        }
    }
}

// ---------------------------------------------------------------------------
// Species counts
// ---------------------------------------------------------------------------

/// One ranked species entry, as rendered in the JSON-wrapped payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeciesCount {
    pub name: String,
    pub count: u64,
}

/// Species common name -> detection count, in API ranking order.
///
/// Names are unique. Inserting an existing name replaces its count but keeps
/// its original position. Serializes as a JSON object whose key order is the
/// ranking order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpeciesCounts {
    entries: Vec<SpeciesCount>,
}

impl SpeciesCounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, count: u64) {
        let name = name.into();
        match self.entries.iter_mut().find(|e| e.name == name) {
            Some(existing) => existing.count = count,
            None => self.entries.push(SpeciesCount { name, count }),
        }
    }

    pub fn get(&self, name: &str) -> Option<u64> {
        self.entries.iter().find(|e| e.name == name).map(|e| e.count)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SpeciesCount> {
        self.entries.iter()
    }

    pub fn as_slice(&self) -> &[SpeciesCount] {
        &self.entries
    }
}

impl<S: Into<String>> FromIterator<(S, u64)> for SpeciesCounts {
    fn from_iter<I: IntoIterator<Item = (S, u64)>>(iter: I) -> Self {
        let mut counts = SpeciesCounts::new();
        for (name, count) in iter {
            counts.insert(name, count);
        }
        counts
    }
}

impl Serialize for SpeciesCounts {
    fn serialize<Ser: Serializer>(&self, serializer: Ser) -> Result<Ser::Ok, Ser::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for entry in &self.entries {
            map.serialize_entry(&entry.name, &entry.count)?;
        }
        map.end()
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Parsed result of one API query for one aggregation period.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub granularity: Granularity,
    pub station_name: String,
    /// Keeps the offset reported by the API.
    pub last_detection_at: Option<DateTime<FixedOffset>>,
    pub species: SpeciesCounts,
    pub status: FetchStatus,
}

impl Snapshot {
    /// A degraded snapshot: empty data, failure recorded in `status`.
    pub fn failed(granularity: Granularity, status: FetchStatus) -> Self {
        Self {
            granularity,
            station_name: String::new(),
            last_detection_at: None,
            species: SpeciesCounts::new(),
            status,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status.is_ok()
    }
}
