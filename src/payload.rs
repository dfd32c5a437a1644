/// MQTT payload composition.
///
/// Every run publishes the same eight messages under
/// `<topic base>/<station name>`:
///
/// | suffix                    | payload                                          |
/// |---------------------------|--------------------------------------------------|
/// | `/stats`                  | `{"stationID", "lastDetect", "timeNow"}`         |
/// | `/TopHourlySpecies`       | hourly species -> count object                   |
/// | `/TopDailySpecies`        | daily species -> count object                    |
/// | `/TopHourlySpecies/json`  | `{"hourlytopspecies": [{name, count}, ...]}`     |
/// | `/TopDailySpecies/json`   | `{"dailytopspecies": [{name, count}, ...]}`      |
/// | `/TopHourlySpecies/plain` | `name: count` lines                              |
/// | `/TopDailySpecies/plain`  | `name: count` lines                              |
/// | (base topic)              | `ONLINE` / `OFFLINE`                             |
///
/// Snapshots from failed fetches still produce all eight messages, with empty
/// collections and strings, so retained dashboard values are replaced rather
/// than left stale.

use crate::model::{Granularity, Snapshot, SpeciesCount};
use crate::monitor::Verdict;
use chrono::{DateTime, FixedOffset, TimeZone};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

/// Topic suffixes, in publish order.
pub const TOPIC_SUFFIXES: [&str; 8] = [
    "/stats",
    "/TopHourlySpecies",
    "/TopDailySpecies",
    "/TopHourlySpecies/json",
    "/TopDailySpecies/json",
    "/TopHourlySpecies/plain",
    "/TopDailySpecies/plain",
    "",
];

// ---------------------------------------------------------------------------
// Batch
// ---------------------------------------------------------------------------

/// One outbound broker message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub topic: String,
    pub payload: String,
    pub qos: u8,
    pub retain: bool,
}

impl Message {
    fn new(topic: String, payload: String) -> Self {
        Self {
            topic,
            payload,
            qos: 0,
            retain: false,
        }
    }
}

/// The messages produced by one run, in publish order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishBatch {
    messages: Vec<Message>,
}

impl PublishBatch {
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }

    /// Payload published on `topic`, if any.
    pub fn payload_for(&self, topic: &str) -> Option<&str> {
        self.messages
            .iter()
            .find(|m| m.topic == topic)
            .map(|m| m.payload.as_str())
    }
}

// ---------------------------------------------------------------------------
// Payload rendering
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct StatsPayload<'a> {
    #[serde(rename = "stationID")]
    station_id: &'a str,
    #[serde(rename = "lastDetect")]
    last_detect: String,
    #[serde(rename = "timeNow")]
    time_now: String,
}

/// `{"<period>topspecies": [...]}` with a period-dependent key.
struct SpeciesList<'a> {
    key: &'static str,
    species: &'a [SpeciesCount],
}

impl Serialize for SpeciesList<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(self.key, self.species)?;
        map.end()
    }
}

/// `YYYY-MM-DD HH:MM:SS±HH:MM`, keeping the timestamp's own offset.
pub fn render_timestamp<Tz: TimeZone>(dt: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    dt.format("%Y-%m-%d %H:%M:%S%:z").to_string()
}

/// Species mapping as a JSON object in ranking order.
pub fn species_mapping(snapshot: &Snapshot) -> String {
    encode(&snapshot.species)
}

/// Species list wrapped under `hourlytopspecies` / `dailytopspecies`.
pub fn species_json(snapshot: &Snapshot) -> String {
    encode(&SpeciesList {
        key: snapshot.granularity.json_key(),
        species: snapshot.species.as_slice(),
    })
}

/// `name: count` lines joined with `\n`; empty when there are no species.
pub fn species_plain(snapshot: &Snapshot) -> String {
    snapshot
        .species
        .iter()
        .map(|s| format!("{}: {}", s.name, s.count))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Reads a `species_json` payload back into its ordered entries.
pub fn decode_species_json(
    payload: &str,
    granularity: Granularity,
) -> Result<Vec<SpeciesCount>, serde_json::Error> {
    let mut wrapped: BTreeMap<String, Vec<SpeciesCount>> = serde_json::from_str(payload)?;
    Ok(wrapped.remove(granularity.json_key()).unwrap_or_default())
}

fn encode<T: Serialize>(value: &T) -> String {
    // Only string keys and integers are serialized here, which cannot fail.
    serde_json::to_string(value).unwrap_or_else(|e| {
        log::error!("Failed to encode payload: {}", e);
        String::new()
    })
}

// ---------------------------------------------------------------------------
// Composition
// ---------------------------------------------------------------------------

/// Display name used in topics: the hourly station name, else the daily one,
/// else the station id.
pub fn station_display_name<'a>(hourly: &'a Snapshot, daily: &'a Snapshot, station_id: &'a str) -> &'a str {
    [hourly.station_name.as_str(), daily.station_name.as_str()]
        .into_iter()
        .find(|name| !name.is_empty())
        .unwrap_or(station_id)
}

/// Builds the eight-message batch for one run.
pub fn compose(
    hourly: &Snapshot,
    daily: &Snapshot,
    verdict: Verdict,
    topic_base: &str,
    station_id: &str,
    now: DateTime<FixedOffset>,
) -> PublishBatch {
    let base = format!("{}/{}", topic_base, station_display_name(hourly, daily, station_id));

    let stats = encode(&StatsPayload {
        station_id,
        last_detect: hourly
            .last_detection_at
            .as_ref()
            .map(render_timestamp)
            .unwrap_or_default(),
        time_now: render_timestamp(&now),
    });

    let payloads = [
        stats,
        species_mapping(hourly),
        species_mapping(daily),
        species_json(hourly),
        species_json(daily),
        species_plain(hourly),
        species_plain(daily),
        verdict.to_string(),
    ];

    let messages = TOPIC_SUFFIXES
        .iter()
        .zip(payloads)
        .map(|(suffix, payload)| Message::new(format!("{}{}", base, suffix), payload))
        .collect();

    PublishBatch { messages }
}
