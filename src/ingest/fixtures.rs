/// Test fixtures: representative JSON payloads from the BirdWeather GraphQL API.
///
/// Trimmed to the fields the parser reads, but shaped like the real response
/// to the station query sent by `build_station_query`:
///
///   data.station
///     .name               station display name (used in MQTT topics)
///     .latestDetectionAt  ISO 8601 with the station's UTC offset, or null
///     .topSpecies[]       ranked, highest count first
///       .count
///       .species.commonName
///       .speciesId
///
/// GraphQL reports lookup failures with HTTP 200, `data.station: null` and an
/// `errors` array, so a 200 alone does not mean usable data.

/// Hourly query result: three species, last detection 12:00 CDT.
pub(crate) fn fixture_hourly_json() -> &'static str {
    r#"{
      "data": {
        "station": {
          "coords": { "lat": 46.69, "lon": -92.05 },
          "id": "2265",
          "latestDetectionAt": "2024-05-01T12:00:00.000-05:00",
          "name": "Lakeside Feeder",
          "topSpecies": [
            { "count": 14, "species": { "commonName": "Black-capped Chickadee" }, "speciesId": "101" },
            { "count": 5, "species": { "commonName": "American Robin" }, "speciesId": "202" },
            { "count": 2, "species": { "commonName": "Blue Jay" }, "speciesId": "303" }
          ]
        }
      }
    }"#
}

/// Daily query result for the same station.
pub(crate) fn fixture_daily_json() -> &'static str {
    r#"{
      "data": {
        "station": {
          "coords": { "lat": 46.69, "lon": -92.05 },
          "id": "2265",
          "latestDetectionAt": "2024-05-01T12:00:00.000-05:00",
          "name": "Lakeside Feeder",
          "topSpecies": [
            { "count": 212, "species": { "commonName": "Black-capped Chickadee" }, "speciesId": "101" },
            { "count": 98, "species": { "commonName": "American Robin" }, "speciesId": "202" },
            { "count": 41, "species": { "commonName": "Blue Jay" }, "speciesId": "303" },
            { "count": 7, "species": { "commonName": "Common Loon" }, "speciesId": "404" }
          ]
        }
      }
    }"#
}

/// Quiet hour: station is reporting but nothing was detected.
pub(crate) fn fixture_no_species_json() -> &'static str {
    r#"{
      "data": {
        "station": {
          "id": "2265",
          "latestDetectionAt": "2024-05-01T09:47:13.000-05:00",
          "name": "Lakeside Feeder",
          "topSpecies": []
        }
      }
    }"#
}

/// New station that has never detected anything.
pub(crate) fn fixture_never_detected_json() -> &'static str {
    r#"{
      "data": {
        "station": {
          "id": "9999",
          "latestDetectionAt": null,
          "name": "Brand New Station",
          "topSpecies": []
        }
      }
    }"#
}

/// Same species listed twice; the later count wins.
pub(crate) fn fixture_duplicate_species_json() -> &'static str {
    r#"{
      "data": {
        "station": {
          "id": "2265",
          "latestDetectionAt": "2024-05-01T12:00:00.000-05:00",
          "name": "Lakeside Feeder",
          "topSpecies": [
            { "count": 5, "species": { "commonName": "American Robin" }, "speciesId": "202" },
            { "count": 2, "species": { "commonName": "Blue Jay" }, "speciesId": "303" },
            { "count": 6, "species": { "commonName": "American Robin" }, "speciesId": "202" }
          ]
        }
      }
    }"#
}

/// Unknown station id: HTTP 200 with a GraphQL error.
pub(crate) fn fixture_unknown_station_json() -> &'static str {
    r#"{
      "data": { "station": null },
      "errors": [{ "message": "Station not found", "path": ["station"] }]
    }"#
}

/// Timestamp the parser cannot read.
pub(crate) fn fixture_bad_timestamp_json() -> &'static str {
    r#"{
      "data": {
        "station": {
          "id": "2265",
          "latestDetectionAt": "yesterday-ish",
          "name": "Lakeside Feeder",
          "topSpecies": []
        }
      }
    }"#
}
