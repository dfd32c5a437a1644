/// BirdWeather GraphQL API client.
///
/// Builds the station query for an aggregation period, POSTs it to the
/// GraphQL endpoint and parses the answer into a `Snapshot`:
///   https://app.birdweather.com/graphql
///
/// Fetching never returns an error. Transport failures, non-200 responses and
/// unusable bodies become a degraded snapshot whose `status` says what went
/// wrong, so a run always has something to publish.

use crate::model::{FetchStatus, Granularity, Snapshot, SpeciesCounts};
use chrono::{DateTime, FixedOffset};
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;

/// Per-request timeout for API calls.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// Serde structures for the GraphQL response
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct GraphQlResponse {
    data: Option<StationData>,
}

#[derive(Deserialize)]
struct StationData {
    station: Option<StationNode>,
}

#[derive(Deserialize)]
struct StationNode {
    name: String,
    #[serde(rename = "latestDetectionAt")]
    latest_detection_at: Option<String>,
    #[serde(rename = "topSpecies", default)]
    top_species: Vec<TopSpecies>,
}

#[derive(Deserialize)]
struct TopSpecies {
    count: u64,
    species: SpeciesNode,
}

#[derive(Deserialize)]
struct SpeciesNode {
    #[serde(rename = "commonName")]
    common_name: String,
}

/// Why a 200 response could not be turned into a snapshot.
#[derive(Debug, thiserror::Error)]
pub enum ResponseError {
    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("response has no station data")]
    MissingStation,

    #[error("bad latestDetectionAt '{value}': {source}")]
    Timestamp {
        value: String,
        source: chrono::ParseError,
    },
}

// ---------------------------------------------------------------------------
// Query construction
// ---------------------------------------------------------------------------

/// Builds the GraphQL station query for one aggregation period: station
/// name, last detection and the top 10 (hourly) or 40 (daily) species.
pub fn build_station_query(station_id: &str, granularity: Granularity) -> String {
    format!(
        "{{station(id: {}), {{coords{{lat, lon}}, id, latestDetectionAt, name, \
         topSpecies(limit: {}, period: {{count: 1, unit: \"{}\"}}) \
         {{count, species {{commonName}}, speciesId}}}}}}",
        station_id,
        granularity.species_limit(),
        granularity.period_unit()
    )
}

// ---------------------------------------------------------------------------
// Response parsing
// ---------------------------------------------------------------------------

/// Parses a GraphQL response body into an `OK` snapshot.
///
/// # Errors
/// - `ResponseError::Json`: malformed JSON or unexpected structure.
/// - `ResponseError::MissingStation`: `data` or `data.station` is null
///   (GraphQL-level error such as an unknown station id).
/// - `ResponseError::Timestamp`: `latestDetectionAt` is not RFC 3339.
pub fn parse_station_response(json: &str, granularity: Granularity) -> Result<Snapshot, ResponseError> {
    let response: GraphQlResponse = serde_json::from_str(json)?;

    let station = response
        .data
        .and_then(|d| d.station)
        .ok_or(ResponseError::MissingStation)?;

    let last_detection_at = station
        .latest_detection_at
        .map(|value| parse_detection_time(&value))
        .transpose()?;

    let species: SpeciesCounts = station
        .top_species
        .into_iter()
        .map(|entry| (entry.species.common_name, entry.count))
        .collect();

    Ok(Snapshot {
        granularity,
        station_name: station.name,
        last_detection_at,
        species,
        status: FetchStatus::Ok,
    })
}

fn parse_detection_time(value: &str) -> Result<DateTime<FixedOffset>, ResponseError> {
    DateTime::parse_from_rfc3339(value).map_err(|source| ResponseError::Timestamp {
        value: value.to_string(),
        source,
    })
}

// ---------------------------------------------------------------------------
// Fetching
// ---------------------------------------------------------------------------

/// HTTP client used for API calls, with the per-request timeout applied.
pub fn http_client() -> Result<reqwest::blocking::Client, reqwest::Error> {
    reqwest::blocking::Client::builder().timeout(FETCH_TIMEOUT).build()
}

/// Runs one station query and returns the resulting snapshot.
///
/// Exactly one request is made; there are no retries. Failures are recorded
/// in the snapshot's `status` and logged, never returned.
pub fn fetch_snapshot(
    client: &reqwest::blocking::Client,
    url: &str,
    station_id: &str,
    granularity: Granularity,
) -> Snapshot {
    log::debug!("Fetching {} data for station {} from {}", granularity, station_id, url);

    let query = build_station_query(station_id, granularity);
    let response = match client
        .post(url)
        .json(&serde_json::json!({ "query": query }))
        .send()
    {
        Ok(response) => response,
        Err(e) => {
            let status = FetchStatus::FetchError(e.to_string());
            log::warn!("{} fetch failed: {}", granularity, status);
            return Snapshot::failed(granularity, status);
        }
    };

    if response.status() != StatusCode::OK {
        let status = FetchStatus::BadResponse(response.status().as_u16());
        log::warn!("{} fetch failed: {}", granularity, status);
        return Snapshot::failed(granularity, status);
    }

    let snapshot = response
        .text()
        .map_err(|e| format!("failed to read response body: {}", e))
        .and_then(|body| {
            parse_station_response(&body, granularity)
                .map_err(|e| format!("invalid response body: {}", e))
        });

    match snapshot {
        Ok(snapshot) => {
            log::debug!(
                "{} data fetched: station '{}', {} species",
                granularity,
                snapshot.station_name,
                snapshot.species.len()
            );
            snapshot
        }
        Err(detail) => {
            let status = FetchStatus::FetchError(detail);
            log::warn!("{} fetch failed: {}", granularity, status);
            Snapshot::failed(granularity, status)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::fixtures::*;
    use std::io::Read;
    use std::thread;

    /// Serves exactly one request with the given status and body and hands
    /// back the request body it received.
    fn serve_once(status: u16, body: &'static str) -> (String, thread::JoinHandle<String>) {
        let server = tiny_http::Server::http("127.0.0.1:0").unwrap();
        let url = format!("http://{}/graphql", server.server_addr().to_ip().unwrap());

        let handle = thread::spawn(move || {
            let mut request = server.recv().unwrap();
            let mut received = String::new();
            request.as_reader().read_to_string(&mut received).unwrap();
            let response = tiny_http::Response::from_string(body).with_status_code(status);
            request.respond(response).unwrap();
            received
        });

        (url, handle)
    }

    // --- Query construction -------------------------------------------------

    #[test]
    fn test_hourly_query_asks_for_top_ten_in_the_last_hour() {
        let query = build_station_query("2265", Granularity::Hourly);
        assert!(query.starts_with("{station(id: 2265), {"), "got: {}", query);
        assert!(query.contains("topSpecies(limit: 10, period: {count: 1, unit: \"hour\"})"));
        assert!(query.contains("latestDetectionAt"));
        assert!(query.contains("species {commonName}"));
    }

    #[test]
    fn test_daily_query_asks_for_top_forty_in_the_last_day() {
        let query = build_station_query("2265", Granularity::Daily);
        assert!(query.contains("topSpecies(limit: 40, period: {count: 1, unit: \"day\"})"));
    }

    #[test]
    fn test_query_braces_are_balanced() {
        let query = build_station_query("2265", Granularity::Hourly);
        let open = query.matches('{').count();
        let close = query.matches('}').count();
        assert_eq!(open, close, "unbalanced query: {}", query);
    }

    // --- Parsing: happy path ------------------------------------------------

    #[test]
    fn test_parse_hourly_fixture() {
        let snapshot = parse_station_response(fixture_hourly_json(), Granularity::Hourly)
            .expect("valid fixture should parse");

        assert_eq!(snapshot.station_name, "Lakeside Feeder");
        assert_eq!(snapshot.status, FetchStatus::Ok);
        assert_eq!(snapshot.species.len(), 3);
        assert_eq!(snapshot.species.get("American Robin"), Some(5));
    }

    #[test]
    fn test_parse_keeps_api_ranking_order() {
        let snapshot = parse_station_response(fixture_daily_json(), Granularity::Daily).unwrap();
        let names: Vec<&str> = snapshot.species.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["Black-capped Chickadee", "American Robin", "Blue Jay", "Common Loon"]
        );
    }

    #[test]
    fn test_parse_keeps_detection_offset() {
        let snapshot = parse_station_response(fixture_hourly_json(), Granularity::Hourly).unwrap();
        let last = snapshot.last_detection_at.expect("timestamp should be present");
        assert_eq!(last.offset().local_minus_utc(), -5 * 3600);
        assert_eq!(last.to_rfc3339(), "2024-05-01T12:00:00-05:00");
    }

    #[test]
    fn test_parse_empty_species_list() {
        let snapshot = parse_station_response(fixture_no_species_json(), Granularity::Hourly).unwrap();
        assert!(snapshot.species.is_empty());
        assert!(snapshot.last_detection_at.is_some());
    }

    #[test]
    fn test_parse_null_last_detection() {
        let snapshot =
            parse_station_response(fixture_never_detected_json(), Granularity::Hourly).unwrap();
        assert!(snapshot.last_detection_at.is_none());
        assert_eq!(snapshot.station_name, "Brand New Station");
    }

    #[test]
    fn test_parse_duplicate_species_later_count_wins() {
        let snapshot =
            parse_station_response(fixture_duplicate_species_json(), Granularity::Hourly).unwrap();
        assert_eq!(snapshot.species.len(), 2);
        assert_eq!(snapshot.species.as_slice()[0].name, "American Robin");
        assert_eq!(snapshot.species.get("American Robin"), Some(6));
    }

    // --- Parsing: error cases -----------------------------------------------

    #[test]
    fn test_parse_unknown_station_is_missing_station() {
        let result = parse_station_response(fixture_unknown_station_json(), Granularity::Hourly);
        assert!(matches!(result, Err(ResponseError::MissingStation)), "got {:?}", result);
    }

    #[test]
    fn test_parse_bad_timestamp() {
        let result = parse_station_response(fixture_bad_timestamp_json(), Granularity::Hourly);
        assert!(matches!(result, Err(ResponseError::Timestamp { .. })), "got {:?}", result);
    }

    #[test]
    fn test_parse_malformed_json() {
        let result = parse_station_response("{ not json", Granularity::Daily);
        assert!(matches!(result, Err(ResponseError::Json(_))));
    }

    // --- Fetching -----------------------------------------------------------

    #[test]
    fn test_fetch_posts_query_and_parses_result() {
        let (url, server) = serve_once(200, fixture_hourly_json());
        let client = http_client().unwrap();

        let snapshot = fetch_snapshot(&client, &url, "2265", Granularity::Hourly);
        let request_body = server.join().unwrap();

        assert!(snapshot.is_ok(), "status: {}", snapshot.status);
        assert_eq!(snapshot.species.len(), 3);

        let sent: serde_json::Value = serde_json::from_str(&request_body).unwrap();
        assert_eq!(
            sent["query"].as_str().unwrap(),
            build_station_query("2265", Granularity::Hourly)
        );
    }

    #[test]
    fn test_fetch_non_200_is_bad_response() {
        let (url, server) = serve_once(500, "internal error");
        let client = http_client().unwrap();

        let snapshot = fetch_snapshot(&client, &url, "2265", Granularity::Hourly);
        server.join().unwrap();

        assert_eq!(snapshot.status, FetchStatus::BadResponse(500));
        assert!(snapshot.species.is_empty());
        assert!(snapshot.station_name.is_empty());
    }

    #[test]
    fn test_fetch_unusable_body_is_fetch_error() {
        let (url, server) = serve_once(200, fixture_unknown_station_json());
        let client = http_client().unwrap();

        let snapshot = fetch_snapshot(&client, &url, "1", Granularity::Daily);
        server.join().unwrap();

        match snapshot.status {
            FetchStatus::FetchError(detail) => {
                assert!(detail.starts_with("invalid response body"), "got: {}", detail)
            }
            other => panic!("expected FetchError, got {:?}", other),
        }
    }

    #[test]
    fn test_fetch_connection_refused_is_fetch_error() {
        // Bind then drop to get a port nobody is listening on.
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let url = format!("http://127.0.0.1:{}/graphql", port);
        let client = http_client().unwrap();

        let snapshot = fetch_snapshot(&client, &url, "2265", Granularity::Hourly);

        assert!(matches!(snapshot.status, FetchStatus::FetchError(_)));
        assert!(snapshot.status.to_string().starts_with("ERROR FETCHING DATA: "));
    }
}
