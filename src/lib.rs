/// bwcheck: BirdWeather station check-and-forward agent.
///
/// # Module structure
///
/// ```text
/// bwcheck
/// ├── model       shared types (Granularity, FetchStatus, SpeciesCounts, Snapshot)
/// ├── config      run configuration store (bw-check.toml)
/// ├── daylight    sunrise/sunset and the activity-window gate
/// ├── ingest
/// │   ├── birdweather  GraphQL query, response parsing, fetch
/// │   └── fixtures     (test only) representative API payloads
/// ├── monitor     online/offline verdict from the last detection
/// ├── payload     the eight-message MQTT batch
/// ├── broker      Publisher trait and the MQTT implementation
/// ├── runlog      one-line run summary
/// └── check       a full run, gate to summary
/// ```
pub mod broker;
pub mod check;
pub mod config;
pub mod daylight;
pub mod ingest;
pub mod model;
pub mod monitor;
pub mod payload;
pub mod runlog;
