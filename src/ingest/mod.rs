/// Remote data sources.
///
/// - `birdweather`: BirdWeather GraphQL API query construction, response
///   parsing and the fetch that degrades instead of failing
/// - `fixtures` (test only): representative API response payloads

pub mod birdweather;

#[cfg(test)]
pub(crate) mod fixtures;
