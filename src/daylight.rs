/// Daylight gate: only check the station while birds could be singing.
///
/// Sunrise and sunset are computed with the NOAA solar position equations
/// (apparent sunrise, 0.833° below the horizon for refraction and the solar
/// disc) for the calendar date at the configured location's timezone. The
/// activity window runs from `sunrise + sunrise_offset` to
/// `sunset + sunset_offset`, exclusive at both ends.
///
/// At high latitudes the sun may not rise or set at all on a given date.
/// That is reported as a `DaylightError`, never folded into "always open" or
/// "always closed"; the caller decides what to do with it.

use crate::config::LocationConfig;
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc};

/// Solar zenith at apparent sunrise/sunset, in degrees.
const SUNRISE_ZENITH_DEG: f64 = 90.833;

/// Julian day of the J2000.0 epoch (2000-01-01 12:00 UTC).
const J2000: f64 = 2_451_545.0;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum DaylightError {
    #[error("the sun does not rise on {date} at latitude {latitude} (polar night)")]
    NoSunrise { date: NaiveDate, latitude: f64 },

    #[error("the sun does not set on {date} at latitude {latitude} (midnight sun)")]
    NoSunset { date: NaiveDate, latitude: f64 },

    #[error("shifted activity window for {date} is out of range")]
    WindowOutOfRange { date: NaiveDate },
}

// ---------------------------------------------------------------------------
// Solar computation
// ---------------------------------------------------------------------------

/// Sunrise and sunset for one calendar date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SunTimes {
    pub sunrise: DateTime<Utc>,
    pub sunset: DateTime<Utc>,
}

/// Computes sunrise and sunset for `date` at the given coordinates.
///
/// `longitude` is positive east. Event times are returned in UTC and may fall
/// on the neighbouring UTC date.
pub fn sun_times(date: NaiveDate, latitude: f64, longitude: f64) -> Result<SunTimes, DaylightError> {
    let sunrise = solar_event(date, latitude, longitude, true)?;
    let sunset = solar_event(date, latitude, longitude, false)?;
    Ok(SunTimes { sunrise, sunset })
}

fn solar_event(
    date: NaiveDate,
    latitude: f64,
    longitude: f64,
    rising: bool,
) -> Result<DateTime<Utc>, DaylightError> {
    let midnight = Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN));
    let jd_midnight = julian_day(date);

    // Start from solar noon, then refine once with the sun's position at the
    // estimated event time.
    let mut minutes = 720.0 - 4.0 * longitude;
    for _ in 0..2 {
        let jc = (jd_midnight + minutes / 1440.0 - J2000) / 36525.0;
        let (declination, equation_of_time) = solar_position(jc);

        let cos_hour_angle = SUNRISE_ZENITH_DEG.to_radians().cos()
            / (latitude.to_radians().cos() * declination.to_radians().cos())
            - latitude.to_radians().tan() * declination.to_radians().tan();

        if cos_hour_angle > 1.0 {
            return Err(DaylightError::NoSunrise { date, latitude });
        }
        if cos_hour_angle < -1.0 {
            return Err(DaylightError::NoSunset { date, latitude });
        }

        let hour_angle = cos_hour_angle.acos().to_degrees();
        let hour_angle = if rising { hour_angle } else { -hour_angle };
        minutes = 720.0 - 4.0 * (longitude + hour_angle) - equation_of_time;
    }

    Ok(midnight + Duration::milliseconds((minutes * 60_000.0).round() as i64))
}

/// Julian day at 00:00 UTC of `date`.
fn julian_day(date: NaiveDate) -> f64 {
    1_721_424.5 + date.num_days_from_ce() as f64
}

/// Solar declination (degrees) and equation of time (minutes) for the given
/// Julian century.
fn solar_position(jc: f64) -> (f64, f64) {
    let mean_long = (280.46646 + jc * (36000.76983 + jc * 0.0003032)).rem_euclid(360.0);
    let mean_anomaly = 357.52911 + jc * (35999.05029 - 0.0001537 * jc);
    let eccentricity = 0.016708634 - jc * (0.000042037 + 0.0000001267 * jc);

    let m = mean_anomaly.to_radians();
    let center = m.sin() * (1.914602 - jc * (0.004817 + 0.000014 * jc))
        + (2.0 * m).sin() * (0.019993 - 0.000101 * jc)
        + (3.0 * m).sin() * 0.000289;

    let true_long = mean_long + center;
    let omega = (125.04 - 1934.136 * jc).to_radians();
    let apparent_long = true_long - 0.00569 - 0.00478 * omega.sin();

    let mean_obliquity =
        23.0 + (26.0 + (21.448 - jc * (46.815 + jc * (0.00059 - jc * 0.001813))) / 60.0) / 60.0;
    let obliquity = mean_obliquity + 0.00256 * omega.cos();

    let declination = (obliquity.to_radians().sin() * apparent_long.to_radians().sin())
        .asin()
        .to_degrees();

    let y = (obliquity.to_radians() / 2.0).tan().powi(2);
    let l0 = mean_long.to_radians();
    let equation_of_time = 4.0
        * (y * (2.0 * l0).sin() - 2.0 * eccentricity * m.sin()
            + 4.0 * eccentricity * y * m.sin() * (2.0 * l0).cos()
            - 0.5 * y * y * (4.0 * l0).sin()
            - 1.25 * eccentricity * eccentricity * (2.0 * m).sin())
        .to_degrees();

    (declination, equation_of_time)
}

// ---------------------------------------------------------------------------
// Gate
// ---------------------------------------------------------------------------

/// The shifted sunrise/sunset window for one date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivityWindow {
    pub opens: DateTime<Utc>,
    pub closes: DateTime<Utc>,
}

impl ActivityWindow {
    /// Strictly between `opens` and `closes`.
    pub fn contains(&self, now: DateTime<Utc>) -> bool {
        self.opens < now && now < self.closes
    }
}

/// Builds the activity window for the calendar date `now` falls on in the
/// location's timezone.
pub fn activity_window(
    location: &LocationConfig,
    now: DateTime<Utc>,
    sunrise_offset_hours: f64,
    sunset_offset_hours: f64,
) -> Result<ActivityWindow, DaylightError> {
    let local_date = now.with_timezone(&location.tz).date_naive();
    let sun = sun_times(solar_date(location, local_date), location.lat, location.lon)?;

    let shift = |event: DateTime<Utc>, offset: f64| {
        hours(offset)
            .and_then(|delta| event.checked_add_signed(delta))
            .ok_or(DaylightError::WindowOutOfRange { date: local_date })
    };

    Ok(ActivityWindow {
        opens: shift(sun.sunrise, sunrise_offset_hours)?,
        closes: shift(sun.sunset, sunset_offset_hours)?,
    })
}

/// The UTC date whose solar noon is nearest local noon on `local_date`.
///
/// `sun_times` anchors its search on the UTC date. Zones far from their
/// solar longitude (Pacific/Kiritimati is UTC+14 at 157° W) would otherwise
/// get the neighbouring local day's sunrise and sunset.
fn solar_date(location: &LocationConfig, local_date: NaiveDate) -> NaiveDate {
    let local_noon = local_date.and_time(NaiveTime::MIN + Duration::hours(12));
    let Some(noon_utc) = location
        .tz
        .from_local_datetime(&local_noon)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
    else {
        return local_date;
    };

    let solar_noon_offset = Duration::milliseconds(((720.0 - 4.0 * location.lon) * 60_000.0).round() as i64);
    (noon_utc - solar_noon_offset + Duration::hours(12)).date_naive()
}

/// True when `now` is inside the shifted daylight window.
pub fn should_run(
    location: &LocationConfig,
    now: DateTime<Utc>,
    sunrise_offset_hours: f64,
    sunset_offset_hours: f64,
) -> Result<bool, DaylightError> {
    let window = activity_window(location, now, sunrise_offset_hours, sunset_offset_hours)?;
    log::debug!(
        "Activity window {} .. {} (now {})",
        window.opens.with_timezone(&location.tz),
        window.closes.with_timezone(&location.tz),
        now.with_timezone(&location.tz)
    );
    Ok(window.contains(now))
}

fn hours(h: f64) -> Option<Duration> {
    Duration::try_milliseconds((h * 3_600_000.0).round() as i64)
}
