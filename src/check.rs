/// One station check, start to finish.
///
/// 1. Daylight gate (may skip the whole run)
/// 2. Hourly and daily snapshots, fetched in parallel
/// 3. Online/offline verdict from the hourly snapshot
/// 4. Eight-message batch
/// 5. Single batched publish
/// 6. Summary line for the run log
///
/// Nothing after the gate aborts the run. Failed fetches are degraded
/// snapshots and a failed publish is a status, so every run that passes the
/// gate publishes and records something.

use crate::broker::{PublishStatus, Publisher};
use crate::config::{BirdweatherConfig, RunConfiguration};
use crate::daylight;
use crate::ingest::birdweather::{fetch_snapshot, http_client};
use crate::model::{FetchStatus, Granularity, Snapshot};
use crate::monitor::{self, Verdict};
use crate::payload::{self, PublishBatch};
use crate::runlog;
use chrono::{DateTime, FixedOffset, Utc};
use std::path::Path;
use std::sync::mpsc;
use threadpool::ThreadPool;

/// What a run did.
#[derive(Debug)]
pub enum RunOutcome {
    /// Outside the daylight window: nothing fetched or published.
    Skipped,
    Completed(RunReport),
}

/// Everything a completed run produced.
#[derive(Debug)]
pub struct RunReport {
    pub hourly: Snapshot,
    pub daily: Snapshot,
    pub verdict: Verdict,
    pub batch: PublishBatch,
    pub publish_status: PublishStatus,
}

// ---------------------------------------------------------------------------
// Steps
// ---------------------------------------------------------------------------

/// Applies the daylight gate. A gate that cannot be evaluated (no sunrise or
/// sunset today) lets the run through.
pub fn gate_allows(config: &RunConfiguration, now: DateTime<Utc>) -> bool {
    if !config.run.limit_times {
        log::debug!("Daylight gate disabled");
        return true;
    }

    log::debug!("Checking sunrise and sunset times");
    match daylight::should_run(
        &config.location,
        now,
        config.run.sunrise_offset,
        config.run.sunset_offset,
    ) {
        Ok(allowed) => allowed,
        Err(e) => {
            log::warn!("Daylight gate unavailable, running anyway: {}", e);
            true
        }
    }
}

/// Fetches the hourly and daily snapshots on two worker threads.
///
/// Each fetch is independent; one failing does not affect the other. The
/// result is always `(hourly, daily)` regardless of completion order.
pub fn fetch_snapshots(config: &BirdweatherConfig) -> (Snapshot, Snapshot) {
    let client = match http_client() {
        Ok(client) => client,
        Err(e) => {
            log::warn!("Failed to build HTTP client: {}", e);
            let status = FetchStatus::FetchError(e.to_string());
            return (
                Snapshot::failed(Granularity::Hourly, status.clone()),
                Snapshot::failed(Granularity::Daily, status),
            );
        }
    };

    let pool = ThreadPool::new(2);
    let (tx, rx) = mpsc::channel();

    for granularity in [Granularity::Hourly, Granularity::Daily] {
        let tx = tx.clone();
        let client = client.clone();
        let url = config.url.clone();
        let station_id = config.station_id.clone();

        pool.execute(move || {
            let snapshot = fetch_snapshot(&client, &url, &station_id, granularity);
            tx.send(snapshot).ok();
        });
    }
    drop(tx);

    let mut hourly = None;
    let mut daily = None;
    for snapshot in rx.iter() {
        match snapshot.granularity {
            Granularity::Hourly => hourly = Some(snapshot),
            Granularity::Daily => daily = Some(snapshot),
        }
    }

    (
        hourly.unwrap_or_else(|| lost_worker(Granularity::Hourly)),
        daily.unwrap_or_else(|| lost_worker(Granularity::Daily)),
    )
}

fn lost_worker(granularity: Granularity) -> Snapshot {
    log::warn!("{} fetch worker exited without a result", granularity);
    Snapshot::failed(
        granularity,
        FetchStatus::FetchError("fetch worker exited without a result".to_string()),
    )
}

// ---------------------------------------------------------------------------
// Run
// ---------------------------------------------------------------------------

/// Runs one check at `now` and publishes through `publisher`.
pub fn run_check<P: Publisher + ?Sized>(
    config: &RunConfiguration,
    publisher: &P,
    now: DateTime<FixedOffset>,
) -> RunOutcome {
    let now_utc = now.with_timezone(&Utc);

    if !gate_allows(config, now_utc) {
        log::info!("Outside the daylight window, skipping this run");
        return RunOutcome::Skipped;
    }

    let (hourly, daily) = fetch_snapshots(&config.birdweather);
    for snapshot in [&hourly, &daily] {
        log::debug!("{} snapshot status: {}", snapshot.granularity, snapshot.status);
    }

    let verdict = monitor::evaluate(&hourly, now_utc, Some(config.run.online_threshold_hours));

    let batch = payload::compose(
        &hourly,
        &daily,
        verdict,
        &config.mqtt.topic,
        &config.birdweather.station_id,
        now,
    );
    for message in batch.iter() {
        log::debug!("  {} <- {:?}", message.topic, message.payload);
    }

    let result = publisher.publish(&batch);
    if let Err(e) = &result {
        log::warn!("MQTT ERROR: {}", e);
    }
    let publish_status = PublishStatus::from_result(&result);

    RunOutcome::Completed(RunReport {
        hourly,
        daily,
        verdict,
        batch,
        publish_status,
    })
}

/// Writes the run summary to the log file and, unless `debug` is on, to
/// stdout. Returns the line written.
pub fn record_run(report: &RunReport, log_path: &Path, now: DateTime<FixedOffset>, debug: bool) -> String {
    let line = runlog::summary_line(&now, report.verdict, report.publish_status);

    log::debug!("Writing to log file {}", log_path.display());
    if let Err(e) = runlog::append(log_path, &line) {
        log::error!("{}", e);
    }

    if debug {
        log::info!("{}", line);
    } else {
        println!("{}", line);
    }
    line
}
