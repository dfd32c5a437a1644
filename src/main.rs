//! bwcheck: one BirdWeather station check.
//!
//! Loads `bw-check.toml` (creating it with defaults on first run), skips the
//! run outside the daylight window, fetches the station's hourly and daily
//! top species, decides whether the station is online, publishes eight MQTT
//! messages and appends one summary line to the run log.
//!
//! Usage:
//!   bwcheck                          # default config and log in the working directory
//!   bwcheck -c /etc/bwcheck.toml -d  # explicit config, debug logging
//!   bwcheck --ignore-daylight        # run even at night
//!
//! Environment:
//!   BWCHECK_CONFIG        - config file path (overridden by --config)
//!   BWCHECK_MQTT_PASSWORD - broker password (overrides the stored one)
//!   RUST_LOG              - log filter (overrides --debug and the stored debug flag)

use argh::FromArgs;
use bwcheck::broker::MqttPublisher;
use bwcheck::check::{self, RunOutcome};
use bwcheck::config;
use bwcheck::runlog::DEFAULT_LOG_FILE;
use chrono::Local;
use log::LevelFilter;
use std::path::PathBuf;

#[derive(FromArgs)]
/// Check a BirdWeather station and forward its status to MQTT
struct Args {
    /// path to the configuration file
    #[argh(option, short = 'c')]
    config: Option<PathBuf>,

    /// path to the run log
    #[argh(option, short = 'l', default = "PathBuf::from(DEFAULT_LOG_FILE)")]
    log_file: PathBuf,

    /// enable debug logging
    #[argh(switch, short = 'd')]
    debug: bool,

    /// run regardless of the daylight window
    #[argh(switch)]
    ignore_daylight: bool,
}

fn main() {
    dotenv::dotenv().ok();
    let args: Args = argh::from_env();

    let rust_log_set = std::env::var_os("RUST_LOG").is_some();
    let env = env_logger::Env::default().default_filter_or("debug");
    env_logger::init_from_env(env);
    if !rust_log_set {
        log::set_max_level(level(args.debug));
    }

    let config_path = args.config.clone().unwrap_or_else(config::default_config_path);
    let mut config = match config::load_or_create(&config_path) {
        Ok(c) => c.with_env_overrides(),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let debug = args.debug || config.run.debug;
    if !rust_log_set {
        log::set_max_level(level(debug));
    }

    if args.ignore_daylight {
        log::debug!("Daylight gate bypassed from the command line");
        config.run.limit_times = false;
    }

    let publisher = MqttPublisher::new(&config.mqtt);
    match check::run_check(&config, &publisher, Local::now().fixed_offset()) {
        RunOutcome::Skipped => {}
        RunOutcome::Completed(report) => {
            check::record_run(&report, &args.log_file, Local::now().fixed_offset(), debug);
        }
    }
}

fn level(debug: bool) -> LevelFilter {
    if debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    }
}
