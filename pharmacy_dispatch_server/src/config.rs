use std::{env, str::FromStr, time::Duration};

use chrono::Duration as ChronoDuration;
use log::*;
use pds_common::helpers::parse_boolean_flag;
use pharmacy_dispatch_engine::dispatch::{
    DispatchPolicy,
    DEFAULT_MAX_TARGETS,
    DEFAULT_RESPONSE_TIMEOUT_MINUTES,
    DEFAULT_SEARCH_RADIUS_M,
    MAX_RESPONSE_TIMEOUT_MINUTES,
};

const DEFAULT_PDS_HOST: &str = "127.0.0.1";
const DEFAULT_PDS_PORT: u16 = 8370;
const DEFAULT_DATABASE_URL: &str = "sqlite://data/pharmacy_dispatch.db";
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 25;
const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub db_max_connections: u32,
    /// The search radius, in metres. Also the distance at which the proximity score drops to zero.
    pub dispatch_radius_m: f64,
    pub max_targeted_pharmacies: usize,
    /// The default time pharmacies have to respond to an order, when the request doesn't specify one.
    pub response_timeout: ChronoDuration,
    pub sweep_interval: Duration,
    /// When false, the server does not sweep overdue orders itself. Run `pds_server sweep` from cron instead.
    pub run_sweeper: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_PDS_HOST.to_string(),
            port: DEFAULT_PDS_PORT,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            db_max_connections: DEFAULT_DB_MAX_CONNECTIONS,
            dispatch_radius_m: DEFAULT_SEARCH_RADIUS_M,
            max_targeted_pharmacies: DEFAULT_MAX_TARGETS,
            response_timeout: ChronoDuration::minutes(DEFAULT_RESPONSE_TIMEOUT_MINUTES),
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            run_sweeper: true,
        }
    }
}

impl ServerConfig {
    pub fn from_env_or_default() -> Self {
        let host = env::var("PDS_HOST").ok().unwrap_or_else(|| DEFAULT_PDS_HOST.into());
        let port = parse_env("PDS_PORT", DEFAULT_PDS_PORT, |_| true);
        let database_url = env::var("PDS_DATABASE_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ PDS_DATABASE_URL is not set. Using {DEFAULT_DATABASE_URL}.");
            DEFAULT_DATABASE_URL.to_string()
        });
        let db_max_connections = parse_env("PDS_DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS, |&n| n > 0);
        let dispatch_radius_m =
            parse_env("PDS_DISPATCH_RADIUS_M", DEFAULT_SEARCH_RADIUS_M, |&r: &f64| r.is_finite() && r > 0.0);
        let max_targeted_pharmacies = parse_env("PDS_MAX_TARGETED_PHARMACIES", DEFAULT_MAX_TARGETS, |&n| n > 0);
        let timeout_minutes = parse_env("PDS_RESPONSE_TIMEOUT_MINUTES", DEFAULT_RESPONSE_TIMEOUT_MINUTES, |m| {
            (1..=MAX_RESPONSE_TIMEOUT_MINUTES).contains(m)
        });
        let sweep_secs = parse_env("PDS_SWEEP_INTERVAL_SECS", DEFAULT_SWEEP_INTERVAL.as_secs(), |&s| s > 0);
        let run_sweeper = parse_boolean_flag(env::var("PDS_RUN_SWEEPER").ok(), true);
        if !run_sweeper {
            info!("🪛️ The timeout sweeper is disabled. Overdue orders will only expire via `pds_server sweep`.");
        }
        Self {
            host,
            port,
            database_url,
            db_max_connections,
            dispatch_radius_m,
            max_targeted_pharmacies,
            response_timeout: ChronoDuration::minutes(timeout_minutes),
            sweep_interval: Duration::from_secs(sweep_secs),
            run_sweeper,
        }
    }

    pub fn dispatch_policy(&self) -> DispatchPolicy {
        DispatchPolicy {
            radius_m: self.dispatch_radius_m,
            max_targets: self.max_targeted_pharmacies,
            default_response_timeout: self.response_timeout,
        }
    }
}

/// Reads and parses an environment variable. Unset variables quietly take the default; unparseable or out-of-range
/// values take the default with an error in the log.
fn parse_env<T>(name: &str, default: T, valid: impl Fn(&T) -> bool) -> T
where
    T: FromStr + std::fmt::Display + Copy,
    T::Err: std::fmt::Display,
{
    let Ok(s) = env::var(name) else {
        return default;
    };
    match s.trim().parse::<T>() {
        Ok(v) if valid(&v) => v,
        Ok(v) => {
            error!("🪛️ {v} is out of range for {name}. Using the default, {default}, instead.");
            default
        },
        Err(e) => {
            error!("🪛️ {s} is not a valid value for {name}. {e} Using the default, {default}, instead.");
            default
        },
    }
}
