use std::env;
use std::fs::read_to_string;
use dotenvy::dotenv;
use log::info;
use crate::errors::UnrecoverableError;
use crate::models::Site;

const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0";
const DEFAULT_BIND_PORT: u16 = 8080;
const DEFAULT_SITES_FILE: &str = "sites.json";
const DEFAULT_PAUSE_SECONDS: f64 = 0.4;
const DEFAULT_MAX_RETRIES: u32 = 2;
const DEFAULT_RAIN_LOCATION_ID: u32 = 22;
const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 30;

#[derive(Clone, Debug)]
pub struct WebServer {
    pub bind_address: String,
    pub bind_port: u16,
}

/// MHM client device service.
#[derive(Clone, Debug)]
pub struct MhmConfig {
    pub api_base: String,
    pub api_key: String,
    pub pause_between_requests: f64,
    pub max_retries: u32,
}

/// PI historian, reached over its relational link.
#[derive(Clone, Debug)]
pub struct PiConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
    pub query_timeout_secs: u64,
}

/// ADS PRISM telemetry API.
#[derive(Clone, Debug)]
pub struct PrismConfig {
    pub api_base: String,
    pub api_token: String,
    pub rain_location_id: u32,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub web_server: WebServer,
    pub mhm: MhmConfig,
    pub pi: PiConfig,
    pub prism: PrismConfig,
    pub sites: Vec<Site>,
}

/// Loads the full configuration from the environment (with .env support)
/// and the site catalog file. Every fetcher gets its credentials from here
/// rather than reading the environment itself.
pub fn config() -> Result<Config, UnrecoverableError> {
    dotenv().ok();

    let web_server = WebServer {
        bind_address: optional("BIND_ADDRESS").unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string()),
        bind_port: parsed_or("BIND_PORT", DEFAULT_BIND_PORT)?,
    };

    let mhm = MhmConfig {
        api_base: optional("MHM_API_BASE")
            .unwrap_or_else(|| "https://client-device-service.manhole-metrics.com".to_string()),
        api_key: required("MHM_API_TOKEN")?,
        pause_between_requests: parsed_or("MHM_PAUSE_SECONDS", DEFAULT_PAUSE_SECONDS)?,
        max_retries: parsed_or("MHM_MAX_RETRIES", DEFAULT_MAX_RETRIES)?,
    };

    let pi = PiConfig {
        host: required("PI_HOST")?,
        port: parsed_or("PI_PORT", 5432)?,
        database: required("PI_DATABASE")?,
        user: required("PI_USER")?,
        password: required("PI_PASSWORD")?,
        query_timeout_secs: parsed_or("PI_QUERY_TIMEOUT_SECS", DEFAULT_QUERY_TIMEOUT_SECS)?,
    };

    let prism = PrismConfig {
        api_base: optional("PRISM_API_BASE")
            .unwrap_or_else(|| "https://api.adsprism.com".to_string()),
        api_token: required("PRISM_API_TOKEN")?,
        rain_location_id: parsed_or("PRISM_RAIN_LOCATION_ID", DEFAULT_RAIN_LOCATION_ID)?,
    };

    let sites = load_sites(
        &optional("SITES_FILE").unwrap_or_else(|| DEFAULT_SITES_FILE.to_string()),
    )?;
    info!("loaded {} monitored sites", sites.len());

    Ok(Config { web_server, mhm, pi, prism, sites })
}

fn load_sites(path: &str) -> Result<Vec<Site>, UnrecoverableError> {
    let json = read_to_string(path)
        .map_err(|e| UnrecoverableError(format!("site catalog {}: {}", path, e)))?;
    let sites: Vec<Site> = serde_json::from_str(&json)?;

    Ok(sites)
}

fn required(name: &str) -> Result<String, UnrecoverableError> {
    env::var(name).map_err(|_| UnrecoverableError(format!("missing environment variable {}", name)))
}

fn optional(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parsed_or<T: std::str::FromStr>(name: &str, default: T) -> Result<T, UnrecoverableError>
where
    T::Err: std::fmt::Display,
{
    match optional(name) {
        Some(raw) => raw
            .parse()
            .map_err(|e| UnrecoverableError(format!("{}: {}", name, e))),
        None => Ok(default),
    }
}
