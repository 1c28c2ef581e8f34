//! Configuration module for the faculty directory.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::collections::HashSet;
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::errors::AppError;
use crate::models::Department;

/// Department codes scraped when `FACULTY_DEPARTMENTS` is not set, in enumeration order.
pub const DEFAULT_DEPARTMENTS: [&str; 10] = [
    "ece", "cse", "eee", "biot", "chem", "mech", "mme", "sos", "shm", "civil",
];

/// Listing URL template; `{dept}` is replaced by the department code.
pub const DEFAULT_BASE_URL: &str = "https://nitandhra.ac.in/dept/{dept}/faculty";

/// Where the committed snapshot is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackend {
    Memory,
    Json,
    Sqlite,
}

impl CacheBackend {
    fn parse(value: &str) -> Result<Self, AppError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(CacheBackend::Memory),
            "json" => Ok(CacheBackend::Json),
            "sqlite" => Ok(CacheBackend::Sqlite),
            other => Err(AppError::Config(format!(
                "Unknown FACULTY_CACHE_BACKEND '{}' (expected json, sqlite or memory)",
                other
            ))),
        }
    }

    fn default_path(&self) -> &'static str {
        match self {
            CacheBackend::Sqlite => "./data/faculty_cache.sqlite",
            _ => "./data/faculty_cache.json",
        }
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Departments in enumeration order
    pub departments: Vec<Department>,
    pub cache_backend: CacheBackend,
    /// Snapshot file (json) or database file (sqlite); unused for memory
    pub cache_path: PathBuf,
    /// Worker pool size, independent of department count
    pub max_concurrency: usize,
    pub connect_timeout: Duration,
    /// Per-request ceiling applied by the page fetcher
    pub request_timeout: Duration,
    /// Ceiling for the whole scrape phase of one refresh
    pub refresh_timeout: Duration,
    /// Ceiling for one department's listing and profile fetches; below `refresh_timeout`
    pub department_timeout: Duration,
    /// Extra listing fetch attempts after the first failure
    pub fetch_retries: u32,
    /// Follow each entry's profile link for contact details
    pub fetch_profiles: bool,
    pub user_agent: String,
    /// Pre-shared key guarding the refresh endpoint
    pub api_psk: Option<String>,
    pub refresh_on_startup: bool,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bind_addr = match (get("FACULTY_BIND_ADDR"), get("PORT")) {
            (Some(addr), _) => addr,
            (None, Some(port)) => format!("0.0.0.0:{}", port.trim()),
            (None, None) => "0.0.0.0:8000".to_string(),
        };
        let bind_addr: SocketAddr = bind_addr
            .trim()
            .parse()
            .map_err(|e| AppError::Config(format!("Invalid bind address '{}': {}", bind_addr, e)))?;

        let log_level = get("FACULTY_LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        let base_url = get("FACULTY_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let departments = match get("FACULTY_DEPARTMENTS") {
            Some(list) => parse_departments(&list, &base_url)?,
            None => parse_departments(&DEFAULT_DEPARTMENTS.join(","), &base_url)?,
        };

        let cache_backend = match get("FACULTY_CACHE_BACKEND") {
            Some(value) => CacheBackend::parse(&value)?,
            None => CacheBackend::Json,
        };
        let cache_path: PathBuf = get("FACULTY_CACHE_PATH")
            .unwrap_or_else(|| cache_backend.default_path().to_string())
            .into();

        let max_concurrency = parse_number(&get, "FACULTY_MAX_CONCURRENCY", 5usize)?.max(1);
        let connect_timeout =
            Duration::from_secs(parse_number(&get, "FACULTY_CONNECT_TIMEOUT_SECS", 4u64)?.max(1));
        let request_timeout =
            Duration::from_secs(parse_number(&get, "FACULTY_REQUEST_TIMEOUT_SECS", 8u64)?.max(1));
        let refresh_timeout =
            Duration::from_secs(parse_number(&get, "FACULTY_REFRESH_TIMEOUT_SECS", 45u64)?.max(1));
        let department_timeout = match get("FACULTY_DEPARTMENT_TIMEOUT_SECS") {
            Some(_) => Duration::from_secs(parse_number(
                &get,
                "FACULTY_DEPARTMENT_TIMEOUT_SECS",
                0u64,
            )?),
            None => refresh_timeout * 2 / 3,
        };
        if department_timeout.is_zero() || department_timeout >= refresh_timeout {
            return Err(AppError::Config(format!(
                "FACULTY_DEPARTMENT_TIMEOUT_SECS ({:?}) must be non-zero and below the refresh timeout ({:?})",
                department_timeout, refresh_timeout
            )));
        }
        let fetch_retries = parse_number(&get, "FACULTY_FETCH_RETRIES", 1u32)?;
        let fetch_profiles = parse_bool(&get, "FACULTY_FETCH_PROFILES", true)?;
        let user_agent = get("FACULTY_USER_AGENT").unwrap_or_else(|| "Mozilla/5.0".to_string());
        let api_psk = get("FACULTY_API_PSK");
        let refresh_on_startup = parse_bool(&get, "FACULTY_REFRESH_ON_STARTUP", false)?;

        Ok(Self {
            bind_addr,
            log_level,
            departments,
            cache_backend,
            cache_path,
            max_concurrency,
            connect_timeout,
            request_timeout,
            refresh_timeout,
            department_timeout,
            fetch_retries,
            fetch_profiles,
            user_agent,
            api_psk,
            refresh_on_startup,
        })
    }
}

/// Parse `code` or `code=url` items, keeping their order.
fn parse_departments(list: &str, base_url: &str) -> Result<Vec<Department>, AppError> {
    let mut seen = HashSet::new();
    let mut departments = Vec::new();

    for item in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let (code, url) = match item.split_once('=') {
            Some((code, url)) => (code.trim().to_string(), url.trim().to_string()),
            None => (item.to_string(), base_url.replace("{dept}", item)),
        };

        if code.is_empty() || url.is_empty() {
            return Err(AppError::Config(format!(
                "Invalid department entry '{}'",
                item
            )));
        }
        if !seen.insert(code.clone()) {
            return Err(AppError::Config(format!(
                "Duplicate department code '{}'",
                code
            )));
        }
        departments.push(Department::new(code, url));
    }

    if departments.is_empty() {
        return Err(AppError::Config(
            "FACULTY_DEPARTMENTS must name at least one department".to_string(),
        ));
    }

    Ok(departments)
}

fn parse_number<T, G>(get: &G, key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AppError::Config(format!("Invalid {} '{}': {}", key, raw, e))),
        None => Ok(default),
    }
}

fn parse_bool<G>(get: &G, key: &str, default: bool) -> Result<bool, AppError>
where
    G: Fn(&str) -> Option<String>,
{
    match get(key).map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => Ok(true),
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => Ok(false),
        Some(v) => Err(AppError::Config(format!("Invalid {} '{}'", key, v))),
    }
}
