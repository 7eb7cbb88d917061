#![allow(dead_code)]

use std::env;
use std::time::Duration;

use chrono::NaiveDate;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub app_name: String,
    pub environment: String,
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
    pub rate_limit_per_second: u64,
    pub rate_limit_burst_size: u32,

    /// Base URL of the IXC webservice, e.g. `https://191.7.184.11/webservice/v1`.
    pub ixc_base_url: Option<String>,
    /// Pre-shared `id:secret` token for the IXC Basic auth header.
    pub ixc_token: Option<String>,
    /// Records per upstream page. The IXC paginates poorly below 50.
    pub ixc_fetch_rp: usize,
    pub ixc_request_timeout: Duration,
    /// How many customer-detail lookups run concurrently per batch.
    pub ixc_cliente_batch: usize,

    pub fluxo_cache_ttl: Duration,
    pub roster_cache_ttl: Duration,
    pub detail_cache_ttl: Duration,

    /// Oldest due date the delinquency roster will consider.
    pub roster_cutoff_date: NaiveDate,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            app_name: env_or("APP_NAME", "Radar Cobranca API"),
            environment: env_or("ENVIRONMENT", "development"),
            host: env_or("HOST", "0.0.0.0"),
            port: env_parse_or("PORT", 8000),
            cors_origins: parse_csv(&env_or("CORS_ORIGINS", "http://localhost:3000")),
            rate_limit_per_second: env_parse_or("RATE_LIMIT_PER_SECOND", 10),
            rate_limit_burst_size: env_parse_or("RATE_LIMIT_BURST_SIZE", 100),
            ixc_base_url: env_opt("IXC_API_BASE_URL").map(|url| trim_trailing_slash(&url)),
            ixc_token: env_opt("IXC_API_TOKEN"),
            ixc_fetch_rp: env_parse_or("IXC_API_FETCH_RP", 200).max(50),
            ixc_request_timeout: Duration::from_secs(env_parse_or(
                "IXC_REQUEST_TIMEOUT_SECONDS",
                30,
            )),
            ixc_cliente_batch: env_parse_or("IXC_CLIENTE_BATCH", 10).max(5),
            fluxo_cache_ttl: ttl_with_floor(
                env_parse_or("DASHBOARD_FLUXO_CACHE_TTL_MS", 180_000),
                60_000,
            ),
            roster_cache_ttl: ttl_with_floor(
                env_parse_or("INAD_CLIENTES_CACHE_TTL_MS", 300_000),
                60_000,
            ),
            detail_cache_ttl: ttl_with_floor(
                env_parse_or("INAD_CLIENTE_DETAIL_CACHE_TTL_MS", 900_000),
                300_000,
            ),
            roster_cutoff_date: env_opt("ROSTER_CUTOFF_DATE")
                .and_then(|raw| NaiveDate::parse_from_str(&raw, "%Y-%m-%d").ok())
                .unwrap_or_else(default_cutoff),
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment.trim().eq_ignore_ascii_case("production")
    }
}

fn default_cutoff() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid cutoff date")
}

fn ttl_with_floor(millis: u64, floor: u64) -> Duration {
    Duration::from_millis(millis.max(floor))
}

fn trim_trailing_slash(raw: &str) -> String {
    raw.trim_end_matches('/').to_string()
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_or(key: &str, default: &str) -> String {
    env_opt(key).unwrap_or_else(|| default.to_string())
}

fn env_parse_or<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    env_opt(key)
        .and_then(|raw| raw.parse::<T>().ok())
        .unwrap_or(default)
}

fn parse_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}
