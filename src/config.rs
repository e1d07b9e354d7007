use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub bind_address: String,
    pub bridge_api_url: String,
    pub bridge_api_key: String,
    pub payout_api_url: String,
    pub payout_api_key: String,
    pub base_rpc_url: String,
    pub payout_network: String,
    pub http_timeout_secs: u64,
    pub poll_interval_secs: u64,
    pub poll_max_attempts: u32,
    pub rate_limit_requests: u32,
    pub rate_limit_window_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        Ok(Self {
            bind_address: std::env::var("BIND_ADDRESS")
                .unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            bridge_api_url: std::env::var("BRIDGE_API_URL")
                .unwrap_or_else(|_| "https://api.layerswap.io/api/v2".to_string()),
            bridge_api_key: require("BRIDGE_API_KEY")?,
            payout_api_url: std::env::var("PAYOUT_API_URL")
                .unwrap_or_else(|_| "https://api.paycrest.io/v1".to_string()),
            payout_api_key: require("PAYOUT_API_KEY")?,
            base_rpc_url: std::env::var("BASE_RPC_URL")
                .unwrap_or_else(|_| "https://mainnet.base.org".to_string()),
            payout_network: std::env::var("PAYOUT_NETWORK")
                .unwrap_or_else(|_| "base".to_string()),
            http_timeout_secs: env_u64("HTTP_TIMEOUT_SECS", 30),
            poll_interval_secs: env_u64("POLL_INTERVAL_SECS", 10),
            poll_max_attempts: env_u64("POLL_MAX_ATTEMPTS", 30) as u32,
            rate_limit_requests: env_u64("RATE_LIMIT_REQUESTS", 10) as u32,
            rate_limit_window_secs: env_u64("RATE_LIMIT_WINDOW_SECS", 60),
        })
    }
}

fn require(key: &str) -> Result<String, config::ConfigError> {
    std::env::var(key).map_err(|_| config::ConfigError::NotFound(key.to_string()))
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
