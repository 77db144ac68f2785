use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// TaskCore API gateway
#[derive(Parser, Serialize, Deserialize, Clone, Debug)]
#[command(name = "taskcore-gateway", version, about = "TaskCore API gateway")]
pub struct Config {
    /// Port to listen on
    #[arg(long, env = "TASKCORE_PORT", default_value = "3000")]
    pub port: u16,

    /// Bind address
    #[arg(long, env = "TASKCORE_BIND_ADDRESS", default_value = "0.0.0.0")]
    pub bind_address: String,

    /// Frontend origin allowed by the CORS policy
    #[arg(
        long,
        env = "TASKCORE_FRONTEND_URL",
        default_value = "http://localhost:3100"
    )]
    pub frontend_url: String,

    /// Shared secret for verifying bearer tokens (HS256)
    #[arg(
        long,
        env = "TASKCORE_JWT_SECRET",
        default_value = "taskcore_jwt_secret_dev"
    )]
    pub jwt_secret: String,

    /// Rate-limit window in seconds
    #[arg(long, env = "TASKCORE_RATE_LIMIT_WINDOW_SECS", default_value = "900")]
    pub rate_limit_window_secs: u64,

    /// Maximum requests admitted per client identity per window
    #[arg(long, env = "TASKCORE_RATE_LIMIT_MAX_REQUESTS", default_value = "1000")]
    pub rate_limit_max_requests: u32,

    /// Maximum request body size in megabytes
    #[arg(long, env = "TASKCORE_MAX_BODY_MB", default_value = "10")]
    pub max_body_mb: usize,

    /// Interval in seconds between system heartbeat broadcasts
    #[arg(long, env = "TASKCORE_HEARTBEAT_INTERVAL_SECS", default_value = "30")]
    pub heartbeat_interval_secs: u64,

    /// Path to TOML config file
    #[arg(long, default_value = "./taskcore.toml")]
    pub config: String,

    /// Enable structured JSON logging (for Docker/production)
    #[arg(long, env = "TASKCORE_JSON_LOGS")]
    pub json_logs: bool,

    /// Output a commented TOML config template and exit
    #[arg(long)]
    pub generate_config: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            bind_address: "0.0.0.0".to_string(),
            frontend_url: "http://localhost:3100".to_string(),
            jwt_secret: "taskcore_jwt_secret_dev".to_string(),
            rate_limit_window_secs: 900,
            rate_limit_max_requests: 1000,
            max_body_mb: 10,
            heartbeat_interval_secs: 30,
            config: "./taskcore.toml".to_string(),
            json_logs: false,
            generate_config: false,
        }
    }
}

impl Config {
    /// Load config with layered precedence:
    /// built-in defaults < TOML file < env vars (TASKCORE_*) < CLI args
    pub fn load() -> Result<Self, figment::Error> {
        let cli = Config::parse();
        let config_path = cli.config.clone();

        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_path))
            .merge(Env::prefixed("TASKCORE_"))
            .merge(Serialized::defaults(cli))
            .extract()
    }

    /// Maximum request body size in bytes.
    pub fn max_body_bytes(&self) -> usize {
        self.max_body_mb * 1024 * 1024
    }
}

/// Generate a commented TOML config template
pub fn generate_config_template() -> String {
    r#"# TaskCore API Gateway Configuration
# Place this file at ./taskcore.toml or specify with --config <path>
# All settings can be overridden via environment variables (TASKCORE_PORT, etc.)
# or CLI flags (--port, etc.)

# Listening port (default: 3000)
# port = 3000

# Bind address (default: 0.0.0.0 — all interfaces)
# bind_address = "0.0.0.0"

# Frontend origin allowed by the CORS policy (credentials enabled)
# frontend_url = "http://localhost:3100"

# Shared secret for verifying bearer tokens (HS256).
# The default is a development value — set this in production.
# jwt_secret = "taskcore_jwt_secret_dev"

# Rate limiting: max requests per client IP per window
# rate_limit_window_secs = 900
# rate_limit_max_requests = 1000

# Maximum request body size in megabytes
# max_body_mb = 10

# Interval between system_heartbeat broadcasts to WebSocket clients
# heartbeat_interval_secs = 30

# Enable structured JSON logging for Docker/production
# json_logs = false
"#
    .to_string()
}
