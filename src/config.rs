use clap::{Args, Parser, ValueEnum};

#[derive(Clone, Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Config {
    /// Database connection URL
    #[arg(long, env = "WICKET_DATABASE_URL")]
    pub database_url: String,

    #[command(flatten)]
    pub server: ServerConfig,

    #[command(flatten)]
    pub redis: RedisConfig,

    #[command(flatten)]
    pub router: RouterConfig,

    #[command(flatten)]
    pub websocket: WsConfig,

    #[command(flatten)]
    pub dispatch: DispatchConfig,

    #[command(flatten)]
    pub cache: CacheConfig,

    #[command(flatten)]
    pub telemetry: TelemetryConfig,
}

#[derive(Clone, Debug, Args)]
pub struct ServerConfig {
    /// Host to listen on
    #[arg(long, env = "WICKET_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "WICKET_PORT", default_value_t = 8070)]
    pub port: u16,

    /// How long to wait for background tasks during shutdown
    #[arg(long, env = "WICKET_SHUTDOWN_TIMEOUT_SECS", default_value_t = 10)]
    pub shutdown_timeout_secs: u64,
}

#[derive(Clone, Debug, Args)]
pub struct RedisConfig {
    /// Coordination store connection URL
    #[arg(long, env = "WICKET_REDIS_URL", default_value = "redis://localhost:6379/0")]
    pub url: String,

    /// Prefix for all coordination store keys
    #[arg(long, env = "WICKET_REDIS_KEY_BASE", default_value = "chat")]
    pub key_base: String,

    /// Identifier of this gateway instance, unique within the fleet
    #[arg(long, env = "WICKET_INSTANCE_ID", default_value = "wicket-1")]
    pub instance_id: String,
}

#[derive(Clone, Debug, Args)]
pub struct RouterConfig {
    /// Host (and optional port) of the router to notify of events
    #[arg(long, env = "WICKET_ROUTER_DOMAIN", default_value = "localhost:8080")]
    pub domain: String,

    /// Whether to use HTTPS when calling the router
    #[arg(long, env = "WICKET_ROUTER_SSL", default_value_t = false)]
    pub ssl: bool,
}

#[derive(Clone, Debug, Args)]
pub struct WsConfig {
    /// Size of the per-session outbound event buffer
    #[arg(long, env = "WICKET_WS_OUTBOUND_BUFFER_SIZE", default_value_t = 16)]
    pub outbound_buffer_size: usize,

    /// How often to send keepalive pings
    #[arg(long, env = "WICKET_WS_PING_INTERVAL_SECS", default_value_t = 30)]
    pub ping_interval_secs: u64,

    /// Max time between inbound frames before a socket is considered dead
    #[arg(long, env = "WICKET_WS_READ_TIMEOUT_SECS", default_value_t = 60)]
    pub read_timeout_secs: u64,
}

#[derive(Clone, Debug, Args)]
pub struct DispatchConfig {
    /// Delay between dispatch ticks
    #[arg(long, env = "WICKET_DISPATCH_TICK_INTERVAL_MS", default_value_t = 100)]
    pub tick_interval_ms: u64,

    /// Age of the oldest queued message after which a queue is escalated
    #[arg(long, env = "WICKET_DISPATCH_STALE_AFTER_SECS", default_value_t = 120)]
    pub stale_after_secs: u64,
}

#[derive(Clone, Debug, Args)]
pub struct CacheConfig {
    /// Time-to-live for cached channel and user lookups
    #[arg(long, env = "WICKET_CACHE_TTL_SECS", default_value_t = 30)]
    pub ttl_secs: u64,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Clone, Debug, Args)]
pub struct TelemetryConfig {
    /// Log output format
    #[arg(long, env = "WICKET_LOG_FORMAT", value_enum, default_value = "text")]
    pub log_format: LogFormat,

    /// OTLP endpoint for trace and metric export; unset disables export
    #[arg(long, env = "WICKET_OTLP_ENDPOINT")]
    pub otlp_endpoint: Option<String>,
}

impl Config {
    pub fn load() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply() {
        let config =
            Config::try_parse_from(["wicket-server", "--database-url", "postgres://localhost/wicket"])
                .expect("parse");

        assert_eq!(config.server.port, 8070);
        assert_eq!(config.redis.key_base, "chat");
        assert_eq!(config.websocket.ping_interval_secs, 30);
        assert_eq!(config.websocket.read_timeout_secs, 60);
        assert_eq!(config.dispatch.tick_interval_ms, 100);
        assert_eq!(config.dispatch.stale_after_secs, 120);
        assert_eq!(config.cache.ttl_secs, 30);
    }
}
