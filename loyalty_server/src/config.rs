use clap::Parser;
use lpg_common::Secret;

/// Server configuration: environment variables provide defaults, CLI flags override. No third layer.
#[derive(Parser, Debug, Clone)]
#[command(name = "loyalty_server", version, about = "Loyalty points gateway")]
pub struct ServerConfig {
    /// Address the HTTP server listens on.
    #[arg(short = 'a', long = "run-address", env = "RUN_ADDRESS", default_value = "localhost:8080")]
    pub run_address: String,

    /// Database URI.
    #[arg(short = 'd', long = "database-uri", env = "DATABASE_URI", default_value = "sqlite://data/loyalty.db")]
    pub database_uri: String,

    /// Base URL of the external accrual computation service.
    #[arg(short = 'r', long = "accrual-address", env = "ACCRUAL_SYSTEM_ADDRESS", default_value = "")]
    pub accrual_address: String,

    /// Secret key for JWT signing and body-hash verification. An empty key disables body-hash checks.
    #[arg(short = 'k', long = "secret-key", env = "KEY", default_value = "", hide_env_values = true)]
    secret_key: String,

    /// Reconciler tick interval in seconds.
    #[arg(long = "poll-interval", env = "ACCRUAL_POLL_INTERVAL", default_value_t = 5)]
    pub poll_interval_secs: u64,
}

impl ServerConfig {
    pub fn secret_key(&self) -> Secret<String> {
        Secret::new(self.secret_key.clone())
    }
}

#[cfg(test)]
mod test {
    use clap::Parser;

    use super::ServerConfig;

    #[test]
    fn flags_override_defaults() {
        let config = ServerConfig::try_parse_from([
            "loyalty_server",
            "-a",
            "0.0.0.0:9090",
            "-d",
            "sqlite://tmp/other.db",
            "-r",
            "http://accrual.internal",
            "-k",
            "sekrit",
        ])
        .unwrap();
        assert_eq!(config.run_address, "0.0.0.0:9090");
        assert_eq!(config.database_uri, "sqlite://tmp/other.db");
        assert_eq!(config.accrual_address, "http://accrual.internal");
        assert_eq!(config.secret_key().reveal(), "sekrit");
    }

    // Defaults, the env layer, and flag precedence share one test because they all read RUN_ADDRESS from
    // the process environment, and tests run in parallel.
    #[test]
    fn env_fills_gaps_and_flags_take_precedence() {
        std::env::remove_var("RUN_ADDRESS");
        let config = ServerConfig::try_parse_from(["loyalty_server"]).unwrap();
        assert_eq!(config.run_address, "localhost:8080");
        assert_eq!(config.database_uri, "sqlite://data/loyalty.db");
        assert_eq!(config.accrual_address, "");
        assert!(config.secret_key().is_empty());
        assert_eq!(config.poll_interval_secs, 5);

        std::env::set_var("RUN_ADDRESS", "localhost:7777");
        let from_env = ServerConfig::try_parse_from(["loyalty_server"]).unwrap();
        assert_eq!(from_env.run_address, "localhost:7777");

        let flagged = ServerConfig::try_parse_from(["loyalty_server", "-a", "localhost:8888"]).unwrap();
        assert_eq!(flagged.run_address, "localhost:8888");
        std::env::remove_var("RUN_ADDRESS");
    }
}
