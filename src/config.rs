use dotenvy::dotenv;
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres connection string. When absent the service runs on the
    /// volatile in-memory store (development / test mode).
    pub database_url: Option<String>,
    pub bind_addr: String,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self, crate::error::AppError> {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0".into());

        let port = match env::var("PORT") {
            Ok(raw) => raw
                .parse()
                .map_err(|_| crate::error::AppError::Config(format!("invalid PORT: {raw}")))?,
            Err(_) => 8000,
        };

        Ok(Self {
            database_url,
            bind_addr,
            port,
        })
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }

    pub fn test_defaults() -> Self {
        Self {
            database_url: None,
            bind_addr: "127.0.0.1".into(),
            port: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listen_addr_joins_host_and_port() {
        let cfg = Config {
            database_url: None,
            bind_addr: "0.0.0.0".into(),
            port: 8000,
        };
        assert_eq!(cfg.listen_addr(), "0.0.0.0:8000");
    }
}
