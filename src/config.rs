use anyhow::{Context, Result};
use std::env;
use std::net::{IpAddr, SocketAddr};

#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub static_dir: String,
    pub admin_token: Option<String>,
    pub seed_demo: bool,
    pub body_limit_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: IpAddr::from([0, 0, 0, 0]),
            port: 8081,
            database_url: None,
            database_max_connections: 5,
            static_dir: "./static".into(),
            admin_token: None,
            seed_demo: true,
            body_limit_bytes: 2 * 1024 * 1024,
        }
    }
}

fn parse_bool(v: &str) -> Option<bool> {
    match v.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let d = Config::default();

        let host = match var("HOST") {
            Some(v) => v.parse::<IpAddr>().context("Failed to parse HOST")?,
            None => d.host,
        };
        let port = match var("PORT") {
            Some(v) => v.parse::<u16>().context("Failed to parse PORT")?,
            None => d.port,
        };
        let database_max_connections = match var("DATABASE_MAX_CONNECTIONS") {
            Some(v) => v.parse().context("Failed to parse DATABASE_MAX_CONNECTIONS")?,
            None => d.database_max_connections,
        };
        let seed_demo = match var("SEED_DEMO") {
            Some(v) => parse_bool(&v).with_context(|| format!("Failed to parse SEED_DEMO={}", v))?,
            None => d.seed_demo,
        };
        let body_limit_bytes = match var("BODY_LIMIT_BYTES") {
            Some(v) => v.parse().context("Failed to parse BODY_LIMIT_BYTES")?,
            None => d.body_limit_bytes,
        };

        Ok(Config {
            host,
            port,
            database_url: var("DATABASE_URL"),
            database_max_connections,
            static_dir: var("STATIC_DIR").unwrap_or(d.static_dir),
            admin_token: var("ADMIN_TOKEN"),
            seed_demo,
            body_limit_bytes,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}
