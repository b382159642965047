use std::{env, fmt::Display, fs::read_to_string, str::FromStr};

use tracing::{info, warn};

pub struct Config {
    pub port: u16,
    /// Base URL blobs resolve under; uploads return `{base}/files/{path}`.
    pub public_base_url: String,
    /// When unset the server runs on the in-memory store.
    pub redis_url: Option<String>,
    pub blob_root: String,
    /// Allow-listed operator; recorded as the actor on activity entries.
    pub admin_email: String,
    pub admin_token: String,
}

impl Config {
    pub fn load() -> Self {
        Self {
            port: try_load("RUST_PORT", "1111"),
            public_base_url: try_load("PUBLIC_BASE_URL", "http://localhost:1111"),
            redis_url: env::var("REDIS_URL").ok(),
            blob_root: try_load("BLOB_ROOT", "uploads"),
            admin_email: try_load("ADMIN_EMAIL", "admin@example.com"),
            admin_token: read_secret("ADMIN_TOKEN"),
        }
    }
}

fn var(key: &str) -> Result<String, ()> {
    env::var(key).map_err(|_| {
        warn!("Environment variable {key} not found, using default");
    })
}

fn try_load<T: FromStr>(key: &str, default: &str) -> T
where
    T::Err: Display,
{
    var(key)
        .unwrap_or_else(|_| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e| {
            warn!("Invalid {key} value: {e}");
        })
        .expect("Environment misconfigured!")
}

fn read_secret(secret_name: &str) -> String {
    if let Ok(value) = env::var(secret_name) {
        return value;
    }

    let path = format!("/run/secrets/{secret_name}");

    read_to_string(&path)
        .map(|s| s.trim().to_string())
        .map_err(|e| {
            warn!("Failed to read {secret_name} from file: {e}");
        })
        .expect("Secrets misconfigured!")
}
