use std::{fmt::Display, net::SocketAddr, path::PathBuf, str::FromStr};

use anyhow::{anyhow, Context};
use rand::Rng;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub jwt_secret: Vec<u8>,
    pub token_ttl: time::Duration,
    pub session_idle: time::Duration,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub allow_registration: bool,
    pub cors_origin: Option<String>,
    /// Username and password of the admin created on an empty install.
    pub bootstrap_admin: Option<(String, String)>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database_url: "sqlite://clubhouse.db?mode=rwc".to_owned(),
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            jwt_secret: random_secret(),
            token_ttl: time::Duration::hours(24),
            session_idle: time::Duration::minutes(60),
            upload_dir: PathBuf::from("uploads"),
            max_upload_bytes: 5 * 1024 * 1024,
            allow_registration: true,
            cors_origin: None,
            bootstrap_admin: None,
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Config::default();

        let jwt_secret = match var("JWT_SECRET") {
            Some(secret) if !secret.is_empty() => secret.into_bytes(),
            _ => {
                warn!("JWT_SECRET not set, tokens will not survive a restart");
                defaults.jwt_secret
            }
        };

        let bootstrap_admin = match (var("ADMIN_USERNAME"), var("ADMIN_PASSWORD")) {
            (Some(username), Some(password)) => Some((username, password)),
            (Some(_), None) | (None, Some(_)) => {
                return Err(anyhow!("ADMIN_USERNAME and ADMIN_PASSWORD must be set together"));
            }
            (None, None) => None,
        };

        Ok(Config {
            database_url: var("DATABASE_URL").unwrap_or(defaults.database_url),
            bind_addr: load("BIND_ADDR", defaults.bind_addr)?,
            jwt_secret,
            token_ttl: time::Duration::hours(load("TOKEN_TTL_HOURS", 24)?),
            session_idle: time::Duration::minutes(load("SESSION_IDLE_MINUTES", 60)?),
            upload_dir: var("UPLOAD_DIR").map(PathBuf::from).unwrap_or(defaults.upload_dir),
            max_upload_bytes: load("MAX_UPLOAD_BYTES", defaults.max_upload_bytes)?,
            allow_registration: load("ALLOW_REGISTRATION", true)?,
            cors_origin: var("CORS_ORIGIN"),
            bootstrap_admin,
        })
    }
}

fn var(key: &str) -> Option<String> {
    dotenv::var(key).ok()
}

fn load<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr + Display,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(key) {
        Some(value) => value
            .trim()
            .parse()
            .with_context(|| format!("invalid {key} value {value:?}")),
        None => {
            info!("{key} not set, using default: {default}");
            Ok(default)
        }
    }
}

fn random_secret() -> Vec<u8> {
    let mut secret = [0u8; 32];
    rand::rng().fill(&mut secret);
    secret.to_vec()
}
