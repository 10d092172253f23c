use std::{fs::File, io::BufReader, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_DB_URL: &str = "sqlite://codecollab.db";
pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub db: DbConfig,
    pub github: GitHubConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    /// Seconds before an in-flight request is answered with 408.
    pub request_timeout: u64,
}

impl Default for ServerConfig {
    fn default() -> Self { Self { port: DEFAULT_PORT, request_timeout: 60 } }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DbConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DbConfig {
    fn default() -> Self { Self { url: DEFAULT_DB_URL.to_string(), max_connections: 5 } }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GitHubConfig {
    /// Optional token, used for higher API rate limits.
    pub token: Option<String>,
    pub api_url: String,
}

impl Default for GitHubConfig {
    fn default() -> Self { Self { token: None, api_url: DEFAULT_GITHUB_API_URL.to_string() } }
}

impl Config {
    /// Read `path` if it exists, then apply overrides from the process environment.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let file = BufReader::new(
                File::open(path)
                    .with_context(|| format!("Failed to open config file {}", path.display()))?,
            );
            serde_yaml::from_reader(file)
                .with_context(|| format!("Failed to parse config file {}", path.display()))?
        } else {
            Config::default()
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Override settings from `PORT`, `DATABASE_URL`, `GITHUB_TOKEN` and `GITHUB_API_URL`.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(port) = var("PORT").filter(|v| !v.is_empty()) {
            self.server.port = port.parse().with_context(|| format!("Invalid PORT: {port}"))?;
        }
        if let Some(url) = var("DATABASE_URL").filter(|v| !v.is_empty()) {
            self.db.url = url;
        }
        if let Some(token) = var("GITHUB_TOKEN") {
            self.github.token = (!token.is_empty()).then_some(token);
        }
        if let Some(url) = var("GITHUB_API_URL").filter(|v| !v.is_empty()) {
            self.github.api_url = url;
        }
        Ok(())
    }
}
