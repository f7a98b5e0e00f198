use std::{fs::File, path::Path, time::Duration};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use crate::errors::{ApicheckError, Result};


pub const ENV_REQRES_URL: &str = "APICHECK_REQRES_URL";
pub const ENV_JSONPLACEHOLDER_URL: &str = "APICHECK_JSONPLACEHOLDER_URL";
pub const ENV_HTTPBIN_URL: &str = "APICHECK_HTTPBIN_URL";
pub const ENV_TIMEOUT_SECS: &str = "APICHECK_TIMEOUT_SECS";

/// Run configuration handed to the fixture catalog. Every field is optional in YAML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub reqres_url: String,
    pub jsonplaceholder_url: String,
    pub httpbin_url: String,
    pub timeout_secs: u64,
    pub user_agent: String,
    pub default_headers: IndexMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        let mut default_headers = IndexMap::new();
        default_headers.insert("Accept".to_string(), "application/json".to_string());
        Self {
            reqres_url: "https://reqres.in/api".to_string(),
            jsonplaceholder_url: "https://jsonplaceholder.typicode.com".to_string(),
            httpbin_url: "https://httpbin.org".to_string(),
            timeout_secs: 30,
            user_agent: "QA-Test-Suite/1.0".to_string(),
            default_headers,
        }
    }
}

impl Config {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Apply `APICHECK_*` overrides from an arbitrary variable source.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(ENV_REQRES_URL) {
            self.reqres_url = v;
        }
        if let Some(v) = lookup(ENV_JSONPLACEHOLDER_URL) {
            self.jsonplaceholder_url = v;
        }
        if let Some(v) = lookup(ENV_HTTPBIN_URL) {
            self.httpbin_url = v;
        }
        if let Some(v) = lookup(ENV_TIMEOUT_SECS) {
            self.timeout_secs = v.trim().parse().map_err(|_| {
                ApicheckError::ConfigError(format!("{ENV_TIMEOUT_SECS} is not a number: {v}"))
            })?;
        }
        Ok(())
    }

    /// Check base URLs and timeout, and strip trailing slashes so tests can append paths.
    pub fn validate(mut self) -> Result<Self> {
        for (name, value) in [
            ("reqres_url", &mut self.reqres_url),
            ("jsonplaceholder_url", &mut self.jsonplaceholder_url),
            ("httpbin_url", &mut self.httpbin_url),
        ] {
            let parsed = Url::parse(value)?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(ApicheckError::ConfigError(format!(
                    "{name} must be an http(s) URL, got {value}"
                )));
            }
            while value.ends_with('/') {
                value.pop();
            }
        }
        if self.timeout_secs == 0 {
            return Err(ApicheckError::ConfigError(
                "timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(self)
    }
}

pub fn load_config_from_path<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();
    let f = File::open(path).map_err(|e| {
        ApicheckError::ConfigError(format!("cannot open {}: {e}", path.display()))
    })?;
    Ok(serde_yaml::from_reader(f)?)
}

/// A missing `.env` is normal; anything else is logged and the file ignored.
pub(crate) fn dotenv_loaded<T>(res: dotenvy::Result<T>) -> bool {
    match res {
        Ok(_) => {
            debug!("loaded .env");
            true
        }
        Err(e) if e.not_found() => false,
        Err(e) => {
            warn!(error = %e, "ignoring unreadable .env");
            false
        }
    }
}

/// Defaults, then the optional YAML file, then `.env` / process environment.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    dotenv_loaded(dotenvy::dotenv());

    let mut cfg = match path {
        Some(p) => {
            debug!(path = %p.display(), "loading yaml config");
            load_config_from_path(p)?
        }
        None => Config::default(),
    };
    cfg.apply_overrides(|key| std::env::var(key).ok())?;
    cfg.validate()
}
