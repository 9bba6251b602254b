//! Settings loading and connection resolution.

use crate::constants;
use crate::models::settings::{ConnectionSection, SettingsFile};
use anyhow::{Context, Result};
use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};
use zeroize::Zeroizing;

/// Find the settings file: explicit path, then `ETCD_STEWARD_CONFIG`, then
/// `etcd-steward.toml` in the working directory if it exists.
pub fn locate(explicit: Option<PathBuf>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path);
    }
    if let Ok(path) = env::var("ETCD_STEWARD_CONFIG") {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }
    let local = PathBuf::from(constants::DEFAULT_CONFIG_FILE);
    local.is_file().then_some(local)
}

pub fn load(path: &Path) -> Result<SettingsFile> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("read settings {}", path.display()))?;
    let settings: SettingsFile = toml::from_str(&content)
        .with_context(|| format!("parse settings {}", path.display()))?;
    debug!(path = %path.display(), "settings loaded");
    Ok(settings)
}

pub struct Credentials {
    pub username: String,
    pub password: Zeroizing<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Fully resolved connection, built once at startup.
#[derive(Debug)]
pub struct Connection {
    pub endpoints: Vec<String>,
    pub credentials: Option<Credentials>,
    pub ca_cert: Option<PathBuf>,
    pub request_timeout: Duration,
    pub dial_timeout: Duration,
    pub etcdctl: PathBuf,
}

impl ConnectionSection {
    /// Resolve into a [`Connection`].
    ///
    /// The configured endpoints and credentials are used only when username,
    /// password, and every endpoint are non-empty. Anything less falls back
    /// to an unauthenticated plaintext connection to `localhost:2379`.
    pub fn resolve(&self) -> Connection {
        let username = self.username.as_deref().unwrap_or("");
        let password = self.password.as_deref().unwrap_or("");
        let complete = !username.is_empty()
            && !password.is_empty()
            && !self.endpoints.is_empty()
            && self.endpoints.iter().all(|e| !e.trim().is_empty());

        let (endpoints, credentials, ca_cert) = if complete {
            let endpoints = self
                .endpoints
                .iter()
                .map(|e| with_scheme(e.trim(), self.tls))
                .collect();
            let credentials = Credentials {
                username: username.to_string(),
                password: Zeroizing::new(password.to_string()),
            };
            let ca_cert = if self.tls { self.ca_cert.clone() } else { None };
            (endpoints, Some(credentials), ca_cert)
        } else {
            warn!(
                endpoint = constants::DEFAULT_ENDPOINT,
                "incomplete connection settings; using unauthenticated local endpoint"
            );
            (
                vec![with_scheme(constants::DEFAULT_ENDPOINT, false)],
                None,
                None,
            )
        };

        Connection {
            endpoints,
            credentials,
            ca_cert,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            dial_timeout: Duration::from_secs(self.dial_timeout_secs),
            etcdctl: self.etcdctl.clone(),
        }
    }
}

/// Prefix `endpoint` with a scheme unless it already has one.
fn with_scheme(endpoint: &str, tls: bool) -> String {
    if endpoint.contains("://") {
        return endpoint.to_string();
    }
    let scheme = if tls { "https" } else { "http" };
    format!("{}://{}", scheme, endpoint)
}

/// Split a comma-separated endpoint list, dropping surrounding whitespace.
pub fn split_endpoints(raw: &str) -> Vec<String> {
    raw.split(',').map(|e| e.trim().to_string()).collect()
}
