//! Settings file model (`etcd-steward.toml`).

use crate::constants;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsFile {
    #[serde(default)]
    pub connection: ConnectionSection,
    #[serde(default)]
    pub password: PasswordPolicy,
    #[serde(default)]
    pub audit: AuditSection,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ConnectionSection {
    #[serde(default)]
    pub endpoints: Vec<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Use TLS for scheme-less endpoints.
    #[serde(default = "default_tls")]
    pub tls: bool,
    #[serde(default)]
    pub ca_cert: Option<PathBuf>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_dial_timeout_secs")]
    pub dial_timeout_secs: u64,
    #[serde(default = "default_etcdctl")]
    pub etcdctl: PathBuf,
}

impl Default for ConnectionSection {
    fn default() -> Self {
        Self {
            endpoints: Vec::new(),
            username: None,
            password: None,
            tls: default_tls(),
            ca_cert: None,
            request_timeout_secs: default_request_timeout_secs(),
            dial_timeout_secs: default_dial_timeout_secs(),
            etcdctl: default_etcdctl(),
        }
    }
}

impl fmt::Debug for ConnectionSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSection")
            .field("endpoints", &self.endpoints)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("tls", &self.tls)
            .field("ca_cert", &self.ca_cert)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("dial_timeout_secs", &self.dial_timeout_secs)
            .field("etcdctl", &self.etcdctl)
            .finish()
    }
}

/// Character-class constraints for generated passwords.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordPolicy {
    #[serde(default = "default_password_length")]
    pub length: usize,
    #[serde(default = "default_class_min")]
    pub min_special: usize,
    #[serde(default = "default_class_min")]
    pub min_digits: usize,
    #[serde(default = "default_class_min")]
    pub min_upper: usize,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            length: default_password_length(),
            min_special: default_class_min(),
            min_digits: default_class_min(),
            min_upper: default_class_min(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditSection {
    #[serde(default = "default_audit_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl Default for AuditSection {
    fn default() -> Self {
        Self {
            enabled: default_audit_enabled(),
            path: None,
        }
    }
}

fn default_tls() -> bool {
    true
}

fn default_request_timeout_secs() -> u64 {
    constants::DEFAULT_REQUEST_TIMEOUT.as_secs()
}

fn default_dial_timeout_secs() -> u64 {
    constants::DEFAULT_DIAL_TIMEOUT.as_secs()
}

fn default_etcdctl() -> PathBuf {
    PathBuf::from(constants::DEFAULT_ETCDCTL)
}

fn default_password_length() -> usize {
    constants::DEFAULT_PASSWORD_LENGTH
}

fn default_class_min() -> usize {
    constants::DEFAULT_PASSWORD_CLASS_MIN
}

fn default_audit_enabled() -> bool {
    true
}
