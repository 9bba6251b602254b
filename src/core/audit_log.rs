//! Append-only JSON-lines trail of mutating operations.
//!
//! Entries never contain secrets or values, only what was done to which
//! resource, by whom, and whether it worked.

use crate::constants;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub actor: String,
    pub action: String,
    /// Resource kind: key, role, user, permission, role-user.
    pub resource: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<AuditResult>,
}

fn detect_actor() -> String {
    if let Ok(user) = std::env::var("SUDO_USER") {
        if !user.is_empty() {
            return format!("{}(sudo)", user);
        }
    }
    std::env::var("USER").unwrap_or_else(|_| "unknown".to_string())
}

#[derive(Debug, Clone)]
pub struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry for `action` on `resource`/`target`.
    pub fn record(
        &self,
        action: &str,
        resource: &str,
        target: &str,
        error: Option<String>,
    ) -> Result<()> {
        let entry = AuditEntry {
            timestamp: Utc::now(),
            actor: detect_actor(),
            action: action.to_string(),
            resource: resource.to_string(),
            target: target.to_string(),
            result: Some(AuditResult {
                success: error.is_none(),
                error,
            }),
        };
        let line = serde_json::to_string(&entry).context("serialize audit entry")?;
        self.append_line(&line)
    }

    fn append_line(&self, line: &str) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("create dir {}", parent.display()))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("open audit log {}", self.path.display()))?;
        // flock is released when `file` is closed
        file.lock_exclusive()
            .with_context(|| format!("lock audit log {}", self.path.display()))?;
        writeln!(file, "{}", line).context("write audit entry")?;

        #[cfg(unix)]
        {
            let perm = fs::Permissions::from_mode(constants::AUDIT_LOG_MODE);
            fs::set_permissions(&self.path, perm).context("set audit log permissions")?;
        }
        Ok(())
    }

    /// Read entries, keeping only the last `limit` when given.
    pub fn read(&self, limit: Option<usize>) -> Result<Vec<AuditEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let file = File::open(&self.path)
            .with_context(|| format!("open audit log {}", self.path.display()))?;
        file.lock_shared()
            .with_context(|| format!("lock audit log {}", self.path.display()))?;

        let mut entries = Vec::new();
        let mut malformed = 0usize;
        for line in BufReader::new(&file).lines() {
            let line = line.context("read audit log line")?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<AuditEntry>(trimmed) {
                Ok(entry) => entries.push(entry),
                Err(_) => malformed += 1,
            }
        }
        if malformed > 0 {
            warn!(malformed, path = %self.path.display(), "skipped malformed audit entries");
        }

        if let Some(limit) = limit {
            if entries.len() > limit {
                entries = entries.split_off(entries.len() - limit);
            }
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_log() -> (TempDir, AuditLog) {
        let dir = TempDir::new().unwrap();
        let log = AuditLog::new(dir.path().join("audit.log"));
        (dir, log)
    }

    #[test]
    fn test_record_and_read() {
        let (_dir, log) = test_log();
        log.record("create", "role", "admin", None).unwrap();
        log.record("rename", "role", "admin->ops", Some("timed out".into()))
            .unwrap();
        let entries = log.read(None).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].resource, "role");
        assert!(entries[0].result.as_ref().unwrap().success);
        let failed = entries[1].result.as_ref().unwrap();
        assert!(!failed.success);
        assert_eq!(failed.error.as_deref(), Some("timed out"));
    }

    #[test]
    fn test_read_with_limit_keeps_tail() {
        let (_dir, log) = test_log();
        for i in 0..5 {
            log.record("put", "key", &format!("/k{}", i), None).unwrap();
        }
        let entries = log.read(Some(2)).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].target, "/k4");
    }

    #[test]
    fn test_read_missing_file_is_empty() {
        let (_dir, log) = test_log();
        assert!(log.read(None).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_lines_skipped() {
        let (_dir, log) = test_log();
        log.record("delete", "user", "bob", None).unwrap();
        let mut file = OpenOptions::new().append(true).open(log.path()).unwrap();
        writeln!(file, "not json").unwrap();
        assert_eq!(log.read(None).unwrap().len(), 1);
    }

    #[test]
    fn test_creates_parent_directory() {
        let dir = TempDir::new().unwrap();
        let log = AuditLog::new(dir.path().join("nested/dir/audit.log"));
        log.record("create", "key", "/a", None).unwrap();
        assert!(log.path().is_file());
    }

    #[cfg(unix)]
    #[test]
    fn test_log_mode() {
        let (_dir, log) = test_log();
        log.record("create", "key", "/a", None).unwrap();
        let mode = fs::metadata(log.path()).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, constants::AUDIT_LOG_MODE);
    }
}
