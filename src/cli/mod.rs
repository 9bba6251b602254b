//! CLI routing and command dispatch.

use crate::constants;
use crate::core::audit_log::AuditLog;
use crate::core::settings;
use crate::error::Error;
use crate::models::settings::{ConnectionSection, SettingsFile};
use crate::util::etcdctl::EtcdCtl;
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use dialoguer::Password;
use std::env;
use std::io::Read;
use std::path::PathBuf;
use tracing::warn;
use zeroize::Zeroizing;

pub mod audit;
pub mod doctor;
pub mod key;
pub mod password;
pub mod permission;
pub mod role;
pub mod role_user;
pub mod user;

/// Shared context passed to all command handlers.
pub struct CliContext {
    pub store: EtcdCtl,
    pub settings: SettingsFile,
    pub settings_path: Option<PathBuf>,
    pub settings_warning: Option<String>,
    pub audit: Option<AuditLog>,
    pub non_interactive: bool,
}

impl CliContext {
    /// Append an audit line for a mutation. Audit failures only warn.
    pub fn audit<T>(
        &self,
        action: &str,
        resource: &str,
        target: &str,
        outcome: &crate::error::Result<T>,
    ) {
        let Some(log) = &self.audit else {
            return;
        };
        let error = outcome.as_ref().err().map(|e| e.to_string());
        if let Err(e) = log.record(action, resource, target, error) {
            warn!(error = %e, "audit log write failed");
            eprintln!("warning: audit log failed: {:#}", e);
        }
    }

    /// Read a secret from stdin, or prompt for it when interactive.
    pub fn read_password(&self, from_stdin: bool, prompt: &str) -> Result<Zeroizing<String>> {
        if !from_stdin && self.non_interactive {
            bail!("--non-interactive requires --from-stdin");
        }
        let secret = if from_stdin {
            let mut buf = Zeroizing::new(String::new());
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("read password from stdin")?;
            Zeroizing::new(buf.trim_end_matches(['\r', '\n']).to_string())
        } else {
            Zeroizing::new(
                Password::new()
                    .with_prompt(prompt)
                    .with_confirmation("Repeat password", "Passwords do not match")
                    .allow_empty_password(false)
                    .interact()
                    .context("read password from prompt")?,
            )
        };
        Ok(secret)
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "etcd-steward",
    version,
    about = "Manage etcd keys, users, roles, and permissions"
)]
pub struct Cli {
    /// Settings file (default: ./etcd-steward.toml when present)
    #[arg(long, global = true, value_name = "PATH", env = "ETCD_STEWARD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Comma-separated etcd endpoints
    #[arg(long, global = true, env = "ETCD_ENDPOINT")]
    pub endpoints: Option<String>,

    /// etcd user; the password is read from ETCD_PASSWORD
    #[arg(long, global = true, env = "ETCD_USERNAME")]
    pub username: Option<String>,

    /// Use https for endpoints given without a scheme
    #[arg(long, global = true, env = "ETCD_TLS", value_name = "BOOL")]
    pub tls: Option<bool>,

    /// CA certificate for TLS endpoints
    #[arg(long, global = true, env = "ETCD_CACERT", value_name = "PATH")]
    pub ca_cert: Option<PathBuf>,

    /// Per-request timeout in seconds
    #[arg(long, global = true, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Run in non-interactive mode (no prompts, suitable for automation)
    #[arg(long, global = true, env = "ETCD_STEWARD_NON_INTERACTIVE")]
    pub non_interactive: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        let settings_path = settings::locate(self.config.clone());
        let mut settings_warning = None;
        let mut settings = match &settings_path {
            Some(path) => match settings::load(path) {
                Ok(s) => s,
                // doctor reports a broken settings file instead of failing on it
                Err(e) if matches!(self.command, Commands::Doctor(_)) => {
                    settings_warning = Some(format!("{:#}", e));
                    SettingsFile::default()
                }
                Err(e) => return Err(e),
            },
            None => SettingsFile::default(),
        };
        self.apply_overrides(&mut settings.connection);

        let audit = settings.audit.enabled.then(|| {
            AuditLog::new(
                settings
                    .audit
                    .path
                    .clone()
                    .unwrap_or_else(|| PathBuf::from(constants::DEFAULT_AUDIT_LOG)),
            )
        });

        let ctx = CliContext {
            store: EtcdCtl::new(settings.connection.resolve()),
            settings,
            settings_path,
            settings_warning,
            audit,
            non_interactive: self.non_interactive,
        };

        match self.command {
            Commands::Key { command } => key::run(&ctx, command),
            Commands::Role { command } => role::run(&ctx, command),
            Commands::User { command } => user::run(&ctx, command),
            Commands::Permission { command } => permission::run(&ctx, command),
            Commands::RoleUser { command } => role_user::run(&ctx, command),
            Commands::Password { command } => password::run(&ctx, command),
            Commands::Audit { command } => audit::run(&ctx, command),
            Commands::Doctor(args) => doctor::run(&ctx, args),
        }
    }

    fn apply_overrides(&self, conn: &mut ConnectionSection) {
        if let Some(raw) = &self.endpoints {
            conn.endpoints = settings::split_endpoints(raw);
        }
        if let Some(username) = &self.username {
            conn.username = Some(username.clone());
        }
        if let Ok(password) = env::var("ETCD_PASSWORD") {
            if !password.is_empty() {
                conn.password = Some(password);
            }
        }
        if let Some(tls) = self.tls {
            conn.tls = tls;
        }
        if let Some(ca) = &self.ca_cert {
            conn.ca_cert = Some(ca.clone());
        }
        if let Some(secs) = self.timeout {
            conn.request_timeout_secs = secs;
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Read and write keys
    Key {
        #[command(subcommand)]
        command: key::KeyCommand,
    },
    /// Manage roles
    Role {
        #[command(subcommand)]
        command: role::RoleCommand,
    },
    /// Manage users
    User {
        #[command(subcommand)]
        command: user::UserCommand,
    },
    /// Grant, inspect, and revoke role permissions
    Permission {
        #[command(subcommand)]
        command: permission::PermissionCommand,
    },
    /// Bind roles to users
    RoleUser {
        #[command(subcommand)]
        command: role_user::RoleUserCommand,
    },
    /// Generate passwords locally
    Password {
        #[command(subcommand)]
        command: password::PasswordCommand,
    },
    /// View the audit trail
    Audit {
        #[command(subcommand)]
        command: audit::AuditCommand,
    },
    /// Diagnose etcdctl, settings, and endpoint health (read-only)
    Doctor(doctor::DoctorArgs),
}

pub(crate) fn parse_format(s: &str) -> Result<String, String> {
    match s {
        "table" | "json" => Ok(s.to_string()),
        other => Err(format!("invalid format '{}' (use table|json)", other)),
    }
}

pub(crate) fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("serialize output")?;
    println!("{}", json);
    Ok(())
}

/// Print `err` to stderr, with recovery details for half-finished renames.
pub fn report(err: &anyhow::Error) {
    eprintln!("error: {:#}", err);
    match err.chain().find_map(|e| e.downcast_ref::<Error>()) {
        Some(Error::PartialMigration {
            from,
            to,
            granted,
            remaining,
            ..
        }) => {
            eprintln!("  '{}' still exists and is unchanged.", from);
            eprintln!("  moved to '{}':", to);
            for item in granted {
                eprintln!("    - {}", item);
            }
            eprintln!("  not moved:");
            for item in remaining {
                eprintln!("    - {}", item);
            }
        }
        Some(Error::CleanupFailed { from, .. }) => {
            eprintln!("  delete '{}' by hand once the cause is fixed.", from);
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_overrides_replace_settings() {
        let cli = Cli::try_parse_from([
            "etcd-steward",
            "--endpoints",
            "a:2379, b:2379",
            "--username",
            "ops",
            "--tls",
            "false",
            "--timeout",
            "9",
            "role",
            "get",
            "admin",
        ])
        .unwrap();
        let mut conn = ConnectionSection::default();
        cli.apply_overrides(&mut conn);
        assert_eq!(conn.endpoints, vec!["a:2379", "b:2379"]);
        assert_eq!(conn.username.as_deref(), Some("ops"));
        assert!(!conn.tls);
        assert_eq!(conn.request_timeout_secs, 9);
    }

    #[test]
    fn test_parse_format() {
        assert!(parse_format("json").is_ok());
        assert!(parse_format("yaml").is_err());
    }
}
