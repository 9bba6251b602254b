//! [`StoreClient`] backed by the `etcdctl` v3 binary.
//!
//! Credentials travel in `ETCDCTL_USER`; passwords and values go through
//! stdin. Neither ever appears on the command line. Positional arguments
//! follow `--` so keys starting with `-` are not taken for flags. Permission
//! keys and range ends are passed as raw bytes.

use crate::constants;
use crate::core::settings::Connection;
use crate::core::store::{StoreClient, StoreOp};
use crate::error::{Error, ErrorKind, Result};
use crate::models::kv::KeyValue;
use crate::models::permission::{display_bytes, AccessLevel, Permission};
use crate::models::role::Role;
use crate::models::user::User;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;
use std::ffi::OsString;
use std::io::{self, Read, Write};
use std::process::{Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use zeroize::Zeroizing;

const JSON: &str = "--write-out=json";

pub struct EtcdCtl {
    conn: Connection,
}

impl EtcdCtl {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// `etcdctl version` output.
    pub fn version(&self) -> Result<String> {
        let out = self.run(StoreOp::EndpointHealth, "etcdctl", &args(&["version"]), None)?;
        Ok(String::from_utf8_lossy(&out).trim().to_string())
    }

    /// `etcdctl endpoint health` output for the configured endpoints.
    pub fn endpoint_health(&self) -> Result<String> {
        let target = self.conn.endpoints.join(",");
        let out = self.run(StoreOp::EndpointHealth, &target, &args(&["endpoint", "health"]), None)?;
        Ok(String::from_utf8_lossy(&out).trim().to_string())
    }

    fn global_args(&self) -> Vec<String> {
        let mut out = vec![
            format!("--endpoints={}", self.conn.endpoints.join(",")),
            format!("--dial-timeout={}", duration_arg(self.conn.dial_timeout)),
            format!("--command-timeout={}", duration_arg(self.conn.request_timeout)),
        ];
        if let Some(ca) = &self.conn.ca_cert {
            out.push(format!("--cacert={}", ca.display()));
        }
        out
    }

    fn command(&self, args: &[OsString]) -> Command {
        let mut cmd = Command::new(&self.conn.etcdctl);
        cmd.env("ETCDCTL_API", "3")
            .env_remove("ETCDCTL_ENDPOINTS")
            .env_remove("ETCDCTL_USER")
            .env_remove("ETCDCTL_PASSWORD")
            .args(self.global_args())
            .args(args);
        if let Some(creds) = &self.conn.credentials {
            cmd.env(
                "ETCDCTL_USER",
                format!("{}:{}", creds.username, creds.password.as_str()),
            );
        }
        cmd
    }

    fn deadline(&self) -> Instant {
        Instant::now() + self.conn.request_timeout + self.conn.dial_timeout + constants::KILL_GRACE
    }

    fn run(
        &self,
        op: StoreOp,
        target: &str,
        args: &[OsString],
        stdin: Option<Zeroizing<Vec<u8>>>,
    ) -> Result<Vec<u8>> {
        debug!(%op, target, "etcdctl call");
        let mut cmd = self.command(args);
        cmd.stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| {
            let message = if e.kind() == io::ErrorKind::NotFound {
                format!("{} not found on PATH", self.conn.etcdctl.display())
            } else {
                format!("spawn {}: {}", self.conn.etcdctl.display(), e)
            };
            Error::store(op, target, ErrorKind::Unavailable, message)
        })?;

        let writer = match (child.stdin.take(), stdin) {
            (Some(mut pipe), Some(data)) => Some(thread::spawn(move || {
                // EPIPE just means etcdctl exited early; its status tells why.
                let _ = pipe.write_all(&data);
            })),
            _ => None,
        };
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let deadline = self.deadline();
        let outcome: Result<ExitStatus> = loop {
            match child.try_wait() {
                Ok(Some(status)) => break Ok(status),
                Ok(None) if Instant::now() >= deadline => {
                    let _ = child.kill();
                    let _ = child.wait();
                    warn!(%op, target, "etcdctl killed at deadline");
                    break Err(Error::store(op, target, ErrorKind::Timeout, "deadline exceeded"));
                }
                Ok(None) => thread::sleep(constants::CHILD_POLL_INTERVAL),
                Err(e) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    break Err(Error::store(
                        op,
                        target,
                        ErrorKind::Unavailable,
                        format!("wait for etcdctl: {}", e),
                    ));
                }
            }
        };

        // The child is reaped on every path, so its pipes are closed and
        // these threads finish.
        if let Some(writer) = writer {
            let _ = writer.join();
        }
        let stdout = stdout.join().unwrap_or_default();
        let stderr = stderr.join().unwrap_or_default();
        let status = outcome?;

        if status.success() {
            return Ok(stdout);
        }
        let message = error_message(&stderr, &stdout);
        let kind = classify(&message);
        debug!(%op, target, %kind, "etcdctl failed");
        Err(Error::store(op, target, kind, message))
    }
}

impl StoreClient for EtcdCtl {
    fn get(&self, key: &str) -> Result<Option<KeyValue>> {
        let out = self.run(StoreOp::Get, key, &args(&[JSON, "get", "--", key]), None)?;
        let kvs = parse_kvs(StoreOp::Get, key, &out)?;
        Ok(kvs.into_iter().find(|kv| kv.key == key))
    }

    fn get_prefix(&self, prefix: &str) -> Result<Vec<KeyValue>> {
        let out = self.run(
            StoreOp::GetPrefix,
            prefix,
            &args(&[JSON, "get", "--prefix", "--", prefix]),
            None,
        )?;
        parse_kvs(StoreOp::GetPrefix, prefix, &out)
    }

    fn put(&self, key: &str, value: &str) -> Result<()> {
        // etcdctl refuses an empty stdin, so an empty value goes on argv.
        if value.is_empty() {
            self.run(StoreOp::Put, key, &args(&["put", "--", key, ""]), None)?;
        } else {
            self.run(
                StoreOp::Put,
                key,
                &args(&["put", "--", key]),
                Some(Zeroizing::new(value.as_bytes().to_vec())),
            )?;
        }
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<u64> {
        let out = self.run(StoreOp::Delete, key, &args(&["del", "--", key]), None)?;
        let text = String::from_utf8_lossy(&out);
        text.trim().parse::<u64>().map_err(|_| {
            Error::store(
                StoreOp::Delete,
                key,
                ErrorKind::Malformed,
                format!("expected deleted count, got '{}'", text.trim()),
            )
        })
    }

    fn get_role(&self, name: &str) -> Result<Option<Role>> {
        match self.run(StoreOp::GetRole, name, &args(&[JSON, "role", "get", "--", name]), None) {
            Ok(out) => parse_role(name, &out).map(Some),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn create_role(&self, name: &str) -> Result<()> {
        self.run(StoreOp::CreateRole, name, &args(&["role", "add", "--", name]), None)?;
        Ok(())
    }

    fn delete_role(&self, name: &str) -> Result<()> {
        self.run(StoreOp::DeleteRole, name, &args(&["role", "delete", "--", name]), None)?;
        Ok(())
    }

    fn grant_permission(&self, role: &str, perm: &Permission) -> Result<()> {
        self.run(StoreOp::GrantPermission, role, &grant_args(role, perm)?, None)?;
        Ok(())
    }

    fn revoke_permission(&self, role: &str, key: &[u8], range_end: &[u8]) -> Result<()> {
        self.run(
            StoreOp::RevokePermission,
            role,
            &revoke_args(role, key, range_end)?,
            None,
        )?;
        Ok(())
    }

    fn get_user(&self, name: &str) -> Result<Option<User>> {
        match self.run(StoreOp::GetUser, name, &args(&[JSON, "user", "get", "--", name]), None) {
            Ok(out) => parse_user(name, &out).map(Some),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn create_user(&self, name: &str, password: &str) -> Result<()> {
        self.run(
            StoreOp::CreateUser,
            name,
            &args(&["user", "add", "--interactive=false", "--", name]),
            Some(password_stdin(password)),
        )?;
        Ok(())
    }

    fn delete_user(&self, name: &str) -> Result<()> {
        self.run(StoreOp::DeleteUser, name, &args(&["user", "delete", "--", name]), None)?;
        Ok(())
    }

    fn change_password(&self, name: &str, password: &str) -> Result<()> {
        self.run(
            StoreOp::ChangePassword,
            name,
            &args(&["user", "passwd", "--interactive=false", "--", name]),
            Some(password_stdin(password)),
        )?;
        Ok(())
    }

    fn grant_role_to_user(&self, user: &str, role: &str) -> Result<()> {
        self.run(
            StoreOp::GrantRole,
            user,
            &args(&["user", "grant-role", "--", user, role]),
            None,
        )?;
        Ok(())
    }

    fn revoke_role_from_user(&self, user: &str, role: &str) -> Result<()> {
        self.run(
            StoreOp::RevokeRole,
            user,
            &args(&["user", "revoke-role", "--", user, role]),
            None,
        )?;
        Ok(())
    }
}

fn args(parts: &[&str]) -> Vec<OsString> {
    parts.iter().map(OsString::from).collect()
}

/// A key as an argument, byte for byte.
#[cfg(unix)]
fn key_arg(key: &[u8]) -> Result<OsString> {
    use std::os::unix::ffi::OsStrExt;
    Ok(std::ffi::OsStr::from_bytes(key).to_os_string())
}

#[cfg(not(unix))]
fn key_arg(key: &[u8]) -> Result<OsString> {
    std::str::from_utf8(key).map(OsString::from).map_err(|_| {
        Error::invalid(format!(
            "key {} is not UTF-8 and cannot be passed to etcdctl on this platform",
            display_bytes(key)
        ))
    })
}

fn password_stdin(password: &str) -> Zeroizing<Vec<u8>> {
    let mut buf = Zeroizing::new(Vec::with_capacity(password.len() + 1));
    buf.extend_from_slice(password.as_bytes());
    buf.push(b'\n');
    buf
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

/// Go duration literal accepted by etcdctl flags.
fn duration_arg(d: Duration) -> String {
    if d.subsec_millis() == 0 {
        format!("{}s", d.as_secs())
    } else {
        format!("{}ms", d.as_millis())
    }
}

/// Arguments selecting `range_end` after the positional key.
fn push_range(
    out: &mut Vec<OsString>,
    flags_at: usize,
    key: &[u8],
    range_end: &[u8],
) -> Result<()> {
    out.push(key_arg(key)?);
    match range_end {
        b"" => {}
        constants::FROM_KEY_RANGE_END => out.insert(flags_at, OsString::from("--from-key")),
        end => out.push(key_arg(end)?),
    }
    Ok(())
}

fn grant_args(role: &str, perm: &Permission) -> Result<Vec<OsString>> {
    let mut out = args(&["role", "grant-permission"]);
    let flags_at = out.len();
    out.extend(args(&["--", role, perm.access.as_etcdctl_arg()]));
    push_range(&mut out, flags_at, &perm.key, &perm.range_end)?;
    Ok(out)
}

fn revoke_args(role: &str, key: &[u8], range_end: &[u8]) -> Result<Vec<OsString>> {
    let mut out = args(&["role", "revoke-permission"]);
    let flags_at = out.len();
    out.extend(args(&["--", role]));
    push_range(&mut out, flags_at, key, range_end)?;
    Ok(out)
}

fn error_message(stderr: &[u8], stdout: &[u8]) -> String {
    let raw = if stderr.iter().all(u8::is_ascii_whitespace) {
        String::from_utf8_lossy(stdout)
    } else {
        String::from_utf8_lossy(stderr)
    };
    raw.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with("{\"level\""))
        .map(|l| l.trim_start_matches("Error:").trim())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Map an etcdctl error message onto the error taxonomy.
pub fn classify(message: &str) -> ErrorKind {
    let m = message.to_ascii_lowercase();
    if m.contains("already exists") {
        ErrorKind::AlreadyExists
    } else if m.contains("deadline exceeded") || m.contains("request timed out") {
        ErrorKind::Timeout
    } else if m.contains("not found") || m.contains("is not granted") {
        ErrorKind::NotFound
    } else if m.contains("permission denied")
        || m.contains("authentication failed")
        || m.contains("invalid auth token")
        || m.contains("user name is empty")
    {
        ErrorKind::PermissionDenied
    } else if m.contains("connection refused")
        || m.contains("unavailable")
        || m.contains("transport")
        || m.contains("no route to host")
        || m.contains("connection reset")
    {
        ErrorKind::Unavailable
    } else {
        ErrorKind::Rejected
    }
}

#[derive(Debug, Deserialize)]
struct RawKv {
    #[serde(default)]
    key: String,
    #[serde(default)]
    value: String,
    #[serde(default)]
    create_revision: i64,
    #[serde(default)]
    mod_revision: i64,
    #[serde(default)]
    version: i64,
}

#[derive(Debug, Deserialize)]
struct RangeResponse {
    #[serde(default)]
    kvs: Vec<RawKv>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawPermType {
    Code(i32),
    Name(String),
}

#[derive(Debug, Deserialize)]
struct RawPermission {
    #[serde(default, rename = "permType")]
    perm_type: Option<RawPermType>,
    #[serde(default)]
    key: String,
    #[serde(default)]
    range_end: String,
}

#[derive(Debug, Deserialize)]
struct RoleGetResponse {
    #[serde(default)]
    perm: Vec<RawPermission>,
}

#[derive(Debug, Deserialize)]
struct UserGetResponse {
    #[serde(default)]
    roles: Vec<String>,
}

fn decode_bytes(op: StoreOp, target: &str, field: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(field)
        .map_err(|e| Error::store(op, target, ErrorKind::Malformed, format!("base64: {}", e)))
}

/// Keys and values read as text must be UTF-8; nothing is replaced.
fn decode_text(op: StoreOp, target: &str, field: &str) -> Result<String> {
    String::from_utf8(decode_bytes(op, target, field)?).map_err(|e| {
        Error::store(
            op,
            target,
            ErrorKind::Malformed,
            format!("{} is not UTF-8", display_bytes(e.as_bytes())),
        )
    })
}

fn parse_json<'de, T: Deserialize<'de>>(op: StoreOp, target: &str, out: &'de [u8]) -> Result<T> {
    serde_json::from_slice(out)
        .map_err(|e| Error::store(op, target, ErrorKind::Malformed, format!("json: {}", e)))
}

fn parse_kvs(op: StoreOp, target: &str, out: &[u8]) -> Result<Vec<KeyValue>> {
    let resp: RangeResponse = parse_json(op, target, out)?;
    resp.kvs
        .into_iter()
        .map(|raw| -> Result<KeyValue> {
            Ok(KeyValue {
                key: decode_text(op, target, &raw.key)?,
                value: decode_text(op, target, &raw.value)?,
                create_revision: raw.create_revision,
                mod_revision: raw.mod_revision,
                version: raw.version,
            })
        })
        .collect()
}

fn access_level(name: &str, raw: Option<&RawPermType>) -> Result<AccessLevel> {
    match raw {
        None | Some(RawPermType::Code(0)) => Ok(AccessLevel::Read),
        Some(RawPermType::Code(1)) => Ok(AccessLevel::Write),
        Some(RawPermType::Code(2)) => Ok(AccessLevel::ReadWrite),
        Some(RawPermType::Name(s)) => s.parse(),
        Some(RawPermType::Code(other)) => Err(Error::store(
            StoreOp::GetRole,
            name,
            ErrorKind::Malformed,
            format!("unknown permission type {}", other),
        )),
    }
}

fn parse_role(name: &str, out: &[u8]) -> Result<Role> {
    let resp: RoleGetResponse = parse_json(StoreOp::GetRole, name, out)?;
    let permissions = resp
        .perm
        .iter()
        .map(|raw| -> Result<Permission> {
            Ok(Permission {
                key: decode_bytes(StoreOp::GetRole, name, &raw.key)?,
                range_end: decode_bytes(StoreOp::GetRole, name, &raw.range_end)?,
                access: access_level(name, raw.perm_type.as_ref())?,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Role {
        name: name.to_string(),
        permissions,
    })
}

fn parse_user(name: &str, out: &[u8]) -> Result<User> {
    let resp: UserGetResponse = parse_json(StoreOp::GetUser, name, out)?;
    Ok(User {
        name: name.to_string(),
        roles: resp.roles,
    })
}
