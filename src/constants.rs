//! Centralized constants for connection defaults, alphabets, and limits.

use std::time::Duration;

/// Endpoint used when no complete connection is configured.
pub const DEFAULT_ENDPOINT: &str = "localhost:2379";

/// Per-request timeout handed to etcdctl (`--command-timeout`).
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection timeout handed to etcdctl (`--dial-timeout`).
pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(5);

/// Extra time granted past the etcdctl timeouts before the child is killed.
pub const KILL_GRACE: Duration = Duration::from_secs(1);

/// Poll interval while waiting on an etcdctl child process.
pub const CHILD_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Default etcdctl binary name (resolved through PATH).
pub const DEFAULT_ETCDCTL: &str = "etcdctl";

/// Config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "etcd-steward.toml";

/// Default audit log location, relative to the working directory.
pub const DEFAULT_AUDIT_LOG: &str = "etcd-steward-audit.log";

/// Permission mode for the audit log.
pub const AUDIT_LOG_MODE: u32 = 0o640;

/// Permission mode for files holding generated passwords.
pub const SECRET_FILE_MODE: u32 = 0o600;

/// Maximum value size accepted from stdin (1 MiB).
pub const MAX_VALUE_SIZE: usize = 1_048_576;

pub const LOWER_CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
pub const UPPER_CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
pub const DIGIT_CHARS: &[u8] = b"0123456789";
pub const SPECIAL_CHARS: &[u8] = b"!@#$%&*+-_?.,";

/// Default generated password length.
pub const DEFAULT_PASSWORD_LENGTH: usize = 24;

/// Default minimum of each constrained character class.
pub const DEFAULT_PASSWORD_CLASS_MIN: usize = 3;

/// Range end meaning "every key greater than or equal to the key".
pub const FROM_KEY_RANGE_END: &[u8] = b"\0";
