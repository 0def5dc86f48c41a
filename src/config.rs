//! Configuration for the chat client.
//!
//! The [`Config`] structure mirrors a `chat.toml` file.  Every field
//! has a default, so a missing file section, or no file at all, still
//! yields a usable configuration.  Command line arguments are layered
//! on top by the binary.
//!
//! Example `chat.toml`:
//!
//! ```toml
//! [server]
//! address = "chat.example.org"
//! port = 8700
//!
//! [user]
//! name = "Alice"
//!
//! [session]
//! connect_timeout_secs = 10
//! handshake_timeout_secs = 10
//! write_timeout_secs = 10
//! max_payload = 1048576
//! close_on_send_error = true
//! ```
//!
//! A timeout of `0` disables that deadline.

use std::fs;
use std::path::Path;
use std::time::Duration;

use rand::Rng;
use serde::Deserialize;

use crate::error::ConfigError;
use crate::protocol::DEFAULT_MAX_PAYLOAD;

/// Port the dispatcher listens on by convention.
pub const DEFAULT_PORT: u16 = 8700;

/// Server used when none is configured.
pub const DEFAULT_ADDRESS: &str = "localhost";

/// Top-level configuration.  Each section corresponds to a table in
/// the TOML file.
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub server: ServerSection,
    pub user: UserSection,
    pub session: SessionConfig,
}

/// Where the dispatcher lives.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ServerSection {
    pub address: String,
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

/// Who we announce ourselves as.  When no name is configured a
/// placeholder is generated at startup.
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct UserSection {
    pub name: Option<String>,
}

impl UserSection {
    /// The configured name, or a fresh placeholder.
    pub fn name_or_generated(&self) -> String {
        self.name.clone().unwrap_or_else(generate_username)
    }
}

/// Runtime knobs consumed by [`Session`](crate::session::Session).
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// Deadline for opening the connection.
    pub connect_timeout_secs: u64,
    /// Deadline for writing the username announce.
    pub handshake_timeout_secs: u64,
    /// Deadline for each outbound envelope.
    pub write_timeout_secs: u64,
    /// Largest payload accepted in either direction, in bytes.
    pub max_payload: u32,
    /// Whether a failed write ends the session.
    pub close_on_send_error: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
            handshake_timeout_secs: 10,
            write_timeout_secs: 10,
            max_payload: DEFAULT_MAX_PAYLOAD,
            close_on_send_error: true,
        }
    }
}

impl SessionConfig {
    pub fn connect_timeout(&self) -> Option<Duration> {
        secs(self.connect_timeout_secs)
    }

    pub fn handshake_timeout(&self) -> Option<Duration> {
        secs(self.handshake_timeout_secs)
    }

    pub fn write_timeout(&self) -> Option<Duration> {
        secs(self.write_timeout_secs)
    }
}

fn secs(n: u64) -> Option<Duration> {
    (n > 0).then(|| Duration::from_secs(n))
}

impl Config {
    /// Load configuration from a file.  See the top of this file for
    /// an example.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&contents)
    }

    /// Parse configuration from TOML text.
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }
}

/// Placeholder username: `User` followed by a number below 9000.
pub fn generate_username() -> String {
    format!("User{}", rand::thread_rng().gen_range(0..9000))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_file_gives_defaults() {
        let cfg = Config::parse("").unwrap();
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.server.address, "localhost");
        assert_eq!(cfg.server.port, 8700);
        assert!(cfg.user.name.is_none());
        assert!(cfg.session.close_on_send_error);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg = Config::parse("[server]\nport = 9100\n\n[session]\nwrite_timeout_secs = 0\n").unwrap();
        assert_eq!(cfg.server.port, 9100);
        assert_eq!(cfg.server.address, "localhost");
        assert_eq!(cfg.session.write_timeout(), None);
        assert_eq!(cfg.session.connect_timeout(), Some(Duration::from_secs(10)));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = Config::parse("[server]\nhost = \"x\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[server]\naddress = \"chat.local\"\n[user]\nname = \"Alice\"\n[session]\nmax_payload = 64\nclose_on_send_error = false"
        )
        .unwrap();

        let cfg = Config::load(file.path()).unwrap();
        assert_eq!(cfg.server.address, "chat.local");
        assert_eq!(cfg.user.name_or_generated(), "Alice");
        assert_eq!(cfg.session.max_payload, 64);
        assert!(!cfg.session.close_on_send_error);
    }

    #[test]
    fn missing_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn generated_usernames_are_in_range() {
        for _ in 0..50 {
            let name = generate_username();
            let n: u32 = name.strip_prefix("User").unwrap().parse().unwrap();
            assert!(n < 9000);
        }
    }
}
