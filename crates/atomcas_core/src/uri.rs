//! Backend URI parsing.
//!
//! # Responsibility
//! - Turn the single configuration string into a validated `BackendConfig`.
//! - Distinguish hosted (writable) workspaces from read-only ones.
//!
//! # Invariants
//! - `cas://[host[:port]]/<key>` opens a hosted workspace named `<key>`.
//! - `cas:///cas/<cid>` and `cas:///mns/<name>` open read-only workspaces;
//!   the MNS publisher is never started for them.
//! - The first path segments `cas` and `mns` are reserved and cannot be used
//!   as workspace key names.

use crate::error::{StoreError, StoreResult};
use once_cell::sync::Lazy;
use regex::Regex;

/// Default CAS daemon host.
pub const DEFAULT_HOST: &str = "localhost";
/// Default CAS daemon API port.
pub const DEFAULT_PORT: u16 = 5001;

/// Default MNS record lifetime.
const DEFAULT_PUBLISH_LIFETIME: &str = "24h";
/// Default MNS record time-to-live.
const DEFAULT_PUBLISH_TTL: &str = "30s";

static URI_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^cas://(?:(?P<host>[^/:]+))?(?::(?P<port>\d{1,5}))?(?P<path>/.*)?$")
        .expect("backend URI pattern is a valid regex")
});

static KEY_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]*$").expect("workspace key pattern is a valid regex")
});

/// What the backend opens: a named hosted workspace, or a frozen read target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkspaceRef {
    /// Hosted workspace addressed by an MNS key name. Writable.
    Key(String),
    /// Read-only workspace pinned to a raw workspace CID.
    Cid(String),
    /// Read-only workspace behind an MNS name, resolved on first use.
    Name(String),
}

/// Parsed backend configuration.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub host: String,
    pub port: u16,
    pub workspace: WorkspaceRef,
    /// MNS record lifetime passed to every publish.
    pub publish_lifetime: String,
    /// MNS record time-to-live passed to every publish.
    pub publish_ttl: String,
}

impl BackendConfig {
    /// Parses a backend URI string.
    ///
    /// # Errors
    /// Returns [`StoreError::BadUri`] for any string that does not match one
    /// of the three documented forms.
    pub fn parse(uri: &str) -> StoreResult<Self> {
        let trimmed = uri.trim();
        let captures = URI_PATTERN
            .captures(trimmed)
            .ok_or_else(|| StoreError::BadUri(format!("`{trimmed}` is not a cas:// URI")))?;

        let host = captures
            .name("host")
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = match captures.name("port") {
            Some(m) => m
                .as_str()
                .parse::<u16>()
                .map_err(|_| StoreError::BadUri(format!("port out of range in `{trimmed}`")))?,
            None => DEFAULT_PORT,
        };

        let path = captures
            .name("path")
            .map(|m| m.as_str())
            .unwrap_or("")
            .trim_matches('/');
        let workspace = Self::parse_workspace_path(trimmed, path)?;

        Ok(Self {
            host,
            port,
            workspace,
            publish_lifetime: DEFAULT_PUBLISH_LIFETIME.to_string(),
            publish_ttl: DEFAULT_PUBLISH_TTL.to_string(),
        })
    }

    fn parse_workspace_path(uri: &str, path: &str) -> StoreResult<WorkspaceRef> {
        if path.is_empty() {
            return Err(StoreError::BadUri(format!(
                "`{uri}` names no workspace key, CID or MNS name"
            )));
        }

        match path.split_once('/') {
            Some(("cas", rest)) if !rest.is_empty() => Ok(WorkspaceRef::Cid(rest.to_string())),
            Some(("mns", rest)) if !rest.is_empty() => Ok(WorkspaceRef::Name(rest.to_string())),
            Some(_) => Err(StoreError::BadUri(format!(
                "unexpected path `{path}` in `{uri}`"
            ))),
            None if path == "cas" || path == "mns" => Err(StoreError::BadUri(format!(
                "`{path}` is reserved and cannot be a workspace key"
            ))),
            None => {
                if !KEY_PATTERN.is_match(path) {
                    return Err(StoreError::BadUri(format!(
                        "invalid workspace key `{path}` in `{uri}`"
                    )));
                }
                Ok(WorkspaceRef::Key(path.to_string()))
            }
        }
    }

    /// Returns true when the workspace cannot be written or republished.
    pub fn is_read_only(&self) -> bool {
        !matches!(self.workspace, WorkspaceRef::Key(_))
    }

    /// Stable name of the workspace, empty for CID-pinned read workspaces.
    pub fn workspace_name(&self) -> &str {
        match &self.workspace {
            WorkspaceRef::Key(name) | WorkspaceRef::Name(name) => name,
            WorkspaceRef::Cid(_) => "",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{BackendConfig, WorkspaceRef, DEFAULT_HOST, DEFAULT_PORT};
    use crate::error::StoreError;

    #[test]
    fn hosted_workspace_with_host_and_port() {
        let config = BackendConfig::parse("cas://example.org:9094/kb-main").unwrap();
        assert_eq!(config.host, "example.org");
        assert_eq!(config.port, 9094);
        assert_eq!(config.workspace, WorkspaceRef::Key("kb-main".to_string()));
        assert!(!config.is_read_only());
        assert_eq!(config.workspace_name(), "kb-main");
    }

    #[test]
    fn hosted_workspace_defaults_host_and_port() {
        let config = BackendConfig::parse("cas:///my.workspace").unwrap();
        assert_eq!(config.host, DEFAULT_HOST);
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(
            config.workspace,
            WorkspaceRef::Key("my.workspace".to_string())
        );
    }

    #[test]
    fn read_workspace_by_raw_cid() {
        let config = BackendConfig::parse("cas:///cas/bafyexample123").unwrap();
        assert_eq!(config.workspace, WorkspaceRef::Cid("bafyexample123".to_string()));
        assert!(config.is_read_only());
        assert_eq!(config.workspace_name(), "");
    }

    #[test]
    fn read_workspace_by_mns_name() {
        let config = BackendConfig::parse("cas://10.0.0.7/mns/shared-kb").unwrap();
        assert_eq!(config.host, "10.0.0.7");
        assert_eq!(config.workspace, WorkspaceRef::Name("shared-kb".to_string()));
        assert!(config.is_read_only());
        assert_eq!(config.workspace_name(), "shared-kb");
    }

    #[test]
    fn rejects_malformed_uris() {
        for uri in [
            "http://localhost/key",
            "cas://",
            "cas:///",
            "cas:///cas/",
            "cas:///mns",
            "cas://host:70000/key",
            "cas:///bad key",
            "cas:///a/b",
        ] {
            let err = BackendConfig::parse(uri).unwrap_err();
            assert!(matches!(err, StoreError::BadUri(_)), "uri `{uri}` should be rejected");
        }
    }
}
