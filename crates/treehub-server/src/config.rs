use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ServerError, ServerResult};

pub const ENV_BIND_ADDR: &str = "TREEHUB_BIND_ADDR";
pub const ENV_LOG_LEVEL: &str = "TREEHUB_LOG_LEVEL";
pub const ENV_STORAGE_ROOT: &str = "TREEHUB_STORAGE_ROOT";

/// Server configuration, loaded from TOML. Every field has a default.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub request_timeout_secs: u64,
    pub storage: StorageConfig,
    pub db: DbConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            log_level: "info".to_string(),
            request_timeout_secs: 30,
            storage: StorageConfig::Memory,
            db: DbConfig::Memory,
        }
    }
}

/// Blob plane backend.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StorageConfig {
    #[serde(rename = "localfs")]
    LocalFs {
        #[serde(default)]
        root: PathBuf,
    },
    #[serde(rename = "memory")]
    Memory,
}

/// Metadata plane backend.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DbConfig {
    /// Embedded keyspace directory.
    #[serde(rename = "fjall")]
    Fjall { path: PathBuf },
    #[serde(rename = "memory")]
    Memory,
}

impl ServerConfig {
    /// Read and parse a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> ServerResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| ServerError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml(&text)
            .map_err(|e| ServerError::Config(format!("{}: {e}", path.display())))
    }

    pub fn from_toml(text: &str) -> ServerResult<Self> {
        toml::from_str(text).map_err(|e| ServerError::Config(e.to_string()))
    }

    /// Apply `TREEHUB_*` environment overrides.
    pub fn apply_env_overrides(&mut self) -> ServerResult<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup. Setting a storage root
    /// selects the local filesystem backend.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> ServerResult<()> {
        if let Some(addr) = lookup(ENV_BIND_ADDR) {
            self.bind_addr = addr
                .parse()
                .map_err(|e| ServerError::Config(format!("{ENV_BIND_ADDR}={addr}: {e}")))?;
        }
        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            self.log_level = level;
        }
        if let Some(root) = lookup(ENV_STORAGE_ROOT) {
            self.storage = StorageConfig::LocalFs { root: root.into() };
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn log_summary(&self) {
        info!(
            bind_addr = %self.bind_addr,
            log_level = %self.log_level,
            request_timeout_secs = self.request_timeout_secs,
            storage = ?self.storage,
            db = ?self.db,
            "current config"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config() {
        let c = ServerConfig::default();
        assert_eq!(c.bind_addr, "0.0.0.0:8080".parse::<SocketAddr>().unwrap());
        assert_eq!(c.request_timeout(), Duration::from_secs(30));
        assert_eq!(c.storage, StorageConfig::Memory);
        assert_eq!(c.db, DbConfig::Memory);
    }

    #[test]
    fn parses_full_file() {
        let c = ServerConfig::from_toml(
            r#"
            bind_addr = "127.0.0.1:9000"
            log_level = "debug"
            request_timeout_secs = 5

            [storage]
            type = "localfs"
            root = "/var/lib/treehub"

            [db]
            type = "fjall"
            path = "/var/lib/treehub/db"
            "#,
        )
        .unwrap();
        assert_eq!(c.bind_addr.port(), 9000);
        assert_eq!(c.log_level, "debug");
        assert_eq!(
            c.storage,
            StorageConfig::LocalFs {
                root: "/var/lib/treehub".into()
            }
        );
        assert_eq!(
            c.db,
            DbConfig::Fjall {
                path: "/var/lib/treehub/db".into()
            }
        );
    }

    #[test]
    fn missing_fields_use_defaults() {
        let c = ServerConfig::from_toml("log_level = \"warn\"\n").unwrap();
        assert_eq!(c.log_level, "warn");
        assert_eq!(c.bind_addr, ServerConfig::default().bind_addr);
        assert_eq!(c.storage, StorageConfig::Memory);
    }

    #[test]
    fn localfs_root_is_optional() {
        let c = ServerConfig::from_toml("[storage]\ntype = \"localfs\"\n").unwrap();
        assert_eq!(
            c.storage,
            StorageConfig::LocalFs {
                root: PathBuf::new()
            }
        );
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let err = ServerConfig::from_toml("[storage]\ntype = \"s3\"\n").unwrap_err();
        assert!(matches!(err, ServerError::Config(_)));
        assert!(ServerConfig::from_toml("[db]\ntype = \"mongodb\"\n").is_err());
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("treehub.toml");
        fs::write(&path, "request_timeout_secs = 7\n").unwrap();
        assert_eq!(ServerConfig::load(&path).unwrap().request_timeout_secs, 7);
        assert!(ServerConfig::load(dir.path().join("missing.toml")).is_err());
    }

    #[test]
    fn overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_BIND_ADDR, "127.0.0.1:1234"),
            (ENV_LOG_LEVEL, "trace"),
            (ENV_STORAGE_ROOT, "/srv/objects"),
        ]
        .into_iter()
        .collect();
        let mut c = ServerConfig::default();
        c.apply_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(c.bind_addr.port(), 1234);
        assert_eq!(c.log_level, "trace");
        assert_eq!(
            c.storage,
            StorageConfig::LocalFs {
                root: "/srv/objects".into()
            }
        );
    }

    #[test]
    fn bad_bind_override_is_config_error() {
        let mut c = ServerConfig::default();
        let err = c
            .apply_overrides(|k| (k == ENV_BIND_ADDR).then(|| "nope".to_string()))
            .unwrap_err();
        assert!(matches!(err, ServerError::Config(_)));
    }
}
