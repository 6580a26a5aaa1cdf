//! Hosts file watcher.
//!
//! The hosts file is the monitor's view of the outside world: which hosts
//! exist, whether an operator wants them disabled, and the latest check-in
//! and inventory each host agent reported. It is re-read on every cycle.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use host_lifecycle::HostId;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Parsed hosts file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostsFile {
    /// Hosts that should be managed
    #[serde(default)]
    pub hosts: Vec<HostEntry>,
}

/// One host in the hosts file.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostEntry {
    /// Host identifier
    pub id: HostId,

    /// Operator request to keep the host disabled
    #[serde(default)]
    pub disabled: bool,

    /// Time of the agent's last check-in
    #[serde(default)]
    pub checked_in_at: Option<DateTime<Utc>>,

    /// Raw inventory document reported by the agent
    #[serde(default)]
    pub inventory: Option<String>,
}

impl HostsFile {
    /// Parses hosts file content (YAML, or JSON).
    ///
    /// # Errors
    ///
    /// Returns an error if the content is not a valid hosts file.
    pub fn parse(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context("invalid hosts file content")
    }
}

/// Reads the hosts file on demand.
#[derive(Debug, Clone)]
pub struct Watcher {
    path: PathBuf,
}

impl Watcher {
    /// Creates a watcher for `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path being watched
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the current content of the hosts file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub async fn load(&self) -> Result<HostsFile> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("failed to read {}", self.path.display()))?;
        let hosts = HostsFile::parse(&content)
            .with_context(|| format!("failed to parse {}", self.path.display()))?;
        debug!("Loaded {} hosts from {}", hosts.hosts.len(), self.path.display());
        Ok(hosts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_yaml() {
        let content = r#"
hosts:
  - id: 3f0f8c2e-5d4b-4d1e-9a57-0c7f3c1d2b10
    checkedInAt: 2026-10-19T08:00:00Z
    inventory: '{"cpu": {"count": 4}}'
  - id: 9b5e2a44-1f3c-4c6e-8d2a-7e6f5b4c3a21
    disabled: true
"#;
        let file = HostsFile::parse(content).unwrap();
        assert_eq!(file.hosts.len(), 2);
        assert!(!file.hosts[0].disabled);
        assert!(file.hosts[0].checked_in_at.is_some());
        assert_eq!(file.hosts[0].inventory.as_deref(), Some(r#"{"cpu": {"count": 4}}"#));
        assert!(file.hosts[1].disabled);
        assert!(file.hosts[1].checked_in_at.is_none());
    }

    #[test]
    fn test_parse_json() {
        let content = r#"{"hosts": [{"id": "3f0f8c2e-5d4b-4d1e-9a57-0c7f3c1d2b10", "disabled": true}]}"#;
        let file = HostsFile::parse(content).unwrap();
        assert!(file.hosts[0].disabled);
    }

    #[test]
    fn test_parse_rejects_bad_id() {
        let result = HostsFile::parse("hosts:\n  - id: not-a-uuid\n");
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let watcher = Watcher::new(std::env::temp_dir().join(format!("missing-{}.yaml", uuid::Uuid::new_v4())));
        let err = watcher.load().await.unwrap_err();
        assert!(format!("{err:#}").contains("failed to read"));
    }

    #[tokio::test]
    async fn test_load_file() {
        let path = std::env::temp_dir().join(format!("hosts-{}.yaml", uuid::Uuid::new_v4()));
        tokio::fs::write(&path, "hosts: []\n").await.unwrap();

        let file = Watcher::new(&path).load().await.unwrap();
        assert!(file.hosts.is_empty());

        tokio::fs::remove_file(&path).await.unwrap();
    }
}
