use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Error, Result};
use ini::Ini;

use crate::types::FolderId;

pub const DEFAULT_POLL_INTERVAL: &str = "30";
pub const DEFAULT_MAX_SINK_ATTEMPTS: &str = "3";
pub const DEFAULT_BASE_BACKOFF: &str = "1";
pub const DEFAULT_MAX_BACKOFF: &str = "60";
const STATE_DB_NAME: &str = "snapshot.db";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkKind {
    Log,
    Record,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalPolicy {
    Delete,
    Archive,
}

#[derive(Debug, Clone)]
pub struct RemoteConfig {
    pub address: String,
    pub token_env: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RecordSinkConfig {
    pub address: String,
    pub token_env: Option<String>,
    pub removal: RemovalPolicy,
}

#[derive(Debug, Clone)]
pub struct WatcherConfig {
    pub folder_id: FolderId,
    pub poll_interval: Duration,
    pub max_sink_attempts: usize,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
    pub sinks: Vec<SinkKind>,
    pub state_path: Option<PathBuf>,
    pub remote: RemoteConfig,
    pub record_sink: Option<RecordSinkConfig>,
}

impl WatcherConfig {
    pub fn from_env() -> Result<Self> {
        let user_home_folder_path = dirs::home_dir().context("Unable to determine home folder")?;
        let config_file_path = if cfg!(target_os = "windows") {
            user_home_folder_path
                .join("AppData")
                .join("Local")
                .join("flowatch.conf")
        } else {
            user_home_folder_path.join(".flowatch.conf")
        };

        Self::from_file(&config_file_path)
    }

    pub fn from_file(config_file_path: &Path) -> Result<Self> {
        let config_ini = Ini::load_from_file(config_file_path).context(format!(
            "Error when loading config file at '{}'",
            config_file_path.display()
        ))?;
        Self::from_ini(config_ini)
    }

    pub fn from_ini(config_ini: Ini) -> Result<Self> {
        let watcher = config_ini
            .section(Some("watcher"))
            .context("Missing \"watcher\" section in config")?;

        let folder_id = FolderId(
            watcher
                .get("folder_id")
                .context("Unable to read folder_id config from watcher section")?
                .to_string(),
        );
        let poll_interval = Duration::from_secs(
            watcher
                .get("poll_interval")
                .unwrap_or(DEFAULT_POLL_INTERVAL)
                .parse::<u64>()
                .context("Unable to read poll_interval config from watcher section")?,
        );
        let max_sink_attempts = watcher
            .get("max_sink_attempts")
            .unwrap_or(DEFAULT_MAX_SINK_ATTEMPTS)
            .parse::<usize>()
            .context("Unable to read max_sink_attempts config from watcher section")?;
        let base_backoff = Duration::from_secs(
            watcher
                .get("base_backoff")
                .unwrap_or(DEFAULT_BASE_BACKOFF)
                .parse::<u64>()
                .context("Unable to read base_backoff config from watcher section")?,
        );
        let max_backoff = Duration::from_secs(
            watcher
                .get("max_backoff")
                .unwrap_or(DEFAULT_MAX_BACKOFF)
                .parse::<u64>()
                .context("Unable to read max_backoff config from watcher section")?,
        );
        let state_path = watcher.get("state_path").map(PathBuf::from);

        let mut sinks = vec![];
        for raw_sink in watcher
            .get("sinks")
            .unwrap_or("log")
            .split(',')
            .filter(|v| !v.trim().is_empty())
        {
            sinks.push(match raw_sink.trim() {
                "log" => SinkKind::Log,
                "record" => SinkKind::Record,
                _ => {
                    return Err(Error::msg(format!(
                        "Unknown sink '{}' in watcher section",
                        raw_sink.trim()
                    )))
                }
            });
        }

        let remote_section = config_ini
            .section(Some("remote"))
            .context("Missing \"remote\" section in config")?;
        let remote = RemoteConfig {
            address: remote_section
                .get("address")
                .context("Unable to read address config from remote section")?
                .to_string(),
            token_env: remote_section.get("token_env").map(|v| v.to_string()),
        };

        let record_sink = match config_ini.section(Some("sink.record")) {
            Some(record_section) => {
                let removal = match record_section.get("removal").unwrap_or("delete") {
                    "delete" => RemovalPolicy::Delete,
                    "archive" => RemovalPolicy::Archive,
                    value => {
                        return Err(Error::msg(format!(
                            "Unknown removal policy '{}' in sink.record section",
                            value
                        )))
                    }
                };
                Some(RecordSinkConfig {
                    address: record_section
                        .get("address")
                        .context("Unable to read address config from sink.record section")?
                        .to_string(),
                    token_env: record_section.get("token_env").map(|v| v.to_string()),
                    removal,
                })
            }
            None => None,
        };

        if sinks.contains(&SinkKind::Record) && record_sink.is_none() {
            return Err(Error::msg(
                "Record sink is enabled but \"sink.record\" section is missing",
            ));
        }

        Ok(Self {
            folder_id,
            poll_interval,
            max_sink_attempts,
            base_backoff,
            max_backoff,
            sinks,
            state_path,
            remote,
            record_sink,
        })
    }

    /// Where the committed snapshot lives: an explicit `state_path`, or the
    /// platform data directory.
    pub fn state_db_path(&self) -> Result<PathBuf> {
        if let Some(state_path) = &self.state_path {
            return Ok(state_path.clone());
        }

        Ok(dirs::data_local_dir()
            .context("Unable to determine data folder")?
            .join("flowatch")
            .join(STATE_DB_NAME))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn minimal_ini() -> &'static str {
        "[watcher]\nfolder_id = folder123\n[remote]\naddress = https://example.invalid/drive/v3\n"
    }

    #[test]
    fn test_minimal_config() {
        // Given
        let config_ini = Ini::load_from_str(minimal_ini()).unwrap();

        // When
        let config = WatcherConfig::from_ini(config_ini).unwrap();

        // Then
        assert_eq!(config.folder_id, FolderId("folder123".to_string()));
        assert_eq!(config.poll_interval, Duration::from_secs(30));
        assert_eq!(config.max_sink_attempts, 3);
        assert_eq!(config.base_backoff, Duration::from_secs(1));
        assert_eq!(config.max_backoff, Duration::from_secs(60));
        assert_eq!(config.sinks, vec![SinkKind::Log]);
        assert_eq!(config.record_sink.is_none(), true);
    }

    #[test]
    fn test_full_config() {
        // Given
        let raw = "\
[watcher]
folder_id = folder123
poll_interval = 5
max_sink_attempts = 4
base_backoff = 2
max_backoff = 120
sinks = log, record
state_path = /var/lib/flowatch/snapshot.db

[remote]
address = https://example.invalid/drive/v3
token_env = FLOWATCH_TOKEN

[sink.record]
address = https://example.invalid/records/v1
token_env = FLOWATCH_RECORD_TOKEN
removal = archive
";
        let config_ini = Ini::load_from_str(raw).unwrap();

        // When
        let config = WatcherConfig::from_ini(config_ini).unwrap();

        // Then
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.max_sink_attempts, 4);
        assert_eq!(config.sinks, vec![SinkKind::Log, SinkKind::Record]);
        assert_eq!(
            config.state_path,
            Some(PathBuf::from("/var/lib/flowatch/snapshot.db"))
        );
        assert_eq!(config.remote.token_env, Some("FLOWATCH_TOKEN".to_string()));
        let record_sink = config.record_sink.unwrap();
        assert_eq!(record_sink.removal, RemovalPolicy::Archive);
    }

    #[test]
    fn test_record_sink_requires_section() {
        // Given
        let raw = "\
[watcher]
folder_id = folder123
sinks = record

[remote]
address = https://example.invalid/drive/v3
";
        let config_ini = Ini::load_from_str(raw).unwrap();

        // When
        let result = WatcherConfig::from_ini(config_ini);

        // Then
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_sink_is_rejected() {
        let raw = "\
[watcher]
folder_id = folder123
sinks = log, webhook

[remote]
address = https://example.invalid/drive/v3
";
        let config_ini = Ini::load_from_str(raw).unwrap();
        assert!(WatcherConfig::from_ini(config_ini).is_err());
    }
}
