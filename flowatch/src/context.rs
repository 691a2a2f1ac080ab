use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use flowatch_core::auth::StaticAuthorizer;
use flowatch_core::client::{DriveClient, FetchError};
use flowatch_core::config::{RemovalPolicy, SinkKind, WatcherConfig};
use flowatch_core::types::FolderId;

use anyhow::Result;

#[derive(Clone)]
pub struct RecordSinkContext {
    pub address: String,
    pub token: String,
    pub removal: RemovalPolicy,
}

/// Everything the runner needs, with credentials already resolved.
#[derive(Clone)]
pub struct Context {
    pub folder_id: FolderId,
    pub remote_address: String,
    pub remote_token: String,
    pub state_db_path: PathBuf,
    pub poll_interval: Duration,
    pub max_sink_attempts: usize,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
    pub sinks: Vec<SinkKind>,
    pub record_sink: Option<RecordSinkContext>,
    pub once: bool,
}

impl Context {
    pub fn from_config(
        config: &WatcherConfig,
        remote_token: String,
        record_token: Option<String>,
        once: bool,
    ) -> Result<Self> {
        let record_sink = match (&config.record_sink, record_token) {
            (Some(record_config), Some(token)) => Some(RecordSinkContext {
                address: record_config.address.clone(),
                token,
                removal: record_config.removal,
            }),
            _ => None,
        };

        Ok(Self {
            folder_id: config.folder_id.clone(),
            remote_address: config.remote.address.clone(),
            remote_token,
            state_db_path: config.state_db_path()?,
            poll_interval: config.poll_interval,
            max_sink_attempts: config.max_sink_attempts,
            base_backoff: config.base_backoff,
            max_backoff: config.max_backoff,
            sinks: config.sinks.clone(),
            record_sink,
            once,
        })
    }

    pub fn client(&self) -> Result<DriveClient, FetchError> {
        DriveClient::new(
            self.remote_address.clone(),
            Box::new(StaticAuthorizer::new(self.remote_token.clone())),
        )
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("folder_id", &self.folder_id)
            .field("remote_address", &self.remote_address)
            .field("state_db_path", &self.state_db_path)
            .field("poll_interval", &self.poll_interval)
            .field("sinks", &self.sinks)
            .field("once", &self.once)
            .finish()
    }
}
