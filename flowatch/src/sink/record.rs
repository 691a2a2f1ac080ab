use std::time::Duration;

use reqwest::{blocking::Response, Method};
use serde_json::{json, Map, Value};

use flowatch_core::config::RemovalPolicy;
use flowatch_core::entry::Entry;
use flowatch_core::types::EntryId;

use super::{Sink, SinkError};
use crate::event::ChangeEvent;

pub const DEFAULT_SINK_TIMEOUT: u64 = 30;

/// Record-database sink: every entry maps to one record keyed by the
/// entry id as external key. Additions and modifications are upserts, so
/// re-applying the same event is harmless; removals follow the
/// configured policy (drop the record, or keep it flagged as archived).
pub struct RecordSink {
    address: String,
    token: String,
    removal: RemovalPolicy,
    client: reqwest::blocking::Client,
}

impl RecordSink {
    pub fn new(address: String, token: String, removal: RemovalPolicy) -> Result<Self, SinkError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_SINK_TIMEOUT))
            .build()
            .map_err(|error| SinkError(error.to_string()))?;
        Ok(Self {
            address,
            token,
            removal,
            client,
        })
    }

    fn record_url(&self, id: &EntryId) -> String {
        format!("{}/records/{}", self.address, id)
    }

    fn upsert(&self, entry: &Entry) -> Result<(), SinkError> {
        let response = self
            .client
            .request(Method::PUT, self.record_url(entry.id()))
            .bearer_auth(&self.token)
            .json(&record_body(entry))
            .send()
            .map_err(|error| SinkError(error.to_string()))?;

        self.expect_success(response)
    }

    fn remove(&self, id: &EntryId) -> Result<(), SinkError> {
        let response = match self.removal {
            RemovalPolicy::Delete => self
                .client
                .request(Method::DELETE, self.record_url(id))
                .bearer_auth(&self.token)
                .send(),
            RemovalPolicy::Archive => self
                .client
                .request(Method::PATCH, self.record_url(id))
                .bearer_auth(&self.token)
                .json(&json!({ "archived": true }))
                .send(),
        }
        .map_err(|error| SinkError(error.to_string()))?;

        // A record already gone counts as removed
        if response.status().as_u16() == 404 {
            return Ok(());
        }

        self.expect_success(response)
    }

    fn expect_success(&self, response: Response) -> Result<(), SinkError> {
        match response.status().as_u16() {
            200 | 201 | 204 => Ok(()),
            code => Err(SinkError(format!("Unexpected response status {}", code))),
        }
    }
}

fn record_body(entry: &Entry) -> Value {
    let mut data = Map::new();
    data.insert("id".to_string(), json!(entry.id().to_string()));
    data.insert("name".to_string(), json!(entry.name().to_string()));
    data.insert(
        "revision".to_string(),
        json!(entry.revision().map(|revision| revision.to_string())),
    );
    data.insert(
        "parent_id".to_string(),
        json!(entry.parent_id().map(|parent_id| parent_id.to_string())),
    );
    data.insert("kind".to_string(), json!(entry.kind().to_string()));
    Value::Object(data)
}

impl Sink for RecordSink {
    fn name(&self) -> String {
        "record".to_string()
    }

    fn deliver(&self, event: &ChangeEvent) -> Result<(), SinkError> {
        match event {
            ChangeEvent::Added(entry) => self.upsert(entry),
            ChangeEvent::Modified { new, .. } => self.upsert(new),
            ChangeEvent::Removed(id, _) => self.remove(id),
        }
    }
}
