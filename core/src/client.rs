use std::time::Duration;

use mockall::automock;
use reqwest::{blocking::Response, Method};
use serde_derive::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::auth::Authorizer;
use crate::types::{EntryId, FolderId, PageToken, Revision};

pub const DEFAULT_CLIENT_TIMEOUT: u64 = 30;
pub const DEFAULT_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("Transient fetch error: {0}")]
    Transient(String),
    #[error("Authorization rejected by remote")]
    Auth,
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl FetchError {
    pub fn is_auth(&self) -> bool {
        matches!(self, FetchError::Auth)
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_connect() {
            return Self::Transient("connection error".to_string());
        }

        if error.is_timeout() {
            return Self::Transient("timeout error".to_string());
        }

        if error.is_decode() {
            return Self::InvalidResponse(error.to_string());
        }

        Self::Transient(error.to_string())
    }
}

/// One entry as the remote folder API serializes it.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RemoteEntry {
    pub id: EntryId,
    pub name: String,
    #[serde(rename = "mimeType")]
    pub mime_type: String,
    pub version: Option<Revision>,
}

/// One page of a folder listing, plus the continuation token when the
/// folder has more entries than one page carries.
#[derive(Debug, Clone)]
pub struct EntryPage {
    pub entries: Vec<RemoteEntry>,
    pub next_page: Option<PageToken>,
}

/// Listing endpoint of the remote folder store. One call returns the
/// direct children of one folder, one page at a time; walking the tree
/// and draining pagination is the lister's job.
#[automock]
pub trait RemoteFolderClient {
    fn list_page(
        &self,
        folder_id: &FolderId,
        page: Option<PageToken>,
    ) -> Result<EntryPage, FetchError>;
}

/// Blocking client for a Drive-style files API: children are selected
/// with a `'<folder>' in parents` query and pagination is cursor based
/// (`pageToken` request parameter, `nextPageToken` response field).
pub struct DriveClient {
    address: String,
    authorizer: Box<dyn Authorizer>,
    client: reqwest::blocking::Client,
}

impl DriveClient {
    pub fn new(address: String, authorizer: Box<dyn Authorizer>) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_CLIENT_TIMEOUT))
            .build()?;
        Ok(Self {
            address,
            authorizer,
            client,
        })
    }

    fn files_url(&self) -> String {
        format!("{}/files", self.address)
    }

    fn page_from_response(response: Response) -> Result<EntryPage, FetchError> {
        let value = response.json::<Value>()?;
        let files = value["files"]
            .as_array()
            .ok_or(FetchError::InvalidResponse(
                "Response files is not a list".to_string(),
            ))?;

        let mut entries = vec![];
        for file in files {
            let entry: RemoteEntry = serde_json::from_value(file.clone()).map_err(|error| {
                FetchError::InvalidResponse(format!("Malformed entry in listing: {}", error))
            })?;
            entries.push(entry);
        }

        let next_page = value["nextPageToken"]
            .as_str()
            .map(|token| PageToken(token.to_string()));

        Ok(EntryPage { entries, next_page })
    }
}

impl RemoteFolderClient for DriveClient {
    fn list_page(
        &self,
        folder_id: &FolderId,
        page: Option<PageToken>,
    ) -> Result<EntryPage, FetchError> {
        let token = self.authorizer.bearer_token().map_err(|_| FetchError::Auth)?;
        let mut request = self
            .client
            .request(Method::GET, self.files_url())
            .bearer_auth(token)
            .query(&[
                (
                    "q",
                    format!("'{}' in parents and trashed = false", folder_id),
                ),
                (
                    "fields",
                    "files(id, name, mimeType, version), nextPageToken".to_string(),
                ),
                ("pageSize", DEFAULT_PAGE_SIZE.to_string()),
            ]);
        if let Some(page) = page {
            request = request.query(&[("pageToken", page.0)]);
        }

        let response = request.send()?;
        match response.status().as_u16() {
            200 => Self::page_from_response(response),
            401 | 403 => Err(FetchError::Auth),
            429 => Err(FetchError::Transient("rate limited".to_string())),
            code if code >= 500 => Err(FetchError::Transient(format!("server error {}", code))),
            code => Err(FetchError::InvalidResponse(format!(
                "Unexpected response status {}",
                code
            ))),
        }
    }
}
