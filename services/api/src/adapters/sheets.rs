//! services/api/src/adapters/sheets.rs
//!
//! This module contains the feedback store adapter, the concrete implementation of
//! the `FeedbackStore` port. Rows are appended to a Google spreadsheet that is
//! looked up by name through Drive and created when it does not exist yet.
//! Requests are authorized with a service-account JWT exchanged for an access token.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::{Client, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::json;
use study_kit_core::{
    ports::{FeedbackStore, PortError, PortResult},
    FeedbackRecord,
};
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info};

const DRIVE_FILES_URL: &str = "https://www.googleapis.com/drive/v3/files";
const SHEETS_URL: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const SCOPES: &str =
    "https://www.googleapis.com/auth/spreadsheets https://www.googleapis.com/auth/drive";
const JWT_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const SPREADSHEET_MIME_TYPE: &str = "application/vnd.google-apps.spreadsheet";

//=========================================================================================
// "Impure" Google API Structs
//=========================================================================================

#[derive(Debug, Deserialize)]
struct ServiceAccountKey {
    client_email: String,
    private_key: String,
    #[serde(default = "default_token_uri")]
    token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Deserialize)]
struct DriveFileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

#[derive(Debug, Deserialize)]
struct DriveFile {
    id: String,
}

#[derive(Debug, Deserialize)]
struct CreatedSpreadsheet {
    #[serde(rename = "spreadsheetId")]
    spreadsheet_id: String,
}

struct CachedToken {
    token: SecretString,
    expires_at: DateTime<Utc>,
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A feedback store backed by a Google spreadsheet.
pub struct GoogleSheetsFeedbackStore {
    http: Client,
    client_email: String,
    token_uri: String,
    signing_key: EncodingKey,
    spreadsheet_name: String,
    token: Mutex<Option<CachedToken>>,
    spreadsheet_id: OnceCell<String>,
}

impl GoogleSheetsFeedbackStore {
    /// Creates the store from a service-account key file's JSON contents.
    pub fn new(
        http: Client,
        service_account_json: &SecretString,
        spreadsheet_name: impl Into<String>,
    ) -> PortResult<Self> {
        let key: ServiceAccountKey = serde_json::from_str(service_account_json.expose_secret())
            .map_err(|e| PortError::InvalidInput(format!("malformed service account key: {}", e)))?;
        let signing_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| PortError::InvalidInput(format!("unusable service account key: {}", e)))?;

        Ok(Self {
            http,
            client_email: key.client_email,
            token_uri: key.token_uri,
            signing_key,
            spreadsheet_name: spreadsheet_name.into(),
            token: Mutex::new(None),
            spreadsheet_id: OnceCell::new(),
        })
    }

    /// Returns a cached access token, exchanging a fresh signed JWT when the cached
    /// one is missing or about to expire.
    async fn access_token(&self) -> PortResult<SecretString> {
        let mut cached = self.token.lock().await;
        let now = Utc::now();
        if let Some(token) = cached.as_ref() {
            if token.expires_at - Duration::seconds(60) > now {
                return Ok(token.token.clone());
            }
        }

        let claims = Claims {
            iss: &self.client_email,
            scope: SCOPES,
            aud: &self.token_uri,
            iat: now.timestamp(),
            exp: (now + Duration::hours(1)).timestamp(),
        };
        let assertion = jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &self.signing_key)
            .map_err(|e| PortError::Unexpected(format!("could not sign token request: {}", e)))?;

        let response = self
            .http
            .post(&self.token_uri)
            .form(&[("grant_type", JWT_GRANT_TYPE), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        let token: TokenResponse = check_status(response).await?.json().await.map_err(|e| {
            PortError::Unexpected(format!("unreadable token response: {}", e))
        })?;

        debug!("Obtained spreadsheet access token for {}", self.client_email);
        let secret = SecretString::from(token.access_token);
        *cached = Some(CachedToken {
            token: secret.clone(),
            expires_at: now + Duration::seconds(token.expires_in),
        });
        Ok(secret)
    }

    /// Opens the spreadsheet by name, creating it when absent. Resolved once.
    async fn spreadsheet_id(&self, token: &SecretString) -> PortResult<&String> {
        self.spreadsheet_id
            .get_or_try_init(|| async {
                if let Some(id) = self.find_spreadsheet(token).await? {
                    return Ok(id);
                }
                self.create_spreadsheet(token).await
            })
            .await
    }

    async fn find_spreadsheet(&self, token: &SecretString) -> PortResult<Option<String>> {
        let response = self
            .http
            .get(DRIVE_FILES_URL)
            .bearer_auth(token.expose_secret())
            .query(&[
                ("q", drive_query(&self.spreadsheet_name)),
                ("fields", "files(id)".to_string()),
            ])
            .send()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        let list: DriveFileList = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(list.files.into_iter().next().map(|file| file.id))
    }

    async fn create_spreadsheet(&self, token: &SecretString) -> PortResult<String> {
        let response = self
            .http
            .post(SHEETS_URL)
            .bearer_auth(token.expose_secret())
            .json(&json!({ "properties": { "title": self.spreadsheet_name } }))
            .send()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        let created: CreatedSpreadsheet = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        info!("Created feedback spreadsheet '{}'", self.spreadsheet_name);
        Ok(created.spreadsheet_id)
    }
}

/// Drive search for a live spreadsheet with exactly this name.
fn drive_query(name: &str) -> String {
    format!(
        "name = '{}' and mimeType = '{}' and trashed = false",
        name.replace('\\', "\\\\").replace('\'', "\\'"),
        SPREADSHEET_MIME_TYPE
    )
}

fn append_url(spreadsheet_id: &str) -> String {
    format!(
        "{}/{}/values/A1:append?valueInputOption=USER_ENTERED&insertDataOption=INSERT_ROWS",
        SHEETS_URL, spreadsheet_id
    )
}

async fn check_status(response: Response) -> PortResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => PortError::Unauthorized,
        StatusCode::NOT_FOUND => PortError::NotFound(body),
        _ => PortError::Unexpected(format!("{}: {}", status, body)),
    })
}

//=========================================================================================
// `FeedbackStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl FeedbackStore for GoogleSheetsFeedbackStore {
    async fn append_feedback(&self, record: &FeedbackRecord) -> PortResult<()> {
        let token = self.access_token().await?;
        let spreadsheet_id = self.spreadsheet_id(&token).await?;

        // A single append request either inserts the whole row or nothing.
        let response = self
            .http
            .post(append_url(spreadsheet_id))
            .bearer_auth(token.expose_secret())
            .json(&json!({ "values": [record.to_row()] }))
            .send()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        check_status(response).await?;

        debug!("Appended feedback row for session {}", record.session_id);
        Ok(())
    }
}

/// Stands in for the spreadsheet store when no service-account credentials exist.
#[derive(Clone, Copy, Default)]
pub struct UnconfiguredFeedbackStore;

#[async_trait]
impl FeedbackStore for UnconfiguredFeedbackStore {
    async fn append_feedback(&self, _record: &FeedbackRecord) -> PortResult<()> {
        Err(PortError::NotConfigured(
            "feedback store is not configured".to_string(),
        ))
    }
}
