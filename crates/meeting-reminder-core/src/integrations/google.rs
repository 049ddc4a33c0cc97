//! Google Calendar event source.
//!
//! Lists single occurrences in a bounded window ahead of "now" and hands
//! the scheduler the one whose anchor comes first. Uses OAuth2 with the
//! read-only Calendar scope.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;

use super::keyring_store;
use super::oauth::{self, OAuthConfig, OAuthTokens};
use super::token_store::TokenStore;
use crate::error::{OAuthError, SourceError, ValidationError};
use crate::event::{Event, ReminderMode};
use crate::source::{select_next, EventSource};

pub const SERVICE: &str = "google";
pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com/calendar/v3";
const READONLY_SCOPE: &str = "https://www.googleapis.com/auth/calendar.readonly";
const REDIRECT_PORT: u16 = 19821;

/// OAuth client id/secret for the installed app.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleCredentials {
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Deserialize)]
struct ClientSecretFile {
    installed: Option<ClientSecretSection>,
    web: Option<ClientSecretSection>,
}

#[derive(Deserialize)]
struct ClientSecretSection {
    client_id: String,
    client_secret: String,
}

impl GoogleCredentials {
    /// Load credentials from keyring. `None` if not stored yet.
    pub fn from_keyring() -> Result<Option<Self>, OAuthError> {
        let client_id = keyring_store::get("google_client_id")?;
        let client_secret = keyring_store::get("google_client_secret")?;
        Ok(match (client_id, client_secret) {
            (Some(client_id), Some(client_secret)) => Some(Self {
                client_id,
                client_secret,
            }),
            _ => None,
        })
    }

    /// Persist to the OS keyring.
    pub fn save_to_keyring(&self) -> Result<(), OAuthError> {
        keyring_store::set("google_client_id", &self.client_id)?;
        keyring_store::set("google_client_secret", &self.client_secret)?;
        Ok(())
    }

    /// Remove the client id/secret stored by [`Self::save_to_keyring`].
    /// Missing entries are not an error.
    pub fn clear_keyring() -> Result<(), OAuthError> {
        keyring_store::delete("google_client_id")?;
        keyring_store::delete("google_client_secret")
    }

    /// Parse a client-secret JSON as downloaded from the Google console.
    pub fn from_client_secret_json(json: &str) -> Result<Self, OAuthError> {
        let file: ClientSecretFile = serde_json::from_str(json)
            .map_err(|e| OAuthError::Storage(format!("invalid client secret file: {e}")))?;
        let section = file.installed.or(file.web).ok_or_else(|| {
            OAuthError::Storage("client secret file has no 'installed' or 'web' section".to_string())
        })?;
        Ok(Self {
            client_id: section.client_id,
            client_secret: section.client_secret,
        })
    }

    pub fn from_client_secret_file(path: &Path) -> Result<Self, OAuthError> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| OAuthError::Storage(format!("cannot read {}: {e}", path.display())))?;
        Self::from_client_secret_json(&json)
    }

    /// Explicit file first, then the keyring.
    pub fn resolve(credentials_file: Option<&Path>) -> Result<Self, OAuthError> {
        if let Some(path) = credentials_file {
            return Self::from_client_secret_file(path);
        }
        Self::from_keyring()?.ok_or_else(|| OAuthError::CredentialsNotConfigured {
            service: SERVICE.to_string(),
        })
    }

    pub fn oauth_config(&self) -> OAuthConfig {
        OAuthConfig {
            service_name: SERVICE.to_string(),
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            auth_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            scopes: vec![READONLY_SCOPE.to_string()],
            redirect_port: REDIRECT_PORT,
        }
    }
}

/// Supplies a bearer token for each calendar request.
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    async fn access_token(&self) -> Result<String, OAuthError>;
}

/// Fixed token, for tests and one-off scripts.
#[derive(Debug, Clone)]
pub struct StaticToken(pub String);

#[async_trait]
impl AccessTokenProvider for StaticToken {
    async fn access_token(&self) -> Result<String, OAuthError> {
        Ok(self.0.clone())
    }
}

/// Stored tokens plus client credentials; refreshes on demand.
pub struct GoogleAuth {
    oauth: OAuthConfig,
    store: TokenStore,
    cached: Mutex<Option<OAuthTokens>>,
}

impl GoogleAuth {
    pub fn new(credentials: &GoogleCredentials, store: TokenStore) -> Self {
        Self::with_oauth_config(credentials.oauth_config(), store)
    }

    pub fn with_oauth_config(oauth: OAuthConfig, store: TokenStore) -> Self {
        Self {
            oauth,
            store,
            cached: Mutex::new(None),
        }
    }

    /// Run the browser flow and store the resulting tokens.
    pub async fn login(&self) -> Result<OAuthTokens, OAuthError> {
        let tokens = oauth::authorize(&self.oauth).await?;
        self.store.save(SERVICE, &tokens)?;
        *self.cached.lock().await = Some(tokens.clone());
        Ok(tokens)
    }

    pub fn stored_tokens(&self) -> Result<Option<OAuthTokens>, OAuthError> {
        self.store.load(SERVICE)
    }
}

#[async_trait]
impl AccessTokenProvider for GoogleAuth {
    async fn access_token(&self) -> Result<String, OAuthError> {
        let mut cached = self.cached.lock().await;
        let tokens = match cached.take() {
            Some(tokens) => tokens,
            None => self.store.load(SERVICE)?.ok_or_else(|| OAuthError::NotAuthenticated {
                service: SERVICE.to_string(),
            })?,
        };

        if !tokens.is_expired() {
            let access = tokens.access_token.clone();
            *cached = Some(tokens);
            return Ok(access);
        }

        let refresh = tokens.refresh_token.as_deref().ok_or(OAuthError::TokenExpired)?;
        tracing::debug!("refreshing google access token");
        let refreshed = oauth::refresh_token(&self.oauth, refresh).await?;
        self.store.save(SERVICE, &refreshed)?;
        let access = refreshed.access_token.clone();
        *cached = Some(refreshed);
        Ok(access)
    }
}

#[derive(Debug, Deserialize)]
struct EventList {
    #[serde(default)]
    items: Vec<serde_json::Value>,
}

/// Queries one calendar for the next event to remind about.
pub struct GoogleCalendarSource {
    client: Client,
    auth: Arc<dyn AccessTokenProvider>,
    api_base: String,
    calendar_id: String,
    query: Option<String>,
    horizon: Duration,
}

impl GoogleCalendarSource {
    pub fn new(auth: Arc<dyn AccessTokenProvider>, calendar_id: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            auth,
            api_base: DEFAULT_API_BASE.to_string(),
            calendar_id: calendar_id.into(),
            query: None,
            horizon: Duration::minutes(60),
        }
    }

    /// Free-text filter passed as `q`. Empty strings are ignored.
    pub fn with_query(mut self, query: Option<String>) -> Self {
        self.query = query.filter(|q| !q.trim().is_empty());
        self
    }

    pub fn with_horizon(mut self, horizon: Duration) -> Self {
        self.horizon = horizon;
        self
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    fn events_url(&self, now: DateTime<Utc>) -> Result<url::Url, SourceError> {
        let raw = format!(
            "{}/calendars/{}/events",
            self.api_base,
            urlencoding::encode(&self.calendar_id)
        );
        let mut url = url::Url::parse(&raw)
            .map_err(|e| SourceError::InvalidResponse(format!("bad calendar url {raw}: {e}")))?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("timeMin", &now.to_rfc3339())
                .append_pair("timeMax", &(now + self.horizon).to_rfc3339())
                .append_pair("singleEvents", "true")
                .append_pair("showDeleted", "false")
                .append_pair("orderBy", "startTime");
            if let Some(q) = &self.query {
                pairs.append_pair("q", q);
            }
        }
        Ok(url)
    }

    /// All usable events in the window, in calendar order. Cancelled and
    /// malformed entries are dropped.
    pub async fn fetch_events(&self, now: DateTime<Utc>) -> Result<Vec<Event>, SourceError> {
        let token = self.auth.access_token().await?;
        let url = self.events_url(now)?;

        let resp = self.client.get(url).bearer_auth(&token).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body: serde_json::Value = resp.json().await.unwrap_or_default();
            let message = body["error"]["message"]
                .as_str()
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed"));
            return Err(SourceError::Api(format!("{}: {message}", status.as_u16())));
        }

        let list: EventList = resp
            .json()
            .await
            .map_err(|e| SourceError::InvalidResponse(e.to_string()))?;

        let mut events = Vec::with_capacity(list.items.len());
        for item in &list.items {
            match parse_event(item) {
                Ok(Some(event)) => events.push(event),
                Ok(None) => {}
                Err(err) => tracing::warn!(error = %err, "skipping calendar entry"),
            }
        }
        tracing::debug!(
            calendar = %self.calendar_id,
            fetched = list.items.len(),
            usable = events.len(),
            "calendar events listed"
        );
        Ok(events)
    }
}

#[async_trait]
impl EventSource for GoogleCalendarSource {
    async fn next_event(
        &self,
        now: DateTime<Utc>,
        mode: ReminderMode,
    ) -> Result<Option<Event>, SourceError> {
        let events = self.fetch_events(now).await?;
        Ok(select_next(events, now, mode))
    }
}

/// Convert one `items[]` entry. `Ok(None)` for cancelled entries; all-day
/// entries and bad timestamps are [`ValidationError::MalformedEvent`].
pub fn parse_event(item: &serde_json::Value) -> Result<Option<Event>, ValidationError> {
    let id = item["id"].as_str().unwrap_or_default();
    let malformed = |message: String| ValidationError::MalformedEvent {
        id: id.to_string(),
        message,
    };

    if id.is_empty() {
        return Err(malformed("missing id".to_string()));
    }

    let status = item["status"].as_str().unwrap_or("confirmed");
    if status == "cancelled" {
        return Ok(None);
    }

    let start = parse_time(&item["start"], "start").map_err(malformed)?;
    let end = parse_time(&item["end"], "end").map_err(malformed)?;

    let event = Event::new(id, start, end)?
        .with_title(item["summary"].as_str().unwrap_or("(No title)"))
        .with_location(item["location"].as_str().unwrap_or_default())
        .with_status(status);
    Ok(Some(event))
}

fn parse_time(field: &serde_json::Value, which: &str) -> Result<DateTime<Utc>, String> {
    match field["dateTime"].as_str() {
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| format!("invalid {which} time {raw:?}: {e}")),
        None if field["date"].is_string() => Err(format!("all-day entry has no {which} time")),
        None => Err(format!("missing {which} time")),
    }
}
