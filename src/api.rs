//! Blocking client for the study-timer backend.
//!
//! Every authenticated call sends the stored JWT as a bearer token. HTTP 401
//! and 403 surface as [`ApiError::SessionExpired`] and transport failures as
//! [`ApiError::Network`], so callers can branch on the variant instead of on
//! message text.

use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::CACHE_CONTROL;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::domain::{NewSession, NewUser, Preset, SessionRecord, Subject, UserProfile};
use crate::validation::{
    ValidationError, validate_login, validate_preset_count, validate_preset_minutes,
    validate_profile_field, validate_registration, validate_session_minutes, validate_tag_count,
    validate_tag_name,
};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("unable to connect to the server: {0}")]
    Network(#[from] reqwest::Error),
    #[error("your session has expired, please log in again")]
    SessionExpired,
    #[error("not logged in, run `study-stats login` first")]
    NotLoggedIn,
    #[error("{0}")]
    Rejected(String),
    #[error("server returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("the response was empty")]
    EmptyResponse,
    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

/// Paginated retrieval of every session belonging to the token's user.
pub trait SessionSource {
    /// One page of sessions. Pages are numbered from 1; an empty page marks
    /// the end.
    fn fetch_page(&self, token: &str, page: u32) -> Result<Vec<SessionRecord>, ApiError>;

    fn fetch_all_sessions(&self, token: &str) -> Result<Vec<SessionRecord>, ApiError> {
        let mut sessions = Vec::new();
        let mut page = 1;

        loop {
            let batch = self.fetch_page(token, page)?;
            debug!(page, count = batch.len(), "fetched session page");
            if batch.is_empty() {
                break;
            }
            sessions.extend(batch);
            page += 1;
        }

        info!(count = sessions.len(), pages = page - 1, "fetched all sessions");
        Ok(sessions)
    }
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UsersResponse {
    #[serde(default)]
    users: Vec<UserProfile>,
}

pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(config: &Config) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .user_agent(concat!("study-stats/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url().to_string(),
        })
    }

    pub fn login(&self, email: &str, password: &str) -> Result<String, ApiError> {
        validate_login(email, password)?;

        let body = serde_json::json!({ "email": email, "password": password });
        let (status, raw) = self.send(self.client.post(self.url("login")).json(&body))?;

        // Login failures come back as `{ "error": ... }` on 401/404, so the
        // body is inspected before the status.
        if let Ok(response) = serde_json::from_str::<AuthResponse>(&raw) {
            if let Some(token) = response.token {
                info!(email, "logged in");
                return Ok(token);
            }
            if let Some(error) = response.error {
                return Err(ApiError::Rejected(error));
            }
        }

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ApiError::Rejected("invalid credentials".to_string()));
        }
        check_status(status, raw)?;
        Err(ApiError::EmptyResponse)
    }

    pub fn register(&self, user: &NewUser) -> Result<(), ApiError> {
        validate_registration(user)?;

        let (status, raw) = self.send(self.client.post(self.url("register")).json(user))?;
        if let Some(error) = server_error(&raw) {
            return Err(ApiError::Rejected(error));
        }
        check_status(status, raw)?;
        info!(username = %user.username, "registered user");
        Ok(())
    }

    pub fn record_session(&self, token: &str, session: &NewSession) -> Result<(), ApiError> {
        validate_session_minutes(session.session_duration)?;
        self.post_json(token, "sessions", session)?;
        info!(
            minutes = session.session_duration,
            subject = session.subject_name.as_deref().unwrap_or("none"),
            "recorded session"
        );
        Ok(())
    }

    pub fn delete_all_sessions(&self, token: &str) -> Result<(), ApiError> {
        self.delete(token, "sessions/all")?;
        warn!("deleted all sessions");
        Ok(())
    }

    pub fn subjects(&self, token: &str) -> Result<Vec<Subject>, ApiError> {
        self.get_json(token, "subjects")
    }

    pub fn add_subject(&self, token: &str, name: &str) -> Result<(), ApiError> {
        validate_tag_name(name)?;
        validate_tag_count(self.subjects(token)?.len())?;
        self.post_json(token, "subjects", &serde_json::json!({ "subjectName": name }))?;
        info!(name, "added subject");
        Ok(())
    }

    pub fn delete_subject(&self, token: &str, subject_id: i64) -> Result<(), ApiError> {
        self.delete(token, &format!("subjects/{subject_id}"))?;
        info!(subject_id, "deleted subject");
        Ok(())
    }

    pub fn presets(&self, token: &str) -> Result<Vec<Preset>, ApiError> {
        self.get_json(token, "presets")
    }

    pub fn add_preset(&self, token: &str, minutes: u32) -> Result<(), ApiError> {
        validate_preset_minutes(minutes)?;
        validate_preset_count(self.presets(token)?.len())?;
        self.post_json(
            token,
            "presets",
            &serde_json::json!({ "sessionLengthMinutes": minutes }),
        )?;
        info!(minutes, "added preset");
        Ok(())
    }

    pub fn delete_preset(&self, token: &str, preset_id: i64) -> Result<(), ApiError> {
        self.delete(token, &format!("presets/{preset_id}"))?;
        info!(preset_id, "deleted preset");
        Ok(())
    }

    pub fn profile(&self, token: &str) -> Result<UserProfile, ApiError> {
        let response: UsersResponse = self.get_json(token, "users")?;
        response
            .users
            .into_iter()
            .next()
            .ok_or(ApiError::EmptyResponse)
    }

    pub fn update_profile(&self, token: &str, field: &str, value: &str) -> Result<(), ApiError> {
        validate_profile_field(field)?;

        let mut body = Map::new();
        body.insert(field.to_string(), Value::String(value.to_string()));
        let request = self.client.put(self.url("users")).bearer_auth(token).json(&body);
        let (status, raw) = self.send(request)?;
        check_status(status, raw)?;
        info!(field, "updated profile");
        Ok(())
    }

    pub fn delete_account(&self, token: &str) -> Result<(), ApiError> {
        self.delete(token, "users")?;
        warn!("deleted account");
        Ok(())
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint)
    }

    fn send(&self, request: RequestBuilder) -> Result<(StatusCode, String), ApiError> {
        let response = request.send()?;
        let status = response.status();
        let body = response.text()?;
        debug!(status = status.as_u16(), bytes = body.len(), "received response");
        Ok((status, body))
    }

    fn get_json<T: DeserializeOwned>(&self, token: &str, endpoint: &str) -> Result<T, ApiError> {
        let request = self
            .client
            .get(self.url(endpoint))
            .bearer_auth(token)
            .header(CACHE_CONTROL, "no-cache");
        let (status, raw) = self.send(request)?;
        decode(&check_status(status, raw)?)
    }

    fn post_json<B: serde::Serialize + ?Sized>(
        &self,
        token: &str,
        endpoint: &str,
        body: &B,
    ) -> Result<String, ApiError> {
        let request = self.client.post(self.url(endpoint)).bearer_auth(token).json(body);
        let (status, raw) = self.send(request)?;
        check_status(status, raw)
    }

    fn delete(&self, token: &str, endpoint: &str) -> Result<String, ApiError> {
        let request = self.client.delete(self.url(endpoint)).bearer_auth(token);
        let (status, raw) = self.send(request)?;
        check_status(status, raw)
    }
}

impl SessionSource for ApiClient {
    fn fetch_page(&self, token: &str, page: u32) -> Result<Vec<SessionRecord>, ApiError> {
        let request = self
            .client
            .get(self.url("sessions"))
            .query(&[("page", page)])
            .bearer_auth(token)
            .header(CACHE_CONTROL, "no-cache");
        let (status, raw) = self.send(request)?;
        decode(&check_status(status, raw)?)
    }
}

fn check_status(status: StatusCode, body: String) -> Result<String, ApiError> {
    if status.is_success() {
        return Ok(body);
    }

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(ApiError::SessionExpired);
    }

    match server_error(&body) {
        Some(error) => Err(ApiError::Rejected(error)),
        None => Err(ApiError::Status {
            status: status.as_u16(),
            body,
        }),
    }
}

fn server_error(body: &str) -> Option<String> {
    serde_json::from_str::<AuthResponse>(body)
        .ok()
        .and_then(|response| response.error)
}

fn decode<T: DeserializeOwned>(raw: &str) -> Result<T, ApiError> {
    if raw.trim().is_empty() {
        return Err(ApiError::EmptyResponse);
    }
    Ok(serde_json::from_str(raw)?)
}
