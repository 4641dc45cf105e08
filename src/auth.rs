//! Service-account authentication against Google's OAuth token endpoint.
//!
//! The staged key file is read, a short-lived RS256 assertion is signed with
//! the key's private key, and the assertion is exchanged for a bearer token
//! scoped to the publisher API.
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::credentials::CREDENTIALS_ENV;

pub const ANDROID_PUBLISHER_SCOPE: &str = "https://www.googleapis.com/auth/androidpublisher";
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_TTL_SECS: i64 = 3600;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0} is not set")]
    MissingEnv(&'static str),
    #[error("failed to read credentials file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid service account key: {0}")]
    InvalidKey(#[from] serde_json::Error),
    #[error("failed to sign token assertion: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
    #[error("failed to reach token endpoint: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("token endpoint rejected credentials {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// The fields of a service-account JSON key this crate needs.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    #[serde(rename = "type", default)]
    pub key_type: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub private_key_id: Option<String>,
    pub private_key: String,
    pub client_email: String,
    #[serde(default)]
    pub token_uri: Option<String>,
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("project_id", &self.project_id)
            .finish_non_exhaustive()
    }
}

impl ServiceAccountKey {
    pub fn from_json(raw: &str) -> Result<Self, AuthError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, AuthError> {
        let raw = std::fs::read_to_string(path).map_err(|source| AuthError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw)
    }

    /// Load the key named by `GOOGLE_APPLICATION_CREDENTIALS`.
    pub fn from_env() -> Result<Self, AuthError> {
        let path = std::env::var_os(CREDENTIALS_ENV).ok_or(AuthError::MissingEnv(CREDENTIALS_ENV))?;
        Self::from_file(Path::new(&path))
    }

    pub fn token_uri(&self) -> &str {
        self.token_uri
            .as_deref()
            .filter(|uri| !uri.is_empty())
            .unwrap_or(DEFAULT_TOKEN_URI)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssertionClaims {
    pub iss: String,
    pub scope: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// A bearer token for the publisher API.
#[derive(Clone)]
pub struct AccessToken {
    secret: String,
    pub expires_at: DateTime<Utc>,
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

impl AccessToken {
    pub fn new(secret: String, expires_at: DateTime<Utc>) -> Self {
        Self { secret, expires_at }
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }
}

pub struct Authenticator {
    http: Client,
    key: ServiceAccountKey,
    scope: String,
}

impl Authenticator {
    /// Authenticator scoped to publisher management.
    pub fn new(key: ServiceAccountKey) -> Result<Self, AuthError> {
        Self::with_scope(key, ANDROID_PUBLISHER_SCOPE)
    }

    pub fn with_scope(key: ServiceAccountKey, scope: &str) -> Result<Self, AuthError> {
        let http = Client::builder()
            .user_agent(concat!("play-promote/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            key,
            scope: scope.to_string(),
        })
    }

    pub fn claims(&self, now: DateTime<Utc>) -> AssertionClaims {
        AssertionClaims {
            iss: self.key.client_email.clone(),
            scope: self.scope.clone(),
            aud: self.key.token_uri().to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::seconds(ASSERTION_TTL_SECS)).timestamp(),
        }
    }

    /// Signed RS256 assertion for the token exchange.
    pub fn assertion(&self, now: DateTime<Utc>) -> Result<String, AuthError> {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key.private_key_id.clone();
        let key = EncodingKey::from_rsa_pem(self.key.private_key.as_bytes())?;
        Ok(encode(&header, &self.claims(now), &key)?)
    }

    pub async fn fetch_token(&self) -> Result<AccessToken, AuthError> {
        let now = Utc::now();
        let assertion = self.assertion(now)?;
        debug!(client_email = %self.key.client_email, token_uri = %self.key.token_uri(), "requesting access token");

        let res = self
            .http
            .post(self.key.token_uri())
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status().as_u16();
            let body = res.text().await.unwrap_or_default();
            return Err(AuthError::Rejected { status, body });
        }

        let payload: TokenResponse = res.json().await?;
        let ttl = payload.expires_in.unwrap_or(ASSERTION_TTL_SECS);
        info!(client_email = %self.key.client_email, "authenticated service account");
        Ok(AccessToken::new(
            payload.access_token,
            now + Duration::seconds(ttl),
        ))
    }
}
