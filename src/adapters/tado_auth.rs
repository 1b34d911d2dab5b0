use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;

use crate::adapters::token_file::{self, TokenFileError};
use crate::domain::models::SessionToken;

pub const TADO_AUTH_BASE_URL: &str = "https://login.tado.com";

const CLIENT_ID: &str = "1bb50063-6b0c-4d11-bd99-387f4a91cc46";
const DEVICE_SCOPE: &str = "offline_access";
const DEVICE_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:device_code";
const REFRESH_GRANT_TYPE: &str = "refresh_token";
const REFERER: &str = "https://my.tado.com/";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("failed to build http client: {0}")]
    ClientBuild(#[source] reqwest::Error),
    #[error("auth endpoint request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("auth endpoint returned status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },
    #[error("auth endpoint returned malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("token persistence failed: {0}")]
    TokenFile(#[from] TokenFileError),
    #[error("no refresh token on disk; device activation has not run on this machine")]
    MissingRefreshToken,
    #[error("no pending device grant to finalize")]
    NoPendingGrant,
}

/// Where the OAuth device-authorization handshake currently stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivationStatus {
    Pending,
    Completed,
    Unknown(String),
}

#[derive(Debug, Clone, Deserialize)]
struct DeviceGrant {
    device_code: String,
    verification_uri_complete: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
}

/// Client for the vendor's OAuth service: the one-time device-activation
/// handshake and the per-run refresh-token exchange. The refresh token
/// lives in a single file on disk, overwritten on every successful
/// exchange; the access token is never persisted.
pub struct TadoAuthClient {
    http: reqwest::blocking::Client,
    base_url: String,
    token_file: PathBuf,
    pending_grant: Option<DeviceGrant>,
}

impl TadoAuthClient {
    pub fn new(base_url: &str, token_file: PathBuf) -> Result<Self, AuthError> {
        let http = reqwest::blocking::Client::builder()
            .build()
            .map_err(AuthError::ClientBuild)?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token_file,
            pending_grant: None,
        })
    }

    /// Determines the activation state for this machine. A persisted
    /// refresh token means activation already completed on some earlier
    /// run; otherwise a fresh device grant is requested and the flow is
    /// pending until a human approves it in a browser.
    pub fn begin_session(&mut self) -> Result<ActivationStatus, AuthError> {
        if token_file::read_refresh_token(&self.token_file)?.is_some() {
            return Ok(ActivationStatus::Completed);
        }

        let response = self
            .http
            .post(format!("{}/oauth2/device_authorize", self.base_url))
            .query(&[("client_id", CLIENT_ID), ("scope", DEVICE_SCOPE)])
            .send()?;

        let status = response.status();
        let body = response.text()?;
        if !status.is_success() {
            return Err(AuthError::UnexpectedStatus {
                status: status.as_u16(),
                body,
            });
        }

        let grant: DeviceGrant = serde_json::from_str(&body)?;
        tracing::info!(
            verification_url = %grant.verification_uri_complete,
            "device activation pending"
        );
        self.pending_grant = Some(grant);

        Ok(ActivationStatus::Pending)
    }

    /// URL a human must visit to approve the pending device grant.
    pub fn verification_url(&self) -> Option<&str> {
        self.pending_grant
            .as_ref()
            .map(|grant| grant.verification_uri_complete.as_str())
    }

    /// Finalizes a pending device grant by exchanging its device code for
    /// a token pair. A rejection from the token endpoint is reported as a
    /// status rather than an error so the caller can decide whether to
    /// continue.
    pub fn complete_activation(&mut self) -> Result<ActivationStatus, AuthError> {
        let grant = self
            .pending_grant
            .as_ref()
            .ok_or(AuthError::NoPendingGrant)?;

        let response = self
            .http
            .post(format!("{}/oauth2/token", self.base_url))
            .query(&[
                ("client_id", CLIENT_ID),
                ("device_code", grant.device_code.as_str()),
                ("grant_type", DEVICE_GRANT_TYPE),
            ])
            .send()?;

        let status = response.status();
        let body = response.text()?;
        if !status.is_success() {
            return Ok(ActivationStatus::Unknown(format!(
                "token endpoint answered {status}: {body}"
            )));
        }

        let tokens: TokenResponse = serde_json::from_str(&body)?;
        token_file::write_refresh_token(&self.token_file, &tokens.refresh_token)?;
        self.pending_grant = None;

        Ok(ActivationStatus::Completed)
    }

    /// Exchanges the persisted refresh token for a fresh token pair and
    /// rewrites the token file with the newly issued refresh token. The
    /// request shape (parameters in the query string, an empty JSON body,
    /// the my.tado.com referer) matches what the vendor's web app sends.
    pub fn refresh_session(&self) -> Result<SessionToken, AuthError> {
        let refresh_token = token_file::read_refresh_token(&self.token_file)?
            .ok_or(AuthError::MissingRefreshToken)?;

        let response = self
            .http
            .post(format!("{}/oauth2/token", self.base_url))
            .query(&[
                ("client_id", CLIENT_ID),
                ("grant_type", REFRESH_GRANT_TYPE),
                ("refresh_token", refresh_token.as_str()),
            ])
            .header("Content-Type", "application/json")
            .header("Referer", REFERER)
            .body("{}")
            .send()?;

        let status = response.status();
        let body = response.text()?;
        if !status.is_success() {
            return Err(AuthError::UnexpectedStatus {
                status: status.as_u16(),
                body,
            });
        }

        let tokens: TokenResponse = serde_json::from_str(&body)?;
        token_file::write_refresh_token(&self.token_file, &tokens.refresh_token)?;

        Ok(SessionToken {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
        })
    }
}
