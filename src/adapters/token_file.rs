use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TokenFileError {
    #[error("failed to read token file: {0}")]
    Read(#[source] std::io::Error),
    #[error("failed to write token file: {0}")]
    Write(#[source] std::io::Error),
    #[error("token file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredToken {
    refresh_token: String,
}

/// Reads the persisted refresh token. A missing file means device
/// activation has never completed on this machine.
pub fn read_refresh_token(path: &Path) -> Result<Option<String>, TokenFileError> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(TokenFileError::Read(err)),
    };

    let stored: StoredToken = serde_json::from_str(&raw)?;
    Ok(Some(stored.refresh_token))
}

/// Unconditionally overwrites the token file. Called after every token
/// refresh and after a completed device activation.
pub fn write_refresh_token(path: &Path, refresh_token: &str) -> Result<(), TokenFileError> {
    let stored = StoredToken {
        refresh_token: refresh_token.to_string(),
    };
    let raw = serde_json::to_string(&stored)?;
    std::fs::write(path, raw).map_err(TokenFileError::Write)
}
