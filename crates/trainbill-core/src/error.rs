//! Error types for trainbill

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Login failed: invalid credentials")]
    AuthenticationFailed,

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected HTTP status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("No adjustment log dated {created_at} for refund proof {proof_id}")]
    UnresolvedRefundAmount { proof_id: String, created_at: String },

    #[error("Persist error: {0}")]
    Persist(String),
}

pub type Result<T> = std::result::Result<T, Error>;
