//! Trainline HTTP client
//!
//! Signs in with email/password, then reads the `api/v5_1/pnrs` history with
//! the returned token (`Authorization: Token token="..."`).

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::models::Page;
use crate::pagination::PageSource;

/// Production API root
pub const DEFAULT_BASE_URL: &str = "https://www.trainline.eu/";

const SIGNIN_PATH: &str = "api/v5_1/account/signin";
const PNRS_PATH: &str = "api/v5_1/pnrs";

/// Account credentials
#[derive(Clone)]
pub struct Credentials {
    pub login: String,
    pub password: String,
}

impl Credentials {
    pub fn new(login: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("login", &self.login)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct SignInResponse {
    meta: SignInMeta,
}

#[derive(Debug, Deserialize)]
struct SignInMeta {
    token: String,
}

/// Unauthenticated client, entry point of a run
#[derive(Clone)]
pub struct TrainlineClient {
    http_client: Client,
    base_url: String,
}

impl TrainlineClient {
    /// Create a client for the given API root
    pub fn new(base_url: &str) -> Self {
        Self::with_http_client(base_url, Client::new())
    }

    /// Create with a preconfigured reqwest client
    pub fn with_http_client(base_url: &str, http_client: Client) -> Self {
        Self {
            http_client,
            base_url: format!("{}/", base_url.trim_end_matches('/')),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Underlying reqwest client, shared with the folder sink for downloads
    pub fn http_client(&self) -> &Client {
        &self.http_client
    }

    /// Exchange credentials for an authenticated session
    ///
    /// A 422 answer means the credentials were rejected.
    pub async fn sign_in(&self, credentials: &Credentials) -> Result<Session> {
        let url = format!("{}{}", self.base_url, SIGNIN_PATH);
        let form = [
            ("email", credentials.login.as_str()),
            ("password", credentials.password.as_str()),
            ("concur_auth_code", ""),
            ("concur_migration_type", ""),
            ("concur_new_email", ""),
            ("correlation_key", ""),
            ("facebook_id", ""),
            ("facebook_token", ""),
            ("google_code", ""),
            ("google_id", ""),
            ("source", ""),
            ("user_itokend", ""),
        ];

        let response = self.http_client.post(&url).form(&form).send().await?;

        let status = response.status();
        if status == StatusCode::UNPROCESSABLE_ENTITY {
            return Err(Error::AuthenticationFailed);
        }
        if !status.is_success() {
            return Err(Error::Status {
                status: status.as_u16(),
                url,
            });
        }

        let body: SignInResponse = response.json().await?;
        info!("Connected as {}", credentials.login);

        Ok(Session {
            http_client: self.http_client.clone(),
            base_url: self.base_url.clone(),
            token: body.meta.token,
        })
    }
}

/// Authenticated session
#[derive(Clone)]
pub struct Session {
    http_client: Client,
    base_url: String,
    token: String,
}

impl Session {
    fn authorization(&self) -> String {
        format!("Token token=\"{}\"", self.token)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl PageSource for Session {
    async fn fetch_page(&self, cursor: Option<NaiveDate>) -> Result<Page> {
        let url = format!("{}{}", self.base_url, PNRS_PATH);
        let mut request = self
            .http_client
            .get(&url)
            .header(reqwest::header::AUTHORIZATION, self.authorization());
        if let Some(date) = cursor {
            request = request.query(&[("date", date.format("%Y-%m-%d").to_string())]);
        }

        debug!("Fetching pnrs page (cursor: {:?})", cursor);
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Status {
                status: status.as_u16(),
                url,
            });
        }

        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{page_json, pnr_json, proof_json, MockTrainlineServer};

    #[test]
    fn test_base_url_normalized() {
        let client = TrainlineClient::new("http://localhost:8080");
        assert_eq!(client.base_url(), "http://localhost:8080/");
        let client = TrainlineClient::new("http://localhost:8080///");
        assert_eq!(client.base_url(), "http://localhost:8080/");
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let creds = Credentials::new("me@example.com", "hunter2");
        let debug = format!("{:?}", creds);
        assert!(debug.contains("me@example.com"));
        assert!(!debug.contains("hunter2"));
    }

    #[tokio::test]
    async fn test_sign_in_rejected() {
        let server = MockTrainlineServer::start(vec![]).await;
        let client = TrainlineClient::new(&server.url());

        let result = client
            .sign_in(&Credentials::new(MockTrainlineServer::LOGIN, "wrong"))
            .await;
        assert!(matches!(result, Err(Error::AuthenticationFailed)));
    }

    #[tokio::test]
    async fn test_fetch_pages_with_token_and_cursor() {
        let server = MockTrainlineServer::start(vec![page_json(
            vec![pnr_json("p1", "2023-01-10T10:00:00+01:00", 5000)],
            vec![proof_json("proof-1", "2023-01-10T10:00:00+01:00", "purchase")],
            vec![],
        )])
        .await;
        let client = TrainlineClient::new(&server.url());
        let session = client
            .sign_in(&MockTrainlineServer::credentials())
            .await
            .unwrap();

        let first = session.fetch_page(None).await.unwrap();
        assert_eq!(first.proofs.len(), 1);

        let cursor = NaiveDate::from_ymd_opt(2022, 12, 1).unwrap();
        let second = session.fetch_page(Some(cursor)).await.unwrap();
        assert!(!second.has_proofs());

        assert_eq!(
            server.requested_dates(),
            vec![None, Some("2022-12-01".to_string())]
        );
    }

    #[tokio::test]
    async fn test_fetch_without_valid_token() {
        let server = MockTrainlineServer::start(vec![]).await;
        let session = Session {
            http_client: Client::new(),
            base_url: server.url(),
            token: "forged".into(),
        };

        let result = session.fetch_page(None).await;
        assert!(matches!(result, Err(Error::Status { status: 401, .. })));
    }
}
