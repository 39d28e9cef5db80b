//! Test utilities for trainbill-core
//!
//! This module provides a mock Trainline server (sign-in, paged pnrs, PDF
//! files) and JSON builders for pnrs payloads.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::oneshot;

use crate::client::Credentials;

/// Mock Trainline API for tests
///
/// `pnrs` requests are answered with the canned pages in order, whatever the
/// cursor; once they run out an empty page is returned.
pub struct MockTrainlineServer {
    addr: SocketAddr,
    state: Arc<MockState>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

struct MockState {
    pages: Vec<Value>,
    requested_dates: Mutex<Vec<Option<String>>>,
}

impl MockTrainlineServer {
    pub const LOGIN: &'static str = "traveller@example.com";
    pub const PASSWORD: &'static str = "correct horse";
    pub const TOKEN: &'static str = "mock-token";

    /// Start the mock server on an available port
    pub async fn start(pages: Vec<Value>) -> Self {
        Self::start_with(|_| pages).await
    }

    /// Start the mock server, building the pages from its base URL
    ///
    /// Lets proofs point at PDFs served by the mock itself.
    pub async fn start_with<F>(pages: F) -> Self
    where
        F: FnOnce(&str) -> Vec<Value>,
    {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let state = Arc::new(MockState {
            pages: pages(&format!("http://{}/", addr)),
            requested_dates: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .route("/api/v5_1/account/signin", post(handle_signin))
            .route("/api/v5_1/pnrs", get(handle_pnrs))
            .route("/files/:name", get(handle_file))
            .with_state(state.clone());

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            state,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Get the base URL for this mock server (with trailing slash)
    pub fn url(&self) -> String {
        format!("http://{}/", self.addr)
    }

    /// URL of a downloadable mock PDF
    pub fn file_url(&self, name: &str) -> String {
        mock_file_url(&self.url(), name)
    }

    /// Credentials accepted by the mock
    pub fn credentials() -> Credentials {
        Credentials::new(Self::LOGIN, Self::PASSWORD)
    }

    /// `date` query parameters received so far, one entry per pnrs request
    pub fn requested_dates(&self) -> Vec<Option<String>> {
        self.state.requested_dates.lock().unwrap().clone()
    }

    /// Stop the mock server
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockTrainlineServer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[derive(Debug, Deserialize)]
struct SignInForm {
    email: String,
    password: String,
}

async fn handle_signin(Form(form): Form<SignInForm>) -> Response {
    if form.email == MockTrainlineServer::LOGIN && form.password == MockTrainlineServer::PASSWORD {
        Json(json!({ "meta": { "token": MockTrainlineServer::TOKEN } })).into_response()
    } else {
        (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "errors": { "password": ["is invalid"] } })),
        )
            .into_response()
    }
}

#[derive(Debug, Deserialize)]
struct PnrsQuery {
    date: Option<String>,
}

async fn handle_pnrs(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Query(query): Query<PnrsQuery>,
) -> Response {
    let expected = format!("Token token=\"{}\"", MockTrainlineServer::TOKEN);
    let authorized = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == expected);
    if !authorized {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let mut dates = state.requested_dates.lock().unwrap();
    let page = state
        .pages
        .get(dates.len())
        .cloned()
        .unwrap_or_else(|| json!({ "pnrs": [], "proofs": [], "after_sales_logs": [], "folders": [] }));
    dates.push(query.date);

    Json(page).into_response()
}

async fn handle_file(Path(name): Path<String>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/pdf")],
        format!("%PDF-1.4 mock {}", name),
    )
}

/// URL of a mock PDF under `base_url`
pub fn mock_file_url(base_url: &str, name: &str) -> String {
    format!("{}files/{}", base_url, name)
}

// =============================================================================
// JSON builders for pnrs payloads
// =============================================================================

/// A pnr with no back-links, no after-sales logs and no system
pub fn pnr_json(id: &str, sort_date: &str, cents: i64) -> Value {
    json!({
        "id": id,
        "sort_date": sort_date,
        "after_sales_log_ids": [],
        "proof_ids": [],
        "cents": cents
    })
}

/// A proof with a URL derived from its id
pub fn proof_json(id: &str, created_at: &str, kind: &str) -> Value {
    json!({
        "id": id,
        "url": format!("https://example.test/proofs/{}.pdf", id),
        "created_at": created_at,
        "type": kind
    })
}

/// An after-sales log
pub fn log_json(id: &str, added: i64, refunded: i64, penalty: i64, date: &str) -> Value {
    json!({
        "id": id,
        "added_cents": added,
        "refunded_cents": refunded,
        "penalty_cents": penalty,
        "date": date
    })
}

/// A pnrs page
pub fn page_json(pnrs: Vec<Value>, proofs: Vec<Value>, logs: Vec<Value>) -> Value {
    json!({
        "pnrs": pnrs,
        "proofs": proofs,
        "after_sales_logs": logs,
        "folders": [{ "id": "folder-1" }]
    })
}
