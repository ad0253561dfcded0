//! Route handlers for the contactly service.
//!
//! All handlers receive `SharedState` via Axum state extraction.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::aweber::{AweberClient, Credentials, MailingList, NewSubscriber, SubscriberResult};
use crate::error::AppError;
use crate::store::StoreTokenSink;
use crate::submission::FormSubmission;
use crate::SharedState;

const MISSING_CODE_OR_STATE: &str = "Invalid code or state. Please try again.";
const INVALID_ACCOUNT: &str = "Invalid AWeber Account ID";
const CONNECTED: &str = "You have successfully connected your app to AWeber.";
const MISSING_ID_OR_LIST: &str = "Both 'id' and 'list' are required.";
const MISSING_EMAIL: &str = "'email' is required in the body.";
const NOT_AUTHORIZED: &str = "Unauthorized: You must authorize your account to continue.";

pub fn routes(state: SharedState) -> Router {
    Router::new()
        // ── Health ───────────────────────────────────────────────────────
        .route("/health", get(health))
        // ── OAuth ────────────────────────────────────────────────────────
        .route("/forward-contact/authorize", get(oauth_start))
        .route("/forward-contact/auth", get(oauth_callback))
        // ── Forwarding ───────────────────────────────────────────────────
        .route("/forward-contact", post(forward_contact))
        .with_state(state)
}

// =============================================================================
// Health
// =============================================================================

async fn health() -> StatusCode {
    StatusCode::OK
}

// =============================================================================
// OAuth Endpoints
// =============================================================================

fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[derive(Deserialize)]
struct OAuthStartQuery {
    state: Option<String>,
}

/// GET /forward-contact/authorize — Send an allowed account to the AWeber consent screen.
async fn oauth_start(
    State(state): State<SharedState>,
    Query(q): Query<OAuthStartQuery>,
) -> Result<Response, AppError> {
    let account = present(q.state)
        .filter(|a| state.config.destination_account(a).is_some())
        .ok_or_else(|| AppError::BadRequest(INVALID_ACCOUNT.into()))?;

    let auth_url = state.provider.auth_url(
        &state.provider.default_scopes(),
        &account,
        &state.config.aweber_redirect_uri,
    );

    Ok(Redirect::temporary(&auth_url).into_response())
}

#[derive(Deserialize)]
struct OAuthCallbackQuery {
    code: Option<String>,
    state: Option<String>,
}

/// GET /forward-contact/auth — Exchange the authorization code and store the token.
///
/// `state` carries the account id. Exchange and store failures are not
/// recovered here and surface as a 500.
async fn oauth_callback(
    State(state): State<SharedState>,
    Query(q): Query<OAuthCallbackQuery>,
) -> Result<&'static str, AppError> {
    let (Some(code), Some(account)) = (present(q.code), present(q.state)) else {
        return Err(AppError::BadRequest(MISSING_CODE_OR_STATE.into()));
    };

    let destination_id = state
        .config
        .destination_account(&account)
        .ok_or_else(|| AppError::BadRequest(INVALID_ACCOUNT.into()))?;

    let tokens = state
        .provider
        .exchange_code(&code, &state.config.aweber_redirect_uri)
        .await?;
    info!(account = %account, destination_id, "New AWeber token issued");

    state
        .store
        .store_token(&account, &tokens, state.provider.id(), destination_id)
        .await?;

    Ok(CONNECTED)
}

// =============================================================================
// Forwarding
// =============================================================================

#[derive(Deserialize)]
struct ForwardQuery {
    id: Option<String>,
    list: Option<String>,
}

#[derive(Serialize)]
struct ForwardResponse {
    data: Value,
    lists: Vec<MailingList>,
    added: SubscriberResult,
}

/// POST /forward-contact — Relay a Wix submission to an AWeber list.
async fn forward_contact(
    State(state): State<SharedState>,
    Query(q): Query<ForwardQuery>,
    body: Bytes,
) -> Result<Json<ForwardResponse>, AppError> {
    let (Some(id), Some(list)) = (present(q.id), present(q.list)) else {
        return Err(AppError::BadRequest(MISSING_ID_OR_LIST.into()));
    };

    let submission = FormSubmission::from_body(&body).unwrap_or_else(|e| {
        warn!(account = %id, "Unparseable submission body: {e}");
        FormSubmission::default()
    });

    let email = submission
        .email()
        .ok_or_else(|| AppError::BadRequest(MISSING_EMAIL.into()))?
        .to_string();
    let name = submission.full_name();

    info!(account = %id, list = %list, email = %email, "Forwarding Wix submission to AWeber");

    let token = state.store.get_token(&id).await?;
    let Some((token, destination, destination_id)) = token.and_then(|t| {
        let destination = t.destination.clone()?;
        let destination_id = t.destination_id.clone()?;
        Some((t, destination, destination_id))
    }) else {
        return Err(AppError::Unauthorized(NOT_AUTHORIZED.into()));
    };

    let sink = StoreTokenSink::new(
        state.store.clone(),
        id.clone(),
        destination,
        destination_id.clone(),
    );
    let client = AweberClient::new(
        state.http.clone(),
        state.config.aweber_api_url.clone(),
        destination_id,
        Credentials {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_at: token.expires,
        },
        state.provider.clone(),
        Arc::new(sink),
    );

    let lists = client.get_all_lists().await?;
    let added = client
        .add_subscriber(&list, &NewSubscriber::upsert(email, name))
        .await?;

    Ok(Json(ForwardResponse {
        data: submission.data,
        lists,
        added,
    }))
}
