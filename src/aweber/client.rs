//! Authenticated AWeber REST client.
//!
//! Seeded with stored credentials. Refreshes the access token when it is
//! missing or about to expire, and once more if a call answers 401. Every
//! refreshed token is handed to the [`TokenSink`] before the call proceeds.

use std::sync::Arc;

use chrono::{Duration, Utc};
use reqwest::header::LOCATION;
use reqwest::{RequestBuilder, Response, StatusCode};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::types::{Credentials, ListPage, MailingList, NewSubscriber, SubscriberResult, TokenSink};
use crate::error::AppError;
use crate::providers::OAuthProvider;

/// Refresh ahead of expiry by this many seconds.
const REFRESH_MARGIN_SECS: i64 = 60;
const LIST_PAGE_SIZE: u32 = 100;

pub struct AweberClient {
    http: reqwest::Client,
    api_base: String,
    account_id: String,
    provider: Arc<dyn OAuthProvider>,
    credentials: Mutex<Credentials>,
    sink: Arc<dyn TokenSink>,
}

impl AweberClient {
    /// `api_base` is the versioned REST root, e.g. `https://api.aweber.com/1.0`.
    pub fn new(
        http: reqwest::Client,
        api_base: impl Into<String>,
        account_id: impl Into<String>,
        credentials: Credentials,
        provider: Arc<dyn OAuthProvider>,
        sink: Arc<dyn TokenSink>,
    ) -> Self {
        Self {
            http,
            api_base: api_base.into(),
            account_id: account_id.into(),
            provider,
            credentials: Mutex::new(credentials),
            sink,
        }
    }

    /// Every list on the account, following pagination links.
    pub async fn get_all_lists(&self) -> Result<Vec<MailingList>, AppError> {
        let mut url = format!(
            "{}/accounts/{}/lists?ws.size={LIST_PAGE_SIZE}",
            self.api_base,
            segment(&self.account_id)
        );
        let mut lists = Vec::new();

        loop {
            debug!(url = %url, "GET lists page");
            let page: ListPage = self
                .send(|token| self.http.get(&url).bearer_auth(token))
                .await?
                .json()
                .await?;
            lists.extend(page.entries);

            match page.next_collection_link {
                Some(next) if next != url => url = next,
                _ => break,
            }
        }

        Ok(lists)
    }

    /// Add a subscriber to `list_id`, or update it if the email already exists.
    pub async fn add_subscriber(
        &self,
        list_id: &str,
        subscriber: &NewSubscriber,
    ) -> Result<SubscriberResult, AppError> {
        let url = format!(
            "{}/accounts/{}/lists/{}/subscribers",
            self.api_base,
            segment(&self.account_id),
            segment(list_id)
        );

        let resp = self
            .send(|token| self.http.post(&url).bearer_auth(token).json(subscriber))
            .await?;

        let location = resp
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        Ok(SubscriberResult {
            email: subscriber.email.clone(),
            status: resp.status().as_u16(),
            location,
        })
    }

    /// Send a request built by `build`, refreshing and retrying once on 401.
    async fn send<F>(&self, build: F) -> Result<Response, AppError>
    where
        F: Fn(&str) -> RequestBuilder,
    {
        let token = self.access_token().await?;
        let resp = build(&token).send().await?;
        if resp.status() != StatusCode::UNAUTHORIZED {
            return check(resp).await;
        }

        warn!(account = %self.account_id, "AWeber rejected access token, refreshing");
        let token = {
            let mut creds = self.credentials.lock().await;
            self.refresh_locked(&mut creds).await?
        };
        check(build(&token).send().await?).await
    }

    async fn access_token(&self) -> Result<String, AppError> {
        let mut creds = self.credentials.lock().await;

        let expiring = creds
            .expires_at
            .map(|at| at <= Utc::now() + Duration::seconds(REFRESH_MARGIN_SECS))
            .unwrap_or(true);

        match creds.access_token.clone() {
            Some(token) if !token.is_empty() && !expiring => Ok(token),
            _ => self.refresh_locked(&mut creds).await,
        }
    }

    async fn refresh_locked(&self, creds: &mut Credentials) -> Result<String, AppError> {
        let previous = creds
            .refresh_token
            .clone()
            .filter(|rt| !rt.is_empty())
            .ok_or_else(|| AppError::RefreshFailed("no refresh token stored".into()))?;

        let mut token = self.provider.refresh_token(&previous).await?;
        if token.access_token.is_empty() {
            return Err(AppError::RefreshFailed(
                "refresh response carried no access token".into(),
            ));
        }
        // AWeber may omit the refresh token when it is not rotated.
        if token.refresh_token.as_deref().map_or(true, str::is_empty) {
            token.refresh_token = Some(previous);
        }

        creds.access_token = Some(token.access_token.clone());
        creds.refresh_token = token.refresh_token.clone();
        creds.expires_at = Some(token.expires_at(Utc::now()));

        info!(account = %self.account_id, "AWeber token refreshed");
        self.sink.token_refreshed(&token).await?;

        Ok(token.access_token)
    }
}

async fn check(resp: Response) -> Result<Response, AppError> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    Err(AppError::Upstream { status, body })
}

fn segment(s: &str) -> String {
    url::form_urlencoded::byte_serialize(s.as_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{AweberProvider, TokenSet};
    use async_trait::async_trait;
    use serde_json::json;
    use wiremock::matchers::{body_json, body_string_contains, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Default)]
    struct RecordingSink {
        tokens: std::sync::Mutex<Vec<TokenSet>>,
    }

    #[async_trait]
    impl TokenSink for RecordingSink {
        async fn token_refreshed(&self, token: &TokenSet) -> Result<(), AppError> {
            self.tokens.lock().unwrap().push(token.clone());
            Ok(())
        }
    }

    fn client(server: &MockServer, creds: Credentials, sink: Arc<RecordingSink>) -> AweberClient {
        let http = reqwest::Client::new();
        let provider = Arc::new(AweberProvider::new(
            "client".into(),
            "shh".into(),
            server.uri(),
            http.clone(),
        ));
        AweberClient::new(
            http,
            format!("{}/1.0", server.uri()),
            "2234406",
            creds,
            provider,
            sink,
        )
    }

    fn fresh(access: &str) -> Credentials {
        Credentials {
            access_token: Some(access.into()),
            refresh_token: Some("R1".into()),
            expires_at: Some(Utc::now() + Duration::hours(1)),
        }
    }

    #[tokio::test]
    async fn test_lists_follow_pagination() {
        let server = MockServer::start().await;
        let next = format!("{}/1.0/accounts/2234406/lists?ws.start=1&ws.size=1", server.uri());

        Mock::given(method("GET"))
            .and(path("/1.0/accounts/2234406/lists"))
            .and(query_param("ws.start", "1"))
            .and(header("authorization", "Bearer A1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "entries": [{ "id": 2, "name": "Newsletter" }]
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/1.0/accounts/2234406/lists"))
            .and(query_param("ws.size", "100"))
            .and(header("authorization", "Bearer A1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "entries": [{ "id": 1, "name": "Leads", "total_subscribers": 12 }],
                "next_collection_link": next,
            })))
            .mount(&server)
            .await;

        let sink = Arc::new(RecordingSink::default());
        let lists = client(&server, fresh("A1"), sink.clone())
            .get_all_lists()
            .await
            .unwrap();

        let names: Vec<_> = lists.iter().map(|l| l.0["name"].as_str()).collect();
        assert_eq!(names, [Some("Leads"), Some("Newsletter")]);
        assert_eq!(lists[0].0["total_subscribers"], 12);
        assert!(sink.tokens.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_add_subscriber_upserts_by_email() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/1.0/accounts/2234406/lists/6789/subscribers"))
            .and(body_json(json!({
                "email": "jane@example.com",
                "name": "Jane Doe",
                "update_existing": "true"
            })))
            .respond_with(ResponseTemplate::new(201).insert_header(
                "location",
                "https://api.aweber.com/1.0/accounts/2234406/lists/6789/subscribers/1",
            ))
            .expect(1)
            .mount(&server)
            .await;

        let sink = Arc::new(RecordingSink::default());
        let added = client(&server, fresh("A1"), sink)
            .add_subscriber(
                "6789",
                &NewSubscriber::upsert("jane@example.com", Some("Jane Doe".into())),
            )
            .await
            .unwrap();

        assert_eq!(added.email, "jane@example.com");
        assert_eq!(added.status, 201);
        assert!(added.location.unwrap().ends_with("/subscribers/1"));
    }

    #[tokio::test]
    async fn test_expired_token_is_refreshed_and_sunk() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("refresh_token=R1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "A2",
                "token_type": "bearer",
                "expires_in": 7200
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/1.0/accounts/2234406/lists"))
            .and(header("authorization", "Bearer A2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "entries": [] })))
            .mount(&server)
            .await;

        let creds = Credentials {
            access_token: Some("A1".into()),
            refresh_token: Some("R1".into()),
            expires_at: Some(Utc::now() - Duration::minutes(1)),
        };
        let sink = Arc::new(RecordingSink::default());
        let aweber = client(&server, creds, sink.clone());

        aweber.get_all_lists().await.unwrap();
        // Second call reuses the refreshed token.
        aweber.get_all_lists().await.unwrap();

        let tokens = sink.tokens.lock().unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].access_token, "A2");
        // Previous refresh token is carried forward when not rotated.
        assert_eq!(tokens[0].refresh_token.as_deref(), Some("R1"));
    }

    #[tokio::test]
    async fn test_unauthorized_triggers_single_refresh_and_retry() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/1.0/accounts/2234406/lists"))
            .and(header("authorization", "Bearer A1"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "A2",
                "refresh_token": "R2",
                "expires_in": 7200
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/1.0/accounts/2234406/lists"))
            .and(header("authorization", "Bearer A2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "entries": [{ "id": 1, "name": "Leads" }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let sink = Arc::new(RecordingSink::default());
        let lists = client(&server, fresh("A1"), sink.clone())
            .get_all_lists()
            .await
            .unwrap();

        assert_eq!(lists.len(), 1);
        let tokens = sink.tokens.lock().unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].refresh_token.as_deref(), Some("R2"));
    }

    #[tokio::test]
    async fn test_upstream_failure_surfaces_status_and_body() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/1.0/accounts/2234406/lists/404/subscribers"))
            .respond_with(ResponseTemplate::new(404).set_body_string("List not found"))
            .mount(&server)
            .await;

        let sink = Arc::new(RecordingSink::default());
        let err = client(&server, fresh("A1"), sink)
            .add_subscriber("404", &NewSubscriber::upsert("jane@example.com", None))
            .await
            .unwrap_err();

        match err {
            AppError::Upstream { status, body } => {
                assert_eq!(status, 404);
                assert_eq!(body, "List not found");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_refresh_token_fails_without_calling_endpoint() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let creds = Credentials {
            access_token: None,
            refresh_token: None,
            expires_at: None,
        };
        let sink = Arc::new(RecordingSink::default());
        let err = client(&server, creds, sink).get_all_lists().await.unwrap_err();
        assert!(matches!(err, AppError::RefreshFailed(_)));
    }
}
