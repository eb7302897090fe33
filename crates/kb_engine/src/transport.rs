use std::sync::Arc;

use client_logging::client_debug;
use reqwest::{Method, RequestBuilder, Response, StatusCode};

use crate::auth::AuthSession;
use crate::types::map_reqwest_error;
use crate::{ClientConfig, ClientError, ClientEvent, ClientSink, FailureKind, LogoutReason};

/// HTTP transport that injects the bearer credential and normalizes 401s.
///
/// Non-2xx responses are returned as-is; callers inspect the status. The only
/// status this layer acts on is 401 on an authenticated call, which clears the
/// credential (once per stale token) and announces the logout.
#[derive(Clone)]
pub struct AuthTransport {
    client: reqwest::Client,
    config: ClientConfig,
    auth: Arc<AuthSession>,
    sink: Arc<dyn ClientSink>,
}

impl AuthTransport {
    pub fn new(
        config: ClientConfig,
        auth: Arc<AuthSession>,
        sink: Arc<dyn ClientSink>,
    ) -> Result<Self, ClientError> {
        // No overall request timeout: the chat stream may legitimately stay open indefinitely.
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|err| ClientError::new(FailureKind::Network, err.to_string()))?;
        Ok(Self {
            client,
            config,
            auth,
            sink,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn auth(&self) -> &Arc<AuthSession> {
        &self.auth
    }

    pub fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ClientError> {
        let url = self.config.endpoint(path)?;
        Ok(self.client.request(method, url))
    }

    /// Sends a request that needs no credential.
    pub async fn send_public(&self, request: RequestBuilder) -> Result<Response, ClientError> {
        request.send().await.map_err(map_reqwest_error)
    }

    /// Sends a request with `Authorization: Bearer <token>`.
    pub async fn send_authorized(
        &self,
        method: Method,
        path: &str,
        build: impl FnOnce(RequestBuilder) -> RequestBuilder,
    ) -> Result<Response, ClientError> {
        let token = self
            .auth
            .token()
            .ok_or_else(|| ClientError::new(FailureKind::NotLoggedIn, "no credential held"))?;
        let request = build(self.request(method.clone(), path)?).bearer_auth(&token);
        let response = request.send().await.map_err(map_reqwest_error)?;

        if response.status() == StatusCode::UNAUTHORIZED {
            client_debug!("{} {} answered 401", method, path);
            if self.auth.expire(&token) {
                self.sink.emit(ClientEvent::LoggedOut {
                    reason: LogoutReason::Expired,
                });
            }
        }
        Ok(response)
    }
}
