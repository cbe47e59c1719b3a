// This file is part of the terraform-provider-citrix project
//
// Copyright (C) ANEO, 2024-2024. All rights reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License")
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::time::Duration;

use base64::Engine;
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info};

use super::error::ApiError;
use super::retry::{execute_with_retry, RetryPolicy};
use super::transport::{ApiRequest, Method, Transport};

/// Tokens are renewed this long before they expire
const RENEW_MARGIN: Duration = Duration::from_secs(5 * 60);
/// Lifetime assumed when the token endpoint does not tell
const DEFAULT_LIFETIME: Duration = Duration::from_secs(3600);

/// How to obtain a bearer token
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Citrix Cloud API client (OAuth client credentials)
    Cloud {
        token_url: String,
        client_id: String,
        client_secret: String,
    },
    /// On-premises Delivery Controller (domain user)
    OnPremises {
        token_url: String,
        username: String,
        password: String,
    },
    /// Pre-acquired token that never expires
    Static(String),
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::Cloud {
                token_url,
                client_id,
                ..
            } => f
                .debug_struct("Cloud")
                .field("token_url", token_url)
                .field("client_id", client_id)
                .finish_non_exhaustive(),
            Credentials::OnPremises {
                token_url,
                username,
                ..
            } => f
                .debug_struct("OnPremises")
                .field("token_url", token_url)
                .field("username", username)
                .finish_non_exhaustive(),
            Credentials::Static(_) => f.write_str("Static"),
        }
    }
}

#[derive(Clone, Debug)]
struct Token {
    value: String,
    expires_at: Option<Instant>,
}

impl Token {
    fn is_fresh(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => Instant::now() + RENEW_MARGIN < expires_at,
            None => true,
        }
    }
}

#[derive(Deserialize)]
struct CloudTokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<serde_json::Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct OnPremisesTokenResponse {
    token: String,
}

/// Acquires and caches the bearer token
#[derive(Debug)]
pub struct Authenticator {
    credentials: Credentials,
    cached: Mutex<Option<Token>>,
}

impl Authenticator {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            cached: Mutex::new(None),
        }
    }

    /// Value of the `Authorization` header
    ///
    /// Token requests failing transiently are retried with `retry`.
    pub async fn authorization(
        &self,
        transport: &dyn Transport,
        retry: &RetryPolicy,
    ) -> Result<String, ApiError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref().filter(|token| token.is_fresh()) {
            return Ok(format!("CWSAuth Bearer={}", token.value));
        }

        let token = execute_with_retry(retry, "token request", || async move {
            self.acquire(transport).await.map_err(|err| (err, None))
        })
        .await?;
        let header = format!("CWSAuth Bearer={}", token.value);
        *cached = Some(token);
        Ok(header)
    }

    /// Drop the cached token after the remote service rejected it
    ///
    /// Returns `false` when a new token cannot differ from the rejected one.
    pub async fn invalidate(&self) -> bool {
        if matches!(self.credentials, Credentials::Static(_)) {
            return false;
        }
        self.cached.lock().await.take().is_some()
    }

    async fn acquire(&self, transport: &dyn Transport) -> Result<Token, ApiError> {
        match &self.credentials {
            Credentials::Static(token) => Ok(Token {
                value: token.clone(),
                expires_at: None,
            }),
            Credentials::Cloud {
                token_url,
                client_id,
                client_secret,
            } => {
                info!(client_id = client_id.as_str(), "acquiring Citrix Cloud token");
                let request = ApiRequest::new(Method::Post, token_url.clone())
                    .header("Accept", "application/json")
                    .form(vec![
                        ("grant_type".to_owned(), "client_credentials".to_owned()),
                        ("client_id".to_owned(), client_id.clone()),
                        ("client_secret".to_owned(), client_secret.clone()),
                    ]);
                let body = send_token_request(transport, request).await?;
                let response: CloudTokenResponse = serde_json::from_slice(&body)
                    .map_err(|err| ApiError::Auth(format!("invalid token response: {}", err)))?;
                let lifetime = response
                    .expires_in
                    .as_ref()
                    .and_then(|value| match value {
                        serde_json::Value::Number(n) => n.as_u64(),
                        serde_json::Value::String(s) => s.parse().ok(),
                        _ => None,
                    })
                    .map(Duration::from_secs)
                    .unwrap_or(DEFAULT_LIFETIME);
                Ok(Token {
                    value: response.access_token,
                    expires_at: Some(Instant::now() + lifetime),
                })
            }
            Credentials::OnPremises {
                token_url,
                username,
                password,
            } => {
                info!(username = username.as_str(), "acquiring on-premises token");
                let basic = base64::engine::general_purpose::STANDARD
                    .encode(format!("{}:{}", username, password));
                let request = ApiRequest::new(Method::Post, token_url.clone())
                    .header("Accept", "application/json")
                    .header("Authorization", format!("Basic {}", basic))
                    .json(serde_json::json!({}));
                let body = send_token_request(transport, request).await?;
                let response: OnPremisesTokenResponse = serde_json::from_slice(&body)
                    .map_err(|err| ApiError::Auth(format!("invalid token response: {}", err)))?;
                Ok(Token {
                    value: response.token,
                    expires_at: Some(Instant::now() + DEFAULT_LIFETIME),
                })
            }
        }
    }
}

async fn send_token_request(
    transport: &dyn Transport,
    request: ApiRequest,
) -> Result<Vec<u8>, ApiError> {
    debug!(url = request.url.as_str(), "token request");
    let response = transport
        .send(request)
        .await
        .map_err(|err| ApiError::Transport {
            transaction_id: String::new(),
            message: format!("token request failed: {}", err.message),
        })?;
    if response.is_success() {
        return Ok(response.body);
    }
    let err = ApiError::from_response(&response, "");
    if err.is_transient() {
        // outages of the token endpoint are retried like any other request
        Err(err)
    } else {
        Err(ApiError::Auth(format!(
            "token endpoint answered HTTP {}: {}",
            response.status,
            response.text()
        )))
    }
}
