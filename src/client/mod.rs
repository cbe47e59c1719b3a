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

//! Typed wrapper around the Citrix REST APIs

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tf_provider::Diagnostics;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub mod auth;
pub mod error;
pub mod retry;
#[cfg(test)]
pub mod testing;
pub mod transport;

pub use auth::{Authenticator, Credentials};
pub use error::ApiError;
pub use retry::RetryPolicy;
pub use transport::{ApiRequest, ApiResponse, HttpTransport, Method, Transport};

use error::{response_transaction_id, TRANSACTION_ID_HEADER};
use retry::execute_with_retry;

/// Remote service a path belongs to
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Service {
    /// Virtual apps and desktops orchestration
    Orchestration,
    /// QuickCreate (Amazon WorkSpaces)
    QuickCreate,
    /// Global App Configuration
    AppConfig,
}

/// Base urls of the remote services
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Endpoints {
    pub orchestration: String,
    pub quick_create: String,
    pub app_config: String,
}

impl Endpoints {
    fn base(&self, service: Service) -> &str {
        match service {
            Service::Orchestration => &self.orchestration,
            Service::QuickCreate => &self.quick_create,
            Service::AppConfig => &self.app_config,
        }
    }
}

/// Path relative to a service, with its query
///
/// Segments are percent-encoded when the url is built.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ApiPath {
    service: Service,
    segments: Vec<String>,
    query: Vec<(String, String)>,
}

impl ApiPath {
    pub fn new(service: Service) -> Self {
        Self {
            service,
            segments: Vec::new(),
            query: Vec::new(),
        }
    }

    pub fn orchestration() -> Self {
        Self::new(Service::Orchestration)
    }

    pub fn quick_create() -> Self {
        Self::new(Service::QuickCreate)
    }

    pub fn app_config() -> Self {
        Self::new(Service::AppConfig)
    }

    pub fn segment(mut self, segment: impl Into<String>) -> Self {
        self.segments.push(segment.into());
        self
    }

    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    fn url(&self, endpoints: &Endpoints) -> Result<String, ApiError> {
        let base = endpoints.base(self.service);
        let mut url = url::Url::parse(base)
            .map_err(|err| ApiError::InvalidUrl(format!("{}: {}", base, err)))?;
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(format!("{} cannot be a base", base)))?
            .pop_if_empty()
            .extend(&self.segments);
        if !self.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&self.query);
        }
        Ok(url.into())
    }
}

/// Job created by an asynchronous request
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct JobHandle {
    pub id: String,
}

impl JobHandle {
    /// Job id is the last segment of the `Location` header
    fn from_location(location: &str) -> Option<Self> {
        let path = location.split(['?', '#']).next().unwrap_or_default();
        path.rsplit('/')
            .find(|segment| !segment.is_empty())
            .map(|id| JobHandle { id: id.to_owned() })
    }
}

/// One page of an orchestration listing
#[derive(Deserialize, Debug)]
#[serde(rename_all = "PascalCase")]
struct Page<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
    #[serde(default)]
    continuation_token: Option<String>,
}

#[derive(Deserialize, Default, Debug)]
#[serde(rename_all = "PascalCase", default)]
struct MeResponse {
    customers: Vec<MeCustomer>,
}

#[derive(Deserialize, Default, Debug)]
#[serde(rename_all = "PascalCase", default)]
struct MeCustomer {
    id: String,
    sites: Vec<MeSite>,
}

#[derive(Deserialize, Default, Debug)]
#[serde(rename_all = "PascalCase", default)]
struct MeSite {
    id: String,
}

/// Everything needed to build a [`CitrixClient`]
#[derive(Clone, Debug)]
pub struct ClientSettings {
    pub customer_id: String,
    pub credentials: Credentials,
    pub endpoints: Endpoints,
    pub retry: RetryPolicy,
    /// Site id, discovered with [`CitrixClient::discover_site`] when `None`
    pub site_id: Option<String>,
}

/// Authenticated client shared by every resource of a configured provider
pub struct CitrixClient {
    transport: Arc<dyn Transport>,
    auth: Authenticator,
    customer_id: String,
    site_id: Option<String>,
    endpoints: Endpoints,
    retry: RetryPolicy,
    cancel: CancellationToken,
}

impl std::fmt::Debug for CitrixClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CitrixClient")
            .field("customer_id", &self.customer_id)
            .field("site_id", &self.site_id)
            .field("endpoints", &self.endpoints)
            .finish_non_exhaustive()
    }
}

impl CitrixClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        settings: ClientSettings,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            transport,
            auth: Authenticator::new(settings.credentials),
            customer_id: settings.customer_id,
            site_id: settings.site_id,
            endpoints: settings.endpoints,
            retry: settings.retry,
            cancel,
        }
    }

    /// Resolve the site id from `GET /me`
    pub async fn discover_site(&mut self) -> Result<(), ApiError> {
        if self.site_id.is_some() {
            return Ok(());
        }
        let me: MeResponse = self.get(&ApiPath::orchestration().segment("me")).await?;
        let site = me
            .customers
            .iter()
            .find(|customer| customer.id.eq_ignore_ascii_case(&self.customer_id))
            .or_else(|| me.customers.first())
            .and_then(|customer| customer.sites.first())
            .map(|site| site.id.clone())
            .ok_or_else(|| {
                ApiError::Auth(format!(
                    "no site is available for customer {}",
                    self.customer_id
                ))
            })?;
        info!(site_id = site.as_str(), "using site");
        self.site_id = Some(site);
        Ok(())
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn customer_id(&self) -> &str {
        &self.customer_id
    }

    /// GET and decode, retried on transient failures
    pub async fn get<T: DeserializeOwned>(&self, path: &ApiPath) -> Result<T, ApiError> {
        let response = self.send(Method::Get, path, None).await?;
        decode(&response)
    }

    /// GET every item of a listing, following the continuation tokens
    pub async fn get_all<T: DeserializeOwned>(&self, path: &ApiPath) -> Result<Vec<T>, ApiError> {
        let mut items = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let page_path = match &token {
                Some(token) => path.clone().query("continuationToken", token.as_str()),
                None => path.clone(),
            };
            let page: Page<T> = self.get(&page_path).await?;
            items.extend(page.items);
            match page.continuation_token {
                Some(next) if !next.is_empty() => token = Some(next),
                _ => return Ok(items),
            }
        }
    }

    /// GET and decode, `None` when the remote object does not exist
    pub async fn get_optional<T: DeserializeOwned>(
        &self,
        path: &ApiPath,
    ) -> Result<Option<T>, ApiError> {
        match self.get(path).await {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// POST and decode the response body
    pub async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &ApiPath,
        body: &B,
    ) -> Result<T, ApiError> {
        let response = self.send(Method::Post, path, Some(to_json(body)?)).await?;
        decode(&response)
    }

    /// PUT and decode the response body
    pub async fn put<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &ApiPath,
        body: &B,
    ) -> Result<T, ApiError> {
        let response = self.send(Method::Put, path, Some(to_json(body)?)).await?;
        decode(&response)
    }

    /// Request whose response body is ignored
    pub async fn execute<B: Serialize>(
        &self,
        method: Method,
        path: &ApiPath,
        body: Option<&B>,
    ) -> Result<(), ApiError> {
        let body = body.map(to_json).transpose()?;
        self.send(method, path, body).await.map(|_| ())
    }

    pub async fn patch<B: Serialize>(&self, path: &ApiPath, body: &B) -> Result<(), ApiError> {
        self.execute(Method::Patch, path, Some(body)).await
    }

    pub async fn delete(&self, path: &ApiPath) -> Result<(), ApiError> {
        self.execute::<()>(Method::Delete, path, None).await
    }

    /// Send a request with `async=true`
    ///
    /// A `202 Accepted` yields the job to poll; any other success means the
    /// operation already completed.
    pub async fn submit_async<B: Serialize>(
        &self,
        method: Method,
        path: &ApiPath,
        body: Option<&B>,
    ) -> Result<Option<JobHandle>, ApiError> {
        let path = path.clone().query("async", "true");
        let body = body.map(to_json).transpose()?;
        let response = self.send(method, &path, body).await?;
        if response.status != 202 {
            debug!(status = response.status, "request completed synchronously");
            return Ok(None);
        }
        let transaction_id = response_transaction_id(&response, "");
        response
            .header("Location")
            .and_then(JobHandle::from_location)
            .map(Some)
            .ok_or_else(|| ApiError::Decode {
                transaction_id,
                message: String::from("asynchronous request accepted without a job location"),
            })
    }

    /// Send with the current token, then once more with a new one if it was rejected
    async fn send(
        &self,
        method: Method,
        path: &ApiPath,
        body: Option<serde_json::Value>,
    ) -> Result<ApiResponse, ApiError> {
        let url = path.url(&self.endpoints)?;
        match self.send_authorized(method, &url, body.clone()).await {
            Err(err) if err.status() == Some(401) && self.auth.invalidate().await => {
                info!(
                    transaction_id = err.transaction_id(),
                    "token rejected by the remote service, acquiring a new one"
                );
                self.send_authorized(method, &url, body).await
            }
            result => result,
        }
    }

    async fn send_authorized(
        &self,
        method: Method,
        url: &str,
        body: Option<serde_json::Value>,
    ) -> Result<ApiResponse, ApiError> {
        let authorization = self
            .auth
            .authorization(self.transport.as_ref(), &self.retry)
            .await?;
        let what = format!("{} {}", method, url);
        if method.is_retryable() {
            execute_with_retry(&self.retry, &what, || {
                self.send_once(method, url, &authorization, body.clone())
            })
            .await
        } else {
            self.send_once(method, url, &authorization, body)
                .await
                .map_err(|(err, _)| err)
        }
    }

    async fn send_once(
        &self,
        method: Method,
        url: &str,
        authorization: &str,
        body: Option<serde_json::Value>,
    ) -> Result<ApiResponse, (ApiError, Option<Duration>)> {
        let transaction_id = uuid::Uuid::new_v4().to_string();
        let mut request = ApiRequest::new(method, url)
            .header("Accept", "application/json")
            .header("Authorization", authorization)
            .header("Citrix-CustomerId", self.customer_id.as_str())
            .header(TRANSACTION_ID_HEADER, transaction_id.as_str());
        if let Some(site_id) = &self.site_id {
            request = request.header("Citrix-InstanceId", site_id.as_str());
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        debug!(
            method = %method,
            url,
            transaction_id = transaction_id.as_str(),
            "sending request"
        );
        let response = self.transport.send(request).await.map_err(|err| {
            (
                ApiError::Transport {
                    transaction_id: transaction_id.clone(),
                    message: err.message,
                },
                None,
            )
        })?;

        if response.is_success() {
            Ok(response)
        } else {
            let retry_after = response
                .header("Retry-After")
                .and_then(|value| value.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            Err((
                ApiError::from_response(&response, &transaction_id),
                retry_after,
            ))
        }
    }
}

fn to_json<B: Serialize>(body: &B) -> Result<serde_json::Value, ApiError> {
    serde_json::to_value(body).map_err(|err| ApiError::Decode {
        transaction_id: String::new(),
        message: format!("could not encode request: {}", err),
    })
}

fn decode<T: DeserializeOwned>(response: &ApiResponse) -> Result<T, ApiError> {
    let body: &[u8] = if response.body.iter().all(u8::is_ascii_whitespace) {
        b"null"
    } else {
        &response.body
    };
    serde_json::from_slice(body).map_err(|err| ApiError::Decode {
        transaction_id: response_transaction_id(response, ""),
        message: err.to_string(),
    })
}

/// Holds the client once the provider is configured
#[derive(Clone, Default, Debug)]
pub struct ClientSlot(Arc<RwLock<Option<Arc<CitrixClient>>>>);

impl ClientSlot {
    pub async fn set(&self, client: CitrixClient) {
        *self.0.write().await = Some(Arc::new(client));
    }

    /// Configured client, or an error diagnostic
    pub async fn get(&self, diags: &mut Diagnostics) -> Option<Arc<CitrixClient>> {
        let client = self.0.read().await.clone();
        if client.is_none() {
            diags.root_error(
                "Provider not configured",
                "The Citrix provider must be configured before its resources can be used.",
            );
        }
        client
    }
}
