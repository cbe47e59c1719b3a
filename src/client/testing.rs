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

//! Scripted transport for unit tests

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::transport::{ApiRequest, ApiResponse, Method, Transport, TransportError};
use super::{CitrixClient, ClientSettings, Credentials, Endpoints, RetryPolicy};

struct Scripted {
    method: Method,
    url_fragment: String,
    response: ApiResponse,
}

#[derive(Default)]
struct Inner {
    script: Vec<Scripted>,
    requests: Vec<ApiRequest>,
}

/// Answers requests from a script and records them
///
/// A request is answered by the first scripted response with the same method
/// whose fragment is contained in the url. Unmatched requests fail at the
/// transport level.
#[derive(Clone, Default)]
pub struct FakeTransport {
    inner: Arc<Mutex<Inner>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
        Self::default()
    }

    pub fn push(&self, method: Method, url_fragment: &str, response: ApiResponse) {
        self.inner.lock().unwrap().script.push(Scripted {
            method,
            url_fragment: url_fragment.to_owned(),
            response,
        });
    }

    pub fn push_json(&self, method: Method, url_fragment: &str, status: u16, body: serde_json::Value) {
        self.push(
            method,
            url_fragment,
            ApiResponse {
                status,
                headers: HashMap::new(),
                body: serde_json::to_vec(&body).unwrap(),
            },
        );
    }

    pub fn push_json_with_transaction(
        &self,
        method: Method,
        url_fragment: &str,
        status: u16,
        body: serde_json::Value,
        transaction_id: &str,
    ) {
        self.push(
            method,
            url_fragment,
            ApiResponse {
                status,
                headers: HashMap::from([(
                    "citrix-transactionid".to_owned(),
                    transaction_id.to_owned(),
                )]),
                body: serde_json::to_vec(&body).unwrap(),
            },
        );
    }

    /// `204 No Content`
    pub fn push_empty(&self, method: Method, url_fragment: &str) {
        self.push(
            method,
            url_fragment,
            ApiResponse {
                status: 204,
                ..Default::default()
            },
        );
    }

    /// `202 Accepted` pointing at a job
    pub fn push_accepted(&self, method: Method, url_fragment: &str, location: &str) {
        self.push(
            method,
            url_fragment,
            ApiResponse {
                status: 202,
                headers: HashMap::from([("location".to_owned(), location.to_owned())]),
                body: Vec::new(),
            },
        );
    }

    /// Async submission followed by a completed job
    pub fn push_job(&self, method: Method, url_fragment: &str, job_id: &str) {
        self.push_accepted(
            method,
            url_fragment,
            &format!("https://api.test/cvad/manage/Jobs/{}", job_id),
        );
        self.push_json(
            Method::Get,
            &format!("/Jobs/{}", job_id),
            200,
            serde_json::json!({"Id": job_id, "Status": "Complete"}),
        );
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.inner.lock().unwrap().requests.clone()
    }

    /// Recorded requests with the given method
    pub fn requests_with(&self, method: Method) -> Vec<ApiRequest> {
        self.requests()
            .into_iter()
            .filter(|request| request.method == method)
            .collect()
    }

    pub fn remaining(&self) -> usize {
        self.inner.lock().unwrap().script.len()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let mut inner = self.inner.lock().unwrap();
        inner.requests.push(request.clone());
        let position = inner.script.iter().position(|scripted| {
            scripted.method == request.method && request.url.contains(&scripted.url_fragment)
        });
        match position {
            Some(position) => Ok(inner.script.remove(position).response),
            None => Err(TransportError::new(format!(
                "unexpected request: {} {}",
                request.method, request.url
            ))),
        }
    }
}

pub fn test_settings() -> ClientSettings {
    ClientSettings {
        customer_id: "cust".into(),
        credentials: Credentials::Static("token".into()),
        endpoints: Endpoints {
            orchestration: "https://api.test/cvad/manage".into(),
            quick_create: "https://api.test/quickcreate".into(),
            app_config: "https://api.test/appconfigpublic".into(),
        },
        retry: RetryPolicy::default(),
        site_id: Some("site".into()),
    }
}

pub fn test_client(transport: &FakeTransport) -> CitrixClient {
    CitrixClient::new(
        Arc::new(transport.clone()),
        test_settings(),
        CancellationToken::new(),
    )
}
