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

use thiserror::Error;

use super::transport::ApiResponse;

/// Header used to correlate a request with the server-side logs
pub const TRANSACTION_ID_HEADER: &str = "Citrix-TransactionId";

const MAX_RAW_MESSAGE_LEN: usize = 512;

/// Error returned by the remote APIs or while talking to them
#[derive(Error, Clone, PartialEq, Eq, Debug)]
pub enum ApiError {
    #[error("request failed (transaction {transaction_id}): {message}")]
    Transport {
        transaction_id: String,
        message: String,
    },

    #[error("HTTP {status} (transaction {transaction_id}): {message}")]
    Status {
        status: u16,
        transaction_id: String,
        message: String,
    },

    #[error("could not decode response (transaction {transaction_id}): {message}")]
    Decode {
        transaction_id: String,
        message: String,
    },

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

impl ApiError {
    /// Build a [`ApiError::Status`] from a non-success response
    pub(crate) fn from_response(response: &ApiResponse, sent_transaction_id: &str) -> Self {
        ApiError::Status {
            status: response.status,
            transaction_id: response_transaction_id(response, sent_transaction_id),
            message: remote_message(response),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Network failures, server errors and throttling may succeed on a later attempt
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Transport { .. } => true,
            ApiError::Status { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    pub fn transaction_id(&self) -> &str {
        match self {
            ApiError::Transport { transaction_id, .. }
            | ApiError::Status { transaction_id, .. }
            | ApiError::Decode { transaction_id, .. } => transaction_id,
            ApiError::Auth(_) | ApiError::InvalidUrl(_) => "",
        }
    }

    /// Human readable part of the error, without the transaction id
    pub fn message(&self) -> String {
        match self {
            ApiError::Transport { message, .. } | ApiError::Decode { message, .. } => {
                message.clone()
            }
            ApiError::Status {
                status, message, ..
            } => format!("{} (HTTP {})", message, status),
            ApiError::Auth(message) | ApiError::InvalidUrl(message) => message.clone(),
        }
    }
}

pub(crate) fn response_transaction_id(response: &ApiResponse, sent: &str) -> String {
    response
        .header(TRANSACTION_ID_HEADER)
        .filter(|id| !id.is_empty())
        .unwrap_or(sent)
        .to_owned()
}

/// Extract the error message from the remote error payload
fn remote_message(response: &ApiResponse) -> String {
    const KEYS: [&str; 6] = [
        "ErrorMessage",
        "errorMessage",
        "Message",
        "message",
        "Detail",
        "error_description",
    ];

    if let Ok(serde_json::Value::Object(payload)) =
        serde_json::from_slice::<serde_json::Value>(&response.body)
    {
        for key in KEYS {
            if let Some(serde_json::Value::String(message)) = payload.get(key) {
                if !message.is_empty() {
                    return message.clone();
                }
            }
        }
    }

    let mut raw = response.text();
    if raw.trim().is_empty() {
        return String::from("no error message returned by the remote service");
    }
    if raw.len() > MAX_RAW_MESSAGE_LEN {
        let mut end = MAX_RAW_MESSAGE_LEN;
        while !raw.is_char_boundary(end) {
            end -= 1;
        }
        raw.truncate(end);
        raw.push_str("...");
    }
    raw
}
