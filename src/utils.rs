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

use tf_provider::schema::Schema;
use tf_provider::value::{Value, ValueString};
use tf_provider::{AttributePath, Diagnostics};

use crate::client::ApiError;
use crate::jobs::JobError;

pub(crate) trait WithSchema {
    fn schema() -> Schema;
}

pub(crate) trait WithValidate {
    fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath);
}

/// Remote string to state: empty strings are null
pub(crate) fn string_value<'a>(value: impl Into<String>) -> ValueString<'a> {
    let value = value.into();
    if value.is_empty() {
        Value::Null
    } else {
        Value::Value(value.into())
    }
}

pub(crate) fn optional_string<'a>(value: Option<String>) -> ValueString<'a> {
    value.map_or(Value::Null, string_value)
}

/// Known string content, or `""`
pub(crate) fn str_of<'b>(value: &'b ValueString<'_>) -> &'b str {
    value.as_deref_option().unwrap_or_default()
}

/// Error when a known attribute is null or empty
///
/// Unknown values are accepted, they are checked again at apply time.
pub(crate) fn require_non_empty(
    diags: &mut Diagnostics,
    value: &ValueString<'_>,
    name: &str,
    attr_path: AttributePath,
) {
    match value {
        Value::Value(v) if !v.is_empty() => (),
        Value::Value(_) => {
            diags.error(
                format!("`{}` is empty", name),
                format!("`{}` is required and cannot be empty.", name),
                attr_path,
            );
        }
        Value::Null => {
            diags.error(
                format!("`{}` is missing", name),
                format!("`{}` is required.", name),
                attr_path,
            );
        }
        Value::Unknown => (),
    }
}

/// Error when a known attribute is not one of `allowed`
pub(crate) fn require_one_of(
    diags: &mut Diagnostics,
    value: &ValueString<'_>,
    name: &str,
    allowed: &[&str],
    attr_path: AttributePath,
) {
    if let Value::Value(v) = value {
        if !allowed.contains(&v.as_ref()) {
            diags.error(
                format!("Invalid `{}`", name),
                format!(
                    "`{}` must be one of {}. Got: `{}`",
                    name,
                    allowed
                        .iter()
                        .map(|a| format!("`{}`", a))
                        .collect::<Vec<_>>()
                        .join(", "),
                    v
                ),
                attr_path,
            );
        }
    }
}

/// Split a composite import id `first,second`
pub(crate) fn parse_import_id(
    diags: &mut Diagnostics,
    id: &str,
    expected: &'static str,
) -> Option<(String, String)> {
    let parts: Vec<&str> = id.split(',').map(str::trim).collect();
    match parts.as_slice() {
        [first, second] if !first.is_empty() && !second.is_empty() => {
            Some((first.to_string(), second.to_string()))
        }
        _ => {
            diags.root_error(
                "Invalid import identifier",
                format!("Expected import identifier with format: `{}`. Got: `{}`", expected, id),
            );
            None
        }
    }
}

/// Error that can be surfaced as a diagnostic
pub(crate) trait RemoteFailure {
    fn transaction_id(&self) -> &str;
    fn message(&self) -> String;
}

impl RemoteFailure for ApiError {
    fn transaction_id(&self) -> &str {
        ApiError::transaction_id(self)
    }
    fn message(&self) -> String {
        ApiError::message(self)
    }
}

impl RemoteFailure for JobError {
    fn transaction_id(&self) -> &str {
        JobError::transaction_id(self)
    }
    fn message(&self) -> String {
        match self {
            JobError::Api(err) => err.message(),
            err => err.to_string(),
        }
    }
}

pub(crate) fn failure_detail(err: &impl RemoteFailure) -> String {
    format!(
        "TransactionId: {}\nError message: {}",
        err.transaction_id(),
        err.message()
    )
}

/// Record a remote failure as an error diagnostic
pub(crate) fn report<S: Into<String>>(diags: &mut Diagnostics, summary: S, err: &impl RemoteFailure) {
    let summary: String = summary.into();
    diags.root_error(summary, failure_detail(err));
}

/// Warn that a resource disappeared, the framework then drops it from the state
pub(crate) fn warn_removed(diags: &mut Diagnostics, kind: &str, id: &str) {
    diags.root_warning(
        format!("{} not found", kind),
        format!(
            "{} `{}` no longer exists remotely and was removed from the state.",
            kind, id
        ),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_remote_string_is_null() {
        assert_eq!(string_value(""), ValueString::Null);
        assert_eq!(string_value("x"), ValueString::from("x"));
        assert_eq!(optional_string(None), ValueString::Null);
    }

    #[test]
    fn composite_import_id() {
        let mut diags = Diagnostics::default();
        assert_eq!(
            parse_import_id(&mut diags, "hyp-1,pool-2", "hypervisorId,resourcePoolId"),
            Some(("hyp-1".into(), "pool-2".into()))
        );
        assert!(diags.errors.is_empty());

        for bad in ["hyp-1", "hyp-1,", ",pool", "a,b,c"] {
            let mut diags = Diagnostics::default();
            assert_eq!(
                parse_import_id(&mut diags, bad, "hypervisorId,resourcePoolId"),
                None
            );
            assert_eq!(diags.errors.len(), 1);
            assert_eq!(diags.errors[0].summary, "Invalid import identifier");
            assert!(diags.errors[0].detail.contains("hypervisorId,resourcePoolId"));
        }
    }

    #[test]
    fn missing_value_is_reported() {
        let mut diags = Diagnostics::default();
        require_non_empty(&mut diags, &ValueString::Unknown, "x", AttributePath::new("x"));
        require_non_empty(&mut diags, &ValueString::from("v"), "x", AttributePath::new("x"));
        assert!(diags.errors.is_empty());
        require_non_empty(&mut diags, &ValueString::Null, "x", AttributePath::new("x"));
        require_non_empty(&mut diags, &ValueString::from(""), "x", AttributePath::new("x"));
        assert_eq!(diags.errors.len(), 2);
    }

    #[test]
    fn failure_detail_has_transaction() {
        let err = ApiError::Status {
            status: 400,
            transaction_id: "tx-1".into(),
            message: "bad".into(),
        };
        assert_eq!(
            failure_detail(&err),
            "TransactionId: tx-1\nError message: bad (HTTP 400)"
        );
    }
}
