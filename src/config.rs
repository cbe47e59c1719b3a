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

//! Provider block and its environment fallbacks

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tf_provider::schema::{
    Attribute, AttributeConstraint, AttributeType, Block, Description, Schema,
};
use tf_provider::value::{Value, ValueString};
use tf_provider::{map, AttributePath, Diagnostics};

use crate::client::{ClientSettings, Credentials, Endpoints, RetryPolicy};
use crate::utils::{WithSchema, WithValidate};

/// Customer id selecting an on-premises site
pub const ON_PREMISES_CUSTOMER_ID: &str = "CitrixOnPremises";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProviderConfig<'a> {
    #[serde(borrow = "'a")]
    pub customer_id: ValueString<'a>,
    pub client_id: ValueString<'a>,
    pub client_secret: ValueString<'a>,
    pub hostname: ValueString<'a>,
    pub environment: ValueString<'a>,
    pub disable_ssl_verification: Value<bool>,
}

/// Citrix Cloud region
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum Environment {
    #[default]
    Production,
    Japan,
    Gov,
    Staging,
}

impl Environment {
    fn domain(self) -> &'static str {
        match self {
            Environment::Production => "cloud.com",
            Environment::Japan => "citrixcloud.jp",
            Environment::Gov => "cloud.us",
            Environment::Staging => "cloudburrito.com",
        }
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Production" => Ok(Environment::Production),
            "Japan" => Ok(Environment::Japan),
            "Gov" => Ok(Environment::Gov),
            "Staging" => Ok(Environment::Staging),
            _ => Err(format!(
                "`{}` is not a valid environment, expected one of: Production, Japan, Gov, Staging",
                s
            )),
        }
    }
}

/// Fully resolved provider configuration
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub settings: ClientSettings,
    pub disable_ssl_verification: bool,
}

impl WithSchema for ProviderConfig<'_> {
    fn schema() -> Schema {
        let string_attribute = |description: &str, sensitive: bool| Attribute {
            attr_type: AttributeType::String,
            description: Description::plain(description),
            constraint: AttributeConstraint::Optional,
            sensitive,
            ..Default::default()
        };
        Schema {
            version: 1,
            block: Block {
                version: 1,
                attributes: map! {
                    "customer_id" => string_attribute(
                        "Citrix Cloud customer id, `CitrixOnPremises` for an on-premises site. Can be set with `CITRIX_CUSTOMER_ID`.",
                        false,
                    ),
                    "client_id" => string_attribute(
                        "API client id, or `domain\\user` on-premises. Can be set with `CITRIX_CLIENT_ID`.",
                        false,
                    ),
                    "client_secret" => string_attribute(
                        "API client secret, or the user password on-premises. Can be set with `CITRIX_CLIENT_SECRET`.",
                        true,
                    ),
                    "hostname" => string_attribute(
                        "Delivery Controller host name, on-premises only. Can be set with `CITRIX_HOSTNAME`.",
                        false,
                    ),
                    "environment" => string_attribute(
                        "Citrix Cloud environment: `Production` (default), `Japan`, `Gov` or `Staging`. Can be set with `CITRIX_ENVIRONMENT`.",
                        false,
                    ),
                    "disable_ssl_verification" => Attribute {
                        attr_type: AttributeType::Bool,
                        description: Description::plain(
                            "Accept self-signed certificates of an on-premises site. Can be set with `CITRIX_DISABLE_SSL_VERIFICATION`.",
                        ),
                        constraint: AttributeConstraint::Optional,
                        ..Default::default()
                    },
                },
                description: Description::plain("Citrix DaaS, QuickCreate and Global App Configuration"),
                ..Default::default()
            },
        }
    }
}

impl WithValidate for ProviderConfig<'_> {
    fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        if let Value::Value(environment) = &self.environment {
            if let Err(err) = environment.parse::<Environment>() {
                diags.error(
                    "Invalid environment",
                    err,
                    attr_path.clone().attribute("environment"),
                );
            }
        }
        if let Value::Value(customer_id) = &self.customer_id {
            if *customer_id == ON_PREMISES_CUSTOMER_ID && self.hostname.is_null() {
                diags.warning(
                    "`hostname` is not set",
                    "An on-premises site needs `hostname`, either in the provider block or in `CITRIX_HOSTNAME`.",
                    attr_path.attribute("hostname"),
                );
            }
        }
    }
}

fn setting(
    diags: &mut Diagnostics,
    value: &ValueString<'_>,
    name: &'static str,
    env_name: &str,
    env: &impl Fn(&str) -> Option<String>,
) -> Option<String> {
    match value {
        Value::Value(v) if !v.is_empty() => Some(v.to_string()),
        Value::Value(_) | Value::Null => env(env_name).filter(|v| !v.is_empty()),
        Value::Unknown => {
            diags.error(
                format!("`{}` is not known", name),
                "The provider configuration must be known before the provider can be configured.",
                AttributePath::new(name),
            );
            None
        }
    }
}

fn required(
    diags: &mut Diagnostics,
    value: Option<String>,
    name: &'static str,
    env_name: &str,
) -> String {
    match value {
        Some(value) => value,
        None => {
            diags.error(
                format!("Missing `{}`", name),
                format!(
                    "`{}` must be set in the provider block or with the `{}` environment variable.",
                    name, env_name
                ),
                AttributePath::new(name),
            );
            String::new()
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" | "" => Some(false),
        _ => None,
    }
}

impl ProviderConfig<'_> {
    /// Merge the provider block with the environment
    ///
    /// Explicit attributes win over environment variables. Errors are
    /// recorded on the offending attribute and `None` is returned.
    pub fn resolve(
        &self,
        diags: &mut Diagnostics,
        env: impl Fn(&str) -> Option<String>,
    ) -> Option<ResolvedConfig> {
        let errors = diags.errors.len();

        let customer_id = setting(diags, &self.customer_id, "customer_id", "CITRIX_CUSTOMER_ID", &env);
        let customer_id = required(diags, customer_id, "customer_id", "CITRIX_CUSTOMER_ID");
        let client_id = setting(diags, &self.client_id, "client_id", "CITRIX_CLIENT_ID", &env);
        let client_id = required(diags, client_id, "client_id", "CITRIX_CLIENT_ID");
        let client_secret = setting(
            diags,
            &self.client_secret,
            "client_secret",
            "CITRIX_CLIENT_SECRET",
            &env,
        );
        let client_secret = required(diags, client_secret, "client_secret", "CITRIX_CLIENT_SECRET");
        let hostname = setting(diags, &self.hostname, "hostname", "CITRIX_HOSTNAME", &env);
        let environment = setting(
            diags,
            &self.environment,
            "environment",
            "CITRIX_ENVIRONMENT",
            &env,
        );

        let environment = match environment.as_deref().map(str::parse::<Environment>) {
            None => Environment::default(),
            Some(Ok(environment)) => environment,
            Some(Err(err)) => {
                diags.error("Invalid environment", err, AttributePath::new("environment"));
                Environment::default()
            }
        };

        let disable_ssl_verification = match self.disable_ssl_verification {
            Value::Value(b) => b,
            Value::Null => match env("CITRIX_DISABLE_SSL_VERIFICATION") {
                Some(raw) => parse_bool(&raw).unwrap_or_else(|| {
                    diags.error(
                        "Invalid `CITRIX_DISABLE_SSL_VERIFICATION`",
                        format!("`{}` is not a boolean.", raw),
                        AttributePath::new("disable_ssl_verification"),
                    );
                    false
                }),
                None => false,
            },
            Value::Unknown => false,
        };

        let on_premises = customer_id == ON_PREMISES_CUSTOMER_ID;
        let (credentials, endpoints) = if on_premises {
            let hostname = required(diags, hostname, "hostname", "CITRIX_HOSTNAME");
            let base = format!("https://{}", hostname.trim_end_matches('/'));
            (
                Credentials::OnPremises {
                    token_url: format!("{}/citrix/orchestration/api/tokens", base),
                    username: client_id,
                    password: client_secret,
                },
                Endpoints {
                    orchestration: format!("{}/citrix/orchestration/api", base),
                    quick_create: format!("{}/quickcreate", base),
                    app_config: format!("{}/appconfigpublic", base),
                },
            )
        } else {
            if disable_ssl_verification {
                diags.warning(
                    "`disable_ssl_verification` is ignored",
                    "Certificate verification can only be disabled for on-premises sites.",
                    AttributePath::new("disable_ssl_verification"),
                );
            }
            let api = format!("https://api.{}", environment.domain());
            (
                Credentials::Cloud {
                    token_url: format!("{}/cctrustoauth2/{}/tokens/clients", api, customer_id),
                    client_id,
                    client_secret,
                },
                Endpoints {
                    orchestration: format!("{}/cvad/manage", api),
                    quick_create: format!("{}/quickcreate", api),
                    app_config: format!("{}/appconfigpublic", api),
                },
            )
        };

        if diags.errors.len() > errors {
            return None;
        }

        Some(ResolvedConfig {
            settings: ClientSettings {
                customer_id,
                credentials,
                endpoints,
                retry: RetryPolicy::default(),
                site_id: None,
            },
            disable_ssl_verification: on_premises && disable_ssl_verification,
        })
    }
}
