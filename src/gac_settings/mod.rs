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

//! Workspace app settings published through Global App Configuration
//!
//! Settings are stored per service url and per platform, grouped in
//! categories. A setting value is either a string or a list of strings.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

use crate::client::ApiPath;

pub use resource::GacSettingsResource;

mod resource;
mod state;

/// Platforms a category can be published for, in schema order
pub const PLATFORMS: &[&str] = &["windows", "ios", "android", "html5", "chromeos", "macos"];

/// Audience of every category managed here
const ASSIGNED_TO: &str = "AllUsersNoAuthentication";

/// `/configurations/serviceURL/{base64(url)}`
pub fn configuration_path(service_url: &str) -> ApiPath {
    ApiPath::app_config()
        .segment("configurations")
        .segment("serviceURL")
        .segment(STANDARD.encode(service_url))
}

#[derive(Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfigurationDto {
    #[serde(rename = "serviceURL")]
    pub service_url: ServiceUrlDto,
    pub settings: SettingsDto,
}

#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceUrlDto {
    pub url: String,
}

#[derive(Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SettingsDto {
    pub name: String,
    pub description: String,
    pub use_for_app_config: bool,
    pub app_settings: AppSettingsDto,
}

#[derive(Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettingsDto {
    pub windows: Vec<CategoryDto>,
    pub ios: Vec<CategoryDto>,
    pub android: Vec<CategoryDto>,
    pub html5: Vec<CategoryDto>,
    pub chromeos: Vec<CategoryDto>,
    pub macos: Vec<CategoryDto>,
}

impl AppSettingsDto {
    pub fn platform(&self, platform: &str) -> &[CategoryDto] {
        match platform {
            "windows" => &self.windows,
            "ios" => &self.ios,
            "android" => &self.android,
            "html5" => &self.html5,
            "chromeos" => &self.chromeos,
            "macos" => &self.macos,
            _ => &[],
        }
    }

    pub fn platform_mut(&mut self, platform: &str) -> Option<&mut Vec<CategoryDto>> {
        match platform {
            "windows" => Some(&mut self.windows),
            "ios" => Some(&mut self.ios),
            "android" => Some(&mut self.android),
            "html5" => Some(&mut self.html5),
            "chromeos" => Some(&mut self.chromeos),
            "macos" => Some(&mut self.macos),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        PLATFORMS
            .iter()
            .all(|platform| self.platform(platform).is_empty())
    }
}

#[derive(Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CategoryDto {
    pub category: String,
    pub user_override: bool,
    pub assigned_to: Vec<String>,
    pub settings: Vec<SettingDto>,
}

impl CategoryDto {
    pub fn new(category: String, user_override: bool, settings: Vec<SettingDto>) -> Self {
        Self {
            category,
            user_override,
            assigned_to: vec![ASSIGNED_TO.to_owned()],
            settings,
        }
    }
}

#[derive(Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingDto {
    pub name: String,
    pub value: serde_json::Value,
}

/// Value of a single setting
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum SettingValue {
    String(String),
    List(Vec<String>),
}

impl SettingValue {
    /// Decode a remote value: a string first, then a list of strings
    ///
    /// Any other shape is an error naming what was found.
    pub fn decode(value: &serde_json::Value) -> Result<Self, String> {
        match value {
            serde_json::Value::String(s) => Ok(Self::String(s.clone())),
            serde_json::Value::Array(items) => items
                .iter()
                .map(|item| match item {
                    serde_json::Value::String(s) => Ok(s.clone()),
                    other => Err(format!(
                        "expected a list of strings, found an element {}",
                        json_kind(other)
                    )),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Self::List),
            other => Err(format!(
                "expected a string or a list of strings, found {}",
                json_kind(other)
            )),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::String(s) => serde_json::Value::String(s.clone()),
            Self::List(items) => serde_json::Value::from(items.clone()),
        }
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "a list",
        serde_json::Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decode_setting_values() {
        assert_eq!(
            SettingValue::decode(&json!("true")),
            Ok(SettingValue::String("true".into()))
        );
        assert_eq!(
            SettingValue::decode(&json!(["a", "b"])),
            Ok(SettingValue::List(vec!["a".into(), "b".into()]))
        );
        assert_eq!(
            SettingValue::decode(&json!([])),
            Ok(SettingValue::List(vec![]))
        );
    }

    #[test]
    fn other_shapes_are_errors() {
        let err = SettingValue::decode(&json!(42)).unwrap_err();
        assert!(err.contains("a number"), "{}", err);

        let err = SettingValue::decode(&json!({"url": "x"})).unwrap_err();
        assert!(err.contains("an object"), "{}", err);

        let err = SettingValue::decode(&json!(["a", 1])).unwrap_err();
        assert!(err.contains("element a number"), "{}", err);
    }

    #[test]
    fn configuration_uses_camel_case() {
        let remote: ConfigurationDto = serde_json::from_value(json!({
            "serviceURL": {"url": "https://store.example.com"},
            "settings": {
                "name": "corp",
                "useForAppConfig": true,
                "appSettings": {
                    "windows": [{
                        "category": "ICA",
                        "userOverride": false,
                        "settings": [{"name": "Hide", "value": "true"}],
                    }],
                },
            },
        }))
        .unwrap();
        assert_eq!(remote.service_url.url, "https://store.example.com");
        assert!(remote.settings.use_for_app_config);
        assert_eq!(remote.settings.app_settings.windows[0].category, "ICA");
        assert!(remote.settings.app_settings.ios.is_empty());
    }
}
