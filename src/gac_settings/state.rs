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

use serde::{Deserialize, Serialize};
use tf_provider::schema::{
    Attribute, AttributeConstraint, AttributeType, Block, Description, NestedBlock, Schema,
};
use tf_provider::value::{self, Value, ValueList, ValueString};
use tf_provider::{map, AttributePath, Diagnostics};

use crate::reconcile::reconcile;
use crate::utils::{require_non_empty, str_of, string_value, WithSchema, WithValidate};

use super::{
    AppSettingsDto, CategoryDto, ConfigurationDto, ServiceUrlDto, SettingDto, SettingValue,
    SettingsDto, PLATFORMS,
};

type Categories<'a> = ValueList<Value<CategorySettings<'a>>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct GacSettingsState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub service_url: ValueString<'a>,
    pub name: ValueString<'a>,
    pub description: ValueString<'a>,
    pub use_for_app_config: Value<bool>,
    #[serde(with = "value::serde_as_vec")]
    pub app_settings: Value<AppSettings<'a>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AppSettings<'a> {
    #[serde(borrow = "'a")]
    pub windows: Categories<'a>,
    pub ios: Categories<'a>,
    pub android: Categories<'a>,
    pub html5: Categories<'a>,
    pub chromeos: Categories<'a>,
    pub macos: Categories<'a>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CategorySettings<'a> {
    #[serde(borrow = "'a")]
    pub category: ValueString<'a>,
    pub user_override: Value<bool>,
    pub settings: ValueList<Value<Setting<'a>>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Setting<'a> {
    #[serde(borrow = "'a")]
    pub name: ValueString<'a>,
    pub value_string: ValueString<'a>,
    pub value_list: ValueList<ValueString<'a>>,
}

fn app_settings_path() -> AttributePath {
    AttributePath::new("app_settings").index(0)
}

impl<'a> GacSettingsState<'a> {
    /// Refresh from the remote configuration
    ///
    /// Setting values of an unsupported shape are reported as errors.
    pub fn refresh(self, remote: &ConfigurationDto, diags: &mut Diagnostics) -> Self {
        let app = &remote.settings.app_settings;
        let app_settings = match self.app_settings {
            Value::Null | Value::Unknown if app.is_empty() => Value::Null,
            prior => Value::Value(prior.unwrap_or_default().refresh(app, diags)),
        };
        Self {
            id: string_value(remote.service_url.url.clone()),
            service_url: string_value(remote.service_url.url.clone()),
            name: string_value(remote.settings.name.clone()),
            description: string_value(remote.settings.description.clone()),
            use_for_app_config: Value::Value(remote.settings.use_for_app_config),
            app_settings,
        }
    }

    pub fn to_dto(&self) -> ConfigurationDto {
        let mut app_settings = AppSettingsDto::default();
        if let Value::Value(app) = &self.app_settings {
            for platform in PLATFORMS {
                if let (Some(categories), Some(target)) =
                    (app.platform(platform), app_settings.platform_mut(platform))
                {
                    *target = categories
                        .iter()
                        .flatten()
                        .filter_map(Value::as_ref_option)
                        .map(CategorySettings::to_dto)
                        .collect();
                }
            }
        }
        ConfigurationDto {
            service_url: ServiceUrlDto {
                url: str_of(&self.service_url).to_owned(),
            },
            settings: SettingsDto {
                name: str_of(&self.name).to_owned(),
                description: str_of(&self.description).to_owned(),
                use_for_app_config: self
                    .use_for_app_config
                    .as_ref_option()
                    .copied()
                    .unwrap_or_default(),
                app_settings,
            },
        }
    }
}

impl<'a> AppSettings<'a> {
    fn platform(&self, platform: &str) -> Option<&Categories<'a>> {
        match platform {
            "windows" => Some(&self.windows),
            "ios" => Some(&self.ios),
            "android" => Some(&self.android),
            "html5" => Some(&self.html5),
            "chromeos" => Some(&self.chromeos),
            "macos" => Some(&self.macos),
            _ => None,
        }
    }

    fn platform_mut(&mut self, platform: &str) -> Option<&mut Categories<'a>> {
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

    fn refresh(mut self, remote: &AppSettingsDto, diags: &mut Diagnostics) -> Self {
        for platform in PLATFORMS {
            if let Some(slot) = self.platform_mut(platform) {
                let prior = std::mem::take(slot);
                *slot = refresh_categories(
                    prior,
                    remote.platform(platform),
                    diags,
                    app_settings_path().attribute(*platform),
                );
            }
        }
        self
    }
}

fn refresh_categories<'a>(
    prior: Categories<'a>,
    remote: &[CategoryDto],
    diags: &mut Diagnostics,
    path: AttributePath,
) -> Categories<'a> {
    if remote.is_empty() {
        return match prior {
            Value::Value(_) => Value::Value(vec![]),
            _ => Value::Null,
        };
    }
    // refresh is called once per output element, in output order
    let mut position = 0i64;
    let categories = reconcile(
        prior.unwrap_or_default(),
        remote,
        |prior: &Value<CategorySettings<'a>>| {
            prior
                .as_ref_option()
                .and_then(|c| c.category.as_deref_option())
                .map(str::to_owned)
        },
        |remote: &CategoryDto| remote.category.clone(),
        |prior, remote| {
            let path = path.clone().index(position);
            position += 1;
            let prior = match prior {
                Some(Value::Value(prior)) => prior,
                _ => Default::default(),
            };
            Value::Value(prior.refresh(remote, diags, path))
        },
    );
    Value::Value(categories)
}

impl<'a> CategorySettings<'a> {
    fn refresh(self, remote: &CategoryDto, diags: &mut Diagnostics, path: AttributePath) -> Self {
        let mut position = 0i64;
        let settings = reconcile(
            self.settings.unwrap_or_default(),
            &remote.settings,
            |prior: &Value<Setting<'a>>| {
                prior
                    .as_ref_option()
                    .and_then(|s| s.name.as_deref_option())
                    .map(str::to_lowercase)
            },
            |remote: &SettingDto| remote.name.to_lowercase(),
            |prior, remote| {
                let path = path.clone().attribute("settings").index(position);
                position += 1;
                match prior {
                    Some(Value::Value(prior)) if prior.matches(remote) => Value::Value(prior),
                    _ => Value::Value(Setting::from_remote(remote, diags, path)),
                }
            },
        );
        Self {
            category: string_value(remote.category.clone()),
            user_override: Value::Value(remote.user_override),
            settings: Value::Value(settings),
        }
    }

    fn to_dto(&self) -> CategoryDto {
        CategoryDto::new(
            str_of(&self.category).to_owned(),
            self.user_override
                .as_ref_option()
                .copied()
                .unwrap_or_default(),
            self.settings
                .iter()
                .flatten()
                .filter_map(Value::as_ref_option)
                .map(|setting| SettingDto {
                    name: str_of(&setting.name).to_owned(),
                    value: setting
                        .value()
                        .map_or(serde_json::Value::Null, |v| v.to_json()),
                })
                .collect(),
        )
    }
}

impl<'a> Setting<'a> {
    fn from_remote(remote: &SettingDto, diags: &mut Diagnostics, path: AttributePath) -> Self {
        let (value_string, value_list) = match SettingValue::decode(&remote.value) {
            Ok(SettingValue::String(s)) => (Value::Value(s.into()), Value::Null),
            Ok(SettingValue::List(items)) => (
                Value::Null,
                Value::Value(items.into_iter().map(|i| Value::Value(i.into())).collect()),
            ),
            Err(err) => {
                diags.error(
                    "Unsupported setting value",
                    format!("Setting `{}`: {}.", remote.name, err),
                    path,
                );
                (Value::Null, Value::Null)
            }
        };
        Self {
            name: string_value(remote.name.clone()),
            value_string,
            value_list,
        }
    }

    /// Same value as the remote setting, whatever the spelling of its name
    fn matches(&self, remote: &SettingDto) -> bool {
        let same_name = self
            .name
            .as_deref_option()
            .is_some_and(|name| name.eq_ignore_ascii_case(&remote.name));
        let decoded = SettingValue::decode(&remote.value).ok();
        same_name && decoded.is_some() && self.value() == decoded
    }

    /// Known value of the setting
    fn value(&self) -> Option<SettingValue> {
        if let Some(s) = self.value_string.as_deref_option() {
            return Some(SettingValue::String(s.to_owned()));
        }
        self.value_list.as_ref_option().map(|items| {
            SettingValue::List(
                items
                    .iter()
                    .filter_map(|item| item.as_deref_option().map(str::to_owned))
                    .collect(),
            )
        })
    }
}

impl<'a> WithValidate for GacSettingsState<'a> {
    fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        let url_path = attr_path.clone().attribute("service_url");
        require_non_empty(diags, &self.service_url, "service_url", url_path.clone());
        if let Some(service_url) = self.service_url.as_deref_option() {
            if !service_url.is_empty() && url::Url::parse(service_url).is_err() {
                diags.error(
                    "Invalid `service_url`",
                    format!("`{}` is not a valid url.", service_url),
                    url_path,
                );
            }
        }
        require_non_empty(diags, &self.name, "name", attr_path.clone().attribute("name"));

        let Value::Value(app) = &self.app_settings else {
            return;
        };
        for platform in PLATFORMS {
            let Some(Value::Value(categories)) = app.platform(platform) else {
                continue;
            };
            let path = attr_path
                .clone()
                .attribute("app_settings")
                .index(0)
                .attribute(*platform);
            let mut seen = Vec::new();
            for (i, category) in categories.iter().enumerate() {
                let Value::Value(category) = category else {
                    continue;
                };
                let path = path.clone().index(i as i64);
                require_non_empty(
                    diags,
                    &category.category,
                    "category",
                    path.clone().attribute("category"),
                );
                if let Some(name) = category.category.as_deref_option() {
                    if seen.contains(&name) {
                        diags.error_short(
                            "Category configured twice",
                            path.clone().attribute("category"),
                        );
                    } else {
                        seen.push(name);
                    }
                }
                category.validate(diags, path);
            }
        }
    }
}

impl<'a> WithValidate for CategorySettings<'a> {
    fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        let mut seen = Vec::new();
        for (i, setting) in self.settings.iter().flatten().enumerate() {
            let Value::Value(setting) = setting else {
                continue;
            };
            let path = attr_path.clone().attribute("settings").index(i as i64);
            require_non_empty(diags, &setting.name, "name", path.clone().attribute("name"));
            if let Some(name) = setting.name.as_deref_option().map(str::to_lowercase) {
                if seen.contains(&name) {
                    diags.error_short("Setting configured twice", path.clone().attribute("name"));
                } else {
                    seen.push(name);
                }
            }
            match (setting.value_string.is_null(), setting.value_list.is_null()) {
                (true, true) => diags.error(
                    "Missing setting value",
                    "One of `value_string` or `value_list` must be set.",
                    path,
                ),
                (false, false) => diags.error(
                    "Conflicting setting values",
                    "Only one of `value_string` or `value_list` can be set.",
                    path,
                ),
                _ => (),
            }
        }
    }
}

fn category_block(platform: &str) -> Block {
    Block {
        attributes: map! {
            "category" => Attribute {
                attr_type: AttributeType::String,
                description: Description::plain("Name of the settings category"),
                constraint: AttributeConstraint::Required,
                ..Default::default()
            },
            "user_override" => Attribute {
                attr_type: AttributeType::Bool,
                description: Description::plain("Whether users can override the settings"),
                constraint: AttributeConstraint::Required,
                ..Default::default()
            },
        },
        blocks: map! {
            "settings" => NestedBlock::List(Block {
                attributes: map! {
                    "name" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("Name of the setting"),
                        constraint: AttributeConstraint::Required,
                        ..Default::default()
                    },
                    "value_string" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("Value of a string setting"),
                        constraint: AttributeConstraint::Optional,
                        ..Default::default()
                    },
                    "value_list" => Attribute {
                        attr_type: AttributeType::List(AttributeType::String.into()),
                        description: Description::plain("Value of a list setting"),
                        constraint: AttributeConstraint::Optional,
                        ..Default::default()
                    },
                },
                description: Description::plain("Settings of the category"),
                ..Default::default()
            }),
        },
        description: Description::plain(format!("Setting categories for {} clients", platform)),
        ..Default::default()
    }
}

impl<'a> WithSchema for GacSettingsState<'a> {
    fn schema() -> Schema {
        Schema {
            version: 1,
            block: Block {
                version: 1,
                attributes: map! {
                    "id" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("Service url of the settings"),
                        constraint: AttributeConstraint::Computed,
                        ..Default::default()
                    },
                    "service_url" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("Url of the StoreFront or Workspace service the settings apply to"),
                        constraint: AttributeConstraint::Required,
                        ..Default::default()
                    },
                    "name" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("Name of the settings configuration"),
                        constraint: AttributeConstraint::Required,
                        ..Default::default()
                    },
                    "description" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("Description of the settings configuration"),
                        constraint: AttributeConstraint::Optional,
                        ..Default::default()
                    },
                    "use_for_app_config" => Attribute {
                        attr_type: AttributeType::Bool,
                        description: Description::plain("Whether the settings are published to Workspace app"),
                        constraint: AttributeConstraint::OptionalComputed,
                        ..Default::default()
                    },
                },
                blocks: map! {
                    "app_settings" => NestedBlock::Optional(Block {
                        blocks: PLATFORMS
                            .iter()
                            .map(|platform| ((*platform).to_owned(), NestedBlock::List(category_block(platform))))
                            .collect(),
                        description: Description::plain("Settings per client platform"),
                        ..Default::default()
                    }),
                },
                description: Description::plain("Manages Workspace app settings of a service url"),
                ..Default::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn setting(name: &str, value: &str) -> Value<Setting<'static>> {
        Value::Value(Setting {
            name: ValueString::from(name.to_owned()),
            value_string: ValueString::from(value.to_owned()),
            value_list: Value::Null,
        })
    }

    fn category(name: &str, settings: Vec<Value<Setting<'static>>>) -> Value<CategorySettings<'static>> {
        Value::Value(CategorySettings {
            category: ValueString::from(name.to_owned()),
            user_override: Value::Value(false),
            settings: Value::Value(settings),
        })
    }

    fn remote(windows: serde_json::Value) -> ConfigurationDto {
        serde_json::from_value(json!({
            "serviceURL": {"url": "https://store.example.com"},
            "settings": {
                "name": "corp",
                "appSettings": {"windows": windows},
            },
        }))
        .unwrap()
    }

    #[test]
    fn refresh_keeps_the_configured_order() {
        let prior = GacSettingsState {
            app_settings: Value::Value(AppSettings {
                windows: Value::Value(vec![
                    category("Self Service", vec![setting("b", "1"), setting("a", "2")]),
                    category("ICA", vec![]),
                ]),
                ..Default::default()
            }),
            ..Default::default()
        };
        let remote = remote(json!([
            {"category": "ICA", "userOverride": true, "settings": [{"name": "x", "value": ["p", "q"]}]},
            {"category": "Self Service", "settings": [
                {"name": "a", "value": "2"},
                {"name": "c", "value": "3"},
                {"name": "b", "value": "1"},
            ]},
        ]));
        let mut diags = Diagnostics::default();

        let state = prior.refresh(&remote, &mut diags);
        assert!(diags.errors.is_empty());
        let app = state.app_settings.as_ref_option().unwrap();
        let windows = app.windows.as_ref_option().unwrap();
        let self_service = windows[0].as_ref_option().unwrap();
        assert_eq!(self_service.category, ValueString::from("Self Service"));
        assert_eq!(
            self_service.settings,
            Value::Value(vec![setting("b", "1"), setting("a", "2"), setting("c", "3")])
        );
        let ica = windows[1].as_ref_option().unwrap();
        assert_eq!(ica.user_override, Value::Value(true));
        let x = ica.settings.as_ref_option().unwrap()[0].as_ref_option().unwrap();
        assert!(x.value_string.is_null());
        assert_eq!(
            x.value_list,
            Value::Value(vec![ValueString::from("p"), ValueString::from("q")])
        );
        assert!(app.ios.is_null());

        let mut diags = Diagnostics::default();
        let again = state.clone().refresh(&remote, &mut diags);
        assert_eq!(again, state);
    }

    #[test]
    fn unchanged_settings_keep_their_configured_form() {
        let prior = GacSettingsState {
            app_settings: Value::Value(AppSettings {
                windows: Value::Value(vec![category(
                    "ICA",
                    vec![
                        setting("AutoStart", "true"),
                        Value::Value(Setting {
                            name: ValueString::from("Stores"),
                            value_string: Value::Null,
                            value_list: Value::Value(vec![ValueString::from("a")]),
                        }),
                        setting("Timeout", "30"),
                    ],
                )]),
                ..Default::default()
            }),
            ..Default::default()
        };
        let remote = remote(json!([
            {"category": "ICA", "settings": [
                {"name": "autostart", "value": "true"},
                {"name": "stores", "value": ["a"]},
                {"name": "Timeout", "value": "60"},
            ]},
        ]));
        let mut diags = Diagnostics::default();

        let state = prior.refresh(&remote, &mut diags);
        assert!(diags.errors.is_empty());
        let app = state.app_settings.as_ref_option().unwrap();
        let ica = app.windows.as_ref_option().unwrap()[0].as_ref_option().unwrap();
        let settings = ica.settings.as_ref_option().unwrap();
        assert_eq!(settings[0], setting("AutoStart", "true"));
        assert_eq!(
            settings[1].as_ref_option().unwrap().name,
            ValueString::from("Stores")
        );
        assert_eq!(settings[2], setting("Timeout", "60"));
    }

    #[test]
    fn unsupported_values_are_reported_at_their_path() {
        let remote = remote(json!([
            {"category": "ICA", "settings": [
                {"name": "ok", "value": "1"},
                {"name": "bad", "value": {"nested": true}},
            ]},
        ]));
        let mut diags = Diagnostics::default();

        GacSettingsState::default().refresh(&remote, &mut diags);
        assert_eq!(diags.errors.len(), 1);
        assert_eq!(
            diags.errors[0].attribute,
            app_settings_path()
                .attribute("windows")
                .index(0)
                .attribute("settings")
                .index(1)
        );
        assert!(diags.errors[0].detail.contains("an object"));
    }

    #[test]
    fn settings_need_exactly_one_value() {
        let state = GacSettingsState {
            service_url: ValueString::from("https://store.example.com"),
            name: ValueString::from("corp"),
            app_settings: Value::Value(AppSettings {
                macos: Value::Value(vec![category(
                    "ICA",
                    vec![Value::Value(Setting {
                        name: ValueString::from("empty"),
                        ..Default::default()
                    })],
                )]),
                ..Default::default()
            }),
            ..Default::default()
        };
        let mut diags = Diagnostics::default();
        state.validate(&mut diags, AttributePath::default());
        assert_eq!(diags.errors.len(), 1);
        assert_eq!(
            diags.errors[0].attribute,
            app_settings_path()
                .attribute("macos")
                .index(0)
                .attribute("settings")
                .index(0)
        );
    }

    #[test]
    fn body_carries_setting_values() {
        let state = GacSettingsState {
            service_url: ValueString::from("https://store.example.com"),
            name: ValueString::from("corp"),
            app_settings: Value::Value(AppSettings {
                html5: Value::Value(vec![category("ICA", vec![setting("Hide", "true")])]),
                ..Default::default()
            }),
            ..Default::default()
        };
        let body = serde_json::to_value(state.to_dto()).unwrap();
        assert_eq!(body["serviceURL"]["url"], "https://store.example.com");
        let html5 = &body["settings"]["appSettings"]["html5"][0];
        assert_eq!(html5["category"], "ICA");
        assert_eq!(html5["assignedTo"], json!(["AllUsersNoAuthentication"]));
        assert_eq!(html5["settings"][0], json!({"name": "Hide", "value": "true"}));
        assert_eq!(body["settings"]["appSettings"]["windows"], json!([]));
    }
}
