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

use async_trait::async_trait;
use serde::Deserialize;
use tf_provider::schema::Schema;
use tf_provider::value::{ValueEmpty, ValueString};
use tf_provider::{AttributePath, Diagnostics, Resource};
use tracing::info;

use crate::client::{ApiPath, CitrixClient, ClientSlot, Method};
use crate::utils::{report, str_of, warn_removed, WithSchema, WithValidate};

use super::state::GacSettingsState;
use super::{configuration_path, ConfigurationDto};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigurationList {
    items: Vec<ConfigurationDto>,
}

/// `citrix_gac_settings`
#[derive(Debug, Default)]
pub struct GacSettingsResource {
    client: ClientSlot,
}

impl GacSettingsResource {
    pub fn new(client: ClientSlot) -> Self {
        Self { client }
    }

    async fn fetch(
        client: &CitrixClient,
        diags: &mut Diagnostics,
        service_url: &str,
    ) -> Option<Option<ConfigurationDto>> {
        match client
            .get_optional::<ConfigurationList>(&configuration_path(service_url))
            .await
        {
            Ok(list) => Some(list.and_then(|list| list.items.into_iter().next())),
            Err(err) => {
                report(
                    diags,
                    format!("Error reading settings of {}", service_url),
                    &err,
                );
                None
            }
        }
    }

    /// Refresh, failing when a remote value could not be decoded
    fn refreshed<'a>(
        diags: &mut Diagnostics,
        state: GacSettingsState<'a>,
        remote: &ConfigurationDto,
    ) -> Option<GacSettingsState<'a>> {
        let errors = diags.errors.len();
        let state = state.refresh(remote, diags);
        if diags.errors.len() > errors {
            None
        } else {
            Some(state)
        }
    }
}

#[async_trait]
impl Resource for GacSettingsResource {
    type State<'a> = GacSettingsState<'a>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(GacSettingsState::schema())
    }

    async fn validate<'a>(&self, diags: &mut Diagnostics, config: Self::State<'a>) -> Option<()> {
        config.validate(diags, Default::default());
        if diags.errors.is_empty() {
            Some(())
        } else {
            None
        }
    }

    async fn read<'a>(
        &self,
        diags: &mut Diagnostics,
        state: Self::State<'a>,
        private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let client = self.client.get(diags).await?;
        let service_url = str_of(&state.service_url).to_owned();
        match Self::fetch(&client, diags, &service_url).await? {
            Some(remote) => Some((Self::refreshed(diags, state, &remote)?, private_state)),
            None => {
                warn_removed(diags, "Settings of service url", &service_url);
                None
            }
        }
    }

    async fn plan_create<'a>(
        &self,
        _diags: &mut Diagnostics,
        proposed_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let mut state = proposed_state;
        state.id = state.service_url.clone();
        Some((state, Default::default()))
    }

    async fn plan_update<'a>(
        &self,
        _diags: &mut Diagnostics,
        prior_state: Self::State<'a>,
        proposed_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        prior_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>, Vec<AttributePath>)> {
        let mut trigger_replace = Vec::new();
        if prior_state.service_url != proposed_state.service_url {
            trigger_replace.push(AttributePath::new("service_url"));
        }
        let mut state = proposed_state;
        state.id = state.service_url.clone();
        Some((state, prior_private_state, trigger_replace))
    }

    async fn plan_destroy<'a>(
        &self,
        _diags: &mut Diagnostics,
        _prior_state: Self::State<'a>,
        prior_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<Self::PrivateState<'a>> {
        Some(prior_private_state)
    }

    async fn create<'a>(
        &self,
        diags: &mut Diagnostics,
        planned_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        planned_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        planned_state.validate(diags, Default::default());
        if !diags.errors.is_empty() {
            return None;
        }
        let client = self.client.get(diags).await?;
        let service_url = str_of(&planned_state.service_url).to_owned();
        info!(service_url = service_url.as_str(), "creating app settings");

        if let Err(err) = client
            .execute(
                Method::Post,
                &ApiPath::app_config().segment("configurations"),
                Some(&planned_state.to_dto()),
            )
            .await
        {
            report(
                diags,
                format!("Error creating settings of {}", service_url),
                &err,
            );
            return None;
        }
        match Self::fetch(&client, diags, &service_url).await? {
            Some(remote) => Some((
                Self::refreshed(diags, planned_state, &remote)?,
                planned_private_state,
            )),
            None => {
                diags.root_error(
                    "Error creating settings",
                    format!("Settings of `{}` are missing after their creation.", service_url),
                );
                None
            }
        }
    }

    async fn update<'a>(
        &self,
        diags: &mut Diagnostics,
        _prior_state: Self::State<'a>,
        planned_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        planned_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        planned_state.validate(diags, Default::default());
        if !diags.errors.is_empty() {
            return None;
        }
        let client = self.client.get(diags).await?;
        let service_url = str_of(&planned_state.service_url).to_owned();
        info!(service_url = service_url.as_str(), "updating app settings");

        if let Err(err) = client
            .execute(
                Method::Put,
                &configuration_path(&service_url),
                Some(&planned_state.to_dto()),
            )
            .await
        {
            report(
                diags,
                format!("Error updating settings of {}", service_url),
                &err,
            );
            return None;
        }
        match Self::fetch(&client, diags, &service_url).await? {
            Some(remote) => Some((
                Self::refreshed(diags, planned_state, &remote)?,
                planned_private_state,
            )),
            None => {
                diags.root_error(
                    "Error updating settings",
                    format!("Settings of `{}` disappeared during their update.", service_url),
                );
                None
            }
        }
    }

    async fn destroy<'a>(
        &self,
        diags: &mut Diagnostics,
        prior_state: Self::State<'a>,
        _planned_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<()> {
        let client = self.client.get(diags).await?;
        let service_url = str_of(&prior_state.service_url).to_owned();
        match client.delete(&configuration_path(&service_url)).await {
            Ok(()) => Some(()),
            Err(err) if err.is_not_found() => Some(()),
            Err(err) => {
                report(
                    diags,
                    format!("Error deleting settings of {}", service_url),
                    &err,
                );
                None
            }
        }
    }

    async fn import<'a>(
        &self,
        diags: &mut Diagnostics,
        id: String,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let client = self.client.get(diags).await?;
        let Some(remote) = Self::fetch(&client, diags, &id).await? else {
            diags.root_error(
                "Cannot import settings",
                format!("No settings exist for service url `{}`.", id),
            );
            return None;
        };
        let state = GacSettingsState {
            service_url: ValueString::from(id),
            ..Default::default()
        };
        Some((Self::refreshed(diags, state, &remote)?, Default::default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::testing::{test_client, FakeTransport};
    use serde_json::json;

    async fn resource(transport: &FakeTransport) -> GacSettingsResource {
        let slot = ClientSlot::default();
        slot.set(test_client(transport)).await;
        GacSettingsResource::new(slot)
    }

    #[tokio::test]
    async fn read_fails_loudly_on_unsupported_values() {
        let transport = FakeTransport::new();
        transport.push_json(
            Method::Get,
            "/configurations/serviceURL/",
            200,
            json!({"items": [{
                "serviceURL": {"url": "https://store.example.com"},
                "settings": {
                    "name": "corp",
                    "appSettings": {"ios": [{
                        "category": "ICA",
                        "settings": [{"name": "Timeout", "value": 30}],
                    }]},
                },
            }]}),
        );
        let resource = resource(&transport).await;
        let mut diags = Diagnostics::default();
        let state = GacSettingsState {
            service_url: ValueString::from("https://store.example.com"),
            ..Default::default()
        };

        let result = resource
            .read(&mut diags, state, Default::default(), Default::default())
            .await;
        assert!(result.is_none());
        assert_eq!(diags.errors.len(), 1);
        assert!(diags.errors[0].detail.contains("Timeout"));
    }

    #[tokio::test]
    async fn missing_configuration_is_dropped() {
        let transport = FakeTransport::new();
        transport.push_json(
            Method::Get,
            "/configurations/serviceURL/",
            200,
            json!({"items": []}),
        );
        let resource = resource(&transport).await;
        let mut diags = Diagnostics::default();
        let state = GacSettingsState {
            service_url: ValueString::from("https://store.example.com"),
            ..Default::default()
        };

        let result = resource
            .read(&mut diags, state, Default::default(), Default::default())
            .await;
        assert!(result.is_none());
        assert!(diags.errors.is_empty());
        assert_eq!(diags.warnings.len(), 1);
    }

    #[tokio::test]
    async fn url_is_base64_encoded_in_the_path() {
        let transport = FakeTransport::new();
        transport.push_empty(Method::Delete, "/configurations/serviceURL/");
        let resource = resource(&transport).await;
        let mut diags = Diagnostics::default();
        let state = GacSettingsState {
            service_url: ValueString::from("https://a.example.com"),
            ..Default::default()
        };

        resource
            .destroy(&mut diags, state, Default::default(), Default::default())
            .await
            .unwrap();
        let url = &transport.requests()[0].url;
        assert!(
            url.ends_with("/configurations/serviceURL/aHR0cHM6Ly9hLmV4YW1wbGUuY29t"),
            "{}",
            url
        );
    }
}
