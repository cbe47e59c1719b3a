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

use std::marker::PhantomData;

use async_trait::async_trait;
use serde_json::{json, Map, Value as Json};
use tf_provider::schema::Schema;
use tf_provider::value::{Value, ValueEmpty, ValueString};
use tf_provider::{AttributePath, Diagnostics, Resource};
use tracing::info;

use crate::client::{ApiPath, CitrixClient, ClientSlot, Method};
use crate::jobs::{submit_and_wait, JobBudget, JobError};
use crate::utils::{report, require_non_empty, str_of, warn_removed, WithSchema};

use super::state::HypervisorState;
use super::{HypervisorDto, HypervisorKind};

/// `citrix_<kind>_hypervisor`
#[derive(Debug, Default)]
pub struct HypervisorResource<K: HypervisorKind> {
    client: ClientSlot,
    kind: PhantomData<K>,
}

impl<K: HypervisorKind> HypervisorResource<K> {
    pub fn new(client: ClientSlot) -> Self {
        Self {
            client,
            kind: PhantomData,
        }
    }

    fn check(diags: &mut Diagnostics, state: &HypervisorState<'_, K>) {
        require_non_empty(diags, &state.name, "name", AttributePath::new("name"));
        require_non_empty(diags, &state.zone, "zone", AttributePath::new("zone"));
        K::validate_connection(diags, &state.connection);
    }

    fn body(state: &HypervisorState<'_, K>) -> Map<String, Json> {
        let mut body = K::connection_body(&state.connection);
        body.insert("ConnectionType".into(), json!(K::CONNECTION_TYPE));
        body.insert("Name".into(), json!(str_of(&state.name)));
        body
    }

    fn path(id: &str) -> ApiPath {
        ApiPath::orchestration().segment("hypervisors").segment(id)
    }

    /// Fetch the canonical hypervisor, `None` when it does not exist
    async fn fetch(
        client: &CitrixClient,
        diags: &mut Diagnostics,
        id: &str,
    ) -> Option<Option<HypervisorDto>> {
        match client.get_optional(&Self::path(id)).await {
            Ok(remote) => Some(remote),
            Err(err) => {
                report(diags, format!("Error reading hypervisor {}", id), &err);
                None
            }
        }
    }
}

#[async_trait]
impl<K: HypervisorKind> Resource for HypervisorResource<K> {
    type State<'a> = HypervisorState<'a, K>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(HypervisorState::<K>::schema())
    }

    async fn validate<'a>(&self, diags: &mut Diagnostics, config: Self::State<'a>) -> Option<()> {
        Self::check(diags, &config);

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
        let id = str_of(&state.id).to_owned();
        match Self::fetch(&client, diags, &id).await? {
            Some(remote) => Some((state.refresh(&remote), private_state)),
            None => {
                warn_removed(diags, "Hypervisor", &id);
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
        state.id = ValueString::Unknown;
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
        if prior_state.zone != proposed_state.zone {
            trigger_replace.push(AttributePath::new("zone"));
        }
        trigger_replace.extend(K::connection_replacements(
            &prior_state.connection,
            &proposed_state.connection,
        ));

        let mut state = proposed_state;
        state.id = if trigger_replace.is_empty() {
            prior_state.id
        } else {
            ValueString::Unknown
        };
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
        Self::check(diags, &planned_state);
        if !diags.errors.is_empty() {
            return None;
        }
        let client = self.client.get(diags).await?;

        let mut details = Self::body(&planned_state);
        details.insert("Zone".into(), json!(str_of(&planned_state.zone)));
        let body = json!({ "ConnectionDetails": details });
        let name = str_of(&planned_state.name).to_owned();
        info!(kind = K::NAME, name = name.as_str(), "creating hypervisor");

        if let Err(err) = submit_and_wait(
            &client,
            Method::Post,
            &ApiPath::orchestration().segment("hypervisors"),
            Some(&body),
            JobBudget::HYPERVISOR,
        )
        .await
        {
            report(diags, format!("Error creating hypervisor {}", name), &err);
            return None;
        }

        match Self::fetch(&client, diags, &name).await? {
            Some(remote) => Some((planned_state.refresh(&remote), planned_private_state)),
            None => {
                diags.root_error(
                    "Error creating hypervisor",
                    format!("Hypervisor `{}` was not found after its creation.", name),
                );
                None
            }
        }
    }

    async fn update<'a>(
        &self,
        diags: &mut Diagnostics,
        prior_state: Self::State<'a>,
        planned_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        planned_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        Self::check(diags, &planned_state);
        if !diags.errors.is_empty() {
            return None;
        }
        let client = self.client.get(diags).await?;
        let id = str_of(&prior_state.id).to_owned();
        info!(kind = K::NAME, id = id.as_str(), "updating hypervisor");

        let body = Json::Object(Self::body(&planned_state));
        if let Err(err) = submit_and_wait(
            &client,
            Method::Patch,
            &Self::path(&id),
            Some(&body),
            JobBudget::HYPERVISOR,
        )
        .await
        {
            report(diags, format!("Error updating hypervisor {}", id), &err);
            return None;
        }

        match Self::fetch(&client, diags, &id).await? {
            Some(remote) => Some((planned_state.refresh(&remote), planned_private_state)),
            None => {
                diags.root_error(
                    "Error updating hypervisor",
                    format!("Hypervisor `{}` disappeared during its update.", id),
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
        let id = str_of(&prior_state.id).to_owned();
        info!(kind = K::NAME, id = id.as_str(), "deleting hypervisor");

        match submit_and_wait::<()>(
            &client,
            Method::Delete,
            &Self::path(&id),
            None,
            JobBudget::HYPERVISOR,
        )
        .await
        {
            Ok(_) => Some(()),
            Err(JobError::Api(err)) if err.is_not_found() => Some(()),
            Err(err) => {
                report(diags, format!("Error deleting hypervisor {}", id), &err);
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
                "Cannot import hypervisor",
                format!("Hypervisor `{}` does not exist.", id),
            );
            return None;
        };
        if !remote.connection_type.eq_ignore_ascii_case(K::CONNECTION_TYPE) {
            diags.root_error(
                "Cannot import hypervisor",
                format!(
                    "Hypervisor `{}` is a `{}` connection, not a `{}` one.",
                    id,
                    remote.connection_type,
                    K::CONNECTION_TYPE
                ),
            );
            return None;
        }
        let state = HypervisorState::<K> {
            id: Value::Value(id.into()),
            ..Default::default()
        };
        Some((state.refresh(&remote), Default::default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::testing::{test_client, FakeTransport};
    use crate::hypervisor::azure::AzureConnection;
    use crate::hypervisor::Azure;

    async fn resource(transport: &FakeTransport) -> HypervisorResource<Azure> {
        let slot = ClientSlot::default();
        slot.set(test_client(transport)).await;
        HypervisorResource::new(slot)
    }

    fn planned(secret: &str) -> HypervisorState<'static, Azure> {
        HypervisorState {
            id: ValueString::Unknown,
            name: ValueString::from("azure-conn"),
            zone: ValueString::from("zone-1"),
            connection: AzureConnection {
                application_id: ValueString::from("app"),
                application_secret: ValueString::from(secret.to_owned()),
                application_secret_expiration_date: ValueString::Null,
                subscription_id: ValueString::from("sub"),
                active_directory_id: ValueString::from("tenant"),
            },
        }
    }

    #[tokio::test(start_paused = true)]
    async fn empty_secret_fails_before_any_request() {
        let transport = FakeTransport::new();
        let resource = resource(&transport).await;
        let mut diags = Diagnostics::default();

        let result = resource
            .create(
                &mut diags,
                planned(""),
                planned(""),
                Default::default(),
                Default::default(),
            )
            .await;
        assert!(result.is_none());
        assert_eq!(
            diags.errors[0].attribute,
            AttributePath::new("application_secret")
        );
        assert!(transport.requests().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn create_polls_then_refreshes() {
        let transport = FakeTransport::new();
        transport.push_job(Method::Post, "/hypervisors?async=true", "job-1");
        transport.push_json(
            Method::Get,
            "/hypervisors/azure-conn",
            200,
            serde_json::json!({
                "Id": "hyp-1",
                "Name": "azure-conn",
                "ConnectionType": "AzureRM",
                "Zone": {"Id": "zone-1"},
                "ApplicationId": "app",
                "SubscriptionId": "sub",
                "ActiveDirectoryId": "tenant",
            }),
        );
        let resource = resource(&transport).await;
        let mut diags = Diagnostics::default();

        let (state, _) = resource
            .create(
                &mut diags,
                planned("secret"),
                planned("secret"),
                Default::default(),
                Default::default(),
            )
            .await
            .unwrap();
        assert!(diags.errors.is_empty());
        assert_eq!(state.id, ValueString::from("hyp-1"));
        assert_eq!(
            state.connection.application_secret,
            ValueString::from("secret")
        );

        let post = &transport.requests_with(Method::Post)[0];
        match &post.body {
            Some(crate::client::transport::RequestBody::Json(body)) => {
                assert_eq!(body["ConnectionDetails"]["ConnectionType"], "AzureRM");
                assert_eq!(body["ConnectionDetails"]["Zone"], "zone-1");
            }
            other => panic!("unexpected body {:?}", other),
        }
    }

    #[tokio::test]
    async fn read_of_deleted_hypervisor_drops_state() {
        let transport = FakeTransport::new();
        transport.push_json(Method::Get, "/hypervisors/hyp-1", 404, serde_json::json!({}));
        let resource = resource(&transport).await;
        let mut diags = Diagnostics::default();

        let state = HypervisorState {
            id: ValueString::from("hyp-1"),
            ..planned("secret")
        };
        let result = resource
            .read(&mut diags, state, Default::default(), Default::default())
            .await;
        assert!(result.is_none());
        assert!(diags.errors.is_empty());
        assert_eq!(diags.warnings.len(), 1);
    }

    #[tokio::test]
    async fn zone_change_forces_replacement() {
        let transport = FakeTransport::new();
        let resource = resource(&transport).await;
        let mut diags = Diagnostics::default();
        let prior = HypervisorState {
            id: ValueString::from("hyp-1"),
            ..planned("secret")
        };
        let proposed = HypervisorState {
            zone: ValueString::from("zone-2"),
            ..prior.clone()
        };

        let (state, _, replace) = resource
            .plan_update(
                &mut diags,
                prior,
                proposed.clone(),
                proposed,
                Default::default(),
                Default::default(),
            )
            .await
            .unwrap();
        assert_eq!(replace, vec![AttributePath::new("zone")]);
        assert!(state.id.is_unknown());
    }
}
