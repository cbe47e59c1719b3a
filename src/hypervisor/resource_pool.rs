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
use crate::resolver::ResourceResolver;
use crate::utils::{parse_import_id, report, require_non_empty, str_of, warn_removed, WithSchema};

use super::state::ResourcePoolState;
use super::{HypervisorKind, ResourcePoolDto};

/// `citrix_<kind>_hypervisor_resource_pool`
#[derive(Debug, Default)]
pub struct ResourcePoolResource<K: HypervisorKind> {
    client: ClientSlot,
    kind: PhantomData<K>,
}

impl<K: HypervisorKind> ResourcePoolResource<K> {
    pub fn new(client: ClientSlot) -> Self {
        Self {
            client,
            kind: PhantomData,
        }
    }

    fn check(diags: &mut Diagnostics, state: &ResourcePoolState<'_, K>) {
        require_non_empty(diags, &state.name, "name", AttributePath::new("name"));
        require_non_empty(
            diags,
            &state.hypervisor,
            "hypervisor",
            AttributePath::new("hypervisor"),
        );
        K::validate_pool(diags, &state.pool);
    }

    fn pools(hypervisor: &str) -> ApiPath {
        ApiPath::orchestration()
            .segment("hypervisors")
            .segment(hypervisor)
            .segment("resourcePools")
    }

    async fn fetch(
        client: &CitrixClient,
        diags: &mut Diagnostics,
        hypervisor: &str,
        pool: &str,
    ) -> Option<Option<ResourcePoolDto>> {
        match client
            .get_optional(&Self::pools(hypervisor).segment(pool))
            .await
        {
            Ok(remote) => Some(remote),
            Err(err) => {
                report(diags, format!("Error reading resource pool {}", pool), &err);
                None
            }
        }
    }

    /// Resolve the network names of the pool into the request body
    async fn body(
        client: &CitrixClient,
        diags: &mut Diagnostics,
        state: &ResourcePoolState<'_, K>,
    ) -> Option<Map<String, Json>> {
        let hypervisor = str_of(&state.hypervisor);
        let resolver = ResourceResolver::for_hypervisor(client, hypervisor);
        match K::pool_body(&resolver, &state.pool).await {
            Ok(mut body) => {
                body.insert("Name".into(), json!(str_of(&state.name)));
                Some(body)
            }
            Err(err) => {
                report(
                    diags,
                    format!("Error resolving the network of resource pool {}", str_of(&state.name)),
                    &err,
                );
                None
            }
        }
    }
}

#[async_trait]
impl<K: HypervisorKind> Resource for ResourcePoolResource<K> {
    type State<'a> = ResourcePoolState<'a, K>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(ResourcePoolState::<K>::schema())
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
        let hypervisor = str_of(&state.hypervisor).to_owned();
        let id = str_of(&state.id).to_owned();
        match Self::fetch(&client, diags, &hypervisor, &id).await? {
            Some(remote) => Some((state.refresh(&remote), private_state)),
            None => {
                warn_removed(diags, "Resource pool", &id);
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
        if prior_state.hypervisor != proposed_state.hypervisor {
            trigger_replace.push(AttributePath::new("hypervisor"));
        }
        trigger_replace.extend(K::pool_replacements(&prior_state.pool, &proposed_state.pool));

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
        let hypervisor = str_of(&planned_state.hypervisor).to_owned();
        let name = str_of(&planned_state.name).to_owned();

        let mut body = Self::body(&client, diags, &planned_state).await?;
        body.insert("ConnectionType".into(), json!(K::CONNECTION_TYPE));
        info!(
            kind = K::NAME,
            hypervisor = hypervisor.as_str(),
            name = name.as_str(),
            "creating resource pool"
        );

        if let Err(err) = submit_and_wait(
            &client,
            Method::Post,
            &Self::pools(&hypervisor),
            Some(&Json::Object(body)),
            JobBudget::RESOURCE_POOL,
        )
        .await
        {
            report(diags, format!("Error creating resource pool {}", name), &err);
            return None;
        }

        match Self::fetch(&client, diags, &hypervisor, &name).await? {
            Some(remote) => Some((planned_state.refresh(&remote), planned_private_state)),
            None => {
                diags.root_error(
                    "Error creating resource pool",
                    format!("Resource pool `{}` was not found after its creation.", name),
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
        let hypervisor = str_of(&prior_state.hypervisor).to_owned();
        let id = str_of(&prior_state.id).to_owned();

        // Only the name and the subnets can change in place
        let resolved = Self::body(&client, diags, &planned_state).await?;
        let mut body = Map::new();
        body.insert("Name".into(), json!(str_of(&planned_state.name)));
        if let Some(subnets) = resolved.get("Subnets") {
            body.insert("Subnets".into(), subnets.clone());
        }
        info!(kind = K::NAME, id = id.as_str(), "updating resource pool");

        if let Err(err) = submit_and_wait(
            &client,
            Method::Patch,
            &Self::pools(&hypervisor).segment(&id),
            Some(&Json::Object(body)),
            JobBudget::RESOURCE_POOL,
        )
        .await
        {
            report(diags, format!("Error updating resource pool {}", id), &err);
            return None;
        }

        match Self::fetch(&client, diags, &hypervisor, &id).await? {
            Some(remote) => Some((planned_state.refresh(&remote), planned_private_state)),
            None => {
                diags.root_error(
                    "Error updating resource pool",
                    format!("Resource pool `{}` disappeared during its update.", id),
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
        let hypervisor = str_of(&prior_state.hypervisor).to_owned();
        let id = str_of(&prior_state.id).to_owned();
        info!(kind = K::NAME, id = id.as_str(), "deleting resource pool");

        match submit_and_wait::<()>(
            &client,
            Method::Delete,
            &Self::pools(&hypervisor).segment(&id),
            None,
            JobBudget::RESOURCE_POOL,
        )
        .await
        {
            Ok(_) => Some(()),
            Err(JobError::Api(err)) if err.is_not_found() => Some(()),
            Err(err) => {
                report(diags, format!("Error deleting resource pool {}", id), &err);
                None
            }
        }
    }

    async fn import<'a>(
        &self,
        diags: &mut Diagnostics,
        id: String,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let (hypervisor, pool) = parse_import_id(diags, &id, "hypervisorId,resourcePoolId")?;
        let client = self.client.get(diags).await?;
        let Some(remote) = Self::fetch(&client, diags, &hypervisor, &pool).await? else {
            diags.root_error(
                "Cannot import resource pool",
                format!(
                    "Resource pool `{}` does not exist on hypervisor `{}`.",
                    pool, hypervisor
                ),
            );
            return None;
        };
        if !remote.connection_type.is_empty()
            && !remote.connection_type.eq_ignore_ascii_case(K::CONNECTION_TYPE)
        {
            diags.root_error(
                "Cannot import resource pool",
                format!(
                    "Resource pool `{}` belongs to a `{}` hypervisor, not a `{}` one.",
                    pool,
                    remote.connection_type,
                    K::CONNECTION_TYPE
                ),
            );
            return None;
        }
        let state = ResourcePoolState::<K> {
            id: Value::Value(pool.into()),
            hypervisor: Value::Value(hypervisor.into()),
            ..Default::default()
        };
        Some((state.refresh(&remote), Default::default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::testing::{test_client, FakeTransport};
    use crate::client::transport::RequestBody;
    use crate::hypervisor::aws::AwsPool;
    use crate::hypervisor::Aws;
    use tf_provider::value::ValueList;

    async fn resource(transport: &FakeTransport) -> ResourcePoolResource<Aws> {
        let slot = ClientSlot::default();
        slot.set(test_client(transport)).await;
        ResourcePoolResource::new(slot)
    }

    fn planned() -> ResourcePoolState<'static, Aws> {
        ResourcePoolState {
            id: ValueString::Unknown,
            name: ValueString::from("pool"),
            hypervisor: ValueString::from("hyp-1"),
            pool: AwsPool {
                vpc: ValueString::from("main-vpc"),
                availability_zone: ValueString::from("eu-west-3a"),
                subnets: ValueList::Value(vec![ValueString::from("10.0.1.0/24")]),
            },
        }
    }

    #[tokio::test]
    async fn import_rejects_malformed_identifier() {
        let transport = FakeTransport::new();
        let resource = resource(&transport).await;
        let mut diags = Diagnostics::default();

        let result = resource.import(&mut diags, "only-one-part".into()).await;
        assert!(result.is_none());
        assert_eq!(diags.errors[0].summary, "Invalid import identifier");
        assert!(diags.errors[0].detail.contains("hypervisorId,resourcePoolId"));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn create_resolves_network_names() {
        let transport = FakeTransport::new();
        transport.push_json(
            Method::Get,
            "allResources?path=&children=1",
            200,
            serde_json::json!({"Children": [
                {"Name": "main-vpc", "ResourceType": "VirtualPrivateCloud", "FullRelativePath": "main-vpc.virtualprivatecloud", "XDPath": "XDHyp:\\vpc"},
            ]}),
        );
        transport.push_json(
            Method::Get,
            "path=main-vpc.virtualprivatecloud&children=1",
            200,
            serde_json::json!({"Children": [
                {"Name": "eu-west-3a", "ResourceType": "AvailabilityZone", "FullRelativePath": "main-vpc.virtualprivatecloud/eu-west-3a.availabilityzone", "XDPath": "XDHyp:\\az"},
            ]}),
        );
        transport.push_json(
            Method::Get,
            "eu-west-3a.availabilityzone&children=1",
            200,
            serde_json::json!({"Children": [
                {"Name": "10.0.1.0/24", "ResourceType": "Network", "XDPath": "XDHyp:\\subnet"},
            ]}),
        );
        transport.push_job(Method::Post, "/resourcePools?async=true", "job-1");
        transport.push_json(
            Method::Get,
            "/resourcePools/pool",
            200,
            serde_json::json!({
                "Id": "pool-1",
                "Name": "pool",
                "Hypervisor": {"Id": "hyp-1"},
                "VirtualPrivateCloud": {"Name": "main-vpc"},
                "AvailabilityZone": {"Name": "eu-west-3a"},
                "Subnets": [{"Name": "10.0.1.0/24"}],
            }),
        );
        let resource = resource(&transport).await;
        let mut diags = Diagnostics::default();

        let (state, _) = resource
            .create(
                &mut diags,
                planned(),
                planned(),
                Default::default(),
                Default::default(),
            )
            .await
            .unwrap();
        assert!(diags.errors.is_empty());
        assert_eq!(state.id, ValueString::from("pool-1"));
        assert_eq!(state.pool, planned().pool);
        assert_eq!(transport.remaining(), 0);

        let post = &transport.requests_with(Method::Post)[0];
        let Some(RequestBody::Json(body)) = &post.body else {
            panic!("missing body");
        };
        assert_eq!(body["VirtualPrivateCloud"], "XDHyp:\\vpc");
        assert_eq!(body["Subnets"], serde_json::json!(["XDHyp:\\subnet"]));
        assert_eq!(body["ConnectionType"], "AWS");
    }

    #[tokio::test]
    async fn moving_to_another_hypervisor_forces_replacement() {
        let transport = FakeTransport::new();
        let resource = resource(&transport).await;
        let mut diags = Diagnostics::default();
        let prior = ResourcePoolState {
            id: ValueString::from("pool-1"),
            ..planned()
        };
        let proposed = ResourcePoolState {
            hypervisor: ValueString::from("hyp-2"),
            ..prior.clone()
        };

        let (_, _, replace) = resource
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
        assert_eq!(replace, vec![AttributePath::new("hypervisor")]);
    }
}
