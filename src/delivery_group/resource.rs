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
use serde_json::json;
use tf_provider::schema::Schema;
use tf_provider::value::{Value, ValueEmpty, ValueString};
use tf_provider::{AttributePath, Diagnostics, Resource};
use tracing::info;

use crate::client::{ApiPath, CitrixClient, ClientSlot, Method};
use crate::machine_catalog::{MachineCatalogDto, MachineDto};
use crate::utils::{report, str_of, warn_removed, WithSchema, WithValidate};

use super::{count_per_catalog, CatalogCount, DeliveryGroupDto, DeliveryGroupState};

/// `citrix_delivery_group`
#[derive(Debug, Default)]
pub struct DeliveryGroupResource {
    client: ClientSlot,
}

impl DeliveryGroupResource {
    pub fn new(client: ClientSlot) -> Self {
        Self { client }
    }

    fn groups() -> ApiPath {
        ApiPath::orchestration().segment("DeliveryGroups")
    }

    /// The group and its machines, `None` inside when the group does not exist
    async fn fetch(
        client: &CitrixClient,
        diags: &mut Diagnostics,
        id: &str,
    ) -> Option<Option<(DeliveryGroupDto, Vec<MachineDto>)>> {
        let group: DeliveryGroupDto = match client.get_optional(&Self::groups().segment(id)).await {
            Ok(Some(group)) => group,
            Ok(None) => return Some(None),
            Err(err) => {
                report(diags, format!("Error reading delivery group {}", id), &err);
                return None;
            }
        };
        let machines = Self::machines(client, diags, &group.id).await?;
        Some(Some((group, machines)))
    }

    async fn machines(
        client: &CitrixClient,
        diags: &mut Diagnostics,
        id: &str,
    ) -> Option<Vec<MachineDto>> {
        match client
            .get_all(&Self::groups().segment(id).segment("Machines"))
            .await
        {
            Ok(machines) => Some(machines),
            Err(err) => {
                report(
                    diags,
                    format!("Error listing the machines of delivery group {}", id),
                    &err,
                );
                None
            }
        }
    }

    /// Every associated machine catalog must have the same session support
    async fn check_session_support(
        &self,
        diags: &mut Diagnostics,
        state: &DeliveryGroupState<'_>,
    ) -> Option<()> {
        let associations = state.associations();
        if associations.len() < 2 {
            return Some(());
        }
        let client = self.client.get(diags).await?;

        let mut session_support: Option<(String, String)> = None;
        for (i, association) in associations.iter().enumerate() {
            let path = ApiPath::orchestration()
                .segment("MachineCatalogs")
                .segment(&association.catalog);
            let attr_path = AttributePath::new("associated_machine_catalogs")
                .index(i as i64)
                .attribute("machine_catalog");
            let catalog: MachineCatalogDto = match client.get_optional(&path).await {
                Ok(Some(catalog)) => catalog,
                Ok(None) => {
                    diags.error(
                        "Machine catalog not found",
                        format!("Machine catalog `{}` does not exist.", association.catalog),
                        attr_path,
                    );
                    return None;
                }
                Err(err) => {
                    report(
                        diags,
                        format!("Error reading machine catalog {}", association.catalog),
                        &err,
                    );
                    return None;
                }
            };
            let (first, expected) = session_support.get_or_insert_with(|| {
                (association.catalog.clone(), catalog.session_support.clone())
            });
            if !expected.eq_ignore_ascii_case(&catalog.session_support) {
                diags.error(
                    "Incompatible machine catalogs",
                    format!(
                        "All associated machine catalogs must have the same session support: `{}` is `{}` but `{}` is `{}`.",
                        first, expected, association.catalog, catalog.session_support
                    ),
                    attr_path,
                );
                return None;
            }
        }
        Some(())
    }

    /// Move the machine counts of the group towards the plan
    async fn apply_associations(
        client: &CitrixClient,
        diags: &mut Diagnostics,
        id: &str,
        machines: &[MachineDto],
        planned: &[CatalogCount],
    ) -> Option<()> {
        let current = count_per_catalog(machines);
        let machines_path = Self::groups().segment(id).segment("Machines");

        // Catalogs dropped from the plan keep no machine
        let mut targets: Vec<CatalogCount> = planned.to_vec();
        for existing in &current {
            if !targets
                .iter()
                .any(|t| t.catalog.eq_ignore_ascii_case(&existing.catalog))
            {
                targets.push(CatalogCount {
                    catalog: existing.catalog.clone(),
                    count: 0,
                });
            }
        }

        for target in &targets {
            let count = current
                .iter()
                .find(|c| c.catalog.eq_ignore_ascii_case(&target.catalog))
                .map_or(0, |c| c.count);

            if target.count > count {
                info!(
                    group = id,
                    catalog = target.catalog.as_str(),
                    added = target.count - count,
                    "adding machines to delivery group"
                );
                let body = json!({
                    "MachineCatalog": target.catalog,
                    "Count": target.count - count,
                });
                if let Err(err) = client
                    .execute(Method::Post, &machines_path, Some(&body))
                    .await
                {
                    report(
                        diags,
                        format!("Error adding machines to delivery group {}", id),
                        &err,
                    );
                    return None;
                }
            } else if target.count < count {
                let removed = usize::try_from(count - target.count).unwrap_or_default();
                let candidates = machines.iter().filter(|machine| {
                    machine
                        .machine_catalog
                        .as_ref()
                        .is_some_and(|c| c.id.eq_ignore_ascii_case(&target.catalog))
                });
                for machine in candidates.take(removed) {
                    info!(
                        group = id,
                        machine = machine.name.as_str(),
                        "removing machine from delivery group"
                    );
                    if let Err(err) = client
                        .delete(&machines_path.clone().segment(&machine.id))
                        .await
                    {
                        if !err.is_not_found() {
                            report(
                                diags,
                                format!(
                                    "Error removing machine {} from delivery group {}",
                                    machine.name, id
                                ),
                                &err,
                            );
                            return None;
                        }
                    }
                }
            }
        }
        Some(())
    }
}

#[async_trait]
impl Resource for DeliveryGroupResource {
    type State<'a> = DeliveryGroupState<'a>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(DeliveryGroupState::schema())
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
        let id = str_of(&state.id).to_owned();
        match Self::fetch(&client, diags, &id).await? {
            Some((group, machines)) => Some((state.refresh(&group, &machines), private_state)),
            None => {
                warn_removed(diags, "Delivery group", &id);
                None
            }
        }
    }

    async fn plan_create<'a>(
        &self,
        diags: &mut Diagnostics,
        proposed_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        self.check_session_support(diags, &proposed_state).await?;
        let mut state = proposed_state;
        state.id = ValueString::Unknown;
        state.total_machines = Value::Unknown;
        Some((state, Default::default()))
    }

    async fn plan_update<'a>(
        &self,
        diags: &mut Diagnostics,
        prior_state: Self::State<'a>,
        proposed_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        prior_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>, Vec<AttributePath>)> {
        self.check_session_support(diags, &proposed_state).await?;
        let mut state = proposed_state;
        state.id = prior_state.id;
        if state.associated_machine_catalogs != prior_state.associated_machine_catalogs {
            state.total_machines = Value::Unknown;
        } else {
            state.total_machines = prior_state.total_machines;
        }
        Some((state, prior_private_state, vec![]))
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
        let name = str_of(&planned_state.name).to_owned();
        let catalogs: Vec<_> = planned_state
            .associations()
            .into_iter()
            .map(|a| json!({"MachineCatalog": a.catalog, "Count": a.count}))
            .collect();
        let body = json!({
            "Name": name,
            "Description": str_of(&planned_state.description),
            "MachineCatalogs": catalogs,
        });
        info!(name = name.as_str(), "creating delivery group");

        let group: DeliveryGroupDto = match client.post(&Self::groups(), &body).await {
            Ok(group) => group,
            Err(err) => {
                report(diags, format!("Error creating delivery group {}", name), &err);
                return None;
            }
        };
        let id = if group.id.is_empty() { name } else { group.id };

        match Self::fetch(&client, diags, &id).await? {
            Some((group, machines)) => Some((
                planned_state.refresh(&group, &machines),
                planned_private_state,
            )),
            None => {
                diags.root_error(
                    "Error creating delivery group",
                    format!("Delivery group `{}` was not found after its creation.", id),
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
        planned_state.validate(diags, Default::default());
        if !diags.errors.is_empty() {
            return None;
        }
        let client = self.client.get(diags).await?;
        let id = str_of(&prior_state.id).to_owned();
        info!(id = id.as_str(), "updating delivery group");

        let body = json!({
            "Name": str_of(&planned_state.name),
            "Description": str_of(&planned_state.description),
        });
        if let Err(err) = client.patch(&Self::groups().segment(&id), &body).await {
            report(diags, format!("Error updating delivery group {}", id), &err);
            return None;
        }

        let machines = Self::machines(&client, diags, &id).await?;
        Self::apply_associations(&client, diags, &id, &machines, &planned_state.associations())
            .await?;

        match Self::fetch(&client, diags, &id).await? {
            Some((group, machines)) => Some((
                planned_state.refresh(&group, &machines),
                planned_private_state,
            )),
            None => {
                diags.root_error(
                    "Error updating delivery group",
                    format!("Delivery group `{}` disappeared during its update.", id),
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
        info!(id = id.as_str(), "deleting delivery group");

        match client.delete(&Self::groups().segment(&id)).await {
            Ok(()) => Some(()),
            Err(err) if err.is_not_found() => Some(()),
            Err(err) => {
                report(diags, format!("Error deleting delivery group {}", id), &err);
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
        let Some((group, machines)) = Self::fetch(&client, diags, &id).await? else {
            diags.root_error(
                "Cannot import delivery group",
                format!("Delivery group `{}` does not exist.", id),
            );
            return None;
        };
        Some((
            DeliveryGroupState::default().refresh(&group, &machines),
            Default::default(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::testing::{test_client, FakeTransport};
    use crate::delivery_group::AssociatedCatalog;

    async fn resource(transport: &FakeTransport) -> DeliveryGroupResource {
        let slot = ClientSlot::default();
        slot.set(test_client(transport)).await;
        DeliveryGroupResource::new(slot)
    }

    fn planned(associations: &[(&str, i64)]) -> DeliveryGroupState<'static> {
        DeliveryGroupState {
            id: ValueString::from("dg-1"),
            name: ValueString::from("group"),
            associated_machine_catalogs: Value::Value(
                associations
                    .iter()
                    .map(|(catalog, count)| {
                        Value::Value(AssociatedCatalog {
                            machine_catalog: ValueString::from(catalog.to_string()),
                            machine_count: Value::Value(*count),
                        })
                    })
                    .collect(),
            ),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn mixed_session_support_is_rejected_at_plan_time() {
        let transport = FakeTransport::new();
        transport.push_json(
            Method::Get,
            "/MachineCatalogs/3f2b8c1e-5d4a-4e6f-9a7b-0c1d2e3f4a5b",
            200,
            serde_json::json!({"Id": "3f2b8c1e-5d4a-4e6f-9a7b-0c1d2e3f4a5b", "SessionSupport": "MultiSession"}),
        );
        transport.push_json(
            Method::Get,
            "/MachineCatalogs/7a6b5c4d-3e2f-4a1b-8c9d-0e1f2a3b4c5d",
            200,
            serde_json::json!({"Id": "7a6b5c4d-3e2f-4a1b-8c9d-0e1f2a3b4c5d", "SessionSupport": "SingleSession"}),
        );
        let resource = resource(&transport).await;
        let mut diags = Diagnostics::default();

        let state = planned(&[("3f2b8c1e-5d4a-4e6f-9a7b-0c1d2e3f4a5b", 1), ("7a6b5c4d-3e2f-4a1b-8c9d-0e1f2a3b4c5d", 1)]);
        let result = resource
            .plan_create(&mut diags, state.clone(), state, Default::default())
            .await;
        assert!(result.is_none());
        assert_eq!(diags.errors[0].summary, "Incompatible machine catalogs");
        assert_eq!(
            diags.errors[0].attribute,
            AttributePath::new("associated_machine_catalogs")
                .index(1)
                .attribute("machine_catalog")
        );
        assert!(transport.requests_with(Method::Post).is_empty());
    }

    #[tokio::test]
    async fn update_grows_and_shrinks_associations() {
        let transport = FakeTransport::new();
        transport.push_empty(Method::Patch, "/DeliveryGroups/dg-1");
        transport.push_json(
            Method::Get,
            "/DeliveryGroups/dg-1/Machines",
            200,
            serde_json::json!({"Items": [
                {"Id": "m1", "Name": "a-01", "MachineCatalog": {"Id": "3f2b8c1e-5d4a-4e6f-9a7b-0c1d2e3f4a5b"}},
                {"Id": "m2", "Name": "b-01", "MachineCatalog": {"Id": "7a6b5c4d-3e2f-4a1b-8c9d-0e1f2a3b4c5d"}},
                {"Id": "m3", "Name": "b-02", "MachineCatalog": {"Id": "7a6b5c4d-3e2f-4a1b-8c9d-0e1f2a3b4c5d"}},
            ]}),
        );
        transport.push_empty(Method::Post, "/DeliveryGroups/dg-1/Machines");
        transport.push_empty(Method::Delete, "/DeliveryGroups/dg-1/Machines/m2");
        transport.push_json(
            Method::Get,
            "/DeliveryGroups/dg-1",
            200,
            serde_json::json!({"Id": "dg-1", "Name": "group", "TotalMachines": 4}),
        );
        transport.push_json(
            Method::Get,
            "/DeliveryGroups/dg-1/Machines",
            200,
            serde_json::json!({"Items": [
                {"Id": "m1", "Name": "a-01", "MachineCatalog": {"Id": "3f2b8c1e-5d4a-4e6f-9a7b-0c1d2e3f4a5b"}},
                {"Id": "m4", "Name": "a-02", "MachineCatalog": {"Id": "3f2b8c1e-5d4a-4e6f-9a7b-0c1d2e3f4a5b"}},
                {"Id": "m5", "Name": "a-03", "MachineCatalog": {"Id": "3f2b8c1e-5d4a-4e6f-9a7b-0c1d2e3f4a5b"}},
                {"Id": "m3", "Name": "b-02", "MachineCatalog": {"Id": "7a6b5c4d-3e2f-4a1b-8c9d-0e1f2a3b4c5d"}},
            ]}),
        );
        let resource = resource(&transport).await;
        let mut diags = Diagnostics::default();

        let prior = planned(&[("3f2b8c1e-5d4a-4e6f-9a7b-0c1d2e3f4a5b", 1), ("7a6b5c4d-3e2f-4a1b-8c9d-0e1f2a3b4c5d", 2)]);
        let target = planned(&[("3f2b8c1e-5d4a-4e6f-9a7b-0c1d2e3f4a5b", 3), ("7a6b5c4d-3e2f-4a1b-8c9d-0e1f2a3b4c5d", 1)]);
        let (state, _) = resource
            .update(
                &mut diags,
                prior,
                target.clone(),
                target.clone(),
                Default::default(),
                Default::default(),
            )
            .await
            .unwrap();
        assert!(diags.errors.is_empty());
        assert_eq!(state.associated_machine_catalogs, target.associated_machine_catalogs);
        assert_eq!(state.total_machines, Value::Value(4));

        let post = &transport.requests_with(Method::Post)[0];
        assert_eq!(
            post.body,
            Some(crate::client::transport::RequestBody::Json(
                serde_json::json!({"MachineCatalog": "3f2b8c1e-5d4a-4e6f-9a7b-0c1d2e3f4a5b", "Count": 2})
            ))
        );
        assert_eq!(transport.requests_with(Method::Delete).len(), 1);
    }
}
