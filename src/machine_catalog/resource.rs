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
use serde_json::{json, Value as Json};
use tf_provider::schema::Schema;
use tf_provider::value::{Value, ValueEmpty, ValueString};
use tf_provider::{AttributePath, Diagnostics, Resource};
use tracing::{debug, info};

use crate::client::{ApiPath, CitrixClient, ClientSlot, Method};
use crate::jobs::{submit_and_wait, JobBudget, JobError};
use crate::resolver::{ResolveError, ResourceResolver, Step};
use crate::utils::{report, str_of, warn_removed, WithSchema, WithValidate};

use super::state::{scheme_path, MachineCatalogState, ProvisioningScheme};
use super::{MachineCatalogDto, MachineDto};

const SHRINK_UNSUPPORTED: &str =
    "Reducing machine count is only supported for Random allocation type";

/// `citrix_machine_catalog`
#[derive(Debug, Default)]
pub struct MachineCatalogResource {
    client: ClientSlot,
}

/// `XDPath` of the display names of a provisioning scheme
struct ResolvedScheme {
    master_image: String,
    service_offering: String,
    network: String,
}

impl MachineCatalogResource {
    pub fn new(client: ClientSlot) -> Self {
        Self { client }
    }

    fn catalogs() -> ApiPath {
        ApiPath::orchestration().segment("MachineCatalogs")
    }

    async fn fetch(
        client: &CitrixClient,
        diags: &mut Diagnostics,
        id: &str,
    ) -> Option<Option<MachineCatalogDto>> {
        match client.get_optional(&Self::catalogs().segment(id)).await {
            Ok(remote) => Some(remote),
            Err(err) => {
                report(diags, format!("Error reading machine catalog {}", id), &err);
                None
            }
        }
    }

    async fn resolve(
        client: &CitrixClient,
        diags: &mut Diagnostics,
        scheme: &ProvisioningScheme<'_>,
    ) -> Option<ResolvedScheme> {
        let resolver = ResourceResolver::for_resource_pool(
            client,
            str_of(&scheme.hypervisor),
            str_of(&scheme.hypervisor_resource_pool),
        );
        let image = str_of(&scheme.master_image);
        let image_steps = match scheme.master_image_resource_group.as_deref_option() {
            Some(group) if !group.is_empty() => {
                vec![Step::new(group, "ResourceGroup"), Step::any(image)]
            }
            _ => vec![Step::any(image)],
        };

        let resolved = async {
            let master_image = resolver.resolve("", &image_steps).await?;
            let service_offering = resolver
                .resolve(
                    "",
                    &[Step::new(str_of(&scheme.service_offering), "ServiceOffering")],
                )
                .await?;
            let network = resolver
                .resolve("", &[Step::new(str_of(&scheme.network), "Network")])
                .await?;
            Ok::<_, ResolveError>(ResolvedScheme {
                master_image: master_image.xd_path,
                service_offering: service_offering.xd_path,
                network: network.xd_path,
            })
        }
        .await;

        match resolved {
            Ok(resolved) => Some(resolved),
            Err(err) => {
                report(
                    diags,
                    "Error resolving the provisioning scheme of the machine catalog",
                    &err,
                );
                None
            }
        }
    }

    fn naming_rules(scheme: &ProvisioningScheme<'_>) -> Json {
        json!({
            "NamingScheme": str_of(&scheme.naming_scheme),
            "NamingSchemeType": str_of(&scheme.naming_scheme_type),
        })
    }

    fn create_body(
        state: &MachineCatalogState<'_>,
        scheme: &ProvisioningScheme<'_>,
        resolved: ResolvedScheme,
    ) -> Json {
        json!({
            "Name": str_of(&state.name),
            "Description": str_of(&state.description),
            "Zone": str_of(&state.zone),
            "AllocationType": str_of(&state.allocation_type),
            "SessionSupport": str_of(&state.session_support),
            "PersistUserChanges": if state.is_random() { "Discard" } else { "OnLocal" },
            "ProvisioningType": "MCS",
            "MinimumFunctionalLevel": "L7_20",
            "ProvisioningScheme": {
                "NumTotalMachines": scheme.number_of_total_machines.as_ref_option().copied().unwrap_or_default(),
                "IdentityType": str_of(&scheme.identity_type),
                "MachineAccountCreationRules": Self::naming_rules(scheme),
                "ResourcePool": str_of(&scheme.hypervisor_resource_pool),
                "MasterImagePath": resolved.master_image,
                "ServiceOfferingPath": resolved.service_offering,
                "NetworkMapping": [{
                    "NetworkDeviceNameOrId": "0",
                    "NetworkPath": resolved.network,
                }],
            },
        })
    }

    /// Add machines one at a time, each in its own job
    async fn add_machines(
        client: &CitrixClient,
        diags: &mut Diagnostics,
        id: &str,
        scheme: &ProvisioningScheme<'_>,
        count: i64,
    ) -> Option<()> {
        let body = json!({ "MachineAccountCreationRules": Self::naming_rules(scheme) });
        let path = Self::catalogs().segment(id).segment("Machines");
        for i in 0..count {
            info!(catalog = id, machine = i + 1, count, "adding machine");
            if let Err(err) = submit_and_wait(
                client,
                Method::Post,
                &path,
                Some(&body),
                JobBudget::MACHINE_ADD,
            )
            .await
            {
                report(
                    diags,
                    format!("Error adding machine to machine catalog {}", id),
                    &err,
                );
                return None;
            }
        }
        Some(())
    }

    /// Machines to remove, those outside any delivery group first
    ///
    /// Fails without side effect when the catalog holds fewer than `count` machines.
    async fn removable_machines(
        client: &CitrixClient,
        diags: &mut Diagnostics,
        id: &str,
        count: i64,
    ) -> Option<Vec<MachineDto>> {
        let path = Self::catalogs().segment(id).segment("Machines");
        let mut machines: Vec<MachineDto> = match client.get_all(&path).await {
            Ok(machines) => machines,
            Err(err) => {
                report(
                    diags,
                    format!("Error listing the machines of machine catalog {}", id),
                    &err,
                );
                return None;
            }
        };
        machines.sort_by_key(|machine| machine.delivery_group.is_some());
        let count = usize::try_from(count).unwrap_or_default();
        if machines.len() < count {
            diags.root_error(
                "Error removing machines",
                format!(
                    "Machine catalog `{}` has {} machines, {} cannot be removed.",
                    id,
                    machines.len(),
                    count
                ),
            );
            return None;
        }
        machines.truncate(count);
        Some(machines)
    }

    /// Remove machines one at a time, each in its own job
    async fn remove_machines(
        client: &CitrixClient,
        diags: &mut Diagnostics,
        id: &str,
        machines: &[MachineDto],
    ) -> Option<()> {
        let path = Self::catalogs().segment(id).segment("Machines");
        for machine in machines {
            info!(catalog = id, machine = machine.name.as_str(), "removing machine");
            let machine_path = path
                .clone()
                .segment(&machine.id)
                .query("deleteVm", "true")
                .query("purgeDBOnly", "false");
            match submit_and_wait::<()>(
                client,
                Method::Delete,
                &machine_path,
                None,
                JobBudget::MACHINE_REMOVE,
            )
            .await
            {
                Ok(_) => (),
                Err(JobError::Api(err)) if err.is_not_found() => {
                    debug!(machine = machine.name.as_str(), "machine already removed");
                }
                Err(err) => {
                    report(
                        diags,
                        format!("Error removing machine {} from machine catalog {}", machine.name, id),
                        &err,
                    );
                    return None;
                }
            }
        }
        Some(())
    }
}

#[async_trait]
impl Resource for MachineCatalogResource {
    type State<'a> = MachineCatalogState<'a>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(MachineCatalogState::schema())
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
            Some(remote) => Some((state.refresh(&remote), private_state)),
            None => {
                warn_removed(diags, "Machine catalog", &id);
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
        diags: &mut Diagnostics,
        prior_state: Self::State<'a>,
        proposed_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        prior_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>, Vec<AttributePath>)> {
        let mut trigger_replace = Vec::new();
        for (name, changed) in [
            ("zone", prior_state.zone != proposed_state.zone),
            (
                "allocation_type",
                prior_state.allocation_type != proposed_state.allocation_type,
            ),
            (
                "session_support",
                prior_state.session_support != proposed_state.session_support,
            ),
        ] {
            if changed {
                trigger_replace.push(AttributePath::new(name));
            }
        }
        if let (Value::Value(prior), Value::Value(proposed)) = (
            &prior_state.provisioning_scheme,
            &proposed_state.provisioning_scheme,
        ) {
            for (name, changed) in [
                ("hypervisor", prior.hypervisor != proposed.hypervisor),
                (
                    "hypervisor_resource_pool",
                    prior.hypervisor_resource_pool != proposed.hypervisor_resource_pool,
                ),
                ("identity_type", prior.identity_type != proposed.identity_type),
                ("master_image", prior.master_image != proposed.master_image),
                (
                    "master_image_resource_group",
                    prior.master_image_resource_group != proposed.master_image_resource_group,
                ),
                ("service_offering", prior.service_offering != proposed.service_offering),
                ("network", prior.network != proposed.network),
            ] {
                if changed {
                    trigger_replace.push(scheme_path().attribute(name));
                }
            }
        }

        if trigger_replace.is_empty() {
            if let (Some(prior), Some(proposed)) =
                (prior_state.machine_count(), proposed_state.machine_count())
            {
                if proposed < prior && !proposed_state.is_random() {
                    diags.error(
                        "Unsupported machine count change",
                        SHRINK_UNSUPPORTED,
                        scheme_path().attribute("number_of_total_machines"),
                    );
                    return None;
                }
            }
        }

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
        planned_state.validate(diags, Default::default());
        if !diags.errors.is_empty() {
            return None;
        }
        let Value::Value(scheme) = &planned_state.provisioning_scheme else {
            diags.root_error_short("`provisioning_scheme` is unknown at apply time");
            return None;
        };
        let client = self.client.get(diags).await?;
        let name = str_of(&planned_state.name).to_owned();

        let resolved = Self::resolve(&client, diags, scheme).await?;
        let body = Self::create_body(&planned_state, scheme, resolved);
        info!(name = name.as_str(), "creating machine catalog");

        if let Err(err) = submit_and_wait(
            &client,
            Method::Post,
            &Self::catalogs(),
            Some(&body),
            JobBudget::CATALOG_CREATE,
        )
        .await
        {
            report(diags, format!("Error creating machine catalog {}", name), &err);
            return None;
        }

        match Self::fetch(&client, diags, &name).await? {
            Some(remote) => Some((planned_state.refresh(&remote), planned_private_state)),
            None => {
                diags.root_error(
                    "Error creating machine catalog",
                    format!("Machine catalog `{}` was not found after its creation.", name),
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
        let Value::Value(scheme) = &planned_state.provisioning_scheme else {
            diags.root_error_short("`provisioning_scheme` is unknown at apply time");
            return None;
        };
        let client = self.client.get(diags).await?;
        let id = str_of(&prior_state.id).to_owned();

        let Some(remote) = Self::fetch(&client, diags, &id).await? else {
            diags.root_error(
                "Error updating machine catalog",
                format!("Machine catalog `{}` no longer exists.", id),
            );
            return None;
        };
        let current = remote.total_count;
        let target = planned_state.machine_count().unwrap_or(current);
        if target < current && !planned_state.is_random() {
            diags.error(
                "Error updating machine catalog",
                SHRINK_UNSUPPORTED,
                scheme_path().attribute("number_of_total_machines"),
            );
            return None;
        }

        let removed = if target < current {
            Self::removable_machines(&client, diags, &id, current - target).await?
        } else {
            Vec::new()
        };

        info!(id = id.as_str(), current, target, "updating machine catalog");
        let body = json!({
            "Name": str_of(&planned_state.name),
            "Description": str_of(&planned_state.description),
        });
        if let Err(err) = client.patch(&Self::catalogs().segment(&id), &body).await {
            report(diags, format!("Error updating machine catalog {}", id), &err);
            return None;
        }

        if target > current {
            Self::add_machines(&client, diags, &id, scheme, target - current).await?;
        } else if !removed.is_empty() {
            Self::remove_machines(&client, diags, &id, &removed).await?;
        }

        match Self::fetch(&client, diags, &id).await? {
            Some(remote) => Some((planned_state.refresh(&remote), planned_private_state)),
            None => {
                diags.root_error(
                    "Error updating machine catalog",
                    format!("Machine catalog `{}` disappeared during its update.", id),
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
        info!(id = id.as_str(), "deleting machine catalog");

        let path = Self::catalogs()
            .segment(&id)
            .query("deleteVm", "true")
            .query("deleteAccount", "Delete");
        match submit_and_wait::<()>(&client, Method::Delete, &path, None, JobBudget::CATALOG_DELETE)
            .await
        {
            Ok(_) => Some(()),
            Err(JobError::Api(err)) if err.is_not_found() => Some(()),
            Err(err) => {
                report(diags, format!("Error deleting machine catalog {}", id), &err);
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
                "Cannot import machine catalog",
                format!("Machine catalog `{}` does not exist.", id),
            );
            return None;
        };
        Some((
            MachineCatalogState::default().refresh(&remote),
            Default::default(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::testing::{test_client, FakeTransport};

    async fn resource(transport: &FakeTransport) -> MachineCatalogResource {
        let slot = ClientSlot::default();
        slot.set(test_client(transport)).await;
        MachineCatalogResource::new(slot)
    }

    fn state(allocation_type: &str, count: i64) -> MachineCatalogState<'static> {
        MachineCatalogState {
            id: ValueString::from("mc-1"),
            name: ValueString::from("catalog"),
            description: ValueString::Null,
            zone: ValueString::from("zone-1"),
            allocation_type: ValueString::from(allocation_type.to_owned()),
            session_support: ValueString::from("MultiSession"),
            provisioning_scheme: Value::Value(ProvisioningScheme {
                hypervisor: ValueString::from("hyp-1"),
                hypervisor_resource_pool: ValueString::from("pool-1"),
                identity_type: ValueString::from("ActiveDirectory"),
                number_of_total_machines: Value::Value(count),
                master_image: ValueString::from("image"),
                master_image_resource_group: ValueString::Null,
                service_offering: ValueString::from("size"),
                network: ValueString::from("subnet"),
                naming_scheme: ValueString::from("ctx-##"),
                naming_scheme_type: ValueString::from("Numeric"),
            }),
        }
    }

    fn remote(allocation_type: &str, count: i64) -> serde_json::Value {
        serde_json::json!({
            "Id": "mc-1",
            "Name": "catalog",
            "Zone": {"Id": "zone-1"},
            "AllocationType": allocation_type,
            "SessionSupport": "MultiSession",
            "TotalCount": count,
        })
    }

    #[tokio::test]
    async fn shrinking_static_catalog_fails_without_delete() {
        let transport = FakeTransport::new();
        transport.push_json(Method::Get, "/MachineCatalogs/mc-1", 200, remote("Static", 3));
        let resource = resource(&transport).await;
        let mut diags = Diagnostics::default();

        let result = resource
            .update(
                &mut diags,
                state("Static", 3),
                state("Static", 1),
                state("Static", 1),
                Default::default(),
                Default::default(),
            )
            .await;
        assert!(result.is_none());
        assert_eq!(diags.errors.len(), 1);
        assert!(diags.errors[0].detail.contains("Random allocation type"));
        assert!(transport.requests_with(Method::Delete).is_empty());
        assert!(transport.requests_with(Method::Patch).is_empty());
    }

    #[tokio::test]
    async fn shrinking_static_catalog_is_rejected_at_plan_time() {
        let transport = FakeTransport::new();
        let resource = resource(&transport).await;
        let mut diags = Diagnostics::default();

        let result = resource
            .plan_update(
                &mut diags,
                state("Static", 3),
                state("Static", 2),
                state("Static", 2),
                Default::default(),
                Default::default(),
            )
            .await;
        assert!(result.is_none());
        assert_eq!(
            diags.errors[0].attribute,
            scheme_path().attribute("number_of_total_machines")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn growing_adds_one_machine_per_job() {
        let transport = FakeTransport::new();
        transport.push_json(Method::Get, "/MachineCatalogs/mc-1", 200, remote("Random", 1));
        transport.push_empty(Method::Patch, "/MachineCatalogs/mc-1");
        transport.push_job(Method::Post, "/MachineCatalogs/mc-1/Machines?async=true", "job-1");
        transport.push_job(Method::Post, "/MachineCatalogs/mc-1/Machines?async=true", "job-2");
        transport.push_json(Method::Get, "/MachineCatalogs/mc-1", 200, remote("Random", 3));
        let resource = resource(&transport).await;
        let mut diags = Diagnostics::default();

        let (state, _) = resource
            .update(
                &mut diags,
                state("Random", 1),
                state("Random", 3),
                state("Random", 3),
                Default::default(),
                Default::default(),
            )
            .await
            .unwrap();
        assert!(diags.errors.is_empty());
        assert_eq!(state.machine_count(), Some(3));
        assert_eq!(transport.requests_with(Method::Post).len(), 2);
        assert_eq!(transport.remaining(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn shrinking_removes_unassigned_machines_first() {
        let transport = FakeTransport::new();
        transport.push_json(Method::Get, "/MachineCatalogs/mc-1", 200, remote("Random", 3));
        transport.push_json(Method::Get, "/MachineCatalogs/mc-1/Machines", 200, serde_json::json!({
            "Items": [
                {"Id": "m1", "Name": "ctx-01", "DeliveryGroup": {"Id": "dg-1"}},
                {"Id": "m2", "Name": "ctx-02"},
                {"Id": "m3", "Name": "ctx-03", "DeliveryGroup": {"Id": "dg-1"}},
            ]
        }));
        transport.push_empty(Method::Patch, "/MachineCatalogs/mc-1");
        transport.push_job(Method::Delete, "/Machines/m2?", "job-1");
        transport.push_json(Method::Get, "/MachineCatalogs/mc-1", 200, remote("Random", 2));
        let resource = resource(&transport).await;
        let mut diags = Diagnostics::default();

        let result = resource
            .update(
                &mut diags,
                state("Random", 3),
                state("Random", 2),
                state("Random", 2),
                Default::default(),
                Default::default(),
            )
            .await;
        assert!(result.is_some());
        let deletes = transport.requests_with(Method::Delete);
        assert_eq!(deletes.len(), 1);
        assert!(deletes[0].url.contains("/Machines/m2?"));
        assert!(deletes[0].url.contains("deleteVm=true"));
    }

    #[tokio::test]
    async fn shrinking_below_the_listed_machines_writes_nothing() {
        let transport = FakeTransport::new();
        transport.push_json(Method::Get, "/MachineCatalogs/mc-1", 200, remote("Random", 3));
        transport.push_json(Method::Get, "/MachineCatalogs/mc-1/Machines", 200, serde_json::json!({
            "Items": [{"Id": "m1", "Name": "ctx-01"}]
        }));
        transport.push_empty(Method::Patch, "/MachineCatalogs/mc-1");
        let resource = resource(&transport).await;
        let mut diags = Diagnostics::default();

        let result = resource
            .update(
                &mut diags,
                state("Random", 3),
                state("Random", 1),
                state("Random", 1),
                Default::default(),
                Default::default(),
            )
            .await;
        assert!(result.is_none());
        assert_eq!(diags.errors.len(), 1);
        assert!(diags.errors[0].detail.contains("has 1 machines, 2 cannot be removed"));
        assert!(transport.requests_with(Method::Patch).is_empty());
        assert!(transport.requests_with(Method::Delete).is_empty());
    }

    #[tokio::test]
    async fn created_catalog_reads_back_as_configured() {
        let transport = FakeTransport::new();
        for children in [
            json!([{"Name": "images", "ResourceType": "ResourceGroup", "FullRelativePath": "images.resourcegroup"}]),
            json!([{"Name": "golden.vhd", "ResourceType": "Vm", "XDPath": r"XDHyp:\pool\images.resourcegroup\golden.vhd"}]),
            json!([{"Name": "Standard_D2_v2", "ResourceType": "ServiceOffering", "XDPath": r"XDHyp:\pool\Standard_D2_v2.serviceoffering"}]),
            json!([{"Name": "subnet-a", "ResourceType": "Network", "XDPath": r"XDHyp:\pool\subnet-a.network"}]),
        ] {
            transport.push_json(Method::Get, "allResources", 200, json!({ "Children": children }));
        }
        let client = test_client(&transport);
        let configured = MachineCatalogState {
            description: ValueString::from("pooled desktops"),
            provisioning_scheme: Value::Value(ProvisioningScheme {
                hypervisor: ValueString::from("hyp-1"),
                hypervisor_resource_pool: ValueString::from("pool-1"),
                identity_type: ValueString::from("ActiveDirectory"),
                number_of_total_machines: Value::Value(2),
                master_image: ValueString::from("golden.vhd"),
                master_image_resource_group: ValueString::from("images"),
                service_offering: ValueString::from("Standard_D2_v2"),
                network: ValueString::from("Subnet-A"),
                naming_scheme: ValueString::from("ctx-##"),
                naming_scheme_type: ValueString::from("Numeric"),
            }),
            ..state("Random", 2)
        };
        let mut diags = Diagnostics::default();
        let scheme = configured.provisioning_scheme.as_ref_option().unwrap();

        let resolved = MachineCatalogResource::resolve(&client, &mut diags, scheme)
            .await
            .unwrap();
        let body = MachineCatalogResource::create_body(&configured, scheme, resolved);
        let provisioning = &body["ProvisioningScheme"];
        assert_eq!(
            provisioning["MasterImagePath"],
            json!(r"XDHyp:\pool\images.resourcegroup\golden.vhd")
        );

        // the service answers with ids next to names, in its own casing
        let remote: MachineCatalogDto = serde_json::from_value(json!({
            "Id": "mc-1",
            "Name": body["Name"],
            "Description": body["Description"],
            "Zone": {"Id": body["Zone"], "Name": "Primary"},
            "AllocationType": body["AllocationType"],
            "SessionSupport": body["SessionSupport"],
            "TotalCount": provisioning["NumTotalMachines"],
            "ProvisioningScheme": {
                "IdentityType": provisioning["IdentityType"],
                "ResourcePool": {
                    "Id": provisioning["ResourcePool"],
                    "Name": "pool",
                    "Hypervisor": {"Id": "hyp-1", "Name": "azure-conn"},
                },
                "MasterImage": {"Name": "golden.vhd", "XDPath": provisioning["MasterImagePath"]},
                "ServiceOffering": "standard_d2_v2",
                "MachineAccountCreationRules": provisioning["MachineAccountCreationRules"],
                "NetworkMaps": [{
                    "NetworkDeviceNameOrId": "0",
                    "Network": {"Name": "subnet-a", "XDPath": provisioning["NetworkMapping"][0]["NetworkPath"]},
                }],
            },
        }))
        .unwrap();
        assert_eq!(configured.clone().refresh(&remote), configured);
        assert_eq!(transport.remaining(), 0);
    }
}
