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
use tf_provider::value::{self, Value, ValueNumber, ValueString};
use tf_provider::{map, AttributePath, Diagnostics};

use crate::hypervisor::{keep_display_name, keep_reference, RefDto};
use crate::utils::{require_non_empty, require_one_of, string_value, WithSchema, WithValidate};

use super::{
    MachineCatalogDto, ProvisioningSchemeDto, ALLOCATION_TYPES, IDENTITY_TYPES,
    NAMING_SCHEME_TYPES, SESSION_SUPPORTS,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct MachineCatalogState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub name: ValueString<'a>,
    pub description: ValueString<'a>,
    pub zone: ValueString<'a>,
    pub allocation_type: ValueString<'a>,
    pub session_support: ValueString<'a>,
    #[serde(with = "value::serde_as_vec")]
    pub provisioning_scheme: Value<ProvisioningScheme<'a>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProvisioningScheme<'a> {
    #[serde(borrow = "'a")]
    pub hypervisor: ValueString<'a>,
    pub hypervisor_resource_pool: ValueString<'a>,
    pub identity_type: ValueString<'a>,
    pub number_of_total_machines: ValueNumber,
    pub master_image: ValueString<'a>,
    pub master_image_resource_group: ValueString<'a>,
    pub service_offering: ValueString<'a>,
    pub network: ValueString<'a>,
    pub naming_scheme: ValueString<'a>,
    pub naming_scheme_type: ValueString<'a>,
}

pub(super) fn scheme_path() -> AttributePath {
    AttributePath::new("provisioning_scheme").index(0)
}

impl<'a> MachineCatalogState<'a> {
    pub fn refresh(self, remote: &MachineCatalogDto) -> Self {
        let provisioning_scheme = match (self.provisioning_scheme, &remote.provisioning_scheme) {
            (prior, Some(scheme)) => Value::Value(
                prior
                    .unwrap_or_default()
                    .refresh(scheme, remote.total_count),
            ),
            (prior, None) => prior,
        };
        Self {
            id: string_value(remote.id.clone()),
            name: string_value(remote.name.clone()),
            description: string_value(remote.description.clone()),
            zone: keep_reference(self.zone, &remote.zone),
            allocation_type: string_value(remote.allocation_type.clone()),
            session_support: string_value(remote.session_support.clone()),
            provisioning_scheme,
        }
    }

    /// Machine count requested by the plan, if known
    pub fn machine_count(&self) -> Option<i64> {
        self.provisioning_scheme
            .as_ref_option()
            .and_then(|scheme| scheme.number_of_total_machines.as_ref_option().copied())
    }

    pub fn is_random(&self) -> bool {
        self.allocation_type
            .as_deref_option()
            .is_some_and(|allocation| allocation.eq_ignore_ascii_case("Random"))
    }
}

impl<'a> ProvisioningScheme<'a> {
    fn refresh(self, remote: &ProvisioningSchemeDto, total_count: i64) -> Self {
        let network = match remote.network_maps.first() {
            Some(map) => keep_display_name(self.network, &map.network.name),
            None => self.network,
        };
        let rules = &remote.machine_account_creation_rules;
        Self {
            hypervisor: keep_reference(self.hypervisor, &remote.resource_pool.hypervisor),
            hypervisor_resource_pool: keep_reference(
                self.hypervisor_resource_pool,
                &RefDto {
                    id: remote.resource_pool.id.clone(),
                    name: remote.resource_pool.name.clone(),
                    ..Default::default()
                },
            ),
            identity_type: string_value(remote.identity_type.clone()),
            number_of_total_machines: Value::Value(total_count),
            master_image: keep_display_name(self.master_image, &remote.master_image.name),
            master_image_resource_group: self.master_image_resource_group,
            service_offering: keep_display_name(self.service_offering, &remote.service_offering),
            network,
            naming_scheme: string_value(rules.naming_scheme.clone()),
            naming_scheme_type: string_value(rules.naming_scheme_type.clone()),
        }
    }
}

impl<'a> WithValidate for MachineCatalogState<'a> {
    fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        require_non_empty(diags, &self.name, "name", attr_path.clone().attribute("name"));
        require_non_empty(diags, &self.zone, "zone", attr_path.clone().attribute("zone"));
        require_one_of(
            diags,
            &self.allocation_type,
            "allocation_type",
            ALLOCATION_TYPES,
            attr_path.clone().attribute("allocation_type"),
        );
        require_one_of(
            diags,
            &self.session_support,
            "session_support",
            SESSION_SUPPORTS,
            attr_path.clone().attribute("session_support"),
        );
        match &self.provisioning_scheme {
            Value::Value(scheme) => scheme.validate(
                diags,
                attr_path.attribute("provisioning_scheme").index(0),
            ),
            Value::Null => {
                diags.error_short(
                    "`provisioning_scheme` is required",
                    attr_path.attribute("provisioning_scheme"),
                );
            }
            Value::Unknown => (),
        }
    }
}

impl<'a> WithValidate for ProvisioningScheme<'a> {
    fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        for (name, value) in [
            ("hypervisor", &self.hypervisor),
            ("hypervisor_resource_pool", &self.hypervisor_resource_pool),
            ("master_image", &self.master_image),
            ("service_offering", &self.service_offering),
            ("network", &self.network),
            ("naming_scheme", &self.naming_scheme),
        ] {
            require_non_empty(diags, value, name, attr_path.clone().attribute(name));
        }
        require_one_of(
            diags,
            &self.identity_type,
            "identity_type",
            IDENTITY_TYPES,
            attr_path.clone().attribute("identity_type"),
        );
        require_one_of(
            diags,
            &self.naming_scheme_type,
            "naming_scheme_type",
            NAMING_SCHEME_TYPES,
            attr_path.clone().attribute("naming_scheme_type"),
        );
        if let Value::Value(count) = self.number_of_total_machines {
            if count < 0 {
                diags.error_short(
                    "`number_of_total_machines` cannot be negative",
                    attr_path.attribute("number_of_total_machines"),
                );
            }
        }
    }
}

impl<'a> WithSchema for MachineCatalogState<'a> {
    fn schema() -> Schema {
        let required = |description: &str| Attribute {
            attr_type: AttributeType::String,
            description: Description::plain(description),
            constraint: AttributeConstraint::Required,
            ..Default::default()
        };
        Schema {
            version: 1,
            block: Block {
                version: 1,
                attributes: map! {
                    "id" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("GUID identifier of the machine catalog"),
                        constraint: AttributeConstraint::Computed,
                        ..Default::default()
                    },
                    "name" => required("Name of the machine catalog"),
                    "description" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("Description of the machine catalog"),
                        constraint: AttributeConstraint::Optional,
                        ..Default::default()
                    },
                    "zone" => required("Id of the zone the machine catalog is associated with"),
                    "allocation_type" => required("`Random` or `Static`"),
                    "session_support" => required("`MultiSession` or `SingleSession`"),
                },
                blocks: map! {
                    "provisioning_scheme" => NestedBlock::Optional(Block {
                        attributes: map! {
                            "hypervisor" => required("Id of the hypervisor hosting the machines"),
                            "hypervisor_resource_pool" => required("Id of the resource pool hosting the machines"),
                            "identity_type" => required("`ActiveDirectory`, `AzureAD`, `HybridAzureAD` or `Workgroup`"),
                            "number_of_total_machines" => Attribute {
                                attr_type: AttributeType::Number,
                                description: Description::plain("Number of machines in the catalog"),
                                constraint: AttributeConstraint::Required,
                                ..Default::default()
                            },
                            "master_image" => required("Name of the master image"),
                            "master_image_resource_group" => Attribute {
                                attr_type: AttributeType::String,
                                description: Description::plain("Resource group of the master image (Azure)"),
                                constraint: AttributeConstraint::Optional,
                                ..Default::default()
                            },
                            "service_offering" => required("Machine size (`Standard_D2_v2`, `t3.large`)"),
                            "network" => required("Name of the subnet the machines are attached to"),
                            "naming_scheme" => required("Naming scheme of the machine accounts (`ctx-##`)"),
                            "naming_scheme_type" => required("`Numeric` or `Alphabetic`"),
                        },
                        description: Description::plain("Machine creation services configuration"),
                        ..Default::default()
                    }),
                },
                description: Description::plain("Manages an MCS machine catalog"),
                ..Default::default()
            },
        }
    }
}
