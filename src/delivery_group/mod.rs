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
use tf_provider::value::{Value, ValueList, ValueNumber, ValueString};
use tf_provider::{map, AttributePath, Diagnostics};

use crate::machine_catalog::MachineDto;
use crate::reconcile::reconcile;
use crate::utils::{require_non_empty, string_value, WithSchema, WithValidate};

pub use resource::DeliveryGroupResource;

mod resource;

/// `GET /DeliveryGroups/{nameOrId}`
#[derive(Clone, PartialEq, Eq, Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DeliveryGroupDto {
    pub id: String,
    pub name: String,
    pub description: String,
    pub total_machines: i64,
}

/// Machines of a delivery group, counted per machine catalog
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct CatalogCount {
    pub catalog: String,
    pub count: i64,
}

/// Count the machines per catalog, in order of first appearance
pub fn count_per_catalog(machines: &[MachineDto]) -> Vec<CatalogCount> {
    let mut counts: Vec<CatalogCount> = Vec::new();
    for machine in machines {
        let Some(catalog) = &machine.machine_catalog else {
            continue;
        };
        match counts
            .iter_mut()
            .find(|c| c.catalog.eq_ignore_ascii_case(&catalog.id))
        {
            Some(entry) => entry.count += 1,
            None => counts.push(CatalogCount {
                catalog: catalog.id.clone(),
                count: 1,
            }),
        }
    }
    counts
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DeliveryGroupState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub name: ValueString<'a>,
    pub description: ValueString<'a>,
    pub total_machines: ValueNumber,
    pub associated_machine_catalogs: ValueList<Value<AssociatedCatalog<'a>>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AssociatedCatalog<'a> {
    #[serde(borrow = "'a")]
    pub machine_catalog: ValueString<'a>,
    pub machine_count: ValueNumber,
}

impl<'a> DeliveryGroupState<'a> {
    pub fn refresh(self, remote: &DeliveryGroupDto, machines: &[MachineDto]) -> Self {
        let counts = count_per_catalog(machines);
        let associations = reconcile(
            self.associated_machine_catalogs.unwrap_or_default(),
            &counts,
            |prior: &Value<AssociatedCatalog<'a>>| {
                prior
                    .as_ref_option()
                    .and_then(|a| a.machine_catalog.as_deref_option())
                    .map(str::to_lowercase)
            },
            |remote: &CatalogCount| remote.catalog.to_lowercase(),
            |prior, remote| {
                let machine_catalog = match prior {
                    Some(Value::Value(prior)) if prior.machine_catalog.is_value() => {
                        prior.machine_catalog
                    }
                    _ => Value::Value(remote.catalog.clone().into()),
                };
                Value::Value(AssociatedCatalog {
                    machine_catalog,
                    machine_count: Value::Value(remote.count),
                })
            },
        );
        Self {
            id: string_value(remote.id.clone()),
            name: string_value(remote.name.clone()),
            description: string_value(remote.description.clone()),
            total_machines: Value::Value(remote.total_machines),
            associated_machine_catalogs: Value::Value(associations),
        }
    }

    /// Known associations of the plan
    pub fn associations(&self) -> Vec<CatalogCount> {
        self.associated_machine_catalogs
            .iter()
            .flatten()
            .filter_map(|association| {
                let association = association.as_ref_option()?;
                Some(CatalogCount {
                    catalog: association.machine_catalog.as_deref_option()?.to_owned(),
                    count: association
                        .machine_count
                        .as_ref_option()
                        .copied()
                        .unwrap_or_default(),
                })
            })
            .collect()
    }
}

impl<'a> WithValidate for DeliveryGroupState<'a> {
    fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        require_non_empty(diags, &self.name, "name", attr_path.clone().attribute("name"));
        let path = attr_path.attribute("associated_machine_catalogs");
        let mut seen: Vec<String> = Vec::new();
        for (i, association) in self.associated_machine_catalogs.iter().flatten().enumerate() {
            let Value::Value(association) = association else {
                continue;
            };
            let path = path.clone().index(i as i64);
            require_non_empty(
                diags,
                &association.machine_catalog,
                "machine_catalog",
                path.clone().attribute("machine_catalog"),
            );
            if let Some(catalog) = association.machine_catalog.as_deref_option() {
                if !catalog.is_empty() && uuid::Uuid::parse_str(catalog).is_err() {
                    diags.error(
                        "Invalid `machine_catalog`",
                        format!("`{}` is not a machine catalog id.", catalog),
                        path.clone().attribute("machine_catalog"),
                    );
                }
                let catalog = catalog.to_lowercase();
                if seen.contains(&catalog) {
                    diags.error_short(
                        "Machine catalog associated twice",
                        path.clone().attribute("machine_catalog"),
                    );
                } else {
                    seen.push(catalog);
                }
            }
            if let Value::Value(count) = association.machine_count {
                if count < 0 {
                    diags.error_short(
                        "`machine_count` cannot be negative",
                        path.attribute("machine_count"),
                    );
                }
            }
        }
    }
}

impl<'a> WithSchema for DeliveryGroupState<'a> {
    fn schema() -> Schema {
        Schema {
            version: 1,
            block: Block {
                version: 1,
                attributes: map! {
                    "id" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("GUID identifier of the delivery group"),
                        constraint: AttributeConstraint::Computed,
                        ..Default::default()
                    },
                    "name" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("Name of the delivery group"),
                        constraint: AttributeConstraint::Required,
                        ..Default::default()
                    },
                    "description" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("Description of the delivery group"),
                        constraint: AttributeConstraint::Optional,
                        ..Default::default()
                    },
                    "total_machines" => Attribute {
                        attr_type: AttributeType::Number,
                        description: Description::plain("Number of machines in the delivery group"),
                        constraint: AttributeConstraint::Computed,
                        ..Default::default()
                    },
                },
                blocks: map! {
                    "associated_machine_catalogs" => NestedBlock::List(Block {
                        attributes: map! {
                            "machine_catalog" => Attribute {
                                attr_type: AttributeType::String,
                                description: Description::plain("GUID of the machine catalog"),
                                constraint: AttributeConstraint::Required,
                                ..Default::default()
                            },
                            "machine_count" => Attribute {
                                attr_type: AttributeType::Number,
                                description: Description::plain("Number of machines taken from the catalog"),
                                constraint: AttributeConstraint::Required,
                                ..Default::default()
                            },
                        },
                        description: Description::plain("Machine catalogs providing the machines"),
                        ..Default::default()
                    }),
                },
                description: Description::plain("Manages a delivery group"),
                ..Default::default()
            },
        }
    }
}
