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
    Attribute, AttributeConstraint, AttributeType, Block, Description, Schema,
};
use tf_provider::value::ValueString;
use tf_provider::map;

use crate::utils::{string_value, WithSchema};

use super::{keep_reference, HypervisorDto, HypervisorKind, ResourcePoolDto};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HypervisorState<'a, K>
where
    K: HypervisorKind,
{
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub name: ValueString<'a>,
    pub zone: ValueString<'a>,
    #[serde(flatten)]
    pub connection: K::Connection<'a>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ResourcePoolState<'a, K>
where
    K: HypervisorKind,
{
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub name: ValueString<'a>,
    pub hypervisor: ValueString<'a>,
    #[serde(flatten)]
    pub pool: K::Pool<'a>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DataSourceState<'a> {
    #[serde(borrow = "'a")]
    pub name: ValueString<'a>,
    pub id: ValueString<'a>,
    pub connection_type: ValueString<'a>,
    pub zone: ValueString<'a>,
}

impl<'a, K: HypervisorKind> HypervisorState<'a, K> {
    /// Map the remote hypervisor onto the prior state
    pub fn refresh(self, remote: &HypervisorDto) -> Self {
        Self {
            id: string_value(remote.id.clone()),
            name: string_value(remote.name.clone()),
            zone: keep_reference(self.zone, &remote.zone),
            connection: K::refresh_connection(self.connection, remote),
        }
    }
}

impl<'a, K: HypervisorKind> ResourcePoolState<'a, K> {
    pub fn refresh(self, remote: &ResourcePoolDto) -> Self {
        Self {
            id: string_value(remote.id.clone()),
            name: string_value(remote.name.clone()),
            hypervisor: keep_reference(self.hypervisor, &remote.hypervisor),
            pool: K::refresh_pool(self.pool, remote),
        }
    }
}

impl<'a> DataSourceState<'a> {
    pub fn refresh(self, remote: &HypervisorDto) -> Self {
        Self {
            name: self.name,
            id: string_value(remote.id.clone()),
            connection_type: string_value(remote.connection_type.clone()),
            zone: string_value(remote.zone.id.clone()),
        }
    }
}

impl<'a, K: HypervisorKind> WithSchema for HypervisorState<'a, K> {
    fn schema() -> Schema {
        let mut attributes = map! {
            "id" => Attribute {
                attr_type: AttributeType::String,
                description: Description::plain("GUID identifier of the hypervisor"),
                constraint: AttributeConstraint::Computed,
                ..Default::default()
            },
            "name" => Attribute {
                attr_type: AttributeType::String,
                description: Description::plain("Name of the hypervisor"),
                constraint: AttributeConstraint::Required,
                ..Default::default()
            },
            "zone" => Attribute {
                attr_type: AttributeType::String,
                description: Description::plain("Id of the zone the hypervisor is associated with"),
                constraint: AttributeConstraint::Required,
                ..Default::default()
            },
        };
        attributes.extend(K::connection_schema());
        Schema {
            version: 1,
            block: Block {
                version: 1,
                attributes,
                description: Description::plain(format!(
                    "Manages a {} hypervisor connection",
                    K::NAME
                )),
                ..Default::default()
            },
        }
    }
}

impl<'a, K: HypervisorKind> WithSchema for ResourcePoolState<'a, K> {
    fn schema() -> Schema {
        let mut attributes = map! {
            "id" => Attribute {
                attr_type: AttributeType::String,
                description: Description::plain("GUID identifier of the resource pool"),
                constraint: AttributeConstraint::Computed,
                ..Default::default()
            },
            "name" => Attribute {
                attr_type: AttributeType::String,
                description: Description::plain("Name of the resource pool"),
                constraint: AttributeConstraint::Required,
                ..Default::default()
            },
            "hypervisor" => Attribute {
                attr_type: AttributeType::String,
                description: Description::plain("Id of the hypervisor the resource pool belongs to"),
                constraint: AttributeConstraint::Required,
                ..Default::default()
            },
        };
        attributes.extend(K::pool_schema());
        Schema {
            version: 1,
            block: Block {
                version: 1,
                attributes,
                description: Description::plain(format!(
                    "Manages a resource pool of a {} hypervisor",
                    K::NAME
                )),
                ..Default::default()
            },
        }
    }
}

impl<'a> WithSchema for DataSourceState<'a> {
    fn schema() -> Schema {
        Schema {
            version: 1,
            block: Block {
                version: 1,
                attributes: map! {
                    "name" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("Name of the hypervisor"),
                        constraint: AttributeConstraint::Required,
                        ..Default::default()
                    },
                    "id" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("GUID identifier of the hypervisor"),
                        constraint: AttributeConstraint::Computed,
                        ..Default::default()
                    },
                    "connection_type" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("Connection type of the hypervisor"),
                        constraint: AttributeConstraint::Computed,
                        ..Default::default()
                    },
                    "zone" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("Id of the zone of the hypervisor"),
                        constraint: AttributeConstraint::Computed,
                        ..Default::default()
                    },
                },
                description: Description::plain("Reads a hypervisor connection by name"),
                ..Default::default()
            },
        }
    }
}
