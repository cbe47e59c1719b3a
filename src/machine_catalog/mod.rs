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

//! MCS machine catalogs

use serde::Deserialize;

use crate::hypervisor::RefDto;

pub use resource::MachineCatalogResource;

mod resource;
mod state;

pub const ALLOCATION_TYPES: &[&str] = &["Random", "Static"];
pub const SESSION_SUPPORTS: &[&str] = &["MultiSession", "SingleSession"];
pub const IDENTITY_TYPES: &[&str] = &["ActiveDirectory", "AzureAD", "HybridAzureAD", "Workgroup"];
pub const NAMING_SCHEME_TYPES: &[&str] = &["Numeric", "Alphabetic"];

/// `GET /MachineCatalogs/{nameOrId}`
#[derive(Clone, PartialEq, Eq, Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct MachineCatalogDto {
    pub id: String,
    pub name: String,
    pub description: String,
    pub zone: RefDto,
    pub allocation_type: String,
    pub session_support: String,
    pub total_count: i64,
    pub provisioning_scheme: Option<ProvisioningSchemeDto>,
}

#[derive(Clone, PartialEq, Eq, Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ProvisioningSchemeDto {
    pub identity_type: String,
    pub resource_pool: PoolRefDto,
    pub master_image: RefDto,
    pub service_offering: String,
    pub machine_account_creation_rules: NamingRulesDto,
    pub network_maps: Vec<NetworkMapDto>,
}

#[derive(Clone, PartialEq, Eq, Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct PoolRefDto {
    pub id: String,
    pub name: String,
    pub hypervisor: RefDto,
}

#[derive(Clone, PartialEq, Eq, Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct NamingRulesDto {
    pub naming_scheme: String,
    pub naming_scheme_type: String,
}

#[derive(Clone, PartialEq, Eq, Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct NetworkMapDto {
    pub network_device_name_or_id: String,
    pub network: RefDto,
}

/// Item of `GET /MachineCatalogs/{id}/Machines` and `GET /DeliveryGroups/{id}/Machines`
#[derive(Clone, PartialEq, Eq, Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct MachineDto {
    pub id: String,
    pub name: String,
    pub machine_catalog: Option<RefDto>,
    pub delivery_group: Option<RefDto>,
}
