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

use std::collections::HashMap;
use std::fmt::Debug;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};
use tf_provider::schema::Attribute;
use tf_provider::value::{Value, ValueList, ValueString};
use tf_provider::{AttributePath, Diagnostics};

pub use aws::Aws;
pub use azure::Azure;
pub use data_source::HypervisorDataSource;
pub use gcp::Gcp;
pub use resource::HypervisorResource;
pub use resource_pool::ResourcePoolResource;

use crate::reconcile::reconcile;
use crate::resolver::{ResolveError, ResourceResolver};
use crate::utils::string_value;

mod aws;
mod azure;
mod data_source;
mod gcp;
mod resource;
mod resource_pool;
mod state;

/// Reference to another remote object
#[derive(Clone, PartialEq, Eq, Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RefDto {
    pub id: String,
    pub name: String,
    #[serde(rename = "XDPath")]
    pub xd_path: String,
}

/// `GET /hypervisors/{nameOrId}`
///
/// Secrets are never returned by the remote service.
#[derive(Clone, PartialEq, Eq, Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct HypervisorDto {
    pub id: String,
    pub name: String,
    pub connection_type: String,
    pub zone: RefDto,
    pub application_id: String,
    pub subscription_id: String,
    pub active_directory_id: String,
    pub application_secret_expiration_date: String,
    pub region: String,
    pub api_key: String,
    pub service_account_id: String,
}

/// `GET /hypervisors/{id}/resourcePools/{id}`
#[derive(Clone, PartialEq, Eq, Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ResourcePoolDto {
    pub id: String,
    pub name: String,
    pub hypervisor: RefDto,
    pub connection_type: String,
    pub region: RefDto,
    pub project: RefDto,
    pub virtual_network_resource_group: RefDto,
    pub virtual_network: RefDto,
    pub virtual_private_cloud: RefDto,
    pub availability_zone: RefDto,
    pub subnets: Vec<RefDto>,
}

/// Cloud specific part of the hypervisor and resource pool resources
#[async_trait]
pub trait HypervisorKind: Send + Sync + 'static + Default + Debug + Clone {
    /// Prefix of the resource names (`azure`, `aws`, `gcp`)
    const NAME: &'static str;
    /// `ConnectionType` sent to and returned by the remote service
    const CONNECTION_TYPE: &'static str;

    /// Connection attributes of the hypervisor
    type Connection<'a>: Send
        + Sync
        + Clone
        + Debug
        + Default
        + PartialEq
        + Serialize
        + for<'de> Deserialize<'de>;
    /// Network attributes of the resource pool
    type Pool<'a>: Send + Sync + Clone + Debug + Default + PartialEq + Serialize + for<'de> Deserialize<'de>;

    fn connection_schema() -> HashMap<String, Attribute>;
    /// Local checks, run before any request
    fn validate_connection(diags: &mut Diagnostics, connection: &Self::Connection<'_>);
    /// Cloud specific fields of the create/update body
    fn connection_body(connection: &Self::Connection<'_>) -> Map<String, Json>;
    /// Merge the remote hypervisor into the prior connection
    ///
    /// Secrets are kept from the prior state.
    fn refresh_connection<'a>(
        prior: Self::Connection<'a>,
        remote: &HypervisorDto,
    ) -> Self::Connection<'a>
    where
        'a: 'a;
    /// Attributes that cannot be changed in place
    fn connection_replacements(
        prior: &Self::Connection<'_>,
        planned: &Self::Connection<'_>,
    ) -> Vec<AttributePath> {
        _ = prior;
        _ = planned;
        Vec::new()
    }

    fn pool_schema() -> HashMap<String, Attribute>;
    fn validate_pool(diags: &mut Diagnostics, pool: &Self::Pool<'_>);
    /// Resolve the display names to `XDPath` and build the create body
    async fn pool_body<'a>(
        resolver: &ResourceResolver<'_>,
        pool: &Self::Pool<'a>,
    ) -> Result<Map<String, Json>, ResolveError>;
    fn refresh_pool<'a>(prior: Self::Pool<'a>, remote: &ResourcePoolDto) -> Self::Pool<'a>
    where
        'a: 'a;
    fn pool_replacements(prior: &Self::Pool<'_>, planned: &Self::Pool<'_>) -> Vec<AttributePath>;
    /// Subnet names of the pool, the only network attribute updatable in place
    fn pool_subnets(pool: &Self::Pool<'_>) -> Vec<String>;
}

/// Subnet list of a pool, keeping the prior order
pub(crate) fn refresh_subnets<'a>(
    prior: ValueList<ValueString<'a>>,
    remote: &[RefDto],
) -> ValueList<ValueString<'a>> {
    let prior = prior.unwrap_or_default();
    let subnets = reconcile(
        prior,
        remote,
        |p: &ValueString<'a>| p.as_ref_option().map(|s| s.to_lowercase()),
        |r: &RefDto| r.name.to_lowercase(),
        |prior, r| prior.unwrap_or_else(|| Value::Value(r.name.clone().into())),
    );
    Value::Value(subnets)
}

/// Known subnet names
pub(crate) fn subnet_names(subnets: &ValueList<ValueString<'_>>) -> Vec<String> {
    subnets
        .iter()
        .flatten()
        .filter_map(|subnet| subnet.as_deref_option().map(str::to_owned))
        .collect()
}

/// The remote service may report another casing or the internal name of a
/// region; the configured name is kept when both designate the same object.
pub(crate) fn keep_display_name<'a>(prior: ValueString<'a>, remote: &str) -> ValueString<'a> {
    let same = prior.as_deref_option().is_some_and(|p| {
        p.eq_ignore_ascii_case(remote) || p.replace(' ', "").eq_ignore_ascii_case(remote)
    });
    if same || (remote.is_empty() && prior.is_value()) {
        prior
    } else {
        string_value(remote)
    }
}

/// Keep the configured name or id of a referenced object when it still
/// designates the remote one.
pub(crate) fn keep_reference<'a>(prior: ValueString<'a>, remote: &RefDto) -> ValueString<'a> {
    let same = prior.as_deref_option().is_some_and(|p| {
        p.eq_ignore_ascii_case(&remote.id) || p.eq_ignore_ascii_case(&remote.name)
    });
    if same || remote.id.is_empty() {
        prior
    } else {
        string_value(remote.id.clone())
    }
}
