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

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value as Json};
use tf_provider::schema::{Attribute, AttributeConstraint, AttributeType, Description};
use tf_provider::value::{ValueList, ValueString};
use tf_provider::{map, AttributePath, Diagnostics};

use crate::resolver::{ResolveError, ResourceResolver, Step};
use crate::utils::{optional_string, require_non_empty, str_of, string_value};

use super::{
    keep_display_name, refresh_subnets, subnet_names, HypervisorDto, HypervisorKind,
    ResourcePoolDto,
};

#[derive(Debug, Default, Clone)]
pub struct Azure;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AzureConnection<'a> {
    pub application_id: ValueString<'a>,
    pub application_secret: ValueString<'a>,
    pub application_secret_expiration_date: ValueString<'a>,
    pub subscription_id: ValueString<'a>,
    pub active_directory_id: ValueString<'a>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AzurePool<'a> {
    pub region: ValueString<'a>,
    pub virtual_network_resource_group: ValueString<'a>,
    pub virtual_network: ValueString<'a>,
    pub subnets: ValueList<ValueString<'a>>,
}

fn string_attribute(description: &str, constraint: AttributeConstraint) -> Attribute {
    Attribute {
        attr_type: AttributeType::String,
        description: Description::plain(description),
        constraint,
        ..Default::default()
    }
}

#[async_trait]
impl HypervisorKind for Azure {
    const NAME: &'static str = "azure";
    const CONNECTION_TYPE: &'static str = "AzureRM";

    type Connection<'a> = AzureConnection<'a>;
    type Pool<'a> = AzurePool<'a>;

    fn connection_schema() -> HashMap<String, Attribute> {
        map! {
            "application_id" => string_attribute("Application id of the service principal", AttributeConstraint::Required),
            "application_secret" => Attribute {
                sensitive: true,
                ..string_attribute("Secret of the service principal", AttributeConstraint::Required)
            },
            "application_secret_expiration_date" => string_attribute(
                "Expiration date of the secret, `YYYY-MM-DD`",
                AttributeConstraint::Optional,
            ),
            "subscription_id" => string_attribute("Azure subscription id", AttributeConstraint::Required),
            "active_directory_id" => string_attribute("Azure tenant id", AttributeConstraint::Required),
        }
    }

    fn validate_connection(diags: &mut Diagnostics, connection: &AzureConnection<'_>) {
        for (name, value) in [
            ("application_id", &connection.application_id),
            ("application_secret", &connection.application_secret),
            ("subscription_id", &connection.subscription_id),
            ("active_directory_id", &connection.active_directory_id),
        ] {
            require_non_empty(diags, value, name, AttributePath::new(name));
        }
        if let Some(date) = connection.application_secret_expiration_date.as_deref_option() {
            let valid = date.len() == 10
                && date.char_indices().all(|(i, c)| match i {
                    4 | 7 => c == '-',
                    _ => c.is_ascii_digit(),
                });
            if !valid {
                diags.error(
                    "Invalid `application_secret_expiration_date`",
                    format!("`{}` is not a date in the `YYYY-MM-DD` format.", date),
                    AttributePath::new("application_secret_expiration_date"),
                );
            }
        }
    }

    fn connection_body(connection: &AzureConnection<'_>) -> Map<String, Json> {
        let mut body = Map::new();
        body.insert("ApplicationId".into(), json!(str_of(&connection.application_id)));
        body.insert(
            "ApplicationSecret".into(),
            json!(str_of(&connection.application_secret)),
        );
        body.insert("SubscriptionId".into(), json!(str_of(&connection.subscription_id)));
        body.insert(
            "ActiveDirectoryId".into(),
            json!(str_of(&connection.active_directory_id)),
        );
        body.insert("Environment".into(), json!("AzureCloud"));
        if let Some(date) = connection.application_secret_expiration_date.as_deref_option() {
            body.insert("ApplicationSecretExpiryDate".into(), json!(date));
        }
        body
    }

    fn refresh_connection<'a>(
        prior: AzureConnection<'a>,
        remote: &HypervisorDto,
    ) -> AzureConnection<'a>
    where
        'a: 'a,
    {
        AzureConnection {
            application_id: string_value(remote.application_id.clone()),
            subscription_id: string_value(remote.subscription_id.clone()),
            active_directory_id: string_value(remote.active_directory_id.clone()),
            application_secret_expiration_date: if prior
                .application_secret_expiration_date
                .is_null()
            {
                prior.application_secret_expiration_date
            } else {
                optional_string(
                    remote
                        .application_secret_expiration_date
                        .get(..10)
                        .map(str::to_owned),
                )
            },
            application_secret: prior.application_secret,
        }
    }

    fn connection_replacements(
        prior: &AzureConnection<'_>,
        planned: &AzureConnection<'_>,
    ) -> Vec<AttributePath> {
        // the tenant of a connection cannot move
        if prior.active_directory_id.is_value()
            && prior.active_directory_id != planned.active_directory_id
        {
            vec![AttributePath::new("active_directory_id")]
        } else {
            Vec::new()
        }
    }

    fn pool_schema() -> HashMap<String, Attribute> {
        map! {
            "region" => string_attribute("Azure region, as displayed by Azure (`East US`)", AttributeConstraint::Required),
            "virtual_network_resource_group" => string_attribute("Resource group of the virtual network", AttributeConstraint::Required),
            "virtual_network" => string_attribute("Name of the virtual network", AttributeConstraint::Required),
            "subnets" => Attribute {
                attr_type: AttributeType::List(AttributeType::String.into()),
                description: Description::plain("Subnets of the virtual network used by the machines"),
                constraint: AttributeConstraint::Required,
                ..Default::default()
            },
        }
    }

    fn validate_pool(diags: &mut Diagnostics, pool: &AzurePool<'_>) {
        for (name, value) in [
            ("region", &pool.region),
            ("virtual_network_resource_group", &pool.virtual_network_resource_group),
            ("virtual_network", &pool.virtual_network),
        ] {
            require_non_empty(diags, value, name, AttributePath::new(name));
        }
        if pool.subnets.as_ref_option().is_some_and(Vec::is_empty) {
            diags.error_short("`subnets` cannot be empty", AttributePath::new("subnets"));
        }
    }

    async fn pool_body<'a>(
        resolver: &ResourceResolver<'_>,
        pool: &AzurePool<'a>,
    ) -> Result<Map<String, Json>, ResolveError> {
        let region = resolver
            .resolve("", &[Step::new(str_of(&pool.region), "Region")])
            .await?;
        let network = resolver
            .resolve(
                &region.full_relative_path,
                &[
                    Step::new(
                        str_of(&pool.virtual_network_resource_group),
                        "ResourceGroup",
                    ),
                    Step::new(str_of(&pool.virtual_network), "VirtualPrivateCloud"),
                ],
            )
            .await?;
        let subnets = resolver
            .resolve_siblings(
                &network.full_relative_path,
                &subnet_names(&pool.subnets),
                "Network",
            )
            .await?;

        let mut body = Map::new();
        body.insert("Region".into(), json!(region.xd_path));
        body.insert("VirtualNetwork".into(), json!(network.xd_path));
        body.insert(
            "Subnets".into(),
            Json::Array(subnets.into_iter().map(|s| json!(s.xd_path)).collect()),
        );
        Ok(body)
    }

    fn refresh_pool<'a>(prior: AzurePool<'a>, remote: &ResourcePoolDto) -> AzurePool<'a>
    where
        'a: 'a,
    {
        AzurePool {
            region: keep_display_name(prior.region, &remote.region.name),
            virtual_network_resource_group: keep_display_name(
                prior.virtual_network_resource_group,
                &remote.virtual_network_resource_group.name,
            ),
            virtual_network: keep_display_name(prior.virtual_network, &remote.virtual_network.name),
            subnets: refresh_subnets(prior.subnets, &remote.subnets),
        }
    }

    fn pool_replacements(prior: &AzurePool<'_>, planned: &AzurePool<'_>) -> Vec<AttributePath> {
        let mut replace = Vec::new();
        if prior.region != planned.region {
            replace.push(AttributePath::new("region"));
        }
        if prior.virtual_network_resource_group != planned.virtual_network_resource_group {
            replace.push(AttributePath::new("virtual_network_resource_group"));
        }
        if prior.virtual_network != planned.virtual_network {
            replace.push(AttributePath::new("virtual_network"));
        }
        replace
    }

    fn pool_subnets(pool: &AzurePool<'_>) -> Vec<String> {
        subnet_names(&pool.subnets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::testing::{test_client, FakeTransport};
    use crate::client::Method;

    fn connection() -> AzureConnection<'static> {
        AzureConnection {
            application_id: ValueString::from("app"),
            application_secret: ValueString::from("secret"),
            application_secret_expiration_date: ValueString::Null,
            subscription_id: ValueString::from("sub"),
            active_directory_id: ValueString::from("tenant"),
        }
    }

    #[test]
    fn empty_secret_is_rejected() {
        let mut diags = Diagnostics::default();
        Azure::validate_connection(
            &mut diags,
            &AzureConnection {
                application_secret: ValueString::from(""),
                ..connection()
            },
        );
        assert_eq!(diags.errors.len(), 1);
        assert_eq!(
            diags.errors[0].attribute,
            AttributePath::new("application_secret")
        );
    }

    #[test]
    fn malformed_expiration_date_is_rejected() {
        let mut diags = Diagnostics::default();
        Azure::validate_connection(
            &mut diags,
            &AzureConnection {
                application_secret_expiration_date: ValueString::from("2024/01/01"),
                ..connection()
            },
        );
        assert_eq!(diags.errors.len(), 1);
    }

    #[test]
    fn refresh_keeps_secret() {
        let remote = HypervisorDto {
            application_id: "app2".into(),
            subscription_id: "sub".into(),
            active_directory_id: "tenant".into(),
            application_secret_expiration_date: "2030-01-01T00:00:00Z".into(),
            ..Default::default()
        };
        let refreshed = Azure::refresh_connection(connection(), &remote);
        assert_eq!(refreshed.application_id, ValueString::from("app2"));
        assert_eq!(refreshed.application_secret, ValueString::from("secret"));
        assert_eq!(refreshed.application_secret_expiration_date, ValueString::Null);
    }

    #[test]
    fn connection_survives_a_round_trip() {
        let configured = AzureConnection {
            application_secret_expiration_date: ValueString::from("2030-06-30"),
            ..connection()
        };
        let body = Azure::connection_body(&configured);
        let expiry = body["ApplicationSecretExpiryDate"].as_str().unwrap();

        // secrets are write only, dates come back as timestamps
        let remote: HypervisorDto = serde_json::from_value(json!({
            "Id": "hyp",
            "Name": "azure",
            "ConnectionType": "AzureRM",
            "ApplicationId": body["ApplicationId"],
            "SubscriptionId": body["SubscriptionId"],
            "ActiveDirectoryId": body["ActiveDirectoryId"],
            "ApplicationSecretExpirationDate": format!("{}T00:00:00Z", expiry),
        }))
        .unwrap();
        assert_eq!(Azure::refresh_connection(configured.clone(), &remote), configured);
    }

    #[tokio::test]
    async fn pool_survives_a_round_trip() {
        let transport = FakeTransport::new();
        for children in [
            json!([{"Name": "East US", "ResourceType": "Region", "FullRelativePath": "eastus.region", "XDPath": r"XDHyp:\c\eastus.region"}]),
            json!([{"Name": "rg-net", "ResourceType": "ResourceGroup", "FullRelativePath": "eastus.region/rg-net.resourcegroup", "XDPath": r"XDHyp:\c\eastus.region\rg-net.resourcegroup"}]),
            json!([{"Name": "vnet", "ResourceType": "VirtualPrivateCloud", "FullRelativePath": "eastus.region/rg-net.resourcegroup/vnet.virtualprivatecloud", "XDPath": r"XDHyp:\c\eastus.region\rg-net.resourcegroup\vnet.virtualprivatecloud"}]),
            json!([
                {"Name": "subnet-a", "ResourceType": "Network", "XDPath": r"XDHyp:\c\vnet\subnet-a.network"},
                {"Name": "subnet-b", "ResourceType": "Network", "XDPath": r"XDHyp:\c\vnet\subnet-b.network"},
            ]),
        ] {
            transport.push_json(Method::Get, "allResources", 200, json!({ "Children": children }));
        }
        let client = test_client(&transport);
        let resolver = ResourceResolver::for_hypervisor(&client, "hyp");
        let configured = AzurePool {
            region: ValueString::from("East US"),
            virtual_network_resource_group: ValueString::from("rg-net"),
            virtual_network: ValueString::from("vnet"),
            subnets: ValueList::Value(vec![
                ValueString::from("subnet-b"),
                ValueString::from("subnet-a"),
            ]),
        };

        let body = Azure::pool_body(&resolver, &configured).await.unwrap();
        assert_eq!(
            body["Subnets"],
            json!([r"XDHyp:\c\vnet\subnet-b.network", r"XDHyp:\c\vnet\subnet-a.network"])
        );

        // the service reports the internal region name and its own subnet order
        let remote: ResourcePoolDto = serde_json::from_value(json!({
            "Id": "pool",
            "Name": "pool",
            "ConnectionType": "AzureRM",
            "Region": {"Name": "eastus", "XDPath": body["Region"]},
            "VirtualNetworkResourceGroup": {"Name": "rg-net"},
            "VirtualNetwork": {"Name": "vnet", "XDPath": body["VirtualNetwork"]},
            "Subnets": [{"Name": "subnet-a"}, {"Name": "subnet-b"}],
        }))
        .unwrap();
        assert_eq!(Azure::refresh_pool(configured.clone(), &remote), configured);
        assert_eq!(transport.remaining(), 0);
    }

    #[test]
    fn region_display_name_is_kept() {
        assert_eq!(
            keep_display_name(ValueString::from("East US"), "eastus"),
            ValueString::from("East US")
        );
        assert_eq!(
            keep_display_name(ValueString::from("East US"), "westeurope"),
            ValueString::from("westeurope")
        );
    }
}
