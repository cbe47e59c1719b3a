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
use crate::utils::{require_non_empty, str_of, string_value};

use super::{
    keep_display_name, refresh_subnets, subnet_names, HypervisorDto, HypervisorKind,
    ResourcePoolDto,
};

#[derive(Debug, Default, Clone)]
pub struct Gcp;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GcpConnection<'a> {
    pub service_account_id: ValueString<'a>,
    pub service_account_credentials: ValueString<'a>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GcpPool<'a> {
    pub project_name: ValueString<'a>,
    pub region: ValueString<'a>,
    pub vpc: ValueString<'a>,
    pub subnets: ValueList<ValueString<'a>>,
}

#[async_trait]
impl HypervisorKind for Gcp {
    const NAME: &'static str = "gcp";
    const CONNECTION_TYPE: &'static str = "GoogleCloudPlatform";

    type Connection<'a> = GcpConnection<'a>;
    type Pool<'a> = GcpPool<'a>;

    fn connection_schema() -> HashMap<String, Attribute> {
        map! {
            "service_account_id" => Attribute {
                attr_type: AttributeType::String,
                description: Description::plain("Email of the service account"),
                constraint: AttributeConstraint::Required,
                ..Default::default()
            },
            "service_account_credentials" => Attribute {
                attr_type: AttributeType::String,
                description: Description::plain("JSON key of the service account"),
                constraint: AttributeConstraint::Required,
                sensitive: true,
                ..Default::default()
            },
        }
    }

    fn validate_connection(diags: &mut Diagnostics, connection: &GcpConnection<'_>) {
        require_non_empty(
            diags,
            &connection.service_account_id,
            "service_account_id",
            AttributePath::new("service_account_id"),
        );
        require_non_empty(
            diags,
            &connection.service_account_credentials,
            "service_account_credentials",
            AttributePath::new("service_account_credentials"),
        );
        if let Some(credentials) = connection.service_account_credentials.as_deref_option() {
            if !credentials.is_empty()
                && serde_json::from_str::<serde_json::Map<String, Json>>(credentials).is_err()
            {
                diags.error(
                    "Invalid `service_account_credentials`",
                    "The credentials must be the JSON key of the service account.",
                    AttributePath::new("service_account_credentials"),
                );
            }
        }
    }

    fn connection_body(connection: &GcpConnection<'_>) -> Map<String, Json> {
        let mut body = Map::new();
        body.insert(
            "ServiceAccountId".into(),
            json!(str_of(&connection.service_account_id)),
        );
        body.insert(
            "ServiceAccountCredentials".into(),
            json!(str_of(&connection.service_account_credentials)),
        );
        body
    }

    fn refresh_connection<'a>(prior: GcpConnection<'a>, remote: &HypervisorDto) -> GcpConnection<'a>
    where
        'a: 'a,
    {
        GcpConnection {
            service_account_id: string_value(remote.service_account_id.clone()),
            service_account_credentials: prior.service_account_credentials,
        }
    }

    fn pool_schema() -> HashMap<String, Attribute> {
        let string_attribute = |description: &str| Attribute {
            attr_type: AttributeType::String,
            description: Description::plain(description),
            constraint: AttributeConstraint::Required,
            ..Default::default()
        };
        map! {
            "project_name" => string_attribute("Name of the Google Cloud project"),
            "region" => string_attribute("Region of the machines (`us-east1`)"),
            "vpc" => string_attribute("Name of the VPC network"),
            "subnets" => Attribute {
                attr_type: AttributeType::List(AttributeType::String.into()),
                description: Description::plain("Subnets used by the machines"),
                constraint: AttributeConstraint::Required,
                ..Default::default()
            },
        }
    }

    fn validate_pool(diags: &mut Diagnostics, pool: &GcpPool<'_>) {
        for (name, value) in [
            ("project_name", &pool.project_name),
            ("region", &pool.region),
            ("vpc", &pool.vpc),
        ] {
            require_non_empty(diags, value, name, AttributePath::new(name));
        }
        if pool.subnets.as_ref_option().is_some_and(Vec::is_empty) {
            diags.error_short("`subnets` cannot be empty", AttributePath::new("subnets"));
        }
    }

    async fn pool_body<'a>(
        resolver: &ResourceResolver<'_>,
        pool: &GcpPool<'a>,
    ) -> Result<Map<String, Json>, ResolveError> {
        let project = resolver
            .resolve("", &[Step::new(str_of(&pool.project_name), "Project")])
            .await?;
        let region = resolver
            .resolve(
                &project.full_relative_path,
                &[Step::new(str_of(&pool.region), "Region")],
            )
            .await?;
        let vpc = resolver
            .resolve(
                &project.full_relative_path,
                &[Step::new(str_of(&pool.vpc), "VirtualPrivateCloud")],
            )
            .await?;
        let subnets = resolver
            .resolve_siblings(&region.full_relative_path, &subnet_names(&pool.subnets), "Network")
            .await?;

        let mut body = Map::new();
        body.insert("Project".into(), json!(project.xd_path));
        body.insert("Region".into(), json!(region.xd_path));
        body.insert("VirtualPrivateCloud".into(), json!(vpc.xd_path));
        body.insert(
            "Subnets".into(),
            Json::Array(subnets.into_iter().map(|s| json!(s.xd_path)).collect()),
        );
        Ok(body)
    }

    fn refresh_pool<'a>(prior: GcpPool<'a>, remote: &ResourcePoolDto) -> GcpPool<'a>
    where
        'a: 'a,
    {
        GcpPool {
            project_name: keep_display_name(prior.project_name, &remote.project.name),
            region: keep_display_name(prior.region, &remote.region.name),
            vpc: keep_display_name(prior.vpc, &remote.virtual_private_cloud.name),
            subnets: refresh_subnets(prior.subnets, &remote.subnets),
        }
    }

    fn pool_replacements(prior: &GcpPool<'_>, planned: &GcpPool<'_>) -> Vec<AttributePath> {
        [
            ("project_name", prior.project_name != planned.project_name),
            ("region", prior.region != planned.region),
            ("vpc", prior.vpc != planned.vpc),
        ]
        .into_iter()
        .filter(|(_, changed)| *changed)
        .map(|(name, _)| AttributePath::new(name))
        .collect()
    }

    fn pool_subnets(pool: &GcpPool<'_>) -> Vec<String> {
        subnet_names(&pool.subnets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::testing::{test_client, FakeTransport};
    use crate::client::Method;
    use crate::hypervisor::RefDto;

    #[test]
    fn credentials_must_be_json() {
        let mut diags = Diagnostics::default();
        Gcp::validate_connection(
            &mut diags,
            &GcpConnection {
                service_account_id: ValueString::from("sa@project.iam.gserviceaccount.com"),
                service_account_credentials: ValueString::from("not json"),
            },
        );
        assert_eq!(diags.errors.len(), 1);
    }

    #[test]
    fn connection_survives_a_round_trip() {
        let configured = GcpConnection {
            service_account_id: ValueString::from("sa@project.iam.gserviceaccount.com"),
            service_account_credentials: ValueString::from(r#"{"type": "service_account"}"#),
        };
        let body = Gcp::connection_body(&configured);

        let remote: HypervisorDto = serde_json::from_value(json!({
            "Id": "hyp",
            "Name": "gcp",
            "ConnectionType": "GoogleCloudPlatform",
            "ServiceAccountId": body["ServiceAccountId"],
        }))
        .unwrap();
        assert_eq!(Gcp::refresh_connection(configured.clone(), &remote), configured);
    }

    #[tokio::test]
    async fn pool_survives_a_round_trip() {
        let transport = FakeTransport::new();
        for children in [
            json!([{"Name": "my-project", "ResourceType": "Project", "FullRelativePath": "my-project.project", "XDPath": r"XDHyp:\c\my-project.project"}]),
            json!([{"Name": "us-east1", "ResourceType": "Region", "FullRelativePath": "my-project.project/us-east1.region", "XDPath": r"XDHyp:\c\my-project.project\us-east1.region"}]),
            json!([{"Name": "default", "ResourceType": "VirtualPrivateCloud", "FullRelativePath": "my-project.project/default.virtualprivatecloud", "XDPath": r"XDHyp:\c\my-project.project\default.virtualprivatecloud"}]),
            json!([
                {"Name": "default", "ResourceType": "Network", "XDPath": r"XDHyp:\c\us-east1.region\default.network"},
            ]),
        ] {
            transport.push_json(Method::Get, "allResources", 200, json!({ "Children": children }));
        }
        let client = test_client(&transport);
        let resolver = ResourceResolver::for_hypervisor(&client, "hyp");
        let configured = GcpPool {
            project_name: ValueString::from("my-project"),
            region: ValueString::from("us-east1"),
            vpc: ValueString::from("default"),
            subnets: ValueList::Value(vec![ValueString::from("default")]),
        };

        let body = Gcp::pool_body(&resolver, &configured).await.unwrap();
        assert_eq!(body["Project"], json!(r"XDHyp:\c\my-project.project"));

        let remote: ResourcePoolDto = serde_json::from_value(json!({
            "Id": "pool",
            "Name": "pool",
            "ConnectionType": "GoogleCloudPlatform",
            "Project": {"Name": "My-Project", "XDPath": body["Project"]},
            "Region": {"Name": "us-east1", "XDPath": body["Region"]},
            "VirtualPrivateCloud": {"Name": "default", "XDPath": body["VirtualPrivateCloud"]},
            "Subnets": [{"Name": "default"}],
        }))
        .unwrap();
        assert_eq!(Gcp::refresh_pool(configured.clone(), &remote), configured);
    }

    #[test]
    fn subnets_keep_configured_order() {
        let prior = GcpPool {
            subnets: ValueList::Value(vec![ValueString::from("b"), ValueString::from("a")]),
            ..Default::default()
        };
        let remote = ResourcePoolDto {
            subnets: vec![
                RefDto {
                    name: "a".into(),
                    ..Default::default()
                },
                RefDto {
                    name: "b".into(),
                    ..Default::default()
                },
                RefDto {
                    name: "c".into(),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        let refreshed = Gcp::refresh_pool(prior, &remote);
        assert_eq!(
            refreshed.subnets,
            ValueList::Value(vec![
                ValueString::from("b"),
                ValueString::from("a"),
                ValueString::from("c"),
            ])
        );
    }
}
