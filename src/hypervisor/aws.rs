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
pub struct Aws;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwsConnection<'a> {
    pub region: ValueString<'a>,
    pub api_key: ValueString<'a>,
    pub secret_key: ValueString<'a>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwsPool<'a> {
    pub vpc: ValueString<'a>,
    pub availability_zone: ValueString<'a>,
    pub subnets: ValueList<ValueString<'a>>,
}

#[async_trait]
impl HypervisorKind for Aws {
    const NAME: &'static str = "aws";
    const CONNECTION_TYPE: &'static str = "AWS";

    type Connection<'a> = AwsConnection<'a>;
    type Pool<'a> = AwsPool<'a>;

    fn connection_schema() -> HashMap<String, Attribute> {
        map! {
            "region" => Attribute {
                attr_type: AttributeType::String,
                description: Description::plain("AWS region of the connection (`us-east-1`)"),
                constraint: AttributeConstraint::Required,
                ..Default::default()
            },
            "api_key" => Attribute {
                attr_type: AttributeType::String,
                description: Description::plain("Access key id"),
                constraint: AttributeConstraint::Required,
                ..Default::default()
            },
            "secret_key" => Attribute {
                attr_type: AttributeType::String,
                description: Description::plain("Secret access key"),
                constraint: AttributeConstraint::Required,
                sensitive: true,
                ..Default::default()
            },
        }
    }

    fn validate_connection(diags: &mut Diagnostics, connection: &AwsConnection<'_>) {
        require_non_empty(diags, &connection.region, "region", AttributePath::new("region"));
        require_non_empty(diags, &connection.api_key, "api_key", AttributePath::new("api_key"));
        require_non_empty(
            diags,
            &connection.secret_key,
            "secret_key",
            AttributePath::new("secret_key"),
        );
    }

    fn connection_body(connection: &AwsConnection<'_>) -> Map<String, Json> {
        let mut body = Map::new();
        body.insert("Region".into(), json!(str_of(&connection.region)));
        body.insert("ApiKey".into(), json!(str_of(&connection.api_key)));
        body.insert("SecretKey".into(), json!(str_of(&connection.secret_key)));
        body
    }

    fn refresh_connection<'a>(prior: AwsConnection<'a>, remote: &HypervisorDto) -> AwsConnection<'a>
    where
        'a: 'a,
    {
        AwsConnection {
            region: string_value(remote.region.clone()),
            api_key: string_value(remote.api_key.clone()),
            secret_key: prior.secret_key,
        }
    }

    fn connection_replacements(
        prior: &AwsConnection<'_>,
        planned: &AwsConnection<'_>,
    ) -> Vec<AttributePath> {
        if prior.region != planned.region {
            vec![AttributePath::new("region")]
        } else {
            Vec::new()
        }
    }

    fn pool_schema() -> HashMap<String, Attribute> {
        map! {
            "vpc" => Attribute {
                attr_type: AttributeType::String,
                description: Description::plain("Name of the virtual private cloud"),
                constraint: AttributeConstraint::Required,
                ..Default::default()
            },
            "availability_zone" => Attribute {
                attr_type: AttributeType::String,
                description: Description::plain("Availability zone of the subnets (`us-east-1a`)"),
                constraint: AttributeConstraint::Required,
                ..Default::default()
            },
            "subnets" => Attribute {
                attr_type: AttributeType::List(AttributeType::String.into()),
                description: Description::plain("CIDR blocks of the subnets used by the machines"),
                constraint: AttributeConstraint::Required,
                ..Default::default()
            },
        }
    }

    fn validate_pool(diags: &mut Diagnostics, pool: &AwsPool<'_>) {
        require_non_empty(diags, &pool.vpc, "vpc", AttributePath::new("vpc"));
        require_non_empty(
            diags,
            &pool.availability_zone,
            "availability_zone",
            AttributePath::new("availability_zone"),
        );
        if pool.subnets.as_ref_option().is_some_and(Vec::is_empty) {
            diags.error_short("`subnets` cannot be empty", AttributePath::new("subnets"));
        }
    }

    async fn pool_body<'a>(
        resolver: &ResourceResolver<'_>,
        pool: &AwsPool<'a>,
    ) -> Result<Map<String, Json>, ResolveError> {
        let vpc = resolver
            .resolve("", &[Step::new(str_of(&pool.vpc), "VirtualPrivateCloud")])
            .await?;
        let zone = resolver
            .resolve(
                &vpc.full_relative_path,
                &[Step::new(str_of(&pool.availability_zone), "AvailabilityZone")],
            )
            .await?;
        let subnets = resolver
            .resolve_siblings(&zone.full_relative_path, &subnet_names(&pool.subnets), "Network")
            .await?;

        let mut body = Map::new();
        body.insert("VirtualPrivateCloud".into(), json!(vpc.xd_path));
        body.insert("AvailabilityZone".into(), json!(zone.xd_path));
        body.insert(
            "Subnets".into(),
            Json::Array(subnets.into_iter().map(|s| json!(s.xd_path)).collect()),
        );
        Ok(body)
    }

    fn refresh_pool<'a>(prior: AwsPool<'a>, remote: &ResourcePoolDto) -> AwsPool<'a>
    where
        'a: 'a,
    {
        AwsPool {
            vpc: keep_display_name(prior.vpc, &remote.virtual_private_cloud.name),
            availability_zone: keep_display_name(
                prior.availability_zone,
                &remote.availability_zone.name,
            ),
            subnets: refresh_subnets(prior.subnets, &remote.subnets),
        }
    }

    fn pool_replacements(prior: &AwsPool<'_>, planned: &AwsPool<'_>) -> Vec<AttributePath> {
        let mut replace = Vec::new();
        if prior.vpc != planned.vpc {
            replace.push(AttributePath::new("vpc"));
        }
        if prior.availability_zone != planned.availability_zone {
            replace.push(AttributePath::new("availability_zone"));
        }
        replace
    }

    fn pool_subnets(pool: &AwsPool<'_>) -> Vec<String> {
        subnet_names(&pool.subnets)
    }
}
