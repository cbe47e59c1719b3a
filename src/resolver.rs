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

//! Resolution of display names to hypervisor resource paths (`XDPath`)

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::client::{ApiError, ApiPath, CitrixClient};
use crate::utils::RemoteFailure;

/// Node of `GET .../allResources`
#[derive(Clone, PartialEq, Eq, Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ResourceDto {
    pub id: String,
    pub name: String,
    #[serde(rename = "XDPath")]
    pub xd_path: String,
    pub resource_type: String,
    pub full_relative_path: String,
    pub children: Vec<ResourceDto>,
}

#[derive(Error, Clone, PartialEq, Eq, Debug)]
pub enum ResolveError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("could not find {kind} `{name}` under `{parent}`")]
    NotFound {
        kind: String,
        name: String,
        parent: String,
    },
}

impl RemoteFailure for ResolveError {
    fn transaction_id(&self) -> &str {
        match self {
            ResolveError::Api(err) => err.transaction_id(),
            ResolveError::NotFound { .. } => "",
        }
    }
    fn message(&self) -> String {
        match self {
            ResolveError::Api(err) => err.message(),
            err => err.to_string(),
        }
    }
}

/// One step of a path: child name and optional resource type
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Step<'s> {
    pub name: &'s str,
    pub kind: Option<&'s str>,
}

impl<'s> Step<'s> {
    pub fn new(name: &'s str, kind: &'s str) -> Self {
        Self {
            name,
            kind: Some(kind),
        }
    }

    pub fn any(name: &'s str) -> Self {
        Self { name, kind: None }
    }
}

/// Walks the resource tree of a hypervisor or of one of its resource pools
pub struct ResourceResolver<'c> {
    client: &'c CitrixClient,
    base: ApiPath,
}

impl<'c> ResourceResolver<'c> {
    pub fn for_hypervisor(client: &'c CitrixClient, hypervisor: &str) -> Self {
        Self {
            client,
            base: ApiPath::orchestration()
                .segment("hypervisors")
                .segment(hypervisor)
                .segment("allResources"),
        }
    }

    pub fn for_resource_pool(client: &'c CitrixClient, hypervisor: &str, pool: &str) -> Self {
        Self {
            client,
            base: ApiPath::orchestration()
                .segment("hypervisors")
                .segment(hypervisor)
                .segment("resourcePools")
                .segment(pool)
                .segment("allResources"),
        }
    }

    /// Direct children of `path` (`""` is the root)
    pub async fn children(&self, path: &str) -> Result<Vec<ResourceDto>, ApiError> {
        let node: ResourceDto = self
            .client
            .get(&self.base.clone().query("path", path).query("children", "1"))
            .await?;
        Ok(node.children)
    }

    /// Follow `steps` from `parent`, matching names case-insensitively
    pub async fn resolve(
        &self,
        parent: &str,
        steps: &[Step<'_>],
    ) -> Result<ResourceDto, ResolveError> {
        let mut current = ResourceDto {
            full_relative_path: parent.to_owned(),
            ..Default::default()
        };
        for step in steps {
            let children = self.children(&current.full_relative_path).await?;
            current = find(children, step).ok_or_else(|| ResolveError::NotFound {
                kind: step.kind.unwrap_or("resource").to_owned(),
                name: step.name.to_owned(),
                parent: current.full_relative_path.clone(),
            })?;
            debug!(
                name = step.name,
                xd_path = current.xd_path.as_str(),
                "resolved resource"
            );
        }
        Ok(current)
    }

    /// Resolve several siblings under `parent` with a single listing
    pub async fn resolve_siblings(
        &self,
        parent: &str,
        names: &[String],
        kind: &str,
    ) -> Result<Vec<ResourceDto>, ResolveError> {
        if names.is_empty() {
            return Ok(Vec::new());
        }
        let children = self.children(parent).await?;
        names
            .iter()
            .map(|name| {
                find(children.clone(), &Step::new(name, kind)).ok_or_else(|| {
                    ResolveError::NotFound {
                        kind: kind.to_owned(),
                        name: name.clone(),
                        parent: parent.to_owned(),
                    }
                })
            })
            .collect()
    }
}

fn find(children: Vec<ResourceDto>, step: &Step<'_>) -> Option<ResourceDto> {
    children.into_iter().find(|child| {
        child.name.eq_ignore_ascii_case(step.name)
            && step
                .kind
                .map_or(true, |kind| child.resource_type.eq_ignore_ascii_case(kind))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::testing::{test_client, FakeTransport};
    use crate::client::Method;

    #[tokio::test]
    async fn walks_the_tree() {
        let transport = FakeTransport::new();
        transport.push_json(
            Method::Get,
            "allResources?path=&children=1",
            200,
            serde_json::json!({"Children": [
                {"Name": "West Europe", "ResourceType": "Region", "FullRelativePath": "westeurope.region", "XDPath": "XDHyp:\\Connections\\c\\westeurope.region"},
                {"Name": "East US", "ResourceType": "Region", "FullRelativePath": "eastus.region", "XDPath": "XDHyp:\\Connections\\c\\eastus.region"},
            ]}),
        );
        transport.push_json(
            Method::Get,
            "allResources?path=eastus.region",
            200,
            serde_json::json!({"Children": [
                {"Name": "rg", "ResourceType": "ResourceGroup", "FullRelativePath": "eastus.region/rg.resourcegroup", "XDPath": "XDHyp:\\Connections\\c\\eastus.region\\rg.resourcegroup"},
            ]}),
        );
        let client = test_client(&transport);
        let resolver = ResourceResolver::for_hypervisor(&client, "hyp");

        let resource = resolver
            .resolve(
                "",
                &[Step::new("east us", "Region"), Step::new("RG", "ResourceGroup")],
            )
            .await
            .unwrap();
        assert_eq!(
            resource.xd_path,
            "XDHyp:\\Connections\\c\\eastus.region\\rg.resourcegroup"
        );
    }

    #[tokio::test]
    async fn missing_child_is_reported() {
        let transport = FakeTransport::new();
        transport.push_json(
            Method::Get,
            "allResources",
            200,
            serde_json::json!({"Children": [{"Name": "a", "ResourceType": "Network"}]}),
        );
        let client = test_client(&transport);
        let resolver = ResourceResolver::for_hypervisor(&client, "hyp");

        let err = resolver
            .resolve_siblings("vnet", &["a".into(), "b".into()], "Network")
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ResolveError::NotFound {
                kind: "Network".into(),
                name: "b".into(),
                parent: "vnet".into()
            }
        );
    }
}
