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
use std::sync::Arc;

use async_trait::async_trait;
use tf_provider::schema::Schema;
use tf_provider::value::ValueEmpty;
use tf_provider::{map, Diagnostics, DynamicDataSource, DynamicResource, Provider};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::client::{CitrixClient, ClientSlot, HttpTransport};
use crate::config::ProviderConfig;
use crate::delivery_group::DeliveryGroupResource;
use crate::directory_connection::DirectoryConnectionResource;
use crate::gac_settings::GacSettingsResource;
use crate::hypervisor::{
    Aws, Azure, Gcp, HypervisorDataSource, HypervisorResource, ResourcePoolResource,
};
use crate::machine_catalog::MachineCatalogResource;
use crate::tag::TagResource;
use crate::utils::{report, WithSchema, WithValidate};

#[derive(Debug, Default, Clone)]
pub struct CitrixProvider {
    client: ClientSlot,
    cancel: CancellationToken,
}

impl CitrixProvider {
    /// Provider whose pending job polls stop when `cancel` fires
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            client: ClientSlot::default(),
            cancel,
        }
    }
}

#[async_trait]
impl Provider for CitrixProvider {
    type Config<'a> = ProviderConfig<'a>;
    type MetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(ProviderConfig::schema())
    }

    async fn validate<'a>(&self, diags: &mut Diagnostics, config: Self::Config<'a>) -> Option<()> {
        config.validate(diags, Default::default());
        if diags.errors.is_empty() {
            Some(())
        } else {
            None
        }
    }

    async fn configure<'a>(
        &self,
        diags: &mut Diagnostics,
        terraform_version: String,
        config: Self::Config<'a>,
    ) -> Option<()> {
        let resolved = config.resolve(diags, |name| std::env::var(name).ok())?;
        info!(
            terraform_version = terraform_version.as_str(),
            customer_id = resolved.settings.customer_id.as_str(),
            "configuring provider"
        );

        let transport = match HttpTransport::new(resolved.disable_ssl_verification) {
            Ok(transport) => transport,
            Err(err) => {
                diags.root_error("Cannot create the HTTP client", err.to_string());
                return None;
            }
        };
        let mut client =
            CitrixClient::new(Arc::new(transport), resolved.settings, self.cancel.clone());
        if let Err(err) = client.discover_site().await {
            report(diags, "Cannot reach the Citrix site", &err);
            return None;
        }
        self.client.set(client).await;
        Some(())
    }

    fn get_resources(
        &self,
        _diags: &mut Diagnostics,
    ) -> Option<HashMap<String, Box<dyn DynamicResource>>> {
        let client = &self.client;
        Some(map! {
            "azure_hypervisor" => HypervisorResource::<Azure>::new(client.clone()),
            "aws_hypervisor" => HypervisorResource::<Aws>::new(client.clone()),
            "gcp_hypervisor" => HypervisorResource::<Gcp>::new(client.clone()),
            "azure_hypervisor_resource_pool" => ResourcePoolResource::<Azure>::new(client.clone()),
            "aws_hypervisor_resource_pool" => ResourcePoolResource::<Aws>::new(client.clone()),
            "gcp_hypervisor_resource_pool" => ResourcePoolResource::<Gcp>::new(client.clone()),
            "machine_catalog" => MachineCatalogResource::new(client.clone()),
            "delivery_group" => DeliveryGroupResource::new(client.clone()),
            "tag" => TagResource::new(client.clone()),
            "quickcreate_aws_workspaces_directory_connection" => DirectoryConnectionResource::new(client.clone()),
            "gac_settings" => GacSettingsResource::new(client.clone()),
        })
    }

    fn get_data_sources(
        &self,
        _diags: &mut Diagnostics,
    ) -> Option<HashMap<String, Box<dyn DynamicDataSource>>> {
        Some(map! {
            "hypervisor" => HypervisorDataSource::new(self.client.clone()),
        })
    }
}
