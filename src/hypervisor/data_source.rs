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

use async_trait::async_trait;
use tf_provider::schema::Schema;
use tf_provider::value::ValueEmpty;
use tf_provider::{AttributePath, DataSource, Diagnostics};

use crate::client::{ApiPath, ClientSlot};
use crate::utils::{report, require_non_empty, str_of, WithSchema};

use super::state::DataSourceState;
use super::HypervisorDto;

/// `citrix_hypervisor`: look up a hypervisor connection by name
#[derive(Debug, Default)]
pub struct HypervisorDataSource {
    client: ClientSlot,
}

impl HypervisorDataSource {
    pub fn new(client: ClientSlot) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DataSource for HypervisorDataSource {
    type State<'a> = DataSourceState<'a>;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(DataSourceState::schema())
    }

    async fn validate<'a>(&self, diags: &mut Diagnostics, config: Self::State<'a>) -> Option<()> {
        require_non_empty(diags, &config.name, "name", AttributePath::new("name"));
        if diags.errors.is_empty() {
            Some(())
        } else {
            None
        }
    }

    async fn read<'a>(
        &self,
        diags: &mut Diagnostics,
        config: Self::State<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<Self::State<'a>> {
        let client = self.client.get(diags).await?;
        let name = str_of(&config.name).to_owned();
        let path = ApiPath::orchestration().segment("hypervisors").segment(&name);
        match client.get_optional::<HypervisorDto>(&path).await {
            Ok(Some(remote)) => Some(config.refresh(&remote)),
            Ok(None) => {
                diags.error(
                    "Hypervisor not found",
                    format!("No hypervisor is named `{}`.", name),
                    AttributePath::new("name"),
                );
                None
            }
            Err(err) => {
                report(diags, format!("Error reading hypervisor {}", name), &err);
                None
            }
        }
    }
}
