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
use serde::{Deserialize, Serialize};
use serde_json::json;
use tf_provider::schema::{
    Attribute, AttributeConstraint, AttributeType, Block, Description, Schema,
};
use tf_provider::value::{Value, ValueEmpty, ValueString};
use tf_provider::{map, AttributePath, Diagnostics, Resource};
use tracing::info;

use crate::client::{ApiPath, CitrixClient, ClientSlot};
use crate::utils::{report, require_non_empty, str_of, string_value, warn_removed, WithSchema};

#[derive(Clone, PartialEq, Eq, Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct TagDto {
    pub id: String,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TagState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub name: ValueString<'a>,
    pub description: ValueString<'a>,
}

impl<'a> TagState<'a> {
    pub fn refresh(self, remote: &TagDto) -> Self {
        Self {
            id: string_value(remote.id.clone()),
            name: string_value(remote.name.clone()),
            description: string_value(remote.description.clone()),
        }
    }
}

impl<'a> WithSchema for TagState<'a> {
    fn schema() -> Schema {
        Schema {
            version: 1,
            block: Block {
                version: 1,
                attributes: map! {
                    "id" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("GUID identifier of the tag"),
                        constraint: AttributeConstraint::Computed,
                        ..Default::default()
                    },
                    "name" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("Name of the tag, unique in the site"),
                        constraint: AttributeConstraint::Required,
                        ..Default::default()
                    },
                    "description" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("Description of the tag"),
                        constraint: AttributeConstraint::Optional,
                        ..Default::default()
                    },
                },
                description: Description::plain("Manages a tag"),
                ..Default::default()
            },
        }
    }
}

/// `citrix_tag`
#[derive(Debug, Default)]
pub struct TagResource {
    client: ClientSlot,
}

impl TagResource {
    pub fn new(client: ClientSlot) -> Self {
        Self { client }
    }

    fn tag(id: &str) -> ApiPath {
        ApiPath::orchestration().segment("Tags").segment(id)
    }

    async fn fetch(
        client: &CitrixClient,
        diags: &mut Diagnostics,
        id: &str,
    ) -> Option<Option<TagDto>> {
        match client.get_optional(&Self::tag(id)).await {
            Ok(remote) => Some(remote),
            Err(err) => {
                report(diags, format!("Error reading tag {}", id), &err);
                None
            }
        }
    }

    /// The name must not belong to another tag
    async fn check_name_available(
        &self,
        diags: &mut Diagnostics,
        state: &TagState<'_>,
    ) -> Option<()> {
        let Value::Value(name) = &state.name else {
            return Some(());
        };
        let client = self.client.get(diags).await?;
        let existing = Self::fetch(&client, diags, name).await?;
        match existing {
            Some(existing) if state.id.as_deref_option() != Some(existing.id.as_str()) => {
                diags.error(
                    "Tag name already in use",
                    format!(
                        "Tag `{}` already exists with id `{}`.",
                        existing.name, existing.id
                    ),
                    AttributePath::new("name"),
                );
                None
            }
            _ => Some(()),
        }
    }
}

#[async_trait]
impl Resource for TagResource {
    type State<'a> = TagState<'a>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(TagState::schema())
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
        state: Self::State<'a>,
        private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let client = self.client.get(diags).await?;
        let id = str_of(&state.id).to_owned();
        match Self::fetch(&client, diags, &id).await? {
            Some(remote) => Some((state.refresh(&remote), private_state)),
            None => {
                warn_removed(diags, "Tag", &id);
                None
            }
        }
    }

    async fn plan_create<'a>(
        &self,
        diags: &mut Diagnostics,
        proposed_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let mut state = proposed_state;
        state.id = ValueString::Unknown;
        self.check_name_available(diags, &state).await?;
        Some((state, Default::default()))
    }

    async fn plan_update<'a>(
        &self,
        diags: &mut Diagnostics,
        prior_state: Self::State<'a>,
        proposed_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        prior_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>, Vec<AttributePath>)> {
        let mut state = proposed_state;
        state.id = prior_state.id;
        if state.name != prior_state.name {
            self.check_name_available(diags, &state).await?;
        }
        Some((state, prior_private_state, vec![]))
    }

    async fn plan_destroy<'a>(
        &self,
        _diags: &mut Diagnostics,
        _prior_state: Self::State<'a>,
        prior_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<Self::PrivateState<'a>> {
        Some(prior_private_state)
    }

    async fn create<'a>(
        &self,
        diags: &mut Diagnostics,
        planned_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        planned_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let client = self.client.get(diags).await?;
        let name = str_of(&planned_state.name).to_owned();
        info!(name = name.as_str(), "creating tag");

        let body = json!({
            "Name": name,
            "Description": str_of(&planned_state.description),
        });
        match client
            .post::<_, TagDto>(&ApiPath::orchestration().segment("Tags"), &body)
            .await
        {
            Ok(remote) => Some((planned_state.refresh(&remote), planned_private_state)),
            Err(err) => {
                report(diags, format!("Error creating tag {}", name), &err);
                None
            }
        }
    }

    async fn update<'a>(
        &self,
        diags: &mut Diagnostics,
        prior_state: Self::State<'a>,
        planned_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        planned_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let client = self.client.get(diags).await?;
        let id = str_of(&prior_state.id).to_owned();
        info!(id = id.as_str(), "updating tag");

        let body = json!({
            "Name": str_of(&planned_state.name),
            "Description": str_of(&planned_state.description),
        });
        if let Err(err) = client.patch(&Self::tag(&id), &body).await {
            report(diags, format!("Error updating tag {}", id), &err);
            return None;
        }
        match Self::fetch(&client, diags, &id).await? {
            Some(remote) => Some((planned_state.refresh(&remote), planned_private_state)),
            None => {
                diags.root_error(
                    "Error updating tag",
                    format!("Tag `{}` disappeared during its update.", id),
                );
                None
            }
        }
    }

    async fn destroy<'a>(
        &self,
        diags: &mut Diagnostics,
        prior_state: Self::State<'a>,
        _planned_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<()> {
        let client = self.client.get(diags).await?;
        let id = str_of(&prior_state.id).to_owned();
        match client.delete(&Self::tag(&id)).await {
            Ok(()) => Some(()),
            Err(err) if err.is_not_found() => Some(()),
            Err(err) => {
                report(diags, format!("Error deleting tag {}", id), &err);
                None
            }
        }
    }

    async fn import<'a>(
        &self,
        diags: &mut Diagnostics,
        id: String,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let client = self.client.get(diags).await?;
        match Self::fetch(&client, diags, &id).await? {
            Some(remote) => Some((TagState::default().refresh(&remote), Default::default())),
            None => {
                diags.root_error(
                    "Cannot import tag",
                    format!("Tag `{}` does not exist.", id),
                );
                None
            }
        }
    }
}
