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

//! QuickCreate directory connections of Amazon WorkSpaces Core accounts

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tf_provider::schema::{
    Attribute, AttributeConstraint, AttributeType, Block, Description, Schema,
};
use tf_provider::value::{Value, ValueEmpty, ValueList, ValueString};
use tf_provider::{map, AttributePath, Diagnostics, Resource};
use tracing::info;

use crate::client::{ApiPath, CitrixClient, ClientSlot, Method};
use crate::reconcile::reconcile;
use crate::utils::{
    optional_string, parse_import_id, report, require_non_empty, require_one_of, str_of,
    string_value, warn_removed, WithSchema, WithValidate,
};

const TENANCIES: &[&str] = &["DEDICATED", "SHARED"];

/// Directory connection as exchanged with QuickCreate
#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DirectoryConnectionDto {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub directory_connection_id: String,
    pub account_id: String,
    pub name: String,
    pub directory_id: String,
    pub subnet_ids: Vec<String>,
    pub tenancy: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security_group_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_ou: Option<String>,
    pub user_enabled_as_local_administrator: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DirectoryConnectionState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub account: ValueString<'a>,
    pub name: ValueString<'a>,
    pub directory: ValueString<'a>,
    pub subnets: ValueList<ValueString<'a>>,
    pub tenancy: ValueString<'a>,
    pub security_group: ValueString<'a>,
    pub default_ou: ValueString<'a>,
    pub user_as_local_administrator: Value<bool>,
}

impl<'a> DirectoryConnectionState<'a> {
    pub fn refresh(self, remote: &DirectoryConnectionDto) -> Self {
        let subnets = reconcile(
            self.subnets.unwrap_or_default(),
            &remote.subnet_ids,
            |prior: &ValueString<'a>| prior.as_deref_option().map(str::to_owned),
            |remote: &String| remote.clone(),
            |prior, remote| prior.unwrap_or_else(|| Value::Value(remote.clone().into())),
        );
        Self {
            id: string_value(remote.directory_connection_id.clone()),
            account: string_value(remote.account_id.clone()),
            name: string_value(remote.name.clone()),
            directory: string_value(remote.directory_id.clone()),
            subnets: Value::Value(subnets),
            tenancy: string_value(remote.tenancy.clone()),
            security_group: optional_string(remote.security_group_id.clone()),
            default_ou: optional_string(remote.default_ou.clone()),
            user_as_local_administrator: Value::Value(remote.user_enabled_as_local_administrator),
        }
    }

    fn to_dto(&self) -> DirectoryConnectionDto {
        DirectoryConnectionDto {
            directory_connection_id: String::new(),
            account_id: str_of(&self.account).to_owned(),
            name: str_of(&self.name).to_owned(),
            directory_id: str_of(&self.directory).to_owned(),
            subnet_ids: self
                .subnets
                .iter()
                .flatten()
                .filter_map(|subnet| subnet.as_deref_option().map(str::to_owned))
                .collect(),
            tenancy: str_of(&self.tenancy).to_owned(),
            security_group_id: self.security_group.as_deref_option().map(str::to_owned),
            default_ou: self.default_ou.as_deref_option().map(str::to_owned),
            user_enabled_as_local_administrator: self
                .user_as_local_administrator
                .as_ref_option()
                .copied()
                .unwrap_or_default(),
        }
    }
}

impl<'a> WithValidate for DirectoryConnectionState<'a> {
    fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        for (name, value) in [
            ("account", &self.account),
            ("name", &self.name),
            ("directory", &self.directory),
        ] {
            require_non_empty(diags, value, name, attr_path.clone().attribute(name));
        }
        require_one_of(
            diags,
            &self.tenancy,
            "tenancy",
            TENANCIES,
            attr_path.clone().attribute("tenancy"),
        );
        if let Value::Value(subnets) = &self.subnets {
            if subnets.len() != 2 {
                diags.error(
                    "Invalid `subnets`",
                    "Exactly two subnets in different availability zones are required.",
                    attr_path.attribute("subnets"),
                );
            }
        }
    }
}

impl<'a> WithSchema for DirectoryConnectionState<'a> {
    fn schema() -> Schema {
        let string = |description: &str, constraint: AttributeConstraint| Attribute {
            attr_type: AttributeType::String,
            description: Description::plain(description),
            constraint,
            ..Default::default()
        };
        Schema {
            version: 1,
            block: Block {
                version: 1,
                attributes: map! {
                    "id" => string("Id of the directory connection", AttributeConstraint::Computed),
                    "account" => string("Id of the QuickCreate account", AttributeConstraint::Required),
                    "name" => string("Name of the directory connection", AttributeConstraint::Required),
                    "directory" => string("Id of the AWS directory", AttributeConstraint::Required),
                    "subnets" => Attribute {
                        attr_type: AttributeType::List(AttributeType::String.into()),
                        description: Description::plain("Ids of the two subnets of the directory"),
                        constraint: AttributeConstraint::Required,
                        ..Default::default()
                    },
                    "tenancy" => string("`DEDICATED` or `SHARED`", AttributeConstraint::Required),
                    "security_group" => string("Id of the security group", AttributeConstraint::OptionalComputed),
                    "default_ou" => string("Default organizational unit of the machine accounts", AttributeConstraint::OptionalComputed),
                    "user_as_local_administrator" => Attribute {
                        attr_type: AttributeType::Bool,
                        description: Description::plain("Whether users are local administrators of their WorkSpaces"),
                        constraint: AttributeConstraint::OptionalComputed,
                        ..Default::default()
                    },
                },
                description: Description::plain("Manages a QuickCreate Amazon WorkSpaces directory connection"),
                ..Default::default()
            },
        }
    }
}

/// `citrix_quickcreate_aws_workspaces_directory_connection`
#[derive(Debug, Default)]
pub struct DirectoryConnectionResource {
    client: ClientSlot,
}

impl DirectoryConnectionResource {
    pub fn new(client: ClientSlot) -> Self {
        Self { client }
    }

    fn connections(account: &str) -> ApiPath {
        ApiPath::quick_create()
            .segment("accounts")
            .segment(account)
            .segment("directoryConnections")
    }

    async fn fetch(
        client: &CitrixClient,
        diags: &mut Diagnostics,
        account: &str,
        id: &str,
    ) -> Option<Option<DirectoryConnectionDto>> {
        match client
            .get_optional(&Self::connections(account).segment(id))
            .await
        {
            Ok(remote) => Some(remote),
            Err(err) => {
                report(
                    diags,
                    format!("Error reading directory connection {}", id),
                    &err,
                );
                None
            }
        }
    }
}

#[async_trait]
impl Resource for DirectoryConnectionResource {
    type State<'a> = DirectoryConnectionState<'a>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(DirectoryConnectionState::schema())
    }

    async fn validate<'a>(&self, diags: &mut Diagnostics, config: Self::State<'a>) -> Option<()> {
        config.validate(diags, Default::default());
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
        let account = str_of(&state.account).to_owned();
        let id = str_of(&state.id).to_owned();
        match Self::fetch(&client, diags, &account, &id).await? {
            Some(remote) => Some((state.refresh(&remote), private_state)),
            None => {
                warn_removed(diags, "Directory connection", &id);
                None
            }
        }
    }

    async fn plan_create<'a>(
        &self,
        _diags: &mut Diagnostics,
        proposed_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let mut state = proposed_state;
        state.id = ValueString::Unknown;
        Some((state, Default::default()))
    }

    async fn plan_update<'a>(
        &self,
        _diags: &mut Diagnostics,
        prior_state: Self::State<'a>,
        proposed_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        prior_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>, Vec<AttributePath>)> {
        let trigger_replace: Vec<_> = [
            ("account", prior_state.account != proposed_state.account),
            ("directory", prior_state.directory != proposed_state.directory),
            ("subnets", prior_state.subnets != proposed_state.subnets),
            ("tenancy", prior_state.tenancy != proposed_state.tenancy),
        ]
        .into_iter()
        .filter(|(_, changed)| *changed)
        .map(|(name, _)| AttributePath::new(name))
        .collect();

        let mut state = proposed_state;
        state.id = if trigger_replace.is_empty() {
            prior_state.id
        } else {
            ValueString::Unknown
        };
        Some((state, prior_private_state, trigger_replace))
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
        planned_state.validate(diags, Default::default());
        if !diags.errors.is_empty() {
            return None;
        }
        let client = self.client.get(diags).await?;
        let account = str_of(&planned_state.account).to_owned();
        let name = str_of(&planned_state.name).to_owned();
        info!(
            account = account.as_str(),
            name = name.as_str(),
            "creating directory connection"
        );

        match client
            .post::<_, DirectoryConnectionDto>(
                &Self::connections(&account),
                &planned_state.to_dto(),
            )
            .await
        {
            Ok(remote) => Some((planned_state.refresh(&remote), planned_private_state)),
            Err(err) => {
                report(
                    diags,
                    format!("Error creating directory connection {}", name),
                    &err,
                );
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
        planned_state.validate(diags, Default::default());
        if !diags.errors.is_empty() {
            return None;
        }
        let client = self.client.get(diags).await?;
        let account = str_of(&prior_state.account).to_owned();
        let id = str_of(&prior_state.id).to_owned();
        info!(id = id.as_str(), "updating directory connection");

        let path = Self::connections(&account).segment(&id);
        if let Err(err) = client
            .execute(Method::Put, &path, Some(&planned_state.to_dto()))
            .await
        {
            report(
                diags,
                format!("Error updating directory connection {}", id),
                &err,
            );
            return None;
        }
        match Self::fetch(&client, diags, &account, &id).await? {
            Some(remote) => Some((planned_state.refresh(&remote), planned_private_state)),
            None => {
                diags.root_error(
                    "Error updating directory connection",
                    format!("Directory connection `{}` disappeared during its update.", id),
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
        let account = str_of(&prior_state.account).to_owned();
        let id = str_of(&prior_state.id).to_owned();
        match client
            .delete(&Self::connections(&account).segment(&id))
            .await
        {
            Ok(()) => Some(()),
            Err(err) if err.is_not_found() => Some(()),
            Err(err) => {
                report(
                    diags,
                    format!("Error deleting directory connection {}", id),
                    &err,
                );
                None
            }
        }
    }

    async fn import<'a>(
        &self,
        diags: &mut Diagnostics,
        id: String,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let (account, connection) = parse_import_id(diags, &id, "accountId,directoryConnectionId")?;
        let client = self.client.get(diags).await?;
        let Some(mut remote) = Self::fetch(&client, diags, &account, &connection).await? else {
            diags.root_error(
                "Cannot import directory connection",
                format!(
                    "Directory connection `{}` does not exist in account `{}`.",
                    connection, account
                ),
            );
            return None;
        };
        if remote.account_id.is_empty() {
            remote.account_id = account;
        }
        if remote.directory_connection_id.is_empty() {
            remote.directory_connection_id = connection;
        }
        Some((
            DirectoryConnectionState::default().refresh(&remote),
            Default::default(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::testing::{test_client, FakeTransport};
    use crate::client::transport::RequestBody;

    async fn resource(transport: &FakeTransport) -> DirectoryConnectionResource {
        let slot = ClientSlot::default();
        slot.set(test_client(transport)).await;
        DirectoryConnectionResource::new(slot)
    }

    fn planned() -> DirectoryConnectionState<'static> {
        DirectoryConnectionState {
            id: ValueString::Unknown,
            account: ValueString::from("acc-1"),
            name: ValueString::from("corp"),
            directory: ValueString::from("d-123"),
            subnets: Value::Value(vec![
                ValueString::from("subnet-b"),
                ValueString::from("subnet-a"),
            ]),
            tenancy: ValueString::from("DEDICATED"),
            security_group: ValueString::Null,
            default_ou: ValueString::Null,
            user_as_local_administrator: Value::Value(false),
        }
    }

    #[tokio::test]
    async fn create_sends_camel_case_body() {
        let transport = FakeTransport::new();
        transport.push_json(
            Method::Post,
            "/quickcreate/accounts/acc-1/directoryConnections",
            200,
            serde_json::json!({
                "directoryConnectionId": "dc-1",
                "accountId": "acc-1",
                "name": "corp",
                "directoryId": "d-123",
                "subnetIds": ["subnet-a", "subnet-b"],
                "tenancy": "DEDICATED",
                "securityGroupId": "sg-1",
            }),
        );
        let resource = resource(&transport).await;
        let mut diags = Diagnostics::default();

        let (state, _) = resource
            .create(
                &mut diags,
                planned(),
                planned(),
                Default::default(),
                Default::default(),
            )
            .await
            .unwrap();
        assert_eq!(state.id, ValueString::from("dc-1"));
        assert_eq!(state.subnets, planned().subnets);
        assert_eq!(state.security_group, ValueString::from("sg-1"));

        let Some(RequestBody::Json(body)) = &transport.requests()[0].body else {
            panic!("missing body");
        };
        assert_eq!(body["directoryId"], "d-123");
        assert_eq!(body["subnetIds"], serde_json::json!(["subnet-b", "subnet-a"]));
        assert!(body.get("directoryConnectionId").is_none());
        assert!(body.get("securityGroupId").is_none());
    }

    #[test]
    fn configured_state_survives_a_round_trip() {
        let configured = DirectoryConnectionState {
            id: ValueString::from("dc-1"),
            security_group: ValueString::from("sg-1"),
            default_ou: ValueString::from("OU=WorkSpaces,DC=corp,DC=example"),
            user_as_local_administrator: Value::Value(true),
            ..planned()
        };
        let mut sent = serde_json::to_value(configured.to_dto()).unwrap();

        // the service assigns the id and lists the subnets in its own order
        sent["directoryConnectionId"] = serde_json::json!("dc-1");
        sent["subnetIds"] = serde_json::json!(["subnet-a", "subnet-b"]);
        let remote: DirectoryConnectionDto = serde_json::from_value(sent).unwrap();
        assert_eq!(configured.clone().refresh(&remote), configured);
    }

    #[tokio::test]
    async fn import_requires_both_ids() {
        let transport = FakeTransport::new();
        let resource = resource(&transport).await;
        let mut diags = Diagnostics::default();

        let result = resource.import(&mut diags, "acc-1,".into()).await;
        assert!(result.is_none());
        assert!(diags.errors[0]
            .detail
            .contains("accountId,directoryConnectionId"));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn changing_directory_forces_replacement() {
        let transport = FakeTransport::new();
        let resource = resource(&transport).await;
        let mut diags = Diagnostics::default();
        let prior = DirectoryConnectionState {
            id: ValueString::from("dc-1"),
            ..planned()
        };
        let proposed = DirectoryConnectionState {
            directory: ValueString::from("d-456"),
            default_ou: ValueString::from("OU=WorkSpaces"),
            ..prior.clone()
        };

        let (state, _, replace) = resource
            .plan_update(
                &mut diags,
                prior,
                proposed.clone(),
                proposed,
                Default::default(),
                Default::default(),
            )
            .await
            .unwrap();
        assert_eq!(replace, vec![AttributePath::new("directory")]);
        assert!(state.id.is_unknown());
    }
}
