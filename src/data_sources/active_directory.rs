// This file is part of the terraform-provider-netapp-gcp project
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
use tf_provider::schema::{AttributeConstraint, AttributeType, Block, Description, Schema};
use tf_provider::value::{Value, ValueEmpty};
use tf_provider::{map, DataSource, Diagnostics};

use crate::api::active_directory::ActiveDirectory;
use crate::resources::{connected, report, ClientSlot};
use crate::utils::{attribute, known, WithSchema};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ActiveDirectoryDataState {
    pub id: Value<String>,
    pub uuid: Value<String>,
    pub region: Value<String>,
    pub username: Value<String>,
    pub domain: Value<String>,
    pub dns_server: Value<String>,
    pub netbios: Value<String>,
    pub organizational_unit: Value<String>,
    pub site: Value<String>,
}

impl WithSchema for ActiveDirectoryDataState {
    fn schema() -> Schema {
        use AttributeConstraint::{Computed, Required};
        let computed = |description| attribute(AttributeType::String, Computed, description);
        Schema {
            version: 1,
            block: Block {
                version: 1,
                attributes: map! {
                    "id" => computed("UUID of the active directory"),
                    "uuid" => computed("UUID of the active directory"),
                    "region" => attribute(AttributeType::String, Required, "Region to look into"),
                    "username" => computed("User joining the domain"),
                    "domain" => computed("Fully qualified domain name"),
                    "dns_server" => computed("DNS servers"),
                    "netbios" => computed("NetBIOS prefix of the machine accounts"),
                    "organizational_unit" => computed("Organizational unit of the machine accounts"),
                    "site" => computed("Active directory site"),
                },
                description: Description::plain("Active directory connection of a region"),
                ..Default::default()
            },
        }
    }
}

impl From<ActiveDirectory> for ActiveDirectoryDataState {
    fn from(directory: ActiveDirectory) -> Self {
        Self {
            id: Value::Value(directory.uuid.clone()),
            uuid: Value::Value(directory.uuid),
            region: Value::Value(directory.region),
            username: Value::Value(directory.username),
            domain: Value::Value(directory.domain),
            dns_server: Value::Value(directory.dns),
            netbios: Value::Value(directory.net_bios),
            organizational_unit: Value::Value(directory.organizational_unit),
            site: Value::Value(directory.site),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ActiveDirectoryDataSource {
    slot: ClientSlot,
}

impl ActiveDirectoryDataSource {
    pub fn new(slot: ClientSlot) -> Self {
        Self { slot }
    }
}

#[async_trait]
impl DataSource for ActiveDirectoryDataSource {
    type State<'a> = ActiveDirectoryDataState;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(ActiveDirectoryDataState::schema())
    }

    async fn read<'a>(
        &self,
        diags: &mut Diagnostics,
        config: Self::State<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<Self::State<'a>> {
        let client = connected(&self.slot, diags)?;
        let region = known(&config.region).unwrap_or_default();

        match client.region_active_directory(region).await {
            Ok(Some(directory)) => Some(directory.into()),
            Ok(None) => {
                diags.root_error(
                    "Unable to read netapp-gcp_active_directory",
                    format!("No active directory found in region {region}"),
                );
                None
            }
            Err(err) => {
                report(
                    diags,
                    "Unable to read netapp-gcp_active_directory".into(),
                    &anyhow::Error::from(err),
                );
                None
            }
        }
    }
}
