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

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tf_provider::schema::{AttributeConstraint, AttributeType, Block, Description, Schema};
use tf_provider::value::Value;
use tf_provider::{map, AttributePath, Diagnostics};
use tracing::info;

use super::CvsResource;
use crate::api::kms::KmsConfig;
use crate::api::split_id;
use crate::client::CvsClient;
use crate::utils::{attribute, changed_attributes, known, refresh_if_set, WithSchema};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct KmsConfigState {
    pub id: Value<String>,
    pub key_ring_name: Value<String>,
    pub key_name: Value<String>,
    pub key_ring_location: Value<String>,
    pub key_project_id: Value<String>,
    pub network: Value<String>,
}

impl WithSchema for KmsConfigState {
    fn schema() -> Schema {
        use AttributeConstraint::{Computed, Optional, Required};
        Schema {
            version: 1,
            block: Block {
                version: 1,
                attributes: map! {
                    "id" => attribute(AttributeType::String, Computed, "UUID of the KMS configuration"),
                    "key_ring_name" => attribute(AttributeType::String, Required, "Name of the key ring"),
                    "key_name" => attribute(AttributeType::String, Required, "Name of the key"),
                    "key_ring_location" => attribute(
                        AttributeType::String,
                        Required,
                        "Location of the key ring, also the region of the configuration",
                    ),
                    "key_project_id" => attribute(
                        AttributeType::String,
                        Optional,
                        "Project hosting the key, if not the provider project",
                    ),
                    "network" => attribute(AttributeType::String, Required, "VPC network"),
                },
                description: Description::plain("Customer managed encryption key of a region"),
                ..Default::default()
            },
        }
    }
}

impl KmsConfigState {
    fn request(&self, uuid: &str) -> KmsConfig {
        let text = |value: &Value<String>| known(value).unwrap_or_default().to_owned();
        KmsConfig {
            key_ring: text(&self.key_ring_name),
            key_name: text(&self.key_name),
            key_ring_location: text(&self.key_ring_location),
            uuid: uuid.to_owned(),
            key_project_id: text(&self.key_project_id),
            network: text(&self.network),
        }
    }

    fn refresh(&self, config: &KmsConfig) -> Self {
        Self {
            id: Value::Value(config.uuid.clone()),
            key_ring_name: Value::Value(config.key_ring.clone()),
            key_name: Value::Value(config.key_name.clone()),
            key_ring_location: Value::Value(config.key_ring_location.clone()),
            key_project_id: refresh_if_set(&self.key_project_id, config.key_project_id.clone()),
            network: Value::Value(config.network.clone()),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct KmsConfigResource;

#[async_trait]
impl CvsResource for KmsConfigResource {
    type State = KmsConfigState;
    const NAME: &'static str = "netapp-gcp_kms_config";

    fn plan_create(&self, _diags: &mut Diagnostics, mut proposed: KmsConfigState) -> KmsConfigState {
        proposed.id = Value::Unknown;
        proposed
    }

    fn plan_update(
        &self,
        _diags: &mut Diagnostics,
        prior: &KmsConfigState,
        proposed: KmsConfigState,
    ) -> (KmsConfigState, Vec<AttributePath>) {
        let replace = changed_attributes!(prior, proposed; key_ring_location);
        (proposed, replace)
    }

    async fn create(&self, client: &CvsClient, planned: &KmsConfigState) -> Result<KmsConfigState> {
        let created = client
            .create_kms_config(&planned.request(""))
            .await
            .context("Error creating kms config")?;
        info!(uuid = created.uuid, "kms config created");
        let created = KmsConfigState {
            id: Value::Value(created.uuid),
            ..planned.clone()
        };
        self.read(client, &created)
            .await?
            .context("kms config vanished after its creation")
    }

    async fn read(&self, client: &CvsClient, state: &KmsConfigState) -> Result<Option<KmsConfigState>> {
        let uuid = known(&state.id).context("kms config has no id")?;
        let location = known(&state.key_ring_location).unwrap_or_default();
        let config = client
            .get_kms_config(location, uuid)
            .await
            .context("Error reading kms config")?;
        Ok(config.map(|config| state.refresh(&config)))
    }

    async fn update(
        &self,
        client: &CvsClient,
        prior: &KmsConfigState,
        planned: &KmsConfigState,
    ) -> Result<KmsConfigState> {
        let uuid = known(&prior.id).context("kms config has no id")?;
        client
            .update_kms_config(&planned.request(uuid))
            .await
            .with_context(|| format!("Error updating kms config {uuid}"))?;
        let planned = KmsConfigState {
            id: prior.id.clone(),
            ..planned.clone()
        };
        self.read(client, &planned)
            .await?
            .context("kms config vanished during its update")
    }

    async fn delete(&self, client: &CvsClient, state: &KmsConfigState) -> Result<()> {
        let uuid = known(&state.id).context("kms config has no id")?;
        client
            .delete_kms_config(known(&state.key_ring_location).unwrap_or_default(), uuid)
            .await
            .with_context(|| format!("Error deleting kms config {uuid}"))
    }

    /// `<uuid>:<key_ring_location>`
    async fn import(&self, client: &CvsClient, id: &str) -> Result<Option<KmsConfigState>> {
        let parts = split_id(id, 2)?;
        let prior = KmsConfigState {
            id: Value::Value(parts[0].to_owned()),
            key_ring_location: Value::Value(parts[1].to_owned()),
            ..Default::default()
        };
        self.read(client, &prior).await
    }
}
