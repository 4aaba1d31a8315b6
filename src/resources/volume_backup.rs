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

use super::snapshot::{check_parent_given, parent_volume};
use super::CvsResource;
use crate::api::backup::BackupRequest;
use crate::api::split_id;
use crate::client::CvsClient;
use crate::utils::{attribute, changed_attributes, known, WithSchema};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct VolumeBackupState {
    pub id: Value<String>,
    pub name: Value<String>,
    pub region: Value<String>,
    pub volume_name: Value<String>,
    pub creation_token: Value<String>,
}

impl WithSchema for VolumeBackupState {
    fn schema() -> Schema {
        use AttributeConstraint::{Computed, Optional, Required};
        Schema {
            version: 1,
            block: Block {
                version: 1,
                attributes: map! {
                    "id" => attribute(AttributeType::String, Computed, "ID of the backup"),
                    "name" => attribute(AttributeType::String, Required, "Name of the backup"),
                    "region" => attribute(AttributeType::String, Required, "Region of the volume"),
                    "volume_name" => attribute(
                        AttributeType::String,
                        Optional,
                        "Name of the volume to back up",
                    ),
                    "creation_token" => attribute(
                        AttributeType::String,
                        Optional,
                        "Creation token (export path) of the volume to back up",
                    ),
                },
                description: Description::plain("Backup of a Cloud Volumes Service volume"),
                ..Default::default()
            },
        }
    }
}

/// Backups cannot be changed: every attribute forces a new one
#[derive(Debug, Default, Clone, Copy)]
pub struct VolumeBackupResource;

#[async_trait]
impl CvsResource for VolumeBackupResource {
    type State = VolumeBackupState;
    const NAME: &'static str = "netapp-gcp_volume_backup";

    fn validate(&self, diags: &mut Diagnostics, config: &VolumeBackupState) {
        check_parent_given(diags, &config.volume_name, &config.creation_token);
    }

    fn plan_create(
        &self,
        _diags: &mut Diagnostics,
        mut proposed: VolumeBackupState,
    ) -> VolumeBackupState {
        proposed.id = Value::Unknown;
        proposed
    }

    fn plan_update(
        &self,
        _diags: &mut Diagnostics,
        prior: &VolumeBackupState,
        proposed: VolumeBackupState,
    ) -> (VolumeBackupState, Vec<AttributePath>) {
        let replace =
            changed_attributes!(prior, proposed; name, region, volume_name, creation_token);
        (proposed, replace)
    }

    async fn create(
        &self,
        client: &CvsClient,
        planned: &VolumeBackupState,
    ) -> Result<VolumeBackupState> {
        let region = known(&planned.region).unwrap_or_default();
        let name = known(&planned.name).unwrap_or_default();
        let volume = client
            .wait_volume_ready(region, known(&planned.volume_name), known(&planned.creation_token))
            .await
            .context("Error getting volume ID")?;

        let backup_id = client
            .create_backup(&BackupRequest {
                name,
                region,
                volume_id: &volume.volume_id,
            })
            .await
            .with_context(|| format!("Error creating volume backup {name}"))?;
        info!(backup_id, volume_id = volume.volume_id, "volume backup created");

        Ok(VolumeBackupState {
            id: Value::Value(backup_id),
            ..planned.clone()
        })
    }

    async fn read(
        &self,
        client: &CvsClient,
        state: &VolumeBackupState,
    ) -> Result<Option<VolumeBackupState>> {
        let id = known(&state.id).context("backup has no id")?;
        let Some(volume) =
            parent_volume(client, &state.region, &state.volume_name, &state.creation_token).await?
        else {
            return Ok(None);
        };
        let backup = client
            .get_backup(known(&state.region).unwrap_or_default(), &volume.volume_id, id)
            .await
            .context("Error getting volume backup")?;
        Ok(backup.map(|backup| VolumeBackupState {
            name: Value::Value(backup.name),
            ..state.clone()
        }))
    }

    async fn update(
        &self,
        _client: &CvsClient,
        prior: &VolumeBackupState,
        _planned: &VolumeBackupState,
    ) -> Result<VolumeBackupState> {
        Ok(prior.clone())
    }

    async fn delete(&self, client: &CvsClient, state: &VolumeBackupState) -> Result<()> {
        let id = known(&state.id).context("backup has no id")?;
        let Some(volume) =
            parent_volume(client, &state.region, &state.volume_name, &state.creation_token).await?
        else {
            info!(backup_id = id, "volume is gone, so is the backup");
            return Ok(());
        };
        client
            .delete_backup(known(&state.region).unwrap_or_default(), &volume.volume_id, id)
            .await
            .with_context(|| format!("Error deleting volume backup {id}"))
    }

    /// `<backupId>:<region>:<volume_name>`
    async fn import(&self, client: &CvsClient, id: &str) -> Result<Option<VolumeBackupState>> {
        let parts = split_id(id, 3)?;
        let prior = VolumeBackupState {
            id: Value::Value(parts[0].to_owned()),
            name: Value::Null,
            region: Value::Value(parts[1].to_owned()),
            volume_name: Value::Value(parts[2].to_owned()),
            creation_token: Value::Null,
        };
        self.read(client, &prior).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_change_replaces() {
        let prior = VolumeBackupState {
            id: Value::Value("b1".into()),
            name: Value::Value("nightly".into()),
            region: Value::Value("us-east4".into()),
            volume_name: Value::Null,
            creation_token: Value::Value("vol-path".into()),
        };
        let proposed = VolumeBackupState {
            name: Value::Value("weekly".into()),
            region: Value::Value("us-west2".into()),
            ..prior.clone()
        };
        let mut diags = Diagnostics::default();
        let (_, replace) = VolumeBackupResource.plan_update(&mut diags, &prior, proposed);
        assert_eq!(
            replace,
            vec![AttributePath::new("name"), AttributePath::new("region")]
        );
    }
}
