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
use crate::api::snapshot::SnapshotRequest;
use crate::api::split_id;
use crate::api::volume::Volume;
use crate::client::CvsClient;
use crate::utils::{attribute, changed_attributes, known, WithSchema};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SnapshotState {
    pub id: Value<String>,
    pub name: Value<String>,
    pub region: Value<String>,
    pub volume_name: Value<String>,
    pub creation_token: Value<String>,
}

impl WithSchema for SnapshotState {
    fn schema() -> Schema {
        use AttributeConstraint::{Computed, Optional, Required};
        Schema {
            version: 1,
            block: Block {
                version: 1,
                attributes: map! {
                    "id" => attribute(AttributeType::String, Computed, "ID of the snapshot"),
                    "name" => attribute(AttributeType::String, Required, "Name of the snapshot"),
                    "region" => attribute(AttributeType::String, Required, "Region of the volume"),
                    "volume_name" => attribute(
                        AttributeType::String,
                        Optional,
                        "Name of the volume to snapshot",
                    ),
                    "creation_token" => attribute(
                        AttributeType::String,
                        Optional,
                        "Creation token (export path) of the volume to snapshot",
                    ),
                },
                description: Description::plain("Snapshot of a Cloud Volumes Service volume"),
                ..Default::default()
            },
        }
    }
}

/// Locate the parent volume of a snapshot or a backup by name and/or creation token
///
/// `Ok(None)` when the volume no longer exists.
pub(crate) async fn parent_volume(
    client: &CvsClient,
    region: &Value<String>,
    volume_name: &Value<String>,
    creation_token: &Value<String>,
) -> Result<Option<Volume>> {
    let region = known(region).context("region is not set")?;
    match client
        .find_volume(region, known(volume_name), known(creation_token))
        .await
    {
        Ok(volume) => Ok(Some(volume)),
        Err(err) if err.is_not_found() => Ok(None),
        Err(err) => Err(err.into()),
    }
}

pub(crate) fn check_parent_given(
    diags: &mut Diagnostics,
    volume_name: &Value<String>,
    creation_token: &Value<String>,
) {
    if volume_name.is_null() && creation_token.is_null() {
        diags.root_error(
            "Missing volume",
            "Either volume_name or creation_token or both are required",
        );
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SnapshotResource;

#[async_trait]
impl CvsResource for SnapshotResource {
    type State = SnapshotState;
    const NAME: &'static str = "netapp-gcp_snapshot";

    fn validate(&self, diags: &mut Diagnostics, config: &SnapshotState) {
        check_parent_given(diags, &config.volume_name, &config.creation_token);
    }

    fn plan_create(&self, _diags: &mut Diagnostics, mut proposed: SnapshotState) -> SnapshotState {
        proposed.id = Value::Unknown;
        proposed
    }

    fn plan_update(
        &self,
        _diags: &mut Diagnostics,
        prior: &SnapshotState,
        proposed: SnapshotState,
    ) -> (SnapshotState, Vec<AttributePath>) {
        let replace = changed_attributes!(prior, proposed; region, volume_name, creation_token);
        (proposed, replace)
    }

    async fn create(&self, client: &CvsClient, planned: &SnapshotState) -> Result<SnapshotState> {
        let region = known(&planned.region).unwrap_or_default();
        let name = known(&planned.name).unwrap_or_default();
        let volume = client
            .wait_volume_ready(region, known(&planned.volume_name), known(&planned.creation_token))
            .await
            .context("Error getting volume ID")?;

        let snapshot_id = client
            .create_snapshot(&SnapshotRequest {
                name,
                region,
                volume_id: &volume.volume_id,
                snapshot_id: None,
            })
            .await
            .with_context(|| format!("Error creating snapshot {name}"))?;
        info!(snapshot_id, volume_id = volume.volume_id, "snapshot created");

        Ok(SnapshotState {
            id: Value::Value(snapshot_id),
            ..planned.clone()
        })
    }

    async fn read(&self, client: &CvsClient, state: &SnapshotState) -> Result<Option<SnapshotState>> {
        let id = known(&state.id).context("snapshot has no id")?;
        let region = known(&state.region).unwrap_or_default();
        let Some(volume) =
            parent_volume(client, &state.region, &state.volume_name, &state.creation_token).await?
        else {
            return Ok(None);
        };
        let snapshot = client
            .get_snapshot(region, &volume.volume_id, id)
            .await
            .context("Error getting Snapshot")?;
        Ok(snapshot.map(|snapshot| SnapshotState {
            name: Value::Value(snapshot.name),
            ..state.clone()
        }))
    }

    async fn update(
        &self,
        client: &CvsClient,
        prior: &SnapshotState,
        planned: &SnapshotState,
    ) -> Result<SnapshotState> {
        let id = known(&prior.id).context("snapshot has no id")?;
        if prior.name != planned.name {
            let volume =
                parent_volume(client, &prior.region, &prior.volume_name, &prior.creation_token)
                    .await?
                    .context("the volume of the snapshot no longer exists")?;
            client
                .update_snapshot(&SnapshotRequest {
                    name: known(&planned.name).unwrap_or_default(),
                    region: known(&prior.region).unwrap_or_default(),
                    volume_id: &volume.volume_id,
                    snapshot_id: Some(id),
                })
                .await
                .with_context(|| format!("Error updating snapshot {id}"))?;
        }
        Ok(SnapshotState {
            id: prior.id.clone(),
            ..planned.clone()
        })
    }

    async fn delete(&self, client: &CvsClient, state: &SnapshotState) -> Result<()> {
        let id = known(&state.id).context("snapshot has no id")?;
        let Some(volume) =
            parent_volume(client, &state.region, &state.volume_name, &state.creation_token).await?
        else {
            info!(snapshot_id = id, "volume is gone, so is the snapshot");
            return Ok(());
        };
        client
            .delete_snapshot(known(&state.region).unwrap_or_default(), &volume.volume_id, id)
            .await
            .with_context(|| format!("Error deleting snapshot {id}"))
    }

    /// `<snapshotId>:<region>:<volume_name>`
    async fn import(&self, client: &CvsClient, id: &str) -> Result<Option<SnapshotState>> {
        let parts = split_id(id, 3)?;
        let prior = SnapshotState {
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

    fn state() -> SnapshotState {
        SnapshotState {
            id: Value::Value("s1".into()),
            name: Value::Value("daily".into()),
            region: Value::Value("us-east4".into()),
            volume_name: Value::Value("vol".into()),
            creation_token: Value::Null,
        }
    }

    #[test]
    fn requires_a_parent_volume() {
        let mut diags = Diagnostics::default();
        SnapshotResource.validate(&mut diags, &state());
        assert!(diags.errors.is_empty());

        let orphan = SnapshotState {
            volume_name: Value::Null,
            ..state()
        };
        SnapshotResource.validate(&mut diags, &orphan);
        assert_eq!(diags.errors.len(), 1);
    }

    #[test]
    fn renaming_is_in_place() {
        let mut diags = Diagnostics::default();
        let renamed = SnapshotState {
            name: Value::Value("weekly".into()),
            ..state()
        };
        let (_, replace) = SnapshotResource.plan_update(&mut diags, &state(), renamed);
        assert!(replace.is_empty());

        let moved = SnapshotState {
            volume_name: Value::Value("other".into()),
            ..state()
        };
        let (_, replace) = SnapshotResource.plan_update(&mut diags, &state(), moved);
        assert_eq!(replace, vec![AttributePath::new("volume_name")]);
    }

    #[test]
    fn id_is_computed_on_creation() {
        let mut diags = Diagnostics::default();
        let planned = SnapshotResource.plan_create(
            &mut diags,
            SnapshotState {
                id: Value::Null,
                ..state()
            },
        );
        assert_eq!(planned.id, Value::Unknown);
    }
}
