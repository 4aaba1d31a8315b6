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

use serde::{Deserialize, Serialize};

use super::{nullable, Envelope};
use crate::client::lifecycle::LifeCycleState;
use crate::client::{CvsClient, Error, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Snapshot {
    #[serde(deserialize_with = "nullable")]
    pub snapshot_id: String,
    #[serde(deserialize_with = "nullable")]
    pub name: String,
    #[serde(deserialize_with = "nullable")]
    pub life_cycle_state: LifeCycleState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotRequest<'a> {
    pub name: &'a str,
    pub region: &'a str,
    pub volume_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_id: Option<&'a str>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct CreatedSnapshot {
    snapshot_id: String,
}

impl CvsClient {
    pub async fn create_snapshot(&self, request: &SnapshotRequest<'_>) -> Result<String> {
        let path = format!("{}/Volumes/{}/Snapshots", request.region, request.volume_id);
        let created: Envelope<CreatedSnapshot> = self.post(&path, request).await?;
        Ok(created.into_inner().snapshot_id)
    }

    /// Fetch a snapshot, `Ok(None)` when it is gone or being deleted
    pub async fn get_snapshot(
        &self,
        region: &str,
        volume_id: &str,
        snapshot_id: &str,
    ) -> Result<Option<Snapshot>> {
        let path = format!("{region}/Volumes/{volume_id}/Snapshots/{snapshot_id}");
        let snapshot: Snapshot = match self.get(&path).await {
            Ok(snapshot) => snapshot,
            Err(err) if err.is_not_found() => return Ok(None),
            Err(err) => return Err(err),
        };
        if matches!(
            snapshot.life_cycle_state,
            LifeCycleState::Deleted | LifeCycleState::Deleting
        ) {
            return Ok(None);
        }
        if snapshot.snapshot_id != snapshot_id {
            return Err(Error::State(format!(
                "Expected Snapshot ID {snapshot_id}, Response contained Snapshot ID {}",
                snapshot.snapshot_id
            )));
        }
        Ok(Some(snapshot))
    }

    pub async fn update_snapshot(&self, request: &SnapshotRequest<'_>) -> Result<()> {
        let path = format!(
            "{}/Volumes/{}/Snapshots/{}",
            request.region,
            request.volume_id,
            request.snapshot_id.unwrap_or_default()
        );
        let _: serde_json::Value = self.put(&path, request).await?;
        Ok(())
    }

    pub async fn delete_snapshot(
        &self,
        region: &str,
        volume_id: &str,
        snapshot_id: &str,
    ) -> Result<()> {
        let path = format!("{region}/Volumes/{volume_id}/Snapshots/{snapshot_id}");
        let _: serde_json::Value = self.delete(&path).await?;
        Ok(())
    }
}
