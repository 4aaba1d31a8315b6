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
pub struct VolumeBackup {
    #[serde(deserialize_with = "nullable")]
    pub backup_id: String,
    #[serde(deserialize_with = "nullable")]
    pub name: String,
    #[serde(deserialize_with = "nullable")]
    pub life_cycle_state: LifeCycleState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupRequest<'a> {
    pub name: &'a str,
    pub region: &'a str,
    pub volume_id: &'a str,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct CreatedBackup {
    backup_id: String,
}

impl CvsClient {
    pub async fn create_backup(&self, request: &BackupRequest<'_>) -> Result<String> {
        let path = format!("{}/Volumes/{}/Backups", request.region, request.volume_id);
        let created: Envelope<CreatedBackup> = self.post(&path, request).await?;
        Ok(created.into_inner().backup_id)
    }

    /// Fetch a backup, `Ok(None)` when it is gone or being deleted
    pub async fn get_backup(
        &self,
        region: &str,
        volume_id: &str,
        backup_id: &str,
    ) -> Result<Option<VolumeBackup>> {
        let path = format!("{region}/Volumes/{volume_id}/Backups/{backup_id}");
        let backup: VolumeBackup = match self.get(&path).await {
            Ok(backup) => backup,
            Err(err) if err.is_not_found() => return Ok(None),
            Err(err) => return Err(err),
        };
        match backup.life_cycle_state {
            LifeCycleState::Deleted | LifeCycleState::Deleting => Ok(None),
            _ if backup.backup_id != backup_id => Err(Error::State(format!(
                "Expected VolumeBackup ID {backup_id}, Response contained VolumeBackup ID {}",
                backup.backup_id
            ))),
            _ => Ok(Some(backup)),
        }
    }

    pub async fn delete_backup(&self, region: &str, volume_id: &str, backup_id: &str) -> Result<()> {
        let path = format!("{region}/Volumes/{volume_id}/Backups/{backup_id}");
        let _: serde_json::Value = self.delete(&path).await?;
        Ok(())
    }
}
