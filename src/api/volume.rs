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
use tracing::{info, warn};

use super::{nullable, Envelope, Reply};
use crate::client::lifecycle::{poll_while, LifeCycleState};
use crate::client::retry::{retry_transient, sleep_jitter, Transient};
use crate::client::{CvsClient, Error, Result};

/// Message of the API when a freshly acknowledged volume cannot be described yet
pub const VOLUME_NOT_FOUND: &str = "Error describing volume - Volume not found";

/// Volume as described by the API
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Volume {
    #[serde(deserialize_with = "nullable")]
    pub name: String,
    #[serde(deserialize_with = "nullable")]
    pub region: String,
    #[serde(deserialize_with = "nullable")]
    pub creation_token: String,
    #[serde(deserialize_with = "nullable")]
    pub protocol_types: Vec<String>,
    #[serde(deserialize_with = "nullable")]
    pub network: String,
    pub quota_in_bytes: i64,
    #[serde(deserialize_with = "nullable")]
    pub service_level: String,
    #[serde(deserialize_with = "nullable")]
    pub snapshot_policy: SnapshotPolicy,
    #[serde(deserialize_with = "nullable")]
    pub export_policy: ExportPolicy,
    #[serde(deserialize_with = "nullable")]
    pub volume_id: String,
    #[serde(deserialize_with = "nullable")]
    pub pool_id: String,
    #[serde(deserialize_with = "nullable")]
    pub life_cycle_state: LifeCycleState,
    #[serde(deserialize_with = "nullable")]
    pub life_cycle_state_details: String,
    #[serde(deserialize_with = "nullable")]
    pub mount_points: Vec<MountPoint>,
    #[serde(deserialize_with = "nullable")]
    pub zone: String,
    #[serde(deserialize_with = "nullable")]
    pub storage_class: String,
    #[serde(rename = "regionalHA")]
    pub regional_ha: bool,
    #[serde(rename = "isDataProtection")]
    pub is_data_protection: bool,
    pub snapshot_directory: bool,
    pub snap_reserve: i64,
    #[serde(deserialize_with = "nullable")]
    pub smb_share_settings: Vec<String>,
    #[serde(deserialize_with = "nullable")]
    pub unix_permissions: String,
}

/// Body of volume creation and update requests
///
/// Unset fields are left out of the JSON document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creation_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol_types: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quota_in_bytes: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_policy: Option<SnapshotPolicy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub export_policy: Option<ExportPolicy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_class: Option<String>,
    #[serde(rename = "regionalHA", skip_serializing_if = "Option::is_none")]
    pub regional_ha: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_directory: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snap_reserve: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unix_permissions: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub smb_share_settings: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SnapshotPolicy {
    pub enabled: bool,
    #[serde(deserialize_with = "nullable")]
    pub daily_schedule: DailySchedule,
    #[serde(deserialize_with = "nullable")]
    pub hourly_schedule: HourlySchedule,
    #[serde(deserialize_with = "nullable")]
    pub monthly_schedule: MonthlySchedule,
    #[serde(deserialize_with = "nullable")]
    pub weekly_schedule: WeeklySchedule,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DailySchedule {
    pub hour: i64,
    pub minute: i64,
    pub snapshots_to_keep: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HourlySchedule {
    pub minute: i64,
    pub snapshots_to_keep: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MonthlySchedule {
    #[serde(deserialize_with = "nullable")]
    pub days_of_month: String,
    pub hour: i64,
    pub minute: i64,
    pub snapshots_to_keep: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WeeklySchedule {
    #[serde(deserialize_with = "nullable")]
    pub day: String,
    pub hour: i64,
    pub minute: i64,
    pub snapshots_to_keep: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportPolicy {
    #[serde(deserialize_with = "nullable")]
    pub rules: Vec<ExportRule>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExportRule {
    #[serde(deserialize_with = "nullable")]
    pub access: String,
    #[serde(deserialize_with = "nullable")]
    pub allowed_clients: String,
    #[serde(deserialize_with = "nullable")]
    pub has_root_access: String,
    pub kerberos5_read_only: Checked,
    pub kerberos5_read_write: Checked,
    pub kerberos5i_read_only: Checked,
    pub kerberos5i_read_write: Checked,
    pub kerberos5p_read_only: Checked,
    pub kerberos5p_read_write: Checked,
    pub nfsv3: Checked,
    pub nfsv4: Checked,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Checked {
    pub checked: bool,
}

impl From<bool> for Checked {
    fn from(checked: bool) -> Self {
        Self { checked }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MountPoint {
    #[serde(deserialize_with = "nullable")]
    pub export: String,
    #[serde(deserialize_with = "nullable")]
    pub server: String,
    #[serde(deserialize_with = "nullable")]
    pub protocol_type: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct CreatedVolume {
    volume_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct CreationToken {
    creation_token: String,
}

/// Where a volume is created
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeKind {
    Regular,
    DataProtection,
}

impl VolumeKind {
    fn collection(self) -> &'static str {
        match self {
            VolumeKind::Regular => "Volumes",
            VolumeKind::DataProtection => "DataProtectionVolumes",
        }
    }
}

impl CvsClient {
    /// List the volumes of a region, `-` for every region
    pub async fn list_volumes(&self, region: &str) -> Result<Vec<Volume>> {
        let volumes: Option<Vec<Volume>> = self.get(&format!("{region}/Volumes")).await?;
        Ok(volumes.unwrap_or_default())
    }

    pub async fn get_volume(&self, region: &str, volume_id: &str) -> Result<Volume> {
        self.get(&format!("{region}/Volumes/{volume_id}")).await
    }

    /// Same as `get_volume`, a missing volume being reported as `deleted`
    async fn get_volume_or_deleted(&self, region: &str, volume_id: &str) -> Result<Volume> {
        match self.get_volume(region, volume_id).await {
            Err(err) if err.is_not_found() => Ok(Volume {
                volume_id: volume_id.to_owned(),
                life_cycle_state: LifeCycleState::Deleted,
                ..Default::default()
            }),
            result => result,
        }
    }

    /// Find a volume of the project by its ID alone
    pub async fn locate_volume(&self, volume_id: &str) -> Result<Volume> {
        let mut volumes: Vec<Volume> = self
            .list_volumes("-")
            .await?
            .into_iter()
            .filter(|volume| volume.volume_id == volume_id)
            .collect();
        match volumes.len() {
            0 => Err(Error::NotFound(format!("No volume found with ID {volume_id}"))),
            1 => Ok(volumes.remove(0)),
            _ => Err(Error::Ambiguous(format!(
                "More than one volume found with ID {volume_id}. Use the <volumeID>:<region_name> format to import it"
            ))),
        }
    }

    /// Look up a volume of a region by name, creation token, or both
    pub async fn find_volume(
        &self,
        region: &str,
        name: Option<&str>,
        creation_token: Option<&str>,
    ) -> Result<Volume> {
        let name = name.filter(|name| !name.is_empty());
        let token = creation_token.filter(|token| !token.is_empty());
        if name.is_none() && token.is_none() {
            return Err(Error::Config(
                "Either CreationToken or volume name or both are required".into(),
            ));
        }

        let volumes = self.list_volumes(region).await?;
        if let Some(token) = token {
            let volume = volumes
                .into_iter()
                .find(|volume| volume.creation_token == token)
                .ok_or_else(|| {
                    Error::NotFound(format!("Given CreationToken does not exist : {token}"))
                })?;
            return match name {
                Some(name) if name != volume.name => Err(Error::Config(format!(
                    "Given CreationToken does not match with given volume name : {name}"
                ))),
                _ => Ok(volume),
            };
        }

        let name = name.unwrap_or_default();
        let mut matches: Vec<Volume> = volumes
            .into_iter()
            .filter(|volume| volume.name == name)
            .collect();
        match matches.len() {
            0 => Err(Error::NotFound(format!("No volume found for : {name}"))),
            1 => Ok(matches.remove(0)),
            _ => Err(Error::Ambiguous(format!(
                "Found more than one volume : {name}"
            ))),
        }
    }

    pub async fn volume_creation_token(&self, region: &str) -> Result<String> {
        let token: CreationToken = self.get(&format!("{region}/VolumeCreationToken")).await?;
        Ok(token.creation_token)
    }

    /// Send a creation request, retrying while the API reports a transient failure
    ///
    /// Returns the ID of the new volume.
    pub async fn create_volume(&self, request: &VolumeRequest, kind: VolumeKind) -> Result<String> {
        let region = request.region.as_deref().unwrap_or_default();
        let zone = request.zone.as_deref().unwrap_or_default();
        let path = format!("{region}/{}", kind.collection());
        let rules = [
            Transient::spawn_jobs_on_create(zone, self.timings().spawn_jobs_backoff),
            Transient::context_deadline(self.timings().deadline_backoff),
        ];
        let created: Envelope<CreatedVolume> =
            retry_transient(&rules, || self.post(&path, request)).await?;
        Ok(created.into_inner().volume_id)
    }

    pub async fn update_volume(
        &self,
        region: &str,
        volume_id: &str,
        request: &VolumeRequest,
    ) -> Result<()> {
        let reply: Option<Reply> = self
            .put(&format!("{region}/Volumes/{volume_id}"), request)
            .await?;
        reply.unwrap_or_default().check()
    }

    /// Send a deletion request, retrying while the network of `zone` is busy
    pub async fn delete_volume(&self, region: &str, volume_id: &str, zone: &str) -> Result<()> {
        let path = format!("{region}/Volumes/{volume_id}");
        let rules = [Transient::spawn_jobs_on_delete(
            zone,
            self.timings().spawn_jobs_backoff,
        )];
        let _: serde_json::Value = retry_transient(&rules, || self.delete(&path)).await?;
        Ok(())
    }

    /// Create a volume and wait for it to settle
    ///
    /// A creation token is generated when the request has none. A volume ending in
    /// `error` is deleted and created again twice; if it is still in error, it is
    /// deleted when `delete_on_error` is set and the call fails with its details.
    ///
    /// Failures that leave a volume behind are returned as [`Error::Incomplete`]
    /// with the ID of that volume.
    pub async fn provision_volume(
        &self,
        mut request: VolumeRequest,
        kind: VolumeKind,
        delete_on_error: bool,
    ) -> Result<Volume> {
        let region = request.region.clone().unwrap_or_default();
        if request.creation_token.as_deref().unwrap_or_default().is_empty() {
            request.creation_token = Some(self.volume_creation_token(&region).await?);
        }

        let mut created = None;
        let result = self
            .provision(&request, kind, delete_on_error, &mut created)
            .await;
        result.map_err(|error| match created {
            Some(id) => Error::Incomplete {
                id,
                error: Box::new(error),
            },
            None => error,
        })
    }

    /// `created` tracks the volume left on the API side, if any
    async fn provision(
        &self,
        request: &VolumeRequest,
        kind: VolumeKind,
        delete_on_error: bool,
        created: &mut Option<String>,
    ) -> Result<Volume> {
        let region = request.region.as_deref().unwrap_or_default();
        let zone = request.zone.as_deref().unwrap_or_default();

        let mut volume = self.create_and_wait(request, kind, created).await?;
        let mut retries = 2;
        while volume.life_cycle_state == LifeCycleState::Error && retries > 0 {
            warn!(
                volume_id = volume.volume_id,
                details = volume.life_cycle_state_details,
                "volume ended in error state, recreating it"
            );
            self.destroy_volume(region, &volume.volume_id, zone).await?;
            *created = None;
            volume = self.create_and_wait(request, kind, created).await?;
            if volume.life_cycle_state != LifeCycleState::Error {
                break;
            }
            sleep_jitter(self.timings().recreate_backoff).await;
            retries -= 1;
        }

        if volume.life_cycle_state == LifeCycleState::Error {
            if delete_on_error {
                self.destroy_volume(region, &volume.volume_id, zone).await?;
                *created = None;
                return Err(Error::State(format!(
                    "{}. Volume in error state is deleted",
                    volume.life_cycle_state_details
                )));
            }
            return Err(Error::State(volume.life_cycle_state_details));
        }
        info!(volume_id = volume.volume_id, state = %volume.life_cycle_state, "volume created");
        Ok(volume)
    }

    async fn create_and_wait(
        &self,
        request: &VolumeRequest,
        kind: VolumeKind,
        created: &mut Option<String>,
    ) -> Result<Volume> {
        let region = request.region.as_deref().unwrap_or_default();
        let mut volume_id = self.create_volume(request, kind).await?;
        *created = Some(volume_id.clone());
        tokio::time::sleep(self.timings().create_settle).await;

        // The API may acknowledge a creation and then lose the volume
        let mut attempts = 3;
        let volume = loop {
            match self.get_volume(region, &volume_id).await {
                Err(err) if attempts > 0 && err.api_message() == Some(VOLUME_NOT_FOUND) => {
                    warn!(volume_id, "volume vanished after creation, sending the request again");
                    *created = None;
                    tokio::time::sleep(self.timings().create_not_found_backoff).await;
                    volume_id = self.create_volume(request, kind).await?;
                    *created = Some(volume_id.clone());
                    attempts -= 1;
                }
                result => break result?,
            }
        };

        let timings = self.timings();
        poll_while(
            volume,
            |volume: &Volume| volume.life_cycle_state == LifeCycleState::Creating,
            timings.create_poll,
            timings.create_timeout,
            || self.get_volume(region, &volume_id),
        )
        .await
    }

    /// Fetch a volume, waiting for pending operations to finish
    ///
    /// `Ok(None)` means the volume no longer exists.
    pub async fn read_volume(&self, region: &str, volume_id: &str) -> Result<Option<Volume>> {
        let volume = self.get_volume_or_deleted(region, volume_id).await?;
        let timings = self.timings();
        let interval = (timings.read_poll, timings.read_poll);
        let volume = poll_while(
            volume,
            |volume: &Volume| volume.life_cycle_state.is_transient(),
            interval,
            timings.read_timeout,
            || self.get_volume_or_deleted(region, volume_id),
        )
        .await?;

        if volume.life_cycle_state == LifeCycleState::Deleted {
            return Ok(None);
        }
        if volume.volume_id != volume_id {
            return Err(Error::State(format!(
                "Expected Volume ID {volume_id}, Response contained Volume ID {}",
                volume.volume_id
            )));
        }
        match volume.life_cycle_state {
            LifeCycleState::Error => Err(Error::State(format!(
                "Volume with name: {} and id: {} is in error state. Please manually delete the volume, make sure the config is correct and run terraform apply again. LifeCycleStateDetails: {}",
                volume.name, volume.volume_id, volume.life_cycle_state_details
            ))),
            LifeCycleState::Disabled => Err(Error::State(format!(
                "Volume with name: {} and id: {} is in disabled state. Please manually enable the volume and run terraform apply again. LifeCycleStateDetails: {}",
                volume.name, volume.volume_id, volume.life_cycle_state_details
            ))),
            _ => Ok(Some(volume)),
        }
    }

    /// Delete a volume and wait for it to be gone
    pub async fn destroy_volume(&self, region: &str, volume_id: &str, zone: &str) -> Result<()> {
        self.delete_volume(region, volume_id, zone).await?;
        let volume = self.get_volume_or_deleted(region, volume_id).await?;

        let timings = self.timings();
        let interval = (timings.delete_poll, timings.delete_poll);
        let mut volume = poll_while(
            volume,
            |volume: &Volume| volume.life_cycle_state == LifeCycleState::Deleting,
            interval,
            timings.delete_timeout,
            || self.get_volume_or_deleted(region, volume_id),
        )
        .await?;

        let mut retries = 3;
        while volume.life_cycle_state == LifeCycleState::Error && retries > 0 {
            warn!(volume_id, "volume in error state while deleting, retrying");
            sleep_jitter(timings.delete_retry_backoff).await;
            self.delete_volume(region, volume_id, zone).await?;
            volume = self.get_volume_or_deleted(region, volume_id).await?;
            retries -= 1;
        }
        if volume.life_cycle_state == LifeCycleState::Error {
            return Err(Error::State(format!(
                "error deleting volume with id: {}, name: {}; {}",
                volume.volume_id, volume.name, volume.life_cycle_state_details
            )));
        }
        info!(volume_id, "volume deleted");
        Ok(())
    }

    /// Wait for a volume to accept snapshots and backups
    ///
    /// The volume is looked up by name and/or creation token.
    pub async fn wait_volume_ready(
        &self,
        region: &str,
        name: Option<&str>,
        creation_token: Option<&str>,
    ) -> Result<Volume> {
        let mut retries = 3;
        loop {
            let volume = self.find_volume(region, name, creation_token).await?;
            if volume.life_cycle_state_details == "Available for use" {
                return Ok(volume);
            }
            if retries == 0 {
                return Err(Error::State(format!(
                    "volume {} is not available for use: {}",
                    volume.volume_id, volume.life_cycle_state_details
                )));
            }
            retries -= 1;
            tokio::time::sleep(self.timings().volume_ready_poll).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn volume_decodes_api_payload() {
        let volume: Volume = serde_json::from_str(
            r#"{
                "name": "vol",
                "region": "us-east4",
                "creationToken": "vol-path",
                "protocolTypes": ["NFSv3", "CIFS"],
                "network": "projects/123/global/networks/default",
                "quotaInBytes": 1099511627776,
                "serviceLevel": "basic",
                "volumeId": "v1",
                "lifeCycleState": "available",
                "lifeCycleStateDetails": "Available for use",
                "mountPoints": [{"export": "/vol-path", "server": "10.0.0.1", "protocolType": "NFSv3"}],
                "regionalHA": true,
                "isDataProtection": false,
                "snapshotDirectory": true,
                "smbShareSettings": null,
                "exportPolicy": {"rules": [{"access": "ReadWrite", "allowedClients": "0.0.0.0/0", "hasRootAccess": "true", "nfsv3": {"checked": true}}]}
            }"#,
        )
        .unwrap();
        assert_eq!(volume.quota_in_bytes, 1024 * 1024 * 1024 * 1024);
        assert_eq!(volume.life_cycle_state, LifeCycleState::Available);
        assert_eq!(volume.mount_points[0].protocol_type, "NFSv3");
        assert!(volume.regional_ha);
        assert!(volume.smb_share_settings.is_empty());
        assert!(volume.export_policy.rules[0].nfsv3.checked);
        assert!(!volume.export_policy.rules[0].nfsv4.checked);
    }

    #[test]
    fn request_skips_unset_fields() {
        let request = VolumeRequest {
            name: Some("vol".into()),
            quota_in_bytes: Some(1024),
            regional_ha: Some(false),
            export_policy: Some(ExportPolicy {
                rules: vec![ExportRule {
                    kerberos5i_read_write: true.into(),
                    ..Default::default()
                }],
            }),
            ..Default::default()
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["name"], "vol");
        assert_eq!(json["quotaInBytes"], 1024);
        assert_eq!(json["regionalHA"], false);
        assert!(json.get("zone").is_none());
        assert!(json.get("snapshotPolicy").is_none());
        assert_eq!(
            json["exportPolicy"]["rules"][0]["kerberos5iReadWrite"]["checked"],
            true
        );
    }
}
