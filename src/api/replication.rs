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

use super::{nullable, Envelope};
use crate::client::jobs::JobRef;
use crate::client::lifecycle::{poll_while, LifeCycleState};
use crate::client::{CvsClient, Error, Result};

/// Replication relationship between two volumes
///
/// Used both as request body and as response; empty fields are not sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Replication {
    #[serde(deserialize_with = "nullable", skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(deserialize_with = "nullable", skip_serializing_if = "String::is_empty")]
    pub region: String,
    #[serde(
        rename = "volumeReplicationUUID",
        deserialize_with = "nullable",
        skip_serializing_if = "String::is_empty"
    )]
    pub replication_id: String,
    #[serde(
        rename = "destinationVolumeUUID",
        deserialize_with = "nullable",
        skip_serializing_if = "String::is_empty"
    )]
    pub destination_volume_id: String,
    #[serde(
        rename = "sourceVolumeUUID",
        deserialize_with = "nullable",
        skip_serializing_if = "String::is_empty"
    )]
    pub source_volume_id: String,
    #[serde(deserialize_with = "nullable", skip_serializing_if = "String::is_empty")]
    pub remote_region: String,
    #[serde(deserialize_with = "nullable", skip_serializing_if = "String::is_empty")]
    pub endpoint_type: String,
    #[serde(
        rename = "replicationPolicy",
        deserialize_with = "nullable",
        skip_serializing_if = "String::is_empty"
    )]
    pub policy: String,
    #[serde(
        rename = "replicationSchedule",
        deserialize_with = "nullable",
        skip_serializing_if = "String::is_empty"
    )]
    pub schedule: String,
    #[serde(deserialize_with = "nullable", skip_serializing_if = "String::is_empty")]
    pub bandwidth: String,
    #[serde(deserialize_with = "nullable", skip_serializing_if = "String::is_empty")]
    pub mirror_state: String,
    #[serde(deserialize_with = "nullable", skip_serializing_if = "String::is_empty")]
    pub relationship_status: String,
    #[serde(deserialize_with = "nullable", skip_serializing)]
    pub life_cycle_state: LifeCycleState,
    #[serde(deserialize_with = "nullable", skip_serializing)]
    pub life_cycle_state_details: String,
    #[serde(deserialize_with = "nullable", skip_serializing)]
    pub jobs: Vec<JobRef>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct JobList {
    #[serde(deserialize_with = "nullable")]
    jobs: Vec<JobRef>,
}

impl CvsClient {
    /// Create a replication and wait for its creation jobs
    pub async fn create_replication(&self, request: &Replication) -> Result<Replication> {
        let created: Replication = self
            .post(&format!("{}/VolumeReplications", request.region), request)
            .await?;
        let timings = self.timings();
        self.wait_for_jobs(
            &request.region,
            &created.jobs,
            "create",
            timings.replication_job_poll,
            timings.replication_job_timeout,
        )
        .await?;
        info!(replication_id = created.replication_id, "volume replication created");
        Ok(created)
    }

    /// Fetch a replication, `Ok(None)` when it is gone or being deleted
    pub async fn get_replication(
        &self,
        region: &str,
        replication_id: &str,
    ) -> Result<Option<Replication>> {
        let path = format!("{region}/VolumeReplications/{replication_id}");
        let replication: Replication = match self.get(&path).await {
            Ok(replication) => replication,
            Err(err) if err.is_not_found() => return Ok(None),
            Err(err) => return Err(err),
        };
        match replication.life_cycle_state {
            LifeCycleState::Deleted | LifeCycleState::Deleting => Ok(None),
            _ if replication.replication_id != replication_id => Err(Error::State(format!(
                "Expected replication ID {replication_id}, Response contained replication ID {}",
                replication.replication_id
            ))),
            _ => Ok(Some(replication)),
        }
    }

    /// Fetch a replication once it is `available`
    pub async fn read_replication(
        &self,
        region: &str,
        replication_id: &str,
    ) -> Result<Option<Replication>> {
        let Some(replication) = self.get_replication(region, replication_id).await? else {
            return Ok(None);
        };
        let timings = self.timings();
        let interval = (timings.replication_read_poll, timings.replication_read_poll);
        let pending = |replication: &Option<Replication>| {
            replication.as_ref().is_some_and(|replication| {
                !matches!(
                    replication.life_cycle_state,
                    LifeCycleState::Available | LifeCycleState::Error
                )
            })
        };
        let replication = poll_while(
            Some(replication),
            pending,
            interval,
            timings.replication_read_timeout,
            || self.get_replication(region, replication_id),
        )
        .await?;

        match replication {
            Some(replication) if replication.life_cycle_state == LifeCycleState::Error => {
                Err(Error::State(format!(
                    "Volume replication {} is in error state. Please check the setup. {}",
                    replication.replication_id, replication.life_cycle_state_details
                )))
            }
            Some(replication) if replication.life_cycle_state != LifeCycleState::Available => {
                warn!(
                    replication_id,
                    state = %replication.life_cycle_state,
                    "volume replication is still not available"
                );
                Ok(Some(replication))
            }
            replication => Ok(replication),
        }
    }

    pub async fn update_replication(&self, request: &Replication) -> Result<()> {
        let path = format!(
            "{}/VolumeReplications/{}",
            request.region, request.replication_id
        );
        let _: serde_json::Value = self.put(&path, request).await?;
        Ok(())
    }

    /// Break the mirror and wait for the break jobs
    pub async fn break_replication(&self, region: &str, replication_id: &str) -> Result<()> {
        let path = format!("{region}/VolumeReplications/{replication_id}/Break");
        let reply: Envelope<JobList> = self.post(&path, &serde_json::json!({})).await?;
        let timings = self.timings();
        self.wait_for_jobs(
            region,
            &reply.into_inner().jobs,
            "break",
            timings.replication_job_poll,
            timings.replication_job_timeout,
        )
        .await
    }

    pub async fn delete_replication(&self, region: &str, replication_id: &str) -> Result<()> {
        let _: serde_json::Value = self
            .delete(&format!("{region}/VolumeReplications/{replication_id}"))
            .await?;
        Ok(())
    }

    /// Break then delete a replication
    pub async fn remove_replication(&self, region: &str, replication_id: &str) -> Result<()> {
        self.break_replication(region, replication_id).await?;
        self.delete_replication(region, replication_id).await?;
        info!(replication_id, "volume replication deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_set_fields_are_sent() {
        let request = Replication {
            name: "mirror".into(),
            region: "us-east4".into(),
            source_volume_id: "v1".into(),
            schedule: "hourly".into(),
            life_cycle_state: LifeCycleState::Available,
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({
                "name": "mirror",
                "region": "us-east4",
                "sourceVolumeUUID": "v1",
                "replicationSchedule": "hourly"
            })
        );
    }

    #[test]
    fn creation_reply_carries_jobs() {
        let created: Replication = serde_json::from_str(
            r#"{"volumeReplicationUUID": "r1", "jobs": [{"jobId": "j1", "action": "create"}, {"jobId": "j2", "action": "other"}]}"#,
        )
        .unwrap();
        assert_eq!(created.replication_id, "r1");
        assert_eq!(created.jobs.len(), 2);
        assert_eq!(created.jobs[0].action, "create");
    }
}
