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
use tracing::info;

use super::{nullable, Envelope};
use crate::client::jobs::JobRef;
use crate::client::{CvsClient, Error, Result};

/// Storage pool as described by the API
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Pool {
    #[serde(deserialize_with = "nullable")]
    pub name: String,
    #[serde(deserialize_with = "nullable")]
    pub network: String,
    #[serde(deserialize_with = "nullable")]
    pub region: String,
    #[serde(deserialize_with = "nullable")]
    pub service_level: String,
    pub size_in_bytes: i64,
    #[serde(rename = "regionalHA")]
    pub regional_ha: bool,
    #[serde(rename = "globalILB")]
    pub global_ilb: bool,
    pub managed_pool: bool,
    #[serde(deserialize_with = "nullable")]
    pub secondary_zone: String,
    #[serde(deserialize_with = "nullable")]
    pub zone: String,
    #[serde(deserialize_with = "nullable")]
    pub pool_id: String,
    #[serde(deserialize_with = "nullable")]
    pub storage_class: String,
    #[serde(deserialize_with = "nullable")]
    pub jobs: Vec<JobRef>,
    #[serde(deserialize_with = "nullable")]
    pub billing_labels: Vec<BillingLabel>,
    #[serde(deserialize_with = "nullable")]
    pub state: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(default)]
pub struct BillingLabel {
    #[serde(deserialize_with = "nullable")]
    pub key: String,
    #[serde(deserialize_with = "nullable")]
    pub value: String,
}

/// Body of pool creation and update requests
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolRequest {
    pub name: String,
    pub region: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_in_bytes: Option<i64>,
    #[serde(rename = "regionalHA", skip_serializing_if = "Option::is_none")]
    pub regional_ha: Option<bool>,
    #[serde(rename = "globalILB", skip_serializing_if = "Option::is_none")]
    pub global_ilb: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secondary_zone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_class: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub billing_labels: Option<Vec<BillingLabel>>,
}

impl CvsClient {
    /// List the pools of a region, `-` for every region
    pub async fn list_pools(&self, region: &str) -> Result<Vec<Pool>> {
        let pools: Option<Vec<Pool>> = self.get(&format!("{region}/Pools")).await?;
        Ok(pools.unwrap_or_default())
    }

    /// Fetch a pool, `Ok(None)` when it no longer exists
    pub async fn get_pool(&self, region: &str, pool_id: &str) -> Result<Option<Pool>> {
        let pool: Pool = match self.get(&format!("{region}/Pools/{pool_id}")).await {
            Ok(pool) => pool,
            Err(err) if err.is_not_found() => return Ok(None),
            Err(err) => return Err(err),
        };
        if pool.state.eq_ignore_ascii_case("deleted") {
            return Ok(None);
        }
        if pool.pool_id != pool_id {
            return Err(Error::State(format!(
                "expected storage pool with id: {pool_id}, Response contained storage pool with id: {}",
                pool.pool_id
            )));
        }
        Ok(Some(pool))
    }

    /// Find a pool of the project by its ID alone
    pub async fn locate_pool(&self, pool_id: &str) -> Result<Pool> {
        let mut pools: Vec<Pool> = self
            .list_pools("-")
            .await?
            .into_iter()
            .filter(|pool| pool.pool_id == pool_id)
            .collect();
        match pools.len() {
            0 => Err(Error::NotFound(format!(
                "No storage pool found with ID {pool_id}"
            ))),
            1 => Ok(pools.remove(0)),
            _ => Err(Error::Ambiguous(format!(
                "More than one storage pool found with ID {pool_id}. Use the <poolID>:<region_name> format to import it"
            ))),
        }
    }

    /// Create a pool and wait for its creation job
    pub async fn create_pool(&self, request: &PoolRequest) -> Result<Pool> {
        let created: Envelope<Pool> = self
            .post(&format!("{}/Pools", request.region), request)
            .await?;
        let pool = created.into_inner();
        self.wait_pool_job(&pool).await?;
        info!(pool_id = pool.pool_id, "storage pool created");
        Ok(pool)
    }

    /// Update a pool and wait for the update job
    pub async fn update_pool(&self, pool_id: &str, request: &PoolRequest) -> Result<()> {
        let updated: Envelope<Pool> = self
            .put(&format!("{}/Pools/{pool_id}", request.region), request)
            .await?;
        self.wait_pool_job(&updated.into_inner()).await
    }

    pub async fn delete_pool(&self, region: &str, pool_id: &str) -> Result<()> {
        let _: serde_json::Value = self.delete(&format!("{region}/Pools/{pool_id}")).await?;
        Ok(())
    }

    async fn wait_pool_job(&self, pool: &Pool) -> Result<()> {
        let job = pool.jobs.first().ok_or_else(|| {
            Error::State(format!("no job returned for storage pool {}", pool.name))
        })?;
        let timings = self.timings();
        self.wait_for_job(
            &pool.region,
            &job.job_id,
            timings.pool_job_poll,
            timings.pool_job_timeout,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_decodes_jobs_and_labels() {
        let pool: Pool = serde_json::from_str(
            r#"{
                "name": "pool",
                "region": "us-east4",
                "poolId": "p1",
                "sizeInBytes": 2199023255552,
                "globalILB": true,
                "jobs": [{"jobId": "j1"}],
                "billingLabels": [{"key": "team", "value": "storage"}],
                "state": "Creating"
            }"#,
        )
        .unwrap();
        assert!(pool.global_ilb);
        assert_eq!(pool.jobs[0].job_id, "j1");
        assert_eq!(pool.billing_labels[0].key, "team");
    }

    #[test]
    fn request_names_acronyms_like_the_api() {
        let request = PoolRequest {
            name: "pool".into(),
            region: "us-east4".into(),
            regional_ha: Some(true),
            global_ilb: Some(false),
            ..Default::default()
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["regionalHA"], true);
        assert_eq!(json["globalILB"], false);
        assert!(json.get("poolId").is_none());
    }
}
