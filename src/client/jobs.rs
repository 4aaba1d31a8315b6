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

use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

use super::{CvsClient, Error, Result};

/// Reference to an asynchronous job, as embedded in create/update/break responses
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRef {
    #[serde(default)]
    pub job_id: String,
    #[serde(default)]
    pub action: String,
}

/// Status of a job
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub state_details: String,
}

impl CvsClient {
    pub async fn get_job(&self, region: &str, job_id: &str) -> Result<Job> {
        self.get(&format!("{region}/Jobs/{job_id}")).await
    }

    /// Wait for a job to be `done`
    ///
    /// A job in `error` fails with its details. A job still running once `timeout` is spent is
    /// logged and considered successful.
    pub async fn wait_for_job(
        &self,
        region: &str,
        job_id: &str,
        interval: Duration,
        timeout: Duration,
    ) -> Result<()> {
        let mut waited = Duration::ZERO;
        while waited < timeout {
            tokio::time::sleep(interval).await;
            waited += interval;
            let job = self.get_job(region, job_id).await?;
            debug!(region, job_id, state = %job.state, "job status");
            match job.state.as_str() {
                "done" => return Ok(()),
                "error" => return Err(Error::State(job.state_details)),
                _ => (),
            }
        }
        warn!(region, job_id, "job is still ongoing, giving up after the maximum wait time");
        Ok(())
    }

    /// Wait for every job of `jobs` with the given `action`
    pub async fn wait_for_jobs(
        &self,
        region: &str,
        jobs: &[JobRef],
        action: &str,
        interval: Duration,
        timeout: Duration,
    ) -> Result<()> {
        for job in jobs.iter().filter(|job| job.action == action) {
            self.wait_for_job(region, &job.job_id, interval, timeout)
                .await?;
        }
        Ok(())
    }
}
