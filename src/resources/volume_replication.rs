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
use crate::api::replication::Replication;
use crate::api::split_id;
use crate::client::CvsClient;
use crate::utils::{
    attribute, changed_attributes, check_one_of, known, non_empty, or_null, unknown_if_null,
    WithSchema,
};

pub(crate) const POLICIES: [&str; 3] = ["MirrorAllSnapshots", "MirrorLatest", "MirrorAndVault"];
pub(crate) const SCHEDULES: [&str; 5] = ["10minutely", "hourly", "daily", "weekly", "monthly"];
pub(crate) const BANDWIDTHS: [&str; 3] = ["64Mbps", "128Mbps", "256Mbps"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct VolumeReplicationState {
    pub id: Value<String>,
    pub name: Value<String>,
    pub region: Value<String>,
    pub destination_volume_id: Value<String>,
    pub source_volume_id: Value<String>,
    pub remote_region: Value<String>,
    pub endpoint_type: Value<String>,
    pub policy: Value<String>,
    pub schedule: Value<String>,
    pub bandwidth: Value<String>,
    pub mirror_state: Value<String>,
    pub relationship_status: Value<String>,
}

impl WithSchema for VolumeReplicationState {
    fn schema() -> Schema {
        use AttributeConstraint::{Computed, OptionalComputed, Required};
        use AttributeType as T;
        Schema {
            version: 1,
            block: Block {
                version: 1,
                attributes: map! {
                    "id" => attribute(T::String, Computed, "UUID of the replication"),
                    "name" => attribute(T::String, Required, "Name of the replication"),
                    "region" => attribute(T::String, Required, "Region of the replication"),
                    "destination_volume_id" => attribute(
                        T::String,
                        OptionalComputed,
                        "UUID of the data protection volume receiving the data",
                    ),
                    "source_volume_id" => attribute(T::String, OptionalComputed, "UUID of the replicated volume"),
                    "remote_region" => attribute(T::String, OptionalComputed, "Region of the other volume"),
                    "endpoint_type" => attribute(T::String, OptionalComputed, "Side of the relationship: src or dst"),
                    "policy" => attribute(
                        T::String,
                        OptionalComputed,
                        "Replication policy: MirrorAllSnapshots, MirrorLatest or MirrorAndVault",
                    ),
                    "schedule" => attribute(
                        T::String,
                        OptionalComputed,
                        "Replication schedule: 10minutely, hourly, daily, weekly or monthly",
                    ),
                    "bandwidth" => attribute(
                        T::String,
                        OptionalComputed,
                        "Bandwidth limit: 64Mbps, 128Mbps or 256Mbps",
                    ),
                    "mirror_state" => attribute(T::String, Computed, "State of the mirror"),
                    "relationship_status" => attribute(T::String, Computed, "Status of the transfers"),
                },
                description: Description::plain("Replication of a volume to another region"),
                ..Default::default()
            },
        }
    }
}

/// The API value, unless it only differs from the configured one by case
fn refresh_text(prior: &Value<String>, fresh: &str) -> Value<String> {
    match prior.as_deref_option() {
        Some(configured) if configured.eq_ignore_ascii_case(fresh) => prior.clone(),
        _ if fresh.is_empty() => or_null(prior),
        _ => Value::Value(fresh.to_owned()),
    }
}

impl VolumeReplicationState {
    fn creation_request(&self) -> Replication {
        let text = |value: &Value<String>| known(value).unwrap_or_default().to_owned();
        Replication {
            name: text(&self.name),
            region: text(&self.region),
            destination_volume_id: text(&self.destination_volume_id),
            source_volume_id: text(&self.source_volume_id),
            remote_region: text(&self.remote_region),
            endpoint_type: text(&self.endpoint_type),
            policy: text(&self.policy),
            schedule: text(&self.schedule),
            bandwidth: text(&self.bandwidth),
            ..Default::default()
        }
    }

    /// Only the changed name, policy, schedule and bandwidth are sent
    fn update_request(prior: &Self, planned: &Self) -> Replication {
        let changed = |prior: &Value<String>, planned: &Value<String>| {
            if prior != planned {
                known(planned).unwrap_or_default().to_owned()
            } else {
                String::new()
            }
        };
        Replication {
            region: known(&prior.region).unwrap_or_default().to_owned(),
            replication_id: known(&prior.id).unwrap_or_default().to_owned(),
            name: changed(&prior.name, &planned.name),
            policy: changed(&prior.policy, &planned.policy),
            schedule: changed(&prior.schedule, &planned.schedule),
            bandwidth: changed(&prior.bandwidth, &planned.bandwidth),
            ..Default::default()
        }
    }

    fn refresh(&self, replication: &Replication) -> Self {
        Self {
            id: Value::Value(replication.replication_id.clone()),
            name: refresh_text(&self.name, &replication.name),
            region: refresh_text(&self.region, &replication.region),
            destination_volume_id: refresh_text(
                &self.destination_volume_id,
                &replication.destination_volume_id,
            ),
            source_volume_id: refresh_text(&self.source_volume_id, &replication.source_volume_id),
            remote_region: refresh_text(&self.remote_region, &replication.remote_region),
            endpoint_type: refresh_text(&self.endpoint_type, &replication.endpoint_type),
            policy: refresh_text(&self.policy, &replication.policy),
            schedule: refresh_text(&self.schedule, &replication.schedule),
            bandwidth: refresh_text(&self.bandwidth, &replication.bandwidth),
            mirror_state: non_empty(replication.mirror_state.clone()),
            relationship_status: non_empty(replication.relationship_status.clone()),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct VolumeReplicationResource;

fn location(state: &VolumeReplicationState) -> Result<(&str, &str)> {
    let id = known(&state.id).context("volume replication has no id")?;
    let region = known(&state.region).context("volume replication has no region")?;
    Ok((id, region))
}

#[async_trait]
impl CvsResource for VolumeReplicationResource {
    type State = VolumeReplicationState;
    const NAME: &'static str = "netapp-gcp_volume_replication";

    fn validate(&self, diags: &mut Diagnostics, config: &VolumeReplicationState) {
        check_one_of(diags, AttributePath::new("policy"), &config.policy, &POLICIES);
        check_one_of(diags, AttributePath::new("schedule"), &config.schedule, &SCHEDULES);
        check_one_of(diags, AttributePath::new("bandwidth"), &config.bandwidth, &BANDWIDTHS);
    }

    fn plan_create(
        &self,
        _diags: &mut Diagnostics,
        mut proposed: VolumeReplicationState,
    ) -> VolumeReplicationState {
        proposed.id = Value::Unknown;
        proposed.mirror_state = Value::Unknown;
        proposed.relationship_status = Value::Unknown;
        for value in [
            &mut proposed.destination_volume_id,
            &mut proposed.source_volume_id,
            &mut proposed.remote_region,
            &mut proposed.endpoint_type,
            &mut proposed.policy,
            &mut proposed.schedule,
            &mut proposed.bandwidth,
        ] {
            unknown_if_null(value);
        }
        proposed
    }

    fn plan_update(
        &self,
        _diags: &mut Diagnostics,
        prior: &VolumeReplicationState,
        mut proposed: VolumeReplicationState,
    ) -> (VolumeReplicationState, Vec<AttributePath>) {
        let replace = changed_attributes!(
            prior, proposed;
            region,
            destination_volume_id,
            source_volume_id,
            remote_region,
            endpoint_type,
        );
        if proposed.name != prior.name
            || proposed.policy != prior.policy
            || proposed.schedule != prior.schedule
            || proposed.bandwidth != prior.bandwidth
        {
            proposed.mirror_state = Value::Unknown;
            proposed.relationship_status = Value::Unknown;
        }
        (proposed, replace)
    }

    async fn create(
        &self,
        client: &CvsClient,
        planned: &VolumeReplicationState,
    ) -> Result<VolumeReplicationState> {
        let request = planned.creation_request();
        let created = client
            .create_replication(&request)
            .await
            .with_context(|| format!("Error creating volume replication {}", request.name))?;
        let created = VolumeReplicationState {
            id: Value::Value(created.replication_id),
            ..planned.clone()
        };
        self.read(client, &created)
            .await?
            .context("volume replication vanished after its creation")
    }

    async fn read(
        &self,
        client: &CvsClient,
        state: &VolumeReplicationState,
    ) -> Result<Option<VolumeReplicationState>> {
        let (id, region) = location(state)?;
        let replication = client.read_replication(region, id).await?;
        Ok(replication.map(|replication| state.refresh(&replication)))
    }

    async fn update(
        &self,
        client: &CvsClient,
        prior: &VolumeReplicationState,
        planned: &VolumeReplicationState,
    ) -> Result<VolumeReplicationState> {
        let (id, _) = location(prior)?;
        info!(replication_id = id, "updating volume replication");
        client
            .update_replication(&VolumeReplicationState::update_request(prior, planned))
            .await
            .with_context(|| format!("Error updating volume replication {id}"))?;
        let planned = VolumeReplicationState {
            id: prior.id.clone(),
            ..planned.clone()
        };
        self.read(client, &planned)
            .await?
            .context("volume replication vanished during its update")
    }

    async fn delete(&self, client: &CvsClient, state: &VolumeReplicationState) -> Result<()> {
        let (id, region) = location(state)?;
        client
            .remove_replication(region, id)
            .await
            .with_context(|| format!("Error deleting volume replication {id}"))
    }

    /// `<replicationId>:<region>`
    async fn import(
        &self,
        client: &CvsClient,
        id: &str,
    ) -> Result<Option<VolumeReplicationState>> {
        let parts = split_id(id, 2)?;
        let prior = VolumeReplicationState {
            id: Value::Value(parts[0].to_owned()),
            region: Value::Value(parts[1].to_owned()),
            ..Default::default()
        };
        self.read(client, &prior).await
    }
}
