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

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tf_provider::schema::{AttributeConstraint, AttributeType, Block, Description, Schema};
use tf_provider::value::{Value, ValueBool, ValueEmpty, ValueList, ValueNumber};
use tf_provider::{map, DataSource, Diagnostics};
use tracing::info;

use crate::api::volume::Volume;
use crate::resources::volume::policy::{
    export_policy_type, snapshot_policy_type, ExportPolicyState, SnapshotPolicyState,
};
use crate::resources::volume::{mount_points_type, MountPointState};
use crate::resources::{connected, report, ClientSlot};
use crate::utils::{attribute, known, network_name, protocol_from_api, WithSchema, GIB};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct VolumeDataState {
    pub id: Value<String>,
    pub name: Value<String>,
    pub region: Value<String>,
    pub type_dp: ValueBool,
    pub protocol_types: ValueList<Value<String>>,
    pub network: Value<String>,
    pub size: ValueNumber,
    pub service_level: Value<String>,
    pub volume_path: Value<String>,
    pub mount_points: ValueList<Value<MountPointState>>,
    pub snapshot_policy: ValueList<Value<SnapshotPolicyState>>,
    pub export_policy: ValueList<Value<ExportPolicyState>>,
    pub zone: Value<String>,
    pub storage_class: Value<String>,
}

impl WithSchema for VolumeDataState {
    fn schema() -> Schema {
        use AttributeConstraint::{Computed, Required};
        use AttributeType as T;
        Schema {
            version: 1,
            block: Block {
                version: 1,
                attributes: map! {
                    "id" => attribute(T::String, Computed, "ID of the volume"),
                    "name" => attribute(T::String, Required, "Name of the volume"),
                    "region" => attribute(T::String, Required, "Region of the volume"),
                    "type_dp" => attribute(T::Bool, Computed, "Whether the volume is a data protection volume"),
                    "protocol_types" => attribute(T::List(Box::new(T::String)), Computed, "Protocols of the volume"),
                    "network" => attribute(T::String, Computed, "VPC network of the volume"),
                    "size" => attribute(T::Number, Computed, "Size of the volume in GiB"),
                    "service_level" => attribute(T::String, Computed, "Service level of the volume"),
                    "volume_path" => attribute(T::String, Computed, "Creation token of the volume"),
                    "mount_points" => attribute(mount_points_type(), Computed, "Mount points of the volume"),
                    "snapshot_policy" => attribute(snapshot_policy_type(), Computed, "Snapshot policy"),
                    "export_policy" => attribute(export_policy_type(), Computed, "Export policy"),
                    "zone" => attribute(T::String, Computed, "Zone of the volume"),
                    "storage_class" => attribute(T::String, Computed, "Storage class of the volume"),
                },
                description: Description::plain("Looks up a volume by name"),
                ..Default::default()
            },
        }
    }
}

impl VolumeDataState {
    fn from_api(volume: &Volume) -> Self {
        Self {
            id: Value::Value(volume.volume_id.clone()),
            name: Value::Value(volume.name.clone()),
            region: Value::Value(volume.region.clone()),
            type_dp: Value::Value(volume.is_data_protection),
            protocol_types: Value::Value(
                volume
                    .protocol_types
                    .iter()
                    .map(|protocol| Value::Value(protocol_from_api(protocol)))
                    .collect(),
            ),
            network: Value::Value(network_name(&volume.network).to_owned()),
            size: Value::Value(volume.quota_in_bytes / GIB),
            service_level: Value::Value(volume.service_level.clone()),
            volume_path: Value::Value(volume.creation_token.clone()),
            mount_points: Value::Value(
                volume
                    .mount_points
                    .iter()
                    .map(|mount_point| Value::Value(mount_point.into()))
                    .collect(),
            ),
            snapshot_policy: Value::Value(vec![Value::Value(SnapshotPolicyState::from_api(
                &volume.snapshot_policy,
            ))]),
            export_policy: Value::Value(vec![Value::Value(ExportPolicyState::from_api(
                &volume.export_policy,
            ))]),
            zone: Value::Value(volume.zone.clone()),
            storage_class: Value::Value(volume.storage_class.clone()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct VolumeDataSource {
    slot: ClientSlot,
}

impl VolumeDataSource {
    pub fn new(slot: ClientSlot) -> Self {
        Self { slot }
    }
}

#[async_trait]
impl DataSource for VolumeDataSource {
    type State<'a> = VolumeDataState;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(VolumeDataState::schema())
    }

    async fn read<'a>(
        &self,
        diags: &mut Diagnostics,
        config: Self::State<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<Self::State<'a>> {
        let client = connected(&self.slot, diags)?;
        let region = known(&config.region).unwrap_or_default();
        let name = known(&config.name);
        info!(region, name, "looking up volume");

        match client
            .find_volume(region, name, None)
            .await
            .context("Error reading volume")
        {
            Ok(volume) => Some(VolumeDataState::from_api(&volume)),
            Err(err) => {
                report(diags, "Unable to read netapp-gcp_volume".into(), &err);
                None
            }
        }
    }
}
