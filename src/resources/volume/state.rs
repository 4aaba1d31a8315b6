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

use std::collections::BTreeSet;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tf_provider::schema::{AttributeConstraint, AttributeType, Block, Description, Schema};
use tf_provider::value::{self, Value, ValueBool, ValueList, ValueNumber, ValueSet};
use tf_provider::{map, AttributePath, Diagnostics};

use super::policy::{
    export_policy_block, snapshot_policy_block, ExportPolicyState, SnapshotPolicyState,
};
use crate::api::volume::{ExportPolicy, MountPoint, SnapshotPolicy, Volume, VolumeRequest};
use crate::config::PROJECT_NUMBER;
use crate::utils::{
    attribute, check_match, check_one_of, default_if_null, known, non_empty, or_null,
    parse_network, network_path, protocol_from_api, protocol_to_api, refresh_if_set,
    service_level_from_api, service_level_to_api, WithNormalize, WithSchema, WithValidate, GIB,
};

pub(crate) const SERVICE_LEVELS: [&str; 3] = ["standard", "premium", "extreme"];
pub(crate) const STORAGE_CLASSES: [&str; 2] = ["software", "hardware"];
pub(crate) const PROTOCOLS: [&str; 3] = ["NFSv3", "NFSv4", "SMB"];
pub(crate) const SMB_SHARE_SETTINGS: [&str; 9] = [
    "encrypt_data",
    "browsable",
    "changenotify",
    "non_browsable",
    "oplocks",
    "showsnapshot",
    "show_previous_versions",
    "continuously_available",
    "access_based_enumeration",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct VolumeState {
    pub id: Value<String>,
    pub name: Value<String>,
    pub region: Value<String>,
    pub protocol_types: ValueList<Value<String>>,
    pub network: Value<String>,
    pub size: ValueNumber,
    pub type_dp: ValueBool,
    pub service_level: Value<String>,
    pub volume_path: Value<String>,
    pub shared_vpc_project_number: Value<String>,
    pub mount_points: ValueList<Value<MountPointState>>,
    pub delete_on_creation_error: ValueBool,
    pub zone: Value<String>,
    pub storage_class: Value<String>,
    pub regional_ha: ValueBool,
    pub snap_reserve: ValueNumber,
    pub snapshot_directory: ValueBool,
    pub smb_share_settings: ValueSet<Value<String>>,
    pub unix_permissions: Value<String>,
    #[serde(with = "value::serde_as_vec")]
    pub snapshot_policy: Value<SnapshotPolicyState>,
    #[serde(with = "value::serde_as_vec")]
    pub export_policy: Value<ExportPolicyState>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct MountPointState {
    pub export: Value<String>,
    pub server: Value<String>,
    pub protocol_type: Value<String>,
}

impl From<&MountPoint> for MountPointState {
    fn from(mount_point: &MountPoint) -> Self {
        Self {
            export: mount_point.export.clone().into(),
            server: mount_point.server.clone().into(),
            protocol_type: mount_point.protocol_type.clone().into(),
        }
    }
}

pub(crate) fn mount_points_type() -> AttributeType {
    AttributeType::List(Box::new(AttributeType::Object(map! {
        "export" => AttributeType::String,
        "server" => AttributeType::String,
        "protocol_type" => AttributeType::String,
    })))
}

impl WithSchema for VolumeState {
    fn schema() -> Schema {
        use AttributeConstraint::{Computed, Optional, OptionalComputed, Required};
        use AttributeType as T;
        Schema {
            version: 1,
            block: Block {
                version: 1,
                attributes: map! {
                    "id" => attribute(T::String, Computed, "ID of the volume"),
                    "name" => attribute(T::String, Required, "Name of the volume"),
                    "region" => attribute(T::String, Required, "Region of the volume"),
                    "protocol_types" => attribute(
                        T::List(Box::new(T::String)),
                        Required,
                        "Protocols of the volume: NFSv3, NFSv4 and/or SMB",
                    ),
                    "network" => attribute(T::String, Required, "VPC network of the volume"),
                    "size" => attribute(T::Number, Required, "Size of the volume in GiB"),
                    "type_dp" => attribute(
                        T::Bool,
                        OptionalComputed,
                        "Whether the volume is a data protection volume, false by default",
                    ),
                    "service_level" => attribute(
                        T::String,
                        OptionalComputed,
                        "Service level: standard, premium or extreme. Defaults to standard",
                    ),
                    "volume_path" => attribute(
                        T::String,
                        OptionalComputed,
                        "Creation token of the volume, generated when unset",
                    ),
                    "shared_vpc_project_number" => attribute(
                        T::String,
                        OptionalComputed,
                        "Host project number of a shared VPC network",
                    ),
                    "mount_points" => attribute(mount_points_type(), Computed, "Mount points of the volume"),
                    "delete_on_creation_error" => attribute(
                        T::Bool,
                        OptionalComputed,
                        "Delete the volume if it ends in error state after creation, false by default",
                    ),
                    "zone" => attribute(T::String, Optional, "Zone of a software volume"),
                    "storage_class" => attribute(T::String, Optional, "Storage class: software or hardware"),
                    "regional_ha" => attribute(T::Bool, Optional, "Regional high availability of a software volume"),
                    "snap_reserve" => attribute(
                        T::Number,
                        OptionalComputed,
                        "Percentage of the volume reserved for snapshots",
                    ),
                    "snapshot_directory" => attribute(
                        T::Bool,
                        OptionalComputed,
                        "Whether the .snapshot directory is visible, true by default",
                    ),
                    "smb_share_settings" => attribute(
                        T::Set(Box::new(T::String)),
                        Optional,
                        "SMB share settings",
                    ),
                    "unix_permissions" => attribute(T::String, Optional, "Unix permissions of the volume root"),
                },
                blocks: map! {
                    "snapshot_policy" => snapshot_policy_block(),
                    "export_policy" => export_policy_block(),
                },
                description: Description::plain("NetApp Cloud Volumes Service volume"),
                deprecated: false,
            },
        }
    }
}

impl WithNormalize for VolumeState {
    fn normalize(&mut self, diags: &mut Diagnostics) {
        default_if_null(&mut self.type_dp, false);
        default_if_null(&mut self.service_level, "standard".to_owned());
        default_if_null(&mut self.delete_on_creation_error, false);
        default_if_null(&mut self.snap_reserve, 0);
        default_if_null(&mut self.snapshot_directory, true);
        for policy in self.snapshot_policy.iter_mut() {
            policy.normalize(diags);
        }
        for policy in self.export_policy.iter_mut() {
            policy.normalize(diags);
        }
    }
}

impl WithValidate for VolumeState {
    fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        let path = |name: &'static str| attr_path.clone().attribute(name);
        check_one_of(diags, path("service_level"), &self.service_level, &SERVICE_LEVELS);
        check_one_of(diags, path("storage_class"), &self.storage_class, &STORAGE_CLASSES);
        check_match(
            diags,
            path("shared_vpc_project_number"),
            &self.shared_vpc_project_number,
            &PROJECT_NUMBER,
            "shared_vpc_project_number must be a numerical project number",
        );
        for (i, protocol) in self.protocol_types.iter().flatten().enumerate() {
            check_one_of(diags, path("protocol_types").index(i as i64), protocol, &PROTOCOLS);
        }
        for setting in self.smb_share_settings.iter().flatten() {
            check_one_of(diags, path("smb_share_settings"), setting, &SMB_SHARE_SETTINGS);
        }
        for policy in self.export_policy.iter() {
            policy.validate(diags, path("export_policy"));
        }

        let storage_class = self.storage_class.as_deref_option().map(str::to_ascii_lowercase);
        match storage_class.as_deref() {
            Some("software") => {
                if let (Some(zone), Some(regional_ha)) =
                    (zone_given(&self.zone), flag(&self.regional_ha))
                {
                    if zone == regional_ha {
                        diags.error(
                            "Invalid storage class",
                            "If storage_class is software, zone or RegionalHA is mandatory",
                            path("storage_class"),
                        );
                    }
                }
                if let Value::Value(level) = &self.service_level {
                    if level != "standard" {
                        diags.error(
                            "Invalid service level",
                            "service_level must be standard when storage_class is software",
                            path("service_level"),
                        );
                    }
                }
            }
            Some("hardware") => {
                if self.regional_ha == Value::Value(true) {
                    diags.error(
                        "Invalid regional_ha",
                        "regional_ha is not supported when storage_class is hardware",
                        path("regional_ha"),
                    );
                }
            }
            _ => (),
        }
    }
}

/// Whether a zone is given, `None` while unknown
fn zone_given(zone: &Value<String>) -> Option<bool> {
    match zone {
        Value::Value(zone) => Some(!zone.is_empty()),
        Value::Null => Some(false),
        Value::Unknown => None,
    }
}

fn flag(value: &ValueBool) -> Option<bool> {
    match value {
        Value::Value(value) => Some(*value),
        Value::Null => Some(false),
        Value::Unknown => None,
    }
}

fn strings(values: &ValueList<Value<String>>) -> Vec<String> {
    values
        .iter()
        .flatten()
        .filter_map(|value| value.as_ref_option().cloned())
        .collect()
}

fn string_set(values: &ValueSet<Value<String>>) -> Vec<String> {
    values
        .iter()
        .flatten()
        .filter_map(|value| value.as_ref_option().cloned())
        .collect()
}

impl VolumeState {
    pub(crate) fn size_in_bytes(&self) -> i64 {
        self.size.as_ref_option().copied().unwrap_or_default() * GIB
    }

    pub(crate) fn creation_request(&self, project_number: &str) -> VolumeRequest {
        let network = network_path(
            project_number,
            known(&self.shared_vpc_project_number),
            known(&self.network).unwrap_or_default(),
        );
        let export_policy = self
            .export_policy
            .as_ref_option()
            .map(ExportPolicy::from)
            .filter(|policy| !policy.rules.is_empty());
        let smb_share_settings = string_set(&self.smb_share_settings);
        VolumeRequest {
            name: known(&self.name).map(str::to_owned),
            region: known(&self.region).map(str::to_owned),
            creation_token: known(&self.volume_path).map(str::to_owned),
            protocol_types: Some(
                strings(&self.protocol_types)
                    .iter()
                    .map(|protocol| protocol_to_api(protocol))
                    .collect(),
            ),
            network: Some(network),
            quota_in_bytes: Some(self.size_in_bytes()),
            service_level: known(&self.service_level).map(service_level_to_api),
            snapshot_policy: self.snapshot_policy.as_ref_option().map(SnapshotPolicy::from),
            export_policy,
            zone: known(&self.zone).map(str::to_owned),
            storage_class: known(&self.storage_class).map(str::to_owned),
            regional_ha: self.regional_ha.as_ref_option().copied().filter(|ha| *ha),
            snapshot_directory: Some(self.snapshot_directory.as_ref_option().copied().unwrap_or(true)),
            snap_reserve: self.snap_reserve.as_ref_option().copied().filter(|reserve| *reserve != 0),
            unix_permissions: known(&self.unix_permissions).map(str::to_owned),
            smb_share_settings: (!smb_share_settings.is_empty()).then_some(smb_share_settings),
        }
    }

    /// Request applying the changes from `prior`, `None` when there is nothing to change
    pub(crate) fn update_request(prior: &Self, planned: &Self) -> Option<VolumeRequest> {
        let mut request = VolumeRequest {
            name: known(&planned.name).map(str::to_owned),
            region: known(&planned.region).map(str::to_owned),
            quota_in_bytes: Some(planned.size_in_bytes()),
            snap_reserve: Some(planned.snap_reserve.as_ref_option().copied().unwrap_or_default()),
            snapshot_directory: Some(planned.snapshot_directory.as_ref_option().copied().unwrap_or(true)),
            ..Default::default()
        };
        let mut changed = prior.name != planned.name
            || prior.size != planned.size
            || prior.snap_reserve != planned.snap_reserve
            || prior.snapshot_directory != planned.snapshot_directory;

        if prior.snapshot_policy != planned.snapshot_policy {
            if let Value::Value(policy) = &planned.snapshot_policy {
                request.snapshot_policy = Some(policy.into());
                changed = true;
            }
        }
        if prior.export_policy != planned.export_policy {
            request.export_policy = Some(
                planned
                    .export_policy
                    .as_ref_option()
                    .map(ExportPolicy::from)
                    .unwrap_or_default(),
            );
            changed = true;
        }
        if prior.service_level != planned.service_level {
            request.service_level = known(&planned.service_level).map(service_level_to_api);
            changed = true;
        }
        if prior.smb_share_settings != planned.smb_share_settings {
            request.smb_share_settings = Some(string_set(&planned.smb_share_settings));
            changed = true;
        }
        if prior.unix_permissions != planned.unix_permissions {
            request.unix_permissions = Some(known(&planned.unix_permissions).unwrap_or_default().to_owned());
            changed = true;
        }

        changed.then_some(request)
    }

    /// State of `volume`, keeping the optional parts that `self` does not set unset
    pub(crate) fn refresh(&self, volume: &Volume, project_number: &str) -> Result<Self> {
        let (network, shared_vpc) = parse_network(&volume.network, project_number)?;
        let smb_share_settings = match &self.smb_share_settings {
            Value::Value(configured) => Value::Value(
                configured
                    .iter()
                    .filter(|setting| {
                        setting
                            .as_deref_option()
                            .is_some_and(|setting| volume.smb_share_settings.iter().any(|api| api == setting))
                    })
                    .cloned()
                    .collect(),
            ),
            _ => Value::Null,
        };

        Ok(Self {
            id: Value::Value(volume.volume_id.clone()),
            name: Value::Value(volume.name.clone()),
            region: Value::Value(volume.region.clone()),
            protocol_types: Value::Value(
                volume
                    .protocol_types
                    .iter()
                    .map(|protocol| Value::Value(protocol_from_api(protocol)))
                    .collect(),
            ),
            network: Value::Value(network),
            size: Value::Value(volume.quota_in_bytes / GIB),
            type_dp: or_null(&self.type_dp).or(Value::Value(volume.is_data_protection)),
            service_level: Value::Value(service_level_from_api(&volume.service_level)),
            volume_path: Value::Value(volume.creation_token.clone()),
            shared_vpc_project_number: match shared_vpc {
                Some(project) => Value::Value(project),
                None => or_null(&self.shared_vpc_project_number),
            },
            mount_points: Value::Value(
                volume
                    .mount_points
                    .iter()
                    .map(|mount_point| Value::Value(mount_point.into()))
                    .collect(),
            ),
            delete_on_creation_error: or_null(&self.delete_on_creation_error).or(Value::Value(false)),
            zone: refresh_if_set(&self.zone, volume.zone.clone()),
            storage_class: refresh_if_set(&self.storage_class, volume.storage_class.clone()),
            regional_ha: refresh_if_set(&self.regional_ha, volume.regional_ha),
            snap_reserve: Value::Value(volume.snap_reserve),
            snapshot_directory: Value::Value(volume.snapshot_directory),
            smb_share_settings,
            unix_permissions: refresh_if_set(&self.unix_permissions, volume.unix_permissions.clone()),
            snapshot_policy: self
                .snapshot_policy
                .as_ref_option()
                .map(|policy| policy.refresh(&volume.snapshot_policy))
                .into(),
            export_policy: self
                .export_policy
                .as_ref_option()
                .map(|_| ExportPolicyState::from_api(&volume.export_policy))
                .into(),
        })
    }

    /// Full state of an existing volume
    pub(crate) fn imported(volume: &Volume, project_number: &str) -> Result<Self> {
        let prior = Self {
            type_dp: Value::Value(volume.is_data_protection),
            delete_on_creation_error: Value::Value(false),
            zone: non_empty(volume.zone.clone()),
            storage_class: non_empty(volume.storage_class.clone()),
            regional_ha: if volume.regional_ha {
                Value::Value(true)
            } else {
                Value::Null
            },
            unix_permissions: non_empty(volume.unix_permissions.clone()),
            smb_share_settings: if volume.smb_share_settings.is_empty() {
                Value::Null
            } else {
                Value::Value(
                    volume
                        .smb_share_settings
                        .iter()
                        .map(|setting| Value::Value(setting.clone()))
                        .collect::<BTreeSet<_>>(),
                )
            },
            snapshot_policy: Value::Value(SnapshotPolicyState::from_api(&volume.snapshot_policy)),
            export_policy: if volume.export_policy.rules.is_empty() {
                Value::Null
            } else {
                Value::Value(ExportPolicyState::default())
            },
            ..Default::default()
        };
        prior.refresh(volume, project_number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::volume::{Checked, ExportRule};
    use crate::client::lifecycle::LifeCycleState;

    fn planned() -> VolumeState {
        let mut state = VolumeState {
            name: Value::Value("data".into()),
            region: Value::Value("us-east4".into()),
            protocol_types: Value::Value(vec![Value::Value("NFSv3".into()), Value::Value("SMB".into())]),
            network: Value::Value("default".into()),
            size: Value::Value(1024),
            service_level: Value::Value("premium".into()),
            smb_share_settings: Value::Value(
                [Value::Value("browsable".to_owned()), Value::Value("encrypt_data".to_owned())].into(),
            ),
            ..Default::default()
        };
        state.normalize(&mut Diagnostics::default());
        state
    }

    fn api_volume() -> Volume {
        Volume {
            name: "data".into(),
            region: "us-east4".into(),
            creation_token: "data-token".into(),
            protocol_types: vec!["NFSv3".into(), "CIFS".into()],
            network: "projects/123/global/networks/default".into(),
            quota_in_bytes: 1024 * GIB,
            service_level: "standard".into(),
            volume_id: "v1".into(),
            life_cycle_state: LifeCycleState::Available,
            zone: "us-east4-a".into(),
            snapshot_directory: true,
            smb_share_settings: vec!["browsable".into(), "oplocks".into()],
            mount_points: vec![MountPoint {
                export: "/data-token".into(),
                server: "10.0.0.4".into(),
                protocol_type: "NFSv3".into(),
            }],
            ..Default::default()
        }
    }

    #[test]
    fn creation_request_translates_attributes() {
        let request = planned().creation_request("123");
        assert_eq!(request.protocol_types.unwrap(), ["NFSv3", "CIFS"]);
        assert_eq!(request.service_level.as_deref(), Some("medium"));
        assert_eq!(request.quota_in_bytes, Some(1024 * GIB));
        assert_eq!(
            request.network.as_deref(),
            Some("projects/123/global/networks/default")
        );
        assert_eq!(request.snapshot_directory, Some(true));
        assert_eq!(request.snap_reserve, None);
        assert_eq!(request.creation_token, None);
        assert!(request.export_policy.is_none());
    }

    #[test]
    fn refresh_keeps_unset_attributes_unset() {
        let mut planned = planned();
        planned.id = Value::Unknown;
        planned.mount_points = Value::Unknown;
        planned.volume_path = Value::Unknown;
        planned.shared_vpc_project_number = Value::Unknown;

        let state = planned.refresh(&api_volume(), "123").unwrap();
        assert_eq!(state.id, Value::Value("v1".into()));
        assert_eq!(state.service_level, Value::Value("premium".into()));
        assert_eq!(
            state.protocol_types,
            Value::Value(vec![Value::Value("NFSv3".into()), Value::Value("SMB".into())])
        );
        assert_eq!(state.volume_path, Value::Value("data-token".into()));
        assert_eq!(state.shared_vpc_project_number, Value::Null);
        assert_eq!(state.zone, Value::Null);
        assert!(state.snapshot_policy.is_null());
        assert_eq!(
            state.smb_share_settings,
            Value::Value([Value::Value("browsable".to_owned())].into())
        );
        assert_eq!(state.mount_points.as_ref_option().map(Vec::len), Some(1));
    }

    #[test]
    fn shared_vpc_is_read_back() {
        let mut volume = api_volume();
        volume.network = "projects/456/global/networks/shared".into();
        let state = planned().refresh(&volume, "123").unwrap();
        assert_eq!(state.network, Value::Value("shared".into()));
        assert_eq!(state.shared_vpc_project_number, Value::Value("456".into()));

        volume.network = "global/networks/shared".into();
        assert!(planned().refresh(&volume, "123").is_err());
    }

    #[test]
    fn updates_only_send_changes() {
        let prior = planned().refresh(&api_volume(), "123").unwrap();
        assert!(VolumeState::update_request(&prior, &prior).is_none());

        let mut planned = prior.clone();
        planned.size = Value::Value(2048);
        planned.service_level = Value::Value("extreme".into());
        let request = VolumeState::update_request(&prior, &planned).unwrap();
        assert_eq!(request.quota_in_bytes, Some(2048 * GIB));
        assert_eq!(request.service_level.as_deref(), Some("extreme"));
        assert!(request.export_policy.is_none());
        assert!(request.smb_share_settings.is_none());
    }

    #[test]
    fn import_builds_a_full_state() {
        let mut volume = api_volume();
        volume.export_policy.rules.push(ExportRule {
            access: "ReadWrite".into(),
            allowed_clients: "0.0.0.0/0".into(),
            has_root_access: "true".into(),
            nfsv3: Checked::from(true),
            ..Default::default()
        });
        let state = VolumeState::imported(&volume, "123").unwrap();
        assert_eq!(state.zone, Value::Value("us-east4-a".into()));
        assert_eq!(state.type_dp, Value::Value(false));
        assert!(state.snapshot_policy.is_value());
        assert_eq!(
            state
                .export_policy
                .as_ref_option()
                .and_then(|policy| policy.rule.as_ref_option())
                .map(Vec::len),
            Some(1)
        );
        assert_eq!(state.smb_share_settings.as_ref_option().map(BTreeSet::len), Some(2));
    }

    #[test]
    fn storage_class_rules() {
        let validate = |state: &VolumeState| {
            let mut diags = Diagnostics::default();
            state.validate(&mut diags, AttributePath::root());
            diags.errors.len()
        };

        let mut state = planned();
        assert_eq!(validate(&state), 0);

        state.storage_class = Value::Value("software".into());
        state.service_level = Value::Value("standard".into());
        assert_eq!(validate(&state), 1);
        state.zone = Value::Value("us-east4-a".into());
        assert_eq!(validate(&state), 0);
        state.regional_ha = Value::Value(true);
        assert_eq!(validate(&state), 1);

        state.regional_ha = Value::Value(true);
        state.storage_class = Value::Value("hardware".into());
        assert_eq!(validate(&state), 1);

        let mut state = planned();
        state.shared_vpc_project_number = Value::Value("my-host".into());
        state.protocol_types = Value::Value(vec![Value::Value("NFS".into())]);
        assert_eq!(validate(&state), 2);
    }
}
