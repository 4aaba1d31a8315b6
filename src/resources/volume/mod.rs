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

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use tf_provider::value::Value;
use tf_provider::{AttributePath, Diagnostics};
use tracing::info;

use super::{CvsResource, Tainted};
use crate::api::split_id;
use crate::api::volume::VolumeKind;
use crate::client::{CvsClient, Error};
use crate::utils::{
    changed_attributes, known, or_null, unknown_if_null, WithNormalize, WithValidate,
};

pub(crate) mod policy;
mod state;

pub use state::{MountPointState, VolumeState};
pub(crate) use state::mount_points_type;

#[derive(Debug, Default, Clone, Copy)]
pub struct VolumeResource;

fn location(state: &VolumeState) -> Result<(&str, &str)> {
    let id = known(&state.id).context("volume has no id")?;
    let region = known(&state.region).context("volume has no region")?;
    Ok((id, region))
}

/// State of a volume left behind by a failed creation
fn leftover(planned: &VolumeState, id: &str) -> VolumeState {
    VolumeState {
        id: Value::Value(id.to_owned()),
        volume_path: or_null(&planned.volume_path),
        shared_vpc_project_number: or_null(&planned.shared_vpc_project_number),
        mount_points: Value::Null,
        ..planned.clone()
    }
}

#[async_trait]
impl CvsResource for VolumeResource {
    type State = VolumeState;
    const NAME: &'static str = "netapp-gcp_volume";

    fn validate(&self, diags: &mut Diagnostics, config: &VolumeState) {
        config.validate(diags, AttributePath::root());
    }

    fn plan_create(&self, diags: &mut Diagnostics, mut proposed: VolumeState) -> VolumeState {
        proposed.normalize(diags);
        proposed.id = Value::Unknown;
        proposed.mount_points = Value::Unknown;
        unknown_if_null(&mut proposed.volume_path);
        unknown_if_null(&mut proposed.shared_vpc_project_number);
        proposed
    }

    fn plan_update(
        &self,
        diags: &mut Diagnostics,
        prior: &VolumeState,
        mut proposed: VolumeState,
    ) -> (VolumeState, Vec<AttributePath>) {
        proposed.normalize(diags);
        let replace = changed_attributes!(
            prior, proposed;
            region,
            network,
            protocol_types,
            type_dp,
            zone,
            storage_class,
            regional_ha,
            volume_path,
            shared_vpc_project_number,
        );
        (proposed, replace)
    }

    async fn create(&self, client: &CvsClient, planned: &VolumeState) -> Result<VolumeState> {
        let name = known(&planned.name).unwrap_or_default();
        let region = known(&planned.region).unwrap_or_default();
        let kind = if planned.type_dp == Value::Value(true) {
            VolumeKind::DataProtection
        } else {
            VolumeKind::Regular
        };
        let delete_on_error = planned.delete_on_creation_error == Value::Value(true);
        info!(name, region, "creating volume");

        let request = planned.creation_request(client.project_number());
        let created = match client.provision_volume(request, kind, delete_on_error).await {
            Ok(created) => created,
            Err(Error::Incomplete { id, error }) => {
                let error =
                    anyhow::Error::from(*error).context(format!("Error creating volume {name}"));
                return Err(Tainted {
                    state: leftover(planned, &id),
                    error,
                }
                .into());
            }
            Err(err) => {
                return Err(anyhow::Error::from(err).context(format!("Error creating volume {name}")))
            }
        };
        let volume = match client.read_volume(region, &created.volume_id).await {
            Ok(Some(volume)) => volume,
            Ok(None) => bail!("volume {} vanished after its creation", created.volume_id),
            Err(err) => {
                return Err(Tainted {
                    state: leftover(planned, &created.volume_id),
                    error: err.into(),
                }
                .into())
            }
        };
        planned.refresh(&volume, client.project_number())
    }

    async fn read(&self, client: &CvsClient, state: &VolumeState) -> Result<Option<VolumeState>> {
        let (id, region) = location(state)?;
        match client.read_volume(region, id).await? {
            Some(volume) => Ok(Some(state.refresh(&volume, client.project_number())?)),
            None => Ok(None),
        }
    }

    async fn update(
        &self,
        client: &CvsClient,
        prior: &VolumeState,
        planned: &VolumeState,
    ) -> Result<VolumeState> {
        let (id, region) = location(prior)?;
        match VolumeState::update_request(prior, planned) {
            Some(request) => {
                info!(volume_id = id, "updating volume");
                client
                    .update_volume(region, id, &request)
                    .await
                    .with_context(|| format!("Error updating volume {id}"))?;
            }
            None => info!(volume_id = id, "volume is up to date"),
        }
        let volume = client
            .read_volume(region, id)
            .await?
            .ok_or_else(|| anyhow!("volume {id} vanished during its update"))?;
        planned.refresh(&volume, client.project_number())
    }

    async fn delete(&self, client: &CvsClient, state: &VolumeState) -> Result<()> {
        let (id, region) = location(state)?;
        let zone = known(&state.zone).unwrap_or_default();
        client
            .destroy_volume(region, id, zone)
            .await
            .with_context(|| format!("Error deleting volume {id}"))
    }

    /// `<volumeId>:<region>`, or `<volumeId>` alone when it is unique across regions
    async fn import(&self, client: &CvsClient, id: &str) -> Result<Option<VolumeState>> {
        let volume = if id.contains(':') {
            let parts = split_id(id, 2)?;
            client.read_volume(parts[1], parts[0]).await?
        } else {
            match client.locate_volume(id).await {
                Ok(volume) => Some(volume),
                Err(err) if err.is_not_found() => None,
                Err(err) => return Err(err.into()),
            }
        };
        volume
            .map(|volume| VolumeState::imported(&volume, client.project_number()))
            .transpose()
    }
}
