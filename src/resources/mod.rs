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

//! Managed resources
//!
//! Each resource implements [`CvsResource`] on plain state structs, and is exposed to
//! Terraform through [`ApiResource`], which owns the plumbing shared by all of them:
//! fetching the configured client, null states for vanished objects, and turning errors into diagnostics.

use std::fmt::{Debug, Display};
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use tf_provider::schema::Schema;
use tf_provider::value::{Value, ValueEmpty};
use tf_provider::{AttributePath, Diagnostics, Resource};
use tracing::{info, warn};

use crate::client::CvsClient;
pub use crate::utils::WithSchema;

pub mod active_directory;
pub mod kms_config;
pub mod snapshot;
pub mod storage_pool;
pub mod volume;
pub mod volume_backup;
pub mod volume_replication;

pub use active_directory::ActiveDirectoryResource;
pub use kms_config::KmsConfigResource;
pub use snapshot::SnapshotResource;
pub use storage_pool::StoragePoolResource;
pub use volume::VolumeResource;
pub use volume_backup::VolumeBackupResource;
pub use volume_replication::VolumeReplicationResource;

/// Client shared by all resources and data sources, set once the provider is configured
pub type ClientSlot = Arc<OnceLock<Arc<CvsClient>>>;

pub(crate) fn connected(slot: &ClientSlot, diags: &mut Diagnostics) -> Option<Arc<CvsClient>> {
    let client = slot.get().cloned();
    if client.is_none() {
        diags.root_error_short("The provider has not been configured");
    }
    client
}

pub(crate) fn report(diags: &mut Diagnostics, summary: String, err: &anyhow::Error) {
    diags.root_error(summary, format!("{err:#}"));
}

/// Creation failure that left an object behind
///
/// `state` identifies that object; it is saved along with the error so that
/// Terraform tracks the object as tainted and replaces it on the next apply.
#[derive(Debug)]
pub struct Tainted<S> {
    pub state: S,
    pub error: anyhow::Error,
}

impl<S> Display for Tainted<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#}", self.error)
    }
}

impl<S: Debug> std::error::Error for Tainted<S> {}

/// Lifecycle of a Cloud Volumes object
#[async_trait]
pub trait CvsResource: Send + Sync + 'static {
    type State: WithSchema
        + Serialize
        + DeserializeOwned
        + Clone
        + Debug
        + Default
        + PartialEq
        + Send
        + Sync
        + 'static;

    /// Full type name, as shown in diagnostics (`netapp-gcp_volume`)
    const NAME: &'static str;

    fn validate(&self, diags: &mut Diagnostics, config: &Self::State) {
        _ = diags;
        _ = config;
    }

    /// Fill defaults and mark the attributes computed on creation as unknown
    fn plan_create(&self, diags: &mut Diagnostics, proposed: Self::State) -> Self::State;

    /// Fill defaults, and list the changed attributes that cannot be updated in place
    fn plan_update(
        &self,
        diags: &mut Diagnostics,
        prior: &Self::State,
        proposed: Self::State,
    ) -> (Self::State, Vec<AttributePath>);

    /// Create the object
    ///
    /// Fails with [`Tainted`] when the object exists but could not be brought to a usable state.
    async fn create(&self, client: &CvsClient, planned: &Self::State)
        -> anyhow::Result<Self::State>;

    /// Current state of the object, `None` when it no longer exists
    async fn read(
        &self,
        client: &CvsClient,
        state: &Self::State,
    ) -> anyhow::Result<Option<Self::State>>;

    async fn update(
        &self,
        client: &CvsClient,
        prior: &Self::State,
        planned: &Self::State,
    ) -> anyhow::Result<Self::State>;

    async fn delete(&self, client: &CvsClient, state: &Self::State) -> anyhow::Result<()>;

    async fn import(&self, client: &CvsClient, id: &str) -> anyhow::Result<Option<Self::State>>;
}

#[derive(Debug)]
pub struct ApiResource<R> {
    resource: R,
    slot: ClientSlot,
}

impl<R> ApiResource<R> {
    pub fn new(resource: R, slot: ClientSlot) -> Self {
        Self { resource, slot }
    }
}

#[async_trait]
impl<R> Resource for ApiResource<R>
where
    R: CvsResource,
{
    type State<'a> = Value<R::State>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(R::State::schema())
    }

    async fn validate<'a>(&self, diags: &mut Diagnostics, config: Self::State<'a>) -> Option<()> {
        if let Value::Value(config) = &config {
            self.resource.validate(diags, config);
        }

        if diags.errors.is_empty() {
            Some(())
        } else {
            None
        }
    }

    async fn read<'a>(
        &self,
        diags: &mut Diagnostics,
        state: Self::State<'a>,
        private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let Value::Value(current) = &state else {
            return Some((state, private_state));
        };
        let Some(client) = connected(&self.slot, diags) else {
            return Some((state, private_state));
        };

        match self.resource.read(&client, current).await {
            Ok(Some(fresh)) => Some((Value::Value(fresh), private_state)),
            Ok(None) => {
                warn!(resource = R::NAME, "object no longer exists, removing it from the state");
                Some((Value::Null, private_state))
            }
            Err(err) => {
                report(diags, format!("Unable to read {}", R::NAME), &err);
                Some((state, private_state))
            }
        }
    }

    async fn plan_create<'a>(
        &self,
        diags: &mut Diagnostics,
        proposed_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let state = proposed_state.map(|proposed| self.resource.plan_create(diags, proposed));
        Some((state, Default::default()))
    }

    async fn plan_update<'a>(
        &self,
        diags: &mut Diagnostics,
        prior_state: Self::State<'a>,
        proposed_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        prior_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(
        Self::State<'a>,
        Self::PrivateState<'a>,
        Vec<AttributePath>,
    )> {
        match (prior_state, proposed_state) {
            (Value::Value(prior), Value::Value(proposed)) => {
                let (planned, replace) = self.resource.plan_update(diags, &prior, proposed);
                Some((Value::Value(planned), prior_private_state, replace))
            }
            (_, proposed) => Some((proposed, prior_private_state, vec![])),
        }
    }

    async fn plan_destroy<'a>(
        &self,
        _diags: &mut Diagnostics,
        _prior_state: Self::State<'a>,
        prior_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<Self::PrivateState<'a>> {
        Some(prior_private_state)
    }

    async fn create<'a>(
        &self,
        diags: &mut Diagnostics,
        planned_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        planned_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let client = connected(&self.slot, diags)?;
        let Value::Value(planned) = &planned_state else {
            diags.root_error_short("Cannot create an object from a null state");
            return None;
        };

        info!(resource = R::NAME, "creating");
        let summary = format!("Unable to create {}", R::NAME);
        match self.resource.create(&client, planned).await {
            Ok(state) => Some((Value::Value(state), planned_private_state)),
            Err(err) => match err.downcast::<Tainted<R::State>>() {
                Ok(tainted) => {
                    warn!(resource = R::NAME, "creation failed, keeping the object as tainted");
                    report(diags, summary, &tainted.error);
                    Some((Value::Value(tainted.state), planned_private_state))
                }
                Err(err) => {
                    report(diags, summary, &err);
                    None
                }
            },
        }
    }

    async fn update<'a>(
        &self,
        diags: &mut Diagnostics,
        prior_state: Self::State<'a>,
        planned_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        planned_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let client = connected(&self.slot, diags)?;
        let (Value::Value(prior), Value::Value(planned)) = (&prior_state, &planned_state) else {
            diags.root_error_short("Cannot update an object from a null state");
            return None;
        };

        info!(resource = R::NAME, "updating");
        match self.resource.update(&client, prior, planned).await {
            Ok(state) => Some((Value::Value(state), planned_private_state)),
            Err(err) => {
                report(diags, format!("Unable to update {}", R::NAME), &err);
                None
            }
        }
    }

    async fn destroy<'a>(
        &self,
        diags: &mut Diagnostics,
        prior_state: Self::State<'a>,
        _planned_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<()> {
        let Value::Value(prior) = &prior_state else {
            return Some(());
        };
        let client = connected(&self.slot, diags)?;

        info!(resource = R::NAME, "deleting");
        match self.resource.delete(&client, prior).await {
            Ok(()) => Some(()),
            Err(err) => {
                report(diags, format!("Unable to delete {}", R::NAME), &err);
                None
            }
        }
    }

    async fn import<'a>(
        &self,
        diags: &mut Diagnostics,
        id: String,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let client = connected(&self.slot, diags)?;

        info!(resource = R::NAME, id, "importing");
        match self.resource.import(&client, &id).await {
            Ok(Some(state)) => Some((Value::Value(state), Default::default())),
            Ok(None) => {
                diags.root_error(
                    format!("Cannot import {}", R::NAME),
                    format!("no object matches {id:?}"),
                );
                None
            }
            Err(err) => {
                report(diags, format!("Unable to import {}", R::NAME), &err);
                None
            }
        }
    }
}
