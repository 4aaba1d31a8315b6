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

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tf_provider::schema::{
    Attribute, AttributeConstraint, AttributeType, Block, Description, NestedBlock, Schema,
};
use tf_provider::value::{Value, ValueBool, ValueNumber, ValueSet};
use tf_provider::{map, AttributePath, Diagnostics};
use tracing::info;

use super::CvsResource;
use crate::api::split_id;
use crate::api::storage_pool::{BillingLabel, Pool, PoolRequest};
use crate::client::CvsClient;
use crate::config::PROJECT_NUMBER;
use crate::utils::{
    attribute, changed_attributes, check_match, check_one_of, default_if_null, known, network_path,
    non_empty, or_null, parse_network, unknown_if_null, WithNormalize, WithSchema, GIB,
};

pub(crate) const POOL_SERVICE_LEVELS: [&str; 2] = ["ZoneRedundantStandardSW", "StandardSW"];
pub(crate) const POOL_STORAGE_CLASSES: [&str; 2] = ["hardware", "software"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct StoragePoolState {
    pub id: Value<String>,
    pub name: Value<String>,
    pub network: Value<String>,
    pub region: Value<String>,
    pub service_level: Value<String>,
    pub size: ValueNumber,
    pub regional_ha: ValueBool,
    pub global_ilb: ValueBool,
    pub managed_pool: ValueBool,
    pub zone: Value<String>,
    pub secondary_zone: Value<String>,
    pub storage_class: Value<String>,
    pub shared_vpc_project_number: Value<String>,
    pub billing_label: ValueSet<Value<BillingLabelState>>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct BillingLabelState {
    pub key: Value<String>,
    pub value: Value<String>,
}

impl From<&BillingLabel> for BillingLabelState {
    fn from(label: &BillingLabel) -> Self {
        Self {
            key: Value::Value(label.key.clone()),
            value: Value::Value(label.value.clone()),
        }
    }
}

impl WithSchema for StoragePoolState {
    fn schema() -> Schema {
        use AttributeConstraint::{Computed, Optional, OptionalComputed, Required};
        use AttributeType as T;
        Schema {
            version: 1,
            block: Block {
                version: 1,
                attributes: map! {
                    "id" => attribute(T::String, Computed, "ID of the storage pool"),
                    "name" => attribute(T::String, Required, "Name of the storage pool"),
                    "network" => attribute(T::String, Required, "VPC network of the storage pool"),
                    "region" => attribute(T::String, Required, "Region of the storage pool"),
                    "service_level" => attribute(
                        T::String,
                        Required,
                        "Service level: ZoneRedundantStandardSW or StandardSW",
                    ),
                    "size" => attribute(T::Number, Required, "Size of the storage pool in GiB"),
                    "regional_ha" => Attribute {
                        deprecated: true,
                        ..attribute(T::Bool, Optional, "Whether the pool is replicated across two zones")
                    },
                    "global_ilb" => attribute(
                        T::Bool,
                        OptionalComputed,
                        "Whether the pool is reachable from every region, false by default",
                    ),
                    "managed_pool" => attribute(T::Bool, Computed, "Whether the pool is managed by the service"),
                    "zone" => attribute(T::String, OptionalComputed, "Zone of the storage pool"),
                    "secondary_zone" => attribute(
                        T::String,
                        OptionalComputed,
                        "Secondary zone of a zone redundant storage pool",
                    ),
                    "storage_class" => attribute(T::String, OptionalComputed, "Storage class: hardware or software"),
                    "shared_vpc_project_number" => attribute(
                        T::String,
                        Optional,
                        "Host project number of a shared VPC network",
                    ),
                },
                blocks: map! {
                    "billing_label" => NestedBlock::Set(Block {
                        attributes: map! {
                            "key" => attribute(T::String, Required, "Key of the label"),
                            "value" => attribute(T::String, Required, "Value of the label"),
                        },
                        description: Description::plain("Label attached to the billing of the pool"),
                        ..Default::default()
                    }),
                },
                description: Description::plain("Storage pool holding software volumes"),
                ..Default::default()
            },
        }
    }
}

impl WithNormalize for StoragePoolState {
    fn normalize(&mut self, _diags: &mut Diagnostics) {
        default_if_null(&mut self.global_ilb, false);
    }
}

fn billing_labels(labels: &ValueSet<Value<BillingLabelState>>) -> Vec<BillingLabel> {
    labels
        .iter()
        .flatten()
        .filter_map(Value::as_ref_option)
        .map(|label| BillingLabel {
            key: known(&label.key).unwrap_or_default().to_owned(),
            value: known(&label.value).unwrap_or_default().to_owned(),
        })
        .collect()
}

fn size_in_bytes(size: &ValueNumber) -> i64 {
    size.as_ref_option().copied().unwrap_or_default() * GIB
}

impl StoragePoolState {
    pub(crate) fn creation_request(&self, project_number: &str) -> PoolRequest {
        let text = |value: &Value<String>| known(value).map(str::to_owned);
        let labels = billing_labels(&self.billing_label);
        PoolRequest {
            name: known(&self.name).unwrap_or_default().to_owned(),
            region: known(&self.region).unwrap_or_default().to_owned(),
            pool_id: None,
            network: Some(network_path(
                project_number,
                known(&self.shared_vpc_project_number),
                known(&self.network).unwrap_or_default(),
            )),
            service_level: text(&self.service_level),
            size_in_bytes: Some(size_in_bytes(&self.size)),
            regional_ha: self.regional_ha.as_ref_option().copied(),
            global_ilb: self.global_ilb.as_ref_option().copied(),
            zone: text(&self.zone),
            secondary_zone: text(&self.secondary_zone),
            storage_class: text(&self.storage_class),
            billing_labels: (!labels.is_empty()).then_some(labels),
        }
    }

    /// Name, region and service level are always sent, the rest only when changed
    pub(crate) fn update_request(prior: &Self, planned: &Self) -> PoolRequest {
        let mut request = PoolRequest {
            name: known(&planned.name).unwrap_or_default().to_owned(),
            region: known(&planned.region).unwrap_or_default().to_owned(),
            pool_id: known(&prior.id).map(str::to_owned),
            service_level: known(&planned.service_level).map(str::to_owned),
            ..Default::default()
        };
        if prior.size != planned.size {
            request.size_in_bytes = Some(size_in_bytes(&planned.size));
        }
        if prior.billing_label != planned.billing_label {
            request.billing_labels = Some(billing_labels(&planned.billing_label));
        }
        if prior.global_ilb != planned.global_ilb {
            request.global_ilb = planned.global_ilb.as_ref_option().copied();
        }
        if prior.zone != planned.zone {
            request.zone = known(&planned.zone).map(str::to_owned);
        }
        request
    }

    pub(crate) fn refresh(&self, pool: &Pool, project_number: &str) -> Result<Self> {
        let (network, shared_vpc) = parse_network(&pool.network, project_number)?;
        let billing_label = if self.billing_label.is_value() {
            Value::Value(
                pool.billing_labels
                    .iter()
                    .map(|label| Value::Value(label.into()))
                    .collect::<BTreeSet<_>>(),
            )
        } else {
            Value::Null
        };
        Ok(Self {
            id: Value::Value(pool.pool_id.clone()),
            name: Value::Value(pool.name.clone()),
            network: Value::Value(network),
            region: Value::Value(pool.region.clone()),
            service_level: Value::Value(pool.service_level.clone()),
            size: Value::Value(pool.size_in_bytes / GIB),
            regional_ha: or_null(&self.regional_ha),
            global_ilb: Value::Value(pool.global_ilb),
            managed_pool: Value::Value(pool.managed_pool),
            zone: non_empty(pool.zone.clone()),
            secondary_zone: non_empty(pool.secondary_zone.clone()),
            storage_class: non_empty(pool.storage_class.clone()),
            shared_vpc_project_number: match shared_vpc {
                Some(project) => Value::Value(project),
                None => or_null(&self.shared_vpc_project_number),
            },
            billing_label,
        })
    }

    pub(crate) fn imported(pool: &Pool, project_number: &str) -> Result<Self> {
        let prior = Self {
            regional_ha: if pool.regional_ha {
                Value::Value(true)
            } else {
                Value::Null
            },
            billing_label: if pool.billing_labels.is_empty() {
                Value::Null
            } else {
                Value::Value(BTreeSet::new())
            },
            ..Default::default()
        };
        prior.refresh(pool, project_number)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct StoragePoolResource;

fn location(state: &StoragePoolState) -> Result<(&str, &str)> {
    let id = known(&state.id).context("storage pool has no id")?;
    let region = known(&state.region).context("storage pool has no region")?;
    Ok((id, region))
}

#[async_trait]
impl CvsResource for StoragePoolResource {
    type State = StoragePoolState;
    const NAME: &'static str = "netapp-gcp_storage_pool";

    fn validate(&self, diags: &mut Diagnostics, config: &StoragePoolState) {
        let path = AttributePath::new;
        check_one_of(diags, path("service_level"), &config.service_level, &POOL_SERVICE_LEVELS);
        check_one_of(diags, path("storage_class"), &config.storage_class, &POOL_STORAGE_CLASSES);
        check_match(
            diags,
            path("shared_vpc_project_number"),
            &config.shared_vpc_project_number,
            &PROJECT_NUMBER,
            "shared_vpc_project_number must be a numerical project number",
        );
    }

    fn plan_create(
        &self,
        diags: &mut Diagnostics,
        mut proposed: StoragePoolState,
    ) -> StoragePoolState {
        proposed.normalize(diags);
        proposed.id = Value::Unknown;
        proposed.managed_pool = Value::Unknown;
        unknown_if_null(&mut proposed.zone);
        unknown_if_null(&mut proposed.secondary_zone);
        unknown_if_null(&mut proposed.storage_class);
        proposed
    }

    fn plan_update(
        &self,
        diags: &mut Diagnostics,
        prior: &StoragePoolState,
        mut proposed: StoragePoolState,
    ) -> (StoragePoolState, Vec<AttributePath>) {
        proposed.normalize(diags);
        let replace = changed_attributes!(
            prior, proposed;
            network,
            region,
            secondary_zone,
            storage_class,
            shared_vpc_project_number,
            regional_ha,
        );
        (proposed, replace)
    }

    async fn create(&self, client: &CvsClient, planned: &StoragePoolState) -> Result<StoragePoolState> {
        let request = planned.creation_request(client.project_number());
        let created = client
            .create_pool(&request)
            .await
            .with_context(|| format!("Error creating storage pool {}", request.name))?;
        let pool = client
            .get_pool(&request.region, &created.pool_id)
            .await?
            .with_context(|| format!("storage pool {} vanished after its creation", created.pool_id))?;
        planned.refresh(&pool, client.project_number())
    }

    async fn read(
        &self,
        client: &CvsClient,
        state: &StoragePoolState,
    ) -> Result<Option<StoragePoolState>> {
        let (id, region) = location(state)?;
        match client.get_pool(region, id).await? {
            Some(pool) => Ok(Some(state.refresh(&pool, client.project_number())?)),
            None => Ok(None),
        }
    }

    async fn update(
        &self,
        client: &CvsClient,
        prior: &StoragePoolState,
        planned: &StoragePoolState,
    ) -> Result<StoragePoolState> {
        let (id, region) = location(prior)?;
        info!(pool_id = id, "updating storage pool");
        client
            .update_pool(id, &StoragePoolState::update_request(prior, planned))
            .await
            .with_context(|| format!("Error updating storage pool {id}"))?;
        let pool = client
            .get_pool(region, id)
            .await?
            .with_context(|| format!("storage pool {id} vanished during its update"))?;
        planned.refresh(&pool, client.project_number())
    }

    async fn delete(&self, client: &CvsClient, state: &StoragePoolState) -> Result<()> {
        let (id, region) = location(state)?;
        client
            .delete_pool(region, id)
            .await
            .with_context(|| format!("Error deleting storage pool {id}"))
    }

    /// `<poolId>:<region>`, or `<poolId>` alone when it is unique across regions
    async fn import(&self, client: &CvsClient, id: &str) -> Result<Option<StoragePoolState>> {
        let pool = if id.contains(':') {
            let parts = split_id(id, 2)?;
            client.get_pool(parts[1], parts[0]).await?
        } else {
            match client.locate_pool(id).await {
                Ok(pool) => Some(pool),
                Err(err) if err.is_not_found() => None,
                Err(err) => return Err(err.into()),
            }
        };
        pool.map(|pool| StoragePoolState::imported(&pool, client.project_number()))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn planned() -> StoragePoolState {
        let mut state = StoragePoolState {
            name: Value::Value("pool".into()),
            network: Value::Value("vpc".into()),
            region: Value::Value("us-east4".into()),
            service_level: Value::Value("StandardSW".into()),
            size: Value::Value(2048),
            zone: Value::Value("us-east4-a".into()),
            billing_label: Value::Value(BTreeSet::from([Value::Value(BillingLabelState {
                key: Value::Value("team".into()),
                value: Value::Value("storage".into()),
            })])),
            ..Default::default()
        };
        state.normalize(&mut Diagnostics::default());
        state
    }

    #[test]
    fn creation_request() {
        let request = planned().creation_request("123");
        assert_eq!(request.network.as_deref(), Some("projects/123/global/networks/vpc"));
        assert_eq!(request.size_in_bytes, Some(2048 * GIB));
        assert_eq!(request.global_ilb, Some(false));
        assert_eq!(request.regional_ha, None);
        assert_eq!(request.billing_labels.unwrap()[0].key, "team");
    }

    #[test]
    fn update_request_sends_only_changes() {
        let prior = planned();
        let resized = StoragePoolState {
            size: Value::Value(4096),
            ..prior.clone()
        };
        let request = StoragePoolState::update_request(&prior, &resized);
        assert_eq!(request.name, "pool");
        assert_eq!(request.service_level.as_deref(), Some("StandardSW"));
        assert_eq!(request.size_in_bytes, Some(4096 * GIB));
        assert_eq!(request.billing_labels, None);
        assert_eq!(request.zone, None);
    }

    #[test]
    fn refresh_from_a_shared_vpc() {
        let pool = Pool {
            name: "pool".into(),
            network: "projects/456/global/networks/vpc".into(),
            region: "us-east4".into(),
            service_level: "StandardSW".into(),
            size_in_bytes: 2048 * GIB,
            pool_id: "p1".into(),
            zone: "us-east4-a".into(),
            storage_class: "software".into(),
            ..Default::default()
        };
        let state = planned().refresh(&pool, "123").unwrap();
        assert_eq!(state.id, Value::Value("p1".into()));
        assert_eq!(state.network, Value::Value("vpc".into()));
        assert_eq!(state.shared_vpc_project_number, Value::Value("456".into()));
        assert_eq!(state.secondary_zone, Value::Null);
        assert_eq!(state.billing_label, Value::Value(BTreeSet::new()));
        assert_eq!(state.managed_pool, Value::Value(false));
    }

    #[test]
    fn validation() {
        let mut diags = Diagnostics::default();
        StoragePoolResource.validate(&mut diags, &planned());
        assert!(diags.errors.is_empty());
        let invalid = StoragePoolState {
            service_level: Value::Value("extreme".into()),
            shared_vpc_project_number: Value::Value("my-host".into()),
            ..planned()
        };
        StoragePoolResource.validate(&mut diags, &invalid);
        assert_eq!(diags.errors.len(), 2);
    }
}
