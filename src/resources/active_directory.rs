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
use tf_provider::schema::{AttributeConstraint, AttributeType, Block, Description, Schema};
use tf_provider::value::{Value, ValueBool, ValueSet};
use tf_provider::{map, AttributePath, Diagnostics};
use tracing::info;

use super::CvsResource;
use crate::api::active_directory::ActiveDirectory;
use crate::api::split_id;
use crate::client::CvsClient;
use crate::utils::{
    attribute, changed_attributes, check_one_of, default_if_null, known, non_empty, or_null,
    refresh_if_set, unknown_if_null, WithNormalize, WithSchema,
};

pub(crate) const CONNECTION_TYPES: [&str; 2] = ["software", "hardware"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ActiveDirectoryState {
    pub id: Value<String>,
    pub uuid: Value<String>,
    pub region: Value<String>,
    pub username: Value<String>,
    pub password: Value<String>,
    pub domain: Value<String>,
    pub dns_server: Value<String>,
    pub net_bios: Value<String>,
    pub organizational_unit: Value<String>,
    pub site: Value<String>,
    pub aes_encryption: ValueBool,
    pub backup_operators: ValueSet<Value<String>>,
    pub security_operators: ValueSet<Value<String>>,
    pub allow_local_nfs_users_with_ldap: ValueBool,
    pub kdc_ip: Value<String>,
    pub ldap_signing: ValueBool,
    pub connection_type: Value<String>,
    pub ad_server: Value<String>,
    pub managed_ad: ValueBool,
}

impl WithSchema for ActiveDirectoryState {
    fn schema() -> Schema {
        use AttributeConstraint::{Computed, Optional, OptionalComputed, Required};
        use AttributeType as T;
        Schema {
            version: 1,
            block: Block {
                version: 1,
                attributes: map! {
                    "id" => attribute(T::String, Computed, "UUID of the active directory"),
                    "uuid" => attribute(T::String, Computed, "UUID of the active directory"),
                    "region" => attribute(T::String, Required, "Region of the active directory"),
                    "username" => attribute(T::String, Required, "User allowed to join the domain"),
                    "password" => tf_provider::schema::Attribute {
                        sensitive: true,
                        ..attribute(T::String, Required, "Password of the user")
                    },
                    "domain" => attribute(T::String, Required, "Fully qualified domain name"),
                    "dns_server" => attribute(T::String, Required, "DNS servers, comma separated"),
                    "net_bios" => attribute(T::String, Required, "NetBIOS prefix of the machine accounts"),
                    "organizational_unit" => attribute(
                        T::String,
                        OptionalComputed,
                        "Organizational unit of the machine accounts",
                    ),
                    "site" => attribute(T::String, OptionalComputed, "Active directory site"),
                    "aes_encryption" => attribute(T::Bool, OptionalComputed, "Enable AES encryption, false by default"),
                    "backup_operators" => attribute(
                        T::Set(Box::new(T::String)),
                        Optional,
                        "Accounts granted the backup privilege",
                    ),
                    "security_operators" => attribute(
                        T::Set(Box::new(T::String)),
                        Optional,
                        "Accounts granted the security privilege",
                    ),
                    "allow_local_nfs_users_with_ldap" => attribute(
                        T::Bool,
                        OptionalComputed,
                        "Allow local NFS users with LDAP, false by default",
                    ),
                    "kdc_ip" => attribute(T::String, Optional, "IP of the Kerberos key distribution center"),
                    "ldap_signing" => attribute(T::Bool, OptionalComputed, "Enable LDAP signing, false by default"),
                    "connection_type" => attribute(
                        T::String,
                        Required,
                        "Storage class the connection serves: software or hardware",
                    ),
                    "ad_server" => attribute(T::String, Optional, "Hostname of the active directory server"),
                    "managed_ad" => attribute(
                        T::Bool,
                        OptionalComputed,
                        "Whether the domain is a Google managed AD, false by default",
                    ),
                },
                description: Description::plain("Active directory connection of a region"),
                ..Default::default()
            },
        }
    }
}

impl WithNormalize for ActiveDirectoryState {
    fn normalize(&mut self, _diags: &mut Diagnostics) {
        default_if_null(&mut self.aes_encryption, false);
        default_if_null(&mut self.allow_local_nfs_users_with_ldap, false);
        default_if_null(&mut self.ldap_signing, false);
        default_if_null(&mut self.managed_ad, false);
    }
}

fn operators(values: &ValueSet<Value<String>>) -> Vec<String> {
    values
        .iter()
        .flatten()
        .filter_map(|value| value.as_ref_option().cloned())
        .collect()
}

fn refresh_operators(prior: &ValueSet<Value<String>>, fresh: &[String]) -> ValueSet<Value<String>> {
    if prior.is_null() && fresh.is_empty() {
        return Value::Null;
    }
    Value::Value(fresh.iter().cloned().map(Value::Value).collect::<BTreeSet<_>>())
}

/// Attributes the API fills when left unset
fn computed(prior: &Value<String>, fresh: &str) -> Value<String> {
    if prior.is_value() {
        Value::Value(fresh.to_owned())
    } else {
        non_empty(fresh.to_owned())
    }
}

impl ActiveDirectoryState {
    pub(crate) fn request(&self) -> ActiveDirectory {
        let text = |value: &Value<String>| known(value).unwrap_or_default().to_owned();
        let flag = |value: &ValueBool| value.as_ref_option().copied().unwrap_or_default();
        ActiveDirectory {
            username: text(&self.username),
            password: text(&self.password),
            region: text(&self.region),
            domain: text(&self.domain),
            dns: text(&self.dns_server),
            net_bios: text(&self.net_bios),
            organizational_unit: text(&self.organizational_unit),
            site: text(&self.site),
            uuid: text(&self.uuid),
            aes_encryption: flag(&self.aes_encryption),
            backup_operators: operators(&self.backup_operators),
            security_operators: operators(&self.security_operators),
            allow_local_nfs_users_with_ldap: flag(&self.allow_local_nfs_users_with_ldap),
            kdc_ip: text(&self.kdc_ip),
            ldap_signing: flag(&self.ldap_signing),
            label: text(&self.connection_type),
            ad_name: text(&self.ad_server),
            managed_ad: flag(&self.managed_ad),
        }
    }

    /// Merge the directory returned by the API; the password is never read back
    pub(crate) fn refresh(&self, directory: &ActiveDirectory) -> Self {
        let connection_type = match known(&self.connection_type) {
            Some(configured) if configured.eq_ignore_ascii_case(&directory.label) => {
                self.connection_type.clone()
            }
            _ if directory.label.is_empty() => or_null(&self.connection_type),
            _ => Value::Value(directory.label.clone()),
        };
        Self {
            id: Value::Value(directory.uuid.clone()),
            uuid: Value::Value(directory.uuid.clone()),
            region: Value::Value(directory.region.clone()),
            username: Value::Value(directory.username.clone()),
            password: or_null(&self.password),
            domain: Value::Value(directory.domain.clone()),
            dns_server: Value::Value(directory.dns.clone()),
            net_bios: Value::Value(directory.net_bios.clone()),
            organizational_unit: computed(&self.organizational_unit, &directory.organizational_unit),
            site: computed(&self.site, &directory.site),
            aes_encryption: Value::Value(directory.aes_encryption),
            backup_operators: refresh_operators(&self.backup_operators, &directory.backup_operators),
            security_operators: refresh_operators(
                &self.security_operators,
                &directory.security_operators,
            ),
            allow_local_nfs_users_with_ldap: Value::Value(
                directory.allow_local_nfs_users_with_ldap,
            ),
            kdc_ip: refresh_if_set(&self.kdc_ip, directory.kdc_ip.clone()),
            ldap_signing: Value::Value(directory.ldap_signing),
            connection_type,
            ad_server: refresh_if_set(&self.ad_server, directory.ad_name.clone()),
            managed_ad: Value::Value(directory.managed_ad),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ActiveDirectoryResource;

#[async_trait]
impl CvsResource for ActiveDirectoryResource {
    type State = ActiveDirectoryState;
    const NAME: &'static str = "netapp-gcp_active_directory";

    fn validate(&self, diags: &mut Diagnostics, config: &ActiveDirectoryState) {
        check_one_of(
            diags,
            AttributePath::new("connection_type"),
            &config.connection_type,
            &CONNECTION_TYPES,
        );
    }

    fn plan_create(
        &self,
        diags: &mut Diagnostics,
        mut proposed: ActiveDirectoryState,
    ) -> ActiveDirectoryState {
        proposed.normalize(diags);
        proposed.id = Value::Unknown;
        proposed.uuid = Value::Unknown;
        unknown_if_null(&mut proposed.organizational_unit);
        unknown_if_null(&mut proposed.site);
        proposed
    }

    fn plan_update(
        &self,
        diags: &mut Diagnostics,
        prior: &ActiveDirectoryState,
        mut proposed: ActiveDirectoryState,
    ) -> (ActiveDirectoryState, Vec<AttributePath>) {
        proposed.normalize(diags);
        let replace = changed_attributes!(prior, proposed; region);
        (proposed, replace)
    }

    async fn create(
        &self,
        client: &CvsClient,
        planned: &ActiveDirectoryState,
    ) -> Result<ActiveDirectoryState> {
        let request = planned.request();
        let uuid = client
            .create_active_directory(&request)
            .await
            .context("Error creating active directory")?;
        info!(uuid, region = request.region, "active directory created");

        let created = ActiveDirectoryState {
            id: Value::Value(uuid.clone()),
            uuid: Value::Value(uuid),
            ..planned.clone()
        };
        self.read(client, &created)
            .await?
            .context("active directory vanished after its creation")
    }

    async fn read(
        &self,
        client: &CvsClient,
        state: &ActiveDirectoryState,
    ) -> Result<Option<ActiveDirectoryState>> {
        let region = known(&state.region).context("active directory has no region")?;
        let uuid = known(&state.uuid).or(known(&state.id)).unwrap_or_default();
        let directory = client
            .region_active_directory(region)
            .await
            .context("Error reading active directory")?;
        Ok(directory
            .filter(|directory| directory.uuid == uuid)
            .map(|directory| state.refresh(&directory)))
    }

    async fn update(
        &self,
        client: &CvsClient,
        prior: &ActiveDirectoryState,
        planned: &ActiveDirectoryState,
    ) -> Result<ActiveDirectoryState> {
        let planned = ActiveDirectoryState {
            id: prior.id.clone(),
            uuid: prior.uuid.clone(),
            ..planned.clone()
        };
        client
            .update_active_directory(&planned.request())
            .await
            .context("Error updating active directory")?;
        self.read(client, &planned)
            .await?
            .context("active directory vanished during its update")
    }

    async fn delete(&self, client: &CvsClient, state: &ActiveDirectoryState) -> Result<()> {
        let region = known(&state.region).unwrap_or_default();
        let uuid = known(&state.uuid).context("active directory has no uuid")?;
        client
            .delete_active_directory(region, uuid)
            .await
            .with_context(|| format!("Error deleting active directory {uuid}"))
    }

    /// `<uuid>:<region>`
    async fn import(&self, client: &CvsClient, id: &str) -> Result<Option<ActiveDirectoryState>> {
        let parts = split_id(id, 2)?;
        let prior = ActiveDirectoryState {
            id: Value::Value(parts[0].to_owned()),
            uuid: Value::Value(parts[0].to_owned()),
            region: Value::Value(parts[1].to_owned()),
            ..Default::default()
        };
        self.read(client, &prior).await
    }
}
