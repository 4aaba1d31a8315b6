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

use super::nullable;
use crate::client::{CvsClient, Error, Result};

/// Active directory connection of a region
///
/// A region holds at most one of them. The password is write only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ActiveDirectory {
    #[serde(deserialize_with = "nullable")]
    pub username: String,
    #[serde(deserialize_with = "nullable", skip_serializing_if = "String::is_empty")]
    pub password: String,
    #[serde(deserialize_with = "nullable")]
    pub region: String,
    #[serde(deserialize_with = "nullable")]
    pub domain: String,
    #[serde(rename = "DNS", deserialize_with = "nullable")]
    pub dns: String,
    #[serde(rename = "netBIOS", deserialize_with = "nullable")]
    pub net_bios: String,
    #[serde(deserialize_with = "nullable")]
    pub organizational_unit: String,
    #[serde(deserialize_with = "nullable")]
    pub site: String,
    #[serde(
        rename = "UUID",
        deserialize_with = "nullable",
        skip_serializing_if = "String::is_empty"
    )]
    pub uuid: String,
    pub aes_encryption: bool,
    #[serde(deserialize_with = "nullable")]
    pub backup_operators: Vec<String>,
    #[serde(deserialize_with = "nullable")]
    pub security_operators: Vec<String>,
    #[serde(rename = "allowLocalNFSUsersWithLdap")]
    pub allow_local_nfs_users_with_ldap: bool,
    #[serde(rename = "kdcIP", deserialize_with = "nullable")]
    pub kdc_ip: String,
    pub ldap_signing: bool,
    /// Connection type, `software` or `hardware`
    #[serde(deserialize_with = "nullable")]
    pub label: String,
    #[serde(deserialize_with = "nullable")]
    pub ad_name: String,
    #[serde(rename = "managedAD")]
    pub managed_ad: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct CreatedActiveDirectory {
    #[serde(rename = "UUID")]
    uuid: String,
}

impl CvsClient {
    /// Active directory of a region, if any
    pub async fn region_active_directory(&self, region: &str) -> Result<Option<ActiveDirectory>> {
        let directories: Option<Vec<ActiveDirectory>> = self
            .get(&format!("{region}/Storage/ActiveDirectory"))
            .await?;
        Ok(directories
            .unwrap_or_default()
            .into_iter()
            .find(|directory| directory.region == region))
    }

    /// Create the active directory of a region
    ///
    /// Fails when the region already has one.
    pub async fn create_active_directory(&self, directory: &ActiveDirectory) -> Result<String> {
        if let Some(existing) = self.region_active_directory(&directory.region).await? {
            return Err(Error::Config(format!(
                "Active Directory in region: {:?} already exists",
                existing.region
            )));
        }
        let created: CreatedActiveDirectory = self
            .post(
                &format!("{}/Storage/ActiveDirectory", directory.region),
                directory,
            )
            .await?;
        Ok(created.uuid)
    }

    pub async fn update_active_directory(&self, directory: &ActiveDirectory) -> Result<()> {
        let path = format!(
            "{}/Storage/ActiveDirectory/{}",
            directory.region, directory.uuid
        );
        let _: serde_json::Value = self.put(&path, directory).await?;
        Ok(())
    }

    pub async fn delete_active_directory(&self, region: &str, uuid: &str) -> Result<()> {
        let _: serde_json::Value = self
            .delete(&format!("{region}/Storage/ActiveDirectory/{uuid}"))
            .await?;
        Ok(())
    }
}
