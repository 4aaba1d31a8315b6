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

/// Customer managed encryption key configuration
///
/// Used both as request body and as response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KmsConfig {
    #[serde(rename = "keyRing", deserialize_with = "nullable")]
    pub key_ring: String,
    #[serde(rename = "KeyName", deserialize_with = "nullable")]
    pub key_name: String,
    #[serde(rename = "keyRingLocation", deserialize_with = "nullable")]
    pub key_ring_location: String,
    #[serde(
        rename = "UUID",
        deserialize_with = "nullable",
        skip_serializing_if = "String::is_empty"
    )]
    pub uuid: String,
    #[serde(
        rename = "keyProjectID",
        deserialize_with = "nullable",
        skip_serializing_if = "String::is_empty"
    )]
    pub key_project_id: String,
    #[serde(deserialize_with = "nullable")]
    pub network: String,
}

impl CvsClient {
    pub async fn create_kms_config(&self, config: &KmsConfig) -> Result<KmsConfig> {
        self.post(&format!("{}/Storage/KmsConfig", config.key_ring_location), config)
            .await
    }

    /// Fetch a KMS configuration, `Ok(None)` when it no longer exists
    pub async fn get_kms_config(&self, location: &str, uuid: &str) -> Result<Option<KmsConfig>> {
        let config: KmsConfig = match self
            .get(&format!("{location}/Storage/KmsConfig/{uuid}"))
            .await
        {
            Ok(config) => config,
            Err(err) if err.is_not_found() => return Ok(None),
            Err(err) => return Err(err),
        };
        if config.uuid != uuid {
            return Err(Error::State(format!(
                "Expected kms with id: {uuid}, Response contained kms with id: {}",
                config.uuid
            )));
        }
        Ok(Some(config))
    }

    pub async fn update_kms_config(&self, config: &KmsConfig) -> Result<()> {
        let path = format!(
            "{}/Storage/KmsConfig/{}",
            config.key_ring_location, config.uuid
        );
        let _: serde_json::Value = self.put(&path, config).await?;
        Ok(())
    }

    pub async fn delete_kms_config(&self, location: &str, uuid: &str) -> Result<()> {
        let _: serde_json::Value = self
            .delete(&format!("{location}/Storage/KmsConfig/{uuid}"))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_names_follow_the_api_casing() {
        let config = KmsConfig {
            key_ring: "ring".into(),
            key_name: "key".into(),
            key_ring_location: "us-east4".into(),
            network: "default".into(),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&config).unwrap(),
            serde_json::json!({
                "keyRing": "ring",
                "KeyName": "key",
                "keyRingLocation": "us-east4",
                "network": "default"
            })
        );
        let decoded: KmsConfig =
            serde_json::from_str(r#"{"UUID": "k1", "keyProjectID": "other", "keyRing": null}"#)
                .unwrap();
        assert_eq!(decoded.uuid, "k1");
        assert_eq!(decoded.key_project_id, "other");
        assert!(decoded.key_ring.is_empty());
    }
}
