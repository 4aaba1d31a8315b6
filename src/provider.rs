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

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tf_provider::schema::{Attribute, AttributeConstraint, AttributeType, Block, Description, Schema};
use tf_provider::value::{Value, ValueEmpty, ValueNumber};
use tf_provider::{
    map, AttributePath, Diagnostics, DynamicDataSource, DynamicResource, Provider,
};
use tracing::info;

use crate::config::{Project, Settings};
use crate::data_sources::{ActiveDirectoryDataSource, VolumeDataSource};
use crate::resources::{
    ActiveDirectoryResource, ApiResource, ClientSlot, KmsConfigResource, SnapshotResource,
    StoragePoolResource, VolumeBackupResource, VolumeReplicationResource, VolumeResource,
};
use crate::utils::attribute;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProviderConfig {
    pub project: Value<String>,
    pub service_account: Value<String>,
    pub credentials: Value<String>,
    pub token_duration: ValueNumber,
    pub max_concurrent_requests: ValueNumber,
}

impl ProviderConfig {
    fn settings(&self) -> crate::client::Result<Settings> {
        let text = |value: &Value<String>| value.as_ref_option().cloned();
        Settings::new(
            text(&self.project),
            text(&self.service_account),
            text(&self.credentials),
            self.token_duration.as_ref_option().copied(),
            self.max_concurrent_requests.as_ref_option().copied(),
        )
    }
}

#[derive(Debug, Default, Clone)]
pub struct NetappGcpProvider {
    client: ClientSlot,
}

#[async_trait]
impl Provider for NetappGcpProvider {
    type Config<'a> = ProviderConfig;
    type MetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        use AttributeConstraint::Optional;
        Some(Schema {
            version: 1,
            block: Block {
                version: 1,
                attributes: map! {
                    "project" => attribute(
                        AttributeType::String,
                        Optional,
                        "Project number or project ID. Falls back to GCP_PROJECT",
                    ),
                    "service_account" => attribute(
                        AttributeType::String,
                        Optional,
                        "Service account key file, or principal to impersonate. Falls back to GCP_SERVICE_ACCOUNT",
                    ),
                    "credentials" => Attribute {
                        sensitive: true,
                        ..attribute(
                            AttributeType::String,
                            Optional,
                            "Content of a service account key. Falls back to GCP_CREDENTIALS",
                        )
                    },
                    "token_duration" => attribute(
                        AttributeType::Number,
                        Optional,
                        "Lifetime in minutes of impersonated tokens, 60 by default",
                    ),
                    "max_concurrent_requests" => attribute(
                        AttributeType::Number,
                        Optional,
                        "Maximum number of API calls in flight, 6 by default",
                    ),
                },
                description: Description::plain("NetApp Cloud Volumes Service for Google Cloud"),
                ..Default::default()
            },
        })
    }

    async fn validate<'a>(&self, diags: &mut Diagnostics, config: Self::Config<'a>) -> Option<()> {
        if let Value::Value(project) = &config.project {
            if let Err(err) = Project::parse(project) {
                diags.error("Invalid project", err.to_string(), AttributePath::new("project"));
            }
        }
        // token_duration outside of 1..=60 falls back to 60 when tokens are minted
        if let Value::Value(n) = &config.max_concurrent_requests {
            if *n <= 0 {
                diags.error(
                    "Invalid value",
                    format!("max_concurrent_requests must be positive, got {n}"),
                    AttributePath::new("max_concurrent_requests"),
                );
            }
        }

        if diags.errors.is_empty() {
            Some(())
        } else {
            None
        }
    }

    async fn configure<'a>(
        &self,
        diags: &mut Diagnostics,
        terraform_version: String,
        config: Self::Config<'a>,
    ) -> Option<()> {
        info!(terraform_version, "configuring provider");
        let client = match config.settings() {
            Ok(settings) => settings.connect().await,
            Err(err) => Err(err),
        };
        match client {
            Ok(client) => {
                info!(project_number = client.project_number(), "provider configured");
                if self.client.set(Arc::new(client)).is_err() {
                    info!("provider already configured, keeping the first client");
                }
                Some(())
            }
            Err(err) => {
                diags.root_error("Unable to configure the provider", err.to_string());
                None
            }
        }
    }

    fn get_resources(
        &self,
        _diags: &mut Diagnostics,
    ) -> Option<HashMap<String, Box<dyn DynamicResource>>> {
        let slot = || self.client.clone();
        Some(map! {
            "volume" => ApiResource::new(VolumeResource, slot()),
            "snapshot" => ApiResource::new(SnapshotResource, slot()),
            "active_directory" => ApiResource::new(ActiveDirectoryResource, slot()),
            "storage_pool" => ApiResource::new(StoragePoolResource, slot()),
            "kms_config" => ApiResource::new(KmsConfigResource, slot()),
            "volume_backup" => ApiResource::new(VolumeBackupResource, slot()),
            "volume_replication" => ApiResource::new(VolumeReplicationResource, slot()),
        })
    }

    fn get_data_sources(
        &self,
        _diags: &mut Diagnostics,
    ) -> Option<HashMap<String, Box<dyn DynamicDataSource>>> {
        Some(map! {
            "volume" => VolumeDataSource::new(self.client.clone()),
            "active_directory" => ActiveDirectoryDataSource::new(self.client.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn validation_rejects_bad_values() {
        let provider = NetappGcpProvider::default();
        let mut diags = Diagnostics::default();
        let config = ProviderConfig {
            project: Value::Value("My Project".into()),
            max_concurrent_requests: Value::Value(0),
            token_duration: Value::Unknown,
            ..Default::default()
        };
        assert!(provider.validate(&mut diags, config).await.is_none());
        assert_eq!(diags.errors.len(), 2);
    }

    #[tokio::test]
    async fn out_of_range_token_duration_is_accepted() {
        let provider = NetappGcpProvider::default();
        for duration in [0, -5, 120] {
            let mut diags = Diagnostics::default();
            let config = ProviderConfig {
                project: Value::Value("123456".into()),
                service_account: Value::Value("terraform@my-project.iam.gserviceaccount.com".into()),
                token_duration: Value::Value(duration),
                ..Default::default()
            };
            assert!(provider.validate(&mut diags, config.clone()).await.is_some());
            assert!(diags.errors.is_empty());
            assert_eq!(config.settings().unwrap().token_duration, duration);
        }
    }

    #[tokio::test]
    async fn validation_accepts_project_ids_and_numbers() {
        let provider = NetappGcpProvider::default();
        for project in ["123456789", "my-project-42"] {
            let mut diags = Diagnostics::default();
            let config = ProviderConfig {
                project: Value::Value(project.into()),
                ..Default::default()
            };
            assert!(provider.validate(&mut diags, config).await.is_some());
        }
    }

    #[test]
    fn every_type_is_registered() {
        let provider = NetappGcpProvider::default();
        let mut diags = Diagnostics::default();
        let resources = provider.get_resources(&mut diags).unwrap();
        assert_eq!(resources.len(), 7);
        assert!(resources.contains_key("volume_replication"));
        let data_sources = provider.get_data_sources(&mut diags).unwrap();
        assert_eq!(data_sources.len(), 2);
    }

    #[tokio::test]
    async fn resource_schemas_are_available() {
        let provider = NetappGcpProvider::default();
        let mut diags = Diagnostics::default();
        let resources = provider.get_resources(&mut diags).unwrap();
        let schema = resources["volume"].schema(&mut diags);
        assert!(schema.is_some());
        assert!(diags.errors.is_empty());
    }
}
