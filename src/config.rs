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

//! Provider settings: environment fallback, authentication, and project resolution

use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, info};

use crate::client::auth::{
    is_principal, ImpersonatedAuthenticator, KeyAuthenticator, ServiceAccountKey,
    SourceCredentials, IAM_CREDENTIALS_URL,
};
use crate::client::{
    Authenticator, ClientOptions, CvsClient, Error, Result, CVS_API_URL,
    DEFAULT_MAX_CONCURRENT_REQUESTS,
};

pub const CLOUD_RESOURCE_MANAGER_URL: &str = "https://cloudresourcemanager.googleapis.com";
pub const DEFAULT_TOKEN_DURATION: i64 = 60;

pub const ENV_PROJECT: &str = "GCP_PROJECT";
pub const ENV_SERVICE_ACCOUNT: &str = "GCP_SERVICE_ACCOUNT";
pub const ENV_CREDENTIALS: &str = "GCP_CREDENTIALS";

lazy_static! {
    pub(crate) static ref PROJECT_NUMBER: Regex =
        Regex::new(r"^[0-9]+$").expect("project number regex is valid");
    static ref PROJECT_ID: Regex =
        Regex::new(r"^[a-z][a-z0-9-]+[a-z0-9]$").expect("project id regex is valid");
}

/// How the project was given
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Project<'a> {
    Number(&'a str),
    Id(&'a str),
}

impl<'a> Project<'a> {
    pub fn parse(project: &'a str) -> Result<Self> {
        if PROJECT_NUMBER.is_match(project) {
            Ok(Project::Number(project))
        } else if PROJECT_ID.is_match(project) {
            Ok(Project::Id(project))
        } else {
            Err(Error::Config(format!(
                "Project format is not correct: {project:?}. It should be either numerical project number or project ID in xxx-xxx-xxx format."
            )))
        }
    }
}

/// How requests are authenticated
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Service account key content
    Key(String),
    /// Service account key file
    KeyFile(String),
    /// Service account principal to impersonate
    Impersonate(String),
}

/// Provider settings once the environment fallback is applied
#[derive(Debug, Clone)]
pub struct Settings {
    pub project: String,
    pub credentials: Credentials,
    pub token_duration: i64,
    pub max_concurrent_requests: usize,
    pub api_url: String,
    pub resource_manager_url: String,
    pub iam_url: String,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.is_empty())
}

/// Value from the configuration, or from the environment variable `env`
pub fn or_env(value: Option<String>, env: &str) -> Option<String> {
    non_empty(value).or_else(|| non_empty(std::env::var(env).ok()))
}

impl Settings {
    /// Build settings from the attributes of the provider block
    ///
    /// `credentials` takes precedence over `service_account`. A `service_account`
    /// matching a principal email is impersonated, anything else is a key file path.
    pub fn new(
        project: Option<String>,
        service_account: Option<String>,
        credentials: Option<String>,
        token_duration: Option<i64>,
        max_concurrent_requests: Option<i64>,
    ) -> Result<Self> {
        let project = or_env(project, ENV_PROJECT)
            .ok_or_else(|| Error::Config("project is required".into()))?;
        Project::parse(&project)?;

        let credentials = match (
            or_env(credentials, ENV_CREDENTIALS),
            or_env(service_account, ENV_SERVICE_ACCOUNT),
        ) {
            (Some(content), _) => Credentials::Key(content),
            (None, Some(account)) if is_principal(&account) => Credentials::Impersonate(account),
            (None, Some(path)) => Credentials::KeyFile(path),
            (None, None) => {
                return Err(Error::Config("Need credentials or service_account".into()))
            }
        };

        let max_concurrent_requests = match max_concurrent_requests {
            None => DEFAULT_MAX_CONCURRENT_REQUESTS,
            Some(n) if n > 0 => n as usize,
            Some(n) => {
                return Err(Error::Config(format!(
                    "max_concurrent_requests must be positive, got {n}"
                )))
            }
        };

        Ok(Self {
            project,
            credentials,
            token_duration: token_duration.unwrap_or(DEFAULT_TOKEN_DURATION),
            max_concurrent_requests,
            api_url: CVS_API_URL.to_owned(),
            resource_manager_url: CLOUD_RESOURCE_MANAGER_URL.to_owned(),
            iam_url: IAM_CREDENTIALS_URL.to_owned(),
        })
    }

    pub fn authenticator(&self, http: &reqwest::Client) -> Result<Arc<dyn Authenticator>> {
        Ok(match &self.credentials {
            Credentials::Key(content) => {
                Arc::new(KeyAuthenticator::new(ServiceAccountKey::from_json(content)?))
            }
            Credentials::KeyFile(path) => {
                Arc::new(KeyAuthenticator::new(ServiceAccountKey::from_file(path)?))
            }
            Credentials::Impersonate(principal) => {
                info!(principal, "impersonating service account");
                Arc::new(
                    ImpersonatedAuthenticator::new(
                        principal.clone(),
                        self.token_duration,
                        SourceCredentials::from_env()?,
                        http.clone(),
                    )
                    .with_iam_url(self.iam_url.clone()),
                )
            }
        })
    }

    /// Build the API client, resolving the project number if needed
    pub async fn connect(&self) -> Result<CvsClient> {
        let http = reqwest::Client::new();
        let auth = self.authenticator(&http)?;
        let project_number =
            resolve_project_number(&http, auth.as_ref(), &self.resource_manager_url, &self.project)
                .await?;
        let options = ClientOptions {
            base_url: self.api_url.clone(),
            max_concurrent_requests: self.max_concurrent_requests,
            ..ClientOptions::new(project_number)
        };
        CvsClient::new(options, auth)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectDescription {
    project_number: ProjectNumber,
}

/// Cloud Resource Manager encodes int64 values as strings
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ProjectNumber {
    Text(String),
    Number(u64),
}

impl From<ProjectNumber> for String {
    fn from(value: ProjectNumber) -> Self {
        match value {
            ProjectNumber::Text(text) => text,
            ProjectNumber::Number(number) => number.to_string(),
        }
    }
}

/// Project number of `project`, asking Cloud Resource Manager when given a project ID
pub async fn resolve_project_number(
    http: &reqwest::Client,
    auth: &dyn Authenticator,
    resource_manager_url: &str,
    project: &str,
) -> Result<String> {
    let id = match Project::parse(project)? {
        Project::Number(number) => return Ok(number.to_owned()),
        Project::Id(id) => id,
    };
    let base = resource_manager_url.trim_end_matches('/');
    let token = auth.token(&format!("{base}/")).await?;
    let url = format!("{base}/v1/projects/{id}");
    debug!(project = id, "resolving project number");
    let response = http
        .get(&url)
        .bearer_auth(token)
        .send()
        .await
        .map_err(|source| Error::Transport {
            method: "GET".into(),
            path: url.clone(),
            source,
        })?;
    let status = response.status();
    let body = response.bytes().await.map_err(|source| Error::Transport {
        method: "GET".into(),
        path: url.clone(),
        source,
    })?;
    if !status.is_success() {
        return Err(Error::Config(format!(
            "Cannot find project number of {id}: {}",
            Error::from_response(status.as_u16(), &body)
        )));
    }
    let description: ProjectDescription =
        serde_json::from_slice(&body).map_err(|source| Error::Decode { path: url, source })?;
    let number = String::from(description.project_number);
    info!(project = id, number, "resolved project number");
    Ok(number)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_formats() {
        assert_eq!(Project::parse("123456").unwrap(), Project::Number("123456"));
        assert_eq!(Project::parse("my-project-1").unwrap(), Project::Id("my-project-1"));
        assert!(Project::parse("My_Project").is_err());
        assert!(Project::parse("trailing-").is_err());
        assert!(Project::parse("").is_err());
    }

    #[test]
    fn credentials_take_precedence() {
        let settings = Settings::new(
            Some("123".into()),
            Some("/path/key.json".into()),
            Some("{}".into()),
            None,
            None,
        )
        .unwrap();
        assert_eq!(settings.credentials, Credentials::Key("{}".into()));
        assert_eq!(settings.max_concurrent_requests, 6);
        assert_eq!(settings.token_duration, 60);
    }

    #[test]
    fn principals_are_impersonated() {
        let settings = Settings::new(
            Some("123".into()),
            Some("robot@my-project.iam.gserviceaccount.com".into()),
            None,
            Some(30),
            Some(2),
        )
        .unwrap();
        assert_eq!(
            settings.credentials,
            Credentials::Impersonate("robot@my-project.iam.gserviceaccount.com".into())
        );
        assert_eq!(settings.max_concurrent_requests, 2);
        let settings =
            Settings::new(Some("123".into()), Some("./key.json".into()), None, None, None)
                .unwrap();
        assert_eq!(settings.credentials, Credentials::KeyFile("./key.json".into()));
    }

    #[test]
    fn invalid_settings() {
        assert!(Settings::new(Some("123".into()), Some("k".into()), None, None, Some(0)).is_err());
        assert!(Settings::new(Some("Bad Project".into()), Some("k".into()), None, None, None).is_err());
    }
}
