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

//! REST client for the NetApp Cloud Volumes Service API
//!
//! Every call goes through [`CvsClient::call_api`], which signs the request and
//! waits for a free slot so that at most `max_concurrent_requests` requests are in flight.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Method, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::Semaphore;
use tracing::debug;

pub mod auth;
pub mod error;
pub mod jobs;
pub mod lifecycle;
pub mod retry;

pub use auth::{Authenticator, CVS_AUDIENCE};
pub use error::{Error, Result};

pub const CVS_API_URL: &str = "https://cloudvolumesgcp-api.netapp.com";
pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 6;

/// Random wait between two bounds
pub type Jitter = (Duration, Duration);

/// Waits and timeouts used while driving asynchronous operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timings {
    /// Backoff when the network cannot spawn more jobs
    pub spawn_jobs_backoff: Jitter,
    /// Backoff when the API reports a context deadline
    pub deadline_backoff: Jitter,
    /// Wait between a volume creation request and the first read
    pub create_settle: Duration,
    /// Wait before re-creating a volume that vanished right after creation
    pub create_not_found_backoff: Duration,
    pub create_poll: Jitter,
    pub create_timeout: Duration,
    /// Wait before re-creating a volume that ended in error
    pub recreate_backoff: Jitter,
    pub read_poll: Duration,
    pub read_timeout: Duration,
    pub delete_poll: Duration,
    pub delete_timeout: Duration,
    pub delete_retry_backoff: Jitter,
    /// Wait between checks that a volume accepts snapshots and backups
    pub volume_ready_poll: Duration,
    pub pool_job_poll: Duration,
    pub pool_job_timeout: Duration,
    pub replication_job_poll: Duration,
    pub replication_job_timeout: Duration,
    pub replication_read_poll: Duration,
    pub replication_read_timeout: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            spawn_jobs_backoff: (Duration::from_secs(30), Duration::from_secs(50)),
            deadline_backoff: (Duration::from_secs(5), Duration::from_secs(10)),
            create_settle: Duration::from_secs(5),
            create_not_found_backoff: Duration::from_secs(20),
            create_poll: (Duration::from_secs(20), Duration::from_secs(30)),
            create_timeout: Duration::from_secs(900),
            recreate_backoff: (Duration::from_secs(5), Duration::from_secs(10)),
            read_poll: Duration::from_secs(20),
            read_timeout: Duration::from_secs(300),
            delete_poll: Duration::from_secs(20),
            delete_timeout: Duration::from_secs(300),
            delete_retry_backoff: (Duration::from_secs(5), Duration::from_secs(20)),
            volume_ready_poll: Duration::from_secs(5),
            pool_job_poll: Duration::from_secs(20),
            pool_job_timeout: Duration::from_secs(1200),
            replication_job_poll: Duration::from_secs(10),
            replication_job_timeout: Duration::from_secs(600),
            replication_read_poll: Duration::from_secs(2),
            replication_read_timeout: Duration::from_secs(600),
        }
    }
}

impl Timings {
    /// Same shape as the defaults, with every wait shrunk to a few milliseconds
    ///
    /// Timeouts keep their ratio to the poll interval so that polling loops still run several times.
    pub fn fast() -> Self {
        let ms = Duration::from_millis;
        Self {
            spawn_jobs_backoff: (ms(1), ms(2)),
            deadline_backoff: (ms(1), ms(2)),
            create_settle: ms(1),
            create_not_found_backoff: ms(1),
            create_poll: (ms(2), ms(3)),
            create_timeout: ms(90),
            recreate_backoff: (ms(1), ms(2)),
            read_poll: ms(2),
            read_timeout: ms(30),
            delete_poll: ms(2),
            delete_timeout: ms(30),
            delete_retry_backoff: (ms(1), ms(2)),
            volume_ready_poll: ms(1),
            pool_job_poll: ms(2),
            pool_job_timeout: ms(120),
            replication_job_poll: ms(1),
            replication_job_timeout: ms(60),
            replication_read_poll: ms(1),
            replication_read_timeout: ms(60),
        }
    }
}

/// Settings of a [`CvsClient`]
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Scheme and host of the API, without trailing slash
    pub base_url: String,
    pub project_number: String,
    pub audience: String,
    pub max_concurrent_requests: usize,
    pub timings: Timings,
}

impl ClientOptions {
    pub fn new(project_number: impl Into<String>) -> Self {
        Self {
            base_url: CVS_API_URL.to_owned(),
            project_number: project_number.into(),
            audience: CVS_AUDIENCE.to_owned(),
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
            timings: Timings::default(),
        }
    }
}

/// Authenticated and rate limited access to the Cloud Volumes API of a project
pub struct CvsClient {
    http: reqwest::Client,
    host: String,
    project_number: String,
    audience: String,
    auth: Arc<dyn Authenticator>,
    slots: Semaphore,
    timings: Timings,
}

impl std::fmt::Debug for CvsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CvsClient")
            .field("host", &self.host)
            .field("project_number", &self.project_number)
            .finish_non_exhaustive()
    }
}

impl CvsClient {
    pub fn new(options: ClientOptions, auth: Arc<dyn Authenticator>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|err| Error::Config(format!("unable to build the HTTP client: {err}")))?;
        Ok(Self::with_http(options, auth, http))
    }

    pub fn with_http(options: ClientOptions, auth: Arc<dyn Authenticator>, http: reqwest::Client) -> Self {
        let slots = options.max_concurrent_requests.max(1);
        Self {
            http,
            host: format!(
                "{}/v2/projects/{}/locations/",
                options.base_url.trim_end_matches('/'),
                options.project_number
            ),
            project_number: options.project_number,
            audience: options.audience,
            auth,
            slots: Semaphore::new(slots),
            timings: options.timings,
        }
    }

    pub fn project_number(&self) -> &str {
        &self.project_number
    }

    pub fn timings(&self) -> &Timings {
        &self.timings
    }

    /// Send a request and return the status with the raw body
    ///
    /// `path` is relative to `projects/{projectNumber}/locations/`.
    /// GET and DELETE requests never carry a body; other methods send `{}` when `body` is `None`.
    pub async fn call_api(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<(StatusCode, Vec<u8>)> {
        let _slot = self
            .slots
            .acquire()
            .await
            .map_err(|_| Error::State("the client has been shut down".into()))?;

        let token = self.auth.token(&self.audience).await?;
        let url = format!("{}{}", self.host, path);
        debug!(%method, path, "calling API");

        let mut request = self
            .http
            .request(method.clone(), &url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .bearer_auth(token);
        if method != Method::GET && method != Method::DELETE {
            let body = body.cloned().unwrap_or_else(|| serde_json::json!({}));
            request = request.body(body.to_string());
        }

        let transport = |source| Error::Transport {
            method: method.to_string(),
            path: path.to_owned(),
            source,
        };
        let response = request.send().await.map_err(transport)?;
        let status = response.status();
        let bytes = response.bytes().await.map_err(transport)?;
        debug!(%method, path, status = status.as_u16(), "received API response");
        Ok((status, bytes.to_vec()))
    }

    /// Send a request, check its status, and decode the body
    pub async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<T> {
        let (status, bytes) = self.call_api(method, path, body).await?;
        check_response(status, &bytes)?;
        decode(path, &bytes)
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send(Method::GET, path, None).await
    }

    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let body = encode(path, body)?;
        self.send(Method::POST, path, Some(&body)).await
    }

    pub async fn put<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let body = encode(path, body)?;
        self.send(Method::PUT, path, Some(&body)).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send(Method::DELETE, path, None).await
    }
}

/// Turn non 2xx responses into errors
pub fn check_response(status: StatusCode, body: &[u8]) -> Result<()> {
    if status.is_success() {
        Ok(())
    } else {
        Err(Error::from_response(status.as_u16(), body))
    }
}

fn encode<B: Serialize + ?Sized>(path: &str, body: &B) -> Result<serde_json::Value> {
    serde_json::to_value(body).map_err(|source| Error::Decode {
        path: path.to_owned(),
        source,
    })
}

fn decode<T: DeserializeOwned>(path: &str, bytes: &[u8]) -> Result<T> {
    let bytes = if bytes.iter().all(u8::is_ascii_whitespace) {
        b"null".as_slice()
    } else {
        bytes
    };
    serde_json::from_slice(bytes).map_err(|source| Error::Decode {
        path: path.to_owned(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_bodies_decode_as_null() {
        let value: serde_json::Value = decode("x", b"").unwrap();
        assert!(value.is_null());
        let value: Option<i64> = decode("x", b"  \n").unwrap();
        assert_eq!(value, None);
    }

    #[test]
    fn status_check() {
        assert!(check_response(StatusCode::OK, b"").is_ok());
        assert!(check_response(StatusCode::ACCEPTED, b"{}").is_ok());
        let err = check_response(
            StatusCode::BAD_REQUEST,
            br#"{"code": 400, "message": "bad"}"#,
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "code: 400, message: bad");
    }

    #[test]
    fn host_includes_project_number() {
        let client = CvsClient::with_http(
            ClientOptions::new("123456"),
            Arc::new(auth::StaticToken("t".into())),
            reqwest::Client::new(),
        );
        assert_eq!(
            client.host,
            "https://cloudvolumesgcp-api.netapp.com/v2/projects/123456/locations/"
        );
        assert_eq!(client.project_number(), "123456");
    }

    #[test]
    fn fast_timings_keep_polling_ratio() {
        let timings = Timings::fast();
        assert!(timings.create_timeout > timings.create_poll.1 * 10);
        assert!(timings.read_timeout > timings.read_poll * 10);
    }
}
