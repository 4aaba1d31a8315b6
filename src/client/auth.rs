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

//! Bearer tokens for the Cloud Volumes API
//!
//! Three ways to authenticate are supported:
//! - a service account key, given inline or as a file, used to self-sign JWTs,
//! - the impersonation of a service account principal through the IAM Credentials `signJwt` method,
//! - a fixed access token, mostly useful for tests.
//!
//! Tokens are cached per audience and refreshed lazily once they come close to their expiry.

use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;

use async_trait::async_trait;
use base64::Engine;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::error::{Error, Result};

pub const CVS_AUDIENCE: &str = "https://cloudvolumesgcp-api.netapp.com";
pub const IAM_CREDENTIALS_URL: &str = "https://iamcredentials.googleapis.com";
pub const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Lifetime of self-signed tokens, in seconds
const SELF_SIGNED_LIFETIME: i64 = 3600;
/// Tokens closer than this to their expiry are refreshed, in seconds
const EXPIRY_MARGIN: i64 = 60;

lazy_static! {
    static ref PRINCIPAL_REGEX: Regex =
        Regex::new(r"^[a-z]([-a-z0-9]*[a-z0-9])@[a-z0-9-]+\.iam\.gserviceaccount\.com$")
            .expect("principal regex is valid");
}

/// Whether `service_account` names a principal to impersonate rather than a key file
pub fn is_principal(service_account: &str) -> bool {
    PRINCIPAL_REGEX.is_match(service_account)
}

fn now() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

/// Source of bearer tokens
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Get a valid token for the given audience
    async fn token(&self, audience: &str) -> Result<String>;
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: i64,
}

/// Tokens indexed by audience
#[derive(Debug, Default)]
pub struct TokenCache {
    tokens: Mutex<HashMap<String, CachedToken>>,
}

impl TokenCache {
    /// Return the cached token for `audience`, or call `refresh` to get a new one with its expiry
    pub async fn get_or_refresh<F, Fut>(&self, audience: &str, refresh: F) -> Result<String>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(String, i64)>>,
    {
        let mut tokens = self.tokens.lock().await;
        if let Some(cached) = tokens.get(audience) {
            if cached.expires_at - EXPIRY_MARGIN > now() {
                return Ok(cached.token.clone());
            }
        }
        let (token, expires_at) = refresh().await?;
        debug!(audience, expires_at, "refreshed token");
        tokens.insert(
            audience.to_owned(),
            CachedToken {
                token: token.clone(),
                expires_at,
            },
        );
        Ok(token)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    iss: String,
    sub: String,
    aud: String,
    iat: i64,
    exp: i64,
}

/// Service account key, as downloaded from the Google Cloud console
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
}

impl Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key_id", &self.private_key_id)
            .finish_non_exhaustive()
    }
}

impl ServiceAccountKey {
    /// Parse a key given either as JSON or as base64 encoded JSON
    pub fn from_json(content: &str) -> Result<Self> {
        match serde_json::from_str(content) {
            Ok(key) => Ok(key),
            Err(err) => {
                let decoded = base64::engine::general_purpose::STANDARD
                    .decode(content.trim())
                    .map_err(|_| Error::Config(format!("invalid service account key: {err}")))?;
                serde_json::from_slice(&decoded)
                    .map_err(|err| Error::Config(format!("invalid service account key: {err}")))
            }
        }
    }

    /// Read a key from a JSON file
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|err| {
            Error::Config(format!(
                "Unable to read service account key file {path}: {err}"
            ))
        })?;
        Self::from_json(&content)
    }

    /// Sign a JWT for `audience` with this key, returning the token and its expiry
    pub fn sign(&self, audience: &str) -> Result<(String, i64)> {
        let iat = now();
        let exp = iat + SELF_SIGNED_LIFETIME;
        let claims = Claims {
            iss: self.client_email.clone(),
            sub: self.client_email.clone(),
            aud: audience.to_owned(),
            iat,
            exp,
        };
        let header = Header {
            kid: self.private_key_id.clone(),
            ..Header::new(Algorithm::RS256)
        };
        let key = EncodingKey::from_rsa_pem(self.private_key.as_bytes())
            .map_err(|err| Error::Auth(format!("invalid private key: {err}")))?;
        let token = jsonwebtoken::encode(&header, &claims, &key)
            .map_err(|err| Error::Auth(format!("Unable to generate JWT token: {err}")))?;
        Ok((token, exp))
    }
}

/// Authenticate with self-signed JWTs
#[derive(Debug)]
pub struct KeyAuthenticator {
    key: ServiceAccountKey,
    cache: TokenCache,
}

impl KeyAuthenticator {
    pub fn new(key: ServiceAccountKey) -> Self {
        Self {
            key,
            cache: Default::default(),
        }
    }
}

#[async_trait]
impl Authenticator for KeyAuthenticator {
    async fn token(&self, audience: &str) -> Result<String> {
        let key = &self.key;
        self.cache
            .get_or_refresh(audience, move || async move { key.sign(audience) })
            .await
    }
}

/// Always return the same token
#[derive(Debug, Clone)]
pub struct StaticToken(pub String);

#[async_trait]
impl Authenticator for StaticToken {
    async fn token(&self, _audience: &str) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// Credentials of the caller when impersonating a service account
#[derive(Debug, Clone)]
pub enum SourceCredentials {
    /// Access token given by `GOOGLE_OAUTH_ACCESS_TOKEN`
    AccessToken(String),
    /// Key file given by `GOOGLE_APPLICATION_CREDENTIALS`
    Key(ServiceAccountKey),
    /// Default service account of the instance
    Metadata { url: String },
}

#[derive(Debug, Deserialize)]
struct MetadataToken {
    access_token: String,
}

impl SourceCredentials {
    /// Pick the caller credentials from the environment
    pub fn from_env() -> Result<Self> {
        if let Ok(token) = std::env::var("GOOGLE_OAUTH_ACCESS_TOKEN") {
            if !token.is_empty() {
                return Ok(SourceCredentials::AccessToken(token));
            }
        }
        if let Ok(path) = std::env::var("GOOGLE_APPLICATION_CREDENTIALS") {
            if !path.is_empty() {
                return Ok(SourceCredentials::Key(ServiceAccountKey::from_file(&path)?));
            }
        }
        Ok(SourceCredentials::Metadata {
            url: METADATA_TOKEN_URL.to_owned(),
        })
    }

    async fn access_token(&self, http: &reqwest::Client, iam_url: &str) -> Result<String> {
        match self {
            SourceCredentials::AccessToken(token) => Ok(token.clone()),
            SourceCredentials::Key(key) => Ok(key.sign(&format!("{iam_url}/"))?.0),
            SourceCredentials::Metadata { url } => {
                let response = http
                    .get(url)
                    .header("Metadata-Flavor", "Google")
                    .send()
                    .await
                    .map_err(|err| Error::Auth(format!("metadata server unreachable: {err}")))?;
                if !response.status().is_success() {
                    return Err(Error::Auth(format!(
                        "metadata server returned {}",
                        response.status()
                    )));
                }
                let token: MetadataToken = response
                    .json()
                    .await
                    .map_err(|err| Error::Auth(format!("invalid metadata token: {err}")))?;
                Ok(token.access_token)
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct SignJwtRequest {
    payload: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignJwtResponse {
    signed_jwt: String,
}

/// Authenticate as a service account principal, signing tokens through IAM Credentials
#[derive(Debug)]
pub struct ImpersonatedAuthenticator {
    principal: String,
    token_duration: i64,
    source: SourceCredentials,
    http: reqwest::Client,
    iam_url: String,
    cache: TokenCache,
}

impl ImpersonatedAuthenticator {
    /// `token_duration` is in minutes and falls back to 60 when outside of `1..=60`
    pub fn new(
        principal: impl Into<String>,
        token_duration: i64,
        source: SourceCredentials,
        http: reqwest::Client,
    ) -> Self {
        let token_duration = if (1..=60).contains(&token_duration) {
            token_duration
        } else {
            info!("token_duration is set to 60 min");
            60
        };
        Self {
            principal: principal.into(),
            token_duration,
            source,
            http,
            iam_url: IAM_CREDENTIALS_URL.to_owned(),
            cache: Default::default(),
        }
    }

    /// Use another IAM Credentials endpoint
    pub fn with_iam_url(mut self, iam_url: impl Into<String>) -> Self {
        self.iam_url = iam_url.into();
        self
    }

    pub fn token_duration(&self) -> i64 {
        self.token_duration
    }

    async fn sign(&self, audience: &str) -> Result<(String, i64)> {
        let iat = now();
        let exp = iat + self.token_duration * 60;
        let claims = Claims {
            iss: self.principal.clone(),
            sub: self.principal.clone(),
            aud: format!("{}/", audience.trim_end_matches('/')),
            iat,
            exp,
        };
        let payload = serde_json::to_string(&claims)
            .map_err(|err| Error::Auth(format!("unable to encode JWT payload: {err}")))?;
        let source_token = self.source.access_token(&self.http, &self.iam_url).await?;

        let url = format!(
            "{}/v1/projects/-/serviceAccounts/{}:signJwt",
            self.iam_url, self.principal
        );
        let response = self
            .http
            .post(&url)
            .bearer_auth(source_token)
            .json(&SignJwtRequest { payload })
            .send()
            .await
            .map_err(|err| {
                Error::Auth(format!(
                    "Unable to get token from {}: {err}",
                    self.principal
                ))
            })?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Auth(format!(
                "Unable to get token from {}: signJwt returned {status}: {body}",
                self.principal
            )));
        }
        let signed: SignJwtResponse = response
            .json()
            .await
            .map_err(|err| Error::Auth(format!("invalid signJwt response: {err}")))?;
        Ok((signed.signed_jwt, exp))
    }
}

#[async_trait]
impl Authenticator for ImpersonatedAuthenticator {
    async fn token(&self, audience: &str) -> Result<String> {
        self.cache
            .get_or_refresh(audience, move || self.sign(audience))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn principal_detection() {
        assert!(is_principal(
            "terraform@my-project-123.iam.gserviceaccount.com"
        ));
        assert!(!is_principal("/home/me/key.json"));
        assert!(!is_principal("Terraform@project.iam.gserviceaccount.com"));
        assert!(!is_principal("terraform@project.example.com"));
    }

    #[test]
    fn key_accepts_base64() {
        let json = r#"{"client_email": "sa@p.iam.gserviceaccount.com", "private_key": "pem", "private_key_id": "abc"}"#;
        let encoded = base64::engine::general_purpose::STANDARD.encode(json);
        let key = ServiceAccountKey::from_json(&encoded).unwrap();
        assert_eq!(key.client_email, "sa@p.iam.gserviceaccount.com");
        assert_eq!(key.private_key_id.as_deref(), Some("abc"));

        let key = ServiceAccountKey::from_json(json).unwrap();
        assert_eq!(key.private_key, "pem");
    }

    #[test]
    fn key_rejects_garbage() {
        assert!(matches!(
            ServiceAccountKey::from_json("not a key"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn key_debug_hides_private_key() {
        let key = ServiceAccountKey {
            client_email: "sa@p.iam.gserviceaccount.com".into(),
            private_key: "very secret".into(),
            private_key_id: None,
        };
        assert!(!format!("{key:?}").contains("very secret"));
    }

    #[test]
    fn token_duration_is_clamped() {
        let http = reqwest::Client::new();
        let source = SourceCredentials::AccessToken("t".into());
        let auth = ImpersonatedAuthenticator::new("sa", 0, source.clone(), http.clone());
        assert_eq!(auth.token_duration(), 60);
        let auth = ImpersonatedAuthenticator::new("sa", 61, source.clone(), http.clone());
        assert_eq!(auth.token_duration(), 60);
        let auth = ImpersonatedAuthenticator::new("sa", 15, source, http);
        assert_eq!(auth.token_duration(), 15);
    }

    #[tokio::test]
    async fn cache_reuses_fresh_tokens() {
        let cache = TokenCache::default();
        let first = cache
            .get_or_refresh("aud", || async { Ok(("one".to_owned(), now() + 3600)) })
            .await
            .unwrap();
        let second = cache
            .get_or_refresh("aud", || async { Ok(("two".to_owned(), now() + 3600)) })
            .await
            .unwrap();
        assert_eq!(first, "one");
        assert_eq!(second, "one");

        let other = cache
            .get_or_refresh("other", || async { Ok(("three".to_owned(), now() + 3600)) })
            .await
            .unwrap();
        assert_eq!(other, "three");
    }

    #[tokio::test]
    async fn cache_refreshes_expiring_tokens() {
        let cache = TokenCache::default();
        cache
            .get_or_refresh("aud", || async { Ok(("old".to_owned(), now() + 10)) })
            .await
            .unwrap();
        let token = cache
            .get_or_refresh("aud", || async { Ok(("new".to_owned(), now() + 3600)) })
            .await
            .unwrap();
        assert_eq!(token, "new");
    }
}
