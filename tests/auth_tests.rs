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

mod common;

use std::sync::Arc;

use serde_json::json;
use terraform_provider_netapp_gcp::client::auth::{
    Authenticator, ImpersonatedAuthenticator, SourceCredentials, StaticToken,
};
use terraform_provider_netapp_gcp::client::{ClientOptions, CvsClient, Error, Timings, CVS_AUDIENCE};
use terraform_provider_netapp_gcp::config::resolve_project_number;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{api_path, init_tracing, PROJECT_NUMBER};

const PRINCIPAL: &str = "terraform@my-project.iam.gserviceaccount.com";

fn sign_path() -> String {
    format!("/v1/projects/-/serviceAccounts/{PRINCIPAL}:signJwt")
}

fn impersonated(server: &MockServer, duration: i64) -> ImpersonatedAuthenticator {
    init_tracing();
    ImpersonatedAuthenticator::new(
        PRINCIPAL,
        duration,
        SourceCredentials::AccessToken("caller-token".into()),
        reqwest::Client::new(),
    )
    .with_iam_url(server.uri())
}

#[tokio::test]
async fn impersonation_signs_once_per_audience() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(sign_path()))
        .and(header("authorization", "Bearer caller-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"signedJwt": "signed"})))
        .expect(1)
        .mount(&server)
        .await;

    let auth = impersonated(&server, 30);
    assert_eq!(auth.token_duration(), 30);
    assert_eq!(auth.token(CVS_AUDIENCE).await.unwrap(), "signed");
    assert_eq!(auth.token(CVS_AUDIENCE).await.unwrap(), "signed");

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    let claims: serde_json::Value =
        serde_json::from_str(body["payload"].as_str().unwrap()).unwrap();
    assert_eq!(claims["iss"], PRINCIPAL);
    assert_eq!(claims["sub"], PRINCIPAL);
    assert_eq!(claims["aud"], format!("{CVS_AUDIENCE}/"));
    let lifetime = claims["exp"].as_i64().unwrap() - claims["iat"].as_i64().unwrap();
    assert_eq!(lifetime, 30 * 60);
}

#[tokio::test]
async fn out_of_range_duration_falls_back_to_an_hour() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(sign_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"signedJwt": "signed"})))
        .expect(1)
        .mount(&server)
        .await;

    assert_eq!(impersonated(&server, 90).token_duration(), 60);
    let auth = impersonated(&server, 0);
    assert_eq!(auth.token_duration(), 60);
    assert_eq!(auth.token(CVS_AUDIENCE).await.unwrap(), "signed");

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    let claims: serde_json::Value =
        serde_json::from_str(body["payload"].as_str().unwrap()).unwrap();
    let lifetime = claims["exp"].as_i64().unwrap() - claims["iat"].as_i64().unwrap();
    assert_eq!(lifetime, 60 * 60);
}

#[tokio::test]
async fn signing_failure_names_the_principal() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(sign_path()))
        .respond_with(ResponseTemplate::new(403).set_body_string("permission denied"))
        .mount(&server)
        .await;

    let err = impersonated(&server, 60).token(CVS_AUDIENCE).await.unwrap_err();
    assert!(matches!(err, Error::Auth(_)));
    let message = err.to_string();
    assert!(message.contains(PRINCIPAL));
    assert!(message.contains("permission denied"));
}

#[tokio::test]
async fn api_calls_use_the_impersonated_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(sign_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"signedJwt": "signed"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(api_path("us-east4/Pools")))
        .and(header("authorization", "Bearer signed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(null)))
        .expect(1)
        .mount(&server)
        .await;

    let options = ClientOptions {
        base_url: server.uri(),
        timings: Timings::fast(),
        ..ClientOptions::new(PROJECT_NUMBER)
    };
    let client = CvsClient::new(options, Arc::new(impersonated(&server, 60))).unwrap();
    assert!(client.list_pools("us-east4").await.unwrap().is_empty());
}

#[tokio::test]
async fn project_ids_are_resolved_to_numbers() {
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/projects/my-project"))
        .and(header("authorization", "Bearer rm-token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"projectId": "my-project", "projectNumber": "987654"})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/projects/missing-project"))
        .respond_with(
            ResponseTemplate::new(403)
                .set_body_json(json!({"code": 403, "message": "permission denied"})),
        )
        .mount(&server)
        .await;

    let http = reqwest::Client::new();
    let auth = StaticToken("rm-token".into());
    let number = resolve_project_number(&http, &auth, &server.uri(), "my-project")
        .await
        .unwrap();
    assert_eq!(number, "987654");

    let number = resolve_project_number(&http, &auth, &server.uri(), "123456")
        .await
        .unwrap();
    assert_eq!(number, "123456");

    let err = resolve_project_number(&http, &auth, &server.uri(), "missing-project")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Config(_)));
    assert!(err.to_string().contains("permission denied"));
}
