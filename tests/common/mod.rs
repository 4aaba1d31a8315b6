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

//! Shared helpers for the integration tests

#![allow(dead_code)]

use std::sync::{Arc, Once};

use serde_json::{json, Value};
use terraform_provider_netapp_gcp::client::auth::StaticToken;
use terraform_provider_netapp_gcp::client::{ClientOptions, CvsClient, Timings};
use wiremock::MockServer;

pub const PROJECT_NUMBER: &str = "123456";
pub const TOKEN: &str = "test-token";

static TRACING: Once = Once::new();

pub fn init_tracing() {
    TRACING.call_once(|| {
        tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .init();
    });
}

/// Client of the mock server, with every wait shrunk
pub fn client(server: &MockServer, max_concurrent_requests: usize) -> CvsClient {
    init_tracing();
    let options = ClientOptions {
        base_url: server.uri(),
        max_concurrent_requests,
        timings: Timings::fast(),
        ..ClientOptions::new(PROJECT_NUMBER)
    };
    CvsClient::new(options, Arc::new(StaticToken(TOKEN.into()))).expect("client builds")
}

/// Path of an API call on the mock server
pub fn api_path(path: &str) -> String {
    format!("/v2/projects/{PROJECT_NUMBER}/locations/{path}")
}

pub fn volume_json(id: &str, name: &str, state: &str) -> Value {
    json!({
        "volumeId": id,
        "name": name,
        "region": "us-east4",
        "creationToken": format!("{name}-path"),
        "protocolTypes": ["NFSv3"],
        "network": format!("projects/{PROJECT_NUMBER}/global/networks/default"),
        "quotaInBytes": 1099511627776_i64,
        "serviceLevel": "basic",
        "lifeCycleState": state,
        "lifeCycleStateDetails": if state == "available" { "Available for use" } else { "" },
        "zone": "us-east4-a",
    })
}

pub fn error_json(code: i64, message: &str) -> Value {
    json!({"code": code, "message": message})
}
