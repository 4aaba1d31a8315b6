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

use serde_json::json;
use terraform_provider_netapp_gcp::api::replication::Replication;
use terraform_provider_netapp_gcp::api::storage_pool::PoolRequest;
use terraform_provider_netapp_gcp::client::Error;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{api_path, client};

fn job(state: &str, details: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({"state": state, "stateDetails": details}))
}

fn pool_request() -> PoolRequest {
    PoolRequest {
        name: "pool".into(),
        region: "us-east4".into(),
        network: Some("projects/123456/global/networks/default".into()),
        service_level: Some("ZoneRedundantStandardSW".into()),
        size_in_bytes: Some(1099511627776),
        zone: Some("us-east4-a".into()),
        ..Default::default()
    }
}

#[tokio::test]
async fn pool_creation_waits_for_its_job() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(api_path("us-east4/Pools")))
        .and(body_partial_json(json!({"name": "pool", "sizeInBytes": 1099511627776_i64})))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({
            "response": {"AnyValue": {
                "poolId": "p1",
                "name": "pool",
                "region": "us-east4",
                "jobs": [{"jobId": "j1", "action": "create"}],
            }}
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(api_path("us-east4/Jobs/j1")))
        .respond_with(job("ongoing", ""))
        .up_to_n_times(2)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(api_path("us-east4/Jobs/j1")))
        .respond_with(job("done", ""))
        .expect(1)
        .mount(&server)
        .await;

    let pool = client(&server, 6).create_pool(&pool_request()).await.unwrap();
    assert_eq!(pool.pool_id, "p1");
}

#[tokio::test]
async fn failed_pool_job_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path(api_path("us-east4/Pools/p1")))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({
            "response": {"AnyValue": {
                "poolId": "p1",
                "region": "us-east4",
                "jobs": [{"jobId": "j2", "action": "update"}],
            }}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(api_path("us-east4/Jobs/j2")))
        .respond_with(job("error", "insufficient capacity"))
        .mount(&server)
        .await;

    let err = client(&server, 6)
        .update_pool("p1", &pool_request())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::State(ref details) if details == "insufficient capacity"));
}

#[tokio::test]
async fn pool_without_job_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(api_path("us-east4/Pools")))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({
            "response": {"AnyValue": {"poolId": "p1", "name": "pool", "region": "us-east4"}}
        })))
        .mount(&server)
        .await;

    let err = client(&server, 6).create_pool(&pool_request()).await.unwrap_err();
    assert!(err.to_string().contains("no job returned"));
}

#[tokio::test]
async fn job_still_running_after_timeout_is_accepted() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(api_path("us-east4/Jobs/slow")))
        .respond_with(job("ongoing", ""))
        .mount(&server)
        .await;

    let client = client(&server, 6);
    let tick = std::time::Duration::from_millis(1);
    client
        .wait_for_job("us-east4", "slow", tick, tick * 5)
        .await
        .unwrap();
    assert_eq!(server.received_requests().await.unwrap().len(), 5);
}

#[tokio::test]
async fn replication_creation_waits_for_create_jobs_only() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(api_path("us-east4/VolumeReplications")))
        .and(body_partial_json(json!({
            "name": "mirror",
            "sourceVolumeUUID": "src",
            "destinationVolumeUUID": "dst",
            "replicationSchedule": "hourly",
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "volumeReplicationUUID": "r1",
            "jobs": [
                {"jobId": "c1", "action": "create"},
                {"jobId": "x1", "action": "other"},
            ],
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(api_path("us-east4/Jobs/c1")))
        .respond_with(job("done", ""))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(api_path("us-east4/Jobs/x1")))
        .respond_with(job("done", ""))
        .expect(0)
        .mount(&server)
        .await;

    let request = Replication {
        name: "mirror".into(),
        region: "us-east4".into(),
        source_volume_id: "src".into(),
        destination_volume_id: "dst".into(),
        remote_region: "us-west2".into(),
        endpoint_type: "dst".into(),
        schedule: "hourly".into(),
        ..Default::default()
    };
    let created = client(&server, 6).create_replication(&request).await.unwrap();
    assert_eq!(created.replication_id, "r1");
}

#[tokio::test]
async fn replication_read_waits_for_availability() {
    let server = MockServer::start().await;
    let replication = |state: &str| {
        ResponseTemplate::new(200).set_body_json(json!({
            "volumeReplicationUUID": "r1",
            "name": "mirror",
            "lifeCycleState": state,
            "mirrorState": "mirrored",
            "relationshipStatus": "idle",
        }))
    };
    Mock::given(method("GET"))
        .and(path(api_path("us-east4/VolumeReplications/r1")))
        .respond_with(replication("creating"))
        .up_to_n_times(2)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(api_path("us-east4/VolumeReplications/r1")))
        .respond_with(replication("available"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(api_path("us-east4/VolumeReplications/r2")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "volumeReplicationUUID": "r2",
            "lifeCycleState": "deleting",
        })))
        .mount(&server)
        .await;

    let client = client(&server, 6);
    let read = client
        .read_replication("us-east4", "r1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(read.mirror_state, "mirrored");
    assert_eq!(read.relationship_status, "idle");
    assert_eq!(client.read_replication("us-east4", "r2").await.unwrap(), None);
}

#[tokio::test]
async fn replication_removal_breaks_before_deleting() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(api_path("us-east4/VolumeReplications/r1/Break")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": {"AnyValue": {"jobs": [{"jobId": "b1", "action": "break"}]}}
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(api_path("us-east4/Jobs/b1")))
        .respond_with(job("done", ""))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(api_path("us-east4/VolumeReplications/r1")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    client(&server, 6)
        .remove_replication("us-east4", "r1")
        .await
        .unwrap();

    let methods: Vec<String> = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|request| request.method.to_string())
        .collect();
    assert_eq!(methods, ["POST", "GET", "DELETE"]);
}
