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

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::retry::jitter;
use super::{Jitter, Result};

/// `lifeCycleState` of an API object
///
/// Unknown values are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LifeCycleState {
    Creating,
    Available,
    Updating,
    Deleting,
    Deleted,
    Error,
    Disabled,
    Other(String),
}

impl Default for LifeCycleState {
    fn default() -> Self {
        LifeCycleState::Other(String::new())
    }
}

impl From<String> for LifeCycleState {
    fn from(value: String) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "creating" => LifeCycleState::Creating,
            "available" => LifeCycleState::Available,
            "updating" => LifeCycleState::Updating,
            "deleting" => LifeCycleState::Deleting,
            "deleted" => LifeCycleState::Deleted,
            "error" => LifeCycleState::Error,
            "disabled" => LifeCycleState::Disabled,
            _ => LifeCycleState::Other(value),
        }
    }
}

impl From<&str> for LifeCycleState {
    fn from(value: &str) -> Self {
        value.to_owned().into()
    }
}

impl From<LifeCycleState> for String {
    fn from(value: LifeCycleState) -> Self {
        value.as_str().to_owned()
    }
}

impl LifeCycleState {
    pub fn as_str(&self) -> &str {
        match self {
            LifeCycleState::Creating => "creating",
            LifeCycleState::Available => "available",
            LifeCycleState::Updating => "updating",
            LifeCycleState::Deleting => "deleting",
            LifeCycleState::Deleted => "deleted",
            LifeCycleState::Error => "error",
            LifeCycleState::Disabled => "disabled",
            LifeCycleState::Other(other) => other,
        }
    }

    /// The object is still converging
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LifeCycleState::Creating | LifeCycleState::Updating | LifeCycleState::Deleting
        )
    }
}

impl Display for LifeCycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Refetch an object while `pending` holds for it
///
/// `current` is the last observed value. Waits are drawn from `interval` and add up
/// until `timeout` is reached; the last observed value is returned either way.
pub async fn poll_while<T, F, Fut, P>(
    mut current: T,
    pending: P,
    interval: Jitter,
    timeout: Duration,
    mut fetch: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    P: Fn(&T) -> bool,
{
    let mut waited = Duration::ZERO;
    while pending(&current) && waited < timeout {
        let wait = jitter(interval);
        tokio::time::sleep(wait).await;
        waited += wait;
        debug!(waited = ?waited, "polling");
        current = fetch().await?;
    }
    Ok(current)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[test]
    fn states_parse_case_insensitively() {
        assert_eq!(LifeCycleState::from("Creating"), LifeCycleState::Creating);
        assert_eq!(LifeCycleState::from("DELETED"), LifeCycleState::Deleted);
        assert_eq!(
            LifeCycleState::from("restoring"),
            LifeCycleState::Other("restoring".into())
        );
        assert!(LifeCycleState::Updating.is_transient());
        assert!(!LifeCycleState::Error.is_transient());
    }

    #[test]
    fn states_roundtrip_through_json() {
        let state: LifeCycleState = serde_json::from_str(r#""available""#).unwrap();
        assert_eq!(state, LifeCycleState::Available);
        assert_eq!(
            serde_json::to_string(&LifeCycleState::Other("odd".into())).unwrap(),
            r#""odd""#
        );
    }

    #[tokio::test]
    async fn polls_until_state_settles() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let tick = Duration::from_millis(1);
        let state = poll_while(
            LifeCycleState::Creating,
            LifeCycleState::is_transient,
            (tick, tick),
            Duration::from_secs(1),
            move || async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Ok(LifeCycleState::Creating)
                } else {
                    Ok(LifeCycleState::Available)
                }
            },
        )
        .await
        .unwrap();
        assert_eq!(state, LifeCycleState::Available);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn stops_at_timeout_with_last_state() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let tick = Duration::from_millis(2);
        let state = poll_while(
            LifeCycleState::Deleting,
            LifeCycleState::is_transient,
            (tick, tick),
            Duration::from_millis(10),
            move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(LifeCycleState::Deleting)
            },
        )
        .await
        .unwrap();
        assert_eq!(state, LifeCycleState::Deleting);
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }
}
