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

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

use super::{Jitter, Result};

pub const CONTEXT_DEADLINE_EXCEEDED: &str =
    "Post http://cloud-volumes-service.sde.svc.cluster.local/v2/Volumes: context deadline exceeded";

/// Error message known to be transient, with its retry budget
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transient {
    pub message: String,
    pub attempts: u32,
    pub backoff: Jitter,
}

impl Transient {
    /// The network of `zone` is busy creating other volumes
    pub fn spawn_jobs_on_create(zone: &str, backoff: Jitter) -> Self {
        Self {
            message: spawn_jobs_message("creating", zone),
            attempts: 10,
            backoff,
        }
    }

    /// The network of `zone` is busy deleting other volumes
    pub fn spawn_jobs_on_delete(zone: &str, backoff: Jitter) -> Self {
        Self {
            message: spawn_jobs_message("deleting", zone),
            attempts: 10,
            backoff,
        }
    }

    pub fn context_deadline(backoff: Jitter) -> Self {
        Self {
            message: CONTEXT_DEADLINE_EXCEEDED.to_owned(),
            attempts: 5,
            backoff,
        }
    }
}

fn spawn_jobs_message(action: &str, zone: &str) -> String {
    format!(
        "Error {action} volume - Cannot spawn additional jobs in {zone} for this network . Please wait for the ongoing jobs to finish in zone {zone} and try again"
    )
}

/// Uniformly pick a duration in `[min, max)`
pub fn jitter((min, max): Jitter) -> Duration {
    if max <= min {
        return min;
    }
    let min_ms = min.as_millis() as u64;
    let max_ms = max.as_millis() as u64;
    if max_ms <= min_ms {
        return min;
    }
    Duration::from_millis(rand::thread_rng().gen_range(min_ms..max_ms))
}

pub async fn sleep_jitter(range: Jitter) {
    tokio::time::sleep(jitter(range)).await
}

/// Run `op`, and retry it while it fails with one of the `rules` messages
///
/// The first failure selects the rule. Any other outcome of a retry, success or
/// a different error, ends the loop. Once the rule runs out of attempts, the last error is returned.
pub async fn retry_transient<T, F, Fut>(rules: &[Transient], mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut result = op().await;
    let rule = match &result {
        Err(err) => match err.api_message() {
            Some(message) => rules.iter().find(|rule| rule.message == message),
            None => None,
        },
        Ok(_) => None,
    };
    let Some(rule) = rule else {
        return result;
    };

    for attempt in 1..=rule.attempts {
        warn!(message = %rule.message, attempt, attempts = rule.attempts, "transient error, retrying");
        sleep_jitter(rule.backoff).await;
        result = op().await;
        match &result {
            Err(err) if err.api_message() == Some(rule.message.as_str()) => continue,
            _ => return result,
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::client::Error;

    const FAST: Jitter = (Duration::from_millis(1), Duration::from_millis(2));

    fn api_error(message: &str) -> Error {
        Error::Api {
            status: 400,
            code: 400,
            message: message.to_owned(),
        }
    }

    #[test]
    fn spawn_jobs_message_mentions_zone_twice() {
        let rule = Transient::spawn_jobs_on_create("us-east4-a", FAST);
        assert_eq!(
            rule.message,
            "Error creating volume - Cannot spawn additional jobs in us-east4-a for this network . Please wait for the ongoing jobs to finish in zone us-east4-a and try again"
        );
        assert_eq!(rule.attempts, 10);
        assert!(Transient::spawn_jobs_on_delete("z", FAST)
            .message
            .starts_with("Error deleting volume"));
        assert_eq!(Transient::context_deadline(FAST).attempts, 5);
    }

    #[test]
    fn jitter_stays_in_bounds() {
        let range = (Duration::from_millis(10), Duration::from_millis(20));
        for _ in 0..100 {
            let value = jitter(range);
            assert!(value >= range.0 && value < range.1);
        }
        assert_eq!(jitter((range.1, range.0)), range.1);
    }

    #[tokio::test]
    async fn retries_until_success() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let rules = [Transient::context_deadline(FAST)];
        let result = retry_transient(&rules, move || async move {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(api_error(CONTEXT_DEADLINE_EXCEEDED))
            } else {
                Ok(42)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_budget() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let rules = [Transient::context_deadline(FAST)];
        let result: Result<()> = retry_transient(&rules, move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(api_error(CONTEXT_DEADLINE_EXCEEDED))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn other_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let rules = [Transient::context_deadline(FAST)];
        let result: Result<()> = retry_transient(&rules, move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(api_error("quota exceeded"))
        })
        .await;
        assert_eq!(
            result.unwrap_err().to_string(),
            "code: 400, message: quota exceeded"
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn a_different_error_ends_the_retries() {
        let calls = AtomicU32::new(0);
        let rules = [Transient::spawn_jobs_on_create("z", FAST)];
        let message = rules[0].message.clone();
        let result: Result<()> = retry_transient(&rules, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            let message = message.clone();
            async move {
                if n == 0 {
                    Err(api_error(&message))
                } else {
                    Err(api_error("invalid network"))
                }
            }
        })
        .await;
        assert_eq!(
            result.unwrap_err().api_message(),
            Some("invalid network")
        );
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
