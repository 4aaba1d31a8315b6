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

//! Wire types of the Cloud Volumes API, and the client calls using them

use serde::{Deserialize, Deserializer};

use crate::client::{Error, Result};

pub mod active_directory;
pub mod backup;
pub mod kms;
pub mod replication;
pub mod snapshot;
pub mod storage_pool;
pub mod volume;

/// Replaces an explicit JSON `null` by the default value
pub fn nullable<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// `{"response": {"AnyValue": ...}}` wrapper of asynchronous operations
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    pub response: AnyValue<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnyValue<T> {
    #[serde(rename = "AnyValue")]
    pub value: T,
}

impl<T> Envelope<T> {
    pub fn into_inner(self) -> T {
        self.response.value
    }
}

/// Status echoed by some successful calls
///
/// A 2xx response may still carry a failure in this form.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Reply {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

impl Reply {
    pub fn check(self) -> Result<()> {
        if (self.code != 0 && self.code != 200) || !self.message.is_empty() {
            Err(Error::Api {
                status: 200,
                code: self.code,
                message: self.message,
            })
        } else {
            Ok(())
        }
    }
}

/// Parse `<id>:<location>[:<extra>]` import identifiers
///
/// `parts` is the number of segments expected.
pub fn split_id(id: &str, parts: usize) -> Result<Vec<&str>> {
    let segments: Vec<&str> = id.split(':').collect();
    if segments.len() != parts || segments.iter().any(|s| s.is_empty()) {
        return Err(Error::InvalidId(format!(
            "unexpected identifier {id:?}, expected {parts} non empty segments separated by ':'"
        )));
    }
    Ok(segments)
}
