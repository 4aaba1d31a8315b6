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

use serde::Deserialize;
use thiserror::Error;

/// Errors returned by the Cloud Volumes client
#[derive(Debug, Error)]
pub enum Error {
    /// The request could not be sent or its response could not be read
    #[error("{method} {path} failed: {source}")]
    Transport {
        method: String,
        path: String,
        #[source]
        source: reqwest::Error,
    },
    /// The API answered with its `{code, message}` error envelope
    #[error("code: {code}, message: {message}")]
    Api {
        status: u16,
        code: i64,
        message: String,
    },
    /// The API answered with a non 2xx status and an unstructured body
    #[error("{body}")]
    Unexpected { status: u16, body: String },
    /// A successful response did not have the expected shape
    #[error("unable to decode the response of {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("{0}")]
    Config(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Ambiguous(String),
    #[error("{0}")]
    InvalidId(String),
    /// A resource reached a state it cannot recover from
    #[error("{0}")]
    State(String),
    /// A creation failed after the API had assigned `id` to the new object
    #[error("{error}")]
    Incomplete { id: String, error: Box<Error> },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Error envelope sent by the API on failures
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorEnvelope {
    pub code: i64,
    pub message: String,
}

impl Error {
    /// Build the error matching a non 2xx response
    pub fn from_response(status: u16, body: &[u8]) -> Self {
        match serde_json::from_slice::<ErrorEnvelope>(body) {
            Ok(envelope) => Error::Api {
                status,
                code: envelope.code,
                message: envelope.message,
            },
            Err(_) => Error::Unexpected {
                status,
                body: String::from_utf8_lossy(body).into_owned(),
            },
        }
    }

    /// Whether the error means the requested object does not exist
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::Api { status, code, .. } => *status == 404 || *code == 404,
            Error::Unexpected { status, .. } => *status == 404,
            Error::NotFound(_) => true,
            Error::Incomplete { error, .. } => error.is_not_found(),
            _ => false,
        }
    }

    /// Message carried by the API error envelope, if any
    pub fn api_message(&self) -> Option<&str> {
        match self {
            Error::Api { message, .. } => Some(message),
            Error::Incomplete { error, .. } => error.api_message(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_is_rendered_with_code_and_message() {
        let err = Error::from_response(
            404,
            br#"{"code": 404, "message": "Error describing volume - Volume not found"}"#,
        );
        assert_eq!(
            err.to_string(),
            "code: 404, message: Error describing volume - Volume not found"
        );
        assert!(err.is_not_found());
        assert_eq!(
            err.api_message(),
            Some("Error describing volume - Volume not found")
        );
    }

    #[test]
    fn raw_body_is_kept_when_not_an_envelope() {
        let err = Error::from_response(502, b"<html>Bad Gateway</html>");
        assert_eq!(err.to_string(), "<html>Bad Gateway</html>");
        assert!(!err.is_not_found());
        assert_eq!(err.api_message(), None);
    }

    #[test]
    fn not_found_from_status_only() {
        assert!(Error::from_response(404, b"missing").is_not_found());
        assert!(Error::NotFound("gone".into()).is_not_found());
        assert!(!Error::State("error".into()).is_not_found());
    }

    #[test]
    fn incomplete_creation_reads_as_its_cause() {
        let err = Error::Incomplete {
            id: "v1".into(),
            error: Box::new(Error::from_response(500, br#"{"code": 500, "message": "no capacity"}"#)),
        };
        assert_eq!(err.to_string(), "code: 500, message: no capacity");
        assert_eq!(err.api_message(), Some("no capacity"));
        assert!(!err.is_not_found());
    }
}
