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

use anyhow::{bail, Result};
use regex::Regex;
use tf_provider::schema::{Attribute, AttributeConstraint, AttributeType, Description, Schema};
use tf_provider::value::Value;
use tf_provider::{AttributePath, Diagnostics};

pub(crate) const GIB: i64 = 1024 * 1024 * 1024;

pub trait WithSchema {
    fn schema() -> Schema;
}

pub(crate) trait WithValidate {
    fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath);
}

/// Fill the defaults of optional attributes
pub(crate) trait WithNormalize {
    fn normalize(&mut self, diags: &mut Diagnostics);
}

pub(crate) fn attribute(
    attr_type: AttributeType,
    constraint: AttributeConstraint,
    description: &str,
) -> Attribute {
    Attribute {
        attr_type,
        description: Description::plain(description),
        constraint,
        ..Default::default()
    }
}

/// Known and non empty
pub(crate) fn known(value: &Value<String>) -> Option<&str> {
    value.as_deref_option().filter(|value| !value.is_empty())
}

pub(crate) fn default_if_null<T>(value: &mut Value<T>, default: T) {
    if value.is_null() {
        *value = Value::Value(default);
    }
}

pub(crate) fn unknown_if_null<T>(value: &mut Value<T>) {
    if value.is_null() {
        *value = Value::Unknown;
    }
}

/// Keep `fresh` only if the attribute was set before
///
/// Optional attributes the API always fills must not show up in the state when left unset.
pub(crate) fn refresh_if_set<T>(prior: &Value<T>, fresh: T) -> Value<T> {
    if prior.is_value() {
        Value::Value(fresh)
    } else {
        Value::Null
    }
}

/// Unknown values become null
pub(crate) fn or_null<T: Clone>(value: &Value<T>) -> Value<T> {
    match value {
        Value::Unknown => Value::Null,
        value => value.clone(),
    }
}

pub(crate) fn non_empty(value: String) -> Value<String> {
    if value.is_empty() {
        Value::Null
    } else {
        Value::Value(value)
    }
}

/// Paths of the attributes that differ between two states
macro_rules! changed_attributes {
    ($prior:expr, $planned:expr; $($field:ident),+ $(,)?) => {{
        let mut paths = Vec::new();
        $(
            if $prior.$field != $planned.$field {
                paths.push(tf_provider::AttributePath::new(stringify!($field)));
            }
        )+
        paths
    }};
}
pub(crate) use changed_attributes;

pub(crate) fn check_one_of(
    diags: &mut Diagnostics,
    attr_path: AttributePath,
    value: &Value<String>,
    allowed: &[&str],
) {
    if let Value::Value(value) = value {
        if !allowed.iter().any(|item| item.eq_ignore_ascii_case(value)) {
            diags.error(
                "Invalid value",
                format!("expected one of {allowed:?}, got {value:?}"),
                attr_path,
            );
        }
    }
}

pub(crate) fn check_match(
    diags: &mut Diagnostics,
    attr_path: AttributePath,
    value: &Value<String>,
    regex: &Regex,
    message: &'static str,
) {
    if let Value::Value(value) = value {
        if !regex.is_match(value) {
            diags.error(message, format!("invalid value {value:?}"), attr_path);
        }
    }
}

/// Service levels are shifted by one in the API
pub(crate) fn service_level_to_api(level: &str) -> String {
    match level {
        "standard" => "low",
        "premium" => "medium",
        other => other,
    }
    .to_owned()
}

pub(crate) fn service_level_from_api(level: &str) -> String {
    match level {
        "basic" => "standard",
        "standard" => "premium",
        other => other,
    }
    .to_owned()
}

pub(crate) fn protocol_to_api(protocol: &str) -> String {
    if protocol == "SMB" { "CIFS" } else { protocol }.to_owned()
}

pub(crate) fn protocol_from_api(protocol: &str) -> String {
    if protocol == "CIFS" { "SMB" } else { protocol }.to_owned()
}

/// Full path of a VPC network
///
/// Shared VPC networks live in the host project.
pub(crate) fn network_path(project_number: &str, shared_vpc: Option<&str>, network: &str) -> String {
    format!(
        "projects/{}/global/networks/{network}",
        shared_vpc.unwrap_or(project_number)
    )
}

/// Split a network returned by the API into its name and shared VPC project
///
/// The API returns either a bare name, or `projects/{project}/global/networks/{name}`.
pub(crate) fn parse_network(path: &str, project_number: &str) -> Result<(String, Option<String>)> {
    let segments: Vec<&str> = path.split('/').collect();
    match segments.as_slice() {
        [name] => Ok((name.to_string(), None)),
        [_, project, _, _, name] => {
            let shared = (*project != project_number).then(|| project.to_string());
            Ok((name.to_string(), shared))
        }
        _ => bail!("network path {path} is invalid"),
    }
}

/// Network name, as shown by data sources
pub(crate) fn network_name(path: &str) -> &str {
    path.split_once("networks/").map_or(path, |(_, name)| name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_levels_are_translated() {
        assert_eq!(service_level_to_api("standard"), "low");
        assert_eq!(service_level_to_api("premium"), "medium");
        assert_eq!(service_level_to_api("extreme"), "extreme");
        assert_eq!(service_level_from_api("basic"), "standard");
        assert_eq!(service_level_from_api("standard"), "premium");
        assert_eq!(service_level_from_api("extreme"), "extreme");
    }

    #[test]
    fn smb_is_cifs() {
        assert_eq!(protocol_to_api("SMB"), "CIFS");
        assert_eq!(protocol_to_api("NFSv3"), "NFSv3");
        assert_eq!(protocol_from_api("CIFS"), "SMB");
    }

    #[test]
    fn networks() {
        assert_eq!(
            network_path("123", None, "default"),
            "projects/123/global/networks/default"
        );
        assert_eq!(
            network_path("123", Some("456"), "shared"),
            "projects/456/global/networks/shared"
        );
        assert_eq!(
            parse_network("default", "123").unwrap(),
            ("default".to_owned(), None)
        );
        assert_eq!(
            parse_network("projects/123/global/networks/vpc", "123").unwrap(),
            ("vpc".to_owned(), None)
        );
        assert_eq!(
            parse_network("projects/456/global/networks/vpc", "123").unwrap(),
            ("vpc".to_owned(), Some("456".to_owned()))
        );
        assert!(parse_network("global/networks/vpc", "123").is_err());
        assert_eq!(network_name("projects/1/global/networks/vpc"), "vpc");
        assert_eq!(network_name("vpc"), "vpc");
    }

    #[test]
    fn validation_helpers() {
        let mut diags = Diagnostics::default();
        let allowed = ["software", "hardware"];
        check_one_of(&mut diags, AttributePath::new("a"), &"Software".to_owned().into(), &allowed);
        check_one_of(&mut diags, AttributePath::new("a"), &Value::Unknown, &allowed);
        assert!(diags.errors.is_empty());
        check_one_of(&mut diags, AttributePath::new("a"), &"ssd".to_owned().into(), &allowed);
        assert_eq!(diags.errors.len(), 1);
    }

    #[test]
    fn value_helpers() {
        let mut value: Value<String> = Value::Null;
        unknown_if_null(&mut value);
        assert_eq!(value, Value::Unknown);
        let mut value: Value<i64> = Value::Null;
        default_if_null(&mut value, 3);
        assert_eq!(value, Value::Value(3));
        assert_eq!(refresh_if_set(&Value::<i64>::Null, 4), Value::Null);
        assert_eq!(refresh_if_set(&Value::Value(1), 4), Value::Value(4));
        assert_eq!(known(&Value::Value(String::new())), None);
        assert_eq!(non_empty(String::new()), Value::Null);
        assert_eq!(or_null(&Value::<i64>::Unknown), Value::Null);
        assert_eq!(or_null(&Value::Value(2)), Value::Value(2));
    }
}
