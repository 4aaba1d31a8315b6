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

//! Snapshot and export policies, shared by the volume resource and data source

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tf_provider::schema::{
    Attribute, AttributeConstraint, AttributeType, Block, Description, NestedBlock,
};
use tf_provider::value::{self, Value, ValueBool, ValueList, ValueNumber};
use tf_provider::{map, AttributePath, Diagnostics};

use crate::api::volume::{
    Checked, DailySchedule, ExportPolicy, ExportRule, HourlySchedule, MonthlySchedule,
    SnapshotPolicy, WeeklySchedule,
};
use crate::utils::{attribute, check_one_of, default_if_null, refresh_if_set, WithNormalize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SnapshotPolicyState {
    pub enabled: ValueBool,
    #[serde(with = "value::serde_as_vec")]
    pub hourly_schedule: Value<HourlyScheduleState>,
    #[serde(with = "value::serde_as_vec")]
    pub daily_schedule: Value<DailyScheduleState>,
    #[serde(with = "value::serde_as_vec")]
    pub weekly_schedule: Value<WeeklyScheduleState>,
    #[serde(with = "value::serde_as_vec")]
    pub monthly_schedule: Value<MonthlyScheduleState>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct HourlyScheduleState {
    pub minute: ValueNumber,
    pub snapshots_to_keep: ValueNumber,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DailyScheduleState {
    pub hour: ValueNumber,
    pub minute: ValueNumber,
    pub snapshots_to_keep: ValueNumber,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct WeeklyScheduleState {
    pub day: Value<String>,
    pub hour: ValueNumber,
    pub minute: ValueNumber,
    pub snapshots_to_keep: ValueNumber,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct MonthlyScheduleState {
    pub days_of_month: Value<String>,
    pub hour: ValueNumber,
    pub minute: ValueNumber,
    pub snapshots_to_keep: ValueNumber,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ExportPolicyState {
    pub rule: ValueList<Value<ExportRuleState>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ExportRuleState {
    pub access: Value<String>,
    pub allowed_clients: Value<String>,
    pub has_root_access: Value<String>,
    pub kerberos5_readonly: ValueBool,
    pub kerberos5_readwrite: ValueBool,
    pub kerberos5i_readonly: ValueBool,
    pub kerberos5i_readwrite: ValueBool,
    pub kerberos5p_readonly: ValueBool,
    pub kerberos5p_readwrite: ValueBool,
    #[serde(with = "value::serde_as_vec")]
    pub nfsv3: Value<CheckedState>,
    #[serde(with = "value::serde_as_vec")]
    pub nfsv4: Value<CheckedState>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CheckedState {
    pub checked: ValueBool,
}

const KERBEROS_FLAGS: [&str; 6] = [
    "kerberos5_readonly",
    "kerberos5_readwrite",
    "kerberos5i_readonly",
    "kerberos5i_readwrite",
    "kerberos5p_readonly",
    "kerberos5p_readwrite",
];

fn number(description: &str) -> Attribute {
    attribute(
        AttributeType::Number,
        AttributeConstraint::OptionalComputed,
        description,
    )
}

fn schedule_block(attributes: Vec<(&'static str, Attribute)>, description: &str) -> NestedBlock {
    NestedBlock::Optional(Block {
        attributes: attributes
            .into_iter()
            .map(|(name, attribute)| (name.to_owned(), attribute))
            .collect(),
        description: Description::plain(description),
        ..Default::default()
    })
}

pub(crate) fn snapshot_policy_block() -> NestedBlock {
    let minute = || ("minute", number("Minute of the snapshot"));
    let hour = || ("hour", number("Hour of the snapshot"));
    let keep = || ("snapshots_to_keep", number("Number of snapshots kept"));
    NestedBlock::Optional(Block {
        attributes: map! {
            "enabled" => attribute(
                AttributeType::Bool,
                AttributeConstraint::OptionalComputed,
                "Whether scheduled snapshots are taken",
            ),
        },
        blocks: map! {
            "hourly_schedule" => schedule_block(vec![minute(), keep()], "Hourly snapshots"),
            "daily_schedule" => schedule_block(vec![hour(), minute(), keep()], "Daily snapshots"),
            "weekly_schedule" => schedule_block(
                vec![
                    ("day", attribute(
                        AttributeType::String,
                        AttributeConstraint::OptionalComputed,
                        "Day of the week, Sunday by default",
                    )),
                    hour(),
                    minute(),
                    keep(),
                ],
                "Weekly snapshots",
            ),
            "monthly_schedule" => schedule_block(
                vec![
                    ("days_of_month", attribute(
                        AttributeType::String,
                        AttributeConstraint::OptionalComputed,
                        "Comma separated days of the month, 1 by default",
                    )),
                    hour(),
                    minute(),
                    keep(),
                ],
                "Monthly snapshots",
            ),
        },
        description: Description::plain("Scheduled snapshots of the volume"),
        ..Default::default()
    })
}

pub(crate) fn export_policy_block() -> NestedBlock {
    let checked = || {
        NestedBlock::Optional(Block {
            attributes: map! {
                "checked" => attribute(
                    AttributeType::Bool,
                    AttributeConstraint::Optional,
                    "Whether the protocol is allowed",
                ),
            },
            ..Default::default()
        })
    };
    let mut rule_attributes: HashMap<String, Attribute> = map! {
        "access" => attribute(
            AttributeType::String,
            AttributeConstraint::Optional,
            "Access granted to the clients, like ReadWrite or ReadOnly",
        ),
        "allowed_clients" => attribute(
            AttributeType::String,
            AttributeConstraint::Optional,
            "Comma separated list of allowed clients",
        ),
        "has_root_access" => attribute(
            AttributeType::String,
            AttributeConstraint::OptionalComputed,
            "Root access of the clients: true, false, on or off",
        ),
    };
    for flag in KERBEROS_FLAGS {
        rule_attributes.insert(
            flag.to_owned(),
            attribute(AttributeType::Bool, AttributeConstraint::OptionalComputed, flag),
        );
    }
    NestedBlock::Optional(Block {
        blocks: map! {
            "rule" => NestedBlock::List(Block {
                attributes: rule_attributes,
                blocks: map! {
                    "nfsv3" => checked(),
                    "nfsv4" => checked(),
                },
                description: Description::plain("Export rule"),
                ..Default::default()
            }),
        },
        description: Description::plain("Export policy of the volume"),
        ..Default::default()
    })
}

/// Computed counterpart of the policy blocks, for data sources
pub(crate) fn snapshot_policy_type() -> AttributeType {
    let object = |fields: &[(&str, AttributeType)]| {
        AttributeType::List(Box::new(AttributeType::Object(
            fields
                .iter()
                .map(|(name, attr_type)| (name.to_string(), attr_type.clone()))
                .collect(),
        )))
    };
    let n = AttributeType::Number;
    let s = AttributeType::String;
    object(&[
        ("enabled", AttributeType::Bool),
        ("hourly_schedule", object(&[("minute", n.clone()), ("snapshots_to_keep", n.clone())])),
        (
            "daily_schedule",
            object(&[("hour", n.clone()), ("minute", n.clone()), ("snapshots_to_keep", n.clone())]),
        ),
        (
            "weekly_schedule",
            object(&[
                ("day", s.clone()),
                ("hour", n.clone()),
                ("minute", n.clone()),
                ("snapshots_to_keep", n.clone()),
            ]),
        ),
        (
            "monthly_schedule",
            object(&[
                ("days_of_month", s),
                ("hour", n.clone()),
                ("minute", n.clone()),
                ("snapshots_to_keep", n),
            ]),
        ),
    ])
}

pub(crate) fn export_policy_type() -> AttributeType {
    let checked = AttributeType::List(Box::new(AttributeType::Object(map! {
        "checked" => AttributeType::Bool,
    })));
    let mut rule: HashMap<String, AttributeType> = map! {
        "access" => AttributeType::String,
        "allowed_clients" => AttributeType::String,
        "has_root_access" => AttributeType::String,
        "nfsv3" => checked.clone(),
        "nfsv4" => checked,
    };
    for flag in KERBEROS_FLAGS {
        rule.insert(flag.to_owned(), AttributeType::Bool);
    }
    AttributeType::List(Box::new(AttributeType::Object(map! {
        "rule" => AttributeType::List(Box::new(AttributeType::Object(rule))),
    })))
}

impl WithNormalize for SnapshotPolicyState {
    fn normalize(&mut self, _diags: &mut Diagnostics) {
        for schedule in self.hourly_schedule.iter_mut() {
            default_if_null(&mut schedule.minute, 0);
            default_if_null(&mut schedule.snapshots_to_keep, 0);
        }
        for schedule in self.daily_schedule.iter_mut() {
            default_if_null(&mut schedule.hour, 0);
            default_if_null(&mut schedule.minute, 0);
            default_if_null(&mut schedule.snapshots_to_keep, 0);
        }
        for schedule in self.weekly_schedule.iter_mut() {
            default_if_null(&mut schedule.day, "Sunday".to_owned());
            default_if_null(&mut schedule.hour, 0);
            default_if_null(&mut schedule.minute, 0);
            default_if_null(&mut schedule.snapshots_to_keep, 0);
        }
        for schedule in self.monthly_schedule.iter_mut() {
            default_if_null(&mut schedule.days_of_month, "1".to_owned());
            default_if_null(&mut schedule.hour, 0);
            default_if_null(&mut schedule.minute, 0);
            default_if_null(&mut schedule.snapshots_to_keep, 0);
        }
        if self.enabled.is_null() {
            self.enabled = Value::Unknown;
        }
    }
}

impl WithNormalize for ExportPolicyState {
    fn normalize(&mut self, _diags: &mut Diagnostics) {
        for rule in self.rule.iter_mut().flatten().flat_map(Value::iter_mut) {
            default_if_null(&mut rule.has_root_access, "true".to_owned());
            for flag in rule.kerberos_flags_mut() {
                default_if_null(flag, false);
            }
        }
    }
}

impl ExportRuleState {
    fn kerberos_flags_mut(&mut self) -> [&mut ValueBool; 6] {
        [
            &mut self.kerberos5_readonly,
            &mut self.kerberos5_readwrite,
            &mut self.kerberos5i_readonly,
            &mut self.kerberos5i_readwrite,
            &mut self.kerberos5p_readonly,
            &mut self.kerberos5p_readwrite,
        ]
    }
}

fn checked(value: &Value<CheckedState>) -> Value<bool> {
    match value {
        Value::Value(state) => state.checked.clone(),
        Value::Null => Value::Value(false),
        Value::Unknown => Value::Unknown,
    }
}

impl ExportPolicyState {
    pub(crate) fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        for (i, rule) in self.rule.iter().flatten().enumerate() {
            let Value::Value(rule) = rule else {
                continue;
            };
            let path = attr_path.clone().attribute("rule").index(i as i64);
            check_one_of(
                diags,
                path.clone().attribute("has_root_access"),
                &rule.has_root_access,
                &["true", "false", "on", "off"],
            );
            if let (Value::Value(false), Value::Value(false)) =
                (checked(&rule.nfsv3), checked(&rule.nfsv4))
            {
                diags.error(
                    "Invalid export rule",
                    "At least one of nfsv3 or nfsv4 needs to be true in protocol type of the export policy rule",
                    path,
                );
            }
        }
    }
}

fn number_or_zero(value: &ValueNumber) -> i64 {
    value.as_ref_option().copied().unwrap_or_default()
}

fn string_or(value: &Value<String>, default: &str) -> String {
    value
        .as_deref_option()
        .unwrap_or(default)
        .to_owned()
}

impl From<&SnapshotPolicyState> for SnapshotPolicy {
    fn from(state: &SnapshotPolicyState) -> Self {
        let mut policy = SnapshotPolicy {
            enabled: state.enabled.as_ref_option().copied().unwrap_or_default(),
            ..Default::default()
        };
        if let Value::Value(hourly) = &state.hourly_schedule {
            policy.hourly_schedule = HourlySchedule {
                minute: number_or_zero(&hourly.minute),
                snapshots_to_keep: number_or_zero(&hourly.snapshots_to_keep),
            };
        }
        if let Value::Value(daily) = &state.daily_schedule {
            policy.daily_schedule = DailySchedule {
                hour: number_or_zero(&daily.hour),
                minute: number_or_zero(&daily.minute),
                snapshots_to_keep: number_or_zero(&daily.snapshots_to_keep),
            };
        }
        if let Value::Value(weekly) = &state.weekly_schedule {
            policy.weekly_schedule = WeeklySchedule {
                day: string_or(&weekly.day, "Sunday"),
                hour: number_or_zero(&weekly.hour),
                minute: number_or_zero(&weekly.minute),
                snapshots_to_keep: number_or_zero(&weekly.snapshots_to_keep),
            };
        }
        if let Value::Value(monthly) = &state.monthly_schedule {
            policy.monthly_schedule = MonthlySchedule {
                days_of_month: string_or(&monthly.days_of_month, "1"),
                hour: number_or_zero(&monthly.hour),
                minute: number_or_zero(&monthly.minute),
                snapshots_to_keep: number_or_zero(&monthly.snapshots_to_keep),
            };
        }
        policy
    }
}

impl From<&ExportPolicyState> for ExportPolicy {
    fn from(state: &ExportPolicyState) -> Self {
        let flag = |value: &ValueBool| Checked::from(value.as_ref_option().copied().unwrap_or_default());
        ExportPolicy {
            rules: state
                .rule
                .iter()
                .flatten()
                .filter_map(Value::as_ref_option)
                .map(|rule| ExportRule {
                    access: string_or(&rule.access, ""),
                    allowed_clients: string_or(&rule.allowed_clients, ""),
                    has_root_access: string_or(&rule.has_root_access, "true"),
                    kerberos5_read_only: flag(&rule.kerberos5_readonly),
                    kerberos5_read_write: flag(&rule.kerberos5_readwrite),
                    kerberos5i_read_only: flag(&rule.kerberos5i_readonly),
                    kerberos5i_read_write: flag(&rule.kerberos5i_readwrite),
                    kerberos5p_read_only: flag(&rule.kerberos5p_readonly),
                    kerberos5p_read_write: flag(&rule.kerberos5p_readwrite),
                    nfsv3: Checked::from(checked(&rule.nfsv3).unwrap_or_default()),
                    nfsv4: Checked::from(checked(&rule.nfsv4).unwrap_or_default()),
                })
                .collect(),
        }
    }
}

impl SnapshotPolicyState {
    /// Full policy as returned by the API
    pub(crate) fn from_api(policy: &SnapshotPolicy) -> Self {
        Self {
            enabled: Value::Value(policy.enabled),
            hourly_schedule: Value::Value(HourlyScheduleState {
                minute: policy.hourly_schedule.minute.into(),
                snapshots_to_keep: policy.hourly_schedule.snapshots_to_keep.into(),
            }),
            daily_schedule: Value::Value(DailyScheduleState {
                hour: policy.daily_schedule.hour.into(),
                minute: policy.daily_schedule.minute.into(),
                snapshots_to_keep: policy.daily_schedule.snapshots_to_keep.into(),
            }),
            weekly_schedule: Value::Value(WeeklyScheduleState {
                day: policy.weekly_schedule.day.clone().into(),
                hour: policy.weekly_schedule.hour.into(),
                minute: policy.weekly_schedule.minute.into(),
                snapshots_to_keep: policy.weekly_schedule.snapshots_to_keep.into(),
            }),
            monthly_schedule: Value::Value(MonthlyScheduleState {
                days_of_month: policy.monthly_schedule.days_of_month.clone().into(),
                hour: policy.monthly_schedule.hour.into(),
                minute: policy.monthly_schedule.minute.into(),
                snapshots_to_keep: policy.monthly_schedule.snapshots_to_keep.into(),
            }),
        }
    }

    /// Policy returned by the API, restricted to the schedules that were configured
    pub(crate) fn refresh(&self, policy: &SnapshotPolicy) -> Self {
        let fresh = Self::from_api(policy);
        Self {
            enabled: fresh.enabled,
            hourly_schedule: refresh_if_set(&self.hourly_schedule, fresh.hourly_schedule.unwrap_or_default()),
            daily_schedule: refresh_if_set(&self.daily_schedule, fresh.daily_schedule.unwrap_or_default()),
            weekly_schedule: refresh_if_set(&self.weekly_schedule, fresh.weekly_schedule.unwrap_or_default()),
            monthly_schedule: refresh_if_set(&self.monthly_schedule, fresh.monthly_schedule.unwrap_or_default()),
        }
    }
}

impl ExportPolicyState {
    pub(crate) fn from_api(policy: &ExportPolicy) -> Self {
        Self {
            rule: Value::Value(
                policy
                    .rules
                    .iter()
                    .map(|rule| {
                        Value::Value(ExportRuleState {
                            access: rule.access.clone().into(),
                            allowed_clients: rule.allowed_clients.clone().into(),
                            has_root_access: rule.has_root_access.clone().into(),
                            kerberos5_readonly: rule.kerberos5_read_only.checked.into(),
                            kerberos5_readwrite: rule.kerberos5_read_write.checked.into(),
                            kerberos5i_readonly: rule.kerberos5i_read_only.checked.into(),
                            kerberos5i_readwrite: rule.kerberos5i_read_write.checked.into(),
                            kerberos5p_readonly: rule.kerberos5p_read_only.checked.into(),
                            kerberos5p_readwrite: rule.kerberos5p_read_write.checked.into(),
                            nfsv3: Value::Value(CheckedState {
                                checked: rule.nfsv3.checked.into(),
                            }),
                            nfsv4: Value::Value(CheckedState {
                                checked: rule.nfsv4.checked.into(),
                            }),
                        })
                    })
                    .collect(),
            ),
        }
    }
}
