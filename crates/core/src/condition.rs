// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pipeline conditions: observations about disparate pipeline operations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Condition categories recorded on a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionType {
    NetbootJobFailed,
    NetbootJobComplete,
    NetbootJobRunning,
    NetbootJobSetupFailed,
    NetbootJobSetupComplete,
    AllowNetbootTrue,
    AllowNetbootFalse,
    WorkflowRenderedSuccess,
}

impl fmt::Display for ConditionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConditionType::NetbootJobFailed => "NetbootJobFailed",
            ConditionType::NetbootJobComplete => "NetbootJobComplete",
            ConditionType::NetbootJobRunning => "NetbootJobRunning",
            ConditionType::NetbootJobSetupFailed => "NetbootJobSetupFailed",
            ConditionType::NetbootJobSetupComplete => "NetbootJobSetupComplete",
            ConditionType::AllowNetbootTrue => "AllowNetbootTrue",
            ConditionType::AllowNetbootFalse => "AllowNetbootFalse",
            ConditionType::WorkflowRenderedSuccess => "WorkflowRenderedSuccess",
        };
        write!(f, "{}", s)
    }
}

/// Whether the observation held.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionStatus {
    True,
    False,
}

/// A single observation about the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub condition_type: ConditionType,

    pub status: ConditionStatus,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,

    /// When this condition was last set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<DateTime<Utc>>,
}

/// Condition list keyed by type: setting a type replaces its prior entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Conditions(pub Vec<Condition>);

impl Conditions {
    /// Insert or replace the condition of the same type.
    ///
    /// An entry that differs only in its timestamp is left alone, so
    /// re-observing an unchanged fact does not dirty the status.
    pub fn set(&mut self, condition: Condition) {
        match self
            .0
            .iter_mut()
            .find(|c| c.condition_type == condition.condition_type)
        {
            Some(existing) => {
                if existing.status != condition.status
                    || existing.reason != condition.reason
                    || existing.message != condition.message
                {
                    *existing = condition;
                }
            }
            None => self.0.push(condition),
        }
    }

    /// Look up a condition by type.
    pub fn get(&self, condition_type: ConditionType) -> Option<&Condition> {
        self.0.iter().find(|c| c.condition_type == condition_type)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True when the condition exists with status True.
    pub fn is_true(&self, condition_type: ConditionType) -> bool {
        matches!(
            self.get(condition_type),
            Some(Condition {
                status: ConditionStatus::True,
                ..
            })
        )
    }
}

#[cfg(test)]
#[path = "condition_tests.rs"]
mod tests;
