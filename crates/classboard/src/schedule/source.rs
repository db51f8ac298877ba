//! Source fetch orchestration.
//!
//! Tries the unified schedule source first and, if it fails, a role-specific
//! fallback. Tier failures are logged and swallowed here; the caller gets a
//! [`FetchOutcome`] describing which tier answered and whether the page
//! should raise an error banner.

use super::client::ScheduleApi;
use super::error::ScheduleError;
use super::types::{Actor, RawScheduleRecord, Role};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

const UNIFIED_SOURCE: &str = "unified schedules";
const TEACHER_SOURCE: &str = "teacher classes";
const STUDENT_SOURCE: &str = "student schedule";

/// Which tier produced the records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceTier {
    /// First-tier unified source
    Unified,
    /// The role-specific fallback answered
    RoleFallback(Role),
    /// Every tier failed
    Exhausted,
}

/// Result of one orchestrated fetch.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub records: Vec<RawScheduleRecord>,
    pub tier: SourceTier,
    /// Set when the first-tier call itself threw
    pub first_tier_error: Option<ScheduleError>,
}

impl FetchOutcome {
    /// The error to put in a banner, if any.
    ///
    /// Only a first-tier failure that no fallback recovered from is shown;
    /// a fallback that answers, even with nothing, means "no schedules".
    pub fn banner_error(&self) -> Option<&ScheduleError> {
        match self.tier {
            SourceTier::Exhausted => self.first_tier_error.as_ref(),
            _ => None,
        }
    }
}

/// The known shapes of the student-scoped schedule response, in the order
/// they are probed.
#[derive(Debug, Clone, PartialEq)]
pub enum StudentScheduleShape {
    /// Already a list of records
    List(Vec<Value>),
    /// `{ "schedules": [...] }`
    Schedules(Vec<Value>),
    /// `{ "data": [...] }`
    DataList(Vec<Value>),
    /// `{ "student_schedules": [...] }`
    StudentSchedules(Vec<Value>),
    /// `{ "data": {...} }`
    DataObject(Value),
    /// `{ "schedule": {...} }`
    Schedule(Value),
    /// None of the above; the whole response is one record
    Whole(Value),
    /// `null`
    Empty,
}

impl StudentScheduleShape {
    /// Decides which shape a response has. Probes run in a fixed order and
    /// the first match wins.
    pub fn classify(value: Value) -> Self {
        let mut map = match value {
            Value::Array(items) => return StudentScheduleShape::List(items),
            Value::Null => return StudentScheduleShape::Empty,
            Value::Object(map) => map,
            other => return StudentScheduleShape::Whole(other),
        };

        if let Some(items) = take_array(&mut map, "schedules") {
            return StudentScheduleShape::Schedules(items);
        }
        if let Some(items) = take_array(&mut map, "data") {
            return StudentScheduleShape::DataList(items);
        }
        if let Some(items) = take_array(&mut map, "student_schedules") {
            return StudentScheduleShape::StudentSchedules(items);
        }
        if let Some(object) = take_object(&mut map, "data") {
            return StudentScheduleShape::DataObject(object);
        }
        if let Some(object) = take_object(&mut map, "schedule") {
            return StudentScheduleShape::Schedule(object);
        }
        StudentScheduleShape::Whole(Value::Object(map))
    }

    pub fn into_records(self) -> Vec<RawScheduleRecord> {
        match self {
            StudentScheduleShape::List(items)
            | StudentScheduleShape::Schedules(items)
            | StudentScheduleShape::DataList(items)
            | StudentScheduleShape::StudentSchedules(items) => {
                items.into_iter().map(RawScheduleRecord).collect()
            }
            StudentScheduleShape::DataObject(object)
            | StudentScheduleShape::Schedule(object)
            | StudentScheduleShape::Whole(object) => vec![RawScheduleRecord(object)],
            StudentScheduleShape::Empty => Vec::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            StudentScheduleShape::List(_) => "list",
            StudentScheduleShape::Schedules(_) => "schedules",
            StudentScheduleShape::DataList(_) => "data list",
            StudentScheduleShape::StudentSchedules(_) => "student_schedules",
            StudentScheduleShape::DataObject(_) => "data object",
            StudentScheduleShape::Schedule(_) => "schedule",
            StudentScheduleShape::Whole(_) => "whole response",
            StudentScheduleShape::Empty => "empty",
        }
    }
}

fn take_array(map: &mut Map<String, Value>, key: &str) -> Option<Vec<Value>> {
    if !matches!(map.get(key), Some(Value::Array(_))) {
        return None;
    }
    match map.remove(key) {
        Some(Value::Array(items)) => Some(items),
        _ => None,
    }
}

fn take_object(map: &mut Map<String, Value>, key: &str) -> Option<Value> {
    if !matches!(map.get(key), Some(Value::Object(_))) {
        return None;
    }
    map.remove(key)
}

fn unavailable(source_name: &'static str, err: ScheduleError) -> ScheduleError {
    match err {
        ScheduleError::ShapeMismatch { .. } | ScheduleError::SourceUnavailable { .. } => err,
        other => ScheduleError::SourceUnavailable {
            source_name,
            message: other.to_string(),
        },
    }
}

/// Calls the unified source. Anything but a JSON array counts as a failure;
/// an empty array is a valid answer.
async fn fetch_unified(api: &dyn ScheduleApi) -> Result<Vec<RawScheduleRecord>, ScheduleError> {
    match api.live_schedules().await {
        Ok(Value::Array(items)) => Ok(items.into_iter().map(RawScheduleRecord).collect()),
        Ok(other) => Err(ScheduleError::ShapeMismatch {
            source_name: UNIFIED_SOURCE,
            message: format!("expected an array, got {}", json_kind(&other)),
        }),
        Err(e) => Err(unavailable(UNIFIED_SOURCE, e)),
    }
}

/// Reads the `schedules` field nested in the teacher-scoped classes response.
async fn fetch_teacher_schedules(
    api: &dyn ScheduleApi,
) -> Result<Vec<RawScheduleRecord>, ScheduleError> {
    let value = api
        .teacher_classes()
        .await
        .map_err(|e| unavailable(TEACHER_SOURCE, e))?;
    let records = match value.get("schedules") {
        Some(Value::Array(items)) => items.iter().cloned().map(RawScheduleRecord).collect(),
        _ => Vec::new(),
    };
    Ok(records)
}

/// Student loader: unified source if it has anything, otherwise the
/// student-scoped source in whatever shape it answers.
///
/// Errors only when neither call succeeded.
async fn try_student_sources(
    api: &dyn ScheduleApi,
    correlation_id: &str,
) -> Result<Vec<RawScheduleRecord>, ScheduleError> {
    let unified = fetch_unified(api).await;
    match &unified {
        Ok(records) if !records.is_empty() => debug!(
            correlation_id = %correlation_id,
            count = records.len(),
            "Student loader served from unified source"
        ),
        Ok(_) => debug!(
            correlation_id = %correlation_id,
            "Unified source empty, trying student source"
        ),
        Err(e) => warn!(
            correlation_id = %correlation_id,
            error = %e,
            "Unified source failed in student loader"
        ),
    }
    if matches!(&unified, Ok(records) if !records.is_empty()) {
        return unified;
    }

    match api.student_schedule().await {
        Ok(value) => {
            let shape = StudentScheduleShape::classify(value);
            debug!(
                correlation_id = %correlation_id,
                shape = shape.name(),
                "Classified student schedule response"
            );
            Ok(shape.into_records())
        }
        Err(e) => {
            let err = unavailable(STUDENT_SOURCE, e);
            warn!(
                correlation_id = %correlation_id,
                error = %err,
                "Student schedule source failed"
            );
            // An empty unified answer still counts as a successful read
            match unified {
                Ok(records) => Ok(records),
                Err(_) => Err(err),
            }
        }
    }
}

/// Runs the fallback chain for `actor`.
pub async fn fetch_schedules(
    api: &dyn ScheduleApi,
    actor: &Actor,
    correlation_id: &str,
) -> FetchOutcome {
    info!(
        correlation_id = %correlation_id,
        role = %actor.role,
        "Fetching schedules"
    );

    let first_tier_error = match fetch_unified(api).await {
        Ok(records) => {
            info!(
                correlation_id = %correlation_id,
                count = records.len(),
                "Unified source answered"
            );
            return FetchOutcome {
                records,
                tier: SourceTier::Unified,
                first_tier_error: None,
            };
        }
        Err(e) => {
            warn!(
                correlation_id = %correlation_id,
                error = %e,
                "Unified source failed, falling back"
            );
            e
        }
    };

    let fallback = match actor.role {
        Role::Admin => fetch_unified(api).await,
        Role::Teacher => fetch_teacher_schedules(api).await,
        Role::Student => try_student_sources(api, correlation_id).await,
    };

    match fallback {
        Ok(records) => {
            info!(
                correlation_id = %correlation_id,
                role = %actor.role,
                count = records.len(),
                "Role fallback answered"
            );
            FetchOutcome {
                records,
                tier: SourceTier::RoleFallback(actor.role),
                first_tier_error: Some(first_tier_error),
            }
        }
        Err(e) => {
            warn!(
                correlation_id = %correlation_id,
                role = %actor.role,
                error = %e,
                "Every schedule source failed"
            );
            FetchOutcome {
                records: Vec::new(),
                tier: SourceTier::Exhausted,
                first_tier_error: Some(first_tier_error),
            }
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
