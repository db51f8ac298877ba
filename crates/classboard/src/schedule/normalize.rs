//! Record normalization: raw upstream records into [`CanonicalSchedule`].
//!
//! Every canonical field has a fixed, ordered alias list. The first alias
//! that is present (non-null and of a usable type) wins; when none is, the
//! field's fallback applies. Reordering an alias list changes which upstream
//! shape wins for records that carry several aliases, so treat the lists as
//! part of the contract.

use super::config::BoardConfig;
use super::types::{
    CanonicalSchedule, EphemeralId, RawScheduleRecord, RoomStatus, ScheduleId, ScheduleTime,
};
use chrono::{DateTime, Duration, FixedOffset, Local, NaiveDateTime, TimeZone};
use serde_json::Value;

pub const ID_ALIASES: &[&str] = &["id", "schedule_id", "scheduleId", "_id"];
pub const CLASS_ID_ALIASES: &[&str] = &["class_id", "classId", "course_id", "courseId"];
pub const CLASS_NAME_ALIASES: &[&str] = &["class_name", "className", "name", "title"];
pub const CLASS_CODE_ALIASES: &[&str] = &[
    "class_code",
    "classCode",
    "course_code",
    "courseCode",
    "code",
];
pub const TEACHER_NAME_ALIASES: &[&str] = &[
    "teacher_name",
    "teacherName",
    "teacher_full_name",
    "teacher",
    "instructor",
];
pub const ROOM_ALIASES: &[&str] = &["room_number", "roomNumber", "room", "location"];
pub const START_ALIASES: &[&str] = &["start_time", "startTime", "start"];
pub const END_ALIASES: &[&str] = &["end_time", "endTime", "end"];
pub const STATUS_ALIASES: &[&str] = &["status", "room_status", "roomStatus"];

pub const FALLBACK_CLASS_NAME: &str = "Unknown Class";
pub const FALLBACK_CLASS_CODE: &str = "UNKNOWN";
pub const FALLBACK_TEACHER_NAME: &str = "Unknown Teacher";

/// Length of the synthesized session when a record has no end time.
const DEFAULT_SESSION_HOURS: i64 = 2;

/// Naive layouts accepted in addition to RFC 3339. These carry no offset and
/// are read as local time.
const NAIVE_LAYOUTS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Maps raw records onto canonical schedules.
#[derive(Debug, Clone)]
pub struct Normalizer {
    placeholder_room: String,
}

impl Normalizer {
    pub fn new(config: &BoardConfig) -> Self {
        Self {
            placeholder_room: config.placeholder_room.clone(),
        }
    }

    /// Normalizes every record, preserving order.
    pub fn normalize_all(&self, records: &[RawScheduleRecord]) -> Vec<CanonicalSchedule> {
        let now = Local::now().fixed_offset();
        records.iter().map(|raw| self.normalize_at(raw, now)).collect()
    }

    /// Normalizes one record using `now` for the time placeholders.
    pub fn normalize_at(
        &self,
        raw: &RawScheduleRecord,
        now: DateTime<FixedOffset>,
    ) -> CanonicalSchedule {
        let id = first_text(raw, ID_ALIASES)
            .map(ScheduleId::Server)
            .unwrap_or_else(|| ScheduleId::Ephemeral(EphemeralId::generate()));

        let start_time = first_text(raw, START_ALIASES)
            .map(|s| parse_time(&s))
            .unwrap_or(ScheduleTime::At(now));

        let end_time = first_text(raw, END_ALIASES)
            .map(|s| parse_time(&s))
            .unwrap_or_else(|| {
                let base = start_time.instant().unwrap_or(now);
                ScheduleTime::At(base + Duration::hours(DEFAULT_SESSION_HOURS))
            });

        let status = first_text(raw, STATUS_ALIASES)
            .and_then(|s| RoomStatus::parse(&s))
            .unwrap_or_default();

        CanonicalSchedule {
            id,
            class_id: first_integer(raw, CLASS_ID_ALIASES).unwrap_or(0),
            class_name: first_text(raw, CLASS_NAME_ALIASES)
                .unwrap_or_else(|| FALLBACK_CLASS_NAME.to_string()),
            class_code: first_text(raw, CLASS_CODE_ALIASES)
                .unwrap_or_else(|| FALLBACK_CLASS_CODE.to_string()),
            teacher_name: first_text(raw, TEACHER_NAME_ALIASES)
                .unwrap_or_else(|| FALLBACK_TEACHER_NAME.to_string()),
            room_number: first_text(raw, ROOM_ALIASES)
                .unwrap_or_else(|| self.placeholder_room.clone()),
            start_time,
            end_time,
            status,
        }
    }
}

/// First alias holding a string, number, or bool, rendered as text.
fn first_text(raw: &RawScheduleRecord, aliases: &[&str]) -> Option<String> {
    aliases.iter().find_map(|key| match raw.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}

/// First alias holding an integer or an integer-looking string.
fn first_integer(raw: &RawScheduleRecord, aliases: &[&str]) -> Option<i64> {
    aliases.iter().find_map(|key| match raw.get(key)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Parses a timestamp string; anything unrecognized is kept verbatim.
pub fn parse_time(raw: &str) -> ScheduleTime {
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return ScheduleTime::At(at);
    }
    for layout in NAIVE_LAYOUTS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, layout) {
            if let Some(local) = Local.from_local_datetime(&naive).earliest() {
                return ScheduleTime::At(local.fixed_offset());
            }
        }
    }
    ScheduleTime::Unparsed(raw.to_string())
}
