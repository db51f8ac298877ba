/// Types for schedule data
use chrono::{DateTime, FixedOffset};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Untyped record exactly as an upstream source returned it.
///
/// Field names vary by source; nothing is guaranteed about its shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawScheduleRecord(pub Value);

impl RawScheduleRecord {
    /// Looks up a key, treating JSON `null` the same as a missing key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|v| !v.is_null())
    }
}

impl From<Value> for RawScheduleRecord {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// Role of the signed-in user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Teacher,
    Student,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Teacher => "teacher",
            Role::Student => "student",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The signed-in user as returned by `GET /users/me`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: i64,
    pub username: String,
    pub role: Role,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

/// A class as the API exposes it. Read-only from the pipeline's side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassInfo {
    pub id: i64,
    pub name: String,
    pub code: String,
    #[serde(default)]
    pub teacher_id: Option<i64>,
}

/// Room status of a class session. Closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RoomStatus {
    #[default]
    Occupied,
    Clean,
    #[serde(rename = "Needs Cleaning")]
    NeedsCleaning,
}

impl RoomStatus {
    pub const ALL: [RoomStatus; 3] = [
        RoomStatus::Occupied,
        RoomStatus::Clean,
        RoomStatus::NeedsCleaning,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RoomStatus::Occupied => "Occupied",
            RoomStatus::Clean => "Clean",
            RoomStatus::NeedsCleaning => "Needs Cleaning",
        }
    }

    /// Parses the wire label. Case and separators are not significant, so
    /// `needs_cleaning` and `Needs Cleaning` are the same status.
    pub fn parse(label: &str) -> Option<Self> {
        let folded: String = label
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match folded.as_str() {
            "occupied" => Some(RoomStatus::Occupied),
            "clean" => Some(RoomStatus::Clean),
            "needscleaning" => Some(RoomStatus::NeedsCleaning),
            _ => None,
        }
    }
}

impl fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifier synthesized for a record that arrived without one.
///
/// Only meaningful inside the current session; never sent to the API and
/// never compared across reloads.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct EphemeralId(String);

impl EphemeralId {
    pub fn generate() -> Self {
        let random: u64 = rand::thread_rng().gen();
        Self(format!("tmp-{random:016x}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Identifier of a canonical schedule.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum ScheduleId {
    /// Identifier assigned by the server; safe to use in mutations.
    Server(String),
    /// Placeholder for a record the source sent without an id.
    Ephemeral(EphemeralId),
}

impl ScheduleId {
    /// The server identifier, if this record has one.
    pub fn server_id(&self) -> Option<&str> {
        match self {
            ScheduleId::Server(id) => Some(id),
            ScheduleId::Ephemeral(_) => None,
        }
    }

    pub fn is_ephemeral(&self) -> bool {
        matches!(self, ScheduleId::Ephemeral(_))
    }
}

impl fmt::Display for ScheduleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduleId::Server(id) => f.write_str(id),
            ScheduleId::Ephemeral(id) => f.write_str(id.as_str()),
        }
    }
}

/// A session timestamp.
///
/// Strings that do not parse are carried through untouched rather than
/// rejected; anything that needs an instant has to cope with `Unparsed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ScheduleTime {
    At(DateTime<FixedOffset>),
    Unparsed(String),
}

impl ScheduleTime {
    pub fn instant(&self) -> Option<DateTime<FixedOffset>> {
        match self {
            ScheduleTime::At(at) => Some(*at),
            ScheduleTime::Unparsed(_) => None,
        }
    }
}

impl fmt::Display for ScheduleTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduleTime::At(at) => write!(f, "{}", at.format("%Y-%m-%d %I:%M %p")),
            ScheduleTime::Unparsed(raw) => f.write_str(raw),
        }
    }
}

/// The fully-populated internal representation of one class session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalSchedule {
    pub id: ScheduleId,
    /// `0` means the class could not be resolved.
    pub class_id: i64,
    pub class_name: String,
    pub class_code: String,
    pub teacher_name: String,
    pub room_number: String,
    pub start_time: ScheduleTime,
    pub end_time: ScheduleTime,
    pub status: RoomStatus,
}

/// Body of `POST /schedules/` and `PUT /schedules/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleInput {
    pub class_id: i64,
    /// ISO-8601, UTC
    pub start_time: String,
    /// ISO-8601, UTC
    pub end_time: String,
    pub room_number: String,
    pub status: RoomStatus,
}

/// Latest cleanliness information for a schedule's room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanlinessReport {
    pub schedule_id: i64,
    pub class_id: i64,
    pub cleanliness_status: String,
    pub has_report: bool,
    #[serde(default)]
    pub latest_report: Option<Value>,
    #[serde(default)]
    pub message: Option<String>,
}

impl CleanlinessReport {
    /// The reported status as a typed value, if it is one we know.
    pub fn status(&self) -> Option<RoomStatus> {
        RoomStatus::parse(&self.cleanliness_status)
    }
}
