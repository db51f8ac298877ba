//! Schedule entry forms and mutation dispatch.
//!
//! A form is validated and assembled locally; nothing reaches the API unless
//! it names a loaded class and has both times and a room. Failures from the
//! API are reduced to the server's own message when it sent one.

use super::client::ScheduleApi;
use super::datetime::{self, DecomposedTime};
use super::error::ScheduleError;
use super::types::{CanonicalSchedule, ClassInfo, RoomStatus, ScheduleId, ScheduleInput};
use chrono::{Local, TimeZone};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};

/// Create/update form state.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScheduleForm {
    /// `0` while no class is selected
    pub class_id: i64,
    pub start: Option<DecomposedTime>,
    pub end: Option<DecomposedTime>,
    pub room_number: String,
    pub status: RoomStatus,
}

impl ScheduleForm {
    /// Populates an edit form from a canonical record. Times that never
    /// parsed leave their fields empty.
    pub fn from_schedule(schedule: &CanonicalSchedule) -> Self {
        Self {
            class_id: schedule.class_id,
            start: datetime::decompose_local(&schedule.start_time),
            end: datetime::decompose_local(&schedule.end_time),
            room_number: schedule.room_number.clone(),
            status: schedule.status,
        }
    }

    /// Validates against the loaded classes and assembles the request body,
    /// reading the form's times in local time.
    pub fn to_input(
        &self,
        classes: &[ClassInfo],
        require_ordered_times: bool,
    ) -> Result<ScheduleInput, ScheduleError> {
        self.to_input_in(&Local, classes, require_ordered_times)
    }

    /// Like [`ScheduleForm::to_input`], reading the form's times in `tz`.
    pub fn to_input_in<Tz: TimeZone>(
        &self,
        tz: &Tz,
        classes: &[ClassInfo],
        require_ordered_times: bool,
    ) -> Result<ScheduleInput, ScheduleError> {
        if self.class_id == 0 || !classes.iter().any(|c| c.id == self.class_id) {
            return Err(ScheduleError::validation("Please select a valid class"));
        }
        let start = self
            .start
            .as_ref()
            .ok_or_else(|| ScheduleError::validation("Start time is required"))?;
        let end = self
            .end
            .as_ref()
            .ok_or_else(|| ScheduleError::validation("End time is required"))?;
        let room_number = self.room_number.trim();
        if room_number.is_empty() {
            return Err(ScheduleError::validation("Room number is required"));
        }

        let start_at = datetime::assemble_in(tz, start.date, &start.time, start.period)?;
        let end_at = datetime::assemble_in(tz, end.date, &end.time, end.period)?;
        if require_ordered_times && end_at <= start_at {
            return Err(ScheduleError::validation(
                "End time must be after start time",
            ));
        }

        Ok(ScheduleInput {
            class_id: self.class_id,
            start_time: datetime::to_wire(&start_at),
            end_time: datetime::to_wire(&end_at),
            room_number: room_number.to_string(),
            status: self.status,
        })
    }
}

/// A mutation the board can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    Create,
    Update,
    Delete,
}

impl MutationKind {
    pub fn label(&self) -> &'static str {
        match self {
            MutationKind::Create => "create",
            MutationKind::Update => "update",
            MutationKind::Delete => "delete",
        }
    }

    /// Message used when the server gives no reason.
    pub fn failure_message(&self) -> &'static str {
        match self {
            MutationKind::Create => "Failed to create schedule",
            MutationKind::Update => "Failed to update schedule",
            MutationKind::Delete => "Failed to delete schedule",
        }
    }

    /// Turns an API failure into the error shown on the form.
    pub fn failure(&self, err: ScheduleError) -> ScheduleError {
        if matches!(err, ScheduleError::Validation { .. }) {
            return err;
        }
        ScheduleError::MutationFailed {
            message: err
                .server_detail()
                .unwrap_or(self.failure_message())
                .to_string(),
        }
    }
}

/// Resolves the server id of the record being edited. Records the source
/// sent without an id cannot be changed.
pub fn server_id(id: &ScheduleId) -> Result<&str, ScheduleError> {
    id.server_id().ok_or_else(|| {
        ScheduleError::validation("This schedule has no server id and cannot be changed")
    })
}

pub async fn dispatch_create(
    api: &dyn ScheduleApi,
    input: &ScheduleInput,
) -> Result<(), ScheduleError> {
    api.create_schedule(input)
        .await
        .map(|_| ())
        .map_err(|e| MutationKind::Create.failure(e))
}

pub async fn dispatch_update(
    api: &dyn ScheduleApi,
    id: &str,
    input: &ScheduleInput,
) -> Result<(), ScheduleError> {
    api.update_schedule(id, input)
        .await
        .map(|_| ())
        .map_err(|e| MutationKind::Update.failure(e))
}

pub async fn dispatch_delete(api: &dyn ScheduleApi, id: &str) -> Result<(), ScheduleError> {
    api.delete_schedule(id)
        .await
        .map_err(|e| MutationKind::Delete.failure(e))
}

/// Per-control loading flags. A control cannot submit again while its
/// previous submit is in flight; different controls are independent.
#[derive(Debug, Default)]
pub struct SubmitFlags {
    create: AtomicBool,
    update: AtomicBool,
    delete: AtomicBool,
}

impl SubmitFlags {
    fn flag(&self, kind: MutationKind) -> &AtomicBool {
        match kind {
            MutationKind::Create => &self.create,
            MutationKind::Update => &self.update,
            MutationKind::Delete => &self.delete,
        }
    }

    /// Marks `kind` as loading until the returned guard drops.
    pub fn begin(&self, kind: MutationKind) -> Result<SubmitGuard<'_>, ScheduleError> {
        let flag = self.flag(kind);
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| ScheduleError::OperationInProgress {
                operation: kind.label(),
            })?;
        Ok(SubmitGuard { flag })
    }

    pub fn is_loading(&self, kind: MutationKind) -> bool {
        self.flag(kind).load(Ordering::Acquire)
    }
}

/// Clears its loading flag on drop.
pub struct SubmitGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for SubmitGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}
