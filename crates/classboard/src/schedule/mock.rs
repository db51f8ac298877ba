//! Scripted [`ScheduleApi`] for unit tests.
//!
//! Each method replays a queue of canned responses. The last response in a
//! queue sticks, so a single `Err` scripts a source that is always down.

use super::client::ScheduleApi;
use super::error::ScheduleError;
use super::types::{Actor, CleanlinessReport, ScheduleInput};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

type Scripted = Result<Value, ScheduleError>;

#[derive(Default)]
pub struct MockApi {
    responses: Mutex<HashMap<&'static str, VecDeque<Scripted>>>,
    calls: Mutex<HashMap<&'static str, usize>>,
    sent: Mutex<Vec<(&'static str, Option<String>, Option<ScheduleInput>)>>,
}

impl MockApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn down() -> ScheduleError {
        ScheduleError::Network {
            message: "connection refused".to_string(),
        }
    }

    fn script(self, method: &'static str, response: Scripted) -> Self {
        self.responses
            .lock()
            .unwrap()
            .entry(method)
            .or_default()
            .push_back(response);
        self
    }

    pub fn live(self, response: Scripted) -> Self {
        self.script("live_schedules", response)
    }

    pub fn teacher_classes(self, response: Scripted) -> Self {
        self.script("teacher_classes", response)
    }

    pub fn student_schedule(self, response: Scripted) -> Self {
        self.script("student_schedule", response)
    }

    pub fn student_classes(self, response: Scripted) -> Self {
        self.script("student_classes", response)
    }

    pub fn all_classes(self, response: Scripted) -> Self {
        self.script("all_classes", response)
    }

    pub fn create(self, response: Scripted) -> Self {
        self.script("create_schedule", response)
    }

    pub fn update(self, response: Scripted) -> Self {
        self.script("update_schedule", response)
    }

    pub fn delete(self, response: Scripted) -> Self {
        self.script("delete_schedule", response)
    }

    /// How many times `method` was called.
    pub fn calls(&self, method: &str) -> usize {
        self.calls.lock().unwrap().get(method).copied().unwrap_or(0)
    }

    /// Mutations sent so far: method, id, body.
    pub fn sent(&self) -> Vec<(&'static str, Option<String>, Option<ScheduleInput>)> {
        self.sent.lock().unwrap().clone()
    }

    fn respond(&self, method: &'static str) -> Scripted {
        *self.calls.lock().unwrap().entry(method).or_default() += 1;
        let mut responses = self.responses.lock().unwrap();
        let queue = responses.entry(method).or_default();
        let response = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        response.unwrap_or_else(|| {
            Err(ScheduleError::SourceUnavailable {
                source_name: "mock",
                message: format!("{method} not scripted"),
            })
        })
    }

    fn record(&self, method: &'static str, id: Option<&str>, input: Option<&ScheduleInput>) {
        self.sent
            .lock()
            .unwrap()
            .push((method, id.map(str::to_string), input.cloned()));
    }
}

#[async_trait]
impl ScheduleApi for MockApi {
    async fn live_schedules(&self) -> Result<Value, ScheduleError> {
        self.respond("live_schedules")
    }

    async fn teacher_classes(&self) -> Result<Value, ScheduleError> {
        self.respond("teacher_classes")
    }

    async fn student_schedule(&self) -> Result<Value, ScheduleError> {
        self.respond("student_schedule")
    }

    async fn student_classes(&self) -> Result<Value, ScheduleError> {
        self.respond("student_classes")
    }

    async fn all_classes(&self) -> Result<Value, ScheduleError> {
        self.respond("all_classes")
    }

    async fn create_schedule(&self, input: &ScheduleInput) -> Result<Value, ScheduleError> {
        self.record("create_schedule", None, Some(input));
        self.respond("create_schedule")
    }

    async fn update_schedule(
        &self,
        id: &str,
        input: &ScheduleInput,
    ) -> Result<Value, ScheduleError> {
        self.record("update_schedule", Some(id), Some(input));
        self.respond("update_schedule")
    }

    async fn delete_schedule(&self, id: &str) -> Result<(), ScheduleError> {
        self.record("delete_schedule", Some(id), None);
        self.respond("delete_schedule").map(|_| ())
    }

    async fn current_user(&self) -> Result<Actor, ScheduleError> {
        Ok(serde_json::from_value(self.respond("current_user")?)?)
    }

    async fn schedule_cleanliness(&self, _id: &str) -> Result<CleanlinessReport, ScheduleError> {
        Ok(serde_json::from_value(self.respond("schedule_cleanliness")?)?)
    }
}
