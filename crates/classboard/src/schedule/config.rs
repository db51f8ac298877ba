/// Configuration for the schedule client and pipeline policy
use super::error::ScheduleError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Default API location for a locally running backend.
const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// What a student sees when their enrollment lookup fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentFailurePolicy {
    /// Leave the unified list unfiltered.
    #[default]
    ShowUnfiltered,
    /// Show no schedules at all.
    ShowNothing,
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    /// Root of the REST API
    pub base_url: String,
    /// User agent string
    pub user_agent: String,
    /// TCP connect timeout. Unset leaves connects to the OS.
    pub connect_timeout_secs: Option<u64>,
    /// Whole-request timeout. Unset means requests may hang indefinitely.
    pub request_timeout_secs: Option<u64>,
    pub enrollment_failure_policy: EnrollmentFailurePolicy,
    /// Reject end <= start locally instead of leaving it to the server
    pub require_ordered_times: bool,
    /// Room shown when a record carries none
    pub placeholder_room: String,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: concat!("classboard/", env!("CARGO_PKG_VERSION")).to_string(),
            connect_timeout_secs: None,
            request_timeout_secs: None,
            enrollment_failure_policy: EnrollmentFailurePolicy::default(),
            require_ordered_times: false,
            placeholder_room: "TBA".to_string(),
        }
    }
}

impl BoardConfig {
    /// Loads configuration from a JSON file. Missing keys take their defaults.
    ///
    /// # Arguments
    /// * `path` - Path to the JSON config file
    ///
    /// # Returns
    /// * `Ok(BoardConfig)` - Loaded configuration
    /// * `Err` - If the file can't be read or parsed
    pub fn load_from_file(path: &Path) -> Result<Self, ScheduleError> {
        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| ScheduleError::Config {
            message: format!("{}: {}", path.display(), e),
        })
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_secs.map(Duration::from_secs)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}
