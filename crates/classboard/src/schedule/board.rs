//! Page-session state: the actor, the class catalog for forms, and the
//! current schedule view.
//!
//! Every read runs the whole pipeline (fetch, normalize, filter) and replaces
//! the view wholesale; mutations never patch it, they re-run the read. Reads
//! are not de-duplicated or cancelled, so when two overlap the one that
//! finishes last decides what is shown.

use super::client::ScheduleApi;
use super::config::BoardConfig;
use super::error::ScheduleError;
use super::mutation::{self, MutationKind, ScheduleForm, SubmitFlags};
use super::normalize::Normalizer;
use super::session::generate_correlation_id;
use super::source::{self, SourceTier};
use super::types::{Actor, CanonicalSchedule, ClassInfo, CleanlinessReport, ScheduleId};
use super::visibility;
use chrono::{DateTime, Local};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

const LOAD_FAILED_BANNER: &str = "Failed to load schedules. Please try again.";

/// What the schedule page shows.
#[derive(Debug, Clone, Default)]
pub struct ScheduleView {
    pub schedules: Vec<CanonicalSchedule>,
    /// Error banner text; only set when the first-tier source failed and
    /// nothing recovered
    pub banner: Option<String>,
    pub tier: Option<SourceTier>,
    pub loaded_at: Option<DateTime<Local>>,
}

impl ScheduleView {
    /// True when the page should show "no schedules" rather than an error.
    pub fn is_empty_state(&self) -> bool {
        self.schedules.is_empty() && self.banner.is_none()
    }
}

pub struct ScheduleBoard {
    api: Arc<dyn ScheduleApi>,
    actor: Actor,
    config: BoardConfig,
    normalizer: Normalizer,
    view: RwLock<ScheduleView>,
    classes: RwLock<Vec<ClassInfo>>,
    flags: SubmitFlags,
}

impl ScheduleBoard {
    pub fn new(api: Arc<dyn ScheduleApi>, actor: Actor, config: BoardConfig) -> Self {
        Self {
            normalizer: Normalizer::new(&config),
            api,
            actor,
            config,
            view: RwLock::new(ScheduleView::default()),
            classes: RwLock::new(Vec::new()),
            flags: SubmitFlags::default(),
        }
    }

    /// Resolves the signed-in user and creates a board for them.
    pub async fn sign_in(
        api: Arc<dyn ScheduleApi>,
        config: BoardConfig,
    ) -> Result<Self, ScheduleError> {
        let actor = api.current_user().await?;
        info!(user = %actor.username, role = %actor.role, "Resolved current user");
        Ok(Self::new(api, actor, config))
    }

    pub fn actor(&self) -> &Actor {
        &self.actor
    }

    /// Initial page load: the class catalog and the schedule list, fetched
    /// concurrently.
    pub async fn load(&self) -> ScheduleView {
        let (_, view) = futures::join!(self.reload_classes(), self.refresh());
        view
    }

    /// Re-fetches the class catalog used by entry forms. A failure leaves
    /// the catalog empty, so every form submit is rejected locally.
    pub async fn reload_classes(&self) -> Vec<ClassInfo> {
        let classes = match visibility::classes_for_actor(self.api.as_ref(), &self.actor).await {
            Ok(classes) => classes,
            Err(e) => {
                warn!(error = %e, "Failed to load class catalog");
                Vec::new()
            }
        };
        *self.classes.write().await = classes.clone();
        classes
    }

    /// Runs the read pipeline and replaces the current view with its result.
    pub async fn refresh(&self) -> ScheduleView {
        let view = self.run_pipeline().await;
        *self.view.write().await = view.clone();
        view
    }

    async fn run_pipeline(&self) -> ScheduleView {
        let correlation_id = generate_correlation_id();
        let start = Instant::now();

        let outcome =
            source::fetch_schedules(self.api.as_ref(), &self.actor, &correlation_id).await;
        let canonical = self.normalizer.normalize_all(&outcome.records);
        let schedules = visibility::filter_for_actor(
            self.api.as_ref(),
            canonical,
            &self.actor,
            self.config.enrollment_failure_policy,
            &correlation_id,
        )
        .await;

        let banner = outcome.banner_error().map(|e| {
            error!(
                correlation_id = %correlation_id,
                error = %e,
                "Schedules could not be loaded"
            );
            LOAD_FAILED_BANNER.to_string()
        });

        info!(
            correlation_id = %correlation_id,
            tier = ?outcome.tier,
            count = schedules.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Schedule pipeline finished"
        );

        ScheduleView {
            schedules,
            banner,
            tier: Some(outcome.tier),
            loaded_at: Some(Local::now()),
        }
    }

    /// Snapshot of the current view.
    pub async fn view(&self) -> ScheduleView {
        self.view.read().await.clone()
    }

    /// Snapshot of the class catalog.
    pub async fn classes(&self) -> Vec<ClassInfo> {
        self.classes.read().await.clone()
    }

    /// Free-text search over the current view. Does not touch the view.
    pub async fn search(&self, query: &str) -> Vec<CanonicalSchedule> {
        let view = self.view.read().await;
        visibility::search(&view.schedules, query)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Finds a schedule in the current view.
    pub async fn find(&self, id: &ScheduleId) -> Option<CanonicalSchedule> {
        self.view
            .read()
            .await
            .schedules
            .iter()
            .find(|s| &s.id == id)
            .cloned()
    }

    pub fn is_submitting(&self, kind: MutationKind) -> bool {
        self.flags.is_loading(kind)
    }

    pub async fn create(&self, form: &ScheduleForm) -> Result<ScheduleView, ScheduleError> {
        let _guard = self.flags.begin(MutationKind::Create)?;
        let input = form.to_input(&self.classes().await, self.config.require_ordered_times)?;

        info!(class_id = input.class_id, room = %input.room_number, "Creating schedule");
        mutation::dispatch_create(self.api.as_ref(), &input).await?;
        Ok(self.refresh().await)
    }

    pub async fn update(
        &self,
        id: &ScheduleId,
        form: &ScheduleForm,
    ) -> Result<ScheduleView, ScheduleError> {
        let _guard = self.flags.begin(MutationKind::Update)?;
        let server_id = mutation::server_id(id)?;
        let input = form.to_input(&self.classes().await, self.config.require_ordered_times)?;

        info!(schedule_id = %server_id, class_id = input.class_id, "Updating schedule");
        mutation::dispatch_update(self.api.as_ref(), server_id, &input).await?;
        Ok(self.refresh().await)
    }

    pub async fn delete(&self, id: &ScheduleId) -> Result<ScheduleView, ScheduleError> {
        let _guard = self.flags.begin(MutationKind::Delete)?;
        let server_id = mutation::server_id(id)?;

        info!(schedule_id = %server_id, "Deleting schedule");
        mutation::dispatch_delete(self.api.as_ref(), server_id).await?;
        Ok(self.refresh().await)
    }

    /// Latest cleanliness report for a schedule's room.
    pub async fn cleanliness(&self, id: &ScheduleId) -> Result<CleanlinessReport, ScheduleError> {
        let server_id = mutation::server_id(id)?;
        self.api.schedule_cleanliness(server_id).await
    }
}
