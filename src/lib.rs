use anyhow::{bail, Context, Result};
// Use anyhow::Result as standard Result for service layer
use chrono::{DateTime, Local, NaiveDate, Utc};
use rusqlite::Connection;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

// --- Declare modules ---
pub mod achievements;
pub mod ai_client;
pub mod auth;
pub mod billing;
mod config;
pub mod custom_exercises;
pub mod db;
pub mod fitness;
pub mod goals;
pub mod history;
pub mod insights;
pub mod library;
pub mod measurements;
pub mod profile;
pub mod records;
pub mod session;
pub mod storage;
pub mod templates;
pub mod time_format;
pub mod units;

// --- Expose public types ---
pub use config::{
    get_config_path as get_config_path_util, load as load_config_util, parse_color,
    save as save_config_util, AiConfig, BillingConfig, Config, ConfigError, PlateSet,
    StandardColor, Theme, Units,
};

pub use db::{get_data_dir as get_data_dir_util, get_db_path as get_db_path_util, DbError};

use achievements::{Achievement, AchievementWithProgress};
use ai_client::TextGenerator;
use auth::{AuthError, AuthUser, IdentityProvider, SessionEvent, SqliteIdentity};
use billing::{AppliedEvent, PaymentGateway, SubscriptionInfo, WebhookVerifier};
use custom_exercises::{CustomExercise, NewCustomExercise};
use fitness::PlateInfo;
use goals::{GoalUpdate, NewGoal, UserGoal};
use history::{SavedWorkout, WorkoutHistory};
use insights::{GeneratedWorkout, Insight, RecentWorkout, WorkoutRequest};
use library::{find_exercise, find_exercise_by_name, slugify, ExerciseDefinition};
use measurements::{BodyMeasurement, NewMeasurement};
use profile::{Profile, ProfileUpdate};
use records::{PersonalRecord, WorkoutStats};
use session::{ActiveWorkout, Clock, SetUpdate, SystemClock, WorkoutSession, RPE_RANGE};
use storage::JsonStore;
use templates::{TemplateExercise, TemplateLibrary, TemplateUpdate, WorkoutTemplate};

/// How many recent workouts are offered to the workout generator when the
/// request carries none.
const RECENT_WORKOUTS_FOR_AI: usize = 5;

/// Result of completing a set in the active workout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SetCompletion {
    pub exercise_index: usize,
    pub set_index: usize,
    pub is_pr: bool,
}

/// What happened when the active workout was finished.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinishSummary {
    pub workout: SavedWorkout,
    /// Whether the session also reached the database.
    pub persisted: bool,
    pub new_achievements: Vec<Achievement>,
}

pub struct AppService {
    pub config: Config,
    pub conn: Connection,
    pub db_path: PathBuf,
    pub config_path: PathBuf,
    pub history: WorkoutHistory,
    pub templates: TemplateLibrary,
    pub workout: ActiveWorkout<Box<dyn Clock>>,
    pub user: Option<AuthUser>,
    pub profile: Option<Profile>,
}

impl AppService {
    /// Initializes the application service and restores a saved sign-in.
    /// # Errors
    /// Returns `anyhow::Error` if config/db path determination, loading, or initialization fails.
    pub fn initialize() -> Result<Self> {
        let config_path =
            config::get_config_path().context("Failed to determine configuration file path")?;
        let config = config::load(&config_path)
            .context(format!("Failed to load config from {config_path:?}"))?;

        let data_dir = db::get_data_dir().context("Failed to determine data directory")?;
        let db_path = db::get_db_path().context("Failed to determine database path")?;
        let conn = db::open_db(&db_path)
            .with_context(|| format!("Failed to open database at {db_path:?}"))?;

        db::init_db(&conn).context("Failed to initialize database schema")?;

        let history = WorkoutHistory::load(JsonStore::new(&data_dir));
        let templates = TemplateLibrary::load(JsonStore::new(&data_dir))
            .context("Failed to load workout templates")?;

        let mut service = Self {
            config,
            conn,
            db_path,
            config_path,
            history,
            templates,
            workout: ActiveWorkout::with_clock(Box::new(SystemClock)),
            user: None,
            profile: None,
        };
        service.restore_session()?;
        Ok(service)
    }

    /// Current instant according to the workout clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.workout.clock().now()
    }

    fn today(&self) -> NaiveDate {
        self.now().with_timezone(&Local).date_naive()
    }

    pub fn get_config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn get_db_path(&self) -> &Path {
        &self.db_path
    }

    /// Saves the current configuration state.
    /// # Errors
    /// Returns `ConfigError` if saving fails.
    pub fn save_config(&self) -> Result<(), ConfigError> {
        config::save(&self.config_path, &self.config)
    }

    /// Display units: the signed-in profile's preference, else the config.
    pub fn units(&self) -> Units {
        self.profile
            .as_ref()
            .map_or(self.config.units, |p| p.unit_system)
    }

    /// Sets the measurement units in the config and, when signed in, on the profile.
    /// # Errors
    /// Returns an error if saving the config or updating the profile fails.
    pub fn set_units(&mut self, units: Units) -> Result<()> {
        self.config.units = units;
        self.save_config()?;
        if self.user.is_some() {
            self.update_profile(&ProfileUpdate {
                unit_system: Some(units),
                ..ProfileUpdate::default()
            })?;
        }
        Ok(())
    }

    pub fn set_bar_weight(&mut self, weight_kg: f64) -> Result<(), ConfigError> {
        self.config.set_bar_weight(weight_kg)?;
        self.save_config()
    }

    pub fn set_default_rest_seconds(&mut self, seconds: u32) -> Result<(), ConfigError> {
        self.config.set_default_rest_seconds(seconds)?;
        self.save_config()
    }

    // --- Identity ---

    /// Resolves an `Authorization` header value to a user.
    /// # Errors
    /// `AuthError::Unauthorized` for a missing, malformed, unknown or expired token.
    pub fn authenticate(&self, authorization: Option<&str>) -> Result<AuthUser, AuthError> {
        let token = auth::bearer_token(authorization)?;
        SqliteIdentity::new(&self.conn).user_for_token(token, self.now())
    }

    /// Signs in with the saved token, dropping it if it no longer validates.
    fn restore_session(&mut self) -> Result<()> {
        let Some(token) = self.config.session_token.clone() else {
            return Ok(());
        };
        match SqliteIdentity::new(&self.conn).user_for_token(&token, self.now()) {
            Ok(user) => self.handle_session_event(SessionEvent::SignedIn(user)),
            Err(AuthError::Unauthorized(msg)) => {
                warn!("Saved session is no longer valid ({}); signing out", msg);
                self.config.session_token = None;
                self.save_config()?;
                Ok(())
            }
            Err(e) => Err(e).context("Failed to restore saved session"),
        }
    }

    /// Loads or clears the cached profile for an identity change.
    pub fn handle_session_event(&mut self, event: SessionEvent) -> Result<()> {
        match event {
            SessionEvent::SignedIn(user) => {
                let profile = profile::get_profile(&self.conn, &user.id)?
                    .ok_or_else(|| DbError::ProfileNotFound(user.id.clone()))?;
                debug!("Signed in as {}", user.username);
                self.workout.set_user(Some(user.id.clone()));
                self.profile = Some(profile);
                self.user = Some(user);
            }
            SessionEvent::SignedOut => {
                debug!("Signed out");
                self.workout.set_user(None);
                self.profile = None;
                self.user = None;
            }
        }
        Ok(())
    }

    /// Signs in as `username`, creating the profile on first use, and saves
    /// the issued token to the config.
    pub fn sign_in(&mut self, username: &str, display_name: Option<&str>) -> Result<&Profile> {
        let username = username.trim();
        if username.is_empty() {
            bail!("Username cannot be empty.");
        }
        let now = self.now();
        let profile = match profile::get_profile_by_username(&self.conn, username)? {
            Some(p) => p,
            None => profile::create_profile(&self.conn, username, display_name, now)
                .with_context(|| format!("Failed to create profile '{username}'"))?,
        };
        let identity = SqliteIdentity::new(&self.conn);
        let purged = identity.purge_expired(now)?;
        if purged > 0 {
            debug!("Purged {} expired session tokens", purged);
        }
        let token = identity.issue_token(&profile.id, now)?;
        self.config.session_token = Some(token);
        self.save_config()?;

        let user = AuthUser {
            id: profile.id.clone(),
            username: profile.username.clone(),
        };
        self.handle_session_event(SessionEvent::SignedIn(user))?;
        info!("Signed in as '{}'", username);
        self.profile
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("Profile missing after sign-in"))
    }

    pub fn sign_out(&mut self) -> Result<()> {
        if let Some(token) = self.config.session_token.take() {
            SqliteIdentity::new(&self.conn).revoke(&token)?;
            self.save_config()?;
        }
        self.handle_session_event(SessionEvent::SignedOut)
    }

    /// The signed-in user.
    /// # Errors
    /// `AuthError::Unauthorized` when nobody is signed in.
    pub fn require_user(&self) -> Result<&AuthUser, AuthError> {
        self.user.as_ref().ok_or_else(AuthError::missing)
    }

    pub fn whoami(&self) -> Option<&Profile> {
        self.profile.as_ref()
    }

    /// Re-reads the signed-in profile from the database.
    pub fn reload_profile(&mut self) -> Result<()> {
        if let Some(user) = &self.user {
            self.profile = profile::get_profile(&self.conn, &user.id)?;
        }
        Ok(())
    }

    pub fn update_profile(&mut self, update: &ProfileUpdate) -> Result<&Profile> {
        let user_id = self.require_user()?.id.clone();
        let profile = profile::update_profile(&self.conn, &user_id, update, self.now())
            .context("Failed to update profile")?;
        let profile: &Profile = self.profile.insert(profile);
        Ok(profile)
    }

    // --- Exercises ---

    /// Resolves an id or name against the built-in library, then the user's
    /// custom exercises. Unknown names become ad-hoc strength exercises.
    pub fn resolve_exercise(&self, identifier: &str) -> Result<ExerciseDefinition> {
        let trimmed = identifier.trim();
        if trimmed.is_empty() {
            bail!("Exercise identifier cannot be empty.");
        }
        if let Some(def) = find_exercise(trimmed)
            .or_else(|| find_exercise_by_name(trimmed))
            .or_else(|| find_exercise(&slugify(trimmed)))
        {
            return Ok(def.clone());
        }
        if let Some(user) = &self.user {
            let custom = custom_exercises::list_custom_exercises(&self.conn, &user.id)?;
            if let Some(found) = custom
                .iter()
                .find(|c| c.id == trimmed || c.name.eq_ignore_ascii_case(trimmed))
            {
                return Ok(found.to_definition());
            }
        }
        debug!("'{}' is not a known exercise; using an ad-hoc definition", trimmed);
        Ok(ExerciseDefinition::ad_hoc(trimmed))
    }

    pub fn add_custom_exercise(&self, input: &NewCustomExercise) -> Result<CustomExercise> {
        let user = self.require_user()?;
        if input.name.trim().is_empty() {
            bail!("Exercise name cannot be empty.");
        }
        custom_exercises::add_custom_exercise(&self.conn, &user.id, input, self.now())
            .context("Failed to add custom exercise")
    }

    pub fn list_custom_exercises(&self) -> Result<Vec<CustomExercise>> {
        let user = self.require_user()?;
        Ok(custom_exercises::list_custom_exercises(&self.conn, &user.id)?)
    }

    pub fn delete_custom_exercise(&self, id: &str) -> Result<()> {
        let user = self.require_user()?;
        Ok(custom_exercises::delete_custom_exercise(&self.conn, &user.id, id)?)
    }

    // --- Active workout ---

    pub fn start_workout(&mut self, name: &str) -> WorkoutSession {
        let user_id = self.user.as_ref().map(|u| u.id.clone());
        let session = self.workout.start(name).clone();
        self.workout.set_user(user_id.clone());
        WorkoutSession { user_id, ..session }
    }

    /// Starts a workout pre-filled with the template's exercises and
    /// uncompleted sets carrying the template defaults.
    pub fn start_workout_from_template(&mut self, template_id: &str) -> Result<WorkoutSession> {
        let template = self
            .templates
            .get(template_id)
            .cloned()
            .with_context(|| format!("Template '{template_id}' not found"))?;

        let mut definitions = Vec::with_capacity(template.exercises.len());
        for exercise in &template.exercises {
            definitions.push(self.resolve_exercise(&exercise.name)?);
        }

        let user_id = self.user.as_ref().map(|u| u.id.clone());
        let session = self
            .workout
            .start_with_template(&template.name, Some(template.id.clone()))
            .clone();
        self.workout.set_user(user_id.clone());

        for (exercise, definition) in template.exercises.iter().zip(definitions) {
            let Some(exercise_index) = self.workout.add_exercise(definition) else {
                continue;
            };
            for _ in 0..exercise.sets {
                if let Some(set_index) = self.workout.add_set(exercise_index) {
                    self.workout.update_set(
                        exercise_index,
                        set_index,
                        SetUpdate {
                            reps: exercise.default_reps,
                            weight_kg: exercise.default_weight,
                            ..SetUpdate::default()
                        },
                    );
                }
            }
        }
        self.templates
            .mark_used(template_id, self.now())
            .context("Failed to update template usage")?;
        Ok(WorkoutSession { user_id, ..session })
    }

    /// Adds an exercise by id or name to the active workout.
    pub fn add_exercise(&mut self, identifier: &str) -> Result<usize> {
        if !self.workout.is_active() {
            bail!("No workout in progress.");
        }
        let definition = self.resolve_exercise(identifier)?;
        self.workout
            .add_exercise(definition)
            .context("No workout in progress.")
    }

    /// Completes a set and flags it as a PR when it beats both the history
    /// record and earlier completed sets of the same exercise in this workout.
    /// A set with nothing to compare against is never a PR.
    pub fn complete_set(
        &mut self,
        exercise_index: usize,
        set_index: usize,
        update: SetUpdate,
    ) -> Result<SetCompletion> {
        if let Some(rpe) = update.rpe {
            if !RPE_RANGE.contains(&rpe) {
                bail!("RPE must be between 1 and 10, got {}.", rpe);
            }
        }
        if !self.workout.complete_set(exercise_index, set_index, update) {
            bail!("No set {} for exercise {} in the active workout.", set_index + 1, exercise_index + 1);
        }
        let is_pr = self.is_live_pr(exercise_index, set_index);
        self.workout.update_set(
            exercise_index,
            set_index,
            SetUpdate {
                is_pr: Some(is_pr),
                ..SetUpdate::default()
            },
        );
        if is_pr {
            info!("New personal record on exercise {}", exercise_index + 1);
        }
        Ok(SetCompletion {
            exercise_index,
            set_index,
            is_pr,
        })
    }

    fn is_live_pr(&self, exercise_index: usize, set_index: usize) -> bool {
        let Some(log) = self.workout.exercise_logs().get(exercise_index) else {
            return false;
        };
        let Some(set) = log.sets.get(set_index) else {
            return false;
        };
        let (Some(weight), Some(reps)) = (set.weight_kg, set.reps) else {
            return false;
        };
        if weight <= 0.0 || reps <= 0 {
            return false;
        }

        let mut best = records::get_exercise_pr(self.history.workouts(), &log.exercise.name);
        let session_id = self.workout.session().map(|s| s.id.clone()).unwrap_or_default();
        for (i, other) in log.sets.iter().enumerate() {
            if i == set_index || !other.is_completed() {
                continue;
            }
            let (Some(w), Some(r)) = (other.weight_kg, other.reps) else {
                continue;
            };
            if w <= 0.0 || r <= 0 {
                continue;
            }
            let replace = best
                .as_ref()
                .map_or(true, |current| records::beats_record(current, w, r));
            if replace {
                best = Some(PersonalRecord {
                    exercise_name: log.exercise.name.clone(),
                    weight: w,
                    reps: r,
                    score: w * r as f64,
                    date: other.completed_at.unwrap_or_else(|| self.now()),
                    workout_id: session_id.clone(),
                    estimated_1rm: fitness::calculate_1rm(w, r),
                });
            }
        }
        best.is_some_and(|record| records::beats_record(&record, weight, reps))
    }

    /// Starts the rest timer, defaulting to the configured length.
    pub fn start_rest_timer(&mut self, seconds: Option<u32>) -> u32 {
        let seconds = seconds.unwrap_or(self.config.default_rest_seconds);
        self.workout.start_rest_timer(seconds);
        seconds
    }

    /// Ends the active workout. It is written to local history first; a
    /// database failure afterwards is logged and reported via `persisted`.
    pub fn finish_workout(&mut self) -> Result<Option<FinishSummary>> {
        // The session stays active until the local write succeeds, so a failed
        // save can be retried.
        let Some(finished) = self.workout.snapshot_finished() else {
            return Ok(None);
        };
        let saved = SavedWorkout::from_finished(&finished);
        self.history
            .add(saved.clone())
            .context("Failed to save workout to local history")?;
        self.workout.end();

        let mut persisted = false;
        let mut new_achievements = Vec::new();
        if let Some(user) = &self.user {
            match db::save_finished_workout(&mut self.conn, &finished) {
                Ok(()) => persisted = true,
                Err(e) => warn!("Workout {} kept locally only: {}", saved.id, e),
            }
            match achievements::evaluate(&self.conn, &user.id, self.history.workouts(), self.now()) {
                Ok(unlocked) => new_achievements = unlocked,
                Err(e) => warn!("Failed to evaluate achievements: {}", e),
            }
        }
        Ok(Some(FinishSummary {
            workout: saved,
            persisted,
            new_achievements,
        }))
    }

    pub fn cancel_workout(&mut self) {
        self.workout.cancel();
    }

    // --- History ---

    pub fn workouts(&self) -> &[SavedWorkout] {
        self.history.workouts()
    }

    pub fn get_workout(&self, id: &str) -> Option<&SavedWorkout> {
        self.history.get(id)
    }

    pub fn delete_workout(&mut self, id: &str) -> Result<bool> {
        let deleted = self.history.delete(id).context("Failed to update local history")?;
        if deleted && self.user.is_some() {
            match db::delete_session(&self.conn, id) {
                Ok(()) => {}
                Err(DbError::SessionNotFound(_)) => {}
                Err(e) => warn!("Failed to delete session {} from the database: {}", id, e),
            }
        }
        Ok(deleted)
    }

    pub fn rate_workout(&mut self, id: &str, rating: u8) -> Result<bool> {
        if !(1..=5).contains(&rating) {
            bail!("Rating must be between 1 and 5.");
        }
        self.history
            .update_rating(id, rating)
            .context("Failed to update local history")
    }

    /// Sessions stored in the database for the signed-in user.
    pub fn remote_sessions(&self, limit: Option<u32>) -> Result<Vec<WorkoutSession>> {
        let user = self.require_user()?;
        Ok(db::list_sessions(&self.conn, &user.id, limit)?)
    }

    // --- Records & stats ---

    pub fn personal_records(&self) -> Vec<PersonalRecord> {
        records::calculate_all_prs(self.history.workouts())
    }

    pub fn prs_this_month(&self) -> Vec<PersonalRecord> {
        records::prs_since_month_start(self.history.workouts(), self.today())
    }

    pub fn exercise_pr(&self, name: &str) -> Option<PersonalRecord> {
        records::get_exercise_pr(self.history.workouts(), name)
    }

    pub fn day_streak(&self) -> u32 {
        records::calculate_day_streak_on(self.history.workouts(), self.today())
    }

    pub fn stats(&self) -> WorkoutStats {
        records::workout_stats(self.history.workouts(), self.today())
    }

    /// Plates per side for `target_kg` on the configured bar and plate set.
    pub fn plates(&self, target_kg: f64) -> Vec<PlateInfo> {
        fitness::calculate_plates_needed(
            target_kg,
            self.config.bar_weight_kg,
            self.config.plate_set.plates(),
        )
    }

    // --- Templates ---

    pub fn list_templates(&self) -> &[WorkoutTemplate] {
        self.templates.templates()
    }

    pub fn create_template(
        &mut self,
        name: &str,
        exercises: Vec<TemplateExercise>,
    ) -> Result<WorkoutTemplate> {
        if name.trim().is_empty() {
            bail!("Template name cannot be empty.");
        }
        let now = self.now();
        Ok(self
            .templates
            .add(name, exercises, now)
            .context("Failed to save template")?
            .clone())
    }

    /// Builds a template from a logged workout, keeping each exercise's last
    /// completed weight and reps as defaults.
    pub fn template_from_workout(&mut self, workout_id: &str, name: &str) -> Result<WorkoutTemplate> {
        let workout = self
            .history
            .get(workout_id)
            .with_context(|| format!("Workout '{workout_id}' not found"))?;
        let exercises = workout
            .exercises
            .iter()
            .map(|e| {
                let last = e.sets.iter().rev().find(|s| s.completed);
                TemplateExercise {
                    name: e.name.clone(),
                    sets: e.sets.len().max(1) as u32,
                    default_weight: last.and_then(|s| s.weight),
                    default_reps: last.and_then(|s| s.reps),
                }
            })
            .collect();
        self.create_template(name, exercises)
    }

    pub fn update_template(&mut self, id: &str, update: TemplateUpdate) -> Result<bool> {
        self.templates
            .update(id, update)
            .context("Failed to save template")
    }

    pub fn delete_template(&mut self, id: &str) -> Result<bool> {
        self.templates.delete(id).context("Failed to save templates")
    }

    // --- Goals ---

    pub fn create_goal(&self, goal: &NewGoal) -> Result<UserGoal> {
        let user = self.require_user()?;
        if goal.title.trim().is_empty() {
            bail!("Goal title cannot be empty.");
        }
        goals::create_goal(&self.conn, &user.id, goal, self.now()).context("Failed to create goal")
    }

    pub fn list_goals(&self) -> Result<Vec<UserGoal>> {
        let user = self.require_user()?;
        Ok(goals::list_goals(&self.conn, &user.id)?)
    }

    pub fn update_goal(&self, id: &str, update: &GoalUpdate) -> Result<UserGoal> {
        let user = self.require_user()?;
        Ok(goals::update_goal(&self.conn, &user.id, id, update, self.now())?)
    }

    pub fn update_goal_progress(&self, id: &str, current_value: f64) -> Result<UserGoal> {
        let user = self.require_user()?;
        Ok(goals::update_goal_progress(&self.conn, &user.id, id, current_value, self.now())?)
    }

    pub fn delete_goal(&self, id: &str) -> Result<()> {
        let user = self.require_user()?;
        Ok(goals::delete_goal(&self.conn, &user.id, id)?)
    }

    // --- Measurements ---

    pub fn add_measurement(&self, input: &NewMeasurement) -> Result<BodyMeasurement> {
        let user = self.require_user()?;
        measurements::add_measurement(&self.conn, &user.id, input, self.now())
            .context("Failed to log measurement")
    }

    pub fn list_measurements(&self) -> Result<Vec<BodyMeasurement>> {
        let user = self.require_user()?;
        Ok(measurements::list_measurements(&self.conn, &user.id)?)
    }

    pub fn delete_measurement(&self, id: &str) -> Result<()> {
        let user = self.require_user()?;
        Ok(measurements::delete_measurement(&self.conn, &user.id, id)?)
    }

    // --- Achievements ---

    /// The catalogue with the signed-in user's progress (all locked when signed out).
    pub fn achievements(&self) -> Result<Vec<AchievementWithProgress>> {
        let user_id = self.user.as_ref().map(|u| u.id.as_str());
        Ok(achievements::list_with_progress(&self.conn, user_id)?)
    }

    /// Re-evaluates progress against the full history.
    pub fn refresh_achievements(&self) -> Result<Vec<Achievement>> {
        let user = self.require_user()?;
        Ok(achievements::evaluate(
            &self.conn,
            &user.id,
            self.history.workouts(),
            self.now(),
        )?)
    }

    // --- Subscription ---

    pub fn subscription_info(&mut self) -> Result<SubscriptionInfo> {
        self.require_user()?;
        self.reload_profile()?;
        Ok(billing::subscription_info(self.profile.as_ref(), self.now()))
    }

    /// Checks that a premium user is signed in.
    /// # Errors
    /// `AuthError::Unauthorized` when signed out, `AuthError::UpgradeRequired`
    /// when not premium.
    pub fn require_premium(&mut self) -> Result<(), AuthError> {
        self.require_user()?;
        if let Some(user) = &self.user {
            self.profile = profile::get_profile(&self.conn, &user.id)?;
        }
        let info = billing::subscription_info(self.profile.as_ref(), self.now());
        billing::require_premium(&info)
    }

    pub fn create_checkout(&mut self, gateway: &dyn PaymentGateway) -> Result<String> {
        self.require_user()?;
        self.reload_profile()?;
        let profile = self.profile.as_ref().context("Profile not loaded")?;
        let url = billing::create_checkout(&self.conn, gateway, &self.config.billing, profile)
            .context("Failed to create checkout session")?;
        self.reload_profile()?;
        Ok(url)
    }

    pub fn create_portal(&mut self, gateway: &dyn PaymentGateway) -> Result<String> {
        self.require_user()?;
        self.reload_profile()?;
        let profile = self.profile.as_ref().context("Profile not loaded")?;
        Ok(billing::create_portal(gateway, &self.config.billing, profile)?)
    }

    /// Verifies and applies a payment webhook delivery.
    pub fn handle_webhook(
        &mut self,
        gateway: &dyn PaymentGateway,
        signature: Option<&str>,
        body: &str,
    ) -> Result<Option<AppliedEvent>> {
        let verifier = WebhookVerifier::from_config(&self.config.billing)?;
        let event = verifier.verify(signature, body, self.now())?;
        let applied = billing::handle_webhook_event(&self.conn, gateway, &event, self.now())?;
        if applied
            .as_ref()
            .is_some_and(|a| self.user.as_ref().is_some_and(|u| u.id == a.user_id))
        {
            self.reload_profile()?;
        }
        Ok(applied)
    }

    pub fn subscription_events(&self) -> Result<Vec<billing::SubscriptionEvent>> {
        let user = self.require_user()?;
        Ok(billing::list_subscription_events(&self.conn, &user.id)?)
    }

    // --- AI ---

    /// Generates a workout plan. Premium only. Recent history is supplied
    /// when the request has none.
    pub fn generate_workout(
        &mut self,
        generator: &dyn TextGenerator,
        mut request: WorkoutRequest,
    ) -> Result<GeneratedWorkout> {
        self.require_premium()?;
        if request.recent_workouts.is_empty() {
            request.recent_workouts = self
                .history
                .workouts()
                .iter()
                .take(RECENT_WORKOUTS_FOR_AI)
                .map(RecentWorkout::from_saved)
                .collect();
        }
        Ok(insights::generate_workout(
            generator,
            &request,
            self.config.ai.workout_max_tokens,
        )?)
    }

    /// Generates insights over the local history. Premium only.
    pub fn generate_insights(&mut self, generator: &dyn TextGenerator) -> Result<Vec<Insight>> {
        self.require_premium()?;
        Ok(insights::generate_insights(
            generator,
            self.history.workouts(),
            self.now(),
            self.config.ai.insights_max_tokens,
        )?)
    }
}
