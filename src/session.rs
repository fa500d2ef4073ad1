// src/session.rs
//! The in-progress workout: exercises, sets, pause accounting and the rest timer.
//!
//! Time-derived values (elapsed seconds, rest remaining) are computed on read
//! from stored instants and a [`Clock`]; nothing ticks in the background.
use crate::library::ExerciseDefinition;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::ops::RangeInclusive;
use std::rc::Rc;
use strum_macros::{Display, EnumString};
use tracing::{debug, warn};
use uuid::Uuid;

/// Rate of perceived exertion accepted for a set.
pub const RPE_RANGE: RangeInclusive<f64> = 1.0..=10.0;

/// Source of "now" for everything time-derived in the session.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to. Clones share the same instant.
#[derive(Debug, Clone)]
pub struct ManualClock(Rc<Cell<DateTime<Utc>>>);

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self(Rc::new(Cell::new(start)))
    }

    pub fn set(&self, instant: DateTime<Utc>) {
        self.0.set(instant);
    }

    pub fn advance(&self, by: Duration) {
        self.0.set(self.0.get() + by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.0.get()
    }
}

impl Clock for Box<dyn Clock> {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WorkoutStatus {
    InProgress,
    Completed,
    Cancelled,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum SetType {
    Warmup,
    #[default]
    Working,
    Dropset,
    Failure,
    Amrap,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutSession {
    pub id: String,
    pub user_id: Option<String>,
    pub template_id: Option<String>,
    pub name: String,
    pub status: WorkoutStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_sec: Option<u64>,
    pub notes: Option<String>,
    pub rating: Option<u8>,
    pub perceived_exertion: Option<u8>,
    pub calories_burned: Option<u32>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSet {
    /// 1-based and contiguous within its exercise.
    pub set_number: u32,
    pub reps: Option<i64>,
    pub weight_kg: Option<f64>,
    pub rpe: Option<f64>,
    pub set_type: SetType,
    /// `Some` means the set is done.
    pub completed_at: Option<DateTime<Utc>>,
    pub is_pr: bool,
    pub notes: Option<String>,
}

impl SessionSet {
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }

    /// `reps x weight` when the set is completed and both values are positive.
    #[must_use]
    pub fn volume(&self) -> Option<f64> {
        match (self.completed_at, self.reps, self.weight_kg) {
            (Some(_), Some(reps), Some(weight)) if reps > 0 && weight > 0.0 => {
                Some(reps as f64 * weight)
            }
            _ => None,
        }
    }

    fn apply(&mut self, update: SetUpdate) {
        if update.reps.is_some() {
            self.reps = update.reps;
        }
        if update.weight_kg.is_some() {
            self.weight_kg = update.weight_kg;
        }
        if update.rpe.is_some() {
            self.rpe = update.rpe;
        }
        if let Some(set_type) = update.set_type {
            self.set_type = set_type;
        }
        if let Some(is_pr) = update.is_pr {
            self.is_pr = is_pr;
        }
        if update.notes.is_some() {
            self.notes = update.notes;
        }
    }
}

/// Fields to merge into a set. `None` leaves the existing value alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SetUpdate {
    pub reps: Option<i64>,
    pub weight_kg: Option<f64>,
    pub rpe: Option<f64>,
    pub set_type: Option<SetType>,
    pub is_pr: Option<bool>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CardioLog {
    pub duration_sec: Option<u64>,
    pub distance_km: Option<f64>,
    pub avg_heart_rate: Option<u32>,
    pub max_heart_rate: Option<u32>,
    pub avg_pace_sec_per_km: Option<f64>,
    pub calories_burned: Option<u32>,
    pub elevation_gain_m: Option<f64>,
    pub notes: Option<String>,
}

impl CardioLog {
    /// Field-by-field merge; fields absent from `patch` are kept.
    pub fn merge(&mut self, patch: CardioLog) {
        self.duration_sec = patch.duration_sec.or(self.duration_sec);
        self.distance_km = patch.distance_km.or(self.distance_km);
        self.avg_heart_rate = patch.avg_heart_rate.or(self.avg_heart_rate);
        self.max_heart_rate = patch.max_heart_rate.or(self.max_heart_rate);
        self.avg_pace_sec_per_km = patch.avg_pace_sec_per_km.or(self.avg_pace_sec_per_km);
        self.calories_burned = patch.calories_burned.or(self.calories_burned);
        self.elevation_gain_m = patch.elevation_gain_m.or(self.elevation_gain_m);
        if patch.notes.is_some() {
            self.notes = patch.notes;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseLogEntry {
    pub id: String,
    pub exercise: ExerciseDefinition,
    /// 0-based and contiguous across the workout.
    pub order_index: usize,
    pub sets: Vec<SessionSet>,
    /// Present only for cardio exercises.
    pub cardio_log: Option<CardioLog>,
    pub notes: String,
}

/// What `end()` hands over for persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinishedWorkout {
    pub session: WorkoutSession,
    pub exercise_logs: Vec<ExerciseLogEntry>,
}

/// Optional post-workout details.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkoutDetails {
    pub notes: Option<String>,
    pub rating: Option<u8>,
    pub perceived_exertion: Option<u8>,
    pub calories_burned: Option<u32>,
}

#[derive(Debug)]
struct ActiveState {
    session: WorkoutSession,
    exercise_logs: Vec<ExerciseLogEntry>,
    paused_at: Option<DateTime<Utc>>,
    total_paused: Duration,
}

/// Owner of at most one in-progress workout.
///
/// Operations with unmet preconditions (nothing active, index out of range)
/// are no-ops and report that through their `bool`/`Option` return value.
#[derive(Debug)]
pub struct ActiveWorkout<C: Clock = SystemClock> {
    clock: C,
    state: Option<ActiveState>,
    rest_timer_end_at: Option<DateTime<Utc>>,
}

impl Default for ActiveWorkout<SystemClock> {
    fn default() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl ActiveWorkout<SystemClock> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<C: Clock> ActiveWorkout<C> {
    pub fn with_clock(clock: C) -> Self {
        Self {
            clock,
            state: None,
            rest_timer_end_at: None,
        }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    // --- Lifecycle ---

    /// Starts a new workout, discarding any workout already in progress.
    pub fn start(&mut self, name: &str) -> &WorkoutSession {
        self.start_with_template(name, None)
    }

    pub fn start_with_template(&mut self, name: &str, template_id: Option<String>) -> &WorkoutSession {
        if let Some(previous) = &self.state {
            warn!(
                "Replacing active workout '{}' ({}) with a new one",
                previous.session.name, previous.session.id
            );
        }
        let now = self.clock.now();
        let session = WorkoutSession {
            id: Uuid::new_v4().to_string(),
            user_id: None,
            template_id,
            name: name.trim().to_string(),
            status: WorkoutStatus::InProgress,
            started_at: now,
            completed_at: None,
            duration_sec: None,
            notes: None,
            rating: None,
            perceived_exertion: None,
            calories_burned: None,
            created_at: now,
        };
        debug!("Started workout '{}' ({})", session.name, session.id);
        self.rest_timer_end_at = None;
        let state = self.state.insert(ActiveState {
            session,
            exercise_logs: Vec::new(),
            paused_at: None,
            total_paused: Duration::zero(),
        });
        &state.session
    }

    /// Returns `false` if nothing is active or the workout is already paused.
    pub fn pause(&mut self) -> bool {
        let now = self.clock.now();
        match &mut self.state {
            Some(state) if state.paused_at.is_none() => {
                state.paused_at = Some(now);
                debug!("Paused workout {}", state.session.id);
                true
            }
            _ => false,
        }
    }

    pub fn resume(&mut self) -> bool {
        let now = self.clock.now();
        let Some(state) = &mut self.state else {
            return false;
        };
        match state.paused_at.take() {
            Some(paused_at) => {
                state.total_paused = state.total_paused + (now - paused_at);
                debug!("Resumed workout {}", state.session.id);
                true
            }
            None => false,
        }
    }

    /// The workout as [`end`](Self::end) would hand it over, leaving it active.
    /// `None` if nothing is active.
    pub fn snapshot_finished(&self) -> Option<FinishedWorkout> {
        let state = self.state.as_ref()?;
        let mut session = state.session.clone();
        session.status = WorkoutStatus::Completed;
        session.completed_at = Some(self.clock.now());
        session.duration_sec = Some(self.elapsed_seconds());
        Some(FinishedWorkout {
            session,
            exercise_logs: state.exercise_logs.clone(),
        })
    }

    /// Completes the workout and hands it over. `None` if nothing is active.
    pub fn end(&mut self) -> Option<FinishedWorkout> {
        let finished = self.snapshot_finished()?;
        self.state = None;
        self.rest_timer_end_at = None;
        debug!(
            "Ended workout '{}' after {}s with {} exercises",
            finished.session.name,
            finished.session.duration_sec.unwrap_or(0),
            finished.exercise_logs.len()
        );
        Some(finished)
    }

    /// Drops the workout without producing a record. Safe to call when idle.
    pub fn cancel(&mut self) {
        if let Some(state) = self.state.take() {
            debug!("Cancelled workout {}", state.session.id);
        }
        self.rest_timer_end_at = None;
    }

    // --- Derived reads ---

    pub fn is_active(&self) -> bool {
        self.state.is_some()
    }

    pub fn is_paused(&self) -> bool {
        self.state.as_ref().is_some_and(|s| s.paused_at.is_some())
    }

    pub fn session(&self) -> Option<&WorkoutSession> {
        self.state.as_ref().map(|s| &s.session)
    }

    pub fn exercise_logs(&self) -> &[ExerciseLogEntry] {
        self.state
            .as_ref()
            .map_or(&[][..], |s| s.exercise_logs.as_slice())
    }

    /// The most recently added exercise.
    pub fn current_exercise(&self) -> Option<&ExerciseLogEntry> {
        self.exercise_logs().last()
    }

    /// Whole seconds of active (unpaused) time. Frozen while paused.
    pub fn elapsed_seconds(&self) -> u64 {
        let Some(state) = &self.state else {
            return 0;
        };
        let reference = state.paused_at.unwrap_or_else(|| self.clock.now());
        let active_ms = (reference - state.session.started_at - state.total_paused).num_milliseconds();
        u64::try_from(active_ms.div_euclid(1000)).unwrap_or(0)
    }

    /// Number of completed sets across all exercises.
    pub fn total_sets(&self) -> usize {
        self.exercise_logs()
            .iter()
            .map(|log| log.sets.iter().filter(|s| s.is_completed()).count())
            .sum()
    }

    pub fn total_volume(&self) -> f64 {
        self.exercise_logs()
            .iter()
            .flat_map(|log| log.sets.iter())
            .filter_map(SessionSet::volume)
            .sum()
    }

    // --- Exercises ---

    /// Appends an exercise. Returns its index, or `None` if nothing is active.
    pub fn add_exercise(&mut self, exercise: ExerciseDefinition) -> Option<usize> {
        let state = self.state.as_mut()?;
        let order_index = state.exercise_logs.len();
        let cardio_log = exercise.is_cardio().then(CardioLog::default);
        debug!("Adding exercise '{}' at position {}", exercise.name, order_index);
        state.exercise_logs.push(ExerciseLogEntry {
            id: Uuid::new_v4().to_string(),
            exercise,
            order_index,
            sets: Vec::new(),
            cardio_log,
            notes: String::new(),
        });
        Some(order_index)
    }

    pub fn remove_exercise(&mut self, index: usize) -> bool {
        let Some(state) = self.state.as_mut() else {
            return false;
        };
        if index >= state.exercise_logs.len() {
            return false;
        }
        state.exercise_logs.remove(index);
        for (i, log) in state.exercise_logs.iter_mut().enumerate() {
            log.order_index = i;
        }
        true
    }

    pub fn set_exercise_notes(&mut self, exercise_index: usize, notes: &str) -> bool {
        match self.log_mut(exercise_index) {
            Some(log) => {
                log.notes = notes.to_string();
                true
            }
            None => false,
        }
    }

    /// Merges into the cardio sub-record. `false` for non-cardio exercises.
    pub fn update_cardio_log(&mut self, exercise_index: usize, patch: CardioLog) -> bool {
        match self.log_mut(exercise_index).and_then(|log| log.cardio_log.as_mut()) {
            Some(cardio) => {
                cardio.merge(patch);
                true
            }
            None => false,
        }
    }

    // --- Sets ---

    /// Appends a set pre-filled with the previous set's reps and weight.
    /// Returns the new set's index within the exercise.
    pub fn add_set(&mut self, exercise_index: usize) -> Option<usize> {
        let log = self.log_mut(exercise_index)?;
        let (reps, weight_kg) = log
            .sets
            .last()
            .map_or((None, None), |last| (last.reps, last.weight_kg));
        let set_index = log.sets.len();
        log.sets.push(SessionSet {
            set_number: set_index as u32 + 1,
            reps,
            weight_kg,
            rpe: None,
            set_type: SetType::Working,
            completed_at: None,
            is_pr: false,
            notes: None,
        });
        Some(set_index)
    }

    /// Merges `update` and stamps the set completed now (re-stamps if already done).
    pub fn complete_set(&mut self, exercise_index: usize, set_index: usize, update: SetUpdate) -> bool {
        let now = self.clock.now();
        match self.set_mut(exercise_index, set_index) {
            Some(set) => {
                set.apply(update);
                set.completed_at = Some(now);
                true
            }
            None => false,
        }
    }

    /// Merges `update` without touching the completion stamp.
    pub fn update_set(&mut self, exercise_index: usize, set_index: usize, update: SetUpdate) -> bool {
        match self.set_mut(exercise_index, set_index) {
            Some(set) => {
                set.apply(update);
                true
            }
            None => false,
        }
    }

    pub fn uncomplete_set(&mut self, exercise_index: usize, set_index: usize) -> bool {
        match self.set_mut(exercise_index, set_index) {
            Some(set) => {
                set.completed_at = None;
                true
            }
            None => false,
        }
    }

    pub fn remove_set(&mut self, exercise_index: usize, set_index: usize) -> bool {
        let Some(log) = self.log_mut(exercise_index) else {
            return false;
        };
        if set_index >= log.sets.len() {
            return false;
        }
        log.sets.remove(set_index);
        for (i, set) in log.sets.iter_mut().enumerate() {
            set.set_number = i as u32 + 1;
        }
        true
    }

    pub fn update_details(&mut self, details: WorkoutDetails) -> bool {
        let Some(state) = self.state.as_mut() else {
            return false;
        };
        let session = &mut state.session;
        if details.notes.is_some() {
            session.notes = details.notes;
        }
        session.rating = details.rating.or(session.rating);
        session.perceived_exertion = details.perceived_exertion.or(session.perceived_exertion);
        session.calories_burned = details.calories_burned.or(session.calories_burned);
        true
    }

    pub fn set_user(&mut self, user_id: Option<String>) {
        if let Some(state) = self.state.as_mut() {
            state.session.user_id = user_id;
        }
    }

    // --- Rest timer ---

    pub fn start_rest_timer(&mut self, seconds: u32) {
        self.rest_timer_end_at = Some(self.clock.now() + Duration::seconds(i64::from(seconds)));
    }

    pub fn cancel_rest_timer(&mut self) {
        self.rest_timer_end_at = None;
    }

    /// Whole seconds left on the rest timer, never negative.
    pub fn rest_timer_remaining(&self) -> u64 {
        let Some(end) = self.rest_timer_end_at else {
            return 0;
        };
        let remaining_ms = (end - self.clock.now()).num_milliseconds();
        u64::try_from(remaining_ms.div_euclid(1000)).unwrap_or(0)
    }

    fn log_mut(&mut self, exercise_index: usize) -> Option<&mut ExerciseLogEntry> {
        self.state.as_mut()?.exercise_logs.get_mut(exercise_index)
    }

    fn set_mut(&mut self, exercise_index: usize, set_index: usize) -> Option<&mut SessionSet> {
        self.log_mut(exercise_index)?.sets.get_mut(set_index)
    }
}
