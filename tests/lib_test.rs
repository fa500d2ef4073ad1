use anyhow::{Context, Result};
use chrono::{DateTime, Duration, TimeZone, Utc};
use gym_tracker_lib::ai_client::{AiError, TextGenerator};
use gym_tracker_lib::auth::AuthError;
use gym_tracker_lib::billing::{
    signature_header, BillingError, CheckoutRequest, PaymentGateway, SubscriptionObject,
    SubscriptionStatus,
};
use gym_tracker_lib::custom_exercises::NewCustomExercise;
use gym_tracker_lib::goals::{GoalType, NewGoal};
use gym_tracker_lib::history::{WorkoutHistory, HISTORY_KEY};
use gym_tracker_lib::insights::{TrainingGoal, WorkoutRequest};
use gym_tracker_lib::library::{Difficulty, Equipment, ExerciseCategory, MuscleGroup, WorkoutType};
use gym_tracker_lib::measurements::{
    circumference_history, latest_measurement, weight_history, NewMeasurement,
};
use gym_tracker_lib::profile::{apply_subscription_change, SubscriptionChange};
use gym_tracker_lib::session::{ActiveWorkout, ManualClock, SetUpdate};
use gym_tracker_lib::storage::JsonStore;
use gym_tracker_lib::templates::TemplateLibrary;
use gym_tracker_lib::{load_config_util, AppService, Config, Units};
use std::cell::RefCell;
use tempfile::TempDir;

fn start_instant() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 12, 12, 0, 0).unwrap()
}

// In-memory database, local collections in a temp dir, and a clock the test controls.
// The TempDir must outlive the service.
fn create_test_service() -> Result<(AppService, ManualClock, TempDir)> {
    let dir = tempfile::tempdir()?;
    let conn = rusqlite::Connection::open_in_memory()?;
    gym_tracker_lib::db::init_db(&conn)?;

    let clock = ManualClock::new(start_instant());
    let service = AppService {
        config: Config::default(),
        conn,
        db_path: ":memory:".into(),
        config_path: dir.path().join("config.toml"),
        history: WorkoutHistory::load(JsonStore::new(dir.path())),
        templates: TemplateLibrary::load(JsonStore::new(dir.path()))?,
        workout: ActiveWorkout::with_clock(Box::new(clock.clone())),
        user: None,
        profile: None,
    };
    Ok((service, clock, dir))
}

fn done(reps: i64, weight_kg: f64) -> SetUpdate {
    SetUpdate {
        reps: Some(reps),
        weight_kg: Some(weight_kg),
        ..SetUpdate::default()
    }
}

// One exercise, one completed set.
fn log_single_set_workout(service: &mut AppService, exercise: &str, reps: i64, weight: f64) -> Result<String> {
    service.start_workout("Quick Session");
    let ex = service.add_exercise(exercise)?;
    let set = service.workout.add_set(ex).context("workout should be active")?;
    service.complete_set(ex, set, done(reps, weight))?;
    let summary = service.finish_workout()?.context("workout should finish")?;
    Ok(summary.workout.id)
}

fn auth_error(err: &anyhow::Error) -> Option<&AuthError> {
    err.downcast_ref::<AuthError>()
}

struct CannedGenerator {
    response: String,
    prompts: RefCell<Vec<String>>,
}

impl CannedGenerator {
    fn new(response: &str) -> Self {
        Self {
            response: response.to_string(),
            prompts: RefCell::new(Vec::new()),
        }
    }
}

impl TextGenerator for CannedGenerator {
    fn generate(&self, prompt: &str, _max_tokens: u32) -> Result<String, AiError> {
        self.prompts.borrow_mut().push(prompt.to_string());
        Ok(self.response.clone())
    }
}

struct NoGateway;

impl PaymentGateway for NoGateway {
    fn create_customer(&self, _user_id: &str, _username: &str) -> Result<String, BillingError> {
        Err(BillingError::Gateway("offline".to_string()))
    }
    fn create_checkout_session(&self, _request: &CheckoutRequest) -> Result<String, BillingError> {
        Err(BillingError::Gateway("offline".to_string()))
    }
    fn create_portal_session(&self, _customer_id: &str, _return_url: &str) -> Result<String, BillingError> {
        Err(BillingError::Gateway("offline".to_string()))
    }
    fn retrieve_subscription(&self, _subscription_id: &str) -> Result<SubscriptionObject, BillingError> {
        Err(BillingError::Gateway("offline".to_string()))
    }
}

fn push_request() -> WorkoutRequest {
    WorkoutRequest {
        workout_type: WorkoutType::Push,
        custom_muscle_groups: Vec::new(),
        duration_minutes: 60,
        equipment: vec![
            Equipment::Barbell,
            Equipment::Dumbbell,
            Equipment::Bench,
            Equipment::Cable,
            Equipment::Bodyweight,
        ],
        experience_level: Difficulty::Intermediate,
        goal: TrainingGoal::Hypertrophy,
        recent_workouts: Vec::new(),
    }
}

#[test]
fn test_finish_workout_signed_out_keeps_local_history_only() -> Result<()> {
    let (mut service, clock, dir) = create_test_service()?;

    service.start_workout("Morning Lift");
    let ex = service.add_exercise("bench-press")?;
    let first = service.workout.add_set(ex).context("no set")?;
    service.complete_set(ex, first, done(5, 60.0))?;
    let second = service.workout.add_set(ex).context("no set")?;
    service.complete_set(ex, second, done(5, 60.0))?;
    clock.advance(Duration::minutes(45));

    let summary = service.finish_workout()?.context("workout should finish")?;
    assert!(!summary.persisted);
    assert!(summary.new_achievements.is_empty());
    assert_eq!(summary.workout.name, "Morning Lift");
    assert_eq!(summary.workout.duration, 45 * 60);
    assert_eq!(summary.workout.volume, 600.0);
    assert_eq!(summary.workout.completed_sets(), 2);
    assert!(!service.workout.is_active());

    // Survives a reload from disk.
    let reloaded = WorkoutHistory::load(JsonStore::new(dir.path()));
    assert_eq!(reloaded.workouts().len(), 1);
    assert_eq!(reloaded.workouts()[0].id, summary.workout.id);

    // Finishing with nothing active is a no-op.
    assert!(service.finish_workout()?.is_none());
    Ok(())
}

#[test]
fn test_failed_history_write_keeps_workout_active() -> Result<()> {
    let (mut service, clock, dir) = create_test_service()?;
    // A directory where the history file belongs makes every write fail.
    let history_path = JsonStore::new(dir.path()).path_for(HISTORY_KEY);
    std::fs::create_dir(&history_path)?;

    service.start_workout("Blocked Save");
    let ex = service.add_exercise("bench-press")?;
    let set = service.workout.add_set(ex).context("no set")?;
    service.complete_set(ex, set, done(5, 60.0))?;
    clock.advance(Duration::minutes(30));

    assert!(service.finish_workout().is_err());
    assert!(service.workout.is_active());
    assert_eq!(service.workout.total_sets(), 1);
    assert!(service.history.workouts().is_empty());

    // Once the path is writable the same workout finishes normally.
    std::fs::remove_dir(&history_path)?;
    let summary = service.finish_workout()?.context("workout should finish")?;
    assert_eq!(summary.workout.name, "Blocked Save");
    assert_eq!(summary.workout.duration, 30 * 60);
    assert!(!service.workout.is_active());
    let reloaded = WorkoutHistory::load(JsonStore::new(dir.path()));
    assert_eq!(reloaded.workouts().len(), 1);
    Ok(())
}

#[test]
fn test_finish_workout_signed_in_persists_and_unlocks_achievements() -> Result<()> {
    let (mut service, _clock, _dir) = create_test_service()?;
    service.sign_in("alice", Some("Alice"))?;

    service.start_workout("Evening Lift");
    let ex = service.add_exercise("Barbell Bench Press")?;
    let set = service.workout.add_set(ex).context("no set")?;
    service.complete_set(ex, set, done(5, 60.0))?;
    let summary = service.finish_workout()?.context("workout should finish")?;

    assert!(summary.persisted);
    let unlocked: Vec<&str> = summary.new_achievements.iter().map(|a| a.id.as_str()).collect();
    assert!(unlocked.contains(&"first-workout"));
    assert!(unlocked.contains(&"first-pr"));
    assert!(!unlocked.contains(&"workouts-10"));

    let sessions = service.remote_sessions(None)?;
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].id, summary.workout.id);
    assert_eq!(
        gym_tracker_lib::db::count_session_exercises(&service.conn, &sessions[0].id)?,
        1
    );

    let progress = service.achievements()?;
    let first = progress
        .iter()
        .find(|a| a.achievement.id == "first-workout")
        .context("catalogue should contain first-workout")?;
    assert!(first.unlocked);

    // Already unlocked achievements are not reported again.
    assert!(service.refresh_achievements()?.is_empty());
    Ok(())
}

#[test]
fn test_live_pr_detection() -> Result<()> {
    let (mut service, clock, _dir) = create_test_service()?;

    service.start_workout("Day One");
    let ex = service.add_exercise("bench-press")?;
    let s0 = service.workout.add_set(ex).context("no set")?;
    // Nothing to compare against yet.
    assert!(!service.complete_set(ex, s0, done(5, 60.0))?.is_pr);
    let s1 = service.workout.add_set(ex).context("no set")?;
    assert!(service.complete_set(ex, s1, done(5, 70.0))?.is_pr);
    let s2 = service.workout.add_set(ex).context("no set")?;
    assert!(!service.complete_set(ex, s2, done(5, 65.0))?.is_pr);
    service.finish_workout()?;

    clock.advance(Duration::days(1));
    service.start_workout("Day Two");
    let ex = service.add_exercise("bench-press")?;
    let s0 = service.workout.add_set(ex).context("no set")?;
    assert!(!service.complete_set(ex, s0, done(5, 65.0))?.is_pr);
    let s1 = service.workout.add_set(ex).context("no set")?;
    let completion = service.complete_set(ex, s1, done(5, 75.0))?;
    assert!(completion.is_pr);
    assert!(service.workout.exercise_logs()[ex].sets[s1].is_pr);
    service.finish_workout()?;

    let pr = service
        .exercise_pr("Barbell Bench Press")
        .context("bench press should have a record")?;
    assert_eq!(pr.weight, 75.0);
    assert_eq!(pr.reps, 5);
    Ok(())
}

#[test]
fn test_complete_set_out_of_range_fails() -> Result<()> {
    let (mut service, _clock, _dir) = create_test_service()?;
    service.start_workout("Empty");
    assert!(service.complete_set(0, 0, done(5, 50.0)).is_err());
    Ok(())
}

#[test]
fn test_complete_set_rejects_rpe_outside_scale() -> Result<()> {
    let (mut service, _clock, _dir) = create_test_service()?;
    service.start_workout("Effort");
    let ex = service.add_exercise("bench-press")?;
    let set = service.workout.add_set(ex).context("no set")?;

    for rpe in [0.5, 10.5] {
        let update = SetUpdate {
            rpe: Some(rpe),
            ..done(5, 60.0)
        };
        assert!(service.complete_set(ex, set, update).is_err());
    }
    assert_eq!(service.workout.total_sets(), 0);

    let update = SetUpdate {
        rpe: Some(8.5),
        ..done(5, 60.0)
    };
    service.complete_set(ex, set, update)?;
    let logged = &service.workout.exercise_logs()[ex].sets[set];
    assert!(logged.is_completed());
    assert_eq!(logged.rpe, Some(8.5));
    Ok(())
}

#[test]
fn test_add_exercise_requires_active_workout() -> Result<()> {
    let (mut service, _clock, _dir) = create_test_service()?;
    assert!(service.add_exercise("bench-press").is_err());
    Ok(())
}

#[test]
fn test_start_workout_from_template() -> Result<()> {
    let (mut service, _clock, _dir) = create_test_service()?;

    let session = service.start_workout_from_template("push-day")?;
    assert_eq!(session.name, "Push Day");
    assert_eq!(session.template_id.as_deref(), Some("push-day"));

    let logs = service.workout.exercise_logs();
    assert_eq!(logs.len(), 6);
    assert_eq!(logs[0].exercise.name, "Barbell Bench Press");
    assert_eq!(logs[0].sets.len(), 4);
    assert!(logs[0].sets.iter().all(|s| s.reps == Some(8) && !s.is_completed()));
    let numbers: Vec<u32> = logs[0].sets.iter().map(|s| s.set_number).collect();
    assert_eq!(numbers, vec![1, 2, 3, 4]);

    let template = service
        .templates
        .get("push-day")
        .context("push-day should exist")?;
    assert_eq!(template.last_used, Some(start_instant()));

    assert!(service.start_workout_from_template("no-such-template").is_err());
    Ok(())
}

#[test]
fn test_template_from_workout_keeps_last_completed_set() -> Result<()> {
    let (mut service, _clock, _dir) = create_test_service()?;
    let workout_id = log_single_set_workout(&mut service, "bench-press", 5, 60.0)?;

    let template = service.template_from_workout(&workout_id, "My Bench")?;
    assert!(template.id.starts_with("custom-"));
    assert_eq!(template.name, "My Bench");
    assert_eq!(template.exercises.len(), 1);
    assert_eq!(template.exercises[0].default_weight, Some(60.0));
    assert_eq!(template.exercises[0].default_reps, Some(5));
    assert_eq!(service.list_templates().len(), 5);

    assert!(service.template_from_workout("missing", "Nope").is_err());
    assert!(service.create_template("   ", Vec::new()).is_err());
    Ok(())
}

#[test]
fn test_rate_and_delete_workout() -> Result<()> {
    let (mut service, _clock, _dir) = create_test_service()?;
    let id = log_single_set_workout(&mut service, "bench-press", 5, 60.0)?;

    assert!(service.rate_workout(&id, 4)?);
    assert_eq!(service.get_workout(&id).and_then(|w| w.rating), Some(4));
    assert!(service.rate_workout(&id, 6).is_err());
    assert!(service.rate_workout(&id, 0).is_err());
    assert!(!service.rate_workout("missing", 3)?);

    assert!(service.delete_workout(&id)?);
    assert!(!service.delete_workout(&id)?);
    assert!(service.workouts().is_empty());
    Ok(())
}

#[test]
fn test_stats_and_streak() -> Result<()> {
    let (mut service, clock, _dir) = create_test_service()?;
    log_single_set_workout(&mut service, "bench-press", 5, 60.0)?;
    clock.advance(Duration::days(1));
    log_single_set_workout(&mut service, "barbell-squat", 5, 100.0)?;

    assert_eq!(service.day_streak(), 2);
    let stats = service.stats();
    assert_eq!(stats.total_workouts, 2);
    assert_eq!(stats.total_sets, 2);
    assert_eq!(stats.total_volume, 800.0);
    assert_eq!(stats.longest_streak, 2);
    assert_eq!(service.personal_records().len(), 2);

    // Two idle days break the streak.
    clock.advance(Duration::days(2));
    assert_eq!(service.day_streak(), 0);
    assert_eq!(service.stats().longest_streak, 2);
    Ok(())
}

#[test]
fn test_signed_out_user_data_is_unauthorized() -> Result<()> {
    let (service, _clock, _dir) = create_test_service()?;

    let goal = NewGoal {
        goal_type: GoalType::Custom,
        title: "Stretch daily".to_string(),
        description: None,
        target_value: 30.0,
        current_value: None,
        unit: "days".to_string(),
        exercise_id: None,
        deadline: None,
    };
    let err = service.create_goal(&goal).unwrap_err();
    assert!(matches!(auth_error(&err), Some(AuthError::Unauthorized(_))));

    let err = service.list_measurements().unwrap_err();
    assert!(matches!(auth_error(&err), Some(AuthError::Unauthorized(_))));

    let err = service.remote_sessions(None).unwrap_err();
    assert!(matches!(auth_error(&err), Some(AuthError::Unauthorized(_))));
    Ok(())
}

#[test]
fn test_goal_progress_completes_goal() -> Result<()> {
    let (mut service, clock, _dir) = create_test_service()?;
    service.sign_in("bob", None)?;

    let goal = service.create_goal(&NewGoal {
        goal_type: GoalType::Strength,
        title: "Bench 100".to_string(),
        description: None,
        target_value: 100.0,
        current_value: Some(60.0),
        unit: "kg".to_string(),
        exercise_id: Some("bench-press".to_string()),
        deadline: None,
    })?;
    assert_eq!(goal.progress_percentage(), 60);
    assert!(!goal.is_completed);

    let goal = service.update_goal_progress(&goal.id, 85.0)?;
    assert_eq!(goal.progress_percentage(), 85);
    assert!(goal.completed_at.is_none());

    clock.advance(Duration::days(10));
    let goal = service.update_goal_progress(&goal.id, 102.5)?;
    assert!(goal.is_completed);
    assert_eq!(goal.progress_percentage(), 100);
    assert_eq!(goal.completed_at, Some(start_instant() + Duration::days(10)));

    service.delete_goal(&goal.id)?;
    assert!(service.list_goals()?.is_empty());
    assert!(service.delete_goal(&goal.id).is_err());
    Ok(())
}

#[test]
fn test_measurements_round_trip() -> Result<()> {
    let (mut service, clock, _dir) = create_test_service()?;
    service.sign_in("carol", None)?;

    let added = service.add_measurement(&NewMeasurement {
        weight_kg: Some(82.5),
        waist_cm: Some(86.0),
        ..NewMeasurement::default()
    })?;
    assert_eq!(added.measured_at, start_instant());

    clock.advance(Duration::days(1));
    let tape_only = service.add_measurement(&NewMeasurement {
        chest_cm: Some(104.0),
        ..NewMeasurement::default()
    })?;

    let listed = service.list_measurements()?;
    assert_eq!(listed.len(), 2);
    assert_eq!(latest_measurement(&listed).map(|m| m.id.as_str()), Some(tape_only.id.as_str()));

    // Trends run oldest first; weight skips rows without a weight.
    let weights = weight_history(&listed);
    assert_eq!(weights.len(), 1);
    assert_eq!(weights[0].weight, 82.5);
    let tape = circumference_history(&listed);
    assert_eq!(tape.len(), 2);
    assert_eq!((tape[0].waist, tape[0].chest), (86.0, 0.0));
    assert_eq!(tape[1].chest, 104.0);

    service.delete_measurement(&added.id)?;
    service.delete_measurement(&tape_only.id)?;
    assert!(service.list_measurements()?.is_empty());
    Ok(())
}

#[test]
fn test_missing_tables_read_as_empty() -> Result<()> {
    let (mut service, _clock, _dir) = create_test_service()?;
    service.sign_in("dave", None)?;
    service
        .conn
        .execute_batch("DROP TABLE user_goals; DROP TABLE body_measurements; DROP TABLE subscription_events;")?;

    assert!(service.list_goals()?.is_empty());
    assert!(service.list_measurements()?.is_empty());
    assert!(service.subscription_events()?.is_empty());
    Ok(())
}

#[test]
fn test_authenticate_bearer_tokens() -> Result<()> {
    let (mut service, clock, _dir) = create_test_service()?;
    service.sign_in("erin", None)?;
    let token = service
        .config
        .session_token
        .clone()
        .context("sign-in should store a token")?;

    let header = format!("Bearer {token}");
    let user = service.authenticate(Some(&header))?;
    assert_eq!(user.username, "erin");

    assert!(matches!(service.authenticate(None), Err(AuthError::Unauthorized(_))));
    assert!(matches!(
        service.authenticate(Some(&format!("Basic {token}"))),
        Err(AuthError::Unauthorized(_))
    ));
    assert!(matches!(
        service.authenticate(Some("Bearer not-a-token")),
        Err(AuthError::Unauthorized(_))
    ));

    clock.advance(Duration::days(31));
    assert!(matches!(service.authenticate(Some(&header)), Err(AuthError::Unauthorized(_))));

    // Signing in again clears the expired token.
    service.sign_in("erin", None)?;
    let tokens: i64 = service
        .conn
        .query_row("SELECT COUNT(*) FROM auth_tokens", [], |row| row.get(0))?;
    assert_eq!(tokens, 1);
    Ok(())
}

#[test]
fn test_sign_out_revokes_token() -> Result<()> {
    let (mut service, _clock, _dir) = create_test_service()?;
    service.sign_in("frank", None)?;
    let header = format!(
        "Bearer {}",
        service.config.session_token.clone().context("no token")?
    );

    service.sign_out()?;
    assert!(service.user.is_none());
    assert!(service.profile.is_none());
    assert!(service.config.session_token.is_none());
    assert!(service.authenticate(Some(&header)).is_err());
    Ok(())
}

#[test]
fn test_sign_in_reuses_profile_case_insensitively() -> Result<()> {
    let (mut service, _clock, _dir) = create_test_service()?;
    let first_id = service.sign_in("Grace", Some("Grace H"))?.id.clone();
    service.sign_out()?;
    let profile = service.sign_in("grace", None)?;
    assert_eq!(profile.id, first_id);
    assert_eq!(profile.label(), "Grace H");
    assert!(service.sign_in("   ", None).is_err());
    Ok(())
}

#[test]
fn test_custom_exercise_resolves_by_name() -> Result<()> {
    let (mut service, _clock, _dir) = create_test_service()?;

    // Unknown names fall back to an ad-hoc strength definition.
    let ad_hoc = service.resolve_exercise("Landmine Press")?;
    assert_eq!(ad_hoc.id, "landmine-press");

    service.sign_in("heidi", None)?;
    let custom = service.add_custom_exercise(&NewCustomExercise {
        name: "Landmine Press".to_string(),
        description: Some("Half-kneeling".to_string()),
        category: ExerciseCategory::Strength,
        muscle_groups: vec![MuscleGroup::Shoulders, MuscleGroup::Chest],
        equipment: vec![Equipment::Barbell],
        difficulty: Difficulty::Beginner,
        is_compound: true,
    })?;

    let resolved = service.resolve_exercise("landmine press")?;
    assert_eq!(resolved.id, custom.id);
    assert_eq!(resolved.muscle_groups, vec![MuscleGroup::Shoulders, MuscleGroup::Chest]);

    // Built-in entries win over custom ones.
    assert_eq!(service.resolve_exercise("bench-press")?.name, "Barbell Bench Press");
    Ok(())
}

#[test]
fn test_premium_gating_is_distinct_from_unauthorized() -> Result<()> {
    let (mut service, clock, _dir) = create_test_service()?;
    let generator = CannedGenerator::new("{}");

    let err = service.generate_workout(&generator, push_request()).unwrap_err();
    assert!(matches!(auth_error(&err), Some(AuthError::Unauthorized(_))));

    let user_id = service.sign_in("ivan", None)?.id.clone();
    let err = service.generate_workout(&generator, push_request()).unwrap_err();
    assert!(matches!(auth_error(&err), Some(AuthError::UpgradeRequired)));
    let err = service.generate_insights(&generator).unwrap_err();
    assert!(matches!(auth_error(&err), Some(AuthError::UpgradeRequired)));
    assert!(generator.prompts.borrow().is_empty());

    // Premium until tomorrow.
    apply_subscription_change(
        &service.conn,
        &user_id,
        &SubscriptionChange {
            status: Some(SubscriptionStatus::Premium),
            ends_at: Some(Some(start_instant() + Duration::days(1))),
            ..SubscriptionChange::default()
        },
        start_instant(),
    )?;
    assert!(service.subscription_info()?.is_premium);
    service.require_premium()?;

    // An expired premium profile keeps its status but loses access.
    clock.advance(Duration::days(2));
    let info = service.subscription_info()?;
    assert_eq!(info.status, SubscriptionStatus::Premium);
    assert!(!info.is_premium);
    assert!(matches!(service.require_premium(), Err(AuthError::UpgradeRequired)));
    Ok(())
}

#[test]
fn test_generate_workout_parses_chatty_output() -> Result<()> {
    let (mut service, _clock, _dir) = create_test_service()?;
    let user_id = service.sign_in("judy", None)?.id.clone();
    apply_subscription_change(
        &service.conn,
        &user_id,
        &SubscriptionChange {
            status: Some(SubscriptionStatus::Premium),
            ..SubscriptionChange::default()
        },
        start_instant(),
    )?;
    log_single_set_workout(&mut service, "bench-press", 5, 60.0)?;

    let generator = CannedGenerator::new(
        r#"Sure! Here is your plan:
{
  "name": "Press Power",
  "estimatedDuration": 60,
  "targetMuscleGroups": ["chest", "shoulders"],
  "warmup": [{"exerciseId": "push-ups", "name": "Push-Ups", "sets": 2, "reps": 10, "restSeconds": 30}],
  "mainWorkout": [
    {"exerciseId": "bench-press", "name": "Barbell Bench Press", "sets": 4, "reps": "6-8", "restSeconds": 120, "intensity": "RPE 8"}
  ]
}
Let me know if you want changes {ok}."#,
    );
    let workout = service.generate_workout(&generator, push_request())?;
    assert_eq!(workout.name, "Press Power");
    assert_eq!(workout.warmup[0].reps, "10");
    assert_eq!(workout.main_workout[0].reps, "6-8");
    assert!(workout.cooldown.is_empty());

    // Recent local history is offered to the model.
    let prompts = generator.prompts.borrow();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("- Quick Session: Barbell Bench Press"));
    Ok(())
}

#[test]
fn test_webhook_upgrades_signed_in_profile() -> Result<()> {
    let (mut service, _clock, _dir) = create_test_service()?;
    service.config.billing.webhook_secret = Some("whsec_test".to_string());
    let user_id = service.sign_in("kate", None)?.id.clone();

    let period_end = (start_instant() + Duration::days(30)).timestamp();
    let body = format!(
        r#"{{"id":"evt_1","type":"customer.subscription.updated","data":{{"object":{{"id":"sub_1","status":"active","cancel_at_period_end":false,"current_period_end":{period_end},"metadata":{{"user_id":"{user_id}"}}}}}}}}"#
    );
    let signature = signature_header("whsec_test", start_instant().timestamp(), &body);

    let applied = service
        .handle_webhook(&NoGateway, Some(&signature), &body)?
        .context("event should apply")?;
    assert_eq!(applied.user_id, user_id);
    assert_eq!(applied.status, SubscriptionStatus::Premium);

    let profile = service.profile.as_ref().context("still signed in")?;
    assert_eq!(profile.subscription_status, SubscriptionStatus::Premium);
    assert_eq!(service.subscription_events()?.len(), 1);

    let tampered = body.replace("active", "past_due");
    let err = service
        .handle_webhook(&NoGateway, Some(&signature), &tampered)
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<BillingError>(),
        Some(BillingError::InvalidSignature)
    ));
    assert_eq!(service.subscription_events()?.len(), 1);
    Ok(())
}

#[test]
fn test_plates_use_configured_bar() -> Result<()> {
    let (mut service, _clock, _dir) = create_test_service()?;

    let plates = service.plates(100.0);
    let loaded: Vec<(f64, u32)> = plates.iter().map(|p| (p.weight, p.count)).collect();
    assert_eq!(loaded, vec![(25.0, 1), (15.0, 1)]);

    service.set_bar_weight(15.0)?;
    let loaded: Vec<(f64, u32)> = service.plates(100.0).iter().map(|p| (p.weight, p.count)).collect();
    assert_eq!(loaded, vec![(25.0, 1), (15.0, 1), (2.5, 1)]);
    assert!(service.set_bar_weight(-5.0).is_err());
    Ok(())
}

#[test]
fn test_set_units_updates_config_and_profile() -> Result<()> {
    let (mut service, _clock, _dir) = create_test_service()?;

    service.set_units(Units::Imperial)?;
    assert_eq!(service.units(), Units::Imperial);
    let saved = load_config_util(&service.config_path)?;
    assert_eq!(saved.units, Units::Imperial);

    // A signed-in profile's preference wins over the config.
    service.sign_in("liam", None)?;
    assert_eq!(service.units(), Units::Metric);
    service.set_units(Units::Imperial)?;
    assert_eq!(
        service.profile.as_ref().map(|p| p.unit_system),
        Some(Units::Imperial)
    );
    Ok(())
}
