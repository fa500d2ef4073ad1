use chrono::{DateTime, Duration, TimeZone, Utc};
use gym_tracker_lib::ai_client::{AiError, TextGenerator};
use gym_tracker_lib::history::{SavedExercise, SavedSet, SavedWorkout};
use gym_tracker_lib::insights::{
    available_exercises, extract_json, generate_insights, generate_workout,
    prepare_workout_summary, InsightError, InsightType, TrainingGoal, WorkoutRequest,
};
use gym_tracker_lib::library::{Difficulty, Equipment, MuscleGroup, WorkoutType};
use std::cell::Cell;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 12, 12, 0, 0).unwrap()
}

struct Scripted {
    reply: Result<String, u16>,
    calls: Cell<u32>,
}

impl Scripted {
    fn replying(text: &str) -> Self {
        Self {
            reply: Ok(text.to_string()),
            calls: Cell::new(0),
        }
    }

    fn failing(status: u16) -> Self {
        Self {
            reply: Err(status),
            calls: Cell::new(0),
        }
    }
}

impl TextGenerator for Scripted {
    fn generate(&self, _prompt: &str, _max_tokens: u32) -> Result<String, AiError> {
        self.calls.set(self.calls.get() + 1);
        match &self.reply {
            Ok(text) => Ok(text.clone()),
            Err(status) => Err(AiError::Status {
                status: *status,
                body: "overloaded".to_string(),
            }),
        }
    }
}

fn request(workout_type: WorkoutType, equipment: Vec<Equipment>) -> WorkoutRequest {
    WorkoutRequest {
        workout_type,
        custom_muscle_groups: Vec::new(),
        duration_minutes: 45,
        equipment,
        experience_level: Difficulty::Intermediate,
        goal: TrainingGoal::Strength,
        recent_workouts: Vec::new(),
    }
}

fn bench_workout(id: &str, date: DateTime<Utc>) -> SavedWorkout {
    SavedWorkout {
        id: id.to_string(),
        name: "Push".to_string(),
        date,
        duration: 3000,
        exercises: vec![SavedExercise {
            name: "Barbell Bench Press".to_string(),
            sets: vec![SavedSet {
                weight: Some(80.0),
                reps: Some(5),
                completed: true,
            }],
        }],
        volume: 400.0,
        rating: None,
        notes: None,
    }
}

#[test]
fn test_extract_json_from_chatty_output() {
    assert_eq!(extract_json(r#"  {"a": 1}  "#, '{', '}'), Some(r#"{"a": 1}"#));

    let chatty = r#"Here you go: {"name": "Brace } Day", "nested": {"x": [1, 2]}} Enjoy {not json}"#;
    assert_eq!(
        extract_json(chatty, '{', '}'),
        Some(r#"{"name": "Brace } Day", "nested": {"x": [1, 2]}}"#)
    );

    let array = "Insights:\n[{\"title\": \"a [b]\"}]\nThanks!";
    assert_eq!(extract_json(array, '[', ']'), Some("[{\"title\": \"a [b]\"}]"));

    let escaped = r#"x {"quote": "say \"}\" loudly"} y"#;
    assert_eq!(extract_json(escaped, '{', '}'), Some(r#"{"quote": "say \"}\" loudly"}"#));

    assert_eq!(extract_json("no json here", '{', '}'), None);
    assert_eq!(extract_json("{ unterminated", '{', '}'), None);
}

#[test]
fn test_request_validation() {
    let mut req = request(WorkoutType::Push, vec![Equipment::Barbell]);
    assert!(req.validate().is_ok());

    req.duration_minutes = 50;
    assert!(matches!(req.validate(), Err(InsightError::Validation(_))));

    let mut custom = request(WorkoutType::Custom, vec![Equipment::Barbell]);
    assert!(matches!(custom.validate(), Err(InsightError::Validation(_))));
    custom.custom_muscle_groups = vec![MuscleGroup::Biceps];
    assert!(custom.validate().is_ok());
    assert_eq!(custom.target_muscles(), vec![MuscleGroup::Biceps]);
}

#[test]
fn test_available_exercises_respect_equipment_and_level() {
    let mut req = request(WorkoutType::Push, vec![Equipment::Dumbbell, Equipment::Bench]);
    let available = available_exercises(&req);
    assert!(!available.is_empty());
    for ex in &available {
        assert!(ex.equipment.iter().all(|e| req.equipment.contains(e)), "{}", ex.id);
        assert!(ex.difficulty != Difficulty::Advanced, "{}", ex.id);
    }
    assert!(available.iter().any(|ex| ex.id == "dumbbell-bench-press"));
    assert!(!available.iter().any(|ex| ex.id == "bench-press"));

    req.experience_level = Difficulty::Beginner;
    assert!(available_exercises(&req)
        .iter()
        .all(|ex| ex.difficulty == Difficulty::Beginner));
}

#[test]
fn test_generate_workout_rejects_thin_libraries_before_calling_model() {
    let generator = Scripted::replying("{}");
    let mut req = request(WorkoutType::Custom, vec![Equipment::Cable]);
    req.custom_muscle_groups = vec![MuscleGroup::Biceps];

    let result = generate_workout(&generator, &req, 1024);
    assert!(matches!(result, Err(InsightError::NotEnoughExercises)));
    assert_eq!(generator.calls.get(), 0);

    let invalid = request(WorkoutType::Push, vec![Equipment::Barbell]);
    let invalid = WorkoutRequest {
        duration_minutes: 20,
        ..invalid
    };
    assert!(matches!(
        generate_workout(&generator, &invalid, 1024),
        Err(InsightError::Validation(_))
    ));
    assert_eq!(generator.calls.get(), 0);
}

#[test]
fn test_generate_workout_failures() {
    let req = request(
        WorkoutType::Legs,
        vec![Equipment::Barbell, Equipment::Machine, Equipment::Dumbbell],
    );

    let prose = Scripted::replying("I cannot help with that.");
    assert!(matches!(
        generate_workout(&prose, &req, 1024),
        Err(InsightError::MalformedResponse(_))
    ));

    let wrong_shape = Scripted::replying(r#"{"title": "missing name"}"#);
    assert!(matches!(
        generate_workout(&wrong_shape, &req, 1024),
        Err(InsightError::MalformedResponse(_))
    ));

    let down = Scripted::failing(529);
    assert!(matches!(
        generate_workout(&down, &req, 1024),
        Err(InsightError::Generation(AiError::Status { status: 529, .. }))
    ));
}

#[test]
fn test_generate_insights() {
    let history = vec![bench_workout("w2", now() - Duration::days(1)), bench_workout("w1", now() - Duration::days(3))];
    let generator = Scripted::replying(
        r#"Sure, here are my thoughts:
[
  {"type": "celebration", "title": "Consistent pressing", "content": "Two bench sessions this week."},
  {"type": "warning", "title": "No leg work", "content": "Add a lower body day."}
]"#,
    );

    let insights = generate_insights(&generator, &history, now(), 512).unwrap();
    assert_eq!(insights.len(), 2);
    assert_eq!(insights[0].insight_type, InsightType::Celebration);
    assert_eq!(insights[1].insight_type, InsightType::Warning);
    assert_eq!(insights[1].id, format!("ai-{}-1", now().timestamp_millis()));
    assert!(insights.iter().all(|i| !i.is_read && i.created_at == now()));

    // Nothing to analyse means no model call.
    let idle = Scripted::replying("[]");
    assert!(generate_insights(&idle, &[], now(), 512).unwrap().is_empty());
    assert_eq!(idle.calls.get(), 0);

    let bad_type = Scripted::replying(r#"[{"type": "rant", "title": "x", "content": "y"}]"#);
    assert!(matches!(
        generate_insights(&bad_type, &history, now(), 512),
        Err(InsightError::MalformedResponse(_))
    ));
}

#[test]
fn test_workout_summary_covers_last_thirty_days() {
    let history = vec![
        bench_workout("recent", now() - Duration::days(2)),
        bench_workout("old", now() - Duration::days(45)),
    ];
    let summary = prepare_workout_summary(&history, now());

    assert!(summary.contains("- Total workouts: 1"));
    assert!(summary.contains("- Total volume: 0.4k kg"));
    assert!(summary.contains("- Average duration: 50 minutes"));
    assert!(summary.contains("- Barbell Bench Press: 1 sessions, max weight 80kg, volume 0.4k kg"));
    assert!(summary.contains("WORKOUT FREQUENCY BY DAY:"));
}
