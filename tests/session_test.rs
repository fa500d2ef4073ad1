use chrono::{DateTime, Duration, TimeZone, Utc};
use gym_tracker_lib::library::find_exercise;
use gym_tracker_lib::session::{
    ActiveWorkout, CardioLog, ManualClock, SetType, SetUpdate, WorkoutDetails, WorkoutStatus,
};

fn start_instant() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 4, 18, 0, 0).unwrap()
}

fn new_workout() -> (ActiveWorkout<ManualClock>, ManualClock) {
    let clock = ManualClock::new(start_instant());
    (ActiveWorkout::with_clock(clock.clone()), clock)
}

fn set(reps: i64, weight_kg: f64) -> SetUpdate {
    SetUpdate {
        reps: Some(reps),
        weight_kg: Some(weight_kg),
        ..SetUpdate::default()
    }
}

#[test]
fn test_idle_workout_operations_are_no_ops() {
    let (mut workout, _clock) = new_workout();

    assert!(!workout.is_active());
    assert!(!workout.pause());
    assert!(!workout.resume());
    assert!(workout.end().is_none());
    assert!(workout.exercise_logs().is_empty());
    assert_eq!(workout.elapsed_seconds(), 0);
    let bench = find_exercise("bench-press").unwrap().clone();
    assert!(workout.add_exercise(bench).is_none());
    assert!(workout.add_set(0).is_none());
    assert!(!workout.update_details(WorkoutDetails::default()));
    workout.cancel();
}

#[test]
fn test_elapsed_time_excludes_pauses() {
    let (mut workout, clock) = new_workout();
    workout.start("Evening");

    clock.advance(Duration::seconds(600));
    assert_eq!(workout.elapsed_seconds(), 600);

    assert!(workout.pause());
    assert!(!workout.pause());
    assert!(workout.is_paused());
    clock.advance(Duration::seconds(300));
    // Frozen while paused.
    assert_eq!(workout.elapsed_seconds(), 600);

    assert!(workout.resume());
    assert!(!workout.resume());
    clock.advance(Duration::seconds(120));
    assert_eq!(workout.elapsed_seconds(), 720);

    let finished = workout.end().unwrap();
    assert_eq!(finished.session.status, WorkoutStatus::Completed);
    assert_eq!(finished.session.duration_sec, Some(720));
    assert_eq!(
        finished.session.completed_at,
        Some(start_instant() + Duration::seconds(1020))
    );
    assert!(!workout.is_active());
}

#[test]
fn test_end_while_paused_uses_pause_instant() {
    let (mut workout, clock) = new_workout();
    workout.start("Paused");
    clock.advance(Duration::seconds(90));
    workout.pause();
    clock.advance(Duration::seconds(3600));

    let finished = workout.end().unwrap();
    assert_eq!(finished.session.duration_sec, Some(90));
}

#[test]
fn test_sets_copy_previous_values_and_renumber() {
    let (mut workout, _clock) = new_workout();
    workout.start("Sets");
    let bench = find_exercise("bench-press").unwrap().clone();
    let ex = workout.add_exercise(bench).unwrap();

    let s0 = workout.add_set(ex).unwrap();
    assert!(workout.update_set(ex, s0, set(8, 80.0)));
    let s1 = workout.add_set(ex).unwrap();
    let s2 = workout.add_set(ex).unwrap();

    let sets = &workout.exercise_logs()[ex].sets;
    assert_eq!(sets[s1].reps, Some(8));
    assert_eq!(sets[s2].weight_kg, Some(80.0));
    assert_eq!(sets[s2].set_type, SetType::Working);
    assert!(sets.iter().all(|s| !s.is_completed()));

    assert!(workout.remove_set(ex, 0));
    assert!(!workout.remove_set(ex, 5));
    let numbers: Vec<u32> = workout.exercise_logs()[ex]
        .sets
        .iter()
        .map(|s| s.set_number)
        .collect();
    assert_eq!(numbers, vec![1, 2]);
}

#[test]
fn test_complete_and_uncomplete_sets_drive_totals() {
    let (mut workout, clock) = new_workout();
    workout.start("Totals");
    let squat = find_exercise("barbell-squat").unwrap().clone();
    let ex = workout.add_exercise(squat).unwrap();
    let s0 = workout.add_set(ex).unwrap();
    let s1 = workout.add_set(ex).unwrap();

    clock.advance(Duration::seconds(45));
    assert!(workout.complete_set(ex, s0, set(5, 100.0)));
    assert!(workout.complete_set(
        ex,
        s1,
        SetUpdate {
            reps: Some(3),
            weight_kg: Some(110.0),
            set_type: Some(SetType::Failure),
            rpe: Some(9.5),
            ..SetUpdate::default()
        }
    ));
    assert!(!workout.complete_set(ex, 7, set(1, 1.0)));

    assert_eq!(workout.total_sets(), 2);
    assert_eq!(workout.total_volume(), 830.0);
    let completed = &workout.exercise_logs()[ex].sets[s0];
    assert_eq!(completed.completed_at, Some(start_instant() + Duration::seconds(45)));

    assert!(workout.uncomplete_set(ex, s1));
    assert_eq!(workout.total_sets(), 1);
    assert_eq!(workout.total_volume(), 500.0);
    // Values stay after uncompleting.
    assert_eq!(workout.exercise_logs()[ex].sets[s1].set_type, SetType::Failure);
}

#[test]
fn test_remove_exercise_reindexes() {
    let (mut workout, _clock) = new_workout();
    workout.start("Order");
    for id in ["bench-press", "barbell-row", "barbell-squat"] {
        workout.add_exercise(find_exercise(id).unwrap().clone());
    }

    assert!(workout.remove_exercise(0));
    assert!(!workout.remove_exercise(9));
    let order: Vec<(usize, &str)> = workout
        .exercise_logs()
        .iter()
        .map(|log| (log.order_index, log.exercise.id.as_str()))
        .collect();
    assert_eq!(order, vec![(0, "barbell-row"), (1, "barbell-squat")]);
    assert_eq!(
        workout.current_exercise().map(|log| log.exercise.id.as_str()),
        Some("barbell-squat")
    );
}

#[test]
fn test_cardio_log_only_on_cardio_exercises() {
    let (mut workout, _clock) = new_workout();
    workout.start("Cardio");
    let run = workout
        .add_exercise(find_exercise("running").unwrap().clone())
        .unwrap();
    let bench = workout
        .add_exercise(find_exercise("bench-press").unwrap().clone())
        .unwrap();

    assert!(workout.exercise_logs()[run].cardio_log.is_some());
    assert!(workout.exercise_logs()[bench].cardio_log.is_none());

    assert!(workout.update_cardio_log(
        run,
        CardioLog {
            duration_sec: Some(1800),
            distance_km: Some(5.0),
            ..CardioLog::default()
        }
    ));
    assert!(workout.update_cardio_log(
        run,
        CardioLog {
            avg_heart_rate: Some(150),
            ..CardioLog::default()
        }
    ));
    assert!(!workout.update_cardio_log(bench, CardioLog::default()));

    let cardio = workout.exercise_logs()[run].cardio_log.clone().unwrap();
    assert_eq!(cardio.duration_sec, Some(1800));
    assert_eq!(cardio.distance_km, Some(5.0));
    assert_eq!(cardio.avg_heart_rate, Some(150));
}

#[test]
fn test_rest_timer_counts_down_to_zero() {
    let (mut workout, clock) = new_workout();
    workout.start("Rest");
    assert_eq!(workout.rest_timer_remaining(), 0);

    workout.start_rest_timer(90);
    assert_eq!(workout.rest_timer_remaining(), 90);
    clock.advance(Duration::seconds(30));
    assert_eq!(workout.rest_timer_remaining(), 60);
    clock.advance(Duration::seconds(120));
    assert_eq!(workout.rest_timer_remaining(), 0);

    workout.start_rest_timer(60);
    workout.cancel_rest_timer();
    assert_eq!(workout.rest_timer_remaining(), 0);
}

#[test]
fn test_start_replaces_active_workout() {
    let (mut workout, _clock) = new_workout();
    let first_id = workout.start("First").id.clone();
    workout.add_exercise(find_exercise("bench-press").unwrap().clone());
    workout.start_rest_timer(60);

    let second = workout.start("  Second  ").clone();
    assert_ne!(second.id, first_id);
    assert_eq!(second.name, "Second");
    assert_eq!(second.status, WorkoutStatus::InProgress);
    assert!(workout.exercise_logs().is_empty());
    assert_eq!(workout.rest_timer_remaining(), 0);
}

#[test]
fn test_details_merge_and_cancel() {
    let (mut workout, _clock) = new_workout();
    workout.start("Details");
    assert!(workout.update_details(WorkoutDetails {
        rating: Some(4),
        notes: Some("Felt strong".to_string()),
        ..WorkoutDetails::default()
    }));
    assert!(workout.update_details(WorkoutDetails {
        perceived_exertion: Some(8),
        ..WorkoutDetails::default()
    }));

    let session = workout.session().unwrap();
    assert_eq!(session.rating, Some(4));
    assert_eq!(session.perceived_exertion, Some(8));
    assert_eq!(session.notes.as_deref(), Some("Felt strong"));

    workout.cancel();
    assert!(!workout.is_active());
    assert!(workout.end().is_none());
}

#[test]
fn test_thirty_second_pause_inside_fifty_seconds() {
    let (mut workout, clock) = new_workout();
    workout.start("Short");
    clock.advance(Duration::seconds(10));
    workout.pause();
    clock.advance(Duration::seconds(30));
    workout.resume();
    clock.advance(Duration::seconds(10));
    assert_eq!(workout.elapsed_seconds(), 20);

    workout.cancel();
    workout.cancel();
    assert!(workout.end().is_none());
}

#[test]
fn test_elapsed_time_across_several_pauses_with_sub_second_offsets() {
    let (mut workout, clock) = new_workout();
    workout.start("Intervals");

    clock.advance(Duration::milliseconds(2_500));
    assert!(workout.pause());
    clock.advance(Duration::milliseconds(4_000));
    assert!(workout.resume());

    // A pause that lasts no time at all.
    clock.advance(Duration::milliseconds(1_200));
    assert!(workout.pause());
    assert!(workout.resume());
    assert_eq!(workout.elapsed_seconds(), 3);

    clock.advance(Duration::milliseconds(1_800));
    assert!(workout.pause());
    clock.advance(Duration::milliseconds(10_000));
    // 2.5 + 1.2 + 1.8 active seconds; frozen while paused.
    assert_eq!(workout.elapsed_seconds(), 5);
    assert!(workout.resume());

    clock.advance(Duration::milliseconds(2_700));
    assert_eq!(workout.elapsed_seconds(), 8);

    let finished = workout.end().unwrap();
    assert_eq!(finished.session.duration_sec, Some(8));
}
