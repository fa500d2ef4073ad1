use chrono::{DateTime, Duration, Local, NaiveDate, TimeZone, Utc};
use gym_tracker_lib::history::{SavedExercise, SavedSet, SavedWorkout};
use gym_tracker_lib::records::{
    beats_record, calculate_all_prs, calculate_day_streak, calculate_day_streak_on, get_exercise_pr,
    get_prs_this_month, longest_day_streak, prs_since_month_start, workout_stats,
};

// Noon UTC keeps each workout on its own local calendar day in any timezone.
fn day(n: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap() + Duration::days(n)
}

fn local_day(date: DateTime<Utc>) -> NaiveDate {
    date.with_timezone(&Local).date_naive()
}

fn done(weight: f64, reps: i64) -> SavedSet {
    SavedSet {
        weight: Some(weight),
        reps: Some(reps),
        completed: true,
    }
}

fn workout(id: &str, date: DateTime<Utc>, exercises: Vec<(&str, Vec<SavedSet>)>) -> SavedWorkout {
    let exercises: Vec<SavedExercise> = exercises
        .into_iter()
        .map(|(name, sets)| SavedExercise {
            name: name.to_string(),
            sets,
        })
        .collect();
    let volume = exercises
        .iter()
        .flat_map(|e| e.sets.iter())
        .map(SavedSet::volume)
        .sum();
    SavedWorkout {
        id: id.to_string(),
        name: format!("Workout {id}"),
        date,
        duration: 3600,
        exercises,
        volume,
        rating: None,
        notes: None,
    }
}

#[test]
fn test_prs_pick_best_score_and_first_date() {
    let history = vec![
        // Most recent first, as stored.
        workout("w3", day(2), vec![("Squat", vec![done(100.0, 5)])]),
        workout("w2", day(1), vec![("Bench", vec![done(80.0, 5), done(90.0, 3)])]),
        workout("w1", day(0), vec![("Bench", vec![done(80.0, 5)]), ("Squat", vec![done(90.0, 5)])]),
    ];

    let prs = calculate_all_prs(&history);
    let names: Vec<&str> = prs.iter().map(|p| p.exercise_name.as_str()).collect();
    assert_eq!(names, vec!["Bench", "Squat"]);

    // 80x5 (400) beats 90x3 (270); the tie in w2 does not move the date.
    let bench = &prs[0];
    assert_eq!((bench.weight, bench.reps), (80.0, 5));
    assert_eq!(bench.workout_id, "w1");
    assert_eq!(bench.date, day(0));
    assert_eq!(bench.score, 400.0);

    let squat = &prs[1];
    assert_eq!(squat.workout_id, "w3");
    assert_eq!(squat.weight, 100.0);
}

#[test]
fn test_equal_score_needs_heavier_weight() {
    let history = vec![
        workout("b", day(1), vec![("Row", vec![done(100.0, 4)])]),
        workout("a", day(0), vec![("Row", vec![done(80.0, 5)])]),
    ];
    let pr = get_exercise_pr(&history, "Row").unwrap();
    assert_eq!(pr.weight, 100.0);
    assert_eq!(pr.workout_id, "b");

    assert!(!beats_record(&pr, 80.0, 5));
    assert!(beats_record(&pr, 50.0, 9));
    assert!(!beats_record(&pr, 100.0, 4));
}

#[test]
fn test_unqualified_sets_are_ignored() {
    let history = vec![workout(
        "w",
        day(0),
        vec![(
            "Deadlift",
            vec![
                SavedSet {
                    weight: Some(200.0),
                    reps: Some(1),
                    completed: false,
                },
                SavedSet {
                    weight: Some(0.0),
                    reps: Some(10),
                    completed: true,
                },
                SavedSet {
                    weight: Some(150.0),
                    reps: None,
                    completed: true,
                },
            ],
        )],
    )];
    assert!(calculate_all_prs(&history).is_empty());
    assert!(get_exercise_pr(&history, "Deadlift").is_none());
    assert!(calculate_all_prs(&[]).is_empty());
}

#[test]
fn test_prs_since_month_start() {
    let history = vec![
        workout("june", Utc.with_ymd_and_hms(2024, 6, 3, 12, 0, 0).unwrap(), vec![("Bench", vec![done(90.0, 5)])]),
        workout("may", Utc.with_ymd_and_hms(2024, 5, 20, 12, 0, 0).unwrap(), vec![("Squat", vec![done(120.0, 5)])]),
    ];
    let today = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
    let recent = prs_since_month_start(&history, today);
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].exercise_name, "Bench");
}

#[test]
fn test_day_streak() {
    let history = vec![
        workout("d", day(5), vec![]),
        workout("c2", day(4), vec![]),
        workout("c", day(4), vec![]),
        workout("b", day(3), vec![]),
        workout("a", day(1), vec![]),
    ];

    // Multiple workouts on one day count once.
    assert_eq!(calculate_day_streak_on(&history, local_day(day(5))), 3);
    // Yesterday still counts as ongoing.
    assert_eq!(calculate_day_streak_on(&history, local_day(day(6))), 3);
    // Older than yesterday is broken.
    assert_eq!(calculate_day_streak_on(&history, local_day(day(7))), 0);
    assert_eq!(calculate_day_streak_on(&[], local_day(day(0))), 0);
}

fn local_at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Local
        .with_ymd_and_hms(2024, 6, day, hour, minute, 0)
        .earliest()
        .unwrap()
        .with_timezone(&Utc)
}

#[test]
fn test_day_streak_counts_calendar_days_across_midnight() {
    // An hour apart but on two local days.
    let history = vec![
        workout("after", local_at(10, 0, 30), vec![]),
        workout("before", local_at(9, 23, 30), vec![]),
    ];
    let today = NaiveDate::from_ymd_opt(2024, 6, 10).unwrap();
    assert_eq!(calculate_day_streak_on(&history, today), 2);

    // Twenty-three hours apart on one local day.
    let same_day = vec![
        workout("late", local_at(10, 23, 30), vec![]),
        workout("early", local_at(10, 0, 30), vec![]),
    ];
    assert_eq!(calculate_day_streak_on(&same_day, today), 1);
}

#[test]
fn test_now_variants_use_the_current_local_date() {
    let now = Utc::now();
    let fresh = vec![workout("today", now, vec![("Deadlift", vec![done(140.0, 3)])])];
    assert_eq!(calculate_day_streak(&fresh), 1);
    let prs = get_prs_this_month(&fresh);
    assert_eq!(prs.len(), 1);
    assert_eq!(prs[0].exercise_name, "Deadlift");

    let stale = vec![workout("old", now - Duration::days(40), vec![("Deadlift", vec![done(140.0, 3)])])];
    assert_eq!(calculate_day_streak(&stale), 0);
    assert!(get_prs_this_month(&stale).is_empty());
}

#[test]
fn test_longest_streak_anywhere_in_history() {
    let history = vec![
        workout("e", day(10), vec![]),
        workout("d", day(6), vec![]),
        workout("c", day(5), vec![]),
        workout("b", day(4), vec![]),
        workout("a", day(0), vec![]),
    ];
    assert_eq!(longest_day_streak(&history), 3);
    assert_eq!(longest_day_streak(&[]), 0);
}

#[test]
fn test_workout_stats_windows() {
    // 2024-06-12 is a Wednesday; the week starts Monday 2024-06-10.
    let at = |d: u32| Utc.with_ymd_and_hms(2024, 6, d, 12, 0, 0).unwrap();
    let history = vec![
        workout("wed", at(12), vec![("Bench", vec![done(100.0, 5), done(100.0, 5)])]),
        workout("mon", at(10), vec![("Squat", vec![done(100.0, 5)])]),
        workout("sun", at(9), vec![("Row", vec![done(50.0, 10)])]),
        workout("may", Utc.with_ymd_and_hms(2024, 5, 28, 12, 0, 0).unwrap(), vec![]),
    ];
    let today = local_day(at(12));

    let stats = workout_stats(&history, today);
    assert_eq!(stats.total_workouts, 4);
    assert_eq!(stats.total_sets, 4);
    assert_eq!(stats.total_volume, 2000.0);
    assert_eq!(stats.total_duration_sec, 4 * 3600);
    assert_eq!(stats.workouts_this_week, 2);
    assert_eq!(stats.workouts_this_month, 3);
    assert_eq!(stats.current_streak, 1);
    assert_eq!(stats.longest_streak, 2);
}

#[test]
fn test_more_reps_at_same_weight_takes_the_record() {
    let history = vec![
        workout("later", day(3), vec![("Press", vec![done(100.0, 6)])]),
        workout("earlier", day(1), vec![("Press", vec![done(100.0, 5)])]),
    ];
    let pr = get_exercise_pr(&history, "Press").unwrap();
    assert_eq!(pr.reps, 6);
    assert_eq!(pr.date, day(3));
    assert_eq!(pr.score, 600.0);
}
