// src/records.rs
//! Personal records, streaks and summary stats derived from workout history.
//!
//! Everything here is a pure function of the history slice; nothing is cached.
//! Calendar-day logic uses the local timezone.
use crate::fitness::calculate_1rm;
use crate::history::SavedWorkout;
use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, Utc};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersonalRecord {
    pub exercise_name: String,
    pub weight: f64,
    pub reps: i64,
    /// `weight x reps`
    pub score: f64,
    pub date: DateTime<Utc>,
    pub workout_id: String,
    pub estimated_1rm: f64,
}

/// Does a `weight x reps` set replace `record`? Higher score wins; an equal
/// score wins only with a heavier weight.
#[must_use]
pub fn beats_record(record: &PersonalRecord, weight: f64, reps: i64) -> bool {
    let score = weight * reps as f64;
    score > record.score || (score == record.score && weight > record.weight)
}

fn local_day(date: DateTime<Utc>) -> NaiveDate {
    date.with_timezone(&Local).date_naive()
}

/// Best set per exercise name across the whole history.
///
/// Workouts are scanned oldest first so a record carries the date it was
/// first achieved. The result is sorted by exercise name.
#[must_use]
pub fn calculate_all_prs(history: &[SavedWorkout]) -> Vec<PersonalRecord> {
    let mut ordered: Vec<&SavedWorkout> = history.iter().collect();
    ordered.sort_by_key(|w| w.date);

    let mut best: HashMap<&str, PersonalRecord> = HashMap::new();
    for workout in ordered {
        for exercise in &workout.exercises {
            for set in exercise.sets.iter().filter(|s| s.qualifies()) {
                let (Some(weight), Some(reps)) = (set.weight, set.reps) else {
                    continue;
                };
                let replace = best
                    .get(exercise.name.as_str())
                    .map_or(true, |current| beats_record(current, weight, reps));
                if replace {
                    best.insert(
                        exercise.name.as_str(),
                        PersonalRecord {
                            exercise_name: exercise.name.clone(),
                            weight,
                            reps,
                            score: weight * reps as f64,
                            date: workout.date,
                            workout_id: workout.id.clone(),
                            estimated_1rm: calculate_1rm(weight, reps),
                        },
                    );
                }
            }
        }
    }

    let mut records: Vec<PersonalRecord> = best.into_values().collect();
    records.sort_by(|a, b| a.exercise_name.cmp(&b.exercise_name));
    records
}

/// Records set on or after the first day of `today`'s month.
#[must_use]
pub fn prs_since_month_start(history: &[SavedWorkout], today: NaiveDate) -> Vec<PersonalRecord> {
    let month_start = today.with_day(1).unwrap_or(today);
    calculate_all_prs(history)
        .into_iter()
        .filter(|pr| local_day(pr.date) >= month_start)
        .collect()
}

/// [`prs_since_month_start`] for the current local date.
#[must_use]
pub fn get_prs_this_month(history: &[SavedWorkout]) -> Vec<PersonalRecord> {
    prs_since_month_start(history, Local::now().date_naive())
}

#[must_use]
pub fn get_exercise_pr(history: &[SavedWorkout], exercise_name: &str) -> Option<PersonalRecord> {
    calculate_all_prs(history)
        .into_iter()
        .find(|pr| pr.exercise_name == exercise_name)
}

// Unique workout days, newest first.
fn workout_days_desc(history: &[SavedWorkout]) -> Vec<NaiveDate> {
    let days: BTreeSet<NaiveDate> = history.iter().map(|w| local_day(w.date)).collect();
    days.into_iter().rev().collect()
}

/// Consecutive workout days ending today or yesterday. A streak whose last
/// day is older than yesterday counts as broken (0).
#[must_use]
pub fn calculate_day_streak_on(history: &[SavedWorkout], today: NaiveDate) -> u32 {
    let days = workout_days_desc(history);
    let Some(&latest) = days.first() else {
        return 0;
    };
    if latest != today && latest != today - Duration::days(1) {
        return 0;
    }

    let mut streak = 1;
    let mut cursor = latest;
    for &day in &days[1..] {
        if day == cursor - Duration::days(1) {
            streak += 1;
            cursor = day;
        } else {
            break;
        }
    }
    streak
}

/// [`calculate_day_streak_on`] for the current local date.
#[must_use]
pub fn calculate_day_streak(history: &[SavedWorkout]) -> u32 {
    calculate_day_streak_on(history, Local::now().date_naive())
}

/// Longest run of consecutive workout days anywhere in the history.
#[must_use]
pub fn longest_day_streak(history: &[SavedWorkout]) -> u32 {
    let days = workout_days_desc(history);
    let mut longest = 0;
    let mut current = 0;
    let mut previous: Option<NaiveDate> = None;
    for day in days {
        current = match previous {
            Some(prev) if prev - Duration::days(1) == day => current + 1,
            _ => 1,
        };
        longest = longest.max(current);
        previous = Some(day);
    }
    longest
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WorkoutStats {
    pub total_workouts: usize,
    pub total_volume: f64,
    pub total_duration_sec: u64,
    pub total_sets: usize,
    pub current_streak: u32,
    pub longest_streak: u32,
    /// ISO week (Monday start) containing `today`.
    pub workouts_this_week: usize,
    pub workouts_this_month: usize,
}

#[must_use]
pub fn workout_stats(history: &[SavedWorkout], today: NaiveDate) -> WorkoutStats {
    let week_start = today - Duration::days(i64::from(today.weekday().num_days_from_monday()));
    let month_start = today.with_day(1).unwrap_or(today);

    let mut stats = WorkoutStats {
        total_workouts: history.len(),
        current_streak: calculate_day_streak_on(history, today),
        longest_streak: longest_day_streak(history),
        ..WorkoutStats::default()
    };
    for workout in history {
        stats.total_volume += workout.volume;
        stats.total_duration_sec += workout.duration;
        stats.total_sets += workout.completed_sets();

        let day = local_day(workout.date);
        if day >= week_start && day <= today {
            stats.workouts_this_week += 1;
        }
        if day >= month_start && day <= today {
            stats.workouts_this_month += 1;
        }
    }
    stats
}
