// src/achievements.rs
use crate::db::{get_enum, get_json, get_opt_timestamp, list_or_empty, DbError};
use crate::history::SavedWorkout;
use crate::records::{calculate_all_prs, longest_day_streak};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use strum_macros::{Display, EnumString};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AchievementCategory {
    Consistency,
    Strength,
    Endurance,
    Milestone,
    Social,
}

/// Unlock conditions this crate knows how to evaluate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KnownCriteria {
    WorkoutCount { count: u32 },
    DayStreak { days: u32 },
    TotalVolume { kg: f64 },
    /// Number of distinct exercises with a personal record.
    PrCount { count: u32 },
    ExerciseWeight { exercise: String, weight_kg: f64 },
}

/// Criteria as stored. Anything not recognised is kept verbatim and never
/// evaluated locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AchievementCriteria {
    Known(KnownCriteria),
    Custom(serde_json::Value),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Achievement {
    pub id: String,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub category: AchievementCategory,
    pub criteria: AchievementCriteria,
    pub points: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AchievementWithProgress {
    pub achievement: Achievement,
    pub unlocked: bool,
    /// Percent towards unlocking, 0..=100.
    pub progress: f64,
    pub unlocked_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserAchievement {
    pub achievement_id: String,
    pub progress: f64,
    pub unlocked_at: Option<DateTime<Utc>>,
}

/// Aggregates of a workout history that criteria are measured against.
#[derive(Debug, Clone, Default)]
pub struct ProgressSnapshot {
    pub workout_count: u32,
    pub longest_streak: u32,
    pub total_volume: f64,
    pub pr_count: u32,
    /// Best weight per exercise, keyed by lowercase name.
    pub best_weights: HashMap<String, f64>,
}

impl ProgressSnapshot {
    #[must_use]
    pub fn from_history(history: &[SavedWorkout]) -> Self {
        let prs = calculate_all_prs(history);
        let mut best_weights: HashMap<String, f64> = HashMap::new();
        for workout in history {
            for exercise in &workout.exercises {
                for set in exercise.sets.iter().filter(|s| s.qualifies()) {
                    let weight = set.weight.unwrap_or(0.0);
                    let best = best_weights.entry(exercise.name.to_lowercase()).or_insert(0.0);
                    if weight > *best {
                        *best = weight;
                    }
                }
            }
        }
        Self {
            workout_count: history.len() as u32,
            longest_streak: longest_day_streak(history),
            total_volume: history.iter().map(|w| w.volume).sum(),
            pr_count: prs.len() as u32,
            best_weights,
        }
    }
}

fn percent(current: f64, target: f64) -> f64 {
    if target <= 0.0 {
        return 100.0;
    }
    (current / target * 100.0).clamp(0.0, 100.0)
}

impl AchievementCriteria {
    /// Percent towards the goal, or `None` for criteria that cannot be
    /// evaluated locally.
    #[must_use]
    pub fn progress(&self, snapshot: &ProgressSnapshot) -> Option<f64> {
        let AchievementCriteria::Known(known) = self else {
            return None;
        };
        let pct = match known {
            KnownCriteria::WorkoutCount { count } => {
                percent(f64::from(snapshot.workout_count), f64::from(*count))
            }
            KnownCriteria::DayStreak { days } => {
                percent(f64::from(snapshot.longest_streak), f64::from(*days))
            }
            KnownCriteria::TotalVolume { kg } => percent(snapshot.total_volume, *kg),
            KnownCriteria::PrCount { count } => {
                percent(f64::from(snapshot.pr_count), f64::from(*count))
            }
            KnownCriteria::ExerciseWeight {
                exercise,
                weight_kg,
            } => {
                let best = snapshot
                    .best_weights
                    .get(&exercise.to_lowercase())
                    .copied()
                    .unwrap_or(0.0);
                percent(best, *weight_kg)
            }
        };
        Some(pct)
    }
}

fn known(criteria: KnownCriteria) -> AchievementCriteria {
    AchievementCriteria::Known(criteria)
}

fn achievement(
    id: &str,
    name: &str,
    description: &str,
    icon: &str,
    category: AchievementCategory,
    criteria: AchievementCriteria,
    points: u32,
) -> Achievement {
    Achievement {
        id: id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        icon: icon.to_string(),
        category,
        criteria,
        points,
    }
}

/// The built-in achievement catalogue.
#[must_use]
pub fn default_achievements() -> Vec<Achievement> {
    use AchievementCategory::{Consistency, Endurance, Milestone, Social, Strength};
    use KnownCriteria::{DayStreak, ExerciseWeight, PrCount, TotalVolume, WorkoutCount};

    vec![
        achievement("first-workout", "First Steps", "Complete your first workout", "🏁", Milestone, known(WorkoutCount { count: 1 }), 10),
        achievement("first-pr", "Record Breaker", "Set your first personal record", "🏅", Strength, known(PrCount { count: 1 }), 10),
        achievement("streak-3", "On a Roll", "Work out 3 days in a row", "🔥", Consistency, known(DayStreak { days: 3 }), 15),
        achievement("workouts-10", "Getting Serious", "Complete 10 workouts", "💪", Milestone, known(WorkoutCount { count: 10 }), 25),
        achievement("volume-10k", "Ten Tonnes", "Lift 10,000 kg in total", "🏋️", Endurance, known(TotalVolume { kg: 10_000.0 }), 30),
        achievement("share-workout", "Spread the Word", "Share a workout with a friend", "📣", Social, AchievementCriteria::Custom(serde_json::json!({ "type": "shared_workouts", "count": 1 })), 20),
        achievement("workouts-50", "Dedicated", "Complete 50 workouts", "🎯", Milestone, known(WorkoutCount { count: 50 }), 50),
        achievement("streak-7", "Week Warrior", "Work out 7 days in a row", "📅", Consistency, known(DayStreak { days: 7 }), 50),
        achievement("prs-10", "PR Machine", "Hold personal records in 10 exercises", "📈", Strength, known(PrCount { count: 10 }), 50),
        achievement("bench-100", "Two Plates", "Bench press 100 kg", "🥇", Strength, known(ExerciseWeight { exercise: "Barbell Bench Press".to_string(), weight_kg: 100.0 }), 75),
        achievement("workouts-100", "Centurion", "Complete 100 workouts", "🏆", Milestone, known(WorkoutCount { count: 100 }), 100),
        achievement("volume-100k", "Heavy Lifter", "Lift 100,000 kg in total", "🚛", Endurance, known(TotalVolume { kg: 100_000.0 }), 100),
        achievement("squat-140", "Three Plates", "Back squat 140 kg", "🦵", Strength, known(ExerciseWeight { exercise: "Barbell Back Squat".to_string(), weight_kg: 140.0 }), 100),
        achievement("streak-30", "Unstoppable", "Work out 30 days in a row", "⚡", Consistency, known(DayStreak { days: 30 }), 150),
        achievement("deadlift-180", "Four Plates", "Deadlift 180 kg", "🦍", Strength, known(ExerciseWeight { exercise: "Conventional Deadlift".to_string(), weight_kg: 180.0 }), 150),
    ]
}

/// Inserts any catalogue entries not yet present.
pub fn seed_defaults(conn: &Connection) -> Result<(), DbError> {
    for a in default_achievements() {
        conn.execute(
            "INSERT OR IGNORE INTO achievements (id, name, description, icon, category, criteria, points)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                a.id,
                a.name,
                a.description,
                a.icon,
                a.category.to_string(),
                serde_json::to_string(&a.criteria)?,
                a.points,
            ],
        )
        .map_err(DbError::InsertFailed)?;
    }
    Ok(())
}

fn map_row_to_achievement(row: &Row) -> Result<Achievement, rusqlite::Error> {
    Ok(Achievement {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        icon: row.get(3)?,
        category: get_enum(row, 4)?,
        criteria: get_json(row, 5)?,
        points: row.get(6)?,
    })
}

/// The catalogue ordered by points, lowest first.
pub fn list_achievements(conn: &Connection) -> Result<Vec<Achievement>, DbError> {
    list_or_empty("achievements", || {
        let mut stmt = conn.prepare(
            "SELECT id, name, description, icon, category, criteria, points
             FROM achievements
             ORDER BY points ASC, id ASC",
        )?;
        let rows = stmt.query_map([], map_row_to_achievement)?;
        rows.collect()
    })
}

pub fn user_progress(conn: &Connection, user_id: &str) -> Result<HashMap<String, UserAchievement>, DbError> {
    let rows = list_or_empty("user_achievements", || {
        let mut stmt = conn.prepare(
            "SELECT achievement_id, progress, unlocked_at FROM user_achievements WHERE user_id = ?1",
        )?;
        let rows = stmt.query_map(params![user_id], |row| {
            Ok(UserAchievement {
                achievement_id: row.get(0)?,
                progress: row.get(1)?,
                unlocked_at: get_opt_timestamp(row, 2)?,
            })
        })?;
        rows.collect()
    })?;
    Ok(rows
        .into_iter()
        .map(|ua| (ua.achievement_id.clone(), ua))
        .collect())
}

/// The catalogue merged with the user's progress. Without a user every
/// achievement is locked at 0%.
pub fn list_with_progress(
    conn: &Connection,
    user_id: Option<&str>,
) -> Result<Vec<AchievementWithProgress>, DbError> {
    let catalogue = list_achievements(conn)?;
    let progress = match user_id {
        Some(id) => user_progress(conn, id)?,
        None => HashMap::new(),
    };
    Ok(catalogue
        .into_iter()
        .map(|achievement| {
            let ua = progress.get(&achievement.id);
            AchievementWithProgress {
                unlocked: ua.is_some_and(|u| u.unlocked_at.is_some()),
                progress: ua.map_or(0.0, |u| u.progress),
                unlocked_at: ua.and_then(|u| u.unlocked_at),
                achievement,
            }
        })
        .collect())
}

#[must_use]
pub fn total_points(achievements: &[AchievementWithProgress]) -> u32 {
    achievements
        .iter()
        .filter(|a| a.unlocked)
        .map(|a| a.achievement.points)
        .sum()
}

/// Recomputes progress from `history`, stores it, and unlocks anything that
/// reached 100%. Unlocks are permanent. Returns the newly unlocked achievements.
pub fn evaluate(
    conn: &Connection,
    user_id: &str,
    history: &[SavedWorkout],
    now: DateTime<Utc>,
) -> Result<Vec<Achievement>, DbError> {
    let snapshot = ProgressSnapshot::from_history(history);
    let existing = user_progress(conn, user_id)?;
    let mut newly_unlocked = Vec::new();

    for achievement in list_achievements(conn)? {
        let Some(progress) = achievement.criteria.progress(&snapshot) else {
            continue;
        };
        let previous = existing.get(&achievement.id);
        if previous.is_some_and(|p| p.unlocked_at.is_some()) {
            continue;
        }
        let unlocked_at = (progress >= 100.0).then_some(now);

        conn.execute(
            "INSERT INTO user_achievements (user_id, achievement_id, progress, unlocked_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(user_id, achievement_id) DO UPDATE SET progress = excluded.progress,
                 unlocked_at = excluded.unlocked_at",
            params![
                user_id,
                achievement.id,
                progress,
                unlocked_at.map(|t| t.to_rfc3339())
            ],
        )
        .map_err(DbError::UpdateFailed)?;

        if unlocked_at.is_some() {
            info!("Unlocked achievement '{}' for user {}", achievement.name, user_id);
            newly_unlocked.push(achievement);
        } else {
            debug!("Achievement '{}' at {:.0}%", achievement.name, progress);
        }
    }
    Ok(newly_unlocked)
}
