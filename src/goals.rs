// src/goals.rs
use crate::db::{get_enum, get_opt_timestamp, get_timestamp, list_or_empty, opt_rfc3339, DbError};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, ToSql};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, EnumIter)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum GoalType {
    Weight,
    Strength,
    Cardio,
    WorkoutFrequency,
    Custom,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserGoal {
    pub id: String,
    pub user_id: String,
    pub goal_type: GoalType,
    pub title: String,
    pub description: Option<String>,
    pub target_value: f64,
    pub current_value: f64,
    pub unit: String,
    pub exercise_id: Option<String>,
    pub deadline: Option<NaiveDate>,
    pub is_completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserGoal {
    /// Whole-number percentage towards the target, capped at 100.
    /// A zero target reports 0.
    #[must_use]
    pub fn progress_percentage(&self) -> u32 {
        if self.target_value == 0.0 {
            return 0;
        }
        let pct = (self.current_value / self.target_value * 100.0).round();
        pct.clamp(0.0, 100.0) as u32
    }
}

#[derive(Debug, Clone)]
pub struct NewGoal {
    pub goal_type: GoalType,
    pub title: String,
    pub description: Option<String>,
    pub target_value: f64,
    pub current_value: Option<f64>,
    pub unit: String,
    pub exercise_id: Option<String>,
    pub deadline: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default)]
pub struct GoalUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub target_value: Option<f64>,
    pub unit: Option<String>,
    pub deadline: Option<NaiveDate>,
}

const GOAL_COLUMNS: &str = "id, user_id, goal_type, title, description, target_value, current_value,
    unit, exercise_id, deadline, is_completed, completed_at, created_at, updated_at";

fn map_row_to_goal(row: &Row) -> Result<UserGoal, rusqlite::Error> {
    let deadline: Option<String> = row.get(9)?;
    let deadline = deadline
        .map(|s| {
            NaiveDate::parse_from_str(&s, "%Y-%m-%d").map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(9, rusqlite::types::Type::Text, Box::new(e))
            })
        })
        .transpose()?;

    Ok(UserGoal {
        id: row.get(0)?,
        user_id: row.get(1)?,
        goal_type: get_enum(row, 2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        target_value: row.get(5)?,
        current_value: row.get(6)?,
        unit: row.get(7)?,
        exercise_id: row.get(8)?,
        deadline,
        is_completed: row.get(10)?,
        completed_at: get_opt_timestamp(row, 11)?,
        created_at: get_timestamp(row, 12)?,
        updated_at: get_timestamp(row, 13)?,
    })
}

pub fn create_goal(
    conn: &Connection,
    user_id: &str,
    goal: &NewGoal,
    now: DateTime<Utc>,
) -> Result<UserGoal, DbError> {
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO user_goals (id, user_id, goal_type, title, description, target_value, current_value,
            unit, exercise_id, deadline, is_completed, completed_at, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 0, NULL, ?11, ?11)",
        params![
            id,
            user_id,
            goal.goal_type.to_string(),
            goal.title.trim(),
            goal.description,
            goal.target_value,
            goal.current_value.unwrap_or(0.0),
            goal.unit,
            goal.exercise_id,
            goal.deadline.map(|d| d.format("%Y-%m-%d").to_string()),
            now.to_rfc3339(),
        ],
    )
    .map_err(DbError::InsertFailed)?;
    info!("Created goal '{}' for user {}", goal.title, user_id);
    get_goal(conn, user_id, &id)?.ok_or(DbError::GoalNotFound(id))
}

pub fn get_goal(conn: &Connection, user_id: &str, id: &str) -> Result<Option<UserGoal>, DbError> {
    let sql = format!("SELECT {GOAL_COLUMNS} FROM user_goals WHERE id = ?1 AND user_id = ?2");
    conn.query_row(&sql, params![id, user_id], map_row_to_goal)
        .optional()
        .map_err(DbError::QueryFailed)
}

/// A user's goals, newest first. A missing table yields no goals.
pub fn list_goals(conn: &Connection, user_id: &str) -> Result<Vec<UserGoal>, DbError> {
    list_or_empty("user_goals", || {
        let sql = format!(
            "SELECT {GOAL_COLUMNS} FROM user_goals WHERE user_id = ?1 ORDER BY created_at DESC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![user_id], map_row_to_goal)?;
        rows.collect()
    })
}

pub fn update_goal(
    conn: &Connection,
    user_id: &str,
    id: &str,
    update: &GoalUpdate,
    now: DateTime<Utc>,
) -> Result<UserGoal, DbError> {
    let mut params: Vec<Box<dyn ToSql>> = Vec::new();
    let mut updates = Vec::new();

    if let Some(title) = &update.title {
        updates.push("title = ?");
        params.push(Box::new(title.clone()));
    }
    if let Some(description) = &update.description {
        updates.push("description = ?");
        params.push(Box::new(description.clone()));
    }
    if let Some(target) = update.target_value {
        updates.push("target_value = ?");
        params.push(Box::new(target));
    }
    if let Some(unit) = &update.unit {
        updates.push("unit = ?");
        params.push(Box::new(unit.clone()));
    }
    if let Some(deadline) = update.deadline {
        updates.push("deadline = ?");
        params.push(Box::new(deadline.format("%Y-%m-%d").to_string()));
    }
    updates.push("updated_at = ?");
    params.push(Box::new(now.to_rfc3339()));

    let sql = format!(
        "UPDATE user_goals SET {} WHERE id = ? AND user_id = ?",
        updates.join(", ")
    );
    params.push(Box::new(id.to_string()));
    params.push(Box::new(user_id.to_string()));
    let params_slice: Vec<&dyn ToSql> = params.iter().map(|b| b.as_ref()).collect();

    let rows_affected = conn
        .execute(&sql, params_slice.as_slice())
        .map_err(DbError::UpdateFailed)?;
    if rows_affected == 0 {
        return Err(DbError::GoalNotFound(id.to_string()));
    }
    get_goal(conn, user_id, id)?.ok_or_else(|| DbError::GoalNotFound(id.to_string()))
}

/// Records progress. The goal completes (and is stamped) once the current
/// value reaches the target; dropping below clears the completion.
pub fn update_goal_progress(
    conn: &Connection,
    user_id: &str,
    id: &str,
    current_value: f64,
    now: DateTime<Utc>,
) -> Result<UserGoal, DbError> {
    let goal = get_goal(conn, user_id, id)?.ok_or_else(|| DbError::GoalNotFound(id.to_string()))?;
    let is_completed = current_value >= goal.target_value;
    let completed_at = is_completed.then_some(now);

    conn.execute(
        "UPDATE user_goals SET current_value = ?1, is_completed = ?2, completed_at = ?3, updated_at = ?4
         WHERE id = ?5 AND user_id = ?6",
        params![
            current_value,
            is_completed,
            opt_rfc3339(completed_at),
            now.to_rfc3339(),
            id,
            user_id
        ],
    )
    .map_err(DbError::UpdateFailed)?;
    if is_completed && !goal.is_completed {
        info!("Goal '{}' completed", goal.title);
    }
    get_goal(conn, user_id, id)?.ok_or_else(|| DbError::GoalNotFound(id.to_string()))
}

pub fn delete_goal(conn: &Connection, user_id: &str, id: &str) -> Result<(), DbError> {
    let rows_affected = conn
        .execute(
            "DELETE FROM user_goals WHERE id = ?1 AND user_id = ?2",
            params![id, user_id],
        )
        .map_err(DbError::DeleteFailed)?;
    if rows_affected == 0 {
        return Err(DbError::GoalNotFound(id.to_string()));
    }
    Ok(())
}

/// Splits goals into (active, completed), preserving order.
#[must_use]
pub fn partition_goals(goals: Vec<UserGoal>) -> (Vec<UserGoal>, Vec<UserGoal>) {
    let (completed, active): (Vec<_>, Vec<_>) = goals.into_iter().partition(|g| g.is_completed);
    (active, completed)
}
