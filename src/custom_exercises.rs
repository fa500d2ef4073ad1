// src/custom_exercises.rs
//! User-defined exercises stored alongside the built-in catalogue.
use crate::db::{get_enum, get_json, get_timestamp, list_or_empty, DbError};
use crate::library::{Difficulty, Equipment, ExerciseCategory, ExerciseDefinition, MuscleGroup};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomExercise {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub description: Option<String>,
    pub category: ExerciseCategory,
    pub muscle_groups: Vec<MuscleGroup>,
    pub equipment: Vec<Equipment>,
    pub difficulty: Difficulty,
    pub is_compound: bool,
    pub created_at: DateTime<Utc>,
}

impl CustomExercise {
    /// The same exercise in catalogue form, usable anywhere a built-in one is.
    #[must_use]
    pub fn to_definition(&self) -> ExerciseDefinition {
        ExerciseDefinition {
            id: self.id.clone(),
            name: self.name.clone(),
            category: self.category,
            muscle_groups: self.muscle_groups.clone(),
            equipment: self.equipment.clone(),
            is_compound: self.is_compound,
            difficulty: self.difficulty,
            instructions: self.description.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewCustomExercise {
    pub name: String,
    pub description: Option<String>,
    pub category: ExerciseCategory,
    pub muscle_groups: Vec<MuscleGroup>,
    pub equipment: Vec<Equipment>,
    pub difficulty: Difficulty,
    pub is_compound: bool,
}

fn map_row_to_custom_exercise(row: &Row) -> Result<CustomExercise, rusqlite::Error> {
    let difficulty: Option<Difficulty> = crate::db::get_opt_enum(row, 7)?;
    Ok(CustomExercise {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        category: get_enum(row, 4)?,
        muscle_groups: get_json(row, 5)?,
        equipment: get_json(row, 6)?,
        difficulty: difficulty.unwrap_or_default(),
        is_compound: row.get(8)?,
        created_at: get_timestamp(row, 9)?,
    })
}

pub fn add_custom_exercise(
    conn: &Connection,
    user_id: &str,
    input: &NewCustomExercise,
    now: DateTime<Utc>,
) -> Result<CustomExercise, DbError> {
    let exercise = CustomExercise {
        id: Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        name: input.name.trim().to_string(),
        description: input.description.clone(),
        category: input.category,
        muscle_groups: input.muscle_groups.clone(),
        equipment: input.equipment.clone(),
        difficulty: input.difficulty,
        is_compound: input.is_compound,
        created_at: now,
    };
    conn.execute(
        "INSERT INTO exercises (id, user_id, name, description, category, muscle_groups, equipment,
            difficulty, is_compound, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            exercise.id,
            exercise.user_id,
            exercise.name,
            exercise.description,
            exercise.category.to_string(),
            serde_json::to_string(&exercise.muscle_groups)?,
            serde_json::to_string(&exercise.equipment)?,
            exercise.difficulty.to_string(),
            exercise.is_compound,
            exercise.created_at.to_rfc3339(),
        ],
    )
    .map_err(DbError::InsertFailed)?;
    info!("Added custom exercise '{}' ({})", exercise.name, exercise.id);
    Ok(exercise)
}

/// A user's custom exercises, newest first.
pub fn list_custom_exercises(conn: &Connection, user_id: &str) -> Result<Vec<CustomExercise>, DbError> {
    list_or_empty("exercises", || {
        let mut stmt = conn.prepare(
            "SELECT id, user_id, name, description, category, muscle_groups, equipment,
                    difficulty, is_compound, created_at
             FROM exercises
             WHERE user_id = ?1
             ORDER BY created_at DESC",
        )?;
        let rows = stmt.query_map(params![user_id], map_row_to_custom_exercise)?;
        rows.collect()
    })
}

pub fn delete_custom_exercise(conn: &Connection, user_id: &str, id: &str) -> Result<(), DbError> {
    let rows_affected = conn
        .execute(
            "DELETE FROM exercises WHERE id = ?1 AND user_id = ?2",
            params![id, user_id],
        )
        .map_err(DbError::DeleteFailed)?;
    if rows_affected == 0 {
        return Err(DbError::CustomExerciseNotFound(id.to_string()));
    }
    Ok(())
}
