// src/db.rs
use crate::config::APP_DIR_NAME;
use crate::session::{CardioLog, ExerciseLogEntry, FinishedWorkout, WorkoutSession, WorkoutStatus};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tracing::{info, warn};

// Custom Error type for DB operations
#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database connection failed")]
    Connection(#[from] rusqlite::Error),
    #[error("Failed to get application data directory")]
    DataDir,
    #[error("I/O error accessing database file")]
    Io(#[from] std::io::Error),
    #[error("Database query failed: {0}")]
    QueryFailed(rusqlite::Error),
    #[error("Database update failed: {0}")]
    UpdateFailed(rusqlite::Error),
    #[error("Database insert failed: {0}")]
    InsertFailed(rusqlite::Error),
    #[error("Database delete failed: {0}")]
    DeleteFailed(rusqlite::Error),
    #[error("Failed to encode column data: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Profile not found: {0}")]
    ProfileNotFound(String),
    #[error("Username '{0}' is already taken")]
    UsernameTaken(String),
    #[error("Workout session not found: {0}")]
    SessionNotFound(String),
    #[error("Goal not found: {0}")]
    GoalNotFound(String),
    #[error("Measurement not found: {0}")]
    MeasurementNotFound(String),
    #[error("Custom exercise not found: {0}")]
    CustomExerciseNotFound(String),
}

const DB_FILE_NAME: &str = "workouts.sqlite";
const DATA_DIR_ENV_VAR: &str = "GYM_TRACKER_DATA_DIR";

/// Directory holding the database and the local JSON collections.
/// Creates the directory if it doesn't exist.
pub fn get_data_dir() -> Result<PathBuf, DbError> {
    let app_dir = match std::env::var(DATA_DIR_ENV_VAR) {
        Ok(dir) if !dir.trim().is_empty() => PathBuf::from(dir),
        _ => dirs::data_dir().ok_or(DbError::DataDir)?.join(APP_DIR_NAME),
    };
    if !app_dir.exists() {
        std::fs::create_dir_all(&app_dir)?;
    }
    Ok(app_dir)
}

/// Gets the path to the SQLite database file within the app's data directory.
pub fn get_db_path() -> Result<PathBuf, DbError> {
    Ok(get_data_dir()?.join(DB_FILE_NAME))
}

/// Opens a connection to the SQLite database.
pub fn open_db<P: AsRef<Path>>(path: P) -> Result<Connection, DbError> {
    Connection::open(path).map_err(DbError::Connection)
}

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS profiles (
        id TEXT PRIMARY KEY,
        username TEXT NOT NULL UNIQUE COLLATE NOCASE,
        display_name TEXT,
        avatar_url TEXT,
        bio TEXT,
        date_of_birth TEXT,              -- YYYY-MM-DD
        gender TEXT,
        height_cm REAL,
        weight_kg REAL,
        unit_system TEXT NOT NULL DEFAULT 'metric',
        fitness_goal TEXT,
        experience_level TEXT,
        subscription_status TEXT NOT NULL DEFAULT 'free',
        subscription_id TEXT,
        stripe_customer_id TEXT,
        subscription_started_at TEXT,
        subscription_ends_at TEXT,
        created_at TEXT NOT NULL,        -- RFC3339
        updated_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS auth_tokens (
        token TEXT PRIMARY KEY,
        user_id TEXT NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
        created_at TEXT NOT NULL,
        expires_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS exercises (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        name TEXT NOT NULL COLLATE NOCASE,
        description TEXT,
        category TEXT NOT NULL,
        muscle_groups TEXT NOT NULL,     -- JSON array
        equipment TEXT NOT NULL,         -- JSON array
        difficulty TEXT,
        instructions TEXT,
        is_compound INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS workout_sessions (
        id TEXT PRIMARY KEY,
        user_id TEXT,
        template_id TEXT,
        name TEXT NOT NULL,
        status TEXT NOT NULL,
        started_at TEXT NOT NULL,
        completed_at TEXT,
        duration_sec INTEGER,
        notes TEXT,
        rating INTEGER,
        perceived_exertion INTEGER,
        calories_burned INTEGER,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS exercise_logs (
        id TEXT PRIMARY KEY,
        session_id TEXT NOT NULL REFERENCES workout_sessions(id) ON DELETE CASCADE,
        exercise_id TEXT NOT NULL,
        exercise_name TEXT NOT NULL,
        order_index INTEGER NOT NULL,
        notes TEXT,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS sets (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        exercise_log_id TEXT NOT NULL REFERENCES exercise_logs(id) ON DELETE CASCADE,
        set_number INTEGER NOT NULL,
        set_type TEXT NOT NULL,
        reps INTEGER,
        weight_kg REAL,
        rpe REAL,
        is_pr INTEGER NOT NULL DEFAULT 0,
        completed_at TEXT,
        notes TEXT
    );

    CREATE TABLE IF NOT EXISTS cardio_logs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        exercise_log_id TEXT NOT NULL REFERENCES exercise_logs(id) ON DELETE CASCADE,
        duration_sec INTEGER,
        distance_km REAL,
        avg_heart_rate INTEGER,
        max_heart_rate INTEGER,
        avg_pace_sec_per_km REAL,
        calories_burned INTEGER,
        elevation_gain_m REAL,
        notes TEXT
    );

    CREATE TABLE IF NOT EXISTS user_goals (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        goal_type TEXT NOT NULL,
        title TEXT NOT NULL,
        description TEXT,
        target_value REAL NOT NULL,
        current_value REAL NOT NULL DEFAULT 0,
        unit TEXT NOT NULL,
        exercise_id TEXT,
        deadline TEXT,
        is_completed INTEGER NOT NULL DEFAULT 0,
        completed_at TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS body_measurements (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        weight_kg REAL,
        body_fat_percent REAL,
        muscle_mass_kg REAL,
        chest_cm REAL,
        waist_cm REAL,
        hips_cm REAL,
        bicep_cm REAL,
        thigh_cm REAL,
        notes TEXT,
        measured_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS achievements (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        description TEXT NOT NULL,
        icon TEXT NOT NULL,
        category TEXT NOT NULL,
        criteria TEXT NOT NULL,          -- JSON
        points INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS user_achievements (
        user_id TEXT NOT NULL,
        achievement_id TEXT NOT NULL REFERENCES achievements(id) ON DELETE CASCADE,
        progress REAL NOT NULL DEFAULT 0,
        unlocked_at TEXT,
        PRIMARY KEY (user_id, achievement_id)
    );

    CREATE TABLE IF NOT EXISTS subscription_events (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id TEXT NOT NULL,
        event_type TEXT NOT NULL,
        stripe_event_id TEXT,
        data TEXT,                       -- JSON
        created_at TEXT NOT NULL
    );
";

/// Initializes the database tables if they don't exist and seeds the
/// achievement catalogue.
pub fn init_db(conn: &Connection) -> Result<(), DbError> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")
        .map_err(DbError::Connection)?;
    conn.execute_batch(SCHEMA).map_err(DbError::Connection)?;
    crate::achievements::seed_defaults(conn)?;
    Ok(())
}

// ---- Shared helpers for the entity modules ----

/// SQLite reports a missing table as "no such table: <name>".
pub fn is_missing_relation(err: &rusqlite::Error) -> bool {
    err.to_string().contains("no such table")
}

/// Runs a list query, treating a missing table as an empty result.
pub(crate) fn list_or_empty<T>(
    what: &str,
    query: impl FnOnce() -> Result<Vec<T>, rusqlite::Error>,
) -> Result<Vec<T>, DbError> {
    match query() {
        Ok(rows) => Ok(rows),
        Err(e) if is_missing_relation(&e) => {
            warn!("{} table is missing; returning no rows ({})", what, e);
            Ok(Vec::new())
        }
        Err(e) => Err(DbError::QueryFailed(e)),
    }
}

fn conversion_error(
    col: usize,
    e: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(col, rusqlite::types::Type::Text, Box::new(e))
}

pub(crate) fn parse_timestamp(value: &str, col: usize) -> Result<DateTime<Utc>, rusqlite::Error> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(col, e))
}

pub(crate) fn get_timestamp(row: &Row, col: usize) -> Result<DateTime<Utc>, rusqlite::Error> {
    let raw: String = row.get(col)?;
    parse_timestamp(&raw, col)
}

pub(crate) fn get_opt_timestamp(
    row: &Row,
    col: usize,
) -> Result<Option<DateTime<Utc>>, rusqlite::Error> {
    let raw: Option<String> = row.get(col)?;
    raw.map(|s| parse_timestamp(&s, col)).transpose()
}

/// Parses a text column into a strum-backed enum.
pub(crate) fn get_enum<T>(row: &Row, col: usize) -> Result<T, rusqlite::Error>
where
    T: FromStr<Err = strum::ParseError>,
{
    let raw: String = row.get(col)?;
    T::from_str(&raw).map_err(|e| conversion_error(col, e))
}

pub(crate) fn get_opt_enum<T>(row: &Row, col: usize) -> Result<Option<T>, rusqlite::Error>
where
    T: FromStr<Err = strum::ParseError>,
{
    let raw: Option<String> = row.get(col)?;
    raw.map(|s| T::from_str(&s).map_err(|e| conversion_error(col, e)))
        .transpose()
}

pub(crate) fn get_json<T: serde::de::DeserializeOwned>(
    row: &Row,
    col: usize,
) -> Result<T, rusqlite::Error> {
    let raw: String = row.get(col)?;
    serde_json::from_str(&raw).map_err(|e| conversion_error(col, e))
}

pub(crate) fn opt_rfc3339(value: Option<DateTime<Utc>>) -> Option<String> {
    value.map(|dt| dt.to_rfc3339())
}

// ---- Workout sessions ----

/// Persists a finished workout with its exercise logs, sets and cardio
/// records in a single transaction.
pub fn save_finished_workout(conn: &mut Connection, finished: &FinishedWorkout) -> Result<(), DbError> {
    let session = &finished.session;
    let tx = conn.transaction()?;

    tx.execute(
        "INSERT INTO workout_sessions (id, user_id, template_id, name, status, started_at, completed_at,
            duration_sec, notes, rating, perceived_exertion, calories_burned, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            session.id,
            session.user_id,
            session.template_id,
            session.name,
            session.status.to_string(),
            session.started_at.to_rfc3339(),
            opt_rfc3339(session.completed_at),
            session.duration_sec.map(|d| d as i64),
            session.notes,
            session.rating,
            session.perceived_exertion,
            session.calories_burned,
            session.created_at.to_rfc3339(),
        ],
    )
    .map_err(DbError::InsertFailed)?;

    for log in &finished.exercise_logs {
        insert_exercise_log(&tx, &session.id, session.created_at, log)?;
    }

    tx.commit()?;
    info!(
        "Persisted workout session {} ({} exercises)",
        session.id,
        finished.exercise_logs.len()
    );
    Ok(())
}

fn insert_exercise_log(
    tx: &rusqlite::Transaction,
    session_id: &str,
    created_at: DateTime<Utc>,
    log: &ExerciseLogEntry,
) -> Result<(), DbError> {
    let notes = (!log.notes.trim().is_empty()).then_some(log.notes.as_str());
    tx.execute(
        "INSERT INTO exercise_logs (id, session_id, exercise_id, exercise_name, order_index, notes, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            log.id,
            session_id,
            log.exercise.id,
            log.exercise.name,
            log.order_index as i64,
            notes,
            created_at.to_rfc3339(),
        ],
    )
    .map_err(DbError::InsertFailed)?;

    for set in &log.sets {
        tx.execute(
            "INSERT INTO sets (exercise_log_id, set_number, set_type, reps, weight_kg, rpe, is_pr, completed_at, notes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                log.id,
                set.set_number,
                set.set_type.to_string(),
                set.reps,
                set.weight_kg,
                set.rpe,
                set.is_pr,
                opt_rfc3339(set.completed_at),
                set.notes,
            ],
        )
        .map_err(DbError::InsertFailed)?;
    }

    if let Some(cardio) = &log.cardio_log {
        insert_cardio_log(tx, &log.id, cardio)?;
    }
    Ok(())
}

fn insert_cardio_log(
    tx: &rusqlite::Transaction,
    exercise_log_id: &str,
    cardio: &CardioLog,
) -> Result<(), DbError> {
    tx.execute(
        "INSERT INTO cardio_logs (exercise_log_id, duration_sec, distance_km, avg_heart_rate, max_heart_rate,
            avg_pace_sec_per_km, calories_burned, elevation_gain_m, notes)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            exercise_log_id,
            cardio.duration_sec.map(|d| d as i64),
            cardio.distance_km,
            cardio.avg_heart_rate,
            cardio.max_heart_rate,
            cardio.avg_pace_sec_per_km,
            cardio.calories_burned,
            cardio.elevation_gain_m,
            cardio.notes,
        ],
    )
    .map_err(DbError::InsertFailed)?;
    Ok(())
}

// Helper function to map a database row to a WorkoutSession struct
fn map_row_to_session(row: &Row) -> Result<WorkoutSession, rusqlite::Error> {
    let duration_sec: Option<i64> = row.get(7)?;
    Ok(WorkoutSession {
        id: row.get(0)?,
        user_id: row.get(1)?,
        template_id: row.get(2)?,
        name: row.get(3)?,
        status: get_enum::<WorkoutStatus>(row, 4)?,
        started_at: get_timestamp(row, 5)?,
        completed_at: get_opt_timestamp(row, 6)?,
        duration_sec: duration_sec.and_then(|d| u64::try_from(d).ok()),
        notes: row.get(8)?,
        rating: row.get(9)?,
        perceived_exertion: row.get(10)?,
        calories_burned: row.get(11)?,
        created_at: get_timestamp(row, 12)?,
    })
}

/// Lists a user's persisted sessions, most recent first.
pub fn list_sessions(
    conn: &Connection,
    user_id: &str,
    limit: Option<u32>,
) -> Result<Vec<WorkoutSession>, DbError> {
    list_or_empty("workout_sessions", || {
        let mut stmt = conn.prepare(
            "SELECT id, user_id, template_id, name, status, started_at, completed_at, duration_sec,
                    notes, rating, perceived_exertion, calories_burned, created_at
             FROM workout_sessions
             WHERE user_id = ?1
             ORDER BY started_at DESC
             LIMIT ?2",
        )?;
        // SQLite treats a negative LIMIT as "no limit".
        let limit = limit.map_or(-1, i64::from);
        let rows = stmt.query_map(params![user_id, limit], map_row_to_session)?;
        rows.collect()
    })
}

/// Number of exercise logs recorded for a session.
pub fn count_session_exercises(conn: &Connection, session_id: &str) -> Result<i64, DbError> {
    conn.query_row(
        "SELECT COUNT(*) FROM exercise_logs WHERE session_id = ?1",
        params![session_id],
        |row| row.get(0),
    )
    .map_err(DbError::QueryFailed)
}

/// Deletes a session; logs, sets and cardio rows cascade.
pub fn delete_session(conn: &Connection, session_id: &str) -> Result<(), DbError> {
    let rows_affected = conn
        .execute("DELETE FROM workout_sessions WHERE id = ?1", params![session_id])
        .map_err(DbError::DeleteFailed)?;
    if rows_affected == 0 {
        return Err(DbError::SessionNotFound(session_id.to_string()));
    }
    Ok(())
}
