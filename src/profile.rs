// src/profile.rs
use crate::billing::SubscriptionStatus;
use crate::config::Units;
use crate::db::{get_enum, get_opt_enum, get_opt_timestamp, get_timestamp, opt_rfc3339, DbError};
use crate::library::ExperienceLevel;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, ToSql};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, EnumIter)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Gender {
    Male,
    Female,
    Other,
    PreferNotToSay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, EnumIter)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum FitnessGoal {
    BuildMuscle,
    LoseWeight,
    Maintain,
    IncreaseStrength,
    ImproveEndurance,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub username: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<Gender>,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub unit_system: Units,
    pub fitness_goal: Option<FitnessGoal>,
    pub experience_level: Option<ExperienceLevel>,
    pub subscription_status: SubscriptionStatus,
    pub subscription_id: Option<String>,
    pub stripe_customer_id: Option<String>,
    pub subscription_started_at: Option<DateTime<Utc>>,
    pub subscription_ends_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    /// Display name if set, otherwise the username.
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.username)
    }
}

/// Editable profile fields. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<Gender>,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub unit_system: Option<Units>,
    pub fitness_goal: Option<FitnessGoal>,
    pub experience_level: Option<ExperienceLevel>,
}

impl ProfileUpdate {
    fn is_empty(&self) -> bool {
        self.display_name.is_none()
            && self.bio.is_none()
            && self.date_of_birth.is_none()
            && self.gender.is_none()
            && self.height_cm.is_none()
            && self.weight_kg.is_none()
            && self.unit_system.is_none()
            && self.fitness_goal.is_none()
            && self.experience_level.is_none()
    }
}

/// Subscription columns written by billing. Each outer `Some` overwrites the
/// column (an inner `None` clears it).
#[derive(Debug, Clone, Default)]
pub struct SubscriptionChange {
    pub status: Option<SubscriptionStatus>,
    pub subscription_id: Option<Option<String>>,
    pub started_at: Option<Option<DateTime<Utc>>>,
    pub ends_at: Option<Option<DateTime<Utc>>>,
}

const PROFILE_COLUMNS: &str = "id, username, display_name, avatar_url, bio, date_of_birth, gender,
    height_cm, weight_kg, unit_system, fitness_goal, experience_level, subscription_status,
    subscription_id, stripe_customer_id, subscription_started_at, subscription_ends_at,
    created_at, updated_at";

// Helper function to map a database row to a Profile struct
fn map_row_to_profile(row: &Row) -> Result<Profile, rusqlite::Error> {
    let dob: Option<String> = row.get(5)?;
    let date_of_birth = dob
        .map(|s| {
            NaiveDate::parse_from_str(&s, "%Y-%m-%d").map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
            })
        })
        .transpose()?;

    Ok(Profile {
        id: row.get(0)?,
        username: row.get(1)?,
        display_name: row.get(2)?,
        avatar_url: row.get(3)?,
        bio: row.get(4)?,
        date_of_birth,
        gender: get_opt_enum(row, 6)?,
        height_cm: row.get(7)?,
        weight_kg: row.get(8)?,
        unit_system: get_enum(row, 9)?,
        fitness_goal: get_opt_enum(row, 10)?,
        experience_level: get_opt_enum(row, 11)?,
        subscription_status: get_enum(row, 12)?,
        subscription_id: row.get(13)?,
        stripe_customer_id: row.get(14)?,
        subscription_started_at: get_opt_timestamp(row, 15)?,
        subscription_ends_at: get_opt_timestamp(row, 16)?,
        created_at: get_timestamp(row, 17)?,
        updated_at: get_timestamp(row, 18)?,
    })
}

/// Creates a profile on the free tier. Usernames are unique (case-insensitive).
pub fn create_profile(
    conn: &Connection,
    username: &str,
    display_name: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Profile, DbError> {
    let username = username.trim();
    if get_profile_by_username(conn, username)?.is_some() {
        return Err(DbError::UsernameTaken(username.to_string()));
    }
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO profiles (id, username, display_name, unit_system, subscription_status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
        params![
            id,
            username,
            display_name,
            Units::default().to_string(),
            SubscriptionStatus::Free.to_string(),
            now.to_rfc3339(),
        ],
    )
    .map_err(DbError::InsertFailed)?;
    info!("Created profile '{}' ({})", username, id);

    get_profile(conn, &id)?.ok_or(DbError::ProfileNotFound(id))
}

pub fn get_profile(conn: &Connection, id: &str) -> Result<Option<Profile>, DbError> {
    let sql = format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = ?1");
    conn.query_row(&sql, params![id], map_row_to_profile)
        .optional()
        .map_err(DbError::QueryFailed)
}

pub fn get_profile_by_username(conn: &Connection, username: &str) -> Result<Option<Profile>, DbError> {
    let sql = format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE username = ?1 COLLATE NOCASE");
    conn.query_row(&sql, params![username.trim()], map_row_to_profile)
        .optional()
        .map_err(DbError::QueryFailed)
}

pub fn update_profile(
    conn: &Connection,
    id: &str,
    update: &ProfileUpdate,
    now: DateTime<Utc>,
) -> Result<Profile, DbError> {
    if !update.is_empty() {
        let mut params: Vec<Box<dyn ToSql>> = Vec::new();
        let mut updates = Vec::new();

        if let Some(name) = &update.display_name {
            updates.push("display_name = ?");
            params.push(Box::new(name.clone()));
        }
        if let Some(bio) = &update.bio {
            updates.push("bio = ?");
            params.push(Box::new(bio.clone()));
        }
        if let Some(dob) = update.date_of_birth {
            updates.push("date_of_birth = ?");
            params.push(Box::new(dob.format("%Y-%m-%d").to_string()));
        }
        if let Some(gender) = update.gender {
            updates.push("gender = ?");
            params.push(Box::new(gender.to_string()));
        }
        if let Some(h) = update.height_cm {
            updates.push("height_cm = ?");
            params.push(Box::new(h));
        }
        if let Some(w) = update.weight_kg {
            updates.push("weight_kg = ?");
            params.push(Box::new(w));
        }
        if let Some(units) = update.unit_system {
            updates.push("unit_system = ?");
            params.push(Box::new(units.to_string()));
        }
        if let Some(goal) = update.fitness_goal {
            updates.push("fitness_goal = ?");
            params.push(Box::new(goal.to_string()));
        }
        if let Some(level) = update.experience_level {
            updates.push("experience_level = ?");
            params.push(Box::new(level.to_string()));
        }
        updates.push("updated_at = ?");
        params.push(Box::new(now.to_rfc3339()));

        let sql = format!("UPDATE profiles SET {} WHERE id = ?", updates.join(", "));
        params.push(Box::new(id.to_string()));
        let params_slice: Vec<&dyn ToSql> = params.iter().map(|b| b.as_ref()).collect();

        let rows_affected = conn
            .execute(&sql, params_slice.as_slice())
            .map_err(DbError::UpdateFailed)?;
        if rows_affected == 0 {
            return Err(DbError::ProfileNotFound(id.to_string()));
        }
    }
    get_profile(conn, id)?.ok_or_else(|| DbError::ProfileNotFound(id.to_string()))
}

pub fn set_stripe_customer_id(conn: &Connection, id: &str, customer_id: &str) -> Result<(), DbError> {
    let rows_affected = conn
        .execute(
            "UPDATE profiles SET stripe_customer_id = ?1 WHERE id = ?2",
            params![customer_id, id],
        )
        .map_err(DbError::UpdateFailed)?;
    if rows_affected == 0 {
        return Err(DbError::ProfileNotFound(id.to_string()));
    }
    Ok(())
}

pub fn apply_subscription_change(
    conn: &Connection,
    id: &str,
    change: &SubscriptionChange,
    now: DateTime<Utc>,
) -> Result<(), DbError> {
    let mut params: Vec<Box<dyn ToSql>> = Vec::new();
    let mut updates = Vec::new();

    if let Some(status) = change.status {
        updates.push("subscription_status = ?");
        params.push(Box::new(status.to_string()));
    }
    if let Some(sub_id) = &change.subscription_id {
        updates.push("subscription_id = ?");
        params.push(Box::new(sub_id.clone()));
    }
    if let Some(started) = change.started_at {
        updates.push("subscription_started_at = ?");
        params.push(Box::new(opt_rfc3339(started)));
    }
    if let Some(ends) = change.ends_at {
        updates.push("subscription_ends_at = ?");
        params.push(Box::new(opt_rfc3339(ends)));
    }
    updates.push("updated_at = ?");
    params.push(Box::new(now.to_rfc3339()));

    let sql = format!("UPDATE profiles SET {} WHERE id = ?", updates.join(", "));
    params.push(Box::new(id.to_string()));
    let params_slice: Vec<&dyn ToSql> = params.iter().map(|b| b.as_ref()).collect();

    let rows_affected = conn
        .execute(&sql, params_slice.as_slice())
        .map_err(DbError::UpdateFailed)?;
    if rows_affected == 0 {
        return Err(DbError::ProfileNotFound(id.to_string()));
    }
    info!("Updated subscription for profile {}", id);
    Ok(())
}
