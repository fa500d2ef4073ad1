// src/measurements.rs
use crate::db::{get_timestamp, list_or_empty, DbError};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

/// One body measurement entry. All quantities are metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyMeasurement {
    pub id: String,
    pub user_id: String,
    pub measured_at: DateTime<Utc>,
    pub weight_kg: Option<f64>,
    pub body_fat_percent: Option<f64>,
    pub muscle_mass_kg: Option<f64>,
    pub chest_cm: Option<f64>,
    pub waist_cm: Option<f64>,
    pub hips_cm: Option<f64>,
    pub bicep_cm: Option<f64>,
    pub thigh_cm: Option<f64>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct NewMeasurement {
    /// Defaults to now.
    pub measured_at: Option<DateTime<Utc>>,
    pub weight_kg: Option<f64>,
    pub body_fat_percent: Option<f64>,
    pub muscle_mass_kg: Option<f64>,
    pub chest_cm: Option<f64>,
    pub waist_cm: Option<f64>,
    pub hips_cm: Option<f64>,
    pub bicep_cm: Option<f64>,
    pub thigh_cm: Option<f64>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeightPoint {
    pub date: DateTime<Utc>,
    pub weight: f64,
    pub body_fat: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CircumferencePoint {
    pub date: DateTime<Utc>,
    pub chest: f64,
    pub waist: f64,
    pub hips: f64,
    pub arms: f64,
    pub thighs: f64,
}

fn map_row_to_measurement(row: &Row) -> Result<BodyMeasurement, rusqlite::Error> {
    Ok(BodyMeasurement {
        id: row.get(0)?,
        user_id: row.get(1)?,
        measured_at: get_timestamp(row, 2)?,
        weight_kg: row.get(3)?,
        body_fat_percent: row.get(4)?,
        muscle_mass_kg: row.get(5)?,
        chest_cm: row.get(6)?,
        waist_cm: row.get(7)?,
        hips_cm: row.get(8)?,
        bicep_cm: row.get(9)?,
        thigh_cm: row.get(10)?,
        notes: row.get(11)?,
    })
}

pub fn add_measurement(
    conn: &Connection,
    user_id: &str,
    input: &NewMeasurement,
    now: DateTime<Utc>,
) -> Result<BodyMeasurement, DbError> {
    let measurement = BodyMeasurement {
        id: Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        measured_at: input.measured_at.unwrap_or(now),
        weight_kg: input.weight_kg,
        body_fat_percent: input.body_fat_percent,
        muscle_mass_kg: input.muscle_mass_kg,
        chest_cm: input.chest_cm,
        waist_cm: input.waist_cm,
        hips_cm: input.hips_cm,
        bicep_cm: input.bicep_cm,
        thigh_cm: input.thigh_cm,
        notes: input.notes.clone(),
    };
    conn.execute(
        "INSERT INTO body_measurements (id, user_id, measured_at, weight_kg, body_fat_percent, muscle_mass_kg,
            chest_cm, waist_cm, hips_cm, bicep_cm, thigh_cm, notes)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            measurement.id,
            measurement.user_id,
            measurement.measured_at.to_rfc3339(),
            measurement.weight_kg,
            measurement.body_fat_percent,
            measurement.muscle_mass_kg,
            measurement.chest_cm,
            measurement.waist_cm,
            measurement.hips_cm,
            measurement.bicep_cm,
            measurement.thigh_cm,
            measurement.notes,
        ],
    )
    .map_err(DbError::InsertFailed)?;
    info!("Logged body measurement {} for user {}", measurement.id, user_id);
    Ok(measurement)
}

/// Newest first. A missing table yields no measurements.
pub fn list_measurements(conn: &Connection, user_id: &str) -> Result<Vec<BodyMeasurement>, DbError> {
    list_or_empty("body_measurements", || {
        let mut stmt = conn.prepare(
            "SELECT id, user_id, measured_at, weight_kg, body_fat_percent, muscle_mass_kg,
                    chest_cm, waist_cm, hips_cm, bicep_cm, thigh_cm, notes
             FROM body_measurements
             WHERE user_id = ?1
             ORDER BY measured_at DESC",
        )?;
        let rows = stmt.query_map(params![user_id], map_row_to_measurement)?;
        rows.collect()
    })
}

pub fn delete_measurement(conn: &Connection, user_id: &str, id: &str) -> Result<(), DbError> {
    let rows_affected = conn
        .execute(
            "DELETE FROM body_measurements WHERE id = ?1 AND user_id = ?2",
            params![id, user_id],
        )
        .map_err(DbError::DeleteFailed)?;
    if rows_affected == 0 {
        return Err(DbError::MeasurementNotFound(id.to_string()));
    }
    Ok(())
}

// The helpers below take the list as returned by `list_measurements` (newest first).

#[must_use]
pub fn latest_measurement(measurements: &[BodyMeasurement]) -> Option<&BodyMeasurement> {
    measurements.first()
}

/// Weight entries oldest first, skipping rows without a weight.
#[must_use]
pub fn weight_history(measurements: &[BodyMeasurement]) -> Vec<WeightPoint> {
    measurements
        .iter()
        .rev()
        .filter_map(|m| {
            m.weight_kg.map(|weight| WeightPoint {
                date: m.measured_at,
                weight,
                body_fat: m.body_fat_percent.unwrap_or(0.0),
            })
        })
        .collect()
}

/// Circumferences oldest first, with missing values as 0.
#[must_use]
pub fn circumference_history(measurements: &[BodyMeasurement]) -> Vec<CircumferencePoint> {
    measurements
        .iter()
        .rev()
        .map(|m| CircumferencePoint {
            date: m.measured_at,
            chest: m.chest_cm.unwrap_or(0.0),
            waist: m.waist_cm.unwrap_or(0.0),
            hips: m.hips_cm.unwrap_or(0.0),
            arms: m.bicep_cm.unwrap_or(0.0),
            thighs: m.thigh_cm.unwrap_or(0.0),
        })
        .collect()
}
